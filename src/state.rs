use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::Config;

/// Session data shared by the engine's tasks.
///
/// The token is swapped atomically, so a token set after login is picked
/// up by the next heartbeat without any locking.
#[derive(Clone)]
pub struct SessionState {
    pub config: Arc<Config>,
    token: Arc<ArcSwap<String>>,
}

impl SessionState {
    pub fn new(config: Config) -> Self {
        let token = config.token.clone().unwrap_or_default();
        Self {
            config: Arc::new(config),
            token: Arc::new(ArcSwap::from_pointee(token)),
        }
    }

    pub fn uid(&self) -> &str {
        &self.config.uid
    }

    pub fn token(&self) -> Arc<String> {
        self.token.load_full()
    }

    pub fn set_token(&self, token: impl Into<String>) {
        self.token.store(Arc::new(token.into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_starts_from_config() {
        let mut config = Config::new("127.0.0.1:1", "node-1");
        config.token = Some("initial".to_string());
        let state = SessionState::new(config);
        assert_eq!(state.token().as_str(), "initial");
        assert_eq!(state.uid(), "node-1");
    }

    #[test]
    fn test_set_token_is_visible_to_clones() {
        let state = SessionState::new(Config::new("127.0.0.1:1", "node-1"));
        let other = state.clone();
        assert_eq!(other.token().as_str(), "");
        state.set_token("fresh");
        assert_eq!(other.token().as_str(), "fresh");
    }
}
