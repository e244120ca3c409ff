pub mod backend;
pub mod config;
pub mod error;
pub mod models;
pub mod monitor;
pub mod session;
pub mod state;

pub use config::Config;
pub use error::SessionError;
pub use session::{InboundQueues, Session};
