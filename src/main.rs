use std::process::ExitCode;

use clap::Parser;
use tokio::signal;

use msgclient::config::Config;
#[cfg(unix)]
use msgclient::session::heartbeat::HeartbeatTrigger;
use msgclient::state::SessionState;
use msgclient::{InboundQueues, Session};

/// Relay client: keeps a session with the message server, forwards server
/// pushes to the backend and reports local health.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Relay server address, overrides MSGCLIENT_SERVER.
    #[arg(long, value_name = "HOST:PORT")]
    server: Option<String>,

    /// Client uid, overrides MSGCLIENT_UID.
    #[arg(long)]
    uid: Option<String>,

    /// Connect without sending a login frame.
    #[arg(long, default_value_t = false)]
    no_login: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "msgclient=debug".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = match Config::from_env_with(cli.server, cli.uid) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    print_banner(&config);

    let (session, inbound) = match Session::connect(config).await {
        Ok(started) => started,
        Err(e) => {
            tracing::error!("failed to start session: {e}");
            return ExitCode::FAILURE;
        }
    };
    spawn_inbound_consumer(inbound, session.state().clone());

    if !cli.no_login {
        if let Err(e) = session.login().await {
            tracing::error!("login failed: {e}");
            let _ = session.close().await;
            return ExitCode::FAILURE;
        }
    }

    #[cfg(unix)]
    spawn_trigger_on_sigusr1(session.heartbeat_trigger());

    let interrupted = tokio::select! {
        _ = shutdown_signal() => true,
        _ = session.closed() => false,
    };

    if interrupted {
        tracing::info!("interrupted, leaving relay session");
        if let Err(e) = session.quit().await {
            tracing::warn!("failed to send quit: {e}");
        }
        session.shutdown();
    }

    match session.wait().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("session failed: {e}");
            ExitCode::FAILURE
        }
    }
}

fn print_banner(config: &Config) {
    let version = env!("CARGO_PKG_VERSION");
    let monitor = config.monitor_url.as_deref().unwrap_or("disabled");
    let backend = if config.backend_url.is_empty() {
        "none"
    } else {
        config.backend_url.as_str()
    };

    eprintln!();
    eprintln!("  \x1b[1;36mmsgclient\x1b[0m \x1b[2mv{version}\x1b[0m");
    eprintln!();
    eprintln!("  \x1b[2mserver\x1b[0m       {}", config.server_addr);
    eprintln!("  \x1b[2muid\x1b[0m          {}", config.uid);
    eprintln!("  \x1b[2mbackend\x1b[0m      {backend}");
    eprintln!("  \x1b[2mmonitor\x1b[0m      {monitor}");
    eprintln!(
        "  \x1b[2mheartbeat\x1b[0m    every {}s",
        config.heartbeat_interval.as_secs()
    );
    eprintln!();
}

/// Drains the queues the engine leaves to the application. A `token` in
/// the login reply becomes the session token.
fn spawn_inbound_consumer(mut inbound: InboundQueues, state: SessionState) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(reply) = inbound.login.recv() => {
                    match reply.str_field("token") {
                        Some(token) => {
                            state.set_token(token);
                            tracing::info!("login accepted");
                        }
                        None => tracing::info!(payload = ?reply.payload, "login reply"),
                    }
                }
                Some(reply) = inbound.quit.recv() => {
                    tracing::info!(payload = ?reply.payload, "quit reply");
                }
                Some(reply) = inbound.client_push.recv() => {
                    tracing::info!(payload = ?reply.payload, "client push reply");
                }
                else => break,
            }
        }
    });
}

#[cfg(unix)]
fn spawn_trigger_on_sigusr1(trigger: HeartbeatTrigger) {
    tokio::spawn(async move {
        let mut usr1 = match signal::unix::signal(signal::unix::SignalKind::user_defined1()) {
            Ok(usr1) => usr1,
            Err(e) => {
                tracing::warn!("failed to install SIGUSR1 handler: {e}");
                return;
            }
        };
        while usr1.recv().await.is_some() {
            match trigger.fire().await {
                Ok(outcome) => tracing::info!(%outcome, "heartbeat triggered"),
                Err(_) => break,
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                tracing::warn!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
