use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{info, warn};

use agora::api::{AppState, create_router};
use agora::auth::AuthState;
use agora::chat::{ChatService, MessageRepository, MessageStore, retention};
use agora::config::{AppConfig, default_config_path};
use agora::db::Database;
use agora::ws::Hub;

fn main() {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "{err:?}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.common.config.as_deref())?;
    init_logging(&cli.common, &config)?;

    match cli.command {
        Command::Serve(cmd) => run_serve(config, cmd),
        Command::Config { command } => handle_config(&cli.common, &config, command),
    }
}

#[tokio::main]
async fn run_serve(config: AppConfig, cmd: ServeCommand) -> Result<()> {
    serve(config, cmd).await
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Agora - real-time chat broadcast server.",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Args)]
struct CommonOpts {
    /// Override the config file path
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Reduce output to only errors
    #[arg(short, long, action = clap::ArgAction::SetTrue, global = true)]
    quiet: bool,
    /// Increase logging verbosity (stackable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Enable debug logging (equivalent to -vv)
    #[arg(long, global = true)]
    debug: bool,
    /// Enable trace logging (overrides other levels)
    #[arg(long, global = true)]
    trace: bool,
    /// Output logs as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the chat server
    Serve(ServeCommand),
    /// Inspect or initialize configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Debug, Args)]
struct ServeCommand {
    /// Override the bind address
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,
    /// Override the SQLite database path
    #[arg(long, value_name = "PATH")]
    database: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration
    Show,
    /// Write a default config file
    Init,
}

fn init_logging(common: &CommonOpts, config: &AppConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let level = if common.quiet {
        "error"
    } else if common.trace {
        "trace"
    } else if common.debug {
        "debug"
    } else {
        match common.verbose {
            0 => config.logging.level.as_str(),
            1 => "debug",
            _ => "trace",
        }
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("agora={level},tower_http={level}")));

    if common.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_ansi(io::stderr().is_terminal()))
            .try_init()
            .ok();
    }

    Ok(())
}

fn handle_config(
    common: &CommonOpts,
    config: &AppConfig,
    command: ConfigCommand,
) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let toml = toml::to_string_pretty(config).context("serializing configuration")?;
            print!("{toml}");
            Ok(())
        }
        ConfigCommand::Init => {
            let path = match &common.config {
                Some(path) => path.clone(),
                None => default_config_path()?,
            };
            if path.exists() {
                warn!("config file already exists at {}", path.display());
                return Ok(());
            }
            AppConfig::write_default(&path)?;
            info!("wrote default config to {}", path.display());
            Ok(())
        }
    }
}

async fn serve(config: AppConfig, cmd: ServeCommand) -> Result<()> {
    let jwt_secret = config.auth.resolve_secret()?;
    let auth = AuthState::new(&jwt_secret);

    let db_path = match cmd.database {
        Some(path) => path,
        None => config.database.resolve_path()?,
    };
    let database = Database::new(&db_path).await?;
    info!("database ready at {}", db_path.display());

    let store: Arc<dyn MessageStore> = Arc::new(MessageRepository::new(database.pool().clone()));

    let (hub, runner) = Hub::new(config.chat.hub_config());
    tokio::spawn(runner.run());

    let chat = Arc::new(ChatService::new(
        store.clone(),
        hub.clone(),
        config.chat.max_message_bytes,
    ));

    tokio::spawn(retention::run_sweeper(
        store,
        config.chat.db_retention(),
        config.chat.retention_sweep_interval(),
    ));

    let state = AppState::new(chat, hub, auth, config.chat.session_config());
    let app = create_router(state, &config.server.allowed_origins);

    let bind_addr = cmd.bind.unwrap_or_else(|| config.server.bind_addr.clone());
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {bind_addr}"))?;
    info!("listening on {bind_addr}");

    let shutdown_signal = async {
        let ctrl_c = async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }

        info!("shutdown signal received");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("running server")?;

    info!("shutdown complete");
    Ok(())
}
