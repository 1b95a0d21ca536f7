//! wg-session main entry point
//!
//! Command-line front end for inspecting wg-quick configurations and
//! exercising the session controller against an in-memory platform.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wg_session::events::Subscription;
use wg_session::platform::InMemoryProvider;
use wg_session::wireguard::{LoopbackEngine, PrivateKey, TunnelEngine};
use wg_session::{EventKind, SessionController, Settings, TunnelConfig, APP_NAME, VERSION};

/// How long `simulate` waits for each lifecycle event
const EVENT_WAIT: Duration = Duration::from_secs(5);

/// WireGuard VPN session controller
#[derive(Parser, Debug)]
#[command(name = APP_NAME, version = VERSION, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse a wg-quick file and print a JSON summary
    Check {
        /// wg-quick configuration file
        file: PathBuf,
    },

    /// Print the engine settings for a wg-quick file
    Uapi {
        /// wg-quick configuration file
        file: PathBuf,
    },

    /// Generate a private key
    Genkey,

    /// Derive a public key from a private key read on stdin
    Pubkey,

    /// Connect and disconnect against an in-memory platform
    Simulate {
        /// wg-quick configuration file
        file: PathBuf,

        /// Session display name
        #[arg(short, long, default_value = "")]
        name: String,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Initialize structured logging with tracing
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Run the CLI command
async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = match &cli.config {
        Some(path) => Settings::from_file(path)?,
        None => Settings::default(),
    };

    match cli.command {
        Commands::Check { file } => {
            let config = read_config(&file)?;
            let summary = summarize(&config);
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Commands::Uapi { file } => {
            let config = read_config(&file)?;
            print!("{}", config.to_uapi());
            Ok(())
        }
        Commands::Genkey => {
            println!("{}", PrivateKey::generate().to_base64());
            Ok(())
        }
        Commands::Pubkey => {
            let mut line = String::new();
            std::io::stdin()
                .lock()
                .read_line(&mut line)
                .context("Failed to read private key from stdin")?;
            let key = PrivateKey::from_base64(line.trim())?;
            println!("{}", key.public_key().to_base64());
            Ok(())
        }
        Commands::Simulate { file, name } => simulate(&settings, &file, &name).await,
        Commands::Version => {
            println!("{} v{}", APP_NAME, VERSION);
            println!("engine {}", LoopbackEngine::new().version());
            Ok(())
        }
    }
}

fn read_config(path: &Path) -> anyhow::Result<TunnelConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(TunnelConfig::parse(&text)?)
}

fn summarize(config: &TunnelConfig) -> serde_json::Value {
    let peers: Vec<_> = config
        .peers
        .iter()
        .map(|peer| {
            json!({
                "public_key": peer.public_key.to_base64(),
                "preshared_key": peer.preshared_key.is_some(),
                "allowed_ips": peer.allowed_ips,
                "endpoint": peer.endpoint,
                "persistent_keepalive": peer.persistent_keepalive,
            })
        })
        .collect();

    json!({
        "public_key": config.public_key().to_base64(),
        "addresses": config.addresses,
        "dns": config.dns_servers,
        "listen_port": config.listen_port,
        "mtu": config.mtu,
        "peers": peers,
        "network_settings": config.network_settings(),
    })
}

async fn simulate(settings: &Settings, file: &Path, name: &str) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let provider = Arc::new(InMemoryProvider::new());
    let controller =
        SessionController::new(settings, provider.clone(), Arc::new(LoopbackEngine::new()));
    let mut subscription = controller.subscribe();

    controller.attach().await?;
    info!("Engine version {}", controller.version());

    controller.connect(&text, name).await?;
    wait_for(&mut subscription, EventKind::Started).await?;
    println!("status: connected={}", controller.status().await);

    controller.disconnect().await?;
    wait_for(&mut subscription, EventKind::Stopped).await?;
    println!("status: connected={}", controller.status().await);

    let calls = provider.calls();
    info!(
        "Platform calls: list={} save={} load={} start={} stop={}",
        calls.list, calls.save, calls.load, calls.start, calls.stop
    );
    Ok(())
}

/// Print events until one of `kind` arrives
async fn wait_for(subscription: &mut Subscription, kind: EventKind) -> anyhow::Result<()> {
    loop {
        let event = timeout(EVENT_WAIT, subscription.events.recv())
            .await
            .with_context(|| format!("Timed out waiting for {} event", kind))?
            .context("Event bridge closed")?;
        println!("{}", event.to_json()?);

        match event.kind {
            k if k == kind => return Ok(()),
            EventKind::Exception => anyhow::bail!("Session reported an exception"),
            _ => {}
        }
    }
}
