use std::path::PathBuf;

use clap::Parser;
use webterm_web::config::ServerConfig;

#[derive(Debug, Parser)]
#[command(name = "webterm", about = "Browser terminal relay for managed hosts")]
struct Args {
    /// Path to the server configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Override the bind address from the config file
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,
    /// Override the listen port from the config file
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,
    /// Override the inventory file path
    #[arg(long, value_name = "FILE")]
    inventory: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(inventory) = args.inventory {
        config.inventory = inventory;
    }

    webterm_web::run_server(config).await
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(env_filter).try_init();
}
