#![forbid(unsafe_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use bsb_gate_lib::{
    serve, telemetry::init_tracing, AppState, GateConfig, RequestPipeline, StaticLookup,
};
use clap::Parser;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "BSB lookup service behind rate limiting and token auth")]
struct Cli {
    /// Address to listen on
    #[arg(short, long, env = "BSB_LISTEN", default_value = "127.0.0.1:4567")]
    listen: SocketAddr,

    /// BSB table (JSON)
    #[arg(short, long, value_name = "FILE", env = "BSB_DATA_FILE", default_value = "config/bsb_db.json")]
    data: PathBuf,

    /// Bank prefix list (JSON)
    #[arg(long, value_name = "FILE", env = "BSB_BANK_LIST_FILE", default_value = "config/bsb_bank_list.json")]
    banks: PathBuf,

    /// Log level, overridden by RUST_LOG
    #[arg(long, env = "BSB_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = init_tracing(&cli.log_level, false) {
        eprintln!("{err}");
        std::process::exit(1);
    }

    let config = match GateConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(%err, "failed to load configuration");
            std::process::exit(1);
        }
    };
    info!(
        mode = %config.mode,
        max_requests = config.rate_limit.max_requests,
        window_seconds = config.rate_limit.window_seconds,
        "configuration loaded"
    );

    let pipeline = match RequestPipeline::from_config(&config) {
        Ok(pipeline) => pipeline,
        Err(err) => {
            error!(%err, "failed to build request pipeline");
            std::process::exit(1);
        }
    };
    let lookup = StaticLookup::from_path(&cli.data).with_banks_path(&cli.banks);
    let state = Arc::new(AppState::new(pipeline, Arc::new(lookup)));

    if let Err(err) = serve(cli.listen, state).await {
        error!(%err, "server exited with error");
        std::process::exit(1);
    }
}
