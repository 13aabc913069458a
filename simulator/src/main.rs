use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use vitals_simulator::{
    Args, DeviceContext, DryRunTransport, Fleet, HttpTransport, Result, TracingSink, Transport,
};

#[tokio::main]
async fn main() {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("Simulator failed: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let config = args.fleet_config()?;
    let limits = Arc::new(args.load_limits()?);

    let transport: Arc<dyn Transport> = if args.dry_run {
        info!("Dry run, records will be logged instead of sent");
        Arc::new(DryRunTransport)
    } else {
        Arc::new(HttpTransport::new(args.send_timeout()?)?)
    };

    info!("Starting vitals simulator");
    info!(
        "Target: {}:{}, Devices: {}, Interval: {:?}",
        config.address, config.port, config.device_count, config.interval
    );

    let context = DeviceContext::new(limits, transport, Arc::new(TracingSink));
    let fleet = Fleet::new(config, context)?;

    tokio::select! {
        result = fleet.start() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal during startup");
            fleet.shutdown().await;
            return Ok(());
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Received shutdown signal");

    fleet.shutdown().await;
    Ok(())
}
