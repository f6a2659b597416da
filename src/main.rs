//! smolboy DNS
//!
//! Serves A records from a static file and redraws a table of recent
//! resolutions every refresh interval.

use std::{io, process, sync::Arc};

use log::{error, info};
use tokio::signal;

use smolboy_dns::{
    config::ServerConfig,
    errors::DnsError,
    event::event_channel,
    handlers::{bind_udp, run_udp_server},
    live_view::LiveView,
    responder::Responder,
    store::RecordStore,
    telemetry,
};

#[tokio::main]
async fn main() -> Result<(), DnsError> {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_micros()
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(DnsError::Usage(usage)) => {
            println!("{usage}");
            process::exit(1);
        }
        Err(e) => {
            error!("{}", e);
            return Err(e);
        }
    };

    if let Err(e) = serve(config).await {
        error!("{}", e);
        return Err(e);
    }
    Ok(())
}

async fn serve(config: ServerConfig) -> Result<(), DnsError> {
    let store = Arc::new(RecordStore::load(&config.records_path)?);

    if let Some(addr) = config.metrics_addr {
        telemetry::install_exporter(addr)?;
    }

    let socket = Arc::new(bind_udp(config.bind_addr).await?);

    let (events, receiver) = event_channel(config.event_capacity);
    info!(
        "Event channel capacity {}, refreshing every {:?}",
        config.event_capacity, config.refresh_interval
    );

    let live_view = LiveView::new(receiver, config.refresh_interval, io::stdout()).spawn();

    let responder = Responder::new(store, events, config.ttl);
    let udp_server = run_udp_server(socket, responder, config.max_packet_size);

    let result = tokio::select! {
        res = signal::ctrl_c() => {
            info!("Shutdown signal received");
            res.map_err(DnsError::from)
        },
        res = udp_server => res,
    };

    live_view.abort();
    result
}
