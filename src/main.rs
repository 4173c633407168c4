mod bluetooth;
mod config;
mod decoder;
mod models;
mod mqtt;
mod publisher;
mod state;
mod topics;
mod utils;

use log::{error, info, warn};
use tokio::sync::mpsc;

use bluetooth::{scan_for_ruuvitags, ScanEvent};
use config::BridgeConfig;
use publisher::Bridge;

const OBSERVATION_QUEUE: usize = 256;

async fn main_loop(config: BridgeConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting RuuviTag MQTT bridge");

    let (mqtt_publisher, eventloop) = mqtt::connect(&config)?;
    tokio::spawn(mqtt::drive_event_loop(eventloop));

    // Every observation goes through one channel so the store sees them one at a time
    let (tx, mut rx) = mpsc::channel::<ScanEvent>(OBSERVATION_QUEUE);
    let scanner = tokio::spawn(scan_for_ruuvitags(tx));

    let mut bridge = Bridge::new(mqtt_publisher, config.pressure_offset);
    if config.pressure_offset != 0.0 {
        info!("Applying pressure offset of {} hPa", config.pressure_offset);
    }

    while let Some((path, observation)) = rx.recv().await {
        bridge.handle_observation(&path, observation);
    }

    info!("Tracked {} devices", bridge.store().len());
    match scanner.await? {
        Ok(()) => {
            warn!("Bluetooth discovery ended");
            Ok(())
        }
        Err(e) => {
            error!("Bluetooth scan failed: {}", e);
            Err(e.into())
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match BridgeConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    // Handle Ctrl+C gracefully
    let (tx, mut rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            // Keep running without signal handling
            std::future::pending::<()>().await;
        }
        let _ = tx.send(());
    });

    // Run main loop or wait for shutdown signal
    tokio::select! {
        result = main_loop(config) => {
            match result {
                Ok(_) => info!("Bridge stopped"),
                Err(e) => error!("Fatal error: {}", e),
            }
        }
        _ = &mut rx => {
            info!("Program terminated by user. Exiting gracefully.");
        }
    }

    Ok(())
}
