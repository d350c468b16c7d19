use std::path::PathBuf;

use anyhow::Context as _;
use btleplug::api::Manager as _;
use btleplug::platform::Manager;
use clap::Parser;
use log::debug;
#[cfg(not(unix))]
use log::error;
use uuid::Uuid;

mod config;
mod manager;
mod messages;
mod scanner;

/// Scan for Bluetooth Low Energy peripherals and print every advertisement seen.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format for discovered peripherals
    #[arg(short, long, value_enum, default_value_t)]
    format: messages::RecordFormat,

    /// Only report peripherals advertising this service (repeatable)
    #[arg(short, long = "service")]
    services: Vec<Uuid>,

    /// Also report repeat advertisements from known peripherals
    #[arg(long)]
    updates: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    exit_on_interrupt().context("installing interrupt handler")?;
    pretty_env_logger::init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => config::AppConfig::load(path)?,
        None => config::AppConfig::default(),
    };
    let scan = config.scan();
    debug!("Scan config: {:?}", scan);

    let services = if args.services.is_empty() {
        scan.services.unwrap_or_default()
    } else {
        args.services
    };
    let report_updates = args.updates || scan.report_updates.unwrap_or(false);

    let bt_manager = Manager::new()
        .await
        .context("opening platform Bluetooth manager")?;
    let adapters = bt_manager.adapters().await?;
    let central = manager::pick_adapter(adapters, scan.adapter.unwrap_or(0)).await?;

    println!("Scanning for BLE devices...");

    let scanner = scanner::Scanner::new(central.clone(), services, args.format, std::io::stdout());
    let mut core = manager::Manager::new(central, scanner, report_updates);
    core.run_loop().await
}

/// Exits with status 0 on Ctrl-C, skipping any cleanup. The signal is
/// registered before returning, so an interrupt during startup exits cleanly.
#[cfg(unix)]
fn exit_on_interrupt() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    tokio::spawn(async move {
        interrupt.recv().await;
        std::process::exit(0);
    });
    Ok(())
}

#[cfg(not(unix))]
fn exit_on_interrupt() -> std::io::Result<()> {
    tokio::spawn(async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => std::process::exit(0),
            Err(err) => error!("Unable to listen for interrupt: {:?}", err),
        }
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_flags() {
        let args = Args::try_parse_from(["blescan"]).unwrap();
        assert!(args.config.is_none());
        assert_eq!(args.format, messages::RecordFormat::Text);
        assert!(args.services.is_empty());
        assert!(!args.updates);
    }

    #[test]
    fn test_flags() {
        let args = Args::try_parse_from([
            "blescan",
            "--format",
            "json",
            "-s",
            "0000180f-0000-1000-8000-00805f9b34fb",
            "--service",
            "0000180a-0000-1000-8000-00805f9b34fb",
            "--updates",
        ])
        .unwrap();
        assert_eq!(args.format, messages::RecordFormat::Json);
        assert_eq!(args.services.len(), 2);
        assert!(args.updates);
    }

    #[tokio::test]
    async fn test_interrupt_handler_registers() {
        exit_on_interrupt().unwrap();
    }

    #[test]
    fn test_bad_service() {
        assert!(Args::try_parse_from(["blescan", "-s", "battery"]).is_err());
    }
}
