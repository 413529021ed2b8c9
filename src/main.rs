mod app;
mod cli;
mod command;
mod config;
mod data;
mod device;
mod state;
mod ui;

use anyhow::{anyhow, Context, Result};
use app::LiveViewApp;
use clap::Parser;
use cli::Cli;
use config::ViewerConfig;
use eframe::egui;

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_level()))
        .init();

    let mut config = ViewerConfig::load(cli.config.as_deref())?;
    cli.apply_to(&mut config);

    let backend = cli.backend();

    if cli.list_devices {
        let devices = device::list_devices(&backend).context("Failed to list spectrometers")?;
        if devices.is_empty() {
            println!("no spectrometers found");
        }
        for info in devices {
            println!("{info}");
        }
        return Ok(());
    }

    let device = device::open(&backend, cli.serial.as_deref()).context("Failed to open spectrometer")?;
    let app = LiveViewApp::new(device, config).context("Failed to configure spectrometer")?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Spectra Live – Spectrometer Viewer",
        options,
        Box::new(|_cc| Ok(Box::new(app))),
    )
    .map_err(|e| anyhow!("{e}"))?;

    log::info!("device closed");
    Ok(())
}
