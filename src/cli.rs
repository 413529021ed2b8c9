use std::path::PathBuf;

use clap::Parser;

use crate::config::ViewerConfig;
use crate::device::Backend;

/// spectra-live - live view for Ocean Optics spectrometers
///
/// Plots intensity, transmittance or absorbance against wavelength and
/// refreshes as fast as the device delivers spectra. Press `h` in the window
/// for the key commands.
#[derive(Debug, Parser)]
#[command(name = "spectra-live")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to a JSON configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Use the built-in simulated spectrometer instead of hardware
    #[arg(long)]
    pub simulate: bool,

    /// Open the spectrometer with this serial number (default: first found)
    #[arg(long, value_name = "SERIAL")]
    pub serial: Option<String>,

    /// Path to the SeaBreeze shared library
    #[arg(long, value_name = "PATH")]
    pub library: Option<PathBuf>,

    /// Initial integration time in microseconds
    #[arg(long, value_name = "US")]
    pub integration_time: Option<u32>,

    /// Directory for saved data and figures
    #[arg(long, value_name = "DIR")]
    pub save_dir: Option<PathBuf>,

    /// List connected spectrometers and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn backend(&self) -> Backend {
        if self.simulate {
            return Backend::Simulated;
        }
        match &self.library {
            Some(library) => Backend::SeaBreeze {
                library: library.clone(),
            },
            None => Backend::seabreeze_default(),
        }
    }

    /// Default log filter when `RUST_LOG` is not set.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Command-line flags take precedence over the config file.
    pub fn apply_to(&self, config: &mut ViewerConfig) {
        if let Some(us) = self.integration_time {
            config.integration.default_us = us.max(config.integration.min_us);
        }
        if let Some(dir) = &self.save_dir {
            config.save_dir = dir.clone();
        }
    }
}
