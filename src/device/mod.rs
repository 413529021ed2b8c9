/// Device layer: the spectrometer driver surface the viewer consumes.
///
/// ```text
///   Backend ──► list_devices()  →  Vec<DeviceInfo>
///           └─► open(serial)    →  Box<dyn Spectrometer>
///                                     │ wavelengths()
///                                     │ intensities()        (blocking read)
///                                     │ set_integration_time_micros()
///                                     ▼
///                                  Drop closes the handle
/// ```
pub mod seabreeze;
pub mod simulated;

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::data::model::Spectrum;

pub use seabreeze::SeaBreezeSpectrometer;
pub use simulated::SimulatedSpectrometer;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no spectrometer found{}", serial_suffix(.0))]
    NotFound(Option<String>),
    #[error("failed to load driver library {}: {source}", .path.display())]
    LibraryLoad {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },
    #[error("driver call {call} failed (code {code}): {message}")]
    Driver {
        call: &'static str,
        code: i32,
        message: String,
    },
    #[error("device read failed: {0}")]
    Read(String),
    #[error("integration time {requested} us is below the device minimum of {minimum} us")]
    InvalidIntegrationTime { requested: u32, minimum: u32 },
}

fn serial_suffix(serial: &Option<String>) -> String {
    serial
        .as_ref()
        .map(|s| format!(" with serial '{s}'"))
        .unwrap_or_default()
}

/// Identity of a connected spectrometer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub model: String,
    pub serial: String,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.model, self.serial)
    }
}

/// An open spectrometer handle.
///
/// Reads are blocking; the handle is released when the value is dropped.
pub trait Spectrometer {
    fn info(&self) -> &DeviceInfo;

    /// Calibrated wavelength axis, fixed for the lifetime of the handle.
    fn wavelengths(&self) -> &[f64];

    /// Acquire one spectrum of raw detector counts.
    fn intensities(&mut self) -> Result<Vec<f64>, DeviceError>;

    fn set_integration_time_micros(&mut self, micros: u32) -> Result<(), DeviceError>;

    /// Acquire one spectrum paired with the wavelength axis.
    fn read_spectrum(&mut self) -> Result<Spectrum, DeviceError> {
        let intensities = self.intensities()?;
        let wavelengths = self.wavelengths().to_vec();
        if intensities.len() != wavelengths.len() {
            return Err(DeviceError::Read(format!(
                "got {} intensities for {} wavelengths",
                intensities.len(),
                wavelengths.len()
            )));
        }
        Ok(Spectrum {
            wavelengths,
            intensities,
        })
    }
}

// ---------------------------------------------------------------------------
// Backend selection
// ---------------------------------------------------------------------------

/// Where spectrometers come from.
#[derive(Debug, Clone, PartialEq)]
pub enum Backend {
    /// Ocean Optics hardware through the SeaBreeze shared library.
    SeaBreeze { library: PathBuf },
    /// Synthetic lamp + absorber, no hardware needed.
    Simulated,
}

impl Backend {
    /// SeaBreeze backend using the platform's default library file name.
    pub fn seabreeze_default() -> Self {
        Backend::SeaBreeze {
            library: PathBuf::from(libloading::library_filename("seabreeze")),
        }
    }
}

/// List every spectrometer the backend can see.
pub fn list_devices(backend: &Backend) -> Result<Vec<DeviceInfo>, DeviceError> {
    match backend {
        Backend::SeaBreeze { library } => seabreeze::list_devices(library),
        Backend::Simulated => Ok(vec![SimulatedSpectrometer::device_info()]),
    }
}

/// Open the spectrometer with the given serial number, or the first
/// available one when `serial` is `None`.
pub fn open(backend: &Backend, serial: Option<&str>) -> Result<Box<dyn Spectrometer>, DeviceError> {
    match backend {
        Backend::SeaBreeze { library } => {
            let device = SeaBreezeSpectrometer::open(library, serial)?;
            Ok(Box::new(device))
        }
        Backend::Simulated => {
            let info = SimulatedSpectrometer::device_info();
            if let Some(s) = serial {
                if s != info.serial {
                    return Err(DeviceError::NotFound(Some(s.to_string())));
                }
            }
            Ok(Box::new(SimulatedSpectrometer::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_backend_lists_and_opens() {
        let devices = list_devices(&Backend::Simulated).unwrap();
        assert_eq!(devices.len(), 1);

        let mut dev = open(&Backend::Simulated, None).unwrap();
        let spectrum = dev.read_spectrum().unwrap();
        assert_eq!(spectrum.intensities.len(), dev.wavelengths().len());
        assert_eq!(dev.info(), &devices[0]);
    }

    #[test]
    fn unknown_serial_is_not_found() {
        let err = open(&Backend::Simulated, Some("NOPE1234")).err().unwrap();
        assert!(matches!(err, DeviceError::NotFound(Some(ref s)) if s == "NOPE1234"));
        assert!(err.to_string().contains("NOPE1234"));
    }

    #[test]
    fn missing_library_fails_to_load() {
        let backend = Backend::SeaBreeze {
            library: PathBuf::from("/nonexistent/libseabreeze-missing.so"),
        };
        let err = list_devices(&backend).unwrap_err();
        assert!(matches!(err, DeviceError::LibraryLoad { .. }));
    }
}
