//! Ocean Optics spectrometers through the SeaBreeze shared library.
//!
//! The library is loaded at runtime with `libloading` and driven through its
//! legacy `SeaBreezeWrapper` C API, which addresses devices by index.
//! Every call reports failure through an `int *error_code` out-parameter.

use std::ffi::CStr;
use std::os::raw::{c_char, c_double, c_int, c_long, c_ulong};
use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};

use super::{DeviceError, DeviceInfo, Spectrometer};

/// Highest device index the wrapper API supports.
const MAX_DEVICES: c_int = 32;
const ERROR_SUCCESS: c_int = 0;
const STRING_BUFFER_LEN: usize = 64;

type OpenFn = unsafe extern "C" fn(c_int, *mut c_int) -> c_int;
type CloseFn = unsafe extern "C" fn(c_int, *mut c_int) -> c_int;
type StringFn = unsafe extern "C" fn(c_int, *mut c_int, *mut c_char, c_int) -> c_int;
type LengthFn = unsafe extern "C" fn(c_int, *mut c_int) -> c_int;
type SpectrumFn = unsafe extern "C" fn(c_int, *mut c_int, *mut c_double, c_int) -> c_int;
type SetIntegrationFn = unsafe extern "C" fn(c_int, *mut c_int, c_ulong);
type MinIntegrationFn = unsafe extern "C" fn(c_int, *mut c_int) -> c_long;
type ErrorStringFn = unsafe extern "C" fn(c_int, *mut c_char, c_int) -> c_int;

// ---------------------------------------------------------------------------
// Thin safe layer over the wrapper API
// ---------------------------------------------------------------------------

struct Driver {
    lib: Library,
}

impl Driver {
    fn load(path: &Path) -> Result<Self, DeviceError> {
        // SAFETY: loading runs the library's initialisers; SeaBreeze has no
        // unusual requirements there.
        let lib = unsafe { Library::new(path) }.map_err(|source| DeviceError::LibraryLoad {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("loaded SeaBreeze from {}", path.display());
        Ok(Driver { lib })
    }

    fn symbol<T>(&self, name: &'static str) -> Result<Symbol<'_, T>, DeviceError> {
        // SAFETY: every call site pairs `name` with the signature declared in
        // SeaBreezeWrapper.h.
        unsafe { self.lib.get::<T>(name.as_bytes()) }.map_err(|e| DeviceError::Driver {
            call: name,
            code: -1,
            message: e.to_string(),
        })
    }

    fn check(&self, call: &'static str, code: c_int) -> Result<(), DeviceError> {
        if code == ERROR_SUCCESS {
            return Ok(());
        }
        Err(DeviceError::Driver {
            call,
            code,
            message: self.error_string(code),
        })
    }

    fn error_string(&self, code: c_int) -> String {
        let Ok(f) = self.symbol::<ErrorStringFn>("seabreeze_get_error_string") else {
            return "unknown error".to_string();
        };
        let mut buf = [0 as c_char; STRING_BUFFER_LEN];
        // SAFETY: the buffer length passed matches the buffer.
        unsafe { f(code, buf.as_mut_ptr(), buf.len() as c_int) };
        c_buffer_to_string(&buf)
    }

    fn open(&self, index: c_int) -> Result<(), DeviceError> {
        let f = self.symbol::<OpenFn>("seabreeze_open_spectrometer")?;
        let mut err = ERROR_SUCCESS;
        // SAFETY: `err` outlives the call.
        let rc = unsafe { f(index, &mut err) };
        if rc != 0 && err == ERROR_SUCCESS {
            err = rc;
        }
        self.check("seabreeze_open_spectrometer", err)
    }

    fn close(&self, index: c_int) -> Result<(), DeviceError> {
        let f = self.symbol::<CloseFn>("seabreeze_close_spectrometer")?;
        let mut err = ERROR_SUCCESS;
        // SAFETY: `err` outlives the call.
        unsafe { f(index, &mut err) };
        self.check("seabreeze_close_spectrometer", err)
    }

    fn string(&self, call: &'static str, index: c_int) -> Result<String, DeviceError> {
        let f = self.symbol::<StringFn>(call)?;
        let mut err = ERROR_SUCCESS;
        let mut buf = [0 as c_char; STRING_BUFFER_LEN];
        // SAFETY: the buffer length passed matches the buffer.
        unsafe { f(index, &mut err, buf.as_mut_ptr(), buf.len() as c_int) };
        self.check(call, err)?;
        Ok(c_buffer_to_string(&buf))
    }

    fn info(&self, index: c_int) -> Result<DeviceInfo, DeviceError> {
        Ok(DeviceInfo {
            model: self.string("seabreeze_get_model", index)?,
            serial: self.string("seabreeze_get_serial_number", index)?,
        })
    }

    fn spectrum_length(&self, index: c_int) -> Result<usize, DeviceError> {
        let f = self.symbol::<LengthFn>("seabreeze_get_formatted_spectrum_length")?;
        let mut err = ERROR_SUCCESS;
        // SAFETY: `err` outlives the call.
        let len = unsafe { f(index, &mut err) };
        self.check("seabreeze_get_formatted_spectrum_length", err)?;
        usize::try_from(len).map_err(|_| DeviceError::Read(format!("invalid spectrum length {len}")))
    }

    fn fill(&self, call: &'static str, index: c_int, out: &mut [f64]) -> Result<(), DeviceError> {
        let f = self.symbol::<SpectrumFn>(call)?;
        let mut err = ERROR_SUCCESS;
        // SAFETY: the length passed matches `out`.
        let written = unsafe { f(index, &mut err, out.as_mut_ptr(), out.len() as c_int) };
        self.check(call, err)?;
        if written as usize != out.len() {
            return Err(DeviceError::Read(format!(
                "{call} wrote {written} of {} values",
                out.len()
            )));
        }
        Ok(())
    }

    fn min_integration_time(&self, index: c_int) -> Result<u32, DeviceError> {
        let f = self.symbol::<MinIntegrationFn>("seabreeze_get_min_integration_time_microsec")?;
        let mut err = ERROR_SUCCESS;
        // SAFETY: `err` outlives the call.
        let micros = unsafe { f(index, &mut err) };
        self.check("seabreeze_get_min_integration_time_microsec", err)?;
        Ok(u32::try_from(micros).unwrap_or(0))
    }

    fn set_integration_time(&self, index: c_int, micros: u32) -> Result<(), DeviceError> {
        let f = self.symbol::<SetIntegrationFn>("seabreeze_set_integration_time_microsec")?;
        let mut err = ERROR_SUCCESS;
        // SAFETY: `err` outlives the call.
        unsafe { f(index, &mut err, c_ulong::from(micros)) };
        self.check("seabreeze_set_integration_time_microsec", err)
    }
}

fn c_buffer_to_string(buf: &[c_char]) -> String {
    let bytes: Vec<u8> = buf.iter().map(|&c| c as u8).collect();
    match CStr::from_bytes_until_nul(&bytes) {
        Ok(s) => s.to_string_lossy().trim().to_string(),
        Err(_) => String::from_utf8_lossy(&bytes).trim().to_string(),
    }
}

/// Probe device indices until one fails to open.
fn probe(driver: &Driver) -> Vec<(c_int, DeviceInfo)> {
    let mut found = Vec::new();
    for index in 0..MAX_DEVICES {
        if driver.open(index).is_err() {
            break;
        }
        match driver.info(index) {
            Ok(info) => found.push((index, info)),
            Err(e) => log::warn!("spectrometer {index}: could not read identity: {e}"),
        }
        if let Err(e) = driver.close(index) {
            log::warn!("spectrometer {index}: close failed: {e}");
        }
    }
    found
}

/// List every spectrometer the SeaBreeze library at `library` can see.
pub fn list_devices(library: &Path) -> Result<Vec<DeviceInfo>, DeviceError> {
    let driver = Driver::load(library)?;
    Ok(probe(&driver).into_iter().map(|(_, info)| info).collect())
}

/// Wavelength axis and minimum integration time of an open device.
fn calibration(driver: &Driver, index: c_int) -> Result<(Vec<f64>, u32), DeviceError> {
    let len = driver.spectrum_length(index)?;
    let mut wavelengths = vec![0.0; len];
    driver.fill("seabreeze_get_wavelengths", index, &mut wavelengths)?;
    let min_integration_us = driver.min_integration_time(index)?;
    Ok((wavelengths, min_integration_us))
}

/// Close a device that failed setup; the handle has no `Drop` yet.
fn close_on_error<T>(
    result: Result<T, DeviceError>,
    close: impl FnOnce() -> Result<(), DeviceError>,
) -> Result<T, DeviceError> {
    if result.is_err() {
        if let Err(e) = close() {
            log::warn!("close after failed setup: {e}");
        }
    }
    result
}

// ---------------------------------------------------------------------------
// Spectrometer handle
// ---------------------------------------------------------------------------

pub struct SeaBreezeSpectrometer {
    driver: Driver,
    index: c_int,
    info: DeviceInfo,
    wavelengths: Vec<f64>,
    min_integration_us: u32,
    library: PathBuf,
}

impl SeaBreezeSpectrometer {
    /// Open the device with `serial`, or the first one found.
    pub fn open(library: &Path, serial: Option<&str>) -> Result<Self, DeviceError> {
        let driver = Driver::load(library)?;
        let devices = probe(&driver);
        let (index, info) = devices
            .into_iter()
            .find(|(_, info)| serial.map_or(true, |s| info.serial == s))
            .ok_or_else(|| DeviceError::NotFound(serial.map(str::to_string)))?;

        driver.open(index)?;
        let (wavelengths, min_integration_us) =
            close_on_error(calibration(&driver, index), || driver.close(index))?;
        let len = wavelengths.len();

        log::info!(
            "opened {info} via {} ({len} pixels, min integration {min_integration_us} us)",
            library.display()
        );
        Ok(SeaBreezeSpectrometer {
            driver,
            index,
            info,
            wavelengths,
            min_integration_us,
            library: library.to_path_buf(),
        })
    }
}

impl Spectrometer for SeaBreezeSpectrometer {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }

    fn intensities(&mut self) -> Result<Vec<f64>, DeviceError> {
        let mut out = vec![0.0; self.wavelengths.len()];
        self.driver
            .fill("seabreeze_get_formatted_spectrum", self.index, &mut out)
            .map_err(|e| DeviceError::Read(e.to_string()))?;
        Ok(out)
    }

    fn set_integration_time_micros(&mut self, micros: u32) -> Result<(), DeviceError> {
        if micros < self.min_integration_us {
            return Err(DeviceError::InvalidIntegrationTime {
                requested: micros,
                minimum: self.min_integration_us,
            });
        }
        self.driver.set_integration_time(self.index, micros)
    }
}

impl Drop for SeaBreezeSpectrometer {
    fn drop(&mut self) {
        match self.driver.close(self.index) {
            Ok(()) => log::info!("closed {} ({})", self.info, self.library.display()),
            Err(e) => log::warn!("failed to close {}: {e}", self.info),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn failed_setup_closes_device() {
        let closed = Cell::new(0);
        let close = || {
            closed.set(closed.get() + 1);
            Ok(())
        };
        let failed: Result<u32, _> = close_on_error(
            Err(DeviceError::Read("no wavelengths".to_string())),
            close,
        );
        assert!(matches!(failed, Err(DeviceError::Read(_))));
        assert_eq!(closed.get(), 1);

        let ok = close_on_error(Ok(7u32), || {
            closed.set(closed.get() + 1);
            Ok(())
        });
        assert_eq!(ok.unwrap(), 7);
        assert_eq!(closed.get(), 1);
    }

    #[test]
    fn close_failure_keeps_setup_error() {
        let result: Result<(), _> = close_on_error(
            Err(DeviceError::Read("timeout".to_string())),
            || {
                Err(DeviceError::Driver {
                    call: "seabreeze_close_spectrometer",
                    code: 1,
                    message: "busy".to_string(),
                })
            },
        );
        assert!(matches!(result, Err(DeviceError::Read(ref m)) if m == "timeout"));
    }

    #[test]
    fn c_strings_stop_at_nul() {
        let mut buf = [0 as c_char; 8];
        for (dst, src) in buf.iter_mut().zip(b"USB4000") {
            *dst = *src as c_char;
        }
        assert_eq!(c_buffer_to_string(&buf), "USB4000");
    }
}
