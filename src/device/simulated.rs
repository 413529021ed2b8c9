use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{DeviceError, DeviceInfo, Spectrometer};

const PIXELS: usize = 2048;
const WAVELENGTH_START: f64 = 340.0;
const WAVELENGTH_END: f64 = 1025.0;
/// 14-bit detector.
const SATURATION: f64 = 16383.0;
const DARK_COUNTS: f64 = 25.0;
const MIN_INTEGRATION_US: u32 = 1000;
/// Lamp peak counts at this integration time.
const REFERENCE_INTEGRATION_US: f64 = 4000.0;

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Synthetic spectrometer: a broadband lamp seen through a sample whose
/// absorption lines slowly fade in and out.
///
/// The absorber starts fully transparent, so a blank captured right after
/// start-up is clean and later readings show measurable absorbance.
pub struct SimulatedSpectrometer {
    info: DeviceInfo,
    wavelengths: Vec<f64>,
    integration_us: u32,
    reads: u64,
    rng: StdRng,
    /// (centre nm, sigma nm, peak absorbance)
    absorber: Vec<(f64, f64, f64)>,
    lamp: Vec<(f64, f64, f64)>,
    noise: f64,
}

impl SimulatedSpectrometer {
    pub fn new() -> Self {
        Self::with_seed(42)
    }

    pub fn with_seed(seed: u64) -> Self {
        let step = (WAVELENGTH_END - WAVELENGTH_START) / (PIXELS - 1) as f64;
        SimulatedSpectrometer {
            info: Self::device_info(),
            wavelengths: (0..PIXELS)
                .map(|i| WAVELENGTH_START + i as f64 * step)
                .collect(),
            integration_us: REFERENCE_INTEGRATION_US as u32,
            reads: 0,
            rng: StdRng::seed_from_u64(seed),
            absorber: vec![(520.0, 18.0, 0.9), (610.0, 30.0, 0.4)],
            lamp: vec![(580.0, 140.0, 3000.0), (820.0, 90.0, 900.0)],
            noise: 6.0,
        }
    }

    /// Disable detector noise, for reproducible readings.
    pub fn noiseless(mut self) -> Self {
        self.noise = 0.0;
        self
    }

    pub fn device_info() -> DeviceInfo {
        DeviceInfo {
            model: "SIMULATED".to_string(),
            serial: "SIM00001".to_string(),
        }
    }

    /// Absorber strength in [0, 1] for the current read.
    fn absorber_depth(&self) -> f64 {
        let phase = self.reads as f64 * 0.01;
        0.5 * (1.0 - phase.cos())
    }

    fn gauss_noise(&mut self) -> f64 {
        if self.noise == 0.0 {
            return 0.0;
        }
        // Box-Muller
        let u1: f64 = self.rng.gen::<f64>().max(1e-15);
        let u2: f64 = self.rng.gen();
        self.noise * (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }
}

impl Spectrometer for SimulatedSpectrometer {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }

    fn intensities(&mut self) -> Result<Vec<f64>, DeviceError> {
        let scale = self.integration_us as f64 / REFERENCE_INTEGRATION_US;
        let depth = self.absorber_depth();
        self.reads += 1;

        let signal: Vec<f64> = self
            .wavelengths
            .iter()
            .map(|&wl| {
                let lamp: f64 = self.lamp.iter().map(|&(mu, s, a)| gaussian(wl, mu, s, a)).sum();
                let absorbance: f64 = self
                    .absorber
                    .iter()
                    .map(|&(mu, s, a)| gaussian(wl, mu, s, a * depth))
                    .sum();
                lamp * scale * 10f64.powf(-absorbance)
            })
            .collect();
        let mut out = Vec::with_capacity(signal.len());
        for counts in signal {
            let noisy = DARK_COUNTS + counts + self.gauss_noise();
            out.push(noisy.clamp(0.0, SATURATION));
        }
        Ok(out)
    }

    fn set_integration_time_micros(&mut self, micros: u32) -> Result<(), DeviceError> {
        if micros < MIN_INTEGRATION_US {
            return Err(DeviceError::InvalidIntegrationTime {
                requested: micros,
                minimum: MIN_INTEGRATION_US,
            });
        }
        log::debug!("simulated integration time set to {micros} us");
        self.integration_us = micros;
        Ok(())
    }
}
