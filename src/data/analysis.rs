use thiserror::Error;

use super::model::{Absorption, DisplayMode, Frame, Peak, PeakKind, Spectrum};

/// Blank pixels at or below this count are excluded from the ratio.
pub const INTENSITY_THRESHOLD: f64 = 1.0;

#[derive(Debug, Error, PartialEq)]
pub enum AnalysisError {
    #[error("length mismatch: {what} has {actual} points, expected {expected}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}

fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<(), AnalysisError> {
    if expected != actual {
        return Err(AnalysisError::LengthMismatch {
            what,
            expected,
            actual,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Extrema
// ---------------------------------------------------------------------------

/// Linear-scan argmax / argmin over `y`, reporting the matching `x`.
///
/// The first occurrence of the extreme value wins. NaN entries are skipped;
/// `None` is returned when nothing remains.
pub fn find_peak(x: &[f64], y: &[f64], kind: PeakKind) -> Option<Peak> {
    let mut best: Option<usize> = None;
    for (i, &v) in y.iter().enumerate().take(x.len()) {
        if v.is_nan() {
            continue;
        }
        let better = match best {
            None => true,
            Some(b) => match kind {
                PeakKind::Max => v > y[b],
                PeakKind::Min => v < y[b],
            },
        };
        if better {
            best = Some(i);
        }
    }
    best.map(|index| Peak {
        index,
        wavelength: x[index],
        value: y[index],
    })
}

// ---------------------------------------------------------------------------
// Ratio series
// ---------------------------------------------------------------------------

/// Which blank pixels are bright enough to divide by.
pub fn blank_mask(blank: &[f64], threshold: f64) -> Vec<bool> {
    blank.iter().map(|&b| b > threshold).collect()
}

/// Element-wise `sample / blank`.
pub fn transmittance(sample: &[f64], blank: &[f64]) -> Vec<f64> {
    sample.iter().zip(blank).map(|(&s, &b)| s / b).collect()
}

/// Element-wise `-log10(t)`.
pub fn absorbance(transmittance: &[f64]) -> Vec<f64> {
    transmittance.iter().map(|&t| -t.log10()).collect()
}

impl Absorption {
    /// Derive transmittance and absorbance for the pixels where `blank`
    /// exceeds `threshold`.
    pub fn compute(
        wavelengths: &[f64],
        sample: &[f64],
        blank: &[f64],
        threshold: f64,
    ) -> Result<Self, AnalysisError> {
        check_len("sample", wavelengths.len(), sample.len())?;
        check_len("blank", wavelengths.len(), blank.len())?;

        let mask = blank_mask(blank, threshold);
        let keep = |v: &[f64]| -> Vec<f64> {
            v.iter()
                .zip(&mask)
                .filter(|&(_, &m)| m)
                .map(|(&x, _)| x)
                .collect()
        };
        let wavelengths_masked = keep(wavelengths);
        let transmittance = transmittance(&keep(sample), &keep(blank));
        let absorbance = absorbance(&transmittance);

        let minimum_transmittance = find_peak(&wavelengths_masked, &transmittance, PeakKind::Min);
        let maximum_absorbance = find_peak(&wavelengths_masked, &absorbance, PeakKind::Max);

        Ok(Absorption {
            mask,
            wavelengths_masked,
            transmittance,
            absorbance,
            minimum_transmittance,
            maximum_absorbance,
            blank: blank.to_vec(),
        })
    }
}

impl Frame {
    /// Build the frame for one reading, deriving the ratio series when a
    /// blank reference is present.
    pub fn build(
        mode: DisplayMode,
        spectrum: Spectrum,
        blank: Option<&[f64]>,
        threshold: f64,
        integration_time_us: u32,
    ) -> Result<Self, AnalysisError> {
        check_len("intensities", spectrum.wavelengths.len(), spectrum.intensities.len())?;

        let maximum_intensity =
            find_peak(&spectrum.wavelengths, &spectrum.intensities, PeakKind::Max);
        let absorption = blank
            .map(|b| Absorption::compute(&spectrum.wavelengths, &spectrum.intensities, b, threshold))
            .transpose()?;

        Ok(Frame {
            mode,
            integration_time_us,
            wavelengths: spectrum.wavelengths,
            intensities: spectrum.intensities,
            maximum_intensity,
            absorption,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn peak_first_occurrence_wins() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [0.0, 7.0, 3.0, 7.0, 1.0];
        let p = find_peak(&x, &y, PeakKind::Max).unwrap();
        assert_eq!(p.index, 1);
        assert_eq!(p.wavelength, 2.0);

        let y = [4.0, -2.0, 5.0, -2.0];
        let p = find_peak(&x, &y, PeakKind::Min).unwrap();
        assert_eq!(p.index, 1);
        assert_eq!(p.value, -2.0);
    }

    #[test]
    fn peak_skips_nan_and_handles_empty() {
        let x = [1.0, 2.0, 3.0];
        let y = [f64::NAN, 2.0, 1.0];
        assert_eq!(find_peak(&x, &y, PeakKind::Max).unwrap().index, 1);
        assert_eq!(find_peak(&[], &[], PeakKind::Min), None);
        assert_eq!(find_peak(&x, &[f64::NAN; 3], PeakKind::Max), None);
    }

    #[test]
    fn transmittance_is_ratio_and_absorbance_is_neg_log() {
        let sample = [50.0, 10.0, 100.0];
        let blank = [100.0, 100.0, 100.0];
        let t = transmittance(&sample, &blank);
        assert_eq!(t, vec![0.5, 0.1, 1.0]);
        let a = absorbance(&t);
        assert!(close(a[0], -(0.5f64).log10()));
        assert!(close(a[1], 1.0));
        assert!(close(a[2], 0.0));
    }

    #[test]
    fn absorption_masks_dim_blank_pixels() {
        let wl = [400.0, 450.0, 500.0, 550.0];
        let sample = [5.0, 40.0, 20.0, 80.0];
        let blank = [0.5, 80.0, 1.0, 100.0];
        let abs = Absorption::compute(&wl, &sample, &blank, INTENSITY_THRESHOLD).unwrap();

        assert_eq!(abs.mask, vec![false, true, false, true]);
        assert_eq!(abs.wavelengths_masked, vec![450.0, 550.0]);
        assert_eq!(abs.transmittance, vec![0.5, 0.8]);
        for (t, a) in abs.transmittance.iter().zip(&abs.absorbance) {
            assert!(close(*a, -t.log10()));
        }
        let min_t = abs.minimum_transmittance.unwrap();
        assert_eq!(min_t.wavelength, 450.0);
        assert_eq!(abs.maximum_absorbance.unwrap().wavelength, 450.0);
        assert_eq!(abs.blank, blank.to_vec());
    }

    #[test]
    fn absorption_with_no_usable_blank_is_empty() {
        let wl = [400.0, 500.0];
        let abs = Absorption::compute(&wl, &[3.0, 4.0], &[0.0, 1.0], INTENSITY_THRESHOLD).unwrap();
        assert!(abs.transmittance.is_empty());
        assert_eq!(abs.minimum_transmittance, None);
        assert_eq!(abs.maximum_absorbance, None);
    }

    #[test]
    fn absorption_rejects_length_mismatch() {
        let err = Absorption::compute(&[1.0, 2.0], &[1.0, 2.0], &[1.0], 1.0).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::LengthMismatch { what: "blank", expected: 2, actual: 1 }
        );
    }

    #[test]
    fn frame_without_blank_has_only_intensity() {
        let spectrum = Spectrum {
            wavelengths: vec![400.0, 500.0, 600.0],
            intensities: vec![3.0, 9.0, 9.0],
        };
        let frame = Frame::build(DisplayMode::Intensity, spectrum, None, 1.0, 4000).unwrap();
        assert!(frame.absorption.is_none());
        let peak = frame.maximum_intensity.unwrap();
        assert_eq!(peak.index, 1);
        assert_eq!(peak.wavelength, 500.0);
        assert_eq!(frame.integration_time_us, 4000);
    }

    #[test]
    fn frame_with_blank_derives_series() {
        let spectrum = Spectrum {
            wavelengths: vec![400.0, 500.0],
            intensities: vec![25.0, 100.0],
        };
        let blank = vec![100.0, 100.0];
        let frame =
            Frame::build(DisplayMode::Absorbance, spectrum, Some(&blank), 1.0, 5000).unwrap();
        let abs = frame.absorption.as_ref().unwrap();
        assert_eq!(abs.transmittance, vec![0.25, 1.0]);
        assert_eq!(frame.marker(DisplayMode::Absorbance).unwrap().wavelength, 400.0);
    }
}
