use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// DisplayMode – what the live line shows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayMode {
    #[default]
    Intensity,
    Transmittance,
    Absorbance,
}

impl DisplayMode {
    pub const ALL: [DisplayMode; 3] = [
        DisplayMode::Intensity,
        DisplayMode::Transmittance,
        DisplayMode::Absorbance,
    ];

    /// Axis label, as shown on the plot.
    pub fn label(self) -> &'static str {
        match self {
            DisplayMode::Intensity => "Intensity",
            DisplayMode::Transmittance => "Transmittance",
            DisplayMode::Absorbance => "Absorbance",
        }
    }

    /// Lowercase name used in file names and exported metadata.
    pub fn file_stem(self) -> &'static str {
        match self {
            DisplayMode::Intensity => "intensity",
            DisplayMode::Transmittance => "transmittance",
            DisplayMode::Absorbance => "absorbance",
        }
    }

    /// Whether this mode divides by the blank reference.
    pub fn needs_blank(self) -> bool {
        !matches!(self, DisplayMode::Intensity)
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Spectrum – one reading from the device
// ---------------------------------------------------------------------------

/// A single intensity-vs-wavelength reading.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    /// Wavelength axis in nm.
    pub wavelengths: Vec<f64>,
    /// Detector counts – same length as `wavelengths`.
    pub intensities: Vec<f64>,
}

// ---------------------------------------------------------------------------
// Peak – an extremum marker
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeakKind {
    Max,
    Min,
}

/// Location and value of an extremum in a series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub index: usize,
    pub wavelength: f64,
    pub value: f64,
}

impl fmt::Display for Peak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4} @ {:.2} nm", self.value, self.wavelength)
    }
}

// ---------------------------------------------------------------------------
// Absorption – series derived from the blank reference
// ---------------------------------------------------------------------------

/// Transmittance and absorbance of one reading against the stored blank.
///
/// Only wavelengths where the blank exceeds the intensity threshold are kept,
/// so every vector except `mask` and `blank` has `wavelengths_masked.len()`
/// entries.
#[derive(Debug, Clone, PartialEq)]
pub struct Absorption {
    pub mask: Vec<bool>,
    pub wavelengths_masked: Vec<f64>,
    pub transmittance: Vec<f64>,
    pub absorbance: Vec<f64>,
    pub minimum_transmittance: Option<Peak>,
    pub maximum_absorbance: Option<Peak>,
    pub blank: Vec<f64>,
}

// ---------------------------------------------------------------------------
// Frame – everything computed in one refresh
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Mode active when the frame was acquired.
    pub mode: DisplayMode,
    pub integration_time_us: u32,
    pub wavelengths: Vec<f64>,
    pub intensities: Vec<f64>,
    pub maximum_intensity: Option<Peak>,
    /// Present only when a blank reference was stored.
    pub absorption: Option<Absorption>,
}

impl Frame {
    /// The (x, y) series drawn as the live line in `mode`.
    ///
    /// Ratio modes yield empty slices when the frame has no absorption data.
    pub fn series(&self, mode: DisplayMode) -> (&[f64], &[f64]) {
        match (mode, &self.absorption) {
            (DisplayMode::Intensity, _) => {
                (self.wavelengths.as_slice(), self.intensities.as_slice())
            }
            (DisplayMode::Transmittance, Some(abs)) => {
                (abs.wavelengths_masked.as_slice(), abs.transmittance.as_slice())
            }
            (DisplayMode::Absorbance, Some(abs)) => {
                (abs.wavelengths_masked.as_slice(), abs.absorbance.as_slice())
            }
            (_, None) => (&[][..], &[][..]),
        }
    }

    /// The extremum marked by the peak finder in `mode`.
    pub fn marker(&self, mode: DisplayMode) -> Option<Peak> {
        match mode {
            DisplayMode::Intensity => self.maximum_intensity,
            DisplayMode::Transmittance => {
                self.absorption.as_ref().and_then(|a| a.minimum_transmittance)
            }
            DisplayMode::Absorbance => self.absorption.as_ref().and_then(|a| a.maximum_absorbance),
        }
    }
}

// ---------------------------------------------------------------------------
// Export records
// ---------------------------------------------------------------------------

/// A metadata cell attached to an exported series.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => write!(f, "{s}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        MetadataValue::String(s.to_string())
    }
}

impl From<i64> for MetadataValue {
    fn from(i: i64) -> Self {
        MetadataValue::Integer(i)
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        MetadataValue::Float(v)
    }
}

/// One exported row: an x/y series plus its metadata columns.
///
/// This is the records layout the spectral viewer loads (`x`, `y` and any
/// other column treated as metadata).
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRecord {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub metadata: BTreeMap<String, MetadataValue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_absorption() -> Frame {
        Frame {
            mode: DisplayMode::Intensity,
            integration_time_us: 4000,
            wavelengths: vec![400.0, 500.0, 600.0],
            intensities: vec![10.0, 20.0, 30.0],
            maximum_intensity: Some(Peak { index: 2, wavelength: 600.0, value: 30.0 }),
            absorption: Some(Absorption {
                mask: vec![false, true, true],
                wavelengths_masked: vec![500.0, 600.0],
                transmittance: vec![0.5, 0.75],
                absorbance: vec![0.30103, 0.12494],
                minimum_transmittance: Some(Peak { index: 0, wavelength: 500.0, value: 0.5 }),
                maximum_absorbance: Some(Peak { index: 0, wavelength: 500.0, value: 0.30103 }),
                blank: vec![0.5, 40.0, 40.0],
            }),
        }
    }

    #[test]
    fn series_follows_mode() {
        let frame = frame_with_absorption();
        let (x, y) = frame.series(DisplayMode::Intensity);
        assert_eq!(x.len(), 3);
        assert_eq!(y, &[10.0, 20.0, 30.0]);

        let (x, y) = frame.series(DisplayMode::Transmittance);
        assert_eq!(x, &[500.0, 600.0]);
        assert_eq!(y, &[0.5, 0.75]);

        let (_, y) = frame.series(DisplayMode::Absorbance);
        assert_eq!(y.len(), 2);
    }

    #[test]
    fn ratio_series_empty_without_blank() {
        let mut frame = frame_with_absorption();
        frame.absorption = None;
        let (x, y) = frame.series(DisplayMode::Absorbance);
        assert!(x.is_empty() && y.is_empty());
        assert_eq!(frame.marker(DisplayMode::Transmittance), None);
    }

    #[test]
    fn marker_picks_extremum_for_mode() {
        let frame = frame_with_absorption();
        assert_eq!(frame.marker(DisplayMode::Intensity).unwrap().wavelength, 600.0);
        assert_eq!(frame.marker(DisplayMode::Transmittance).unwrap().value, 0.5);
        assert_eq!(frame.marker(DisplayMode::Absorbance).unwrap().index, 0);
    }

    #[test]
    fn mode_names() {
        assert_eq!(DisplayMode::Absorbance.file_stem(), "absorbance");
        assert_eq!(DisplayMode::Transmittance.to_string(), "Transmittance");
        assert!(!DisplayMode::Intensity.needs_blank());
        assert!(DisplayMode::Absorbance.needs_blank());
    }
}
