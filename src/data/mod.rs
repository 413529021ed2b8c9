/// Data layer: core types, per-refresh analysis, and export.
///
/// Architecture:
/// ```text
///   device reading (Spectrum) + stored blank
///        │
///        ▼
///   ┌──────────┐
///   │ analysis  │  mask → transmittance → absorbance, argmax/argmin
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  Frame    │  everything one refresh produced
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  export   │  Frame → records → .json / .csv / .parquet, plot → .png
///   └──────────┘
/// ```

pub mod analysis;
pub mod export;
pub mod model;
