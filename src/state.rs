use std::path::{Path, PathBuf};

use eframe::egui::{ColorImage, Rect};

use crate::command::{help_lines, Command};
use crate::config::ViewerConfig;
use crate::data::export;
use crate::data::model::{DisplayMode, Frame};
use crate::device::Spectrometer;

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// What the window has to do after a command, beyond updating state.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    None,
    /// Capture the window so the plot region can be written to this path.
    Screenshot(PathBuf),
    Quit,
}

/// The full live-view state, independent of rendering.
pub struct LiveView {
    pub config: ViewerConfig,

    /// Which series the live line shows.
    pub mode: DisplayMode,

    /// Blank reference intensities; changed only by capture/clear blank.
    pub blank: Option<Vec<f64>>,

    pub peak_finder: bool,

    /// Upper y-axis limit; the lower limit is always zero.
    pub y_max: f64,

    pub integration_time_us: u32,

    /// Set after a read failure; no reads until resumed.
    pub paused: bool,

    /// Result of the most recent successful refresh.
    pub last_frame: Option<Frame>,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,

    /// Screen rect of the plot, for cropping figure screenshots.
    pub plot_rect: Option<Rect>,

    /// Figure path waiting for its screenshot.
    pending_figure: Option<PathBuf>,
}

impl LiveView {
    pub fn new(config: ViewerConfig) -> Self {
        let mode = DisplayMode::Intensity;
        Self {
            y_max: config.y_range(mode).default,
            integration_time_us: config.integration.default_us,
            config,
            mode,
            blank: None,
            peak_finder: false,
            paused: false,
            last_frame: None,
            status_message: None,
            plot_rect: None,
            pending_figure: None,
        }
    }

    fn report(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        log::info!("{msg}");
        self.status_message = Some(msg);
    }

    fn reject(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        log::warn!("{msg}");
        self.status_message = Some(msg);
    }

    // -----------------------------------------------------------------------
    // Refresh
    // -----------------------------------------------------------------------

    /// Read one spectrum and rebuild the frame. Does nothing while paused.
    pub fn refresh(&mut self, device: &mut dyn Spectrometer) {
        if self.paused {
            return;
        }
        let spectrum = match device.read_spectrum() {
            Ok(s) => s,
            Err(e) => {
                log::error!("{e}");
                self.paused = true;
                self.status_message = Some(format!("{e}; acquisition paused, press r to resume"));
                return;
            }
        };

        let built = Frame::build(
            self.mode,
            spectrum.clone(),
            self.blank.as_deref(),
            self.config.intensity_threshold,
            self.integration_time_us,
        );
        match built {
            Ok(frame) => self.last_frame = Some(frame),
            Err(e) => {
                // Blank from a different pixel count; it can never match again.
                self.blank = None;
                if self.mode.needs_blank() {
                    self.mode = DisplayMode::Intensity;
                    self.reset_y_axis();
                }
                self.reject(format!("blanking data discarded: {e}"));
                self.last_frame = Frame::build(
                    self.mode,
                    spectrum,
                    None,
                    self.config.intensity_threshold,
                    self.integration_time_us,
                )
                .ok();
            }
        }
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    pub fn apply(&mut self, command: Command, device: &mut dyn Spectrometer) -> Effect {
        log::debug!("command {command:?}");
        match command {
            Command::SaveData => {
                let path = export::default_data_path(&self.config.save_dir);
                self.save_data(&path, device);
            }
            Command::SaveDataAs(path) => self.save_data(&path, device),
            Command::SaveFigure => {
                let name = export::figure_file_name(self.mode, self.peak_finder);
                let path = self.config.save_dir.join(name);
                self.pending_figure = Some(path.clone());
                return Effect::Screenshot(path);
            }
            Command::CaptureBlank => self.capture_blank(),
            Command::ClearBlank => self.clear_blank(),
            Command::IncreaseYRange => {
                self.y_max += self.config.y_range(self.mode).step;
                self.report(format!("y range = {}", fmt_range(self.y_max)));
            }
            Command::DecreaseYRange => {
                let range = self.config.y_range(self.mode);
                self.y_max = (self.y_max - range.step).max(range.min);
                self.report(format!("y range = {}", fmt_range(self.y_max)));
            }
            Command::SetMode(mode) => self.set_mode(mode),
            Command::TogglePeakFinder => self.toggle_peak_finder(),
            Command::IncreaseIntegration => {
                let us = self
                    .integration_time_us
                    .saturating_add(self.config.integration.step_us);
                self.set_integration_time(us, device);
            }
            Command::DecreaseIntegration => {
                let cfg = self.config.integration;
                let us = self
                    .integration_time_us
                    .saturating_sub(cfg.step_us)
                    .max(cfg.min_us);
                self.set_integration_time(us, device);
            }
            Command::Resume => {
                if self.paused {
                    self.paused = false;
                    self.report("acquisition resumed");
                }
            }
            Command::Help => {
                log::info!("commands");
                for line in help_lines() {
                    log::info!("  {line}");
                }
            }
            Command::Quit => {
                log::info!("quitting ... goodbye");
                return Effect::Quit;
            }
        }
        Effect::None
    }

    fn save_data(&mut self, path: &Path, device: &dyn Spectrometer) {
        let Some(frame) = &self.last_frame else {
            self.reject("can't save data - no spectrum acquired yet");
            return;
        };
        match export::save_frame(path, frame, device.info()) {
            Ok(()) => self.report(format!("data saved to: {}", path.display())),
            Err(e) => {
                log::error!("Failed to save data: {e:#}");
                self.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }

    fn capture_blank(&mut self) {
        if self.mode != DisplayMode::Intensity {
            self.reject("can't acquire blanking data - must be in intensity mode");
            return;
        }
        match &self.last_frame {
            Some(frame) => {
                self.blank = Some(frame.intensities.clone());
                self.report("blanking data acquired");
            }
            None => self.reject("can't acquire blanking data - no spectrum acquired yet"),
        }
    }

    fn clear_blank(&mut self) {
        if self.mode != DisplayMode::Intensity {
            self.reject("can't clear blanking data - must be in intensity mode");
            return;
        }
        self.blank = None;
        self.report("blanking data cleared");
    }

    fn set_mode(&mut self, mode: DisplayMode) {
        if mode.needs_blank() && self.blank.is_none() {
            self.reject(format!(
                "unable to display {} - no blanking data",
                mode.file_stem()
            ));
            return;
        }
        self.mode = mode;
        self.reset_y_axis();
        self.report(format!("display mode = {}", mode.file_stem()));
    }

    fn reset_y_axis(&mut self) {
        self.y_max = self.config.y_range(self.mode).default;
    }

    fn toggle_peak_finder(&mut self) {
        if self.peak_finder {
            if let Some(frame) = &self.last_frame {
                if let Some(p) = frame.maximum_intensity {
                    log::info!("max intensity:     {p}");
                }
                if let Some(abs) = &frame.absorption {
                    if let Some(p) = abs.minimum_transmittance {
                        log::info!("min transmittance: {p}");
                    }
                    if let Some(p) = abs.maximum_absorbance {
                        log::info!("max absorbance:    {p}");
                    }
                }
            }
        }
        self.peak_finder = !self.peak_finder;
        self.report(format!("peak finder enabled = {}", self.peak_finder));
    }

    fn set_integration_time(&mut self, us: u32, device: &mut dyn Spectrometer) {
        match device.set_integration_time_micros(us) {
            Ok(()) => {
                self.integration_time_us = us;
                self.report(format!("integration window = {us}"));
            }
            Err(e) => self.reject(format!("integration window unchanged: {e}")),
        }
    }

    // -----------------------------------------------------------------------
    // Figures
    // -----------------------------------------------------------------------

    /// Whether a figure is waiting for a screenshot.
    pub fn awaiting_screenshot(&self) -> bool {
        self.pending_figure.is_some()
    }

    /// Crop a window screenshot to the plot and write the pending figure.
    pub fn finish_figure(&mut self, screenshot: &ColorImage, pixels_per_point: f32) {
        let Some(path) = self.pending_figure.take() else {
            return;
        };
        let image = match self.plot_rect {
            Some(rect) => screenshot.region(&rect, Some(pixels_per_point)),
            None => screenshot.clone(),
        };
        match export::save_png(&path, &image) {
            Ok(()) => self.report(format!("figure saved to: {}", path.display())),
            Err(e) => {
                log::error!("Failed to save figure: {e:#}");
                self.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }
}

fn fmt_range(v: f64) -> String {
    // Strip accumulated float noise from repeated 0.1 steps.
    let rounded = (v * 1e6).round() / 1e6;
    format!("{rounded}")
}
