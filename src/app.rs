use std::time::Duration;

use eframe::egui;

use crate::command::{help_lines, Command};
use crate::config::ViewerConfig;
use crate::device::{DeviceError, Spectrometer};
use crate::state::{Effect, LiveView};
use crate::ui::{keys, panels, plot};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct LiveViewApp {
    device: Box<dyn Spectrometer>,
    pub state: LiveView,
}

impl LiveViewApp {
    /// Apply the configured integration time to the device and print the
    /// key help.
    pub fn new(mut device: Box<dyn Spectrometer>, config: ViewerConfig) -> Result<Self, DeviceError> {
        let state = LiveView::new(config);
        device.set_integration_time_micros(state.integration_time_us)?;
        log::info!(
            "connected to {} at {} µs",
            device.info(),
            state.integration_time_us
        );
        log::info!("commands");
        for line in help_lines() {
            log::info!("  {line}");
        }
        Ok(Self { device, state })
    }

    fn run(&mut self, ctx: &egui::Context, commands: Vec<Command>) {
        for command in commands {
            match self.state.apply(command, self.device.as_mut()) {
                Effect::None => {}
                Effect::Screenshot(path) => {
                    log::debug!("capturing figure for {}", path.display());
                    ctx.send_viewport_cmd(egui::ViewportCommand::Screenshot(egui::UserData::default()));
                }
                Effect::Quit => ctx.send_viewport_cmd(egui::ViewportCommand::Close),
            }
        }
    }
}

impl eframe::App for LiveViewApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Screenshots requested on an earlier frame ----
        if self.state.awaiting_screenshot() {
            let shot = ctx.input(|i| {
                i.events.iter().find_map(|e| match e {
                    egui::Event::Screenshot { image, .. } => Some(image.clone()),
                    _ => None,
                })
            });
            if let Some(image) = shot {
                self.state.finish_figure(&image, ctx.pixels_per_point());
            }
        }

        // ---- Keyboard ----
        let pressed = keys::pressed_commands(ctx);
        self.run(ctx, pressed);

        // ---- Acquisition ----
        self.state.refresh(self.device.as_mut());

        let mut clicked = Vec::new();

        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &self.state, &mut clicked);
        });

        // ---- Left side panel: device and readouts ----
        egui::SidePanel::left("device_panel")
            .default_width(240.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &self.state, self.device.info(), &mut clicked);
            });

        // ---- Central panel: plot ----
        egui::CentralPanel::default().show(ctx, |ui| {
            plot::live_plot(ui, &mut self.state);
        });

        self.run(ctx, clicked);

        ctx.request_repaint_after(Duration::from_millis(self.state.config.refresh_interval_ms));
    }
}
