use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use crate::command::{Command, KEY_HELP};
use crate::data::model::DisplayMode;
use crate::device::DeviceInfo;
use crate::state::LiveView;

// ---------------------------------------------------------------------------
// Left side panel – device, acquisition and readouts
// ---------------------------------------------------------------------------

/// Render the left panel. Button presses are queued in `commands`.
pub fn side_panel(ui: &mut Ui, state: &LiveView, device: &DeviceInfo, commands: &mut Vec<Command>) {
    ui.heading("Spectrometer");
    ui.separator();

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            egui::Grid::new("device_grid")
                .num_columns(2)
                .spacing([12.0, 4.0])
                .show(ui, |ui: &mut Ui| {
                    ui.label("Model");
                    ui.label(&device.model);
                    ui.end_row();

                    ui.label("Serial");
                    ui.label(&device.serial);
                    ui.end_row();

                    ui.label("Integration");
                    ui.horizontal(|ui: &mut Ui| {
                        if ui.small_button("−").clicked() {
                            commands.push(Command::DecreaseIntegration);
                        }
                        ui.label(format!("{} µs", state.integration_time_us));
                        if ui.small_button("+").clicked() {
                            commands.push(Command::IncreaseIntegration);
                        }
                    });
                    ui.end_row();

                    ui.label("Y max");
                    ui.horizontal(|ui: &mut Ui| {
                        if ui.small_button("−").clicked() {
                            commands.push(Command::DecreaseYRange);
                        }
                        ui.label(format!("{:.1}", state.y_max));
                        if ui.small_button("+").clicked() {
                            commands.push(Command::IncreaseYRange);
                        }
                    });
                    ui.end_row();

                    ui.label("Blank");
                    ui.label(if state.blank.is_some() { "acquired" } else { "none" });
                    ui.end_row();
                });

            if state.paused {
                ui.add_space(6.0);
                ui.horizontal(|ui: &mut Ui| {
                    ui.label(RichText::new("Acquisition paused").color(Color32::RED));
                    if ui.button("Resume").clicked() {
                        commands.push(Command::Resume);
                    }
                });
            }

            ui.separator();
            ui.strong("Extrema");
            match &state.last_frame {
                Some(frame) => {
                    let row = |ui: &mut Ui, name: &str, peak: Option<String>| {
                        ui.label(format!("{name}: {}", peak.as_deref().unwrap_or("–")));
                    };
                    row(ui, "max intensity", frame.maximum_intensity.map(|p| p.to_string()));
                    if let Some(abs) = &frame.absorption {
                        row(ui, "min transmittance", abs.minimum_transmittance.map(|p| p.to_string()));
                        row(ui, "max absorbance", abs.maximum_absorbance.map(|p| p.to_string()));
                    }
                }
                None => {
                    ui.label("No spectrum yet.");
                }
            }

            ui.separator();
            egui::CollapsingHeader::new(RichText::new("Keys").strong())
                .default_open(true)
                .show(ui, |ui: &mut Ui| {
                    egui::Grid::new("key_help").num_columns(2).show(ui, |ui: &mut Ui| {
                        for (key, _, doc) in KEY_HELP {
                            ui.monospace(*key);
                            ui.label(*doc);
                            ui.end_row();
                        }
                    });
                });
        });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar. Button presses are queued in `commands`.
pub fn top_bar(ui: &mut Ui, state: &LiveView, commands: &mut Vec<Command>) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Save data").clicked() {
                commands.push(Command::SaveData);
                ui.close_menu();
            }
            if ui.button("Save data as…").clicked() {
                ui.close_menu();
                if let Some(path) = save_file_dialog(state) {
                    commands.push(Command::SaveDataAs(path));
                }
            }
            if ui.button("Save figure").clicked() {
                commands.push(Command::SaveFigure);
                ui.close_menu();
            }
            ui.separator();
            if ui.button("Quit").clicked() {
                commands.push(Command::Quit);
                ui.close_menu();
            }
        });

        ui.separator();

        for mode in DisplayMode::ALL {
            let enabled = !mode.needs_blank() || state.blank.is_some();
            let clicked = ui
                .add_enabled(enabled, egui::SelectableLabel::new(state.mode == mode, mode.label()))
                .clicked();
            if clicked && state.mode != mode {
                commands.push(Command::SetMode(mode));
            }
        }

        ui.separator();

        let in_intensity = state.mode == DisplayMode::Intensity;
        if ui
            .add_enabled(in_intensity, egui::Button::new("Capture blank"))
            .clicked()
        {
            commands.push(Command::CaptureBlank);
        }
        if ui
            .add_enabled(in_intensity && state.blank.is_some(), egui::Button::new("Clear blank"))
            .clicked()
        {
            commands.push(Command::ClearBlank);
        }

        ui.separator();

        if ui.selectable_label(state.peak_finder, "Peak finder").clicked() {
            commands.push(Command::TogglePeakFinder);
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialog
// ---------------------------------------------------------------------------

fn save_file_dialog(state: &LiveView) -> Option<std::path::PathBuf> {
    rfd::FileDialog::new()
        .set_title("Save spectrum")
        .set_directory(&state.config.save_dir)
        .set_file_name(crate::data::export::DATA_FILE_NAME)
        .add_filter("JSON", &["json"])
        .add_filter("CSV", &["csv"])
        .add_filter("Parquet", &["parquet", "pq"])
        .save_file()
}
