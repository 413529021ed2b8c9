use eframe::egui::{Color32, Ui};
use egui_plot::{Line, Plot, PlotBounds, PlotPoints};

use crate::data::model::{DisplayMode, Frame, Peak};
use crate::state::LiveView;

const LIVE_COLOR: Color32 = Color32::from_rgb(31, 119, 180);
const BLANK_COLOR: Color32 = Color32::from_rgb(44, 160, 44);
const PEAK_COLOR: Color32 = Color32::from_rgb(214, 39, 40);

// ---------------------------------------------------------------------------
// Live plot (central panel)
// ---------------------------------------------------------------------------

fn points(x: &[f64], y: &[f64]) -> Vec<[f64; 2]> {
    x.iter().zip(y).map(|(&xi, &yi)| [xi, yi]).collect()
}

/// Vertical marker from zero to 110 % of the extremum in the current mode.
fn marker_points(frame: &Frame, mode: DisplayMode) -> Option<(Peak, Vec<[f64; 2]>)> {
    let peak = frame.marker(mode)?;
    let top = 1.1 * peak.value;
    if !top.is_finite() {
        return None;
    }
    Some((peak, vec![[peak.wavelength, 0.0], [peak.wavelength, top]]))
}

/// Render the live plot and remember where it was drawn.
pub fn live_plot(ui: &mut Ui, state: &mut LiveView) {
    let Some(frame) = &state.last_frame else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading(if state.paused {
                "Acquisition paused (press r to resume)"
            } else {
                "Waiting for the first spectrum…"
            });
        });
        return;
    };

    let mode = state.mode;
    let (x_min, x_max) = match (frame.wavelengths.first(), frame.wavelengths.last()) {
        (Some(&lo), Some(&hi)) => (lo, hi),
        _ => (0.0, 1.0),
    };
    let y_max = state.y_max;

    let response = Plot::new("live_plot")
        .legend(egui_plot::Legend::default())
        .x_axis_label("Wavelength (nm)")
        .y_axis_label(mode.label())
        .allow_boxed_zoom(false)
        .allow_drag(false)
        .allow_scroll(false)
        .allow_zoom(false)
        .show(ui, |plot_ui| {
            plot_ui.set_plot_bounds(PlotBounds::from_min_max([x_min, 0.0], [x_max, y_max]));

            let (x, y) = frame.series(mode);
            plot_ui.line(
                Line::new(PlotPoints::from(points(x, y)))
                    .name(mode.label())
                    .color(LIVE_COLOR)
                    .width(1.5),
            );

            if mode == DisplayMode::Intensity {
                if let Some(abs) = &frame.absorption {
                    plot_ui.line(
                        Line::new(PlotPoints::from(points(&frame.wavelengths, &abs.blank)))
                            .name("Blank")
                            .color(BLANK_COLOR)
                            .width(1.5),
                    );
                }
            }

            if state.peak_finder {
                if let Some((peak, pts)) = marker_points(frame, mode) {
                    plot_ui.line(
                        Line::new(PlotPoints::from(pts))
                            .name(format!("peak {peak}"))
                            .color(PEAK_COLOR)
                            .width(1.5),
                    );
                }
            }
        });

    state.plot_rect = Some(response.response.rect);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(peak_value: f64) -> Frame {
        Frame {
            mode: DisplayMode::Intensity,
            integration_time_us: 4000,
            wavelengths: vec![400.0, 500.0],
            intensities: vec![1.0, peak_value],
            maximum_intensity: Some(Peak {
                index: 1,
                wavelength: 500.0,
                value: peak_value,
            }),
            absorption: None,
        }
    }

    #[test]
    fn marker_only_for_finite_peaks() {
        let (peak, pts) = marker_points(&frame(2000.0), DisplayMode::Intensity).unwrap();
        assert_eq!(peak.wavelength, 500.0);
        assert_eq!(pts, vec![[500.0, 0.0], [500.0, 2200.0]]);
        assert!(marker_points(&frame(f64::INFINITY), DisplayMode::Intensity).is_none());
        assert!(marker_points(&frame(2000.0), DisplayMode::Absorbance).is_none());
    }
}
