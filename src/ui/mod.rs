/// Window layer: keyboard bindings, the top/side panels, and the live plot.
///
/// Panels never touch the device; they queue [`crate::command::Command`]s
/// that the app applies after drawing.

pub mod keys;
pub mod panels;
pub mod plot;
