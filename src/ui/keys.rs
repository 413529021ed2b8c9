use eframe::egui::{self, Key};

use crate::command::Command;
use crate::data::model::DisplayMode;

/// Command bound to a key, if any. Unbound keys are ignored.
pub fn command_for(key: Key) -> Option<Command> {
    let cmd = match key {
        Key::S => Command::SaveData,
        Key::F => Command::SaveFigure,
        Key::B => Command::CaptureBlank,
        Key::C => Command::ClearBlank,
        Key::ArrowUp => Command::IncreaseYRange,
        Key::ArrowDown => Command::DecreaseYRange,
        Key::I => Command::SetMode(DisplayMode::Intensity),
        Key::T => Command::SetMode(DisplayMode::Transmittance),
        Key::A => Command::SetMode(DisplayMode::Absorbance),
        Key::P => Command::TogglePeakFinder,
        Key::Period => Command::IncreaseIntegration,
        Key::Comma => Command::DecreaseIntegration,
        Key::R => Command::Resume,
        Key::H => Command::Help,
        Key::Q => Command::Quit,
        _ => return None,
    };
    Some(cmd)
}

/// Commands for the keys pressed since the last frame, in press order.
/// Presses with Ctrl/Cmd/Alt held are left to egui.
pub fn pressed_commands(ctx: &egui::Context) -> Vec<Command> {
    ctx.input(|i| {
        i.events
            .iter()
            .filter_map(|event| match event {
                egui::Event::Key {
                    key,
                    pressed: true,
                    repeat: false,
                    modifiers,
                    ..
                } if !(modifiers.command || modifiers.alt) => command_for(*key),
                _ => None,
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::KEY_HELP;

    fn key_for_label(label: &str) -> Key {
        match label {
            "up" => Key::ArrowUp,
            "down" => Key::ArrowDown,
            "." => Key::Period,
            "," => Key::Comma,
            other => Key::from_name(&other.to_uppercase()).unwrap(),
        }
    }

    #[test]
    fn bindings_match_help_table() {
        for (label, command, _) in KEY_HELP {
            assert_eq!(
                command_for(key_for_label(label)).as_ref(),
                Some(command),
                "key {label}"
            );
        }
    }

    #[test]
    fn unbound_keys_are_ignored() {
        assert_eq!(command_for(Key::Z), None);
        assert_eq!(command_for(Key::Enter), None);
    }
}
