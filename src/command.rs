use std::path::PathBuf;

use crate::data::model::DisplayMode;

/// A user action, from a key press or a panel widget.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SaveData,
    /// Save to a path picked in the file dialog.
    SaveDataAs(PathBuf),
    SaveFigure,
    CaptureBlank,
    ClearBlank,
    IncreaseYRange,
    DecreaseYRange,
    SetMode(DisplayMode),
    TogglePeakFinder,
    IncreaseIntegration,
    DecreaseIntegration,
    Resume,
    Help,
    Quit,
}

/// Key bindings in help order: (key label, command, description).
pub const KEY_HELP: &[(&str, Command, &str)] = &[
    ("s", Command::SaveData, "save data"),
    ("f", Command::SaveFigure, "save current figure"),
    ("b", Command::CaptureBlank, "acquire blanking data"),
    ("c", Command::ClearBlank, "clear blanking data"),
    ("up", Command::IncreaseYRange, "increase plot y axis range"),
    ("down", Command::DecreaseYRange, "decrease plot y axis range"),
    ("i", Command::SetMode(DisplayMode::Intensity), "display intensity vs wavelength"),
    ("t", Command::SetMode(DisplayMode::Transmittance), "display transmittance vs wavelength"),
    ("a", Command::SetMode(DisplayMode::Absorbance), "display absorbance vs wavelength"),
    ("p", Command::TogglePeakFinder, "toggle on/off peak finder"),
    (".", Command::IncreaseIntegration, "increase integration window"),
    (",", Command::DecreaseIntegration, "decrease integration window"),
    ("r", Command::Resume, "resume acquisition after a read error"),
    ("h", Command::Help, "print help message"),
    ("q", Command::Quit, "quit"),
];

/// The help table as printable lines.
pub fn help_lines() -> Vec<String> {
    KEY_HELP
        .iter()
        .map(|(key, _, doc)| format!("{key:<5} =  {doc}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_key_is_unique() {
        let mut keys: Vec<&str> = KEY_HELP.iter().map(|(k, _, _)| *k).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), KEY_HELP.len());
    }

    #[test]
    fn help_lists_every_binding() {
        let lines = help_lines();
        assert_eq!(lines.len(), KEY_HELP.len());
        assert!(lines[0].starts_with("s "));
        assert!(lines.iter().any(|l| l.contains("toggle on/off peak finder")));
    }
}
