//! Settings files and run output.
//!
//! A settings file is a JSON object with a single `"settings"` member holding
//! the simulation parameters in `SCREAMING_SNAKE_CASE` plus `DROP_COUNT` and
//! an optional `SEED`. Extra keys (display options and the like) are kept
//! verbatim so they can be echoed into the output.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stems_core::{Config, Snapshot};

/// Typed view of the `"settings"` object.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct RunSettings {
    #[serde(flatten)]
    pub config: Config,
    pub drop_count: u64,
    #[serde(default)]
    pub seed: Option<u64>,
}

/// A loaded settings file: the typed settings and the raw object they came from.
#[derive(Clone, Debug)]
pub struct SettingsFile {
    pub settings: RunSettings,
    pub raw: Value,
}

#[derive(Deserialize)]
struct Envelope {
    settings: Value,
}

impl SettingsFile {
    pub fn parse(text: &str) -> Result<Self> {
        let envelope: Envelope =
            serde_json::from_str(text).context("settings file is not a JSON object with a \"settings\" member")?;
        let settings: RunSettings =
            serde_json::from_value(envelope.settings.clone()).context("invalid settings")?;
        settings.config.validate().context("invalid settings")?;

        Ok(Self {
            settings,
            raw: envelope.settings,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("failed to load {}", path.display()))
    }
}

#[derive(Debug, Serialize)]
struct OutputStem {
    coord: [f32; 2],
    height: u32,
}

/// What a finished run writes: the settings it ran with and its stems.
#[derive(Debug, Serialize)]
pub struct RunOutput {
    settings: Value,
    seed: u64,
    steps_completed: u64,
    stems: Vec<OutputStem>,
}

impl RunOutput {
    pub fn new(file: &SettingsFile, seed: u64, snapshot: &Snapshot) -> Self {
        Self {
            settings: file.raw.clone(),
            seed,
            steps_completed: snapshot.steps_completed,
            stems: snapshot
                .stems
                .iter()
                .map(|s| OutputStem {
                    coord: s.coord,
                    height: s.height,
                })
                .collect(),
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string(self).context("failed to serialize run output")?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stems_core::PlaneShape;

    const LEGACY: &str = r#"{"settings": {
        "DROP_COUNT": 1000000,
        "DROP_RADIUS": 0.03,
        "STEM_RADIUS": 0.03,
        "BOUNCE_DISTANCE": 0.15,
        "PLANE_SHAPE": 0,
        "MELT_PROBABILITY": 0.03,
        "GROUND_STICK_PROBABILITY": 0.05,
        "STEM_STICK_PROBABILITY": 1,
        "INTERACTIVE_MODE": false,
        "INTERACTIVE_DELAY": 0.2,
        "BOUNCE_HEIGHT_ADDITION": 20,
        "OLD_GENOME_BIAS": 40,
        "SHOW_BOUNCE_RADIUS": false,
        "MELT_INTERVAL": 30,
        "PERIODIC_BOUNDARY": false
    }}"#;

    #[test]
    fn legacy_settings_file_loads() {
        let file = SettingsFile::parse(LEGACY).unwrap();
        assert_eq!(file.settings.drop_count, 1_000_000);
        assert_eq!(file.settings.seed, None);
        assert_eq!(file.settings.config, Config::default());
        assert_eq!(file.raw["INTERACTIVE_DELAY"], 0.2);
    }

    #[test]
    fn seed_and_shape_name_are_accepted() {
        let text = LEGACY
            .replace("\"PLANE_SHAPE\": 0", "\"PLANE_SHAPE\": \"square\", \"SEED\": 9");
        let file = SettingsFile::parse(&text).unwrap();
        assert_eq!(file.settings.seed, Some(9));
        assert_eq!(file.settings.config.plane_shape, PlaneShape::Square);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let text = LEGACY.replace("\"MELT_INTERVAL\": 30", "\"MELT_INTERVAL\": 0");
        assert!(SettingsFile::parse(&text).is_err());

        let text = LEGACY.replace("\"DROP_COUNT\": 1000000,", "");
        assert!(SettingsFile::parse(&text).is_err());

        assert!(SettingsFile::parse("{\"DROP_COUNT\": 3}").is_err());
    }

    #[test]
    fn output_echoes_settings_and_lists_stems() {
        let file = SettingsFile::parse(LEGACY).unwrap();
        let mut sim = stems_core::Simulation::new(file.settings.config, 3).unwrap();
        sim.run(200).unwrap();
        let snapshot = sim.snapshot();

        let out = serde_json::to_value(RunOutput::new(&file, 3, &snapshot)).unwrap();
        assert_eq!(out["settings"], file.raw);
        assert_eq!(out["seed"], 3);
        assert_eq!(out["steps_completed"], 200);
        let stems = out["stems"].as_array().unwrap();
        assert_eq!(stems.len(), snapshot.len());
        if let Some(first) = stems.first() {
            assert!(first.get("coord").is_some());
            assert!(first.get("height").is_some());
            assert!(first.get("id").is_none());
        }
    }
}
