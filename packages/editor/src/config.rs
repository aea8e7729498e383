use crate::errors::EditorResult;
use crate::geometry::Point;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_NAME: &str = "draftboard.config.json";

/// Engine tuning knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorConfig {
    /// Maximum undo entries kept (0 = unlimited)
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Property edits closer than this merge into one undo step
    #[serde(default = "default_coalesce_window_ms")]
    pub coalesce_window_ms: u64,

    /// How long the internal clipboard beats the system clipboard
    #[serde(default = "default_clipboard_freshness_ms")]
    pub clipboard_freshness_ms: u64,

    /// Translation applied to duplicated roots
    #[serde(default = "default_duplicate_offset")]
    pub duplicate_offset: Point,

    /// Shortest drop indicator (world units) still considered a valid target
    #[serde(default = "default_min_indicator_length")]
    pub min_indicator_length: f64,
}

fn default_history_limit() -> usize {
    100
}

fn default_coalesce_window_ms() -> u64 {
    1000
}

fn default_clipboard_freshness_ms() -> u64 {
    30_000
}

fn default_duplicate_offset() -> Point {
    Point::new(10.0, 10.0)
}

fn default_min_indicator_length() -> f64 {
    8.0
}

impl EditorConfig {
    /// Load config from a directory, falling back to defaults if the file is absent
    pub fn load(dir: impl AsRef<Path>) -> EditorResult<Self> {
        let config_path = dir.as_ref().join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: EditorConfig = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(EditorConfig::default())
        }
    }

    pub fn coalesce_window(&self) -> Duration {
        Duration::milliseconds(self.coalesce_window_ms as i64)
    }

    pub fn clipboard_freshness(&self) -> Duration {
        Duration::milliseconds(self.clipboard_freshness_ms as i64)
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            coalesce_window_ms: default_coalesce_window_ms(),
            clipboard_freshness_ms: default_clipboard_freshness_ms(),
            duplicate_offset: default_duplicate_offset(),
            min_indicator_length: default_min_indicator_length(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_config() {
        let json = r#"{ "historyLimit": 20, "duplicateOffset": { "x": 24, "y": 0 } }"#;

        let config: EditorConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.history_limit, 20);
        assert_eq!(config.duplicate_offset, Point::new(24.0, 0.0));
        assert_eq!(config.coalesce_window_ms, 1000);
        assert_eq!(config.min_indicator_length, 8.0);
    }

    #[test]
    fn test_default_config() {
        let config = EditorConfig::default();
        assert_eq!(config.history_limit, 100);
        assert_eq!(config.clipboard_freshness(), Duration::seconds(30));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = std::env::temp_dir().join("draftboard-config-missing");
        let config = EditorConfig::load(&dir).unwrap();
        assert_eq!(config, EditorConfig::default());
    }
}
