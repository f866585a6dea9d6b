use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Monitor configuration.
///
/// Layered as defaults → TOML file → `VIGIL_*` environment → command line.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory holding one subdirectory of reference images per person.
    pub known_people_dir: PathBuf,
    /// Seconds per presence window before checking the lock condition.
    pub wait_secs: u64,
    /// Classify 1 of every N captured frames.
    pub classify_every: u32,
    /// V4L2 device path.
    pub camera_device: String,
    pub frame_width: u32,
    pub frame_height: u32,
    /// Frames discarded at startup while auto-exposure settles.
    pub warmup_frames: usize,
    /// Consecutive capture failures tolerated before the run is aborted.
    pub capture_retries: u32,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Maximum Euclidean embedding distance for a match.
    pub match_tolerance: f32,
    /// Pause after re-arming at a window boundary.
    pub rearm_pause_ms: u64,
    /// Write an annotated snapshot of the latest frame here, if set.
    pub snapshot_path: Option<PathBuf>,
    /// Custom lock command (argv), replacing the platform default.
    ///
    /// `VIGIL_LOCK_COMMAND` is split on whitespace with no quoting, so a
    /// command whose arguments contain spaces (an `osascript -e` script)
    /// must be given as a TOML array.
    pub lock_command: Option<Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            known_people_dir: PathBuf::from("./known_people"),
            wait_secs: 5,
            classify_every: 2,
            camera_device: "/dev/video0".to_string(),
            frame_width: 640,
            frame_height: 480,
            warmup_frames: 4,
            capture_retries: 0,
            model_dir: vigil_core::default_model_dir(),
            match_tolerance: vigil_core::DEFAULT_MATCH_TOLERANCE,
            rearm_pause_ms: vigil_core::presence::DEFAULT_REARM_PAUSE.as_millis() as u64,
            snapshot_path: None,
            lock_command: None,
        }
    }
}

impl Config {
    /// Load from `path` (must exist) or the default config file (optional),
    /// then apply `VIGIL_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path().filter(|p| p.is_file()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Override fields from `VIGIL_*` variables as returned by `lookup`.
    /// Unparseable values are ignored with a warning.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("VIGIL_KNOWN_PEOPLE_DIR") {
            self.known_people_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("VIGIL_CAMERA_DEVICE") {
            self.camera_device = v;
        }
        if let Some(v) = lookup("VIGIL_MODEL_DIR") {
            self.model_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("VIGIL_SNAPSHOT_PATH") {
            self.snapshot_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("VIGIL_LOCK_COMMAND") {
            let argv: Vec<String> = v.split_whitespace().map(str::to_owned).collect();
            self.lock_command = (!argv.is_empty()).then_some(argv);
        }
        env_parse(&lookup, "VIGIL_WAIT_SECS", &mut self.wait_secs);
        env_parse(&lookup, "VIGIL_CLASSIFY_EVERY", &mut self.classify_every);
        env_parse(&lookup, "VIGIL_FRAME_WIDTH", &mut self.frame_width);
        env_parse(&lookup, "VIGIL_FRAME_HEIGHT", &mut self.frame_height);
        env_parse(&lookup, "VIGIL_WARMUP_FRAMES", &mut self.warmup_frames);
        env_parse(&lookup, "VIGIL_CAPTURE_RETRIES", &mut self.capture_retries);
        env_parse(&lookup, "VIGIL_MATCH_TOLERANCE", &mut self.match_tolerance);
        env_parse(&lookup, "VIGIL_REARM_PAUSE_MS", &mut self.rearm_pause_ms);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wait_secs == 0 {
            return Err(ConfigError::Invalid("wait_secs must be at least 1".into()));
        }
        if self.classify_every == 0 {
            return Err(ConfigError::Invalid("classify_every must be at least 1".into()));
        }
        if !(self.match_tolerance.is_finite() && self.match_tolerance > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "match_tolerance must be a positive number, got {}",
                self.match_tolerance
            )));
        }
        if self.frame_width == 0 || self.frame_height == 0 {
            return Err(ConfigError::Invalid("frame size must be non-zero".into()));
        }
        if matches!(&self.lock_command, Some(argv) if argv.is_empty()) {
            return Err(ConfigError::Invalid("lock_command must not be empty".into()));
        }
        Ok(())
    }

    pub fn wait(&self) -> Duration {
        Duration::from_secs(self.wait_secs)
    }

    pub fn rearm_pause(&self) -> Duration {
        Duration::from_millis(self.rearm_pause_ms)
    }
}

/// `$XDG_CONFIG_HOME/vigil/config.toml`, falling back to `~/.config`.
fn default_config_path() -> Option<PathBuf> {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|_| std::env::var("HOME").map(|home| PathBuf::from(home).join(".config")))
        .ok()?;
    Some(base.join("vigil").join("config.toml"))
}

fn env_parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, target: &mut T) {
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *target = value,
        Err(_) => tracing::warn!(key, value = %raw, "ignoring unparseable environment override"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.wait_secs, 5);
        assert_eq!(config.classify_every, 2);
        assert_eq!(config.known_people_dir, PathBuf::from("./known_people"));
        assert_eq!(config.rearm_pause(), Duration::from_millis(100));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_partial_overrides_keep_defaults() {
        let config: Config = toml::from_str(
            r#"
            wait_secs = 30
            camera_device = "/dev/video2"
            lock_command = ["loginctl", "lock-session"]
            "#,
        )
        .unwrap();
        assert_eq!(config.wait(), Duration::from_secs(30));
        assert_eq!(config.camera_device, "/dev/video2");
        assert_eq!(config.classify_every, 2);
        assert_eq!(
            config.lock_command,
            Some(vec!["loginctl".to_string(), "lock-session".to_string()])
        );
    }

    #[test]
    fn test_lock_command_with_spaced_argument_needs_toml_array() {
        let config: Config = toml::from_str(
            r#"lock_command = ["osascript", "-e", "tell application \"System Events\" to sleep"]"#,
        )
        .unwrap();
        let argv = config.lock_command.unwrap();
        assert_eq!(argv.len(), 3);
        assert_eq!(argv[2], r#"tell application "System Events" to sleep"#);

        // The environment form has no quoting: the script is torn into words.
        let mut config = Config::default();
        config.apply_env(lookup_from(&[(
            "VIGIL_LOCK_COMMAND",
            r#"osascript -e 'tell application "System Events" to sleep'"#,
        )]));
        assert_eq!(config.lock_command.unwrap().len(), 8);
    }

    #[test]
    fn test_toml_unknown_field_rejected() {
        assert!(toml::from_str::<Config>("wait_seconds = 3").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env(lookup_from(&[
            ("VIGIL_WAIT_SECS", "12"),
            ("VIGIL_CLASSIFY_EVERY", "3"),
            ("VIGIL_MATCH_TOLERANCE", "0.9"),
            ("VIGIL_LOCK_COMMAND", "xdg-screensaver lock"),
            ("VIGIL_KNOWN_PEOPLE_DIR", "/srv/faces"),
        ]));
        assert_eq!(config.wait_secs, 12);
        assert_eq!(config.classify_every, 3);
        assert!((config.match_tolerance - 0.9).abs() < 1e-6);
        assert_eq!(
            config.lock_command,
            Some(vec!["xdg-screensaver".to_string(), "lock".to_string()])
        );
        assert_eq!(config.known_people_dir, PathBuf::from("/srv/faces"));
    }

    #[test]
    fn test_env_unparseable_value_ignored() {
        let mut config = Config::default();
        config.apply_env(lookup_from(&[("VIGIL_WAIT_SECS", "soon")]));
        assert_eq!(config.wait_secs, 5);
    }

    #[test]
    fn test_validate_rejects_zero_wait_and_zero_cadence() {
        let config = Config { wait_secs: 0, ..Config::default() };
        assert!(config.validate().is_err());
        let config = Config { classify_every: 0, ..Config::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_tolerance_and_empty_lock_command() {
        let config = Config { match_tolerance: 0.0, ..Config::default() };
        assert!(config.validate().is_err());
        let config = Config { match_tolerance: f32::NAN, ..Config::default() };
        assert!(config.validate().is_err());
        let config = Config { lock_command: Some(vec![]), ..Config::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_explicit_missing_file_errors() {
        let dir = std::env::temp_dir().join("vigil-config-test-missing");
        let err = Config::from_file(&dir.join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
