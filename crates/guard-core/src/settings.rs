use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{GuardError, Result};
use crate::routes::{RouteGuard, RoutePattern};
use crate::session::DEFAULT_SIGN_IN_PATH;

/// Default interval between periodic session checks (5 minutes).
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 300;

/// Name of the per-user state directory under `$HOME`.
pub const STATE_DIR_NAME: &str = ".learnhub-guard";

// ── MonitorConfig ──────────────────────────────────────────────────────────────

/// Runtime configuration of the session liveness monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Delay between periodic checks; the first tick fires one full interval
    /// after the timer is established.
    pub check_interval: Duration,
    /// Sign-in page that invalid sessions are redirected to.
    pub sign_in_path: String,
    /// Routes on which the session is enforced.
    pub guard: RouteGuard,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS),
            sign_in_path: DEFAULT_SIGN_IN_PATH.to_string(),
            guard: RouteGuard::default(),
        }
    }
}

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Replay session and render events against the LearnHub client guards
#[derive(Parser, Debug, Clone)]
#[command(
    name = "learnhub-guard",
    about = "Replay session and render events against the LearnHub client guards",
    version
)]
pub struct Settings {
    /// Scenario file (JSON) describing the events to replay
    pub scenario: PathBuf,

    /// Seconds between periodic session checks (1-3600)
    #[arg(long, default_value = "300", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub check_interval_secs: u64,

    /// Sign-in page used for redirects
    #[arg(long, default_value = DEFAULT_SIGN_IN_PATH)]
    pub sign_in_path: String,

    /// Additional protected route pattern (e.g. `/checkout` or `/certificates/*/download`)
    #[arg(long = "protect", value_name = "PATTERN")]
    pub protect: Vec<String>,

    /// Show fault details in fallback views and log captured faults
    #[arg(long, env = "LEARNHUB_DEV_MODE", value_parser = clap::builder::FalseyValueParser::new())]
    pub dev_mode: bool,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.learnhub-guard/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_interval_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sign_in_path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub protect: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev_mode: Option<bool>,
}

impl LastUsedParams {
    /// Default path of the persisted config file.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Config path rooted at `base_dir`.
    pub fn config_path_in(base_dir: &std::path::Path) -> PathBuf {
        base_dir.join(STATE_DIR_NAME).join("last_used.json")
    }

    /// Load persisted params. Returns `Default` when the file is absent or
    /// cannot be parsed.
    pub fn load_from(path: &std::path::Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => return Self::default(),
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable last-used config");
            Self::default()
        })
    }

    /// Write params to `path` through a temp file and rename, creating parent
    /// directories if needed.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the config file at `path` if it exists.
    pub fn clear_at(path: &std::path::Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse process arguments, merge with last-used params where no explicit
    /// value was provided, and persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Same as [`Settings::load_with_last_used`] with an explicit argument
    /// list and config path.
    pub fn load_with_last_used_impl(
        args: Vec<std::ffi::OsString>,
        config_path: &std::path::Path,
    ) -> Self {
        // Raw ArgMatches are needed to query ValueSource.
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            if let Err(e) = LastUsedParams::clear_at(config_path) {
                tracing::warn!(error = %e, "failed to clear last-used config");
            }
            return settings.resolve();
        }

        let last = LastUsedParams::load_from(config_path);

        // CLI (and env for dev mode) always wins over persisted values.
        if !is_arg_explicitly_set(&matches, "check_interval_secs") {
            if let Some(v) = last.check_interval_secs {
                settings.check_interval_secs = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "sign_in_path") {
            if let Some(v) = last.sign_in_path {
                settings.sign_in_path = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "protect") {
            settings.protect = last.protect;
        }
        if !is_arg_explicitly_set(&matches, "dev_mode") {
            if let Some(v) = last.dev_mode {
                settings.dev_mode = v;
            }
        }

        settings = settings.resolve();

        if let Err(e) = LastUsedParams::from(&settings).save_to(config_path) {
            tracing::warn!(error = %e, "failed to persist last-used config");
        }

        settings
    }

    /// Apply the `--debug` override.
    fn resolve(mut self) -> Self {
        if self.debug {
            self.log_level = "DEBUG".to_string();
        }
        self
    }

    /// Build the liveness monitor configuration.
    ///
    /// Fails when the sign-in path is not absolute or a `--protect` pattern
    /// does not parse.
    pub fn monitor_config(&self) -> Result<MonitorConfig> {
        if !self.sign_in_path.starts_with('/') {
            return Err(GuardError::Config(format!(
                "sign-in path must be absolute: {}",
                self.sign_in_path
            )));
        }

        let extra = self
            .protect
            .iter()
            .map(|p| p.parse::<RoutePattern>())
            .collect::<Result<Vec<_>>>()?;

        Ok(MonitorConfig {
            check_interval: Duration::from_secs(self.check_interval_secs),
            sign_in_path: self.sign_in_path.clone(),
            guard: RouteGuard::with_extra(extra),
        })
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            check_interval_secs: Some(s.check_interval_secs),
            sign_in_path: Some(s.sign_in_path.clone()),
            protect: s.protect.clone(),
            dev_mode: Some(s.dev_mode),
        }
    }
}

/// Returns `true` when `name` was supplied on the command line or through its
/// environment variable (not via a default value).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    use clap::parser::ValueSource;
    matches!(
        matches.value_source(name),
        Some(ValueSource::CommandLine) | Some(ValueSource::EnvVariable)
    )
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tmp_config_path(tmp: &TempDir) -> PathBuf {
        LastUsedParams::config_path_in(tmp.path())
    }

    // ── LastUsedParams ────────────────────────────────────────────────────

    #[test]
    fn test_last_used_params_save_load() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        let params = LastUsedParams {
            check_interval_secs: Some(60),
            sign_in_path: Some("/auth/signin".to_string()),
            protect: vec!["/checkout".to_string()],
            dev_mode: Some(true),
        };

        params.save_to(&path).expect("save");
        let loaded = LastUsedParams::load_from(&path);

        assert_eq!(loaded, params);
    }

    #[test]
    fn test_last_used_params_clear() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);

        LastUsedParams::default().save_to(&path).expect("save");
        assert!(path.exists());

        LastUsedParams::clear_at(&path).expect("clear");
        assert!(!path.exists());
    }

    #[test]
    fn test_last_used_params_default_when_missing_or_corrupt() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        assert_eq!(LastUsedParams::load_from(&path), LastUsedParams::default());

        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(LastUsedParams::load_from(&path), LastUsedParams::default());
    }

    // ── Settings parsing ──────────────────────────────────────────────────

    #[test]
    fn test_settings_default_values() {
        let settings = Settings::parse_from(["learnhub-guard", "scenario.json"]);

        assert_eq!(settings.scenario, PathBuf::from("scenario.json"));
        assert_eq!(settings.check_interval_secs, 300);
        assert_eq!(settings.sign_in_path, "/signin");
        assert!(settings.protect.is_empty());
        assert_eq!(settings.log_level, "INFO");
        assert!(settings.log_file.is_none());
        assert!(!settings.debug);
        assert!(!settings.clear);
    }

    #[test]
    fn test_settings_cli_repeated_protect() {
        let settings = Settings::parse_from([
            "learnhub-guard",
            "s.json",
            "--protect",
            "/checkout",
            "--protect",
            "/certificates/*/download",
        ]);
        assert_eq!(settings.protect, vec!["/checkout", "/certificates/*/download"]);
    }

    #[test]
    fn test_settings_rejects_out_of_range_interval() {
        let result =
            Settings::try_parse_from(["learnhub-guard", "s.json", "--check-interval-secs", "0"]);
        assert!(result.is_err());
    }

    // ── monitor_config ────────────────────────────────────────────────────

    #[test]
    fn test_monitor_config_from_settings() {
        let settings = Settings::parse_from([
            "learnhub-guard",
            "s.json",
            "--check-interval-secs",
            "30",
            "--protect",
            "/checkout",
        ]);
        let config = settings.monitor_config().expect("config");

        assert_eq!(config.check_interval, Duration::from_secs(30));
        assert_eq!(config.sign_in_path, "/signin");
        assert!(config.guard.is_protected("/checkout/pay"));
        assert!(config.guard.is_protected("/courses/9/learn"));
    }

    #[test]
    fn test_monitor_config_rejects_bad_pattern() {
        let settings = Settings::parse_from(["learnhub-guard", "s.json", "--protect", "checkout"]);
        assert!(matches!(
            settings.monitor_config(),
            Err(GuardError::InvalidRoutePattern(_))
        ));
    }

    #[test]
    fn test_monitor_config_rejects_relative_sign_in_path() {
        let settings =
            Settings::parse_from(["learnhub-guard", "s.json", "--sign-in-path", "signin"]);
        assert!(matches!(settings.monitor_config(), Err(GuardError::Config(_))));
    }

    #[test]
    fn test_monitor_config_default() {
        let config = MonitorConfig::default();
        assert_eq!(config.check_interval, Duration::from_secs(300));
        assert_eq!(config.sign_in_path, "/signin");
        assert_eq!(config.guard, RouteGuard::default());
    }

    // ── load_with_last_used ───────────────────────────────────────────────

    #[test]
    fn test_load_with_last_used_merges_persisted_interval() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams {
            check_interval_secs: Some(45),
            ..Default::default()
        }
        .save_to(&config_path)
        .expect("save");

        let settings = Settings::load_with_last_used_impl(
            vec!["learnhub-guard".into(), "s.json".into()],
            &config_path,
        );
        assert_eq!(settings.check_interval_secs, 45);
    }

    #[test]
    fn test_load_with_last_used_cli_overrides_persisted() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams {
            sign_in_path: Some("/old-signin".to_string()),
            ..Default::default()
        }
        .save_to(&config_path)
        .expect("save");

        let settings = Settings::load_with_last_used_impl(
            vec![
                "learnhub-guard".into(),
                "s.json".into(),
                "--sign-in-path".into(),
                "/login".into(),
            ],
            &config_path,
        );
        assert_eq!(settings.sign_in_path, "/login");
    }

    #[test]
    fn test_load_with_last_used_clear_removes_file() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams::default().save_to(&config_path).expect("save");

        Settings::load_with_last_used_impl(
            vec!["learnhub-guard".into(), "s.json".into(), "--clear".into()],
            &config_path,
        );

        assert!(!config_path.exists(), "file must be gone after --clear");
    }

    #[test]
    fn test_load_with_last_used_debug_overrides_log_level() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);

        let settings = Settings::load_with_last_used_impl(
            vec!["learnhub-guard".into(), "s.json".into(), "--debug".into()],
            &config_path,
        );
        assert_eq!(settings.log_level, "DEBUG");
    }

    #[test]
    fn test_load_with_last_used_persists_after_run() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);

        Settings::load_with_last_used_impl(
            vec![
                "learnhub-guard".into(),
                "s.json".into(),
                "--protect".into(),
                "/checkout".into(),
            ],
            &config_path,
        );

        let loaded = LastUsedParams::load_from(&config_path);
        assert_eq!(loaded.protect, vec!["/checkout".to_string()]);
        assert_eq!(loaded.check_interval_secs, Some(300));
    }
}
