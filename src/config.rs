//! Runner configuration.
//!
//! Built-in defaults, then an optional `runner_config.json` beside the
//! executable, then environment overrides.

use std::{
    env::consts::{DLL_PREFIX, DLL_SUFFIX},
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::{debug, info};
use serde::Deserialize;

use crate::constants::{
    CONFIG_FILE_NAME, DEFAULT_CHANNEL_PREFIX, DEFAULT_LOG_FILTER, DEFAULT_WINDOW_HEIGHT,
    DEFAULT_WINDOW_TITLE, DEFAULT_WINDOW_WIDTH, ENV_CHANNEL_PREFIX, ENV_FORM_LIBRARY,
    FORM_HANDLER_CHANNEL, FORM_LIBRARY_STEM, SYSTEM_INFO_CHANNEL,
};

/// File name of the form component on this platform, e.g. `CSharpFormSaver.dll`.
pub fn default_form_library() -> String {
    format!("{}{}{}", DLL_PREFIX, FORM_LIBRARY_STEM, DLL_SUFFIX)
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Prefix of both channel names, e.g. `com.example.my_app`.
    pub channel_prefix: String,
    /// File name (or absolute path) of the form component.
    pub form_library: String,
    pub window_title: String,
    pub window_width: i32,
    pub window_height: i32,
    /// `env_logger` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Config file the values came from, if one was read.
    #[serde(skip)]
    pub source: Option<PathBuf>,
    /// Environment variables that replaced a value.
    #[serde(skip)]
    pub overridden_by: Vec<&'static str>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            channel_prefix: DEFAULT_CHANNEL_PREFIX.to_string(),
            form_library: default_form_library(),
            window_title: DEFAULT_WINDOW_TITLE.to_string(),
            window_width: DEFAULT_WINDOW_WIDTH,
            window_height: DEFAULT_WINDOW_HEIGHT,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            source: None,
            overridden_by: Vec::new(),
        }
    }
}

impl RunnerConfig {
    /// Defaults, the config file beside the executable, then the environment.
    pub fn load() -> Result<Self> {
        let mut config = match config_path() {
            Some(path) => Self::from_file(&path)?.unwrap_or_default(),
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("parsing runner configuration")
    }

    /// Reads `path`. A missing file is `Ok(None)`; a malformed one is an error.
    pub fn from_file(path: &Path) -> Result<Option<Self>> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", path.display()));
            }
        };
        let mut config = Self::from_json_str(&text)
            .with_context(|| format!("loading {}", path.display()))?;
        config.source = Some(path.to_path_buf());
        Ok(Some(config))
    }

    /// Applies environment-style overrides; `lookup` returns a variable's value.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(library) = lookup(ENV_FORM_LIBRARY).filter(|v| !v.is_empty()) {
            self.form_library = library;
            self.overridden_by.push(ENV_FORM_LIBRARY);
        }
        if let Some(prefix) = lookup(ENV_CHANNEL_PREFIX).filter(|v| !v.is_empty()) {
            self.channel_prefix = prefix;
            self.overridden_by.push(ENV_CHANNEL_PREFIX);
        }
    }

    /// Logs where the configuration came from. Loading runs before the logger
    /// exists, so this is called once logging is up.
    pub fn log_summary(&self) {
        match &self.source {
            Some(path) => info!("[Config] Loaded {}", path.display()),
            None => debug!("[Config] No {}, using defaults", CONFIG_FILE_NAME),
        }
        for var in &self.overridden_by {
            debug!("[Config] Overridden by {}", var);
        }
        info!(
            "[Config] channels '{}' and '{}', form library '{}'",
            self.system_info_channel(),
            self.form_handler_channel(),
            self.form_library
        );
    }

    pub fn system_info_channel(&self) -> String {
        format!("{}/{}", self.channel_prefix, SYSTEM_INFO_CHANNEL)
    }

    pub fn form_handler_channel(&self) -> String {
        format!("{}/{}", self.channel_prefix, FORM_HANDLER_CHANNEL)
    }
}

fn config_path() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    Some(exe.parent()?.join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_app_channels() {
        let config = RunnerConfig::default();
        assert_eq!(config.system_info_channel(), "com.example.my_app/system_info");
        assert_eq!(config.form_handler_channel(), "com.example.my_app/form_handler");
        assert!(config.form_library.contains("CSharpFormSaver"));
        #[cfg(target_os = "windows")]
        assert_eq!(config.form_library, "CSharpFormSaver.dll");
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let config =
            RunnerConfig::from_json_str(r#"{ "window_title": "Forms", "window_width": 800 }"#)
                .unwrap();
        assert_eq!(config.window_title, "Forms");
        assert_eq!(config.window_width, 800);
        assert_eq!(config.window_height, DEFAULT_WINDOW_HEIGHT);
        assert_eq!(config.channel_prefix, DEFAULT_CHANNEL_PREFIX);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(RunnerConfig::from_json_str("{ window_title: ").is_err());
        assert!(RunnerConfig::from_json_str(r#"{ "window_width": "wide" }"#).is_err());
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let path = std::env::temp_dir().join("flutter_form_runner_no_such_config.json");
        assert!(RunnerConfig::from_file(&path).unwrap().is_none());
    }

    #[test]
    fn file_contents_are_loaded() {
        let path = std::env::temp_dir().join(format!(
            "flutter_form_runner_config_{}.json",
            std::process::id()
        ));
        fs::write(&path, r#"{ "channel_prefix": "org.acme.forms" }"#).unwrap();
        let config = RunnerConfig::from_file(&path).unwrap().unwrap();
        fs::remove_file(&path).ok();
        assert_eq!(config.form_handler_channel(), "org.acme.forms/form_handler");
        assert_eq!(config.source.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn overrides_replace_non_empty_values() {
        let mut config = RunnerConfig::default();
        config.apply_overrides(|key| match key {
            ENV_FORM_LIBRARY => Some(r"C:\forms\FormSaver.dll".to_string()),
            ENV_CHANNEL_PREFIX => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.form_library, r"C:\forms\FormSaver.dll");
        assert_eq!(config.channel_prefix, DEFAULT_CHANNEL_PREFIX);
        assert_eq!(config.overridden_by, [ENV_FORM_LIBRARY]);
    }

    #[test]
    fn json_cannot_set_bookkeeping_fields() {
        let config =
            RunnerConfig::from_json_str(r#"{ "source": "x.json", "overridden_by": ["A"] }"#)
                .unwrap();
        assert_eq!(config.source, None);
        assert!(config.overridden_by.is_empty());
    }
}
