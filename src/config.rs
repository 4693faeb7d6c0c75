// src/config.rs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, env, fs, net::SocketAddr, path::Path, time::Duration};
use tracing::{info, warn};

/// Environment variable pointing at an optional YAML settings file.
pub const CONFIG_ENV: &str = "PAINEL_CONFIG";

/// Runtime settings. Every field has a default so an absent file is fine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub bind: SocketAddr,
    pub cache_ttl_secs: u64,
    pub request_timeout_secs: u64,
    pub log_level: String,
    /// Prefix CSV downloads with a UTF-8 byte-order mark (helps spreadsheet apps).
    pub csv_bom: bool,
    /// Page slug → share URL, overriding the built-in sheet for that page.
    pub sheets: BTreeMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            cache_ttl_secs: 600,
            request_timeout_secs: 30,
            log_level: "info,painel_vigilancia=info".to_string(),
            csv_bom: true,
            sheets: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Load from `path` (or `$PAINEL_CONFIG`), then apply `PORT` / `LOG_LEVEL`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let from_env = env::var(CONFIG_ENV).ok();
        let path = path.map(Path::to_path_buf).or_else(|| from_env.map(Into::into));

        let mut settings = match path {
            Some(p) => {
                let text = fs::read_to_string(&p)
                    .with_context(|| format!("reading settings file {}", p.display()))?;
                let parsed = Self::from_yaml(&text)
                    .with_context(|| format!("parsing settings file {}", p.display()))?;
                info!(path = %p.display(), "loaded settings");
                parsed
            }
            None => Self::default(),
        };

        settings.apply_env(env::var("PORT").ok(), env::var("LOG_LEVEL").ok());
        Ok(settings)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).context("invalid settings YAML")
    }

    fn apply_env(&mut self, port: Option<String>, log_level: Option<String>) {
        if let Some(port) = port {
            match port.trim().parse::<u16>() {
                Ok(p) => self.bind.set_port(p),
                Err(_) => warn!(port = %port, "ignoring unparseable PORT"),
            }
        }
        if let Some(level) = log_level.filter(|l| !l.trim().is_empty()) {
            self.log_level = level;
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Share URL override for a page, if configured.
    pub fn sheet_override(&self, slug: &str) -> Option<&str> {
        self.sheets.get(slug).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_match_original_cache_window() {
        let s = Settings::default();
        assert_eq!(s.cache_ttl(), Duration::from_secs(600));
        assert_eq!(s.bind.port(), 8080);
        assert!(s.csv_bom);
        assert!(s.sheets.is_empty());
    }

    #[test]
    fn yaml_fills_missing_fields_with_defaults() -> Result<()> {
        let s = Settings::from_yaml(
            "cache_ttl_secs: 60\nsheets:\n  dengue: https://docs.google.com/spreadsheets/d/abc/edit\n",
        )?;
        assert_eq!(s.cache_ttl_secs, 60);
        assert_eq!(s.request_timeout_secs, 30);
        assert_eq!(
            s.sheet_override("dengue"),
            Some("https://docs.google.com/spreadsheets/d/abc/edit")
        );
        assert_eq!(s.sheet_override("visa"), None);
        Ok(())
    }

    #[test]
    fn empty_yaml_is_default() -> Result<()> {
        assert_eq!(Settings::from_yaml("  \n")?, Settings::default());
        Ok(())
    }

    #[test]
    fn env_overrides_port_and_level() {
        let mut s = Settings::default();
        s.apply_env(Some("9000".into()), Some("debug".into()));
        assert_eq!(s.bind.port(), 9000);
        assert_eq!(s.log_level, "debug");

        s.apply_env(Some("not-a-port".into()), Some("   ".into()));
        assert_eq!(s.bind.port(), 9000);
        assert_eq!(s.log_level, "debug");
    }

    #[test]
    fn load_reads_explicit_file() -> Result<()> {
        let mut tmp = NamedTempFile::new()?;
        writeln!(tmp, "csv_bom: false\nrequest_timeout_secs: 5")?;
        let s = Settings::load(Some(tmp.path()))?;
        assert!(!s.csv_bom);
        assert_eq!(s.request_timeout(), Duration::from_secs(5));
        Ok(())
    }

    #[test]
    fn load_fails_on_missing_file() {
        let err = Settings::load(Some(Path::new("/definitely/not/here.yaml")));
        assert!(err.is_err());
    }
}
