//! Persisted settings file
//!
//! The on-disk format is a small INI dialect: `[section]` headers,
//! `name=value` lines, `#` and `;` comments. Values are taken verbatim
//! after the `=` so whitespace and empty strings survive a round trip.

use super::registry::SettingsRegistry;
use crate::error::Result;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;
use tracing::{debug, warn};

/// Parsed contents of a settings file
#[derive(Debug, Default)]
pub struct FileStore {
    map: HashMap<(String, String), String>,
}

impl FileStore {
    /// A store with no overrides
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load a settings file
    ///
    /// A missing or unreadable file yields an empty store; first boot
    /// has no settings file and that is not an error. Unparseable lines
    /// are skipped with a warning.
    pub fn load(path: &Path) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(error) => {
                debug!(path = %path.display(), %error, "No persisted settings loaded");
                return Self::empty();
            }
        };

        let mut store = Self::empty();
        let mut section = String::new();
        for (lineno, line) in contents.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }
            if let Some(header) = trimmed.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
                section = header.trim().to_string();
                continue;
            }
            match line.split_once('=') {
                Some((name, value)) => {
                    store.insert(&section, name.trim(), value);
                }
                None => {
                    warn!(
                        path = %path.display(),
                        line = lineno + 1,
                        "Skipping unparseable settings line"
                    );
                }
            }
        }

        debug!(
            path = %path.display(),
            overrides = store.map.len(),
            "Loaded persisted settings"
        );
        store
    }

    /// Add or replace an override
    pub fn insert(&mut self, section: &str, name: &str, value: &str) {
        self.map
            .insert((section.to_string(), name.to_string()), value.to_string());
    }

    /// Look up an override
    pub fn get(&self, section: &str, name: &str) -> Option<&str> {
        self.map
            .get(&(section.to_string(), name.to_string()))
            .map(String::as_str)
    }

    /// Number of overrides held
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the store holds any overrides
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Write every registry value to `path`
    ///
    /// All current values are written, grouped by section in registry
    /// order, via a temp file and rename so a crash mid-write cannot
    /// truncate the previous file.
    pub fn save(path: &Path, registry: &SettingsRegistry) -> Result<()> {
        let mut out = String::new();
        let mut current: Option<&str> = None;
        for setting in registry.iter() {
            if current != Some(setting.section()) {
                if current.is_some() {
                    out.push('\n');
                }
                let _ = writeln!(out, "[{}]", setting.section());
                current = Some(setting.section());
            }
            let _ = writeln!(out, "{}={}", setting.name(), setting.value());
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = std::path::PathBuf::from(tmp);
        std::fs::write(&tmp, out)?;
        std::fs::rename(&tmp, path)?;

        debug!(path = %path.display(), settings = registry.len(), "Saved settings file");
        Ok(())
    }
}
