//! Setting registration and lookup
//!
//! The registry keeps settings in insertion order, grouped by section:
//! a new setting is spliced in directly after the last entry of its
//! section so the settings file and any enumeration stay organized no
//! matter what order daemon components register in.

use super::store::FileStore;
use crate::error::{FabricError, Result};
use std::fmt;
use tracing::{debug, info};

/// Value type of a setting
///
/// Values travel as strings on the wire and in the settings file; the
/// kind gates which strings a write may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    /// `true` or `false`
    Bool,
    /// Signed 64-bit integer
    Int,
    /// 64-bit float
    Float,
    /// Free-form text
    Text,
}

impl SettingKind {
    /// Whether `value` is acceptable for this kind
    pub fn validate(&self, value: &str) -> bool {
        match self {
            SettingKind::Bool => value == "true" || value == "false",
            SettingKind::Int => value.parse::<i64>().is_ok(),
            SettingKind::Float => value.parse::<f64>().is_ok(),
            SettingKind::Text => true,
        }
    }

    /// Stable lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKind::Bool => "bool",
            SettingKind::Int => "int",
            SettingKind::Float => "float",
            SettingKind::Text => "text",
        }
    }
}

impl fmt::Display for SettingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What [`SettingsRegistry::register`] found in the persisted store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// No persisted override, the default value is live
    Registered,
    /// A persisted override replaced the default
    RegisteredPersisted,
}

type SettingCallback = Box<dyn FnMut(&Setting) + Send>;

/// One registered setting
pub struct Setting {
    section: String,
    name: String,
    value: String,
    kind: SettingKind,
    dirty: bool,
    on_change: Option<SettingCallback>,
}

impl Setting {
    /// Section the setting belongs to
    pub fn section(&self) -> &str {
        &self.section
    }

    /// Setting name within its section
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current value
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Value kind
    pub fn kind(&self) -> SettingKind {
        self.kind
    }

    /// Whether the value has deviated from the registered default,
    /// either through a persisted override or a runtime write.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

impl fmt::Debug for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Setting")
            .field("section", &self.section)
            .field("name", &self.name)
            .field("value", &self.value)
            .field("kind", &self.kind)
            .field("dirty", &self.dirty)
            .finish()
    }
}

/// Ordered collection of device settings
///
/// Duplicate `(section, name)` pairs are allowed; lookups return the
/// first match from the head of the list, so the earliest registration
/// wins and later duplicates are inert until it is removed.
pub struct SettingsRegistry {
    items: Vec<Setting>,
    store: FileStore,
}

impl SettingsRegistry {
    /// Create a registry with no persisted overrides
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            store: FileStore::empty(),
        }
    }

    /// Create a registry backed by a persisted store
    pub fn with_store(store: FileStore) -> Self {
        Self {
            items: Vec::new(),
            store,
        }
    }

    /// Register a setting with a default value
    ///
    /// The default must validate against `kind`. If the store holds an
    /// override for `(section, name)` it is applied verbatim, the
    /// setting starts dirty, and the outcome says so. An empty persisted
    /// string is a real override, not an absent one.
    pub fn register(
        &mut self,
        section: &str,
        name: &str,
        default: &str,
        kind: SettingKind,
    ) -> Result<RegisterOutcome> {
        self.insert(section, name, default, kind, None)
    }

    /// Register a setting with a change callback
    ///
    /// The callback fires after every successful [`SettingsRegistry::set`]
    /// on this entry, with the updated setting. It does not fire for the
    /// persisted override applied during registration.
    pub fn register_with_notify(
        &mut self,
        section: &str,
        name: &str,
        default: &str,
        kind: SettingKind,
        on_change: impl FnMut(&Setting) + Send + 'static,
    ) -> Result<RegisterOutcome> {
        self.insert(section, name, default, kind, Some(Box::new(on_change)))
    }

    fn insert(
        &mut self,
        section: &str,
        name: &str,
        default: &str,
        kind: SettingKind,
        on_change: Option<SettingCallback>,
    ) -> Result<RegisterOutcome> {
        if !kind.validate(default) {
            return Err(FabricError::InvalidValue {
                value: default.to_string(),
                kind,
            });
        }

        let mut setting = Setting {
            section: section.to_string(),
            name: name.to_string(),
            value: default.to_string(),
            kind,
            dirty: false,
            on_change,
        };

        let outcome = match self.store.get(section, name) {
            Some(persisted) => {
                // Applied verbatim: the file may hold values the kind
                // would reject, and the device still has to come up.
                debug!(section, name, value = persisted, "Applying persisted override");
                setting.value = persisted.to_string();
                setting.dirty = true;
                RegisterOutcome::RegisteredPersisted
            }
            None => RegisterOutcome::Registered,
        };

        // Splice in after the last entry of the same section so the
        // section stays contiguous.
        let at = self
            .items
            .iter()
            .rposition(|s| s.section == section)
            .map(|i| i + 1)
            .unwrap_or(self.items.len());
        self.items.insert(at, setting);

        info!(section, name, kind = %kind, "Registered setting");
        Ok(outcome)
    }

    /// Update a setting's value
    ///
    /// The first `(section, name)` match from the head is updated. The
    /// new value must validate against the setting's kind. On success
    /// the setting is marked dirty and its change callback, if any,
    /// fires with the updated entry.
    pub fn set(&mut self, section: &str, name: &str, value: &str) -> Result<()> {
        let idx = self
            .items
            .iter()
            .position(|s| s.section == section && s.name == name)
            .ok_or_else(|| FabricError::UnknownSetting {
                section: section.to_string(),
                name: name.to_string(),
            })?;

        let kind = self.items[idx].kind;
        if !kind.validate(value) {
            return Err(FabricError::InvalidValue {
                value: value.to_string(),
                kind,
            });
        }

        self.items[idx].value = value.to_string();
        self.items[idx].dirty = true;
        info!(section, name, value, "Setting updated");

        // The callback borrows the setting it lives in, so lift it out
        // for the call.
        let mut callback = self.items[idx].on_change.take();
        if let Some(notify) = &mut callback {
            notify(&self.items[idx]);
        }
        self.items[idx].on_change = callback;

        Ok(())
    }

    /// Look up the first `(section, name)` match from the head
    pub fn get(&self, section: &str, name: &str) -> Option<&Setting> {
        self.items
            .iter()
            .find(|s| s.section == section && s.name == name)
    }

    /// Look up a setting by registration-order index
    pub fn by_index(&self, index: usize) -> Option<&Setting> {
        self.items.get(index)
    }

    /// Number of registered settings, duplicates included
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether any settings are registered
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate settings in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Setting> {
        self.items.iter()
    }
}

impl Default for SettingsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SettingsRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsRegistry")
            .field("len", &self.items.len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    // ========================================================================
    // Kind validation
    // ========================================================================

    #[test]
    fn test_kind_validation() {
        assert!(SettingKind::Bool.validate("true"));
        assert!(SettingKind::Bool.validate("false"));
        assert!(!SettingKind::Bool.validate("True"));
        assert!(!SettingKind::Bool.validate("1"));

        assert!(SettingKind::Int.validate("-42"));
        assert!(!SettingKind::Int.validate("4.2"));
        assert!(!SettingKind::Int.validate(""));

        assert!(SettingKind::Float.validate("4.2"));
        assert!(SettingKind::Float.validate("-1e9"));
        assert!(!SettingKind::Float.validate("fast"));

        assert!(SettingKind::Text.validate(""));
        assert!(SettingKind::Text.validate("anything at all"));
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(SettingKind::Bool.to_string(), "bool");
        assert_eq!(SettingKind::Int.to_string(), "int");
        assert_eq!(SettingKind::Float.to_string(), "float");
        assert_eq!(SettingKind::Text.to_string(), "text");
    }

    // ========================================================================
    // Registration
    // ========================================================================

    #[test]
    fn test_register_uses_default_without_override() {
        let mut registry = SettingsRegistry::new();
        let outcome = registry
            .register("uart0", "baudrate", "115200", SettingKind::Int)
            .unwrap();

        assert_eq!(outcome, RegisterOutcome::Registered);
        let setting = registry.get("uart0", "baudrate").unwrap();
        assert_eq!(setting.value(), "115200");
        assert!(!setting.is_dirty());
    }

    #[test]
    fn test_register_rejects_invalid_default() {
        let mut registry = SettingsRegistry::new();
        let result = registry.register("uart0", "baudrate", "fast", SettingKind::Int);
        assert!(matches!(result, Err(FabricError::InvalidValue { .. })));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_persisted_override_applies_verbatim_and_dirties() {
        let mut store = FileStore::empty();
        store.insert("uart0", "baudrate", "57600");
        let mut registry = SettingsRegistry::with_store(store);

        let outcome = registry
            .register("uart0", "baudrate", "115200", SettingKind::Int)
            .unwrap();

        assert_eq!(outcome, RegisterOutcome::RegisteredPersisted);
        let setting = registry.get("uart0", "baudrate").unwrap();
        assert_eq!(setting.value(), "57600");
        assert!(setting.is_dirty());
    }

    #[test]
    fn test_empty_persisted_string_is_an_override() {
        let mut store = FileStore::empty();
        store.insert("ntrip", "password", "");
        let mut registry = SettingsRegistry::with_store(store);

        let outcome = registry
            .register("ntrip", "password", "changeme", SettingKind::Text)
            .unwrap();

        assert_eq!(outcome, RegisterOutcome::RegisteredPersisted);
        let setting = registry.get("ntrip", "password").unwrap();
        assert_eq!(setting.value(), "");
        assert!(setting.is_dirty());
    }

    #[test]
    fn test_sections_stay_contiguous() {
        let mut registry = SettingsRegistry::new();
        registry.register("uart0", "baudrate", "115200", SettingKind::Int).unwrap();
        registry.register("ntrip", "enable", "false", SettingKind::Bool).unwrap();
        // Late registration for uart0 splices in after its section
        registry.register("uart0", "mode", "sbp", SettingKind::Text).unwrap();

        let order: Vec<(&str, &str)> = registry
            .iter()
            .map(|s| (s.section(), s.name()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("uart0", "baudrate"),
                ("uart0", "mode"),
                ("ntrip", "enable"),
            ]
        );
    }

    #[test]
    fn test_by_index_follows_registration_order() {
        let mut registry = SettingsRegistry::new();
        registry.register("a", "one", "1", SettingKind::Int).unwrap();
        registry.register("b", "two", "2", SettingKind::Int).unwrap();

        assert_eq!(registry.by_index(0).unwrap().name(), "one");
        assert_eq!(registry.by_index(1).unwrap().name(), "two");
        assert!(registry.by_index(2).is_none());
    }

    // ========================================================================
    // Updates
    // ========================================================================

    #[test]
    fn test_set_validates_and_dirties() {
        let mut registry = SettingsRegistry::new();
        registry.register("uart0", "baudrate", "115200", SettingKind::Int).unwrap();

        registry.set("uart0", "baudrate", "230400").unwrap();
        let setting = registry.get("uart0", "baudrate").unwrap();
        assert_eq!(setting.value(), "230400");
        assert!(setting.is_dirty());

        let result = registry.set("uart0", "baudrate", "fast");
        assert!(matches!(result, Err(FabricError::InvalidValue { .. })));
        // Failed write leaves the old value alone
        assert_eq!(registry.get("uart0", "baudrate").unwrap().value(), "230400");
    }

    #[test]
    fn test_set_unknown_setting_errors() {
        let mut registry = SettingsRegistry::new();
        let result = registry.set("uart0", "baudrate", "9600");
        assert!(matches!(result, Err(FabricError::UnknownSetting { .. })));
    }

    #[test]
    fn test_change_callback_fires_on_set_only() {
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let mut store = FileStore::empty();
        store.insert("uart0", "mode", "nmea");
        let mut registry = SettingsRegistry::with_store(store);
        registry
            .register_with_notify("uart0", "mode", "sbp", SettingKind::Text, move |s| {
                sink.lock().push(s.value().to_string());
            })
            .unwrap();

        // Persisted override at registration does not notify
        assert!(seen.lock().is_empty());

        registry.set("uart0", "mode", "rtcm3").unwrap();
        registry.set("uart0", "mode", "sbp").unwrap();
        assert_eq!(*seen.lock(), vec!["rtcm3".to_string(), "sbp".to_string()]);

        // Failed writes do not notify
        let _ = registry.set("uart0", "missing", "x");
        assert_eq!(seen.lock().len(), 2);
    }

    // ========================================================================
    // Duplicates
    // ========================================================================

    #[test]
    fn test_duplicates_allowed_first_match_wins() {
        let mut registry = SettingsRegistry::new();
        registry.register("uart0", "baudrate", "115200", SettingKind::Int).unwrap();
        registry.register("uart0", "baudrate", "9600", SettingKind::Int).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("uart0", "baudrate").unwrap().value(), "115200");

        // Writes land on the first match too
        registry.set("uart0", "baudrate", "230400").unwrap();
        assert_eq!(registry.by_index(0).unwrap().value(), "230400");
        assert_eq!(registry.by_index(1).unwrap().value(), "9600");
    }
}
