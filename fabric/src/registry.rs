//! Plugin registry for framers and filters
//!
//! Maps protocol names to factories. Port adapters look framers up by
//! the name given in their options, so registration happens once at
//! startup and lookups stay read-only afterwards.

use crate::framers::{AllowAllFilter, BytesFramer, DelimitedFramer};
use loran_core::{FilterFactory, FrameFilter, Framer, FramerFactory, PluginError};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::{debug, info};

/// Registry of framer and filter factories
///
/// Names identify factories, so registering the same name twice is an
/// error rather than a silent replacement. Construction goes through
/// factories because framers are stateful: every pipeline needs its
/// own instance.
pub struct PluginRegistry {
    framers: HashMap<String, FramerFactory>,
    filters: HashMap<String, FilterFactory>,
}

impl PluginRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            framers: HashMap::new(),
            filters: HashMap::new(),
        }
    }

    /// Create a registry with the fabric built-ins: the `bytes` and
    /// `protobuf` framers and the `none` filter.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        // Infallible built-ins; the registry is empty so the names are free.
        let _ = registry.register_framer("bytes", Box::new(|| Ok(Box::new(BytesFramer::new()) as Box<dyn Framer>)));
        let _ = registry.register_framer("protobuf", Box::new(|| Ok(Box::new(DelimitedFramer::new()) as Box<dyn Framer>)));
        let _ = registry.register_filter("none", Box::new(|| Ok(Box::new(AllowAllFilter::new()) as Box<dyn FrameFilter>)));
        registry
    }

    /// Register a framer factory under a protocol name
    pub fn register_framer(
        &mut self,
        name: impl Into<String>,
        factory: FramerFactory,
    ) -> Result<(), PluginError> {
        match self.framers.entry(name.into()) {
            Entry::Occupied(entry) => Err(PluginError::DuplicateName(entry.key().clone())),
            Entry::Vacant(entry) => {
                info!(framer = %entry.key(), "Registered framer");
                entry.insert(factory);
                Ok(())
            }
        }
    }

    /// Register a filter factory under a name
    pub fn register_filter(
        &mut self,
        name: impl Into<String>,
        factory: FilterFactory,
    ) -> Result<(), PluginError> {
        match self.filters.entry(name.into()) {
            Entry::Occupied(entry) => Err(PluginError::DuplicateName(entry.key().clone())),
            Entry::Vacant(entry) => {
                info!(filter = %entry.key(), "Registered filter");
                entry.insert(factory);
                Ok(())
            }
        }
    }

    /// Check if a framer is registered under a name
    pub fn has_framer(&self, name: &str) -> bool {
        self.framers.contains_key(name)
    }

    /// Check if a filter is registered under a name
    pub fn has_filter(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    /// Number of registered framer factories
    pub fn framer_count(&self) -> usize {
        self.framers.len()
    }

    /// Number of registered filter factories
    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    /// Build a fresh framer instance by name
    pub fn framer(&self, name: &str) -> Result<Box<dyn Framer>, PluginError> {
        let factory = self
            .framers
            .get(name)
            .ok_or_else(|| PluginError::UnknownPlugin(name.to_string()))?;
        debug!(framer = name, "Instantiating framer");
        factory()
    }

    /// Build a fresh filter instance by name
    pub fn filter(&self, name: &str) -> Result<Box<dyn FrameFilter>, PluginError> {
        let factory = self
            .filters
            .get(name)
            .ok_or_else(|| PluginError::UnknownPlugin(name.to_string()))?;
        debug!(filter = name, "Instantiating filter");
        factory()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}
