//! Backend registry.
//!
//! Maps a lowercased entity type name to the ordered list of dispatch
//! backends declared for it. The registry is built once during bootstrap
//! (see [`RegistryBuilder`] and [`manifest`]) and shared read-only afterwards.
//!
//! Every registered backend runs for every mutation of its entity type, so
//! a public and a private policy can coexist for the same model.

mod descriptor;
pub mod manifest;

use std::collections::{HashMap, HashSet};

use crate::error::{AppError, Result};

pub use descriptor::{BackendDescriptor, BackendSummary, ChannelScope};

#[derive(Debug, Default)]
pub struct BackendRegistry {
    by_entity: HashMap<String, Vec<BackendDescriptor>>,
    names: HashSet<String>,
    next_position: usize,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a descriptor to its entity type's list.
    ///
    /// Abstract descriptors are skipped and `Ok(false)` is returned. A
    /// concrete descriptor without a serialization mapping, or one whose name
    /// is already registered, is rejected.
    pub fn register(&mut self, mut descriptor: BackendDescriptor) -> Result<bool> {
        if descriptor.is_abstract() {
            tracing::debug!(backend = %descriptor.name(), "Skipping abstract backend");
            return Ok(false);
        }

        if descriptor.serializer().is_none() {
            return Err(AppError::Configuration(format!(
                "backend '{}' requires a serializer",
                descriptor.name()
            )));
        }

        if descriptor.entity_type().is_empty() {
            return Err(AppError::Configuration(format!(
                "backend '{}' has no entity type",
                descriptor.name()
            )));
        }

        if !self.names.insert(descriptor.name().to_string()) {
            return Err(AppError::Configuration(format!(
                "backend '{}' is registered twice",
                descriptor.name()
            )));
        }

        descriptor.position = self.next_position;
        self.next_position += 1;

        tracing::info!(
            backend = %descriptor.name(),
            entity_type = %descriptor.entity_type(),
            scope = ?descriptor.scope(),
            position = descriptor.position(),
            "Registered dispatch backend"
        );

        self.by_entity
            .entry(descriptor.entity_type().to_string())
            .or_default()
            .push(descriptor);

        Ok(true)
    }

    /// Backends for an entity type, in registration order. Empty if none.
    pub fn lookup(&self, entity_type: &str) -> &[BackendDescriptor] {
        self.by_entity
            .get(&entity_type.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All descriptors, in registration order.
    pub fn descriptors(&self) -> Vec<&BackendDescriptor> {
        let mut all: Vec<_> = self.by_entity.values().flatten().collect();
        all.sort_by_key(|d| d.position());
        all
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Drop every registration. Test teardown only.
    pub fn clear(&mut self) {
        self.by_entity.clear();
        self.names.clear();
        self.next_position = 0;
    }
}

/// Collects descriptors during bootstrap and validates them in one go.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    pending: Vec<BackendDescriptor>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, descriptor: BackendDescriptor) -> Self {
        self.pending.push(descriptor);
        self
    }

    pub fn register_all<I>(mut self, descriptors: I) -> Self
    where
        I: IntoIterator<Item = BackendDescriptor>,
    {
        self.pending.extend(descriptors);
        self
    }

    /// Register everything in declaration order, failing on the first bad descriptor.
    pub fn build(self) -> Result<BackendRegistry> {
        let mut registry = BackendRegistry::new();
        for descriptor in self.pending {
            registry.register(descriptor)?;
        }
        Ok(registry)
    }
}
