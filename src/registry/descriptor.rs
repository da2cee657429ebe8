use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;

use crate::error::AppError;
use crate::serializer::RecordSerializer;

/// Channel namespace a backend publishes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelScope {
    #[default]
    Public,
    /// Access-controlled channels, `private-` prefix
    Private,
    /// Membership-aware channels, `presence-` prefix
    Presence,
}

impl ChannelScope {
    pub fn prefix(&self) -> &'static str {
        match self {
            ChannelScope::Public => "",
            ChannelScope::Private => "private-",
            ChannelScope::Presence => "presence-",
        }
    }

    /// Prefix every channel, keeping order.
    pub fn apply(&self, channels: Vec<String>) -> Vec<String> {
        match self {
            ChannelScope::Public => channels,
            scope => channels
                .into_iter()
                .map(|c| format!("{}{}", scope.prefix(), c))
                .collect(),
        }
    }
}

impl FromStr for ChannelScope {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "public" => Ok(ChannelScope::Public),
            "private" => Ok(ChannelScope::Private),
            "presence" => Ok(ChannelScope::Presence),
            other => Err(AppError::Configuration(format!(
                "unknown channel scope '{}'",
                other
            ))),
        }
    }
}

/// Identifies one dispatch policy.
///
/// Descriptors are built once during bootstrap and never change after they
/// are handed to the registry, which assigns their `position`.
#[derive(Clone)]
pub struct BackendDescriptor {
    name: String,
    entity_type: String,
    serializer: Option<Arc<dyn RecordSerializer>>,
    scope: ChannelScope,
    provider: Option<String>,
    is_abstract: bool,
    pub(crate) position: usize,
}

impl BackendDescriptor {
    /// Public backend for the serializer's entity type.
    pub fn new(name: impl Into<String>, serializer: Arc<dyn RecordSerializer>) -> Self {
        let entity_type = serializer.entity_type().to_lowercase();
        Self {
            name: name.into(),
            entity_type,
            serializer: Some(serializer),
            scope: ChannelScope::Public,
            provider: None,
            is_abstract: false,
            position: 0,
        }
    }

    /// Concrete backend whose serialization mapping may be missing.
    ///
    /// The registry refuses to register it if `serializer` is `None`.
    pub fn declared(
        name: impl Into<String>,
        entity_type: &str,
        serializer: Option<Arc<dyn RecordSerializer>>,
    ) -> Self {
        Self {
            name: name.into(),
            entity_type: entity_type.to_lowercase(),
            serializer,
            scope: ChannelScope::Public,
            provider: None,
            is_abstract: false,
            position: 0,
        }
    }

    /// Base policy that carries behavior (scope, provider) but is never registered.
    pub fn abstract_base(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity_type: String::new(),
            serializer: None,
            scope: ChannelScope::Public,
            provider: None,
            is_abstract: true,
            position: 0,
        }
    }

    /// Concrete backend inheriting this descriptor's scope and provider.
    pub fn extend(&self, name: impl Into<String>, serializer: Arc<dyn RecordSerializer>) -> Self {
        let mut derived = Self::new(name, serializer);
        derived.scope = self.scope;
        derived.provider = self.provider.clone();
        derived
    }

    pub fn with_scope(mut self, scope: ChannelScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn private(self) -> Self {
        self.with_scope(ChannelScope::Private)
    }

    pub fn presence(self) -> Self {
        self.with_scope(ChannelScope::Presence)
    }

    /// Deliver through a named provider instead of the default one.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lowercased entity type name; empty for abstract bases.
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn serializer(&self) -> Option<&Arc<dyn RecordSerializer>> {
        self.serializer.as_ref()
    }

    pub fn scope(&self) -> ChannelScope {
        self.scope
    }

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// Registration order, unique across the registry.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn summary(&self) -> BackendSummary {
        BackendSummary {
            name: self.name.clone(),
            entity_type: self.entity_type.clone(),
            scope: self.scope,
            provider: self.provider.clone(),
            position: self.position,
        }
    }
}

impl fmt::Debug for BackendDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendDescriptor")
            .field("name", &self.name)
            .field("entity_type", &self.entity_type)
            .field("has_serializer", &self.serializer.is_some())
            .field("scope", &self.scope)
            .field("provider", &self.provider)
            .field("is_abstract", &self.is_abstract)
            .field("position", &self.position)
            .finish()
    }
}

/// Serializable view of a registered descriptor.
#[derive(Debug, Clone, Serialize)]
pub struct BackendSummary {
    pub name: String,
    pub entity_type: String,
    pub scope: ChannelScope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub position: usize,
}
