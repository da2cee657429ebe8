//! Backend declaration files.
//!
//! Backends are declared in TOML files discovered at startup. Each
//! directory in the search path may contain one declaration file
//! (`pusher_backends.toml` unless configured otherwise):
//!
//! ```toml
//! [[backends]]
//! name = "PrivateBase"
//! abstract = true
//! scope = "private"
//!
//! [[backends]]
//! name = "WidgetBackend"
//! entity = "Widget"
//! fields = ["name"]
//!
//! [[backends]]
//! name = "WidgetPrivateBackend"
//! extends = "PrivateBase"
//! entity = "Widget"
//! fields = ["name", "owner"]
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use config::{Config, File, FileFormat};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::serializer::FieldProjection;

use super::{BackendDescriptor, BackendRegistry, ChannelScope, RegistryBuilder};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendManifest {
    #[serde(default)]
    pub backends: Vec<BackendDeclaration>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendDeclaration {
    pub name: String,
    #[serde(default)]
    pub entity: Option<String>,
    #[serde(default)]
    pub fields: Option<Vec<String>>,
    /// public | private | presence
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(rename = "abstract", default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub extends: Option<String>,
    /// Channels contributed by the serializer
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub provider: Option<String>,
}

/// Parse one declaration file.
pub fn load_manifest(path: &Path) -> Result<BackendManifest> {
    let manifest = Config::builder()
        .add_source(File::from(path.to_path_buf()).format(FileFormat::Toml))
        .build()?
        .try_deserialize()?;
    Ok(manifest)
}

/// Look for `file_name` in every directory, in order. Missing files are skipped.
pub fn discover<P: AsRef<Path>>(dirs: &[P], file_name: &str) -> Result<Vec<BackendDeclaration>> {
    let mut declarations = Vec::new();

    for dir in dirs {
        let path: PathBuf = dir.as_ref().join(file_name);
        if !path.is_file() {
            tracing::debug!(path = %path.display(), "No backend declaration file");
            continue;
        }

        let manifest = load_manifest(&path)?;
        tracing::info!(
            path = %path.display(),
            count = manifest.backends.len(),
            "Loaded backend declarations"
        );
        declarations.extend(manifest.backends);
    }

    Ok(declarations)
}

/// Turn declarations into descriptors, resolving `extends` against abstract
/// bases declared earlier.
pub fn into_descriptors(declarations: Vec<BackendDeclaration>) -> Result<Vec<BackendDescriptor>> {
    let mut bases: HashMap<String, BackendDescriptor> = HashMap::new();
    let mut descriptors = Vec::with_capacity(declarations.len());

    for decl in declarations {
        let scope = decl
            .scope
            .as_deref()
            .map(str::parse::<ChannelScope>)
            .transpose()?;

        if decl.is_abstract {
            let mut base = BackendDescriptor::abstract_base(&decl.name)
                .with_scope(scope.unwrap_or_default());
            if let Some(provider) = &decl.provider {
                base = base.with_provider(provider);
            }
            bases.insert(decl.name.clone(), base.clone());
            descriptors.push(base);
            continue;
        }

        let serializer = match (&decl.entity, &decl.fields) {
            (Some(entity), Some(fields)) => Some(Arc::new(
                FieldProjection::new(entity.as_str(), fields.iter().cloned())
                    .with_channels(decl.channels.iter().cloned()),
            )),
            _ => None,
        };

        let mut descriptor = match (&decl.extends, serializer) {
            (Some(base_name), Some(serializer)) => {
                let base = bases.get(base_name).ok_or_else(|| {
                    AppError::Configuration(format!(
                        "backend '{}' extends unknown abstract backend '{}'",
                        decl.name, base_name
                    ))
                })?;
                base.extend(&decl.name, serializer)
            }
            (None, Some(serializer)) => BackendDescriptor::new(&decl.name, serializer),
            // No serialization mapping; the registry rejects it with a clear message
            (_, None) => BackendDescriptor::declared(
                &decl.name,
                decl.entity.as_deref().unwrap_or_default(),
                None,
            ),
        };

        if let Some(scope) = scope {
            descriptor = descriptor.with_scope(scope);
        }
        if let Some(provider) = &decl.provider {
            descriptor = descriptor.with_provider(provider);
        }

        descriptors.push(descriptor);
    }

    Ok(descriptors)
}

/// Discover declaration files and build the registry from them.
pub fn load_registry<P: AsRef<Path>>(dirs: &[P], file_name: &str) -> Result<BackendRegistry> {
    let declarations = discover(dirs, file_name)?;
    RegistryBuilder::new()
        .register_all(into_descriptors(declarations)?)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const DECLARATIONS: &str = r#"
[[backends]]
name = "PrivateBase"
abstract = true
scope = "private"

[[backends]]
name = "WidgetBackend"
entity = "Widget"
fields = ["name"]

[[backends]]
name = "WidgetPrivateBackend"
extends = "PrivateBase"
entity = "Widget"
fields = ["name", "owner"]
"#;

    #[test]
    fn test_load_registry_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("pusher_backends.toml"), DECLARATIONS).unwrap();

        let registry = load_registry(&[dir.path()], "pusher_backends.toml").unwrap();

        assert_eq!(registry.len(), 2);
        let widgets = registry.lookup("widget");
        assert_eq!(widgets[0].name(), "WidgetBackend");
        assert_eq!(widgets[0].scope(), ChannelScope::Public);
        assert_eq!(widgets[1].name(), "WidgetPrivateBackend");
        assert_eq!(widgets[1].scope(), ChannelScope::Private);
    }

    #[test]
    fn test_alternate_file_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("realtime.toml"), DECLARATIONS).unwrap();

        let default_name = load_registry(&[dir.path()], "pusher_backends.toml").unwrap();
        assert!(default_name.is_empty());

        let alternate = load_registry(&[dir.path()], "realtime.toml").unwrap();
        assert_eq!(alternate.len(), 2);
    }

    #[test]
    fn test_duplicate_across_directories_fails_load() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        fs::write(first.path().join("pusher_backends.toml"), DECLARATIONS).unwrap();
        fs::write(second.path().join("pusher_backends.toml"), DECLARATIONS).unwrap();

        let result = load_registry(&[first.path(), second.path()], "pusher_backends.toml");

        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_missing_fields_fail_registration() {
        let decl = BackendDeclaration {
            name: "Broken".to_string(),
            entity: Some("Widget".to_string()),
            fields: None,
            scope: None,
            is_abstract: false,
            extends: None,
            channels: Vec::new(),
            provider: None,
        };

        let descriptors = into_descriptors(vec![decl]).unwrap();
        let mut registry = BackendRegistry::new();
        let result = registry.register(descriptors.into_iter().next().unwrap());
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_unknown_base_is_rejected() {
        let decl = BackendDeclaration {
            name: "Orphan".to_string(),
            entity: Some("Widget".to_string()),
            fields: Some(vec!["name".to_string()]),
            scope: None,
            is_abstract: false,
            extends: Some("Nowhere".to_string()),
            channels: Vec::new(),
            provider: None,
        };

        assert!(matches!(
            into_descriptors(vec![decl]),
            Err(AppError::Configuration(_))
        ));
    }
}
