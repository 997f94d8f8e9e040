use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tg_cfg::ConfigSet;

use crate::cfgs::MANIFEST_FILENAME;
use crate::layout::ProjectLayout;
use crate::Error;

/// Definition of a project, parsed from a [`MANIFEST_FILENAME`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestSpec {
    /// Path to the thrift compiler, or a bare name looked up on the `PATH`.
    pub executable: Option<String>,
    /// Overrides of the conventional project layout.
    #[serde(default)]
    pub layout: LayoutSpec,
    /// Values for any registered [`Config`], by name.
    ///
    /// [`Config`]: tg_cfg::Config
    #[serde(default)]
    pub configs: BTreeMap<String, toml::Value>,
}

/// Layout directories, relative to the project directory.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayoutSpec {
    pub source_dir: Option<PathBuf>,
    pub test_source_dir: Option<PathBuf>,
    pub build_dir: Option<PathBuf>,
}

impl ManifestSpec {
    pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Load the manifest of the project at `project_dir`, if it has one.
    pub fn load(project_dir: &Path, configs: &ConfigSet) -> Result<Option<Self>, Error> {
        let path = project_dir.join(MANIFEST_FILENAME.read(configs).as_str());
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(?path, "no manifest");
                return Ok(None);
            }
            Err(source) => return Err(Error::ManifestRead { path, source }),
        };

        tracing::info!(?path, "reading manifest");
        let spec = ManifestSpec::from_toml(&raw).map_err(|source| Error::ManifestParse {
            path: path.clone(),
            source,
        })?;
        Ok(Some(spec))
    }

    /// Apply the `[configs]` table of this manifest to `configs`.
    pub fn apply_configs(&self, configs: &ConfigSet) -> Result<(), Error> {
        for (name, value) in &self.configs {
            let value = match value {
                toml::Value::String(value) => value.clone(),
                toml::Value::Integer(_) | toml::Value::Boolean(_) => value.to_string(),
                other => {
                    return Err(Error::Config(format!(
                        "config '{name}' must be a string, integer, or boolean, found {}",
                        other.type_str()
                    )));
                }
            };
            configs.try_update(name, &value).map_err(config_error)?;
        }
        Ok(())
    }

    /// The project layout, conventional defaults overridden by this manifest.
    pub fn layout(&self, project_dir: &Path) -> ProjectLayout {
        let mut layout = ProjectLayout::conventional(project_dir);
        if let Some(dir) = &self.layout.source_dir {
            layout.source_dir = project_dir.join(dir);
        }
        if let Some(dir) = &self.layout.test_source_dir {
            layout.test_source_dir = project_dir.join(dir);
        }
        if let Some(dir) = &self.layout.build_dir {
            layout.build_dir = project_dir.join(dir);
        }
        layout
    }
}

/// Project settings given on the command line, they take precedence over the manifest.
#[derive(Debug, Clone, Default)]
pub struct ProjectOverrides {
    /// Relative paths are resolved against the project directory.
    pub source_dir: Option<PathBuf>,
    pub test_source_dir: Option<PathBuf>,
    pub build_dir: Option<PathBuf>,
    /// `name=value` config assignments.
    pub configs: Vec<String>,
}

/// A project with its configuration and layout resolved.
#[derive(Debug)]
pub struct ResolvedProject {
    pub configs: ConfigSet,
    pub layout: ProjectLayout,
    /// Compiler named by the manifest, if any.
    pub executable: Option<String>,
}

/// Resolve the project at `project_dir`.
///
/// Configs are applied in increasing precedence from the manifest, `TG_*` variables found
/// through `env`, and `overrides`. Overrides are applied before loading the manifest as well,
/// since they can rename it.
pub fn resolve_project<F>(
    project_dir: &Path,
    overrides: &ProjectOverrides,
    env: F,
) -> Result<ResolvedProject, Error>
where
    F: Fn(&str) -> Option<String>,
{
    let configs = crate::cfgs::default_set();
    let apply_overrides = |configs: &ConfigSet| -> Result<(), Error> {
        configs.apply_env_with(&env).map_err(config_error)?;
        for assignment in &overrides.configs {
            configs.try_assign(assignment).map_err(config_error)?;
        }
        Ok(())
    };

    apply_overrides(&configs)?;
    let manifest = ManifestSpec::load(project_dir, &configs)?.unwrap_or_default();
    manifest.apply_configs(&configs)?;
    apply_overrides(&configs)?;

    let mut layout = manifest.layout(project_dir);
    if let Some(dir) = &overrides.source_dir {
        layout.source_dir = project_dir.join(dir);
    }
    if let Some(dir) = &overrides.test_source_dir {
        layout.test_source_dir = project_dir.join(dir);
    }
    if let Some(dir) = &overrides.build_dir {
        layout.build_dir = project_dir.join(dir);
    }
    tracing::debug!(?layout, "resolved project layout");

    Ok(ResolvedProject {
        configs,
        layout,
        executable: manifest.executable,
    })
}

fn config_error(err: impl std::fmt::Display) -> Error {
    Error::Config(format!("{err:#}"))
}
