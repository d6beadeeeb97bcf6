//! Asset, template and secret resolution.

use std::path::{Path, PathBuf};

use secrecy::SecretString;
use tracing::debug;

use crate::error::AssetError;

/// Environment variable that pins the asset directory.
pub const ASSETS_DIR_ENV: &str = "ASSETS_DIR";

/// Environment variable that pins the template directory.
pub const TEMPLATES_DIR_ENV: &str = "TEMPLATES_DIR";

/// Locates asset and template directories and resolves secrets.
///
/// Directory lookup probes, in order:
/// - assets: `$ASSETS_DIR` if set, otherwise `<base>/assets` and `./assets`
/// - templates: `$TEMPLATES_DIR` if set, otherwise `<assets>/templates`,
///   `<base>/templates` and `./templates`
#[derive(Debug, Clone, Default)]
pub struct AssetManager {
    /// Directory the bot configuration lives in.
    pub base_path: Option<PathBuf>,
    env: EnvOverrides,
}

/// Snapshot of the directory override variables.
#[derive(Debug, Clone, Default)]
struct EnvOverrides {
    assets_dir: Option<String>,
    templates_dir: Option<String>,
}

impl AssetManager {
    /// Asset manager with explicit overrides instead of the environment.
    pub fn with_overrides(
        base_path: Option<PathBuf>,
        assets_dir: Option<String>,
        templates_dir: Option<String>,
    ) -> Self {
        Self {
            base_path,
            env: EnvOverrides {
                assets_dir,
                templates_dir,
            },
        }
    }

    /// Absolute path of the asset directory.
    pub fn assets_dir(&self) -> Result<PathBuf, AssetError> {
        let mut probes = Vec::new();
        if let Some(ref dir) = self.env.assets_dir {
            probes.push(PathBuf::from(dir));
        } else {
            if let Some(ref base) = self.base_path {
                probes.push(base.join("assets"));
            }
            probes.push(cwd().join("assets"));
        }

        first_dir(&probes, "assets").ok_or_else(|| AssetError::AssetDirNotFound {
            probed: display_all(&probes),
        })
    }

    /// Absolute path of the template directory.
    pub fn templates_dir(&self) -> Result<PathBuf, AssetError> {
        let mut probes = Vec::new();
        if let Some(ref dir) = self.env.templates_dir {
            probes.push(PathBuf::from(dir));
        } else {
            if let Ok(assets) = self.assets_dir() {
                probes.push(assets.join("templates"));
            }
            if let Some(ref base) = self.base_path {
                probes.push(base.join("templates"));
            }
            probes.push(cwd().join("templates"));
        }

        first_dir(&probes, "templates").ok_or_else(|| AssetError::TemplateDirNotFound {
            probed: display_all(&probes),
        })
    }

    /// Absolute path of a template file.
    pub fn template_path(&self, name: &str) -> Result<PathBuf, AssetError> {
        let path = self.templates_dir()?.join(name);
        if !path.is_file() {
            return Err(AssetError::TemplateNotFound(path.display().to_string()));
        }
        debug!(path = %path.display(), "Template file resolved");
        Ok(path)
    }

    /// Resolve a secret from the environment by exact, then upper-case name.
    pub fn secret(&self, name: &str) -> Result<SecretString, AssetError> {
        resolve_secret(name, |key| std::env::var(key).ok())
    }
}

fn resolve_secret(
    name: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<SecretString, AssetError> {
    lookup(name)
        .or_else(|| lookup(&name.to_uppercase()))
        .map(SecretString::from)
        .ok_or_else(|| AssetError::SecretNotFound(name.to_string()))
}

fn cwd() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd().join(path)
    }
}

fn first_dir(probes: &[PathBuf], what: &str) -> Option<PathBuf> {
    debug!(?probes, "Probing for {} directory", what);
    probes.iter().map(|p| absolute(p)).find(|p| p.is_dir())
}

fn display_all(paths: &[PathBuf]) -> Vec<String> {
    paths.iter().map(|p| absolute(p).display().to_string()).collect()
}
