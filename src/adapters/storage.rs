use crate::domain::ports::ModuleStore;
use crate::utils::error::{Result, RunnerError};
use std::path::{Path, PathBuf};

pub const MODULE_EXTENSION: &str = "page";

/// Persists generated modules as `<base_dir>/<name>.page`.
///
/// `base_dir` should live outside the deployment tree, which may be read-only.
#[derive(Debug, Clone)]
pub struct LocalModuleStore {
    base_dir: PathBuf,
}

impl LocalModuleStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

impl ModuleStore for LocalModuleStore {
    fn module_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(format!("{}.{}", name, MODULE_EXTENSION))
    }

    async fn write_module(&self, name: &str, source: &str) -> Result<PathBuf> {
        let full_path = self.module_path(name);

        tokio::fs::create_dir_all(&self.base_dir)
            .await
            .map_err(|source| RunnerError::ModuleIoError {
                path: self.base_dir.clone(),
                source,
            })?;

        tokio::fs::write(&full_path, source.as_bytes())
            .await
            .map_err(|source| RunnerError::ModuleIoError {
                path: full_path.clone(),
                source,
            })?;

        tracing::debug!("Wrote module {} ({} bytes)", full_path.display(), source.len());
        Ok(full_path)
    }
}
