use crate::core::registry::ModuleRegistry;
use crate::domain::model::BASELINE_MODULE;
use crate::domain::ports::{ModuleStore, PageHost};
use crate::utils::error::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Turns a registry snapshot into the host's live page set.
pub struct ReloadOrchestrator {
    host: Arc<dyn PageHost>,
    baseline_path: PathBuf,
}

impl ReloadOrchestrator {
    pub fn new(host: Arc<dyn PageHost>, baseline_path: impl AsRef<Path>) -> Self {
        Self {
            host,
            baseline_path: make_path_absolute(baseline_path.as_ref()),
        }
    }

    pub fn baseline_path(&self) -> &Path {
        &self.baseline_path
    }

    /// Reset the host and execute every registered module.
    ///
    /// On error the host is left mid-reload; callers recover with
    /// [`ReloadOrchestrator::restore_baseline`].
    pub async fn reload<S: ModuleStore>(&self, registry: &ModuleRegistry, store: &S) -> Result<()> {
        self.host.reset().await;

        for module in registry.iter() {
            let path = if module.is_baseline() {
                self.baseline_path.clone()
            } else {
                store.module_path(module.name())
            };
            self.host.execute_module(&path, module.name()).await?;
        }

        self.host.hot_reload_finished().await;
        tracing::debug!("Reloaded modules: {:?}", registry.names());
        Ok(())
    }

    /// Reload with only the baseline module and shrink the registry to match.
    ///
    /// The registry is reset and the host told the reload finished even when
    /// the baseline itself fails to execute; that error is returned.
    pub async fn restore_baseline(&self, registry: &mut ModuleRegistry) -> Result<()> {
        self.host.reset().await;
        let result = self
            .host
            .execute_module(&self.baseline_path, BASELINE_MODULE)
            .await;
        registry.reset_to_baseline();
        self.host.hot_reload_finished().await;

        if let Err(e) = &result {
            tracing::error!("Baseline module failed to load during recovery: {}", e);
        }
        result
    }
}

/// Resolve `path` against the working directory when it is relative.
pub fn make_path_absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(e) => {
            tracing::warn!("Cannot resolve {} against working directory: {}", path.display(), e);
            path.to_path_buf()
        }
    }
}
