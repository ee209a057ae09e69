use crate::domain::model::Page;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where generated module sources are persisted.
pub trait ModuleStore: Send + Sync {
    /// Deterministic location of a module's source, whether or not it exists yet.
    fn module_path(&self, name: &str) -> PathBuf;

    fn write_module(
        &self,
        name: &str,
        source: &str,
    ) -> impl std::future::Future<Output = Result<PathBuf>> + Send;
}

/// The page framework that executes modules and serves what they register.
///
/// A reload is `reset`, one `execute_module` per module, then
/// `hot_reload_finished`; pages become visible to `page` only once the reload
/// is finished.
#[async_trait]
pub trait PageHost: Send + Sync {
    async fn reset(&self);

    /// Load and run the source at `path` as the module `module_name`,
    /// registering every page it declares.
    async fn execute_module(&self, path: &Path, module_name: &str) -> Result<()>;

    async fn hot_reload_finished(&self);

    fn page(&self, path: &str) -> Option<Arc<Page>>;
}
