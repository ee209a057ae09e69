//! In-process page host that executes `.page` module sources.
//!
//! Executed modules register pages into a staging set. The staging set only
//! replaces the live set on `hot_reload_finished`, so requests never see a
//! partially reloaded page set.

pub mod parser;
pub mod render;

use crate::domain::model::Page;
use crate::domain::ports::PageHost;
use crate::utils::error::{Result, RunnerError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

type PageSet = BTreeMap<String, Arc<Page>>;

#[derive(Debug, Default)]
pub struct ScriptHost {
    staging: Mutex<Option<PageSet>>,
    live: RwLock<Arc<PageSet>>,
}

impl ScriptHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths currently being served.
    pub fn routes(&self) -> Vec<String> {
        self.live_pages().keys().cloned().collect()
    }

    fn live_pages(&self) -> Arc<PageSet> {
        self.live
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stage every page of one module, or none of them.
    fn stage(&self, module_name: &str, pages: Vec<Page>) -> Result<usize> {
        let mut staging = self.staging.lock().unwrap_or_else(PoisonError::into_inner);
        let staged = staging.get_or_insert_with(PageSet::new);

        let mut seen = Vec::with_capacity(pages.len());
        for page in &pages {
            if staged.contains_key(&page.path) || seen.contains(&page.path.as_str()) {
                return Err(RunnerError::DuplicatePathError {
                    path: page.path.clone(),
                    module: module_name.to_string(),
                });
            }
            seen.push(page.path.as_str());
        }

        let count = pages.len();
        for page in pages {
            staged.insert(page.path.clone(), Arc::new(page));
        }
        Ok(count)
    }
}

#[async_trait]
impl PageHost for ScriptHost {
    async fn reset(&self) {
        let mut staging = self.staging.lock().unwrap_or_else(PoisonError::into_inner);
        *staging = Some(PageSet::new());
        tracing::debug!("Page host reset");
    }

    async fn execute_module(&self, path: &Path, module_name: &str) -> Result<()> {
        let source = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| RunnerError::ModuleIoError {
                path: path.to_path_buf(),
                source,
            })?;

        let pages = parser::parse_module(&source, module_name)?;
        let count = self.stage(module_name, pages)?;

        tracing::debug!(
            "Executed module {} from {} ({} page(s))",
            module_name,
            path.display(),
            count
        );
        Ok(())
    }

    async fn hot_reload_finished(&self) {
        let staged = self
            .staging
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or_default();

        let count = staged.len();
        *self.live.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(staged);
        tracing::info!("Hot reload finished, serving {} page(s)", count);
    }

    fn page(&self, path: &str) -> Option<Arc<Page>> {
        self.live_pages().get(path).cloned()
    }
}
