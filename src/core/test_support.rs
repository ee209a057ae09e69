//! Page host and module store doubles shared by the engine tests.

use crate::domain::model::Page;
use crate::domain::ports::{ModuleStore, PageHost};
use crate::utils::error::{Result, RunnerError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Reset,
    Execute(PathBuf, String),
    Finished,
}

/// Records every host call; fails modules whose name starts with `failing_prefix`.
#[derive(Default)]
pub struct RecordingHost {
    calls: Mutex<Vec<Call>>,
    failing_prefix: Option<String>,
}

impl RecordingHost {
    pub fn failing(prefix: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing_prefix: Some(prefix.to_string()),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Returns the recorded calls and starts a fresh log.
    pub fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }
}

#[async_trait]
impl PageHost for RecordingHost {
    async fn reset(&self) {
        self.calls.lock().unwrap().push(Call::Reset);
    }

    async fn execute_module(&self, path: &Path, module_name: &str) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Execute(path.to_path_buf(), module_name.to_string()));
        match &self.failing_prefix {
            Some(prefix) if module_name.starts_with(prefix.as_str()) => {
                Err(RunnerError::script(module_name, 1, "boom"))
            }
            _ => Ok(()),
        }
    }

    async fn hot_reload_finished(&self) {
        self.calls.lock().unwrap().push(Call::Finished);
    }

    fn page(&self, _path: &str) -> Option<Arc<Page>> {
        None
    }
}

/// Store that maps names under `/modules` and never touches the disk.
pub struct FixedStore;

impl ModuleStore for FixedStore {
    fn module_path(&self, name: &str) -> PathBuf {
        PathBuf::from("/modules").join(format!("{}.page", name))
    }

    async fn write_module(&self, name: &str, _source: &str) -> Result<PathBuf> {
        Ok(self.module_path(name))
    }
}
