use crate::domain::model::RegisteredModule;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;

pub const DEFAULT_EXPIRATION_MINUTES: i64 = 10;

/// Upper bound accepted from configuration (one year).
pub const MAX_EXPIRATION_MINUTES: i64 = 525_600;

/// In-memory bookkeeping of which page modules exist.
///
/// The baseline module is always a member. The registry never touches the
/// file system or the page host.
#[derive(Debug, Clone)]
pub struct ModuleRegistry {
    modules: HashSet<RegisteredModule>,
    expiration: Duration,
}

impl ModuleRegistry {
    pub fn new(expiration: Duration) -> Self {
        let mut modules = HashSet::new();
        modules.insert(RegisteredModule::baseline());
        Self {
            modules,
            expiration,
        }
    }

    /// Returns false if a module with the same name was already present.
    pub fn register(&mut self, module: RegisteredModule) -> bool {
        self.modules.insert(module)
    }

    /// Drop every generated module created at or before `now - expiration`.
    ///
    /// A window reaching past the earliest representable time expires nothing.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> Vec<RegisteredModule> {
        let Some(cutoff) = now.checked_sub_signed(self.expiration) else {
            return Vec::new();
        };

        let expired: Vec<RegisteredModule> = self
            .modules
            .iter()
            .filter(|m| !m.is_baseline() && m.created_at() <= cutoff)
            .cloned()
            .collect();

        for module in &expired {
            self.modules.remove(module);
        }

        expired
    }

    pub fn reset_to_baseline(&mut self) {
        self.modules.clear();
        self.modules.insert(RegisteredModule::baseline());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.iter().any(|m| m.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredModule> {
        self.modules.iter()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Sorted module names, for logs and assertions.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.modules.iter().map(|m| m.name().to_string()).collect();
        names.sort();
        names
    }

    pub fn expiration(&self) -> Duration {
        self.expiration
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new(Duration::minutes(DEFAULT_EXPIRATION_MINUTES))
    }
}
