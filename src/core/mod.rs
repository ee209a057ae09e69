pub mod exec;
pub mod registry;
pub mod reload;
pub mod transform;

#[cfg(test)]
pub(crate) mod test_support;

pub use crate::domain::model::{Page, RegisteredModule, SecurityPolicy};
pub use crate::domain::ports::{ModuleStore, PageHost};
pub use crate::utils::error::Result;
