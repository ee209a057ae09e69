// Adapters layer: concrete implementations of the domain ports.

pub mod script_host;
pub mod storage;

pub use script_host::ScriptHost;
pub use storage::LocalModuleStore;
