// procwatch Infrastructure - Configuration Store
// Implements: ConfigStore (JSON document on disk)

mod json_store;

pub use json_store::JsonConfigStore;
