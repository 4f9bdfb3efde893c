//! SQLite persistence for swipe preferences, plus catalog snapshot sources.

pub mod catalog;
pub mod error;
pub mod schema;
pub mod store;

pub use catalog::{CatalogFile, CatalogSource, StaticCatalog};
pub use error::{Result, StoreError};
pub use store::PreferenceStore;
