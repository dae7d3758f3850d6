//! Shared services used by client apps.

mod store;

pub use store::StoreService;
