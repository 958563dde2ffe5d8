pub mod app_config;
pub mod catalog_repo;
pub mod events;
pub mod timeline_repo;

pub use catalog_repo::{CatalogLoadError, InMemoryCarrierCatalog};
pub use events::StatusBroadcaster;
pub use timeline_repo::InMemoryTimelineRepository;
