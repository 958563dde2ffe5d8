pub mod carrier;
pub mod snapshot;

pub use carrier::{Carrier, LaneTariff, Quote, ServiceLevel};
pub use snapshot::{CatalogError, CatalogSnapshot};
