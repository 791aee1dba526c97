//! Read-side services built on the repository and gateway traits.

mod integrity;
mod lineage;

pub use integrity::IntegrityService;
pub use lineage::LineageService;
