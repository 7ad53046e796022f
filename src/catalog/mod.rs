pub mod format;
pub mod pages;
pub mod search;

pub use pages::{HomePage, PropertyCard, PropertyDetail};
pub use search::{apply, matches_filters, matches_search};
