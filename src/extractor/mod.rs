pub mod gallery;
pub mod listing;

pub use listing::{ListingDocument, ListingExtraction};
