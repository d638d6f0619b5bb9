pub mod caption;
pub mod dedup;
pub mod filter;
pub mod http;
pub mod images;
pub mod pipeline;

pub use caption::CaptionGenerator;
pub use dedup::{IdentityKey, SeenKeys};
pub use filter::CategoryFilter;
pub use http::{HttpFetcher, PageFetcher, RequestPacer};
pub use images::ImageSelector;
pub use pipeline::RecallPipeline;
