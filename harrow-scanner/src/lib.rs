pub mod crawler;
pub mod dynamic;
pub mod error;
pub mod extractor;
pub mod normalize;
pub mod render;
pub mod result;
pub mod robots;

pub use crawler::Crawler;
pub use dynamic::DynamicCrawler;
pub use error::ScanError;
pub use extractor::{Form, Input, Method};
pub use render::{HttpRenderer, RenderedPage, Renderer};
pub use result::ExtractionResult;
pub use robots::RobotsPolicy;
