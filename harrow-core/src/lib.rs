pub mod auth;
pub mod baseline;
pub mod config;
pub mod data;
pub mod detect;
pub mod error;
pub mod fuzz;
pub mod payloads;
pub mod prioritizer;
pub mod report;
pub mod request;
pub mod scan;

pub use config::{AuthConfig, DetectionConfig, ScanConfig};
pub use data::{Attempt, AttemptResult, FuzzOutcome, Vulnerability};
pub use error::{HarrowError, Result};
pub use payloads::{Category, PayloadCatalog};
pub use scan::{Discovery, ScanContext, ScanReport};
