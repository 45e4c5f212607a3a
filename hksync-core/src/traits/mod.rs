pub mod health_store;
pub mod service;
pub mod transport;

pub use health_store::{AnchoredFetch, HealthStore};
pub use service::{BackgroundTaskToken, ServiceConfig};
pub use transport::{UploadOutcome, UploadTransport};
