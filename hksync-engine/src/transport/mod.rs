//! HTTP boundary to the data-ingestion service.

pub mod client;
pub mod protocol;

pub use client::HttpTransport;
