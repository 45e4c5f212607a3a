//! Shared test doubles and sample builders for the hksync workspace.
//!
//! `MockHealthStore` replays adds and deletes through real anchored-query
//! paging, `RecordingTransport` captures wire calls in order, and
//! `StaticService` stands in for the app's identity and network state.

pub mod samples;
pub mod service;
pub mod store;
pub mod transport;

pub use samples::{
    base_time, carb_sample, cgm_sample, deletion, deletion_of, fingerstick_sample, food_sample,
    glucose_sample, insulin_sample, temp_basal_sample, ts, with_meta, workout_sample,
};
pub use service::StaticService;
pub use store::MockHealthStore;
pub use transport::{CallMethod, RecordingTransport, TransportCall, TransportReply};
