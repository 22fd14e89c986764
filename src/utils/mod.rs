//! Common utilities shared by the simulator components
//!
//! - Wall-clock timestamps behind an injectable [`TimeProvider`]
//! - The seeded process-wide random source and client-id generation

pub mod random;
pub mod time;

pub use random::{derive_seed, generate_client_id, shared_rng, SharedRng};
pub use time::{current_timestamp_secs, MockTimeProvider, SystemTimeProvider, TimeProvider};
