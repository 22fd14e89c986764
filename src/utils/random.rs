// src/utils/random.rs
//! Process-wide random source
//!
//! One seeded generator is created at startup and handed to every component
//! that needs randomness. It is only touched while devices are being built
//! (client-id suffixes, per-generator noise seeds), never from a tick loop, so
//! a plain mutex is enough.

use crate::config::constants::publish::CLIENT_ID_SUFFIX_LEN;
use parking_lot::Mutex;
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// Shared, injectable random generator
pub type SharedRng = Arc<Mutex<StdRng>>;

/// Create the shared generator, seeded for reproducible runs or from OS entropy
pub fn shared_rng(seed: Option<u64>) -> SharedRng {
    let rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    Arc::new(Mutex::new(rng))
}

/// Draw a seed for a child generator
pub fn derive_seed(rng: &SharedRng) -> u64 {
    rng.lock().gen()
}

/// `{prefix}_{8 random ASCII alphanumerics}`
pub fn generate_client_id(prefix: &str, rng: &SharedRng) -> String {
    let mut guard = rng.lock();
    let suffix: String = (0..CLIENT_ID_SUFFIX_LEN)
        .map(|_| char::from(guard.sample(Alphanumeric)))
        .collect();
    format!("{}_{}", prefix, suffix)
}
