#![warn(missing_docs)]
//! Deterministic testing helpers shared by the worldtests.

mod snapshot;

use std::env;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

pub use snapshot::*;

/// Fresh path under the system temp directory, unique per call.
///
/// The directory itself is not created.
pub fn unique_temp_dir(tag: &str) -> PathBuf {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    env::temp_dir().join(format!("tesselbox_{tag}_{timestamp}"))
}
