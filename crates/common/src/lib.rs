//! Shared value types for the lumen engine.
//!
//! # Invariants
//! - `Transform` composes Scale, then Rotate, then Translate.
//! - Euler angles are radians applied as yaw (Y), pitch (X), roll (Z).

mod types;

pub use types::{Transform, ViewportSize};

pub fn crate_info() -> &'static str {
    "lumen-common v0.1.0"
}
