//! Shared test utilities for the geoplot workspace.
//!
//! This crate provides common testing infrastructure including:
//! - A scripted mock backend connection that records its queries
//! - Canned backend responses (ranks, channels, events)
//! - Registry and configuration builders
//! - Approximate float assertions
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../../crates/test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{fixtures, MockBackend};
//! ```

pub mod fixtures;
pub mod mock;

pub use fixtures::*;
pub use mock::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Element-wise approximate equality of two float slices.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_series_approx_eq;
///
/// assert_series_approx_eq!(&[2.0, 3.0], &[2.0, 3.0000001], 1e-6);
/// ```
#[macro_export]
macro_rules! assert_series_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: &[f64] = $left;
        let right: &[f64] = $right;
        if left.len() != right.len() {
            panic!(
                "assertion failed: series lengths differ\n  left: `{:?}`,\n right: `{:?}`",
                left, right
            );
        }
        for (l, r) in left.iter().zip(right.iter()) {
            $crate::assert_approx_eq!(*l, *r, $epsilon);
        }
    }};
}
