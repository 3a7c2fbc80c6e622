//! The linear model that governs page placement within a segment.
//!
//! A [`Line`] maps a key's offset from its segment's base key to a fractional
//! page position; [`page_for_key`] turns that position into a page index.
//! The mapping is approximate by design - pages that overflow are chained
//! and later rewritten.

use serde::{Deserialize, Serialize};

use crate::types::Key;

/// An affine function `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Line {
    slope: f64,
    intercept: f64,
}

impl Line {
    /// Serialized size in bytes (two little-endian f64 values).
    pub const ENCODED_SIZE: usize = 16;

    /// Creates a new line.
    #[inline]
    #[must_use]
    pub const fn new(slope: f64, intercept: f64) -> Self {
        Self { slope, intercept }
    }

    /// Returns the slope.
    #[inline]
    #[must_use]
    pub const fn slope(&self) -> f64 {
        self.slope
    }

    /// Returns the intercept.
    #[inline]
    #[must_use]
    pub const fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Evaluates the line at `x`.
    #[inline]
    #[must_use]
    pub fn apply(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    /// Returns the inverse line, mapping outputs back to inputs.
    ///
    /// The result of applying the inverse must never be trusted directly in
    /// the key domain; float error can move it across a page boundary. Use
    /// it to bracket an integer search instead (see
    /// `segment::page_lower_boundaries`).
    #[must_use]
    pub fn invert(&self) -> Self {
        Self {
            slope: 1.0 / self.slope,
            intercept: -self.intercept / self.slope,
        }
    }

    /// Serializes the line into a 16-byte buffer.
    pub fn encode(&self, buf: &mut [u8]) {
        buf[..8].copy_from_slice(&self.slope.to_le_bytes());
        buf[8..16].copy_from_slice(&self.intercept.to_le_bytes());
    }

    /// Deserializes a line from a 16-byte buffer.
    #[must_use]
    pub fn decode(buf: &[u8]) -> Self {
        Self {
            slope: f64::from_le_bytes(buf[..8].try_into().unwrap()),
            intercept: f64::from_le_bytes(buf[8..16].try_into().unwrap()),
        }
    }
}

/// Maps a key to a page index within a segment of `page_count` pages.
///
/// The model's raw output is truncated and clamped into `[0, page_count)`,
/// so every key in the segment's range resolves to a valid page.
#[must_use]
pub fn page_for_key(base: Key, model: &Line, page_count: usize, key: Key) -> usize {
    debug_assert!(key >= base);
    let position = model.apply((key - base) as f64);
    if position <= 0.0 {
        return 0;
    }
    (position as usize).min(page_count - 1)
}
