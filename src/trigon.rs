// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Sine/cosine lookup for centidegree angles.
//!
//! Every angle handled by the decoder is an integer number of hundredths of
//! a degree, so one full rotation is covered by a table of 36000 entries.
//! The table is built once per process and shared by every decoder.

use std::sync::{Arc, OnceLock};

/// Number of centidegrees in one rotation.
pub const ONE_ROUND: i32 = 36000;

static SHARED: OnceLock<Arc<Trigon>> = OnceLock::new();

/// Precomputed sine and cosine for `[0, 36000)` centidegrees.
#[derive(Debug)]
pub struct Trigon {
    sins: Vec<f32>,
    coss: Vec<f32>,
}

impl Trigon {
    /// Build a fresh table. Prefer [`Trigon::shared`].
    pub fn new() -> Self {
        let (sins, coss) = (0..ONE_ROUND)
            .map(|i| {
                let rads = (i as f64 * 0.01).to_radians();
                (rads.sin() as f32, rads.cos() as f32)
            })
            .unzip();
        Self { sins, coss }
    }

    /// The process-wide table, built on first use.
    pub fn shared() -> Arc<Trigon> {
        SHARED.get_or_init(|| Arc::new(Trigon::new())).clone()
    }

    /// Sine of `angle` centidegrees; `angle` must be in `[0, 36000)`.
    #[inline]
    pub fn sin(&self, angle: i32) -> f32 {
        debug_assert!((0..ONE_ROUND).contains(&angle), "angle {}", angle);
        self.sins[angle as usize]
    }

    /// Cosine of `angle` centidegrees; `angle` must be in `[0, 36000)`.
    #[inline]
    pub fn cos(&self, angle: i32) -> f32 {
        debug_assert!((0..ONE_ROUND).contains(&angle), "angle {}", angle);
        self.coss[angle as usize]
    }
}

impl Default for Trigon {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalize any centidegree angle into `[0, 36000)`.
#[inline]
pub fn normalize(angle: i32) -> i32 {
    angle.rem_euclid(ONE_ROUND)
}
