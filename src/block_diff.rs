// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Per-block azimuth delta and timestamp interpolation.
//!
//! Every block in an MSOP packet carries one azimuth, but its channels fire
//! one after another while the head keeps rotating. To place each channel
//! the decoder needs the azimuth swept during one block (the delta) and the
//! time offset of the block from the start of the packet. Both are derived
//! from the neighbouring blocks in the same packet.
//!
//! A delta above [`MAX_BLOCK_AZ_DIFF`] centidegrees means the packet
//! straddles the blind zone of a limited field of view. The time step then
//! becomes the field-of-view jump and the delta is replaced with the
//! nominal per-block sweep.

use crate::trigon::ONE_ROUND;

/// Upper bound on blocks per packet across supported models.
pub const MAX_BLOCKS_PER_PKT: usize = 12;

/// Largest delta in centidegrees accepted as ordinary rotation.
pub const MAX_BLOCK_AZ_DIFF: i32 = 100;

/// Timing inputs that depend on the rotation speed and field of view.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlockTiming {
    /// Nominal time between consecutive firings, seconds.
    pub block_duration: f64,
    /// Time step across the blind zone, seconds.
    pub fov_jump: f64,
    /// Nominal azimuth swept per firing, centidegrees.
    pub theory_az_diff: i32,
}

impl BlockTiming {
    /// Derive timing for `rps` revolutions per second and a field of view
    /// from `fov_start` to `fov_end` centidegrees.
    ///
    /// The jump is never shorter than one block.
    pub fn new(block_duration: f64, rps: f64, fov_start: i32, fov_end: i32) -> Self {
        let theory_az_diff = (rps * ONE_ROUND as f64 * block_duration).round() as i32;

        let blind = if fov_start > fov_end {
            fov_start - fov_end
        } else {
            fov_start + ONE_ROUND - fov_end
        };
        let blind = if (0..ONE_ROUND).contains(&blind) { blind } else { 0 };
        let blind_time = blind as f64 / (ONE_ROUND as f64 * rps);

        Self {
            block_duration,
            fov_jump: blind_time.max(block_duration),
            theory_az_diff,
        }
    }
}

/// Azimuth delta and time offset of every block in one packet.
pub trait BlockDiff {
    /// `azimuths` holds the raw azimuth of each block, in order.
    fn new(azimuths: &[i32], timing: &BlockTiming) -> Self;

    /// Time offset of block `blk` from the first block, seconds.
    fn ts(&self, blk: usize) -> f64;

    /// Azimuth delta used to interpolate the channels of block `blk`.
    fn azimuth(&self, blk: usize) -> i32;
}

#[inline]
fn az_delta(from: i32, to: i32) -> i32 {
    (to - from).rem_euclid(ONE_ROUND)
}

/// Clamp `raw` and pick the time step that goes with it.
#[inline]
fn step(raw: i32, timing: &BlockTiming) -> (i32, f64) {
    if raw > MAX_BLOCK_AZ_DIFF {
        (timing.theory_az_diff, timing.fov_jump)
    } else {
        (raw, timing.block_duration)
    }
}

/// One block per firing.
#[derive(Clone, Debug)]
pub struct SingleReturnBlockDiff {
    tss: [f64; MAX_BLOCKS_PER_PKT],
    az_diffs: [i32; MAX_BLOCKS_PER_PKT],
}

impl BlockDiff for SingleReturnBlockDiff {
    fn new(azimuths: &[i32], timing: &BlockTiming) -> Self {
        let n = azimuths.len().min(MAX_BLOCKS_PER_PKT);
        let mut tss = [0.0; MAX_BLOCKS_PER_PKT];
        let mut az_diffs = [timing.theory_az_diff; MAX_BLOCKS_PER_PKT];

        if n < 2 {
            return Self { tss, az_diffs };
        }

        for blk in 0..n {
            let raw = if blk == 0 {
                az_delta(azimuths[0], azimuths[1])
            } else {
                az_delta(azimuths[blk - 1], azimuths[blk])
            };
            let (diff, dt) = step(raw, timing);
            az_diffs[blk] = diff;
            if blk > 0 {
                tss[blk] = tss[blk - 1] + dt;
            }
        }

        Self { tss, az_diffs }
    }

    #[inline]
    fn ts(&self, blk: usize) -> f64 {
        self.tss[blk]
    }

    #[inline]
    fn azimuth(&self, blk: usize) -> i32 {
        self.az_diffs[blk]
    }
}

/// Two blocks per firing, strongest and last return, sharing one azimuth.
///
/// Deltas are measured between the second blocks of consecutive pairs so
/// the first block of a pair never influences interpolation.
#[derive(Clone, Debug)]
pub struct DualReturnBlockDiff {
    tss: [f64; MAX_BLOCKS_PER_PKT],
    az_diffs: [i32; MAX_BLOCKS_PER_PKT],
}

impl BlockDiff for DualReturnBlockDiff {
    fn new(azimuths: &[i32], timing: &BlockTiming) -> Self {
        let n = azimuths.len().min(MAX_BLOCKS_PER_PKT);
        let mut tss = [0.0; MAX_BLOCKS_PER_PKT];
        let mut az_diffs = [timing.theory_az_diff; MAX_BLOCKS_PER_PKT];

        let pairs = n / 2;
        if pairs < 2 {
            return Self { tss, az_diffs };
        }

        let mut ts = 0.0;
        for pair in 0..pairs {
            let second = 2 * pair + 1;
            let raw = if pair == 0 {
                az_delta(azimuths[1], azimuths[3])
            } else {
                az_delta(azimuths[second - 2], azimuths[second])
            };
            let (diff, dt) = step(raw, timing);
            if pair > 0 {
                ts += dt;
            }

            for blk in [second - 1, second] {
                tss[blk] = ts;
                az_diffs[blk] = diff;
            }
        }

        Self { tss, az_diffs }
    }

    #[inline]
    fn ts(&self, blk: usize) -> f64 {
        self.tss[blk]
    }

    #[inline]
    fn azimuth(&self, blk: usize) -> i32 {
        self.az_diffs[blk]
    }
}
