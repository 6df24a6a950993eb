// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Per-channel angle calibration.
//!
//! Each physical channel has a vertical angle and a horizontal correction,
//! both in centidegrees. They come either from a text file shipped with the
//! sensor or from the calibration arrays carried in every DIFOP packet.
//! A table is always built in one piece and never modified afterwards; the
//! decoder replaces it wholesale when a new source is parsed.

use crate::lidar::Error;
use std::{
    fs::File,
    io::{BufRead as _, BufReader},
    path::Path,
};
use tracing::debug;

/// Size in bytes of one DIFOP calibration entry: sign byte + BE u16.
pub const CALIBRATION_ANGLE_LEN: usize = 3;

/// Sign byte value marking the end of the valid entries.
const SIGN_END: u8 = 0xFF;

/// Vertical/horizontal angles per channel with the derived ring order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChanAngles {
    vert_angles: Vec<i32>,
    horiz_angles: Vec<i32>,
    user_chans: Vec<u16>,
}

impl ChanAngles {
    /// Build a table from matching vertical and horizontal angle lists.
    ///
    /// Returns `None` when the lists are empty or differ in length.
    pub fn new(vert_angles: Vec<i32>, horiz_angles: Vec<i32>) -> Option<Self> {
        if vert_angles.is_empty() || vert_angles.len() != horiz_angles.len() {
            return None;
        }

        let user_chans = gen_user_chans(&vert_angles);
        Some(Self {
            vert_angles,
            horiz_angles,
            user_chans,
        })
    }

    /// All-zero table used until real calibration is available.
    pub fn with_default(laser_num: usize) -> Self {
        let laser_num = laser_num.max(1);
        Self {
            vert_angles: vec![0; laser_num],
            horiz_angles: vec![0; laser_num],
            user_chans: (0..laser_num as u16).collect(),
        }
    }

    /// Load `"vertical,horizontal"` lines in degrees.
    ///
    /// Parsing stops at the first line that is not a pair of numbers.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| Error::CalibrationFile(format!("{}: {}", path.display(), e)))?;

        let mut vert_angles = Vec::new();
        let mut horiz_angles = Vec::new();

        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| Error::CalibrationFile(e.to_string()))?;
            match parse_line(&line) {
                Some((vert, horiz)) => {
                    vert_angles.push(vert);
                    horiz_angles.push(horiz);
                }
                None => break,
            }
        }

        debug!(
            "loaded {} calibration rows from {}",
            vert_angles.len(),
            path.display()
        );

        Self::new(vert_angles, horiz_angles).ok_or_else(|| {
            Error::CalibrationFile(format!("{}: no calibration rows", path.display()))
        })
    }

    /// Load the sign/magnitude arrays of a DIFOP packet.
    ///
    /// `vert` and `horiz` hold consecutive 3-byte entries. Parsing stops at
    /// the first vertical entry whose sign byte is `0xFF`.
    pub fn load_from_difop(vert: &[u8], horiz: &[u8]) -> Result<Self, Error> {
        let mut vert_angles = Vec::new();
        let mut horiz_angles = Vec::new();

        let entries = vert
            .chunks_exact(CALIBRATION_ANGLE_LEN)
            .zip(horiz.chunks_exact(CALIBRATION_ANGLE_LEN));
        for (v, h) in entries {
            if v[0] == SIGN_END {
                break;
            }
            vert_angles.push(parse_angle(v));
            horiz_angles.push(parse_angle(h));
        }

        Self::new(vert_angles, horiz_angles).ok_or(Error::CalibrationParse)
    }

    /// Fit the table to exactly `laser_num` channels.
    ///
    /// Missing channels get zero angles and extra ones are dropped, so every
    /// channel has its own entry and the ring order stays a permutation of
    /// `0..laser_num`.
    pub fn resized(mut self, laser_num: usize) -> Self {
        let laser_num = laser_num.max(1);
        if self.vert_angles.len() == laser_num {
            return self;
        }

        self.vert_angles.resize(laser_num, 0);
        self.horiz_angles.resize(laser_num, 0);
        self.user_chans = gen_user_chans(&self.vert_angles);
        self
    }

    /// Number of calibrated channels.
    pub fn len(&self) -> usize {
        self.vert_angles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vert_angles.is_empty()
    }

    /// Vertical angle of `chan`.
    #[inline]
    pub fn vert_adjust(&self, chan: usize) -> i32 {
        self.vert_angles[chan % self.vert_angles.len()]
    }

    /// Horizontal angle `horiz` corrected for `chan`. Not normalized.
    #[inline]
    pub fn horiz_adjust(&self, chan: usize, horiz: i32) -> i32 {
        horiz + self.horiz_angles[chan % self.horiz_angles.len()]
    }

    /// Output ring index of physical channel `chan`.
    #[inline]
    pub fn to_user_chan(&self, chan: usize) -> u16 {
        self.user_chans[chan % self.user_chans.len()]
    }

    pub fn vert_angles(&self) -> &[i32] {
        &self.vert_angles
    }

    pub fn horiz_angles(&self) -> &[i32] {
        &self.horiz_angles
    }

    pub fn user_chans(&self) -> &[u16] {
        &self.user_chans
    }
}

/// Rank every channel by vertical angle, lowest first.
///
/// A channel's rank is the number of channels below it; equal angles are
/// ordered by channel index so the result is always a permutation.
pub fn gen_user_chans(vert_angles: &[i32]) -> Vec<u16> {
    vert_angles
        .iter()
        .enumerate()
        .map(|(i, &angle)| {
            let below = vert_angles.iter().filter(|&&a| a < angle).count();
            let ties = vert_angles[..i].iter().filter(|&&a| a == angle).count();
            (below + ties) as u16
        })
        .collect()
}

fn parse_angle(entry: &[u8]) -> i32 {
    let value = u16::from_be_bytes([entry[1], entry[2]]) as i32;
    if entry[0] != 0 { -value } else { value }
}

fn parse_line(line: &str) -> Option<(i32, i32)> {
    let (vert, horiz) = line.split_once(',')?;
    let vert: f32 = vert.trim().parse().ok()?;
    let horiz: f32 = horiz.trim().parse().ok()?;
    Some(((vert * 100.0) as i32, (horiz * 100.0) as i32))
}
