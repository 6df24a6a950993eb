// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Frame split detection.
//!
//! A mechanical LiDAR streams blocks continuously, so "one frame" is a
//! convention: either the scan crossing a fixed azimuth, or a fixed number
//! of blocks derived from the rotation speed.

use crate::trigon::ONE_ROUND;
use clap::ValueEnum;

/// How the decoder decides that a rotation is complete.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum SplitFrameMode {
    /// Split when the scan crosses the configured split angle
    #[default]
    #[value(name = "angle")]
    ByAngle,
    /// Split every blocks-per-frame blocks
    #[value(name = "blocks")]
    ByFixedBlocks,
}

/// Detects the scan crossing `split_angle` centidegrees.
#[derive(Clone, Copy, Debug)]
pub struct SplitByAngle {
    split_angle: i32,
    prev_angle: i32,
}

impl SplitByAngle {
    pub fn new(split_angle: i32) -> Self {
        Self {
            split_angle,
            prev_angle: split_angle,
        }
    }

    /// Feed the azimuth of the next block. Returns true when the scan moved
    /// from before the split angle to at or past it.
    pub fn new_block(&mut self, angle: i32) -> bool {
        if angle < self.prev_angle {
            self.prev_angle -= ONE_ROUND;
        }

        let crossed = self.prev_angle < self.split_angle && self.split_angle <= angle;
        self.prev_angle = angle;
        crossed
    }
}

/// Splits after a fixed number of blocks.
#[derive(Clone, Copy, Debug, Default)]
pub struct SplitByFixedBlocks {
    blocks: u32,
}

impl SplitByFixedBlocks {
    /// Returns true on the `blocks_per_frame`-th block since the last split.
    pub fn new_block(&mut self, blocks_per_frame: u32) -> bool {
        self.blocks += 1;
        if self.blocks >= blocks_per_frame.max(1) {
            self.blocks = 0;
            true
        } else {
            false
        }
    }
}

/// Active split strategy of a decoder.
#[derive(Clone, Copy, Debug)]
pub enum FrameSplitter {
    ByAngle(SplitByAngle),
    ByFixedBlocks(SplitByFixedBlocks),
}

impl FrameSplitter {
    pub fn new(mode: SplitFrameMode, split_angle: i32) -> Self {
        match mode {
            SplitFrameMode::ByAngle => FrameSplitter::ByAngle(SplitByAngle::new(split_angle)),
            SplitFrameMode::ByFixedBlocks => {
                FrameSplitter::ByFixedBlocks(SplitByFixedBlocks::default())
            }
        }
    }

    #[inline]
    pub fn new_block(&mut self, angle: i32, blocks_per_frame: u32) -> bool {
        match self {
            FrameSplitter::ByAngle(split) => split.new_block(angle),
            FrameSplitter::ByFixedBlocks(split) => split.new_block(blocks_per_frame),
        }
    }
}
