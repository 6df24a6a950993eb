// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Zero-allocation point cloud buffers.
//!
//! The decoder hands out points one at a time. [`FrameCollector`] gathers
//! them into pre-allocated structure-of-arrays buffers and swaps a
//! [`DoubleBuffer`] on every frame boundary, so the consumer can read the
//! completed rotation while the next one is being filled.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      DoubleBuffer                           │
//! │  ┌──────────────────┐     ┌──────────────────┐              │
//! │  │   Buffer A       │     │   Buffer B       │              │
//! │  │  (filling)       │ ←→  │  (ready)         │              │
//! │  │   x, y, z: [f32] │ swap│   x, y, z: [f32] │              │
//! │  │   intensity: [u8]│     │   intensity: [u8]│              │
//! │  │   timestamp:[f64]│     │   timestamp:[f64]│              │
//! │  │   ring: [u16]    │     │   ring: [u16]    │              │
//! │  └──────────────────┘     └──────────────────┘              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use edgefirst_rsdriver::{buffer::DoubleBuffer, lidar::Point};
//!
//! let mut db = DoubleBuffer::new(1_000);
//! db.filling_mut().push(&Point {
//!     x: 1.0,
//!     y: 2.0,
//!     z: 3.0,
//!     intensity: 128,
//!     timestamp: 0.5,
//!     ring: 7,
//! });
//!
//! let completed = db.swap();
//! assert_eq!(completed.len(), 1);
//! assert_eq!(completed.ring()[0], 7);
//! assert_eq!(db.filling().len(), 0);
//! ```

use crate::lidar::{Error, FrameBoundary, Point, PointSink};
use tracing::warn;

/// Pre-allocated point cloud buffer in structure-of-arrays layout.
#[derive(Debug, Clone)]
pub struct PointBuffer {
    x: Vec<f32>,
    y: Vec<f32>,
    z: Vec<f32>,
    intensity: Vec<u8>,
    timestamp: Vec<f64>,
    ring: Vec<u16>,
    len: usize,
}

impl PointBuffer {
    /// Create a new buffer with the specified capacity.
    ///
    /// Memory is allocated once at construction; no allocations occur during
    /// normal operation (push/clear).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            x: vec![0.0; capacity],
            y: vec![0.0; capacity],
            z: vec![0.0; capacity],
            intensity: vec![0; capacity],
            timestamp: vec![0.0; capacity],
            ring: vec![0; capacity],
            len: 0,
        }
    }

    /// Returns the number of points in the buffer.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the maximum capacity of the buffer.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.x.len()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len >= self.capacity()
    }

    /// Clear all points, resetting length to zero.
    ///
    /// The underlying memory is not zeroed.
    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Append a point.
    ///
    /// # Panics
    ///
    /// Panics in debug mode if the buffer is full. In release mode,
    /// points beyond capacity are silently ignored.
    #[inline]
    pub fn push(&mut self, point: &Point) {
        debug_assert!(
            self.len < self.capacity(),
            "PointBuffer overflow: {} >= {}",
            self.len,
            self.capacity()
        );

        if self.len < self.capacity() {
            let i = self.len;
            self.x[i] = point.x;
            self.y[i] = point.y;
            self.z[i] = point.z;
            self.intensity[i] = point.intensity;
            self.timestamp[i] = point.timestamp;
            self.ring[i] = point.ring;
            self.len += 1;
        }
    }

    /// Point at `index`, if within the valid length.
    pub fn get(&self, index: usize) -> Option<Point> {
        if index >= self.len {
            return None;
        }

        Some(Point {
            x: self.x[index],
            y: self.y[index],
            z: self.z[index],
            intensity: self.intensity[index],
            timestamp: self.timestamp[index],
            ring: self.ring[index],
        })
    }

    #[inline]
    pub fn x(&self) -> &[f32] {
        &self.x[..self.len]
    }

    #[inline]
    pub fn y(&self) -> &[f32] {
        &self.y[..self.len]
    }

    #[inline]
    pub fn z(&self) -> &[f32] {
        &self.z[..self.len]
    }

    #[inline]
    pub fn intensity(&self) -> &[u8] {
        &self.intensity[..self.len]
    }

    /// Per-point firing time in seconds.
    #[inline]
    pub fn timestamp(&self) -> &[f64] {
        &self.timestamp[..self.len]
    }

    #[inline]
    pub fn ring(&self) -> &[u16] {
        &self.ring[..self.len]
    }

    /// Number of points with real coordinates (not NaN placeholders).
    pub fn valid_count(&self) -> usize {
        self.x().iter().filter(|x| !x.is_nan()).count()
    }
}

impl Default for PointBuffer {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

/// Double-buffer for zero-allocation frame swapping.
///
/// Maintains two [`PointBuffer`]s: one being filled, and one holding the
/// last complete frame for consumption.
///
/// # Thread Safety
///
/// `DoubleBuffer` is not thread-safe. It is designed to be owned by the
/// task that drives the decoder.
#[derive(Debug)]
pub struct DoubleBuffer {
    buffers: [PointBuffer; 2],
    filling_idx: usize,
}

impl DoubleBuffer {
    /// Allocates two buffers, each capable of holding `capacity` points.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffers: [
                PointBuffer::with_capacity(capacity),
                PointBuffer::with_capacity(capacity),
            ],
            filling_idx: 0,
        }
    }

    /// Returns a reference to the buffer currently being filled.
    #[inline]
    pub fn filling(&self) -> &PointBuffer {
        &self.buffers[self.filling_idx]
    }

    /// Returns a mutable reference to the buffer currently being filled.
    #[inline]
    pub fn filling_mut(&mut self) -> &mut PointBuffer {
        &mut self.buffers[self.filling_idx]
    }

    /// Returns a reference to the buffer holding the last completed frame.
    ///
    /// Before any `swap()` call, this returns an empty buffer.
    #[inline]
    pub fn ready(&self) -> &PointBuffer {
        &self.buffers[1 - self.filling_idx]
    }

    /// Swap buffers and return the newly completed one. The new filling
    /// buffer is cleared. O(1), no data is copied.
    #[inline]
    pub fn swap(&mut self) -> &PointBuffer {
        self.filling_idx = 1 - self.filling_idx;
        self.buffers[self.filling_idx].clear();
        &self.buffers[1 - self.filling_idx]
    }

    /// Returns the capacity of each buffer.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buffers[0].capacity()
    }
}

impl Default for DoubleBuffer {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Metadata of a completed frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameInfo {
    /// Sequence number, starting at 0
    pub frame_id: u32,
    /// Point count reported by the decoder
    pub height: u32,
    /// Timestamp of the last point, seconds
    pub timestamp: f64,
    /// Points that did not fit in the buffer
    pub dropped: usize,
}

/// [`PointSink`] that assembles frames in a [`DoubleBuffer`].
///
/// After [`crate::decoder::Decoder::process_msop`] returns `Ok(true)` the
/// completed rotation is available from [`FrameCollector::frame`].
#[derive(Debug)]
pub struct FrameCollector {
    buffers: DoubleBuffer,
    frame_id: u32,
    dropped: usize,
    last: Option<FrameInfo>,
    errors: usize,
}

impl FrameCollector {
    /// `capacity` is the largest number of points expected per frame.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffers: DoubleBuffer::new(capacity),
            frame_id: 0,
            dropped: 0,
            last: None,
            errors: 0,
        }
    }

    /// Last completed frame, or `None` before the first boundary.
    pub fn frame(&self) -> Option<(FrameInfo, &PointBuffer)> {
        self.last.map(|info| (info, self.buffers.ready()))
    }

    /// Points collected since the last boundary.
    pub fn pending(&self) -> &PointBuffer {
        self.buffers.filling()
    }

    /// Number of errors reported through [`PointSink::on_error`].
    pub fn errors(&self) -> usize {
        self.errors
    }

    pub fn capacity(&self) -> usize {
        self.buffers.capacity()
    }
}

impl PointSink for FrameCollector {
    #[inline]
    fn on_point(&mut self, point: Point) {
        let filling = self.buffers.filling_mut();
        if filling.is_full() {
            self.dropped += 1;
        } else {
            filling.push(&point);
        }
    }

    fn on_frame(&mut self, frame: FrameBoundary) {
        if self.dropped > 0 {
            warn!(
                "frame {} exceeded buffer capacity, dropped {} points",
                self.frame_id, self.dropped
            );
        }

        self.buffers.swap();
        self.last = Some(FrameInfo {
            frame_id: self.frame_id,
            height: frame.height,
            timestamp: frame.timestamp,
            dropped: self.dropped,
        });
        self.frame_id = self.frame_id.wrapping_add(1);
        self.dropped = 0;
    }

    fn on_error(&mut self, err: &Error) {
        self.errors += 1;
        warn!("discarded packet: {}", err);
    }
}
