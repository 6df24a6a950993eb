// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Common decoder types, callbacks and error handling.
//!
//! Everything that crosses the boundary between the decoder and the layers
//! around it lives here: the [`Point`] and [`FrameBoundary`] values handed to
//! consumers, the [`PointSink`] callback trait, and the [`Error`] type shared
//! by the decoder and the capture layer.

use std::fmt;
use tracing::warn;

/// Which of the two sensor streams a packet belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PacketKind {
    /// Main data Stream Output Protocol (measurements).
    Msop,
    /// Device Information Output Protocol (status and calibration).
    Difop,
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PacketKind::Msop => write!(f, "MSOP"),
            PacketKind::Difop => write!(f, "DIFOP"),
        }
    }
}

/// A single decoded return.
///
/// Coordinates are in meters in the sensor frame. When a channel is gated
/// out by the distance or scan sections and dense output is disabled, the
/// coordinates are `NaN` and the intensity is zero so that every rotation
/// keeps a fixed number of points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub intensity: u8,
    /// Absolute firing time in seconds.
    pub timestamp: f64,
    /// Output channel index, sorted bottom-to-top by vertical angle.
    pub ring: u16,
}

impl Point {
    /// Placeholder point for a channel that did not pass the gates.
    pub fn invalid(timestamp: f64, ring: u16) -> Self {
        Self {
            x: f32::NAN,
            y: f32::NAN,
            z: f32::NAN,
            intensity: 0,
            timestamp,
            ring,
        }
    }

    /// Returns true if the point carries real coordinates.
    pub fn is_valid(&self) -> bool {
        !self.x.is_nan()
    }
}

/// Emitted when the scan crosses the frame split position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameBoundary {
    /// Number of points emitted since the previous boundary.
    pub height: u32,
    /// Timestamp of the last point before the crossing, in seconds.
    pub timestamp: f64,
}

/// Consumer side of the decoder.
///
/// The decoder hands every point to [`PointSink::on_point`] as it is
/// produced and calls [`PointSink::on_frame`] when a rotation completes.
/// Packet errors are reported through [`PointSink::on_error`] exactly once
/// per discarded packet by [`crate::decoder::Decoder::decode`].
pub trait PointSink {
    fn on_point(&mut self, point: Point);

    fn on_frame(&mut self, frame: FrameBoundary);

    fn on_error(&mut self, err: &Error) {
        warn!("discarded packet: {}", err);
    }
}

/// [`PointSink`] built from closures.
///
/// # Example
///
/// ```
/// use edgefirst_rsdriver::lidar::{CallbackSink, PointSink};
///
/// let mut points = 0usize;
/// let mut frames = 0usize;
/// let mut sink = CallbackSink::new(|_| points += 1, |_| frames += 1);
/// # let _ = &mut sink;
/// ```
pub struct CallbackSink<P, F>
where
    P: FnMut(Point),
    F: FnMut(FrameBoundary),
{
    on_point: P,
    on_frame: F,
    on_error: Option<Box<dyn FnMut(&Error) + Send>>,
}

impl<P, F> CallbackSink<P, F>
where
    P: FnMut(Point),
    F: FnMut(FrameBoundary),
{
    pub fn new(on_point: P, on_frame: F) -> Self {
        Self {
            on_point,
            on_frame,
            on_error: None,
        }
    }

    /// Route errors to `on_error` instead of the log.
    pub fn with_error_callback<E>(mut self, on_error: E) -> Self
    where
        E: FnMut(&Error) + Send + 'static,
    {
        self.on_error = Some(Box::new(on_error));
        self
    }
}

impl<P, F> PointSink for CallbackSink<P, F>
where
    P: FnMut(Point),
    F: FnMut(FrameBoundary),
{
    fn on_point(&mut self, point: Point) {
        (self.on_point)(point)
    }

    fn on_frame(&mut self, frame: FrameBoundary) {
        (self.on_frame)(frame)
    }

    fn on_error(&mut self, err: &Error) {
        match self.on_error.as_mut() {
            Some(cb) => cb(err),
            None => warn!("discarded packet: {}", err),
        }
    }
}

/// Common error type for decoding and capture.
#[derive(Debug)]
pub enum Error {
    /// I/O error (socket, file operations)
    Io(std::io::Error),
    /// Packet length differs from the model's fixed packet size
    WrongLength {
        kind: PacketKind,
        expected: usize,
        actual: usize,
    },
    /// Header magic or block id mismatch
    WrongHeader { kind: PacketKind, what: &'static str },
    /// Capture layer delivered a truncated datagram
    PacketIncomplete { kind: PacketKind, len: usize },
    /// Capture layer saw no packet within its receive timeout
    PacketTimeout(PacketKind),
    /// Angle calibration file could not be read or held no rows
    CalibrationFile(String),
    /// DIFOP calibration arrays held no channel before the sentinel
    CalibrationParse,
    /// Echo mode string not recognized
    UnsupportedEchoMode(String),
    /// Sensor model not recognized
    UnsupportedModel(String),
    /// Invalid capture data (pcap container)
    InvalidPacket(String),
    /// Configuration error
    Config(String),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::WrongLength {
                kind,
                expected,
                actual,
            } => write!(
                f,
                "{} packet has wrong length: {} bytes, expected {}",
                kind, actual, expected
            ),
            Error::WrongHeader { kind, what } => {
                write!(f, "{} packet has wrong {}", kind, what)
            }
            Error::PacketIncomplete { kind, len } => {
                write!(f, "{} packet incomplete: {} bytes", kind, len)
            }
            Error::PacketTimeout(kind) => write!(f, "timed out waiting for {} packet", kind),
            Error::CalibrationFile(msg) => write!(f, "angle calibration file: {}", msg),
            Error::CalibrationParse => write!(f, "no calibration angles in DIFOP packet"),
            Error::UnsupportedEchoMode(mode) => write!(f, "unsupported echo mode: {}", mode),
            Error::UnsupportedModel(model) => write!(f, "unsupported lidar model: {}", model),
            Error::InvalidPacket(msg) => write!(f, "invalid packet: {}", msg),
            Error::Config(msg) => write!(f, "configuration error: {}", msg),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

/// Get the host wall-clock time in microseconds since the Unix epoch.
///
/// On Linux, uses `CLOCK_REALTIME` directly. On other platforms, falls back
/// to `SystemTime`.
#[cfg(target_os = "linux")]
pub fn timestamp() -> Result<u64, Error> {
    let mut tp = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    let err = unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut tp) };
    if err != 0 {
        return Err(std::io::Error::last_os_error().into());
    }

    Ok(tp.tv_sec as u64 * 1_000_000 + tp.tv_nsec as u64 / 1_000)
}

#[cfg(not(target_os = "linux"))]
pub fn timestamp() -> Result<u64, Error> {
    let now = std::time::SystemTime::now();
    let duration = now
        .duration_since(std::time::UNIX_EPOCH)
        .map_err(|e| Error::Config(e.to_string()))?;
    Ok(duration.as_micros() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_point() {
        let pt = Point::invalid(1.5, 7);
        assert!(!pt.is_valid());
        assert!(pt.y.is_nan() && pt.z.is_nan());
        assert_eq!(pt.intensity, 0);
        assert_eq!(pt.ring, 7);
        assert_eq!(pt.timestamp, 1.5);
    }

    #[test]
    fn test_error_display() {
        let err = Error::WrongLength {
            kind: PacketKind::Msop,
            expected: 1248,
            actual: 100,
        };
        assert_eq!(
            err.to_string(),
            "MSOP packet has wrong length: 100 bytes, expected 1248"
        );

        let err = Error::WrongHeader {
            kind: PacketKind::Difop,
            what: "magic",
        };
        assert_eq!(err.to_string(), "DIFOP packet has wrong magic");
    }

    #[test]
    fn test_callback_sink() {
        let mut points = Vec::new();
        let mut frames = Vec::new();
        {
            let mut sink = CallbackSink::new(|p| points.push(p), |f| frames.push(f));
            sink.on_point(Point::invalid(0.0, 0));
            sink.on_frame(FrameBoundary {
                height: 1,
                timestamp: 0.0,
            });
            sink.on_error(&Error::CalibrationParse);
        }
        assert_eq!(points.len(), 1);
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_callback_sink_error_route() {
        use std::sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        };

        let errors = Arc::new(AtomicUsize::new(0));
        let counter = errors.clone();
        let mut sink = CallbackSink::new(|_| {}, |_| {}).with_error_callback(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        });
        sink.on_error(&Error::PacketTimeout(PacketKind::Msop));
        assert_eq!(errors.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_host_timestamp() {
        let ts = timestamp().unwrap();
        // After 2020-01-01
        assert!(ts > 1_577_836_800_000_000);
    }
}
