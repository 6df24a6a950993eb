// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! EdgeFirst RoboSense Driver Library
//!
//! Decoder for the MSOP (point data) and DIFOP (device information) packets
//! of RoboSense mechanical LiDARs: RS-LiDAR-32, RS-Bpearl and RS-Helios.
//!
//! # Architecture
//!
//! Points are streamed to a client-provided sink instead of being collected
//! by the decoder:
//!
//! ```text
//! ┌─────────────────┐     ┌───────────────┐     ┌─────────────────┐
//! │  PacketSource   │ ──► │    Decoder    │ ──► │   PointSink     │
//! │  (UDP/pcap/test)│     │  (MSOP path)  │     │ (client-owned)  │
//! └─────────────────┘     └───────────────┘     └─────────────────┘
//!                                 ▲                      │
//!                                 │ ArcSwap              ▼
//! ┌─────────────────┐     ┌───────────────┐     ┌─────────────────┐
//! │  DIFOP socket   │ ──► │  DifopHandle  │     │ FrameCollector  │
//! └─────────────────┘     └───────────────┘     │ (DoubleBuffer)  │
//!                                               └─────────────────┘
//! ```
//!
//! 1. The client implements [`PointSink`] or uses [`buffer::FrameCollector`]
//! 2. MSOP packets go to [`Decoder::process_msop`] with `&mut sink`
//! 3. The decoder emits every point and a [`FrameBoundary`] per rotation
//! 4. DIFOP packets update calibration and rotation speed through a
//!    [`DifopHandle`], possibly from another thread
//!
//! # Modules
//!
//! - [`lidar`]: Common types, sink trait, and error handling
//! - [`model`]: Per-model wire layouts and constants
//! - [`protocol`]: Zero-copy MSOP/DIFOP packet views
//! - [`calibration`]: Channel angle tables
//! - [`block_diff`]: Block firing time and azimuth deltas
//! - [`split`]: Frame split strategies
//! - [`device`]: DIFOP-derived device state shared with the MSOP path
//! - [`decoder`]: The point decoder
//! - [`buffer`]: Pre-allocated frame buffers
//! - [`packet_source`]: Packet source abstraction for live use and testing
//!
//! # Example
//!
//! ```ignore
//! use edgefirst_rsdriver::{
//!     Decoder, DecoderConfig, LidarType,
//!     buffer::FrameCollector,
//! };
//!
//! let mut decoder = Decoder::new(LidarType::RsHelios, DecoderConfig::default());
//! let mut frames = FrameCollector::new(80_000);
//!
//! loop {
//!     let len = socket.recv(&mut buf)?;
//!     if decoder.process_msop(&buf[..len], &mut frames)? {
//!         let (info, points) = frames.frame().unwrap();
//!         println!("frame {} with {} points", info.frame_id, points.len());
//!     }
//! }
//! ```

pub mod block_diff;
pub mod buffer;
pub mod calibration;
pub mod decoder;
pub mod device;
pub mod lidar;
pub mod model;
pub mod packet_source;
#[cfg(feature = "pcap")]
pub mod pcap_source;
pub mod protocol;
pub mod section;
pub mod split;
pub mod trigon;

// Re-exports for convenience
pub use decoder::{Decoder, DecoderConfig, DecoderState};
pub use device::{DeviceInfo, DeviceState, DifopHandle};
pub use lidar::{CallbackSink, Error, FrameBoundary, PacketKind, Point, PointSink};
pub use model::{EchoMode, LidarType};
pub use packet_source::{PacketSource, RawPacket};
#[cfg(feature = "pcap")]
pub use pcap_source::PcapSource;
pub use split::SplitFrameMode;
