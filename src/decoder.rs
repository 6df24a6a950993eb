// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! MSOP/DIFOP decoder.
//!
//! [`Decoder`] turns packets into [`Point`]s and [`FrameBoundary`] events
//! delivered to a [`PointSink`]. MSOP decoding needs `&mut self` because the
//! frame split state is owned by the MSOP path. DIFOP packets may be
//! decoded on another thread through a [`DifopHandle`].
//!
//! ```text
//!  MSOP thread                           DIFOP thread
//!  ───────────                           ────────────
//!  Decoder::process_msop                 DifopHandle::process_difop
//!     │  load() once per packet             │  rcu(new DeviceState)
//!     └──────────► ArcSwap<DeviceState> ◄───┘
//! ```

use crate::{
    block_diff::{BlockDiff, DualReturnBlockDiff, MAX_BLOCKS_PER_PKT, SingleReturnBlockDiff},
    device::{DeviceState, DifopHandle},
    lidar::{Error, FrameBoundary, PacketKind, Point, PointSink, timestamp},
    model::{EchoMode, LidarType, ModelSpec},
    packet_source::RawPacket,
    protocol::MsopPacket,
    section::{DistanceSection, ScanSection},
    split::{FrameSplitter, SplitFrameMode},
    trigon::{Trigon, normalize},
};
use std::{path::PathBuf, sync::Arc};
use tracing::{trace, warn};

/// User configuration of a [`Decoder`].
#[derive(Clone, Debug, PartialEq)]
pub struct DecoderConfig {
    /// Minimum distance in meters; can only narrow the model's range
    pub min_distance: f32,
    /// Maximum distance in meters; can only narrow the model's range
    pub max_distance: f32,
    /// Start of the accepted horizontal sector, degrees
    pub start_angle: f32,
    /// End of the accepted horizontal sector, degrees
    pub end_angle: f32,
    pub split_frame_mode: SplitFrameMode,
    /// Split angle in degrees for [`SplitFrameMode::ByAngle`]
    pub split_angle: f32,
    /// Drop gated-out channels instead of emitting NaN points
    pub dense_points: bool,
    /// Timestamp points with the sensor clock instead of the host clock
    pub use_lidar_clock: bool,
    /// Discard MSOP packets until the first DIFOP has been decoded
    pub wait_for_difop: bool,
    /// Angle calibration file overriding DIFOP calibration
    pub angle_path: Option<PathBuf>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            min_distance: 0.0,
            max_distance: f32::MAX,
            start_angle: 0.0,
            end_angle: 360.0,
            split_frame_mode: SplitFrameMode::ByAngle,
            split_angle: 0.0,
            dense_points: false,
            use_lidar_clock: false,
            wait_for_difop: false,
            angle_path: None,
        }
    }
}

/// Whether DIFOP information has been applied yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecoderState {
    /// Decoding with default geometry and zero calibration
    AwaitingDifop,
    /// At least one DIFOP packet has been decoded
    Calibrated,
}

/// State owned by the MSOP path.
#[derive(Clone, Debug)]
struct FrameState {
    splitter: FrameSplitter,
    /// Points emitted since the last boundary
    height: u32,
    prev_point_ts: f64,
    /// Last MSOP temperature, °C
    temperature: f32,
    prev_pkt_ts: f64,
}

/// Packet decoder for one sensor.
pub struct Decoder {
    spec: &'static ModelSpec,
    config: DecoderConfig,
    trigon: Arc<Trigon>,
    scan_section: ScanSection,
    distance_section: DistanceSection,
    difop: DifopHandle,
    frame: FrameState,
}

impl Decoder {
    /// Create a decoder for `lidar_type`.
    ///
    /// An unreadable `angle_path` is logged and the decoder falls back to
    /// DIFOP calibration.
    pub fn new(lidar_type: LidarType, config: DecoderConfig) -> Self {
        let spec = lidar_type.spec();
        let consts = &spec.consts;

        let difop = DifopHandle::new(spec);
        if let Some(path) = &config.angle_path {
            if let Err(err) = difop.load_angle_file(path) {
                warn!("using DIFOP calibration: {}", err);
            }
        }

        let frame = FrameState {
            splitter: FrameSplitter::new(
                config.split_frame_mode,
                normalize((config.split_angle * 100.0) as i32),
            ),
            height: 0,
            prev_point_ts: 0.0,
            temperature: 0.0,
            prev_pkt_ts: 0.0,
        };

        Self {
            spec,
            scan_section: ScanSection::from_degrees(config.start_angle, config.end_angle),
            distance_section: DistanceSection::new(
                consts.distance_min,
                consts.distance_max,
                config.min_distance,
                config.max_distance,
            ),
            trigon: Trigon::shared(),
            difop,
            frame,
            config,
        }
    }

    pub fn lidar_type(&self) -> LidarType {
        self.spec.lidar_type
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Handle for decoding DIFOP packets from another thread.
    pub fn difop_handle(&self) -> DifopHandle {
        self.difop.clone()
    }

    /// Snapshot of the DIFOP-derived state.
    pub fn device_state(&self) -> Arc<DeviceState> {
        self.difop.load()
    }

    pub fn state(&self) -> DecoderState {
        if self.difop.load().calibrated {
            DecoderState::Calibrated
        } else {
            DecoderState::AwaitingDifop
        }
    }

    /// Temperature from the last MSOP packet, °C.
    pub fn temperature(&self) -> f32 {
        self.frame.temperature
    }

    /// Start time of the last decoded MSOP packet, seconds.
    pub fn packet_timestamp(&self) -> f64 {
        self.frame.prev_pkt_ts
    }

    /// See [`DifopHandle::process_difop`].
    pub fn process_difop(&self, data: &[u8]) -> Result<(), Error> {
        self.difop.process_difop(data)
    }

    /// Decode one MSOP packet into `sink`.
    ///
    /// Returns `Ok(true)` when a frame boundary was emitted. A bad block id
    /// ends decoding of the packet with [`Error::WrongHeader`]; points and
    /// any boundary of the blocks before it have already been delivered.
    /// [`Decoder::decode`] reports both the error and the boundary.
    pub fn process_msop<S>(&mut self, data: &[u8], sink: &mut S) -> Result<bool, Error>
    where
        S: PointSink + ?Sized,
    {
        let (split, result) = self.decode_msop(data, sink);
        result.map(|_| split)
    }

    /// Decode one MSOP packet, keeping the split flag when a later block
    /// fails.
    fn decode_msop<S>(&mut self, data: &[u8], sink: &mut S) -> (bool, Result<(), Error>)
    where
        S: PointSink + ?Sized,
    {
        let pkt = match MsopPacket::from_slice(data, self.spec) {
            Ok(pkt) => pkt,
            Err(err) => return (false, Err(err)),
        };
        let device = self.difop.shared().load_full();

        if self.config.wait_for_difop && !device.calibrated {
            return (false, Ok(()));
        }

        let pkt_ts = match self.packet_start(&pkt) {
            Ok(ts) => ts,
            Err(err) => return (false, Err(err)),
        };

        let outcome = match device.echo_mode {
            EchoMode::Single => {
                self.process_blocks::<SingleReturnBlockDiff, S>(&pkt, &device, pkt_ts, sink)
            }
            EchoMode::Dual => {
                self.process_blocks::<DualReturnBlockDiff, S>(&pkt, &device, pkt_ts, sink)
            }
        };

        self.frame.prev_pkt_ts = pkt_ts;
        outcome
    }

    /// Update the temperature and return the time of the first block.
    fn packet_start(&mut self, pkt: &MsopPacket) -> Result<f64, Error> {
        let consts = &self.spec.consts;
        self.frame.temperature = pkt.temperature() as f32 * consts.temperature_res;

        if self.config.use_lidar_clock {
            let us = pkt.timestamp_us().ok_or_else(|| {
                Error::InvalidPacket("MSOP header timestamp out of range".to_string())
            })?;
            Ok(us as f64 * 1e-6)
        } else {
            // roll back to the first block
            Ok(timestamp()? as f64 * 1e-6 - consts.packet_duration())
        }
    }

    fn process_blocks<T, S>(
        &mut self,
        pkt: &MsopPacket,
        device: &DeviceState,
        pkt_ts: f64,
        sink: &mut S,
    ) -> (bool, Result<(), Error>)
    where
        T: BlockDiff,
        S: PointSink + ?Sized,
    {
        let consts = &self.spec.consts;
        let block_id = self.spec.layout.block_id;
        let angles = &device.chan_angles;
        let trigon = &self.trigon;

        let n_blocks = pkt.block_count().min(MAX_BLOCKS_PER_PKT);
        let mut azimuths = [0i32; MAX_BLOCKS_PER_PKT];
        for (blk, az) in azimuths.iter_mut().enumerate().take(n_blocks) {
            *az = pkt.azimuth(blk);
        }
        let diff = T::new(&azimuths[..n_blocks], &device.timing);

        let mut split = false;
        for blk in 0..n_blocks {
            let block = pkt.block(blk);
            if block.id() != block_id {
                let err = Error::WrongHeader {
                    kind: PacketKind::Msop,
                    what: "block id",
                };
                return (split, Err(err));
            }

            let block_az = azimuths[blk];
            let block_ts = pkt_ts + diff.ts(blk);
            let block_az_diff = diff.azimuth(blk);

            if self
                .frame
                .splitter
                .new_block(block_az, device.blocks_per_frame)
            {
                let frame = FrameBoundary {
                    height: self.frame.height,
                    timestamp: self.frame.prev_point_ts,
                };
                trace!("frame boundary: {} points at {:.6}", frame.height, frame.timestamp);
                sink.on_frame(frame);
                self.frame.height = 0;
                split = true;
            }

            for chan in 0..consts.channels_per_block {
                let (raw_distance, intensity) = block.channel(chan);
                let chan_ts = block_ts + consts.chan_tss[chan];
                let ring = angles.to_user_chan(chan);

                let angle_horiz =
                    block_az + (block_az_diff as f32 * consts.chan_azis[chan]) as i32;
                let angle_vert = normalize(angles.vert_adjust(chan));
                let angle_horiz_final = normalize(angles.horiz_adjust(chan, angle_horiz));
                let angle_horiz = normalize(angle_horiz);
                let distance = raw_distance as f32 * consts.distance_res;

                if self.distance_section.contains(distance)
                    && self.scan_section.contains(angle_horiz_final)
                {
                    let cos_vert = trigon.cos(angle_vert);
                    sink.on_point(Point {
                        x: distance * cos_vert * trigon.cos(angle_horiz_final)
                            + consts.rx * trigon.cos(angle_horiz),
                        y: -distance * cos_vert * trigon.sin(angle_horiz_final)
                            - consts.rx * trigon.sin(angle_horiz),
                        z: distance * trigon.sin(angle_vert) + consts.rz,
                        intensity,
                        timestamp: chan_ts,
                        ring,
                    });
                    self.frame.height += 1;
                } else if !self.config.dense_points {
                    sink.on_point(Point::invalid(chan_ts, ring));
                    self.frame.height += 1;
                }

                self.frame.prev_point_ts = chan_ts;
            }
        }

        (split, Ok(()))
    }

    /// Decode a tagged packet, reporting any error once through
    /// [`PointSink::on_error`]. Returns true when a frame boundary was
    /// emitted, even if a later block of the same packet failed.
    pub fn decode<S>(&mut self, packet: RawPacket<'_>, sink: &mut S) -> bool
    where
        S: PointSink + ?Sized,
    {
        let (split, result) = match packet.kind {
            PacketKind::Msop => self.decode_msop(packet.data, sink),
            PacketKind::Difop => (false, self.process_difop(packet.data)),
        };

        if let Err(err) = result {
            sink.on_error(&err);
        }
        split
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        lidar::CallbackSink,
        model::{PACKET_LEN, TimestampFormat},
    };
    use std::{sync::Mutex, thread};

    #[derive(Default)]
    struct Collect {
        points: Vec<Point>,
        frames: Vec<FrameBoundary>,
        errors: Vec<String>,
    }

    impl PointSink for Collect {
        fn on_point(&mut self, point: Point) {
            self.points.push(point);
        }

        fn on_frame(&mut self, frame: FrameBoundary) {
            self.frames.push(frame);
        }

        fn on_error(&mut self, err: &Error) {
            self.errors.push(err.to_string());
        }
    }

    fn msop(spec: &ModelSpec, azimuths: &[u16], distance: u16) -> Vec<u8> {
        let mut data = vec![0u8; PACKET_LEN];
        data[..spec.layout.msop_id.len()].copy_from_slice(spec.layout.msop_id);
        // 2.0625 °C
        data[38..40].copy_from_slice(&[0x08, 0x01]);
        for (blk, &az) in azimuths.iter().enumerate() {
            let off = 42 + blk * 100;
            data[off..off + 2].copy_from_slice(&spec.layout.block_id);
            data[off + 2..off + 4].copy_from_slice(&az.to_be_bytes());
            for chan in 0..32 {
                let c = off + 4 + chan * 3;
                data[c..c + 2].copy_from_slice(&distance.to_be_bytes());
                data[c + 2] = chan as u8;
            }
        }
        data
    }

    fn difop(spec: &ModelSpec, return_mode: u8, vert: i16) -> Vec<u8> {
        let mut data = vec![0u8; PACKET_LEN];
        data[..8].copy_from_slice(spec.layout.difop_id);
        data[8..10].copy_from_slice(&600u16.to_be_bytes());
        data[34..36].copy_from_slice(&36000u16.to_be_bytes());
        data[300] = return_mode;
        for chan in 0..32 {
            let off = 468 + chan * 3;
            data[off] = if vert < 0 { 1 } else { 0 };
            data[off + 1..off + 3].copy_from_slice(&vert.unsigned_abs().to_be_bytes());
        }
        data
    }

    const ROTATION: [u16; 12] = [
        0, 9000, 18000, 27000, 0, 9000, 18000, 27000, 0, 9000, 18000, 27000,
    ];

    #[test]
    fn test_one_boundary_per_rotation() {
        let spec = LidarType::RsHelios.spec();
        let mut decoder = Decoder::new(LidarType::RsHelios, DecoderConfig::default());
        let mut sink = Collect::default();

        let data = msop(spec, &ROTATION, 400);
        for _ in 0..3 {
            assert!(decoder.process_msop(&data, &mut sink).unwrap());
        }

        // 9 rotations started at the split angle, 8 crossings
        assert_eq!(sink.frames.len(), 8);
        for frame in &sink.frames {
            assert_eq!(frame.height, 4 * 32);
        }
        assert_eq!(sink.points.len(), 3 * 12 * 32);
        assert!(sink.errors.is_empty());
        assert_eq!(decoder.temperature(), 2.0625);
    }

    #[test]
    fn test_gated_points_are_nan() {
        let config = DecoderConfig {
            max_distance: 0.5,
            ..Default::default()
        };
        let spec = LidarType::RsHelios.spec();
        let mut decoder = Decoder::new(LidarType::RsHelios, config);
        let mut sink = Collect::default();

        // 400 × 2.5 mm = 1 m, beyond the user limit
        decoder
            .process_msop(&msop(spec, &ROTATION, 400), &mut sink)
            .unwrap();
        assert_eq!(sink.points.len(), 12 * 32);
        assert!(sink.points.iter().all(|p| !p.is_valid()));
        assert!(sink.points.iter().all(|p| p.intensity == 0));
    }

    #[test]
    fn test_dense_drops_gated_points() {
        let config = DecoderConfig {
            dense_points: true,
            start_angle: 0.0,
            end_angle: 180.0,
            ..Default::default()
        };
        let spec = LidarType::RsHelios.spec();
        let mut decoder = Decoder::new(LidarType::RsHelios, config);
        let mut sink = Collect::default();

        decoder
            .process_msop(&msop(spec, &ROTATION, 400), &mut sink)
            .unwrap();
        decoder
            .process_msop(&msop(spec, &ROTATION, 400), &mut sink)
            .unwrap();
        assert!(sink.points.iter().all(|p| p.is_valid()));
        // Blocks at 0° and 90° pass, 180° and 270° fall outside
        assert_eq!(sink.points.len(), 2 * 6 * 32);
        for frame in &sink.frames {
            assert_eq!(frame.height, 2 * 32);
        }
    }

    #[test]
    fn test_point_geometry() {
        let spec = LidarType::RsHelios.spec();
        let mut decoder = Decoder::new(LidarType::RsHelios, DecoderConfig::default());
        let mut sink = Collect::default();

        // Blocks at 90° so channel interpolation stays within the table
        let data = msop(spec, &[9000; 12], 4000);
        decoder.process_msop(&data, &mut sink).unwrap();

        let p = sink.points[0];
        assert!(p.is_valid());
        // 10 m straight along -y, lens offset along -y too
        assert!(p.x.abs() < 1e-3, "x = {}", p.x);
        assert!((p.y + 10.0 + spec.consts.rx).abs() < 1e-3, "y = {}", p.y);
        assert!(p.z.abs() < 1e-6);
        assert_eq!(p.intensity, 0);
        assert_eq!(p.ring, 0);
    }

    #[test]
    fn test_wrong_block_id_keeps_earlier_points() {
        let spec = LidarType::RsHelios.spec();
        let mut decoder = Decoder::new(LidarType::RsHelios, DecoderConfig::default());
        let mut sink = Collect::default();

        let mut data = msop(spec, &ROTATION, 400);
        data[42 + 5 * 100] = 0x00;
        let err = decoder.process_msop(&data, &mut sink).unwrap_err();
        assert!(matches!(
            err,
            Error::WrongHeader {
                kind: PacketKind::Msop,
                what: "block id"
            }
        ));
        assert_eq!(sink.points.len(), 5 * 32);

        // Next packet decodes normally
        assert!(
            decoder
                .process_msop(&msop(spec, &ROTATION, 400), &mut sink)
                .is_ok()
        );
    }

    #[test]
    fn test_boundary_survives_later_bad_block() {
        let spec = LidarType::RsHelios.spec();
        let mut decoder = Decoder::new(LidarType::RsHelios, DecoderConfig::default());
        let mut sink = Collect::default();

        // Block 4 wraps to 0°, block 6 is corrupt
        let mut data = msop(spec, &ROTATION, 400);
        data[42 + 6 * 100] = 0x00;
        let packet = RawPacket {
            kind: PacketKind::Msop,
            data: &data,
        };
        assert!(decoder.decode(packet, &mut sink));
        assert_eq!(sink.frames.len(), 1);
        assert_eq!(sink.frames[0].height, 4 * 32);
        assert_eq!(sink.errors.len(), 1);
        assert!(sink.errors[0].contains("block id"));
        assert_eq!(sink.points.len(), 6 * 32);

        // The direct call still surfaces the error
        let mut decoder = Decoder::new(LidarType::RsHelios, DecoderConfig::default());
        let mut sink = Collect::default();
        assert!(decoder.process_msop(&data, &mut sink).is_err());
        assert_eq!(sink.frames.len(), 1);
    }

    #[test]
    fn test_split_angle_full_turn_wraps() {
        let config = DecoderConfig {
            split_angle: 360.0,
            ..Default::default()
        };
        let spec = LidarType::RsHelios.spec();
        let mut decoder = Decoder::new(LidarType::RsHelios, config);
        let mut sink = Collect::default();

        let data = msop(spec, &ROTATION, 400);
        for _ in 0..3 {
            assert!(decoder.process_msop(&data, &mut sink).unwrap());
        }
        assert_eq!(sink.frames.len(), 8);
    }

    #[test]
    fn test_decode_reports_errors_once() {
        let spec = LidarType::RsHelios.spec();
        let mut decoder = Decoder::new(LidarType::RsHelios, DecoderConfig::default());
        let mut sink = Collect::default();

        let short = vec![0u8; 100];
        let bad = RawPacket {
            kind: PacketKind::Msop,
            data: &short,
        };
        assert!(!decoder.decode(bad, &mut sink));
        assert_eq!(sink.errors.len(), 1);
        assert!(sink.errors[0].contains("MSOP"));

        let bad = RawPacket {
            kind: PacketKind::Difop,
            data: &short,
        };
        assert!(!decoder.decode(bad, &mut sink));
        assert_eq!(sink.errors.len(), 2);
        assert!(sink.errors[1].contains("DIFOP"));

        let data = msop(spec, &ROTATION, 400);
        let good = RawPacket {
            kind: PacketKind::Msop,
            data: &data,
        };
        assert!(decoder.decode(good, &mut sink));
        assert_eq!(sink.errors.len(), 2);
    }

    #[test]
    fn test_wait_for_difop() {
        let config = DecoderConfig {
            wait_for_difop: true,
            ..Default::default()
        };
        let spec = LidarType::RsHelios.spec();
        let mut decoder = Decoder::new(LidarType::RsHelios, config);
        let mut sink = Collect::default();

        let data = msop(spec, &ROTATION, 400);
        assert!(!decoder.process_msop(&data, &mut sink).unwrap());
        assert!(sink.points.is_empty());
        assert_eq!(decoder.state(), DecoderState::AwaitingDifop);

        decoder.process_difop(&difop(spec, 0x04, 0)).unwrap();
        assert_eq!(decoder.state(), DecoderState::Calibrated);
        decoder.process_msop(&data, &mut sink).unwrap();
        assert_eq!(sink.points.len(), 12 * 32);
    }

    #[test]
    fn test_short_calibration_rings_are_permutation() {
        let spec = LidarType::RsHelios.spec();
        let mut decoder = Decoder::new(LidarType::RsHelios, DecoderConfig::default());
        let mut sink = Collect::default();

        let mut data = difop(spec, 0x01, 100);
        data[468 + 4 * 3] = 0xFF;
        decoder.process_difop(&data).unwrap();
        decoder
            .process_msop(&msop(spec, &[9000; 12], 400), &mut sink)
            .unwrap();

        let mut rings: Vec<u16> = sink.points[..32].iter().map(|p| p.ring).collect();
        rings.sort_unstable();
        assert_eq!(rings, (0..32).collect::<Vec<u16>>());
    }

    #[test]
    fn test_dual_echo_after_difop() {
        let spec = LidarType::RsHelios.spec();
        let mut decoder = Decoder::new(LidarType::RsHelios, DecoderConfig::default());
        let mut sink = Collect::default();
        decoder.process_difop(&difop(spec, 0x00, 0)).unwrap();
        assert_eq!(decoder.device_state().echo_mode, EchoMode::Dual);

        let azimuths: Vec<u16> = (0..12).map(|i| 1000 + (i / 2) * 20).collect();
        decoder
            .process_msop(&msop(spec, &azimuths, 400), &mut sink)
            .unwrap();

        // Both returns of a firing share the timestamp
        for pair in 0..6 {
            let a = sink.points[(2 * pair) * 32].timestamp;
            let b = sink.points[(2 * pair + 1) * 32].timestamp;
            assert_eq!(a, b);
        }
        assert!(sink.points[2 * 32].timestamp > sink.points[0].timestamp);
    }

    #[test]
    fn test_lidar_clock() {
        let config = DecoderConfig {
            use_lidar_clock: true,
            ..Default::default()
        };
        let spec = LidarType::RsHelios.spec();
        assert_eq!(spec.layout.timestamp_format, TimestampFormat::UtcMicros);
        let mut decoder = Decoder::new(LidarType::RsHelios, config);
        let mut sink = Collect::default();

        let mut data = msop(spec, &ROTATION, 400);
        data[20..26].copy_from_slice(&[0, 0, 0, 0, 0, 100]);
        data[26..30].copy_from_slice(&250_000u32.to_be_bytes());
        decoder.process_msop(&data, &mut sink).unwrap();

        assert!((decoder.packet_timestamp() - 100.25).abs() < 1e-9);
        assert!((sink.points[0].timestamp - 100.25).abs() < 1e-9);
    }

    #[test]
    fn test_host_clock_rolls_back_one_packet() {
        let spec = LidarType::RsHelios.spec();
        let mut decoder = Decoder::new(LidarType::RsHelios, DecoderConfig::default());
        let mut sink = Collect::default();

        let before = timestamp().unwrap() as f64 * 1e-6;
        decoder
            .process_msop(&msop(spec, &ROTATION, 400), &mut sink)
            .unwrap();
        let after = timestamp().unwrap() as f64 * 1e-6;

        let duration = spec.consts.packet_duration();
        let ts = decoder.packet_timestamp();
        assert!(ts >= before - duration - 1e-6);
        assert!(ts <= after - duration + 1e-6);
    }

    #[test]
    fn test_callback_sink_receives_points() {
        let spec = LidarType::Rs32.spec();
        let mut decoder = Decoder::new(LidarType::Rs32, DecoderConfig::default());

        let mut points = 0usize;
        let mut frames = 0usize;
        {
            let mut sink = CallbackSink::new(|_| points += 1, |_| frames += 1);
            let data = msop(spec, &ROTATION, 400);
            decoder.process_msop(&data, &mut sink).unwrap();
        }
        assert_eq!(points, 12 * 32);
        assert_eq!(frames, 2);
    }

    #[test]
    fn test_concurrent_difop_never_tears_table() {
        let spec = LidarType::RsHelios.spec();
        let mut decoder = Decoder::new(LidarType::RsHelios, DecoderConfig::default());
        let handle = decoder.difop_handle();

        let low = difop(spec, 0x04, -1500);
        let high = difop(spec, 0x04, 1500);
        let data = msop(spec, &[9000; 12], 4000);

        let errors = Mutex::new(0usize);
        thread::scope(|s| {
            s.spawn(|| {
                for i in 0..200 {
                    let pkt = if i % 2 == 0 { &low } else { &high };
                    if handle.process_difop(pkt).is_err() {
                        *errors.lock().unwrap() += 1;
                    }
                }
            });

            for _ in 0..200 {
                let mut sink = Collect::default();
                decoder.process_msop(&data, &mut sink).unwrap();
                // Every channel shares one vertical angle within a table
                let first = sink.points[0].z;
                assert!(sink.points.iter().all(|p| p.z == first));
            }
        });

        assert_eq!(*errors.lock().unwrap(), 0);
        assert_eq!(decoder.state(), DecoderState::Calibrated);
    }
}
