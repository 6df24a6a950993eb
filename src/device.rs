// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! DIFOP-derived device state.
//!
//! The sensor sends a DIFOP packet about once per second on its own port.
//! Everything the MSOP path needs from it (calibration, echo mode, rotation
//! speed and the timing derived from it) is collected into one immutable
//! [`DeviceState`] and published with a single [`ArcSwap::rcu`], so a
//! concurrent MSOP decode sees either the old or the new state in full.

use crate::{
    block_diff::BlockTiming,
    calibration::ChanAngles,
    lidar::Error,
    model::{EchoMode, ModelSpec},
    protocol::DifopPacket,
    trigon::ONE_ROUND,
};
use arc_swap::ArcSwap;
use std::{net::Ipv4Addr, path::Path, sync::Arc};
use tracing::{debug, info, warn};

/// Rotation speed assumed until the first DIFOP arrives.
pub const DEFAULT_RPM: u16 = 600;

/// Device information from DIFOP packets
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Configured rotation speed
    pub rpm: u16,
    pub lidar_ip: Ipv4Addr,
    pub host_ip: Ipv4Addr,
    pub mac_addr: [u8; 6],
    /// MSOP destination port
    pub msop_port: u16,
    /// DIFOP destination port
    pub difop_port: u16,
    /// Field of view start, centidegrees
    pub fov_start: u16,
    /// Field of view end, centidegrees
    pub fov_end: u16,
    /// Top board firmware version (5 bytes)
    pub firmware_version: [u8; 5],
    /// Device serial number
    pub serial_number: [u8; 6],
    /// Raw return mode byte
    pub return_mode: u8,
}

impl DeviceInfo {
    pub fn from_packet(pkt: &DifopPacket) -> Self {
        Self {
            rpm: pkt.rpm(),
            lidar_ip: pkt.lidar_ip(),
            host_ip: pkt.host_ip(),
            mac_addr: pkt.mac_addr(),
            msop_port: pkt.msop_port(),
            difop_port: pkt.difop_port(),
            fov_start: pkt.fov_start(),
            fov_end: pkt.fov_end(),
            firmware_version: pkt.firmware_version(),
            serial_number: pkt.serial_number(),
            return_mode: pkt.return_mode(),
        }
    }

    /// Get serial number as a hex string
    pub fn serial_string(&self) -> String {
        self.serial_number
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect()
    }

    /// Get firmware version as a hex string (e.g., "00.12.34.56.78")
    pub fn version_string(&self) -> String {
        self.firmware_version
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Get MAC address in colon notation
    pub fn mac_string(&self) -> String {
        self.mac_addr
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(":")
    }
}

/// Snapshot of everything the MSOP path reads from the DIFOP path.
#[derive(Clone, Debug)]
pub struct DeviceState {
    /// At least one DIFOP packet has been decoded.
    pub calibrated: bool,
    /// Calibration came from a file and DIFOP angles are ignored.
    pub angles_from_file: bool,
    pub echo_mode: EchoMode,
    /// Revolutions per second
    pub rps: f64,
    /// Blocks in one rotation, doubled in dual echo
    pub blocks_per_frame: u32,
    pub timing: BlockTiming,
    pub chan_angles: Arc<ChanAngles>,
    /// Device temperature from the last DIFOP, °C
    pub temperature: f32,
    pub info: Option<DeviceInfo>,
}

impl DeviceState {
    /// Defaults used before any DIFOP: nominal speed, full field of view,
    /// zero calibration.
    pub fn initial(spec: &ModelSpec) -> Self {
        let rps = DEFAULT_RPM as f64 / 60.0;
        Self {
            calibrated: false,
            angles_from_file: false,
            echo_mode: EchoMode::Single,
            rps,
            blocks_per_frame: blocks_per_frame(spec, rps, EchoMode::Single),
            timing: BlockTiming::new(spec.consts.block_duration, rps, 0, ONE_ROUND),
            chan_angles: Arc::new(ChanAngles::with_default(spec.consts.laser_num)),
            temperature: 0.0,
            info: None,
        }
    }
}

fn blocks_per_frame(spec: &ModelSpec, rps: f64, echo_mode: EchoMode) -> u32 {
    let blocks = (1.0 / (rps * spec.consts.block_duration)).round() as u32;
    match echo_mode {
        EchoMode::Single => blocks,
        EchoMode::Dual => blocks * 2,
    }
}

/// Cloneable, thread-safe entry point for the DIFOP stream.
///
/// Obtain one with [`crate::decoder::Decoder::difop_handle`] and move it to
/// the thread or task receiving DIFOP packets.
#[derive(Clone)]
pub struct DifopHandle {
    spec: &'static ModelSpec,
    state: Arc<ArcSwap<DeviceState>>,
}

impl DifopHandle {
    pub(crate) fn new(spec: &'static ModelSpec) -> Self {
        Self {
            spec,
            state: Arc::new(ArcSwap::from_pointee(DeviceState::initial(spec))),
        }
    }

    /// Current device state.
    pub fn load(&self) -> Arc<DeviceState> {
        self.state.load_full()
    }

    pub(crate) fn shared(&self) -> &ArcSwap<DeviceState> {
        &self.state
    }

    /// Decode a DIFOP packet and publish the resulting state.
    ///
    /// When the calibration arrays hold no channel the previous table is
    /// kept and [`Error::CalibrationParse`] is returned; the rest of the
    /// update is still published.
    pub fn process_difop(&self, data: &[u8]) -> Result<(), Error> {
        let pkt = DifopPacket::from_slice(data, self.spec)?;
        let info = DeviceInfo::from_packet(&pkt);
        let echo_mode = EchoMode::from_return_mode(info.return_mode);

        let rpm = if info.rpm == 0 { DEFAULT_RPM } else { info.rpm };
        let rps = rpm as f64 / 60.0;
        let timing = BlockTiming::new(
            self.spec.consts.block_duration,
            rps,
            info.fov_start as i32,
            info.fov_end as i32,
        );
        let blocks_per_frame = blocks_per_frame(self.spec, rps, echo_mode);
        let temperature = pkt.temperature() as f32 * self.spec.consts.temperature_res;

        let laser_num = self.spec.consts.laser_num;
        let parsed = ChanAngles::load_from_difop(pkt.vert_angle_cali(), pkt.horiz_angle_cali())
            .map(|angles| {
                if angles.len() < laser_num {
                    debug!("DIFOP calibration holds {} of {} channels", angles.len(), laser_num);
                }
                angles.resized(laser_num)
            });

        let prev = self.state.rcu(|old| {
            let chan_angles = match &parsed {
                Ok(angles) if !old.angles_from_file => Arc::new(angles.clone()),
                _ => old.chan_angles.clone(),
            };

            DeviceState {
                calibrated: true,
                angles_from_file: old.angles_from_file,
                echo_mode,
                rps,
                blocks_per_frame,
                timing,
                chan_angles,
                temperature,
                info: Some(info.clone()),
            }
        });

        if !prev.calibrated {
            info!(
                "{} serial {} firmware {} at {} rpm, {:?} echo, {:.1} °C",
                self.spec.lidar_type,
                info.serial_string(),
                info.version_string(),
                rpm,
                echo_mode,
                temperature
            );
        } else if prev.echo_mode != echo_mode || prev.rps != rps {
            debug!("device mode changed: {:?} echo at {} rpm", echo_mode, rpm);
        }

        if prev.angles_from_file {
            return Ok(());
        }
        parsed.map(|_| ())
    }

    /// Replace the calibration with the contents of `path`.
    ///
    /// On success DIFOP calibration is ignored from then on. On failure the
    /// current table stays in place.
    pub fn load_angle_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let laser_num = self.spec.consts.laser_num;
        let angles = ChanAngles::load_from_file(path)?;
        if angles.len() != laser_num {
            warn!(
                "angle file has {} channels, {} expects {}",
                angles.len(),
                self.spec.lidar_type,
                laser_num
            );
        }
        let angles = Arc::new(angles.resized(laser_num));

        self.state.rcu(|old| DeviceState {
            angles_from_file: true,
            chan_angles: angles.clone(),
            ..DeviceState::clone(old)
        });
        Ok(())
    }
}
