// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Supported sensor models with their wire layouts and constant parameters.
//!
//! All supported models are 32-channel mechanical LiDARs sharing the
//! 1248-byte MSOP/DIFOP packet size. They differ in header magic, header
//! timestamp encoding, lens geometry, distance resolution and firing
//! sequence.
//!
//! | Model    | MSOP magic | Timestamp | Dist. res. | Range (m)  |
//! |----------|------------|-----------|------------|------------|
//! | RS32     | 8 bytes    | YMD       | 5 mm       | 0.4 – 200  |
//! | RSBP     | 8 bytes    | YMD       | 5 mm       | 0.1 – 100  |
//! | RSHELIOS | 4 bytes    | UTC + µs  | 2.5 mm     | 0.4 – 200  |

use crate::lidar::Error;
use clap::ValueEnum;
use std::{fmt, str::FromStr, sync::OnceLock};

/// MSOP/DIFOP packet size shared by all supported models.
pub const PACKET_LEN: usize = 1248;

/// MSOP header size in bytes
const MSOP_HEADER_LEN: usize = 42;

/// Blocks per MSOP packet
const BLOCKS_PER_PKT: usize = 12;

/// Channels per block
const CHANNELS_PER_BLOCK: usize = 32;

/// Bytes per channel: BE u16 distance + u8 intensity
pub const CHANNEL_LEN: usize = 3;

/// Bytes of block id + BE u16 azimuth preceding the channels
pub const BLOCK_HEADER_LEN: usize = 4;

/// Temperature resolution in °C per unit
const TEMPERATURE_RES: f32 = 0.0625;

const MSOP_ID_V1: [u8; 8] = [0x55, 0xAA, 0x05, 0x0A, 0x5A, 0xA5, 0x50, 0xA0];
const MSOP_ID_V2: [u8; 4] = [0x55, 0xAA, 0x05, 0x5A];
const DIFOP_ID: [u8; 8] = [0xA5, 0xFF, 0x00, 0x5A, 0x11, 0x11, 0x55, 0x55];
const BLOCK_ID: [u8; 2] = [0xFF, 0xEE];

/// Firing offsets in µs of the RS32 and RSBP channels within a block.
const RS32_FIRING_TSS: [f32; 32] = [
    0.00, 2.88, 5.76, 8.64, 11.52, 14.40, 17.28, 20.16, 23.04, 25.92, 28.80, 31.68, 34.56, 37.44,
    40.32, 44.64, 1.44, 4.32, 7.20, 10.08, 12.96, 15.84, 18.72, 21.60, 24.48, 27.36, 30.24, 33.12,
    36.00, 38.88, 41.76, 46.08,
];

/// Firing offsets in µs of the RSBP channels within a block.
const RSBP_FIRING_TSS: [f32; 32] = [
    0.00, 2.56, 5.12, 7.68, 10.24, 12.80, 15.36, 17.92, 25.68, 28.24, 30.80, 33.36, 35.92, 38.48,
    41.04, 43.60, 1.28, 3.84, 6.40, 8.96, 11.52, 14.08, 16.64, 19.20, 26.96, 29.52, 32.08, 34.64,
    37.20, 39.76, 42.32, 44.88,
];

/// Firing offsets in µs of the RSHELIOS channels within a block.
const RSHELIOS_FIRING_TSS: [f32; 32] = [
    0.00, 1.57, 3.15, 4.72, 6.30, 7.87, 9.45, 11.36, 13.26, 15.17, 17.08, 18.99, 20.56, 22.14,
    23.71, 25.29, 26.53, 29.01, 27.77, 30.25, 31.49, 33.98, 32.73, 35.22, 36.46, 37.70, 38.94,
    40.18, 41.42, 42.67, 43.91, 45.15,
];

/// Sensor model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, ValueEnum)]
pub enum LidarType {
    /// RS-LiDAR-32
    #[value(name = "rs32")]
    Rs32,
    /// RS-Bpearl
    #[value(name = "rsbp")]
    Rsbp,
    /// RS-Helios
    #[default]
    #[value(name = "rshelios")]
    RsHelios,
}

impl LidarType {
    /// Wire layout and constants for this model, built on first use.
    pub fn spec(self) -> &'static ModelSpec {
        static RS32: OnceLock<ModelSpec> = OnceLock::new();
        static RSBP: OnceLock<ModelSpec> = OnceLock::new();
        static RSHELIOS: OnceLock<ModelSpec> = OnceLock::new();

        match self {
            LidarType::Rs32 => RS32.get_or_init(ModelSpec::rs32),
            LidarType::Rsbp => RSBP.get_or_init(ModelSpec::rsbp),
            LidarType::RsHelios => RSHELIOS.get_or_init(ModelSpec::rshelios),
        }
    }
}

impl fmt::Display for LidarType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LidarType::Rs32 => write!(f, "RS32"),
            LidarType::Rsbp => write!(f, "RSBP"),
            LidarType::RsHelios => write!(f, "RSHELIOS"),
        }
    }
}

impl FromStr for LidarType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "RS32" => Ok(LidarType::Rs32),
            "RSBP" => Ok(LidarType::Rsbp),
            "RSHELIOS" => Ok(LidarType::RsHelios),
            _ => Err(Error::UnsupportedModel(s.to_string())),
        }
    }
}

/// Single or dual return firing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EchoMode {
    #[default]
    Single,
    Dual,
}

impl EchoMode {
    /// Decode the DIFOP return-mode byte: `0x00` is dual return, every
    /// other value (strongest, last, nearest) is a single return.
    pub fn from_return_mode(mode: u8) -> Self {
        match mode {
            0x00 => EchoMode::Dual,
            _ => EchoMode::Single,
        }
    }
}

impl FromStr for EchoMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "single" | "strongest" | "last" | "nearest" => Ok(EchoMode::Single),
            "dual" => Ok(EchoMode::Dual),
            _ => Err(Error::UnsupportedEchoMode(s.to_string())),
        }
    }
}

/// Encoding of the MSOP header timestamp.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimestampFormat {
    /// year-2000, month, day, hour, minute, second, BE u16 ms, BE u16 µs
    Ymd,
    /// 6-byte BE seconds, BE u32 microseconds
    UtcMicros,
    /// 6-byte BE seconds, BE u32 nanoseconds
    UtcNanos,
}

/// Byte offsets of the DIFOP fields used by the decoder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DifopLayout {
    pub rpm: usize,
    pub lidar_ip: usize,
    pub host_ip: usize,
    pub mac_addr: usize,
    pub msop_port: usize,
    pub difop_port: usize,
    pub fov_start: usize,
    pub fov_end: usize,
    pub firmware_version: usize,
    pub serial_number: usize,
    pub return_mode: usize,
    /// Device temperature in the diagnostics block
    pub temperature: usize,
    pub vert_angle_cali: usize,
    pub horiz_angle_cali: usize,
    /// Number of entries in each calibration array
    pub cali_entries: usize,
}

/// Binary layout of one model's packets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WireLayout {
    pub msop_len: usize,
    pub difop_len: usize,
    pub msop_id: &'static [u8],
    pub difop_id: &'static [u8],
    pub block_id: [u8; 2],
    pub header_len: usize,
    pub block_len: usize,
    pub timestamp_offset: usize,
    pub timestamp_format: TimestampFormat,
    pub temperature_offset: usize,
    pub difop: DifopLayout,
}

/// Geometry and timing constants of one model.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstParam {
    pub blocks_per_pkt: usize,
    pub channels_per_block: usize,
    pub laser_num: usize,
    pub distance_min: f32,
    pub distance_max: f32,
    pub distance_res: f32,
    pub temperature_res: f32,
    pub rx: f32,
    pub ry: f32,
    pub rz: f32,
    /// Nominal time between blocks in seconds
    pub block_duration: f64,
    /// Firing offset of each channel from its block start, in seconds
    pub chan_tss: Vec<f64>,
    /// Firing offset of each channel as a fraction of the block duration
    pub chan_azis: Vec<f32>,
}

impl ConstParam {
    fn mech(block_us: f32, firing_tss: &[f32]) -> (f64, Vec<f64>, Vec<f32>) {
        let chan_tss = firing_tss.iter().map(|&t| t as f64 / 1_000_000.0).collect();
        let chan_azis = firing_tss.iter().map(|&t| t / block_us).collect();
        (block_us as f64 / 1_000_000.0, chan_tss, chan_azis)
    }

    /// Duration of a whole MSOP packet in seconds.
    pub fn packet_duration(&self) -> f64 {
        self.blocks_per_pkt as f64 * self.block_duration
    }
}

/// Everything the decoder needs to know about one model.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelSpec {
    pub lidar_type: LidarType,
    pub layout: WireLayout,
    pub consts: ConstParam,
}

impl ModelSpec {
    fn layout_v1() -> WireLayout {
        WireLayout {
            msop_len: PACKET_LEN,
            difop_len: PACKET_LEN,
            msop_id: &MSOP_ID_V1,
            difop_id: &DIFOP_ID,
            block_id: BLOCK_ID,
            header_len: MSOP_HEADER_LEN,
            block_len: BLOCK_HEADER_LEN + CHANNELS_PER_BLOCK * CHANNEL_LEN,
            timestamp_offset: 20,
            timestamp_format: TimestampFormat::Ymd,
            temperature_offset: 38,
            difop: DifopLayout {
                rpm: 8,
                lidar_ip: 10,
                host_ip: 14,
                mac_addr: 18,
                msop_port: 24,
                difop_port: 26,
                fov_start: 32,
                fov_end: 34,
                firmware_version: 40,
                serial_number: 292,
                return_mode: 300,
                temperature: 358,
                vert_angle_cali: 468,
                horiz_angle_cali: 564,
                cali_entries: 32,
            },
        }
    }

    fn rs32() -> Self {
        let (block_duration, chan_tss, chan_azis) = ConstParam::mech(55.52, &RS32_FIRING_TSS);
        Self {
            lidar_type: LidarType::Rs32,
            layout: Self::layout_v1(),
            consts: ConstParam {
                blocks_per_pkt: BLOCKS_PER_PKT,
                channels_per_block: CHANNELS_PER_BLOCK,
                laser_num: 32,
                distance_min: 0.4,
                distance_max: 200.0,
                distance_res: 0.005,
                temperature_res: TEMPERATURE_RES,
                rx: 0.03997,
                ry: -0.01087,
                rz: 0.0,
                block_duration,
                chan_tss,
                chan_azis,
            },
        }
    }

    fn rsbp() -> Self {
        let (block_duration, chan_tss, chan_azis) = ConstParam::mech(55.56, &RSBP_FIRING_TSS);
        Self {
            lidar_type: LidarType::Rsbp,
            layout: Self::layout_v1(),
            consts: ConstParam {
                blocks_per_pkt: BLOCKS_PER_PKT,
                channels_per_block: CHANNELS_PER_BLOCK,
                laser_num: 32,
                distance_min: 0.1,
                distance_max: 100.0,
                distance_res: 0.005,
                temperature_res: TEMPERATURE_RES,
                rx: 0.01473,
                ry: 0.0085,
                rz: 0.09427,
                block_duration,
                chan_tss,
                chan_azis,
            },
        }
    }

    fn rshelios() -> Self {
        let (block_duration, chan_tss, chan_azis) =
            ConstParam::mech(55.56, &RSHELIOS_FIRING_TSS);
        let mut layout = Self::layout_v1();
        layout.msop_id = &MSOP_ID_V2;
        layout.timestamp_format = TimestampFormat::UtcMicros;
        // msop port, reserved, difop port
        layout.difop.difop_port = 28;
        // shorter time info, diagnostics start with temperatures
        layout.difop.temperature = 342;

        Self {
            lidar_type: LidarType::RsHelios,
            layout,
            consts: ConstParam {
                blocks_per_pkt: BLOCKS_PER_PKT,
                channels_per_block: CHANNELS_PER_BLOCK,
                laser_num: 32,
                distance_min: 0.4,
                distance_max: 200.0,
                distance_res: 0.0025,
                temperature_res: TEMPERATURE_RES,
                rx: 0.03498,
                ry: -0.015,
                rz: 0.0,
                block_duration,
                chan_tss,
                chan_azis,
            },
        }
    }
}
