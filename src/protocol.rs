// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! MSOP and DIFOP packet views.
//!
//! Packets are never reinterpreted as packed structs. Instead a view is
//! created with `from_slice`, which checks the exact packet length and the
//! header magic; the accessor methods then read big-endian fields at the
//! offsets given by the model's [`WireLayout`].
//!
//! # MSOP (1248 bytes)
//!
//! ```text
//! ┌──────────────┬─────────────────────────────────────────┬──────────┐
//! │ header (42B) │ 12 × block (100B)                        │ tail (6B)│
//! │ magic, time, │ id[2] | azimuth BE u16 |                 │          │
//! │ temperature  │ 32 × (distance BE u16, intensity u8)     │          │
//! └──────────────┴─────────────────────────────────────────┴──────────┘
//! ```
//!
//! # DIFOP (1248 bytes)
//!
//! Device status: rotation speed, network configuration, field of view,
//! firmware version, serial number, return mode and the per-channel
//! calibration angle arrays.

use crate::{
    lidar::{Error, PacketKind},
    model::{BLOCK_HEADER_LEN, CHANNEL_LEN, ModelSpec, TimestampFormat, WireLayout},
};
use chrono::NaiveDate;
use std::net::Ipv4Addr;

/// Decode the packed 2-byte temperature field.
///
/// ```text
/// byte 0: | lsb (5) | padding (3) |
/// byte 1: | neg (1) | msb (7)     |
/// ```
///
/// The result is in sensor units; multiply by the model's temperature
/// resolution for °C.
pub fn parse_temperature(tt: [u8; 2]) -> i16 {
    let lsb = (tt[0] >> 3) as i16;
    let msb = (tt[1] & 0x7F) as i16;
    let t = (msb << 5) + lsb;
    if tt[1] & 0x80 != 0 { -t } else { t }
}

/// Decode a year/month/day timestamp into microseconds since the epoch.
///
/// The year counts from 2000 and the date is taken as UTC. Returns `None`
/// for impossible dates.
pub fn parse_time_ymd(ts: &[u8]) -> Option<u64> {
    let date = NaiveDate::from_ymd_opt(2000 + ts[0] as i32, ts[1] as u32, ts[2] as u32)?;
    let time = date.and_hms_opt(ts[3] as u32, ts[4] as u32, ts[5] as u32)?;
    let sec = u64::try_from(time.and_utc().timestamp()).ok()?;
    let ms = u16::from_be_bytes([ts[6], ts[7]]) as u64;
    let us = u16::from_be_bytes([ts[8], ts[9]]) as u64;
    Some(sec * 1_000_000 + ms * 1_000 + us)
}

fn parse_utc_seconds(ts: &[u8]) -> u64 {
    u64::from_be_bytes([0, 0, ts[0], ts[1], ts[2], ts[3], ts[4], ts[5]])
}

/// Decode 6-byte seconds + 4-byte microseconds into microseconds.
pub fn parse_time_utc_us(ts: &[u8]) -> u64 {
    let us = u32::from_be_bytes([ts[6], ts[7], ts[8], ts[9]]) as u64;
    parse_utc_seconds(ts) * 1_000_000 + us
}

/// Decode 6-byte seconds + 4-byte nanoseconds into microseconds.
pub fn parse_time_utc_ns(ts: &[u8]) -> u64 {
    let ns = u32::from_be_bytes([ts[6], ts[7], ts[8], ts[9]]) as u64;
    parse_utc_seconds(ts) * 1_000_000 + ns / 1_000
}

fn check_packet(
    data: &[u8],
    kind: PacketKind,
    expected: usize,
    magic: &[u8],
) -> Result<(), Error> {
    if data.len() != expected {
        return Err(Error::WrongLength {
            kind,
            expected,
            actual: data.len(),
        });
    }

    if !data.starts_with(magic) {
        return Err(Error::WrongHeader {
            kind,
            what: "header magic",
        });
    }

    Ok(())
}

/// Validated view of an MSOP packet.
#[derive(Copy, Clone, Debug)]
pub struct MsopPacket<'a> {
    slice: &'a [u8],
    spec: &'a ModelSpec,
}

impl<'a> MsopPacket<'a> {
    /// Check length and header magic.
    pub fn from_slice(slice: &'a [u8], spec: &'a ModelSpec) -> Result<MsopPacket<'a>, Error> {
        let layout = &spec.layout;
        check_packet(slice, PacketKind::Msop, layout.msop_len, layout.msop_id)?;
        Ok(MsopPacket { slice, spec })
    }

    fn layout(&self) -> &'a WireLayout {
        &self.spec.layout
    }

    /// Raw temperature in sensor units.
    pub fn temperature(&self) -> i16 {
        let off = self.layout().temperature_offset;
        parse_temperature([self.slice[off], self.slice[off + 1]])
    }

    /// Header timestamp in microseconds since the epoch.
    pub fn timestamp_us(&self) -> Option<u64> {
        let off = self.layout().timestamp_offset;
        let ts = &self.slice[off..off + 10];
        match self.layout().timestamp_format {
            TimestampFormat::Ymd => parse_time_ymd(ts),
            TimestampFormat::UtcMicros => Some(parse_time_utc_us(ts)),
            TimestampFormat::UtcNanos => Some(parse_time_utc_ns(ts)),
        }
    }

    pub fn block_count(&self) -> usize {
        self.spec.consts.blocks_per_pkt
    }

    /// View of block `index`; `index` must be below [`Self::block_count`].
    #[inline]
    pub fn block(&self, index: usize) -> BlockSlice<'a> {
        let layout = self.layout();
        let start = layout.header_len + index * layout.block_len;
        BlockSlice {
            slice: &self.slice[start..start + layout.block_len],
        }
    }

    /// Azimuth of block `index` in centidegrees.
    #[inline]
    pub fn azimuth(&self, index: usize) -> i32 {
        self.block(index).azimuth() as i32
    }
}

/// One firing block inside an MSOP packet.
#[derive(Copy, Clone, Debug)]
pub struct BlockSlice<'a> {
    slice: &'a [u8],
}

impl<'a> BlockSlice<'a> {
    pub fn id(&self) -> [u8; 2] {
        [self.slice[0], self.slice[1]]
    }

    /// Azimuth in centidegrees.
    #[inline]
    pub fn azimuth(&self) -> u16 {
        u16::from_be_bytes([self.slice[2], self.slice[3]])
    }

    /// Raw distance and intensity of channel `chan`.
    #[inline]
    pub fn channel(&self, chan: usize) -> (u16, u8) {
        let off = BLOCK_HEADER_LEN + chan * CHANNEL_LEN;
        (
            u16::from_be_bytes([self.slice[off], self.slice[off + 1]]),
            self.slice[off + 2],
        )
    }
}

/// Validated view of a DIFOP packet.
#[derive(Copy, Clone, Debug)]
pub struct DifopPacket<'a> {
    slice: &'a [u8],
    spec: &'a ModelSpec,
}

impl<'a> DifopPacket<'a> {
    /// Check length and header magic.
    pub fn from_slice(slice: &'a [u8], spec: &'a ModelSpec) -> Result<DifopPacket<'a>, Error> {
        let layout = &spec.layout;
        check_packet(slice, PacketKind::Difop, layout.difop_len, layout.difop_id)?;
        Ok(DifopPacket { slice, spec })
    }

    fn u16_at(&self, off: usize) -> u16 {
        u16::from_be_bytes([self.slice[off], self.slice[off + 1]])
    }

    fn ip_at(&self, off: usize) -> Ipv4Addr {
        Ipv4Addr::new(
            self.slice[off],
            self.slice[off + 1],
            self.slice[off + 2],
            self.slice[off + 3],
        )
    }

    /// Rotation speed in revolutions per minute.
    pub fn rpm(&self) -> u16 {
        self.u16_at(self.spec.layout.difop.rpm)
    }

    pub fn lidar_ip(&self) -> Ipv4Addr {
        self.ip_at(self.spec.layout.difop.lidar_ip)
    }

    pub fn host_ip(&self) -> Ipv4Addr {
        self.ip_at(self.spec.layout.difop.host_ip)
    }

    pub fn mac_addr(&self) -> [u8; 6] {
        let off = self.spec.layout.difop.mac_addr;
        let mut mac = [0u8; 6];
        mac.copy_from_slice(&self.slice[off..off + 6]);
        mac
    }

    pub fn msop_port(&self) -> u16 {
        self.u16_at(self.spec.layout.difop.msop_port)
    }

    pub fn difop_port(&self) -> u16 {
        self.u16_at(self.spec.layout.difop.difop_port)
    }

    /// Field of view start angle in centidegrees.
    pub fn fov_start(&self) -> u16 {
        self.u16_at(self.spec.layout.difop.fov_start)
    }

    /// Field of view end angle in centidegrees.
    pub fn fov_end(&self) -> u16 {
        self.u16_at(self.spec.layout.difop.fov_end)
    }

    pub fn firmware_version(&self) -> [u8; 5] {
        let off = self.spec.layout.difop.firmware_version;
        let mut ver = [0u8; 5];
        ver.copy_from_slice(&self.slice[off..off + 5]);
        ver
    }

    pub fn serial_number(&self) -> [u8; 6] {
        let off = self.spec.layout.difop.serial_number;
        let mut sn = [0u8; 6];
        sn.copy_from_slice(&self.slice[off..off + 6]);
        sn
    }

    pub fn return_mode(&self) -> u8 {
        self.slice[self.spec.layout.difop.return_mode]
    }

    /// Raw device temperature in sensor units.
    pub fn temperature(&self) -> i16 {
        let off = self.spec.layout.difop.temperature;
        parse_temperature([self.slice[off], self.slice[off + 1]])
    }

    /// Vertical calibration entries, 3 bytes each.
    pub fn vert_angle_cali(&self) -> &'a [u8] {
        let d = &self.spec.layout.difop;
        &self.slice[d.vert_angle_cali..d.vert_angle_cali + d.cali_entries * 3]
    }

    /// Horizontal calibration entries, 3 bytes each.
    pub fn horiz_angle_cali(&self) -> &'a [u8] {
        let d = &self.spec.layout.difop;
        &self.slice[d.horiz_angle_cali..d.horiz_angle_cali + d.cali_entries * 3]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LidarType, PACKET_LEN};

    #[test]
    fn test_temperature() {
        assert_eq!(parse_temperature([0x08, 0x01]), 33);
        let celsius = parse_temperature([0x08, 0x01]) as f32 * 0.0625;
        assert_eq!(celsius, 2.0625);

        // Padding bits are ignored
        assert_eq!(parse_temperature([0x0F, 0x01]), 33);
        assert_eq!(parse_temperature([0x08, 0x81]), -33);
        assert_eq!(parse_temperature([0xF8, 0x7F]), 4095);
        assert_eq!(parse_temperature([0x00, 0x00]), 0);
    }

    #[test]
    fn test_time_ymd() {
        // 2020-01-02 03:04:05.006007
        let ts = [20, 1, 2, 3, 4, 5, 0x00, 0x06, 0x00, 0x07];
        assert_eq!(parse_time_ymd(&ts), Some(1_577_934_245_006_007));

        let bad = [20, 13, 2, 3, 4, 5, 0, 0, 0, 0];
        assert_eq!(parse_time_ymd(&bad), None);
    }

    #[test]
    fn test_time_utc() {
        let mut ts = [0u8; 10];
        ts[..6].copy_from_slice(&[0x00, 0x00, 0x5E, 0x0C, 0xE1, 0x00]);
        ts[6..].copy_from_slice(&1_500u32.to_be_bytes());
        let sec = 0x5E0C_E100u64;
        assert_eq!(parse_time_utc_us(&ts), sec * 1_000_000 + 1_500);
        assert_eq!(parse_time_utc_ns(&ts), sec * 1_000_000 + 1);
    }

    #[test]
    fn test_msop_rejects_wrong_length() {
        let spec = LidarType::RsHelios.spec();
        let data = vec![0u8; 1200];
        let err = MsopPacket::from_slice(&data, spec).unwrap_err();
        assert!(matches!(
            err,
            Error::WrongLength {
                kind: PacketKind::Msop,
                expected: PACKET_LEN,
                actual: 1200
            }
        ));

        // Longer packets are rejected too
        let data = vec![0u8; PACKET_LEN + 1];
        assert!(MsopPacket::from_slice(&data, spec).is_err());
    }

    #[test]
    fn test_msop_rejects_wrong_magic() {
        // RS32 uses the 8-byte magic; an RSHELIOS header must not pass.
        let spec = LidarType::Rs32.spec();
        let mut data = vec![0u8; PACKET_LEN];
        data[..4].copy_from_slice(&[0x55, 0xAA, 0x05, 0x5A]);
        let err = MsopPacket::from_slice(&data, spec).unwrap_err();
        assert!(matches!(
            err,
            Error::WrongHeader {
                kind: PacketKind::Msop,
                ..
            }
        ));
    }

    #[test]
    fn test_block_fields() {
        let spec = LidarType::RsHelios.spec();
        let mut data = vec![0u8; PACKET_LEN];
        data[..4].copy_from_slice(spec.layout.msop_id);
        let block1 = 42 + 100;
        data[block1..block1 + 4].copy_from_slice(&[0xFF, 0xEE, 0x46, 0x50]);
        // channel 2: distance 0x0102, intensity 77
        data[block1 + 4 + 6..block1 + 4 + 9].copy_from_slice(&[0x01, 0x02, 77]);

        let pkt = MsopPacket::from_slice(&data, spec).unwrap();
        let block = pkt.block(1);
        assert_eq!(block.id(), [0xFF, 0xEE]);
        assert_eq!(block.azimuth(), 18000);
        assert_eq!(pkt.azimuth(1), 18000);
        assert_eq!(block.channel(2), (0x0102, 77));
    }

    #[test]
    fn test_difop_fields() {
        let spec = LidarType::RsHelios.spec();
        let mut data = vec![0u8; PACKET_LEN];
        data[..8].copy_from_slice(spec.layout.difop_id);
        data[8..10].copy_from_slice(&1200u16.to_be_bytes());
        data[10..14].copy_from_slice(&[192, 168, 1, 200]);
        data[24..26].copy_from_slice(&6699u16.to_be_bytes());
        data[28..30].copy_from_slice(&7788u16.to_be_bytes());
        data[32..34].copy_from_slice(&1000u16.to_be_bytes());
        data[34..36].copy_from_slice(&35000u16.to_be_bytes());
        data[292..298].copy_from_slice(&[1, 2, 3, 4, 5, 6]);
        data[300] = 0x04;
        data[342..344].copy_from_slice(&[0x08, 0x01]);

        let pkt = DifopPacket::from_slice(&data, spec).unwrap();
        assert_eq!(pkt.rpm(), 1200);
        assert_eq!(pkt.lidar_ip(), Ipv4Addr::new(192, 168, 1, 200));
        assert_eq!(pkt.msop_port(), 6699);
        assert_eq!(pkt.difop_port(), 7788);
        assert_eq!(pkt.fov_start(), 1000);
        assert_eq!(pkt.fov_end(), 35000);
        assert_eq!(pkt.serial_number(), [1, 2, 3, 4, 5, 6]);
        assert_eq!(pkt.return_mode(), 0x04);
        assert_eq!(pkt.temperature(), 33);
        assert_eq!(pkt.vert_angle_cali().len(), 96);
        assert_eq!(pkt.horiz_angle_cali().len(), 96);
    }

    #[test]
    fn test_difop_rejects_wrong_magic() {
        let spec = LidarType::Rs32.spec();
        let data = vec![0u8; PACKET_LEN];
        assert!(matches!(
            DifopPacket::from_slice(&data, spec),
            Err(Error::WrongHeader {
                kind: PacketKind::Difop,
                ..
            })
        ));
    }
}
