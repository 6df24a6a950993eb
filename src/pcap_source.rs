// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! PCAP file packet source for testing and offline replay.
//!
//! [`PcapSource`] reads UDP payloads from PCAP/PCAPNG captures and tags each
//! one as MSOP or DIFOP by its UDP port, so a single capture replays both
//! sensor streams in capture order.
//!
//! # Example
//!
//! ```ignore
//! use edgefirst_rsdriver::{
//!     packet_source::{PacketSource, RawPacket},
//!     pcap_source::PcapSource,
//! };
//!
//! let mut source = PcapSource::from_file("helios.pcap", 6699, 7788)?;
//!
//! let mut buf = [0u8; 2048];
//! while source.has_more() {
//!     let (kind, len) = source.recv(&mut buf).await?;
//!     decoder.decode(RawPacket::new(kind, &buf[..len]), &mut sink);
//! }
//! ```

use crate::{
    lidar::{Error, PacketKind},
    packet_source::PacketSource,
};
use pcap_parser::traits::PcapReaderIterator;
use std::{future::Future, path::Path, pin::Pin};
use tracing::debug;

/// UDP payload with the stream it was captured on.
#[derive(Clone)]
struct ExtractedPacket {
    kind: PacketKind,
    payload: Vec<u8>,
}

/// PCAP file packet source for testing and offline replay.
///
/// Loads the entire capture into memory. Supports both legacy PCAP and
/// PCAPNG formats. UDP packets on other ports are skipped.
pub struct PcapSource {
    packets: Vec<ExtractedPacket>,
    index: usize,
}

impl PcapSource {
    /// Load a capture from disk.
    ///
    /// A packet is MSOP when its source or destination port is `msop_port`,
    /// otherwise DIFOP when either port is `difop_port`.
    pub fn from_file<P: AsRef<Path>>(
        path: P,
        msop_port: u16,
        difop_port: u16,
    ) -> Result<Self, Error> {
        let data = std::fs::read(path.as_ref()).map_err(Error::Io)?;
        Self::from_bytes(&data, msop_port, difop_port)
    }

    /// Load a capture from bytes.
    pub fn from_bytes(data: &[u8], msop_port: u16, difop_port: u16) -> Result<Self, Error> {
        let ports = Ports {
            msop: msop_port,
            difop: difop_port,
        };
        let packets = Self::extract_packets(data, ports)?;
        debug!(
            "pcap: {} MSOP and {} DIFOP packets",
            packets.iter().filter(|p| p.kind == PacketKind::Msop).count(),
            packets.iter().filter(|p| p.kind == PacketKind::Difop).count()
        );
        Ok(Self { packets, index: 0 })
    }

    fn extract_packets(data: &[u8], ports: Ports) -> Result<Vec<ExtractedPacket>, Error> {
        let mut packets = Vec::new();

        // Section Header Block magic
        if data.len() >= 4 && data[0..4] == [0x0a, 0x0d, 0x0d, 0x0a] {
            Self::extract_pcapng(data, ports, &mut packets)?;
        } else {
            Self::extract_legacy_pcap(data, ports, &mut packets)?;
        }

        Ok(packets)
    }

    fn extract_legacy_pcap(
        data: &[u8],
        ports: Ports,
        packets: &mut Vec<ExtractedPacket>,
    ) -> Result<(), Error> {
        use pcap_parser::*;

        // Buffer size must be at least as large as the data to avoid Incomplete errors
        let mut reader = LegacyPcapReader::new(data.len(), data)
            .map_err(|e| Error::InvalidPacket(format!("Failed to create PCAP reader: {:?}", e)))?;

        loop {
            match reader.next() {
                Ok((offset, block)) => {
                    if let PcapBlockOwned::Legacy(packet) = block {
                        packets.extend(Self::extract_udp_payload(packet.data, ports));
                    }
                    reader.consume(offset);
                }
                Err(PcapError::Eof) => break,
                // Everything is loaded, a truncated tail ends the capture
                Err(PcapError::Incomplete(_)) => break,
                Err(e) => {
                    return Err(Error::InvalidPacket(format!("PCAP parse error: {:?}", e)));
                }
            }
        }

        Ok(())
    }

    fn extract_pcapng(
        data: &[u8],
        ports: Ports,
        packets: &mut Vec<ExtractedPacket>,
    ) -> Result<(), Error> {
        use pcap_parser::*;

        let mut reader = PcapNGReader::new(data.len(), data).map_err(|e| {
            Error::InvalidPacket(format!("Failed to create PCAPNG reader: {:?}", e))
        })?;

        loop {
            match reader.next() {
                Ok((offset, block)) => {
                    match block {
                        PcapBlockOwned::NG(Block::EnhancedPacket(epb)) => {
                            packets.extend(Self::extract_udp_payload(epb.data, ports));
                        }
                        PcapBlockOwned::NG(Block::SimplePacket(spb)) => {
                            packets.extend(Self::extract_udp_payload(spb.data, ports));
                        }
                        _ => {}
                    }
                    reader.consume(offset);
                }
                Err(PcapError::Eof) => break,
                Err(PcapError::Incomplete(_)) => break,
                Err(e) => {
                    return Err(Error::InvalidPacket(format!("PCAPNG parse error: {:?}", e)));
                }
            }
        }

        Ok(())
    }

    /// Extract and classify the UDP payload of an Ethernet frame.
    fn extract_udp_payload(data: &[u8], ports: Ports) -> Option<ExtractedPacket> {
        use etherparse::SlicedPacket;

        let packet = SlicedPacket::from_ethernet(data).ok()?;
        let udp = match packet.transport {
            Some(etherparse::TransportSlice::Udp(udp)) => udp,
            _ => return None,
        };

        let matches = |port: u16| udp.source_port() == port || udp.destination_port() == port;
        let kind = if matches(ports.msop) {
            PacketKind::Msop
        } else if matches(ports.difop) {
            PacketKind::Difop
        } else {
            return None;
        };

        let payload = udp.payload().to_vec();
        if payload.is_empty() {
            return None;
        }

        Some(ExtractedPacket { kind, payload })
    }

    /// Reset source to beginning for replay.
    pub fn reset(&mut self) {
        self.index = 0;
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Number of packets of `kind` in the capture.
    pub fn count(&self, kind: PacketKind) -> usize {
        self.packets.iter().filter(|p| p.kind == kind).count()
    }

    pub fn current_index(&self) -> usize {
        self.index
    }

    pub fn remaining(&self) -> usize {
        self.packets.len().saturating_sub(self.index)
    }
}

#[derive(Clone, Copy)]
struct Ports {
    msop: u16,
    difop: u16,
}

impl PacketSource for PcapSource {
    fn recv<'a>(
        &'a mut self,
        buf: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<(PacketKind, usize), Error>> + Send + 'a>> {
        Box::pin(async move {
            if self.index >= self.packets.len() {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "no more packets in PCAP",
                )));
            }

            let packet = &self.packets[self.index];
            let len = packet.payload.len().min(buf.len());
            buf[..len].copy_from_slice(&packet.payload[..len]);
            self.index += 1;
            Ok((packet.kind, len))
        })
    }

    fn has_more(&self) -> bool {
        self.index < self.packets.len()
    }
}
