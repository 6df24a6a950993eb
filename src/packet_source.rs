// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Packet source abstraction for the decoder.
//!
//! A [`PacketSource`] delivers raw packets tagged with the stream they
//! belong to:
//!
//! - **Live operation**: one [`UdpSource`] per sensor port
//! - **Testing**: replaying pre-built packets with [`TestSource`]
//! - **Pcap replay**: [`crate::pcap_source::PcapSource`] (with feature flag)
//!
//! # Example
//!
//! ```ignore
//! use edgefirst_rsdriver::packet_source::{PacketSource, RawPacket, TestSource};
//!
//! let mut source = TestSource::msop(vec![packet_a, packet_b]);
//!
//! let mut buf = [0u8; 2048];
//! while source.has_more() {
//!     let (kind, len) = source.recv(&mut buf).await?;
//!     decoder.decode(RawPacket { kind, data: &buf[..len] }, &mut sink);
//! }
//! ```

use crate::{
    lidar::{Error, PacketKind},
    model::PACKET_LEN,
};
use std::{future::Future, net::SocketAddr, pin::Pin, time::Duration};

/// Default receive timeout of the MSOP stream.
pub const MSOP_TIMEOUT: Duration = Duration::from_secs(1);

/// Default receive timeout of the DIFOP stream.
pub const DIFOP_TIMEOUT: Duration = Duration::from_secs(2);

/// A packet borrowed from a receive buffer, tagged with its stream.
#[derive(Clone, Copy, Debug)]
pub struct RawPacket<'a> {
    pub kind: PacketKind,
    pub data: &'a [u8],
}

impl<'a> RawPacket<'a> {
    pub fn new(kind: PacketKind, data: &'a [u8]) -> Self {
        Self { kind, data }
    }
}

/// Trait for packet sources.
pub trait PacketSource: Send {
    /// Receive the next packet into the provided buffer.
    ///
    /// # Returns
    /// - `Ok((kind, len))` - Stream and number of bytes received
    /// - `Err` - Timeout, truncated datagram, I/O or source error
    fn recv<'a>(
        &'a mut self,
        buf: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<(PacketKind, usize), Error>> + Send + 'a>>;

    /// Check if more packets are available.
    ///
    /// For infinite sources (like UDP), always returns `true`.
    /// For finite sources (test, pcap), returns `false` when exhausted.
    fn has_more(&self) -> bool;
}

/// UDP socket bound to one sensor port.
///
/// Receiving fails with [`Error::PacketTimeout`] when nothing arrives within
/// the timeout and with [`Error::PacketIncomplete`] for datagrams shorter
/// than the packet length. Both are recoverable: call `recv` again.
pub struct UdpSource {
    socket: tokio::net::UdpSocket,
    kind: PacketKind,
    timeout: Duration,
    packet_len: usize,
}

impl UdpSource {
    /// Wrap an existing socket.
    pub fn new(socket: tokio::net::UdpSocket, kind: PacketKind) -> Self {
        let timeout = match kind {
            PacketKind::Msop => MSOP_TIMEOUT,
            PacketKind::Difop => DIFOP_TIMEOUT,
        };

        Self {
            socket,
            kind,
            timeout,
            packet_len: PACKET_LEN,
        }
    }

    /// Bind to an address and create a UDP source for `kind` packets.
    pub async fn bind(addr: &str, kind: PacketKind) -> Result<Self, Error> {
        let socket = tokio::net::UdpSocket::bind(addr).await?;
        Ok(Self::new(socket, kind))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Minimum datagram length accepted as a complete packet.
    pub fn with_packet_len(mut self, packet_len: usize) -> Self {
        self.packet_len = packet_len;
        self
    }

    pub fn kind(&self) -> PacketKind {
        self.kind
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.socket.local_addr()?)
    }
}

impl PacketSource for UdpSource {
    fn recv<'a>(
        &'a mut self,
        buf: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<(PacketKind, usize), Error>> + Send + 'a>> {
        Box::pin(async move {
            let len = tokio::time::timeout(self.timeout, self.socket.recv(buf))
                .await
                .map_err(|_| Error::PacketTimeout(self.kind))??;

            if len < self.packet_len {
                return Err(Error::PacketIncomplete {
                    kind: self.kind,
                    len,
                });
            }

            Ok((self.kind, len))
        })
    }

    fn has_more(&self) -> bool {
        true // UDP sources are infinite
    }
}

/// Test packet source for unit testing.
///
/// Provides a sequence of pre-defined packets for testing decoder logic
/// without hardware.
pub struct TestSource {
    packets: Vec<(PacketKind, Vec<u8>)>,
    index: usize,
}

impl TestSource {
    /// Create a new test source with the given tagged packets.
    pub fn new(packets: Vec<(PacketKind, Vec<u8>)>) -> Self {
        Self { packets, index: 0 }
    }

    /// Create a test source holding only MSOP packets.
    pub fn msop(packets: Vec<Vec<u8>>) -> Self {
        Self::new(
            packets
                .into_iter()
                .map(|data| (PacketKind::Msop, data))
                .collect(),
        )
    }

    /// Create an empty test source.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Reset the source to the beginning.
    pub fn reset(&mut self) {
        self.index = 0;
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.index
    }
}

impl PacketSource for TestSource {
    fn recv<'a>(
        &'a mut self,
        buf: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<(PacketKind, usize), Error>> + Send + 'a>> {
        Box::pin(async move {
            if self.index >= self.packets.len() {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "no more packets",
                )));
            }

            let (kind, packet) = &self.packets[self.index];
            let len = packet.len().min(buf.len());
            buf[..len].copy_from_slice(&packet[..len]);
            self.index += 1;
            Ok((*kind, len))
        })
    }

    fn has_more(&self) -> bool {
        self.index < self.packets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_test_source() {
        let packets = vec![
            (PacketKind::Msop, vec![1, 2, 3, 4]),
            (PacketKind::Difop, vec![5, 6, 7, 8, 9, 10]),
            (PacketKind::Msop, vec![11, 12]),
        ];
        let mut source = TestSource::new(packets);

        assert!(source.has_more());
        assert_eq!(source.len(), 3);

        let mut buf = [0u8; 100];

        let (kind, len) = source.recv(&mut buf).await.unwrap();
        assert_eq!(kind, PacketKind::Msop);
        assert_eq!(&buf[..len], &[1, 2, 3, 4]);

        let (kind, len) = source.recv(&mut buf).await.unwrap();
        assert_eq!(kind, PacketKind::Difop);
        assert_eq!(&buf[..len], &[5, 6, 7, 8, 9, 10]);

        assert!(source.has_more());
        let (_, len) = source.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], &[11, 12]);

        // No more
        assert!(!source.has_more());
        assert!(source.recv(&mut buf).await.is_err());
    }

    #[tokio::test]
    async fn test_test_source_reset() {
        let mut source = TestSource::msop(vec![vec![1, 2], vec![3, 4]]);
        let mut buf = [0u8; 100];

        source.recv(&mut buf).await.unwrap();
        source.recv(&mut buf).await.unwrap();
        assert!(!source.has_more());

        source.reset();
        assert!(source.has_more());
        assert_eq!(source.current_index(), 0);

        let (kind, len) = source.recv(&mut buf).await.unwrap();
        assert_eq!(kind, PacketKind::Msop);
        assert_eq!(&buf[..len], &[1, 2]);
    }

    #[tokio::test]
    async fn test_empty_test_source() {
        let mut source = TestSource::empty();
        assert!(!source.has_more());
        assert!(source.is_empty());

        let mut buf = [0u8; 100];
        assert!(source.recv(&mut buf).await.is_err());
    }

    #[tokio::test]
    async fn test_buffer_truncation() {
        let mut source = TestSource::msop(vec![vec![1, 2, 3, 4, 5, 6, 7, 8]]);

        let mut buf = [0u8; 4];
        let (_, len) = source.recv(&mut buf).await.unwrap();
        assert_eq!(len, 4);
        assert_eq!(&buf[..len], &[1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_udp_source_receives_packet() {
        let mut source = UdpSource::bind("127.0.0.1:0", PacketKind::Msop)
            .await
            .unwrap();
        let addr = source.local_addr().unwrap();

        let sender = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(&[0xAB; PACKET_LEN], addr).await.unwrap();

        let mut buf = [0u8; 2048];
        let (kind, len) = source.recv(&mut buf).await.unwrap();
        assert_eq!(kind, PacketKind::Msop);
        assert_eq!(len, PACKET_LEN);
        assert_eq!(buf[0], 0xAB);
    }

    #[tokio::test]
    async fn test_udp_source_incomplete() {
        let mut source = UdpSource::bind("127.0.0.1:0", PacketKind::Difop)
            .await
            .unwrap();
        let addr = source.local_addr().unwrap();

        let sender = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(&[0u8; 100], addr).await.unwrap();

        let mut buf = [0u8; 2048];
        let err = source.recv(&mut buf).await.unwrap_err();
        assert!(matches!(
            err,
            Error::PacketIncomplete {
                kind: PacketKind::Difop,
                len: 100
            }
        ));
    }

    #[tokio::test]
    async fn test_udp_source_timeout() {
        let mut source = UdpSource::bind("127.0.0.1:0", PacketKind::Msop)
            .await
            .unwrap()
            .with_timeout(Duration::from_millis(20));

        let mut buf = [0u8; 2048];
        let err = source.recv(&mut buf).await.unwrap_err();
        assert!(matches!(err, Error::PacketTimeout(PacketKind::Msop)));
        assert!(source.has_more());
    }
}
