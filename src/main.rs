// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

mod args;

use args::Args;
use clap::Parser as _;
use edgefirst_rsdriver::{
    Decoder, DecoderConfig, DifopHandle, Error, PacketKind, PacketSource, RawPacket,
    buffer::FrameCollector,
    packet_source::UdpSource,
};
use tracing::{debug, error, info, warn};

/// Large enough for any datagram the sensor sends.
const RECV_BUF_LEN: usize = 2048;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.rust_log)
        .init();

    let config = DecoderConfig::from(&args);
    let decoder = Decoder::new(args.lidar_type, config);
    let frames = FrameCollector::new(args.frame_capacity);

    match &args.pcap {
        Some(path) => replay(&args, path, decoder, frames).await?,
        None => live(&args, decoder, frames).await?,
    }

    Ok(())
}

/// Receive MSOP and DIFOP on their own sockets. The MSOP task owns the
/// decoder, the DIFOP task only updates the shared device state.
async fn live(
    args: &Args,
    decoder: Decoder,
    frames: FrameCollector,
) -> Result<(), Box<dyn std::error::Error>> {
    let msop = UdpSource::bind(
        &format!("{}:{}", args.host_address, args.msop_port),
        PacketKind::Msop,
    )
    .await?;
    let difop = UdpSource::bind(
        &format!("{}:{}", args.host_address, args.difop_port),
        PacketKind::Difop,
    )
    .await?;
    info!(
        "{} listening on MSOP {} and DIFOP {}",
        args.lidar_type,
        msop.local_addr()?,
        difop.local_addr()?
    );

    let difop_task = tokio::spawn(difop_loop(difop, decoder.difop_handle()));
    let msop_task = tokio::spawn(msop_loop(msop, decoder, frames));

    tokio::select! {
        res = difop_task => res??,
        res = msop_task => res??,
    }

    Ok(())
}

async fn difop_loop(mut source: UdpSource, handle: DifopHandle) -> Result<(), Error> {
    let mut buf = [0u8; RECV_BUF_LEN];

    loop {
        match source.recv(&mut buf).await {
            Ok((_, len)) => {
                if let Err(err) = handle.process_difop(&buf[..len]) {
                    warn!("discarded DIFOP packet: {}", err);
                }
            }
            Err(err @ (Error::PacketTimeout(_) | Error::PacketIncomplete { .. })) => {
                warn!("{}", err);
            }
            Err(err) => {
                error!("DIFOP receive failed: {}", err);
                return Err(err);
            }
        }
    }
}

async fn msop_loop(
    mut source: UdpSource,
    mut decoder: Decoder,
    mut frames: FrameCollector,
) -> Result<(), Error> {
    let mut buf = [0u8; RECV_BUF_LEN];

    loop {
        match source.recv(&mut buf).await {
            Ok((kind, len)) => {
                if decoder.decode(RawPacket::new(kind, &buf[..len]), &mut frames) {
                    report_frame(&decoder, &frames);
                }
            }
            Err(err @ (Error::PacketTimeout(_) | Error::PacketIncomplete { .. })) => {
                warn!("{}", err);
            }
            Err(err) => {
                error!("MSOP receive failed: {}", err);
                return Err(err);
            }
        }
    }
}

#[cfg(feature = "pcap")]
async fn replay(
    args: &Args,
    path: &std::path::Path,
    mut decoder: Decoder,
    mut frames: FrameCollector,
) -> Result<(), Box<dyn std::error::Error>> {
    use edgefirst_rsdriver::PcapSource;

    let mut source = PcapSource::from_file(path, args.msop_port, args.difop_port)?;
    info!(
        "replaying {} MSOP and {} DIFOP packets from {}",
        source.count(PacketKind::Msop),
        source.count(PacketKind::Difop),
        path.display()
    );

    let mut buf = [0u8; RECV_BUF_LEN];
    let mut completed = 0usize;
    while source.has_more() {
        let (kind, len) = source.recv(&mut buf).await?;
        if decoder.decode(RawPacket::new(kind, &buf[..len]), &mut frames) {
            completed += 1;
            report_frame(&decoder, &frames);
        }
    }

    info!(
        "replay finished: {} frames, {} discarded packets",
        completed,
        frames.errors()
    );
    Ok(())
}

#[cfg(not(feature = "pcap"))]
async fn replay(
    _args: &Args,
    path: &std::path::Path,
    _decoder: Decoder,
    _frames: FrameCollector,
) -> Result<(), Box<dyn std::error::Error>> {
    Err(format!(
        "cannot replay {}: built without the pcap feature",
        path.display()
    )
    .into())
}

fn report_frame(decoder: &Decoder, frames: &FrameCollector) {
    let Some((info, points)) = frames.frame() else {
        return;
    };

    debug!(
        "frame {} height={} valid={} dropped={} ts={:.6} temp={:.2}",
        info.frame_id,
        info.height,
        points.valid_count(),
        info.dropped,
        info.timestamp,
        decoder.temperature()
    );
}
