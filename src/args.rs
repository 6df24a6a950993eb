// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::Parser;
use edgefirst_rsdriver::{DecoderConfig, LidarType, SplitFrameMode};
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// LiDAR model producing the packets.
    #[arg(long, env, value_enum, default_value = "rshelios")]
    pub lidar_type: LidarType,

    /// Replay a pcap capture instead of listening on the network.
    #[arg(long, env)]
    pub pcap: Option<PathBuf>,

    /// Local address the MSOP and DIFOP sockets bind to.
    #[arg(long, env, default_value = "0.0.0.0")]
    pub host_address: String,

    /// MSOP (point data) UDP port
    #[arg(long, env, default_value = "6699")]
    pub msop_port: u16,

    /// DIFOP (device information) UDP port
    #[arg(long, env, default_value = "7788")]
    pub difop_port: u16,

    /// Minimum point distance in meters.
    #[arg(long, env, default_value = "0.2")]
    pub min_distance: f32,

    /// Maximum point distance in meters.
    #[arg(long, env, default_value = "200.0")]
    pub max_distance: f32,

    /// Horizontal field of view start and end angles in degrees.  The
    /// sector wraps through 0 when start is greater than end.
    #[arg(long, env, num_args = 2, value_names = ["START", "END"], value_delimiter = ' ', default_value = "0 360")]
    pub azimuth: Vec<f32>,

    /// Frame split strategy.
    #[arg(long, env, value_enum, default_value = "angle")]
    pub split_frame_mode: SplitFrameMode,

    /// Azimuth in degrees where a new frame starts, used with the angle
    /// split mode.
    #[arg(long, env, default_value = "0")]
    pub split_angle: f32,

    /// Drop filtered points instead of publishing them as NaN.
    #[arg(long, env)]
    pub dense_points: bool,

    /// Timestamp points with the LiDAR clock instead of the host clock.
    #[arg(long, env)]
    pub use_lidar_clock: bool,

    /// Discard point data until the first DIFOP packet has been decoded.
    #[arg(long, env)]
    pub wait_for_difop: bool,

    /// Channel angle calibration file overriding the DIFOP calibration.
    #[arg(long, env)]
    pub angle_path: Option<PathBuf>,

    /// Point capacity of each frame buffer.
    #[arg(long, env, default_value = "131072")]
    pub frame_capacity: usize,

    /// Application log level
    #[arg(long, env, default_value = "info")]
    pub rust_log: LevelFilter,
}

impl From<&Args> for DecoderConfig {
    fn from(args: &Args) -> Self {
        let (start_angle, end_angle) = match args.azimuth.as_slice() {
            [start, end] => (*start, *end),
            _ => (0.0, 360.0),
        };

        DecoderConfig {
            min_distance: args.min_distance,
            max_distance: args.max_distance,
            start_angle,
            end_angle,
            split_frame_mode: args.split_frame_mode,
            split_angle: args.split_angle,
            dense_points: args.dense_points,
            use_lidar_clock: args.use_lidar_clock,
            wait_for_difop: args.wait_for_difop,
            angle_path: args.angle_path.clone(),
        }
    }
}
