// SPDX-License-Identifier: GPL-3.0-only

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use vidpipe::config::{Codec, GopMode, LatencyMode, Profile, QpMode, RateControl, SinkType};

mod cli;

#[derive(Parser)]
#[command(name = "vidpipe")]
#[command(about = "Capture, filter, encode and display video on accelerator boards")]
#[command(version = vidpipe::constants::app_info::version())]
struct Cli {
    /// Display controller (DRM card) index
    #[arg(long, global = true, default_value = "0")]
    drm_module: u32,

    /// Force the display mode: 720p, 1080p, 2160p or WxH
    #[arg(long, global = true)]
    resolution: Option<String>,

    /// Load filter bitstreams by partial reconfiguration
    #[arg(long, global = true)]
    partial_reconfig: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List sources, sinks or filters
    List {
        /// One of: sources, sinks, filters
        #[arg(default_value = "sources")]
        what: String,
    },

    /// Run one pipeline until end-of-stream or Ctrl+C
    Run(RunArgs),

    /// Cycle through source and filter combinations
    Demo {
        /// Seconds per step
        #[arg(short, long, default_value = "10")]
        interval: u64,

        /// Stop after this many passes over all steps
        #[arg(short, long)]
        cycles: Option<usize>,

        /// Video file for the file source step
        #[arg(long)]
        uri: Option<String>,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Source type (`h` lists them)
    #[arg(short, long)]
    source: Option<String>,

    /// Sink driver (`h` lists them)
    #[arg(long)]
    sink: Option<String>,

    /// Filter name, optionally with a kernel: blur/123456789
    #[arg(short, long)]
    filter: Option<String>,

    /// Filter acceleration: hw or sw
    #[arg(long)]
    accel: Option<String>,

    /// passthrough or processing
    #[arg(short, long)]
    mode: Option<String>,

    /// File path or network URI for the file source
    #[arg(short, long)]
    uri: Option<String>,

    /// display, record, stream or split-screen
    #[arg(long)]
    sink_type: Option<SinkType>,

    /// Output file for record (default: ~/Videos/vidpipe/vidpipe_TIMESTAMP.mp4)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Destination host for stream
    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u32>,

    /// Record duration in minutes
    #[arg(short, long)]
    duration: Option<u32>,

    #[arg(long)]
    codec: Option<Codec>,

    /// Target bitrate in kbps
    #[arg(long)]
    bitrate: Option<u32>,

    #[arg(long)]
    gop_length: Option<u32>,

    #[arg(long)]
    b_frames: Option<u32>,

    #[arg(long)]
    slices: Option<u32>,

    #[arg(long)]
    profile: Option<Profile>,

    #[arg(long)]
    rate_control: Option<RateControl>,

    #[arg(long)]
    gop_mode: Option<GopMode>,

    #[arg(long)]
    latency_mode: Option<LatencyMode>,

    #[arg(long)]
    qp_mode: Option<QpMode>,

    /// Route the display through the encoder and decoder
    #[arg(long)]
    encode: bool,

    /// Device control, e.g. tpg-pattern=9 (repeatable)
    #[arg(long = "control")]
    controls: Vec<String>,

    /// Session config file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print fps and bitrate every second
    #[arg(long)]
    stats: bool,
}

impl From<RunArgs> for cli::RunOptions {
    fn from(args: RunArgs) -> Self {
        Self {
            source: args.source,
            sink: args.sink,
            filter: args.filter,
            accel: args.accel,
            mode: args.mode,
            uri: args.uri,
            sink_type: args.sink_type,
            output: args.output,
            host: args.host,
            port: args.port,
            duration: args.duration,
            codec: args.codec,
            bitrate: args.bitrate,
            gop_length: args.gop_length,
            b_frames: args.b_frames,
            slices: args.slices,
            profile: args.profile,
            rate_control: args.rate_control,
            gop_mode: args.gop_mode,
            latency_mode: args.latency_mode,
            qp_mode: args.qp_mode,
            encode: args.encode,
            controls: args.controls,
            config: args.config,
            stats: args.stats,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=vidpipe=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let args = Cli::parse();
    let global = cli::GlobalOptions {
        drm_module: args.drm_module,
        resolution: args.resolution,
        partial_reconfig: args.partial_reconfig,
    };

    match args.command {
        Commands::List { what } => cli::list(&what),
        Commands::Run(run) => cli::run(global, run.into()),
        Commands::Demo {
            interval,
            cycles,
            uri,
        } => cli::demo(global, interval, cycles, uri),
    }
}
