//! # Stream Receiver
//!
//! Receiving end of the UDP frame stream. Reassembles frames and logs the
//! reassembly and socket counters once per reporting interval.
//!
//! ## Usage
//!
//! ```bash
//! stream_receiver --bind 0.0.0.0:5555
//! stream_receiver --config player.toml --frames 300
//! ```

use std::process::ExitCode;
use std::time::{Duration, Instant};

use skyscreen::cli::{flag_value, init_logging, install_stop_handler, stop_requested};
use skyscreen::PlayerConfig;
use skyscreen_core::{Geometry, SkyResult};
use skyscreen_net::{NetworkStreamReceiver, StreamConfig};

const USAGE: &str = "\
Usage: stream_receiver [OPTIONS]

Options:
  -c, --config <FILE>        Player TOML config ([stream] and [geometry] are used)
  -b, --bind <ADDR>          Listen address (default: 0.0.0.0:5555)
  -n, --frames <N>           Exit after N complete frames
      --report <SECS>        Seconds between stats lines (default: 5)
  -h, --help                 Show this help";

struct Options {
    stream: StreamConfig,
    geometry: Geometry,
    frames: Option<u64>,
    report_interval: Duration,
}

fn parse_args(args: &[String]) -> SkyResult<Option<Options>> {
    let mut options = Options {
        stream: StreamConfig::default(),
        geometry: Geometry::SKYSCREEN,
        frames: None,
        report_interval: Duration::from_secs(5),
    };

    if let Some(i) = args.iter().position(|a| a == "--config" || a == "-c") {
        let path: String = flag_value("--config", args.get(i + 1))?;
        let config = PlayerConfig::load(path)?;
        options.stream = config.stream;
        options.geometry = config.geometry;
    }

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1);
        match args[i].as_str() {
            "--config" | "-c" => {}
            "--bind" | "-b" => options.stream.bind = flag_value("--bind", value)?,
            "--frames" | "-n" => options.frames = Some(flag_value("--frames", value)?),
            "--report" => {
                options.report_interval = Duration::from_secs(flag_value::<u64>("--report", value)?.max(1));
            }
            "--help" | "-h" => {
                println!("{USAGE}");
                return Ok(None);
            }
            other => {
                eprintln!("ignoring unknown argument '{other}'");
                i += 1;
                continue;
            }
        }
        i += 2;
    }

    options.geometry.validate()?;
    Ok(Some(options))
}

fn log_stats(receiver: &NetworkStreamReceiver) {
    let reassembly = receiver.stats();
    let transport = receiver.transport_stats();
    tracing::info!(
        "frames: {} complete, {} dropped | chunks: {} ok, {} stale, {} duplicate, {} malformed | rx {} packets, {} bytes",
        reassembly.frames_completed,
        reassembly.frames_dropped,
        reassembly.chunks_accepted,
        reassembly.chunks_stale,
        reassembly.chunks_duplicate,
        reassembly.chunks_malformed,
        transport.packets_received,
        transport.bytes_received
    );
}

fn receive(options: &Options) -> SkyResult<u64> {
    let mut receiver = NetworkStreamReceiver::bind(&options.stream, options.geometry)?;
    println!("┌─ SKYSCREEN STREAM RECEIVER ─────────────────────────────────────┐");
    println!("│ Listening:  {}", receiver.local_addr());
    println!(
        "│ Geometry:   {} vanes x {} positions x {} channels",
        options.geometry.vane_count, options.geometry.vane_length, options.geometry.channel_count
    );
    println!("└──────────────────────────────────────────────────────────────────┘");

    let mut frames = 0u64;
    let mut last_report = Instant::now();
    loop {
        if options.frames.is_some_and(|n| frames >= n) || stop_requested() {
            break;
        }

        if let Some(frame) = receiver.recv_frame_timeout(options.report_interval)? {
            let checksum = frame.checksum();
            frames += 1;
            tracing::debug!("frame {:?} checksum {}", receiver.latest_frame_id(), checksum);
        }

        if last_report.elapsed() >= options.report_interval {
            log_stats(&receiver);
            last_report = Instant::now();
        }
    }

    log_stats(&receiver);
    Ok(frames)
}

fn main() -> ExitCode {
    init_logging();
    install_stop_handler();

    let args: Vec<String> = std::env::args().collect();
    let options = match parse_args(&args) {
        Ok(Some(options)) => options,
        Ok(None) => return ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!();
            eprintln!("{USAGE}");
            return ExitCode::FAILURE;
        }
    };

    match receive(&options) {
        Ok(frames) => {
            println!("Received {frames} complete frame(s)");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("receiver failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
