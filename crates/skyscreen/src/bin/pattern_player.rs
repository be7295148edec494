//! # Pattern Player
//!
//! Plays a built-in test pattern into a shared frame, a UDP stream, or
//! nowhere.
//!
//! ## Usage
//!
//! ```bash
//! pattern_player --pattern grid --output shared --renderer ./render
//! pattern_player --output udp --udp-target skyscreen.local:5555
//! pattern_player --output fake --frames 1000
//! ```

use std::process::ExitCode;

use skyscreen::cli::{flag_value, init_logging, install_stop_handler};
use skyscreen::{run, PlayerConfig, RendererConfig};
use skyscreen_core::SkyResult;

const USAGE: &str = "\
Usage: pattern_player [OPTIONS]

Options:
  -c, --config <FILE>        TOML config file (flags below override it)
  -o, --output <MODE>        shared | udp | fake (default: shared)
  -p, --pattern <NAME>       solid | grid | lines (default: solid)
  -f, --fps <RATE>           Frames per second (default: 30)
  -n, --frames <N>           Stop after N frames
      --file <PATH>          Shared frame file
      --sync <MODE>          no_sync | message_bus | none_required
      --port <PORT>          Message bus port (default: 5555)
      --udp-target <ADDR>    host or host:port (default: localhost:5555)
      --renderer <CMD>       Renderer program to supervise
  -h, --help                 Show this help";

fn parse_args(args: &[String]) -> SkyResult<Option<PlayerConfig>> {
    let mut config = PlayerConfig::default();

    // The config file is the base; flags override it wherever they appear.
    if let Some(i) = args.iter().position(|a| a == "--config" || a == "-c") {
        let path: String = flag_value("--config", args.get(i + 1))?;
        config = PlayerConfig::load(path)?;
    }

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1);
        match args[i].as_str() {
            "--config" | "-c" => {}
            "--output" | "-o" => config.output = flag_value("--output", value)?,
            "--pattern" | "-p" => config.pattern = flag_value("--pattern", value)?,
            "--fps" | "-f" => config.frame_rate = flag_value("--fps", value)?,
            "--frames" | "-n" => config.max_frames = Some(flag_value("--frames", value)?),
            "--file" => config.shared_file = Some(flag_value::<String>("--file", value)?.into()),
            "--sync" => config.sync.mode = flag_value("--sync", value)?,
            "--port" => config.sync.port = flag_value("--port", value)?,
            "--udp-target" => config.stream.target = flag_value("--udp-target", value)?,
            "--renderer" => {
                config.renderer = Some(RendererConfig {
                    command: flag_value("--renderer", value)?,
                    args: Vec::new(),
                });
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

    config.validate()?;
    Ok(Some(config))
}

fn main() -> ExitCode {
    init_logging();

    let args: Vec<String> = std::env::args().collect();
    let config = match parse_args(&args) {
        Ok(Some(config)) => config,
        Ok(None) => return ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!();
            eprintln!("{USAGE}");
            return ExitCode::FAILURE;
        }
    };

    println!("┌─ SKYSCREEN PATTERN PLAYER ──────────────────────────────────────┐");
    println!("│ Pattern:    {}", config.pattern);
    println!("│ Output:     {}", config.output);
    println!("│ Frame Rate: {} fps", config.frame_rate);
    println!(
        "│ Geometry:   {} vanes x {} positions x {} channels",
        config.geometry.vane_count, config.geometry.vane_length, config.geometry.channel_count
    );
    println!("└──────────────────────────────────────────────────────────────────┘");

    let stop = install_stop_handler();
    match run(&config, stop) {
        Ok(summary) => {
            println!(
                "Played {} frame(s), {} late, avg draw {}us",
                summary.frames, summary.timing.late_frames, summary.timing.avg_frame_us
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("player failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
