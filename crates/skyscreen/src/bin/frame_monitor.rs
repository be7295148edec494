//! # Frame Monitor
//!
//! Consumer of the shared frame. Logs a checksum for every frame it reads,
//! which is enough to see frames arriving, stalling or tearing. Can stand
//! in for the renderer: it picks up `SKYSCREEN_FILE` and
//! `SKYSCREEN_SYNC_PORT` from its environment.
//!
//! ## Usage
//!
//! ```bash
//! frame_monitor --file /tmp/skyscreen.frame --port 5555 --frames 100
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use skyscreen::cli::{flag_value, init_logging, install_stop_handler, stop_requested};
use skyscreen::config::DEFAULT_SHARED_FILE_NAME;
use skyscreen::renderer::{ENV_SHARED_FILE, ENV_SYNC_PORT};
use skyscreen_core::{
    BufferTarget, Geometry, ReaderSession, SkyError, SkyResult, SyncConfig,
};

const USAGE: &str = "\
Usage: frame_monitor [OPTIONS]

Options:
      --file <PATH>          Shared frame file (default: $SKYSCREEN_FILE)
      --sync <MODE>          no_sync | message_bus (default: message_bus)
      --port <PORT>          Message bus port (default: $SKYSCREEN_SYNC_PORT or 5555)
      --vanes <N>            Vane count (default: 360)
      --length <N>           Positions per vane (default: 288)
  -n, --frames <N>           Exit after N frames
  -d, --duration <SECS>      Exit after N seconds
  -h, --help                 Show this help";

struct Options {
    file: PathBuf,
    sync: SyncConfig,
    geometry: Geometry,
    frames: Option<u64>,
    duration: Option<Duration>,
}

fn parse_args(args: &[String]) -> SkyResult<Option<Options>> {
    let mut options = Options {
        file: std::env::var_os(ENV_SHARED_FILE)
            .map_or_else(|| std::env::temp_dir().join(DEFAULT_SHARED_FILE_NAME), PathBuf::from),
        sync: SyncConfig::default(),
        geometry: Geometry::SKYSCREEN,
        frames: None,
        duration: None,
    };
    if let Ok(port) = std::env::var(ENV_SYNC_PORT) {
        options.sync.port = flag_value(ENV_SYNC_PORT, Some(&port))?;
    }

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1);
        match args[i].as_str() {
            "--file" => options.file = flag_value::<String>("--file", value)?.into(),
            "--sync" => options.sync.mode = flag_value("--sync", value)?,
            "--port" => options.sync.port = flag_value("--port", value)?,
            "--vanes" => options.geometry.vane_count = flag_value("--vanes", value)?,
            "--length" => options.geometry.vane_length = flag_value("--length", value)?,
            "--frames" | "-n" => options.frames = Some(flag_value("--frames", value)?),
            "--duration" | "-d" => {
                options.duration = Some(Duration::from_secs(flag_value("--duration", value)?));
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

/// Enters the session, waiting for the writer to create the file.
fn enter_when_ready(reader: &mut ReaderSession, deadline: Option<Instant>) -> SkyResult<bool> {
    let mut announced = false;
    loop {
        match reader.enter() {
            Ok(()) => return Ok(true),
            Err(SkyError::NotFound { path }) => {
                if !announced {
                    tracing::info!("waiting for {} to appear", path.display());
                    announced = true;
                }
            }
            Err(e) => return Err(e),
        }
        if deadline.is_some_and(|d| Instant::now() >= d) || stop_requested() {
            return Ok(false);
        }
        std::thread::sleep(Duration::from_millis(100));
    }
}

fn monitor(options: &Options) -> SkyResult<u64> {
    let deadline = options.duration.map(|d| Instant::now() + d);
    let mut reader = ReaderSession::from_config(
        options.geometry,
        BufferTarget::shared(&options.file),
        &options.sync,
    )?;
    if !enter_when_ready(&mut reader, deadline)? {
        return Ok(0);
    }
    tracing::info!("monitoring {} ({})", options.file.display(), options.sync.mode);

    let mut last_checksum = None;
    let mut repeats = 0u64;
    loop {
        if options.frames.is_some_and(|n| reader.frames_read() >= n)
            || deadline.is_some_and(|d| Instant::now() >= d)
            || stop_requested()
        {
            break;
        }

        let Some(frame) = reader.start_read_timeout(Duration::from_secs(1))? else {
            tracing::debug!("no frame in the last second");
            continue;
        };
        let checksum = frame.checksum();
        if last_checksum == Some(checksum) {
            repeats += 1;
        }
        last_checksum = Some(checksum);
        tracing::info!("frame {:>6}  checksum {:>12}", reader.frames_read(), checksum);
        reader.finish_read()?;
    }

    tracing::info!("{} frame(s) read, {} identical to the previous one", reader.frames_read(), repeats);
    Ok(reader.frames_read())
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

    match monitor(&options) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("monitor failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
