use std::env;
use std::time::Instant;

use anyhow::Context;
use flashplay::scheduler::VirtualClock;
use flashplay::storage::log_listing;
use flashplay::{
    AudioSource, Clock, DirStorage, MonotonicClock, NullSink, OutputSink, PlaybackConfig,
    PlaybackController, PlaybackStats, StopHandle,
};

const USAGE: &str = "\
Usage:
  flashplay [--root <dir>] [--config <file.json>] [--out <file.wav>] [--loop] [--no-pace] <source>

Flags:
  --root <dir>          Directory mounted as the flash root (default: .)
  --config <file.json>  Playback configuration
  --out <file.wav>      Capture the DAC stream to a WAV file
  --loop                Restart the source at end of stream
  --no-pace             Run as fast as possible instead of in real time
  -h, --help            Show this help

Examples:
  flashplay --root flash /Brightside.wav
  flashplay --root flash --out capture.wav /Brightside.mp3
";

struct Options {
    root: String,
    config: Option<String>,
    out: Option<String>,
    looping: bool,
    paced: bool,
    source: Option<String>,
}

fn parse_args() -> Option<Options> {
    let mut options = Options {
        root: ".".to_string(),
        config: None,
        out: None,
        looping: false,
        paced: true,
        source: None,
    };
    let mut show_help = false;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--root" | "--config" | "--out" => match args.next() {
                Some(value) => match arg.as_str() {
                    "--root" => options.root = value,
                    "--config" => options.config = Some(value),
                    _ => options.out = Some(value),
                },
                None => {
                    eprintln!("{} requires an argument", arg);
                    show_help = true;
                }
            },
            "--loop" => options.looping = true,
            "--no-pace" => options.paced = false,
            "--help" | "-h" => show_help = true,
            _ if arg.starts_with('-') => {
                eprintln!("Unknown flag: {}", arg);
                show_help = true;
            }
            _ => options.source = Some(arg),
        }
    }

    if show_help || options.source.is_none() {
        eprintln!("{}", USAGE);
        return None;
    }
    Some(options)
}

fn play<K: OutputSink>(
    storage: DirStorage,
    sink: K,
    config: PlaybackConfig,
    source: AudioSource,
    paced: bool,
) -> anyhow::Result<(K, PlaybackStats)> {
    let timer: Box<dyn Clock> = if paced {
        Box::new(MonotonicClock::new())
    } else {
        Box::new(VirtualClock::new())
    };
    let mut controller = PlaybackController::with_clock(storage, sink, config, timer);

    controller
        .start(source)
        .context("Failed to start playback")?;
    controller
        .run(&StopHandle::new())
        .context("Playback aborted")?;

    let stats = controller.stats();
    Ok((controller.into_sink(), stats))
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let options = match parse_args() {
        Some(options) => options,
        None => return Ok(()),
    };

    let mut config = match &options.config {
        Some(path) => PlaybackConfig::from_json_file(path)?,
        None => PlaybackConfig::default(),
    };
    if options.looping {
        config.loop_policy = flashplay::LoopPolicy::Loop;
    }

    let storage = match DirStorage::mount(&options.root) {
        Ok(storage) => storage,
        Err(e) => {
            log::error!("Mount Failed");
            return Err(e.into());
        }
    };
    log::info!("Mounted {}", options.root);
    log_listing(&storage)?;

    let path = options.source.unwrap_or_default();
    let source = AudioSource::from_path(&path)
        .with_context(|| format!("Cannot tell the container of '{}' from its extension", path))?;

    let started = Instant::now();
    let stats = match options.out {
        #[cfg(feature = "wav-sink")]
        Some(out) => {
            let (sink, stats) = play(
                storage,
                flashplay::WavFileSink::new(&out),
                config,
                source,
                options.paced,
            )?;
            sink.finalize()?;
            log::info!("Captured {} samples to {}", stats.samples_emitted, out);
            stats
        }
        #[cfg(not(feature = "wav-sink"))]
        Some(_) => anyhow::bail!("--out needs the `wav-sink` feature"),
        None => play(storage, NullSink::new(), config, source, options.paced)?.1,
    };

    println!("\n=== Playback Statistics ===");
    println!("Duration:          {:.2} seconds", started.elapsed().as_secs_f32());
    println!("Bytes read:        {}", stats.bytes_read);
    println!("Samples emitted:   {}", stats.samples_emitted);
    println!("Malformed frames:  {}", stats.malformed_frames);
    println!("Empty reads:       {}", stats.empty_reads);

    Ok(())
}
