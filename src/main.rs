use anyhow::{Context, Result};
use clap::Parser;
use keywatch::{
    detect_presence, ActionSink, Detection, DetectionConfig, DiagnosticsSink, ImageSource,
    Resample, Roi, SourceConfig,
};
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON config file; the flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reference image known to be free of the token
    #[arg(short, long)]
    reference: Option<PathBuf>,

    /// Image to check
    #[arg(short = 'i', long, conflicts_with = "camera")]
    candidate: Option<PathBuf>,

    /// Take the image to check from this webcam index instead of a file
    #[arg(long)]
    camera: Option<u32>,

    /// Region of interest as x1,y1,x2,y2 in full-image pixels
    #[arg(long)]
    roi: Option<Roi>,

    /// Intensity change a pixel must exceed to count as changed
    #[arg(long)]
    pixel_threshold: Option<u8>,

    /// Changed-pixel count that must be exceeded to report presence
    #[arg(long)]
    presence_threshold: Option<u64>,

    /// Filter used when the candidate region must be rescaled
    #[arg(long, value_enum)]
    resample: Option<Resample>,

    /// Give up loading an image after this many milliseconds
    #[arg(long)]
    load_timeout_ms: Option<u64>,

    /// Save the normalized region here for checking the detection area
    #[arg(long)]
    artifact: Option<PathBuf>,

    /// Save the difference mask here
    #[arg(long)]
    mask_artifact: Option<PathBuf>,

    /// Write on/off to this file after every check
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Repeat the check every N seconds instead of running once
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    interval_secs: Option<u64>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = resolve_config(&args)?;

    tracing::info!("keywatch starting");
    tracing::info!("Region: {}", config.roi);
    tracing::info!(
        "Thresholds: pixel > {}, presence > {}",
        config.pixel_threshold,
        config.presence_threshold
    );

    let mut reference = config
        .open_reference()
        .context("Failed to open reference source")?;
    let mut candidate = config
        .open_candidate()
        .context("Failed to open candidate source")?;
    let mut actions = config.action_sinks();

    match args.interval_secs {
        Some(secs) => run_watch(
            &config,
            reference.as_mut(),
            candidate.as_mut(),
            &mut actions,
            Duration::from_secs(secs),
        ),
        None => {
            let detection = check_once(&config, reference.as_mut(), candidate.as_mut())?;
            dispatch(&mut actions, &detection)?;
            println!("{}", verdict_label(&detection));
            Ok(())
        }
    }
}

/// Start from the config file (if any) and apply every flag on top
fn resolve_config(args: &Args) -> Result<DetectionConfig> {
    let base = args
        .config
        .as_ref()
        .map(DetectionConfig::from_file)
        .transpose()?;

    let candidate_flag = match (&args.candidate, args.camera) {
        (Some(path), _) => Some(SourceConfig::File(path.clone())),
        (None, Some(index)) => Some(SourceConfig::Camera(index)),
        (None, None) => None,
    };

    let mut config = match base {
        Some(config) => config,
        None => DetectionConfig::new(
            SourceConfig::File(
                args.reference
                    .clone()
                    .context("--reference is required without --config")?,
            ),
            candidate_flag
                .clone()
                .context("--candidate or --camera is required without --config")?,
            args.roi.context("--roi is required without --config")?,
        ),
    };

    if let Some(path) = &args.reference {
        config.reference = SourceConfig::File(path.clone());
    }
    if let Some(source) = candidate_flag {
        config.candidate = source;
    }
    if let Some(roi) = args.roi {
        config.roi = roi;
    }
    if let Some(threshold) = args.pixel_threshold {
        config.pixel_threshold = threshold;
    }
    if let Some(threshold) = args.presence_threshold {
        config.presence_threshold = threshold;
    }
    if let Some(resample) = args.resample {
        config.resample = resample;
    }
    if let Some(timeout) = args.load_timeout_ms {
        config.load_timeout_ms = timeout;
    }
    if let Some(path) = &args.artifact {
        config.diagnostics.artifact = Some(path.clone());
    }
    if let Some(path) = &args.mask_artifact {
        config.diagnostics.mask_artifact = Some(path.clone());
    }
    if let Some(path) = &args.state_file {
        config.state_file = Some(path.clone());
    }

    Ok(config)
}

fn check_once(
    config: &DetectionConfig,
    reference: &mut dyn ImageSource,
    candidate: &mut dyn ImageSource,
) -> Result<Detection> {
    let mut diagnostics = config.diagnostics_sink();
    let sink: &mut dyn DiagnosticsSink = diagnostics.as_mut();
    let detection = detect_presence(reference, candidate, &config.detector(), Some(sink))
        .context("Detection failed")?;
    Ok(detection)
}

fn dispatch(actions: &mut [Box<dyn ActionSink>], detection: &Detection) -> Result<()> {
    for action in actions.iter_mut() {
        action.apply(detection)?;
    }
    Ok(())
}

fn verdict_label(detection: &Detection) -> &'static str {
    if detection.present {
        "present"
    } else {
        "absent"
    }
}

/// Poll forever; a failed check is logged and retried on the next tick
fn run_watch(
    config: &DetectionConfig,
    reference: &mut dyn ImageSource,
    candidate: &mut dyn ImageSource,
    actions: &mut [Box<dyn ActionSink>],
    interval: Duration,
) -> Result<()> {
    let mut check_count = 0u64;
    let mut failure_count = 0u64;
    let mut total_check_time = Duration::ZERO;

    tracing::info!("Checking every {}s", interval.as_secs());
    tracing::info!("Press Ctrl+C to stop");

    loop {
        let loop_start = Instant::now();

        match check_once(config, reference, candidate) {
            Ok(detection) => {
                if let Err(err) = dispatch(actions, &detection) {
                    tracing::warn!("Action failed: {:#}", err);
                }
                println!("{}", verdict_label(&detection));
            }
            Err(err) => {
                failure_count += 1;
                tracing::warn!("Check failed: {:#}", err);
            }
        }

        check_count += 1;
        total_check_time += loop_start.elapsed();

        // Log stats every 10 checks
        if check_count % 10 == 0 {
            let avg_check_ms = total_check_time.as_secs_f64() * 1000.0 / check_count as f64;
            tracing::info!(
                "Check {}: avg={:.1}ms, failures={}",
                check_count,
                avg_check_ms,
                failure_count
            );
        }

        let elapsed = loop_start.elapsed();
        if elapsed < interval {
            std::thread::sleep(interval - elapsed);
        }
    }
}
