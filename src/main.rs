use anyhow::{Context, Result};
use clap::Parser;
use crossbeam::channel::{self, select, Receiver};
use std::io::{self, BufRead, Write};
use std::thread;
use std::time::Duration;
use tracelines::cli::{Cli, OutputFormat};
use tracelines::config::TimelineConfig;
use tracelines::event::RawEvent;
use tracelines::ingest::{self, parse_stream_line};
use tracelines::pipeline::compute_timeline;
use tracelines::render::{render_text, summary_line, RenderOptions};
use tracelines::timeline::Timeline;
use tracelines::worker::{TimelineUpdate, TimelineWorker};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

fn load_config(args: &Cli) -> Result<TimelineConfig> {
    let base = match &args.config {
        Some(path) => TimelineConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => TimelineConfig::default(),
    };

    let config = args.apply_overrides(base);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    Ok(config)
}

fn load_inputs(args: &Cli) -> Result<Vec<RawEvent>> {
    if args.inputs.is_empty() {
        return ingest::read_events(io::stdin().lock(), args.input_format)
            .context("Failed to read events from stdin");
    }

    let mut events = Vec::new();
    for path in &args.inputs {
        let batch = if path.as_os_str() == "-" {
            ingest::read_events(io::stdin().lock(), args.input_format)
                .context("Failed to read events from stdin")?
        } else {
            ingest::load_events_from_path(path, args.input_format)
                .with_context(|| format!("Failed to read {}", path.display()))?
        };
        events.extend(batch);
    }
    Ok(events)
}

fn print_timeline(timeline: &Timeline, args: &Cli) -> Result<()> {
    let rendered = match args.format {
        OutputFormat::Json if args.pretty => serde_json::to_string_pretty(timeline)?,
        OutputFormat::Json => serde_json::to_string(timeline)?,
        OutputFormat::Text => render_text(timeline, &RenderOptions::default())?,
    };

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", rendered.trim_end())?;
    Ok(())
}

fn report_update(update: &TimelineUpdate) {
    let superseded = if update.superseded { " (superseded)" } else { "" };
    match &update.outcome {
        Ok(computed) => eprintln!(
            "[tracelines] update #{}: {} events -> {}{}",
            update.generation,
            update.event_count,
            summary_line(&computed.timeline),
            superseded
        ),
        Err(err) => eprintln!(
            "[tracelines] update #{} failed: {}{}",
            update.generation, err, superseded
        ),
    }
}

/// How often buffered events are handed to the worker and updates collected
const FLUSH_INTERVAL: Duration = Duration::from_millis(100);

/// Read stdin lines on their own thread so the follow loop never blocks on input
fn spawn_stdin_reader() -> Result<Receiver<io::Result<String>>> {
    let (tx, rx) = channel::bounded(1024);
    thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("Failed to spawn stdin reader")?;
    Ok(rx)
}

fn drain_updates(worker: &mut TimelineWorker, latest: &mut Option<TimelineUpdate>) -> Result<()> {
    while let Some(update) = worker.try_next_update()? {
        report_update(&update);
        *latest = Some(update);
    }
    Ok(())
}

/// Stream stdin through the background worker, passing program output through
fn run_follow(args: &Cli, config: TimelineConfig) -> Result<()> {
    if !args.reads_stdin_only() {
        anyhow::bail!("--follow reads from stdin only");
    }
    if args.batch_size == 0 {
        anyhow::bail!("Invalid value for --batch-size: 0 (must be >= 1)");
    }

    let mut worker = TimelineWorker::new(config)?;
    let mut pending: Vec<RawEvent> = Vec::with_capacity(args.batch_size);
    let mut skipped = 0usize;
    let mut line_number = 0usize;
    let mut latest = None;

    let lines = spawn_stdin_reader()?;
    let ticker = channel::tick(FLUSH_INTERVAL);

    'stream: loop {
        select! {
            recv(lines) -> msg => {
                let Ok(line) = msg else { break 'stream };
                let line = line.context("Failed to read stdin")?;
                line_number += 1;

                match parse_stream_line(&line, line_number) {
                    Ok(tagged) => {
                        if tagged.has_text() {
                            println!("{}", tagged.passthrough);
                        }
                        pending.extend(tagged.events);
                    }
                    Err(err) => {
                        skipped += 1;
                        tracing::warn!(error = %err, "Skipping malformed trace record");
                    }
                }

                if pending.len() >= args.batch_size {
                    worker.push_events(pending.drain(..))?;
                }
            }
            recv(ticker) -> _ => {
                if !pending.is_empty() {
                    worker.push_events(pending.drain(..))?;
                }
            }
        }
        drain_updates(&mut worker, &mut latest)?;
    }

    if !pending.is_empty() || worker.generation() == 0 {
        worker.push_events(pending.drain(..))?;
    }

    while let Some(update) = worker.next_update()? {
        report_update(&update);
        latest = Some(update);
    }
    worker.shutdown();

    if skipped > 0 {
        eprintln!("[tracelines] skipped {} malformed trace records", skipped);
    }

    // The worker is idle with nothing pending, so the latest update covers every event
    let Some(update) = latest else {
        anyhow::bail!("No timeline computed");
    };
    let computed = update.outcome.context("Failed to compute timeline")?;
    if args.timings {
        computed.timings.print_summary(update.event_count);
    }
    print_timeline(&computed.timeline, args)
}

fn main() -> Result<()> {
    let args = Cli::parse();

    // Initialize tracing if --debug flag is set
    init_tracing(args.debug);

    let config = load_config(&args)?;

    if args.follow {
        return run_follow(&args, config);
    }

    let events = load_inputs(&args)?;
    tracing::debug!(events = events.len(), "Loaded events");

    let computed = compute_timeline(&events, &config).context("Failed to compute timeline")?;
    if args.timings {
        computed.timings.print_summary(events.len());
    }

    print_timeline(&computed.timeline, &args)
}
