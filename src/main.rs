// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use compositor::analysis::display_key;
use compositor::config::{AnalyzerFile, ConfigEvent, ConfigWatcher, MidiDeviceConfig};
use compositor::midi::{print_sources, KeyboardEvent, KeyboardTransport, MidirTransport};
use compositor::music::{order_and_dedupe, Note, ScaleCatalog};
use compositor::session::Session;
use compositor::timing::SessionClock;
use tracing::Level;

fn print_usage() {
    println!("Compositor - Live Key and Scale Analyzer");
    println!();
    println!("Usage: compositor [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --list-sources               List available MIDI sources (inputs)");
    println!("  --monitor <N>                Print keyboard events from source N");
    println!("  --analyze [N] [--config <F>] Analyze live input from source N (default: first)");
    println!("  --scales [NOTE...]           List the scales that contain every given note");
    println!("  --verbose, -v                Log at debug level");
    println!("  --help                       Show this help message");
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Remove every occurrence of the given flags; returns whether any was present
fn take_flag(args: &mut Vec<String>, flags: &[&str]) -> bool {
    let before = args.len();
    args.retain(|arg| !flags.contains(&arg.as_str()));
    args.len() != before
}

fn format_notes(notes: &[Note]) -> String {
    if notes.is_empty() {
        return "-".to_string();
    }
    notes
        .iter()
        .map(|note| note.name())
        .collect::<Vec<_>>()
        .join(" ")
}

async fn monitor_input(source: usize) -> Result<()> {
    println!("Connecting to MIDI source {}...", source);
    let device = MidiDeviceConfig {
        source: Some(source),
        ..MidiDeviceConfig::default()
    };
    let mut transport = MidirTransport::new(device, SessionClock::start());
    let mut stream = transport.subscribe()?;

    println!("Monitoring MIDI input (press Ctrl+C to stop)...");
    println!();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = stream.recv() => match event {
                Some(raw) => match KeyboardEvent::try_from(raw) {
                    Ok(event) => print!("---\n{}", event.to_yaml()?),
                    Err(e) => eprintln!("Undecodable event: {}", e),
                },
                None => break,
            },
        }
    }

    transport.close();
    println!();
    println!("Monitor complete!");
    Ok(())
}

fn parse_analyze_args(args: &[String]) -> Result<(Option<usize>, Option<PathBuf>)> {
    let mut source = None;
    let mut config = None;

    let mut rest = args.iter();
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--config" => {
                let path = rest
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                config = Some(PathBuf::from(path));
            }
            other => {
                let index: usize = other
                    .parse()
                    .map_err(|_| anyhow!("Invalid source number: {}", other))?;
                source = Some(index);
            }
        }
    }

    Ok((source, config))
}

async fn next_config_event(watcher: &mut Option<ConfigWatcher>) -> Option<ConfigEvent> {
    match watcher {
        Some(watcher) => watcher.recv().await,
        None => std::future::pending().await,
    }
}

async fn analyze(source: Option<usize>, config_path: Option<PathBuf>) -> Result<()> {
    let mut config = match &config_path {
        Some(path) => AnalyzerFile::load(path)?,
        None => AnalyzerFile::default(),
    };
    if source.is_some() {
        config.midi.source = source;
    }

    let clock = SessionClock::start();
    let transport = MidirTransport::new(config.midi.clone(), clock);
    let session = Session::start(transport, &config.analysis, clock)?;
    let mut outputs = session.outputs();
    let control = session.control();
    let mut watcher = match &config_path {
        Some(path) => Some(ConfigWatcher::new(path, None)?),
        None => None,
    };

    println!("Analyzing keyboard input (press Ctrl+C to stop)...");
    println!();

    let mut last_key = display_key(None);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Ok(()) = outputs.connection.changed() => {
                println!("[device]  {}", *outputs.connection.borrow_and_update());
            }
            Ok(()) = outputs.pressed.changed() => {
                let held = outputs.pressed.borrow_and_update().set_notes();
                println!("[pressed] {}", format_notes(&held));
            }
            Ok(()) = outputs.scanned.changed() => {
                let scanned = outputs.scanned.borrow_and_update().clone();
                println!("[recent]  {}", format_notes(&scanned));
            }
            Ok(()) = outputs.key.changed() => {
                let estimate = *outputs.key.borrow_and_update();
                let key = display_key(estimate.as_ref());
                if key != last_key {
                    println!("[key]     {}", key);
                    last_key = key;
                }
            }
            Some(event) = next_config_event(&mut watcher) => match event {
                ConfigEvent::Reloaded(file) => {
                    println!("Configuration reloaded");
                    control.set_maximum_notes(file.analysis.maximum_notes);
                }
                ConfigEvent::Error(message) => eprintln!("{}", message),
            },
        }
    }

    session.shutdown().await?;
    println!();
    println!("Analysis stopped.");
    Ok(())
}

fn print_scales(names: &[String]) -> Result<()> {
    let notes = names
        .iter()
        .map(|name| name.parse::<Note>())
        .collect::<Result<Vec<_>, _>>()?;
    let notes = order_and_dedupe(&notes);

    let catalog = ScaleCatalog::standard();
    if notes.is_empty() {
        println!("All {} scales:", catalog.len());
    } else {
        println!("Scales containing {}:", format_notes(&notes));
    }

    let mut found = 0;
    for scale in catalog.consistent_with(&notes) {
        println!("  {:<24} {}", scale.name(), format_notes(scale.notes()));
        found += 1;
    }
    if found == 0 {
        println!("  (none)");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut args: Vec<String> = env::args().collect();
    let verbose = take_flag(&mut args, &["--verbose", "-v"]);
    init_logging(verbose);

    if args.len() < 2 {
        println!("Compositor - Live Key and Scale Analyzer");
        println!("Run with --help for usage information");
        return Ok(());
    }

    match args[1].as_str() {
        "--list-sources" => {
            print_sources()?;
        }
        "--monitor" => {
            if args.len() < 3 {
                eprintln!("Error: --monitor requires a source number");
                eprintln!("Use --list-sources to see available sources");
                std::process::exit(1);
            }
            let source: usize = args[2]
                .parse()
                .map_err(|_| anyhow!("Invalid source number: {}", args[2]))?;
            monitor_input(source).await?;
        }
        "--analyze" => {
            let (source, config) = parse_analyze_args(&args[2..])?;
            analyze(source, config).await?;
        }
        "--scales" => {
            print_scales(&args[2..])?;
        }
        "--help" | "-h" => {
            print_usage();
        }
        _ => {
            eprintln!("Unknown option: {}", args[1]);
            print_usage();
            std::process::exit(1);
        }
    }

    Ok(())
}
