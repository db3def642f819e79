//! CLI entry point for the bandcamp-dl tool.

use std::io::{self, IsTerminal, Read};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use bandcamp_dl_core::{
    DownloadManager, EventReceiver, ManagerError, NoopTagger, ProgressLevel, ProgressState,
    Settings,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (warn)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    // Read input: from positional args or stdin
    let urls: Vec<String> = if args.urls.is_empty() {
        if io::stdin().is_terminal() {
            info!("No input provided. Pipe URLs via stdin or pass as arguments.");
            info!("Example: echo 'https://artist.bandcamp.com/album/x' | bandcamp-dl");
            return Ok(());
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect()
    } else {
        args.urls.clone()
    };

    if urls.is_empty() {
        info!("No URLs found in input");
        return Ok(());
    }

    let settings = resolve_settings(&args)?;
    debug!(?settings, "resolved settings");

    let (mut manager, events) = DownloadManager::new(settings, Arc::new(NoopTagger));

    // Ctrl-C cancels the run; in-flight transfers may still finish.
    let cancel = manager.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            cancel.cancel();
        }
    });

    let bar = byte_progress_bar();
    let printer = spawn_event_printer(events, bar.clone(), args.verbose, args.quiet);
    let poller = spawn_bar_poller(manager.progress_state(), bar.clone());

    manager.initialize(&urls).await.map_err(cancelled_msg)?;

    for summary in manager.release_summaries() {
        bar.println(summary);
    }

    let outcome = manager.start_downloads().await;

    poller.abort();
    drop(manager);
    let _ = printer.await;
    bar.finish_and_clear();

    match outcome {
        Ok(()) => {
            info!("all downloads finished");
            Ok(())
        }
        Err(e @ ManagerError::Cancelled) => Err(cancelled_msg(e)),
    }
}

/// Loads the settings file and applies CLI overrides.
fn resolve_settings(args: &Args) -> Result<Settings> {
    let mut settings = match &args.settings {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    if let Some(output_dir) = &args.output_dir {
        settings.downloads_path.clone_from(output_dir);
    }
    if let Some(max_releases) = args.max_releases {
        settings.max_concurrent_releases = usize::from(max_releases);
    }
    if let Some(max_transfers) = args.max_transfers {
        settings.max_concurrent_transfers = usize::from(max_transfers);
    }
    if let Some(max_retries) = args.max_retries {
        settings.download_max_retries = u32::from(max_retries);
    }
    if args.discography {
        settings.download_artist_discography = true;
    }
    if args.cover_art {
        settings.save_cover_art_in_folder = true;
    }
    if args.no_tags {
        settings.modify_tags = false;
    }
    settings.validate()?;
    Ok(settings)
}

fn byte_progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template(
            "{bytes}/{total_bytes} [{bar:40.cyan/blue}] {bytes_per_sec} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar
}

/// Prints manager events above the progress bar, honoring verbosity flags.
fn spawn_event_printer(
    mut events: EventReceiver,
    bar: ProgressBar,
    verbose: u8,
    quiet: bool,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let show = match event.level {
                ProgressLevel::Error | ProgressLevel::Warning => true,
                ProgressLevel::Info | ProgressLevel::Success => !quiet,
                ProgressLevel::Verbose => verbose > 0 && !quiet,
            };
            if show {
                bar.println(event.message);
            }
        }
    })
}

/// Mirrors the shared counters into the progress bar a few times a second.
fn spawn_bar_poller(
    progress: Arc<ProgressState>,
    bar: ProgressBar,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let snap = progress.snapshot();
            bar.set_length(snap.bytes_expected);
            bar.set_position(snap.bytes_received);
            bar.set_message(format!(
                "{}/{} files",
                snap.files_completed, snap.files_expected
            ));
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    })
}

fn cancelled_msg(e: ManagerError) -> anyhow::Error {
    anyhow::anyhow!("{e}")
}
