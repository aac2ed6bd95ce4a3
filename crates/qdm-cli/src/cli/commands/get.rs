//! `qdm get` – download one URL in the foreground. Ctrl-C aborts.

use anyhow::{Context, Result};
use qdm_core::config::QdmConfig;
use qdm_core::naming::suggest_file_name;
use qdm_core::{probe, DownloadSession, SessionConfig, SessionError, MAX_CONCURRENCY};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug)]
pub struct GetArgs {
    pub url: String,
    pub dir: Option<PathBuf>,
    pub name: Option<String>,
    pub connections: Option<usize>,
    pub json: bool,
}

pub async fn run_get(cfg: &QdmConfig, args: GetArgs) -> Result<()> {
    let save_directory = match args.dir.or_else(|| cfg.download_dir.clone()) {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    // Explicit values are validated by the session; config values are clamped.
    let max_concurrency = args
        .connections
        .unwrap_or_else(|| cfg.clamped_connections(MAX_CONCURRENCY));
    let save_file_name = match args.name {
        Some(name) => name,
        None => pick_file_name(&args.url).await,
    };

    let session = Arc::new(DownloadSession::new(SessionConfig {
        url: args.url,
        max_concurrency,
        save_directory,
        save_file_name,
    })?);

    let mut task = {
        let session = Arc::clone(&session);
        tokio::task::spawn_blocking(move || {
            session.initialize()?;
            session.start()
        })
    };

    let started = Instant::now();
    let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);
    let joined = loop {
        tokio::select! {
            res = &mut task => break res,
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\ninterrupted, aborting download");
                session.abort();
                break (&mut task).await;
            }
            _ = ticker.tick(), if !args.json => print_progress(&session, started),
        }
    };
    let result = joined.context("download task panicked")?;

    if !args.json {
        eprintln!();
    }
    report(&session, args.json)?;
    match result {
        Ok(()) => Ok(()),
        Err(SessionError::Aborted) => anyhow::bail!("download aborted"),
        Err(e) => Err(e.into()),
    }
}

/// Name from a quick probe, falling back to the URL alone if the probe fails.
/// The session probes again on `initialize`; failures surface there.
async fn pick_file_name(url: &str) -> String {
    let probe_url = url.to_string();
    let disposition = tokio::task::spawn_blocking(move || {
        probe::probe(&probe_url, &CancellationToken::new())
    })
    .await
    .ok()
    .and_then(Result::ok)
    .and_then(|r| r.content_disposition);
    suggest_file_name(url, disposition.as_deref())
}

fn print_progress(session: &DownloadSession, started: Instant) {
    if !session.is_started() {
        return;
    }
    let done = session.bytes_received();
    let elapsed = started.elapsed().as_secs_f64();
    let rate_mib = if elapsed > 0.0 {
        done as f64 / elapsed / 1_048_576.0
    } else {
        0.0
    };
    let total = session.content_length();
    let paused = if session.is_paused() { " (paused)" } else { "" };
    if total > 0 {
        let pct = done as f64 / total as f64 * 100.0;
        eprint!(
            "\r  {:.1} / {:.1} MiB ({:.1}%)  {:.2} MiB/s{}  ",
            done as f64 / 1_048_576.0,
            total as f64 / 1_048_576.0,
            pct,
            rate_mib,
            paused
        );
    } else {
        eprint!(
            "\r  {:.1} MiB  {:.2} MiB/s{}  ",
            done as f64 / 1_048_576.0,
            rate_mib,
            paused
        );
    }
}

fn report(session: &DownloadSession, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&session.snapshot())?);
    } else if session.is_completed() {
        println!("{}", session);
    } else {
        tracing::debug!("final session state:\n{}", session);
    }
    Ok(())
}
