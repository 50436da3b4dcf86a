use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use churn_core::{AccountIdentity, AccountSummary, Snapshot};
use churn_engine::{
    summarize, CaptureRunner, ExclusiveRunLock, FileKeyValueStore, FileSnapshotStore,
    ReqwestListClient, RunOutcome, SnapshotStore,
};

use crate::config::AppConfig;
use crate::session::FileSessionProvider;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

fn open_lock(config: &AppConfig) -> ExclusiveRunLock {
    ExclusiveRunLock::new(Arc::new(FileKeyValueStore::new(config.lock_dir())))
}

fn open_store(config: &AppConfig) -> FileSnapshotStore {
    FileSnapshotStore::new(config.snapshot_dir())
}

pub fn capture(config: &AppConfig, account: &AccountIdentity, session: PathBuf) -> Result<()> {
    let client = ReqwestListClient::new(config.client_settings())
        .context("failed to build the list client")?;
    let runner = CaptureRunner::new(
        Arc::new(client),
        open_lock(config),
        Arc::new(open_store(config)),
        config.capture_settings(),
    );

    match runner.run_blocking(account, &FileSessionProvider::new(session))? {
        RunOutcome::Captured(summary) => println!(
            "Captured snapshot {} for {}: {} followers, {} following",
            summary.id, account, summary.followers, summary.following
        ),
        RunOutcome::AlreadyRunning => {
            println!("A capture for {account} is already running; nothing to do.")
        }
    }
    Ok(())
}

pub fn report(config: &AppConfig, account: &AccountIdentity) -> Result<()> {
    let summary = summarize(&open_store(config), &open_lock(config), account)?;
    print!("{}", render_summary(&summary));
    Ok(())
}

pub fn history(config: &AppConfig, account: &AccountIdentity, limit: usize) -> Result<()> {
    let snapshots = open_store(config).recent(account, limit)?;
    print!("{}", render_history(account, &snapshots));
    Ok(())
}

pub fn status(config: &AppConfig, account: &AccountIdentity) -> Result<()> {
    let state = if open_lock(config).is_held(account)? {
        "running"
    } else {
        "idle"
    };
    println!("{account}: {state}");
    Ok(())
}

pub fn cancel(config: &AppConfig, account: &AccountIdentity) -> Result<()> {
    if open_lock(config).force_release(account)? {
        println!("Cleared the run lock for {account}.");
    } else {
        println!("No capture was running for {account}.");
    }
    Ok(())
}

fn render_names(out: &mut String, title: &str, names: &[String]) {
    let _ = writeln!(out, "{title} ({}):", names.len());
    if names.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for name in names {
        let _ = writeln!(out, "  {name}");
    }
}

pub fn render_summary(summary: &AccountSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Account: {}", summary.account);
    let Some(latest) = summary.latest_capture else {
        let _ = writeln!(out, "No snapshots yet.");
        if summary.is_running {
            let _ = writeln!(out, "A capture is running.");
        }
        return out;
    };

    let _ = writeln!(out, "Last capture: {}", latest.format(TIMESTAMP_FORMAT));
    let _ = writeln!(
        out,
        "Followers: {}  Following: {}",
        summary.follower_count, summary.following_count
    );
    if summary.is_running {
        let _ = writeln!(out, "A capture is running.");
    }
    render_names(&mut out, "Unfollowers", &summary.report.unfollowers);
    render_names(
        &mut out,
        "Not following back",
        &summary.report.not_following_back,
    );
    out
}

pub fn render_history(account: &AccountIdentity, snapshots: &[Snapshot]) -> String {
    let mut out = String::new();
    if snapshots.is_empty() {
        let _ = writeln!(out, "No snapshots for {account}.");
        return out;
    }
    for snapshot in snapshots {
        let _ = writeln!(
            out,
            "{}  followers {:>6}  following {:>6}",
            snapshot.captured_at().format(TIMESTAMP_FORMAT),
            snapshot.followers().len(),
            snapshot.following().len()
        );
    }
    out
}
