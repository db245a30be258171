//! `babylog` - CLI for the baby log
//!
//! This binary records care events and drives the background worker that
//! caches the app and delivers notifications.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use babylog::cli::{
    CacheCommand, Cli, Command, ConfigCommand, FetchCommand, NotifyCommand, OutputFormat,
    WorkerCommand,
};
use babylog::format::{format_entry, format_time};
use babylog::storage::Storage;
use babylog::worker::{
    ClickOutcome, ConsoleNotifier, FetchOutcome, Method, PageMessage, Platform, Request, Response,
    WorkerHandle,
};
use babylog::{bootstrap, init_logging, App, Config, LogEntry};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    if let Command::Config(config_cmd) = cli.command {
        return handle_config(cli.config, config_cmd);
    }

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;
    let notifier = Arc::new(ConsoleNotifier::stdout());
    let platform = Platform::with_notifier(&config, notifier.clone())
        .context("failed to set up the worker platform")?;

    let mut app = if cli.needs_worker() {
        bootstrap(config, platform.clone())?
    } else {
        App::mount(config.clone(), Storage::open(config.database_path())?)
    };

    let result = dispatch(cli.command, &mut app, &platform, &notifier).await;
    app.shutdown().await?;
    result
}

async fn dispatch(
    command: Command,
    app: &mut App,
    platform: &Platform,
    notifier: &ConsoleNotifier,
) -> Result<()> {
    match command {
        Command::Add(cmd) => {
            println!("{}", add_entry(app, cmd.to_entry()?)?);
            Ok(())
        }
        Command::List(cmd) => handle_list(app, cmd.format),
        Command::Remove(cmd) => {
            let removed = app.remove(cmd.position)?;
            println!("Removed {}", format_entry(&removed));
            Ok(())
        }
        Command::Clear(cmd) => {
            if cmd.yes {
                let count = app.clear()?;
                println!("Removed {count} entries.");
            } else {
                println!("This will remove all {} entries.", app.entries().len());
                println!("Use --yes to confirm.");
            }
            Ok(())
        }
        Command::Notify(cmd) => {
            let worker = app.require_worker().await?;
            handle_notify(&worker, notifier, &cmd).await
        }
        Command::Fetch(cmd) => {
            let worker = app.require_worker().await?;
            handle_fetch(&worker, platform, cmd).await
        }
        Command::Cache(CacheCommand::List { json }) => handle_cache_list(app, platform, json).await,
        Command::Worker(WorkerCommand::Start) => {
            let worker = app.require_worker().await?;
            run_worker(&worker).await
        }
        Command::Status(cmd) => handle_status(app, platform, cmd.json).await,
        Command::Config(_) => Ok(()),
    }
}

fn add_entry(app: &mut App, entry: LogEntry) -> Result<String> {
    let line = format_entry(&entry);
    app.add(entry).context("failed to save the log")?;
    Ok(format!("Added {line}"))
}

fn handle_list(app: &App, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(app.entries())?);
        }
        OutputFormat::Plain => {
            if let Some(reason) = app.reset_reason() {
                println!("(stored log was unreadable and has been reset: {reason})");
            }
            if app.entries().is_empty() {
                println!("No entries yet.");
            }
            for (index, entry) in app.entries().iter().enumerate() {
                println!("{:>3}. {}", index + 1, format_entry(entry));
            }
        }
    }
    Ok(())
}

async fn handle_notify(
    worker: &WorkerHandle,
    notifier: &ConsoleNotifier,
    cmd: &NotifyCommand,
) -> Result<()> {
    let message = PageMessage::send_notification(cmd.title.clone(), cmd.options());
    worker.post_message(message.to_value()).await?;
    worker.settle().await?;

    if !cmd.click {
        return Ok(());
    }
    let Some(shown) = notifier.last_displayed() else {
        bail!("notification was not displayed");
    };
    match worker.notification_click(shown).await? {
        ClickOutcome::Focused(client) => println!("Focused window {} ({})", client.id, client.url),
        ClickOutcome::Opened(Some(client)) => {
            println!("Opened window {} ({})", client.id, client.url);
        }
        ClickOutcome::Opened(None) => println!("Opened a window"),
        ClickOutcome::Nothing => println!("No window to focus or open"),
    }
    Ok(())
}

fn print_response(source: &str, response: &Response) {
    println!(
        "{source}: {} {} ({} bytes)",
        response.status,
        response.url,
        response.body.len()
    );
    if let Some(content_type) = response.header("content-type") {
        println!("content-type: {content_type}");
    }
}

async fn handle_fetch(worker: &WorkerHandle, platform: &Platform, cmd: FetchCommand) -> Result<()> {
    let request = Request::new(Method::from(cmd.method.as_str()), cmd.url);
    match worker.fetch(request.clone()).await? {
        FetchOutcome::Network(response) => print_response("network", &response),
        FetchOutcome::Cache(response) => print_response("cache", &response),
        FetchOutcome::Passthrough => {
            let response = platform.network.fetch(&request).await?;
            print_response("passthrough", &response);
        }
        FetchOutcome::Unavailable => bail!("{} is unavailable offline", request.url),
    }
    Ok(())
}

async fn handle_cache_list(app: &App, platform: &Platform, json: bool) -> Result<()> {
    let current = &app.config().worker.cache_version;
    let buckets = platform.caches.keys().await?;
    let entries = if buckets.contains(current) {
        platform.caches.entries(current).await?
    } else {
        Vec::new()
    };

    if json {
        let entries: Vec<_> = entries
            .iter()
            .map(|e| {
                serde_json::json!({
                    "url": e.url,
                    "status": e.status,
                    "size": e.size,
                    "body_hash": e.body_hash,
                    "stored_at": e.stored_at,
                })
            })
            .collect();
        let listing = serde_json::json!({
            "current": current,
            "buckets": buckets,
            "entries": entries,
        });
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    println!("Buckets");
    println!("-------");
    if buckets.is_empty() {
        println!("  (none)");
    }
    for name in &buckets {
        let marker = if name == current { " (current)" } else { " (stale)" };
        println!("  {name}{marker}");
    }
    println!();
    println!("Cached in {current}");
    println!("----------{}", "-".repeat(current.len()));
    if entries.is_empty() {
        println!("  (empty)");
    }
    for entry in &entries {
        println!(
            "  {:<40} {} {:>8} bytes  {}",
            entry.url,
            entry.status,
            entry.size,
            format_time(entry.stored_at)
        );
    }
    Ok(())
}

async fn run_worker(worker: &WorkerHandle) -> Result<()> {
    println!(
        "Worker {} is {}; reading JSON messages from stdin (Ctrl-C to stop)",
        worker.version(),
        worker.state()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str(line) {
                    Ok(message) => worker.post_message(message).await?,
                    Err(e) => warn!(error = %e, "Ignoring input that is not JSON"),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

async fn handle_status(app: &App, platform: &Platform, json: bool) -> Result<()> {
    let config = app.config();
    let stats = app.storage().stats()?;
    let installed = platform.caches.has(&config.worker.cache_version).await?;
    let buckets = platform.caches.keys().await?;

    if json {
        let status = serde_json::json!({
            "database_path": config.database_path(),
            "database_size_bytes": stats.db_size_bytes,
            "entries": app.entries().len(),
            "log_reset": app.reset_reason(),
            "worker_enabled": config.worker.enabled,
            "cache_version": config.worker.cache_version,
            "cache_installed": installed,
            "cache_buckets": buckets.len(),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("babylog status");
        println!("--------------");
        println!("Database:      {}", config.database_path().display());
        println!("Size:          {} bytes", stats.db_size_bytes);
        println!("Entries:       {}", app.entries().len());
        if let Some(reason) = app.reset_reason() {
            println!("Log reset:     {reason}");
        }
        if let Some(last) = app.entries().last() {
            println!("Last entry:    {}", format_entry(last));
        }
        println!(
            "Worker:        {}",
            if config.worker.enabled { "enabled" } else { "disabled" }
        );
        println!(
            "Cache:         {} ({})",
            config.worker.cache_version,
            if installed { "installed" } else { "not installed" }
        );
        println!("Buckets:       {}", buckets.len());
    }
    Ok(())
}

fn handle_config(config_path: Option<std::path::PathBuf>, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = Config::load_from(config_path)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Worker]");
                println!("  Enabled:            {}", config.worker.enabled);
                println!("  Cache version:      {}", config.worker.cache_version);
                println!("  Origin:             {}", config.worker.origin);
                println!("  Precache URLs:      {}", config.worker.precache.len());
                if let Some(manifest) = &config.worker.precache_manifest {
                    println!("  Precache manifest:  {}", manifest.display());
                }
                println!("  Request timeout:    {}s", config.worker.request_timeout_secs);
                println!("  Channel capacity:   {}", config.worker.channel_capacity);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file
                .or(config_path)
                .unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => bail!("configuration error: {e}"),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use babylog::EntryKind;

    #[test]
    fn test_add_entry_confirms_only_after_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("babylog.db");
        let mut app = App::mount(Config::default(), Storage::open(&path).unwrap());

        let line = add_entry(&mut app, LogEntry::feeding(Some(120))).unwrap();
        assert!(line.starts_with("Added "));

        rusqlite::Connection::open(&path)
            .unwrap()
            .execute("DROP TABLE kv_store", [])
            .unwrap();

        let err = add_entry(&mut app, LogEntry::new(EntryKind::Pee)).unwrap_err();
        assert!(err.to_string().contains("failed to save the log"));
        assert_eq!(app.entries().len(), 1);
    }
}
