//! Subcommand implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Datelike, Local, NaiveDate};
use tracing::debug;

use klinik_core::calendar::{disabled_reason, AvailabilityStatus};
use klinik_core::utils::{format_bytes, format_date_long, month_name, truncate_string, weekday_headers};
use klinik_core::{
    AvailabilityCalendar, AvailabilityClient, CacheStorage, Config, FetchRouter, HttpFetcher,
    Registration, RegistrationOutcome, Request, SelectionError,
};

/// Subdirectory of the cache directory holding the worker's caches
const CACHES_SUBDIR: &str = "caches";

/// Width of the request column in `caches --verbose`
const KEY_COLUMN_WIDTH: usize = 72;

fn open_storage(cache_dir: &Path) -> Result<CacheStorage> {
    let root: PathBuf = cache_dir.join(CACHES_SUBDIR);
    CacheStorage::open_dir(&root)
        .with_context(|| format!("Failed to open cache storage at {}", root.display()))
}

pub async fn install(config: &Config, cache_dir: &Path) -> Result<()> {
    let worker = config.worker_config()?;
    let storage = open_storage(cache_dir)?;
    let fetcher = Arc::new(HttpFetcher::with_timeout(worker.request_timeout)?);

    eprintln!(
        "Installing {} from {} ({} shell paths)...",
        worker.cache_name(),
        worker.origin,
        worker.shell.len()
    );
    let mut registration = Registration::new(storage, fetcher);
    let outcome = registration
        .register(worker)
        .await
        .context("Install failed; existing caches were left untouched")?;

    match outcome {
        RegistrationOutcome::Activated { version, evicted } => {
            println!("Activated {}", version);
            for name in evicted {
                println!("  evicted {}", name);
            }
        }
        RegistrationOutcome::Waiting { version } => println!("Installed {}, waiting", version),
        RegistrationOutcome::Unchanged { version } => println!("{} already active", version),
    }
    Ok(())
}

pub async fn fetch(
    config: &Config,
    cache_dir: &Path,
    target: &str,
    html: bool,
    print_body: bool,
) -> Result<()> {
    let worker = config.worker_config()?;
    let url = worker.resolve(target)?;
    let storage = open_storage(cache_dir)?;
    let fetcher = Arc::new(HttpFetcher::with_timeout(worker.request_timeout)?);
    let router = FetchRouter::new(Arc::new(worker), storage, fetcher);

    let request = if html {
        Request::navigate(url)
    } else {
        Request::get(url)
    };
    let routed = router.route(&request).await?;
    // Let the background page refresh land before the process exits
    router.settle().await;

    eprintln!(
        "{} {} via {} ({}, {})",
        routed.response.status,
        routed.response.url,
        routed.source,
        routed.policy,
        format_bytes(routed.response.body.len())
    );
    if print_body {
        println!("{}", routed.response.text());
    }
    Ok(())
}

pub fn caches(cache_dir: &Path, verbose: bool) -> Result<()> {
    let storage = open_storage(cache_dir)?;
    if let Some(root) = storage.root() {
        println!("Caches in {}", root.display());
    }
    let names = storage.names();
    if names.is_empty() {
        println!("No caches");
        return Ok(());
    }

    for name in names {
        let cache = storage.open(&name)?;
        println!("{} ({} entries)", name, cache.len());
        if !verbose {
            continue;
        }
        for key in cache.keys() {
            if let Some(entry) = cache.entry(&key) {
                println!(
                    "  {:<width$} {:>3} {:>9} {}",
                    truncate_string(key.as_str(), KEY_COLUMN_WIDTH),
                    entry.data.status,
                    format_bytes(entry.data.body.len()),
                    entry.age_display(),
                    width = KEY_COLUMN_WIDTH
                );
            }
        }
    }
    Ok(())
}

fn parse_month(raw: &str) -> Result<(i32, u32)> {
    let first = NaiveDate::parse_from_str(&format!("{}-01", raw), "%Y-%m-%d")
        .with_context(|| format!("Invalid month {:?}, expected YYYY-MM", raw))?;
    Ok((first.year(), first.month()))
}

pub async fn calendar(config: &Config, month: Option<&str>, date: Option<&str>) -> Result<()> {
    let today = Local::now().date_naive();
    let (year, month) = match month {
        Some(raw) => parse_month(raw)?,
        None => (today.year(), today.month()),
    };
    let selected = date
        .map(|raw| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .with_context(|| format!("Invalid date {:?}, expected YYYY-MM-DD", raw))
        })
        .transpose()?;

    let client = AvailabilityClient::new(config.availability_endpoint()?)?;
    let calendar = match client.load_calendar().await {
        Ok(calendar) => calendar,
        Err(e) => {
            debug!(error = ?e, "Schedule load failed");
            anyhow::bail!("{}", e.user_message());
        }
    };

    print_month(&calendar, year, month, today)?;
    if let Some(date) = selected {
        println!();
        print_day(&calendar, date, today);
    }
    Ok(())
}

fn print_month(calendar: &AvailabilityCalendar, year: i32, month: u32, today: NaiveDate) -> Result<()> {
    let weeks = calendar
        .month_grid(year, month, today)
        .ok_or_else(|| anyhow::anyhow!("Invalid month {}-{:02}", year, month))?;

    println!("{} {}", month_name(month), year);
    println!(" {}", weekday_headers().join("  "));
    for week in weeks {
        let row: Vec<String> = week
            .iter()
            .map(|cell| {
                if !cell.in_month {
                    return "   ".to_string();
                }
                let marker = if cell.disabled {
                    '.'
                } else {
                    cell.status.map(|s| s.marker()).unwrap_or(' ')
                };
                format!("{:>2}{}", cell.date.day(), marker)
            })
            .collect();
        println!(" {}", row.join(" "));
    }

    let legend: Vec<String> = [
        AvailabilityStatus::Plentiful,
        AvailabilityStatus::Limited,
        AvailabilityStatus::Full,
        AvailabilityStatus::Closed,
    ]
    .iter()
    .map(|s| format!("{} {}", s.marker(), s.label()))
    .collect();
    println!();
    println!("{}   . tidak dapat dipilih", legend.join("   "));
    Ok(())
}

fn print_day(calendar: &AvailabilityCalendar, date: NaiveDate, today: NaiveDate) {
    println!("{}", format_date_long(date));
    match calendar.select(date, today) {
        Ok(day) => {
            let status = day.status();
            if status.is_bookable() {
                println!("Status: {} ({} sesi tersedia)", status, day.available);
            } else {
                println!("Status: {}, tidak dapat dipesan", status);
            }
            for session in &day.sessions {
                match session.note {
                    Some(ref note) => println!(
                        "  Sesi {}  {}  {} ({})",
                        session.index,
                        session.time_range(),
                        session.status,
                        note
                    ),
                    None => println!(
                        "  Sesi {}  {}  {}",
                        session.index,
                        session.time_range(),
                        session.status
                    ),
                }
            }
        }
        Err(e) => {
            debug!(date = %date, reason = ?disabled_reason(date, today), "Date not selectable");
            println!("{}", e);
            if let (SelectionError::NoData(_), Some(range)) = (&e, calendar.range()) {
                if !range.contains(date) {
                    println!("Jadwal yang dimuat hanya mencakup {} s.d. {}", range.start, range.end);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_month() {
        assert_eq!(parse_month("2026-10").unwrap(), (2026, 10));
        assert!(parse_month("2026-13").is_err());
        assert!(parse_month("Oktober").is_err());
    }
}
