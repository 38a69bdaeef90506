pub mod config;
pub mod db {
    #[cfg(test)]
    pub mod memory;
    pub mod models;
    pub mod store;
}
pub mod schema;
pub mod services {
    pub mod aggregate;
    pub mod daily;
    pub mod fake_data;
    pub mod ingest;
    pub mod series;
    pub mod window;
}

use crate::config::{Config, load_env_file};
use crate::db::models::DailySummary;
use crate::services::window::{days_inclusive, operating_day};
use crate::services::{daily, fake_data};
use chrono::{Days, NaiveDate, Utc};
use diesel::PgConnection;
use diesel::prelude::*;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use log::{error, info, warn};
use std::ffi::OsString;
use std::path::PathBuf;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

const USAGE: &str = "usage: okofen-dailystats [--env-file PATH] [--days N | --from YYYY-MM-DD [--to YYYY-MM-DD] | --all] [--force] [--json]
       okofen-dailystats [--env-file PATH] --fake-data N";

#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    env_file: Option<PathBuf>,
    days: Option<i64>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    all: bool,
    force: bool,
    json: bool,
    fake_data: Option<u32>,
    help: bool,
}

#[derive(Debug, PartialEq)]
enum RunPlan {
    RecomputeAll,
    Days { days: Vec<NaiveDate>, force: bool },
    Range { from: NaiveDate, to: NaiveDate, force: bool },
    FakeData { days: u32 },
}

fn parse_args<I: IntoIterator<Item = OsString>>(args: I) -> Result<CliArgs, String> {
    let mut args = args.into_iter();
    let mut parsed = CliArgs::default();

    while let Some(arg) = args.next() {
        let arg = arg.into_string().map_err(|_| "argument contains invalid UTF-8".to_string())?;
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) if flag.starts_with("--") => (flag.to_string(), Some(value.to_string())),
            _ => (arg, None),
        };
        let mut value = |name: &str| -> Result<String, String> {
            let v = match inline.clone() {
                Some(v) => v,
                None => args
                    .next()
                    .and_then(|v| v.into_string().ok())
                    .ok_or_else(|| format!("`{name}` requires a value"))?,
            };
            if v.is_empty() {
                return Err(format!("`{name}` requires a value"));
            }
            Ok(v)
        };

        match flag.as_str() {
            "--env-file" => {
                if parsed.env_file.is_some() {
                    return Err("`--env-file` provided more than once".to_string());
                }
                parsed.env_file = Some(PathBuf::from(value("--env-file")?));
            }
            "--days" => {
                let raw = value("--days")?;
                parsed.days = Some(raw.parse().map_err(|_| format!("invalid day count: {raw}"))?);
            }
            "--from" => parsed.from = Some(parse_day(&value("--from")?, "start")?),
            "--to" => parsed.to = Some(parse_day(&value("--to")?, "end")?),
            "--fake-data" => {
                let raw = value("--fake-data")?;
                parsed.fake_data = Some(
                    raw.parse::<u32>()
                        .ok()
                        .filter(|d| *d > 0)
                        .ok_or_else(|| format!("`--fake-data` must be a positive day count (got {raw})"))?,
                );
            }
            "--all" | "--force" | "--json" | "--help" | "-h" if inline.is_some() => {
                return Err(format!("`{flag}` does not take a value"));
            }
            "--all" => parsed.all = true,
            "--force" => parsed.force = true,
            "--json" => parsed.json = true,
            "--help" | "-h" => parsed.help = true,
            other => return Err(format!("unrecognised argument: {}", other)),
        }
    }

    Ok(parsed)
}

fn parse_day(raw: &str, what: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| format!("invalid {what} date (expected YYYY-MM-DD): {raw}"))
}

/// Decide what to do before touching the database, so invalid input never
/// leaves partial work behind.
fn build_plan(args: &CliArgs, today: NaiveDate, default_days: u32) -> Result<RunPlan, String> {
    if let Some(days) = args.fake_data {
        first_of_last_days(today, i64::from(days)).ok_or_else(|| format!("`--fake-data` out of range (got {days})"))?;
        return Ok(RunPlan::FakeData { days });
    }
    if args.all {
        return Ok(RunPlan::RecomputeAll);
    }
    if let Some(from) = args.from {
        let to = args.to.unwrap_or(from);
        if to < from {
            return Err(format!("end date {to} must not be before start date {from}"));
        }
        return Ok(RunPlan::Range { from, to, force: args.force });
    }
    if args.to.is_some() {
        return Err("`--to` requires `--from`".to_string());
    }

    let count = args.days.unwrap_or(i64::from(default_days));
    if count <= 0 {
        return Err(format!("`--days` must be > 0 (got {count})"));
    }
    let first = first_of_last_days(today, count).ok_or_else(|| format!("`--days` out of range (got {count})"))?;
    Ok(RunPlan::Days {
        days: days_inclusive(first, today),
        force: args.force,
    })
}

/// First day of the `count` days ending with `today`, or `None` if it falls
/// outside the calendar.
fn first_of_last_days(today: NaiveDate, count: i64) -> Option<NaiveDate> {
    let back = u64::try_from(count.checked_sub(1)?).ok()?;
    today.checked_sub_days(Days::new(back))
}

fn apply_database_migrations(conn: &mut PgConnection) -> Result<(), String> {
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| format!("Applying database migrations failed: {}", e))?;
    if applied.is_empty() {
        info!("Database schema is up to date; no migrations were applied");
    } else {
        let names = applied.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ");
        info!("Applied {} database migration(s): {}", applied.len(), names);
    }
    Ok(())
}

fn print_json(summaries: &[DailySummary]) -> Result<(), String> {
    for summary in summaries {
        let line = serde_json::to_string(summary).map_err(|e| format!("serialise summary {}: {}", summary.day, e))?;
        println!("{line}");
    }
    Ok(())
}

fn run(args: &CliArgs) -> Result<(), String> {
    // 1) Load config
    let cfg = Config::from_env()?;
    let agg = &cfg.aggregation;
    info!(
        "Config loaded (zone={:?}, day_start={:02}:00, night_window={}h, flame_on>={}C, ecs_heating>{}C, default_days={})",
        agg.zone,
        agg.day_start_hour,
        agg.night_window.num_hours(),
        agg.flame_on_threshold_c,
        agg.ecs_heating_setpoint_c,
        cfg.default_days
    );

    // 2) Validate the request
    let today = operating_day(Utc::now(), agg);
    let plan = build_plan(args, today, cfg.default_days.get())?;

    // 3) Connect DB and apply pending migrations
    let mut conn = PgConnection::establish(&cfg.database_url).map_err(|e| format!("DB connection failed: {}", e))?;
    info!("Connected to database");
    apply_database_migrations(&mut conn)?;

    // 4) Execute
    let (summaries, removed, action) = match plan {
        RunPlan::FakeData { days } => {
            fake_data::run(&mut conn, agg, days)?;
            return Ok(());
        }
        RunPlan::RecomputeAll => {
            info!("Recomputing every day with raw samples");
            let removed = daily::cleanup_duplicates(&mut conn, None).map_err(|e| e.to_string())?;
            let summaries = daily::recompute_all(&mut conn, agg).map_err(|e| e.to_string())?;
            (summaries, removed, "recomputed")
        }
        RunPlan::Range { from, to, force } => {
            info!("Computing {} to {} (force={})", from, to, force);
            let days = days_inclusive(from, to);
            let removed = daily::cleanup_duplicates(&mut conn, Some(days.as_slice())).map_err(|e| e.to_string())?;
            let summaries = daily::compute_range(&mut conn, agg, from, to, !force).map_err(|e| e.to_string())?;
            (summaries, removed, if force { "recomputed" } else { "created" })
        }
        RunPlan::Days { days, force } => {
            info!(
                "Computing {} day(s) from {} to {} (force={})",
                days.len(),
                days.first().map(|d| d.to_string()).unwrap_or_else(|| "-".to_string()),
                days.last().map(|d| d.to_string()).unwrap_or_else(|| "-".to_string()),
                force
            );
            let removed = daily::cleanup_duplicates(&mut conn, Some(days.as_slice())).map_err(|e| e.to_string())?;
            let summaries = daily::compute_for_days(&mut conn, agg, days, !force).map_err(|e| e.to_string())?;
            (summaries, removed, if force { "recomputed" } else { "created" })
        }
    };

    if removed > 0 {
        warn!("Removed {} duplicate summary record(s)", removed);
    }
    info!("{} day(s) {}, {} duplicate(s) removed", summaries.len(), action, removed);
    if args.json {
        print_json(&summaries)?;
    }
    Ok(())
}

fn main() {
    let args = match parse_args(std::env::args_os().skip(1)) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("fatal: {}", err);
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    };
    if args.help {
        println!("{USAGE}");
        return;
    }

    let loaded_env = match &args.env_file {
        Some(path) if !path.is_file() => {
            eprintln!("fatal: env file not found: {}", path.display());
            std::process::exit(1);
        }
        Some(path) => Some(path.clone()),
        None => std::env::current_dir().ok().map(|cwd| cwd.join(".env")).filter(|p| p.is_file()),
    };
    let loaded_count = match loaded_env.as_deref().map(load_env_file).transpose() {
        Ok(count) => count,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(1);
        }
    };

    // Init logging after environment so RUST_LOG from .env is respected.
    let default_filter = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(default_filter)
        .format_timestamp_secs()
        .init();

    if let (Some(path), Some(count)) = (loaded_env.as_ref(), loaded_count) {
        info!("Environment loaded from {} ({} variable(s) applied)", path.display(), count);
    }

    info!(
        "okofen-dailystats {} (git {}) starting",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME_GIT_HASH")
    );
    if let Err(e) = run(&args) {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}
