use std::fmt;

use services::{AppServices, Clock, Inbox};
use testsync_core::model::{AssignmentId, CampaignId, DayState, TesterId};
use testsync_core::notifications::DateLabel;
use testsync_core::progress::AssignmentProgress;
use tracing_subscriber::EnvFilter;

const DEFAULT_DB_URL: &str = "sqlite://testsync.sqlite3";

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidNumber { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown command: {cmd}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid database url: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_number<T: std::str::FromStr>(flag: &'static str, raw: String) -> Result<T, ArgsError> {
    raw.trim()
        .parse()
        .map_err(|_| ArgsError::InvalidNumber { flag, raw })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  testsync assign     --tester <id> --campaign <id> --days <n>");
    eprintln!("  testsync screenshot --assignment <id> --day <n> --url <ref>");
    eprintln!("  testsync feedback   --assignment <id> --day <n> --text <text>");
    eprintln!("  testsync progress   --assignment <id> [--json]");
    eprintln!("  testsync list       --tester <id> [--limit <n>]");
    eprintln!("  testsync inbox      --tester <id> [--limit <n>] [--json]");
    eprintln!();
    eprintln!("Global options:");
    eprintln!("  --db <sqlite_url>        primary database (default {DEFAULT_DB_URL})");
    eprintln!("  --cache-db <sqlite_url>  local cache; makes --db the remote store");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  TESTSYNC_DB_URL, TESTSYNC_CACHE_DB_URL, TESTSYNC_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Assign {
        tester: TesterId,
        campaign: CampaignId,
        days: u32,
    },
    Screenshot {
        assignment: AssignmentId,
        day: u32,
        url: String,
    },
    Feedback {
        assignment: AssignmentId,
        day: u32,
        text: String,
    },
    Progress {
        assignment: AssignmentId,
        json: bool,
    },
    List {
        tester: TesterId,
        limit: u32,
    },
    Inbox {
        tester: TesterId,
        limit: u32,
        json: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Args {
    db_url: String,
    cache_db_url: Option<String>,
    command: Command,
}

/// Flags collected before the command's required set is checked.
#[derive(Default)]
struct Flags {
    tester: Option<u64>,
    campaign: Option<u64>,
    assignment: Option<u64>,
    days: Option<u32>,
    day: Option<u32>,
    limit: Option<u32>,
    url: Option<String>,
    text: Option<String>,
    json: bool,
}

fn required<T>(value: Option<T>, flag: &'static str) -> Result<T, ArgsError> {
    value.ok_or(ArgsError::MissingFlag { flag })
}

impl Args {
    fn parse(
        command: &str,
        args: &mut impl Iterator<Item = String>,
        env_db: Option<String>,
        env_cache_db: Option<String>,
    ) -> Result<Self, ArgsError> {
        let mut db_url = env_db.map_or_else(|| DEFAULT_DB_URL.to_string(), normalize_sqlite_url);
        let mut cache_db_url = env_cache_db.map(normalize_sqlite_url);
        let mut flags = Flags::default();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--cache-db" => {
                    let value = require_value(args, "--cache-db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    cache_db_url = Some(normalize_sqlite_url(value));
                }
                "--tester" => {
                    let value = require_value(args, "--tester")?;
                    flags.tester = Some(parse_number("--tester", value)?);
                }
                "--campaign" => {
                    let value = require_value(args, "--campaign")?;
                    flags.campaign = Some(parse_number("--campaign", value)?);
                }
                "--assignment" => {
                    let value = require_value(args, "--assignment")?;
                    flags.assignment = Some(parse_number("--assignment", value)?);
                }
                "--days" => {
                    flags.days = Some(parse_number("--days", require_value(args, "--days")?)?);
                }
                "--day" => {
                    flags.day = Some(parse_number("--day", require_value(args, "--day")?)?);
                }
                "--limit" => {
                    flags.limit = Some(parse_number("--limit", require_value(args, "--limit")?)?);
                }
                "--url" => flags.url = Some(require_value(args, "--url")?),
                "--text" => flags.text = Some(require_value(args, "--text")?),
                "--json" => flags.json = true,
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let command = match command {
            "assign" => Command::Assign {
                tester: TesterId::new(required(flags.tester, "--tester")?),
                campaign: CampaignId::new(required(flags.campaign, "--campaign")?),
                days: required(flags.days, "--days")?,
            },
            "screenshot" => Command::Screenshot {
                assignment: AssignmentId::new(required(flags.assignment, "--assignment")?),
                day: required(flags.day, "--day")?,
                url: required(flags.url, "--url")?,
            },
            "feedback" => Command::Feedback {
                assignment: AssignmentId::new(required(flags.assignment, "--assignment")?),
                day: required(flags.day, "--day")?,
                text: required(flags.text, "--text")?,
            },
            "progress" => Command::Progress {
                assignment: AssignmentId::new(required(flags.assignment, "--assignment")?),
                json: flags.json,
            },
            "list" => Command::List {
                tester: TesterId::new(required(flags.tester, "--tester")?),
                limit: flags.limit.unwrap_or(50),
            },
            "inbox" => Command::Inbox {
                tester: TesterId::new(required(flags.tester, "--tester")?),
                limit: flags.limit.unwrap_or(50),
                json: flags.json,
            },
            other => return Err(ArgsError::UnknownCommand(other.to_string())),
        };

        Ok(Self {
            db_url,
            cache_db_url,
            command,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") || raw.starts_with("sqlite:file:")
    {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" || db_url.starts_with("sqlite:file:") {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn state_marker(state: DayState) -> &'static str {
    match state {
        DayState::Empty => "[ ]",
        DayState::Partial => "[~]",
        DayState::Complete => "[x]",
    }
}

fn print_progress(progress: &AssignmentProgress) {
    println!(
        "assignment {}: day {}/{}, {} completed ({}%)",
        progress.assignment_id,
        progress.current_day,
        progress.total_days,
        progress.completed_days,
        progress.percent,
    );
    for day in &progress.days {
        let current = if day.is_current { " <- today" } else { "" };
        println!(
            "  {} day {:>2}  screenshot={} feedback={}{current}",
            state_marker(day.state),
            day.day,
            if day.has_screenshot { "yes" } else { "no" },
            if day.has_feedback { "yes" } else { "no" },
        );
    }
}

fn print_inbox(inbox: &Inbox) {
    println!("{} unread", inbox.unread);
    for group in &inbox.groups {
        match group.label {
            DateLabel::Today => println!("Today"),
            DateLabel::Yesterday => println!("Yesterday"),
            DateLabel::On(date) => println!("{date}"),
        }
        for n in &group.items {
            let marker = if n.read { " " } else { "*" };
            println!("  {marker} {}: {}", n.title, n.body);
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let command = match argv.next() {
        None => {
            print_usage();
            return Ok(());
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => first,
    };

    let parsed = Args::parse(
        &command,
        &mut argv,
        std::env::var("TESTSYNC_DB_URL").ok(),
        std::env::var("TESTSYNC_CACHE_DB_URL").ok(),
    )
    .map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite here so core/services stay free of file handling.
    prepare_sqlite_file(&parsed.db_url)?;
    let clock = Clock::default_clock();
    let services = match &parsed.cache_db_url {
        Some(cache_url) => {
            prepare_sqlite_file(cache_url)?;
            tracing::debug!(remote = %parsed.db_url, cache = %cache_url, "using cached storage");
            AppServices::new_cached_sqlite(&parsed.db_url, cache_url, clock).await?
        }
        None => AppServices::new_sqlite(&parsed.db_url, clock).await?,
    };

    match parsed.command {
        Command::Assign {
            tester,
            campaign,
            days,
        } => {
            let assignment = services
                .assignments()
                .assign(tester, campaign, days)
                .await?;
            println!(
                "assignment {} created for tester {tester} ({days} days)",
                assignment.id()
            );
        }
        Command::Screenshot {
            assignment,
            day,
            url,
        } => {
            let result = services
                .submissions()
                .submit_screenshot(assignment, day, url)
                .await?;
            println!(
                "day {day}: {:?}, completed days {}",
                result.record.state(),
                result.completed_days
            );
        }
        Command::Feedback {
            assignment,
            day,
            text,
        } => {
            let result = services
                .submissions()
                .submit_feedback(assignment, day, text)
                .await?;
            println!(
                "day {day}: {:?}, completed days {}",
                result.record.state(),
                result.completed_days
            );
        }
        Command::Progress { assignment, json } => {
            let progress = services.progress().progress(assignment).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&progress)?);
            } else {
                print_progress(&progress);
            }
        }
        Command::List { tester, limit } => {
            let assignments = services
                .assignments()
                .list_for_tester(tester, limit)
                .await?;
            let progress = services.progress();
            for a in assignments {
                // Same derived counter as `progress`, not the stored one.
                let p = progress.progress(a.id()).await?;
                println!(
                    "{}  campaign {}  {}/{} days  {}%",
                    a.id(),
                    a.campaign_id(),
                    p.completed_days,
                    p.total_days,
                    p.percent,
                );
            }
        }
        Command::Inbox {
            tester,
            limit,
            json,
        } => {
            let inbox = services.inbox().inbox(tester, limit).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&inbox)?);
            } else {
                print_inbox(&inbox);
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_env("TESTSYNC_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(command: &str, args: &[&str]) -> Result<Args, ArgsError> {
        let mut iter = args.iter().map(|s| (*s).to_string());
        Args::parse(command, &mut iter, None, None)
    }

    #[test]
    fn parses_assign_with_defaults() {
        let args = parse("assign", &["--tester", "4", "--campaign", "9", "--days", "14"]).unwrap();
        assert_eq!(args.db_url, DEFAULT_DB_URL);
        assert_eq!(args.cache_db_url, None);
        assert_eq!(
            args.command,
            Command::Assign {
                tester: TesterId::new(4),
                campaign: CampaignId::new(9),
                days: 14,
            }
        );
    }

    #[test]
    fn flags_override_environment() {
        let mut iter = ["--assignment", "1", "--db", "sqlite::memory:", "--json"]
            .iter()
            .map(|s| (*s).to_string());
        let args = Args::parse(
            "progress",
            &mut iter,
            Some("sqlite://env.sqlite3".into()),
            Some("sqlite://cache.sqlite3".into()),
        )
        .unwrap();
        assert_eq!(args.db_url, "sqlite::memory:");
        assert_eq!(args.cache_db_url.as_deref(), Some("sqlite://cache.sqlite3"));
        assert_eq!(
            args.command,
            Command::Progress {
                assignment: AssignmentId::new(1),
                json: true,
            }
        );
    }

    #[test]
    fn parses_inbox_with_default_limit() {
        let args = parse("inbox", &["--tester", "3", "--json"]).unwrap();
        assert_eq!(
            args.command,
            Command::Inbox {
                tester: TesterId::new(3),
                limit: 50,
                json: true,
            }
        );

        let err = parse("inbox", &["--limit", "5"]).unwrap_err();
        assert!(matches!(err, ArgsError::MissingFlag { flag: "--tester" }));
    }

    #[test]
    fn reports_missing_and_invalid_flags() {
        let err = parse("screenshot", &["--assignment", "1", "--day", "2"]).unwrap_err();
        assert!(matches!(err, ArgsError::MissingFlag { flag: "--url" }));

        let err = parse("feedback", &["--day", "two"]).unwrap_err();
        assert!(matches!(err, ArgsError::InvalidNumber { flag: "--day", .. }));

        let err = parse("feedback", &["--text"]).unwrap_err();
        assert!(matches!(err, ArgsError::MissingValue { flag: "--text" }));

        let err = parse("rename", &[]).unwrap_err();
        assert!(matches!(err, ArgsError::UnknownCommand(_)));
    }

    #[test]
    fn normalizes_relative_paths_to_absolute_urls() {
        let url = normalize_sqlite_url("sqlite:data/app.sqlite3".to_string());
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("data/app.sqlite3"));
        assert_eq!(
            normalize_sqlite_url("sqlite::memory:".to_string()),
            "sqlite::memory:"
        );
    }
}
