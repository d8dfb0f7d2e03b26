use std::fmt;
use std::str::FromStr;

use progress_core::model::{CanonicalSubject, ChildId, ProgressSettingsDraft};
use services::RosterScope;

#[derive(Debug)]
pub enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    InvalidValue { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required for this command"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidValue { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Report,
    Weekly,
    Refresh,
    ClearDemo,
    RecordQuiz,
    RecordLesson,
}

impl Command {
    pub fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "report" => Some(Self::Report),
            "weekly" => Some(Self::Weekly),
            "refresh" => Some(Self::Refresh),
            "clear-demo" => Some(Self::ClearDemo),
            "record-quiz" => Some(Self::RecordQuiz),
            "record-lesson" => Some(Self::RecordLesson),
            _ => None,
        }
    }
}

/// Activity fields for the record commands.
#[derive(Debug, Default)]
pub struct ActivityArgs {
    pub category: Option<String>,
    pub lesson_id: Option<String>,
    pub score: Option<f64>,
    pub total: Option<u32>,
    pub percentage: Option<f64>,
    pub minutes: Option<u32>,
    pub lessons_total: Option<u32>,
}

#[derive(Debug)]
pub struct Args {
    pub db_url: String,
    pub roster_path: String,
    pub scope: RosterScope,
    pub child: Option<ChildId>,
    pub subject: Option<CanonicalSubject>,
    pub settings: ProgressSettingsDraft,
    pub activity: ActivityArgs,
}

pub fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  progress report        [--scope <scope>] [--child <id> [--subject <subject>]]");
    eprintln!("  progress weekly        [--scope <scope>]");
    eprintln!("  progress refresh       [--scope <scope>]");
    eprintln!("  progress clear-demo    [--scope <scope>]");
    eprintln!("  progress record-quiz   --child <id> --category <text> [--score <n> [--total <n>]] [--percentage <n>] [--minutes <n>]");
    eprintln!("  progress record-lesson --child <id> --lesson <id> --category <text> [--lessons-total <n>] [--minutes <n>]");
    eprintln!();
    eprintln!("Common flags:");
    eprintln!("  --db <sqlite_url>      default sqlite:progress.sqlite3");
    eprintln!("  --roster <path>        JSON array of child profiles, default roster.json");
    eprintln!("  --remote-url <url>     remote document store base url");
    eprintln!("  --ttl <seconds>        cache time-to-live");
    eprintln!("  --no-synthetic         never generate demo data");
    eprintln!();
    eprintln!("Scopes: all | child:<id> | parent:<id>");
    eprintln!("Subjects: math | english | amharic | oromo");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  PROGRESS_DB_URL, PROGRESS_ROSTER, PROGRESS_REMOTE_URL, PROGRESS_REMOTE_TOKEN,");
    eprintln!("  PROGRESS_DEFAULT_PERCENTAGE, PROGRESS_DEFAULT_LESSONS_TOTAL,");
    eprintln!("  PROGRESS_DEFAULT_TIME_SPENT_MINUTES, PROGRESS_CACHE_TTL_SECS,");
    eprintln!("  PROGRESS_REMOTE_TIMEOUT_MS, PROGRESS_REMOTE_LIMIT, PROGRESS_REMOTE_BATCH_SIZE,");
    eprintln!("  PROGRESS_WEEK_UTC_OFFSET_MINUTES, PROGRESS_SYNTHETIC_FALLBACK,");
    eprintln!("  PROGRESS_SYNTHETIC_RECORDS_PER_SUBJECT, RUST_LOG");
}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_value<T: FromStr>(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<T, ArgsError> {
    let raw = require_value(args, flag)?;
    raw.trim()
        .parse()
        .map_err(|_| ArgsError::InvalidValue { flag, raw })
}

fn env_value<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|value| value.trim().parse().ok())
}

/// Settings overrides from `PROGRESS_*` variables; flags are applied on top.
pub fn settings_from_env() -> ProgressSettingsDraft {
    ProgressSettingsDraft {
        default_percentage: env_value("PROGRESS_DEFAULT_PERCENTAGE"),
        default_lessons_total: env_value("PROGRESS_DEFAULT_LESSONS_TOTAL"),
        default_time_spent_minutes: env_value("PROGRESS_DEFAULT_TIME_SPENT_MINUTES"),
        cache_ttl_secs: env_value("PROGRESS_CACHE_TTL_SECS"),
        remote_timeout_ms: env_value("PROGRESS_REMOTE_TIMEOUT_MS"),
        remote_limit: env_value("PROGRESS_REMOTE_LIMIT"),
        remote_batch_size: env_value("PROGRESS_REMOTE_BATCH_SIZE"),
        week_utc_offset_minutes: env_value("PROGRESS_WEEK_UTC_OFFSET_MINUTES"),
        synthetic_fallback: env_value("PROGRESS_SYNTHETIC_FALLBACK"),
        synthetic_records_per_subject: env_value("PROGRESS_SYNTHETIC_RECORDS_PER_SUBJECT"),
        remote_base_url: std::env::var("PROGRESS_REMOTE_URL").ok(),
    }
}

impl Args {
    pub fn parse(
        args: &mut impl Iterator<Item = String>,
        settings: ProgressSettingsDraft,
    ) -> Result<Self, ArgsError> {
        let mut parsed = Self {
            db_url: std::env::var("PROGRESS_DB_URL")
                .ok()
                .map_or_else(|| normalize_sqlite_url("progress.sqlite3".into()), normalize_sqlite_url),
            roster_path: std::env::var("PROGRESS_ROSTER").unwrap_or_else(|_| "roster.json".into()),
            scope: RosterScope::All,
            child: None,
            subject: None,
            settings,
            activity: ActivityArgs::default(),
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = normalize_sqlite_url(value);
                }
                "--roster" => parsed.roster_path = require_value(args, "--roster")?,
                "--scope" => parsed.scope = parse_value(args, "--scope")?,
                "--child" => parsed.child = Some(parse_value(args, "--child")?),
                "--subject" => parsed.subject = Some(parse_value(args, "--subject")?),
                "--remote-url" => {
                    parsed.settings.remote_base_url = Some(require_value(args, "--remote-url")?);
                }
                "--ttl" => parsed.settings.cache_ttl_secs = Some(parse_value(args, "--ttl")?),
                "--no-synthetic" => parsed.settings.synthetic_fallback = Some(false),
                "--category" => parsed.activity.category = Some(require_value(args, "--category")?),
                "--lesson" => parsed.activity.lesson_id = Some(require_value(args, "--lesson")?),
                "--score" => parsed.activity.score = Some(parse_value(args, "--score")?),
                "--total" => parsed.activity.total = Some(parse_value(args, "--total")?),
                "--percentage" => {
                    parsed.activity.percentage = Some(parse_value(args, "--percentage")?);
                }
                "--minutes" => parsed.activity.minutes = Some(parse_value(args, "--minutes")?),
                "--lessons-total" => {
                    parsed.activity.lessons_total = Some(parse_value(args, "--lessons-total")?);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
    }

    pub fn require_child(&self) -> Result<ChildId, ArgsError> {
        self.child
            .clone()
            .ok_or(ArgsError::MissingFlag { flag: "--child" })
    }
}

pub fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
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

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, ArgsError> {
        let mut iter = args.iter().map(|arg| (*arg).to_owned());
        Args::parse(&mut iter, ProgressSettingsDraft::default())
    }

    #[test]
    fn parses_scope_child_and_subject() {
        let args = parse(&["--scope", "parent:p1", "--child", "c1", "--subject", "oromo"]).unwrap();
        assert_eq!(args.scope.cache_key(), "progress:parent:p1");
        assert_eq!(args.child, Some(ChildId::new("c1")));
        assert_eq!(args.subject, Some(CanonicalSubject::Oromo));
    }

    #[test]
    fn flags_override_settings() {
        let args = parse(&["--ttl", "60", "--no-synthetic", "--remote-url", "https://x.test"]).unwrap();
        assert_eq!(args.settings.cache_ttl_secs, Some(60));
        assert_eq!(args.settings.synthetic_fallback, Some(false));
        assert_eq!(args.settings.remote_base_url.as_deref(), Some("https://x.test"));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            parse(&["--score", "lots"]),
            Err(ArgsError::InvalidValue { flag: "--score", .. })
        ));
        assert!(matches!(parse(&["--scope"]), Err(ArgsError::MissingValue { .. })));
        assert!(matches!(parse(&["--bogus"]), Err(ArgsError::UnknownArg(_))));
    }

    #[test]
    fn sqlite_urls_are_made_absolute() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
        assert_eq!(normalize_sqlite_url("sqlite:///tmp/p.db".into()), "sqlite:///tmp/p.db");
        assert_eq!(normalize_sqlite_url("/tmp/p.db".into()), "sqlite:///tmp/p.db");
    }
}
