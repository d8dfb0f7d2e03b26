mod args;

use std::sync::Arc;

use progress_core::model::SubjectProgress;
use progress_core::time::Clock;
use serde::Serialize;
use services::{AppServices, InMemoryRoster};
use storage::{LessonCompletionRecord, QuizAttemptRecord};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::args::{Args, ArgsError, Command, print_usage, settings_from_env};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout carries the JSON output; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_json(value: &impl Serialize) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// One subject with its lesson completion ratio spelled out.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubjectReport<'a> {
    #[serde(flatten)]
    progress: &'a SubjectProgress,
    lesson_ratio: f64,
}

impl<'a> SubjectReport<'a> {
    fn new(progress: &'a SubjectProgress) -> Self {
        Self {
            progress,
            lesson_ratio: progress.lessons.ratio(),
        }
    }
}

fn load_roster(path: &str) -> Result<InMemoryRoster, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path).map_err(|err| format!("roster {path}: {err}"))?;
    Ok(InMemoryRoster::from_json(&raw)?)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let cmd = match argv.next() {
        None => {
            print_usage();
            return Ok(());
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(&first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    let parsed = Args::parse(&mut argv, settings_from_env()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let settings = parsed.settings.clone().validate()?;
    let roster = Arc::new(load_roster(&parsed.roster_path)?);

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&parsed.db_url)?;
    let services =
        AppServices::new_sqlite(&parsed.db_url, Clock::default_clock(), settings, roster).await?;
    let progress = services.progress();

    match cmd {
        Command::Report => match (&parsed.child, parsed.subject) {
            (Some(child), Some(subject)) => {
                let subject = progress.get_subject_progress(child, subject).await;
                print_json(&SubjectReport::new(&subject))
            }
            (Some(child), None) => print_json(&progress.get_all_subjects_progress(child).await),
            (None, _) => print_json(&progress.snapshot(&parsed.scope).await),
        },
        Command::Weekly => print_json(&progress.get_weekly_activity(&parsed.scope).await),
        Command::Refresh => print_json(&progress.refresh(&parsed.scope).await),
        Command::ClearDemo => {
            let removed = progress.clear_synthetic_data(&parsed.scope).await?;
            info!(scope = %parsed.scope, removed, "demo data cleared");
            print_json(&serde_json::json!({ "removed": removed }))
        }
        Command::RecordQuiz => {
            let activity = &parsed.activity;
            let category = activity
                .category
                .clone()
                .ok_or(ArgsError::MissingFlag { flag: "--category" })?;
            let mut attempt =
                QuizAttemptRecord::new(parsed.require_child()?, category, chrono::Utc::now());
            attempt.score = activity.score;
            attempt.total_questions = activity.total;
            attempt.percentage = activity.percentage;
            attempt.time_spent_minutes = activity.minutes;
            let id = attempt.id;
            progress.record_quiz_attempt(attempt).await?;
            print_json(&serde_json::json!({ "recorded": id.to_string() }))
        }
        Command::RecordLesson => {
            let activity = &parsed.activity;
            let lesson_id = activity
                .lesson_id
                .clone()
                .ok_or(ArgsError::MissingFlag { flag: "--lesson" })?;
            let category = activity
                .category
                .clone()
                .ok_or(ArgsError::MissingFlag { flag: "--category" })?;
            let mut lesson = LessonCompletionRecord::new(
                parsed.require_child()?,
                lesson_id,
                category,
                chrono::Utc::now(),
            );
            lesson.score = activity.score;
            lesson.lessons_total = activity.lessons_total;
            lesson.time_spent_minutes = activity.minutes;
            let id = lesson.id;
            progress.record_lesson_completion(lesson).await?;
            print_json(&serde_json::json!({ "recorded": id.to_string() }))
        }
    }
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
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

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use progress_core::model::{CanonicalSubject, ChildId, LessonProgress};

    #[test]
    fn subject_report_adds_the_lesson_ratio() {
        let mut subject = SubjectProgress::empty(ChildId::new("C1"), CanonicalSubject::Amharic, 5);
        subject.lessons = LessonProgress::new(2, None, 5);

        let value = serde_json::to_value(SubjectReport::new(&subject)).unwrap();
        assert_eq!(value["lessonRatio"], serde_json::json!(0.4));
        assert_eq!(value["subject"], serde_json::json!("amharic"));
        assert_eq!(value["lessons"]["completed"], serde_json::json!(2));
    }
}
