use std::fmt;

use course_core::model::{CourseId, LearnerContext, LearnerId, LessonId, Role};
use course_core::{CompletionState, CourseStats};
use services::{AppServices, Clock, CompletionOutcome, CourseOverview};
use storage::sqlite::{normalize_sqlite_url, prepare_sqlite_file};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingRequired { flag: &'static str, env: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    InvalidId { flag: &'static str, raw: String },
    InvalidRole { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingRequired { flag, env } => {
                write!(f, "{flag} is required (or set {env})")
            }
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidId { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidRole { raw } => {
                write!(f, "invalid --role value (student, teacher, admin): {raw}")
            }
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
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

fn parse_id<T: std::str::FromStr>(flag: &'static str, raw: String) -> Result<T, ArgsError> {
    raw.parse::<T>()
        .map_err(|_| ArgsError::InvalidId { flag, raw })
}

fn env_id<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|value| value.parse::<T>().ok())
}

const COURSE_LIST_LIMIT: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Outline,
    Open,
    Complete,
    Enroll,
    Dashboard,
    Courses,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "outline" => Some(Self::Outline),
            "open" => Some(Self::Open),
            "complete" => Some(Self::Complete),
            "enroll" => Some(Self::Enroll),
            "dashboard" => Some(Self::Dashboard),
            "courses" => Some(Self::Courses),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
    course_id: Option<CourseId>,
    learner_id: Option<LearnerId>,
    lesson_id: Option<LessonId>,
    role: Role,
    json: bool,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("COURSE_DB_URL")
            .ok()
            .map_or_else(
                || normalize_sqlite_url("sqlite:dev.sqlite3"),
                |value| normalize_sqlite_url(&value),
            );
        let mut course_id = env_id::<CourseId>("COURSE_ID");
        let mut learner_id = env_id::<LearnerId>("COURSE_LEARNER_ID");
        let mut lesson_id = None;
        let mut role = std::env::var("COURSE_ROLE")
            .ok()
            .and_then(|value| Role::parse(&value))
            .unwrap_or(Role::Student);
        let mut json = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(&value);
                }
                "--course-id" => {
                    let value = require_value(args, "--course-id")?;
                    course_id = Some(parse_id("--course-id", value)?);
                }
                "--learner-id" => {
                    let value = require_value(args, "--learner-id")?;
                    learner_id = Some(parse_id("--learner-id", value)?);
                }
                "--lesson-id" => {
                    let value = require_value(args, "--lesson-id")?;
                    lesson_id = Some(parse_id("--lesson-id", value)?);
                }
                "--role" => {
                    let value = require_value(args, "--role")?;
                    role = Role::parse(&value).ok_or(ArgsError::InvalidRole { raw: value })?;
                }
                "--json" => json = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            course_id,
            learner_id,
            lesson_id,
            role,
            json,
        })
    }

    fn course_id(&self) -> Result<CourseId, ArgsError> {
        self.course_id.ok_or(ArgsError::MissingRequired {
            flag: "--course-id",
            env: "COURSE_ID",
        })
    }

    fn learner_id(&self) -> Result<LearnerId, ArgsError> {
        self.learner_id.ok_or(ArgsError::MissingRequired {
            flag: "--learner-id",
            env: "COURSE_LEARNER_ID",
        })
    }

    fn lesson_id(&self) -> Result<LessonId, ArgsError> {
        self.lesson_id
            .ok_or(ArgsError::MissingFlag { flag: "--lesson-id" })
    }

    fn context(&self) -> Result<LearnerContext, ArgsError> {
        Ok(LearnerContext::new(self.learner_id()?, self.role))
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- outline   --course-id <id> [--learner-id <id>] [--json]");
    eprintln!("  cargo run -p app -- open      --lesson-id <id> --learner-id <id> [--role <role>] [--json]");
    eprintln!("  cargo run -p app -- complete  --lesson-id <id> --learner-id <id> [--role <role>] [--json]");
    eprintln!("  cargo run -p app -- enroll    --course-id <id> --learner-id <id>");
    eprintln!("  cargo run -p app -- dashboard --learner-id <id> [--json]");
    eprintln!("  cargo run -p app -- courses");
    eprintln!();
    eprintln!("Common options:");
    eprintln!("  --db <sqlite_url>   SQLite URL (default: sqlite:dev.sqlite3)");
    eprintln!("  --role <role>       student | teacher | admin (default: student)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  COURSE_DB_URL, COURSE_ID, COURSE_LEARNER_ID, COURSE_ROLE, RUST_LOG");
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "services=info,app=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn summary_line(stats: &CourseStats) -> String {
    format!(
        "{}/{} lessons completed ({}%), {} min total | video {} | reading {} | quizzes {} | assignments {}",
        stats.completed_lessons,
        stats.total_lessons,
        stats.percent_rounded(),
        stats.total_duration,
        stats.counts.video,
        stats.counts.reading,
        stats.counts.quizzes,
        stats.counts.assignments,
    )
}

fn print_outline(overview: &CourseOverview) {
    println!("{} (course {})", overview.course.title(), overview.course.id());
    if let Some(description) = overview.course.description() {
        println!("  {description}");
    }
    println!("{}", summary_line(&overview.stats));
    if overview.tree.completion() == CompletionState::Unavailable {
        println!("! progress could not be loaded; lessons are shown as not completed");
    }

    for (position, chapter) in overview.tree.chapters().iter().enumerate() {
        println!();
        println!(
            "{}. {} ({} min, {}/{} done)",
            position + 1,
            chapter.chapter.title(),
            chapter.total_duration,
            chapter.completed_count(),
            chapter.lessons.len(),
        );
        for node in &chapter.lessons {
            let lesson = &node.lesson;
            let mark = if node.is_completed { "x" } else { " " };
            let duration = lesson
                .duration_minutes()
                .map(|m| format!(" {m} min"))
                .unwrap_or_default();
            let optional = if lesson.is_mandatory() { "" } else { " (optional)" };
            println!(
                "   [{mark}] #{} {} [{}]{duration}{optional}",
                lesson.id(),
                lesson.title(),
                lesson.content_type(),
            );
        }
    }

    if !overview.warnings.is_empty() {
        println!();
        println!("{} inconsistent rows were skipped", overview.warnings.len());
    }
}

fn describe_outcome(outcome: &CompletionOutcome) -> String {
    match outcome {
        CompletionOutcome::Recorded { record } => format!(
            "Lesson {} completed for learner {} at {}",
            record.lesson_id,
            record.learner_id,
            record.completed_at.to_rfc3339()
        ),
        CompletionOutcome::NotApplicable { policy } => {
            format!("Completion is handled elsewhere ({policy:?})")
        }
        CompletionOutcome::NotPermitted { role } => {
            format!("Preview as {role}; progress not recorded")
        }
        CompletionOutcome::Failed { reason } => format!("Could not record completion: {reason}"),
    }
}

/// Records a completion for the acting learner; staff roles only preview.
async fn complete_lesson(
    services: &AppServices,
    parsed: &Args,
) -> Result<CompletionOutcome, Box<dyn std::error::Error>> {
    let ctx = parsed.context()?;
    let outcome = services
        .recorder()
        .complete_as(&ctx, parsed.lesson_id()?, None)
        .await?;
    Ok(outcome)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing();

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

    let parsed = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    prepare_sqlite_file(&parsed.db_url)?;
    let services = AppServices::new_sqlite(&parsed.db_url, Clock::system()).await?;
    tracing::debug!(db_url = %parsed.db_url, command = ?cmd, "storage ready");

    match cmd {
        Command::Outline => {
            let overview = services
                .course_trees()
                .load_overview(parsed.course_id()?, parsed.learner_id)
                .await?;
            if parsed.json {
                println!("{}", serde_json::to_string_pretty(&overview)?);
            } else {
                print_outline(&overview);
            }
        }
        Command::Open => {
            let ctx = parsed.context()?;
            let opened = services
                .lesson_open()
                .open_lesson(&ctx, parsed.lesson_id()?)
                .await?;
            if parsed.json {
                println!("{}", serde_json::to_string_pretty(&opened)?);
            } else {
                println!("Opened #{} {}", opened.lesson.id(), opened.lesson.title());
                println!("{}", describe_outcome(&opened.completion));
            }
        }
        Command::Complete => {
            let outcome = complete_lesson(&services, &parsed).await?;
            if parsed.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("{}", describe_outcome(&outcome));
            }
        }
        Command::Enroll => {
            let course_id = parsed.course_id()?;
            let created = services
                .enrollment()
                .enroll(&parsed.context()?, course_id)
                .await?;
            if created {
                println!("Enrolled in course {course_id}");
            } else {
                println!("Already enrolled in course {course_id}");
            }
        }
        Command::Courses => {
            let courses = services.course_trees().list_courses(COURSE_LIST_LIMIT).await?;
            if courses.is_empty() {
                println!("No courses yet; run the seed binary to create a demo course");
            }
            for course in &courses {
                let level = course.metadata().level().unwrap_or("-");
                println!("#{} {} [{level}]", course.id(), course.title());
            }
        }
        Command::Dashboard => {
            let enrolled = services
                .enrollment()
                .list_enrolled(parsed.learner_id()?)
                .await?;
            if parsed.json {
                println!("{}", serde_json::to_string_pretty(&enrolled)?);
            } else if enrolled.is_empty() {
                println!("Not enrolled in any course");
            } else {
                for entry in &enrolled {
                    println!(
                        "#{} {}: {}",
                        entry.overview.course.id(),
                        entry.overview.course.title(),
                        summary_line(&entry.overview.stats)
                    );
                }
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_ids_and_role() {
        let mut args = [
            "--course-id",
            "4",
            "--learner-id",
            "9",
            "--role",
            "teacher",
            "--db",
            "sqlite::memory:",
            "--json",
        ]
        .into_iter()
        .map(String::from);
        let parsed = Args::parse(&mut args).unwrap();
        assert_eq!(parsed.course_id().unwrap(), CourseId::new(4));
        assert_eq!(parsed.context().unwrap().role, Role::Teacher);
        assert_eq!(parsed.db_url, "sqlite::memory:");
        assert!(parsed.json);
    }

    #[tokio::test]
    async fn complete_as_teacher_writes_nothing() {
        use course_core::model::{ContentType, CourseMetadata, LessonDraft};
        use course_core::time::fixed_now;

        let services = AppServices::from_storage(
            &storage::repository::Storage::in_memory(),
            Clock::fixed(fixed_now()),
        );
        let admin = LearnerContext::new(LearnerId::new(1), Role::Admin);
        let authoring = services.authoring();
        let course_id = authoring
            .create_course(&admin, "Rust".into(), None, CourseMetadata::default())
            .await
            .unwrap();
        let chapter_id = authoring
            .add_chapter(&admin, course_id, "Basics".into())
            .await
            .unwrap();
        let lesson_id = authoring
            .add_lesson(
                &admin,
                LessonDraft {
                    chapter_id,
                    title: "Homework".into(),
                    content_type: ContentType::Assignment,
                    locator: None,
                    duration_minutes: None,
                    order_index: 0,
                    mandatory: true,
                },
            )
            .await
            .unwrap();

        let args = |role: &str| {
            let mut raw = [
                "--lesson-id".to_string(),
                lesson_id.to_string(),
                "--learner-id".into(),
                "7".into(),
                "--role".into(),
                role.to_string(),
            ]
            .into_iter();
            Args::parse(&mut raw).unwrap()
        };

        let outcome = complete_lesson(&services, &args("teacher")).await.unwrap();
        assert_eq!(
            describe_outcome(&outcome),
            "Preview as teacher; progress not recorded"
        );
        let overview = services
            .course_trees()
            .load_overview(course_id, Some(LearnerId::new(7)))
            .await
            .unwrap();
        assert_eq!(overview.stats.completed_lessons, 0);

        let outcome = complete_lesson(&services, &args("student")).await.unwrap();
        assert!(matches!(outcome, CompletionOutcome::Recorded { .. }));
    }

    #[test]
    fn bad_ids_are_rejected() {
        let mut args = ["--lesson-id", "abc"].into_iter().map(String::from);
        assert!(matches!(
            Args::parse(&mut args),
            Err(ArgsError::InvalidId {
                flag: "--lesson-id",
                ..
            })
        ));
    }
}
