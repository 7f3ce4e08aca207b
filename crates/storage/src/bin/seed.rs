use std::fmt;

use chrono::{DateTime, Utc};
use course_core::model::{
    CompletionRecord, ContentLocator, ContentType, Course, CourseId, CourseMetadata, LearnerId,
    LessonDraft,
};
use storage::repository::{NewChapterRecord, NewCourseRecord, NewLessonRecord, Storage};
use storage::sqlite::{normalize_sqlite_url, prepare_sqlite_file};

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    course_title: String,
    learner_id: Option<LearnerId>,
    completed: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidLearnerId { raw: String },
    InvalidCompleted { raw: String },
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidLearnerId { raw } => write!(f, "invalid --learner-id value: {raw}"),
            ArgsError::InvalidCompleted { raw } => write!(f, "invalid --completed value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
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

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url = normalize_sqlite_url(
            &std::env::var("COURSE_DB_URL").unwrap_or_else(|_| "sqlite:dev.sqlite3".into()),
        );
        let mut course_title =
            std::env::var("COURSE_TITLE").unwrap_or_else(|_| "Practical Rust".into());
        let mut learner_id = std::env::var("COURSE_LEARNER_ID")
            .ok()
            .and_then(|value| value.parse::<LearnerId>().ok());
        let mut completed = 0;
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(&value);
                }
                "--title" => {
                    course_title = require_value(&mut args, "--title")?;
                }
                "--learner-id" => {
                    let value = require_value(&mut args, "--learner-id")?;
                    let parsed = value
                        .parse::<LearnerId>()
                        .map_err(|_| ArgsError::InvalidLearnerId { raw: value.clone() })?;
                    learner_id = Some(parsed);
                }
                "--completed" => {
                    let value = require_value(&mut args, "--completed")?;
                    completed = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidCompleted { raw: value.clone() })?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            course_title,
            learner_id,
            completed,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:dev.sqlite3)");
    eprintln!("  --title <text>            Course title (default: Practical Rust)");
    eprintln!("  --learner-id <id>         Learner to mark progress for");
    eprintln!("  --completed <n>           Lessons to mark completed for the learner (default: 0)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  COURSE_DB_URL, COURSE_TITLE, COURSE_LEARNER_ID");
}

struct SampleLesson {
    title: &'static str,
    content_type: &'static str,
    url: Option<&'static str>,
    file_key: Option<&'static str>,
    minutes: Option<u32>,
    mandatory: bool,
}

const fn lesson(
    title: &'static str,
    content_type: &'static str,
    url: Option<&'static str>,
    file_key: Option<&'static str>,
    minutes: Option<u32>,
) -> SampleLesson {
    SampleLesson {
        title,
        content_type,
        url,
        file_key,
        minutes,
        mandatory: true,
    }
}

const SAMPLE: &[(&str, &[SampleLesson])] = &[
    (
        "Getting started",
        &[
            lesson("Welcome", "video", Some("https://videos.example.com/welcome.mp4"), None, Some(6)),
            lesson("Installing the toolchain", "url", Some("https://rustup.rs/"), None, None),
            SampleLesson {
                mandatory: false,
                ..lesson("Course handbook", "pdf", None, Some("handbooks/practical-rust.pdf"), Some(15))
            },
        ],
    ),
    (
        "Ownership",
        &[
            lesson("Moves and copies", "video", Some("https://videos.example.com/moves.mp4"), None, Some(18)),
            lesson("Borrowing rules", "document", None, Some("notes/borrowing.md"), Some(10)),
            lesson("Ownership check", "quiz", None, None, Some(8)),
        ],
    ),
    (
        "Project",
        &[lesson("Build a CLI", "assignment", None, Some("briefs/cli.pdf"), Some(120))],
    ),
];

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    prepare_sqlite_file(&args.db_url)?;
    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    let metadata = CourseMetadata::new(
        Some("beginner".into()),
        Some("en".into()),
        Some("https://cdn.example.com/practical-rust.png"),
        Some("https://videos.example.com/welcome.mp4"),
    )?;
    let draft = Course::new(
        CourseId::new(1),
        args.course_title.clone(),
        Some("From installation to your first command-line tool.".into()),
        metadata,
        now,
    )?;
    let course_id = storage
        .courses
        .insert_new_course(NewCourseRecord::from_course(&draft))
        .await?;

    let mut lesson_ids = Vec::new();
    for (chapter_index, (chapter_title, lessons)) in SAMPLE.iter().enumerate() {
        let chapter_id = storage
            .curriculum
            .insert_new_chapter(NewChapterRecord {
                course_id,
                title: (*chapter_title).to_string(),
                order_index: i32::try_from(chapter_index)?,
            })
            .await?;

        for (lesson_index, sample) in lessons.iter().enumerate() {
            let draft = LessonDraft {
                chapter_id,
                title: sample.title.to_string(),
                content_type: ContentType::parse(sample.content_type),
                locator: ContentLocator::from_parts(sample.url, sample.file_key)?,
                duration_minutes: sample.minutes,
                order_index: i32::try_from(lesson_index)?,
                mandatory: sample.mandatory,
            };
            let id = storage
                .curriculum
                .insert_new_lesson(NewLessonRecord::from_draft(&draft))
                .await?;
            lesson_ids.push(id);
        }
    }

    let mut marked = 0;
    if let Some(learner_id) = args.learner_id {
        storage.enrollments.enroll(learner_id, course_id, now).await?;
        for lesson_id in lesson_ids.iter().take(args.completed as usize) {
            let record = CompletionRecord::completed(learner_id, *lesson_id, now);
            storage.progress.upsert_completion(&record).await?;
            marked += 1;
        }
    }

    println!(
        "Seeded course {} with {} chapters and {} lessons ({} completed) into {}",
        course_id,
        SAMPLE.len(),
        lesson_ids.len(),
        marked,
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
