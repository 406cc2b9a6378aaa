use std::fmt;

use chrono::{DateTime, Duration, Utc};
use storage::repository::{MaterialRecord, NewSubjectRecord, NewTopicRecord, Storage};
use study_core::model::{CompletionRecord, SessionDuration, Subject, SubjectId, Topic, TopicId};

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    subject_name: String,
    subject_desc: Option<String>,
    topics: u32,
    completions: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidTopics { raw: String },
    InvalidCompletions { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidTopics { raw } => write!(f, "invalid --topics value: {raw}"),
            ArgsError::InvalidCompletions { raw } => {
                write!(f, "invalid --completions value: {raw}")
            }
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
        let mut db_url =
            std::env::var("STUDY_DB_URL").unwrap_or_else(|_| "sqlite:study.sqlite3?mode=rwc".into());
        let mut subject_name =
            std::env::var("STUDY_SEED_SUBJECT").unwrap_or_else(|_| "Calculus".into());
        let mut subject_desc = std::env::var("STUDY_SEED_SUBJECT_DESC").ok();
        let mut topics = std::env::var("STUDY_SEED_TOPICS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(4);
        let mut completions = std::env::var("STUDY_SEED_COMPLETIONS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(3);
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--subject" => {
                    subject_name = require_value(&mut args, "--subject")?;
                }
                "--subject-desc" => {
                    subject_desc = Some(require_value(&mut args, "--subject-desc")?);
                }
                "--topics" => {
                    let value = require_value(&mut args, "--topics")?;
                    topics = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidTopics { raw: value.clone() })?;
                }
                "--completions" => {
                    let value = require_value(&mut args, "--completions")?;
                    completions = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidCompletions { raw: value.clone() })?;
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
            subject_name,
            subject_desc,
            topics,
            completions,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:study.sqlite3?mode=rwc)");
    eprintln!("  --subject <name>          Subject name (default: Calculus)");
    eprintln!("  --subject-desc <text>     Optional subject description");
    eprintln!("  --topics <n>              Number of sample topics (default: 4)");
    eprintln!("  --completions <n>         Completed sessions for the first topic (default: 3)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!(
        "  STUDY_DB_URL, STUDY_SEED_SUBJECT, STUDY_SEED_SUBJECT_DESC, STUDY_SEED_TOPICS, STUDY_SEED_COMPLETIONS"
    );
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    let draft = Subject::new(
        SubjectId::new(1),
        &args.subject_name,
        args.subject_desc.clone(),
        now,
    )?;
    let subject_id = storage
        .subjects
        .insert_subject(NewSubjectRecord::from_subject(&draft))
        .await?;

    let samples = [
        ("Limits", "Approaching a value", "A limit describes the value a function approaches."),
        ("Derivatives", "Rates of change", "The derivative is the slope of the tangent line."),
        ("Integrals", "Accumulation", "An integral sums infinitely many small pieces."),
        ("Series", "Infinite sums", "A series converges when its partial sums settle."),
    ];
    let mut first_topic: Option<TopicId> = None;
    for i in 0..args.topics {
        let (name, desc, material) = samples[(i as usize) % samples.len()];
        let name = if i as usize >= samples.len() {
            format!("{name} {}", i + 1)
        } else {
            name.to_string()
        };
        let topic = Topic::new(
            TopicId::new(1),
            subject_id,
            name,
            Some(desc.to_string()),
            now + Duration::seconds(i64::from(i)),
        )?;
        let topic_id = storage
            .topics
            .insert_topic(NewTopicRecord::from_topic(&topic))
            .await?;
        if i % 2 == 0 {
            storage
                .topics
                .attach_material(MaterialRecord {
                    topic_id,
                    content: material.to_string(),
                    source_file: Some(format!("topic-{}.txt", i + 1)),
                    created_at: now,
                })
                .await?;
        }
        first_topic.get_or_insert(topic_id);
    }

    if let Some(topic_id) = first_topic {
        for i in 0..args.completions {
            let record = CompletionRecord {
                topic_id,
                duration: SessionDuration::Ten,
                score: i % 4,
                total_questions: 3,
            };
            let completed_at = now - Duration::days(i64::from(i) * 2);
            let _ = storage
                .completions
                .append_completion(&record, completed_at)
                .await?;
        }
    }

    println!(
        "Seeded subject {} with {} topics and {} completed sessions into {}",
        subject_id.value(),
        args.topics,
        if first_topic.is_some() { args.completions } else { 0 },
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
