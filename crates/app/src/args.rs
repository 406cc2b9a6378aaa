use std::fmt;
use std::path::PathBuf;

use study_core::model::{SessionDuration, SubjectId, TopicId};

const DEFAULT_DB_URL: &str = "sqlite://study.sqlite3";
const DEFAULT_RECOMMENDATIONS: usize = 3;

#[derive(Debug)]
pub enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArgument { what: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidDbUrl { raw: String },
    InvalidDuration { raw: String },
    InvalidId { flag: &'static str, raw: String },
    InvalidLimit { raw: String },
    ConflictingModes,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArgument { what } => write!(f, "missing {what}"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidDuration { raw } => {
                write!(f, "invalid --duration value (expected 5, 10 or 15): {raw}")
            }
            ArgsError::InvalidId { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidLimit { raw } => write!(f, "invalid --limit value: {raw}"),
            ArgsError::ConflictingModes => write!(f, "--random and --manual are exclusive"),
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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudyMode {
    Random,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Study {
        mode: Option<StudyMode>,
        duration: SessionDuration,
    },
    Subjects,
    Topics {
        subject: SubjectId,
    },
    AddSubject {
        name: String,
        description: Option<String>,
    },
    AddTopic {
        subject: SubjectId,
        name: String,
        description: Option<String>,
    },
    Attach {
        topic: TopicId,
        file: PathBuf,
    },
    History {
        subject: SubjectId,
    },
    Recommend {
        subject: SubjectId,
        limit: usize,
    },
}

#[derive(Debug)]
pub struct Args {
    pub db_url: String,
    pub command: Command,
}

pub fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  study-sprint [study] [--random|--manual] [--duration <5|10|15>] [--db <sqlite_url>]");
    eprintln!("  study-sprint subjects");
    eprintln!("  study-sprint topics --subject <id>");
    eprintln!("  study-sprint add-subject <name> [--description <text>]");
    eprintln!("  study-sprint add-topic --subject <id> <name> [--description <text>]");
    eprintln!("  study-sprint attach --topic <id> <file>");
    eprintln!("  study-sprint history --subject <id>");
    eprintln!("  study-sprint recommend --subject <id> [--limit <n>]");
    eprintln!();
    eprintln!("Every subcommand accepts --db. Defaults:");
    eprintln!("  --db {DEFAULT_DB_URL}");
    eprintln!("  --duration 10");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  STUDY_DB_URL, STUDY_DURATION, STUDY_LOG");
    eprintln!("  STUDY_API_URL (remote API for the catalog and sessions; --db is ignored)");
    eprintln!("  STUDY_AI_API_KEY, STUDY_AI_BASE_URL, STUDY_AI_MODEL (local generation)");
}

fn parse_id<T>(
    value: &str,
    flag: &'static str,
    build: impl Fn(u64) -> T,
) -> Result<T, ArgsError> {
    value
        .trim()
        .parse::<u64>()
        .map(build)
        .map_err(|_| ArgsError::InvalidId {
            flag,
            raw: value.to_string(),
        })
}

fn parse_duration(value: &str) -> Option<SessionDuration> {
    value
        .trim()
        .parse::<u32>()
        .ok()
        .and_then(|minutes| SessionDuration::from_minutes(minutes).ok())
}

impl Args {
    pub fn parse(argv: impl IntoIterator<Item = String>) -> Result<Self, ArgsError> {
        let mut args = argv.into_iter().peekable();
        let name = match args.peek() {
            Some(first) if !first.starts_with('-') => args.next(),
            _ => None,
        }
        .unwrap_or_else(|| "study".to_string());

        let mut db_url = std::env::var("STUDY_DB_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map_or_else(|| normalize_sqlite_url(DEFAULT_DB_URL.into()), normalize_sqlite_url);
        let mut duration = std::env::var("STUDY_DURATION")
            .ok()
            .and_then(|value| parse_duration(&value))
            .unwrap_or_default();
        let mut mode: Option<StudyMode> = None;
        let mut subject: Option<SubjectId> = None;
        let mut topic: Option<TopicId> = None;
        let mut description: Option<String> = None;
        let mut limit = DEFAULT_RECOMMENDATIONS;
        let mut positionals: Vec<String> = Vec::new();

        let mut set_mode = |next: StudyMode| match mode {
            Some(current) if current != next => Err(ArgsError::ConflictingModes),
            _ => {
                mode = Some(next);
                Ok(())
            }
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--duration" => {
                    let value = require_value(&mut args, "--duration")?;
                    duration = parse_duration(&value)
                        .ok_or(ArgsError::InvalidDuration { raw: value.clone() })?;
                }
                "--random" => set_mode(StudyMode::Random)?,
                "--manual" => set_mode(StudyMode::Manual)?,
                "--subject" => {
                    let value = require_value(&mut args, "--subject")?;
                    subject = Some(parse_id(&value, "--subject", SubjectId::new)?);
                }
                "--topic" => {
                    let value = require_value(&mut args, "--topic")?;
                    topic = Some(parse_id(&value, "--topic", TopicId::new)?);
                }
                "--description" => {
                    description = Some(require_value(&mut args, "--description")?);
                }
                "--limit" => {
                    let value = require_value(&mut args, "--limit")?;
                    limit = value
                        .parse::<usize>()
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or(ArgsError::InvalidLimit { raw: value.clone() })?;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ if arg.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => positionals.push(arg),
            }
        }

        let subject_required = || subject.ok_or(ArgsError::MissingArgument { what: "--subject" });
        let mut positionals = positionals.into_iter();
        let command = match name.as_str() {
            "study" => Command::Study { mode, duration },
            "subjects" => Command::Subjects,
            "topics" => Command::Topics {
                subject: subject_required()?,
            },
            "add-subject" => Command::AddSubject {
                name: positionals
                    .next()
                    .ok_or(ArgsError::MissingArgument { what: "subject name" })?,
                description,
            },
            "add-topic" => Command::AddTopic {
                subject: subject_required()?,
                name: positionals
                    .next()
                    .ok_or(ArgsError::MissingArgument { what: "topic name" })?,
                description,
            },
            "attach" => Command::Attach {
                topic: topic.ok_or(ArgsError::MissingArgument { what: "--topic" })?,
                file: positionals
                    .next()
                    .map(PathBuf::from)
                    .ok_or(ArgsError::MissingArgument { what: "material file" })?,
            },
            "history" => Command::History {
                subject: subject_required()?,
            },
            "recommend" => Command::Recommend {
                subject: subject_required()?,
                limit,
            },
            _ => return Err(ArgsError::UnknownCommand(name)),
        };

        if let Some(extra) = positionals.next() {
            return Err(ArgsError::UnknownArg(extra));
        }

        Ok(Self { db_url, command })
    }
}

/// Turns `sqlite:relative.db` and bare paths into an absolute `sqlite://` URL.
pub fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite://")
        .or_else(|| trimmed.strip_prefix("sqlite:"))
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}
