mod args;
mod render;
mod study;

use std::path::Path;

use args::{Args, ArgsError, Command, print_usage};
use services::generation::StudyApiConfig;
use services::{AppServices, Clock};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_env("STUDY_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn material_source(file: &Path) -> Option<String> {
    file.file_name()
        .map(|name| name.to_string_lossy().into_owned())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let parsed = Args::parse(std::env::args().skip(1)).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let services = match StudyApiConfig::from_env() {
        Some(api) => AppServices::remote(api, Clock::default_clock()),
        None => {
            // Open + migrate SQLite at startup. Keep this in the binary glue so services stay pure.
            prepare_sqlite_file(&parsed.db_url)?;
            AppServices::new_sqlite(&parsed.db_url, Clock::default_clock()).await?
        }
    };
    let catalog = services.catalog();

    match parsed.command {
        Command::Study { mode, duration } => study::run(&services, mode, duration).await?,
        Command::Subjects => {
            let subjects = catalog.list_subjects().await?;
            if subjects.is_empty() {
                println!("No subjects yet. Add one with `add-subject <name>`.");
            }
            for subject in &subjects {
                println!("{}", render::subject_line(subject));
            }
        }
        Command::Topics { subject } => {
            for topic in &catalog.list_topics(subject).await? {
                println!("{}", render::topic_line(topic));
            }
        }
        Command::AddSubject { name, description } => {
            let id = catalog.create_subject(&name, description).await?;
            println!("created subject {id}");
        }
        Command::AddTopic {
            subject,
            name,
            description,
        } => {
            let id = catalog.create_topic(subject, &name, description).await?;
            println!("created topic {id}");
        }
        Command::Attach { topic, file } => {
            let content = std::fs::read_to_string(&file)?;
            if content.trim().is_empty() {
                return Err(format!("{} has no text to attach", file.display()).into());
            }
            catalog
                .attach_material(topic, content, material_source(&file))
                .await?;
            println!("attached {} to topic {topic}", file.display());
        }
        Command::History { subject } => {
            let records = catalog.history(subject).await?;
            if records.is_empty() {
                println!("No completed sessions for subject {subject}.");
            }
            for record in &records {
                println!("{}", render::history_line(record));
            }
        }
        Command::Recommend { subject, limit } => {
            let recommendations = catalog.recommend(subject, limit).await?;
            for (index, recommendation) in recommendations.iter().enumerate() {
                println!("{}", render::recommendation_line(index + 1, recommendation));
            }
        }
    }

    Ok(())
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

    let path = Path::new(path);
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
        eprintln!("{err}");
        std::process::exit(2);
    }
}
