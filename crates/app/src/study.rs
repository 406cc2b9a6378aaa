//! Interactive terminal study loop on top of [`StudySessionController`].

use std::error::Error;

use rand::Rng;
use services::sessions::view::option_index;
use services::{
    AppServices, GenerationBackend, ManualSelection, SessionError, StudyCatalog,
    StudySessionController, TickReceiver,
};
use study_core::model::{SessionDuration, SubjectId, TopicId};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::args::StudyMode;
use crate::render;

type Input = Lines<BufReader<Stdin>>;
type AppResult<T> = Result<T, Box<dyn Error>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuChoice {
    Start(StudyMode),
    Duration(SessionDuration),
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionExit {
    Again,
    Quit,
}

fn parse_menu(line: &str) -> Option<MenuChoice> {
    let mut words = line.split_whitespace();
    let choice = match (words.next()?, words.next()) {
        ("r" | "random", None) => MenuChoice::Start(StudyMode::Random),
        ("m" | "manual", None) => MenuChoice::Start(StudyMode::Manual),
        ("d" | "duration", Some(raw)) => {
            let minutes = raw.parse::<u32>().ok()?;
            MenuChoice::Duration(SessionDuration::from_minutes(minutes).ok()?)
        }
        ("q" | "quit", None) => MenuChoice::Quit,
        _ => return None,
    };
    words.next().is_none().then_some(choice)
}

/// `q2 b` or `2 b` into zero-based (question, option).
fn parse_answer(line: &str) -> Option<(usize, usize)> {
    let mut words = line.split_whitespace();
    let question = words.next()?;
    let letter = words.next()?;
    if words.next().is_some() {
        return None;
    }

    let question = question
        .strip_prefix(['q', 'Q'])
        .unwrap_or(question)
        .parse::<usize>()
        .ok()?
        .checked_sub(1)?;
    let mut chars = letter.chars();
    let option = option_index(chars.next()?)?;
    chars.next().is_none().then_some((question, option))
}

pub async fn run(
    services: &AppServices,
    mode: Option<StudyMode>,
    duration: SessionDuration,
) -> AppResult<()> {
    let catalog = services.catalog();
    let (mut controller, mut ticks) = services.session_controller(duration);
    let mut input: Input = BufReader::new(tokio::io::stdin()).lines();
    let mut rng = rand::rng();

    if services.backend() == GenerationBackend::Disabled {
        println!("Session generation is not configured; set STUDY_API_URL or STUDY_AI_API_KEY.");
    }

    let mut requested = mode;
    loop {
        let mode = match requested.take() {
            Some(mode) => mode,
            None => match menu(&mut controller, &mut input).await? {
                Some(mode) => mode,
                None => break,
            },
        };

        let started = match mode {
            StudyMode::Random => {
                start_random(catalog.as_ref(), &mut controller, &mut rng).await?
            }
            StudyMode::Manual => {
                start_manual(catalog.as_ref(), &mut controller, &mut input, &mut rng).await?
            }
        };
        if !started {
            continue;
        }

        match run_session(&mut controller, &mut ticks, &mut input).await? {
            SessionExit::Again => controller.new_session()?,
            SessionExit::Quit => break,
        }
    }

    controller.complete()?;
    controller.flush_report().await;
    println!("Bye.");
    Ok(())
}

async fn menu(
    controller: &mut StudySessionController,
    input: &mut Input,
) -> AppResult<Option<StudyMode>> {
    loop {
        println!();
        println!(
            "Session length: {}. [r]andom, [m]anual, [d]uration <5|10|15>, [q]uit",
            controller.duration()
        );
        let Some(line) = input.next_line().await? else {
            return Ok(None);
        };
        match parse_menu(&line) {
            Some(MenuChoice::Start(mode)) => return Ok(Some(mode)),
            Some(MenuChoice::Duration(duration)) => controller.set_duration(duration)?,
            Some(MenuChoice::Quit) => return Ok(None),
            None => println!("Unknown choice: {}", line.trim()),
        }
    }
}

fn generation_failed(err: &SessionError) {
    println!("Could not prepare the session: {err}");
    println!("Pick again to retry.");
}

async fn start_random<R: Rng + ?Sized>(
    catalog: &dyn StudyCatalog,
    controller: &mut StudySessionController,
    rng: &mut R,
) -> AppResult<bool> {
    let topics = catalog.flattened_topics().await?;
    println!("Preparing a session...");
    match controller.start_random(&topics, rng).await {
        Ok(session) => {
            println!("{}", render::session_text(session));
            Ok(true)
        }
        Err(SessionError::EmptyCatalog) => {
            println!("The catalog is empty. Add subjects and topics first.");
            Ok(false)
        }
        Err(err @ SessionError::Generation(_)) => {
            generation_failed(&err);
            Ok(false)
        }
        Err(err) => Err(err.into()),
    }
}

fn print_selection(selection: &ManualSelection) {
    println!();
    println!("Subjects:");
    for subject in selection.subjects() {
        let marker = if subject.id() == selection.subject_id() { ">" } else { " " };
        println!("{marker} {}", render::subject_line(subject));
    }
    println!("Topics:");
    if selection.topics().is_empty() {
        println!("  (this subject has no topics)");
    }
    for topic in selection.topics() {
        let marker = if Some(topic.id()) == selection.topic_id() { ">" } else { " " };
        println!("{marker} {}", render::topic_line(topic));
    }
    println!("subject <id>, topic <id>, go, back");
}

async fn start_manual<R: Rng + ?Sized>(
    catalog: &dyn StudyCatalog,
    controller: &mut StudySessionController,
    input: &mut Input,
    rng: &mut R,
) -> AppResult<bool> {
    let subjects = catalog.list_subjects().await?;
    let mut selection = match ManualSelection::start(catalog, subjects, rng).await {
        Ok(selection) => selection,
        Err(SessionError::EmptyCatalog) => {
            println!("The catalog is empty. Add subjects and topics first.");
            return Ok(false);
        }
        Err(err) => return Err(err.into()),
    };

    loop {
        print_selection(&selection);
        let Some(line) = input.next_line().await? else {
            return Ok(false);
        };
        let mut words = line.split_whitespace();
        match (words.next(), words.next()) {
            (Some("subject"), Some(raw)) => match raw.parse::<SubjectId>() {
                Ok(id) => {
                    if let Err(err) = selection.choose_subject(id, catalog, rng).await {
                        println!("{err}");
                    }
                }
                Err(err) => println!("{err}"),
            },
            (Some("topic"), Some(raw)) => match raw.parse::<TopicId>() {
                Ok(id) => {
                    if let Err(err) = selection.choose_topic(id) {
                        println!("{err}");
                    }
                }
                Err(err) => println!("{err}"),
            },
            (Some("go"), None) => {
                println!("Preparing a session...");
                match controller.generate_selection(&selection).await {
                    Ok(session) => {
                        println!("{}", render::session_text(session));
                        return Ok(true);
                    }
                    Err(SessionError::NoSelection) => println!("Pick a topic first."),
                    Err(err @ SessionError::Generation(_)) => generation_failed(&err),
                    Err(err) => return Err(err.into()),
                }
            }
            (Some("back"), None) => return Ok(false),
            _ => println!("Unknown command: {}", line.trim()),
        }
    }
}

fn print_session_help() {
    println!("Answer with `q<n> <letter>` (e.g. `q1 b`). Other commands:");
    println!("  submit, show, time, new, quit, help");
}

fn print_timer(controller: &StudySessionController) {
    println!("{}", render::timer_line(&controller.timer_view()));
}

async fn run_session(
    controller: &mut StudySessionController,
    ticks: &mut TickReceiver,
    input: &mut Input,
) -> AppResult<SessionExit> {
    println!("{}", render::quiz_text(controller));
    print_session_help();
    print_timer(controller);

    let mut urgency = controller.timer_view().urgency;
    let mut warned = false;
    loop {
        tokio::select! {
            Some(tick) = ticks.recv() => {
                if !controller.handle_tick(tick) {
                    continue;
                }
                let view = controller.timer_view();
                let minute_mark = view.remaining_seconds % 60 == 0;
                let entered_last_minute = view.last_minute_warning && !warned;
                if minute_mark || entered_last_minute || view.urgency != urgency {
                    println!("{}", render::timer_line(&view));
                }
                warned |= view.last_minute_warning;
                urgency = view.urgency;
                if view.is_expired() {
                    println!("Time is up. You can still finish the quiz and submit.");
                }
            }
            line = input.next_line() => {
                let Some(line) = line? else {
                    return Ok(SessionExit::Quit);
                };
                if let Some(exit) = handle_command(controller, line.trim())? {
                    return Ok(exit);
                }
            }
        }
    }
}

fn handle_command(
    controller: &mut StudySessionController,
    line: &str,
) -> AppResult<Option<SessionExit>> {
    match line {
        "" => {}
        "help" => print_session_help(),
        "time" => print_timer(controller),
        "show" => {
            if let Some(session) = controller.session() {
                println!("{}", render::session_text(session));
            }
            println!("{}", render::quiz_text(controller));
        }
        "submit" => match controller.submit() {
            Ok(result) => {
                println!("{}", render::quiz_text(controller));
                println!("{}", render::result_text(&result));
                println!("Type `new` for another session or `quit` to stop.");
            }
            Err(SessionError::QuizIncomplete { answered, total }) => {
                println!("Answer every question first ({answered}/{total} answered).");
            }
            Err(SessionError::ResultsShown) => println!("Results are already shown."),
            Err(err) => return Err(err.into()),
        },
        "new" => return Ok(Some(SessionExit::Again)),
        "quit" => return Ok(Some(SessionExit::Quit)),
        _ => match parse_answer(line) {
            Some((question, option)) => match controller.select_answer(question, option) {
                Ok(()) if controller.can_submit() => {
                    println!("All questions answered. Type `submit` when ready.");
                }
                Ok(()) => {}
                Err(err) => println!("{err}"),
            },
            None => println!("Unknown command: {line}. Type `help`."),
        },
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers_accept_both_forms() {
        assert_eq!(parse_answer("q1 b"), Some((0, 1)));
        assert_eq!(parse_answer("3 D"), Some((2, 3)));
        assert_eq!(parse_answer("Q2 a"), Some((1, 0)));
    }

    #[test]
    fn malformed_answers_are_rejected() {
        assert_eq!(parse_answer("q0 a"), None);
        assert_eq!(parse_answer("q1"), None);
        assert_eq!(parse_answer("q1 ab"), None);
        assert_eq!(parse_answer("q1 b extra"), None);
        assert_eq!(parse_answer("one b"), None);
    }

    #[test]
    fn menu_choices() {
        assert_eq!(
            parse_menu("r"),
            Some(MenuChoice::Start(StudyMode::Random))
        );
        assert_eq!(
            parse_menu("manual"),
            Some(MenuChoice::Start(StudyMode::Manual))
        );
        assert_eq!(
            parse_menu("d 15"),
            Some(MenuChoice::Duration(SessionDuration::Fifteen))
        );
        assert_eq!(parse_menu("d 20"), None);
        assert_eq!(parse_menu("quit"), Some(MenuChoice::Quit));
        assert_eq!(parse_menu("random now"), None);
        assert_eq!(parse_menu(""), None);
    }
}
