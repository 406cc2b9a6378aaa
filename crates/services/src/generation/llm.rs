use std::env;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use study_core::model::{QuizQuestion, SessionPayload, StudySession, Topic};

use super::{SessionGenerator, SessionRequest};
use crate::catalog::CatalogService;
use crate::error::GenerationError;

const WORDS_PER_MINUTE: u32 = 200;
const MAX_CONTENT_TOKENS: u32 = 16_000;
const QUIZ_QUESTIONS: usize = 3;
const QUIZ_MAX_TOKENS: u32 = 1_500;
const CONTENT_TEMPERATURE: f32 = 0.7;
const QUIZ_TEMPERATURE: f32 = 0.8;
const MATERIAL_EXCERPT_CHARS: usize = 3_000;
const MIN_CONCEPT_CHARS: usize = 4;

const CONTENT_SYSTEM_PROMPT: &str = "You are an educational assistant who writes concise, \
effective study material. Use plain notation for formulas. Always produce the requested \
number of words.";
const QUIZ_SYSTEM_PROMPT: &str = "You are an expert at writing effective comprehension quizzes.";

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl LlmConfig {
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("STUDY_AI_API_KEY").ok()?;
        if api_key.trim().is_empty() {
            return None;
        }
        let base_url =
            env::var("STUDY_AI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
        let model = env::var("STUDY_AI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
        Some(Self {
            base_url,
            api_key,
            model,
        })
    }
}

/// Exponential backoff between attempts of a single chat call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Generates sessions locally from catalog data through a chat completions endpoint.
#[derive(Clone)]
pub struct LlmSessionGenerator {
    client: Client,
    config: Option<LlmConfig>,
    catalog: Arc<CatalogService>,
    retry: RetryPolicy,
}

impl LlmSessionGenerator {
    #[must_use]
    pub fn from_env(catalog: Arc<CatalogService>) -> Self {
        Self::new(LlmConfig::from_env(), catalog)
    }

    #[must_use]
    pub fn new(config: Option<LlmConfig>, catalog: Arc<CatalogService>) -> Self {
        Self {
            client: Client::new(),
            config,
            catalog,
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    async fn complete_with_retry(
        &self,
        config: &LlmConfig,
        call: ChatCall<'_>,
    ) -> Result<String, GenerationError> {
        let mut attempt = 1;
        loop {
            match self.complete(config, &call).await {
                Ok(text) => return Ok(text),
                Err(err) if attempt < self.retry.attempts => {
                    let delay = self.retry.delay_after(attempt);
                    tracing::warn!(attempt, ?delay, error = %err, "chat completion failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn complete(
        &self,
        config: &LlmConfig,
        call: &ChatCall<'_>,
    ) -> Result<String, GenerationError> {
        let url = format!(
            "{}/chat/completions",
            config.base_url.trim_end_matches('/')
        );
        let payload = ChatRequest {
            model: config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: call.system.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: call.prompt.clone(),
                },
            ],
            temperature: call.temperature,
            max_tokens: call.max_tokens,
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&config.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GenerationError::HttpStatus(response.status()));
        }

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(GenerationError::EmptyResponse)?;

        Ok(content.trim().to_string())
    }
}

#[async_trait]
impl SessionGenerator for LlmSessionGenerator {
    async fn generate_session(
        &self,
        request: &SessionRequest,
    ) -> Result<StudySession, GenerationError> {
        let config = self.config.as_ref().ok_or(GenerationError::Disabled)?;

        let topic = self
            .catalog
            .get_topic(request.topic_id)
            .await?
            .ok_or(GenerationError::UnknownTopic(request.topic_id))?;
        let material = self
            .catalog
            .latest_material(request.topic_id)
            .await?
            .map(|m| m.content);

        let target_words = WORDS_PER_MINUTE * request.duration.minutes();
        tracing::info!(
            topic_id = %request.topic_id,
            duration = request.duration.minutes(),
            target_words,
            has_material = material.is_some(),
            "generating session content"
        );

        let raw_content = self
            .complete_with_retry(
                config,
                ChatCall {
                    system: CONTENT_SYSTEM_PROMPT,
                    prompt: content_prompt(&topic, target_words, material.as_deref()),
                    temperature: CONTENT_TEMPERATURE,
                    max_tokens: content_max_tokens(target_words),
                },
            )
            .await?;
        let sections = parse_content_sections(&raw_content);
        if sections.content.is_empty() {
            return Err(GenerationError::Malformed(
                "response has no CONTENT section".into(),
            ));
        }

        let raw_quiz = self
            .complete_with_retry(
                config,
                ChatCall {
                    system: QUIZ_SYSTEM_PROMPT,
                    prompt: quiz_prompt(topic.name(), &sections.content),
                    temperature: QUIZ_TEMPERATURE,
                    max_tokens: QUIZ_MAX_TOKENS,
                },
            )
            .await?;
        let quiz = parse_quiz(&raw_quiz);
        if quiz.is_empty() {
            return Err(GenerationError::Malformed(
                "response has no QUESTION blocks".into(),
            ));
        }

        let payload = SessionPayload {
            topic_id: topic.id(),
            topic_name: topic.name().to_owned(),
            duration: request.duration,
            learning_objective: Some(sections.objective),
            content: Some(sections.content),
            key_concepts: sections.key_concepts,
            quiz,
        };
        Ok(StudySession::from_payload(payload)?)
    }
}

struct ChatCall<'a> {
    system: &'a str,
    prompt: String,
    temperature: f32,
    max_tokens: u32,
}

/// About 1.3 tokens per word plus a 20% buffer.
fn content_max_tokens(target_words: u32) -> u32 {
    (target_words.saturating_mul(156) / 100).min(MAX_CONTENT_TOKENS)
}

fn depth_instruction(target_words: u32) -> &'static str {
    match target_words / WORDS_PER_MINUTE {
        0..=5 => "This is a QUICK 5 minute session: keep it brief and focus only on the most important ideas.",
        6..=10 => "This is a MEDIUM 10 minute session: cover the main concepts, balancing clarity and depth.",
        _ => "This is a DEEP 15 minute session: explain in detail with examples and practical applications.",
    }
}

fn content_prompt(topic: &Topic, target_words: u32, material: Option<&str>) -> String {
    let mut prompt = format!("Write study content for the following topic.\n\nTopic: {}\n", topic.name());
    if let Some(description) = topic.description() {
        prompt.push_str(&format!("Description: {description}\n"));
    }
    prompt.push_str(&format!(
        "\n{}\nWrite {target_words} words (between {} and {}).\n\n\
         Split the content into 3-5 sections with `##` subtitles and 2-3 paragraphs each, \
         separated by blank lines.\n",
        depth_instruction(target_words),
        target_words * 9 / 10,
        target_words * 11 / 10,
    ));

    match material {
        Some(material) => {
            let excerpt: String = material.chars().take(MATERIAL_EXCERPT_CHARS).collect();
            prompt.push_str(&format!(
                "\nBase the content on this reference material, adapted to the session length:\n\n{excerpt}\n"
            ));
        }
        None => prompt.push_str("\nWrite accurate, well structured content from your own knowledge.\n"),
    }

    prompt.push_str(&format!(
        "\nAnswer in exactly this format:\n\n\
         OBJECTIVE:\n[one sentence learning objective]\n\n\
         CONTENT:\n[main content, {target_words} words]\n\n\
         KEY CONCEPTS:\n- [concept 1]\n- [concept 2]\n- [concept 3]\n\n\
         Do not include word counts or any other commentary.\n"
    ));
    prompt
}

fn quiz_prompt(topic_name: &str, content: &str) -> String {
    format!(
        "Write {QUIZ_QUESTIONS} multiple choice questions about {topic_name} based ONLY on the \
         content below.\n\nCONTENT:\n{content}\n\n\
         Each question has 4 options and exactly one correct option. Wrong options must be \
         plausible. Every answer must be found in the content above.\n\n\
         Answer in exactly this format:\n\n\
         QUESTION 1:\n[question text]\nA) [option]\nB) [option]\nC) [option]\nD) [option]\nANSWER: [A/B/C/D]\n\n\
         QUESTION 2:\n...\n"
    )
}

#[derive(Debug, Default, PartialEq, Eq)]
struct ContentSections {
    objective: String,
    content: String,
    key_concepts: Vec<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Objective,
    Content,
    Concepts,
}

/// Text after `header:` when the line opens that section, compared case-insensitively.
fn header_rest<'a>(line: &'a str, header: &str) -> Option<&'a str> {
    let trimmed = line.trim_start();
    let prefix = trimmed.get(..header.len())?;
    if !prefix.eq_ignore_ascii_case(header) {
        return None;
    }
    trimmed[header.len()..].trim_start().strip_prefix(':').map(str::trim)
}

fn parse_content_sections(text: &str) -> ContentSections {
    let mut section = Section::Preamble;
    let mut objective = Vec::new();
    let mut content = Vec::new();
    let mut key_concepts = Vec::new();

    for line in text.lines() {
        let (next, rest) = if let Some(rest) = header_rest(line, "OBJECTIVE") {
            (Section::Objective, rest)
        } else if let Some(rest) = header_rest(line, "CONTENT") {
            (Section::Content, rest)
        } else if let Some(rest) = header_rest(line, "KEY CONCEPTS") {
            (Section::Concepts, rest)
        } else {
            (section, line)
        };
        section = next;

        match section {
            Section::Preamble => {}
            Section::Objective => objective.push(rest),
            Section::Content => content.push(rest),
            Section::Concepts => {
                if let Some(concept) = concept_item(rest) {
                    key_concepts.push(concept);
                }
            }
        }
    }

    ContentSections {
        objective: objective.join("\n").trim().to_string(),
        content: content.join("\n").trim().to_string(),
        key_concepts,
    }
}

fn concept_item(line: &str) -> Option<String> {
    let line = line.trim();
    let bulleted = line.starts_with(['-', '*', '•', '–'])
        || line
            .split_once(['.', ')'])
            .is_some_and(|(n, _)| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()));
    if !bulleted {
        return None;
    }
    let concept = line
        .trim_start_matches(|c: char| c.is_ascii_digit() || "-*•–.) ".contains(c))
        .trim();
    (concept.chars().count() >= MIN_CONCEPT_CHARS).then(|| concept.to_string())
}

fn option_text(line: &str) -> Option<&str> {
    let mut chars = line.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    if !('A'..='D').contains(&letter) || chars.next()? != ')' {
        return None;
    }
    Some(line[2..].trim())
}

fn parse_quiz(text: &str) -> Vec<QuizQuestion> {
    struct Draft {
        question: Option<String>,
        options: Vec<String>,
        correct_answer: usize,
    }

    fn flush(draft: Option<Draft>, out: &mut Vec<QuizQuestion>) {
        if let Some(Draft {
            question: Some(question),
            options,
            correct_answer,
        }) = draft
        {
            if !options.is_empty() {
                out.push(QuizQuestion {
                    question,
                    options,
                    correct_answer,
                });
            }
        }
    }

    let mut questions = Vec::new();
    let mut draft: Option<Draft> = None;

    for line in text.lines().map(str::trim) {
        if line
            .get(.."QUESTION".len())
            .is_some_and(|head| head.eq_ignore_ascii_case("QUESTION"))
        {
            flush(draft.take(), &mut questions);
            let inline = line
                .split_once(':')
                .map(|(_, rest)| rest.trim())
                .filter(|rest| !rest.is_empty());
            draft = Some(Draft {
                question: inline.map(str::to_string),
                options: Vec::new(),
                correct_answer: 0,
            });
            continue;
        }

        let Some(current) = draft.as_mut() else {
            continue;
        };
        if let Some(letter) = header_rest(line, "ANSWER") {
            if let Some(c) = letter.chars().next() {
                let c = c.to_ascii_uppercase();
                if c.is_ascii_uppercase() {
                    current.correct_answer = usize::from(c as u8 - b'A');
                }
            }
        } else if let Some(option) = option_text(line) {
            current.options.push(option.to_string());
        } else if current.question.is_none() && !line.is_empty() {
            current.question = Some(line.to_string());
        }
    }
    flush(draft, &mut questions);
    questions
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}
