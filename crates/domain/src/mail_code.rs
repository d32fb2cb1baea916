//! Code extraction from provider mail.
//!
//! A [`CodeExtractor`] runs an ordered cascade of [`ExtractionStage`]s over a
//! message's plain-text body and then over its sanitized HTML body. The first
//! stage that yields a token wins, so the order encodes how specific each
//! pattern is.

mod html;

use chrono::{DateTime, Utc};
use otpdesk_core::{AppError, AppResult};
use regex::Regex;
use serde::{Deserialize, Serialize};

pub use html::HtmlSanitizer;

/// Label words that introduce a non-numeric code.
pub const DEFAULT_LABEL_WORDS: [&str; 6] =
    ["login", "token", "código", "codigo", "senha", "password"];

/// Named cascade stages, most specific first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// `123-456` or `123 – 456`, joined into six digits.
    HyphenatedPair,
    /// A bare run of 4 to 8 digits.
    NumericRun,
    /// 3 to 6 alphanumerics following a label word and a `:`, `=` or dash.
    /// After bare whitespace only an uppercase or digit run counts.
    LabelledToken,
    /// A bare uppercase alphanumeric word of exactly 4 characters.
    AlphanumericQuad,
    /// A bare uppercase alphanumeric word of 3 to 6 characters with a digit.
    AlphanumericRun,
}

impl StageKind {
    /// Returns the stable stage name used in logs and responses.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HyphenatedPair => "hyphenated_pair",
            Self::NumericRun => "numeric_run",
            Self::LabelledToken => "labelled_token",
            Self::AlphanumericQuad => "alphanumeric_quad",
            Self::AlphanumericRun => "alphanumeric_run",
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// One matcher of the cascade.
#[derive(Debug, Clone)]
pub struct ExtractionStage {
    kind: StageKind,
    pattern: Regex,
    excluded: Vec<String>,
}

impl ExtractionStage {
    /// Compiles a stage. The token is the concatenation of every capture group
    /// of the first accepted match.
    pub fn new(kind: StageKind, pattern: &str) -> AppResult<Self> {
        let pattern = Regex::new(pattern).map_err(|error| {
            AppError::Internal(format!("invalid pattern for stage {kind}: {error}"))
        })?;

        Ok(Self {
            kind,
            pattern,
            excluded: Vec::new(),
        })
    }

    /// Rejects candidates equal (case-insensitively) to any of `words`.
    #[must_use]
    pub fn excluding(mut self, words: impl IntoIterator<Item = String>) -> Self {
        self.excluded = words
            .into_iter()
            .map(|word| word.to_lowercase())
            .collect();
        self
    }

    /// Returns the stage kind.
    #[must_use]
    pub fn kind(&self) -> StageKind {
        self.kind
    }

    /// Returns the first acceptable token in `text`.
    #[must_use]
    pub fn find(&self, text: &str) -> Option<String> {
        self.pattern.captures_iter(text).find_map(|captures| {
            let token: String = captures
                .iter()
                .skip(1)
                .flatten()
                .map(|group| group.as_str())
                .collect();

            self.accepts(token.as_str()).then_some(token)
        })
    }

    fn accepts(&self, token: &str) -> bool {
        if token.is_empty() {
            return false;
        }

        if self.excluded.contains(&token.to_lowercase()) {
            return false;
        }

        match self.kind {
            StageKind::AlphanumericRun => token.chars().any(|c| c.is_ascii_digit()),
            _ => true,
        }
    }
}

/// Decoded view of one fetched message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailMessage {
    /// Bare sender address from the `From` header.
    pub sender: Option<String>,
    /// Decoded subject.
    pub subject: Option<String>,
    /// `Date` header.
    pub date: Option<DateTime<Utc>>,
    /// First plain-text body part.
    pub text_body: Option<String>,
    /// First HTML body part.
    pub html_body: Option<String>,
}

/// Code found in a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedCode {
    /// Extracted token.
    pub token: String,
    /// Sender address of the message.
    pub sender: String,
    /// Message date, if present.
    pub received_at: Option<DateTime<Utc>>,
    /// Stage that matched.
    pub stage: StageKind,
}

/// Ordered short-circuit matcher cascade.
#[derive(Debug, Clone)]
pub struct CodeExtractor {
    stages: Vec<ExtractionStage>,
    sanitizer: HtmlSanitizer,
}

impl CodeExtractor {
    /// Builds the default cascade with [`DEFAULT_LABEL_WORDS`].
    pub fn new() -> AppResult<Self> {
        Self::with_label_words(DEFAULT_LABEL_WORDS)
    }

    /// Builds the default cascade with custom label words.
    pub fn with_label_words<I, S>(label_words: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let label_words: Vec<String> = label_words
            .into_iter()
            .map(|word| word.as_ref().trim().to_owned())
            .filter(|word| !word.is_empty())
            .collect();

        if label_words.is_empty() {
            return Err(AppError::Validation(
                "at least one label word is required".to_owned(),
            ));
        }

        let alternation = label_words
            .iter()
            .map(|word| regex::escape(word))
            .collect::<Vec<_>>()
            .join("|");

        let stages = vec![
            ExtractionStage::new(
                StageKind::HyphenatedPair,
                r"\b([0-9]{3})\s*[-–]\s*([0-9]{3})\b",
            )?,
            ExtractionStage::new(StageKind::NumericRun, r"\b([0-9]{4,8})\b")?,
            ExtractionStage::new(
                StageKind::LabelledToken,
                &format!(
                    r"(?i)\b(?:{alternation})\b(?:\s*[:=\-–]\s*([a-z0-9]{{3,6}})|\s+(?-i:([A-Z0-9]{{3,6}})))\b"
                ),
            )?
            .excluding(label_words),
            ExtractionStage::new(StageKind::AlphanumericQuad, r"\b([A-Z0-9]{4})\b")?,
            ExtractionStage::new(StageKind::AlphanumericRun, r"\b([A-Z0-9]{3,6})\b")?,
        ];

        Self::from_stages(stages)
    }

    /// Builds an extractor from an explicit stage list.
    pub fn from_stages(stages: Vec<ExtractionStage>) -> AppResult<Self> {
        Ok(Self {
            stages,
            sanitizer: HtmlSanitizer::new()?,
        })
    }

    /// Returns the stages in evaluation order.
    #[must_use]
    pub fn stages(&self) -> &[ExtractionStage] {
        self.stages.as_slice()
    }

    /// Runs the cascade over free text.
    #[must_use]
    pub fn extract_from_text(&self, text: &str) -> Option<(StageKind, String)> {
        self.stages
            .iter()
            .find_map(|stage| stage.find(text).map(|token| (stage.kind(), token)))
    }

    /// Runs the cascade over the text body, then over the sanitized HTML body.
    #[must_use]
    pub fn extract(&self, message: &MailMessage) -> Option<ExtractedCode> {
        let sender = message.sender.clone().unwrap_or_default();

        let from_text = message
            .text_body
            .as_deref()
            .and_then(|text| self.extract_from_text(text));

        let found = from_text.or_else(|| {
            message
                .html_body
                .as_deref()
                .map(|html| self.sanitizer.sanitize(html))
                .and_then(|text| self.extract_from_text(text.as_str()))
        })?;

        let (stage, token) = found;
        Some(ExtractedCode {
            token,
            sender,
            received_at: message.date,
            stage,
        })
    }
}
