use otpdesk_core::{AppError, AppResult};
use regex::{Captures, Regex};

/// Reduces an HTML mail body to plain searchable text.
///
/// Style and script blocks and comments are dropped with their content, every
/// tag (attributes included) becomes a single space, common entities are
/// decoded and whitespace is collapsed.
#[derive(Debug, Clone)]
pub struct HtmlSanitizer {
    hidden_blocks: Regex,
    comments: Regex,
    tags: Regex,
    numeric_entities: Regex,
    whitespace: Regex,
}

impl HtmlSanitizer {
    /// Compiles the sanitizer patterns.
    pub fn new() -> AppResult<Self> {
        Ok(Self {
            hidden_blocks: compile(
                r#"(?is)<(?:style|script)\b(?:"[^"]*"|'[^']*'|[^'">])*>.*?</\s*(?:style|script)\s*>"#,
            )?,
            comments: compile(r"(?s)<!--.*?-->")?,
            // Quoted attribute values may contain `>`.
            tags: compile(r#"<(?:"[^"]*"|'[^']*'|[^'">])*>"#)?,
            numeric_entities: compile(r"&#([xX][0-9a-fA-F]{1,6}|[0-9]{1,7});")?,
            whitespace: compile(r"\s+")?,
        })
    }

    /// Returns the visible text of `html`.
    #[must_use]
    pub fn sanitize(&self, html: &str) -> String {
        let text = self.hidden_blocks.replace_all(html, " ");
        let text = self.comments.replace_all(&text, " ");
        let text = self.tags.replace_all(&text, " ");
        let text = decode_named_entities(&text);
        let text = self
            .numeric_entities
            .replace_all(&text, |captures: &Captures<'_>| decode_numeric(&captures[1]));

        self.whitespace.replace_all(&text, " ").trim().to_owned()
    }
}

fn compile(pattern: &str) -> AppResult<Regex> {
    Regex::new(pattern)
        .map_err(|error| AppError::Internal(format!("invalid sanitizer pattern: {error}")))
}

const NAMED_ENTITIES: [(&str, &str); 18] = [
    ("&nbsp;", " "),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&apos;", "'"),
    ("&ndash;", "–"),
    ("&mdash;", "—"),
    ("&aacute;", "á"),
    ("&eacute;", "é"),
    ("&iacute;", "í"),
    ("&oacute;", "ó"),
    ("&uacute;", "ú"),
    ("&atilde;", "ã"),
    ("&otilde;", "õ"),
    ("&acirc;", "â"),
    ("&ecirc;", "ê"),
    ("&ccedil;", "ç"),
    ("&amp;", "&"),
];

fn decode_named_entities(text: &str) -> String {
    // `&amp;` is last so "&amp;lt;" yields "&lt;" rather than "<".
    NAMED_ENTITIES
        .iter()
        .fold(text.to_owned(), |decoded, (entity, replacement)| {
            decoded.replace(entity, replacement)
        })
}

fn decode_numeric(value: &str) -> String {
    let code_point = match value.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => value.parse::<u32>().ok(),
    };

    code_point
        .and_then(char::from_u32)
        .map(String::from)
        .unwrap_or_else(|| " ".to_owned())
}
