use regex::Regex;
use std::sync::LazyLock;

/// Placeholder spoken instead of a fenced code block
pub const DEFAULT_CODE_PLACEHOLDER: &str = "kode program";

static EMPHASIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*|__|~~|\*|_").expect("valid emphasis pattern"));
static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[\s\S]*?```").expect("valid code fence pattern"));
static INLINE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`]+)`").expect("valid inline code pattern"));
static CITATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[source\]|\[citation\]").expect("valid citation pattern"));
static SOURCE_NOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(source:.*?\)").expect("valid source note pattern"));
static PUNCTUATION_NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[*":#]+"#).expect("valid punctuation pattern"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

/// Normalizes assistant text so it can be spoken
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    code_placeholder: String,
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_CODE_PLACEHOLDER)
    }
}

impl TextNormalizer {
    /// Backticks are dropped from the placeholder so it can never form a new
    /// code span
    pub fn new(code_placeholder: impl Into<String>) -> Self {
        Self {
            code_placeholder: code_placeholder.into().replace('`', ""),
        }
    }

    /// Strip markup from `text`
    ///
    /// Passes are repeated until the output stops changing, so the result is
    /// a fixed point: normalizing it again returns it unchanged. A pass that
    /// changes the text either removes backticks or never grows the text, so
    /// the loop ends.
    pub fn normalize(&self, text: &str) -> String {
        let mut current = self.normalize_once(text);

        loop {
            let next = self.normalize_once(&current);
            if next == current {
                return current;
            }
            current = next;
        }
    }

    fn normalize_once(&self, text: &str) -> String {
        let text = EMPHASIS.replace_all(text, "");
        let text = CODE_FENCE.replace_all(&text, self.code_placeholder.as_str());
        let text = INLINE_CODE.replace_all(&text, "$1");

        let text = CITATION.replace_all(&text, "");
        let text = SOURCE_NOTE.replace_all(&text, "");

        let text = PUNCTUATION_NOISE.replace_all(&text, " ");
        let text = text.replace('\\', " ");

        let text = split_dotted_words(&text);

        WHITESPACE.replace_all(&text, " ").trim().to_string()
    }
}

/// Turn `word.word` into `word word` so domain-like tokens are read as words
///
/// Every dot with a word character on both sides is replaced, including
/// chains such as `a.b.c`.
fn split_dotted_words(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let is_word = |c: char| c.is_alphanumeric() || c == '_';

    chars
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let between_words = c == '.'
                && i > 0
                && i + 1 < chars.len()
                && is_word(chars[i - 1])
                && is_word(chars[i + 1]);
            if between_words {
                ' '
            } else {
                c
            }
        })
        .collect()
}
