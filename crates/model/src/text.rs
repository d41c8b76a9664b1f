//! Text helpers shared by every stage: tokenizing, windows and similarity measures.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use unicode_segmentation::UnicodeSegmentation;

use crate::types::Span;

pub const STOPWORDS: &[&str] = &[
    // English
    "a", "an", "the", "and", "or", "but", "if", "then", "else", "of", "to", "in", "on", "for",
    "with", "about", "as", "at", "by", "from", "into", "is", "are", "was", "were", "be", "been",
    "being", "it", "its", "this", "that", "these", "those", "i", "you", "he", "she", "we", "they",
    "me", "him", "her", "us", "them", "my", "your", "our", "their", "what", "which", "who", "whom",
    "do", "does", "did", "have", "has", "had", "will", "would", "should", "can", "could", "may",
    "might", "must", "not", "no", "so", "than", "too", "very", "just", "also", "all", "any",
    "each", "more", "most", "some", "such", "only", "own", "same", "other", "there", "here",
    "when", "where", "why", "how", "up", "down", "out", "over", "under", "again", "once",
    // Portuguese
    "o", "os", "as", "um", "uma", "uns", "umas", "de", "do", "da", "dos", "das", "em", "no", "na",
    "nos", "nas", "por", "para", "com", "sem", "sobre", "que", "e", "ou", "mas", "se", "ao",
    "aos", "à", "às", "é", "são", "foi", "ser", "seu", "sua", "seus", "suas", "ele", "ela",
    "eles", "elas", "isso", "isto", "este", "esta", "esse", "essa", "mais", "muito", "como",
    "quando", "onde", "já", "também", "não",
];

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{[^{}]*\}").expect("valid placeholder regex"));

static WHITESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

#[must_use]
pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

/// Lower-cased Unicode words, in order
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.unicode_words().map(str::to_lowercase).collect()
}

/// Tokens worth comparing: no stopwords, no pure numbers, at least two chars
#[must_use]
pub fn content_tokens(text: &str) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|t| {
            t.chars().count() >= 2 && !is_stopword(t) && !t.chars().all(|c| c.is_ascii_digit())
        })
        .collect()
}

#[must_use]
pub fn token_set(text: &str) -> HashSet<String> {
    content_tokens(text).into_iter().collect()
}

/// Replace `{name}` placeholders with a single space
#[must_use]
pub fn strip_placeholders(text: &str) -> String {
    PLACEHOLDER_RE.replace_all(text, " ").into_owned()
}

/// Collapse whitespace runs to one space and trim the ends
#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text, " ").trim().to_string()
}

fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text, " ").into_owned()
}

/// Most frequent content tokens; ties keep first-occurrence order
#[must_use]
pub fn top_keywords(text: &str, limit: usize) -> Vec<String> {
    let tokens = content_tokens(text);
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (idx, token) in tokens.iter().enumerate() {
        if token.chars().count() < 3 {
            continue;
        }
        counts.entry(token.as_str()).or_insert((0, idx)).0 += 1;
    }
    let mut ranked: Vec<(&str, usize, usize)> = counts
        .into_iter()
        .map(|(token, (count, first))| (token, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(token, _, _)| token.to_string())
        .collect()
}

/// Jaccard index of two sets; two empty sets score 0
#[must_use]
pub fn jaccard<T: Eq + Hash>(a: &HashSet<T>, b: &HashSet<T>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f32 / union as f32
}

/// Sørensen–Dice coefficient over character bigrams
#[must_use]
pub fn bigram_similarity(a: &str, b: &str) -> f32 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    if a == b {
        return if a.is_empty() { 0.0 } else { 1.0 };
    }
    let bigrams = |s: &str| -> Vec<(char, char)> {
        let chars: Vec<char> = s.chars().collect();
        chars.windows(2).map(|w| (w[0], w[1])).collect()
    };
    let left = bigrams(&a);
    let right = bigrams(&b);
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let mut pool = right.clone();
    let mut shared = 0usize;
    for pair in &left {
        if let Some(pos) = pool.iter().position(|p| p == pair) {
            pool.swap_remove(pos);
            shared += 1;
        }
    }
    (2 * shared) as f32 / (left.len() + right.len()) as f32
}

/// Largest char boundary `<= idx`
#[must_use]
pub fn floor_char_boundary(text: &str, idx: usize) -> usize {
    let mut idx = idx.min(text.len());
    while !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Smallest char boundary `>= idx`
#[must_use]
pub fn ceil_char_boundary(text: &str, idx: usize) -> usize {
    let mut idx = idx.min(text.len());
    while !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

/// Byte range covering `radius` chars on each side of `span`
#[must_use]
pub fn window_bounds(text: &str, span: Span, radius: usize) -> (usize, usize) {
    let start = floor_char_boundary(text, span.start);
    let end = ceil_char_boundary(text, span.end);
    let window_start = text[..start]
        .char_indices()
        .rev()
        .nth(radius.saturating_sub(1))
        .map_or(0, |(idx, _)| idx);
    let window_end = if radius == 0 {
        end
    } else {
        text[end..]
            .char_indices()
            .nth(radius)
            .map_or(text.len(), |(idx, _)| end + idx)
    };
    (if radius == 0 { start } else { window_start }, window_end)
}

/// Text of the window around `span`, whitespace-normalized
#[must_use]
pub fn window_text(text: &str, span: Span, radius: usize) -> String {
    let (start, end) = window_bounds(text, span, radius);
    normalize_whitespace(&text[start..end])
}

/// Whitespace-normalized excerpt of at most `max_chars` chars, centred on `span`
#[must_use]
pub fn centered_excerpt(text: &str, span: Span, radius: usize, max_chars: usize) -> String {
    let (ws, we) = window_bounds(text, span, radius);
    let start = floor_char_boundary(text, span.start).max(ws);
    let end = ceil_char_boundary(text, span.end).min(we).max(start);

    let middle: String = text[start..end].chars().take(max_chars).collect();
    let left = collapse_whitespace(&text[ws..start]);
    let right = collapse_whitespace(&text[end..we]);

    let budget = max_chars.saturating_sub(middle.chars().count());
    let left_len = left.chars().count();
    let right_len = right.chars().count();
    let mut take_left = left_len.min(budget / 2);
    let take_right = right_len.min(budget - take_left);
    take_left = left_len.min(budget - take_right);

    let left_tail: String = left.chars().skip(left_len - take_left).collect();
    let right_head: String = right.chars().take(take_right).collect();
    let joined = format!("{left_tail}{middle}{right_head}");
    let trimmed = joined.trim();
    trimmed.chars().take(max_chars).collect()
}

/// Hex SHA-256 of the text, used as cache key
#[must_use]
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A sentence with its byte range and paragraph position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence<'a> {
    pub text: &'a str,
    pub start: usize,
    pub end: usize,
    pub paragraph: usize,
    /// Position of the sentence inside its paragraph
    pub index: usize,
}

impl Sentence<'_> {
    #[must_use]
    pub fn opens_paragraph(&self) -> bool {
        self.index == 0
    }
}

/// Split on `.`, `!`, `?` and line breaks; blank lines start a new paragraph
#[must_use]
pub fn split_sentences(text: &str) -> Vec<Sentence<'_>> {
    let mut sentences = Vec::new();
    let mut paragraph = 0usize;
    let mut index = 0usize;
    let mut seg_start = 0usize;
    let mut newline_run = 0usize;

    let mut push = |from: usize, to: usize, paragraph: usize, index: &mut usize| {
        let raw = &text[from..to];
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return;
        }
        let offset = raw.len() - raw.trim_start().len();
        let start = from + offset;
        sentences.push(Sentence {
            text: trimmed,
            start,
            end: start + trimmed.len(),
            paragraph,
            index: *index,
        });
        *index += 1;
    };

    for (idx, ch) in text.char_indices() {
        match ch {
            '.' | '!' | '?' => {
                let to = idx + ch.len_utf8();
                push(seg_start, to, paragraph, &mut index);
                seg_start = to;
                newline_run = 0;
            }
            '\n' => {
                push(seg_start, idx, paragraph, &mut index);
                seg_start = idx + 1;
                newline_run += 1;
                if newline_run == 2 {
                    paragraph += 1;
                    index = 0;
                }
            }
            c if c.is_whitespace() => {}
            _ => newline_run = 0,
        }
    }
    push(seg_start, text.len(), paragraph, &mut index);
    sentences
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn keywords_drop_stopwords_and_rank_by_frequency() {
        let keywords = top_keywords("The marketing plan and the marketing budget for SEO", 3);
        assert_eq!(keywords, vec!["marketing", "plan", "budget"]);
    }

    #[test]
    fn strip_placeholders_leaves_prose() {
        assert_eq!(
            normalize_whitespace(&strip_placeholders("Write about {primary_keyword} now")),
            "Write about now"
        );
    }

    #[test]
    fn jaccard_and_dice() {
        let a: HashSet<&str> = ["seo", "marketing"].into_iter().collect();
        let b: HashSet<&str> = ["marketing", "digital"].into_iter().collect();
        assert!((jaccard(&a, &b) - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(bigram_similarity("night", "night"), 1.0);
        assert!(bigram_similarity("night", "nacht") < 0.5);
        assert_eq!(bigram_similarity("a", "b"), 0.0);
    }

    #[test]
    fn window_respects_char_boundaries() {
        let text = "ação {tone} é ótimo";
        let span = Span::new(7, 13).unwrap_or(Span { start: 7, end: 13 });
        assert_eq!(&text[span.start..span.end], "{tone}");
        let (start, end) = window_bounds(text, span, 3);
        assert!(text.is_char_boundary(start) && text.is_char_boundary(end));
        assert_eq!(&text[start..end], "ão {tone} é ");
    }

    #[test]
    fn excerpt_is_bounded_and_contains_placeholder() {
        let text = format!("{} {{tone}} {}", "left ".repeat(100), "right ".repeat(100));
        let start = text.find("{tone}").unwrap_or(0);
        let span = Span {
            start,
            end: start + 6,
        };
        let excerpt = centered_excerpt(&text, span, 150, 200);
        assert!(excerpt.chars().count() <= 200);
        assert!(excerpt.contains("{tone}"));
    }

    #[test]
    fn sentences_track_paragraphs() {
        let text = "First one. Second one!\n\nThird para? yes";
        let sentences = split_sentences(text);
        let texts: Vec<_> = sentences.iter().map(|s| s.text).collect();
        assert_eq!(texts, vec!["First one.", "Second one!", "Third para?", "yes"]);
        assert_eq!(sentences[2].paragraph, 1);
        assert!(sentences[2].opens_paragraph());
        assert_eq!(&text[sentences[1].start..sentences[1].end], "Second one!");
    }

    #[test]
    fn content_hash_is_stable_hex() {
        let hash = content_hash("abc");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, content_hash("abc"));
        assert_ne!(hash, content_hash("abd"));
    }

    proptest::proptest! {
        #[test]
        fn excerpt_never_exceeds_limit(
            prefix in "[a-zà-ú \n]{0,400}",
            suffix in "[a-zà-ú \n]{0,400}",
            max in 20usize..250,
        ) {
            let text = format!("{prefix}{{name}}{suffix}");
            let span = Span { start: prefix.len(), end: prefix.len() + 6 };
            let excerpt = centered_excerpt(&text, span, 150, max);
            proptest::prop_assert!(excerpt.chars().count() <= max);
            let (start, end) = window_bounds(&text, span, 150);
            proptest::prop_assert!(text.is_char_boundary(start) && text.is_char_boundary(end));
            proptest::prop_assert!(start <= span.start && end >= span.end);
        }
    }
}
