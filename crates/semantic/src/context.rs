use gapfill_model::lexicon::{Complexity, Intent, Signals, Tone};
use gapfill_model::text::{strip_placeholders, token_set, top_keywords};
use gapfill_model::{clamp_unit, PlaceholderKind, Signal};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityLabel {
    Person,
    Organization,
    Place,
    Date,
    Product,
}

/// A named entity found by pattern
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,
    pub label: EntityLabel,
    /// Byte offsets into the text the entity was extracted from
    pub start: usize,
    pub end: usize,
}

const MONTHS: &str = "January|February|March|April|May|June|July|August|September|October|November|December|janeiro|fevereiro|março|abril|maio|junho|julho|agosto|setembro|outubro|novembro|dezembro";

static ENTITY_PATTERNS: Lazy<Vec<(EntityLabel, Regex)>> = Lazy::new(|| {
    let patterns = [
        (
            EntityLabel::Person,
            r"\b(?:Mr|Mrs|Ms|Dr|Prof|Sr|Sra)\.?\s[A-Z][a-zà-ú]+(?:\s[A-Z][a-zà-ú]+)?".to_string(),
        ),
        (
            EntityLabel::Organization,
            r"\b[A-Z][A-Za-z&]+(?:\s[A-Z][A-Za-z&]+)*\s(?:Inc|Corp|Ltd|LLC|Ltda|Group|Company|Institute|University)\b\.?"
                .to_string(),
        ),
        (
            EntityLabel::Date,
            format!(
                r"\b\d{{1,2}}/\d{{1,2}}/\d{{2,4}}\b|\b(?:{MONTHS})(?:\s\d{{1,2}})?(?:,?\s\d{{4}})?\b|\b(?:19|20)\d{{2}}\b"
            ),
        ),
        (
            EntityLabel::Product,
            r"\b[A-Z][a-zA-Z]+(?:\s[A-Z][a-zA-Z]+)?\s(?:Pro|Max|Plus|Mini|Ultra|\d{1,3})\b".to_string(),
        ),
        (
            EntityLabel::Place,
            r"\b(?:in|at|from|to|em|de|para)\s([A-Z][a-zà-ú]+(?:\s[A-Z][a-zà-ú]+)?)".to_string(),
        ),
    ];
    patterns
        .into_iter()
        .map(|(label, pattern)| {
            (
                label,
                Regex::new(&pattern).expect("valid entity regex"),
            )
        })
        .collect()
});

static MONTH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("^(?:{MONTHS})$")).expect("valid month regex"));

/// Pattern-based entities, earlier labels win on overlap
#[must_use]
pub fn extract_entities(text: &str) -> Vec<Entity> {
    let mut entities: Vec<Entity> = Vec::new();
    for (label, regex) in ENTITY_PATTERNS.iter() {
        for caps in regex.captures_iter(text) {
            let Some(m) = caps.get(1).or_else(|| caps.get(0)) else {
                continue;
            };
            if *label == EntityLabel::Place && MONTH_RE.is_match(m.as_str().split(' ').next().unwrap_or("")) {
                continue;
            }
            let overlaps = entities
                .iter()
                .any(|e| m.start() < e.end && e.start < m.end());
            if overlaps {
                continue;
            }
            entities.push(Entity {
                text: m.as_str().trim_end_matches('.').to_string(),
                label: *label,
                start: m.start(),
                end: m.end(),
            });
        }
    }
    entities.sort_by_key(|e| e.start);
    entities
}

/// Meaning of the text around one gap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticContext {
    /// Window prose with placeholders removed
    pub window_text: String,
    pub topic: Option<String>,
    pub intent: Intent,
    pub entities: Vec<Entity>,
    /// `[-1, 1]`
    pub sentiment: f32,
    pub keywords: Vec<String>,
    pub content_type: Option<String>,
    pub target_audience: Option<String>,
    pub tone: Tone,
    pub complexity: Complexity,
}

impl SemanticContext {
    /// Classify a window of text
    #[must_use]
    pub fn from_window(window: &str, keyword_limit: usize) -> Self {
        let prose = strip_placeholders(window);
        let window_text = gapfill_model::text::normalize_whitespace(&prose);
        let signals = Signals::new(&window_text);
        Self {
            topic: signals.topic().map(str::to_string),
            intent: signals.intent(),
            entities: extract_entities(&window_text),
            sentiment: signals.sentiment(),
            keywords: top_keywords(&window_text, keyword_limit),
            content_type: signals.content_type().map(str::to_string),
            target_audience: signals.audience().map(str::to_string),
            tone: signals.tone(),
            complexity: signals.complexity(),
            window_text,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.window_text.is_empty()
    }
}

/// Signals detected across a whole text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralContext {
    pub topics: Vec<String>,
    pub audiences: Vec<String>,
    pub intents: Vec<Intent>,
    pub content_types: Vec<String>,
    pub tone: Tone,
    pub complexity: Complexity,
    /// Content tokens of the prose, placeholders removed
    #[serde(skip)]
    pub vocabulary: std::collections::HashSet<String>,
}

impl GeneralContext {
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let prose = strip_placeholders(text);
        let signals = Signals::new(&prose);
        let to_strings = |labels: Vec<&'static str>| -> Vec<String> {
            labels.into_iter().map(str::to_string).collect()
        };
        Self {
            topics: to_strings(signals.topics()),
            audiences: to_strings(signals.audiences()),
            intents: signals.intents(),
            content_types: to_strings(signals.content_types()),
            tone: signals.tone(),
            complexity: signals.complexity(),
            vocabulary: token_set(&prose),
        }
    }

    /// Whether words of a placeholder name appear in the prose
    #[must_use]
    pub fn mentions_name(&self, name: &str) -> bool {
        name.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
            .filter(|part| part.chars().count() >= 3)
            .any(|part| self.vocabulary.contains(&part.to_lowercase()))
    }

    fn has_signal(&self, signal: Signal, name: &str) -> bool {
        match signal {
            Signal::Topic => !self.topics.is_empty(),
            Signal::Audience => !self.audiences.is_empty(),
            Signal::ContentType => !self.content_types.is_empty(),
            Signal::Tone => self.tone != Tone::Neutral,
            Signal::Complexity => self.complexity >= Complexity::Medium,
            Signal::NameInText => self.mentions_name(name),
        }
    }
}

/// Base score before any aligned signal
pub const RELEVANCE_BASE: f32 = 0.6;

/// Base 0.6 plus the weight of every relevance signal the context carries
#[must_use]
pub fn context_relevance(kind: PlaceholderKind, name: &str, context: &GeneralContext) -> f32 {
    let bonus: f32 = kind
        .profile()
        .relevance_signals
        .iter()
        .filter(|(signal, _)| context.has_signal(*signal, name))
        .map(|(_, weight)| weight)
        .sum();
    clamp_unit(RELEVANCE_BASE + bonus)
}

/// Base 0.6 plus the strongest aligned intent present
#[must_use]
pub fn intent_alignment(kind: PlaceholderKind, intents: &[Intent]) -> f32 {
    let bonus = kind
        .profile()
        .aligned_intents
        .iter()
        .filter(|(intent, _)| intents.contains(intent))
        .map(|(_, weight)| *weight)
        .fold(0.0f32, f32::max);
    clamp_unit(RELEVANCE_BASE + bonus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn entities_by_label() {
        let text = "Dr. Silva met Acme Corp in Lisbon on March 3, 2024 to launch the Galaxy Pro.";
        let labels: Vec<_> = extract_entities(text)
            .into_iter()
            .map(|e| (e.label, e.text))
            .collect();
        assert_eq!(
            labels,
            vec![
                (EntityLabel::Person, "Dr. Silva".to_string()),
                (EntityLabel::Organization, "Acme Corp".to_string()),
                (EntityLabel::Place, "Lisbon".to_string()),
                (EntityLabel::Date, "March 3, 2024".to_string()),
                (EntityLabel::Product, "Galaxy Pro".to_string()),
            ]
        );
    }

    #[test]
    fn window_context_strips_placeholders() {
        let context = SemanticContext::from_window(
            "Explain the digital marketing strategy for {target_audience} beginners",
            10,
        );
        assert!(!context.window_text.contains('{'));
        assert_eq!(context.topic.as_deref(), Some("marketing"));
        assert_eq!(context.intent, Intent::Inform);
        assert_eq!(context.target_audience.as_deref(), Some("beginners"));
        assert!(context.keywords.contains(&"marketing".to_string()));
    }

    #[test]
    fn relevance_adds_aligned_signals() {
        let general = GeneralContext::from_text("A marketing guide about {primary_keyword}");
        // topic 0.2 + content type 0.1 + "keyword" is not in the prose
        let relevance = context_relevance(PlaceholderKind::PrimaryKeyword, "primary_keyword", &general);
        assert!((relevance - 0.9).abs() < 1e-6);

        let bare = GeneralContext::from_text("{target_audience}");
        assert_eq!(
            context_relevance(PlaceholderKind::TargetAudience, "target_audience", &bare),
            RELEVANCE_BASE
        );
    }

    #[test]
    fn alignment_takes_strongest_intent() {
        let aligned = intent_alignment(
            PlaceholderKind::PrimaryKeyword,
            &[Intent::Compare, Intent::Inform],
        );
        assert!((aligned - 0.9).abs() < 1e-6);
        assert_eq!(intent_alignment(PlaceholderKind::Tone, &[]), RELEVANCE_BASE);
    }
}
