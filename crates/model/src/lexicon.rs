//! Keyword bags used to classify prose around gaps.
//!
//! Single-word entries match whole tokens; entries containing a space or `-` match as
//! substrings of the lower-cased text. Tables are ordered: when a classifier takes the first
//! hit, table order decides.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::text::tokenize;

/// What the prose asks the writer to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Inform,
    Instruct,
    Persuade,
    Compare,
    Entertain,
    Unknown,
}

impl Intent {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inform => "inform",
            Self::Instruct => "instruct",
            Self::Persuade => "persuade",
            Self::Compare => "compare",
            Self::Entertain => "entertain",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Formal,
    Casual,
    Urgent,
    Neutral,
}

impl Tone {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Formal => "formal",
            Self::Casual => "casual",
            Self::Urgent => "urgent",
            Self::Neutral => "neutral",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl Complexity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

pub type Bag = &'static [&'static str];

pub const TOPICS: &[(&str, Bag)] = &[
    (
        "marketing",
        &[
            "marketing",
            "seo",
            "brand",
            "branding",
            "campaign",
            "advertising",
            "ads",
            "conversion",
            "funnel",
            "leads",
            "traffic",
            "engagement",
            "social media",
            "content marketing",
        ],
    ),
    (
        "technology",
        &[
            "technology",
            "software",
            "app",
            "ai",
            "artificial intelligence",
            "cloud",
            "programming",
            "code",
            "computer",
            "tech",
            "tecnologia",
            "data",
        ],
    ),
    (
        "health",
        &[
            "health",
            "fitness",
            "wellness",
            "nutrition",
            "diet",
            "exercise",
            "medical",
            "saúde",
            "saude",
            "sleep",
        ],
    ),
    (
        "finance",
        &[
            "finance",
            "money",
            "investment",
            "investing",
            "budget",
            "savings",
            "stocks",
            "credit",
            "finanças",
            "dinheiro",
            "investimento",
        ],
    ),
    (
        "education",
        &[
            "education",
            "learning",
            "course",
            "school",
            "teaching",
            "study",
            "training",
            "educação",
            "curso",
        ],
    ),
    (
        "food",
        &[
            "food",
            "recipe",
            "recipes",
            "cooking",
            "kitchen",
            "meal",
            "restaurant",
            "culinária",
            "receita",
            "comida",
        ],
    ),
    (
        "travel",
        &[
            "travel",
            "trip",
            "destination",
            "hotel",
            "tourism",
            "vacation",
            "viagem",
            "turismo",
        ],
    ),
    (
        "business",
        &[
            "business",
            "company",
            "startup",
            "entrepreneur",
            "management",
            "sales",
            "negócio",
            "empresa",
            "vendas",
        ],
    ),
    (
        "lifestyle",
        &["lifestyle", "home", "fashion", "beauty", "family", "style"],
    ),
];

pub const AUDIENCES: &[(&str, Bag)] = &[
    (
        "beginners",
        &[
            "beginner",
            "beginners",
            "newbie",
            "novice",
            "iniciante",
            "iniciantes",
            "first-time",
        ],
    ),
    (
        "professionals",
        &[
            "professional",
            "professionals",
            "expert",
            "experts",
            "specialist",
            "specialists",
            "profissional",
            "profissionais",
        ],
    ),
    (
        "students",
        &["student", "students", "learner", "learners", "estudante", "estudantes"],
    ),
    (
        "business owners",
        &[
            "business owner",
            "business owners",
            "entrepreneurs",
            "small business",
            "empresários",
            "founders",
        ],
    ),
    (
        "developers",
        &["developer", "developers", "programmer", "programmers", "engineers"],
    ),
    ("marketers", &["marketer", "marketers", "marketing team"]),
    ("parents", &["parent", "parents", "mothers", "fathers", "pais"]),
    (
        "general audience",
        &["everyone", "general public", "público geral", "anyone"],
    ),
];

pub const CONTENT_TYPES: &[(&str, Bag)] = &[
    ("blog_post", &["blog", "blog post", "post"]),
    ("article", &["article", "artigo"]),
    ("guide", &["guide", "guia", "how to", "how-to", "handbook"]),
    (
        "tutorial",
        &["tutorial", "step by step", "passo a passo", "walkthrough"],
    ),
    ("review", &["review", "análise", "avaliação", "comparison"]),
    ("listicle", &["top 10", "checklist", "lista", "list of"]),
    ("newsletter", &["newsletter", "email"]),
    (
        "social_post",
        &["tweet", "instagram", "linkedin", "facebook", "social post", "caption"],
    ),
    (
        "landing_page",
        &["landing page", "sales page", "página de vendas"],
    ),
    (
        "product_description",
        &["product description", "descrição do produto"],
    ),
];

/// Evaluation order matters: ties go to the earlier intent
pub const INTENTS: &[(Intent, Bag)] = &[
    (
        Intent::Instruct,
        &[
            "teach", "guide", "show", "how to", "steps", "tutorial", "learn", "ensine", "mostre",
        ],
    ),
    (
        Intent::Persuade,
        &[
            "buy",
            "convince",
            "sell",
            "promote",
            "recommend",
            "persuade",
            "convert",
            "subscribe",
            "venda",
            "compre",
            "convença",
        ],
    ),
    (
        Intent::Compare,
        &[
            "compare",
            "versus",
            "vs",
            "difference",
            "differences",
            "contrast",
            "comparar",
        ],
    ),
    (
        Intent::Entertain,
        &["story", "fun", "entertain", "joke", "humor", "história", "divertido"],
    ),
    (
        Intent::Inform,
        &[
            "write", "explain", "describe", "inform", "discuss", "present", "cover", "escreva",
            "escrever", "explique", "descreva",
        ],
    ),
];

pub const FORMAL_MARKERS: Bag = &[
    "therefore",
    "furthermore",
    "moreover",
    "regarding",
    "hereby",
    "pursuant",
    "consequently",
    "formal",
    "prezado",
    "portanto",
    "ademais",
    "outrossim",
];

pub const CASUAL_MARKERS: Bag = &[
    "hey",
    "cool",
    "awesome",
    "gonna",
    "wanna",
    "stuff",
    "guys",
    "casual",
    "lol",
    "yeah",
    "vc",
    "tipo",
    "galera",
];

pub const URGENT_MARKERS: Bag = &[
    "urgent",
    "immediately",
    "asap",
    "hurry",
    "now",
    "limited time",
    "deadline",
    "urgente",
    "agora",
    "imediatamente",
];

pub const POSITIVE_WORDS: Bag = &[
    "good",
    "great",
    "excellent",
    "best",
    "amazing",
    "love",
    "happy",
    "success",
    "successful",
    "benefit",
    "benefits",
    "improve",
    "easy",
    "effective",
    "positive",
    "win",
    "bom",
    "ótimo",
    "excelente",
    "melhor",
    "sucesso",
    "fácil",
];

pub const NEGATIVE_WORDS: Bag = &[
    "bad",
    "poor",
    "worst",
    "problem",
    "problems",
    "fail",
    "failure",
    "hard",
    "difficult",
    "risk",
    "negative",
    "mistake",
    "mistakes",
    "hate",
    "ruim",
    "pior",
    "problema",
    "difícil",
    "erro",
    "risco",
];

/// Verbs that leave a sentence unfinished when they close it
pub const ACTION_VERBS: Bag = &[
    "write", "create", "describe", "explain", "include", "use", "add", "mention", "list",
    "discuss", "cover", "target", "escreva", "crie", "descreva", "explique", "inclua", "adicione",
    "mencione",
];

pub const PREPOSITIONS: Bag = &[
    "about", "for", "with", "on", "to", "of", "in", "into", "regarding", "sobre", "para", "com",
    "de", "em", "por",
];

/// Demonstratives and pronouns that need an antecedent
pub const REFERENCE_TERMS: Bag = &[
    "this", "that", "these", "those", "it", "they", "isso", "isto", "este", "esta", "esse", "essa",
    "aquilo",
];

/// Topic → audiences typically written for
pub const TOPIC_AUDIENCES: &[(&str, Bag)] = &[
    (
        "marketing",
        &["marketing professionals", "small business owners", "entrepreneurs"],
    ),
    ("technology", &["developers", "tech enthusiasts", "it professionals"]),
    ("health", &["health-conscious adults", "fitness beginners"]),
    ("finance", &["young professionals", "first-time investors"]),
    ("education", &["students", "teachers", "lifelong learners"]),
    ("food", &["home cooks", "food lovers"]),
    ("travel", &["travelers", "families planning vacations"]),
    ("business", &["entrepreneurs", "managers", "small business owners"]),
    ("lifestyle", &["young adults", "families"]),
];

/// Topic → tone usually expected
pub const TOPIC_TONES: &[(&str, &str)] = &[
    ("marketing", "persuasive"),
    ("technology", "technical"),
    ("health", "friendly"),
    ("finance", "professional"),
    ("education", "friendly"),
    ("food", "conversational"),
    ("travel", "inspirational"),
    ("business", "professional"),
    ("lifestyle", "casual"),
];

/// Topic → content types usually produced
pub const TOPIC_CONTENT_TYPES: &[(&str, Bag)] = &[
    ("marketing", &["blog_post", "guide", "landing_page"]),
    ("technology", &["tutorial", "guide", "article"]),
    ("health", &["article", "guide"]),
    ("finance", &["guide", "article"]),
    ("education", &["tutorial", "guide"]),
    ("food", &["blog_post", "listicle"]),
    ("travel", &["blog_post", "listicle", "guide"]),
    ("business", &["article", "guide"]),
    ("lifestyle", &["blog_post", "listicle"]),
];

/// Look up a bag by label in one of the tables above
#[must_use]
pub fn lookup(table: &[(&'static str, Bag)], label: &str) -> Option<Bag> {
    table
        .iter()
        .find(|(name, _)| *name == label)
        .map(|(_, bag)| *bag)
}

#[must_use]
pub fn topic_tone(topic: &str) -> Option<&'static str> {
    TOPIC_TONES
        .iter()
        .find(|(name, _)| *name == topic)
        .map(|(_, tone)| *tone)
}

/// Tokenized view of a text with bag-matching classifiers
#[derive(Debug, Clone)]
pub struct Signals {
    tokens: Vec<String>,
    token_set: HashSet<String>,
    lowered: String,
}

impl Signals {
    pub fn new(text: &str) -> Self {
        let tokens = tokenize(text);
        let token_set = tokens.iter().cloned().collect();
        Self {
            tokens,
            token_set,
            lowered: text.to_lowercase(),
        }
    }

    #[must_use]
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Number of distinct bag entries present in the text
    #[must_use]
    pub fn bag_hits(&self, bag: &[&str]) -> usize {
        bag.iter()
            .filter(|entry| {
                if entry.contains(' ') || entry.contains('-') {
                    self.lowered.contains(*entry)
                } else {
                    self.token_set.contains(**entry)
                }
            })
            .count()
    }

    /// Occurrences (with repeats) of single-word bag entries
    #[must_use]
    pub fn bag_occurrences(&self, bag: &[&str]) -> usize {
        self.tokens
            .iter()
            .filter(|token| bag.contains(&token.as_str()))
            .count()
    }

    fn first_label(&self, table: &[(&'static str, Bag)]) -> Option<&'static str> {
        table
            .iter()
            .find(|(_, bag)| self.bag_hits(bag) > 0)
            .map(|(label, _)| *label)
    }

    fn all_labels(&self, table: &[(&'static str, Bag)]) -> Vec<&'static str> {
        table
            .iter()
            .filter(|(_, bag)| self.bag_hits(bag) > 0)
            .map(|(label, _)| *label)
            .collect()
    }

    /// First topic (table order) with at least one keyword hit
    #[must_use]
    pub fn topic(&self) -> Option<&'static str> {
        self.first_label(TOPICS)
    }

    #[must_use]
    pub fn topics(&self) -> Vec<&'static str> {
        self.all_labels(TOPICS)
    }

    #[must_use]
    pub fn audience(&self) -> Option<&'static str> {
        self.first_label(AUDIENCES)
    }

    #[must_use]
    pub fn audiences(&self) -> Vec<&'static str> {
        self.all_labels(AUDIENCES)
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&'static str> {
        self.first_label(CONTENT_TYPES)
    }

    #[must_use]
    pub fn content_types(&self) -> Vec<&'static str> {
        self.all_labels(CONTENT_TYPES)
    }

    /// Intent with the most verb hits; ties go to the earlier table entry
    #[must_use]
    pub fn intent(&self) -> Intent {
        let mut best = (Intent::Unknown, 0usize);
        for (intent, bag) in INTENTS {
            let hits = self.bag_hits(bag);
            if hits > best.1 {
                best = (*intent, hits);
            }
        }
        best.0
    }

    #[must_use]
    pub fn intents(&self) -> Vec<Intent> {
        INTENTS
            .iter()
            .filter(|(_, bag)| self.bag_hits(bag) > 0)
            .map(|(intent, _)| *intent)
            .collect()
    }

    /// Urgent beats formal beats casual; no markers means neutral
    #[must_use]
    pub fn tone(&self) -> Tone {
        let urgent = self.bag_hits(URGENT_MARKERS);
        let formal = self.bag_hits(FORMAL_MARKERS);
        let casual = self.bag_hits(CASUAL_MARKERS);
        if urgent == 0 && formal == 0 && casual == 0 {
            return Tone::Neutral;
        }
        if urgent >= formal && urgent >= casual {
            Tone::Urgent
        } else if formal >= casual {
            Tone::Formal
        } else {
            Tone::Casual
        }
    }

    /// Mean token length: >8 high, >6 medium, otherwise low
    #[must_use]
    pub fn complexity(&self) -> Complexity {
        if self.tokens.is_empty() {
            return Complexity::Low;
        }
        let total: usize = self.tokens.iter().map(|t| t.chars().count()).sum();
        let mean = total as f32 / self.tokens.len() as f32;
        if mean > 8.0 {
            Complexity::High
        } else if mean > 6.0 {
            Complexity::Medium
        } else {
            Complexity::Low
        }
    }

    /// Polarity count normalized by token count, in `[-1, 1]`
    #[must_use]
    pub fn sentiment(&self) -> f32 {
        if self.tokens.is_empty() {
            return 0.0;
        }
        let positive = self.bag_occurrences(POSITIVE_WORDS) as f32;
        let negative = self.bag_occurrences(NEGATIVE_WORDS) as f32;
        ((positive - negative) / self.tokens.len() as f32).clamp(-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_takes_first_table_hit() {
        let signals = Signals::new("A digital marketing strategy for software companies");
        assert_eq!(signals.topic(), Some("marketing"));
        assert_eq!(signals.topics(), vec!["marketing", "technology"]);
    }

    #[test]
    fn multiword_entries_match_as_substrings() {
        let signals = Signals::new("Create a step by step walkthrough");
        assert_eq!(signals.content_type(), Some("tutorial"));
        let signals = Signals::new("This guide is for small business owners");
        assert_eq!(signals.audience(), Some("business owners"));
    }

    #[test]
    fn intent_prefers_most_hits() {
        assert_eq!(
            Signals::new("Compare plan A versus plan B and explain").intent(),
            Intent::Compare
        );
        assert_eq!(Signals::new("Write and describe it").intent(), Intent::Inform);
        assert_eq!(Signals::new("Nothing here").intent(), Intent::Unknown);
    }

    #[test]
    fn tone_precedence() {
        assert_eq!(Signals::new("Act now, this is urgent").tone(), Tone::Urgent);
        assert_eq!(Signals::new("Therefore, regarding the matter").tone(), Tone::Formal);
        assert_eq!(Signals::new("hey guys, cool stuff").tone(), Tone::Casual);
        assert_eq!(Signals::new("plain words").tone(), Tone::Neutral);
    }

    #[test]
    fn complexity_thresholds() {
        assert_eq!(Signals::new("a cat sat").complexity(), Complexity::Low);
        assert_eq!(
            Signals::new("internationalization considerations").complexity(),
            Complexity::High
        );
        assert_eq!(Signals::new("marketing content").complexity(), Complexity::Medium);
    }

    #[test]
    fn sentiment_is_bounded() {
        let positive = Signals::new("great excellent amazing").sentiment();
        assert!((positive - 1.0).abs() < f32::EPSILON);
        let negative = Signals::new("bad problem here today").sentiment();
        assert!(negative < 0.0 && negative >= -1.0);
        assert_eq!(Signals::new("").sentiment(), 0.0);
    }
}
