use serde::{Deserialize, Serialize};
use std::fmt;

use crate::lexicon::Intent;

/// Kind of placeholder a gap stands for.
///
/// Every component resolves kind-specific behaviour through [`KindProfile`] instead of
/// inspecting placeholder names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderKind {
    PrimaryKeyword,
    SecondaryKeywords,
    ClusterId,
    ClusterName,
    Categoria,
    ContentType,
    Tone,
    Length,
    TargetAudience,
    Niche,
    Custom,
}

impl PlaceholderKind {
    pub const ALL: [Self; 11] = [
        Self::PrimaryKeyword,
        Self::SecondaryKeywords,
        Self::ClusterId,
        Self::ClusterName,
        Self::Categoria,
        Self::ContentType,
        Self::Tone,
        Self::Length,
        Self::TargetAudience,
        Self::Niche,
        Self::Custom,
    ];

    /// Kinds with a canonical placeholder name (everything but `Custom`)
    pub fn canonical() -> impl Iterator<Item = Self> {
        Self::ALL.into_iter().filter(|kind| *kind != Self::Custom)
    }

    /// Resolve a placeholder name (`primary_keyword`) to its kind; unknown names are `Custom`
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        let normalized = name.trim().to_ascii_lowercase().replace('-', "_");
        Self::canonical()
            .find(|kind| kind.profile().canonical_name == normalized)
            .unwrap_or(Self::Custom)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.profile().canonical_name
    }

    #[must_use]
    pub fn profile(self) -> &'static KindProfile {
        match self {
            Self::PrimaryKeyword => &PRIMARY_KEYWORD,
            Self::SecondaryKeywords => &SECONDARY_KEYWORDS,
            Self::ClusterId => &CLUSTER_ID,
            Self::ClusterName => &CLUSTER_NAME,
            Self::Categoria => &CATEGORIA,
            Self::ContentType => &CONTENT_TYPE,
            Self::Tone => &TONE,
            Self::Length => &LENGTH,
            Self::TargetAudience => &TARGET_AUDIENCE,
            Self::Niche => &NICHE,
            Self::Custom => &CUSTOM,
        }
    }

    /// Default validation rules, in evaluation order
    #[must_use]
    pub fn default_rules(self) -> Vec<RuleSpec> {
        match self {
            Self::PrimaryKeyword => vec![
                RuleSpec::Required,
                RuleSpec::Length { min: 2, max: 100 },
                RuleSpec::NoSpecialCharacters,
                RuleSpec::CommaSeparated {
                    min_items: 1,
                    max_items: 1,
                },
            ],
            Self::SecondaryKeywords => vec![
                RuleSpec::Required,
                RuleSpec::Length { min: 2, max: 500 },
                RuleSpec::CommaSeparated {
                    min_items: 2,
                    max_items: 10,
                },
            ],
            Self::ClusterId => vec![
                RuleSpec::Required,
                RuleSpec::Format {
                    pattern: r"^[A-Za-z0-9_-]{1,50}$".to_string(),
                    description: "letters, digits, '-' or '_' (max 50)".to_string(),
                },
                RuleSpec::NumericRange {
                    min: 1.0,
                    max: 1_000_000.0,
                },
                RuleSpec::NumericReasonable,
            ],
            Self::ClusterName => vec![
                RuleSpec::Required,
                RuleSpec::Length { min: 2, max: 100 },
                RuleSpec::NoSpecialCharacters,
            ],
            Self::Categoria => vec![
                RuleSpec::Required,
                RuleSpec::Length { min: 2, max: 60 },
                RuleSpec::NoSpecialCharacters,
            ],
            Self::ContentType => vec![
                RuleSpec::Required,
                RuleSpec::Length { min: 3, max: 40 },
                RuleSpec::one_of(CONTENT_TYPE_VALUES, false, false),
            ],
            Self::Tone => vec![
                RuleSpec::Required,
                RuleSpec::Length { min: 3, max: 30 },
                RuleSpec::one_of(TONE_VALUES, false, false),
            ],
            Self::Length => vec![
                RuleSpec::Required,
                RuleSpec::one_of(LENGTH_VALUES, true, true),
                RuleSpec::NumericRange {
                    min: 100.0,
                    max: 10_000.0,
                },
                RuleSpec::NumericReasonable,
            ],
            Self::TargetAudience => vec![
                RuleSpec::Required,
                RuleSpec::Length { min: 3, max: 150 },
                RuleSpec::NoSpecialCharacters,
            ],
            Self::Niche => vec![
                RuleSpec::Required,
                RuleSpec::Length { min: 2, max: 80 },
                RuleSpec::NoSpecialCharacters,
            ],
            Self::Custom => vec![RuleSpec::Required, RuleSpec::Length { min: 1, max: 500 }],
        }
    }
}

impl fmt::Display for PlaceholderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contextual signal a kind draws relevance from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Topic,
    Audience,
    ContentType,
    Tone,
    Complexity,
    /// Words of the placeholder name appear in the prose
    NameInText,
}

/// Static per-kind behaviour table
#[derive(Debug)]
pub struct KindProfile {
    pub kind: PlaceholderKind,
    pub canonical_name: &'static str,
    /// Legacy spellings accepted by the unifier (upper-case, as written in `[NAME]`)
    pub legacy_aliases: &'static [&'static str],
    /// Legacy spellings that still migrate but are reported as deprecated
    pub deprecated_aliases: &'static [&'static str],
    /// Must be present in every template
    pub required: bool,
    pub base_confidence: f32,
    /// "Most common" values, best first
    pub fallback_pool: &'static [&'static str],
    /// Last-resort value when every fallback strategy is empty
    pub generic_token: &'static str,
    pub relevance_signals: &'static [(Signal, f32)],
    pub aligned_intents: &'static [(Intent, f32)],
    /// Filled with keyword-like values (topic words)
    pub keyword_like: bool,
    /// Filled with an audience description
    pub audience_like: bool,
    /// Unifier substitution priority; higher runs first
    pub priority: u8,
}

/// Declarative validation rule; compiled by the basic validator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum RuleSpec {
    Required,
    Length {
        min: usize,
        max: usize,
    },
    Format {
        pattern: String,
        description: String,
    },
    OneOf {
        values: Vec<String>,
        /// Numbers are accepted in addition to the listed values
        allow_numeric: bool,
        blocking: bool,
    },
    NumericRange {
        min: f64,
        max: f64,
    },
    CommaSeparated {
        min_items: usize,
        max_items: usize,
    },
    NoSpecialCharacters,
    NumericReasonable,
}

impl RuleSpec {
    fn one_of(values: &[&str], allow_numeric: bool, blocking: bool) -> Self {
        Self::OneOf {
            values: values.iter().map(|v| (*v).to_string()).collect(),
            allow_numeric,
            blocking,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Length { .. } => "length",
            Self::Format { .. } => "format",
            Self::OneOf { .. } => "one_of",
            Self::NumericRange { .. } => "numeric_range",
            Self::CommaSeparated { .. } => "comma_separated",
            Self::NoSpecialCharacters => "no_special_characters",
            Self::NumericReasonable => "numeric_reasonable",
        }
    }
}

pub const CONTENT_TYPE_VALUES: &[&str] = &[
    "article",
    "blog_post",
    "guide",
    "tutorial",
    "review",
    "listicle",
    "newsletter",
    "social_post",
    "landing_page",
    "product_description",
    "artigo",
    "post",
];

pub const TONE_VALUES: &[&str] = &[
    "formal",
    "informal",
    "casual",
    "professional",
    "friendly",
    "neutral",
    "urgent",
    "persuasive",
    "technical",
    "conversational",
    "inspirational",
];

pub const LENGTH_VALUES: &[&str] = &["short", "medium", "long", "curto", "medio", "longo"];

const KEYWORD_SIGNALS: &[(Signal, f32)] = &[
    (Signal::Topic, 0.2),
    (Signal::ContentType, 0.1),
    (Signal::NameInText, 0.1),
];

const KEYWORD_INTENTS: &[(Intent, f32)] = &[
    (Intent::Inform, 0.3),
    (Intent::Instruct, 0.3),
    (Intent::Compare, 0.2),
    (Intent::Persuade, 0.2),
];

static PRIMARY_KEYWORD: KindProfile = KindProfile {
    kind: PlaceholderKind::PrimaryKeyword,
    canonical_name: "primary_keyword",
    legacy_aliases: &["PALAVRA-CHAVE", "PALAVRA_CHAVE", "PRIMARY_KEYWORD", "KEYWORD"],
    deprecated_aliases: &["KEYWORD"],
    required: true,
    base_confidence: 0.98,
    fallback_pool: &[
        "marketing digital",
        "seo",
        "content strategy",
        "social media",
        "email marketing",
    ],
    generic_token: "palavra-chave",
    relevance_signals: KEYWORD_SIGNALS,
    aligned_intents: KEYWORD_INTENTS,
    keyword_like: true,
    audience_like: false,
    priority: 100,
};

static SECONDARY_KEYWORDS: KindProfile = KindProfile {
    kind: PlaceholderKind::SecondaryKeywords,
    canonical_name: "secondary_keywords",
    legacy_aliases: &[
        "PALAVRAS-SECUNDARIAS",
        "PALAVRAS_SECUNDARIAS",
        "SECONDARY_KEYWORDS",
        "KEYWORDS",
    ],
    deprecated_aliases: &["KEYWORDS"],
    required: false,
    base_confidence: 0.95,
    fallback_pool: &[
        "seo, content marketing, organic traffic",
        "social media, engagement, reach",
        "conversion, leads, sales funnel",
    ],
    generic_token: "palavras-chave",
    relevance_signals: KEYWORD_SIGNALS,
    aligned_intents: KEYWORD_INTENTS,
    keyword_like: true,
    audience_like: false,
    priority: 95,
};

static CLUSTER_ID: KindProfile = KindProfile {
    kind: PlaceholderKind::ClusterId,
    canonical_name: "cluster_id",
    legacy_aliases: &["CLUSTER_ID", "CLUSTER-ID", "ID_CLUSTER"],
    deprecated_aliases: &["ID_CLUSTER"],
    required: false,
    base_confidence: 0.97,
    fallback_pool: &["cluster-001", "cluster-002", "cluster-003"],
    generic_token: "cluster-000",
    relevance_signals: &[(Signal::Topic, 0.1)],
    aligned_intents: &[(Intent::Inform, 0.2)],
    keyword_like: false,
    audience_like: false,
    priority: 90,
};

static CLUSTER_NAME: KindProfile = KindProfile {
    kind: PlaceholderKind::ClusterName,
    canonical_name: "cluster_name",
    legacy_aliases: &["CLUSTER", "CLUSTER_NAME", "NOME_CLUSTER"],
    deprecated_aliases: &["CLUSTER"],
    required: false,
    base_confidence: 0.95,
    fallback_pool: &["digital marketing", "content strategy", "growth"],
    generic_token: "cluster",
    relevance_signals: &[(Signal::Topic, 0.3), (Signal::NameInText, 0.1)],
    aligned_intents: KEYWORD_INTENTS,
    keyword_like: true,
    audience_like: false,
    priority: 88,
};

static CATEGORIA: KindProfile = KindProfile {
    kind: PlaceholderKind::Categoria,
    canonical_name: "categoria",
    legacy_aliases: &["CATEGORIA", "CATEGORY"],
    deprecated_aliases: &[],
    required: false,
    base_confidence: 0.94,
    fallback_pool: &["marketing", "technology", "business", "lifestyle", "education"],
    generic_token: "geral",
    relevance_signals: &[(Signal::Topic, 0.3), (Signal::ContentType, 0.1)],
    aligned_intents: &[(Intent::Inform, 0.2), (Intent::Compare, 0.2)],
    keyword_like: true,
    audience_like: false,
    priority: 85,
};

static CONTENT_TYPE: KindProfile = KindProfile {
    kind: PlaceholderKind::ContentType,
    canonical_name: "content_type",
    legacy_aliases: &["TIPO_CONTEUDO", "TIPO-CONTEUDO", "CONTENT_TYPE"],
    deprecated_aliases: &[],
    required: false,
    base_confidence: 0.93,
    fallback_pool: &["article", "blog_post", "guide", "tutorial", "listicle"],
    generic_token: "article",
    relevance_signals: &[(Signal::ContentType, 0.3), (Signal::Topic, 0.1)],
    aligned_intents: &[
        (Intent::Inform, 0.2),
        (Intent::Instruct, 0.2),
        (Intent::Persuade, 0.2),
        (Intent::Compare, 0.2),
        (Intent::Entertain, 0.2),
    ],
    keyword_like: false,
    audience_like: false,
    priority: 80,
};

static TONE: KindProfile = KindProfile {
    kind: PlaceholderKind::Tone,
    canonical_name: "tone",
    legacy_aliases: &["TOM", "TONE", "TOM_DE_VOZ"],
    deprecated_aliases: &[],
    required: false,
    base_confidence: 0.92,
    fallback_pool: &["professional", "friendly", "informal", "formal", "neutral"],
    generic_token: "neutral",
    relevance_signals: &[(Signal::Tone, 0.2), (Signal::Audience, 0.1)],
    aligned_intents: &[(Intent::Persuade, 0.2), (Intent::Entertain, 0.3)],
    keyword_like: false,
    audience_like: false,
    priority: 75,
};

static LENGTH: KindProfile = KindProfile {
    kind: PlaceholderKind::Length,
    canonical_name: "length",
    legacy_aliases: &["TAMANHO", "LENGTH", "WORD_COUNT"],
    deprecated_aliases: &["WORD_COUNT"],
    required: false,
    base_confidence: 0.96,
    fallback_pool: &["1000", "1500", "800", "2000", "medium"],
    generic_token: "medium",
    relevance_signals: &[(Signal::ContentType, 0.1), (Signal::Complexity, 0.1)],
    aligned_intents: &[(Intent::Inform, 0.2), (Intent::Instruct, 0.2)],
    keyword_like: false,
    audience_like: false,
    priority: 70,
};

static TARGET_AUDIENCE: KindProfile = KindProfile {
    kind: PlaceholderKind::TargetAudience,
    canonical_name: "target_audience",
    legacy_aliases: &[
        "PUBLICO_ALVO",
        "PUBLICO-ALVO",
        "TARGET_AUDIENCE",
        "AUDIENCE",
    ],
    deprecated_aliases: &["AUDIENCE"],
    required: false,
    base_confidence: 0.93,
    fallback_pool: &[
        "small business owners",
        "marketing professionals",
        "beginners",
        "entrepreneurs",
        "general audience",
    ],
    generic_token: "general audience",
    relevance_signals: &[(Signal::Audience, 0.3), (Signal::Topic, 0.1)],
    aligned_intents: &[(Intent::Persuade, 0.2), (Intent::Instruct, 0.2)],
    keyword_like: false,
    audience_like: true,
    priority: 78,
};

static NICHE: KindProfile = KindProfile {
    kind: PlaceholderKind::Niche,
    canonical_name: "niche",
    legacy_aliases: &["NICHO", "NICHE"],
    deprecated_aliases: &[],
    required: false,
    base_confidence: 0.92,
    fallback_pool: &["digital marketing", "personal finance", "health and wellness", "technology"],
    generic_token: "geral",
    relevance_signals: &[(Signal::Topic, 0.3), (Signal::Audience, 0.1)],
    aligned_intents: KEYWORD_INTENTS,
    keyword_like: true,
    audience_like: false,
    priority: 72,
};

static CUSTOM: KindProfile = KindProfile {
    kind: PlaceholderKind::Custom,
    canonical_name: "custom",
    legacy_aliases: &[],
    deprecated_aliases: &[],
    required: false,
    base_confidence: 0.90,
    fallback_pool: &[],
    generic_token: "valor_padrão",
    relevance_signals: &[(Signal::NameInText, 0.2), (Signal::Topic, 0.1)],
    aligned_intents: &[(Intent::Inform, 0.1)],
    keyword_like: false,
    audience_like: false,
    priority: 10,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_profiles() {
        for kind in PlaceholderKind::canonical() {
            assert_eq!(PlaceholderKind::from_name(kind.as_str()), kind);
            assert_eq!(kind.profile().kind, kind);
        }
    }

    #[test]
    fn unknown_names_are_custom() {
        assert_eq!(PlaceholderKind::from_name("brand_voice"), PlaceholderKind::Custom);
        assert_eq!(
            PlaceholderKind::from_name(" Primary-Keyword "),
            PlaceholderKind::PrimaryKeyword
        );
    }

    #[test]
    fn base_confidence_within_documented_band() {
        for kind in PlaceholderKind::ALL {
            let base = kind.profile().base_confidence;
            assert!((0.90..=0.98).contains(&base), "{kind}: {base}");
        }
    }

    #[test]
    fn every_kind_starts_with_required_rule() {
        for kind in PlaceholderKind::ALL {
            assert_eq!(kind.default_rules().first(), Some(&RuleSpec::Required));
        }
    }

    #[test]
    fn only_primary_keyword_is_required() {
        let required: Vec<_> = PlaceholderKind::ALL
            .into_iter()
            .filter(|k| k.profile().required)
            .collect();
        assert_eq!(required, vec![PlaceholderKind::PrimaryKeyword]);
    }

    #[test]
    fn deprecated_aliases_are_also_legacy_aliases() {
        for kind in PlaceholderKind::ALL {
            let profile = kind.profile();
            for alias in profile.deprecated_aliases {
                assert!(profile.legacy_aliases.contains(alias), "{alias}");
            }
        }
    }
}
