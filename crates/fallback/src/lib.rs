//! # Gapfill Fallback
//!
//! Last-resort values for gaps the matcher could not fill. Four strategies propose values:
//!
//! | Strategy     | Source                                             |
//! |--------------|----------------------------------------------------|
//! | contextual   | topic-keyed audience, tone and keyword tables      |
//! | semantic     | keywords, topic and intent of the gap's context    |
//! | frequency    | the kind's static "most common" list               |
//! | historical   | values selected in earlier runs ([`UsageHistory`]) |
//!
//! Hybrid mode merges every strategy, keeps the best-quality copy of each value and ranks by
//! `0.4·quality + 0.3·confidence + 0.3·context_relevance`. Generation never fails: with no
//! proposals at all the kind's generic token is returned with a `FallbackExhausted` warning.

mod config;
mod history;
mod system;

pub use config::{FallbackConfig, FallbackMode, RankingWeights, StrategyConfidence};
pub use history::{HistorySnapshot, UsageHistory};
pub use system::{FallbackOption, FallbackResult, FallbackStrategy, FallbackSystem, QualityBucket};
