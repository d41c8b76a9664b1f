use gapfill_detector::{BasicValidator, PatternDetector, ValidationOutcome};
use gapfill_fallback::{FallbackResult, FallbackSystem, HistorySnapshot};
use gapfill_model::text::content_hash;
use gapfill_model::{
    CacheStats, DetectedGap, ErrorKind, ExpectedGap, GapError, GapId, PipelineStage,
    PlaceholderKind, Result, StageIssue, TtlCache,
};
use gapfill_quality::{QualityValidator, RunSnapshot, StageSample};
use gapfill_semantic::{
    select_backend, ContextValidator, MatchOutcome, SemanticAnalyzer, SemanticBackend,
    SemanticContext, SemanticGap, SemanticMatcher,
};
use gapfill_unifier::Unifier;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::PipelineConfig;
use crate::report;
use crate::result::{
    FinalState, GapResolution, PipelineResult, ResolutionSource, StageResult, SystemHealth,
};

/// One unit of work for [`Pipeline::run`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineRequest {
    pub text: String,
    /// Ground truth for quality grading
    #[serde(default)]
    pub expected_gaps: Vec<ExpectedGap>,
    /// Caller-supplied candidate values per kind; kinds without an entry use derived candidates
    #[serde(default)]
    pub candidates: BTreeMap<PlaceholderKind, Vec<String>>,
}

impl PipelineRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_expected_gaps(mut self, expected_gaps: Vec<ExpectedGap>) -> Self {
        self.expected_gaps = expected_gaps;
        self
    }

    #[must_use]
    pub fn with_candidates(mut self, kind: PlaceholderKind, values: Vec<String>) -> Self {
        self.candidates.insert(kind, values);
        self
    }
}

type RunKey = (String, usize);

/// Owns every stage and the caches shared across runs
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    unifier: Unifier,
    detector: PatternDetector,
    validator: Arc<BasicValidator>,
    analyzer: Arc<SemanticAnalyzer>,
    context_validator: ContextValidator,
    matcher: SemanticMatcher,
    fallback: Arc<FallbackSystem>,
    quality: QualityValidator,
    /// Set when the configured backend could not be built
    backend_issue: Option<StageIssue>,
    runs: TtlCache<RunKey, PipelineResult>,
    workers: Arc<Semaphore>,
}

/// Per-run bookkeeping threaded through the stages
struct RunState {
    started: Instant,
    result: PipelineResult,
    samples: Vec<StageSample>,
}

impl RunState {
    fn record(&mut self, mut stage: StageResult, started: Instant, items: (usize, usize)) {
        stage.execution_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.samples.push(StageSample {
            stage: stage.stage,
            success: stage.success,
            elapsed_ms: stage.execution_time_ms,
            items_in: items.0,
            items_out: items.1,
        });
        log::debug!(
            "stage {} finished in {:.2}ms (success: {})",
            stage.stage,
            stage.execution_time_ms,
            stage.success
        );
        self.result.stages.push(stage);
    }
}

impl Pipeline {
    /// Build every component, selecting the backend named in `config.backend`
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate().map_err(GapError::config)?;
        let (backend, backend_err) = select_backend(&config.backend);
        Self::build(config, backend, backend_err.as_ref().map(StageIssue::from))
    }

    /// Build with a caller-supplied similarity backend
    pub fn with_backend(config: PipelineConfig, backend: Arc<dyn SemanticBackend>) -> Result<Self> {
        config.validate().map_err(GapError::config)?;
        Self::build(config, backend, None)
    }

    fn build(
        config: PipelineConfig,
        backend: Arc<dyn SemanticBackend>,
        backend_issue: Option<StageIssue>,
    ) -> Result<Self> {
        let config = config.resolved();
        let validator = Arc::new(BasicValidator::new(config.validator.clone()));
        let analyzer = SemanticAnalyzer::new(
            config.analyzer.clone(),
            Arc::clone(&validator),
            backend.as_ref(),
        )?;
        let workers = Arc::new(Semaphore::new(config.effective_worker_limit()));
        log::info!(
            "pipeline ready: backend {}, {} worker(s)",
            backend.name(),
            config.effective_worker_limit()
        );

        Ok(Self {
            unifier: Unifier::new(config.unifier.clone()),
            detector: PatternDetector::new(config.detector.clone())?,
            analyzer: Arc::new(analyzer),
            context_validator: ContextValidator::new(config.context_validator.clone())?,
            matcher: SemanticMatcher::new(config.matcher.clone(), backend)?,
            fallback: Arc::new(FallbackSystem::new(
                config.fallback.clone(),
                Arc::clone(&validator),
            )?),
            quality: QualityValidator::new(config.quality.clone())?,
            backend_issue,
            runs: TtlCache::new(config.run_cache),
            validator,
            workers,
            config,
        })
    }

    /// Effective configuration (top-level knobs already pushed into the sections)
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every enabled stage over `text`
    pub async fn process(&self, text: &str, expected_gaps: &[ExpectedGap]) -> PipelineResult {
        let request = PipelineRequest::new(text).with_expected_gaps(expected_gaps.to_vec());
        self.run(request, &CancellationToken::new()).await
    }

    /// Process several templates one after another
    pub async fn process_batch(&self, texts: &[String]) -> Vec<PipelineResult> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.process(text, &[]).await);
        }
        results
    }

    /// Run the stage machine. Never fails: problems land in `errors`/`warnings`, and a
    /// cancelled run returns the stages it completed with `final_state == Cancelled`.
    pub async fn run(&self, request: PipelineRequest, cancel: &CancellationToken) -> PipelineResult {
        let text_hash = content_hash(&request.text);
        let cache_key = (text_hash.clone(), request.expected_gaps.len());
        let cacheable = request.candidates.is_empty();
        if cacheable {
            if let Some(mut cached) = self.runs.get(&cache_key) {
                log::debug!("run cache hit for {}", &text_hash[..12.min(text_hash.len())]);
                cached.from_cache = true;
                return cached;
            }
        }

        let mut state = RunState {
            started: Instant::now(),
            result: PipelineResult::empty(text_hash.clone(), &request.text),
            samples: Vec::new(),
        };

        if self.halt_if_cancelled(cancel, PipelineStage::Unification, &mut state) {
            return self.finish(state);
        }
        if !self.unify(&request.text, &mut state) {
            return self.finish(state);
        }
        let text: Arc<str> = Arc::from(state.result.unified_text.as_str());

        if self.halt_if_cancelled(cancel, PipelineStage::Detection, &mut state) {
            return self.finish(state);
        }
        if !self.detect(&text, &mut state) {
            return self.finish(state);
        }

        if self.config.enable_semantic_analysis {
            if self.halt_if_cancelled(cancel, PipelineStage::SemanticAnalysis, &mut state) {
                return self.finish(state);
            }
            self.analyze(&text, &text_hash, &mut state).await;
        }

        if self.config.enable_context_validation {
            if self.halt_if_cancelled(cancel, PipelineStage::ContextValidation, &mut state) {
                return self.finish(state);
            }
            self.validate_context(&text, &mut state);
        }

        if self.config.enable_semantic_matching {
            if self.halt_if_cancelled(cancel, PipelineStage::SemanticMatching, &mut state) {
                return self.finish(state);
            }
            self.match_gaps(&text, &text_hash, &request, cancel, &mut state).await;
        }

        if self.config.enable_quality_validation {
            if self.halt_if_cancelled(cancel, PipelineStage::QualityValidation, &mut state) {
                return self.finish(state);
            }
            self.grade(&request.expected_gaps, &mut state);
        }

        if self.config.enable_fallback_generation {
            if self.halt_if_cancelled(cancel, PipelineStage::FallbackGeneration, &mut state) {
                return self.finish(state);
            }
            self.generate_fallbacks(&text_hash, &mut state).await;
        }

        if self.halt_if_cancelled(cancel, PipelineStage::Integration, &mut state) {
            return self.finish(state);
        }
        self.integrate(&mut state);
        state.result.final_state = FinalState::Success;

        let result = self.finish(state);
        if cacheable {
            self.runs.insert(cache_key, result.clone());
        }
        result
    }

    /// Structural check of one candidate value
    pub fn validate_value(&self, kind: PlaceholderKind, value: &str) -> ValidationOutcome {
        self.validator.validate(kind, value)
    }

    pub fn cache_stats(&self) -> BTreeMap<&'static str, CacheStats> {
        BTreeMap::from([
            ("unification", self.unifier.cache_stats()),
            ("validation", self.validator.cache_stats()),
            ("semantic_context", self.analyzer.cache_stats()),
            ("matching", self.matcher.cache_stats()),
            ("runs", self.runs.stats()),
        ])
    }

    /// Drop every cached entry. Usage history is kept.
    pub fn clear_caches(&self) {
        self.unifier.clear_cache();
        self.validator.clear_cache();
        self.analyzer.clear_cache();
        self.matcher.clear_cache();
        self.runs.clear();
    }

    pub fn usage_history_snapshot(&self) -> HistorySnapshot {
        self.fallback.snapshot()
    }

    pub fn restore_usage_history(&self, snapshot: &HistorySnapshot) {
        self.fallback.restore(snapshot);
    }

    fn halt_if_cancelled(
        &self,
        cancel: &CancellationToken,
        stage: PipelineStage,
        state: &mut RunState,
    ) -> bool {
        if !cancel.is_cancelled() {
            return false;
        }
        let err = GapError::Cancelled {
            stage: stage.as_str().to_string(),
        };
        log::info!("{err}");
        state.result.errors.push(StageIssue::from(&err).at(stage));
        state.result.final_state = FinalState::Cancelled;
        true
    }

    /// Returns false when there is no text to work on
    fn unify(&self, text: &str, state: &mut RunState) -> bool {
        let started = Instant::now();
        let mut stage = StageResult::new(PipelineStage::Unification);

        if text.trim().is_empty() {
            stage.error(StageIssue::new(ErrorKind::Migration, "input text is empty"));
            state.record(stage, started, (0, 0));
            state.result.final_state = FinalState::Error;
            return false;
        }

        let migration = self.unifier.migrate(text, false);
        let at = stage.stage;
        stage.success = migration.success;
        stage
            .errors
            .extend(migration.errors.iter().cloned().map(|issue| issue.at(at)));
        stage
            .warnings
            .extend(migration.warnings.iter().cloned().map(|issue| issue.at(at)));
        stage.data = json!({
            "format": migration.format_detected,
            "migrations": migration.migrations_applied.len(),
            "replacements": migration.total_replacements(),
            "no_op": migration.no_op,
            "required_missing": migration.validation.required_missing,
        });

        state.result.unified_text.clone_from(&migration.migrated_text);
        state.result.filled_text.clone_from(&migration.migrated_text);
        state.result.migration = Some(migration);
        state.record(stage, started, (0, 0));
        true
    }

    /// Returns false when detection failed
    fn detect(&self, text: &str, state: &mut RunState) -> bool {
        let started = Instant::now();
        let mut stage = StageResult::new(PipelineStage::Detection);
        match self.detector.detect(text) {
            Ok(mut gaps) => {
                gaps.sort_by_key(|gap| gap.span.start);
                stage.data = json!({ "gaps": gaps.len() });
                let count = gaps.len();
                state.result.gaps = gaps;
                state.record(stage, started, (0, count));
                true
            }
            Err(err) => {
                log::warn!("detection failed: {err}");
                stage.error(StageIssue::from(&err));
                state.record(stage, started, (0, 0));
                state.result.final_state = FinalState::Error;
                false
            }
        }
    }

    async fn analyze(&self, text: &Arc<str>, text_hash: &str, state: &mut RunState) {
        let started = Instant::now();
        let mut stage = StageResult::new(PipelineStage::SemanticAnalysis);
        let hash: Arc<str> = Arc::from(text_hash);

        let mut tasks = JoinSet::new();
        for (idx, gap) in state.result.gaps.iter().cloned().enumerate() {
            let analyzer = Arc::clone(&self.analyzer);
            let workers = Arc::clone(&self.workers);
            let text = Arc::clone(text);
            let hash = Arc::clone(&hash);
            tasks.spawn(async move {
                let _permit = workers.acquire_owned().await.ok();
                (idx, analyzer.analyze_gap(&text, &hash, &gap))
            });
        }

        let mut analyzed: Vec<(usize, SemanticGap)> = Vec::with_capacity(state.result.gaps.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(item) => analyzed.push(item),
                Err(err) => stage.error(StageIssue::from(GapError::internal(format!(
                    "semantic analysis task failed: {err}"
                )))),
            }
        }
        analyzed.sort_by_key(|(idx, _)| *idx);
        let semantic_gaps: Vec<SemanticGap> = analyzed.into_iter().map(|(_, gap)| gap).collect();

        let implied = self.analyzer.implied_gaps(text, &state.result.gaps);
        if let Some(issue) = self.analyzer.backend_warning() {
            stage.warn(issue);
        }
        if let Some(issue) = &self.backend_issue {
            stage.warn(issue.clone());
        }

        stage.data = json!({
            "semantic_gaps": semantic_gaps.len(),
            "implied_gaps": implied.len(),
        });
        let items = (state.result.gaps.len(), semantic_gaps.len());
        state.result.semantic_gaps = Some(semantic_gaps);
        state.result.implied_gaps = Some(implied);
        state.record(stage, started, items);
    }

    fn validate_context(&self, text: &str, state: &mut RunState) {
        let started = Instant::now();
        let mut stage = StageResult::new(PipelineStage::ContextValidation);
        let validation = self.context_validator.validate(text, &state.result.gaps);

        for warning in &validation.warnings {
            if warning.kind == ErrorKind::ContextValidation {
                stage.success = false;
            }
            stage.warn(warning.clone());
        }
        stage.data = json!({
            "is_valid": validation.is_valid,
            "overall_score": validation.overall_score,
            "issues": validation.issues.len(),
        });
        let items = (state.result.gaps.len(), validation.assessments.len());
        state.result.context_validation = Some(validation);
        state.record(stage, started, items);
    }

    async fn match_gaps(
        &self,
        text: &str,
        text_hash: &str,
        request: &PipelineRequest,
        cancel: &CancellationToken,
        state: &mut RunState,
    ) {
        let started = Instant::now();
        let mut stage = StageResult::new(PipelineStage::SemanticMatching);
        let contexts = self.contexts(text, text_hash, state);

        let mut matches: Vec<MatchOutcome> = Vec::with_capacity(state.result.gaps.len());
        for gap in &state.result.gaps {
            if cancel.is_cancelled() {
                break;
            }
            let Some(context) = contexts.get(&gap.id()) else {
                continue;
            };
            let pool = request.candidates.get(&gap.kind).map(Vec::as_slice);
            let outcome = self.matcher.match_gap(text, gap, context, pool).await;
            for warning in &outcome.warnings {
                stage.warn(warning.clone());
            }
            matches.push(outcome);
        }

        let accepted = matches.iter().filter(|outcome| outcome.accepted.is_some()).count();
        stage.data = json!({ "matched": matches.len(), "accepted": accepted });
        let items = (state.result.gaps.len(), matches.len());
        state.result.matches = Some(matches);
        state.record(stage, started, items);
    }

    fn grade(&self, expected_gaps: &[ExpectedGap], state: &mut RunState) {
        let started = Instant::now();
        let mut stage = StageResult::new(PipelineStage::QualityValidation);
        let result = &state.result;
        let report = self.quality.evaluate(&RunSnapshot {
            gaps: &result.gaps,
            semantic_gaps: result.semantic_gaps.as_deref().unwrap_or_default(),
            matches: result.matches.as_deref().unwrap_or_default(),
            context_validation: result.context_validation.as_ref(),
            stages: &state.samples,
            expected_gaps,
        });

        if report.overall_score < self.config.min_quality_score {
            stage.warn(StageIssue::notice(format!(
                "quality score {:.2} is below the {:.2} minimum",
                report.overall_score, self.config.min_quality_score
            )));
        }
        stage.data = json!({
            "overall_score": report.overall_score,
            "quality_level": report.quality_level,
            "issues": report.issues.len(),
        });
        let items = (state.result.gaps.len(), report.gaps_evaluated);
        state.result.quality = Some(report);
        state.record(stage, started, items);
    }

    async fn generate_fallbacks(&self, text_hash: &str, state: &mut RunState) {
        let started = Instant::now();
        let mut stage = StageResult::new(PipelineStage::FallbackGeneration);
        let text = state.result.unified_text.clone();
        let contexts = self.contexts(&text, text_hash, state);

        let accepted: Vec<GapId> = state
            .result
            .matches
            .iter()
            .flatten()
            .filter(|outcome| outcome.accepted.is_some())
            .map(|outcome| outcome.gap_ref)
            .collect();
        let targets: Vec<DetectedGap> = state
            .result
            .gaps
            .iter()
            .filter(|gap| !accepted.contains(&gap.id()))
            .cloned()
            .collect();

        let mut tasks = JoinSet::new();
        for (idx, gap) in targets.iter().cloned().enumerate() {
            let fallback = Arc::clone(&self.fallback);
            let workers = Arc::clone(&self.workers);
            let context = contexts.get(&gap.id()).cloned();
            tasks.spawn(async move {
                let _permit = workers.acquire_owned().await.ok();
                (idx, fallback.generate(&gap, context.as_ref()))
            });
        }

        let mut generated: Vec<(usize, FallbackResult)> = Vec::with_capacity(targets.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(item) => generated.push(item),
                Err(err) => stage.error(StageIssue::from(GapError::internal(format!(
                    "fallback task failed: {err}"
                )))),
            }
        }
        generated.sort_by_key(|(idx, _)| *idx);
        let fallbacks: Vec<FallbackResult> = generated.into_iter().map(|(_, item)| item).collect();

        for fallback in &fallbacks {
            for warning in &fallback.warnings {
                stage.warn(warning.clone());
            }
        }
        let exhausted = fallbacks.iter().filter(|fallback| fallback.exhausted).count();
        stage.data = json!({ "generated": fallbacks.len(), "exhausted": exhausted });
        let items = (targets.len(), fallbacks.len());
        state.result.fallbacks = Some(fallbacks);
        state.record(stage, started, items);
    }

    /// Pick one value per gap and substitute it into the unified text
    fn integrate(&self, state: &mut RunState) {
        let started = Instant::now();
        let mut stage = StageResult::new(PipelineStage::Integration);
        let result = &state.result;

        let mut resolutions = Vec::new();
        for gap in &result.gaps {
            let matched = result
                .matches
                .iter()
                .flatten()
                .find(|outcome| outcome.gap_ref == gap.id())
                .and_then(|outcome| outcome.accepted.as_ref());
            let resolution = if let Some(accepted) = matched {
                Some((accepted.suggested_value.clone(), ResolutionSource::Match, accepted.confidence))
            } else {
                result
                    .fallbacks
                    .iter()
                    .flatten()
                    .find(|fallback| fallback.gap_ref == gap.id())
                    .map(|fallback| {
                        (
                            fallback.selected.value.clone(),
                            ResolutionSource::Fallback,
                            fallback.selected.confidence,
                        )
                    })
            };
            if let Some((value, source, confidence)) = resolution {
                resolutions.push(GapResolution {
                    gap_ref: gap.id(),
                    placeholder: gap.placeholder(),
                    value,
                    source,
                    confidence,
                });
            }
        }

        let mut filled = result.unified_text.clone();
        for resolution in resolutions.iter().rev() {
            let span = resolution.gap_ref.span;
            if filled.is_char_boundary(span.start) && filled.is_char_boundary(span.end) {
                filled.replace_range(span.start..span.end, &resolution.value);
            }
        }

        let unresolved = result.gaps.len().saturating_sub(resolutions.len());
        if unresolved > 0 {
            stage.warn(StageIssue::notice(format!("{unresolved} gap(s) left unresolved")));
        }
        stage.data = json!({ "resolved": resolutions.len(), "unresolved": unresolved });
        let items = (state.result.gaps.len(), resolutions.len());
        state.result.resolutions = resolutions;
        state.result.filled_text = filled;
        state.record(stage, started, items);
    }

    /// Semantic context per gap: the analyzed one when analysis ran, otherwise classified now
    fn contexts(
        &self,
        text: &str,
        text_hash: &str,
        state: &RunState,
    ) -> HashMap<GapId, SemanticContext> {
        match &state.result.semantic_gaps {
            Some(semantic) => semantic
                .iter()
                .map(|gap| (gap.gap.id(), gap.context.clone()))
                .collect(),
            None => state
                .result
                .gaps
                .iter()
                .map(|gap| (gap.id(), self.analyzer.context_for(text, text_hash, gap)))
                .collect(),
        }
    }

    fn finish(&self, mut state: RunState) -> PipelineResult {
        let result = &mut state.result;
        let run_errors = std::mem::take(&mut result.errors);
        result.errors = result
            .stages
            .iter()
            .flat_map(|stage| stage.errors.iter().cloned())
            .chain(run_errors)
            .collect();
        result.warnings = result
            .stages
            .iter()
            .flat_map(|stage| stage.warnings.iter().cloned())
            .collect();

        let executed = result.stages.len();
        let succeeded = result.stages.iter().filter(|stage| stage.success).count();
        let success_rate = if executed == 0 {
            0.0
        } else {
            succeeded as f64 / executed as f64
        };
        let quality = result.quality.as_ref().map_or_else(
            || {
                if result.gaps.is_empty() {
                    1.0
                } else {
                    result.gaps.iter().map(|gap| f64::from(gap.confidence)).sum::<f64>()
                        / result.gaps.len() as f64
                }
            },
            |report| report.overall_score,
        );
        result.system_health = SystemHealth::assess(success_rate, quality);
        result.success = result.final_state == FinalState::Success;
        result.insights = report::insights(result);
        result.recommendations = report::recommendations(result, self.config.min_quality_score);
        result.total_time_ms = state.started.elapsed().as_secs_f64() * 1000.0;

        log::info!(
            "run {:?}: {} gap(s), health {}, {:.1}ms",
            result.final_state,
            result.gaps.len(),
            result.system_health.as_str(),
            result.total_time_ms
        );
        state.result
    }
}
