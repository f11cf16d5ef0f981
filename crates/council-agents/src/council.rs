//! Deliberation orchestrator: sequences the council phases.
//!
//! ```text
//! research ─▶ analysis (fan-out × 3) ─▶ [discussion (fan-out × 3)] ─▶ [validation] ─▶ synthesis
//! ```
//!
//! Fan-out phases spawn one task per lens into a `JoinSet` guarded by a
//! semaphore. Each task's failure is contained in its own slot: the phase
//! result always holds exactly one entry per lens, keyed by lens, so
//! completion order never matters.
//!
//! Single-call phases (research, validation, synthesis) surface a transport
//! failure as [`PipelineError::Phase`]. A [`CouncilRun`] keeps every
//! completed phase's output, so a caller can re-drive the same run and only
//! the failed phase is invoked again.

use std::sync::Arc;
use std::time::Instant;

use deliberation::{
    check_verdict, consensus, CouncilAnalyses, DeliberationPhase, DiscussionMap,
    DiscussionResponse, Dossier, Lens, PhaseError, PhaseTracker, RunRecord, SpecialistAnalysis,
    Stage, ValidationReport, Verdict, ERROR_TYPE,
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::agents::AgentFactory;
use crate::errors::{ModelError, PipelineError};
use crate::prompts::PROMPT_VERSION;
use crate::telemetry::{MetricsCollector, RunMetrics};

/// Specialist tasks allowed in flight at once.
pub const MAX_PARALLEL_SPECIALISTS: usize = 3;

/// Progress callbacks. Fan-out callbacks fire as each task finishes, in
/// completion order.
pub trait ProgressObserver: Send + Sync {
    fn on_phase(&self, _phase: DeliberationPhase) {}
    fn on_analysis(&self, _lens: Lens, _analysis: &SpecialistAnalysis) {}
    fn on_discussion(&self, _lens: Lens, _response: &DiscussionResponse) {}
    fn on_validation(&self, _report: &ValidationReport) {}
}

pub struct NoopObserver;

impl ProgressObserver for NoopObserver {}

/// Which optional phases a run includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub discussion: bool,
    pub validation: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            discussion: true,
            validation: true,
        }
    }
}

/// State of one run, carried between phase invocations.
pub struct CouncilRun {
    pub subject: String,
    pub source: String,
    pub options: RunOptions,
    tracker: PhaseTracker,
    dossier: Option<Dossier>,
    analyses: Option<CouncilAnalyses>,
    discussion: Option<DiscussionMap>,
    validation: Option<ValidationReport>,
    verdict: Option<Verdict>,
    metrics: MetricsCollector,
}

impl CouncilRun {
    pub fn new(subject: &str, source: &str, options: RunOptions) -> Self {
        Self {
            subject: subject.to_string(),
            source: source.to_string(),
            options,
            tracker: PhaseTracker::new(),
            dossier: None,
            analyses: None,
            discussion: None,
            validation: None,
            verdict: None,
            metrics: MetricsCollector::new(PROMPT_VERSION),
        }
    }

    pub fn phase(&self) -> DeliberationPhase {
        self.tracker.current()
    }

    pub fn is_complete(&self) -> bool {
        self.tracker.is_terminal()
    }

    /// The stage the next call to [`DeliberationOrchestrator::step`] runs.
    pub fn next_stage(&self) -> Option<Stage> {
        use DeliberationPhase::*;
        let after_analysis = |discussed: bool| {
            if self.options.discussion && !discussed {
                Stage::Discussion
            } else if self.options.validation {
                Stage::Validation
            } else {
                Stage::Synthesis
            }
        };
        match self.tracker.current() {
            Idle => Some(Stage::Research),
            Fetched => Some(Stage::Analysis),
            Analyzed => Some(after_analysis(false)),
            Discussed => Some(after_analysis(true)),
            Validated => Some(Stage::Synthesis),
            Synthesized => None,
        }
    }

    pub fn dossier(&self) -> Option<&Dossier> {
        self.dossier.as_ref()
    }

    pub fn analyses(&self) -> Option<&CouncilAnalyses> {
        self.analyses.as_ref()
    }

    pub fn discussion(&self) -> Option<&DiscussionMap> {
        self.discussion.as_ref()
    }

    pub fn validation(&self) -> Option<&ValidationReport> {
        self.validation.as_ref()
    }

    pub fn verdict(&self) -> Option<&Verdict> {
        self.verdict.as_ref()
    }

    /// `idle -> fetched -> ...` trail of this run.
    pub fn phase_summary(&self) -> String {
        self.tracker.summary()
    }

    pub fn metrics(&self) -> RunMetrics {
        self.metrics.finalize()
    }

    /// Assemble the persisted record. Only a synthesized run has one.
    pub fn into_record(self) -> Result<(RunRecord, RunMetrics), PipelineError> {
        let phase = self.tracker.current();
        let metrics = self.metrics.finalize();
        match (self.dossier, self.analyses, self.verdict) {
            (Some(dossier), Some(analyses), Some(verdict)) if phase.is_terminal() => {
                let record =
                    RunRecord::new(dossier, analyses, self.discussion, self.validation, verdict)
                        .with_prompt_version(PROMPT_VERSION);
                Ok((record, metrics))
            }
            _ => Err(PipelineError::Incomplete(phase)),
        }
    }
}

pub struct DeliberationOrchestrator {
    agents: AgentFactory,
    max_parallel: usize,
}

impl DeliberationOrchestrator {
    pub fn new(agents: AgentFactory) -> Self {
        Self {
            agents,
            max_parallel: MAX_PARALLEL_SPECIALISTS,
        }
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    // ── Phase 1: research ─────────────────────────────────────────────

    pub async fn research(&self, subject: &str, source: &str) -> Result<Dossier, PipelineError> {
        self.agents
            .scout()
            .research(subject, source)
            .await
            .map_err(|e| PipelineError::phase(Stage::Research, e))
    }

    // ── Phase 2: analysis (fan-out) ───────────────────────────────────

    /// One analysis per lens. Never fails: a failed specialist yields an
    /// `Error` analysis in its slot.
    pub async fn run_analysis(
        &self,
        dossier: &Dossier,
        observer: &dyn ProgressObserver,
    ) -> CouncilAnalyses {
        let sem = Arc::new(Semaphore::new(self.max_parallel));
        let dossier = Arc::new(dossier.clone());
        let mut join_set: JoinSet<(Lens, Result<SpecialistAnalysis, ModelError>)> =
            JoinSet::new();

        for lens in Lens::ALL {
            let sem = sem.clone();
            let dossier = dossier.clone();
            let analyst = self.agents.analyst(lens);
            join_set.spawn(async move {
                let Ok(_permit) = sem.acquire_owned().await else {
                    return (lens, Err(limiter_closed()));
                };
                (lens, analyst.analyze(&dossier).await)
            });
        }

        let mut analyses = CouncilAnalyses::new();
        while let Some(joined) = join_set.join_next().await {
            let (lens, result) = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(error = %e, "specialist task aborted");
                    continue;
                }
            };
            let analysis = result.unwrap_or_else(|e| {
                warn!(lens = %lens, error = %e, "specialist analysis failed");
                SpecialistAnalysis::failed(lens, &e.to_string())
            });
            observer.on_analysis(lens, &analysis);
            analyses.insert(lens, analysis);
        }

        for lens in Lens::ALL {
            analyses.entry(lens).or_insert_with(|| {
                let analysis = SpecialistAnalysis::failed(lens, "task aborted");
                observer.on_analysis(lens, &analysis);
                analysis
            });
        }
        info!(agreement = %consensus::agreement(&analyses), "analysis phase complete");
        analyses
    }

    // ── Phase 3: discussion (fan-out) ─────────────────────────────────

    /// One rebuttal per lens. Never fails: a failed call yields an error
    /// placeholder in that lens's slot.
    pub async fn run_discussion(
        &self,
        dossier: &Dossier,
        analyses: &CouncilAnalyses,
        observer: &dyn ProgressObserver,
    ) -> DiscussionMap {
        let sem = Arc::new(Semaphore::new(self.max_parallel));
        let dossier = Arc::new(dossier.clone());
        let analyses = Arc::new(analyses.clone());
        let mut join_set: JoinSet<(Lens, Result<String, ModelError>)> = JoinSet::new();

        for lens in Lens::ALL {
            let sem = sem.clone();
            let dossier = dossier.clone();
            let analyses = analyses.clone();
            let analyst = self.agents.analyst(lens);
            join_set.spawn(async move {
                let Ok(_permit) = sem.acquire_owned().await else {
                    return (lens, Err(limiter_closed()));
                };
                (lens, analyst.respond_to_discussion(&dossier, &analyses).await)
            });
        }

        let mut responses = DiscussionMap::new();
        while let Some(joined) = join_set.join_next().await {
            let (lens, result) = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(error = %e, "discussion task aborted");
                    continue;
                }
            };
            let response = match result {
                Ok(text) => DiscussionResponse::new(lens, text),
                Err(e) => {
                    warn!(lens = %lens, error = %e, "discussion response failed");
                    DiscussionResponse::failed(lens, &e.to_string())
                }
            };
            observer.on_discussion(lens, &response);
            responses.insert(lens, response);
        }

        for lens in Lens::ALL {
            responses.entry(lens).or_insert_with(|| {
                let response = DiscussionResponse::failed(lens, "task aborted");
                observer.on_discussion(lens, &response);
                response
            });
        }
        info!(
            failed = responses.values().filter(|r| r.failed).count(),
            "discussion phase complete"
        );
        responses
    }

    // ── Phase 4: validation ───────────────────────────────────────────

    pub async fn run_validation(
        &self,
        analyses: &CouncilAnalyses,
    ) -> Result<ValidationReport, PipelineError> {
        self.agents
            .validator()
            .validate(analyses)
            .await
            .map_err(|e| PipelineError::phase(Stage::Validation, e))
    }

    // ── Phase 5: synthesis ────────────────────────────────────────────

    /// Final verdict. A verdict that breaks the consensus rules is logged,
    /// never rewritten.
    pub async fn synthesize(
        &self,
        dossier: &Dossier,
        analyses: &CouncilAnalyses,
        discussion: Option<&DiscussionMap>,
        validation: Option<&ValidationReport>,
    ) -> Result<Verdict, PipelineError> {
        let verdict = self
            .agents
            .manager()
            .synthesize(dossier, analyses, discussion, validation)
            .await
            .map_err(|e| PipelineError::phase(Stage::Synthesis, e))?;

        let status = check_verdict(&verdict, analyses);
        if status.is_violation() {
            warn!(?status, "verdict breaks consensus rules");
        } else {
            debug!(?status, "verdict consensus check");
        }
        Ok(verdict)
    }

    // ── Driver ────────────────────────────────────────────────────────

    /// Run the next stage of `run`. Returns the stage that ran, or `None`
    /// when the run was already complete. On error the run is left at its
    /// current phase with all earlier outputs intact.
    pub async fn step(
        &self,
        run: &mut CouncilRun,
        observer: &dyn ProgressObserver,
    ) -> Result<Option<Stage>, PipelineError> {
        let Some(stage) = run.next_stage() else {
            return Ok(None);
        };
        if !run.tracker.can_run(stage) {
            return Err(PhaseError::IllegalTransition {
                from: run.tracker.current(),
                to: stage.completes(),
            }
            .into());
        }
        let start = Instant::now();
        let outcome = self.execute(stage, run, observer).await;
        run.metrics
            .record_stage(stage, start.elapsed(), outcome.is_ok());
        outcome?;

        run.tracker.complete(stage)?;
        observer.on_phase(run.tracker.current());
        info!(
            stage = %stage,
            phase = %run.tracker.current(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "stage complete"
        );
        Ok(Some(stage))
    }

    async fn execute(
        &self,
        stage: Stage,
        run: &mut CouncilRun,
        observer: &dyn ProgressObserver,
    ) -> Result<(), PipelineError> {
        let phase = run.tracker.current();
        let missing = move || PipelineError::Incomplete(phase);
        match stage {
            Stage::Research => {
                run.metrics.record_model_calls(1);
                let dossier = self.research(&run.subject, &run.source).await?;
                if dossier.is_degraded() {
                    run.metrics.record_degraded(1);
                }
                run.dossier = Some(dossier);
            }
            Stage::Analysis => {
                let dossier = run.dossier.as_ref().ok_or_else(missing)?;
                run.metrics.record_model_calls(Lens::ALL.len() as u32);
                let analyses = self.run_analysis(dossier, observer).await;
                let failed = analyses
                    .values()
                    .filter(|a| a.predicted_type == ERROR_TYPE)
                    .count();
                let degraded = analyses
                    .values()
                    .filter(|a| a.raw_response.is_some())
                    .count();
                run.metrics.record_failed_tasks(failed as u32);
                run.metrics.record_degraded(degraded as u32);
                run.analyses = Some(analyses);
            }
            Stage::Discussion => {
                let (Some(dossier), Some(analyses)) = (&run.dossier, &run.analyses) else {
                    return Err(missing());
                };
                run.metrics.record_model_calls(Lens::ALL.len() as u32);
                let responses = self.run_discussion(dossier, analyses, observer).await;
                let failed = responses.values().filter(|r| r.failed).count();
                run.metrics.record_failed_tasks(failed as u32);
                run.discussion = Some(responses);
            }
            Stage::Validation => {
                let analyses = run.analyses.as_ref().ok_or_else(missing)?;
                run.metrics.record_model_calls(1);
                let report = self.run_validation(analyses).await?;
                if report.is_degraded() {
                    run.metrics.record_degraded(1);
                }
                observer.on_validation(&report);
                run.validation = Some(report);
            }
            Stage::Synthesis => {
                let (Some(dossier), Some(analyses)) = (&run.dossier, &run.analyses) else {
                    return Err(missing());
                };
                if !deliberation::allowed_types(analyses).is_empty() {
                    run.metrics.record_model_calls(1);
                }
                let verdict = self
                    .synthesize(
                        dossier,
                        analyses,
                        run.discussion.as_ref(),
                        run.validation.as_ref(),
                    )
                    .await?;
                if verdict.is_degraded() {
                    run.metrics.record_degraded(1);
                }
                run.verdict = Some(verdict);
            }
        }
        Ok(())
    }

    /// Drive `run` until it is synthesized or a stage fails.
    pub async fn resume(
        &self,
        run: &mut CouncilRun,
        observer: &dyn ProgressObserver,
    ) -> Result<(), PipelineError> {
        while self.step(run, observer).await?.is_some() {}
        Ok(())
    }

    /// Full run from scratch.
    pub async fn run(
        &self,
        subject: &str,
        source: &str,
        options: RunOptions,
        observer: &dyn ProgressObserver,
    ) -> Result<CouncilRun, PipelineError> {
        info!(
            subject,
            source,
            prompt_version = PROMPT_VERSION,
            discussion = options.discussion,
            validation = options.validation,
            "starting council run"
        );
        let mut run = CouncilRun::new(subject, source, options);
        self.resume(&mut run, observer).await?;
        info!(phases = %run.phase_summary(), "council run complete");
        Ok(run)
    }
}

fn limiter_closed() -> ModelError {
    ModelError::Request("concurrency limiter closed".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_with(options: RunOptions) -> CouncilRun {
        CouncilRun::new("X", "Y", options)
    }

    #[test]
    fn test_next_stage_follows_options() {
        let mut run = run_with(RunOptions::default());
        assert_eq!(run.next_stage(), Some(Stage::Research));
        run.tracker.complete(Stage::Research).unwrap();
        run.tracker.complete(Stage::Analysis).unwrap();
        assert_eq!(run.next_stage(), Some(Stage::Discussion));
        run.tracker.complete(Stage::Discussion).unwrap();
        assert_eq!(run.next_stage(), Some(Stage::Validation));

        let mut bare = run_with(RunOptions {
            discussion: false,
            validation: false,
        });
        bare.tracker.complete(Stage::Research).unwrap();
        bare.tracker.complete(Stage::Analysis).unwrap();
        assert_eq!(bare.next_stage(), Some(Stage::Synthesis));

        let mut no_discussion = run_with(RunOptions {
            discussion: false,
            validation: true,
        });
        no_discussion.tracker.complete(Stage::Research).unwrap();
        no_discussion.tracker.complete(Stage::Analysis).unwrap();
        assert_eq!(no_discussion.next_stage(), Some(Stage::Validation));
    }

    #[test]
    fn test_incomplete_run_has_no_record() {
        let run = run_with(RunOptions::default());
        match run.into_record() {
            Err(PipelineError::Incomplete(DeliberationPhase::Idle)) => {}
            other => panic!("expected Incomplete, got {:?}", other.map(|_| ())),
        }
    }
}
