//! End-to-end council runs against scripted in-process models.
//!
//! No inference endpoint or search backend is required: every model call is
//! routed by its system prompt to a canned reply, and every call is recorded.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use council_agents::config::SearchConfig;
use council_agents::{
    AgentFactory, CouncilClients, CouncilRun, DeliberationOrchestrator, ModelClient, ModelError,
    NoSearch, NoopObserver, PipelineError, ProgressObserver, RunOptions,
};
use deliberation::{
    check_verdict, ConsensusStatus, DeliberationPhase, DiscussionResponse, HistoryStore,
    InMemoryHistoryStore, Lens, SpecialistAnalysis, Stage,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Role {
    Scout,
    Analysis(Lens),
    Discussion(Lens),
    Validator,
    Manager,
}

impl Role {
    fn stage(self) -> Stage {
        match self {
            Role::Scout => Stage::Research,
            Role::Analysis(_) => Stage::Analysis,
            Role::Discussion(_) => Stage::Discussion,
            Role::Validator => Stage::Validation,
            Role::Manager => Stage::Synthesis,
        }
    }
}

fn role_of(system: &str) -> Role {
    if system.starts_with("You are The Scout") {
        return Role::Scout;
    }
    if system.starts_with("You are The Validator") {
        return Role::Validator;
    }
    if system.starts_with("You are The Manager") {
        return Role::Manager;
    }
    for lens in Lens::ALL {
        if system.starts_with(&format!("You are {},", lens.agent_name())) {
            return Role::Analysis(lens);
        }
        if system.starts_with(&format!("You are {}.", lens.agent_name())) {
            return Role::Discussion(lens);
        }
    }
    panic!("unrecognized system prompt: {}", &system[..system.len().min(60)]);
}

/// Routes each call by role to a canned reply. A role listed in `failures`
/// fails its first N calls with a 503. Tracks the peak number of calls in
/// flight per stage.
#[derive(Default)]
struct ScriptedModel {
    replies: HashMap<Role, String>,
    failures: HashMap<Role, usize>,
    delays_ms: HashMap<Role, u64>,
    calls: Mutex<Vec<(Role, String)>>,
    in_flight: AtomicUsize,
    peaks: Mutex<HashMap<Stage, usize>>,
}

impl ScriptedModel {
    fn standard(types: [&str; 3], verdict_type: &str) -> Self {
        let mut replies = HashMap::new();
        replies.insert(
            Role::Scout,
            r#"{"character_name": "X", "media_source": "Y",
                "biographical_facts": ["f1", "f2"],
                "key_quotes": [{"quote": "q", "context": "c"}],
                "summary": "s"}"#
                .to_string(),
        );
        for (lens, t) in Lens::ALL.into_iter().zip(types) {
            replies.insert(
                Role::Analysis(lens),
                format!(
                    "```json\n{{\"predicted_type\": \"{t}\", \"confidence\": 70, \"reasoning\": \"{} says {t}\"}}\n```",
                    lens.key()
                ),
            );
            replies.insert(
                Role::Discussion(lens),
                format!("{} stands by {t}.", lens.agent_name()),
            );
        }
        replies.insert(
            Role::Validator,
            r#"{"errors_found": [], "verified_correct": ["all claims"], "summary": "clean"}"#
                .to_string(),
        );
        replies.insert(
            Role::Manager,
            format!(r#"{{"final_type": "{verdict_type}", "confidence_score": 82, "summary": "done"}}"#),
        );
        Self {
            replies,
            ..Self::default()
        }
    }

    fn fail(mut self, role: Role, times: usize) -> Self {
        self.failures.insert(role, times);
        self
    }

    fn delay(mut self, role: Role, ms: u64) -> Self {
        self.delays_ms.insert(role, ms);
        self
    }

    /// Delay every analysis and discussion call by `ms`.
    fn slow_fan_out(mut self, ms: u64) -> Self {
        for lens in Lens::ALL {
            self = self
                .delay(Role::Analysis(lens), ms)
                .delay(Role::Discussion(lens), ms);
        }
        self
    }

    fn peak_in_flight(&self, stage: Stage) -> usize {
        self.peaks.lock().unwrap().get(&stage).copied().unwrap_or(0)
    }

    fn reply(mut self, role: Role, text: &str) -> Self {
        self.replies.insert(role, text.to_string());
        self
    }

    fn count(&self, role: Role) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(r, _)| *r == role)
            .count()
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn user_prompt(&self, role: Role) -> Option<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(r, _)| *r == role)
            .map(|(_, user)| user.clone())
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn invoke(&self, system: &str, user: &str) -> Result<String, ModelError> {
        let role = role_of(system);
        let attempt = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((role, user.to_string()));
            calls.iter().filter(|(r, _)| *r == role).count()
        };
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut peaks = self.peaks.lock().unwrap();
            let peak = peaks.entry(role.stage()).or_insert(0);
            *peak = (*peak).max(now);
        }
        if let Some(ms) = self.delays_ms.get(&role) {
            tokio::time::sleep(Duration::from_millis(*ms)).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if attempt <= self.failures.get(&role).copied().unwrap_or(0) {
            return Err(ModelError::Status {
                status: 503,
                body: "overloaded".into(),
            });
        }
        Ok(self.replies.get(&role).cloned().unwrap_or_default())
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

fn orchestrator(model: Arc<ScriptedModel>) -> DeliberationOrchestrator {
    let caps = SearchConfig {
        query_delay_ms: 0,
        ..SearchConfig::default()
    };
    DeliberationOrchestrator::new(AgentFactory::new(
        CouncilClients::uniform(model),
        Arc::new(NoSearch),
        caps,
    ))
}

#[derive(Default)]
struct CountingObserver {
    analyses: AtomicUsize,
    discussions: AtomicUsize,
    validations: AtomicUsize,
    phases: Mutex<Vec<DeliberationPhase>>,
}

impl ProgressObserver for CountingObserver {
    fn on_phase(&self, phase: DeliberationPhase) {
        self.phases.lock().unwrap().push(phase);
    }
    fn on_analysis(&self, _lens: Lens, _analysis: &SpecialistAnalysis) {
        self.analyses.fetch_add(1, Ordering::SeqCst);
    }
    fn on_discussion(&self, _lens: Lens, _response: &DiscussionResponse) {
        self.discussions.fetch_add(1, Ordering::SeqCst);
    }
    fn on_validation(&self, _report: &deliberation::ValidationReport) {
        self.validations.fetch_add(1, Ordering::SeqCst);
    }
}

const ALL_OFF: RunOptions = RunOptions {
    discussion: false,
    validation: false,
};

// ── Full runs ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_run_produces_one_record_per_lens() {
    let model = Arc::new(ScriptedModel::standard(["LIE", "LIE", "ILI"], "LIE"));
    let observer = CountingObserver::default();
    let run = orchestrator(model.clone())
        .run("X", "Y", RunOptions::default(), &observer)
        .await
        .unwrap();

    assert_eq!(
        run.phase_summary(),
        "idle -> fetched -> analyzed -> discussed -> validated -> synthesized"
    );
    let (record, metrics) = run.into_record().unwrap();

    assert_eq!(record.character_name, "X");
    assert_eq!(record.final_type, "LIE");
    assert_eq!(record.final_result.type_nickname, "Jack London");
    assert_eq!(record.council_results.len(), 3);
    assert_eq!(record.discussion_results.as_ref().map(|d| d.len()), Some(3));
    assert!(record.validation_results.is_some());
    assert!(!record.prompt_version.is_empty());

    assert_eq!(model.total_calls(), 9);
    assert_eq!(metrics.model_calls, 9);
    assert_eq!(metrics.failed_tasks, 0);
    assert_eq!(metrics.degraded_records, 0);

    assert_eq!(observer.analyses.load(Ordering::SeqCst), 3);
    assert_eq!(observer.discussions.load(Ordering::SeqCst), 3);
    assert_eq!(observer.validations.load(Ordering::SeqCst), 1);
    assert_eq!(
        observer.phases.lock().unwrap().last(),
        Some(&DeliberationPhase::Synthesized)
    );
}

#[tokio::test]
async fn analyses_carry_lens_identity_and_parsed_fields() {
    let model = Arc::new(
        ScriptedModel::standard(["LIE", "LIE", "ILI"], "LIE").reply(
            Role::Analysis(Lens::Dichotomies),
            r#"{"agent_name": "Someone Else", "predicted_type": "AAA", "confidence": 70, "reasoning": "r"}"#,
        ),
    );
    let run = orchestrator(model.clone())
        .run("X", "Y", ALL_OFF, &NoopObserver)
        .await
        .unwrap();
    let reinin = &run.analyses().unwrap()[&Lens::Dichotomies];
    assert_eq!(reinin.agent_name, "Agent Reinin");
    assert_eq!(reinin.predicted_type, "AAA");
    assert_eq!(reinin.confidence, 70);
    assert_eq!(reinin.reasoning, "r");

    let prompt = model.user_prompt(Role::Analysis(Lens::Dichotomies)).unwrap();
    assert!(prompt.contains("1. f1"));
    assert!(prompt.contains("2. f2"));
}

#[tokio::test]
async fn disabled_phases_are_skipped_and_omitted_from_synthesis() {
    let model = Arc::new(ScriptedModel::standard(["LIE", "SEE", "LIE"], "LIE"));
    let run = orchestrator(model.clone())
        .run("X", "Y", ALL_OFF, &NoopObserver)
        .await
        .unwrap();

    assert_eq!(run.phase_summary(), "idle -> fetched -> analyzed -> synthesized");
    assert!(run.discussion().is_none());
    assert!(run.validation().is_none());
    assert_eq!(model.total_calls(), 5);

    let synthesis = model.user_prompt(Role::Manager).unwrap();
    assert!(synthesis.contains("ALLOWED FINAL TYPES: LIE, SEE"));
    assert!(!synthesis.contains("AGENT DISCUSSION"));
    assert!(!synthesis.contains("VALIDATOR REPORT"));
}

#[tokio::test]
async fn synthesis_prompt_lists_only_proposed_types() {
    let model = Arc::new(ScriptedModel::standard(["AAA", "BBB", "AAA"], "AAA"));
    orchestrator(model.clone())
        .run("X", "Y", RunOptions::default(), &NoopObserver)
        .await
        .unwrap();

    let synthesis = model.user_prompt(Role::Manager).unwrap();
    assert!(synthesis.contains("ALLOWED FINAL TYPES: AAA, BBB"));
    assert!(!synthesis.contains("CCC"));
    assert!(synthesis.contains("=== AGENT DISCUSSION"));
    assert!(synthesis.contains("=== VALIDATOR REPORT"));
}

// ── Failure containment ──────────────────────────────────────────────────────

#[tokio::test]
async fn failed_discussion_call_is_contained_in_its_slot() {
    let model = Arc::new(
        ScriptedModel::standard(["LIE", "LIE", "ILI"], "LIE")
            .fail(Role::Discussion(Lens::Functions), usize::MAX),
    );
    let observer = CountingObserver::default();
    let run = orchestrator(model.clone())
        .run("X", "Y", RunOptions::default(), &observer)
        .await
        .unwrap();

    let discussion = run.discussion().unwrap();
    assert_eq!(discussion.len(), 3);
    let functions = &discussion[&Lens::Functions];
    assert!(functions.failed);
    assert!(functions.text.starts_with("Error during discussion:"));
    assert!(!discussion[&Lens::Dichotomies].failed);
    assert_eq!(observer.discussions.load(Ordering::SeqCst), 3);
    let discussed = observer
        .phases
        .lock()
        .unwrap()
        .iter()
        .filter(|p| **p == DeliberationPhase::Discussed)
        .count();
    assert_eq!(discussed, 1);
    assert!(run.is_complete());
    assert_eq!(run.metrics().failed_tasks, 1);
}

#[tokio::test]
async fn failed_specialist_becomes_error_record_and_is_not_allowed() {
    let model = Arc::new(
        ScriptedModel::standard(["LIE", "SEE", "ILI"], "LIE")
            .fail(Role::Analysis(Lens::QuadraValues), usize::MAX),
    );
    let run = orchestrator(model.clone())
        .run("X", "Y", ALL_OFF, &NoopObserver)
        .await
        .unwrap();

    let quadra = &run.analyses().unwrap()[&Lens::QuadraValues];
    assert_eq!(quadra.predicted_type, "Error");
    assert_eq!(quadra.confidence, 0);
    assert!(quadra.reasoning.starts_with("Error during analysis:"));

    let synthesis = model.user_prompt(Role::Manager).unwrap();
    assert!(synthesis.contains("ALLOWED FINAL TYPES: LIE, ILI"));
}

#[tokio::test]
async fn no_usable_specialist_skips_the_manager() {
    let model = Arc::new(
        ScriptedModel::standard(["LIE", "SEE", "ILI"], "LIE")
            .reply(Role::Analysis(Lens::Dichotomies), "no idea")
            .fail(Role::Analysis(Lens::QuadraValues), usize::MAX)
            .reply(Role::Analysis(Lens::Functions), "{\"predicted_type\": \"\"}"),
    );
    let run = orchestrator(model.clone())
        .run("X", "Y", ALL_OFF, &NoopObserver)
        .await
        .unwrap();

    assert_eq!(model.count(Role::Manager), 0);
    let verdict = run.verdict().unwrap();
    assert_eq!(verdict.final_type, "Unknown");
    assert!(verdict.is_degraded());
}

#[tokio::test]
async fn validation_transport_failure_names_the_phase_and_retries_alone() {
    let model = Arc::new(
        ScriptedModel::standard(["LIE", "LIE", "ILI"], "LIE").fail(Role::Validator, 1),
    );
    let orch = orchestrator(model.clone());
    let mut run = CouncilRun::new("X", "Y", RunOptions::default());

    let err = orch.resume(&mut run, &NoopObserver).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Phase {
            stage: Stage::Validation,
            ..
        }
    ));
    assert!(err.to_string().starts_with("validation phase failed"));
    assert!(err.is_retriable());
    assert_eq!(run.phase(), DeliberationPhase::Discussed);
    assert!(run.discussion().is_some());

    orch.resume(&mut run, &NoopObserver).await.unwrap();
    assert!(run.is_complete());
    assert_eq!(model.count(Role::Scout), 1);
    assert_eq!(model.count(Role::Analysis(Lens::Functions)), 1);
    assert_eq!(model.count(Role::Discussion(Lens::Dichotomies)), 1);
    assert_eq!(model.count(Role::Validator), 2);
    assert_eq!(run.metrics().retried_stages, 1);
}

#[tokio::test]
async fn research_failure_stops_before_analysis() {
    let model = Arc::new(
        ScriptedModel::standard(["LIE", "LIE", "ILI"], "LIE").fail(Role::Scout, usize::MAX),
    );
    let err = orchestrator(model.clone())
        .run("X", "Y", RunOptions::default(), &NoopObserver)
        .await
        .err()
        .unwrap();
    assert_eq!(err.stage(), Some(Stage::Research));
    assert_eq!(model.total_calls(), 1);
}

// ── Ordering and degraded output ─────────────────────────────────────────────

#[tokio::test]
async fn completion_order_does_not_change_results() {
    let fast = Arc::new(ScriptedModel::standard(["LIE", "SEE", "ILI"], "LIE"));
    let slow_first = Arc::new(
        ScriptedModel::standard(["LIE", "SEE", "ILI"], "LIE")
            .delay(Role::Analysis(Lens::Dichotomies), 60)
            .delay(Role::Analysis(Lens::QuadraValues), 30)
            .delay(Role::Discussion(Lens::Dichotomies), 40),
    );

    let a = orchestrator(fast.clone())
        .run("X", "Y", RunOptions::default(), &NoopObserver)
        .await
        .unwrap();
    let b = orchestrator(slow_first.clone())
        .run("X", "Y", RunOptions::default(), &NoopObserver)
        .await
        .unwrap();

    assert_eq!(a.analyses(), b.analyses());
    assert_eq!(a.discussion(), b.discussion());
    assert_eq!(
        fast.user_prompt(Role::Manager),
        slow_first.user_prompt(Role::Manager)
    );
    assert_eq!(
        fast.user_prompt(Role::Validator),
        slow_first.user_prompt(Role::Validator)
    );
}

#[tokio::test]
async fn fan_out_phases_keep_three_calls_in_flight() {
    let model = Arc::new(ScriptedModel::standard(["LIE", "SEE", "ILI"], "LIE").slow_fan_out(50));
    orchestrator(model.clone())
        .run("X", "Y", RunOptions::default(), &NoopObserver)
        .await
        .unwrap();

    assert_eq!(model.peak_in_flight(Stage::Analysis), 3);
    assert_eq!(model.peak_in_flight(Stage::Discussion), 3);
    assert_eq!(model.peak_in_flight(Stage::Research), 1);
    assert_eq!(model.peak_in_flight(Stage::Synthesis), 1);
}

#[tokio::test]
async fn max_parallel_one_serializes_fan_out() {
    let model = Arc::new(ScriptedModel::standard(["LIE", "SEE", "ILI"], "LIE").slow_fan_out(20));
    let run = orchestrator(model.clone())
        .with_max_parallel(1)
        .run("X", "Y", RunOptions::default(), &NoopObserver)
        .await
        .unwrap();

    assert_eq!(model.peak_in_flight(Stage::Analysis), 1);
    assert_eq!(model.peak_in_flight(Stage::Discussion), 1);
    assert_eq!(run.analyses().map(|a| a.len()), Some(3));
    assert_eq!(model.count(Role::Analysis(Lens::Functions)), 1);
}

#[tokio::test]
async fn zero_search_hits_still_yield_a_dossier() {
    let model = Arc::new(ScriptedModel::standard(["LIE", "LIE", "LIE"], "LIE"));
    let run = orchestrator(model.clone())
        .run("Nobody", "Nowhere", ALL_OFF, &NoopObserver)
        .await
        .unwrap();
    let dossier = run.dossier().unwrap();
    assert!(!dossier.biographical_facts.is_empty());
    assert!(dossier.summary.contains("background knowledge"));
    assert!(model
        .user_prompt(Role::Scout)
        .unwrap()
        .contains("No direct search results"));
}

#[tokio::test]
async fn invented_verdict_is_kept_and_flagged() {
    let model = Arc::new(ScriptedModel::standard(["LIE", "LIE", "ILI"], "ZZZ"));
    let run = orchestrator(model)
        .run("X", "Y", ALL_OFF, &NoopObserver)
        .await
        .unwrap();
    let verdict = run.verdict().unwrap();
    assert_eq!(verdict.final_type, "ZZZ");
    assert!(matches!(
        check_verdict(verdict, run.analyses().unwrap()),
        ConsensusStatus::Invented { .. }
    ));
}

#[tokio::test]
async fn malformed_synthesis_degrades_the_verdict() {
    let model = Arc::new(
        ScriptedModel::standard(["LIE", "LIE", "ILI"], "LIE")
            .reply(Role::Manager, "The answer is clearly LIE."),
    );
    let run = orchestrator(model)
        .run("X", "Y", ALL_OFF, &NoopObserver)
        .await
        .unwrap();
    let (record, metrics) = run.into_record().unwrap();
    assert_eq!(record.final_type, "Unknown");
    assert_eq!(record.final_result.confidence_score, 0);
    assert_eq!(
        record.final_result.raw_response.as_deref(),
        Some("The answer is clearly LIE.")
    );
    assert_eq!(metrics.degraded_records, 1);
}

// ── History ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn completed_run_round_trips_through_history() {
    let model = Arc::new(ScriptedModel::standard(["LIE", "LIE", "ILI"], "LIE"));
    let run = orchestrator(model)
        .run("X", "Y", RunOptions::default(), &NoopObserver)
        .await
        .unwrap();
    let (record, _) = run.into_record().unwrap();

    let store = InMemoryHistoryStore::new();
    let id = store.save(record.clone()).unwrap();
    let listed = store.list().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].final_type, "LIE");

    let loaded = store.load(&id).unwrap();
    assert_eq!(loaded, record);

    let json = record.to_json_pretty().unwrap();
    let back: deliberation::RunRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(back.council_results, record.council_results);
}
