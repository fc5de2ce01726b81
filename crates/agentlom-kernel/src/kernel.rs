//! The agent kernel. `Agent` owns the goal, milestone runner, memory
//! stack, self-model, and plugin pipeline, and drives the main loop.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use agentlom_core::config::{EvolutionConfig, KernelLimits, MemoryConfig, PathsConfig, PersistenceConfig};
use agentlom_core::error::{AgentError, AgentResult};
use agentlom_core::events::{AgentEvent, EventSink, NullSink};
use agentlom_core::llm::{ChatMessage, LlmAdapter};
use agentlom_core::memory_model::SkillEntry;
use agentlom_core::model::{Action, Goal, Milestone, Observation, Snapshot};
use agentlom_core::self_model::SelfModel;
use agentlom_core::tool::ToolRegistry;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;

use crate::causal::{analyze_causality, ActionRing, RecentAction};
use crate::decision::{run_seven_factor, run_single_pass, SevenFactorInputs, SinglePassInputs};
use crate::delta::compute_delta;
use crate::dispatch::dispatch;
use crate::failure_recording::{build_failure_entry, build_karma_entry, compose_failure, TanhaDetector};
use crate::memory::{FailureStore, HierarchicalMemory, KarmaStore, SkillStore};
use crate::milestone::{MilestoneRunner, ResetCallback};
use crate::persistence::ThrottledWriter;
use crate::plugins::{PluginContext, PluginPipeline};

const RETRIEVAL_TOP_K: usize = 3;
const HABITUAL_MIN_OCCURRENCES: u32 = 3;

/// A caller-provided function producing the current snapshot. Fallible:
/// snapshot failures surface as [`AgentError::Snapshot`].
#[async_trait::async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn snapshot(&self) -> anyhow::Result<Snapshot>;
}

/// Stand-in used when no [`ResetCallback`] is configured, so the milestone
/// runner always advances through the same retry path regardless.
struct NoopResetCallback;

#[async_trait::async_trait]
impl ResetCallback for NoopResetCallback {
    async fn reset(&self, _failures: &[agentlom_core::memory_model::FailureEntry]) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Everything the kernel needs beyond the goal itself. Memory stores and the
/// karma store are optional: presence of a karma store is what activates the
/// Seven-Factor decision pipeline.
pub struct AgentConfig {
    pub goal: Goal,
    pub milestones: Vec<Milestone>,
    pub llm: Arc<dyn LlmAdapter>,
    pub tools: ToolRegistry,
    pub snapshot_source: Arc<dyn SnapshotSource>,
    pub skill_store: Option<Arc<SkillStore>>,
    pub failure_store: Option<Arc<FailureStore>>,
    pub karma_store: Option<Arc<KarmaStore>>,
    pub hierarchical_memory: Option<Arc<HierarchicalMemory>>,
    pub reset_callback: Option<Arc<dyn ResetCallback>>,
    pub plugins: PluginPipeline,
    pub event_sink: Arc<dyn EventSink>,
    pub kernel_limits: KernelLimits,
    pub memory_config: MemoryConfig,
    pub evolution_config: EvolutionConfig,
    pub paths: PathsConfig,
    pub persistence: PersistenceConfig,
}

impl AgentConfig {
    pub fn new(goal: Goal, llm: Arc<dyn LlmAdapter>, snapshot_source: Arc<dyn SnapshotSource>) -> Self {
        Self {
            goal,
            milestones: Vec::new(),
            llm,
            tools: ToolRegistry::new(),
            snapshot_source,
            skill_store: None,
            failure_store: None,
            karma_store: None,
            hierarchical_memory: None,
            reset_callback: None,
            plugins: PluginPipeline::new(),
            event_sink: Arc::new(NullSink),
            kernel_limits: KernelLimits::default(),
            memory_config: MemoryConfig::default(),
            evolution_config: EvolutionConfig::default(),
            paths: PathsConfig::default(),
            persistence: PersistenceConfig::default(),
        }
    }
}

/// `getState()`'s serializable snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct AgentState {
    pub goal_description: String,
    pub milestone_index: usize,
    pub step_count: u64,
    pub last_snapshot: Option<Snapshot>,
    pub last_delta_description: Option<String>,
    pub failure_count: usize,
    pub tanha_loop_detected: bool,
    pub bias_score: f64,
    pub mindfulness_level: f64,
}

struct RunState {
    chat_history: Vec<ChatMessage>,
    last_snapshot: Option<Snapshot>,
    last_delta_description: Option<String>,
    bias_score: f64,
    mindfulness_level: f64,
    milestone_index: usize,
    action_ring: ActionRing,
    tanha: TanhaDetector,
}

impl RunState {
    fn new(tanha_threshold: usize) -> Self {
        Self {
            chat_history: Vec::new(),
            last_snapshot: None,
            last_delta_description: None,
            bias_score: 0.1,
            mindfulness_level: 0.9,
            milestone_index: 0,
            action_ring: ActionRing::new(),
            tanha: TanhaDetector::new(tanha_threshold),
        }
    }
}

/// The goal/snapshot/delta loop, tool dispatch, retry/backoff, memory stack,
/// self-model, and plugin pipeline, wired together into one run loop.
pub struct Agent {
    config: AgentConfig,
    running: AtomicBool,
    stop_requested: AtomicBool,
    step_count: AtomicU64,
    self_model: AsyncMutex<SelfModel>,
    state: AsyncMutex<RunState>,
    state_writer: Option<ThrottledWriter>,
    self_model_writer: Option<ThrottledWriter>,
}

impl Agent {
    pub fn new(config: AgentConfig) -> Self {
        let tanha_threshold = config.kernel_limits.tanha_threshold;
        let state_writer = config
            .paths
            .state_path
            .as_ref()
            .map(|p| ThrottledWriter::new(p, config.persistence.throttle_ms));
        let self_model_writer = config
            .paths
            .self_model_path
            .as_ref()
            .map(|p| ThrottledWriter::new(p, config.persistence.throttle_ms));
        if let (Some(memory), Some(dir)) = (&config.hierarchical_memory, &config.paths.memory_dir) {
            if let Err(e) = memory.load(std::path::Path::new(dir)) {
                tracing::warn!(error = %e, dir, "failed to load hierarchical memory, starting empty");
            }
        }
        Self {
            config,
            running: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            step_count: AtomicU64::new(0),
            self_model: AsyncMutex::new(SelfModel::default()),
            state: AsyncMutex::new(RunState::new(tanha_threshold)),
            state_writer,
            self_model_writer,
        }
    }

    pub fn add_tool(&mut self, tool: Arc<dyn agentlom_core::tool::Tool>) {
        self.config.tools.add(tool);
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.config.tools.names()
    }

    pub async fn self_model(&self) -> SelfModel {
        self.self_model.lock().await.clone()
    }

    pub async fn state(&self) -> AgentState {
        let state = self.state.lock().await;
        AgentState {
            goal_description: self.config.goal.description.clone(),
            milestone_index: state.milestone_index,
            step_count: self.step_count.load(Ordering::SeqCst),
            last_snapshot: state.last_snapshot.clone(),
            last_delta_description: state.last_delta_description.clone(),
            failure_count: self
                .config
                .failure_store
                .as_ref()
                .map(|s| s.list().len())
                .unwrap_or(0),
            tanha_loop_detected: state.tanha.is_detected(),
            bias_score: state.bias_score,
            mindfulness_level: state.mindfulness_level,
        }
    }

    /// `stop()` takes effect at the top of the next iteration.
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    fn emit(&self, event: AgentEvent) {
        self.config.event_sink.on_event(&event);
    }

    /// Runs the main loop to completion: goal satisfied, step budget
    /// exhausted, or `stop()` requested. Returns `Err` only on an unhandled
    /// error, after emitting `agent:error` and attempting a recovery save.
    pub async fn run(&mut self) -> AgentResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("run() called while another run is already in flight");
            return Err(AgentError::AlreadyRunning);
        }
        tracing::info!(goal = %self.config.goal.description, "agent run starting");
        let result = self.run_inner().await;
        self.running.store(false, Ordering::SeqCst);
        if let Err(ref e) = result {
            let step = self.step_count.load(Ordering::SeqCst);
            tracing::error!(step, error = %e, "agent run aborted");
            self.emit(AgentEvent::AgentError {
                step,
                message: e.to_string(),
            });
            let ctx = PluginContext {
                agent_id: self.config.goal.description.clone(),
                step,
            };
            self.config.plugins.on_error(&ctx, &e.to_string()).await;
            let state = self.state().await;
            if let Some(writer) = &self.state_writer {
                writer.save_force(&state);
            }
        }
        result
    }

    async fn run_inner(&self) -> AgentResult<()> {
        self.emit(AgentEvent::AgentStart);
        let mut milestone_runner = MilestoneRunner::new(self.config.milestones.clone());

        loop {
            if self.stop_requested.load(Ordering::SeqCst) {
                break;
            }
            if self.step_count.load(Ordering::SeqCst) >= self.config.kernel_limits.max_steps as u64 {
                break;
            }

            if !self.run_iteration(&mut milestone_runner).await? {
                break;
            }
        }

        self.finalize().await;
        self.emit(AgentEvent::AgentComplete {
            total_steps: self.step_count.load(Ordering::SeqCst),
        });
        Ok(())
    }

    /// Runs one loop iteration. Returns `Ok(false)` to signal a clean exit
    /// (goal complete, or decide returned no action).
    async fn run_iteration(&self, milestone_runner: &mut MilestoneRunner) -> AgentResult<bool> {
        let ctx = PluginContext {
            agent_id: self.config.goal.description.clone(),
            step: self.step_count.load(Ordering::SeqCst),
        };
        self.config.plugins.before_observe(&ctx).await;

        // Step 1: observe.
        let snapshot = self
            .config
            .snapshot_source
            .snapshot()
            .await
            .map_err(AgentError::Snapshot)?;
        let tanha_loop_detected = {
            let state = self.state.lock().await;
            state.tanha.is_detected()
        };
        let observation = Observation::capture(snapshot.clone(), tanha_loop_detected);
        {
            let mut state = self.state.lock().await;
            state.last_snapshot = Some(snapshot.clone());
            state.bias_score = observation.bias_score;
            state.mindfulness_level = observation.mindfulness_level;
        }
        self.emit(AgentEvent::ObservationCaptured(observation));

        // Step 2: compute delta.
        let current_milestone = milestone_runner.current().cloned();
        let delta = compute_delta(
            &self.config.goal,
            &snapshot,
            current_milestone.as_ref(),
            tanha_loop_detected,
            &self.config.llm,
            self.config.kernel_limits.max_retries,
        )
        .await
        .map_err(|source| AgentError::LlmTransport {
            retries: self.config.kernel_limits.max_retries,
            source,
        })?;
        {
            let mut state = self.state.lock().await;
            state.last_delta_description = Some(delta.description.clone());
        }
        if delta.has_suffering_metrics() {
            self.emit(AgentEvent::DukkhaEvaluated { delta: delta.clone() });
        }

        // Step 3: exit on completion.
        if delta.is_complete {
            tracing::info!(step = self.step_count.load(Ordering::SeqCst), "delta reports goal complete");
            return Ok(false);
        }

        // Step 4: milestone check.
        if milestone_runner
            .check_reached(
                &snapshot,
                &self.config.llm,
                &self.config.goal,
                self.config.kernel_limits.max_retries,
            )
            .await
            .unwrap_or(false)
        {
            let previous_id = current_milestone.as_ref().map(|m| m.id.clone()).unwrap_or_default();
            let failures = self
                .config
                .failure_store
                .as_ref()
                .map(|s| s.export_current())
                .unwrap_or_default();
            let noop_callback = NoopResetCallback;
            let callback: &dyn ResetCallback = match &self.config.reset_callback {
                Some(callback) => callback.as_ref(),
                None => &noop_callback,
            };
            match milestone_runner.reset(&failures, callback).await {
                Ok((prev, next)) => {
                    tracing::info!(previous = %prev, next = ?next, "milestone reached, context reset");
                    self.emit(AgentEvent::MilestoneReached { milestone_id: prev.clone() });
                    self.emit(AgentEvent::ContextReset {
                        previous_milestone: prev,
                        next_milestone: next,
                    });
                    let mut state = self.state.lock().await;
                    state.chat_history.clear();
                    state.last_delta_description = None;
                    state.milestone_index = milestone_runner.current_index();
                }
                Err(e) => {
                    tracing::error!(milestone = %previous_id, error = %e, "milestone reset failed after retries");
                    self.emit(AgentEvent::MilestoneFailed {
                        milestone_id: previous_id,
                        reason: e.to_string(),
                    });
                    return Err(AgentError::MilestoneReset {
                        attempts: 4,
                        source: e,
                    });
                }
            }
        }

        // Step 5: plugin veto gate.
        if let Some(veto) = self.config.plugins.after_delta(&ctx, &delta).await {
            tracing::warn!(reason = %veto.reason, "plugin vetoed iteration");
            self.emit(AgentEvent::PluginVeto {
                plugin: "after_delta".to_string(),
                reason: veto.reason,
            });
            return Ok(true);
        }

        // Step 6/7: decide.
        let extra_sections = self.config.plugins.before_decide(&ctx).await;
        let action = self.decide(&delta, extra_sections).await?;
        let Some(action) = action else {
            return Ok(false);
        };

        // Step 8: step budget + action:start.
        let step = self.step_count.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(step, tool = %action.tool_name, "dispatching action");
        self.emit(AgentEvent::ActionStart { step, action: action.clone() });

        // Step 9: dispatch.
        let result = {
            let mut state = self.state.lock().await;
            dispatch(&action, &self.config.tools, &mut state.chat_history).await
        };
        self.config.plugins.after_action(&ctx, &action, &result).await;
        self.emit(AgentEvent::ActionComplete {
            step,
            action: action.clone(),
            result: result.clone(),
        });

        // Step 10: self-model, causal analysis, failure recording.
        self.record_step_outcome(&action, &result, &delta, step).await;

        if let Some(writer) = &self.state_writer {
            writer.save(&self.state().await);
        }

        Ok(true)
    }

    async fn decide(&self, delta: &agentlom_core::model::Delta, extra_sections: Vec<String>) -> AgentResult<Option<Action>> {
        let skills = self
            .config
            .skill_store
            .as_ref()
            .map(|s| s.retrieve(&delta.description, None, RETRIEVAL_TOP_K))
            .unwrap_or_default();
        let failures = self
            .config
            .failure_store
            .as_ref()
            .map(|s| s.retrieve(&delta.description, None, RETRIEVAL_TOP_K))
            .unwrap_or_default();
        let tool_definitions = self.config.tools.definitions();
        let self_model = self.self_model.lock().await;
        let active_strategies = self_model.active_strategies.clone();
        drop(self_model);

        let mut state = self.state.lock().await;
        if let Some(karma_store) = &self.config.karma_store {
            let karma = karma_store.retrieve(&delta.description, None, RETRIEVAL_TOP_K);
            let habitual = karma_store.habitual_patterns(HABITUAL_MIN_OCCURRENCES);
            let inputs = SevenFactorInputs {
                goal_description: &self.config.goal.description,
                delta,
                retrieved_skills: skills,
                retrieved_failures: failures,
                retrieved_karma: karma,
                habitual_patterns: habitual,
                active_strategies: &active_strategies,
                extra_sections,
                tool_definitions,
            };
            let (action, stages) = run_seven_factor(
                inputs,
                &mut state.chat_history,
                &self.config.llm,
                self.config.kernel_limits.max_retries,
            )
            .await
            .map_err(|source| AgentError::LlmTransport {
                retries: self.config.kernel_limits.max_retries,
                source,
            })?;
            drop(state);
            for stage in stages {
                self.emit(AgentEvent::AwakeningStage {
                    stage: stage.stage.to_string(),
                    output: stage.output,
                    confidence: stage.confidence,
                    filtered_prior: stage.filtered_prior,
                });
            }
            Ok(action)
        } else {
            let inputs = SinglePassInputs {
                goal_description: &self.config.goal.description,
                delta,
                retrieved_skills: skills,
                retrieved_failures: failures,
                active_strategies: &active_strategies,
                extra_sections,
                tool_definitions,
            };
            let action = run_single_pass(
                inputs,
                &mut state.chat_history,
                &self.config.llm,
                self.config.kernel_limits.max_retries,
            )
            .await
            .map_err(|source| AgentError::LlmTransport {
                retries: self.config.kernel_limits.max_retries,
                source,
            })?;
            Ok(action)
        }
    }

    async fn record_step_outcome(
        &self,
        action: &Action,
        result: &agentlom_core::model::ToolResult,
        delta: &agentlom_core::model::Delta,
        step: u64,
    ) {
        let suffering_delta = delta.suffering_delta.unwrap_or(0.0);
        let action_id = uuid::Uuid::new_v4().to_string();

        {
            let mut self_model = self.self_model.lock().await;
            self_model.record_tool_use(&action.tool_name, result.success, suffering_delta);
            self_model.push_suffering(suffering_delta, self.config.kernel_limits.suffering_window);
        }

        let mut state = self.state.lock().await;
        let previous = state.action_ring.previous().cloned();
        state.action_ring.push(RecentAction {
            id: action_id.clone(),
            tool_name: action.tool_name.clone(),
            success: result.success,
            step,
        });

        if !result.success {
            let error = result.error.clone().unwrap_or_else(|| "unknown error".to_string());
            let reasoning = action.reasoning.clone().unwrap_or_default();

            if let Some(previous) = previous {
                if let Some(outcome) = analyze_causality(&previous, &action_id, &self.config.llm).await {
                    self.emit(AgentEvent::CausalAnalyzed {
                        cause_id: outcome.cause_id.clone(),
                        effect_id: outcome.effect_id,
                        strength: outcome.strength,
                    });
                    if let Some(karma_store) = &self.config.karma_store {
                        if let Some(similar) = karma_store.most_similar(&reasoning) {
                            karma_store.merge_cause(&similar.id, &outcome.cause_id);
                        }
                    }
                }
            }

            let (proverb, condition) = compose_failure(&action.tool_name, &error, &reasoning);
            let outcome = state.tanha.record(&action.tool_name, &error);
            if outcome.newly_detected {
                tracing::warn!(pattern = %outcome.pattern, count = outcome.count, "tanha craving loop detected");
                self.emit(AgentEvent::TanhaLoopDetected {
                    pattern: outcome.pattern,
                    count: outcome.count,
                });
            }
            drop(state);

            let failure_id = uuid::Uuid::new_v4().to_string();
            let failure_entry = build_failure_entry(
                failure_id.clone(),
                proverb.clone(),
                condition,
                action.tool_name.clone(),
            );
            if let Some(failure_store) = &self.config.failure_store {
                failure_store.store(failure_entry.clone());
                self.emit(AgentEvent::FailureRecorded {
                    id: failure_id.clone(),
                    proverb: proverb.clone(),
                });
            }
            if let Some(karma_store) = &self.config.karma_store {
                // Stable per tool+error identity so repeated failures of the
                // same kind accumulate occurrences on one entry instead of
                // minting a fresh one every time.
                let karma_id = format!("{}:{}", action.tool_name, error);
                let causal_chain = {
                    let state = self.state.lock().await;
                    state.action_ring.failed_tail(5)
                };
                let occurrences = karma_store.bump_occurrence(&karma_id).unwrap_or(1);
                let karma_entry = match karma_store.get(&karma_id) {
                    Some(mut existing) => {
                        existing.occurrences = occurrences;
                        existing.severity = if occurrences >= 3 {
                            agentlom_core::memory_model::Severity::High
                        } else {
                            existing.severity
                        };
                        existing.transfer_weight = (0.3 + 0.1 * occurrences as f64).min(1.0);
                        existing.last_seen = chrono::Utc::now();
                        existing
                    }
                    None => build_karma_entry(
                        build_failure_entry(karma_id.clone(), proverb.clone(), failure_entry.condition.clone(), action.tool_name.clone()),
                        occurrences,
                        causal_chain,
                    ),
                };
                let karma_type = karma_entry.karma_type;
                karma_store.store(karma_entry);
                self.emit(AgentEvent::KarmaStored {
                    id: karma_id,
                    karma_type: format!("{karma_type:?}").to_lowercase(),
                });
            }
        }
    }

    async fn finalize(&self) {
        if let Some(karma_store) = &self.config.karma_store {
            karma_store.apply_impermanence(
                self.config.memory_config.karma_decay_rate,
                self.config.memory_config.karma_floor,
            );
        }

        if let Some(memory) = &self.config.hierarchical_memory {
            memory.consolidate();
            if let Some(dir) = &self.config.paths.memory_dir {
                if let Err(e) = memory.save(std::path::Path::new(dir)) {
                    tracing::warn!(error = %e, dir, "failed to save hierarchical memory");
                }
            }
        }

        let tanha_loop_detected = {
            let state = self.state.lock().await;
            state.tanha.is_detected()
        };
        let known_tools = self.config.tools.names();
        let mut self_model = self.self_model.lock().await;
        if let Some(record) = agentlom_evolution::evolve_if_needed(
            &mut self_model,
            &self.config.llm,
            &self.config.evolution_config,
            tanha_loop_detected,
            &known_tools,
        )
        .await
        {
            let ctx = PluginContext {
                agent_id: self.config.goal.description.clone(),
                step: self.step_count.load(Ordering::SeqCst),
            };
            tracing::info!(kind = ?record.proposal.kind, "self-model evolved");
            self.config.plugins.on_evolution(&ctx, &record).await;
            self.emit(AgentEvent::AnattaEvolved { record });
        }
        drop(self_model);

        if let Some(writer) = &self.self_model_writer {
            writer.save_force(&*self.self_model.lock().await);
        }
    }

    /// Records a skill directly, outside the main loop (e.g. seeded at
    /// startup). Emits `skill:acquired`.
    pub fn acquire_skill(&self, entry: SkillEntry) {
        if let Some(store) = &self.config.skill_store {
            let id = entry.id.clone();
            store.store(entry);
            self.emit(AgentEvent::SkillAcquired { id });
        }
    }
}
