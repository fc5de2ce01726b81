//! Ordered lifecycle hooks with a veto protocol that can skip an action
//! without aborting the run.

pub mod dana;
pub mod sila;
pub mod virya;

use agentlom_core::model::{Action, Delta, ToolResult};
use agentlom_core::self_model::EvolutionRecord;

/// Context handed to every hook. Deliberately minimal and read-only: plugins
/// never reach back into the kernel, avoiding a referential cycle between
/// the kernel, milestone runner, and memory stores.
#[derive(Debug, Clone)]
pub struct PluginContext {
    pub agent_id: String,
    pub step: u64,
}

/// `afterDelta`'s outcome: either nothing, or a veto with a reason.
#[derive(Debug, Clone)]
pub struct Veto {
    pub reason: String,
}

/// A named bundle of optional lifecycle hooks. Every method has a no-op
/// default so a plugin only implements what it needs.
#[async_trait::async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    /// Invoked synchronously (awaited) once, at registration time.
    async fn install(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn before_observe(&self, _ctx: &PluginContext) {}

    /// May veto: returning `Some(Veto)` skips decide+execute for this
    /// iteration. Only the first veto wins; later plugins still run so
    /// their own bookkeeping stays consistent.
    async fn after_delta(&self, _ctx: &PluginContext, _delta: &Delta) -> Option<Veto> {
        None
    }

    /// Extra system-prompt sections to append before `decide`.
    async fn before_decide(&self, _ctx: &PluginContext) -> Vec<String> {
        Vec::new()
    }

    async fn after_action(&self, _ctx: &PluginContext, _action: &Action, _result: &ToolResult) {}

    async fn on_evolution(&self, _ctx: &PluginContext, _record: &EvolutionRecord) {}

    /// Best-effort: exceptions here are swallowed by the pipeline.
    async fn on_error(&self, _ctx: &PluginContext, _error: &str) {}
}

/// Ordered list of registered plugins, invoked in registration order.
#[derive(Default)]
pub struct PluginPipeline {
    plugins: Vec<std::sync::Arc<dyn Plugin>>,
}

impl PluginPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends to the ordered list and runs the plugin's install hook.
    pub async fn use_plugin(&mut self, plugin: std::sync::Arc<dyn Plugin>) -> anyhow::Result<()> {
        plugin.install().await?;
        self.plugins.push(plugin);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub async fn before_observe(&self, ctx: &PluginContext) {
        for plugin in &self.plugins {
            plugin.before_observe(ctx).await;
        }
    }

    /// Runs every plugin's `after_delta` (so stateful plugins like Sila keep
    /// an accurate veto count) and returns the first veto encountered, if any.
    pub async fn after_delta(&self, ctx: &PluginContext, delta: &Delta) -> Option<Veto> {
        let mut first_veto = None;
        for plugin in &self.plugins {
            if let Some(veto) = plugin.after_delta(ctx, delta).await {
                if first_veto.is_none() {
                    first_veto = Some(veto);
                }
            }
        }
        first_veto
    }

    pub async fn before_decide(&self, ctx: &PluginContext) -> Vec<String> {
        let mut sections = Vec::new();
        for plugin in &self.plugins {
            sections.extend(plugin.before_decide(ctx).await);
        }
        sections
    }

    pub async fn after_action(&self, ctx: &PluginContext, action: &Action, result: &ToolResult) {
        for plugin in &self.plugins {
            plugin.after_action(ctx, action, result).await;
        }
    }

    pub async fn on_evolution(&self, ctx: &PluginContext, record: &EvolutionRecord) {
        for plugin in &self.plugins {
            plugin.on_evolution(ctx, record).await;
        }
    }

    /// Best-effort: each plugin's `on_error` runs independently and its own
    /// panics/errors never escape (hooks here return nothing to catch).
    pub async fn on_error(&self, ctx: &PluginContext, error: &str) {
        for plugin in &self.plugins {
            plugin.on_error(ctx, error).await;
        }
    }
}
