//! The Sila (ethics) plugin pattern: critical rules veto, warnings are
//! logged, and a veto budget hard-stops the run once exhausted.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use agentlom_core::model::Delta;

use super::{Plugin, PluginContext, Veto};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSeverity {
    Critical,
    Warning,
}

pub struct SilaRule {
    pub id: String,
    pub description: String,
    pub evaluate: Box<dyn Fn(&Delta) -> bool + Send + Sync>,
    pub severity: RuleSeverity,
}

/// Ethics gate: critical rule matches veto the iteration; warning matches
/// are only logged. Once `vetoes_issued` reaches `max_vetoes`, every
/// subsequent iteration is vetoed unconditionally.
pub struct SilaPlugin {
    rules: Vec<SilaRule>,
    max_vetoes: u32,
    vetoes_issued: AtomicU32,
    warnings_log: Mutex<Vec<String>>,
}

impl SilaPlugin {
    pub fn new(rules: Vec<SilaRule>, max_vetoes: u32) -> Self {
        Self {
            rules,
            max_vetoes,
            vetoes_issued: AtomicU32::new(0),
            warnings_log: Mutex::new(Vec::new()),
        }
    }

    pub fn vetoes_issued(&self) -> u32 {
        self.vetoes_issued.load(Ordering::SeqCst)
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings_log.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Plugin for SilaPlugin {
    fn name(&self) -> &str {
        "sila"
    }

    async fn after_delta(&self, _ctx: &PluginContext, delta: &Delta) -> Option<Veto> {
        if self.vetoes_issued() >= self.max_vetoes {
            self.vetoes_issued.fetch_add(1, Ordering::SeqCst);
            tracing::warn!("sila veto budget exhausted, hard-stopping iteration");
            return Some(Veto {
                reason: "max ethical vetoes reached".to_string(),
            });
        }

        for rule in &self.rules {
            if (rule.evaluate)(delta) {
                match rule.severity {
                    RuleSeverity::Critical => {
                        self.vetoes_issued.fetch_add(1, Ordering::SeqCst);
                        tracing::warn!(rule = %rule.id, "sila critical rule matched, vetoing");
                        return Some(Veto {
                            reason: format!("{}: {}", rule.id, rule.description),
                        });
                    }
                    RuleSeverity::Warning => {
                        tracing::info!(rule = %rule.id, "sila warning rule matched");
                        self.warnings_log
                            .lock()
                            .unwrap()
                            .push(format!("{}: {}", rule.id, rule.description));
                    }
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta_with(description: &str) -> Delta {
        Delta {
            description: description.to_string(),
            progress: 0.0,
            gaps: vec![],
            is_complete: false,
            suffering_delta: None,
            ego_noise: None,
        }
    }

    #[tokio::test]
    async fn critical_rule_matching_delete_vetoes() {
        let plugin = SilaPlugin::new(
            vec![SilaRule {
                id: "no-delete".to_string(),
                description: "refuses destructive deletes".to_string(),
                evaluate: Box::new(|d: &Delta| d.description.contains("delete")),
                severity: RuleSeverity::Critical,
            }],
            3,
        );
        let ctx = PluginContext {
            agent_id: "a".to_string(),
            step: 0,
        };
        let veto = plugin
            .after_delta(&ctx, &delta_with("I will delete production data"))
            .await;
        assert!(veto.is_some());
    }

    #[tokio::test]
    async fn warning_rule_does_not_veto_but_is_logged() {
        let plugin = SilaPlugin::new(
            vec![SilaRule {
                id: "caution".to_string(),
                description: "flags risky wording".to_string(),
                evaluate: Box::new(|d: &Delta| d.description.contains("risky")),
                severity: RuleSeverity::Warning,
            }],
            3,
        );
        let ctx = PluginContext {
            agent_id: "a".to_string(),
            step: 0,
        };
        let veto = plugin.after_delta(&ctx, &delta_with("this is risky")).await;
        assert!(veto.is_none());
        assert_eq!(plugin.warnings().len(), 1);
    }

    #[tokio::test]
    async fn hard_stops_once_max_vetoes_reached() {
        let plugin = SilaPlugin::new(
            vec![SilaRule {
                id: "no-delete".to_string(),
                description: "refuses destructive deletes".to_string(),
                evaluate: Box::new(|d: &Delta| d.description.contains("delete")),
                severity: RuleSeverity::Critical,
            }],
            1,
        );
        let ctx = PluginContext {
            agent_id: "a".to_string(),
            step: 0,
        };
        assert!(plugin.after_delta(&ctx, &delta_with("delete")).await.is_some());
        // second call: max_vetoes already reached, vetoes unconditionally regardless of content
        let veto = plugin.after_delta(&ctx, &delta_with("harmless")).await.unwrap();
        assert_eq!(veto.reason, "max ethical vetoes reached");
    }
}
