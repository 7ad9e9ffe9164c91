//! The restore hook: fetch rules, rewrite the resource, advance the Pod's
//! volume restores.
//!
//! Only a substitution failure fails an invocation. Missing rules pass the
//! resource through unchanged, and advancement problems are logged and
//! reported in [`Execution::advancement`] without touching the result.

use crate::advance::{AdvanceError, AdvanceSummary, StatusAdvancer};
use crate::config::HookConfig;
use crate::errors::ErrorCode;
use crate::protocol::ResourceSelector;
use crate::store::{RuleSource, StoreError, VolumeRestoreStore};
use crate::substitution::{self, RuleConflict, RuleSet, SubstitutionError};
use crate::types::Resource;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Fatal errors for one invocation.
#[derive(Debug, Error)]
pub enum HookError {
    #[error(transparent)]
    Substitution(#[from] SubstitutionError),
}

impl HookError {
    pub fn code(&self) -> ErrorCode {
        match self {
            HookError::Substitution(e) => e.code(),
        }
    }
}

/// How the rule set for an invocation was resolved.
#[derive(Debug)]
pub enum RulesOutcome {
    /// Rules were applied.
    Applied { count: usize },
    /// The source returned no rules.
    Empty,
    /// The source failed.
    Unavailable(StoreError),
    /// Strict mode refused an order-dependent rule set.
    Rejected(Vec<RuleConflict>),
}

/// Result of the volume-restore side effect.
#[derive(Debug)]
pub enum AdvanceOutcome {
    /// The resource is not a Pod, or no substitution happened.
    NotApplicable,
    Advanced(AdvanceSummary),
    Failed(AdvanceError),
}

/// Everything one successful invocation produced.
#[derive(Debug)]
pub struct Execution {
    /// The resource to hand back to the host.
    pub item: Resource,
    pub rules: RulesOutcome,
    pub advancement: AdvanceOutcome,
}

impl Execution {
    fn passthrough(item: Resource, rules: RulesOutcome) -> Self {
        Self {
            item,
            rules,
            advancement: AdvanceOutcome::NotApplicable,
        }
    }
}

/// One hook instance. Holds its client handles for the life of the process
/// and keeps no state between invocations.
pub struct RestoreHook {
    rules: Arc<dyn RuleSource>,
    advancer: StatusAdvancer,
    config: HookConfig,
}

impl RestoreHook {
    pub fn new(
        rules: Arc<dyn RuleSource>,
        store: Arc<dyn VolumeRestoreStore>,
        config: HookConfig,
    ) -> Self {
        let advancer = StatusAdvancer::new(store, config.correlation.clone());
        Self {
            rules,
            advancer,
            config,
        }
    }

    pub fn config(&self) -> &HookConfig {
        &self.config
    }

    /// The hook handles every resource kind.
    pub fn applies_to(&self) -> ResourceSelector {
        ResourceSelector::all()
    }

    /// Fetch the current rule set from the rule source.
    pub async fn load_rules(&self) -> Result<RuleSet, StoreError> {
        self.rules.fetch_rules(&self.config.rules.selector).await
    }

    /// Process one resource.
    pub async fn execute(&self, item: Resource) -> Result<Execution, HookError> {
        info!("Executing restore hook on {}", item.describe());

        let rules = match self.load_rules().await {
            Ok(rules) if rules.is_empty() => {
                info!("No substitution rules found; passing {} through", item.describe());
                return Ok(Execution::passthrough(item, RulesOutcome::Empty));
            }
            Ok(rules) => rules,
            Err(e) => {
                warn!(
                    "[{}] Could not fetch substitution rules, passing {} through: {}",
                    e.code().code_string(),
                    item.describe(),
                    e
                );
                return Ok(Execution::passthrough(item, RulesOutcome::Unavailable(e)));
            }
        };

        let conflicts = rules.conflicts();
        if !conflicts.is_empty() {
            let code = ErrorCode::RulesConflict.code_string();
            for conflict in &conflicts {
                warn!("[{}] {}", code, conflict);
            }
            if self.config.rules.strict {
                warn!(
                    "[{}] Refusing {} overlapping rules in strict mode; passing {} through",
                    code,
                    conflicts.len(),
                    item.describe()
                );
                return Ok(Execution::passthrough(item, RulesOutcome::Rejected(conflicts)));
            }
        }

        debug!("Applying {} substitution rules", rules.len());
        let updated = substitution::apply(&item, &rules)?;
        let rules_outcome = RulesOutcome::Applied { count: rules.len() };

        if !updated.is_pod() {
            return Ok(Execution {
                item: updated,
                rules: rules_outcome,
                advancement: AdvanceOutcome::NotApplicable,
            });
        }

        let advancement = match self.advancer.advance(&updated).await {
            Ok(summary) => {
                debug!(
                    "Advanced {} of {} volume restores for {}",
                    summary.advanced.len(),
                    summary.listed,
                    updated.describe()
                );
                AdvanceOutcome::Advanced(summary)
            }
            Err(e) => {
                warn!(
                    "[{}] Volume restore advancement for {} failed: {}",
                    e.code().code_string(),
                    updated.describe(),
                    e
                );
                AdvanceOutcome::Failed(e)
            }
        };

        Ok(Execution {
            item: updated,
            rules: rules_outcome,
            advancement,
        })
    }
}
