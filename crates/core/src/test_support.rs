//! Builders used by this crate's own tests and by downstream crates under
//! the `test-support` feature.

use crate::spec::{RetrySpec, TaskSpec};
use crate::status::TaskStatus;
use crate::tier::Tier;
use std::collections::BTreeSet;

/// Builds a [`TaskSpec`] with sane test defaults, overridable field by field.
pub struct TaskSpecBuilder {
    spec: TaskSpec,
}

impl TaskSpecBuilder {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            spec: TaskSpec {
                prompt: prompt.into(),
                role: None,
                tier: Tier::Legionary,
                parent_task_id: None,
                capabilities: BTreeSet::new(),
                model: None,
                image: None,
                resources: Default::default(),
                storage: Default::default(),
                env: Vec::new(),
                budget: None,
                hierarchy_budget: None,
                retry: RetrySpec::default(),
                timeout_seconds: None,
                health: Default::default(),
            },
        }
    }

    pub fn tier(mut self, tier: Tier) -> Self {
        self.spec.tier = tier;
        self
    }

    pub fn parent(mut self, parent_task_id: impl Into<String>) -> Self {
        self.spec.parent_task_id = Some(parent_task_id.into());
        self
    }

    pub fn capability(mut self, capability: impl Into<String>) -> Self {
        self.spec.capabilities.insert(capability.into());
        self
    }

    pub fn capabilities<I: IntoIterator<Item = S>, S: Into<String>>(mut self, caps: I) -> Self {
        self.spec.capabilities = caps.into_iter().map(Into::into).collect();
        self
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.spec.retry.max_attempts = max_attempts;
        self
    }

    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.spec.role = Some(role.into());
        self
    }

    pub fn build(self) -> TaskSpec {
        self.spec
    }
}

/// A `TaskStatus` with the given phase and everything else defaulted.
pub fn status_with_phase(phase: crate::phase::Phase) -> TaskStatus {
    TaskStatus {
        phase,
        ..Default::default()
    }
}
