#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hortator-core: shared types for the Hortator agent-orchestration control plane.

pub mod macros;

pub mod capability;
pub mod clock;
pub mod constants;
pub mod crd;
pub mod duration;
pub mod phase;
pub mod quantity;
pub mod spec;
pub mod status;
pub mod tier;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use capability::{check_escalation, effective_capabilities, escalation_message, EscalationCheck, SPAWN};
pub use clock::{Clock, FakeClock, SystemClock};
pub use crd::{Role, RoleSpec};
pub use duration::{format_days, parse_duration, DurationParseError};
pub use phase::Phase;
pub use quantity::{validate_quantity, InvalidQuantity};
pub use spec::{
    BudgetSpec, EnvVarSpec, HealthSpec, ModelRef, ResourceSpec, RetrySpec, StorageSpec, Task,
    TaskSpec,
};
pub use status::{AttemptRecord, TaskStatus, TokenUsage, OUTPUT_TRUNCATE_BYTES};
pub use tier::Tier;
