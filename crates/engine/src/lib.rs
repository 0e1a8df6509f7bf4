#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hortator-engine: reconciliation logic for the Hortator agent-orchestration
//! control plane. Substrate-agnostic over [`hortator_substrate::Substrate`]
//! and time-agnostic over [`hortator_core::Clock`], so it runs the same way
//! against a real cluster or an in-memory fake (§4.1).

pub mod defaults_cache;
pub mod error;
pub mod gc;
pub mod hierarchy;
pub mod injector;
pub mod policy;
pub mod price_map;
pub mod reconcile;
pub mod result_cache;
pub mod retry;
pub mod stuck;
pub mod trace;
pub mod warm_pool;

pub use defaults_cache::{ClusterDefaults, DefaultsCache};
pub use error::ReconcileError;
pub use policy::AdmissionPolicy;
pub use price_map::PriceMap;
pub use reconcile::{NamespaceScope, Reconciler};
pub use result_cache::ResultCache;
pub use trace::TraceEvent;
pub use warm_pool::WarmPoolGate;
