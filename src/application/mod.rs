//! Application layer: the contribution flow and pool management.
//!
//! [`orchestrator::ContributionOrchestrator`] opens payments,
//! [`reconciler::WebhookReconciler`] settles them, and [`pools::PoolService`]
//! covers the pool lifecycle around them. All three work against the ports in
//! [`crate::domain::ports`].

pub mod orchestrator;
pub mod pools;
pub mod reconciler;
