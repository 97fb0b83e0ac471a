//! Optional observability helpers for identity flows.
//!
//! # Feature Flags
//!
//! - Enable `tracing` (on by default) to emit structured spans named `chatshare_identity.flow`
//!   with the `flow` and `stage` fields, plus the warn/error events raised by swallowed
//!   mirror failures, rejected requests, and rolled-back deletions.
//! - Enable `metrics` to increment the `chatshare_identity_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`.

mod metrics;
mod tracing;

pub use self::{metrics::*, tracing::*};

// self
use crate::_prelude::*;

/// Flow kinds observed by the service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// State issuance and authorize URL construction.
	BeginAuthorization,
	/// Callback handling from state validation through reconciliation.
	CompleteAuthorization,
	/// Rate-limit gate evaluation.
	RateLimit,
	/// Account deletion cascade.
	AccountDeletion,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::BeginAuthorization => "begin_authorization",
			FlowKind::CompleteAuthorization => "complete_authorization",
			FlowKind::RateLimit => "rate_limit",
			FlowKind::AccountDeletion => "account_deletion",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a flow.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
