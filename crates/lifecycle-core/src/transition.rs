//! Allowed lifecycle state transitions.
//!
//! ```text
//! new        -> processing, holded, canceled, complete
//! processing -> complete, holded, canceled
//! complete   -> closed
//! holded     -> processing, canceled, complete
//! closed     -> (terminal)
//! ```
//!
//! A state may always transition to itself. States without a row (currently
//! only `canceled`) accept every target.

use lifecycle_types::LifecycleState;
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Raised when a requested transition is not in the table.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
	#[error("Status transition from \"{from}\" to \"{to}\" is not allowed.")]
	NotAllowed {
		from: LifecycleState,
		to: LifecycleState,
	},
}

static TRANSITIONS: Lazy<HashMap<LifecycleState, HashSet<LifecycleState>>> = Lazy::new(|| {
	use LifecycleState::*;

	let mut m = HashMap::new();
	m.insert(New, HashSet::from([Processing, Holded, Canceled, Complete]));
	m.insert(Processing, HashSet::from([Complete, Holded, Canceled]));
	m.insert(Complete, HashSet::from([Closed]));
	m.insert(Holded, HashSet::from([Processing, Canceled, Complete]));
	m.insert(Closed, HashSet::new()); // terminal
	m
});

/// Stateless checker over the static transition table.
pub struct TransitionValidator;

impl TransitionValidator {
	/// Whether `from -> to` may be applied.
	pub fn is_allowed(from: LifecycleState, to: LifecycleState) -> bool {
		if from == to {
			return true;
		}

		match Self::allowed_targets(from) {
			Some(targets) => targets.contains(&to),
			None => {
				tracing::info!(
					from = %from,
					to = %to,
					"No specific rules for state {}, allowing transition",
					from
				);
				true
			},
		}
	}

	pub fn validate(from: LifecycleState, to: LifecycleState) -> Result<(), TransitionError> {
		if Self::is_allowed(from, to) {
			Ok(())
		} else {
			Err(TransitionError::NotAllowed { from, to })
		}
	}

	/// Targets listed for `from`, or `None` when `from` is unrestricted.
	fn allowed_targets(from: LifecycleState) -> Option<&'static HashSet<LifecycleState>> {
		TRANSITIONS.get(&from)
	}
}
