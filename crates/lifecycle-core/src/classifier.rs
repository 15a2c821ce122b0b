//! Raw status code to lifecycle state mapping.

use lifecycle_types::LifecycleState;

/// Maps a raw status code to its lifecycle state.
///
/// Total and deterministic. State names map to themselves, so classifying a
/// state's own code is a no-op. Unrecognized codes fall back to
/// [`LifecycleState::Processing`] with a warning.
pub fn classify(status_code: &str) -> LifecycleState {
	match known_state(status_code) {
		Some(state) => state,
		None => {
			tracing::warn!(
				status = %status_code,
				"Unknown status code {}, defaulting to processing state",
				status_code
			);
			LifecycleState::Processing
		},
	}
}

fn known_state(status_code: &str) -> Option<LifecycleState> {
	match status_code {
		"pending" | "pending_payment" => Some(LifecycleState::New),
		other => LifecycleState::from_code(other),
	}
}
