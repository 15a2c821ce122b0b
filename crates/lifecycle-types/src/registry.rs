//! Registry trait for self-registering implementations.

/// Ties a pluggable implementation to the name it is configured under.
///
/// Storage backends and notification transports each expose a `Registry`
/// struct implementing this trait, so the service binary can build its
/// factory maps from `NAME` and `factory()` without hard-coding either.
pub trait ImplementationRegistry {
	/// Key used under `<section>.implementations` in the TOML config,
	/// e.g. `memory` for `storage.implementations.memory`.
	const NAME: &'static str;

	/// Factory function type of the owning module.
	type Factory;

	fn factory() -> Self::Factory;
}
