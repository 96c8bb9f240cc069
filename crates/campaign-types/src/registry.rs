//! Self-registration of pluggable implementations.

/// Implemented by the `Registry` struct of every pluggable implementation.
///
/// `NAME` is the key under which the implementation is configured, for
/// example `json_rpc` for `[wallet.implementations.json_rpc]` or `pinata`
/// for `[upload.implementations.pinata]`.
pub trait ImplementationRegistry {
	const NAME: &'static str;

	/// Factory function type of the implementation family.
	type Factory;

	fn factory() -> Self::Factory;
}
