//! Runtime configuration.
//!
//! All knobs have defaults suited to typical embeddings.

/// Configuration for a dispatch [`Runtime`](crate::Runtime).
///
/// # Example
///
/// ```
/// use prism_dispatch::{DispatchConfig, Runtime};
///
/// // Strict overload matching: no implicit-context fallback phase.
/// let config = DispatchConfig {
///     context_param_fallback: false,
///     ..Default::default()
/// };
/// let runtime = Runtime::with_config(config);
/// assert!(!runtime.config().context_param_fallback);
/// ```
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    // =========================================================================
    // Instance Storage
    // =========================================================================
    /// Maximum number of expected keys a class layout may hold.
    ///
    /// Expected keys are found by linear scan, so layouts are capped.
    /// Names past the cap are still stored, but in the fallback map.
    ///
    /// Default: 64
    pub max_expected_keys: usize,

    // =========================================================================
    // Overload Resolution
    // =========================================================================
    /// Retry overload matching with implicit context parameters stripped.
    ///
    /// When no candidate matches the requested signature exactly, a second
    /// pass ignores the leading context parameter of candidates declared
    /// with one.
    ///
    /// Default: true
    pub context_param_fallback: bool,

    // =========================================================================
    // Member Naming
    // =========================================================================
    /// Mangle non-public native members as `_Owner__name`.
    ///
    /// When disabled, non-public members keep their native name but are
    /// still reported as not externally visible.
    ///
    /// Default: true
    pub mangle_private_members: bool,

    // =========================================================================
    // Caching
    // =========================================================================
    /// Cache member lookups per (class, name).
    ///
    /// Default: true
    pub member_cache_enabled: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_expected_keys: 64,
            context_param_fallback: true,
            mangle_private_members: true,
            member_cache_enabled: true,
        }
    }
}
