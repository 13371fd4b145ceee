//! Specializer configuration resolved from the environment.
//!
//! Settings are read once. [`JitConfig::global`] caches the environment
//! view for the process; a [`Jit`](crate::Jit) may carry its own copy to
//! override it.

use std::sync::OnceLock;

/// Default limit on nested specialization.
pub const DEFAULT_MAX_DEPTH: usize = 32;

// =============================================================================
// Configuration
// =============================================================================

/// Specializer settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JitConfig {
    /// Run the unspecialized method on every call instead of compiling
    /// (`NUMBAS_DISABLE_JIT`). Nothing is cached while set.
    pub disable_jit: bool,

    /// How deep specialization may recurse into methods of sub-objects
    /// (`NUMBAS_MAX_DEPTH`).
    pub max_depth: usize,
}

impl Default for JitConfig {
    fn default() -> Self {
        Self {
            disable_jit: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

static GLOBAL: OnceLock<JitConfig> = OnceLock::new();

impl JitConfig {
    /// Resolve from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Resolve from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let disable_jit = lookup("NUMBAS_DISABLE_JIT")
            .map(|v| Self::truthy(&v))
            .unwrap_or(defaults.disable_jit);
        let max_depth = lookup("NUMBAS_MAX_DEPTH")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|&d| d > 0)
            .unwrap_or(defaults.max_depth);

        Self {
            disable_jit,
            max_depth,
        }
    }

    /// Process-wide configuration, resolved from the environment on first
    /// use.
    pub fn global() -> &'static JitConfig {
        GLOBAL.get_or_init(Self::from_env)
    }

    /// Non-empty and not `0`/`false`/`no`/`off`.
    #[inline]
    fn truthy(v: &str) -> bool {
        let v = v.trim();
        !v.is_empty() && !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off")
    }
}
