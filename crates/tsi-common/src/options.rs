//! Engine options.
//!
//! This module lives in tsi-common so that the parser, checker and runtime
//! can all reference `EngineOptions` without circular dependencies.

use std::path::PathBuf;

/// How decorator syntax is treated by the parser and checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecoratorMode {
    /// Decorator syntax is a parse error.
    #[default]
    None,
    /// Legacy (experimental) decorators: `@dec` before class/member,
    /// evaluated as metadata capture points.
    Legacy,
    /// Stage-3 decorators: same capture-point model, stage-3 placement rules.
    Stage3,
}

/// Options recognised by the engine entry points.
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Gates decorator parsing and checking.
    pub decorator_mode: DecoratorMode,
    /// Attach design-time type strings to decorator targets in the type map.
    pub emit_decorator_metadata: bool,
    /// Keep const-enum names alive as runtime objects instead of inlining.
    pub preserve_const_enums: bool,
    /// Strict mode: stricter checking and runtime strict semantics
    /// (writes to frozen targets raise TypeError).
    pub strict: bool,
    /// Base directory for relative import lookup in `run_module`.
    pub module_resolution_root: Option<PathBuf>,
    /// Advance the virtual clock through pending timers once the
    /// synchronous turn (and its microtasks) has finished. Timers only
    /// ever fire when a flush is requested; hosts that want the queue left
    /// pending keep this off.
    pub flush_timers: bool,

    // Individual strict-family flags. `apply_strict_defaults` ORs these
    // with `strict`, mirroring how tsc expands `--strict`.
    pub no_implicit_any: bool,
    pub exact_optional_property_types: bool,
    pub excess_property_checks: bool,
}

impl EngineOptions {
    /// Expand `strict` into the individual strict-family flags.
    /// Flags already set explicitly stay set.
    #[must_use]
    pub fn apply_strict_defaults(mut self) -> Self {
        if self.strict {
            self.no_implicit_any = true;
            self.exact_optional_property_types = true;
        }
        // Excess-property checking is always on; strict only widens the
        // positions it applies to.
        self.excess_property_checks = true;
        self
    }

    /// Convenience constructor for strict mode with defaults expanded.
    #[must_use]
    pub fn strict() -> Self {
        EngineOptions {
            strict: true,
            ..Default::default()
        }
        .apply_strict_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_expands_family_flags() {
        let opts = EngineOptions::strict();
        assert!(opts.no_implicit_any);
        assert!(opts.exact_optional_property_types);
        assert!(opts.excess_property_checks);
    }

    #[test]
    fn non_strict_keeps_excess_property_checks() {
        let opts = EngineOptions::default().apply_strict_defaults();
        assert!(!opts.no_implicit_any);
        assert!(opts.excess_property_checks);
    }
}
