//! The abrupt-completion algebra.
//!
//! Every statement evaluation yields exactly one completion. Composite
//! statements propagate non-Normal completions unchanged except those they
//! explicitly consume: loops eat Break/Continue addressed to them,
//! function bodies eat Return, try/catch eats Throw, the generator driver
//! eats Yield.

use crate::value::Value;

/// Result of executing one statement.
#[derive(Clone, Debug)]
pub enum Completion {
    Normal(Option<Value>),
    Return(Value),
    Break(Option<String>),
    Continue(Option<String>),
    Throw(Value),
}

impl Completion {
    #[must_use]
    pub fn normal() -> Completion {
        Completion::Normal(None)
    }

    #[must_use]
    pub fn is_abrupt(&self) -> bool {
        !matches!(self, Completion::Normal(_))
    }

    /// Whether a Break targets the given (optional) label context. An
    /// unlabeled Break matches any loop/switch; a labeled one only its
    /// label.
    #[must_use]
    pub fn break_matches(&self, label: Option<&str>) -> bool {
        match self {
            Completion::Break(None) => true,
            Completion::Break(Some(target)) => label == Some(target.as_str()),
            _ => false,
        }
    }

    /// Same matching rule for Continue.
    #[must_use]
    pub fn continue_matches(&self, label: Option<&str>) -> bool {
        match self {
            Completion::Continue(None) => true,
            Completion::Continue(Some(target)) => label == Some(target.as_str()),
            _ => false,
        }
    }
}

/// Propagate an abrupt completion out of the enclosing evaluation.
#[macro_export]
macro_rules! propagate {
    ($completion:expr) => {{
        let c = $completion;
        if c.is_abrupt() {
            return c;
        }
    }};
}
