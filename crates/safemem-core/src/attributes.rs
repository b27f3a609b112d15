//! Attribute vocabulary shared with the static checker.
//!
//! The runtime never interprets these attributes. They are the contract
//! surface read by the authoring-time analysis tool (e.g. "a function marked
//! `no_side_effect` may only call other such functions"), kept here so the
//! names stay in one place.

use std::fmt;
use std::str::FromStr;

/// Namespace prefix used by the checker for every attribute.
pub const ATTRIBUTE_NAMESPACE: &str = "safememory";

/// Source-level attributes understood by the static checker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CheckerAttribute {
    /// Function has no observable side effects and only calls other such functions.
    NoSideEffect,
    /// Like `NoSideEffect`, but only when invoked on a const receiver.
    NoSideEffectWhenConst,
    /// Type is transitively immutable.
    DeepConst,
    /// Type is deep-const when all its type parameters are.
    DeepConstWhenParams,
    /// Returned reference may live as long as the receiver.
    MayExtendToThis,
    /// Stack-only struct that may hold raw references.
    NakedStruct,
    /// Type may be awaited.
    Awaitable,
    /// Function must not suspend.
    NoAwait,
    /// Function result is not a pure function of its inputs.
    NonDeterministic,
}

impl CheckerAttribute {
    /// Every attribute, in declaration order.
    pub const ALL: [CheckerAttribute; 9] = [
        Self::NoSideEffect,
        Self::NoSideEffectWhenConst,
        Self::DeepConst,
        Self::DeepConstWhenParams,
        Self::MayExtendToThis,
        Self::NakedStruct,
        Self::Awaitable,
        Self::NoAwait,
        Self::NonDeterministic,
    ];

    /// Attribute name without the namespace.
    pub fn name(self) -> &'static str {
        match self {
            Self::NoSideEffect => "no_side_effect",
            Self::NoSideEffectWhenConst => "no_side_effect_when_const",
            Self::DeepConst => "deep_const",
            Self::DeepConstWhenParams => "deep_const_when_params",
            Self::MayExtendToThis => "may_extend_to_this",
            Self::NakedStruct => "naked_struct",
            Self::Awaitable => "awaitable",
            Self::NoAwait => "no_await",
            Self::NonDeterministic => "non_deterministic",
        }
    }

    /// Whether the checker treats functions carrying this attribute as
    /// callable from a `no_side_effect` context.
    pub fn is_side_effect_free(self) -> bool {
        matches!(self, Self::NoSideEffect | Self::NoSideEffectWhenConst)
    }
}

impl fmt::Display for CheckerAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{ATTRIBUTE_NAMESPACE}::{}", self.name())
    }
}

/// Error returned when parsing an unknown attribute path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownAttribute(pub String);

impl fmt::Display for UnknownAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown checker attribute '{}'", self.0)
    }
}

impl std::error::Error for UnknownAttribute {}

impl FromStr for CheckerAttribute {
    type Err = UnknownAttribute;

    /// Accepts both `safememory::name` and the bare `name`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bare = s
            .strip_prefix(ATTRIBUTE_NAMESPACE)
            .and_then(|rest| rest.strip_prefix("::"))
            .unwrap_or(s);
        Self::ALL
            .into_iter()
            .find(|attr| attr.name() == bare)
            .ok_or_else(|| UnknownAttribute(s.to_string()))
    }
}

/// Marks types whose rvalues are tracked temporaries.
///
/// Any expression producing one of these types registers with a control
/// block. The source rewriter materialises such temporaries into named
/// locals when one statement creates more than one of them, so that no
/// sub-expression can destroy the allocation while the temporary is alive.
/// The runtime provides no hook for this; the trait only names the category.
pub trait TrackedTemporary {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn display_uses_namespace() {
        assert_eq!(
            CheckerAttribute::NoSideEffect.to_string(),
            "safememory::no_side_effect"
        );
    }

    #[test]
    fn parses_namespaced_and_bare_names() {
        assert_eq!(
            "safememory::deep_const".parse::<CheckerAttribute>(),
            Ok(CheckerAttribute::DeepConst)
        );
        assert_eq!(
            "naked_struct".parse::<CheckerAttribute>(),
            Ok(CheckerAttribute::NakedStruct)
        );
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = "safememory::fast".parse::<CheckerAttribute>().unwrap_err();
        assert_eq!(err.0, "safememory::fast");
    }

    #[test]
    fn side_effect_free_set() {
        let free: Vec<_> = CheckerAttribute::ALL
            .into_iter()
            .filter(|a| a.is_side_effect_free())
            .collect();
        assert_eq!(
            free,
            vec![
                CheckerAttribute::NoSideEffect,
                CheckerAttribute::NoSideEffectWhenConst
            ]
        );
    }

    proptest! {
        #[test]
        fn arbitrary_input_parses_only_to_known_names(s in "[a-z_:]{0,40}") {
            if let Ok(attr) = s.parse::<CheckerAttribute>() {
                prop_assert!(s == attr.name() || s == attr.to_string());
            }
        }
    }
}
