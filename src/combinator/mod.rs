//! # Combinators
//!
//! Every combinator comes in two forms:
//!
//! - **construct**: given the children, build the result category, or fail.
//! - **verify**: given children and a declared result, decide whether the
//!   combinator licenses it. With a [`Wiring`] the declared result is also
//!   coindexed with the children, which is how derivation nodes learn which
//!   child classes feed which result classes.
//!
//! Rule types are dispatched through static tables indexed by the enum
//! ordinal; the ordinal order is also the classification precedence.

mod binary;
mod unary;

pub use unary::{backward_type_raise, forward_type_raise, type_change};

use crate::category::{Category, Wiring};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

pub type BinaryVerify =
    fn(&Category, &Category, &mut Category, Option<&mut Wiring<'_>>, Option<usize>) -> bool;
pub type BinaryConstruct = fn(&Category, &Category, &mut Wiring<'_>) -> Option<Category>;
pub type UnaryVerify = fn(&Category, &mut Category, Option<&mut Wiring<'_>>) -> bool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "camelCase")]
pub enum BinaryRuleType {
    Coordination,
    ForwardApply,
    BackwardApply,
    SimpleForwardCompose,
    SimpleBackwardCompose,
    CrossBackwardCompose,
    CrossForwardCompose,
    GeneralizedForwardCompose,
    GeneralizedBackwardCompose,
    GeneralizedForwardCrossCompose,
    GeneralizedBackwardCrossCompose,
    ForwardSubstitute,
    BackwardSubstitute,
    Unknown,
}

struct BinaryCombinator {
    head_child: usize,
    verify: BinaryVerify,
    construct: Option<BinaryConstruct>,
}

const BINARY_COMBINATORS: [BinaryCombinator; 14] = [
    BinaryCombinator {
        head_child: 0,
        verify: binary::coordination_verify,
        construct: Some(binary::coordination),
    },
    BinaryCombinator {
        head_child: 0,
        verify: binary::forward_apply_verify,
        construct: Some(binary::forward_apply),
    },
    BinaryCombinator {
        head_child: 1,
        verify: binary::backward_apply_verify,
        construct: Some(binary::backward_apply),
    },
    BinaryCombinator {
        head_child: 0,
        verify: binary::simple_forward_compose_verify,
        construct: Some(binary::simple_forward_compose),
    },
    BinaryCombinator {
        head_child: 1,
        verify: binary::simple_backward_compose_verify,
        construct: Some(binary::simple_backward_compose),
    },
    BinaryCombinator {
        head_child: 1,
        verify: binary::cross_backward_compose_verify,
        construct: Some(binary::cross_backward_compose),
    },
    BinaryCombinator {
        head_child: 0,
        verify: binary::cross_forward_compose_verify,
        construct: Some(binary::cross_forward_compose),
    },
    BinaryCombinator {
        head_child: 0,
        verify: binary::generalized_forward_compose_verify,
        construct: Some(binary::generalized_forward_compose),
    },
    BinaryCombinator {
        head_child: 1,
        verify: binary::generalized_backward_compose_verify,
        construct: Some(binary::generalized_backward_compose),
    },
    BinaryCombinator {
        head_child: 0,
        verify: binary::generalized_forward_cross_compose_verify,
        construct: Some(binary::generalized_forward_cross_compose),
    },
    BinaryCombinator {
        head_child: 1,
        verify: binary::generalized_backward_cross_compose_verify,
        construct: Some(binary::generalized_backward_cross_compose),
    },
    BinaryCombinator {
        head_child: 0,
        verify: binary::forward_substitute_verify,
        construct: Some(binary::forward_substitute),
    },
    BinaryCombinator {
        head_child: 1,
        verify: binary::backward_substitute_verify,
        construct: Some(binary::backward_substitute),
    },
    BinaryCombinator {
        head_child: 0,
        verify: binary::unknown_verify,
        construct: None,
    },
];

impl BinaryRuleType {
    pub fn ordinal(self) -> usize {
        self as usize
    }

    pub fn from_ordinal(ordinal: usize) -> Option<Self> {
        Self::iter().nth(ordinal)
    }

    /// Conventional head child (0 = left, 1 = right) of this rule type.
    pub fn head_child(self) -> usize {
        BINARY_COMBINATORS[self.ordinal()].head_child
    }

    pub fn verify(
        self,
        left: &Category,
        right: &Category,
        result: &mut Category,
        wiring: Option<&mut Wiring<'_>>,
        arity_cap: Option<usize>,
    ) -> bool {
        (BINARY_COMBINATORS[self.ordinal()].verify)(left, right, result, wiring, arity_cap)
    }

    /// Builds the result category; `Unknown` never constructs.
    pub fn construct(self, left: &Category, right: &Category, wiring: &mut Wiring<'_>) -> Option<Category> {
        BINARY_COMBINATORS[self.ordinal()]
            .construct
            .and_then(|construct| construct(left, right, wiring))
    }

    /// First rule type, in precedence order, whose verify form accepts the
    /// triple. `Unknown` accepts everything.
    #[tracing::instrument(level = "trace", skip_all, fields(left = %left, right = %right, result = %result))]
    pub fn classify(left: &Category, right: &Category, result: &Category, arity_cap: Option<usize>) -> Self {
        Self::iter()
            .find(|rule_type| {
                let mut declared = result.clone();
                rule_type.verify(left, right, &mut declared, None, arity_cap)
            })
            .unwrap_or(BinaryRuleType::Unknown)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "camelCase")]
pub enum UnaryRuleType {
    TypeRaising,
    UnaryTypeChangingSimple,
    UnaryTypeChangingN,
    UnaryTypeChangingV,
    Unknown,
}

const UNARY_COMBINATORS: [UnaryVerify; 5] = [
    unary::type_raising_verify,
    unary::type_changing_simple_verify,
    unary::type_changing_n_verify,
    unary::type_changing_v_verify,
    unary::unknown_verify,
];

impl UnaryRuleType {
    pub fn ordinal(self) -> usize {
        self as usize
    }

    pub fn from_ordinal(ordinal: usize) -> Option<Self> {
        Self::iter().nth(ordinal)
    }

    pub fn verify(self, child: &Category, result: &mut Category, wiring: Option<&mut Wiring<'_>>) -> bool {
        (UNARY_COMBINATORS[self.ordinal()])(child, result, wiring)
    }

    pub fn classify(child: &Category, result: &Category) -> Self {
        Self::iter()
            .find(|rule_type| {
                let mut declared = result.clone();
                rule_type.verify(child, &mut declared, None)
            })
            .unwrap_or(UnaryRuleType::Unknown)
    }
}
