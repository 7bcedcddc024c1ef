//! fOS CSS Selectors
//!
//! Selector parsing and matching against the fOS DOM tree.

mod parser;
mod matching;
pub mod selectors;

pub use parser::parse_selector_list;
pub use matching::{matches, matches_complex, query_selector, query_selector_all};
pub use selectors::{
    AttributeMatcher, AttributeSelector, Combinator, ComplexSelector, Compound, NthExpression,
    PseudoClass, SelectorComponent, SelectorList,
};

/// Selector syntax error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,
    #[error("unexpected `{found}` at offset {offset}")]
    Unexpected { found: char, offset: usize },
    #[error("unexpected end of selector")]
    UnexpectedEnd,
    #[error("unknown pseudo-class `:{0}`")]
    UnknownPseudoClass(String),
    #[error("pseudo-element `::{0}` never matches an element")]
    PseudoElement(String),
    #[error("invalid An+B expression `{0}`")]
    InvalidNth(String),
}
