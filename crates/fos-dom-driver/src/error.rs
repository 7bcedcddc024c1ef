//! Driver errors

use fos_dom::{DomError, NodeId};

/// Result type for driver operations
pub type Result<T> = std::result::Result<T, DriverError>;

/// DOM driver error
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("invalid selector `{selector}`: {source}")]
    InvalidSelector {
        selector: String,
        #[source]
        source: fos_css::SelectorError,
    },

    #[error("select() expects a non-empty CSS selector")]
    EmptySelector,

    #[error("events() expects an event type without whitespace, got `{0}`")]
    InvalidEventType(String),

    #[error("preventDefault matcher has to be a JSON object, got `{0}`")]
    InvalidPreventDefault(String),

    #[error("select() is not supported on the {0} source")]
    RestrictedSelect(&'static str),

    #[error("cannot render into unknown element `{0}`")]
    UnknownContainer(String),

    #[error("container {0:?} is not an element")]
    InvalidContainer(NodeId),

    #[error("no root element found above {0:?}, this should not happen")]
    NoRootElement(NodeId),

    #[error("patch failed: {0}")]
    Patch(#[from] DomError),

    #[error("module `{module}` failed in {hook} hook: {source}")]
    ModuleHook {
        module: String,
        hook: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl DriverError {
    /// Build an `InvalidSelector` error
    pub(crate) fn selector(selector: &str, source: fos_css::SelectorError) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            source,
        }
    }
}
