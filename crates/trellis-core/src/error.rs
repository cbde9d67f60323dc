//! Error types for trellis

use thiserror::Error;

/// Result type alias for trellis operations
pub type Result<T> = std::result::Result<T, Error>;

/// Trellis error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed path or route pattern
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// No route chain matches the requested path
    #[error("no route matches path: {path}")]
    NoMatch { path: String },

    /// A state name does not resolve to any node
    #[error("unknown state: {0}")]
    UnknownState(String),

    /// A short state name resolves to several nodes
    #[error("ambiguous state {name}: candidates {}", candidates.join(", "))]
    AmbiguousState {
        name: String,
        candidates: Vec<String>,
    },

    /// A placeholder in the target chain has no value
    #[error("state {state} requires parameter :{param}")]
    MissingParam { state: String, param: String },

    /// Redirect targets form a cycle (or exceed the hop ceiling)
    #[error("redirect cycle: {}", chain.join(" -> "))]
    RedirectCycle { chain: Vec<String> },

    /// A transition was requested while another one is in flight
    #[error("transition to {requested} rejected: another transition is in flight")]
    ReentrantTransition { requested: String },

    /// The route tree failed startup validation
    #[error("invalid route tree: {}", issues.join("; "))]
    InvalidTree { issues: Vec<String> },

    /// No controller registered under this key
    #[error("unknown controller: {0}")]
    UnknownController(String),

    /// An enter/exit hook or event handler failed
    #[error("hook failed in {state}: {message}")]
    Hook { state: String, message: String },

    /// A controller refused an outlet or field operation
    #[error("controller error: {0}")]
    Controller(String),

    /// Route manifest could not be decoded
    #[error("manifest error: {0}")]
    Manifest(String),
}

impl Error {
    /// Build a hook failure for the given state
    pub fn hook(state: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Hook {
            state: state.into(),
            message: message.into(),
        }
    }

    /// Whether this error is a client-side miss rather than a configuration defect
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NoMatch { .. } | Error::UnknownState(_))
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Manifest(e.to_string())
    }
}
