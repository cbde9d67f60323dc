//! Router error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RouterError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RouterError {
    #[error("{0}")]
    Core(#[from] trellis_core::Error),

    #[error("deferred transitions did not settle after {turns} turns")]
    Unsettled { turns: usize },

    #[error("navigator task has stopped")]
    NavigatorClosed,
}

impl RouterError {
    /// The underlying resolution or hook error, if any
    pub fn core(&self) -> Option<&trellis_core::Error> {
        match self {
            RouterError::Core(e) => Some(e),
            _ => None,
        }
    }

    /// Whether the request named a path or state that does not exist
    pub fn is_not_found(&self) -> bool {
        self.core().is_some_and(trellis_core::Error::is_not_found)
    }
}
