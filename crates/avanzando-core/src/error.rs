//! Domain error type.

/// Errors raised by domain rules and value parsing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    /// A textual value does not name any variant of a domain enum.
    #[error("Valor inválido para {field}: '{value}'")]
    UnknownVariant { field: &'static str, value: String },

    /// Input violates a domain rule.
    #[error("{0}")]
    Validation(String),

    /// A state machine refused the requested transition.
    #[error("No se puede pasar de '{from}' a '{to}'")]
    InvalidTransition { from: String, to: String },

    /// Export encoding failed.
    #[error("Error de exportación: {0}")]
    Export(String),
}

impl CoreError {
    #[must_use]
    pub fn unknown_variant(field: &'static str, value: impl Into<String>) -> Self {
        Self::UnknownVariant {
            field,
            value: value.into(),
        }
    }

    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    #[must_use]
    pub fn invalid_transition(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::InvalidTransition {
            from: from.into(),
            to: to.into(),
        }
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
