//! Errores del evaluador de expresiones y del registro de módulos.

use thiserror::Error;

/// Falla de evaluación. Nunca aborta una corrida: el `Evaluator` la absorbe y
/// devuelve el string original.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("syntax error at {position}: {message}")]
    Syntax { position: usize, message: String },
    #[error("{0} is not defined")]
    UndefinedIdentifier(String),
    #[error("type error: {0}")]
    Type(String),
    #[error("{0} is not a function")]
    NotCallable(String),
    #[error("value cannot be stored: {0}")]
    Unserializable(String),
}

impl EvalError {
    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> Self {
        EvalError::Syntax { position, message: message.into() }
    }
}

/// Falla al resolver un módulo declarado en `_dependencies`. Sí aborta la
/// corrida y se propaga tal cual.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModuleError {
    #[error("Cannot find module '{0}'")]
    NotFound(String),
}
