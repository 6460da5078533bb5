//! Errores del motor de seeding.
//!
//! Todos son fatales para la corrida salvo los de evaluación de expresiones,
//! que nunca salen del `Evaluator` (ver `expression::EvalError`).

use thiserror::Error;

use crate::expression::ModuleError;
use crate::store::StoreError;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum SeedError {
    #[error("invalid seed document: {0}")]
    InvalidDocument(String),
    #[error("group '{group}' has no {key} defined")]
    MissingModel { group: String, key: &'static str },
    #[error("record '{group}.{key}' must be an object")]
    InvalidRecord { group: String, key: String },
    #[error("missing source '{group}' for reference")]
    MissingSource { group: String },
    #[error("cannot resolve reference '{path}': segment '{segment}' not found")]
    MissingReference { path: String, segment: String },
    #[error("missing identifier on referenced value {value}")]
    MissingIdentifier { value: String },
    #[error(transparent)]
    Dependency(#[from] ModuleError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Clasificación gruesa de los errores (taxonomía de la corrida).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Configuration,
    UnknownModel,
    Dependency,
    Reference,
    Persistence,
}

impl SeedError {
    pub fn class(&self) -> ErrorClass {
        match self {
            SeedError::InvalidDocument(_) | SeedError::MissingModel { .. } | SeedError::InvalidRecord { .. } => ErrorClass::Configuration,
            SeedError::MissingSource { .. } | SeedError::MissingReference { .. } | SeedError::MissingIdentifier { .. } => ErrorClass::Reference,
            SeedError::Dependency(_) => ErrorClass::Dependency,
            SeedError::Store(StoreError::ModelNotFound(_)) => ErrorClass::UnknownModel,
            SeedError::Store(_) => ErrorClass::Persistence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_model_message_names_group() {
        let err = SeedError::MissingModel { group: "users".into(), key: crate::constants::MODEL_KEY };
        assert_eq!(err.to_string(), "group 'users' has no _model defined");
        assert_eq!(err.class(), ErrorClass::Configuration);
    }

    #[test]
    fn store_errors_are_transparent() {
        let err: SeedError = StoreError::ModelNotFound("Ghost".into()).into();
        assert_eq!(err.to_string(), "model not found: Ghost");
        assert_eq!(err.class(), ErrorClass::UnknownModel);
    }

    #[test]
    fn dependency_error_is_surfaced_verbatim() {
        let err: SeedError = ModuleError::NotFound("left-pad".into()).into();
        assert_eq!(err.to_string(), "Cannot find module 'left-pad'");
        assert_eq!(err.class(), ErrorClass::Dependency);
    }
}
