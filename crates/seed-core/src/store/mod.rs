//! Contrato de la capa de persistencia (colaborador externo del motor).
//!
//! El motor sólo necesita: lookup de modelo por nombre, nombre de colección
//! del modelo, creación en lote, chequeo/borrado de colecciones y borrado de
//! la base completa. Todas las operaciones son puntos de suspensión que el
//! motor espera antes de continuar.

mod memory;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::constants::{ID_FIELD, VERSION_FIELD};
use crate::model::Record;

pub use memory::{InMemoryStore, StoreCall};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("model not found: {0}")]
    ModelNotFound(String),
    #[error("document rejected: {0}")]
    Rejected(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Handle de un modelo registrado.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelHandle {
    name: String,
    collection: String,
}

impl ModelHandle {
    pub fn new(name: impl Into<String>, collection: impl Into<String>) -> Self {
        Self { name: name.into(), collection: collection.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn collection_name(&self) -> &str {
        &self.collection
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Resuelve un modelo por nombre o falla con `StoreError::ModelNotFound`.
    async fn model(&self, name: &str) -> Result<ModelHandle, StoreError>;

    /// Persiste `records` y devuelve los registros persistidos (con `_id`).
    async fn create(&self, model: &ModelHandle, records: Vec<Record>) -> Result<Vec<Record>, StoreError>;

    async fn collection_exists(&self, collection: &str) -> Result<bool, StoreError>;

    async fn drop_collection(&self, collection: &str) -> Result<(), StoreError>;

    async fn drop_database(&self) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: DocumentStore + ?Sized> DocumentStore for std::sync::Arc<T> {
    async fn model(&self, name: &str) -> Result<ModelHandle, StoreError> {
        (**self).model(name).await
    }

    async fn create(&self, model: &ModelHandle, records: Vec<Record>) -> Result<Vec<Record>, StoreError> {
        (**self).create(model, records).await
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool, StoreError> {
        (**self).collection_exists(collection).await
    }

    async fn drop_collection(&self, collection: &str) -> Result<(), StoreError> {
        (**self).drop_collection(collection).await
    }

    async fn drop_database(&self) -> Result<(), StoreError> {
        (**self).drop_database().await
    }
}

/// Nombre de colección por defecto para un modelo: minúsculas + plural simple.
pub fn default_collection_name(model: &str) -> String {
    let lower = model.to_lowercase();
    if lower.ends_with('s') {
        lower
    } else if let Some(stem) = lower.strip_suffix('y').filter(|s| !s.ends_with(['a', 'e', 'i', 'o', 'u'])) {
        format!("{stem}ies")
    } else {
        format!("{lower}s")
    }
}

/// Identificador con forma de ObjectId (24 caracteres hexadecimales).
pub fn generate_object_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(24);
    id
}

/// Forma persistida de un registro: `_id` primero (conserva el del autor si
/// lo trae), luego los campos en orden y `__v: 0` al final.
pub fn stamp_document(record: Record) -> Record {
    let mut doc = Record::new();
    let id = record.get(ID_FIELD).cloned().unwrap_or_else(|| Value::String(generate_object_id()));
    doc.insert(ID_FIELD.to_string(), id);
    for (k, v) in record {
        if k != ID_FIELD {
            doc.insert(k, v);
        }
    }
    doc.insert(VERSION_FIELD.to_string(), Value::from(0));
    doc
}
