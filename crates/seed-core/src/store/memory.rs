//! Store en memoria: rápido para tests y para correr semillas sin base real.
//!
//! Registra cada llamada recibida (`calls`) para poder verificar el contrato
//! del motor (orden, cantidad de creates, drops condicionales) y permite
//! inyectar fallas por colección.
use std::sync::{Arc, PoisonError, RwLock as SyncRwLock};

use async_trait::async_trait;
use indexmap::IndexMap;
use tokio::sync::RwLock;

use super::{default_collection_name, stamp_document, DocumentStore, ModelHandle, StoreError};
use crate::model::Record;

/// Llamada observada por el store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Model(String),
    Create { collection: String, records: Vec<Record> },
    CollectionExists(String),
    DropCollection(String),
    DropDatabase,
}

/// Modelo → colección. Vive fuera del estado async para que el registro sea
/// síncrono e infalible aunque haya lectores del estado.
#[derive(Debug, Default)]
struct ModelRegistry {
    map: IndexMap<String, String>,
    permissive: bool,
}

impl ModelRegistry {
    fn resolve(&mut self, name: &str) -> Option<String> {
        if let Some(collection) = self.map.get(name) {
            return Some(collection.clone());
        }
        if !self.permissive {
            return None;
        }
        let collection = default_collection_name(name);
        self.map.insert(name.to_string(), collection.clone());
        Some(collection)
    }
}

#[derive(Debug, Default)]
struct StoreState {
    collections: IndexMap<String, Vec<Record>>,
    calls: Vec<StoreCall>,
    create_failures: IndexMap<String, String>,
    drop_database_failure: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    models: Arc<SyncRwLock<ModelRegistry>>,
    inner: Arc<RwLock<StoreState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store que acepta cualquier modelo, derivando el nombre de colección.
    pub fn permissive() -> Self {
        let registry = ModelRegistry { permissive: true, ..ModelRegistry::default() };
        Self { models: Arc::new(SyncRwLock::new(registry)), ..Self::default() }
    }

    /// Registra `model` sobre `collection` (builder).
    pub fn with_model(self, model: &str, collection: &str) -> Self {
        self.register_model(model, collection);
        self
    }

    /// Registra (o reemplaza) `model`; visible para todos los clones del store.
    pub fn register_model(&self, model: &str, collection: &str) {
        self.models
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .map
            .insert(model.to_string(), collection.to_string());
    }

    /// Hace fallar todo `create` sobre `collection` con `message`.
    pub async fn fail_creates_on(&self, collection: &str, message: &str) {
        self.inner.write().await.create_failures.insert(collection.to_string(), message.to_string());
    }

    pub async fn fail_drop_database(&self, message: &str) {
        self.inner.write().await.drop_database_failure = Some(message.to_string());
    }

    /// Inserta documentos directamente (sin pasar por el registro de llamadas).
    pub async fn preload(&self, collection: &str, docs: Vec<Record>) {
        self.inner.write().await.collections.entry(collection.to_string()).or_default().extend(docs);
    }

    pub async fn calls(&self) -> Vec<StoreCall> {
        self.inner.read().await.calls.clone()
    }

    pub async fn create_calls(&self) -> Vec<(String, Vec<Record>)> {
        self.inner
            .read()
            .await
            .calls
            .iter()
            .filter_map(|c| match c {
                StoreCall::Create { collection, records } => Some((collection.clone(), records.clone())),
                _ => None,
            })
            .collect()
    }

    pub async fn documents(&self, collection: &str) -> Vec<Record> {
        self.inner.read().await.collections.get(collection).cloned().unwrap_or_default()
    }

    pub async fn collection_names(&self) -> Vec<String> {
        self.inner.read().await.collections.keys().cloned().collect()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn model(&self, name: &str) -> Result<ModelHandle, StoreError> {
        self.inner.write().await.calls.push(StoreCall::Model(name.to_string()));
        let resolved = self.models.write().unwrap_or_else(PoisonError::into_inner).resolve(name);
        resolved.map(|collection| ModelHandle::new(name, collection))
                .ok_or_else(|| StoreError::ModelNotFound(name.to_string()))
    }

    async fn create(&self, model: &ModelHandle, records: Vec<Record>) -> Result<Vec<Record>, StoreError> {
        let mut state = self.inner.write().await;
        let collection = model.collection_name().to_string();
        state.calls.push(StoreCall::Create { collection: collection.clone(), records: records.clone() });
        if let Some(message) = state.create_failures.get(&collection) {
            return Err(StoreError::Rejected(message.clone()));
        }
        let persisted: Vec<Record> = records.into_iter().map(stamp_document).collect();
        state.collections.entry(collection).or_default().extend(persisted.iter().cloned());
        Ok(persisted)
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool, StoreError> {
        let mut state = self.inner.write().await;
        state.calls.push(StoreCall::CollectionExists(collection.to_string()));
        Ok(state.collections.contains_key(collection))
    }

    async fn drop_collection(&self, collection: &str) -> Result<(), StoreError> {
        let mut state = self.inner.write().await;
        state.calls.push(StoreCall::DropCollection(collection.to_string()));
        state.collections.shift_remove(collection);
        Ok(())
    }

    async fn drop_database(&self) -> Result<(), StoreError> {
        let mut state = self.inner.write().await;
        state.calls.push(StoreCall::DropDatabase);
        if let Some(message) = state.drop_database_failure.clone() {
            return Err(StoreError::Backend(message));
        }
        state.collections.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{ID_FIELD, VERSION_FIELD};
    use serde_json::{json, Value};

    fn record(v: Value) -> Record {
        v.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn create_assigns_identifier_and_version() {
        let store = InMemoryStore::new().with_model("User", "users");
        let model = store.model("User").await.unwrap();
        let out = store.create(&model, vec![record(json!({"firstName": "Foo"}))]).await.unwrap();
        assert_eq!(out.len(), 1);
        let id = out[0][ID_FIELD].as_str().unwrap();
        assert_eq!(id.len(), 24);
        assert_eq!(out[0]["firstName"], json!("Foo"));
        assert_eq!(out[0][VERSION_FIELD], json!(0));
        assert!(store.collection_exists("users").await.unwrap());
    }

    #[tokio::test]
    async fn authored_identifier_is_kept() {
        let store = InMemoryStore::new().with_model("User", "users");
        let model = store.model("User").await.unwrap();
        let out = store.create(&model, vec![record(json!({"_id": "fixed", "a": 1}))]).await.unwrap();
        assert_eq!(out[0][ID_FIELD], json!("fixed"));
    }

    #[tokio::test]
    async fn unknown_models_fail_unless_permissive() {
        let strict = InMemoryStore::new();
        assert_eq!(strict.model("Ghost").await.unwrap_err(), StoreError::ModelNotFound("Ghost".into()));
        let loose = InMemoryStore::permissive();
        assert_eq!(loose.model("Ghost").await.unwrap().collection_name(), "ghosts");
    }

    #[tokio::test]
    async fn drop_database_clears_everything() {
        let store = InMemoryStore::new();
        store.preload("users", vec![record(json!({"_id": "1"}))]).await;
        store.drop_database().await.unwrap();
        assert!(store.collection_names().await.is_empty());
        assert_eq!(store.calls().await, vec![StoreCall::DropDatabase]);
    }

    #[tokio::test]
    async fn injected_failures_surface() {
        let store = InMemoryStore::new().with_model("User", "users");
        store.fail_creates_on("users", "duplicate key").await;
        let model = store.model("User").await.unwrap();
        let err = store.create(&model, vec![Record::new()]).await.unwrap_err();
        assert_eq!(err, StoreError::Rejected("duplicate key".into()));
    }

    #[tokio::test]
    async fn registration_lands_while_state_is_borrowed() {
        let store = InMemoryStore::new();
        let guard = store.inner.read().await;
        let registered = store.clone().with_model("User", "users");
        store.register_model("Team", "teams");
        drop(guard);
        assert_eq!(registered.model("User").await.unwrap().collection_name(), "users");
        assert_eq!(store.model("Team").await.unwrap().collection_name(), "teams");
    }
}
