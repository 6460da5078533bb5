//! Procesamiento de un grupo del documento.
use log::debug;
use serde_json::Value;

use crate::errors::SeedError;
use crate::expression::Evaluator;
use crate::model::{GroupDefinition, ResultTree};
use crate::store::DocumentStore;
use crate::unwind::{unwind, UnwindContext};

/// Persiste los registros de un grupo, en orden de autor y de a uno, y los
/// deja en el árbol de resultados bajo `[grupo][clave]`.
#[derive(Debug)]
pub struct GroupProcessor<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    drop_collections: bool,
}

impl<'a, S: DocumentStore + ?Sized> GroupProcessor<'a, S> {
    pub fn new(store: &'a S, drop_collections: bool) -> Self {
        Self { store, drop_collections }
    }

    /// Orden observable:
    /// 1. valida `_model` (antes de cualquier escritura del grupo);
    /// 2. resuelve el modelo en el store;
    /// 3. con `drop_collections`, borra la colección sólo si existe;
    /// 4. por cada clave: unwind, create de un lote de un elemento, guarda.
    pub async fn process(&self,
                         name: &str,
                         raw: Value,
                         evaluator: &Evaluator,
                         tree: &mut ResultTree)
                         -> Result<(), SeedError> {
        let group = GroupDefinition::from_raw(name, raw)?;
        let model = self.store.model(&group.model).await?;
        debug!("group:start group={name} model={} collection={} records={}",
               model.name(),
               model.collection_name(),
               group.len());

        if self.drop_collections && self.store.collection_exists(model.collection_name()).await? {
            debug!("group:drop-collection collection={}", model.collection_name());
            self.store.drop_collection(model.collection_name()).await?;
        }

        tree.ensure_group(name);
        for (key, authored) in &group.records {
            let record = unwind(authored, authored, UnwindContext::new(evaluator, tree))?;
            let mut created = self.store.create(&model, vec![record]).await?;
            let stored = if created.len() == 1 {
                created.pop().map(Value::Object).unwrap_or(Value::Null)
            } else {
                Value::Array(created.into_iter().map(Value::Object).collect())
            };
            debug!("group:record group={name} key={key}");
            tree.insert(name, key, stored);
        }
        debug!("group:done group={name}");
        Ok(())
    }
}
