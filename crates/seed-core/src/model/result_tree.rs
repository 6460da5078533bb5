//! Árbol de resultados ("chunks") de una corrida.
//!
//! Refleja la estructura grupo -> clave del documento, pero cada registro de
//! autor queda reemplazado por el registro persistido. Es append-only durante
//! la corrida y es el único medio por el cual se resuelven referencias.
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResultTree {
    groups: IndexMap<String, IndexMap<String, Value>>,
}

impl ResultTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserva el grupo aunque todavía no tenga registros (un grupo vacío
    /// sigue apareciendo en el resultado).
    pub fn ensure_group(&mut self, group: &str) {
        if !self.groups.contains_key(group) {
            self.groups.insert(group.to_string(), IndexMap::new());
        }
    }

    pub fn insert(&mut self, group: &str, key: &str, value: Value) {
        self.ensure_group(group);
        if let Some(entries) = self.groups.get_mut(group) {
            entries.insert(key.to_string(), value);
        }
    }

    pub fn group(&self, group: &str) -> Option<&IndexMap<String, Value>> {
        self.groups.get(group)
    }

    pub fn get(&self, group: &str, key: &str) -> Option<&Value> {
        self.groups.get(group).and_then(|g| g.get(key))
    }

    pub fn contains_group(&self, group: &str) -> bool {
        self.groups.contains_key(group)
    }

    pub fn group_names(&self) -> impl Iterator<Item = &String> {
        self.groups.keys()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.groups
                          .iter()
                          .map(|(g, entries)| {
                              let inner: Map<String, Value> = entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                              (g.clone(), Value::Object(inner))
                          })
                          .collect())
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.groups
                          .into_iter()
                          .map(|(g, entries)| (g, Value::Object(entries.into_iter().collect())))
                          .collect())
    }
}
