//! Documento de seeding tal como lo escribe el autor.
//!
//! Rol en el flujo:
//! - `SeedDocument` conserva el orden de inserción de los grupos: ese orden es
//!   el orden de ejecución y por lo tanto el único mecanismo que habilita las
//!   referencias hacia atrás.
//! - `_dependencies` se extrae antes de procesar grupos.
//! - `GroupDefinition` se construye recién cuando le toca el turno al grupo, de
//!   modo que un grupo mal formado sólo aborta la corrida al llegar a él.
use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::constants::{DEPENDENCIES_KEY, MODEL_KEY};
use crate::errors::SeedError;

/// Registro plano listo para insertar (mapa ordenado campo -> valor).
pub type Record = Map<String, Value>;

/// Nombre de binding -> identificador de módulo externo.
pub type DependencyMap = IndexMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeedDocument {
    entries: IndexMap<String, Value>,
}

impl SeedDocument {
    /// Construye el documento desde JSON. La raíz debe ser un objeto.
    pub fn from_value(value: Value) -> Result<Self, SeedError> {
        match value {
            Value::Object(map) => Ok(Self { entries: map.into_iter().collect() }),
            other => Err(SeedError::InvalidDocument(format!("root must be an object, found {}", type_name(&other)))),
        }
    }

    /// Quita `_dependencies` del documento y lo devuelve como mapa ordenado.
    /// Ausente equivale a un mapa vacío.
    pub fn take_dependencies(&mut self) -> Result<DependencyMap, SeedError> {
        let Some(raw) = self.entries.shift_remove(DEPENDENCIES_KEY) else {
            return Ok(DependencyMap::new());
        };
        let Value::Object(map) = raw else {
            return Err(SeedError::InvalidDocument(format!("{DEPENDENCIES_KEY} must be an object")));
        };
        let mut deps = DependencyMap::with_capacity(map.len());
        for (binding, module) in map {
            match module {
                Value::String(id) => {
                    deps.insert(binding, id);
                }
                other => {
                    return Err(SeedError::InvalidDocument(format!("dependency '{binding}' must name a module, found {}",
                                                                  type_name(&other))))
                }
            }
        }
        Ok(deps)
    }

    /// Grupos restantes en orden de documento.
    pub fn groups(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    pub fn into_groups(self) -> impl Iterator<Item = (String, Value)> {
        self.entries.into_iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TryFrom<Value> for SeedDocument {
    type Error = SeedError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

/// Grupo ya validado: modelo consumido y registros en orden de autor.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupDefinition {
    pub name: String,
    pub model: String,
    pub records: IndexMap<String, Record>,
}

impl GroupDefinition {
    /// Valida y consume `_model`; el resto de las claves son registros.
    pub fn from_raw(name: &str, raw: Value) -> Result<Self, SeedError> {
        let Value::Object(map) = raw else {
            return Err(SeedError::InvalidDocument(format!("group '{name}' must be an object")));
        };
        let mut entries: IndexMap<String, Value> = map.into_iter().collect();
        let model = match entries.shift_remove(MODEL_KEY) {
            Some(Value::String(model)) if !model.is_empty() => model,
            _ => return Err(SeedError::MissingModel { group: name.to_string(), key: MODEL_KEY }),
        };
        let mut records = IndexMap::with_capacity(entries.len());
        for (key, value) in entries {
            match value {
                Value::Object(record) => {
                    records.insert(key, record);
                }
                _ => return Err(SeedError::InvalidRecord { group: name.to_string(), key }),
            }
        }
        Ok(Self { name: name.to_string(), model, records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
