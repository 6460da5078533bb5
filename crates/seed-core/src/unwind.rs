//! Recorrido recursivo de un registro de autor hasta obtener un registro
//! plano insertable.
//!
//! Reglas:
//! - objeto anidado: se recorre con el propio objeto anidado como receptor;
//! - arreglo: cada elemento se resuelve con el receptor del padre;
//! - string con `=`: expresión (tiene prioridad sobre la referencia);
//! - string con `->`: referencia al árbol de resultados;
//! - cualquier otro valor pasa tal cual.
use serde_json::Value;

use crate::constants::{EXPRESSION_MARKER, REFERENCE_MARKER};
use crate::errors::SeedError;
use crate::expression::Evaluator;
use crate::model::{Record, ResultTree};
use crate::reference::find_reference;

/// Estado de sólo lectura que necesita el recorrido.
#[derive(Debug, Clone, Copy)]
pub struct UnwindContext<'a> {
    pub evaluator: &'a Evaluator,
    pub tree: &'a ResultTree,
}

impl<'a> UnwindContext<'a> {
    pub fn new(evaluator: &'a Evaluator, tree: &'a ResultTree) -> Self {
        Self { evaluator, tree }
    }
}

/// Resuelve cada campo de `record` usando `receiver` como registro actual.
pub fn unwind(record: &Record, receiver: &Record, ctx: UnwindContext<'_>) -> Result<Record, SeedError> {
    let mut out = Record::new();
    for (field, value) in record {
        out.insert(field.clone(), parse_value(value, receiver, ctx)?);
    }
    Ok(out)
}

pub fn parse_value(value: &Value, receiver: &Record, ctx: UnwindContext<'_>) -> Result<Value, SeedError> {
    match value {
        Value::String(raw) if raw.contains(EXPRESSION_MARKER) => Ok(ctx.evaluator.evaluate_or_fallback(raw, receiver)),
        Value::String(raw) if raw.contains(REFERENCE_MARKER) => {
            let path: String = raw.chars().skip(REFERENCE_MARKER.len()).collect();
            find_reference(ctx.tree, &path)
        }
        Value::Object(nested) => unwind(nested, nested, ctx).map(Value::Object),
        Value::Array(items) => items.iter()
                                    .map(|item| parse_value(item, receiver, ctx))
                                    .collect::<Result<Vec<_>, _>>()
                                    .map(Value::Array),
        other => Ok(other.clone()),
    }
}
