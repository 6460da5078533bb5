//! Resolución de referencias (`->grupo.clave[.campo...]`) contra el árbol de
//! resultados de la corrida.
use serde_json::Value;

use crate::constants::{ID_FIELD, PATH_SEPARATOR};
use crate::errors::SeedError;
use crate::model::ResultTree;

/// Resuelve `path` (ya sin el marcador) dentro de `tree`.
///
/// - grupo ausente: `SeedError::MissingSource`.
/// - cualquier otro segmento ausente: `SeedError::MissingReference` (no se
///   devuelve un valor parcial).
/// - objeto resultante: su `_id`, o `SeedError::MissingIdentifier`.
/// - escalares y arreglos: tal cual.
pub fn find_reference(tree: &ResultTree, path: &str) -> Result<Value, SeedError> {
    let mut segments = path.split(PATH_SEPARATOR);
    let group_name = segments.next().unwrap_or_default();
    let Some(group) = tree.group(group_name) else {
        return Err(SeedError::MissingSource { group: group_name.to_string() });
    };

    let missing = |segment: &str| SeedError::MissingReference { path: path.to_string(), segment: segment.to_string() };

    let key = segments.next().ok_or_else(|| missing(""))?;
    let mut current = group.get(key).ok_or_else(|| missing(key))?;
    for segment in segments {
        current = step(current, segment).ok_or_else(|| missing(segment))?;
    }

    match current {
        Value::Object(map) => map.get(ID_FIELD)
                                 .cloned()
                                 .ok_or_else(|| SeedError::MissingIdentifier { value: current.to_string() }),
        other => Ok(other.clone()),
    }
}

fn step<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}
