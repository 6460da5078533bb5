//! Constantes del motor de seeding.
//!
//! Agrupa las claves reservadas del documento de entrada y los marcadores que
//! disparan la evaluación de expresiones y la resolución de referencias. Son
//! parte del contrato observable: cambiarlas rompe documentos existentes.

/// Clave reservada (por grupo) con el nombre del modelo de persistencia.
pub const MODEL_KEY: &str = "_model";

/// Clave reservada (nivel raíz) con el mapa de dependencias de helpers.
pub const DEPENDENCIES_KEY: &str = "_dependencies";

/// Campo identificador generado por la capa de persistencia.
pub const ID_FIELD: &str = "_id";

/// Campo de versión asignado por el store al crear un documento.
pub const VERSION_FIELD: &str = "__v";

/// Un string que contiene este marcador (en cualquier posición) es una expresión.
pub const EXPRESSION_MARKER: &str = "=";

/// Un string que contiene este marcador (en cualquier posición) es una referencia.
pub const REFERENCE_MARKER: &str = "->";

/// Alias con el que el registro actual queda ligado dentro del contexto de evaluación.
pub const SELF_ALIAS: &str = "__self";

/// Separador de segmentos en rutas de referencia.
pub const PATH_SEPARATOR: char = '.';
