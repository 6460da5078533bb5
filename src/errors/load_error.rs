use std::path::PathBuf;

use seed_core::SeedError;
use thiserror::Error;

/// Errores al cargar o ejecutar un archivo de seeding.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Error en IO ({path}): {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON inválido: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Seed(#[from] SeedError),
}
