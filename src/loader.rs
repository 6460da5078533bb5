//! Carga de documentos de seeding desde JSON (conservando el orden de claves).
use std::path::Path;

use log::debug;
use seed_core::{DocumentStore, ResultTree, SeedDocument, SeedOptions, Seeder};

use crate::errors::LoadError;

pub fn parse_seed_str(source: &str) -> Result<SeedDocument, LoadError> {
    let value: serde_json::Value = serde_json::from_str(source)?;
    Ok(SeedDocument::from_value(value)?)
}

pub fn load_seed_file(path: impl AsRef<Path>) -> Result<SeedDocument, LoadError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|source| LoadError::Io { path: path.to_path_buf(), source })?;
    let document = parse_seed_str(&source)?;
    debug!("loaded seed file path={} entries={}", path.display(), document.len());
    Ok(document)
}

/// Carga `path` y lo siembra con `seeder`.
pub async fn seed_file<S: DocumentStore>(seeder: &Seeder<S>,
                                         path: impl AsRef<Path>,
                                         options: SeedOptions)
                                         -> Result<ResultTree, LoadError> {
    let document = load_seed_file(path)?;
    Ok(seeder.seed(document, options).await?)
}
