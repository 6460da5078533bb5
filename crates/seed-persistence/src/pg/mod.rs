//! Implementación Postgres (Diesel) de `DocumentStore`.
//!
//! Modelo de almacenamiento:
//! - Una tabla por colección: `seq BIGSERIAL`, `id TEXT PRIMARY KEY` (el
//!   `_id` del documento) y `doc JSONB` con el documento completo.
//! - Las tablas se crean al primer `create` sobre la colección; "existe"
//!   significa que la tabla está en `current_schema()`.
//! - Borrar la base equivale a borrar todas las tablas del schema actual.
//!
//! Diesel es bloqueante: cada operación corre dentro de
//! `tokio::task::spawn_blocking` con reintento ante errores transitorios.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use diesel::sql_types::{Bool, Jsonb, Text};
use log::{debug, error, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use seed_core::constants::ID_FIELD;
use seed_core::{default_collection_name, stamp_document, DocumentStore, ModelHandle, Record, StoreError};

use crate::error::PersistenceError;

/// Alias de tipo para el pool r2d2 de conexiones Postgres.
pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;

/// Proveedor abstracto de conexiones.
///
/// Permite inyectar un pool real (producción/tests de integración) o
/// cualquier otra fuente de conexiones sin acoplar el store a r2d2.
pub trait ConnectionProvider: Send + Sync + 'static {
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError>;
}

/// Implementación concreta de `ConnectionProvider` respaldada por un `PgPool`.
pub struct PoolProvider {
    pub pool: PgPool,
}

impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError> {
        self.pool
            .get()
            .map_err(|e| PersistenceError::TransientIo(format!("pool error: {e}")))
    }
}

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("static identifier pattern"));

/// Valida un nombre de colección y lo devuelve entre comillas dobles.
pub fn quoted_table(collection: &str) -> Result<String, PersistenceError> {
    if IDENTIFIER.is_match(collection) {
        Ok(format!("\"{collection}\""))
    } else {
        Err(PersistenceError::InvalidIdentifier(collection.to_string()))
    }
}

// Nombres leídos del catálogo: se escapan en vez de validarse.
fn quote_catalog_name(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Determina si un error es transitorio (recomendado reintentar con backoff).
pub(crate) fn is_retryable(e: &PersistenceError) -> bool {
    match e {
        PersistenceError::SerializationConflict => true,
        PersistenceError::TransientIo(_) => true,
        PersistenceError::Unknown(msg) => {
            let m = msg.to_lowercase();
            m.contains("deadlock detected")
            || m.contains("could not serialize access due to concurrent update")
            || m.contains("terminating connection due to administrator command")
            || m.contains("connection closed")
            || m.contains("connection refused")
            || m.contains("timeout")
        }
        _ => false,
    }
}

/// Retry simple con backoff lineal (hasta 3 reintentos: 15ms, 30ms, 45ms).
///
/// Sólo repite la unidad de trabajo provista por `f`; se emite `warn!` por
/// intento y `error!` cuando el error final no es reintentable.
pub(crate) fn with_retry<F, T>(mut f: F) -> Result<T, PersistenceError>
    where F: FnMut() -> Result<T, PersistenceError>
{
    let mut attempts = 0;
    loop {
        match f() {
            Err(e) if is_retryable(&e) && attempts < 3 => {
                let delay_ms = 15 * ((attempts + 1) as u64);
                warn!("retryable error (attempt {}): {:?} -> sleeping {}ms",
                      attempts + 1,
                      e,
                      delay_ms);
                std::thread::sleep(std::time::Duration::from_millis(delay_ms));
                attempts += 1;
            }
            Err(e) => {
                if !is_retryable(&e) {
                    error!("non-retryable persistence error: {e}");
                }
                return Err(e);
            }
            ok => return ok,
        }
    }
}

#[derive(QueryableByName, Debug)]
struct PresenceRow {
    #[diesel(sql_type = Bool)]
    present: bool,
}

#[derive(QueryableByName, Debug)]
struct TableNameRow {
    #[diesel(sql_type = Text)]
    table_name: String,
}

#[derive(QueryableByName, Debug)]
struct DocumentRow {
    #[diesel(sql_type = Jsonb)]
    doc: Value,
}

fn document_id(doc: &Record) -> String {
    match doc.get(ID_FIELD) {
        Some(Value::String(id)) => id.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

/// Store de documentos sobre Postgres.
///
/// Los modelos se registran explícitamente (`with_model`); opcionalmente un
/// modelo desconocido puede mapearse al nombre de colección por defecto.
pub struct PgDocumentStore<P: ConnectionProvider> {
    provider: Arc<P>,
    models: HashMap<String, String>,
    derive_collections: bool,
}

impl<P: ConnectionProvider> PgDocumentStore<P> {
    pub fn new(provider: P) -> Self {
        Self { provider: Arc::new(provider),
               models: HashMap::new(),
               derive_collections: false }
    }

    pub fn with_model(mut self, model: &str, collection: &str) -> Self {
        self.models.insert(model.to_string(), collection.to_string());
        self
    }

    /// Modelos no registrados usan `default_collection_name`.
    pub fn with_derived_collections(mut self) -> Self {
        self.derive_collections = true;
        self
    }

    // Corre `f` en el pool de tareas bloqueantes de tokio.
    async fn blocking<T, F>(&self, f: F) -> Result<T, PersistenceError>
        where F: FnOnce(&P) -> Result<T, PersistenceError> + Send + 'static,
              T: Send + 'static
    {
        let provider = Arc::clone(&self.provider);
        tokio::task::spawn_blocking(move || f(provider.as_ref())).await
                                                                 .map_err(|e| PersistenceError::Unknown(format!("blocking task: {e}")))?
    }

    /// Documentos de una colección en orden de inserción (vacío si la tabla
    /// no existe).
    pub async fn documents(&self, collection: &str) -> Result<Vec<Record>, PersistenceError> {
        let table = quoted_table(collection)?;
        let name = collection.to_string();
        if !self.table_exists(name).await? {
            return Ok(Vec::new());
        }
        self.blocking(move |p| {
                with_retry(|| {
                    let mut conn = p.connection()?;
                    let rows: Vec<DocumentRow> =
                        diesel::sql_query(format!("SELECT doc FROM {table} ORDER BY seq")).load(&mut conn)?;
                    Ok(rows.into_iter()
                           .filter_map(|r| match r.doc {
                               Value::Object(map) => Some(map),
                               _ => None,
                           })
                           .collect())
                })
            })
            .await
    }

    async fn table_exists(&self, name: String) -> Result<bool, PersistenceError> {
        self.blocking(move |p| {
                with_retry(|| {
                    let mut conn = p.connection()?;
                    let row: PresenceRow = diesel::sql_query("SELECT EXISTS (SELECT 1 FROM information_schema.tables \
                                                              WHERE table_schema = current_schema() AND table_name = $1) AS present")
                        .bind::<Text, _>(&name)
                        .get_result(&mut conn)?;
                    Ok(row.present)
                })
            })
            .await
    }
}

#[async_trait]
impl<P: ConnectionProvider> DocumentStore for PgDocumentStore<P> {
    async fn model(&self, name: &str) -> Result<ModelHandle, StoreError> {
        let collection = match self.models.get(name) {
            Some(collection) => collection.clone(),
            None if self.derive_collections => default_collection_name(name),
            None => return Err(StoreError::ModelNotFound(name.to_string())),
        };
        quoted_table(&collection)?;
        Ok(ModelHandle::new(name, collection))
    }

    async fn create(&self, model: &ModelHandle, records: Vec<Record>) -> Result<Vec<Record>, StoreError> {
        let table = quoted_table(model.collection_name())?;
        let docs: Vec<Record> = records.into_iter().map(stamp_document).collect();
        debug!("create:start collection={} count={}", model.collection_name(), docs.len());
        let persisted = self.blocking(move |p| {
                                with_retry(|| {
                                    let mut conn = p.connection()?;
                                    conn.transaction::<_, PersistenceError, _>(|tx| {
                                            diesel::sql_query(format!("CREATE TABLE IF NOT EXISTS {table} (seq BIGSERIAL, id TEXT PRIMARY KEY, doc JSONB NOT NULL)"))
                                                .execute(tx)?;
                                            for doc in &docs {
                                                diesel::sql_query(format!("INSERT INTO {table} (id, doc) VALUES ($1, $2)"))
                                                    .bind::<Text, _>(document_id(doc))
                                                    .bind::<Jsonb, _>(Value::Object(doc.clone()))
                                                    .execute(tx)?;
                                            }
                                            Ok(())
                                        })?;
                                    Ok(docs.clone())
                                })
                            })
                            .await?;
        debug!("create:done collection={} count={}", model.collection_name(), persisted.len());
        Ok(persisted)
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool, StoreError> {
        quoted_table(collection)?;
        Ok(self.table_exists(collection.to_string()).await?)
    }

    async fn drop_collection(&self, collection: &str) -> Result<(), StoreError> {
        let table = quoted_table(collection)?;
        debug!("drop_collection collection={collection}");
        self.blocking(move |p| {
                with_retry(|| {
                    let mut conn = p.connection()?;
                    diesel::sql_query(format!("DROP TABLE IF EXISTS {table}")).execute(&mut conn)?;
                    Ok(())
                })
            })
            .await?;
        Ok(())
    }

    async fn drop_database(&self) -> Result<(), StoreError> {
        let dropped = self.blocking(|p| {
                              with_retry(|| {
                                  let mut conn = p.connection()?;
                                  conn.transaction::<_, PersistenceError, _>(|tx| {
                                          let tables: Vec<TableNameRow> =
                                              diesel::sql_query("SELECT table_name::text AS table_name FROM information_schema.tables \
                                                                 WHERE table_schema = current_schema() AND table_type = 'BASE TABLE'")
                                                  .load(tx)?;
                                          for t in &tables {
                                              diesel::sql_query(format!("DROP TABLE IF EXISTS {} CASCADE",
                                                                        quote_catalog_name(&t.table_name)))
                                                  .execute(tx)?;
                                          }
                                          Ok(tables.len())
                                      })
                              })
                          })
                          .await?;
        debug!("drop_database tables={dropped}");
        Ok(())
    }
}

/// Construye un pool r2d2 de conexiones Postgres.
///
/// - Ajusta tamaños: 0 se trata como 1 y `min > max` usa `min = max`.
/// - Verifica conectividad haciendo un checkout inicial.
/// - Devuelve `PersistenceError::TransientIo` ante errores del pool/manager.
pub fn build_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<PgPool, PersistenceError> {
    let validated_min = if min_size == 0 { 1 } else { min_size };
    let validated_max = if max_size == 0 { 1 } else { max_size };
    if validated_min > validated_max {
        warn!("min_size > max_size ({} > {}), ajustando min=max",
              validated_min, validated_max);
    }
    let final_min = validated_min.min(validated_max);
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = r2d2::Pool::builder().min_idle(Some(final_min))
                                    .max_size(validated_max)
                                    .build(manager)
                                    .map_err(|e| PersistenceError::TransientIo(format!("pool build: {e}")))?;
    pool.get()
        .map_err(|e| PersistenceError::TransientIo(format!("pool get: {e}")))?;
    Ok(pool)
}

/// Helper de desarrollo: carga `.env`, lee configuración (DATABASE_URL,
/// tamaños) y construye el pool.
pub fn build_dev_pool_from_env() -> Result<PgPool, PersistenceError> {
    crate::config::init_dotenv();
    let cfg = crate::config::DbConfig::from_env()?;
    build_pool(&cfg.url, cfg.min_connections, cfg.max_connections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn identifiers_are_validated() {
        assert_eq!(quoted_table("users").unwrap(), "\"users\"");
        assert_eq!(quoted_table("_audit_2024").unwrap(), "\"_audit_2024\"");
        assert!(matches!(quoted_table("users; DROP TABLE x"), Err(PersistenceError::InvalidIdentifier(_))));
        assert!(quoted_table("9lives").is_err());
        assert!(quoted_table("").is_err());
    }

    #[test]
    fn catalog_names_are_escaped() {
        assert_eq!(quote_catalog_name("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn retry_stops_on_non_retryable_errors() {
        let calls = Cell::new(0);
        let out: Result<(), _> = with_retry(|| {
            calls.set(calls.get() + 1);
            Err(PersistenceError::UniqueViolation("dup".into()))
        });
        assert!(out.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn retry_gives_up_after_three_retries() {
        let calls = Cell::new(0);
        let out: Result<(), _> = with_retry(|| {
            calls.set(calls.get() + 1);
            Err(PersistenceError::TransientIo("connection refused".into()))
        });
        assert!(out.is_err());
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn retry_recovers_from_transient_errors() {
        let calls = Cell::new(0);
        let out = with_retry(|| {
            calls.set(calls.get() + 1);
            if calls.get() < 2 {
                Err(PersistenceError::Unknown("deadlock detected".into()))
            } else {
                Ok(7)
            }
        });
        assert_eq!(out.unwrap(), 7);
    }

    #[test]
    fn document_ids_are_rendered_as_text() {
        let mut doc = Record::new();
        doc.insert(ID_FIELD.into(), Value::from("abc"));
        assert_eq!(document_id(&doc), "abc");
        doc.insert(ID_FIELD.into(), Value::from(5));
        assert_eq!(document_id(&doc), "5");
    }
}
