//! seed-persistence
//!
//! Implementación Postgres (Diesel + r2d2) de `seed_core::DocumentStore`.
//!
//! Módulos:
//! - `pg`: pool, proveedor de conexiones, reintentos y `PgDocumentStore`.
//! - `config`: carga de configuración desde `.env` / variables de entorno.
//! - `error`: mapeo de errores de Diesel a variantes semánticas.

pub mod config;
pub mod error;
pub mod pg;

pub use config::{init_dotenv, DbConfig};
pub use error::PersistenceError;
pub use pg::{build_dev_pool_from_env, build_pool, ConnectionProvider, PgDocumentStore, PgPool, PoolProvider};
