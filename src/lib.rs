//! docseed
//!
//! Librería de entrada del workspace:
//! - Expone `config` (variables de entorno -> `SeedOptions`).
//! - Expone `loader` para leer documentos de seeding desde JSON.
//! - Re-exporta el motor (`seed_core`) para clientes que sólo dependen de este crate.

pub mod config;
pub mod errors;
pub mod loader;

pub use seed_core;
pub use seed_core::{DocumentStore, InMemoryStore, ResultTree, SeedDocument, SeedError, SeedOptions, Seeder};

pub use errors::LoadError;
pub use loader::{load_seed_file, parse_seed_str, seed_file};
