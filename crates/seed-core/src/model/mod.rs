//! Modelos del documento de seeding (entrada, opciones y árbol de resultados).

pub mod document;
pub mod options;
pub mod result_tree;

pub use document::{DependencyMap, GroupDefinition, Record, SeedDocument};
pub use options::SeedOptions;
pub use result_tree::ResultTree;
