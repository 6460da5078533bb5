//! seed-core: motor de seeding de documentos con referencias y expresiones.
pub mod constants;
pub mod engine;
pub mod errors;
pub mod expression;
pub mod model;
pub mod reference;
pub mod store;
pub mod unwind;

pub use engine::{GroupProcessor, SeedPhase, Seeder};
pub use errors::{ErrorClass, SeedError};
pub use expression::{EvalError, Evaluator, ModuleError, ModuleRegistry};
pub use model::{DependencyMap, GroupDefinition, Record, ResultTree, SeedDocument, SeedOptions};
pub use reference::find_reference;
pub use store::{default_collection_name, generate_object_id, stamp_document, DocumentStore, InMemoryStore, ModelHandle, StoreCall, StoreError};
pub use unwind::{parse_value, unwind, UnwindContext};
