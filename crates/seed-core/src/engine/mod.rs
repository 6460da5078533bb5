//! Motor de seeding: orquestador de la corrida y procesador de grupos.
//!
//! Una corrida recorre `Idle -> DroppingDatabase? -> ResolvingDependencies ->
//! ProcessingGroups -> Done | Failed`. Cada transición se emite con `debug!`.

pub mod group;
pub mod seeder;

use std::fmt;

pub use group::GroupProcessor;
pub use seeder::Seeder;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SeedPhase {
    #[default]
    Idle,
    DroppingDatabase,
    ResolvingDependencies,
    /// Grupo en curso.
    ProcessingGroups { group: String },
    Done,
    Failed,
}

impl SeedPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SeedPhase::Done | SeedPhase::Failed)
    }
}

impl fmt::Display for SeedPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeedPhase::Idle => write!(f, "idle"),
            SeedPhase::DroppingDatabase => write!(f, "dropping-database"),
            SeedPhase::ResolvingDependencies => write!(f, "resolving-dependencies"),
            SeedPhase::ProcessingGroups { group } => write!(f, "processing-groups({group})"),
            SeedPhase::Done => write!(f, "done"),
            SeedPhase::Failed => write!(f, "failed"),
        }
    }
}
