//! Orquestador de una corrida de seeding.
use log::debug;
use serde_json::Value;

use super::{GroupProcessor, SeedPhase};
use crate::errors::SeedError;
use crate::expression::{Evaluator, ModuleRegistry};
use crate::model::{ResultTree, SeedDocument, SeedOptions};
use crate::store::DocumentStore;

/// Punto de entrada del motor. Cada llamada a `seed` arranca con un árbol de
/// resultados y un contexto de dependencias nuevos; nada se arrastra entre
/// corridas.
#[derive(Debug)]
pub struct Seeder<S: DocumentStore> {
    store: S,
    modules: ModuleRegistry,
}

impl<S: DocumentStore> Seeder<S> {
    pub fn new(store: S) -> Self {
        Self { store, modules: ModuleRegistry::default() }
    }

    /// Reemplaza la lista de módulos que `_dependencies` puede nombrar.
    pub fn with_modules(mut self, modules: ModuleRegistry) -> Self {
        self.modules = modules;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn modules(&self) -> &ModuleRegistry {
        &self.modules
    }

    pub async fn seed_value(&self, document: Value, options: SeedOptions) -> Result<ResultTree, SeedError> {
        self.seed(SeedDocument::from_value(document)?, options).await
    }

    /// Ejecuta la corrida completa. Ante un error el árbol parcial se
    /// descarta; lo ya escrito queda en el store.
    pub async fn seed(&self, document: SeedDocument, options: SeedOptions) -> Result<ResultTree, SeedError> {
        let mut phase = PhaseTracker::default();
        match self.run(document, options.normalized(), &mut phase).await {
            Ok(tree) => {
                debug!("seed:done groups={}", tree.len());
                phase.enter(SeedPhase::Done);
                Ok(tree)
            }
            Err(err) => {
                debug!("seed:error phase={} error={err}", phase.current);
                phase.enter(SeedPhase::Failed);
                Err(err)
            }
        }
    }

    async fn run(&self,
                 mut document: SeedDocument,
                 options: SeedOptions,
                 phase: &mut PhaseTracker)
                 -> Result<ResultTree, SeedError> {
        // El borrado de la base termina antes de mirar dependencias o grupos.
        if options.drop_database {
            phase.enter(SeedPhase::DroppingDatabase);
            self.store.drop_database().await?;
        }

        phase.enter(SeedPhase::ResolvingDependencies);
        let mut evaluator = Evaluator::new();
        for (binding, module_id) in document.take_dependencies()? {
            if evaluator.is_bound(&binding) {
                continue;
            }
            let module = self.modules.resolve(&module_id)?;
            debug!("seed:dependency binding={binding} module={module_id}");
            evaluator.bind(binding, module);
        }
        debug!("seed:dependencies bound=[{}]", evaluator.bindings().map(String::as_str).collect::<Vec<_>>().join(", "));

        let mut tree = ResultTree::new();
        let processor = GroupProcessor::new(&self.store, options.drop_collections);
        for (name, raw) in document.into_groups() {
            phase.enter(SeedPhase::ProcessingGroups { group: name.clone() });
            processor.process(&name, raw, &evaluator, &mut tree).await?;
        }
        Ok(tree)
    }
}

#[derive(Debug, Default)]
struct PhaseTracker {
    current: SeedPhase,
}

impl PhaseTracker {
    fn enter(&mut self, next: SeedPhase) {
        debug!("seed:phase {} -> {next}", self.current);
        self.current = next;
    }
}
