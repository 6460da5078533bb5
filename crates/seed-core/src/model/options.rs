//! Opciones de una corrida de seeding.

/// Estrategias de reseteo previas al seeding. Son mutuamente excluyentes:
/// `drop_collections` gana sobre `drop_database`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedOptions {
    pub drop_database: bool,
    pub drop_collections: bool,
}

impl Default for SeedOptions {
    fn default() -> Self {
        Self { drop_database: true, drop_collections: false }
    }
}

impl SeedOptions {
    pub fn new(drop_database: bool, drop_collections: bool) -> Self {
        Self { drop_database, drop_collections }.normalized()
    }

    /// Borra sólo las colecciones de los modelos sembrados.
    pub fn drop_collections() -> Self {
        Self::new(false, true)
    }

    /// No borra nada antes de sembrar.
    pub fn keep_database() -> Self {
        Self::new(false, false)
    }

    /// Aplica la precedencia: pedir `drop_collections` desactiva `drop_database`.
    pub fn normalized(self) -> Self {
        if self.drop_collections {
            Self { drop_database: false, drop_collections: true }
        } else {
            self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_drop_the_database() {
        let o = SeedOptions::default();
        assert!(o.drop_database);
        assert!(!o.drop_collections);
    }

    #[test]
    fn drop_collections_wins_over_drop_database() {
        let o = SeedOptions { drop_database: true, drop_collections: true }.normalized();
        assert_eq!(o, SeedOptions { drop_database: false, drop_collections: true });
        assert_eq!(SeedOptions::new(true, true), o);
    }

    #[test]
    fn keep_database_disables_both() {
        assert_eq!(SeedOptions::keep_database(), SeedOptions { drop_database: false, drop_collections: false });
    }
}
