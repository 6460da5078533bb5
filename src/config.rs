//! Configuración central de la aplicación.
//! Carga variables de entorno (.env) y expone una estructura inmutable (`CONFIG`).
use std::env;

use once_cell::sync::Lazy;
use seed_core::SeedOptions;

/// Configuración global de la aplicación.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Estrategia de reseteo previa al seeding.
    pub seed: SeedConfig,
    /// URL de Postgres; ausente implica store en memoria.
    pub database_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedConfig {
    pub drop_database: bool,
    pub drop_collections: bool,
}

impl SeedConfig {
    /// Opciones de corrida con la precedencia ya aplicada.
    pub fn options(&self) -> SeedOptions {
        SeedOptions::new(self.drop_database, self.drop_collections)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignora error si no existe .env
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Construye la configuración a partir de una función de lectura de claves.
    pub fn from_lookup<F>(lookup: F) -> Self
        where F: Fn(&str) -> Option<String>
    {
        let defaults = SeedOptions::default();
        let flag = |key: &str, default: bool| lookup(key).and_then(|v| parse_flag(&v)).unwrap_or(default);
        Self { seed: SeedConfig { drop_database: flag("SEED_DROP_DATABASE", defaults.drop_database),
                                  drop_collections: flag("SEED_DROP_COLLECTIONS", defaults.drop_collections) },
               database_url: lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()) }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Instancia global perezosa de configuración, evaluada una sola vez.
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);
