//! Carga de configuración de conexión desde variables de entorno.
//! Usa convención `DATABASE_URL` y parámetros opcionales de pool.

use std::env;

use dotenvy::dotenv;
use once_cell::sync::Lazy;

use crate::error::PersistenceError;

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub url: String,
    pub min_connections: u32,
    pub max_connections: u32,
}

impl DbConfig {
    pub fn from_env() -> Result<Self, PersistenceError> {
        Lazy::force(&DOTENV_LOADED);
        let url = env::var("DATABASE_URL").map_err(|_| PersistenceError::Config("DATABASE_URL no definido".into()))?;
        Ok(Self::from_parts(url,
                            env::var("DATABASE_MIN_CONNECTIONS").ok().as_deref(),
                            env::var("DATABASE_MAX_CONNECTIONS").ok().as_deref()))
    }

    /// Tamaños inválidos o ausentes caen a los defaults (2 / 16).
    pub fn from_parts(url: String, min: Option<&str>, max: Option<&str>) -> Self {
        let min_connections = min.and_then(|v| v.parse().ok()).unwrap_or(2);
        let max_connections = max.and_then(|v| v.parse().ok()).unwrap_or(16);
        Self { url, min_connections, max_connections }
    }
}

/// Forzar carga temprana de .env desde aplicaciones externas si se desea.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_sizes_default_when_missing_or_invalid() {
        let cfg = DbConfig::from_parts("postgres://localhost/seed".into(), None, Some("many"));
        assert_eq!(cfg.min_connections, 2);
        assert_eq!(cfg.max_connections, 16);
        let cfg = DbConfig::from_parts("postgres://localhost/seed".into(), Some("1"), Some("4"));
        assert_eq!((cfg.min_connections, cfg.max_connections), (1, 4));
    }
}
