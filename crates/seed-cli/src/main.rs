use std::process::ExitCode;

use docseed::config::CONFIG;
use docseed::{load_seed_file, InMemoryStore, ResultTree, SeedDocument, SeedOptions, Seeder};
use log::{debug, error};
use seed_persistence::{build_dev_pool_from_env, PgDocumentStore, PoolProvider};

const USAGE: &str = "uso: docseed-cli <seed.json> [--drop-collections] [--keep-database] [--model Nombre=coleccion]... [--pretty]";

#[derive(Debug, Default, PartialEq, Eq)]
struct CliArgs {
    path: Option<String>,
    drop_collections: bool,
    keep_database: bool,
    models: Vec<(String, String)>,
    pretty: bool,
}

fn parse_args(args: &[String]) -> Result<CliArgs, String> {
    let mut out = CliArgs::default();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--drop-collections" => out.drop_collections = true,
            "--keep-database" => out.keep_database = true,
            "--pretty" => out.pretty = true,
            "--model" => {
                i += 1;
                let mapping = args.get(i).ok_or("--model requiere Nombre=coleccion")?;
                let (model, collection) = mapping.split_once('=')
                                              .filter(|(m, c)| !m.is_empty() && !c.is_empty())
                                              .ok_or_else(|| format!("--model inválido: {mapping}"))?;
                out.models.push((model.to_string(), collection.to_string()));
            }
            flag if flag.starts_with("--") => return Err(format!("opción desconocida: {flag}")),
            path => {
                if out.path.replace(path.to_string()).is_some() {
                    return Err("sólo se admite un archivo de seeding".into());
                }
            }
        }
        i += 1;
    }
    Ok(out)
}

/// Los flags de línea de comandos pisan a la configuración de entorno.
fn resolve_options(args: &CliArgs, base: SeedOptions) -> SeedOptions {
    let drop_database = base.drop_database && !args.keep_database;
    let drop_collections = base.drop_collections || args.drop_collections;
    SeedOptions::new(drop_database, drop_collections)
}

async fn run_in_memory(args: &CliArgs, document: SeedDocument, options: SeedOptions) -> Result<ResultTree, String> {
    let mut store = InMemoryStore::permissive();
    for (model, collection) in &args.models {
        store = store.with_model(model, collection);
    }
    Seeder::new(store).seed(document, options).await.map_err(|e| e.to_string())
}

async fn run_postgres(args: &CliArgs, document: SeedDocument, options: SeedOptions) -> Result<ResultTree, String> {
    let pool = build_dev_pool_from_env().map_err(|e| format!("pool error: {e}"))?;
    let mut store = PgDocumentStore::new(PoolProvider { pool }).with_derived_collections();
    for (model, collection) in &args.models {
        store = store.with_model(model, collection);
    }
    Seeder::new(store).seed(document, options).await.map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let _ = dotenvy::dotenv();

    let raw: Vec<String> = std::env::args().skip(1).collect();
    let args = match parse_args(&raw) {
        Ok(CliArgs { path: None, .. }) => {
            eprintln!("{USAGE}");
            return ExitCode::from(2);
        }
        Ok(args) => args,
        Err(e) => {
            eprintln!("[docseed] {e}\n{USAGE}");
            return ExitCode::from(2);
        }
    };
    let Some(path) = args.path.as_deref() else {
        return ExitCode::from(2);
    };

    let document = match load_seed_file(path) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("[docseed] {e}");
            return ExitCode::from(3);
        }
    };
    let options = resolve_options(&args, CONFIG.seed.options());
    debug!("cli options={options:?} postgres={}", CONFIG.database_url.is_some());

    let result = if CONFIG.database_url.is_some() {
        run_postgres(&args, document, options).await
    } else {
        run_in_memory(&args, document, options).await
    };

    match result {
        Ok(tree) => {
            let rendered = if args.pretty {
                serde_json::to_string_pretty(&tree)
            } else {
                serde_json::to_string(&tree)
            };
            match rendered {
                Ok(json) => {
                    println!("{json}");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("[docseed] {e}");
                    ExitCode::from(5)
                }
            }
        }
        Err(e) => {
            error!("seed failed: {e}");
            eprintln!("[docseed] {e}");
            ExitCode::from(4)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_flags_and_models() {
        let parsed = parse_args(&args(&["seed.json", "--drop-collections", "--model", "User=people", "--pretty"])).unwrap();
        assert_eq!(parsed.path.as_deref(), Some("seed.json"));
        assert!(parsed.drop_collections && parsed.pretty && !parsed.keep_database);
        assert_eq!(parsed.models, vec![("User".to_string(), "people".to_string())]);
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(parse_args(&args(&["a.json", "b.json"])).is_err());
        assert!(parse_args(&args(&["a.json", "--model", "User"])).is_err());
        assert!(parse_args(&args(&["a.json", "--model"])).is_err());
        assert!(parse_args(&args(&["a.json", "--force"])).is_err());
    }

    #[test]
    fn cli_flags_override_environment() {
        let parsed = parse_args(&args(&["a.json", "--keep-database"])).unwrap();
        assert_eq!(resolve_options(&parsed, SeedOptions::default()), SeedOptions::keep_database());
        let parsed = parse_args(&args(&["a.json", "--drop-collections"])).unwrap();
        assert_eq!(resolve_options(&parsed, SeedOptions::default()), SeedOptions::drop_collections());
    }

    #[tokio::test]
    async fn in_memory_runs_derive_collection_names() {
        let parsed = parse_args(&args(&["a.json", "--model", "Person=people"])).unwrap();
        let doc = docseed::parse_seed_str(r#"{"people": {"_model": "Person", "p": {"n": 1}}, "users": {"_model": "User", "u": {"who": "->people.p"}}}"#).unwrap();
        let tree = run_in_memory(&parsed, doc, SeedOptions::default()).await.unwrap();
        assert_eq!(tree.get("users", "u").unwrap()["who"], tree.get("people", "p").unwrap()["_id"]);
    }
}
