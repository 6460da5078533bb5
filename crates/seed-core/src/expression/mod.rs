//! Evaluador de expresiones en sandbox.
//!
//! Contrato:
//! - El contexto de cada evaluación se arma con los globals, las dependencias
//!   ligadas durante la corrida y el registro actual bajo `SELF_ALIAS`.
//! - Las auto-referencias textuales (`this`) se reescriben al alias antes de
//!   parsear.
//! - `evaluate_or_fallback` nunca falla: ante cualquier error devuelve el
//!   string original sin modificar. Quien llama sólo puede distinguir el
//!   fallback porque el valor sigue pareciendo una expresión cruda.

pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod modules;
pub mod parser;
pub mod value;

use indexmap::IndexMap;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::constants::SELF_ALIAS;
use crate::model::Record;

pub use error::{EvalError, ModuleError};
pub use interpreter::Interpreter;
pub use modules::ModuleRegistry;
pub use parser::{parse, Expr};
pub use value::{Module, NativeFn, NativeFunction, Value};

static SELF_REFERENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bthis\b").expect("static self-reference pattern"));

/// Contexto de evaluación con alcance de corrida.
#[derive(Debug, Default)]
pub struct Evaluator {
    dependencies: IndexMap<String, Value>,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Liga un valor externo (módulo de helpers) bajo `name`.
    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.dependencies.insert(name.into(), value);
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.dependencies.contains_key(name)
    }

    pub fn bindings(&self) -> impl Iterator<Item = &String> {
        self.dependencies.keys()
    }

    /// Evalúa `source` con `receiver` como registro actual.
    pub fn evaluate(&self, source: &str, receiver: &Record) -> Result<serde_json::Value, EvalError> {
        let rewritten = rewrite_self_references(source);
        let expr = parse(&rewritten)?;
        let mut scope = modules::globals();
        for (name, value) in &self.dependencies {
            scope.insert(name.clone(), value.clone());
        }
        scope.insert(SELF_ALIAS.to_string(), Value::from_record(receiver));
        Interpreter::new(&scope).eval(&expr)?.to_json()
    }

    /// Evalúa un string marcado como expresión. La fuente es todo lo que sigue
    /// al primer carácter; ante un error se devuelve `raw` intacto.
    pub fn evaluate_or_fallback(&self, raw: &str, receiver: &Record) -> serde_json::Value {
        let source: String = raw.chars().skip(1).collect();
        match self.evaluate(&source, receiver) {
            Ok(value) => value,
            Err(err) => {
                debug!("expression fallback raw={raw:?} error={err}");
                serde_json::Value::String(raw.to_string())
            }
        }
    }
}

/// Reescribe `this` (como palabra) al alias del registro actual.
pub fn rewrite_self_references(source: &str) -> String {
    SELF_REFERENCE.replace_all(source, SELF_ALIAS).into_owned()
}
