//! Valores en tiempo de evaluación y su conversión a/desde JSON.
//!
//! Las reglas de coerción imitan las de JavaScript en lo que el seeding
//! necesita: concatenación con `+`, truthiness, igualdad laxa y estricta.
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde_json::{Map, Number};

use super::error::EvalError;

/// Función nativa expuesta al contexto de evaluación.
pub type NativeFn = fn(&[Value]) -> Result<Value, EvalError>;

#[derive(Clone)]
pub struct NativeFunction {
    pub name: &'static str,
    pub call: NativeFn,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Function: {}]", self.name)
    }
}

/// Módulo de helpers: invocable (`moment()`), construible (`new Date()`) y
/// con miembros (`Math.floor`, `uuid.v4`).
pub struct Module {
    pub name: String,
    pub call: Option<NativeFn>,
    pub construct: Option<NativeFn>,
    pub members: IndexMap<String, Value>,
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module").field("name", &self.name).field("members", &self.members.keys().collect::<Vec<_>>()).finish()
    }
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), call: None, construct: None, members: IndexMap::new() }
    }

    pub fn callable(mut self, call: NativeFn) -> Self {
        self.call = Some(call);
        self
    }

    pub fn constructible(mut self, construct: NativeFn) -> Self {
        self.construct = Some(construct);
        self
    }

    pub fn function(mut self, name: &'static str, call: NativeFn) -> Self {
        self.members.insert(name.to_string(), Value::Function(NativeFunction { name, call }));
        self
    }

    pub fn constant(mut self, name: &str, value: Value) -> Self {
        self.members.insert(name.to_string(), value);
        self
    }

    pub fn into_value(self) -> Value {
        Value::Module(Arc::new(self))
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
    Date(DateTime<Utc>),
    Function(NativeFunction),
    Module(Arc<Module>),
}

impl Value {
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => Value::Array(items.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(map) => Value::Object(map.iter().map(|(k, v)| (k.clone(), Value::from_json(v))).collect()),
        }
    }

    pub fn from_record(record: &Map<String, serde_json::Value>) -> Self {
        Value::Object(record.iter().map(|(k, v)| (k.clone(), Value::from_json(v))).collect())
    }

    /// Convierte al valor que se enviará a persistencia. `undefined` se
    /// guarda como `null`; funciones y módulos no son almacenables.
    pub fn to_json(&self) -> Result<serde_json::Value, EvalError> {
        Ok(match self {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect::<Result<_, _>>()?),
            Value::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k.clone(), v.to_json()?);
                }
                serde_json::Value::Object(out)
            }
            Value::Date(d) => serde_json::Value::String(iso_string(d)),
            Value::Function(f) => return Err(EvalError::Unserializable(format!("function {}", f.name))),
            Value::Module(m) => return Err(EvalError::Unserializable(format!("module {}", m.name))),
        })
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Date(_) => "date",
            Value::Function(_) | Value::Module(_) => "function",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Equivalente a `String(x)`.
    pub fn to_js_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".into(),
            Value::Null => "null".into(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Array(items) => items.iter()
                                        .map(|v| match v {
                                            Value::Undefined | Value::Null => String::new(),
                                            other => other.to_js_string(),
                                        })
                                        .collect::<Vec<_>>()
                                        .join(","),
            Value::Object(_) => "[object Object]".into(),
            Value::Date(d) => iso_string(d),
            Value::Function(f) => format!("function {}() {{ [native code] }}", f.name),
            Value::Module(m) => format!("function {}() {{ [native code] }}", m.name),
        }
    }

    /// Equivalente a `Number(x)`.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => {
                let t = s.trim();
                if t.is_empty() { 0.0 } else { parse_numeric_string(t) }
            }
            Value::Date(d) => d.timestamp_millis() as f64,
            Value::Array(items) if items.is_empty() => 0.0,
            Value::Array(items) if items.len() == 1 => items[0].to_number(),
            _ => f64::NAN,
        }
    }

    /// Los valores no primitivos se convierten a string al operar con `+`.
    fn is_stringish(&self) -> bool {
        matches!(self,
                 Value::String(_) | Value::Array(_) | Value::Object(_) | Value::Date(_) | Value::Function(_) | Value::Module(_))
    }

    pub fn add(&self, other: &Value) -> Value {
        if self.is_stringish() || other.is_stringish() {
            Value::String(format!("{}{}", self.to_js_string(), other.to_js_string()))
        } else {
            Value::Number(self.to_number() + other.to_number())
        }
    }

    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.strict_equals(y)),
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k).is_some_and(|w| v.strict_equals(w)))
            }
            (Value::Module(a), Value::Module(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
            (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
            (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) | (Value::Bool(_), _) | (_, Value::Bool(_)) => {
                self.to_number() == other.to_number()
            }
            _ => self.strict_equals(other),
        }
    }
}

/// Formato numérico de JS: enteros sin decimales, `NaN`, `Infinity`.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".into()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity".into() } else { "-Infinity".into() }
    } else if n == n.trunc() && n.abs() < 1e21 {
        format!("{}", n as i128)
    } else {
        format!("{n}")
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    const MAX_SAFE: f64 = 9_007_199_254_740_991.0;
    if n.is_finite() && n == n.trunc() && n.abs() <= MAX_SAFE {
        serde_json::Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map(serde_json::Value::Number).unwrap_or(serde_json::Value::Null)
    }
}

/// `Date.prototype.toISOString`: milisegundos y sufijo `Z`.
pub fn iso_string(d: &DateTime<Utc>) -> String {
    d.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Literal numérico de `Number("...")`: decimal con exponente opcional,
/// `Infinity` con signo y enteros `0x`/`0o`/`0b`. Todo lo demás es `NaN`.
fn parse_numeric_string(t: &str) -> f64 {
    match t {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    let radix = match t.get(..2) {
        Some("0x" | "0X") => Some(16),
        Some("0o" | "0O") => Some(8),
        Some("0b" | "0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        let digits = &t[2..];
        if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
            return f64::NAN;
        }
        return digits.chars()
                     .filter_map(|c| c.to_digit(radix))
                     .fold(0.0, |acc, d| acc * f64::from(radix) + f64::from(d));
    }
    // `f64::from_str` también acepta "inf" y "nan"
    if t.bytes().all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E')) {
        t.parse().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}
