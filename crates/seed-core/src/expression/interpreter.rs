//! Intérprete del AST de expresiones.
//!
//! El scope es un mapa plano (globals + dependencias + alias del registro
//! actual); no existen asignaciones ni declaraciones, así que la evaluación
//! no tiene efectos secundarios visibles fuera del resultado.
use chrono::{DateTime, Datelike, Duration, Months, SecondsFormat, Timelike, Utc};
use indexmap::IndexMap;

use super::error::EvalError;
use super::modules::arg;
use super::parser::{BinaryOp, Expr, Literal, LogicalOp, UnaryOp};
use super::value::{format_number, iso_string, Value};

pub struct Interpreter<'s> {
    scope: &'s IndexMap<String, Value>,
}

impl<'s> Interpreter<'s> {
    pub fn new(scope: &'s IndexMap<String, Value>) -> Self {
        Self { scope }
    }

    pub fn eval(&self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Literal(lit) => Ok(match lit {
                Literal::Number(n) => Value::Number(*n),
                Literal::Str(s) => Value::String(s.clone()),
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Null => Value::Null,
                Literal::Undefined => Value::Undefined,
            }),
            Expr::Array(items) => Ok(Value::Array(items.iter().map(|e| self.eval(e)).collect::<Result<_, _>>()?)),
            Expr::Ident(name) => self.scope.get(name).cloned().ok_or_else(|| EvalError::UndefinedIdentifier(name.clone())),
            Expr::Member { object, property } => get_property(&self.eval(object)?, property),
            Expr::Index { object, index } => {
                let target = self.eval(object)?;
                let key = self.eval(index)?;
                get_property(&target, &property_key(&key))
            }
            Expr::Call { callee, args } => self.call(callee, args),
            Expr::New { callee, args } => {
                let target = self.eval(callee)?;
                let args = self.eval_args(args)?;
                match &target {
                    Value::Module(m) => match (m.construct, m.call) {
                        (Some(f), _) | (None, Some(f)) => f(&args),
                        (None, None) => Err(EvalError::NotCallable(label(callee))),
                    },
                    Value::Function(f) => (f.call)(&args),
                    _ => Err(EvalError::NotCallable(label(callee))),
                }
            }
            Expr::Unary { op, operand } => {
                let v = self.eval(operand)?;
                Ok(match op {
                    UnaryOp::Neg => Value::Number(-v.to_number()),
                    UnaryOp::Plus => Value::Number(v.to_number()),
                    UnaryOp::Not => Value::Bool(!v.is_truthy()),
                })
            }
            Expr::Binary { op, left, right } => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                Ok(binary(*op, &l, &r))
            }
            Expr::Logical { op, left, right } => {
                let l = self.eval(left)?;
                match (op, l.is_truthy()) {
                    (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(l),
                    _ => self.eval(right),
                }
            }
            Expr::Conditional { test, consequent, alternate } => {
                if self.eval(test)?.is_truthy() {
                    self.eval(consequent)
                } else {
                    self.eval(alternate)
                }
            }
        }
    }

    fn eval_args(&self, args: &[Expr]) -> Result<Vec<Value>, EvalError> {
        args.iter().map(|a| self.eval(a)).collect()
    }

    fn call(&self, callee: &Expr, args: &[Expr]) -> Result<Value, EvalError> {
        let (receiver, method) = match callee {
            Expr::Member { object, property } => (self.eval(object)?, property.clone()),
            Expr::Index { object, index } => (self.eval(object)?, property_key(&self.eval(index)?)),
            other => {
                let target = self.eval(other)?;
                let args = self.eval_args(args)?;
                return call_value(&target, &args, &label(other));
            }
        };
        let args = self.eval_args(args)?;
        call_method(&receiver, &method, &args)
    }
}

fn label(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => name.clone(),
        Expr::Member { object, property } => format!("{}.{}", label(object), property),
        Expr::Call { callee, .. } => format!("{}(...)", label(callee)),
        _ => "expression".to_string(),
    }
}

fn property_key(key: &Value) -> String {
    match key {
        Value::Number(n) => format_number(*n),
        other => other.to_js_string(),
    }
}

fn call_value(target: &Value, args: &[Value], name: &str) -> Result<Value, EvalError> {
    match target {
        Value::Function(f) => (f.call)(args),
        Value::Module(m) => match m.call {
            Some(f) => f(args),
            None => Err(EvalError::NotCallable(name.to_string())),
        },
        _ => Err(EvalError::NotCallable(name.to_string())),
    }
}

pub(crate) fn get_property(target: &Value, name: &str) -> Result<Value, EvalError> {
    Ok(match target {
        Value::Undefined | Value::Null => {
            return Err(EvalError::Type(format!("Cannot read properties of {} (reading '{name}')", target.type_of())))
        }
        Value::Object(map) => map.get(name).cloned().unwrap_or(Value::Undefined),
        Value::Module(m) => m.members.get(name).cloned().unwrap_or(Value::Undefined),
        Value::Array(items) => match name {
            "length" => Value::Number(items.len() as f64),
            idx => idx.parse::<usize>().ok().and_then(|i| items.get(i).cloned()).unwrap_or(Value::Undefined),
        },
        Value::String(s) => match name {
            "length" => Value::Number(s.chars().count() as f64),
            idx => idx.parse::<usize>()
                      .ok()
                      .and_then(|i| s.chars().nth(i))
                      .map(|c| Value::String(c.to_string()))
                      .unwrap_or(Value::Undefined),
        },
        _ => Value::Undefined,
    })
}

fn call_method(receiver: &Value, method: &str, args: &[Value]) -> Result<Value, EvalError> {
    if let Value::Object(_) | Value::Module(_) = receiver {
        let member = get_property(receiver, method)?;
        return call_value(&member, args, method);
    }
    if method == "toString" && !matches!(receiver, Value::Number(_) | Value::Undefined | Value::Null) {
        return Ok(Value::String(receiver.to_js_string()));
    }
    match receiver {
        Value::String(s) => string_method(s, method, args),
        Value::Array(items) => array_method(items, method, args),
        Value::Number(n) => number_method(*n, method, args),
        Value::Date(d) => date_method(*d, method, args),
        Value::Undefined | Value::Null => {
            Err(EvalError::Type(format!("Cannot read properties of {} (reading '{method}')", receiver.type_of())))
        }
        other => Err(EvalError::NotCallable(format!("{}.{method}", other.type_of()))),
    }
}

fn string_method(s: &str, method: &str, args: &[Value]) -> Result<Value, EvalError> {
    let text = |i: usize| arg(args, i).to_js_string();
    Ok(match method {
        "toUpperCase" => Value::String(s.to_uppercase()),
        "toLowerCase" => Value::String(s.to_lowercase()),
        "trim" => Value::String(s.trim().to_string()),
        "includes" => Value::Bool(s.contains(&text(0))),
        "startsWith" => Value::Bool(s.starts_with(&text(0))),
        "endsWith" => Value::Bool(s.ends_with(&text(0))),
        "replace" => Value::String(s.replacen(&text(0), &text(1), 1)),
        "concat" => Value::String(args.iter().fold(s.to_string(), |acc, a| acc + &a.to_js_string())),
        "split" => match arg(args, 0) {
            Value::Undefined => Value::Array(vec![Value::String(s.to_string())]),
            sep => {
                let sep = sep.to_js_string();
                if sep.is_empty() {
                    Value::Array(s.chars().map(|c| Value::String(c.to_string())).collect())
                } else {
                    Value::Array(s.split(sep.as_str()).map(|p| Value::String(p.to_string())).collect())
                }
            }
        },
        "slice" => {
            let chars: Vec<char> = s.chars().collect();
            let (start, end) = slice_bounds(chars.len(), args);
            Value::String(chars[start..end].iter().collect())
        }
        _ => return Err(EvalError::NotCallable(format!("string.{method}"))),
    })
}

fn array_method(items: &[Value], method: &str, args: &[Value]) -> Result<Value, EvalError> {
    Ok(match method {
        "join" => {
            let sep = match arg(args, 0) {
                Value::Undefined => ",".to_string(),
                other => other.to_js_string(),
            };
            let parts: Vec<String> = items.iter()
                                          .map(|v| match v {
                                              Value::Undefined | Value::Null => String::new(),
                                              other => other.to_js_string(),
                                          })
                                          .collect();
            Value::String(parts.join(&sep))
        }
        "includes" => {
            let needle = arg(args, 0);
            Value::Bool(items.iter().any(|v| v.strict_equals(&needle)))
        }
        "indexOf" => {
            let needle = arg(args, 0);
            Value::Number(items.iter().position(|v| v.strict_equals(&needle)).map(|i| i as f64).unwrap_or(-1.0))
        }
        "slice" => {
            let (start, end) = slice_bounds(items.len(), args);
            Value::Array(items[start..end].to_vec())
        }
        _ => return Err(EvalError::NotCallable(format!("array.{method}"))),
    })
}

fn number_method(n: f64, method: &str, args: &[Value]) -> Result<Value, EvalError> {
    match method {
        "toFixed" => {
            let digits = arg(args, 0).to_number();
            let digits = if digits.is_nan() { 0 } else { digits.clamp(0.0, 100.0) as usize };
            Ok(Value::String(format!("{n:.digits$}")))
        }
        "toString" => Ok(Value::String(format_number(n))),
        _ => Err(EvalError::NotCallable(format!("number.{method}"))),
    }
}

fn date_method(d: DateTime<Utc>, method: &str, args: &[Value]) -> Result<Value, EvalError> {
    Ok(match method {
        "add" => Value::Date(shift_date(d, arg(args, 0).to_number(), &arg(args, 1).to_js_string())?),
        "subtract" => Value::Date(shift_date(d, -arg(args, 0).to_number(), &arg(args, 1).to_js_string())?),
        "toDate" | "clone" | "utc" => Value::Date(d),
        "toISOString" | "toJSON" => Value::String(iso_string(&d)),
        "getTime" | "valueOf" => Value::Number(d.timestamp_millis() as f64),
        "unix" => Value::Number(d.timestamp() as f64),
        "getFullYear" | "year" => Value::Number(f64::from(d.year())),
        "getMonth" | "month" => Value::Number(f64::from(d.month0())),
        "getDate" | "date" => Value::Number(f64::from(d.day())),
        "getDay" | "day" => Value::Number(f64::from(d.weekday().num_days_from_sunday())),
        "getHours" | "hour" => Value::Number(f64::from(d.hour())),
        "getMinutes" | "minute" => Value::Number(f64::from(d.minute())),
        "getSeconds" | "second" => Value::Number(f64::from(d.second())),
        "format" => match arg(args, 0) {
            Value::Undefined => Value::String(d.to_rfc3339_opts(SecondsFormat::Secs, false)),
            pattern => Value::String(format_date(&d, &pattern.to_js_string())),
        },
        _ => return Err(EvalError::NotCallable(format!("date.{method}"))),
    })
}

/// Desplaza una fecha `amount` unidades (nombres de unidad estilo moment).
pub(crate) fn shift_date(d: DateTime<Utc>, amount: f64, unit: &str) -> Result<DateTime<Utc>, EvalError> {
    if !amount.is_finite() {
        return Err(EvalError::Type("invalid date".into()));
    }
    let whole = amount.trunc() as i64;
    let by_millis = |factor: f64| millis_delta(amount * factor).and_then(|delta| d.checked_add_signed(delta));
    let shifted = match unit {
        "years" | "year" | "y" => shift_months(d, whole.checked_mul(12)),
        "months" | "month" | "M" => shift_months(d, Some(whole)),
        "weeks" | "week" | "w" => by_millis(604_800_000.0),
        "days" | "day" | "d" => by_millis(86_400_000.0),
        "hours" | "hour" | "h" => by_millis(3_600_000.0),
        "minutes" | "minute" | "m" => by_millis(60_000.0),
        "seconds" | "second" | "s" => by_millis(1000.0),
        "milliseconds" | "millisecond" | "ms" => millis_delta(amount.trunc()).and_then(|delta| d.checked_add_signed(delta)),
        other => return Err(EvalError::Type(format!("unknown date unit '{other}'"))),
    };
    shifted.ok_or_else(|| EvalError::Type("date out of range".into()))
}

/// Milisegundos (posiblemente fraccionarios) a `Duration`; `None` si no entra
/// en el rango representable.
pub(crate) fn millis_delta(ms: f64) -> Option<Duration> {
    if !ms.is_finite() || ms.abs() >= i64::MAX as f64 {
        return None;
    }
    Duration::try_milliseconds(ms.trunc() as i64)
}

fn shift_months(d: DateTime<Utc>, months: Option<i64>) -> Option<DateTime<Utc>> {
    let months = months?;
    let magnitude = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        d.checked_add_months(magnitude)
    } else {
        d.checked_sub_months(magnitude)
    }
}

/// Subconjunto de tokens de `moment#format`.
fn format_date(d: &DateTime<Utc>, pattern: &str) -> String {
    const TOKENS: [&str; 8] = ["YYYY", "SSS", "MM", "DD", "HH", "mm", "ss", "YY"];
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut rest = pattern;
    'outer: while !rest.is_empty() {
        for token in TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                let rendered = match token {
                    "YYYY" => format!("{:04}", d.year()),
                    "YY" => format!("{:02}", d.year().rem_euclid(100)),
                    "MM" => format!("{:02}", d.month()),
                    "DD" => format!("{:02}", d.day()),
                    "HH" => format!("{:02}", d.hour()),
                    "mm" => format!("{:02}", d.minute()),
                    "ss" => format!("{:02}", d.second()),
                    _ => format!("{:03}", d.timestamp_subsec_millis()),
                };
                out.push_str(&rendered);
                rest = tail;
                continue 'outer;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            out.push(c);
        }
        rest = chars.as_str();
    }
    out
}

fn slice_bounds(len: usize, args: &[Value]) -> (usize, usize) {
    let norm = |v: Value, default: usize| -> usize {
        match v {
            Value::Undefined => default,
            other => {
                let n = other.to_number();
                if n.is_nan() {
                    0
                } else if n < 0.0 {
                    len.saturating_sub((-n) as usize)
                } else {
                    (n as usize).min(len)
                }
            }
        }
    };
    let start = norm(arg(args, 0), 0);
    let end = norm(arg(args, 1), len);
    (start, end.max(start))
}

fn binary(op: BinaryOp, l: &Value, r: &Value) -> Value {
    match op {
        BinaryOp::Add => l.add(r),
        BinaryOp::Sub => Value::Number(l.to_number() - r.to_number()),
        BinaryOp::Mul => Value::Number(l.to_number() * r.to_number()),
        BinaryOp::Div => Value::Number(l.to_number() / r.to_number()),
        BinaryOp::Rem => Value::Number(l.to_number() % r.to_number()),
        BinaryOp::Eq => Value::Bool(l.loose_equals(r)),
        BinaryOp::NotEq => Value::Bool(!l.loose_equals(r)),
        BinaryOp::StrictEq => Value::Bool(l.strict_equals(r)),
        BinaryOp::StrictNotEq => Value::Bool(!l.strict_equals(r)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => Value::Bool(compare(op, l, r)),
    }
}

fn compare(op: BinaryOp, l: &Value, r: &Value) -> bool {
    if let (Value::String(a), Value::String(b)) = (l, r) {
        return match op {
            BinaryOp::Lt => a < b,
            BinaryOp::Le => a <= b,
            BinaryOp::Gt => a > b,
            _ => a >= b,
        };
    }
    let (a, b) = (l.to_number(), r.to_number());
    match op {
        BinaryOp::Lt => a < b,
        BinaryOp::Le => a <= b,
        BinaryOp::Gt => a > b,
        _ => a >= b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::modules::globals;
    use crate::expression::parser::parse;
    use chrono::TimeZone;

    fn eval_with(src: &str, scope: &IndexMap<String, Value>) -> Result<Value, EvalError> {
        Interpreter::new(scope).eval(&parse(src)?)
    }

    fn eval(src: &str) -> Result<Value, EvalError> {
        eval_with(src, &globals())
    }

    #[test]
    fn arithmetic_and_precedence() {
        assert_eq!(eval("1 + 2 * 3 - 4 / 2").unwrap().to_number(), 5.0);
        assert_eq!(eval("(1 + 2) * 3 % 4").unwrap().to_number(), 1.0);
        assert_eq!(eval("-2 + +'3'").unwrap().to_number(), 1.0);
    }

    #[test]
    fn logical_operators_return_operands() {
        assert_eq!(eval("null || 'fallback'").unwrap().to_js_string(), "fallback");
        assert_eq!(eval("0 && 'never'").unwrap().to_number(), 0.0);
        assert_eq!(eval("1 < 2 ? 'yes' : 'no'").unwrap().to_js_string(), "yes");
    }

    #[test]
    fn member_access_on_scope_objects() {
        let mut scope = globals();
        scope.insert("rec".into(), Value::from_json(&serde_json::json!({"name": "Foo", "tags": ["a", "b"]})));
        assert_eq!(eval_with("rec.name.toUpperCase()", &scope).unwrap().to_js_string(), "FOO");
        assert_eq!(eval_with("rec.tags.length", &scope).unwrap().to_number(), 2.0);
        assert_eq!(eval_with("rec['tags'][1]", &scope).unwrap().to_js_string(), "b");
        assert!(matches!(eval_with("rec.missing", &scope).unwrap(), Value::Undefined));
    }

    #[test]
    fn reading_through_undefined_is_a_type_error() {
        let mut scope = globals();
        scope.insert("rec".into(), Value::Object(IndexMap::new()));
        assert!(matches!(eval_with("rec.a.b", &scope), Err(EvalError::Type(_))));
    }

    #[test]
    fn unknown_identifiers_fail() {
        assert_eq!(eval("nope + 1").unwrap_err(), EvalError::UndefinedIdentifier("nope".into()));
    }

    #[test]
    fn math_helpers() {
        assert_eq!(eval("Math.max(1, 7, 3)").unwrap().to_number(), 7.0);
        assert_eq!(eval("Math.round(2.5)").unwrap().to_number(), 3.0);
        assert_eq!(eval("(10 / 3).toFixed(2)").unwrap().to_js_string(), "3.33");
    }

    #[test]
    fn date_construction_and_shifting() {
        let v = eval("new Date('2020-01-31').toISOString()").unwrap();
        assert_eq!(v.to_js_string(), "2020-01-31T00:00:00.000Z");
        let d = Utc.with_ymd_and_hms(2020, 1, 31, 0, 0, 0).unwrap();
        assert_eq!(iso_string(&shift_date(d, 1.0, "months").unwrap()), "2020-02-29T00:00:00.000Z");
        assert_eq!(iso_string(&shift_date(d, -2.0, "days").unwrap()), "2020-01-29T00:00:00.000Z");
        assert!(shift_date(d, 1.0, "fortnights").is_err());
    }

    #[test]
    fn date_format_tokens() {
        let d = Utc.with_ymd_and_hms(2021, 7, 4, 9, 5, 3).unwrap();
        assert_eq!(format_date(&d, "YYYY-MM-DD HH:mm:ss"), "2021-07-04 09:05:03");
        assert_eq!(format_date(&d, "DD/MM/YY"), "04/07/21");
    }

    #[test]
    fn calling_a_non_function_fails() {
        let mut scope = globals();
        scope.insert("n".into(), Value::Number(1.0));
        assert_eq!(eval_with("n()", &scope).unwrap_err(), EvalError::NotCallable("n".into()));
    }

    #[test]
    fn string_helpers() {
        assert_eq!(eval("'a,b,c'.split(',').join('-')").unwrap().to_js_string(), "a-b-c");
        assert_eq!(eval("'seeding'.slice(-3)").unwrap().to_js_string(), "ing");
        assert_eq!(eval("String(12) + Number('3')").unwrap().to_js_string(), "123");
    }

    #[test]
    fn huge_date_shifts_are_errors() {
        let d = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        assert!(shift_date(d, -1e300, "days").is_err());
        assert!(shift_date(d, -1e300, "ms").is_err());
        assert!(shift_date(d, 1e300, "years").is_err());
        assert!(shift_date(d, f64::INFINITY, "hours").is_err());
        assert_eq!(iso_string(&shift_date(d, 1.5, "days").unwrap()), "2020-01-02T12:00:00.000Z");
    }
}
