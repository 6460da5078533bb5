//! Registro de módulos de helpers (allow-list) y globals del contexto.
//!
//! `_dependencies` sólo puede ligar módulos presentes en el `ModuleRegistry`;
//! no hay carga dinámica de código. Los globals (`Math`, `Date`, `String`,
//! `Number`) están siempre disponibles, como en cualquier contexto JS.
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use indexmap::IndexMap;

use super::error::{EvalError, ModuleError};
use super::value::{Module, Value};

/// Fábrica de un módulo: produce el valor que se liga en el contexto.
pub type ModuleFactory = Arc<dyn Fn() -> Value + Send + Sync>;

#[derive(Clone)]
pub struct ModuleRegistry {
    factories: IndexMap<String, ModuleFactory>,
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry").field("modules", &self.factories.keys().collect::<Vec<_>>()).finish()
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ModuleRegistry {
    /// Registro vacío: cualquier dependencia declarada fallará.
    pub fn empty() -> Self {
        Self { factories: IndexMap::new() }
    }

    /// Registro con los módulos incluidos: `moment`, `uuid`, `math`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("moment", moment_module)
                .register("uuid", uuid_module)
                .register("math", math_module);
        registry
    }

    /// Registra (o reemplaza) un módulo bajo `id`.
    pub fn register<F>(&mut self, id: impl Into<String>, factory: F) -> &mut Self
        where F: Fn() -> Value + Send + Sync + 'static
    {
        self.factories.insert(id.into(), Arc::new(factory));
        self
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    pub fn resolve(&self, id: &str) -> Result<Value, ModuleError> {
        self.factories.get(id).map(|factory| factory()).ok_or_else(|| ModuleError::NotFound(id.to_string()))
    }
}

/// Globals presentes en todo contexto de evaluación.
pub fn globals() -> IndexMap<String, Value> {
    let mut g = IndexMap::new();
    g.insert("Math".to_string(), math_module());
    g.insert("Date".to_string(), date_module());
    g.insert("String".to_string(), Module::new("String").callable(|args| Ok(Value::String(arg(args, 0).to_js_string()))).into_value());
    g.insert("Number".to_string(), Module::new("Number").callable(|args| Ok(Value::Number(arg(args, 0).to_number()))).into_value());
    g
}

pub(crate) fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Undefined)
}

fn math_module() -> Value {
    fn unary(args: &[Value], f: fn(f64) -> f64) -> Result<Value, EvalError> {
        Ok(Value::Number(f(arg(args, 0).to_number())))
    }
    Module::new("Math").constant("PI", Value::Number(std::f64::consts::PI))
                       .constant("E", Value::Number(std::f64::consts::E))
                       .function("floor", |a| unary(a, f64::floor))
                       .function("ceil", |a| unary(a, f64::ceil))
                       .function("round", |a| unary(a, |x| (x + 0.5).floor()))
                       .function("abs", |a| unary(a, f64::abs))
                       .function("sqrt", |a| unary(a, f64::sqrt))
                       .function("trunc", |a| unary(a, f64::trunc))
                       .function("pow", |a| Ok(Value::Number(arg(a, 0).to_number().powf(arg(a, 1).to_number()))))
                       .function("min", |a| Ok(Value::Number(a.iter().map(Value::to_number).fold(f64::INFINITY, js_min))))
                       .function("max", |a| Ok(Value::Number(a.iter().map(Value::to_number).fold(f64::NEG_INFINITY, js_max))))
                       .into_value()
}

fn js_min(acc: f64, x: f64) -> f64 {
    if acc.is_nan() || x.is_nan() { f64::NAN } else { acc.min(x) }
}

fn js_max(acc: f64, x: f64) -> f64 {
    if acc.is_nan() || x.is_nan() { f64::NAN } else { acc.max(x) }
}

fn date_module() -> Value {
    Module::new("Date").callable(|_| Ok(Value::String(super::value::iso_string(&Utc::now()))))
                       .constructible(construct_date)
                       .function("now", |_| Ok(Value::Number(Utc::now().timestamp_millis() as f64)))
                       .into_value()
}

fn moment_module() -> Value {
    Module::new("moment").callable(construct_date)
                         .function("utc", construct_date)
                         .function("unix", |a| date_from_millis(arg(a, 0).to_number() * 1000.0))
                         .into_value()
}

fn uuid_module() -> Value {
    Module::new("uuid").function("v4", |_| Ok(Value::String(uuid::Uuid::new_v4().to_string())))
                       .into_value()
}

/// `new Date(...)` / `moment(...)`: sin argumentos es "ahora"; un argumento
/// puede ser fecha, milisegundos o string; varios argumentos son componentes
/// (mes base 0, como en JS).
pub(crate) fn construct_date(args: &[Value]) -> Result<Value, EvalError> {
    match args {
        [] => Ok(Value::Date(Utc::now())),
        [single] => match single {
            Value::Date(d) => Ok(Value::Date(*d)),
            Value::Number(ms) => date_from_millis(*ms),
            Value::String(s) => parse_date(s).map(Value::Date),
            Value::Undefined => Ok(Value::Date(Utc::now())),
            other => Err(EvalError::Type(format!("cannot build a date from {}", other.type_of()))),
        },
        components => date_from_components(components),
    }
}

// Rango de fechas de JS: ±8.64e15 ms alrededor de la época.
const MAX_DATE_MILLIS: f64 = 8.64e15;

fn date_from_millis(ms: f64) -> Result<Value, EvalError> {
    if !ms.is_finite() || ms.abs() > MAX_DATE_MILLIS {
        return Err(EvalError::Type("invalid date".into()));
    }
    DateTime::from_timestamp_millis(ms.trunc() as i64).map(Value::Date)
                                                      .ok_or_else(|| EvalError::Type("invalid date".into()))
}

fn date_from_components(parts: &[Value]) -> Result<Value, EvalError> {
    let nums: Vec<f64> = parts.iter().map(|p| p.to_number().trunc()).collect();
    if nums.iter().any(|n| !n.is_finite()) {
        return Err(EvalError::Type("invalid date".into()));
    }
    let out_of_range = || EvalError::Type("date out of range".into());
    let get = |i: usize, default: f64| nums.get(i).copied().unwrap_or(default);
    let year = get(0, 1970.0);
    if year.abs() > 275_760.0 {
        return Err(out_of_range());
    }
    let base = NaiveDate::from_ymd_opt(year as i32, 1, 1).ok_or_else(out_of_range)?;
    let base = Utc.from_utc_datetime(&base.and_hms_opt(0, 0, 0).unwrap_or_default());
    let shifted = super::interpreter::shift_date(base, get(1, 0.0), "months")?;
    let millis = (get(2, 1.0) - 1.0) * 86_400_000.0
                 + get(3, 0.0) * 3_600_000.0
                 + get(4, 0.0) * 60_000.0
                 + get(5, 0.0) * 1000.0
                 + get(6, 0.0);
    let delta = super::interpreter::millis_delta(millis).ok_or_else(out_of_range)?;
    shifted.checked_add_signed(delta).map(Value::Date).ok_or_else(out_of_range)
}

/// Acepta RFC 3339, fecha sola (medianoche UTC) y fecha-hora sin zona (UTC).
pub(crate) fn parse_date(s: &str) -> Result<DateTime<Utc>, EvalError> {
    let s = s.trim();
    if let Ok(d) = DateTime::parse_from_rfc3339(s) {
        return Ok(d.with_timezone(&Utc));
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(dt) = d.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&dt));
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&dt));
        }
    }
    Err(EvalError::Type(format!("invalid date '{s}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_module_reports_its_id() {
        let registry = ModuleRegistry::with_builtins();
        assert_eq!(registry.resolve("left-pad").unwrap_err(), ModuleError::NotFound("left-pad".into()));
        assert!(registry.contains("moment"));
    }

    #[test]
    fn custom_modules_can_be_registered() {
        let mut registry = ModuleRegistry::empty();
        registry.register("answer", || Value::Number(42.0));
        assert_eq!(registry.resolve("answer").unwrap().to_number(), 42.0);
    }

    #[test]
    fn parses_plain_dates_as_utc_midnight() {
        let d = parse_date("2020-03-01").unwrap();
        assert_eq!(super::super::value::iso_string(&d), "2020-03-01T00:00:00.000Z");
    }

    #[test]
    fn date_components_use_zero_based_months() {
        let Value::Date(d) = construct_date(&[Value::Number(2021.0), Value::Number(11.0), Value::Number(25.0)]).unwrap() else {
            panic!("expected date")
        };
        assert_eq!(super::super::value::iso_string(&d), "2021-12-25T00:00:00.000Z");
    }

    #[test]
    fn invalid_date_strings_fail() {
        assert!(construct_date(&[Value::String("not a date".into())]).is_err());
    }

    #[test]
    fn date_components_cover_time_of_day() {
        let parts: Vec<Value> = [2020.0, 1.0, 3.0, 4.0, 5.0, 6.0, 7.0].into_iter().map(Value::Number).collect();
        let Value::Date(d) = construct_date(&parts).unwrap() else { panic!("expected date") };
        assert_eq!(super::super::value::iso_string(&d), "2020-02-03T04:05:06.007Z");
    }

    #[test]
    fn out_of_range_dates_fail() {
        assert!(construct_date(&[Value::Number(-1e300)]).is_err());
        assert!(construct_date(&[Value::Number(f64::NAN)]).is_err());
        assert!(construct_date(&[Value::Number(2020.0), Value::Number(0.0), Value::Number(1e18)]).is_err());
        assert!(construct_date(&[Value::Number(1e9), Value::Number(0.0)]).is_err());
        assert!(construct_date(&[Value::Number(8.64e12)]).is_ok());
    }
}
