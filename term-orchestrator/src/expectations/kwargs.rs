//! Parameter renaming and typed access to expectation kwargs.

use serde_json::Value;

use crate::error::{Result, TermError};
use crate::model::Kwargs;

/// `(stored name, engine name)` pairs. Stored kwargs use the left-hand
/// names, compiled checks and engines use the right-hand ones.
pub const PARAMETER_RENAMES: &[(&str, &str)] = &[("objective", "mostly")];

/// Converts stored kwargs into the form engines understand.
pub fn to_engine(kwargs: &Kwargs) -> Kwargs {
    rename(kwargs, |(public, engine)| (public, engine))
}

/// Converts engine kwargs back into the stored form.
pub fn to_public(kwargs: &Kwargs) -> Kwargs {
    rename(kwargs, |(public, engine)| (engine, public))
}

/// Public name of a kwarg, as reported in error paths.
pub fn public_name(engine_name: &str) -> &str {
    PARAMETER_RENAMES
        .iter()
        .find(|(_, engine)| *engine == engine_name)
        .map(|(public, _)| *public)
        .unwrap_or(engine_name)
}

fn rename<F>(kwargs: &Kwargs, direction: F) -> Kwargs
where
    F: Fn((&'static str, &'static str)) -> (&'static str, &'static str),
{
    let mut renamed = kwargs.clone();
    for pair in PARAMETER_RENAMES {
        let (from, to) = direction(*pair);
        // A present key moves even when its value is 0 or null.
        if let Some(value) = renamed.remove(from) {
            renamed.insert(to.to_string(), value);
        }
    }
    renamed
}

/// Typed reads over engine-form kwargs with field-path error reporting.
pub(crate) struct KwargsReader<'a> {
    expectation_type: &'a str,
    kwargs: &'a Kwargs,
}

impl<'a> KwargsReader<'a> {
    pub(crate) fn new(expectation_type: &'a str, kwargs: &'a Kwargs) -> Self {
        Self {
            expectation_type,
            kwargs,
        }
    }

    pub(crate) fn error(&self, field: &str, message: impl Into<String>) -> TermError {
        TermError::invalid_kwargs(
            self.expectation_type,
            format!("kwargs.{}", public_name(field)),
            message,
        )
    }

    fn present(&self, field: &str) -> Option<&'a Value> {
        self.kwargs.get(field).filter(|v| !v.is_null())
    }

    pub(crate) fn required_str(&self, field: &str) -> Result<String> {
        match self.present(field) {
            Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
            Some(Value::String(_)) => Err(self.error(field, "must not be empty")),
            Some(other) => Err(self.error(field, format!("expected a string, got {other}"))),
            None => Err(self.error(field, "missing required field")),
        }
    }

    pub(crate) fn optional_f64(&self, field: &str) -> Result<Option<f64>> {
        match self.present(field) {
            None => Ok(None),
            Some(Value::Number(n)) => match n.as_f64() {
                Some(v) if v.is_finite() => Ok(Some(v)),
                _ => Err(self.error(field, "must be a finite number")),
            },
            Some(other) => Err(self.error(field, format!("expected a number, got {other}"))),
        }
    }

    pub(crate) fn required_f64(&self, field: &str) -> Result<f64> {
        self.optional_f64(field)?
            .ok_or_else(|| self.error(field, "missing required field"))
    }

    pub(crate) fn optional_bool(&self, field: &str, default: bool) -> Result<bool> {
        match self.present(field) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(other) => Err(self.error(field, format!("expected a boolean, got {other}"))),
        }
    }

    pub(crate) fn required_list(&self, field: &str) -> Result<Vec<Value>> {
        match self.present(field) {
            Some(Value::Array(items)) => Ok(items.clone()),
            Some(other) => Err(self.error(field, format!("expected a list, got {other}"))),
            None => Err(self.error(field, "missing required field")),
        }
    }

    pub(crate) fn required_str_list(&self, field: &str) -> Result<Vec<String>> {
        self.required_list(field)?
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::String(s) => Ok(s),
                other => Err(self.error(
                    &format!("{field}[{i}]"),
                    format!("expected a string, got {other}"),
                )),
            })
            .collect()
    }

    /// Reads the tolerated success fraction, which must lie in `[0, 1]`.
    pub(crate) fn mostly(&self) -> Result<Option<f64>> {
        let mostly = self.optional_f64("mostly")?;
        if let Some(value) = mostly {
            if !(0.0..=1.0).contains(&value) {
                return Err(self.error("mostly", format!("must be between 0 and 1, got {value}")));
            }
        }
        Ok(mostly)
    }
}
