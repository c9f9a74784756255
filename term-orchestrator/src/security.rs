//! Credential handling and SQL quoting helpers.
//!
//! Datasource passwords and tokens travel inside [`SecureString`], which is
//! zeroized on drop and never printed by `Debug`. Checks generated by the
//! reference engine quote every identifier and literal through [`SqlSecurity`].

use crate::error::{Result, TermError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use zeroize::ZeroizeOnDrop;

/// A secure string that automatically clears its contents when dropped.
#[derive(Clone, Default, PartialEq, Eq, ZeroizeOnDrop)]
pub struct SecureString(String);

impl std::fmt::Debug for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecureString(***)")
    }
}

impl SecureString {
    /// Create a new secure string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the string value. Use carefully and avoid storing the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns true if the secret is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for SecureString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SecureString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for SecureString {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self)
    }
}

/// SQL identifier and literal quoting utilities.
pub struct SqlSecurity;

impl SqlSecurity {
    /// Validates and quotes a single SQL identifier (column or table name).
    ///
    /// The identifier is wrapped in double quotes with internal quotes
    /// doubled, so arbitrary column names (spaces, mixed case) are preserved.
    ///
    /// # Examples
    /// ```rust
    /// use term_orchestrator::security::SqlSecurity;
    ///
    /// assert_eq!(SqlSecurity::quote_identifier("order id").unwrap(), "\"order id\"");
    /// assert!(SqlSecurity::quote_identifier("").is_err());
    /// ```
    pub fn quote_identifier(identifier: &str) -> Result<String> {
        Self::validate_identifier(identifier)?;
        let escaped = identifier.replace('"', "\"\"");
        Ok(format!("\"{escaped}\""))
    }

    /// Validates an identifier without quoting it.
    pub fn validate_identifier(identifier: &str) -> Result<()> {
        if identifier.trim().is_empty() {
            return Err(TermError::SecurityError(
                "SQL identifier cannot be empty or whitespace-only".to_string(),
            ));
        }

        if identifier.len() > 128 {
            return Err(TermError::SecurityError(
                "SQL identifier too long (max 128 characters)".to_string(),
            ));
        }

        if identifier.contains('\0') {
            return Err(TermError::SecurityError(
                "SQL identifier cannot contain null bytes".to_string(),
            ));
        }

        Ok(())
    }

    /// Quotes a string literal for inclusion in generated SQL.
    pub fn quote_literal(value: &str) -> Result<String> {
        InputValidator::validate_no_null_bytes(value, "SQL literal")?;
        Ok(format!("'{}'", value.replace('\'', "''")))
    }

    /// Validates a regex pattern and returns it escaped for a SQL string literal.
    pub fn validate_regex_pattern(pattern: &str) -> Result<String> {
        if pattern.len() > 1000 {
            return Err(TermError::SecurityError(
                "Regex pattern too long (max 1000 characters)".to_string(),
            ));
        }

        if let Err(e) = Regex::new(pattern) {
            return Err(TermError::SecurityError(format!(
                "Invalid regex pattern: {e}"
            )));
        }

        // A quantified group whose body ends in a quantifier, e.g. `(a+)+`.
        static NESTED_QUANTIFIER: Lazy<Regex> = Lazy::new(|| {
            #[allow(clippy::expect_used)]
            Regex::new(r"\([^()]*[+*]\)[+*{]").expect("Hard-coded regex pattern should be valid")
        });
        if NESTED_QUANTIFIER.is_match(pattern) {
            return Err(TermError::SecurityError(
                "Regex pattern might cause ReDoS attack".to_string(),
            ));
        }

        Self::quote_literal(pattern)
    }
}

/// Input validation utilities for numeric parameters.
pub struct InputValidator;

impl InputValidator {
    /// Validates a numeric threshold value.
    pub fn validate_threshold(value: f64, name: &str) -> Result<()> {
        if !value.is_finite() {
            return Err(TermError::SecurityError(format!(
                "Invalid {name} value: must be finite (not NaN or infinite)"
            )));
        }
        Ok(())
    }

    /// Validates a fraction in `[0.0, 1.0]`.
    pub fn validate_fraction(value: f64, name: &str) -> Result<()> {
        Self::validate_threshold(value, name)?;

        if !(0.0..=1.0).contains(&value) {
            return Err(TermError::SecurityError(format!(
                "Invalid {name} value: must be between 0.0 and 1.0, got {value}"
            )));
        }
        Ok(())
    }

    /// Validates that a string doesn't contain null bytes.
    pub fn validate_no_null_bytes(value: &str, name: &str) -> Result<()> {
        if value.contains('\0') {
            return Err(TermError::SecurityError(format!(
                "{name} cannot contain null bytes"
            )));
        }
        Ok(())
    }
}
