//! Stored expectation records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form expectation parameters.
pub type Kwargs = Map<String, Value>;

/// A stored expectation definition.
///
/// `kwargs` is persisted as a serialized JSON string and held as a live map
/// in memory. Stored kwargs use `objective` for the tolerated success
/// fraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expectation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub expectation_type: String,
    #[serde(with = "kwargs_string")]
    pub kwargs: Kwargs,
    pub datasource_id: String,
    pub dataset_id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub suggested: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_date: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

impl Expectation {
    pub fn new(
        expectation_type: impl Into<String>,
        kwargs: Kwargs,
        datasource_id: impl Into<String>,
        dataset_id: impl Into<String>,
    ) -> Self {
        Self {
            key: None,
            expectation_type: expectation_type.into(),
            kwargs,
            datasource_id: datasource_id.into(),
            dataset_id: dataset_id.into(),
            enabled: true,
            suggested: false,
            meta: None,
            create_date: None,
            modified_date: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_meta(mut self, meta: Map<String, Value>) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// Serializes kwargs as a JSON string and accepts either a string or an
/// inline object when reading.
mod kwargs_string {
    use super::Kwargs;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(kwargs: &Kwargs, serializer: S) -> Result<S::Ok, S::Error> {
        let encoded = serde_json::to_string(kwargs).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&encoded)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Kwargs, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(encoded) => serde_json::from_str(&encoded).map_err(D::Error::custom),
            Value::Object(map) => Ok(map),
            other => Err(D::Error::custom(format!(
                "kwargs must be an object or a JSON string, got {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kwargs_stored_as_string() {
        let kwargs = json!({"column": "id", "objective": 0.9});
        let expectation = Expectation::new(
            "expect_column_values_to_not_be_null",
            kwargs.as_object().unwrap().clone(),
            "ds",
            "orders",
        );

        let value = serde_json::to_value(&expectation).unwrap();
        assert!(value["kwargs"].is_string());

        let back: Expectation = serde_json::from_value(value).unwrap();
        assert_eq!(back.kwargs["objective"], json!(0.9));
    }

    #[test]
    fn test_kwargs_accepts_inline_object() {
        let parsed: Expectation = serde_json::from_value(json!({
            "expectation_type": "expect_column_to_exist",
            "kwargs": {"column": "id"},
            "datasource_id": "ds",
            "dataset_id": "orders"
        }))
        .unwrap();
        assert_eq!(parsed.kwargs["column"], json!("id"));
        assert!(parsed.enabled);
        assert!(!parsed.suggested);
    }

    #[test]
    fn test_kwargs_rejects_scalars() {
        let result: std::result::Result<Expectation, _> = serde_json::from_value(json!({
            "expectation_type": "expect_column_to_exist",
            "kwargs": 5,
            "datasource_id": "ds",
            "dataset_id": "orders"
        }));
        assert!(result.is_err());
    }
}
