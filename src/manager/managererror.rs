use serde::Deserialize;
use serde::de::Error as _;
use thiserror::Error;

use crate::time::period::ParsePeriodError;

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error(transparent)]
    JsonParseError(#[from] serde_json::Error),

    #[error("key '{0}' not found")]
    NameNotFoundError(String),

    #[error(transparent)]
    TenorParseError(#[from] ParsePeriodError),
}

impl ManagerError {
    pub fn json_missing_field(field: &'static str) -> ManagerError {
        ManagerError::JsonParseError(serde_json::Error::missing_field(field))
    }

    pub fn map_elem_not_found(name: &str) -> ManagerError {
        ManagerError::NameNotFoundError(name.to_owned())
    }
}

pub fn parse_json_value<T>(json_value: serde_json::Value) -> Result<T, ManagerError>
where
    T: for<'a> Deserialize<'a>,
{
    serde_json::from_value(json_value).map_err(ManagerError::JsonParseError)
}

/// `name` of a registry entry.
pub fn object_name(json_value: &serde_json::Value) -> Result<String, ManagerError> {
    json_value
        .get("name")
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| ManagerError::json_missing_field("name"))
}
