//! Tariff metadata: versioning and audit information attached to a graph.

use serde::{Deserialize, Serialize};

/// One entry in a tariff's modification history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangelogEntry {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Identifying metadata of a tariff definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TariffMetadata {
    /// Product code, e.g. "MOTOR_PRIVATE".
    pub product: String,
    /// Tariff version, e.g. "2024_09".
    pub version: String,
    /// ISO currency code of the result, e.g. "EUR".
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changelog: Vec<ChangelogEntry>,
}

impl TariffMetadata {
    pub fn new(
        product: impl Into<String>,
        version: impl Into<String>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            product: product.into(),
            version: version.into(),
            currency: currency.into(),
            effective_date: None,
            author: None,
            description: None,
            changelog: Vec::new(),
        }
    }

    /// One-line identification, e.g. for log lines: "MOTOR_PRIVATE v2024_09 (EUR)".
    pub fn summary(&self) -> String {
        format!("{} v{} ({})", self.product, self.version, self.currency)
    }
}
