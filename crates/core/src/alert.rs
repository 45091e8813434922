//! Alert payloads and stored alert history.

use crate::Symbol;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Drop magnitude above which an alert is marked high severity.
pub const HIGH_SEVERITY_DROP_PERCENT: f64 = 25.0;

/// Visual severity of an alert message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Low,
}

impl Severity {
    /// High when the magnitude of the change exceeds 25%.
    pub fn from_change(change_percent: f64) -> Self {
        if change_percent.abs() > HIGH_SEVERITY_DROP_PERCENT {
            Severity::High
        } else {
            Severity::Low
        }
    }

    pub fn marker(&self) -> &'static str {
        match self {
            Severity::High => "🔴",
            Severity::Low => "🟡",
        }
    }
}

/// A detected drop, ready to be delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropAlert {
    pub symbol: Symbol,
    pub change_percent: f64,
    pub price: f64,
    pub detected_at: DateTime<Utc>,
}

impl DropAlert {
    pub fn new(symbol: Symbol, change_percent: f64, price: f64) -> Self {
        Self {
            symbol,
            change_percent,
            price,
            detected_at: Utc::now(),
        }
    }

    pub fn severity(&self) -> Severity {
        Severity::from_change(self.change_percent)
    }
}

/// Alert history entry. Only written after a successful delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    /// Database ID
    pub id: i64,
    pub symbol: String,
    pub change_percent: f64,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    pub sent: bool,
}
