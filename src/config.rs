//! Engine tuning knobs.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Runtime configuration shared by every engine component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How many times an operation is re-run after losing a commit race.
    pub max_retries: u32,
    /// Pause before re-running a conflicted operation.
    #[serde(with = "millis")]
    pub retry_backoff: Duration,
    /// Balances below this trigger a low-balance notification.
    pub low_balance_threshold: Decimal,
    /// Currency tag for accounts opened without one.
    pub default_currency: String,
    #[serde(with = "millis")]
    pub scheduler_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_backoff: Duration::from_millis(10),
            low_balance_threshold: dec!(1000),
            default_currency: "RUB".to_string(),
            scheduler_interval: Duration::from_secs(60 * 60),
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
