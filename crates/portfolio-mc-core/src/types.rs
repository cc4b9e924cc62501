use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::{error, info};

use crate::PortfolioMcResult;

/// Asset ticker symbol (e.g. "SPY").
pub type Symbol = String;

/// Rates and returns expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = f64;

/// Lifecycle status persisted alongside every simulation record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SimulationStatus {
    #[default]
    Completed,
    Failed,
}

impl fmt::Display for SimulationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationStatus::Completed => write!(f, "Completed"),
            SimulationStatus::Failed => write!(f, "Failed"),
        }
    }
}

pub const STATUS_OK: u16 = 200;
pub const STATUS_FAILED: u16 = 500;

/// Uniform boundary contract returned by every externally triggered operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationResult {
    pub status_code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    pub metadata: InvocationMetadata,
}

/// Metadata for every invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationMetadata {
    pub operation: String,
    pub version: String,
    pub computation_time_us: u64,
}

impl InvocationResult {
    /// Wrap the outcome of an operation in the 200/500 envelope.
    ///
    /// Errors are logged and rendered as `Error occurred: ...`; successful
    /// payloads are serialized into `result` and summarised by `describe`.
    pub fn from_outcome<T: Serialize>(
        operation: &str,
        started: Instant,
        outcome: PortfolioMcResult<T>,
        describe: impl FnOnce(&T) -> String,
    ) -> Self {
        let metadata = InvocationMetadata {
            operation: operation.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: started.elapsed().as_micros() as u64,
        };
        match outcome {
            Ok(value) => {
                let message = describe(&value);
                info!(operation, "{message}");
                InvocationResult {
                    status_code: STATUS_OK,
                    message,
                    result: serde_json::to_value(&value).ok(),
                    metadata,
                }
            }
            Err(e) => {
                let message = format!("Error occurred: {e}");
                error!(operation, "{message}");
                InvocationResult {
                    status_code: STATUS_FAILED,
                    message,
                    result: None,
                    metadata,
                }
            }
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == STATUS_OK
    }
}
