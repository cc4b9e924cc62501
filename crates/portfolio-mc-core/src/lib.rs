pub mod config;
pub mod decimal;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod records;
pub mod simulation;
pub mod statistics;
pub mod storage;
pub mod table;
pub mod types;
pub mod weights;

pub use config::SimulationConfig;
pub use error::PortfolioMcError;
pub use types::*;

/// Standard result type for all portfolio-mc operations
pub type PortfolioMcResult<T> = Result<T, PortfolioMcError>;
