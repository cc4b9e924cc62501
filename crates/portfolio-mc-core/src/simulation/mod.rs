pub mod paths;
pub mod seed;

pub use paths::{PathSimulator, PricePath, PricePathBatch, SimulationHorizon};
pub use seed::SeedSequence;
