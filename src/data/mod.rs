//! Data sources: the product API and the simulated price history.

pub mod api;
pub mod simulate;

pub use api::{DEFAULT_API_URL, ProductApiClient};
pub use simulate::{NoNoise, NoiseSource, SimulationReport, UniformNoise, simulate};
