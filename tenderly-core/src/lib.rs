pub mod auth;
pub mod client;
pub mod error;
pub mod types;

pub use client::{TenderlyClient, TenderlyClientBuilder};
pub use types::{SimulationCall, SimulationVerdict};
