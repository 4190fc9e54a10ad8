pub mod chains;
pub mod config;
pub mod http;

pub use chains::ChainRegistry;
pub use config::{ChainConfig, ExecutionConfig, GasConfig, ServerConfig, SimulationConfig, SponsorConfig};
pub use http::server::{EngineServer, EngineServerState};
