pub mod chain;
pub mod error;
pub mod gas;
pub mod rpc;
pub mod signer;
pub mod simulation;
pub mod validation;
