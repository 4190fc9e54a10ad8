use std::{future::Future, sync::Arc};

use tenderly_core::{SimulationCall, SimulationVerdict, TenderlyClient};

use crate::error::EngineError;

/// Dry-runs a call against current chain state.
///
/// `Ok` always carries a verdict, including for reverted calls. `Err` means no
/// verdict could be produced at all, which callers treat as "simulation unavailable".
pub trait TransactionSimulator: Send + Sync {
    fn simulate(
        &self,
        call: &SimulationCall,
    ) -> impl Future<Output = Result<SimulationVerdict, EngineError>> + Send;
}

impl TransactionSimulator for TenderlyClient {
    async fn simulate(&self, call: &SimulationCall) -> Result<SimulationVerdict, EngineError> {
        TenderlyClient::simulate(self, call)
            .await
            .map_err(EngineError::from)
    }
}

impl<T: TransactionSimulator> TransactionSimulator for Arc<T> {
    fn simulate(
        &self,
        call: &SimulationCall,
    ) -> impl Future<Output = Result<SimulationVerdict, EngineError>> + Send {
        (**self).simulate(call)
    }
}

/// Used when no simulation service is configured. Every call reports the service as unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSimulator;

impl TransactionSimulator for NoSimulator {
    async fn simulate(&self, _call: &SimulationCall) -> Result<SimulationVerdict, EngineError> {
        Err(EngineError::SimulationUnavailable {
            message: "no simulation service configured".to_string(),
        })
    }
}

/// Either a configured simulator or [`NoSimulator`].
#[derive(Clone)]
pub enum MaybeSimulator<T> {
    Configured(T),
    Disabled,
}

impl<T: TransactionSimulator> TransactionSimulator for MaybeSimulator<T> {
    async fn simulate(&self, call: &SimulationCall) -> Result<SimulationVerdict, EngineError> {
        match self {
            MaybeSimulator::Configured(inner) => inner.simulate(call).await,
            MaybeSimulator::Disabled => NoSimulator.simulate(call).await,
        }
    }
}
