use alloy::{eips::eip2930::AccessList, primitives::Address};
use serde::{Deserialize, Serialize};
use sponsor_core::{error::EngineError, gas::ResolvedGas};
use tenderly_core::{SimulationCall, SimulationVerdict};

use crate::{
    authorization::SignedAuthorization,
    calldata::{CallShape, EncodedCall, SequenceOperation},
    transaction::SignedType4Transaction,
};

/// Gas limit used when the caller does not pick one.
pub const DEFAULT_SPONSORED_GAS_LIMIT: u64 = 500_000;

/// What to do when no simulation verdict could be obtained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationPolicy {
    #[default]
    RequirePass,
    AllowWhenUnavailable,
}

/// What the delegated account should do once the authorization is applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SponsoredCall {
    /// Only install the delegation
    #[default]
    DelegateOnly,
    Single { shape: CallShape },
    Sequence { operations: Vec<SequenceOperation> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsorRequest {
    pub chain_id: u64,
    pub delegate_address: Address,
    #[serde(default)]
    pub call: SponsoredCall,
    #[serde(default)]
    pub gas_limit: Option<u64>,
    #[serde(default)]
    pub access_list: AccessList,
}

impl SponsorRequest {
    pub fn gas_limit(&self) -> u64 {
        self.gas_limit.unwrap_or(DEFAULT_SPONSORED_GAS_LIMIT)
    }
}

/// On-chain nonces observed right before signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NonceSnapshot {
    pub authority: Address,
    pub authority_nonce: u64,
    pub relayer: Address,
    pub relayer_nonce: u64,
}

/// Everything signed for one generation of a draft.
#[derive(Debug, Clone)]
pub struct PreparedTransaction {
    pub authorization: SignedAuthorization,
    pub call: EncodedCall,
    pub transaction: SignedType4Transaction,
    pub nonces: NonceSnapshot,
    pub gas: ResolvedGas,
    /// The exact tuple a dry run must execute
    pub simulation_call: SimulationCall,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SimulationState {
    NotRun,
    Unavailable { generation: u64, message: String },
    Completed {
        generation: u64,
        verdict: SimulationVerdict,
    },
}

/// Proof that a simulation was started for a given generation.
#[derive(Debug, Clone)]
pub struct SimulationTicket {
    generation: u64,
    call: SimulationCall,
}

impl SimulationTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn call(&self) -> &SimulationCall {
        &self.call
    }
}

/// One sponsored execution in progress, owned by the flow that created it.
///
/// Every change to the parameters or the signed artefacts bumps `generation`;
/// verdicts are only honoured for the generation they were produced for.
/// Signed bytes go to the node at most once: after a broadcast attempt the
/// draft must be prepared again before it can execute.
#[derive(Debug, Clone)]
pub struct ExecutionDraft {
    request: SponsorRequest,
    generation: u64,
    prepared: Option<PreparedTransaction>,
    simulation: SimulationState,
    submitted: bool,
}

impl ExecutionDraft {
    pub fn new(request: SponsorRequest) -> Self {
        Self {
            request,
            generation: 0,
            prepared: None,
            simulation: SimulationState::NotRun,
            submitted: false,
        }
    }

    pub fn request(&self) -> &SponsorRequest {
        &self.request
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn prepared(&self) -> Option<&PreparedTransaction> {
        self.prepared.as_ref()
    }

    pub fn simulation(&self) -> &SimulationState {
        &self.simulation
    }

    /// True once the current signed transaction was handed to the node.
    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    /// Replaces the parameters. Signed artefacts are dropped and any verdict becomes stale.
    pub fn update(&mut self, request: SponsorRequest) {
        self.request = request;
        self.prepared = None;
        self.submitted = false;
        self.generation += 1;
    }

    pub(crate) fn attach(&mut self, prepared: PreparedTransaction) {
        self.prepared = Some(prepared);
        self.submitted = false;
        self.generation += 1;
    }

    /// Recorded before the broadcast call, so a failed attempt also spends the draft.
    pub(crate) fn mark_submitted(&mut self) {
        self.submitted = true;
    }

    pub fn begin_simulation(&self) -> Result<SimulationTicket, EngineError> {
        let prepared = self.prepared.as_ref().ok_or_else(|| EngineError::ValidationError {
            message: "draft has no signed transaction to simulate".to_string(),
        })?;
        Ok(SimulationTicket {
            generation: self.generation,
            call: prepared.simulation_call.clone(),
        })
    }

    /// Stores a verdict unless the draft moved on since `ticket` was issued.
    pub fn record_verdict(&mut self, ticket: SimulationTicket, verdict: SimulationVerdict) -> bool {
        if !self.is_current(&ticket) {
            return false;
        }
        self.simulation = SimulationState::Completed {
            generation: ticket.generation,
            verdict,
        };
        true
    }

    pub fn record_unavailable(&mut self, ticket: SimulationTicket, message: String) -> bool {
        if !self.is_current(&ticket) {
            return false;
        }
        self.simulation = SimulationState::Unavailable {
            generation: ticket.generation,
            message,
        };
        true
    }

    fn is_current(&self, ticket: &SimulationTicket) -> bool {
        if ticket.generation != self.generation {
            tracing::debug!(
                ticket_generation = ticket.generation,
                draft_generation = self.generation,
                "Ignoring simulation result for a superseded draft"
            );
            return false;
        }
        true
    }

    /// Gate in front of every broadcast. Makes no network calls.
    pub fn ensure_executable(
        &self,
        policy: SimulationPolicy,
    ) -> Result<&PreparedTransaction, EngineError> {
        let prepared = self.prepared.as_ref().ok_or_else(|| EngineError::SimulationRequired {
            message: "draft has no signed transaction".to_string(),
        })?;

        if self.submitted {
            return Err(EngineError::SimulationRequired {
                message: "this signed transaction was already submitted; prepare the draft again"
                    .to_string(),
            });
        }

        match &self.simulation {
            SimulationState::Completed {
                generation,
                verdict,
            } if *generation == self.generation => {
                if verdict.success {
                    Ok(prepared)
                } else {
                    Err(EngineError::SimulationReverted {
                        message: verdict
                            .error
                            .clone()
                            .unwrap_or_else(|| "execution reverted".to_string()),
                        dashboard_url: verdict.dashboard_url.clone(),
                    })
                }
            }
            SimulationState::Unavailable {
                generation,
                message,
            } if *generation == self.generation => match policy {
                SimulationPolicy::AllowWhenUnavailable => {
                    tracing::warn!(
                        generation,
                        reason = %message,
                        "Executing without a simulation verdict"
                    );
                    Ok(prepared)
                }
                SimulationPolicy::RequirePass => Err(EngineError::SimulationUnavailable {
                    message: message.clone(),
                }),
            },
            SimulationState::NotRun => Err(EngineError::SimulationRequired {
                message: "no simulation has been run for this draft".to_string(),
            }),
            _ => Err(EngineError::SimulationRequired {
                message: "the last simulation was run for earlier parameters".to_string(),
            }),
        }
    }
}
