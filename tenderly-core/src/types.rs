use std::collections::BTreeMap;

use alloy::primitives::{Address, Bytes, U256};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Treats an explicit `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A fully-formed call to dry run: the exact tuple that will later be broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationCall {
    pub chain_id: u64,
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub gas_limit: u64,
    /// Code installed on accounts for the duration of the simulation
    pub code_overrides: BTreeMap<Address, Bytes>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StateObject {
    pub code: Bytes,
}

/// Body of `POST /account/{account}/project/{project}/simulate`
#[derive(Debug, Clone, Serialize)]
pub struct SimulationRequest {
    pub network_id: String,
    pub from: Address,
    pub to: Address,
    pub input: Bytes,
    pub gas: u64,
    pub gas_price: String,
    pub value: String,
    pub save: bool,
    pub save_if_fails: bool,
    pub simulation_type: &'static str,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub state_objects: BTreeMap<Address, StateObject>,
}

impl From<&SimulationCall> for SimulationRequest {
    fn from(call: &SimulationCall) -> Self {
        Self {
            network_id: call.chain_id.to_string(),
            from: call.from,
            to: call.to,
            input: call.data.clone(),
            gas: call.gas_limit,
            gas_price: "0".to_string(),
            value: call.value.to_string(),
            save: true,
            save_if_fails: true,
            simulation_type: "full",
            state_objects: call
                .code_overrides
                .iter()
                .map(|(address, code)| (*address, StateObject { code: code.clone() }))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationResponse {
    pub transaction: TransactionResult,
    #[serde(default, deserialize_with = "null_as_default")]
    pub simulation: SimulationRecord,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionResult {
    pub status: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub gas_used: u64,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimulationRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub logs: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub balance_diff: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub state_diff: Vec<Value>,
}

/// Pass/fail result of a dry run. A revert is a normal `success = false` verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationVerdict {
    pub success: bool,
    pub gas_used: u64,
    pub gas_limit: u64,
    pub error: Option<String>,
    pub logs: Vec<Value>,
    pub balance_changes: Vec<Value>,
    pub state_changes: Vec<Value>,
    pub dashboard_url: Option<String>,
}

impl SimulationVerdict {
    pub fn from_response(
        response: SimulationResponse,
        gas_limit: u64,
        dashboard_url: Option<String>,
    ) -> Self {
        let error = match (response.transaction.status, response.transaction.error_message) {
            (true, _) => None,
            (false, Some(message)) => Some(message),
            (false, None) => Some("execution reverted".to_string()),
        };

        Self {
            success: response.transaction.status,
            gas_used: response.transaction.gas_used,
            gas_limit,
            error,
            logs: response.simulation.logs,
            balance_changes: response.simulation.balance_diff,
            state_changes: response.simulation.state_diff,
            dashboard_url,
        }
    }
}
