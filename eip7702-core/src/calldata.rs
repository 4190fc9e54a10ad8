use alloy::{
    hex,
    primitives::{Address, Bytes, U256},
    sol,
    sol_types::SolCall,
};
use serde::{Deserialize, Serialize};
use sponsor_core::{error::EngineError, validation::parse_address};

sol! {
    /// Sweeper contract the delegating account points its code at.
    interface ISweeper {
        function sweepETH(uint256 amount) external;
        function sweepTokens(address token) external;
        function executeCall(address target, bytes data) external payable returns (bytes);
        function multicall(address[] targets, bytes[] datas) external payable returns (bytes[]);
    }
}

/// `{to, data, value}` for one outgoing call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedCall {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

/// The five call shapes the sweeper supports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CallShape {
    /// Plain value transfer from the account
    #[serde(rename = "sendETH")]
    SendEth { recipient: Address, amount: U256 },
    #[serde(rename = "sweepETH")]
    SweepEth { amount: U256 },
    #[serde(rename = "sweepTokens")]
    SweepTokens { token: Address },
    #[serde(rename = "executeCall", rename_all = "camelCase")]
    ExecuteCall {
        target: Address,
        #[serde(default)]
        data: Bytes,
        #[serde(default)]
        value: U256,
    },
    #[serde(rename = "multicall", rename_all = "camelCase")]
    Multicall {
        targets: Vec<Address>,
        datas: Vec<Bytes>,
        #[serde(default)]
        value: U256,
    },
}

/// Encodes `shape` as a call made to the delegated `account`.
pub fn encode_call(shape: &CallShape, account: Address) -> Result<EncodedCall, EngineError> {
    let call = match shape {
        CallShape::SendEth { recipient, amount } => {
            if amount.is_zero() {
                return Err(EngineError::ValidationError {
                    message: "sendETH needs a nonzero amount".to_string(),
                });
            }
            EncodedCall {
                to: *recipient,
                data: Bytes::new(),
                value: *amount,
            }
        }
        CallShape::SweepEth { amount } => EncodedCall {
            to: account,
            data: ISweeper::sweepETHCall { amount: *amount }.abi_encode().into(),
            value: U256::ZERO,
        },
        CallShape::SweepTokens { token } => EncodedCall {
            to: account,
            data: ISweeper::sweepTokensCall { token: *token }.abi_encode().into(),
            value: U256::ZERO,
        },
        CallShape::ExecuteCall {
            target,
            data,
            value,
        } => EncodedCall {
            to: account,
            data: ISweeper::executeCallCall {
                target: *target,
                data: data.clone(),
            }
            .abi_encode()
            .into(),
            value: *value,
        },
        CallShape::Multicall {
            targets,
            datas,
            value,
        } => {
            if targets.is_empty() {
                return Err(EngineError::ValidationError {
                    message: "multicall needs at least one sub-call".to_string(),
                });
            }
            if targets.len() != datas.len() {
                return Err(EngineError::ValidationError {
                    message: format!(
                        "multicall has {} targets but {} datas",
                        targets.len(),
                        datas.len()
                    ),
                });
            }
            EncodedCall {
                to: account,
                data: ISweeper::multicallCall {
                    targets: targets.clone(),
                    datas: datas.clone(),
                }
                .abi_encode()
                .into(),
                value: *value,
            }
        }
    };
    Ok(call)
}

/// One step of a batched sequence. Parameters arrive unvalidated and are checked
/// only if the step is enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SequenceAction {
    #[serde(rename = "sendETH")]
    SendEth { amount: U256 },
    #[serde(rename = "sweepETH")]
    SweepEth { amount: U256 },
    #[serde(rename = "sweepTokens", rename_all = "camelCase")]
    SweepTokens { token_address: String },
    #[serde(rename = "executeCall", rename_all = "camelCase")]
    ExecuteCall {
        target: String,
        #[serde(default)]
        call_data: String,
        #[serde(default)]
        eth_amount: U256,
    },
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceOperation {
    #[serde(flatten)]
    pub action: SequenceAction,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

impl SequenceOperation {
    pub fn enabled(action: SequenceAction) -> Self {
        Self {
            action,
            enabled: true,
        }
    }

    pub fn disabled(action: SequenceAction) -> Self {
        Self {
            action,
            enabled: false,
        }
    }

    /// `(sub-call data, ETH carried)`. `index` is the 1-based list position used in errors.
    fn encode_step(&self, index: usize) -> Result<(Bytes, U256), EngineError> {
        match &self.action {
            SequenceAction::SendEth { amount } => {
                if amount.is_zero() {
                    return Err(EngineError::invalid_operation(
                        index,
                        "amount",
                        "amount must be greater than zero",
                    ));
                }
                Ok((Bytes::new(), *amount))
            }
            SequenceAction::SweepEth { amount } => Ok((
                ISweeper::sweepETHCall { amount: *amount }.abi_encode().into(),
                U256::ZERO,
            )),
            SequenceAction::SweepTokens { token_address } => {
                let token = parse_address(token_address).map_err(|_| {
                    EngineError::invalid_operation(index, "tokenAddress", "token address invalid")
                })?;
                Ok((
                    ISweeper::sweepTokensCall { token }.abi_encode().into(),
                    U256::ZERO,
                ))
            }
            SequenceAction::ExecuteCall {
                target,
                call_data,
                eth_amount,
            } => {
                let target = parse_address(target).map_err(|_| {
                    EngineError::invalid_operation(index, "target", "call target invalid")
                })?;
                let data = decode_call_data(call_data).ok_or_else(|| {
                    EngineError::invalid_operation(index, "callData", "call data is not hex")
                })?;
                Ok((
                    ISweeper::executeCallCall { target, data }.abi_encode().into(),
                    *eth_amount,
                ))
            }
        }
    }
}

fn decode_call_data(value: &str) -> Option<Bytes> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed == "0x" {
        return Some(Bytes::new());
    }
    hex::decode(trimmed).ok().map(Bytes::from)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedSequence {
    pub targets: Vec<Address>,
    pub datas: Vec<Bytes>,
    /// Sum of ETH carried by enabled steps, in wei
    pub total_value: U256,
    /// The `multicall` call on `account` carrying `total_value`
    pub call: EncodedCall,
}

/// Encodes the enabled operations, in list order, as one `multicall` on `account`.
pub fn encode_sequence(
    account: Address,
    operations: &[SequenceOperation],
) -> Result<EncodedSequence, EngineError> {
    let mut targets = Vec::new();
    let mut datas = Vec::new();
    let mut total_value = U256::ZERO;

    for (position, operation) in operations.iter().enumerate() {
        if !operation.enabled {
            continue;
        }
        let index = position + 1;
        let (data, value) = operation.encode_step(index)?;
        total_value = total_value.checked_add(value).ok_or_else(|| {
            EngineError::invalid_operation(index, "amount", "total value overflows 256 bits")
        })?;
        targets.push(account);
        datas.push(data);
    }

    if targets.is_empty() {
        return Err(EngineError::ValidationError {
            message: "sequence has no enabled operations".to_string(),
        });
    }

    tracing::debug!(
        account = ?account,
        steps = targets.len(),
        total_value = %total_value,
        "Encoded sequence"
    );

    let data = ISweeper::multicallCall {
        targets: targets.clone(),
        datas: datas.clone(),
    }
    .abi_encode()
    .into();

    Ok(EncodedSequence {
        targets,
        datas,
        total_value,
        call: EncodedCall {
            to: account,
            data,
            value: total_value,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, utils::parse_ether};

    const ACCOUNT: Address = address!("0x70997970C51812dc3A010C7d01b50e0d17dc79C8");
    const TOKEN: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";

    #[test]
    fn empty_sequence_is_an_error() {
        assert!(matches!(
            encode_sequence(ACCOUNT, &[]),
            Err(EngineError::ValidationError { .. })
        ));

        let all_disabled = [SequenceOperation::disabled(SequenceAction::SweepEth {
            amount: U256::from(1),
        })];
        assert!(encode_sequence(ACCOUNT, &all_disabled).is_err());
    }

    #[test]
    fn disabled_steps_are_skipped_in_order() {
        let ops = [
            SequenceOperation::enabled(SequenceAction::SweepEth {
                amount: U256::from(10),
            }),
            SequenceOperation::disabled(SequenceAction::SendEth {
                amount: U256::from(999),
            }),
            SequenceOperation::enabled(SequenceAction::SweepTokens {
                token_address: TOKEN.to_string(),
            }),
        ];

        let encoded = encode_sequence(ACCOUNT, &ops).unwrap();
        assert_eq!(encoded.targets, vec![ACCOUNT, ACCOUNT]);
        assert_eq!(
            encoded.datas[0],
            Bytes::from(ISweeper::sweepETHCall { amount: U256::from(10) }.abi_encode())
        );
        assert_eq!(
            encoded.datas[1][..4],
            ISweeper::sweepTokensCall::SELECTOR[..]
        );
        assert_eq!(encoded.total_value, U256::ZERO);
    }

    #[test]
    fn total_value_sums_eth_bearing_steps() {
        let ops = [
            SequenceOperation::enabled(SequenceAction::SendEth {
                amount: parse_ether("0.1").unwrap(),
            }),
            SequenceOperation::enabled(SequenceAction::SweepTokens {
                token_address: TOKEN.to_string(),
            }),
            SequenceOperation::enabled(SequenceAction::ExecuteCall {
                target: "0x2222222222222222222222222222222222222222".to_string(),
                call_data: "0xdeadbeef".to_string(),
                eth_amount: parse_ether("0.05").unwrap(),
            }),
        ];

        let encoded = encode_sequence(ACCOUNT, &ops).unwrap();
        assert_eq!(encoded.targets.len(), 3);
        assert_eq!(encoded.datas.len(), 3);
        assert_eq!(encoded.total_value, parse_ether("0.15").unwrap());
        assert_eq!(encoded.call.value, encoded.total_value);

        let decoded = ISweeper::multicallCall::abi_decode(&encoded.call.data).unwrap();
        assert_eq!(decoded.targets, encoded.targets);
        assert_eq!(decoded.datas, encoded.datas);
    }

    #[test]
    fn invalid_params_name_the_operation() {
        let ops = [
            SequenceOperation::enabled(SequenceAction::SweepEth {
                amount: U256::from(1),
            }),
            SequenceOperation::enabled(SequenceAction::SweepTokens {
                token_address: "0x1234".to_string(),
            }),
        ];

        match encode_sequence(ACCOUNT, &ops) {
            Err(EngineError::InvalidOperationParams { index, field, .. }) => {
                assert_eq!(index, 2);
                assert_eq!(field, "tokenAddress");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn disabled_steps_are_not_validated() {
        let ops = [
            SequenceOperation::disabled(SequenceAction::ExecuteCall {
                target: "garbage".to_string(),
                call_data: "zz".to_string(),
                eth_amount: U256::ZERO,
            }),
            SequenceOperation::enabled(SequenceAction::SweepEth {
                amount: U256::from(1),
            }),
        ];
        assert!(encode_sequence(ACCOUNT, &ops).is_ok());
    }

    #[test]
    fn single_shapes_target_the_right_address() {
        let recipient = address!("0x3333333333333333333333333333333333333333");
        let send = encode_call(
            &CallShape::SendEth {
                recipient,
                amount: U256::from(5),
            },
            ACCOUNT,
        )
        .unwrap();
        assert_eq!(send.to, recipient);
        assert!(send.data.is_empty());
        assert_eq!(send.value, U256::from(5));

        let execute = encode_call(
            &CallShape::ExecuteCall {
                target: recipient,
                data: Bytes::from_static(&[0xde, 0xad]),
                value: U256::from(7),
            },
            ACCOUNT,
        )
        .unwrap();
        assert_eq!(execute.to, ACCOUNT);
        assert_eq!(execute.value, U256::from(7));
        assert_eq!(execute.data[..4], ISweeper::executeCallCall::SELECTOR[..]);

        assert!(
            encode_call(
                &CallShape::SendEth {
                    recipient,
                    amount: U256::ZERO
                },
                ACCOUNT
            )
            .is_err()
        );
    }

    #[test]
    fn sequence_operations_parse_from_json() {
        let ops: Vec<SequenceOperation> = serde_json::from_value(serde_json::json!([
            { "type": "sendETH", "amount": "0x2386f26fc10000" },
            { "type": "sweepTokens", "tokenAddress": TOKEN, "enabled": false },
            { "type": "executeCall", "target": TOKEN, "callData": "0x", "ethAmount": "0x0" }
        ]))
        .unwrap();

        assert!(ops[0].enabled);
        assert!(!ops[1].enabled);
        assert!(matches!(ops[2].action, SequenceAction::ExecuteCall { .. }));
    }
}
