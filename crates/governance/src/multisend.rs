//! Multisend batch codec
//!
//! A batch is a concatenation of packed records:
//!
//! ```text
//! operation (1) | target (20) | value (32, big endian) | data length (32, big endian) | data
//! ```
//!
//! The batch is submitted as the single `bytes` argument of
//! `multiSend(bytes)`, ABI encoded as selector, offset word, length word
//! and the batch padded to a multiple of 32 bytes.

use serde::{Deserialize, Serialize};

use civic_common::{Address, Selector};

use crate::error::{GovernanceError, Result};

/// Signature of the multisend entry point
pub const MULTISEND_SIGNATURE: &str = "multiSend(bytes)";

const WORD: usize = 32;
const RECORD_HEADER: usize = 1 + Address::LEN + WORD + WORD;

/// How a call is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Operation {
    /// Plain call in the callee's context
    Call = 0,
    /// Code of the callee runs in the caller's context
    DelegateCall = 1,
}

impl TryFrom<u8> for Operation {
    type Error = GovernanceError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Operation::Call),
            1 => Ok(Operation::DelegateCall),
            other => Err(GovernanceError::MalformedBatch(format!(
                "unknown operation {}",
                other
            ))),
        }
    }
}

/// One record of a multisend batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultisendCall {
    pub operation: Operation,
    pub to: Address,
    pub value: u128,
    pub data: Vec<u8>,
}

impl MultisendCall {
    /// A plain call
    pub fn call(to: Address, value: u128, data: Vec<u8>) -> Self {
        Self {
            operation: Operation::Call,
            to,
            value,
            data,
        }
    }
}

/// Big-endian 32-byte word holding `value`
pub fn u128_word(value: u128) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 16..].copy_from_slice(&value.to_be_bytes());
    word
}

fn word_to_u128(word: &[u8]) -> Result<u128> {
    let (high, low) = word.split_at(WORD - 16);
    if high.iter().any(|byte| *byte != 0) {
        return Err(GovernanceError::MalformedBatch(
            "word does not fit in 128 bits".to_string(),
        ));
    }
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(low);
    Ok(u128::from_be_bytes(bytes))
}

/// Pack `calls` into a multisend batch
pub fn encode_batch(calls: &[MultisendCall]) -> Vec<u8> {
    let size = calls.iter().map(|call| RECORD_HEADER + call.data.len()).sum();
    let mut batch = Vec::with_capacity(size);
    for call in calls {
        batch.push(call.operation as u8);
        batch.extend_from_slice(call.to.as_bytes());
        batch.extend_from_slice(&u128_word(call.value));
        batch.extend_from_slice(&u128_word(call.data.len() as u128));
        batch.extend_from_slice(&call.data);
    }
    batch
}

/// Unpack a multisend batch
pub fn decode_batch(mut batch: &[u8]) -> Result<Vec<MultisendCall>> {
    let mut calls = Vec::new();
    while !batch.is_empty() {
        if batch.len() < RECORD_HEADER {
            return Err(GovernanceError::MalformedBatch(format!(
                "truncated record header ({} bytes)",
                batch.len()
            )));
        }
        let operation = Operation::try_from(batch[0])?;
        let to = Address::from_slice(&batch[1..1 + Address::LEN])
            .ok_or_else(|| GovernanceError::MalformedBatch("bad target".to_string()))?;
        let value_start = 1 + Address::LEN;
        let value = word_to_u128(&batch[value_start..value_start + WORD])?;
        let len = word_to_u128(&batch[value_start + WORD..RECORD_HEADER])?;
        let len = usize::try_from(len)
            .map_err(|_| GovernanceError::MalformedBatch("data length overflow".to_string()))?;

        let rest = &batch[RECORD_HEADER..];
        if rest.len() < len {
            return Err(GovernanceError::MalformedBatch(format!(
                "record declares {} data bytes, {} remain",
                len,
                rest.len()
            )));
        }
        calls.push(MultisendCall {
            operation,
            to,
            value,
            data: rest[..len].to_vec(),
        });
        batch = &rest[len..];
    }
    Ok(calls)
}

/// Wrap a batch as a `multiSend(bytes)` invocation
pub fn encode_multisend_call(batch: &[u8]) -> Vec<u8> {
    let padded = (batch.len() + WORD - 1) / WORD * WORD;
    let mut payload = Vec::with_capacity(4 + 2 * WORD + padded);
    payload.extend_from_slice(Selector::from_signature(MULTISEND_SIGNATURE).as_bytes());
    payload.extend_from_slice(&u128_word(WORD as u128));
    payload.extend_from_slice(&u128_word(batch.len() as u128));
    payload.extend_from_slice(batch);
    payload.resize(4 + 2 * WORD + padded, 0);
    payload
}

/// Extract the batch from a `multiSend(bytes)` invocation
pub fn decode_multisend_call(payload: &[u8]) -> Result<Vec<u8>> {
    let header = 4 + 2 * WORD;
    if payload.len() < header {
        return Err(GovernanceError::MalformedBatch("payload too short".to_string()));
    }
    if payload[..4] != *Selector::from_signature(MULTISEND_SIGNATURE).as_bytes() {
        return Err(GovernanceError::MalformedBatch("not a multiSend call".to_string()));
    }
    let len = word_to_u128(&payload[4 + WORD..header])?;
    let len = usize::try_from(len)
        .map_err(|_| GovernanceError::MalformedBatch("batch length overflow".to_string()))?;
    let body = &payload[header..];
    if body.len() < len {
        return Err(GovernanceError::MalformedBatch(format!(
            "payload declares {} batch bytes, {} remain",
            len,
            body.len()
        )));
    }
    Ok(body[..len].to_vec())
}
