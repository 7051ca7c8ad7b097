//! Legacy transaction assembly for relayed contract calls.
//!
//! Every relayed operation is a type-0 transaction priced at the network gas
//! price. Gas limits carry a 10% buffer over the estimate (15% once referral
//! bytes are spliced in) and fall back to a fixed limit when estimation is
//! unavailable.

use alloy::consensus::TxLegacy;
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, TxKind, U256};
use alloy::rpc::types::TransactionRequest;
use tracing::warn;

use crate::chain::ChainClient;
use crate::error::RelayError;

/// Used when the node refuses to estimate (e.g. state-dependent reverts)
pub const GAS_ESTIMATE_FALLBACK: u64 = 200_000;
pub const BUILD_GAS_BUFFER_PERCENT: u64 = 110;
pub const SPLICE_GAS_BUFFER_PERCENT: u64 = 115;

pub fn buffered_gas(estimate: u64, percent: u64) -> u64 {
    assert!(percent >= 100, "Gas buffer cannot shrink the estimate");
    assert!(percent <= 200, "Gas buffer exceeds defensive bound");
    estimate.saturating_mul(percent) / 100
}

fn call_request(from: Address, to: Address, input: Bytes, gas_price: u128) -> TransactionRequest {
    TransactionRequest::default()
        .with_from(from)
        .with_to(to)
        .with_input(input)
        .with_gas_price(gas_price)
}

/// Build a fully-populated legacy call transaction: network gas price,
/// pending nonce of `from`, estimated gas with the build buffer.
pub async fn build_call(
    client: &ChainClient,
    from: Address,
    to: Address,
    calldata: Vec<u8>,
) -> Result<TxLegacy, RelayError> {
    let gas_price = client.gas_price().await?;
    let nonce = client.pending_nonce(from).await?;
    let input = Bytes::from(calldata);

    let estimate = match client
        .estimate_gas(call_request(from, to, input.clone(), gas_price))
        .await
    {
        Ok(estimate) => estimate,
        Err(err) => {
            warn!(
                chain_id = client.chain_id(),
                "Gas estimation failed, using fallback: {err}"
            );
            GAS_ESTIMATE_FALLBACK
        }
    };

    Ok(TxLegacy {
        chain_id: Some(client.chain_id()),
        nonce,
        gas_price,
        gas_limit: buffered_gas(estimate, BUILD_GAS_BUFFER_PERCENT),
        to: TxKind::Call(to),
        value: U256::ZERO,
        input,
    })
}

/// Bit-exact concatenation of referral bytes after the ABI-encoded calldata.
/// This is the out-of-band convention referral tooling reads back out of the
/// transaction input; it is not ABI data and unknown contracts ignore it.
pub fn append_referral(input: &Bytes, referral: &[u8]) -> Bytes {
    let mut data = input.to_vec();
    data.extend_from_slice(referral);
    Bytes::from(data)
}

/// Splice referral bytes into a built transaction and re-estimate with the
/// wider splice buffer. A failed re-estimation keeps the prior gas limit.
pub async fn splice_referral(
    client: &ChainClient,
    tx: &mut TxLegacy,
    from: Address,
    referral: &[u8],
) -> Result<(), RelayError> {
    if referral.is_empty() {
        return Ok(());
    }
    let TxKind::Call(to) = tx.to else {
        return Err(RelayError::Internal(
            "referral splice requires a call transaction".to_string(),
        ));
    };

    tx.input = append_referral(&tx.input, referral);

    match client
        .estimate_gas(call_request(from, to, tx.input.clone(), tx.gas_price))
        .await
    {
        Ok(estimate) => tx.gas_limit = buffered_gas(estimate, SPLICE_GAS_BUFFER_PERCENT),
        Err(err) => {
            warn!(
                chain_id = client.chain_id(),
                "Re-estimation after referral splice failed, keeping prior gas: {err}"
            );
        }
    }
    Ok(())
}

/// Decode user-supplied referral bytes (0x-prefixed hex).
pub fn decode_referral(value: &str) -> Result<Vec<u8>, RelayError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let stripped = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    hex::decode(stripped)
        .map_err(|err| RelayError::Internal(format!("malformed referral data: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gas_buffers() {
        assert_eq!(buffered_gas(200_000, BUILD_GAS_BUFFER_PERCENT), 220_000);
        assert_eq!(buffered_gas(200_000, SPLICE_GAS_BUFFER_PERCENT), 230_000);
        assert_eq!(buffered_gas(100_001, BUILD_GAS_BUFFER_PERCENT), 110_001);
        // Integer floor, never rounds up
        assert_eq!(buffered_gas(99, BUILD_GAS_BUFFER_PERCENT), 108);
    }

    #[test]
    fn referral_append_is_exact_concatenation() {
        let original = Bytes::from(vec![0x01, 0x02, 0x03]);
        let spliced = append_referral(&original, &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(spliced.as_ref(), &[0x01, 0x02, 0x03, 0xde, 0xad, 0xbe, 0xef]);
        assert!(spliced.as_ref().ends_with(&[0xde, 0xad, 0xbe, 0xef]));
        // Stripping the tail yields the original calldata
        assert_eq!(&spliced[..original.len()], original.as_ref());
    }

    #[test]
    fn referral_decoding() {
        assert_eq!(
            decode_referral("0xdeadbeef").unwrap(),
            vec![0xde, 0xad, 0xbe, 0xef]
        );
        assert_eq!(decode_referral("deadbeef").unwrap().len(), 4);
        assert!(decode_referral("").unwrap().is_empty());
        assert!(decode_referral("0xzz").is_err());
    }
}
