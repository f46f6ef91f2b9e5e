//! Best-effort classification of matched approval logs.
//!
//! Every contract read goes through [`EndpointConnection::try_call`]; a failed read only means
//! the capability is absent and is never reported as a scan error.

use alloy::{
    primitives::{Address, U256},
    rpc::types::Log,
};

use crate::{
    connection::EndpointConnection,
    contracts::{IERC20, IERC721},
    types::FindingDetails,
};

/// Classify an `Approval` log granted by `owner`.
///
/// ERC-20 wins when `decimals` and `allowance` both answer; otherwise an answering `name` makes
/// it ERC-721; otherwise the contract is unknown. Returns `None` when the log carries no spender.
pub(crate) async fn approval(
    connection: &EndpointConnection,
    owner: Address,
    log: &Log,
) -> Option<FindingDetails> {
    let contract = log.address();
    let spender = indexed_address(log, 2)?;

    let token = IERC20::new(contract, connection.provider().clone());
    if let Ok(decimals) = connection.try_call("decimals", token.decimals().call()).await {
        match connection.try_call("allowance", token.allowance(owner, spender).call()).await {
            Ok(allowance) => {
                let symbol = connection
                    .try_call("symbol", token.symbol().call())
                    .await
                    .unwrap_or_default();
                return Some(FindingDetails::Erc20 { spender, allowance, decimals, symbol });
            }
            Err(e) => {
                debug!(contract = %contract, error = %e, "decimals answered but allowance did not");
            }
        }
    }

    let nft = IERC721::new(contract, connection.provider().clone());
    if let Ok(name) = connection.try_call("name", nft.name().call()).await {
        return Some(FindingDetails::Erc721 { spender, token_id: token_id(log), name });
    }

    Some(FindingDetails::Unknown { spender })
}

/// Classify an `ApprovalForAll` log granted by `owner`, reading the current approval state.
pub(crate) async fn approval_for_all(
    connection: &EndpointConnection,
    owner: Address,
    log: &Log,
) -> Option<FindingDetails> {
    let operator = indexed_address(log, 2)?;

    let nft = IERC721::new(log.address(), connection.provider().clone());
    let is_approved =
        connection.try_call("isApprovedForAll", nft.isApprovedForAll(owner, operator).call()).await;

    Some(FindingDetails::ApprovalForAll { operator, is_approved: is_approved.ok() })
}

fn indexed_address(log: &Log, index: usize) -> Option<Address> {
    let Some(topic) = log.topics().get(index) else {
        warn!(
            contract = %log.address(),
            tx_hash = ?log.transaction_hash,
            "Approval log without indexed topic {}, skipping",
            index
        );
        return None;
    };
    Some(Address::from_word(*topic))
}

/// Token id from the first data word, else from the fourth topic.
fn token_id(log: &Log) -> Option<U256> {
    let data = &log.data().data;
    if data.len() >= 32 {
        return Some(U256::from_be_slice(&data[..32]));
    }
    log.topics().get(3).map(|topic| U256::from_be_bytes(topic.0))
}
