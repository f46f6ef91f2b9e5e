use std::ops::RangeInclusive;

use alloy::{
    primitives::{Address, B256, BlockNumber},
    rpc::types::Filter,
    sol_types::SolEvent,
};

use crate::contracts::{IERC20, IERC721};

/// `Approval` logs granted by `owner` inside `range`, on any contract.
pub(crate) fn approvals(owner: Address, range: &RangeInclusive<BlockNumber>) -> Filter {
    by_owner(IERC20::Approval::SIGNATURE_HASH, owner, range)
}

/// `ApprovalForAll` logs granted by `owner` inside `range`, on any contract.
pub(crate) fn approvals_for_all(owner: Address, range: &RangeInclusive<BlockNumber>) -> Filter {
    by_owner(IERC721::ApprovalForAll::SIGNATURE_HASH, owner, range)
}

fn by_owner(signature: B256, owner: Address, range: &RangeInclusive<BlockNumber>) -> Filter {
    Filter::new()
        .from_block(*range.start())
        .to_block(*range.end())
        .event_signature(signature)
        .topic1(owner.into_word())
}
