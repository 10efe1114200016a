// Copyright 2026 - See NOTICE file for copyright holders.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//	http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::ClosingState;
use alloy_primitives::{keccak256, Bytes as PrimBytes, FixedBytes};
use alloy_sol_types::sol;
use alloy_sol_types::SolValue;
use soroban_sdk::{xdr::ToXdr, BytesN, Env};

sol! {
    struct StateMessageSol {
        uint8 domain;
        bytes32 channelId;
        int128 balanceA;
        int128 balanceB;
        uint64 nonce;
        bytes32 networkId;
        bytes contractAddress;
    }
}

const DOMAIN_REGULAR_CLOSE: u8 = 0;
const DOMAIN_COOPERATIVE_CLOSE: u8 = 1;

/// A channel state destined for one of the two close paths. The two variants
/// hash to different digests for the same state, so a signature collected
/// for a contestable close can never be replayed as consent to an immediate
/// cooperative close, or vice versa.
pub enum StateMessage<'a> {
    RegularClose(&'a ClosingState),
    CooperativeClose(&'a ClosingState),
}

impl StateMessage<'_> {
    pub fn state(&self) -> &ClosingState {
        match self {
            StateMessage::RegularClose(state) => state,
            StateMessage::CooperativeClose(state) => state,
        }
    }

    fn domain(&self) -> u8 {
        match self {
            StateMessage::RegularClose(_) => DOMAIN_REGULAR_CLOSE,
            StateMessage::CooperativeClose(_) => DOMAIN_COOPERATIVE_CLOSE,
        }
    }
}

// message_hash computes the digest both parties sign for the given message.
// The payload is Solidity-ABI encoded so standard wallet tooling can
// reproduce the exact bytes off-chain. The network id and contract address
// pin signatures to this chain and this deployment.
pub fn message_hash(env: &Env, msg: &StateMessage) -> BytesN<32> {
    let state = msg.state();
    let contract_xdr = env.current_contract_address().to_xdr(env);
    let message_sol = StateMessageSol {
        domain: msg.domain(),
        channelId: FixedBytes(state.channel_id.to_array()),
        balanceA: state.balance_a,
        balanceB: state.balance_b,
        nonce: state.nonce,
        networkId: FixedBytes(env.ledger().network_id().to_array()),
        contractAddress: PrimBytes::from(contract_xdr.to_alloc_vec()),
    };
    let hash = keccak256(message_sol.abi_encode());
    BytesN::from_array(env, &hash.0)
}
