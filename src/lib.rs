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

#![no_std]
use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, symbol_short, token, xdr::ToXdr, Address,
    BytesN, Env, Symbol, Vec,
};

pub mod ecverify;
pub mod encoding;

use encoding::StateMessage;

/// Seconds a non-cooperative close stays contestable. Every accepted
/// challenge re-arms the window from the current ledger time.
pub const CHALLENGE_PERIOD: u64 = 3600;

/// Floor for the larger of the two opening deposits, so channels cannot be
/// opened with no value at stake.
pub const MIN_DEPOSIT: i128 = 10;

const TTL_THRESHOLD: u32 = 17280;
const TTL_EXTEND: u32 = 120960;

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    NotFound = 1,
    InvalidState = 2,
    Unauthorized = 3,
    InvalidSignature = 4,
    InvalidNonce = 5,
    InvalidBalances = 6,
    DeadlineError = 7,
    TransferFailure = 8,
    InvalidParty = 9,
    InvalidDeposit = 10,
    ChannelAlreadyExists = 11,
    ChannelIdMismatch = 12,
}

#[contracttype]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ChannelStatus {
    Open,
    Closing,
    Closed,
    Disputed,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Participant {
    /// Account the party funds the channel from and is paid out to.
    pub addr: Address,
    /// 20-byte identity the party signs channel states with.
    pub sig_addr: BytesN<20>,
}

/// The off-chain message body both parties sign. Only its hash is retained
/// on-chain; the hash additionally binds the network id, this contract's
/// address and a close-kind domain tag (see `encoding`).
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClosingState {
    pub channel_id: BytesN<32>,
    pub balance_a: i128,
    pub balance_b: i128,
    pub nonce: u64,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Channel {
    pub channel_id: BytesN<32>,
    pub token: Address,
    pub party_a: Participant,
    pub party_b: Participant,
    pub deposit_a: i128,
    pub deposit_b: i128,
    pub balance_a: i128,
    pub balance_b: i128,
    pub nonce: u64,
    pub status: ChannelStatus,
    pub open_time: u64,
    pub close_time: u64,
    pub challenge_end: u64,
    pub latest_state_hash: BytesN<32>,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChannelBalance {
    pub balance_a: i128,
    pub balance_b: i128,
}

#[contracttype]
#[derive(Clone)]
enum DataKey {
    Channel(BytesN<32>),
    UserChannels(Address),
    ChannelCount,
    LockedVolume,
}

// Preimage of the channel id: opening parties, ledger time and the global
// sequence counter, so ids never collide even for identical parties.
#[contracttype]
#[derive(Clone)]
struct ChannelSeed {
    party_a: Address,
    party_b: Address,
    opened_at: u64,
    sequence: u64,
}

const CHANNELS: Symbol = symbol_short!("channel");

#[contract]
pub struct PaymentChannelContract;

#[contractimpl]
impl PaymentChannelContract {
    pub fn open_channel(
        env: Env,
        party_a: Participant,
        party_b: Participant,
        token: Address,
        deposit_a: i128,
        deposit_b: i128,
    ) -> Result<BytesN<32>, Error> {
        // checks
        party_a.addr.require_auth();
        if party_a.addr == party_b.addr {
            return Err(Error::InvalidParty);
        }
        if deposit_a < 0 || deposit_b < 0 {
            return Err(Error::InvalidDeposit);
        }
        if deposit_a < MIN_DEPOSIT && deposit_b < MIN_DEPOSIT {
            return Err(Error::InvalidDeposit);
        }
        let sequence = channel_count(&env);
        let cid = derive_channel_id(&env, &party_a.addr, &party_b.addr, sequence);
        if env
            .storage()
            .persistent()
            .has(&DataKey::Channel(cid.clone()))
        {
            return Err(Error::ChannelAlreadyExists);
        }

        // effects
        let now = env.ledger().timestamp();
        let channel = Channel {
            channel_id: cid.clone(),
            token: token.clone(),
            party_a: party_a.clone(),
            party_b: party_b.clone(),
            deposit_a,
            deposit_b,
            balance_a: deposit_a,
            balance_b: deposit_b,
            nonce: 0,
            status: ChannelStatus::Open,
            open_time: now,
            close_time: 0,
            challenge_end: 0,
            latest_state_hash: BytesN::from_array(&env, &[0u8; 32]),
        };
        set_channel(&env, &channel);
        append_user_channel(&env, &party_a.addr, &cid);
        append_user_channel(&env, &party_b.addr, &cid);
        set_channel_count(&env, sequence + 1);
        add_locked_volume(&env, deposit_a + deposit_b);
        env.events()
            .publish((CHANNELS, symbol_short!("open")), channel.clone());

        // interact
        let client = token::Client::new(&env, &token);
        let contract = env.current_contract_address();
        if deposit_a > 0
            && client
                .try_transfer(&party_a.addr, &contract, &deposit_a)
                .is_err()
        {
            return Err(Error::TransferFailure);
        }
        // Party B is not the caller, so their deposit is pulled against a
        // pre-approved allowance.
        if deposit_b > 0
            && client
                .try_transfer_from(&contract, &party_b.addr, &contract, &deposit_b)
                .is_err()
        {
            return Err(Error::TransferFailure);
        }
        Ok(cid)
    }

    pub fn deposit(
        env: Env,
        channel_id: BytesN<32>,
        party: Address,
        amount: i128,
    ) -> Result<(), Error> {
        // checks
        party.require_auth();
        let mut channel = get_channel(&env, &channel_id)?;
        if channel.status != ChannelStatus::Open {
            return Err(Error::InvalidState);
        }
        if amount <= 0 {
            return Err(Error::InvalidDeposit);
        }

        // effects
        if party == channel.party_a.addr {
            channel.deposit_a += amount;
            channel.balance_a += amount;
        } else if party == channel.party_b.addr {
            channel.deposit_b += amount;
            channel.balance_b += amount;
        } else {
            return Err(Error::Unauthorized);
        }
        set_channel(&env, &channel);
        add_locked_volume(&env, amount);
        env.events()
            .publish((CHANNELS, symbol_short!("deposit")), channel.clone());

        // interact
        let client = token::Client::new(&env, &channel.token);
        let contract = env.current_contract_address();
        if client.try_transfer(&party, &contract, &amount).is_err() {
            return Err(Error::TransferFailure);
        }
        Ok(())
    }

    pub fn initiate_close(
        env: Env,
        channel_id: BytesN<32>,
        caller: Address,
        state: ClosingState,
        sig_a: BytesN<65>,
        sig_b: BytesN<65>,
    ) -> Result<(), Error> {
        // checks
        caller.require_auth();
        let mut channel = get_channel(&env, &channel_id)?;
        if channel.status != ChannelStatus::Open {
            return Err(Error::InvalidState);
        }
        require_party(&channel, &caller)?;
        accept_signed_state(
            &env,
            &mut channel,
            StateMessage::RegularClose(&state),
            &sig_a,
            &sig_b,
        )?;

        // effects
        let now = env.ledger().timestamp();
        channel.status = ChannelStatus::Closing;
        channel.close_time = now;
        channel.challenge_end = now + CHALLENGE_PERIOD;
        set_channel(&env, &channel);
        env.events()
            .publish((CHANNELS, symbol_short!("closing")), channel);
        Ok(())
    }

    // The fraud-proof path: during the open window either party may present
    // a strictly newer jointly-signed state, superseding the one a dishonest
    // counterparty anchored, and the window re-arms for further rounds.
    pub fn challenge(
        env: Env,
        channel_id: BytesN<32>,
        caller: Address,
        state: ClosingState,
        sig_a: BytesN<65>,
        sig_b: BytesN<65>,
    ) -> Result<(), Error> {
        // checks
        caller.require_auth();
        let mut channel = get_channel(&env, &channel_id)?;
        if channel.status != ChannelStatus::Closing {
            return Err(Error::InvalidState);
        }
        let now = env.ledger().timestamp();
        if now > channel.challenge_end {
            return Err(Error::DeadlineError);
        }
        require_party(&channel, &caller)?;
        if state.nonce <= channel.nonce {
            return Err(Error::InvalidNonce);
        }
        accept_signed_state(
            &env,
            &mut channel,
            StateMessage::RegularClose(&state),
            &sig_a,
            &sig_b,
        )?;

        // effects
        channel.challenge_end = now + CHALLENGE_PERIOD;
        set_channel(&env, &channel);
        env.events()
            .publish((CHANNELS, symbol_short!("challenge")), channel);
        Ok(())
    }

    // Callable by anyone once the window has elapsed, so neither party can
    // hold up fund release. The last accepted signed state is authoritative;
    // no further signatures are needed.
    pub fn finalize_close(env: Env, channel_id: BytesN<32>) -> Result<(), Error> {
        // checks
        let mut channel = get_channel(&env, &channel_id)?;
        if channel.status != ChannelStatus::Closing {
            return Err(Error::InvalidState);
        }
        if env.ledger().timestamp() < channel.challenge_end {
            return Err(Error::DeadlineError);
        }

        // effects
        channel.status = ChannelStatus::Closed;
        set_channel(&env, &channel);
        add_locked_volume(&env, -(channel.balance_a + channel.balance_b));
        env.events()
            .publish((CHANNELS, symbol_short!("closed")), channel.clone());

        // interact
        distribute(&env, &channel)
    }

    pub fn cooperative_close(
        env: Env,
        channel_id: BytesN<32>,
        caller: Address,
        state: ClosingState,
        sig_a: BytesN<65>,
        sig_b: BytesN<65>,
    ) -> Result<(), Error> {
        // checks
        caller.require_auth();
        let mut channel = get_channel(&env, &channel_id)?;
        if channel.status != ChannelStatus::Open {
            return Err(Error::InvalidState);
        }
        require_party(&channel, &caller)?;
        accept_signed_state(
            &env,
            &mut channel,
            StateMessage::CooperativeClose(&state),
            &sig_a,
            &sig_b,
        )?;

        // effects
        let now = env.ledger().timestamp();
        channel.status = ChannelStatus::Closed;
        channel.close_time = now;
        channel.challenge_end = now;
        set_channel(&env, &channel);
        add_locked_volume(&env, -(channel.balance_a + channel.balance_b));
        env.events()
            .publish((CHANNELS, symbol_short!("closed")), channel.clone());

        // interact
        distribute(&env, &channel)
    }

    // Terminal marker for the automatic path. Resolution of a disputed
    // channel happens out of band; funds stay in custody until then.
    pub fn dispute(env: Env, channel_id: BytesN<32>, caller: Address) -> Result<(), Error> {
        // checks
        caller.require_auth();
        let mut channel = get_channel(&env, &channel_id)?;
        if channel.status != ChannelStatus::Open && channel.status != ChannelStatus::Closing {
            return Err(Error::InvalidState);
        }
        require_party(&channel, &caller)?;

        // effects
        channel.status = ChannelStatus::Disputed;
        set_channel(&env, &channel);
        env.events()
            .publish((CHANNELS, symbol_short!("disputed")), channel);
        Ok(())
    }

    pub fn get_channel(env: Env, channel_id: BytesN<32>) -> Result<Channel, Error> {
        get_channel(&env, &channel_id)
    }

    pub fn get_user_channels(env: Env, party: Address) -> Vec<BytesN<32>> {
        env.storage()
            .persistent()
            .get(&DataKey::UserChannels(party))
            .unwrap_or_else(|| Vec::new(&env))
    }

    pub fn get_channel_balance(env: Env, channel_id: BytesN<32>) -> Result<ChannelBalance, Error> {
        let channel = get_channel(&env, &channel_id)?;
        Ok(ChannelBalance {
            balance_a: channel.balance_a,
            balance_b: channel.balance_b,
        })
    }

    pub fn is_channel_open(env: Env, channel_id: BytesN<32>) -> bool {
        match get_channel(&env, &channel_id) {
            Ok(channel) => channel.status == ChannelStatus::Open,
            Err(_) => false,
        }
    }

    pub fn get_remaining_challenge_time(env: Env, channel_id: BytesN<32>) -> Result<u64, Error> {
        let channel = get_channel(&env, &channel_id)?;
        if channel.status != ChannelStatus::Closing {
            return Err(Error::InvalidState);
        }
        Ok(channel.challenge_end.saturating_sub(env.ledger().timestamp()))
    }

    pub fn get_channel_count(env: Env) -> u64 {
        channel_count(&env)
    }

    pub fn get_locked_volume(env: Env) -> i128 {
        locked_volume(&env)
    }

    /// Exact digest off-chain signers must sign for a non-cooperative close
    /// or challenge of the given state.
    pub fn create_state_hash(env: Env, state: ClosingState) -> BytesN<32> {
        encoding::message_hash(&env, &StateMessage::RegularClose(&state))
    }

    /// Exact digest off-chain signers must sign to close cooperatively on
    /// the given state. Distinct domain from `create_state_hash`, so neither
    /// signature can be replayed as the other.
    pub fn create_cooperative_close_hash(env: Env, state: ClosingState) -> BytesN<32> {
        encoding::message_hash(&env, &StateMessage::CooperativeClose(&state))
    }
}

// get_channel returns the channel with the given id or NotFound.
fn get_channel(env: &Env, id: &BytesN<32>) -> Result<Channel, Error> {
    env.storage()
        .persistent()
        .get(&DataKey::Channel(id.clone()))
        .ok_or(Error::NotFound)
}

// set_channel writes the channel record and keeps its storage entry alive.
fn set_channel(env: &Env, channel: &Channel) {
    let key = DataKey::Channel(channel.channel_id.clone());
    env.storage().persistent().set(&key, channel);
    env.storage()
        .persistent()
        .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND);
}

// append_user_channel adds the id to the party's directory list. The list is
// append-only; closed channels stay listed and callers check status.
fn append_user_channel(env: &Env, party: &Address, id: &BytesN<32>) {
    let key = DataKey::UserChannels(party.clone());
    let mut list: Vec<BytesN<32>> = env
        .storage()
        .persistent()
        .get(&key)
        .unwrap_or_else(|| Vec::new(env));
    list.push_back(id.clone());
    env.storage().persistent().set(&key, &list);
    env.storage()
        .persistent()
        .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND);
}

fn channel_count(env: &Env) -> u64 {
    env.storage()
        .instance()
        .get(&DataKey::ChannelCount)
        .unwrap_or(0)
}

fn set_channel_count(env: &Env, count: u64) {
    env.storage().instance().set(&DataKey::ChannelCount, &count);
}

fn locked_volume(env: &Env) -> i128 {
    env.storage()
        .instance()
        .get(&DataKey::LockedVolume)
        .unwrap_or(0)
}

// add_locked_volume adjusts the total of all custodied channel balances.
// Shares the invocation's serialization, so the counter cannot race.
fn add_locked_volume(env: &Env, delta: i128) {
    env.storage()
        .instance()
        .set(&DataKey::LockedVolume, &(locked_volume(env) + delta));
}

fn derive_channel_id(env: &Env, party_a: &Address, party_b: &Address, sequence: u64) -> BytesN<32> {
    let seed = ChannelSeed {
        party_a: party_a.clone(),
        party_b: party_b.clone(),
        opened_at: env.ledger().timestamp(),
        sequence,
    };
    env.crypto().sha256(&seed.to_xdr(env))
}

fn require_party(channel: &Channel, caller: &Address) -> Result<(), Error> {
    if *caller != channel.party_a.addr && *caller != channel.party_b.addr {
        return Err(Error::Unauthorized);
    }
    Ok(())
}

// accept_signed_state validates a jointly signed state against the channel
// and, on success, adopts its balances and nonce. Conservation is checked on
// every accepted state: the close cannot invent or destroy value.
fn accept_signed_state(
    env: &Env,
    channel: &mut Channel,
    msg: StateMessage,
    sig_a: &BytesN<65>,
    sig_b: &BytesN<65>,
) -> Result<(), Error> {
    let state = msg.state();
    if state.channel_id != channel.channel_id {
        return Err(Error::ChannelIdMismatch);
    }
    if state.balance_a < 0 || state.balance_b < 0 {
        return Err(Error::InvalidBalances);
    }
    if state.balance_a + state.balance_b != channel.deposit_a + channel.deposit_b {
        return Err(Error::InvalidBalances);
    }
    let hash = encoding::message_hash(env, &msg);
    if !ecverify::verify(&hash, sig_a, &channel.party_a.sig_addr) {
        return Err(Error::InvalidSignature);
    }
    if !ecverify::verify(&hash, sig_b, &channel.party_b.sig_addr) {
        return Err(Error::InvalidSignature);
    }
    channel.balance_a = state.balance_a;
    channel.balance_b = state.balance_b;
    channel.nonce = state.nonce;
    channel.latest_state_hash = hash;
    Ok(())
}

// distribute pays out the final balances. Only reachable through the one-way
// transition into Closed, after all state has been committed.
fn distribute(env: &Env, channel: &Channel) -> Result<(), Error> {
    let client = token::Client::new(env, &channel.token);
    let contract = env.current_contract_address();
    if channel.balance_a > 0
        && client
            .try_transfer(&contract, &channel.party_a.addr, &channel.balance_a)
            .is_err()
    {
        return Err(Error::TransferFailure);
    }
    if channel.balance_b > 0
        && client
            .try_transfer(&contract, &channel.party_b.addr, &channel.balance_b)
            .is_err()
    {
        return Err(Error::TransferFailure);
    }
    Ok(())
}
