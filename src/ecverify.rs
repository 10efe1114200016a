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

use alloy_primitives::keccak256;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use soroban_sdk::BytesN;

// Wrapping an application hash in the conventional signed-message envelope
// keeps channel-state signatures from ever being valid over raw transaction
// hashes in other contexts.
const SIGNED_MSG_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

/// Checks that `sig` is a recoverable secp256k1 signature by `signer` over
/// the signed-message wrapping of `hash`. Malformed signatures yield `false`
/// rather than a trap, so callers can surface a uniform invalid-signature
/// error.
pub fn verify(hash: &BytesN<32>, sig: &BytesN<65>, signer: &BytesN<20>) -> bool {
    match recover(&hash.to_array(), &sig.to_array()) {
        Some(addr) => addr == signer.to_array(),
        None => false,
    }
}

// recover extracts the 20-byte signer identity from a 65-byte r || s || v
// signature, or None if any component fails to parse.
fn recover(hash: &[u8; 32], sig: &[u8; 65]) -> Option<[u8; 20]> {
    let v = sig[64];
    if v != 27 && v != 28 {
        return None;
    }
    let rec_id = RecoveryId::from_byte(v - 27)?;
    let signature = Signature::from_slice(&sig[..64]).ok()?;
    let digest = signed_message_digest(hash);
    let pubkey = VerifyingKey::recover_from_prehash(&digest, &signature, rec_id).ok()?;
    Some(signer_address(&pubkey))
}

fn signed_message_digest(hash: &[u8; 32]) -> [u8; 32] {
    let mut buf = [0u8; 60];
    buf[..28].copy_from_slice(SIGNED_MSG_PREFIX);
    buf[28..].copy_from_slice(hash);
    keccak256(buf).0
}

// signer_address derives the identity from the uncompressed public key:
// keccak of the 64-byte point (encoding byte stripped), low 20 bytes.
fn signer_address(key: &VerifyingKey) -> [u8; 20] {
    let point = key.to_encoded_point(false);
    let digest = keccak256(&point.as_bytes()[1..]);
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&digest.0[12..]);
    addr
}
