//! # Recoverable Signatures
//!
//! Transactions and blocks never carry public keys. They carry `(r, s, v)`
//! triples, and verifiers recover the signer's key from the signature and
//! compare it against the keys they expect. That makes `v`, the recovery id,
//! load-bearing: a signature with the wrong `v` recovers somebody else.
//!
//! [`sign_hash`] therefore doesn't trust anyone's word on `v`. It produces a
//! deterministic RFC 6979 signature, then tries each recovery id in `0..4`
//! until recovery yields the signer's own public key. If no id works for a
//! nonce, it perturbs the nonce seed (set the lowest unset bit) and signs
//! again, at most [`MAX_SIGN_ATTEMPTS`] times. Running out of attempts, or of
//! unset seed bits, is a hard error.
//!
//! [`recover_public_key`] is the inverse. Callers doing speculative recovery
//! (multisig verification) must treat its errors as "not a match".

use k256::ecdsa::signature::hazmat::{PrehashSigner, RandomizedPrehashSigner};
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, VerifyingKey};
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tracing::debug;

use super::keys::{PrivateKey, PublicKey};
use crate::codec::{CodecError, Reader, Writer};
use crate::config::MAX_SIGN_ATTEMPTS;

/// Encoded size of a signature: r(32) ‖ s(32) ‖ v(1).
pub const SIGNATURE_WIRE_LEN: usize = 65;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignError {
    #[error("malformed signature: {reason}")]
    Malformed { reason: String },

    #[error("recovery id {0} is out of range")]
    InvalidRecoveryId(u8),

    #[error("public key recovery failed")]
    RecoveryFailed,

    #[error("signing primitive failed: {reason}")]
    Signing { reason: String },

    #[error("no recovery id reproduces the signer's key after {attempts} nonce attempts")]
    RecoveryIdNotFound { attempts: u32 },
}

/// An ECDSA signature plus recovery id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature {
    r: [u8; 32],
    s: [u8; 32],
    v: u8,
}

impl Signature {
    pub fn new(r: [u8; 32], s: [u8; 32], v: u8) -> Self {
        Self { r, s, v }
    }

    /// Builds a signature from untrusted slices. `r` and `s` must each be
    /// exactly 32 bytes.
    pub fn from_parts(r: &[u8], s: &[u8], v: u8) -> Result<Self, SignError> {
        let r: [u8; 32] = r.try_into().map_err(|_| SignError::Malformed {
            reason: format!("r must be 32 bytes, got {}", r.len()),
        })?;
        let s: [u8; 32] = s.try_into().map_err(|_| SignError::Malformed {
            reason: format!("s must be 32 bytes, got {}", s.len()),
        })?;
        Ok(Self { r, s, v })
    }

    pub fn r(&self) -> &[u8; 32] {
        &self.r
    }

    pub fn s(&self) -> &[u8; 32] {
        &self.s
    }

    pub fn v(&self) -> u8 {
        self.v
    }

    pub fn to_bytes(&self) -> [u8; SIGNATURE_WIRE_LEN] {
        let mut out = [0u8; SIGNATURE_WIRE_LEN];
        out[..32].copy_from_slice(&self.r);
        out[32..64].copy_from_slice(&self.s);
        out[64] = self.v;
        out
    }

    pub(crate) fn write(&self, w: &mut Writer) {
        w.put_bytes(&self.r);
        w.put_bytes(&self.s);
        w.put_u8(self.v);
    }

    pub(crate) fn read(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            r: r.read_array()?,
            s: r.read_array()?,
            v: r.read_u8()?,
        })
    }

    fn from_ecdsa(sig: &EcdsaSignature, v: u8) -> Self {
        let bytes = sig.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);
        Self { r, s, v }
    }

    fn to_ecdsa(&self) -> Result<EcdsaSignature, SignError> {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&self.r);
        bytes[32..].copy_from_slice(&self.s);
        EcdsaSignature::from_slice(&bytes).map_err(|_| SignError::Malformed {
            reason: "r or s is not a valid non-zero scalar".to_string(),
        })
    }
}

/// Signs a 32-byte message hash and attaches the recovery id that maps the
/// signature back to `key`'s public key.
pub fn sign_hash(key: &PrivateKey, msg_hash: &[u8; 32]) -> Result<Signature, SignError> {
    let expected = key.public_key();
    let mut seed = [0u8; 32];
    sign_with_retries(MAX_SIGN_ATTEMPTS, |attempt| {
        sign_attempt(key, msg_hash, &expected, &mut seed, attempt)
    })
}

/// One pass of the nonce loop. Attempt 0 uses the deterministic nonce; later
/// attempts draw it from `seed`, perturbed first. A saturated seed ends the
/// loop early since every further attempt would repeat the last nonce.
fn sign_attempt(
    key: &PrivateKey,
    msg_hash: &[u8; 32],
    expected: &PublicKey,
    seed: &mut [u8; 32],
    attempt: u32,
) -> Result<Option<Signature>, SignError> {
    let signing_key = key.signing_key();
    let signed = if attempt == 0 {
        PrehashSigner::<EcdsaSignature>::sign_prehash(signing_key, msg_hash)
    } else {
        if !perturb_seed(seed) {
            return Err(SignError::RecoveryIdNotFound { attempts: attempt });
        }
        let mut rng = StdRng::from_seed(*seed);
        RandomizedPrehashSigner::<EcdsaSignature>::sign_prehash_with_rng(signing_key, &mut rng, msg_hash)
    };
    let sig = signed.map_err(|e| SignError::Signing {
        reason: e.to_string(),
    })?;
    let sig = sig.normalize_s().unwrap_or(sig);
    Ok(find_recovery_id(&sig, msg_hash, expected))
}

/// Recovers the compressed public key that produced `signature` over
/// `msg_hash`, using recovery id `v` (which may differ from `signature.v()`).
pub fn recover_public_key(
    signature: &Signature,
    msg_hash: &[u8; 32],
    v: u8,
) -> Result<PublicKey, SignError> {
    let recovery_id = RecoveryId::from_byte(v).ok_or(SignError::InvalidRecoveryId(v))?;
    let sig = signature.to_ecdsa()?;
    let key = VerifyingKey::recover_from_prehash(msg_hash, &sig, recovery_id)
        .map_err(|_| SignError::RecoveryFailed)?;
    Ok(PublicKey::from_verifying_key(&key))
}

fn find_recovery_id(
    sig: &EcdsaSignature,
    msg_hash: &[u8; 32],
    expected: &PublicKey,
) -> Option<Signature> {
    (0u8..4).find_map(|v| {
        let recovery_id = RecoveryId::from_byte(v)?;
        let recovered = VerifyingKey::recover_from_prehash(msg_hash, sig, recovery_id).ok()?;
        (PublicKey::from_verifying_key(&recovered) == *expected).then(|| Signature::from_ecdsa(sig, v))
    })
}

/// Drives the bounded nonce loop. `attempt` receives the zero-based attempt
/// number and returns `Ok(None)` when no recovery id matched.
fn sign_with_retries<F>(max_attempts: u32, mut attempt: F) -> Result<Signature, SignError>
where
    F: FnMut(u32) -> Result<Option<Signature>, SignError>,
{
    for n in 0..max_attempts {
        if let Some(signature) = attempt(n)? {
            if n > 0 {
                debug!(attempts = n + 1, "recovery id found after nonce perturbation");
            }
            return Ok(signature);
        }
        debug!(attempt = n, "no recovery id matched, perturbing nonce seed");
    }
    Err(SignError::RecoveryIdNotFound {
        attempts: max_attempts,
    })
}

/// Sets the lowest-order unset bit of a big-endian 256-bit seed. Returns
/// `false` if every bit was already set.
fn perturb_seed(seed: &mut [u8; 32]) -> bool {
    for byte in seed.iter_mut().rev() {
        if *byte != 0xff {
            *byte |= (!*byte) & byte.wrapping_add(1);
            return true;
        }
    }
    false
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn msg() -> [u8; 32] {
        crate::crypto::hash::hash256(b"keel signature test")
    }

    #[test]
    fn test_sign_and_recover() {
        let key = PrivateKey::generate();
        let sig = sign_hash(&key, &msg()).unwrap();
        assert!(sig.v() < 4);
        let recovered = recover_public_key(&sig, &msg(), sig.v()).unwrap();
        assert_eq!(recovered, key.public_key());
    }

    #[test]
    fn test_signing_is_deterministic() {
        let key = PrivateKey::generate();
        assert_eq!(sign_hash(&key, &msg()).unwrap(), sign_hash(&key, &msg()).unwrap());
    }

    #[test]
    fn wrong_recovery_id_does_not_recover_signer() {
        let key = PrivateKey::generate();
        let sig = sign_hash(&key, &msg()).unwrap();
        let other_v = sig.v() ^ 1;
        match recover_public_key(&sig, &msg(), other_v) {
            Ok(recovered) => assert_ne!(recovered, key.public_key()),
            Err(e) => assert_eq!(e, SignError::RecoveryFailed),
        }
    }

    #[test]
    fn wrong_message_does_not_recover_signer() {
        let key = PrivateKey::generate();
        let sig = sign_hash(&key, &msg()).unwrap();
        let other = crate::crypto::hash::hash256(b"something else");
        if let Ok(recovered) = recover_public_key(&sig, &other, sig.v()) {
            assert_ne!(recovered, key.public_key());
        }
    }

    #[test]
    fn recovery_id_out_of_range() {
        let key = PrivateKey::generate();
        let sig = sign_hash(&key, &msg()).unwrap();
        assert_eq!(
            recover_public_key(&sig, &msg(), 4),
            Err(SignError::InvalidRecoveryId(4))
        );
    }

    #[test]
    fn zero_scalars_are_malformed() {
        let sig = Signature::new([0u8; 32], [0u8; 32], 0);
        assert!(matches!(
            recover_public_key(&sig, &msg(), 0),
            Err(SignError::Malformed { .. })
        ));
    }

    #[test]
    fn from_parts_enforces_lengths() {
        assert!(Signature::from_parts(&[1u8; 32], &[2u8; 32], 1).is_ok());
        assert!(Signature::from_parts(&[1u8; 31], &[2u8; 32], 1).is_err());
        assert!(Signature::from_parts(&[1u8; 32], &[2u8; 33], 1).is_err());
    }

    #[test]
    fn wire_roundtrip() {
        let sig = Signature::new([7u8; 32], [9u8; 32], 1);
        let mut w = Writer::new();
        sig.write(&mut w);
        let bytes = w.finish();
        assert_eq!(bytes.len(), SIGNATURE_WIRE_LEN);
        assert_eq!(bytes, sig.to_bytes().to_vec());
        let mut r = Reader::new(&bytes);
        assert_eq!(Signature::read(&mut r).unwrap(), sig);
    }

    #[test]
    fn perturb_sets_lowest_unset_bit() {
        let mut seed = [0u8; 32];
        assert!(perturb_seed(&mut seed));
        assert_eq!(seed[31], 0b0000_0001);
        assert!(perturb_seed(&mut seed));
        assert_eq!(seed[31], 0b0000_0011);

        let mut seed = [0u8; 32];
        seed[31] = 0xff;
        assert!(perturb_seed(&mut seed));
        assert_eq!(seed[30], 0x01);
        assert_eq!(seed[31], 0xff);

        let mut full = [0xffu8; 32];
        assert!(!perturb_seed(&mut full));
    }

    #[test]
    fn saturated_seed_stops_retrying() {
        let key = PrivateKey::generate();
        let expected = key.public_key();
        let digest = [3u8; 32];
        let mut full = [0xffu8; 32];
        assert_eq!(
            sign_attempt(&key, &digest, &expected, &mut full, 4),
            Err(SignError::RecoveryIdNotFound { attempts: 4 })
        );

        let mut seed = [0u8; 32];
        let sig = sign_attempt(&key, &digest, &expected, &mut seed, 1).unwrap().unwrap();
        assert_eq!(seed[31], 0x01);
        assert_eq!(recover_public_key(&sig, &digest, sig.v()).unwrap(), expected);
    }

    #[test]
    fn retry_loop_gives_up_after_cap() {
        let mut calls = 0;
        let result = sign_with_retries(MAX_SIGN_ATTEMPTS, |_| {
            calls += 1;
            Ok(None)
        });
        assert_eq!(calls, MAX_SIGN_ATTEMPTS);
        assert_eq!(
            result,
            Err(SignError::RecoveryIdNotFound {
                attempts: MAX_SIGN_ATTEMPTS
            })
        );
    }

    #[test]
    fn retry_loop_returns_first_success() {
        let wanted = Signature::new([1u8; 32], [2u8; 32], 3);
        let result = sign_with_retries(MAX_SIGN_ATTEMPTS, |n| Ok((n == 2).then_some(wanted)));
        assert_eq!(result, Ok(wanted));
    }
}
