//! HMAC integrity tags over transformed payloads.
//!
//! Tags are keyed with the whole session key, not just the 16-byte AES
//! portion, and are never stored.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;
use sparkwire_core::HmacAlgorithm;
use subtle::ConstantTimeEq;

use crate::error::CryptoError;

type HmacSha1 = Hmac<Sha1>;
type HmacSha256 = Hmac<Sha256>;

/// Compute the integrity tag of `ciphertext` under `session_key`.
pub fn compute_tag(
    algorithm: HmacAlgorithm,
    ciphertext: &[u8],
    session_key: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let invalid = |e: hmac::digest::InvalidLength| CryptoError::InvalidKeyMaterial(e.to_string());
    let tag = match algorithm {
        HmacAlgorithm::Sha1 => {
            let mut mac = HmacSha1::new_from_slice(session_key).map_err(invalid)?;
            mac.update(ciphertext);
            mac.finalize().into_bytes().to_vec()
        }
        HmacAlgorithm::Sha256 => {
            let mut mac = HmacSha256::new_from_slice(session_key).map_err(invalid)?;
            mac.update(ciphertext);
            mac.finalize().into_bytes().to_vec()
        }
    };
    Ok(tag)
}

/// Check `tag` against a freshly computed one in constant time.
pub fn verify_tag(
    algorithm: HmacAlgorithm,
    ciphertext: &[u8],
    session_key: &[u8],
    tag: &[u8],
) -> bool {
    compute_tag(algorithm, ciphertext, session_key)
        .is_ok_and(|expected| bool::from(expected.as_slice().ct_eq(tag)))
}
