//! Chained-IV session cipher.
//!
//! Each device session owns two `SessionCipher`s: one that encrypts
//! outbound messages and one that decrypts inbound ones. Both start from the
//! key and IV sliced out of the session key and then evolve independently.
//!
//! One call to [`SessionCipher::process`] transforms one complete protocol
//! message and finalizes the cipher. The IV is never transmitted: after every
//! successful call, both directions set the next IV to the trailing 16 bytes
//! of the ciphertext they just produced or consumed. The encrypting and
//! decrypting peers therefore stay in lockstep as long as messages are
//! delivered in order. A failed call leaves the IV untouched.

use std::fmt;

use aes::Aes128;
use cbc::cipher::block_padding::{NoPadding, Pkcs7};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use sparkwire_core::CipherSuite;
use zeroize::Zeroize;

use crate::error::CryptoError;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// AES-128 key length.
pub const KEY_LEN: usize = 16;

/// CBC IV length (one AES block).
pub const IV_LEN: usize = 16;

/// Minimum session key length: key followed by the initial IV.
pub const MIN_SESSION_KEY_LEN: usize = KEY_LEN + IV_LEN;

const BLOCK_LEN: usize = 16;

/// Which way a `SessionCipher` transforms messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encrypt => f.write_str("encrypt"),
            Self::Decrypt => f.write_str("decrypt"),
        }
    }
}

/// A single-direction record transform with a self-chaining IV.
pub struct SessionCipher {
    direction: Direction,
    suite: CipherSuite,
    key: [u8; KEY_LEN],
    iv: [u8; IV_LEN],
}

impl fmt::Debug for SessionCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCipher")
            .field("direction", &self.direction)
            .field("suite", &self.suite)
            .field("key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl Drop for SessionCipher {
    fn drop(&mut self) {
        self.key.zeroize();
        self.iv.zeroize();
    }
}

impl SessionCipher {
    pub const fn new(
        direction: Direction,
        suite: CipherSuite,
        key: [u8; KEY_LEN],
        iv: [u8; IV_LEN],
    ) -> Self {
        Self {
            direction,
            suite,
            key,
            iv,
        }
    }

    /// Build the `(encrypt, decrypt)` pair for one session.
    ///
    /// Bytes `[0, 16)` of `session_key` become the key and `[16, 32)` the
    /// initial IV; any further bytes are ignored.
    pub fn pair_from_session_key(
        session_key: &[u8],
        suite: CipherSuite,
    ) -> Result<(Self, Self), CryptoError> {
        if session_key.len() < MIN_SESSION_KEY_LEN {
            return Err(CryptoError::InvalidKeyMaterial(format!(
                "session key must be at least {MIN_SESSION_KEY_LEN} bytes, got {}",
                session_key.len()
            )));
        }

        let mut key = [0u8; KEY_LEN];
        let mut iv = [0u8; IV_LEN];
        key.copy_from_slice(&session_key[..KEY_LEN]);
        iv.copy_from_slice(&session_key[KEY_LEN..MIN_SESSION_KEY_LEN]);

        let pair = (
            Self::new(Direction::Encrypt, suite, key, iv),
            Self::new(Direction::Decrypt, suite, key, iv),
        );
        key.zeroize();
        iv.zeroize();
        Ok(pair)
    }

    pub const fn direction(&self) -> Direction {
        self.direction
    }

    pub const fn suite(&self) -> CipherSuite {
        self.suite
    }

    /// Transform one complete message and advance the chaining IV.
    pub fn process(&mut self, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let result = match self.direction {
            Direction::Encrypt => self.encrypt(message),
            Direction::Decrypt => self.decrypt(message),
        };

        match result {
            Ok((output, next_iv)) => {
                self.iv = next_iv;
                Ok(output)
            }
            Err(reason) => {
                tracing::warn!(direction = %self.direction, suite = %self.suite, %reason, "Session transform failed");
                Err(CryptoError::TransformFailed {
                    direction: self.direction,
                    reason,
                })
            }
        }
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<(Vec<u8>, [u8; IV_LEN]), String> {
        let cipher = Aes128CbcEnc::new(&self.key.into(), &self.iv.into());
        let ciphertext = match self.suite {
            CipherSuite::Aes128Cbc => cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext),
            CipherSuite::Aes128CbcNoPad => {
                check_block_aligned(plaintext.len())?;
                cipher.encrypt_padded_vec_mut::<NoPadding>(plaintext)
            }
        };
        let next_iv = trailing_block(&ciphertext)?;
        Ok((ciphertext, next_iv))
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<(Vec<u8>, [u8; IV_LEN]), String> {
        check_block_aligned(ciphertext.len())?;
        let next_iv = trailing_block(ciphertext)?;

        let cipher = Aes128CbcDec::new(&self.key.into(), &self.iv.into());
        let plaintext = match self.suite {
            CipherSuite::Aes128Cbc => cipher.decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
            CipherSuite::Aes128CbcNoPad => cipher.decrypt_padded_vec_mut::<NoPadding>(ciphertext),
        }
        .map_err(|e| format!("bad padding: {e}"))?;

        Ok((plaintext, next_iv))
    }

    /// Current key and IV (for testing).
    #[cfg(any(test, feature = "test-utils"))]
    pub const fn key_and_iv(&self) -> (&[u8; KEY_LEN], &[u8; IV_LEN]) {
        (&self.key, &self.iv)
    }
}

fn check_block_aligned(len: usize) -> Result<(), String> {
    if len == 0 || len % BLOCK_LEN != 0 {
        return Err(format!(
            "message length {len} is not a non-zero multiple of {BLOCK_LEN}"
        ));
    }
    Ok(())
}

fn trailing_block(ciphertext: &[u8]) -> Result<[u8; IV_LEN], String> {
    let start = ciphertext
        .len()
        .checked_sub(IV_LEN)
        .ok_or_else(|| format!("ciphertext shorter than one block: {}", ciphertext.len()))?;
    let mut iv = [0u8; IV_LEN];
    iv.copy_from_slice(&ciphertext[start..]);
    Ok(iv)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn session_key() -> Vec<u8> {
        (0u8..40).collect()
    }

    fn pair(suite: CipherSuite) -> (SessionCipher, SessionCipher) {
        SessionCipher::pair_from_session_key(&session_key(), suite).unwrap()
    }

    #[test]
    fn pair_starts_from_sliced_key_and_iv() {
        let key = session_key();
        let (enc, dec) = pair(CipherSuite::Aes128Cbc);

        for cipher in [&enc, &dec] {
            let (k, iv) = cipher.key_and_iv();
            assert_eq!(k.as_slice(), &key[..16]);
            assert_eq!(iv.as_slice(), &key[16..32]);
        }
        assert_eq!(enc.direction(), Direction::Encrypt);
        assert_eq!(dec.direction(), Direction::Decrypt);
    }

    #[test]
    fn exactly_32_bytes_is_enough() {
        assert!(SessionCipher::pair_from_session_key(&[7u8; 32], CipherSuite::Aes128Cbc).is_ok());
    }

    #[test]
    fn short_session_key_is_invalid_key_material() {
        let err = SessionCipher::pair_from_session_key(&[7u8; 31], CipherSuite::Aes128Cbc)
            .unwrap_err();
        assert!(matches!(err, CryptoError::InvalidKeyMaterial(_)));
    }

    #[test]
    fn roundtrip_stays_in_sync_across_messages() {
        let (mut enc, mut dec) = pair(CipherSuite::Aes128Cbc);
        let messages: [&[u8]; 4] = [
            b"hello",
            b"",
            b"exactly sixteen!",
            b"a longer message that spans several AES blocks of data",
        ];

        for msg in messages {
            let ct = enc.process(msg).unwrap();
            assert_eq!(ct.len() % 16, 0);
            assert_eq!(dec.process(&ct).unwrap(), msg);
        }
    }

    #[test]
    fn encrypt_chains_iv_from_trailing_ciphertext_block() {
        let (mut enc, _) = pair(CipherSuite::Aes128Cbc);
        let ct = enc.process(b"first message, two blocks long").unwrap();
        assert_eq!(enc.key_and_iv().1.as_slice(), &ct[ct.len() - 16..]);
    }

    #[test]
    fn decrypt_chains_iv_from_trailing_received_block() {
        let (mut enc, mut dec) = pair(CipherSuite::Aes128Cbc);
        let ct = enc.process(b"payload").unwrap();
        dec.process(&ct).unwrap();
        assert_eq!(dec.key_and_iv().1, enc.key_and_iv().1);
    }

    #[test]
    fn identical_messages_encrypt_differently() {
        let (mut enc, _) = pair(CipherSuite::Aes128Cbc);
        let a = enc.process(b"same").unwrap();
        let b = enc.process(b"same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn out_of_order_delivery_breaks_the_chain() {
        let (mut enc, mut dec) = pair(CipherSuite::Aes128Cbc);
        let _first = enc.process(b"first").unwrap();
        let second = enc.process(b"second").unwrap();

        // Skipping a message leaves the receiver on the wrong IV.
        match dec.process(&second) {
            Ok(plain) => assert_ne!(plain, b"second"),
            Err(e) => assert!(matches!(e, CryptoError::TransformFailed { .. })),
        }
    }

    #[test]
    fn malformed_ciphertext_surfaces_transform_error() {
        let (_, mut dec) = pair(CipherSuite::Aes128Cbc);
        let before = *dec.key_and_iv().1;

        for bad in [&[][..], &[1u8; 15][..], &[1u8; 17][..]] {
            let err = dec.process(bad).unwrap_err();
            match err {
                CryptoError::TransformFailed { direction, .. } => {
                    assert_eq!(direction, Direction::Decrypt);
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(dec.key_and_iv().1, &before, "failed calls must not advance the IV");
    }

    #[test]
    fn wrong_key_fails_or_garbles() {
        let (mut enc, _) = pair(CipherSuite::Aes128Cbc);
        let (_, mut other_dec) =
            SessionCipher::pair_from_session_key(&[9u8; 32], CipherSuite::Aes128Cbc).unwrap();

        let ct = enc.process(b"secret data").unwrap();
        match other_dec.process(&ct) {
            Ok(plain) => assert_ne!(plain, b"secret data"),
            Err(e) => assert!(matches!(e, CryptoError::TransformFailed { .. })),
        }
    }

    #[test]
    fn nopad_suite_requires_block_aligned_messages() {
        let (mut enc, mut dec) = pair(CipherSuite::Aes128CbcNoPad);

        let block = [0x42u8; 32];
        let ct = enc.process(&block).unwrap();
        assert_eq!(ct.len(), 32);
        assert_eq!(dec.process(&ct).unwrap(), block);

        assert!(matches!(
            enc.process(b"not aligned"),
            Err(CryptoError::TransformFailed {
                direction: Direction::Encrypt,
                ..
            })
        ));
        assert!(enc.process(b"").is_err());
    }

    #[test]
    fn debug_redacts_key() {
        let (enc, _) = pair(CipherSuite::Aes128Cbc);
        let debug = format!("{enc:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(debug.contains("Encrypt"));
    }
}
