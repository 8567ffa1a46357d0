//! `aes128gcm` content encoding for Web Push payloads (RFC 8188 + RFC 8291).
//!
//! A fresh ephemeral P-256 key and salt are generated per message. The payload
//! is sent as a single record, so it must fit in [`RECORD_SIZE`] together with
//! the padding delimiter and the GCM tag.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes128Gcm, Nonce};
use hkdf::Hkdf;
use p256::PublicKey;
use p256::ecdh::EphemeralSecret;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use sha2::Sha256;

use crate::PushError;

/// Record size advertised in the header.
pub const RECORD_SIZE: u32 = 4096;

const KEY_INFO_PREFIX: &[u8] = b"WebPush: info\0";
const CEK_INFO: &[u8] = b"Content-Encoding: aes128gcm\0";
const NONCE_INFO: &[u8] = b"Content-Encoding: nonce\0";
const TAG_LEN: usize = 16;
const SALT_LEN: usize = 16;
const AUTH_SECRET_LEN: usize = 16;
/// Delimiter marking the last (and only) record.
const LAST_RECORD_DELIMITER: u8 = 0x02;

/// Encrypt `plaintext` for the user agent identified by its `p256dh` public
/// key and `auth` secret. Returns the complete request body.
pub fn encrypt(ua_public: &[u8], auth_secret: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, PushError> {
    if auth_secret.len() != AUTH_SECRET_LEN {
        return Err(PushError::InvalidDestination(format!(
            "auth secret must be {} bytes, got {}",
            AUTH_SECRET_LEN,
            auth_secret.len()
        )));
    }
    if plaintext.len() + 1 + TAG_LEN > RECORD_SIZE as usize {
        return Err(PushError::Encryption(format!(
            "payload of {} bytes does not fit in a single record",
            plaintext.len()
        )));
    }

    let ua_key = PublicKey::from_sec1_bytes(ua_public).map_err(|_| {
        PushError::InvalidDestination("p256dh is not a valid P-256 public key".to_string())
    })?;
    let ua_point = ua_key.to_encoded_point(false);

    let ephemeral = EphemeralSecret::random(&mut OsRng);
    let as_point = ephemeral.public_key().to_encoded_point(false);
    let shared = ephemeral.diffie_hellman(&ua_key);

    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let (cek, nonce) = derive_keys(
        shared.raw_secret_bytes().as_slice(),
        auth_secret,
        ua_point.as_bytes(),
        as_point.as_bytes(),
        &salt,
    )?;

    let mut padded = Vec::with_capacity(plaintext.len() + 1);
    padded.extend_from_slice(plaintext);
    padded.push(LAST_RECORD_DELIMITER);

    let cipher = Aes128Gcm::new_from_slice(&cek)
        .map_err(|e| PushError::Encryption(format!("invalid content key: {}", e)))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), padded.as_slice())
        .map_err(|e| PushError::Encryption(format!("AES-GCM failed: {}", e)))?;

    let key_id = as_point.as_bytes();
    let mut body = Vec::with_capacity(SALT_LEN + 4 + 1 + key_id.len() + ciphertext.len());
    body.extend_from_slice(&salt);
    body.extend_from_slice(&RECORD_SIZE.to_be_bytes());
    body.push(key_id.len() as u8);
    body.extend_from_slice(key_id);
    body.extend_from_slice(&ciphertext);

    Ok(body)
}

/// Derive the content-encryption key and nonce from the ECDH shared secret.
fn derive_keys(
    shared_secret: &[u8],
    auth_secret: &[u8],
    ua_public: &[u8],
    as_public: &[u8],
    salt: &[u8],
) -> Result<([u8; 16], [u8; 12]), PushError> {
    let mut key_info = Vec::with_capacity(KEY_INFO_PREFIX.len() + ua_public.len() + as_public.len());
    key_info.extend_from_slice(KEY_INFO_PREFIX);
    key_info.extend_from_slice(ua_public);
    key_info.extend_from_slice(as_public);

    let mut ikm = [0u8; 32];
    Hkdf::<Sha256>::new(Some(auth_secret), shared_secret)
        .expand(&key_info, &mut ikm)
        .map_err(|e| PushError::Encryption(format!("HKDF (ikm) failed: {}", e)))?;

    let prk = Hkdf::<Sha256>::new(Some(salt), &ikm);
    let mut cek = [0u8; 16];
    prk.expand(CEK_INFO, &mut cek)
        .map_err(|e| PushError::Encryption(format!("HKDF (cek) failed: {}", e)))?;
    let mut nonce = [0u8; 12];
    prk.expand(NONCE_INFO, &mut nonce)
        .map_err(|e| PushError::Encryption(format!("HKDF (nonce) failed: {}", e)))?;

    Ok((cek, nonce))
}
