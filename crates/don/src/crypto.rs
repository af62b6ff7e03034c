//! Client half of the DON secret envelope: ephemeral ECDH against the DON
//! threshold key, SHA-256 key derivation, AES-256-GCM sealing. The DON side
//! of the scheme belongs to the platform.

use aes_gcm::{aead::Aead, Aes256Gcm, KeyInit, Nonce};
use k256::{ecdh::diffie_hellman, elliptic_curve::sec1::ToEncodedPoint, PublicKey, SecretKey};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

use crate::secrets::Error;

/// Uncompressed SEC1 point length.
const POINT_LEN: usize = 65;
const NONCE_LEN: usize = 12;

/// Seal `plaintext` to the DON public key.
///
/// Envelope layout: `ephemeral_pubkey(65) || nonce(12) || ciphertext`.
pub(crate) fn seal(don_key: &PublicKey, plaintext: &[u8]) -> Result<Vec<u8>, Error> {
    let ephemeral = SecretKey::random(&mut OsRng);
    let shared = diffie_hellman(ephemeral.to_nonzero_scalar(), don_key.as_affine());
    let key = Sha256::digest(shared.raw_secret_bytes());

    let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| Error::Seal)?;
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    let ciphertext =
        cipher.encrypt(Nonce::from_slice(&nonce), plaintext).map_err(|_| Error::Seal)?;

    let point = ephemeral.public_key().to_encoded_point(false);
    let mut sealed = Vec::with_capacity(POINT_LEN + NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(point.as_bytes());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);

    Ok(sealed)
}

/// Inverse of [`seal`], for round-trip tests.
#[cfg(test)]
pub(crate) fn open(don_secret: &SecretKey, sealed: &[u8]) -> Result<Vec<u8>, Error> {
    if sealed.len() < POINT_LEN + NONCE_LEN {
        return Err(Error::Seal);
    }

    let ephemeral =
        PublicKey::from_sec1_bytes(&sealed[..POINT_LEN]).map_err(|_| Error::Seal)?;
    let shared = diffie_hellman(don_secret.to_nonzero_scalar(), ephemeral.as_affine());
    let key = Sha256::digest(shared.raw_secret_bytes());

    let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| Error::Seal)?;
    let nonce = &sealed[POINT_LEN..POINT_LEN + NONCE_LEN];
    cipher.decrypt(Nonce::from_slice(nonce), &sealed[POINT_LEN + NONCE_LEN..]).map_err(|_| Error::Seal)
}
