//! Request signature verification
//!
//! Submissions carry an HMAC-SHA256 signature over the canonical request
//! payload, hex-encoded. The engine verifies exactly once per submission,
//! before any book is touched; a failed verification is an ordinary
//! rejection.

use arena_common::AccountId;
use hmac::{Hmac, Mac};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use sha2::Sha256;

use crate::order::OrderRequest;

type HmacSha256 = Hmac<Sha256>;

/// Verifies the signature on a submission
pub trait SignatureVerifier: Send + Sync {
    /// True when the request signature is valid for its account
    fn verify(&self, request: &OrderRequest) -> bool;
}

/// HMAC-SHA256 verifier with per-account secrets
#[derive(Default)]
pub struct HmacVerifier {
    secrets: RwLock<FxHashMap<AccountId, Vec<u8>>>,
}

impl HmacVerifier {
    /// Verifier with no secrets installed
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the signing secret for an account
    pub fn register_secret(&self, account: AccountId, secret: impl Into<Vec<u8>>) {
        self.secrets.write().insert(account, secret.into());
    }

    /// Sign a request the way submitters must
    ///
    /// Returns `None` when no secret is installed for the account.
    #[must_use]
    pub fn sign(&self, request: &OrderRequest) -> Option<String> {
        let secrets = self.secrets.read();
        let secret = secrets.get(&request.account)?;
        let mut mac = HmacSha256::new_from_slice(secret).ok()?;
        mac.update(request.signing_payload().as_bytes());
        Some(hex::encode(mac.finalize().into_bytes()))
    }
}

impl SignatureVerifier for HmacVerifier {
    fn verify(&self, request: &OrderRequest) -> bool {
        let Ok(raw) = hex::decode(&request.signature) else {
            return false;
        };
        let secrets = self.secrets.read();
        let Some(secret) = secrets.get(&request.account) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
            return false;
        };
        mac.update(request.signing_payload().as_bytes());
        // constant-time comparison
        mac.verify_slice(&raw).is_ok()
    }
}

/// Verifier that accepts everything, for demos and tests
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllVerifier;

impl SignatureVerifier for AllowAllVerifier {
    fn verify(&self, _request: &OrderRequest) -> bool {
        true
    }
}
