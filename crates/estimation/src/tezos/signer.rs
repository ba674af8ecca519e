//! Public-key-only signer used while estimating.

/// Errors of a [`TezosSigner`].
#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    /// The signer cannot produce signatures.
    #[error("signer for {0} holds no secret key")]
    ReadOnly(String),
    /// A key or address is malformed.
    #[error("invalid {what}: {value:?}")]
    InvalidKey {
        /// What was being parsed.
        what: &'static str,
        /// The offending value.
        value: String,
    },
}

/// The signer capabilities needed to build operations.
pub trait TezosSigner: Send + Sync {
    /// Address of the signer.
    fn public_key_hash(&self) -> &str;

    /// Base58 encoded public key, used by reveals.
    fn public_key(&self) -> &str;

    /// Signs forged operation bytes.
    fn sign(&self, forged: &[u8]) -> Result<String, SignerError>;
}

/// A signer that knows only the public key of its account.
///
/// Enough to forge and simulate operations; no secret material ever enters the pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadOnlySigner {
    pkh: String,
    public_key: String,
}

impl ReadOnlySigner {
    /// Creates a signer for an account whose public key is already known.
    pub fn new(pkh: impl Into<String>, public_key: impl Into<String>) -> Result<Self, SignerError> {
        let pkh = pkh.into();
        let public_key = public_key.into();
        if !is_implicit(&pkh) {
            return Err(SignerError::InvalidKey { what: "public key hash", value: pkh });
        }
        if !["edpk", "sppk", "p2pk", "BLpk"].iter().any(|prefix| public_key.starts_with(prefix)) {
            return Err(SignerError::InvalidKey { what: "public key", value: public_key });
        }
        Ok(Self { pkh, public_key })
    }
}

impl TezosSigner for ReadOnlySigner {
    fn public_key_hash(&self) -> &str {
        &self.pkh
    }

    fn public_key(&self) -> &str {
        &self.public_key
    }

    fn sign(&self, _forged: &[u8]) -> Result<String, SignerError> {
        Err(SignerError::ReadOnly(self.pkh.clone()))
    }
}

fn is_implicit(address: &str) -> bool {
    ["tz1", "tz2", "tz3", "tz4"].iter().any(|prefix| address.starts_with(prefix))
}
