use crate::{Account, PublicKey, Signature};
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use rand::Rng;

/// Ed25519 keypair. Signing only happens for locally generated votes;
/// incoming signatures are checked by the message pipeline before they
/// reach the consensus core.
pub struct PrivateKey {
    signing_key: SigningKey,
}

impl PrivateKey {
    pub fn new() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill(&mut bytes);
        Self {
            signing_key: SigningKey::from_bytes(&bytes),
        }
    }

    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(bytes),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_bytes(self.signing_key.verifying_key().to_bytes())
    }

    pub fn account(&self) -> Account {
        self.public_key().into()
    }

    pub fn sign(&self, data: &[u8]) -> Signature {
        Signature::new(self.signing_key.sign(data).to_bytes())
    }
}

impl Default for PrivateKey {
    fn default() -> Self {
        Self::new()
    }
}

pub fn verify_signature(
    public_key: &PublicKey,
    data: &[u8],
    signature: &Signature,
) -> anyhow::Result<()> {
    let key = VerifyingKey::from_bytes(public_key.as_bytes())
        .map_err(|_| anyhow!("invalid public key"))?;
    let sig = ed25519_dalek::Signature::from_bytes(signature.as_bytes());
    key.verify(data, &sig)
        .map_err(|_| anyhow!("signature verification failed"))
}
