//! Key material
//!
//! Keys are reference counted: cloning a [`PublicKey`] or [`PrivateKey`]
//! shares the underlying material. A [`KeyPair`] aggregates zero or one of
//! each and can be filled in field by field.
//!
//! NOT SECURE: the reference engine derives public and evaluation material
//! from the secret seed with BLAKE3 and never hides slot values. It models
//! ownership and tagging, not hardness.

use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use zeroize::Zeroizing;

use crate::context::ContextTag;
use crate::error::{EngineError, EngineResult};

const SEED_LEN: usize = 32;

/// Identifier shared by a secret key and everything derived from it
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyTag(pub [u8; 16]);

impl KeyTag {
    pub fn from_slice(bytes: &[u8]) -> EngineResult<Self> {
        let arr: [u8; 16] = bytes.try_into().map_err(|_| {
            EngineError::InvalidParameter(format!("key tag must be 16 bytes, got {}", bytes.len()))
        })?;
        Ok(KeyTag(arr))
    }

    pub(crate) fn derive(seed: &[u8]) -> Self {
        let digest = blake3::derive_key("fhegate 2024 key tag", seed);
        let mut tag = [0u8; 16];
        tag.copy_from_slice(&digest[..16]);
        KeyTag(tag)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for KeyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for KeyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyTag({self})")
    }
}

impl FromStr for KeyTag {
    type Err = EngineError;

    fn from_str(s: &str) -> EngineResult<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| EngineError::InvalidParameter(format!("key tag {s:?}: {e}")))?;
        KeyTag::from_slice(&bytes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyData {
    pub context: ContextTag,
    pub tag: KeyTag,
    pub material: Vec<u8>,
}

/// Public encryption key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey(Arc<PublicKeyData>);

impl PublicKey {
    pub fn from_data(data: PublicKeyData) -> EngineResult<Self> {
        if data.material.len() != SEED_LEN {
            return Err(EngineError::InvalidParameter(format!(
                "public key material must be {SEED_LEN} bytes, got {}",
                data.material.len()
            )));
        }
        Ok(PublicKey(Arc::new(data)))
    }

    pub fn data(&self) -> &PublicKeyData {
        &self.0
    }

    pub fn tag(&self) -> KeyTag {
        self.0.tag
    }

    pub fn context(&self) -> ContextTag {
        self.0.context
    }
}

pub struct PrivateKeyData {
    pub context: ContextTag,
    pub tag: KeyTag,
    pub material: Zeroizing<Vec<u8>>,
}

impl fmt::Debug for PrivateKeyData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKeyData")
            .field("context", &self.context)
            .field("tag", &self.tag)
            .finish_non_exhaustive()
    }
}

/// Secret decryption key
#[derive(Debug, Clone)]
pub struct PrivateKey(Arc<PrivateKeyData>);

impl PrivateKey {
    pub(crate) fn generate(context: ContextTag) -> Self {
        let mut seed = Zeroizing::new(vec![0u8; SEED_LEN]);
        OsRng.fill_bytes(&mut seed);
        let tag = KeyTag::derive(&seed);
        PrivateKey(Arc::new(PrivateKeyData {
            context,
            tag,
            material: seed,
        }))
    }

    pub fn from_data(data: PrivateKeyData) -> EngineResult<Self> {
        if data.material.len() != SEED_LEN {
            return Err(EngineError::InvalidParameter(format!(
                "private key material must be {SEED_LEN} bytes, got {}",
                data.material.len()
            )));
        }
        if KeyTag::derive(&data.material) != data.tag {
            return Err(EngineError::InvalidParameter(
                "private key tag does not match its material".into(),
            ));
        }
        Ok(PrivateKey(Arc::new(data)))
    }

    pub fn data(&self) -> &PrivateKeyData {
        &self.0
    }

    pub fn tag(&self) -> KeyTag {
        self.0.tag
    }

    pub fn context(&self) -> ContextTag {
        self.0.context
    }

    /// Public key matching this secret
    pub fn public_key(&self) -> PublicKey {
        let material = blake3::derive_key("fhegate 2024 public key", &self.0.material).to_vec();
        PublicKey(Arc::new(PublicKeyData {
            context: self.0.context,
            tag: self.0.tag,
            material,
        }))
    }

    /// Deterministic evaluation-key material bound to this secret
    pub(crate) fn derive_material(&self, label: &[u8]) -> Vec<u8> {
        let key = blake3::derive_key("fhegate 2024 evaluation key", &self.0.material);
        blake3::keyed_hash(&key, label).as_bytes().to_vec()
    }
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.context == other.0.context
            && self.0.tag == other.0.tag
            && *self.0.material == *other.0.material
    }
}

/// Aggregate of an optional public key and an optional private key
#[derive(Debug, Clone, Default)]
pub struct KeyPair {
    pub public: Option<PublicKey>,
    pub secret: Option<PrivateKey>,
}

impl KeyPair {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(public: PublicKey, secret: PrivateKey) -> Self {
        Self {
            public: Some(public),
            secret: Some(secret),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.public.is_some() && self.secret.is_some()
    }

    pub fn public_key(&self) -> EngineResult<&PublicKey> {
        self.public
            .as_ref()
            .ok_or_else(|| EngineError::MissingKey("key pair has no public key".into()))
    }

    pub fn private_key(&self) -> EngineResult<&PrivateKey> {
        self.secret
            .as_ref()
            .ok_or_else(|| EngineError::MissingKey("key pair has no private key".into()))
    }
}

/// What an evaluation key enables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvalKeyKind {
    /// Relinearization after ciphertext multiplication
    Relinearization,
    /// Slot rotation by a fixed index
    Automorphism { index: i32 },
    /// Proxy re-encryption towards another key
    ReEncryption { target: KeyTag },
}

impl EvalKeyKind {
    fn label(&self) -> Vec<u8> {
        match self {
            EvalKeyKind::Relinearization => b"relin".to_vec(),
            EvalKeyKind::Automorphism { index } => {
                let mut l = b"auto:".to_vec();
                l.extend(index.to_le_bytes());
                l
            }
            EvalKeyKind::ReEncryption { target } => {
                let mut l = b"pre:".to_vec();
                l.extend(target.0);
                l
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalKeyData {
    pub context: ContextTag,
    pub source: KeyTag,
    pub kind: EvalKeyKind,
    pub material: Vec<u8>,
}

/// Auxiliary key material for key switching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalKey(Arc<EvalKeyData>);

impl EvalKey {
    pub(crate) fn derive(secret: &PrivateKey, kind: EvalKeyKind) -> Self {
        EvalKey(Arc::new(EvalKeyData {
            context: secret.context(),
            source: secret.tag(),
            kind,
            material: secret.derive_material(&kind.label()),
        }))
    }

    pub fn from_data(data: EvalKeyData) -> EngineResult<Self> {
        if data.material.is_empty() {
            return Err(EngineError::InvalidParameter(
                "evaluation key has no material".into(),
            ));
        }
        Ok(EvalKey(Arc::new(data)))
    }

    pub fn data(&self) -> &EvalKeyData {
        &self.0
    }

    pub fn kind(&self) -> EvalKeyKind {
        self.0.kind
    }

    pub fn source(&self) -> KeyTag {
        self.0.source
    }

    pub fn context(&self) -> ContextTag {
        self.0.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ContextTag {
        ContextTag([7u8; 16])
    }

    #[test]
    fn test_public_key_shares_tag() {
        let sk = PrivateKey::generate(ctx());
        let pk = sk.public_key();
        assert_eq!(pk.tag(), sk.tag());
        assert_ne!(pk.data().material, *sk.data().material);
    }

    #[test]
    fn test_tags_are_unique() {
        let a = PrivateKey::generate(ctx());
        let b = PrivateKey::generate(ctx());
        assert_ne!(a.tag(), b.tag());
    }

    #[test]
    fn test_tag_hex_roundtrip() {
        let sk = PrivateKey::generate(ctx());
        let text = sk.tag().to_string();
        assert_eq!(text.len(), 32);
        assert_eq!(text.parse::<KeyTag>().unwrap(), sk.tag());
        assert!("zz".parse::<KeyTag>().is_err());
    }

    #[test]
    fn test_private_key_rejects_forged_tag() {
        let sk = PrivateKey::generate(ctx());
        let forged = PrivateKeyData {
            context: ctx(),
            tag: KeyTag([0u8; 16]),
            material: sk.data().material.clone(),
        };
        assert!(PrivateKey::from_data(forged).is_err());
    }

    #[test]
    fn test_eval_key_depends_on_kind() {
        let sk = PrivateKey::generate(ctx());
        let relin = EvalKey::derive(&sk, EvalKeyKind::Relinearization);
        let rot = EvalKey::derive(&sk, EvalKeyKind::Automorphism { index: 1 });
        assert_ne!(relin.data().material, rot.data().material);
        assert_eq!(relin.source(), sk.tag());
    }

    #[test]
    fn test_keypair_components() {
        let mut kp = KeyPair::empty();
        assert!(kp.public_key().is_err());
        let sk = PrivateKey::generate(ctx());
        kp.public = Some(sk.public_key());
        assert!(!kp.is_complete());
        kp.secret = Some(sk);
        assert!(kp.is_complete());
    }
}
