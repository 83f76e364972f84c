//! Proxy re-encryption
//!
//! A re-encryption key moves ciphertexts from the key that generated it to
//! a target public key without decrypting. Chains are allowed; every hop is
//! counted on the ciphertext.

use tracing::debug;

use crate::ciphertext::{Ciphertext, CiphertextData};
use crate::context::CryptoContext;
use crate::error::{EngineError, EngineResult};
use crate::keys::{EvalKey, EvalKeyKind, PrivateKey, PublicKey};
use crate::params::Feature;

impl CryptoContext {
    pub fn re_key_gen(&self, old: &PrivateKey, new: &PublicKey) -> EngineResult<EvalKey> {
        self.require(Feature::Pre, "ReKeyGen")?;
        self.check_context(old.context(), "source private key")?;
        self.check_context(new.context(), "target public key")?;
        let key = EvalKey::derive(old, EvalKeyKind::ReEncryption { target: new.tag() });
        debug!(from = %old.tag(), to = %new.tag(), "re-encryption key generated");
        Ok(key)
    }

    pub fn re_encrypt(&self, ct: &Ciphertext, key: &EvalKey) -> EngineResult<Ciphertext> {
        self.require(Feature::Pre, "ReEncrypt")?;
        self.check_operand(ct)?;
        self.check_context(key.context(), "re-encryption key")?;
        let EvalKeyKind::ReEncryption { target } = key.kind() else {
            return Err(EngineError::InvalidParameter(format!(
                "ReEncrypt needs a re-encryption key, got {:?}",
                key.kind()
            )));
        };
        if ct.key_tag() != key.source() {
            return Err(EngineError::Fault(format!(
                "ciphertext under key {} cannot be re-encrypted with a key from {}",
                ct.key_tag(),
                key.source()
            )));
        }
        let data = ct.data();
        Ok(Ciphertext::new(CiphertextData {
            key_tag: target,
            hops: data.hops + 1,
            ..data.clone()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ParameterSet, Scheme, SecurityLevel};

    fn pre_context() -> CryptoContext {
        let mut params = ParameterSet::new(Scheme::Bgv);
        params.set_security_level(SecurityLevel::NotSet);
        params.set_batch_size(8).unwrap();
        let cc = CryptoContext::new(params).unwrap();
        cc.enable(0x01 | 0x02 | 0x04 | 0x08).unwrap();
        cc
    }

    #[test]
    fn test_re_encryption_chain() {
        let cc = pre_context();
        let alice = cc.key_gen().unwrap();
        let bob = cc.key_gen().unwrap();
        let carol = cc.key_gen().unwrap();
        let ct = cc
            .encrypt(&alice, &cc.make_packed_plaintext(&[5, 6, 7]).unwrap())
            .unwrap();

        let a_to_b = cc
            .re_key_gen(alice.private_key().unwrap(), bob.public_key().unwrap())
            .unwrap();
        let b_to_c = cc
            .re_key_gen(bob.private_key().unwrap(), carol.public_key().unwrap())
            .unwrap();
        let for_bob = cc.re_encrypt(&ct, &a_to_b).unwrap();
        let for_carol = cc.re_encrypt(&for_bob, &b_to_c).unwrap();
        assert_eq!(for_carol.hops(), 2);

        let dec = cc.decrypt(carol.private_key().unwrap(), &for_carol).unwrap();
        assert!(dec.is_valid);
        assert_eq!(dec.plaintext.packed_values().unwrap(), vec![5, 6, 7]);
        assert!(!cc.decrypt(alice.private_key().unwrap(), &for_carol).unwrap().is_valid);
    }

    #[test]
    fn test_wrong_source_is_fault() {
        let cc = pre_context();
        let alice = cc.key_gen().unwrap();
        let bob = cc.key_gen().unwrap();
        let ct = cc
            .encrypt(&bob, &cc.make_packed_plaintext(&[1]).unwrap())
            .unwrap();
        let a_to_b = cc
            .re_key_gen(alice.private_key().unwrap(), bob.public_key().unwrap())
            .unwrap();
        assert!(matches!(cc.re_encrypt(&ct, &a_to_b), Err(EngineError::Fault(_))));
    }

    #[test]
    fn test_requires_pre_feature() {
        let mut params = ParameterSet::new(Scheme::Bfv);
        params.set_security_level(SecurityLevel::NotSet);
        params.set_batch_size(8).unwrap();
        let cc = CryptoContext::new(params).unwrap();
        cc.enable(0x01).unwrap();
        let kp = cc.key_gen().unwrap();
        assert!(matches!(
            cc.re_key_gen(kp.private_key().unwrap(), kp.public_key().unwrap()),
            Err(EngineError::Precondition(_))
        ));
    }
}
