//! Plain LWE encryption over a power-of-two modulus
//!
//! `b = <a, s> + round(m * q / p) + e  (mod q)` with a binary secret and
//! small uniform noise. Everything the gate layer and the scheme-switching
//! bridge do is expressed through [`encrypt_phase`] and [`phase`].

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use zeroize::Zeroizing;

use crate::error::{EngineError, EngineResult};
use crate::keys::KeyTag;

/// Noise bound of a fresh encryption
pub(crate) const NOISE_BOUND: i64 = 4;

pub struct LweSecretKeyData {
    pub tag: KeyTag,
    /// Binary secret vector
    pub secret: Zeroizing<Vec<u8>>,
}

impl fmt::Debug for LweSecretKeyData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LweSecretKeyData")
            .field("tag", &self.tag)
            .field("n", &self.secret.len())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct LweSecretKey(Arc<LweSecretKeyData>);

impl LweSecretKey {
    pub(crate) fn generate(n: u32) -> Self {
        let mut rng = ChaCha20Rng::from_entropy();
        let secret: Vec<u8> = (0..n).map(|_| rng.gen_range(0..=1u8)).collect();
        let tag = KeyTag::derive(&secret);
        LweSecretKey(Arc::new(LweSecretKeyData {
            tag,
            secret: Zeroizing::new(secret),
        }))
    }

    pub fn from_data(data: LweSecretKeyData) -> EngineResult<Self> {
        if data.secret.iter().any(|&s| s > 1) {
            return Err(EngineError::InvalidParameter(
                "LWE secret coefficients must be 0 or 1".into(),
            ));
        }
        if KeyTag::derive(&data.secret) != data.tag {
            return Err(EngineError::InvalidParameter(
                "LWE secret does not match its tag".into(),
            ));
        }
        Ok(LweSecretKey(Arc::new(data)))
    }

    pub fn data(&self) -> &LweSecretKeyData {
        &self.0
    }

    pub fn tag(&self) -> KeyTag {
        self.0.tag
    }

    pub fn dimension(&self) -> usize {
        self.0.secret.len()
    }
}

impl PartialEq for LweSecretKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.tag == other.0.tag
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LweCiphertextData {
    pub key_tag: KeyTag,
    pub a: Vec<u64>,
    pub b: u64,
    /// Ciphertext modulus
    pub q: u64,
    /// Plaintext modulus the message was encoded with
    pub p: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LweCiphertext(Arc<LweCiphertextData>);

impl LweCiphertext {
    pub(crate) fn new(data: LweCiphertextData) -> Self {
        LweCiphertext(Arc::new(data))
    }

    pub fn from_data(data: LweCiphertextData) -> EngineResult<Self> {
        if data.q < 2 || !data.q.is_power_of_two() {
            return Err(EngineError::InvalidParameter(format!(
                "LWE modulus {} must be a power of two",
                data.q
            )));
        }
        if data.p < 2 || data.p > data.q {
            return Err(EngineError::InvalidParameter(format!(
                "LWE plaintext modulus {} outside 2..={}",
                data.p, data.q
            )));
        }
        if data.b >= data.q || data.a.iter().any(|&x| x >= data.q) {
            return Err(EngineError::InvalidParameter(
                "LWE coefficients must be reduced modulo q".into(),
            ));
        }
        Ok(Self::new(data))
    }

    pub fn data(&self) -> &LweCiphertextData {
        &self.0
    }

    pub fn key_tag(&self) -> KeyTag {
        self.0.key_tag
    }

    pub fn modulus(&self) -> u64 {
        self.0.q
    }

    pub fn plaintext_modulus(&self) -> u64 {
        self.0.p
    }

    pub fn dimension(&self) -> usize {
        self.0.a.len()
    }
}

fn inner_product(a: &[u64], s: &[u8], q: u64) -> u64 {
    let mask = u128::from(q - 1);
    a.iter()
        .zip(s.iter())
        .filter(|(_, &bit)| bit == 1)
        .fold(0u128, |acc, (&x, _)| (acc + u128::from(x)) & mask) as u64
}

/// `round(m * q / p) mod q`
pub(crate) fn scale_message(m: u64, q: u64, p: u64) -> u64 {
    let scaled = (u128::from(m) * u128::from(q) + u128::from(p / 2)) / u128::from(p);
    (scaled % u128::from(q)) as u64
}

/// Encrypt a raw phase; `q` must be a power of two
pub(crate) fn encrypt_phase(sk: &LweSecretKey, phase: u64, q: u64, p: u64) -> LweCiphertext {
    let mut rng = ChaCha20Rng::from_entropy();
    let a: Vec<u64> = (0..sk.dimension()).map(|_| rng.gen_range(0..q)).collect();
    let e = rng.gen_range(-NOISE_BOUND..=NOISE_BOUND);
    let mask = q - 1;
    let b = inner_product(&a, &sk.0.secret, q)
        .wrapping_add(phase)
        .wrapping_add(e as u64)
        & mask;
    LweCiphertext::new(LweCiphertextData {
        key_tag: sk.tag(),
        a,
        b,
        q,
        p,
    })
}

pub(crate) fn encrypt(sk: &LweSecretKey, m: u64, p: u64, q: u64) -> LweCiphertext {
    encrypt_phase(sk, scale_message(m, q, p), q, p)
}

/// `b - <a, s> mod q`
pub(crate) fn phase(sk: &LweSecretKey, ct: &LweCiphertext) -> EngineResult<u64> {
    let d = ct.data();
    if d.a.len() != sk.dimension() {
        return Err(EngineError::InvalidParameter(format!(
            "LWE ciphertext of dimension {} used with a key of dimension {}",
            d.a.len(),
            sk.dimension()
        )));
    }
    Ok(d.b.wrapping_sub(inner_product(&d.a, &sk.0.secret, d.q)) & (d.q - 1))
}

/// `round(phase * p / q) mod p`
pub(crate) fn decode(phase: u64, q: u64, p: u64) -> u64 {
    let m = (u128::from(phase) * u128::from(p) + u128::from(q / 2)) / u128::from(q);
    (m % u128::from(p)) as u64
}

pub(crate) fn decrypt(sk: &LweSecretKey, ct: &LweCiphertext, p: u64) -> EngineResult<u64> {
    Ok(decode(phase(sk, ct)?, ct.modulus(), p))
}

/// Map a residue mod `p` to `(-p/2, p/2]`
pub(crate) fn centered(m: u64, p: u64) -> i64 {
    if m > p / 2 {
        m as i64 - p as i64
    } else {
        m as i64
    }
}

/// Negation against `round(q / p)`, i.e. `m -> 1 - m` for bits
pub(crate) fn complement(ct: &LweCiphertext) -> LweCiphertext {
    let d = ct.data();
    let mask = d.q - 1;
    let delta = scale_message(1, d.q, d.p);
    LweCiphertext::new(LweCiphertextData {
        key_tag: d.key_tag,
        a: d.a.iter().map(|&x| x.wrapping_neg() & mask).collect(),
        b: delta.wrapping_sub(d.b) & mask,
        q: d.q,
        p: d.p,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_all_messages() {
        let sk = LweSecretKey::generate(32);
        for p in [2u64, 4, 8, 16] {
            for m in 0..p {
                let ct = encrypt(&sk, m, p, 1024);
                assert_eq!(decrypt(&sk, &ct, p).unwrap(), m);
            }
        }
    }

    #[test]
    fn test_complement_flips_bits() {
        let sk = LweSecretKey::generate(32);
        for m in 0..2 {
            let ct = encrypt(&sk, m, 4, 1024);
            assert_eq!(decrypt(&sk, &complement(&ct), 4).unwrap(), 1 - m);
        }
    }

    #[test]
    fn test_wrong_dimension_rejected() {
        let sk = LweSecretKey::generate(32);
        let other = LweSecretKey::generate(16);
        let ct = encrypt(&sk, 1, 4, 1024);
        assert!(decrypt(&other, &ct, 4).is_err());
    }

    #[test]
    fn test_centered() {
        assert_eq!(centered(3, 4), -1);
        assert_eq!(centered(2, 4), 2);
        assert_eq!(centered(0, 4), 0);
    }

    #[test]
    fn test_from_data_checks_reduction() {
        let sk = LweSecretKey::generate(8);
        let mut data = encrypt(&sk, 1, 4, 1024).data().clone();
        data.b = 1024;
        assert!(LweCiphertext::from_data(data).is_err());
    }
}
