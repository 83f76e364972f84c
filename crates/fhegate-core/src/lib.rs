//! # fhegate-core: Reference FHE Engine Object Model
//!
//! The engine behind the `fhegate` C boundary: scheme-tagged parameter sets,
//! crypto contexts, key material, plaintexts and ciphertexts for BFV, BGV
//! and CKKS, a binary-FHE (LWE) sub-engine, CKKS/FHEW scheme switching and
//! proxy re-encryption.
//!
//! ## Features
//!
//! - **Scheme-tagged objects**: every plaintext, key and ciphertext remembers
//!   the context it came from; cross-context or cross-scheme use is an error
//! - **Reference-counted handles**: `Clone` on any engine object shares the
//!   payload, the way the boundary expects
//! - **Depth bookkeeping**: levels, noise scale degree and depth budgets are
//!   enforced the way an RNS implementation is bound by them
//! - **Real small-parameter LWE** for the binary-FHE family
//!
//! ## Example: BFV Arithmetic
//!
//! ```rust
//! use fhegate_core::{CryptoContext, ParameterSet, Scheme};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut params = ParameterSet::new(Scheme::Bfv);
//! params.set_plaintext_modulus(65537)?;
//! params.set_multiplicative_depth(2)?;
//! let cc = CryptoContext::new(params)?;
//! cc.enable(0x01 | 0x02 | 0x08)?;
//!
//! let kp = cc.key_gen()?;
//! let a = cc.encrypt(&kp, &cc.make_packed_plaintext(&[1, 2, 3, 4])?)?;
//! let b = cc.encrypt(&kp, &cc.make_packed_plaintext(&[10, 20, 30, 40])?)?;
//! let sum = cc.eval_add(&a, &b)?;
//!
//! let out = cc.decrypt(kp.private_key()?, &sum)?;
//! assert!(out.is_valid);
//! assert_eq!(out.plaintext.packed_values()?, vec![11, 22, 33, 44]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Security
//!
//! **NOT SECURE.** The CKKS/BFV/BGV kernels carry slot values next to a key
//! tag instead of encrypting them; decryption under the wrong key or past
//! the noise budget is reported as an invalid result. Use it to exercise
//! object lifecycles, error paths and serialization, never to protect data.

pub mod binfhe;
pub mod ciphertext;
pub mod context;
pub mod error;
pub mod eval;
pub mod keys;
pub mod params;
pub mod plaintext;
pub mod pre;
pub mod switching;

// Re-exports for convenience
pub use binfhe::{
    BinFheContext, BinFheMethod, BinFheParamSet, BinGate, LweCiphertext, LweCiphertextData,
    LweSecretKey, LweSecretKeyData,
};
pub use ciphertext::{Ciphertext, CiphertextData};
pub use context::{ContextTag, CryptoContext};
pub use error::{EngineError, EngineResult};
pub use eval::{bootstrap::bootstrap_depth, Decrypted, FastRotationPrecomp};
pub use keys::{
    EvalKey, EvalKeyData, EvalKeyKind, KeyPair, KeyTag, PrivateKey, PrivateKeyData, PublicKey,
    PublicKeyData,
};
pub use params::{
    Capabilities, Feature, FeatureSet, KeySwitchTechnique, ParameterSet, ScalingTechnique, Scheme,
    SecretKeyDist, SecurityLevel,
};
pub use plaintext::{Encoding, Plaintext, PlaintextData, SlotValues};
pub use switching::{index_from_one_hot, SchSwchParams};

/// Native word width of the engine's integer arithmetic
pub const NATIVE_INT_BITS: u32 = 64;
