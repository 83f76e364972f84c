//! Encryption, decryption and slot-wise arithmetic
//!
//! The reference kernels compute on the slot vectors directly and track
//! the bookkeeping a real RNS implementation is bound by: multiplicative
//! depth for BFV/BGV, level and noise scale degree for CKKS.

pub mod bootstrap;
mod poly;
mod rotate;

pub use rotate::FastRotationPrecomp;

use num_complex::Complex64;
use rand::Rng;
use tracing::trace;

use crate::ciphertext::{Ciphertext, CiphertextData};
use crate::context::{centered_mod, ContextTag, CryptoContext};
use crate::error::{EngineError, EngineResult};
use crate::keys::{KeyPair, KeyTag, PrivateKey, PublicKey};
use crate::params::{Feature, ParameterSet, ScalingTechnique, Scheme};
use crate::plaintext::{Encoding, Plaintext, PlaintextData, SlotValues};

/// Result of a decryption: the call may succeed while the payload is not
/// trustworthy (wrong key, noise budget exhausted)
#[derive(Debug, Clone)]
pub struct Decrypted {
    pub plaintext: Plaintext,
    pub is_valid: bool,
}

/// Bookkeeping of one operand
#[derive(Debug, Clone, Copy)]
struct Meta {
    level: u32,
    degree: u32,
    depth_used: u32,
    noise_exceeded: bool,
    logical_len: usize,
    encoding: Encoding,
}

impl Meta {
    fn of(ct: &Ciphertext) -> Self {
        let d = ct.data();
        Meta {
            level: d.level,
            degree: d.noise_scale_degree,
            depth_used: d.depth_used,
            noise_exceeded: d.noise_exceeded,
            logical_len: d.logical_len,
            encoding: d.encoding,
        }
    }

    fn fresh(logical_len: usize, encoding: Encoding) -> Self {
        Meta {
            level: 0,
            degree: 1,
            depth_used: 0,
            noise_exceeded: false,
            logical_len,
            encoding,
        }
    }

    fn joined(a: Meta, b: Meta) -> Self {
        Meta {
            level: a.level.max(b.level),
            degree: a.degree.max(b.degree),
            depth_used: a.depth_used.max(b.depth_used),
            noise_exceeded: a.noise_exceeded || b.noise_exceeded,
            logical_len: a.logical_len.max(b.logical_len),
            encoding: a.encoding.combine(b.encoding),
        }
    }
}

fn ckks_noise_amplitude(scaling_mod_size: u32) -> f64 {
    2f64.powi(20 - scaling_mod_size as i32)
}

impl CryptoContext {
    fn scaling_technique(&self) -> ScalingTechnique {
        self.params()
            .ckks()
            .map(|p| p.scaling_technique)
            .unwrap_or_default()
    }

    fn encrypt_under(
        &self,
        key_context: ContextTag,
        key_tag: KeyTag,
        pt: &Plaintext,
        op: &str,
    ) -> EngineResult<Ciphertext> {
        self.require(Feature::Pke, op)?;
        if pt.scheme() != self.scheme() {
            return Err(EngineError::SchemeMismatch(format!(
                "{} plaintext cannot be encrypted under a {} context",
                pt.scheme(),
                self.scheme()
            )));
        }
        self.check_context(pt.context(), "plaintext")?;
        self.check_context(key_context, "key")?;

        let mut slots = pt.data().values.padded(self.slots());
        if let (SlotValues::Complex(values), ParameterSet::Ckks(p)) = (&mut slots, self.params()) {
            let amp = ckks_noise_amplitude(p.scaling_mod_size);
            let mut rng = rand::thread_rng();
            for v in values.iter_mut() {
                *v += Complex64::new(rng.gen_range(-amp..=amp), rng.gen_range(-amp..=amp));
            }
        }
        trace!(op, key = %key_tag, len = pt.len(), "encrypt");
        Ok(Ciphertext::new(CiphertextData {
            context: self.tag(),
            scheme: self.scheme(),
            key_tag,
            encoding: pt.encoding(),
            slots,
            logical_len: pt.len(),
            level: 0,
            noise_scale_degree: 1,
            depth_used: 0,
            noise_exceeded: false,
            hops: 0,
        }))
    }

    /// Encrypt with the public half of a key pair
    pub fn encrypt(&self, keys: &KeyPair, pt: &Plaintext) -> EngineResult<Ciphertext> {
        self.encrypt_public(keys.public_key()?, pt)
    }

    pub fn encrypt_public(&self, pk: &PublicKey, pt: &Plaintext) -> EngineResult<Ciphertext> {
        self.encrypt_under(pk.context(), pk.tag(), pt, "Encrypt")
    }

    pub fn encrypt_private(&self, sk: &PrivateKey, pt: &Plaintext) -> EngineResult<Ciphertext> {
        self.encrypt_under(sk.context(), sk.tag(), pt, "Encrypt")
    }

    pub fn decrypt(&self, sk: &PrivateKey, ct: &Ciphertext) -> EngineResult<Decrypted> {
        self.require(Feature::Pke, "Decrypt")?;
        self.check_context(sk.context(), "private key")?;
        self.check_operand(ct)?;

        let data = ct.data();
        let is_valid = data.key_tag == sk.tag() && !data.noise_exceeded;
        let values = if is_valid {
            data.slots.clone()
        } else {
            match &data.slots {
                SlotValues::Integer(v) => SlotValues::Integer(vec![0; v.len()]),
                SlotValues::Complex(v) => {
                    SlotValues::Complex(vec![Complex64::new(0.0, 0.0); v.len()])
                }
            }
        };
        trace!(key = %sk.tag(), valid = is_valid, "decrypt");
        let plaintext = Plaintext::from_data(PlaintextData {
            context: self.tag(),
            scheme: self.scheme(),
            encoding: data.encoding,
            values,
            length: data.logical_len,
            plaintext_modulus: self.plaintext_modulus(),
        })?;
        Ok(Decrypted {
            plaintext,
            is_valid,
        })
    }

    /// Context and slot layout of a ciphertext entering this context
    pub(crate) fn check_operand(&self, ct: &Ciphertext) -> EngineResult<()> {
        self.check_context(ct.context(), "ciphertext")?;
        if ct.slot_count() != self.slots() {
            return Err(EngineError::InvalidParameter(format!(
                "ciphertext carries {} slots, context has {}",
                ct.slot_count(),
                self.slots()
            )));
        }
        Ok(())
    }

    fn check_pair(&self, a: &Ciphertext, b: &Ciphertext) -> EngineResult<()> {
        self.check_operand(a)?;
        self.check_operand(b)?;
        if a.key_tag() != b.key_tag() {
            return Err(EngineError::KeyMismatch(format!(
                "operands are encrypted under different keys ({} and {})",
                a.key_tag(),
                b.key_tag()
            )));
        }
        Ok(())
    }

    fn check_plain_operand(&self, pt: &Plaintext) -> EngineResult<()> {
        if pt.scheme() != self.scheme() {
            return Err(EngineError::SchemeMismatch(format!(
                "{} plaintext used with a {} context",
                pt.scheme(),
                self.scheme()
            )));
        }
        self.check_context(pt.context(), "plaintext")
    }

    fn zip_slots(
        &self,
        a: &SlotValues,
        b: &SlotValues,
        int_op: impl Fn(i128, i128) -> i128,
        complex_op: impl Fn(Complex64, Complex64) -> Complex64,
    ) -> EngineResult<SlotValues> {
        match (a, b) {
            (SlotValues::Integer(x), SlotValues::Integer(y)) => {
                let t = self.plaintext_modulus();
                Ok(SlotValues::Integer(
                    x.iter()
                        .zip(y)
                        .map(|(&p, &q)| centered_mod(int_op(i128::from(p), i128::from(q)), t))
                        .collect(),
                ))
            }
            (SlotValues::Complex(x), SlotValues::Complex(y)) => Ok(SlotValues::Complex(
                x.iter().zip(y).map(|(&p, &q)| complex_op(p, q)).collect(),
            )),
            _ => Err(EngineError::Fault(
                "operands carry different slot storage".into(),
            )),
        }
    }

    pub(crate) fn map_slots(
        &self,
        a: &SlotValues,
        int_op: impl Fn(i128) -> i128,
        complex_op: impl Fn(Complex64) -> Complex64,
    ) -> SlotValues {
        match a {
            SlotValues::Integer(x) => {
                let t = self.plaintext_modulus();
                SlotValues::Integer(
                    x.iter()
                        .map(|&p| centered_mod(int_op(i128::from(p)), t))
                        .collect(),
                )
            }
            SlotValues::Complex(x) => {
                SlotValues::Complex(x.iter().map(|&p| complex_op(p)).collect())
            }
        }
    }

    fn build(&self, key_tag: KeyTag, slots: SlotValues, meta: Meta, hops: u32) -> Ciphertext {
        Ciphertext::new(CiphertextData {
            context: self.tag(),
            scheme: self.scheme(),
            key_tag,
            encoding: meta.encoding,
            slots,
            logical_len: meta.logical_len,
            level: meta.level,
            noise_scale_degree: meta.degree,
            depth_used: meta.depth_used,
            noise_exceeded: meta.noise_exceeded,
            hops,
        })
    }

    /// Automatic rescaling applied to a CKKS operand before multiplication
    fn auto_rescale(&self, mut m: Meta) -> EngineResult<Meta> {
        if m.degree >= 2 {
            m.level += m.degree - 1;
            m.degree = 1;
        }
        if m.level > self.multiplicative_depth() {
            return Err(EngineError::Fault(format!(
                "level {} is past the multiplicative depth {}",
                m.level,
                self.multiplicative_depth()
            )));
        }
        Ok(m)
    }

    /// Bookkeeping of a product, enforcing the depth budget
    fn product_meta(&self, a: Meta, b: Meta) -> EngineResult<Meta> {
        let depth = self.multiplicative_depth();
        let mut out = Meta::joined(a, b);
        out.depth_used = a.depth_used.max(b.depth_used) + 1;
        match self.scheme() {
            Scheme::Bfv => {
                out.level = 0;
                out.degree = 1;
                if out.depth_used > depth {
                    out.noise_exceeded = true;
                }
            }
            Scheme::Bgv => {
                if out.depth_used > depth {
                    return Err(EngineError::Fault(format!(
                        "modulus chain exhausted: multiplicative depth {depth} already consumed"
                    )));
                }
                out.level = out.depth_used;
                out.degree = 1;
            }
            Scheme::Ckks => match self.scaling_technique() {
                ScalingTechnique::NoRescale => {
                    out.degree = a.degree + b.degree;
                    out.level = 0;
                    if out.degree > depth + 1 {
                        return Err(EngineError::Fault(format!(
                            "noise scale degree {} exceeds what depth {depth} can hold",
                            out.degree
                        )));
                    }
                }
                technique => {
                    let (a, b) = if technique.is_automatic() {
                        (self.auto_rescale(a)?, self.auto_rescale(b)?)
                    } else if a.degree > 1 || b.degree > 1 {
                        return Err(EngineError::Fault(format!(
                            "operand has noise scale degree {}; rescale before multiplying",
                            a.degree.max(b.degree)
                        )));
                    } else {
                        (a, b)
                    };
                    out.level = a.level.max(b.level);
                    if out.level >= depth {
                        return Err(EngineError::Fault(format!(
                            "multiplicative depth {depth} exhausted at level {}",
                            out.level
                        )));
                    }
                    out.degree = 2;
                }
            },
        }
        Ok(out)
    }

    pub fn eval_add(&self, a: &Ciphertext, b: &Ciphertext) -> EngineResult<Ciphertext> {
        self.require(Feature::LeveledShe, "EvalAdd")?;
        self.check_pair(a, b)?;
        let slots = self.zip_slots(&a.data().slots, &b.data().slots, |x, y| x + y, |x, y| x + y)?;
        let meta = Meta::joined(Meta::of(a), Meta::of(b));
        Ok(self.build(a.key_tag(), slots, meta, a.hops().max(b.hops())))
    }

    pub fn eval_sub(&self, a: &Ciphertext, b: &Ciphertext) -> EngineResult<Ciphertext> {
        self.require(Feature::LeveledShe, "EvalSub")?;
        self.check_pair(a, b)?;
        let slots = self.zip_slots(&a.data().slots, &b.data().slots, |x, y| x - y, |x, y| x - y)?;
        let meta = Meta::joined(Meta::of(a), Meta::of(b));
        Ok(self.build(a.key_tag(), slots, meta, a.hops().max(b.hops())))
    }

    pub fn eval_mult(&self, a: &Ciphertext, b: &Ciphertext) -> EngineResult<Ciphertext> {
        self.require(Feature::LeveledShe, "EvalMult")?;
        self.check_pair(a, b)?;
        self.require_mult_key(a.key_tag(), "EvalMult")?;
        let meta = self.product_meta(Meta::of(a), Meta::of(b))?;
        let slots = self.zip_slots(&a.data().slots, &b.data().slots, |x, y| x * y, |x, y| x * y)?;
        trace!(level = meta.level, degree = meta.degree, "EvalMult");
        Ok(self.build(a.key_tag(), slots, meta, a.hops().max(b.hops())))
    }

    pub fn eval_square(&self, ct: &Ciphertext) -> EngineResult<Ciphertext> {
        self.require(Feature::LeveledShe, "EvalSquare")?;
        self.check_operand(ct)?;
        self.require_mult_key(ct.key_tag(), "EvalSquare")?;
        let meta = self.product_meta(Meta::of(ct), Meta::of(ct))?;
        let slots = self.map_slots(&ct.data().slots, |x| x * x, |x| x * x);
        Ok(self.build(ct.key_tag(), slots, meta, ct.hops()))
    }

    pub fn eval_negate(&self, ct: &Ciphertext) -> EngineResult<Ciphertext> {
        self.require(Feature::LeveledShe, "EvalNegate")?;
        self.check_operand(ct)?;
        let slots = self.map_slots(&ct.data().slots, |x| -x, |x| -x);
        Ok(Ciphertext::new(ct.with_slots(slots)))
    }

    fn plain_slots(&self, pt: &Plaintext) -> SlotValues {
        pt.data().values.padded(self.slots())
    }

    pub fn eval_add_plain(&self, ct: &Ciphertext, pt: &Plaintext) -> EngineResult<Ciphertext> {
        self.require(Feature::LeveledShe, "EvalAddPlain")?;
        self.check_operand(ct)?;
        self.check_plain_operand(pt)?;
        let slots = self.zip_slots(
            &ct.data().slots,
            &self.plain_slots(pt),
            |x, y| x + y,
            |x, y| x + y,
        )?;
        let meta = Meta::joined(Meta::of(ct), Meta::fresh(pt.len(), pt.encoding()));
        Ok(self.build(ct.key_tag(), slots, meta, ct.hops()))
    }

    pub fn eval_sub_plain(&self, ct: &Ciphertext, pt: &Plaintext) -> EngineResult<Ciphertext> {
        self.require(Feature::LeveledShe, "EvalSubPlain")?;
        self.check_operand(ct)?;
        self.check_plain_operand(pt)?;
        let slots = self.zip_slots(
            &ct.data().slots,
            &self.plain_slots(pt),
            |x, y| x - y,
            |x, y| x - y,
        )?;
        let meta = Meta::joined(Meta::of(ct), Meta::fresh(pt.len(), pt.encoding()));
        Ok(self.build(ct.key_tag(), slots, meta, ct.hops()))
    }

    pub fn eval_mult_plain(&self, ct: &Ciphertext, pt: &Plaintext) -> EngineResult<Ciphertext> {
        self.require(Feature::LeveledShe, "EvalMultPlain")?;
        self.check_operand(ct)?;
        self.check_plain_operand(pt)?;
        let meta = self.product_meta(Meta::of(ct), Meta::fresh(pt.len(), pt.encoding()))?;
        let slots = self.zip_slots(
            &ct.data().slots,
            &self.plain_slots(pt),
            |x, y| x * y,
            |x, y| x * y,
        )?;
        Ok(self.build(ct.key_tag(), slots, meta, ct.hops()))
    }

    fn check_constant(&self, value: f64, op: &str) -> EngineResult<()> {
        self.require(Feature::LeveledShe, op)?;
        self.require_scheme(Scheme::Ckks, op)?;
        if !value.is_finite() {
            return Err(EngineError::InvalidParameter(format!(
                "{op}: constant {value} is not finite"
            )));
        }
        Ok(())
    }

    pub fn eval_add_const(&self, ct: &Ciphertext, value: f64) -> EngineResult<Ciphertext> {
        self.check_constant(value, "EvalAddConst")?;
        self.check_operand(ct)?;
        let c = Complex64::new(value, 0.0);
        let slots = self.map_slots(&ct.data().slots, |x| x, |x| x + c);
        Ok(Ciphertext::new(ct.with_slots(slots)))
    }

    pub fn eval_mult_const(&self, ct: &Ciphertext, value: f64) -> EngineResult<Ciphertext> {
        self.check_constant(value, "EvalMultConst")?;
        self.check_operand(ct)?;
        let meta = self.product_meta(Meta::of(ct), Meta::fresh(0, ct.encoding()))?;
        let slots = self.map_slots(&ct.data().slots, |x| x, |x| x * value);
        Ok(self.build(ct.key_tag(), slots, meta, ct.hops()))
    }

    /// Drop one scaling factor; a copy under the automatic techniques
    pub fn rescale(&self, ct: &Ciphertext) -> EngineResult<Ciphertext> {
        self.require(Feature::LeveledShe, "Rescale")?;
        self.require_scheme(Scheme::Ckks, "Rescale")?;
        self.check_operand(ct)?;
        let technique = self.scaling_technique();
        if technique.is_automatic() {
            return Ok(Ciphertext::new(ct.data().clone()));
        }
        if technique == ScalingTechnique::NoRescale {
            return Err(EngineError::Fault(
                "rescaling is disabled under NORESCALE".into(),
            ));
        }
        let data = ct.data();
        if data.noise_scale_degree < 2 {
            return Err(EngineError::Fault(
                "ciphertext is already at noise scale degree 1".into(),
            ));
        }
        let level = data.level + 1;
        if level > self.multiplicative_depth() {
            return Err(EngineError::Fault(format!(
                "rescaling to level {level} exceeds the multiplicative depth {}",
                self.multiplicative_depth()
            )));
        }
        Ok(Ciphertext::new(CiphertextData {
            level,
            noise_scale_degree: data.noise_scale_degree - 1,
            ..data.clone()
        }))
    }
}
