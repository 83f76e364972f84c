//! Conversions between fhegate-core objects and wire records

use fhegate_core::{
    Capabilities, Ciphertext, CiphertextData, ContextTag, CryptoContext, Encoding, EvalKey,
    EvalKeyData, EvalKeyKind, FeatureSet, KeySwitchTechnique, KeyTag, LweCiphertext,
    LweCiphertextData, LweSecretKey, LweSecretKeyData, ParameterSet, Plaintext, PlaintextData,
    PrivateKey, PrivateKeyData, PublicKey, PublicKeyData, ScalingTechnique, Scheme,
    SecretKeyDist, SecurityLevel, SlotValues,
};
use num_complex::Complex64;
use zeroize::Zeroizing;

use crate::error::{ProtoError, ProtoResult};
use crate::records::{
    CiphertextRecord, ContextRecord, EvalKeyRecord, KeyRecord, LweCiphertextRecord,
    LweSecretKeyRecord, ParamsRecord, PlaintextRecord, SlotsRecord, EVAL_KEY_AUTOMORPHISM,
    EVAL_KEY_REENCRYPTION, EVAL_KEY_RELIN,
};

fn out_of_range(field: &str, value: impl std::fmt::Display) -> ProtoError {
    ProtoError::InvalidFormat(format!("{field} {value} out of range"))
}

fn small(value: u32, field: &str) -> ProtoResult<u8> {
    u8::try_from(value).map_err(|_| out_of_range(field, value))
}

fn enum_code(value: u32, field: &str) -> ProtoResult<i32> {
    i32::try_from(value).map_err(|_| out_of_range(field, value))
}

fn length(value: u64, field: &str) -> ProtoResult<usize> {
    usize::try_from(value).map_err(|_| out_of_range(field, value))
}

// ParameterSet conversions
impl From<&ParameterSet> for ParamsRecord {
    fn from(params: &ParameterSet) -> Self {
        let common = params.common();
        let mut record = ParamsRecord {
            scheme: params.scheme() as u32,
            multiplicative_depth: common.multiplicative_depth,
            ring_dim: common.ring_dim,
            security_level: common.security_level as u32,
            secret_key_dist: common.secret_key_dist as u32,
            batch_size: common.batch_size,
            key_switch_technique: common.key_switch_technique as u32,
            num_large_digits: common.num_large_digits,
            digit_size: common.digit_size,
            max_relin_sk_deg: common.max_relin_sk_deg,
            ..Default::default()
        };
        if let Some(p) = params.integer() {
            record.plaintext_modulus = p.plaintext_modulus;
        }
        if let Some(p) = params.ckks() {
            record.scaling_mod_size = p.scaling_mod_size;
            record.first_mod_size = p.first_mod_size;
            record.scaling_technique = p.scaling_technique as u32;
        }
        record
    }
}

impl TryFrom<ParamsRecord> for ParameterSet {
    type Error = ProtoError;

    fn try_from(r: ParamsRecord) -> ProtoResult<Self> {
        let scheme = Scheme::try_from(small(r.scheme, "scheme")?)?;
        let mut params = ParameterSet::new(scheme);
        params.set_multiplicative_depth(r.multiplicative_depth)?;
        params.set_ring_dim(r.ring_dim)?;
        params.set_security_level(SecurityLevel::try_from(enum_code(
            r.security_level,
            "security level",
        )?)?);
        params.set_secret_key_dist(SecretKeyDist::try_from(enum_code(
            r.secret_key_dist,
            "secret key distribution",
        )?)?);
        params.set_batch_size(r.batch_size)?;
        params.set_key_switch_technique(KeySwitchTechnique::try_from(enum_code(
            r.key_switch_technique,
            "key switching technique",
        )?)?);
        params.set_num_large_digits(r.num_large_digits)?;
        params.set_digit_size(r.digit_size)?;
        params.set_max_relin_sk_deg(r.max_relin_sk_deg)?;
        match scheme {
            Scheme::Bfv | Scheme::Bgv => params.set_plaintext_modulus(r.plaintext_modulus)?,
            Scheme::Ckks => {
                params.set_scaling_mod_size(r.scaling_mod_size)?;
                params.set_first_mod_size(r.first_mod_size)?;
                params.set_scaling_technique(ScalingTechnique::try_from(enum_code(
                    r.scaling_technique,
                    "scaling technique",
                )?)?)?;
            }
        }
        Ok(params)
    }
}

// CryptoContext conversions
impl From<&CryptoContext> for ContextRecord {
    fn from(cc: &CryptoContext) -> Self {
        ContextRecord {
            params: Some(ParamsRecord::from(cc.params())),
            features: cc.features().bits(),
            tag: cc.tag().0.to_vec(),
        }
    }
}

impl TryFrom<ContextRecord> for CryptoContext {
    type Error = ProtoError;

    fn try_from(r: ContextRecord) -> ProtoResult<Self> {
        let params = r
            .params
            .ok_or_else(|| ProtoError::MissingField("params".into()))?;
        let params = ParameterSet::try_from(params)?;
        let cc = CryptoContext::restore(params, FeatureSet::from_bits(r.features)?)?;
        if cc.tag() != ContextTag::from_slice(&r.tag)? {
            return Err(ProtoError::InvalidFormat(
                "context tag does not match its parameters".into(),
            ));
        }
        Ok(cc)
    }
}

// Key conversions
impl From<&PublicKey> for KeyRecord {
    fn from(pk: &PublicKey) -> Self {
        let d = pk.data();
        KeyRecord {
            context: d.context.0.to_vec(),
            tag: d.tag.0.to_vec(),
            material: d.material.clone(),
        }
    }
}

impl TryFrom<KeyRecord> for PublicKey {
    type Error = ProtoError;

    fn try_from(r: KeyRecord) -> ProtoResult<Self> {
        Ok(PublicKey::from_data(PublicKeyData {
            context: ContextTag::from_slice(&r.context)?,
            tag: KeyTag::from_slice(&r.tag)?,
            material: r.material,
        })?)
    }
}

impl From<&PrivateKey> for KeyRecord {
    fn from(sk: &PrivateKey) -> Self {
        let d = sk.data();
        KeyRecord {
            context: d.context.0.to_vec(),
            tag: d.tag.0.to_vec(),
            material: d.material.to_vec(),
        }
    }
}

impl TryFrom<KeyRecord> for PrivateKey {
    type Error = ProtoError;

    fn try_from(r: KeyRecord) -> ProtoResult<Self> {
        Ok(PrivateKey::from_data(PrivateKeyData {
            context: ContextTag::from_slice(&r.context)?,
            tag: KeyTag::from_slice(&r.tag)?,
            material: Zeroizing::new(r.material),
        })?)
    }
}

impl From<&EvalKey> for EvalKeyRecord {
    fn from(key: &EvalKey) -> Self {
        let d = key.data();
        let (kind, index, target) = match d.kind {
            EvalKeyKind::Relinearization => (EVAL_KEY_RELIN, 0, Vec::new()),
            EvalKeyKind::Automorphism { index } => (EVAL_KEY_AUTOMORPHISM, index, Vec::new()),
            EvalKeyKind::ReEncryption { target } => (EVAL_KEY_REENCRYPTION, 0, target.0.to_vec()),
        };
        EvalKeyRecord {
            context: d.context.0.to_vec(),
            source: d.source.0.to_vec(),
            kind,
            index,
            target,
            material: d.material.clone(),
        }
    }
}

impl TryFrom<EvalKeyRecord> for EvalKey {
    type Error = ProtoError;

    fn try_from(r: EvalKeyRecord) -> ProtoResult<Self> {
        let kind = match r.kind {
            EVAL_KEY_RELIN => EvalKeyKind::Relinearization,
            EVAL_KEY_AUTOMORPHISM => EvalKeyKind::Automorphism { index: r.index },
            EVAL_KEY_REENCRYPTION => EvalKeyKind::ReEncryption {
                target: KeyTag::from_slice(&r.target)?,
            },
            other => {
                return Err(ProtoError::InvalidFormat(format!(
                    "unknown evaluation key kind {other}"
                )))
            }
        };
        Ok(EvalKey::from_data(EvalKeyData {
            context: ContextTag::from_slice(&r.context)?,
            source: KeyTag::from_slice(&r.source)?,
            kind,
            material: r.material,
        })?)
    }
}

// Slot storage
impl From<&SlotValues> for SlotsRecord {
    fn from(values: &SlotValues) -> Self {
        match values {
            SlotValues::Integer(v) => SlotsRecord {
                complex: false,
                integers: v.clone(),
                ..Default::default()
            },
            SlotValues::Complex(v) => SlotsRecord {
                complex: true,
                real: v.iter().map(|c| c.re).collect(),
                imag: v.iter().map(|c| c.im).collect(),
                ..Default::default()
            },
        }
    }
}

impl TryFrom<SlotsRecord> for SlotValues {
    type Error = ProtoError;

    fn try_from(r: SlotsRecord) -> ProtoResult<Self> {
        if !r.complex {
            return Ok(SlotValues::Integer(r.integers));
        }
        if r.real.len() != r.imag.len() {
            return Err(ProtoError::InvalidFormat(format!(
                "{} real parts but {} imaginary parts",
                r.real.len(),
                r.imag.len()
            )));
        }
        Ok(SlotValues::Complex(
            r.real
                .into_iter()
                .zip(r.imag)
                .map(|(re, im)| Complex64::new(re, im))
                .collect(),
        ))
    }
}

// Plaintext conversions
impl From<&Plaintext> for PlaintextRecord {
    fn from(pt: &Plaintext) -> Self {
        let d = pt.data();
        PlaintextRecord {
            context: d.context.0.to_vec(),
            scheme: d.scheme as u32,
            encoding: d.encoding as u32,
            slots: Some(SlotsRecord::from(&d.values)),
            length: d.length as u64,
            plaintext_modulus: d.plaintext_modulus,
        }
    }
}

impl TryFrom<PlaintextRecord> for Plaintext {
    type Error = ProtoError;

    fn try_from(r: PlaintextRecord) -> ProtoResult<Self> {
        let slots = r
            .slots
            .ok_or_else(|| ProtoError::MissingField("slots".into()))?;
        Ok(Plaintext::from_data(PlaintextData {
            context: ContextTag::from_slice(&r.context)?,
            scheme: Scheme::try_from(small(r.scheme, "scheme")?)?,
            encoding: Encoding::try_from(small(r.encoding, "encoding")?)?,
            values: SlotValues::try_from(slots)?,
            length: length(r.length, "plaintext length")?,
            plaintext_modulus: r.plaintext_modulus,
        })?)
    }
}

// Ciphertext conversions
impl From<&Ciphertext> for CiphertextRecord {
    fn from(ct: &Ciphertext) -> Self {
        let d = ct.data();
        CiphertextRecord {
            context: d.context.0.to_vec(),
            scheme: d.scheme as u32,
            key_tag: d.key_tag.0.to_vec(),
            encoding: d.encoding as u32,
            slots: Some(SlotsRecord::from(&d.slots)),
            logical_len: d.logical_len as u64,
            level: d.level,
            noise_scale_degree: d.noise_scale_degree,
            depth_used: d.depth_used,
            noise_exceeded: d.noise_exceeded,
            hops: d.hops,
        }
    }
}

impl TryFrom<CiphertextRecord> for Ciphertext {
    type Error = ProtoError;

    fn try_from(r: CiphertextRecord) -> ProtoResult<Self> {
        let slots = r
            .slots
            .ok_or_else(|| ProtoError::MissingField("slots".into()))?;
        Ok(Ciphertext::from_data(CiphertextData {
            context: ContextTag::from_slice(&r.context)?,
            scheme: Scheme::try_from(small(r.scheme, "scheme")?)?,
            key_tag: KeyTag::from_slice(&r.key_tag)?,
            encoding: Encoding::try_from(small(r.encoding, "encoding")?)?,
            slots: SlotValues::try_from(slots)?,
            logical_len: length(r.logical_len, "logical length")?,
            level: r.level,
            noise_scale_degree: r.noise_scale_degree,
            depth_used: r.depth_used,
            noise_exceeded: r.noise_exceeded,
            hops: r.hops,
        })?)
    }
}

// LWE conversions
impl From<&LweCiphertext> for LweCiphertextRecord {
    fn from(ct: &LweCiphertext) -> Self {
        let d = ct.data();
        LweCiphertextRecord {
            key_tag: d.key_tag.0.to_vec(),
            a: d.a.clone(),
            b: d.b,
            q: d.q,
            p: d.p,
        }
    }
}

impl TryFrom<LweCiphertextRecord> for LweCiphertext {
    type Error = ProtoError;

    fn try_from(r: LweCiphertextRecord) -> ProtoResult<Self> {
        Ok(LweCiphertext::from_data(LweCiphertextData {
            key_tag: KeyTag::from_slice(&r.key_tag)?,
            a: r.a,
            b: r.b,
            q: r.q,
            p: r.p,
        })?)
    }
}

impl From<&LweSecretKey> for LweSecretKeyRecord {
    fn from(sk: &LweSecretKey) -> Self {
        let d = sk.data();
        LweSecretKeyRecord {
            tag: d.tag.0.to_vec(),
            secret: d.secret.to_vec(),
        }
    }
}

impl TryFrom<LweSecretKeyRecord> for LweSecretKey {
    type Error = ProtoError;

    fn try_from(r: LweSecretKeyRecord) -> ProtoResult<Self> {
        Ok(LweSecretKey::from_data(LweSecretKeyData {
            tag: KeyTag::from_slice(&r.tag)?,
            secret: Zeroizing::new(r.secret),
        })?)
    }
}
