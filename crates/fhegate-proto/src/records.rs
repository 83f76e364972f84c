//! Wire records for every serializable engine object
//!
//! The same records back both framings: they are prost messages for the
//! binary framing and serde structs (bytes as hex) for the text framing.

use serde::{Deserialize, Serialize};

/// Object kind carried in the frame header
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    ::prost::Enumeration,
    Serialize,
    Deserialize,
)]
#[repr(i32)]
pub enum ObjectKind {
    Unknown = 0,
    CryptoContext = 1,
    PublicKey = 2,
    PrivateKey = 3,
    Ciphertext = 4,
    EvalMultKeys = 5,
    EvalKey = 6,
    Plaintext = 7,
    LweCiphertext = 8,
    LweSecretKey = 9,
    EvalAutomorphismKeys = 10,
}

impl ObjectKind {
    pub fn from_wire(value: i32) -> ObjectKind {
        ObjectKind::try_from(value).unwrap_or(ObjectKind::Unknown)
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FrameProto {
    #[prost(string, tag = "1")]
    pub magic: String,
    #[prost(uint32, tag = "2")]
    pub version: u32,
    #[prost(enumeration = "ObjectKind", tag = "3")]
    pub kind: i32,
    #[prost(bytes = "vec", tag = "4")]
    pub checksum: Vec<u8>,
    #[prost(bytes = "vec", tag = "5")]
    pub body: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamsRecord {
    #[prost(uint32, tag = "1")]
    pub scheme: u32,
    #[prost(uint32, tag = "2")]
    pub multiplicative_depth: u32,
    #[prost(uint64, tag = "3")]
    pub ring_dim: u64,
    #[prost(uint32, tag = "4")]
    pub security_level: u32,
    #[prost(uint32, tag = "5")]
    pub secret_key_dist: u32,
    #[prost(uint32, tag = "6")]
    pub batch_size: u32,
    #[prost(uint32, tag = "7")]
    pub key_switch_technique: u32,
    #[prost(uint32, tag = "8")]
    pub num_large_digits: u32,
    #[prost(uint32, tag = "9")]
    pub digit_size: u32,
    #[prost(uint32, tag = "10")]
    pub max_relin_sk_deg: u32,
    #[prost(uint64, tag = "11")]
    pub plaintext_modulus: u64,
    #[prost(uint32, tag = "12")]
    pub scaling_mod_size: u32,
    #[prost(uint32, tag = "13")]
    pub first_mod_size: u32,
    #[prost(uint32, tag = "14")]
    pub scaling_technique: u32,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextRecord {
    #[prost(message, optional, tag = "1")]
    pub params: Option<ParamsRecord>,
    #[prost(uint32, tag = "2")]
    pub features: u32,
    #[prost(bytes = "vec", tag = "3")]
    #[serde(with = "hex::serde")]
    pub tag: Vec<u8>,
}

/// Public and private keys share one layout
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyRecord {
    #[prost(bytes = "vec", tag = "1")]
    #[serde(with = "hex::serde")]
    pub context: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    #[serde(with = "hex::serde")]
    pub tag: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    #[serde(with = "hex::serde")]
    pub material: Vec<u8>,
}

pub const EVAL_KEY_RELIN: u32 = 0;
pub const EVAL_KEY_AUTOMORPHISM: u32 = 1;
pub const EVAL_KEY_REENCRYPTION: u32 = 2;

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalKeyRecord {
    #[prost(bytes = "vec", tag = "1")]
    #[serde(with = "hex::serde")]
    pub context: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    #[serde(with = "hex::serde")]
    pub source: Vec<u8>,
    #[prost(uint32, tag = "3")]
    pub kind: u32,
    #[prost(sint32, tag = "4")]
    pub index: i32,
    #[prost(bytes = "vec", tag = "5")]
    #[serde(with = "hex::serde")]
    pub target: Vec<u8>,
    #[prost(bytes = "vec", tag = "6")]
    #[serde(with = "hex::serde")]
    pub material: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalKeyBundleRecord {
    #[prost(message, repeated, tag = "1")]
    pub keys: Vec<EvalKeyRecord>,
}

/// Slot storage: integer slots, or real and imaginary parts
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotsRecord {
    #[prost(bool, tag = "1")]
    pub complex: bool,
    #[prost(sint64, repeated, tag = "2")]
    pub integers: Vec<i64>,
    #[prost(double, repeated, tag = "3")]
    pub real: Vec<f64>,
    #[prost(double, repeated, tag = "4")]
    pub imag: Vec<f64>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaintextRecord {
    #[prost(bytes = "vec", tag = "1")]
    #[serde(with = "hex::serde")]
    pub context: Vec<u8>,
    #[prost(uint32, tag = "2")]
    pub scheme: u32,
    #[prost(uint32, tag = "3")]
    pub encoding: u32,
    #[prost(message, optional, tag = "4")]
    pub slots: Option<SlotsRecord>,
    #[prost(uint64, tag = "5")]
    pub length: u64,
    #[prost(uint64, tag = "6")]
    pub plaintext_modulus: u64,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct CiphertextRecord {
    #[prost(bytes = "vec", tag = "1")]
    #[serde(with = "hex::serde")]
    pub context: Vec<u8>,
    #[prost(uint32, tag = "2")]
    pub scheme: u32,
    #[prost(bytes = "vec", tag = "3")]
    #[serde(with = "hex::serde")]
    pub key_tag: Vec<u8>,
    #[prost(uint32, tag = "4")]
    pub encoding: u32,
    #[prost(message, optional, tag = "5")]
    pub slots: Option<SlotsRecord>,
    #[prost(uint64, tag = "6")]
    pub logical_len: u64,
    #[prost(uint32, tag = "7")]
    pub level: u32,
    #[prost(uint32, tag = "8")]
    pub noise_scale_degree: u32,
    #[prost(uint32, tag = "9")]
    pub depth_used: u32,
    #[prost(bool, tag = "10")]
    pub noise_exceeded: bool,
    #[prost(uint32, tag = "11")]
    pub hops: u32,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct LweCiphertextRecord {
    #[prost(bytes = "vec", tag = "1")]
    #[serde(with = "hex::serde")]
    pub key_tag: Vec<u8>,
    #[prost(uint64, repeated, tag = "2")]
    pub a: Vec<u64>,
    #[prost(uint64, tag = "3")]
    pub b: u64,
    #[prost(uint64, tag = "4")]
    pub q: u64,
    #[prost(uint64, tag = "5")]
    pub p: u64,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct LweSecretKeyRecord {
    #[prost(bytes = "vec", tag = "1")]
    #[serde(with = "hex::serde")]
    pub tag: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    #[serde(with = "hex::serde")]
    pub secret: Vec<u8>,
}
