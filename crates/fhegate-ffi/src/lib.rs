//! fhegate-ffi: C boundary over the fhegate engine
//!
//! Every engine object crosses the boundary as an opaque handle. Every call
//! returns an [`FheResult`] whose message names the failing operation, and
//! output slots are written only when the call succeeds.
//!
//! # Architecture
//!
//! ```text
//! C caller
//!     └── fhegate-ffi (this crate: handles, per-call results, config)
//!             ├── fhegate-core (engine objects and numeric kernels)
//!             └── fhegate-proto (text and binary framings)
//! ```
//!
//! # Surface
//!
//! - Parameters and contexts: [`params`], [`context`]
//! - Keys, plaintexts and ciphertexts: [`keys`], [`plaintext`], [`ciphertext`]
//! - Evaluation: [`dispatch`]
//! - Binary FHE and scheme switching: [`binfhe`], [`bridge`]
//! - Persistence: [`serial`]
//!
//! # Safety
//!
//! The caller owns every handle it receives and releases it exactly once
//! through the matching destroy call. Using a destroyed handle is undefined
//! behavior; the layer keeps no table of live handles. Null is always
//! rejected with `NullArgument`, and destroying null is a no-op.

#![allow(non_snake_case)]

pub mod binfhe;
pub mod bridge;
pub mod ciphertext;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod keys;
pub mod params;
pub mod plaintext;
pub mod registry;
pub mod serial;

pub use config::{init_logging, BoundaryConfig};
pub use error::{FfiError, FfiResult, FheResult, FheStatus};
pub use registry::{
    BinFheContextHandle, CiphertextHandle, CryptoContextHandle, EvalKeyHandle,
    FastRotationPrecompHandle, KeyPairHandle, LweCiphertextHandle, LweSecretKeyHandle,
    ParamsHandle, PlaintextHandle, PrivateKeyHandle, PublicKeyHandle, SchSwchParamsHandle,
};
