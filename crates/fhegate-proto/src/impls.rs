//! MultiFormat trait implementations for engine types

use fhegate_core::{
    Ciphertext, CryptoContext, EvalKey, EvalKeyKind, LweCiphertext, LweSecretKey, Plaintext,
    PrivateKey, PublicKey,
};

use crate::error::{ProtoError, ProtoResult};
use crate::format::MultiFormat;
use crate::records::{
    CiphertextRecord, ContextRecord, EvalKeyBundleRecord, EvalKeyRecord, KeyRecord,
    LweCiphertextRecord, LweSecretKeyRecord, ObjectKind, PlaintextRecord,
};

macro_rules! multi_format {
    ($ty:ty, $kind:ident, $record:ty) => {
        impl MultiFormat for $ty {
            const KIND: ObjectKind = ObjectKind::$kind;
            type Record = $record;

            fn to_record(&self) -> $record {
                <$record>::from(self)
            }

            fn from_record(record: $record) -> ProtoResult<Self> {
                <$ty>::try_from(record)
            }
        }
    };
}

multi_format!(CryptoContext, CryptoContext, ContextRecord);
multi_format!(PublicKey, PublicKey, KeyRecord);
multi_format!(PrivateKey, PrivateKey, KeyRecord);
multi_format!(EvalKey, EvalKey, EvalKeyRecord);
multi_format!(Plaintext, Plaintext, PlaintextRecord);
multi_format!(Ciphertext, Ciphertext, CiphertextRecord);
multi_format!(LweCiphertext, LweCiphertext, LweCiphertextRecord);
multi_format!(LweSecretKey, LweSecretKey, LweSecretKeyRecord);

/// Relinearization keys exported from a context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalMultKeys(pub Vec<EvalKey>);

/// Rotation and summation keys exported from a context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalAutomorphismKeys(pub Vec<EvalKey>);

fn bundle_from(keys: &[EvalKey]) -> EvalKeyBundleRecord {
    EvalKeyBundleRecord {
        keys: keys.iter().map(EvalKeyRecord::from).collect(),
    }
}

fn bundle_into(
    record: EvalKeyBundleRecord,
    accept: fn(EvalKeyKind) -> bool,
    what: &str,
) -> ProtoResult<Vec<EvalKey>> {
    record
        .keys
        .into_iter()
        .map(|r| {
            let key = EvalKey::try_from(r)?;
            if !accept(key.kind()) {
                return Err(ProtoError::InvalidFormat(format!(
                    "{what} bundle holds a {:?} key",
                    key.kind()
                )));
            }
            Ok(key)
        })
        .collect()
}

impl MultiFormat for EvalMultKeys {
    const KIND: ObjectKind = ObjectKind::EvalMultKeys;
    type Record = EvalKeyBundleRecord;

    fn to_record(&self) -> EvalKeyBundleRecord {
        bundle_from(&self.0)
    }

    fn from_record(record: EvalKeyBundleRecord) -> ProtoResult<Self> {
        bundle_into(
            record,
            |kind| matches!(kind, EvalKeyKind::Relinearization),
            "relinearization",
        )
        .map(EvalMultKeys)
    }
}

impl MultiFormat for EvalAutomorphismKeys {
    const KIND: ObjectKind = ObjectKind::EvalAutomorphismKeys;
    type Record = EvalKeyBundleRecord;

    fn to_record(&self) -> EvalKeyBundleRecord {
        bundle_from(&self.0)
    }

    fn from_record(record: EvalKeyBundleRecord) -> ProtoResult<Self> {
        bundle_into(
            record,
            |kind| matches!(kind, EvalKeyKind::Automorphism { .. }),
            "automorphism",
        )
        .map(EvalAutomorphismKeys)
    }
}
