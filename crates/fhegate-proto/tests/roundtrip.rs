//! Round trips of engine objects through both framings

use fhegate_core::{
    BinFheContext, BinFheMethod, BinFheParamSet, Ciphertext, CryptoContext, EvalKey, KeyPair,
    LweCiphertext, LweSecretKey, ParameterSet, Plaintext, PrivateKey, PublicKey, Scheme,
    SecurityLevel,
};
use fhegate_proto::{
    EvalAutomorphismKeys, EvalMultKeys, Format, MultiFormat, ObjectKind, ProtoError, detect_format,
    peek_kind,
};
use proptest::prelude::*;

fn bfv_context() -> CryptoContext {
    let mut params = ParameterSet::new(Scheme::Bfv);
    params.set_plaintext_modulus(65537).unwrap();
    params.set_multiplicative_depth(2).unwrap();
    params.set_security_level(SecurityLevel::NotSet);
    params.set_batch_size(16).unwrap();
    let cc = CryptoContext::new(params).unwrap();
    cc.enable(0x01 | 0x02 | 0x08).unwrap();
    cc
}

fn ckks_context() -> CryptoContext {
    let mut params = ParameterSet::new(Scheme::Ckks);
    params.set_scaling_mod_size(50).unwrap();
    params.set_multiplicative_depth(3).unwrap();
    params.set_security_level(SecurityLevel::NotSet);
    params.set_batch_size(8).unwrap();
    let cc = CryptoContext::new(params).unwrap();
    cc.enable(0x01 | 0x02 | 0x08).unwrap();
    cc
}

fn both<T: MultiFormat>(value: &T) -> (T, T) {
    let binary = T::from_any(&value.to_format(Format::Binary).unwrap()).unwrap();
    let text = T::from_any(&value.to_format(Format::Text).unwrap()).unwrap();
    (binary, text)
}

#[test]
fn test_context_roundtrip_interoperates() {
    let cc = bfv_context();
    let kp = cc.key_gen().unwrap();
    let ct = cc
        .encrypt(&kp, &cc.make_packed_plaintext(&[1, 2, 3, 4]).unwrap())
        .unwrap();

    for restored in [
        CryptoContext::from_protobuf(&cc.to_protobuf().unwrap()).unwrap(),
        CryptoContext::from_json(&cc.to_json().unwrap()).unwrap(),
    ] {
        assert!(!restored.ptr_eq(&cc));
        assert_eq!(restored.params(), cc.params());
        assert_eq!(restored.features(), cc.features());
        assert_eq!(restored.tag(), cc.tag());
        assert_eq!(restored.ring_dimension(), cc.ring_dimension());

        let sum = restored.eval_add(&ct, &ct).unwrap();
        let out = restored.decrypt(kp.private_key().unwrap(), &sum).unwrap();
        assert!(out.is_valid);
        assert_eq!(out.plaintext.packed_values().unwrap(), vec![2, 4, 6, 8]);
    }
}

#[test]
fn test_keys_roundtrip() {
    let cc = bfv_context();
    let kp = cc.key_gen().unwrap();
    let pk = kp.public_key().unwrap();
    let sk = kp.private_key().unwrap();

    let (pk_bin, pk_text) = both(pk);
    assert_eq!(&pk_bin, pk);
    assert_eq!(&pk_text, pk);

    let (sk_bin, sk_text) = both(sk);
    assert_eq!(sk_bin.tag(), sk.tag());
    assert_eq!(sk_text.tag(), sk.tag());

    // Reassembled key pair decrypts what the original encrypted
    let rebuilt = KeyPair::new(pk_bin, sk_text);
    let ct = cc
        .encrypt(&rebuilt, &cc.make_packed_plaintext(&[9, -9]).unwrap())
        .unwrap();
    let out = cc.decrypt(sk, &ct).unwrap();
    assert_eq!(out.plaintext.packed_values().unwrap(), vec![9, -9]);
}

#[test]
fn test_private_key_tag_must_match_material() {
    let cc = bfv_context();
    let kp = cc.key_gen().unwrap();
    let mut record = kp.private_key().unwrap().to_record();
    record.material[0] ^= 0x01;
    assert!(matches!(
        PrivateKey::from_record(record),
        Err(ProtoError::Engine(_))
    ));
}

#[test]
fn test_ckks_ciphertext_roundtrip_keeps_metadata() {
    let cc = ckks_context();
    let kp = cc.key_gen().unwrap();
    cc.eval_mult_key_gen(kp.private_key().unwrap()).unwrap();
    let ct = cc
        .encrypt(
            &kp,
            &cc.make_ckks_packed_plaintext(&[1.5, -2.25]).unwrap(),
        )
        .unwrap();
    let squared = cc.eval_mult(&ct, &ct).unwrap();

    let (bin, text) = both(&squared);
    for restored in [bin, text] {
        assert_eq!(restored.level(), squared.level());
        assert_eq!(restored.noise_scale_degree(), squared.noise_scale_degree());
        assert_eq!(restored.data(), squared.data());
        let out = cc.decrypt(kp.private_key().unwrap(), &restored).unwrap();
        let values = out.plaintext.real_packed_values().unwrap();
        assert!((values[0] - 2.25).abs() < 1e-6);
        assert!((values[1] - 5.0625).abs() < 1e-6);
    }
}

#[test]
fn test_complex_plaintext_roundtrip() {
    let cc = ckks_context();
    let pt = cc
        .make_ckks_complex_packed_plaintext(&[
            num_complex::Complex64::new(0.5, -1.0),
            num_complex::Complex64::new(3.0, 0.25),
        ])
        .unwrap();
    let (bin, text) = both(&pt);
    assert_eq!(bin, pt);
    assert_eq!(text, pt);
    assert_eq!(
        text.complex_packed_values().unwrap(),
        pt.complex_packed_values().unwrap()
    );
}

#[test]
fn test_eval_key_bundles() {
    let cc = bfv_context();
    let kp = cc.key_gen().unwrap();
    let sk = kp.private_key().unwrap();
    cc.eval_mult_key_gen(sk).unwrap();
    cc.eval_rotate_key_gen(sk, &[1, -2]).unwrap();

    let mult = EvalMultKeys(cc.export_mult_keys(Some(sk.tag())).unwrap());
    let rot = EvalAutomorphismKeys(cc.export_rotation_keys(None).unwrap());

    let fresh = CryptoContext::from_json(&cc.to_json().unwrap()).unwrap();
    let restored = EvalMultKeys::from_any(&mult.to_protobuf().unwrap()).unwrap();
    assert_eq!(restored, mult);
    assert_eq!(fresh.import_eval_keys(restored.0).unwrap(), 1);
    let restored = EvalAutomorphismKeys::from_json(&rot.to_json().unwrap()).unwrap();
    assert_eq!(fresh.import_eval_keys(restored.0).unwrap(), 2);

    let ct = fresh
        .encrypt(&kp, &fresh.make_packed_plaintext(&[2, 3]).unwrap())
        .unwrap();
    let sq = fresh.eval_mult(&ct, &ct).unwrap();
    let out = fresh.decrypt(sk, &fresh.eval_rotate(&sq, 1).unwrap()).unwrap();
    assert_eq!(out.plaintext.packed_value_at(0).unwrap(), 9);

    // A rotation bundle is not a relinearization bundle
    let bytes = rot.to_protobuf().unwrap();
    assert!(matches!(
        EvalMultKeys::from_protobuf(&bytes),
        Err(ProtoError::KindMismatch { .. })
    ));
}

#[test]
fn test_single_eval_key_and_plaintext() {
    let cc = bfv_context();
    let kp = cc.key_gen().unwrap();
    cc.eval_mult_key_gen(kp.private_key().unwrap()).unwrap();
    let key = cc.export_mult_keys(None).unwrap().remove(0);
    let (bin, text) = both(&key);
    assert_eq!(bin, key);
    assert_eq!(text, key);

    let pt = cc.make_packed_plaintext(&[7, 8, 9]).unwrap();
    assert_eq!(Plaintext::from_json(&pt.to_json().unwrap()).unwrap(), pt);
}

#[test]
fn test_lwe_objects_roundtrip() {
    let bin_cc = BinFheContext::new();
    bin_cc
        .generate(BinFheParamSet::Toy, BinFheMethod::Ginx)
        .unwrap();
    let sk = bin_cc.key_gen().unwrap();
    let ct = bin_cc.encrypt(&sk, 1).unwrap();

    let (sk_bin, sk_text) = both(&sk);
    assert_eq!(sk_bin, sk);
    assert_eq!(sk_text, sk);

    let (ct_bin, ct_text) = both(&ct);
    assert_eq!(ct_bin.data(), ct.data());
    assert_eq!(bin_cc.decrypt(&sk_text, &ct_text).unwrap(), 1);
}

#[test]
fn test_kind_is_checked_across_types() {
    let cc = bfv_context();
    let kp = cc.key_gen().unwrap();
    let text = kp.public_key().unwrap().to_json().unwrap();
    assert_eq!(peek_kind(text.as_bytes()).unwrap(), ObjectKind::PublicKey);
    assert!(matches!(
        PrivateKey::from_json(&text),
        Err(ProtoError::KindMismatch {
            expected: ObjectKind::PrivateKey,
            actual: ObjectKind::PublicKey
        })
    ));
    assert!(Ciphertext::from_any(b"").is_err());
    assert!(LweSecretKey::from_any(b"{}").is_err());
    assert!(LweCiphertext::from_any(&[0x0a, 0x01]).is_err());
    assert!(EvalKey::from_any(b"garbage").is_err());
    assert_eq!(detect_format(text.as_bytes()), Format::Text);
}

#[test]
fn test_context_tag_mismatch_rejected() {
    let cc = bfv_context();
    let mut record = cc.to_record();
    record.tag[0] ^= 0xff;
    assert!(matches!(
        CryptoContext::from_record(record),
        Err(ProtoError::InvalidFormat(_))
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_bfv_ciphertext_roundtrip(values in prop::collection::vec(-32768i64..=32768, 1..16)) {
        let cc = bfv_context();
        let kp = cc.key_gen().unwrap();
        let ct = cc.encrypt(&kp, &cc.make_packed_plaintext(&values).unwrap()).unwrap();

        let (bin, text) = both(&ct);
        for restored in [bin, text] {
            let out = cc.decrypt(kp.private_key().unwrap(), &restored).unwrap();
            prop_assert!(out.is_valid);
            prop_assert_eq!(out.plaintext.packed_values().unwrap(), values.clone());
        }
    }

    #[test]
    fn prop_ckks_values_survive_text_framing(
        values in prop::collection::vec(-1.0e6f64..1.0e6, 1..8)
    ) {
        let cc = ckks_context();
        let pt = cc.make_ckks_packed_plaintext(&values).unwrap();
        let restored = Plaintext::from_json(&pt.to_json().unwrap()).unwrap();
        prop_assert_eq!(restored.real_packed_values().unwrap(), pt.real_packed_values().unwrap());
    }

    #[test]
    fn prop_random_bytes_never_decode(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        prop_assert!(PublicKey::from_any(&bytes).is_err());
    }
}
