use std::ptr;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fhegate_ffi::context::*;
use fhegate_ffi::dispatch::*;
use fhegate_ffi::keys::*;
use fhegate_ffi::params::*;
use fhegate_ffi::plaintext::*;
use fhegate_ffi::registry::*;
use fhegate_ffi::serial::*;

struct Bench {
    cc: *mut CryptoContextHandle,
    kp: *mut KeyPairHandle,
    pt: *mut PlaintextHandle,
    ct: *mut CiphertextHandle,
}

impl Bench {
    fn bfv() -> Self {
        unsafe {
            let mut params = ptr::null_mut();
            assert!(NewParamsBFV(&mut params).is_ok());
            assert!(Params_SetPlaintextModulus(params, 65537).is_ok());
            assert!(Params_SetMultiplicativeDepth(params, 2).is_ok());
            assert!(Params_SetBatchSize(params, 1024).is_ok());
            let mut cc = ptr::null_mut();
            assert!(NewCryptoContext(params, &mut cc).is_ok());
            DestroyParams(params);
            assert!(CryptoContext_Enable(cc, 0x01 | 0x02 | 0x08 | 0x10).is_ok());

            let mut kp = ptr::null_mut();
            assert!(CryptoContext_KeyGen(cc, &mut kp).is_ok());
            assert!(CryptoContext_EvalMultKeyGen(cc, kp).is_ok());
            let indices = [1i32];
            assert!(CryptoContext_EvalRotateKeyGen(cc, kp, indices.as_ptr(), 1).is_ok());

            let values: Vec<i64> = (0..1024).collect();
            let mut pt = ptr::null_mut();
            assert!(
                CryptoContext_MakePackedPlaintext(cc, values.as_ptr(), values.len(), &mut pt)
                    .is_ok()
            );
            let mut ct = ptr::null_mut();
            assert!(CryptoContext_Encrypt(cc, kp, pt, &mut ct).is_ok());
            Bench { cc, kp, pt, ct }
        }
    }
}

impl Drop for Bench {
    fn drop(&mut self) {
        unsafe {
            DestroyCiphertext(self.ct);
            DestroyPlaintext(self.pt);
            DestroyKeyPair(self.kp);
            DestroyCryptoContext(self.cc);
        }
    }
}

/// Run one handle-producing call and release its output
fn consume(f: impl Fn(*mut *mut CiphertextHandle) -> fhegate_ffi::FheResult) {
    let mut out = ptr::null_mut();
    let result = f(&mut out);
    assert!(result.is_ok());
    unsafe { DestroyCiphertext(out) };
}

fn bench_encrypt(c: &mut Criterion) {
    let b = Bench::bfv();
    c.bench_function("bfv_encrypt_1024", |bench| {
        bench.iter(|| {
            consume(|out| unsafe { CryptoContext_Encrypt(b.cc, b.kp, black_box(b.pt), out) })
        })
    });
}

fn bench_eval(c: &mut Criterion) {
    let b = Bench::bfv();
    c.bench_function("bfv_eval_add", |bench| {
        bench.iter(|| {
            consume(|out| unsafe { CryptoContext_EvalAdd(b.cc, b.ct, black_box(b.ct), out) })
        })
    });
    c.bench_function("bfv_eval_mult", |bench| {
        bench.iter(|| {
            consume(|out| unsafe { CryptoContext_EvalMult(b.cc, b.ct, black_box(b.ct), out) })
        })
    });
}

fn bench_rotation(c: &mut Criterion) {
    let b = Bench::bfv();
    let mut order = 0;
    let mut precomp = ptr::null_mut();
    unsafe {
        assert!(CryptoContext_GetCyclotomicOrder(b.cc, &mut order).is_ok());
        assert!(CryptoContext_EvalFastRotationPrecompute(b.cc, b.ct, &mut precomp).is_ok());
    }
    let mut group = c.benchmark_group("rotation");
    group.bench_function("eval_rotate", |bench| {
        bench.iter(|| {
            consume(|out| unsafe { CryptoContext_EvalRotate(b.cc, b.ct, black_box(1), out) })
        })
    });
    group.bench_function("eval_fast_rotation", |bench| {
        bench.iter(|| {
            consume(|out| unsafe {
                CryptoContext_EvalFastRotation(b.cc, b.ct, black_box(1), order, precomp, out)
            })
        })
    });
    group.finish();
    unsafe { DestroyFastRotationPrecomp(precomp) };
}

fn bench_serialization(c: &mut Criterion) {
    let b = Bench::bfv();
    let mut group = c.benchmark_group("serialize_ciphertext");
    group.bench_function("text", |bench| {
        bench.iter(|| unsafe {
            let mut s = ptr::null_mut();
            assert!(SerializeCiphertextToString(black_box(b.ct), &mut s).is_ok());
            FreeString(s);
        })
    });
    group.bench_function("binary", |bench| {
        bench.iter(|| unsafe {
            let (mut buf, mut len) = (ptr::null_mut(), 0);
            assert!(SerializeCiphertextToBytes(black_box(b.ct), &mut buf, &mut len).is_ok());
            FreeBytes(buf, len);
        })
    });
    group.finish();
}

criterion_group!(benches, bench_encrypt, bench_eval, bench_rotation, bench_serialization);
criterion_main!(benches);
