use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tessera_types::Bip44;

fn ed25519_sign_bench(c: &mut Criterion) {
    let kp = tessera_crypto::generate_keypair();
    let hash = [42u8; 32];

    c.bench_function("ed25519_sign_essence_hash", |b| {
        b.iter(|| tessera_crypto::sign_message(black_box(&hash), &kp.private))
    });
}

fn ed25519_verify_bench(c: &mut Criterion) {
    let kp = tessera_crypto::generate_keypair();
    let hash = [42u8; 32];
    let sig = tessera_crypto::sign_message(&hash, &kp.private);

    c.bench_function("ed25519_verify_essence_hash", |b| {
        b.iter(|| tessera_crypto::verify_signature(black_box(&hash), &sig, &kp.public))
    });
}

fn blake2b_256_1kb_bench(c: &mut Criterion) {
    let data = vec![0xCDu8; 1024];

    c.bench_function("blake2b_256_1KB", |b| {
        b.iter(|| tessera_crypto::blake2b_256(black_box(&data)))
    });
}

fn slip10_derive_bench(c: &mut Criterion) {
    let seed = [7u8; 64];
    let chain = Bip44::new(4218, 0, false, 0);

    c.bench_function("slip10_derive_bip44", |b| {
        b.iter(|| tessera_crypto::derive_keypair(black_box(&seed), &chain))
    });
}

criterion_group!(
    benches,
    ed25519_sign_bench,
    ed25519_verify_bench,
    blake2b_256_1kb_bench,
    slip10_derive_bench,
);
criterion_main!(benches);
