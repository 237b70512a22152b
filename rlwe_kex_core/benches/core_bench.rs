use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rand_chacha::ChaCha20Rng;
use rand_core::SeedableRng;
use rlwe_kex_core::{
    KexPreset, ParameterSet, Party, agreement_trials, all_presets, kex_preset, mod2_reconcile,
    run_exchange, signal,
};

fn bench_ring_multiplication(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_mul");
    for preset in all_presets() {
        let sampler = preset.sampler();
        let mut rng = ChaCha20Rng::from_seed(preset_seed(preset, 0x10));
        let a = sampler.uniform_structural(&mut rng);
        let s = sampler.uniform_small(&mut rng);
        group.bench_function(format!("{}::schoolbook", preset_label(preset)), |b| {
            b.iter(|| black_box(preset.params.multiply(&a, &s)))
        });
    }
}

fn bench_party_steps(c: &mut Criterion) {
    let mut group = c.benchmark_group("party");
    let preset = kex_preset(ParameterSet::Reference);
    let sampler = preset.sampler();
    group.bench_function("calculate_public", |b| {
        let mut rng = ChaCha20Rng::from_seed([1u8; 32]);
        b.iter(|| {
            let (party, value) = Party::new(&sampler, &mut rng).calculate_public();
            black_box((party.stage(), value))
        })
    });

    let mut rng = ChaCha20Rng::from_seed([2u8; 32]);
    let outcome = run_exchange(&sampler, &mut rng).unwrap();
    let private = outcome.alice.private_value().clone();
    let w = signal(&preset.params, &private);
    group.bench_function("signal", |b| {
        b.iter(|| black_box(signal(&preset.params, &private)))
    });
    group.bench_function("mod2_reconcile", |b| {
        b.iter(|| black_box(mod2_reconcile(&preset.params, &private, &w)))
    });
}

fn bench_exchange(c: &mut Criterion) {
    let mut group = c.benchmark_group("exchange");
    for preset in all_presets() {
        let sampler = preset.sampler();
        group.bench_function(format!("{}::run_exchange", preset_label(preset)), |b| {
            let mut rng = ChaCha20Rng::from_seed(preset_seed(preset, 0x20));
            b.iter(|| black_box(run_exchange(&sampler, &mut rng).unwrap().agreed()))
        });
    }
    group.sample_size(10);
    let sampler = kex_preset(ParameterSet::Reference).sampler();
    group.bench_function("reference::agreement_100", |b| {
        let mut rng = ChaCha20Rng::from_seed([3u8; 32]);
        b.iter(|| black_box(agreement_trials(&sampler, 100, &mut rng).unwrap()))
    });
}

fn preset_label(preset: &KexPreset) -> &'static str {
    match preset.set {
        ParameterSet::Compact => "compact",
        ParameterSet::Reference => "reference",
        ParameterSet::Wide => "wide",
    }
}

fn preset_seed(preset: &KexPreset, salt: u8) -> [u8; 32] {
    let mut seed = [0u8; 32];
    seed[0] = salt;
    seed[1] = match preset.set {
        ParameterSet::Compact => 0xA1,
        ParameterSet::Reference => 0xB2,
        ParameterSet::Wide => 0xC3,
    };
    seed
}

criterion_group!(
    benches,
    bench_ring_multiplication,
    bench_party_steps,
    bench_exchange
);
criterion_main!(benches);
