use once_cell::sync::Lazy;
use rlwe_kex_core::{
    KexError, ParameterSet, PartySession, RingParams, Sampler, Stage, StructuralRange,
    agreement_trials, derive_rng, derive_trial_rng, kex_preset, run_exchange,
};

static REFERENCE: Lazy<Sampler> = Lazy::new(|| kex_preset(ParameterSet::Reference).sampler());

#[test]
fn reference_parameters_agree_almost_always() {
    let mut rng = derive_rng(b"agreement-reference");
    let report = agreement_trials(&REFERENCE, 1000, &mut rng).unwrap();
    assert_eq!(report.trials, 1000);
    assert!(
        report.failures() <= 10,
        "too many failed exchanges: {}",
        report.failures()
    );
}

#[test]
fn seeded_exchanges_replay_identically() {
    for index in 0..4 {
        let first = run_exchange(&REFERENCE, &mut derive_trial_rng(b"replay", index))
            .unwrap()
            .transcript();
        let second = run_exchange(&REFERENCE, &mut derive_trial_rng(b"replay", index))
            .unwrap()
            .transcript();
        assert_eq!(first, second);
    }
    let other = run_exchange(&REFERENCE, &mut derive_trial_rng(b"replay", 9))
        .unwrap()
        .transcript();
    let first = run_exchange(&REFERENCE, &mut derive_trial_rng(b"replay", 0))
        .unwrap()
        .transcript();
    assert_ne!(first.structural, other.structural);
}

#[test]
fn every_preset_produces_full_length_keys() {
    for set in [ParameterSet::Compact, ParameterSet::Reference, ParameterSet::Wide] {
        for range in [StructuralRange::Inclusive, StructuralRange::HalfOpen] {
            let preset = kex_preset(set).with_structural_range(range);
            let mut rng = derive_rng(format!("preset-{set:?}-{range:?}").as_bytes());
            let outcome = run_exchange(&preset.sampler(), &mut rng).unwrap();
            let n = preset.params.degree;
            assert_eq!(outcome.alice.key_stream().len(), n);
            assert_eq!(outcome.bob.key_stream().len(), n);
            assert!(outcome.alice.key_stream().bits().iter().all(|&b| b <= 1));
        }
    }
}

#[test]
fn sessions_follow_the_same_protocol() {
    let sampler = Sampler::new(RingParams::new(3079, 32, 5).unwrap());
    let mut rng = derive_rng(b"agreement-sessions");
    let mut alice = PartySession::new(&sampler, &mut rng);
    let structural = alice.calculate_public().unwrap().structural;
    let mut bob = PartySession::with_structural(&sampler, structural, &mut rng).unwrap();

    let alice_public = alice.public_value().unwrap().clone();
    let bob_public = bob.calculate_public().unwrap().public;
    alice.calculate_private(&bob_public).unwrap();
    bob.calculate_private(&alice_public).unwrap();

    let signal = alice.generate_signal().unwrap();
    assert_eq!(bob.stage(), Some(Stage::PrivateComputed));
    assert!(matches!(
        bob.reconcile_key(None),
        Err(KexError::ProtocolOrderViolation { .. })
    ));
    let alice_key = alice.reconcile_key(None).unwrap().clone();
    let bob_key = bob.reconcile_key(Some(&signal)).unwrap().clone();
    assert_eq!(alice_key.len(), 32);
    assert_eq!(alice_key, bob_key);
}
