use rlwe_kex_core::{
    KexError, Party, Polynomial, Stage, all_presets, channel_pair, run_exchange, run_initiator,
    run_responder, secure_rng,
};
use std::thread;

#[test]
#[ignore]
fn fuzz_random_exchanges() {
    // Fresh OS entropy per exchange; only structural invariants are checked.
    let mut rng = secure_rng();
    for preset in all_presets() {
        let sampler = preset.sampler();
        let q = preset.params.modulus;
        let half = (q - 1) / 2;
        for _ in 0..64 {
            let outcome = run_exchange(&sampler, &mut rng).unwrap();
            let transcript = outcome.transcript();
            for poly in [&transcript.alice_public, &transcript.bob_public] {
                assert!(poly.coeffs().iter().all(|&c| (-half..=half).contains(&c)));
            }
            assert!(transcript.structural.coeffs().iter().all(|&c| (0..=q).contains(&c)));
            assert!(transcript.signal.coeffs().iter().all(|&w| w == 0 || w == 1));
            assert_eq!(transcript.alice_key.len(), preset.params.degree);
        }
    }
}

#[test]
#[ignore]
fn fuzz_threaded_protocol() {
    for preset in all_presets() {
        let sampler = preset.sampler();
        let (mut left, mut right) = channel_pair();
        let responder = thread::spawn(move || {
            let mut rng = secure_rng();
            run_responder(&sampler, &mut rng, &mut right, b"fuzz")
        });
        let mut rng = secure_rng();
        let initiator = run_initiator(&preset.sampler(), &mut rng, &mut left, b"fuzz").unwrap();
        let responder = responder.join().unwrap().unwrap();
        assert_eq!(initiator.signal, responder.signal);
        assert_eq!(initiator.confirmed, responder.confirmed);
        assert_eq!(
            initiator.confirmed,
            initiator.key_stream == responder.key_stream
        );
    }
}

#[test]
#[ignore]
fn fuzz_malformed_counterpart_values() {
    let mut rng = secure_rng();
    for preset in all_presets() {
        let sampler = preset.sampler();
        let n = preset.params.degree;
        for wrong in [0, 1, n - 1, n + 1, 2 * n] {
            let (party, _) = Party::new(&sampler, &mut rng).calculate_public();
            let err = party
                .calculate_private(&Polynomial::zero(wrong))
                .unwrap_err();
            assert!(matches!(err, KexError::DimensionMismatch { found, .. } if found == wrong));
        }
        let (party, _) = Party::new(&sampler, &mut rng).calculate_public();
        assert_eq!(party.stage(), Stage::PublicComputed);
    }
}
