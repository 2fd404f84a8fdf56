use std::sync::OnceLock;

use num_bigint_dig::{BigInt, RandBigInt};
use num_traits::Zero;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use private_comparison::crypto::gm::GmPriv;
use private_comparison::crypto::paillier::PaillierPriv;
use private_comparison::error::ProtocolError;
use private_comparison::mpc::comparison::{
    run_comparison, ComparatorA, ComparatorB, ComparatorKind,
};
use private_comparison::mpc::dgk::{DgkA, DgkB};
use private_comparison::mpc::enc_argmax::{LinearArgmaxHelper, LinearArgmaxOwner};
use private_comparison::mpc::enc_comparison::{
    enc_compare_comparison_bits, EncCompareHelper, EncCompareOwner,
};
use private_comparison::mpc::lsic::{LsicA, LsicB};
use private_comparison::mpc::rev_enc_comparison::{RevEncCompareHelper, RevEncCompareOwner};
use private_comparison::network::wire;

const LAMBDA: usize = 40;

struct TestKeys {
    paillier: PaillierPriv,
    gm: GmPriv,
}

fn keys() -> &'static TestKeys {
    static KEYS: OnceLock<TestKeys> = OnceLock::new();
    KEYS.get_or_init(|| {
        let mut rng = ChaCha20Rng::seed_from_u64(2025);
        TestKeys {
            paillier: PaillierPriv::keygen(&mut rng, 512),
            gm: GmPriv::keygen(&mut rng, 256),
        }
    })
}

fn rng(seed: u64) -> ChaCha20Rng {
    ChaCha20Rng::seed_from_u64(seed)
}

fn make_a(kind: ComparatorKind, bits: usize, seed: u64) -> Box<dyn ComparatorA> {
    let keys = keys();
    match kind {
        ComparatorKind::Lsic => Box::new(
            LsicA::new(BigInt::zero(), bits, keys.gm.public().clone(), rng(seed)).unwrap(),
        ),
        ComparatorKind::Dgk => Box::new(
            DgkA::new(
                BigInt::zero(),
                bits,
                keys.paillier.public().clone(),
                keys.gm.public().clone(),
                rng(seed),
            )
            .unwrap(),
        ),
    }
}

fn make_b(kind: ComparatorKind, bits: usize, seed: u64) -> Box<dyn ComparatorB> {
    let keys = keys();
    match kind {
        ComparatorKind::Lsic => {
            Box::new(LsicB::new(BigInt::zero(), bits, keys.gm.clone(), rng(seed)).unwrap())
        }
        ComparatorKind::Dgk => Box::new(
            DgkB::new(
                BigInt::zero(),
                bits,
                keys.paillier.clone(),
                keys.gm.clone(),
                rng(seed),
            )
            .unwrap(),
        ),
    }
}

fn run_lsic(a: &BigInt, b: &BigInt, bits: usize, seed: u64) -> bool {
    let keys = keys();
    let mut party_a =
        LsicA::new(a.clone(), bits, keys.gm.public().clone(), rng(seed)).unwrap();
    let mut party_b = LsicB::new(b.clone(), bits, keys.gm.clone(), rng(seed ^ 1)).unwrap();
    let out = run_comparison(&mut party_a, &mut party_b).unwrap();
    keys.gm.decrypt(&out)
}

fn run_dgk(a: &BigInt, b: &BigInt, bits: usize, seed: u64) -> bool {
    let keys = keys();
    let mut party_a = DgkA::new(
        a.clone(),
        bits,
        keys.paillier.public().clone(),
        keys.gm.public().clone(),
        rng(seed),
    )
    .unwrap();
    let mut party_b =
        DgkB::new(b.clone(), bits, keys.paillier.clone(), keys.gm.clone(), rng(seed ^ 1))
            .unwrap();
    let out = run_comparison(&mut party_a, &mut party_b).unwrap();
    keys.gm.decrypt(&out)
}

fn run_enc_compare(a: &BigInt, b: &BigInt, bits: usize, kind: ComparatorKind, seed: u64) -> bool {
    let keys = keys();
    let pk = keys.paillier.public();
    let mut enc_rng = rng(seed);
    let c_a = pk.encrypt(a, &mut enc_rng);
    let c_b = pk.encrypt(b, &mut enc_rng);

    let cmp_bits = enc_compare_comparison_bits(bits);
    let mut owner = EncCompareOwner::new(
        c_a,
        c_b,
        bits,
        LAMBDA,
        pk.clone(),
        keys.gm.clone(),
        make_b(kind, cmp_bits, seed ^ 1),
        rng(seed ^ 2),
    )
    .unwrap();
    let mut helper = EncCompareHelper::new(
        bits,
        LAMBDA,
        keys.paillier.clone(),
        keys.gm.public().clone(),
        make_a(kind, cmp_bits, seed ^ 3),
        rng(seed ^ 4),
    )
    .unwrap();

    let c_z = owner.setup().unwrap();
    helper.setup(&c_z).unwrap();
    run_comparison(helper.comparator_mut(), owner.comparator_mut()).unwrap();
    let mask_bit = owner.mask_bit().unwrap();
    let c_t = helper.conclude(&mask_bit).unwrap();
    owner.absorb_result(&c_t);
    owner.output().unwrap()
}

fn run_rev_enc_compare(
    a: &BigInt,
    b: &BigInt,
    bits: usize,
    kind: ComparatorKind,
    seed: u64,
) -> bool {
    let keys = keys();
    let pk = keys.paillier.public();
    let mut enc_rng = rng(seed);
    let c_a = pk.encrypt(a, &mut enc_rng);
    let c_b = pk.encrypt(b, &mut enc_rng);

    let mut owner = RevEncCompareOwner::new(
        c_a,
        c_b,
        bits,
        LAMBDA,
        pk.clone(),
        keys.gm.public().clone(),
        make_a(kind, bits, seed ^ 1),
        rng(seed ^ 2),
    )
    .unwrap();
    let mut helper = RevEncCompareHelper::new(
        bits,
        LAMBDA,
        keys.paillier.clone(),
        keys.gm.clone(),
        make_b(kind, bits, seed ^ 3),
        rng(seed ^ 4),
    )
    .unwrap();

    let c_z = owner.setup().unwrap();
    helper.setup(&c_z).unwrap();
    run_comparison(owner.comparator_mut(), helper.comparator_mut()).unwrap();
    let c_t = owner.conclude().unwrap();
    helper.absorb_result(&c_t).unwrap();
    helper.output().unwrap()
}

fn run_argmax(values: &[u64], bits: usize, kind: ComparatorKind, seed: u64) -> usize {
    let keys = keys();
    let pk = keys.paillier.public();
    let mut enc_rng = rng(seed);
    let candidates: Vec<BigInt> =
        values.iter().map(|&v| pk.encrypt(&BigInt::from(v), &mut enc_rng)).collect();

    let mut owner =
        LinearArgmaxOwner::new(&candidates, bits, LAMBDA, pk.clone(), rng(seed ^ 1)).unwrap();
    let mut helper = LinearArgmaxHelper::new(
        values.len(),
        owner.comparison_bits(),
        LAMBDA,
        keys.paillier.clone(),
        rng(seed ^ 2),
    )
    .unwrap();

    let cmp_bits = owner.comparison_bits();
    for round in 0..owner.rounds() {
        let round_seed = seed ^ (round as u64 * 8 + 3);
        let (c_max, c_candidate) = owner.round_operands().unwrap();

        let mut rev_owner = RevEncCompareOwner::new(
            c_max,
            c_candidate,
            cmp_bits,
            LAMBDA,
            pk.clone(),
            keys.gm.public().clone(),
            make_a(kind, cmp_bits, round_seed),
            rng(round_seed ^ 1),
        )
        .unwrap();
        let mut rev_helper = RevEncCompareHelper::new(
            cmp_bits,
            LAMBDA,
            keys.paillier.clone(),
            keys.gm.clone(),
            make_b(kind, cmp_bits, round_seed ^ 2),
            rng(round_seed ^ 3),
        )
        .unwrap();

        let c_z = rev_owner.setup().unwrap();
        rev_helper.setup(&c_z).unwrap();
        run_comparison(rev_owner.comparator_mut(), rev_helper.comparator_mut()).unwrap();
        let c_t = rev_owner.conclude().unwrap();
        let beta = rev_helper.absorb_result(&c_t).unwrap();

        helper.absorb_comparison(beta).unwrap();
        let (masked_max, masked_value) = owner.masked_pair().unwrap();
        let (new_masked_max, choice) = helper.swap(&masked_max, &masked_value).unwrap();
        owner.absorb_swap(&new_masked_max, &choice).unwrap();
    }

    owner.unpermute(helper.final_index().unwrap()).unwrap()
}

fn expected_argmax(values: &[u64]) -> usize {
    let max = values.iter().max().unwrap();
    values.iter().position(|v| v == max).unwrap()
}

#[test]
fn scenario_lsic_smaller() {
    // S1
    assert!(run_lsic(&BigInt::from(40u64), &BigInt::from(42u64), 8, 1));
}

#[test]
fn scenario_lsic_equal() {
    // S2
    assert!(run_lsic(&BigInt::from(42u64), &BigInt::from(42u64), 8, 2));
}

#[test]
fn scenario_lsic_greater() {
    // S3
    assert!(!run_lsic(&BigInt::from(100u64), &BigInt::from(42u64), 8, 3));
}

#[test]
fn scenario_dgk_extremes() {
    // S4
    assert!(run_dgk(&BigInt::zero(), &BigInt::from(0xFFFF_FFFFu64), 32, 4));
}

#[test]
fn scenario_enc_compare_equal_is_zero() {
    // S5
    assert!(!run_enc_compare(
        &BigInt::from(17u64),
        &BigInt::from(17u64),
        5,
        ComparatorKind::Lsic,
        5
    ));
    assert!(!run_enc_compare(
        &BigInt::from(17u64),
        &BigInt::from(17u64),
        5,
        ComparatorKind::Dgk,
        6
    ));
}

#[test]
fn scenario_argmax_first_occurrence() {
    // S6
    assert_eq!(run_argmax(&[3, 17, 9, 17, 5], 8, ComparatorKind::Lsic, 7), 1);
    assert_eq!(run_argmax(&[3, 17, 9, 17, 5], 8, ComparatorKind::Dgk, 8), 1);
}

#[test]
fn fuzz_lsic() {
    let mut rng = rng(0xf001);
    for &bits in &[5usize, 16, 32, 64] {
        let bound = BigInt::from(1u32) << bits;
        for trial in 0..24 {
            let a = rng.gen_bigint_range(&BigInt::zero(), &bound);
            let b = if trial % 6 == 0 { a.clone() } else {
                rng.gen_bigint_range(&BigInt::zero(), &bound)
            };
            let seed = rng.gen();
            assert_eq!(run_lsic(&a, &b, bits, seed), a <= b, "bits={bits} a={a} b={b}");
        }
    }
}

#[test]
fn fuzz_dgk() {
    let mut rng = rng(0xf002);
    for &bits in &[5usize, 16, 32, 64] {
        let bound = BigInt::from(1u32) << bits;
        for trial in 0..8 {
            let a = rng.gen_bigint_range(&BigInt::zero(), &bound);
            let b = if trial % 4 == 0 { a.clone() } else {
                rng.gen_bigint_range(&BigInt::zero(), &bound)
            };
            let seed = rng.gen();
            assert_eq!(run_dgk(&a, &b, bits, seed), a <= b, "bits={bits} a={a} b={b}");
        }
    }
}

#[test]
fn fuzz_enc_compare_both_comparators() {
    let mut rng = rng(0xf003);
    for kind in [ComparatorKind::Lsic, ComparatorKind::Dgk] {
        for &bits in &[5usize, 16] {
            let bound = BigInt::from(1u32) << bits;
            for trial in 0..6 {
                let a = rng.gen_bigint_range(&BigInt::zero(), &bound);
                let b = if trial % 3 == 0 { a.clone() } else {
                    rng.gen_bigint_range(&BigInt::zero(), &bound)
                };
                let seed: u64 = rng.gen();
                let forward = run_enc_compare(&a, &b, bits, kind, seed);
                assert_eq!(forward, a < b, "bits={bits} a={a} b={b}");

                let backward = run_enc_compare(&b, &a, bits, kind, seed ^ 0xff);
                if a != b {
                    assert_ne!(forward, backward, "swap must negate, a={a} b={b}");
                } else {
                    assert!(!backward, "strict comparison on equal inputs");
                }
            }
        }
    }
}

#[test]
fn fuzz_rev_enc_compare_both_comparators() {
    let mut rng = rng(0xf004);
    for kind in [ComparatorKind::Lsic, ComparatorKind::Dgk] {
        for &bits in &[5usize, 16] {
            let bound = BigInt::from(1u32) << bits;
            for trial in 0..6 {
                let a = rng.gen_bigint_range(&BigInt::zero(), &bound);
                let b = if trial % 3 == 0 { a.clone() } else {
                    rng.gen_bigint_range(&BigInt::zero(), &bound)
                };
                let seed = rng.gen();
                assert_eq!(run_rev_enc_compare(&a, &b, bits, kind, seed), a < b);
            }
        }
    }
}

#[test]
fn fuzz_argmax() {
    let mut rng = rng(0xf005);
    for k in 1..=5usize {
        let values: Vec<u64> = (0..k).map(|_| rng.gen_range(0..1u64 << 12)).collect();
        let seed = rng.gen();
        assert_eq!(
            run_argmax(&values, 12, ComparatorKind::Dgk, seed),
            expected_argmax(&values),
            "values={values:?}"
        );
    }
    // repeated maxima across positions
    assert_eq!(run_argmax(&[9, 9, 9, 9], 8, ComparatorKind::Dgk, 0xa1), 0);
    assert_eq!(run_argmax(&[1, 9, 9, 2], 8, ComparatorKind::Lsic, 0xa2), 1);
}

#[test]
fn negative_out_of_range_fails_before_io() {
    let keys = keys();
    let err = LsicA::new(
        BigInt::from(1u32) << 10,
        8,
        keys.gm.public().clone(),
        rng(0xdead),
    );
    assert!(matches!(err, Err(ProtocolError::OutOfRange { .. })));

    let err = DgkB::new(
        BigInt::from(256u32),
        8,
        keys.paillier.clone(),
        keys.gm.clone(),
        rng(0xdeae),
    );
    assert!(matches!(err, Err(ProtocolError::OutOfRange { .. })));
}

#[test]
fn negative_truncated_wire_message() {
    let msg = private_comparison::network::Message::DgkResult(BigInt::from(1234u64));
    let bytes = wire::encode(&msg).unwrap();
    for cut in [0usize, 1, bytes.len() / 2, bytes.len() - 1] {
        let err = wire::decode(&bytes[..cut]);
        assert!(matches!(err, Err(ProtocolError::Decode { .. })), "cut={cut}");
    }
}

#[test]
fn rerand_does_not_change_plaintexts() {
    let keys = keys();
    let mut rng = rng(0xf006);

    let pk = keys.paillier.public();
    let c = pk.encrypt(&BigInt::from(4242u64), &mut rng);
    assert_eq!(keys.paillier.decrypt(&pk.rerand(&c, &mut rng)), BigInt::from(4242u64));

    let gm_pk = keys.gm.public();
    let cb = gm_pk.encrypt(true, &mut rng);
    assert!(keys.gm.decrypt(&gm_pk.rerand(&cb, &mut rng)));
}
