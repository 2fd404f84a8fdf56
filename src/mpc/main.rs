use std::time::Instant;

use num_bigint_dig::{BigInt, RandBigInt};
use num_traits::{One, Zero};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use private_comparison::crypto::gm::GmPriv;
use private_comparison::crypto::paillier::PaillierPriv;
use private_comparison::mpc::comparison::{run_comparison, ComparatorA, ComparatorB};
use private_comparison::mpc::dgk::{DgkA, DgkB};
use private_comparison::mpc::lsic::{LsicA, LsicB};
use private_comparison::mpc::rev_enc_comparison::{RevEncCompareHelper, RevEncCompareOwner};

/// In-process sweep over bit lengths and comparator choices, timing one
/// comparison per configuration.
fn main() {
    let key_bits = 1024;
    let lambda = 100;

    let mut rng = ChaCha20Rng::seed_from_u64(42);
    let mut seed = 0u64;
    let mut next_seed = || {
        seed += 1;
        ChaCha20Rng::seed_from_u64(seed)
    };

    println!("Generating {key_bits}-bit keys...");
    let paillier = PaillierPriv::keygen(&mut rng, key_bits);
    let gm = GmPriv::keygen(&mut rng, key_bits);

    let mut bench_tuples = Vec::new();
    for bit_length in [8usize, 16, 32, 64] {
        for use_lsic in [true, false] {
            bench_tuples.push((bit_length, use_lsic));
        }
    }

    for (bit_length, use_lsic) in bench_tuples {
        let bound = BigInt::one() << bit_length;
        let a = rng.gen_bigint_range(&BigInt::zero(), &bound);
        let b = rng.gen_bigint_range(&BigInt::zero(), &bound);

        let start = Instant::now();
        let result = if use_lsic {
            let mut party_a =
                LsicA::new(a.clone(), bit_length, gm.public().clone(), next_seed()).unwrap();
            let mut party_b = LsicB::new(b.clone(), bit_length, gm.clone(), next_seed()).unwrap();
            let out = run_comparison(&mut party_a, &mut party_b).unwrap();
            gm.decrypt(&out)
        } else {
            let mut party_a = DgkA::new(
                a.clone(),
                bit_length,
                paillier.public().clone(),
                gm.public().clone(),
                next_seed(),
            )
            .unwrap();
            let mut party_b =
                DgkB::new(b.clone(), bit_length, paillier.clone(), gm.clone(), next_seed())
                    .unwrap();
            let out = run_comparison(&mut party_a, &mut party_b).unwrap();
            gm.decrypt(&out)
        };
        let microseconds = start.elapsed().as_micros();

        assert_eq!(result, a <= b);
        let name = if use_lsic { "lsic" } else { "dgk" };
        println!("({name} l = {bit_length}): {microseconds} microseconds");
    }

    // one blinded comparison over encrypted operands, DGK inside
    let bit_length = 32;
    let bound = BigInt::one() << bit_length;
    let a = rng.gen_bigint_range(&BigInt::zero(), &bound);
    let b = rng.gen_bigint_range(&BigInt::zero(), &bound);
    let pk = paillier.public().clone();
    let c_a = pk.encrypt(&a, &mut rng);
    let c_b = pk.encrypt(&b, &mut rng);

    let comparator_a: Box<dyn ComparatorA> = Box::new(
        DgkA::new(
            BigInt::zero(),
            bit_length,
            pk.clone(),
            gm.public().clone(),
            next_seed(),
        )
        .unwrap(),
    );
    let comparator_b: Box<dyn ComparatorB> = Box::new(
        DgkB::new(
            BigInt::zero(),
            bit_length,
            paillier.clone(),
            gm.clone(),
            next_seed(),
        )
        .unwrap(),
    );

    let start = Instant::now();
    let mut owner = RevEncCompareOwner::new(
        c_a,
        c_b,
        bit_length,
        lambda,
        pk.clone(),
        gm.public().clone(),
        comparator_a,
        next_seed(),
    )
    .unwrap();
    let mut helper = RevEncCompareHelper::new(
        bit_length,
        lambda,
        paillier.clone(),
        gm.clone(),
        comparator_b,
        next_seed(),
    )
    .unwrap();

    let c_z = owner.setup().unwrap();
    helper.setup(&c_z).unwrap();
    run_comparison(owner.comparator_mut(), helper.comparator_mut()).unwrap();
    let c_t = owner.conclude().unwrap();
    let result = helper.absorb_result(&c_t).unwrap();
    let microseconds = start.elapsed().as_micros();

    assert_eq!(result, a < b);
    println!("(rev_enc_compare l = {bit_length}): {microseconds} microseconds");
}
