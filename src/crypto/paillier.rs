use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use num_bigint_dig::{BigInt, ModInverse, RandBigInt, RandPrime, ToBigInt};
use num_integer::Integer;
use num_traits::{One, Signed};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;

/// Precomputed `r^n mod n^2` values shared between sessions. Filled in
/// batches, consumed by atomic index; a miss falls back to fresh generation.
#[derive(Debug, Default)]
struct RandomizerPool {
    slots: DashMap<usize, BigInt>,
    head: AtomicUsize,
    tail: AtomicUsize,
}

/// Paillier public operations with `g = n + 1`: additively homomorphic
/// encryption modulo `n`.
#[derive(Debug, Clone)]
pub struct Paillier {
    /// Plaintext modulus.
    pub n: BigInt,
    nn: BigInt,
    pool: Arc<RandomizerPool>,
}

impl PartialEq for Paillier {
    fn eq(&self, other: &Self) -> bool {
        self.n == other.n
    }
}

impl Paillier {
    pub fn from_public(n: BigInt) -> Paillier {
        let nn = &n * &n;
        Paillier { n, nn, pool: Arc::new(RandomizerPool::default()) }
    }

    /// Plaintext is interpreted modulo `n`; `(1 + m*n) * r^n mod n^2`.
    pub fn encrypt<R: Rng>(&self, m: &BigInt, rng: &mut R) -> BigInt {
        let m = m.mod_floor(&self.n);
        let gm = (BigInt::one() + m * &self.n).mod_floor(&self.nn);
        (gm * self.randomizer(rng)).mod_floor(&self.nn)
    }

    pub fn add(&self, c1: &BigInt, c2: &BigInt) -> BigInt {
        (c1 * c2).mod_floor(&self.nn)
    }

    pub fn sub(&self, c1: &BigInt, c2: &BigInt) -> BigInt {
        let inv = c2
            .mod_inverse(&self.nn)
            .expect("ciphertext not invertible mod n^2")
            .mod_floor(&self.nn);
        (c1 * inv).mod_floor(&self.nn)
    }

    /// `c^k mod n^2`; a negative scalar goes through the inverse.
    pub fn scalar_mul(&self, k: &BigInt, c: &BigInt) -> BigInt {
        if k.is_negative() {
            let inv = c
                .mod_inverse(&self.nn)
                .expect("ciphertext not invertible mod n^2")
                .mod_floor(&self.nn);
            inv.modpow(&k.abs(), &self.nn)
        } else {
            c.modpow(k, &self.nn)
        }
    }

    pub fn rerand<R: Rng>(&self, c: &BigInt, rng: &mut R) -> BigInt {
        (c * self.randomizer(rng)).mod_floor(&self.nn)
    }

    /// Rerandomise a whole vector on the rayon pool, one child generator per
    /// element, seeded from the caller's generator.
    pub fn rerand_batch<R: Rng>(&self, cts: Vec<BigInt>, rng: &mut R) -> Vec<BigInt> {
        let seeds: Vec<u64> = (0..cts.len()).map(|_| rng.gen()).collect();
        cts.into_par_iter()
            .zip(seeds)
            .map(|(c, seed)| {
                let mut child = ChaCha20Rng::seed_from_u64(seed);
                self.rerand(&c, &mut child)
            })
            .collect()
    }

    /// Fill the shared pool with `count` fresh `r^n` values in parallel.
    pub fn precompute_randomizers<R: Rng>(&self, count: usize, rng: &mut R) {
        let seeds: Vec<u64> = (0..count).map(|_| rng.gen()).collect();
        let fresh: Vec<BigInt> = seeds
            .into_par_iter()
            .map(|seed| {
                let mut child = ChaCha20Rng::seed_from_u64(seed);
                self.fresh_randomizer(&mut child)
            })
            .collect();

        let base = self.pool.tail.fetch_add(count, Ordering::SeqCst);
        for (i, r) in fresh.into_iter().enumerate() {
            self.pool.slots.insert(base + i, r);
        }
    }

    pub fn pooled_randomizers(&self) -> usize {
        self.pool.slots.len()
    }

    fn randomizer<R: Rng>(&self, rng: &mut R) -> BigInt {
        let idx = self.pool.head.fetch_add(1, Ordering::SeqCst);
        match self.pool.slots.remove(&idx) {
            Some((_, r)) => r,
            None => self.fresh_randomizer(rng),
        }
    }

    fn fresh_randomizer<R: Rng>(&self, rng: &mut R) -> BigInt {
        let r = rng.gen_bigint_range(&BigInt::one(), &self.n);
        r.modpow(&self.n, &self.nn)
    }
}

/// The secret-key half: factorisation of `n`, with `lambda = lcm(p-1, q-1)`
/// and `mu = lambda^-1 mod n`.
#[derive(Debug, Clone)]
pub struct PaillierPriv {
    paillier: Paillier,
    lambda: BigInt,
    mu: BigInt,
}

impl PaillierPriv {
    pub fn keygen<R: Rng>(rng: &mut R, key_bits: usize) -> PaillierPriv {
        let p = rng.gen_prime(key_bits / 2).to_bigint().unwrap();
        let mut q = rng.gen_prime(key_bits / 2).to_bigint().unwrap();
        while q == p {
            q = rng.gen_prime(key_bits / 2).to_bigint().unwrap();
        }

        let n = &p * &q;
        let p1 = &p - BigInt::one();
        let q1 = &q - BigInt::one();
        let lambda = (&p1 * &q1) / p1.gcd(&q1);
        let mu = lambda
            .clone()
            .mod_inverse(&n)
            .expect("lambda invertible mod n")
            .mod_floor(&n);

        PaillierPriv { paillier: Paillier::from_public(n), lambda, mu }
    }

    pub fn public(&self) -> &Paillier {
        &self.paillier
    }

    pub fn decrypt(&self, c: &BigInt) -> BigInt {
        let n = &self.paillier.n;
        let l = (c.modpow(&self.lambda, &self.paillier.nn) - BigInt::one()) / n;
        (l * &self.mu).mod_floor(n)
    }
}

impl fmt::Display for PaillierPriv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PaillierPriv {{ n: {} bits }}", self.paillier.n.bits())
    }
}
