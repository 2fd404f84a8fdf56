use std::fmt;

use num_bigint_dig::{BigInt, RandBigInt, RandPrime, ToBigInt};
use num_integer::Integer;
use num_traits::One;
use rand::Rng;

/// Goldwasser-Micali public operations: XOR-homomorphic encryption of single
/// bits. A ciphertext of `b` is `x^2 * y^b mod n` for a random `x`.
#[derive(Debug, Clone, PartialEq)]
pub struct Gm {
    /// Modulus `n = p * q` with `p = q = 3 (mod 4)`.
    pub n: BigInt,
    /// Pseudosquare: a quadratic non-residue with Jacobi symbol 1.
    pub y: BigInt,
}

impl Gm {
    pub fn from_public(n: BigInt, y: BigInt) -> Gm {
        Gm { n, y }
    }

    pub fn encrypt<R: Rng>(&self, bit: bool, rng: &mut R) -> BigInt {
        let x = rng.gen_bigint_range(&BigInt::one(), &self.n);
        let c = (&x * &x).mod_floor(&self.n);
        if bit {
            (c * &self.y).mod_floor(&self.n)
        } else {
            c
        }
    }

    pub fn xor(&self, c1: &BigInt, c2: &BigInt) -> BigInt {
        (c1 * c2).mod_floor(&self.n)
    }

    /// Multiply by a fresh encryption of zero.
    pub fn rerand<R: Rng>(&self, c: &BigInt, rng: &mut R) -> BigInt {
        let x = rng.gen_bigint_range(&BigInt::one(), &self.n);
        (c * (&x * &x)).mod_floor(&self.n)
    }
}

/// The secret-key half: factorisation of `n`.
#[derive(Debug, Clone)]
pub struct GmPriv {
    gm: Gm,
    p: BigInt,
    /// (p - 1) / 2, the Legendre exponent mod p.
    half_p: BigInt,
}

impl GmPriv {
    /// Two Blum primes, so `y = n - 1` is a non-residue mod both factors.
    pub fn keygen<R: Rng>(rng: &mut R, key_bits: usize) -> GmPriv {
        let p = gen_blum_prime(rng, key_bits / 2);
        let mut q = gen_blum_prime(rng, key_bits / 2);
        while q == p {
            q = gen_blum_prime(rng, key_bits / 2);
        }

        let n = &p * &q;
        let y = &n - BigInt::one();
        let half_p = (&p - BigInt::one()) >> 1;

        GmPriv { gm: Gm { n, y }, p, half_p }
    }

    pub fn public(&self) -> &Gm {
        &self.gm
    }

    pub fn encrypt<R: Rng>(&self, bit: bool, rng: &mut R) -> BigInt {
        self.gm.encrypt(bit, rng)
    }

    /// A bit is 1 iff the ciphertext is a non-residue mod p.
    pub fn decrypt(&self, c: &BigInt) -> bool {
        let legendre = c.mod_floor(&self.p).modpow(&self.half_p, &self.p);
        !legendre.is_one()
    }
}

impl fmt::Display for GmPriv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GmPriv {{ n: {} bits }}", self.gm.n.bits())
    }
}

fn gen_blum_prime<R: Rng>(rng: &mut R, bits: usize) -> BigInt {
    loop {
        let p = rng.gen_prime(bits).to_bigint().unwrap();
        if p.mod_floor(&BigInt::from(4u32)) == BigInt::from(3u32) {
            return p;
        }
    }
}
