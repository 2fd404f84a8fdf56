use num_bigint_dig::{BigInt, RandBigInt, RandPrime, ToBigInt};
use num_integer::Integer;
use num_traits::One;
use rand::Rng;

/// A multiplicative ElGamal ciphertext `(g^r, m * h^r)`.
pub type ElGamalCt = (BigInt, BigInt);

/// Multiplicatively homomorphic ElGamal over `Z_p*`.
#[derive(Debug, Clone, PartialEq)]
pub struct ElGamal {
    pub p: BigInt,
    pub g: BigInt,
    pub h: BigInt,
}

impl ElGamal {
    pub fn from_public(p: BigInt, g: BigInt, h: BigInt) -> ElGamal {
        ElGamal { p, g, h }
    }

    pub fn encrypt<R: Rng>(&self, m: &BigInt, rng: &mut R) -> ElGamalCt {
        let r = self.exponent(rng);
        let c1 = self.g.modpow(&r, &self.p);
        let c2 = (m.mod_floor(&self.p) * self.h.modpow(&r, &self.p)).mod_floor(&self.p);
        (c1, c2)
    }

    /// Encryption of a random group element.
    pub fn rand_encrypt<R: Rng>(&self, rng: &mut R) -> ElGamalCt {
        let m = rng.gen_bigint_range(&BigInt::from(2u32), &self.p);
        self.encrypt(&m, rng)
    }

    pub fn mul(&self, c1: &ElGamalCt, c2: &ElGamalCt) -> ElGamalCt {
        (
            (&c1.0 * &c2.0).mod_floor(&self.p),
            (&c1.1 * &c2.1).mod_floor(&self.p),
        )
    }

    /// Raise to a random exponent: an encryption of 1 stays an encryption of
    /// 1, anything else becomes an encryption of a random element.
    pub fn scalarize<R: Rng>(&self, c: &ElGamalCt, rng: &mut R) -> ElGamalCt {
        let e = self.exponent(rng);
        (c.0.modpow(&e, &self.p), c.1.modpow(&e, &self.p))
    }

    fn exponent<R: Rng>(&self, rng: &mut R) -> BigInt {
        rng.gen_bigint_range(&BigInt::one(), &(&self.p - BigInt::one()))
    }
}

#[derive(Debug, Clone)]
pub struct ElGamalPriv {
    eg: ElGamal,
    x: BigInt,
}

impl ElGamalPriv {
    pub fn keygen<R: Rng>(rng: &mut R, key_bits: usize) -> ElGamalPriv {
        let p = rng.gen_prime(key_bits).to_bigint().unwrap();
        let g = rng.gen_bigint_range(&BigInt::from(2u32), &(&p - BigInt::one()));
        let x = rng.gen_bigint_range(&BigInt::one(), &(&p - BigInt::one()));
        let h = g.modpow(&x, &p);

        ElGamalPriv { eg: ElGamal { p, g, h }, x }
    }

    pub fn public(&self) -> &ElGamal {
        &self.eg
    }

    pub fn decrypt(&self, c: &ElGamalCt) -> BigInt {
        let p = &self.eg.p;
        // c1^(p-1-x) = c1^-x for c1 in Z_p*
        let exp = p - BigInt::one() - &self.x;
        (c.0.modpow(&exp, p) * &c.1).mod_floor(p)
    }
}
