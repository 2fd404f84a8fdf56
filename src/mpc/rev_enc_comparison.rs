use num_bigint_dig::BigInt;
use rand_chacha::ChaCha20Rng;

use crate::crypto::gm::{Gm, GmPriv};
use crate::crypto::paillier::{Paillier, PaillierPriv};
use crate::error::ProtocolError;
use crate::mpc::comparison::{ComparatorA, ComparatorB};
use crate::mpc::enc_comparison::{
    blind_difference, check_modulus, reveal_difference, BlindedInput, RevealedInput,
};

/// Owner half of `RevEncCompare`: same blinding as `EncCompare`, but the
/// Owner plays comparator role A with `r mod 2^l` and the result bit ends
/// with the Helper. All ciphertexts live under the Helper's keys.
pub struct RevEncCompareOwner {
    c_a: BigInt,
    c_b: BigInt,
    bit_length: usize,
    lambda: usize,
    paillier: Paillier,
    gm: Gm,
    comparator: Box<dyn ComparatorA>,
    rng: ChaCha20Rng,
    blind: Option<BlindedInput>,
}

impl RevEncCompareOwner {
    pub fn new(
        c_a: BigInt,
        c_b: BigInt,
        bit_length: usize,
        lambda: usize,
        paillier: Paillier,
        gm: Gm,
        comparator: Box<dyn ComparatorA>,
        rng: ChaCha20Rng,
    ) -> Result<RevEncCompareOwner, ProtocolError> {
        if comparator.bit_length() != bit_length {
            return Err(ProtocolError::desync(
                "rev_enc_compare.new",
                format!(
                    "comparator speaks {} bits, protocol needs {}",
                    comparator.bit_length(),
                    bit_length
                ),
            ));
        }
        check_modulus(&paillier.n, bit_length, lambda, "rev_enc_compare.new")?;
        Ok(RevEncCompareOwner {
            c_a,
            c_b,
            bit_length,
            lambda,
            paillier,
            gm,
            comparator,
            rng,
            blind: None,
        })
    }

    pub fn bit_length(&self) -> usize {
        self.bit_length
    }

    pub fn setup(&mut self) -> Result<BigInt, ProtocolError> {
        let blind = blind_difference(
            &self.c_a,
            &self.c_b,
            self.bit_length,
            self.lambda,
            &self.paillier,
            &mut self.rng,
        )?;
        self.comparator.set_value(blind.r_low.clone());
        let c_z = blind.c_z.clone();
        self.blind = Some(blind);
        Ok(c_z)
    }

    pub fn comparator_mut(&mut self) -> &mut dyn ComparatorA {
        self.comparator.as_mut()
    }

    /// `t xor enc(r_l xor 1)` under the Helper's GM key; the complement
    /// turns the comparator's `<=` into the carry bit.
    pub fn conclude(&mut self) -> Result<BigInt, ProtocolError> {
        let blind = self
            .blind
            .as_ref()
            .ok_or_else(|| ProtocolError::desync("rev_enc_compare.conclude", "setup not run"))?;
        let t = self.comparator.output()?;
        let mask = self.gm.encrypt(!blind.r_bit, &mut self.rng);
        let c_t = self.gm.xor(&t, &mask);
        Ok(self.gm.rerand(&c_t, &mut self.rng))
    }
}

/// Helper half of `RevEncCompare`: plays comparator role B with `z mod 2^l`
/// under its own keys and finishes holding the bit `a < b`.
pub struct RevEncCompareHelper {
    bit_length: usize,
    lambda: usize,
    paillier: PaillierPriv,
    gm: GmPriv,
    comparator: Box<dyn ComparatorB>,
    rng: ChaCha20Rng,
    revealed: Option<RevealedInput>,
    result: Option<bool>,
}

impl RevEncCompareHelper {
    pub fn new(
        bit_length: usize,
        lambda: usize,
        paillier: PaillierPriv,
        gm: GmPriv,
        comparator: Box<dyn ComparatorB>,
        rng: ChaCha20Rng,
    ) -> Result<RevEncCompareHelper, ProtocolError> {
        if comparator.bit_length() != bit_length {
            return Err(ProtocolError::desync(
                "rev_enc_compare.new",
                format!(
                    "comparator speaks {} bits, protocol needs {}",
                    comparator.bit_length(),
                    bit_length
                ),
            ));
        }
        check_modulus(&paillier.public().n, bit_length, lambda, "rev_enc_compare.new")?;
        Ok(RevEncCompareHelper {
            bit_length,
            lambda,
            paillier,
            gm,
            comparator,
            rng,
            revealed: None,
            result: None,
        })
    }

    pub fn bit_length(&self) -> usize {
        self.bit_length
    }

    pub fn setup(&mut self, c_z: &BigInt) -> Result<(), ProtocolError> {
        let revealed = reveal_difference(c_z, self.bit_length, self.lambda, &self.paillier)?;
        self.comparator.set_value(revealed.z_low.clone());
        self.revealed = Some(revealed);
        Ok(())
    }

    pub fn comparator_mut(&mut self) -> &mut dyn ComparatorB {
        self.comparator.as_mut()
    }

    pub fn absorb_result(&mut self, c_t: &BigInt) -> Result<bool, ProtocolError> {
        let revealed = self
            .revealed
            .as_ref()
            .ok_or_else(|| ProtocolError::desync("rev_enc_compare.result", "setup not run"))?;
        let bit = self.gm.decrypt(c_t) ^ revealed.z_bit;
        self.result = Some(bit);
        Ok(bit)
    }

    pub fn output(&self) -> Result<bool, ProtocolError> {
        self.result.ok_or_else(|| {
            ProtocolError::desync("rev_enc_compare.output", "result round has not happened")
        })
    }

    /// The result bit re-encrypted under the Helper's own GM key.
    pub fn output_ct(&mut self) -> Result<BigInt, ProtocolError> {
        let bit = self.output()?;
        Ok(self.gm.encrypt(bit, &mut self.rng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mpc::comparison::run_comparison;
    use crate::mpc::dgk::{DgkA, DgkB};
    use crate::mpc::lsic::{LsicA, LsicB};
    use num_traits::Zero;
    use rand::SeedableRng;
    use std::sync::OnceLock;

    struct Keys {
        paillier: PaillierPriv,
        gm: GmPriv,
    }

    fn keys() -> &'static Keys {
        static KEYS: OnceLock<Keys> = OnceLock::new();
        KEYS.get_or_init(|| {
            let mut rng = ChaCha20Rng::seed_from_u64(31);
            Keys {
                paillier: PaillierPriv::keygen(&mut rng, 512),
                gm: GmPriv::keygen(&mut rng, 256),
            }
        })
    }

    fn run_rev_enc_compare(a: u64, b: u64, bit_length: usize, use_lsic: bool, seed: u64) -> bool {
        let keys = keys();
        let lambda = 40;
        let mut rng = ChaCha20Rng::seed_from_u64(seed);

        let pk = keys.paillier.public();
        let c_a = pk.encrypt(&BigInt::from(a), &mut rng);
        let c_b = pk.encrypt(&BigInt::from(b), &mut rng);

        let comparator_a: Box<dyn ComparatorA> = if use_lsic {
            Box::new(
                LsicA::new(
                    BigInt::zero(),
                    bit_length,
                    keys.gm.public().clone(),
                    ChaCha20Rng::seed_from_u64(seed ^ 1),
                )
                .unwrap(),
            )
        } else {
            Box::new(
                DgkA::new(
                    BigInt::zero(),
                    bit_length,
                    pk.clone(),
                    keys.gm.public().clone(),
                    ChaCha20Rng::seed_from_u64(seed ^ 1),
                )
                .unwrap(),
            )
        };
        let comparator_b: Box<dyn ComparatorB> = if use_lsic {
            Box::new(
                LsicB::new(
                    BigInt::zero(),
                    bit_length,
                    keys.gm.clone(),
                    ChaCha20Rng::seed_from_u64(seed ^ 2),
                )
                .unwrap(),
            )
        } else {
            Box::new(
                DgkB::new(
                    BigInt::zero(),
                    bit_length,
                    keys.paillier.clone(),
                    keys.gm.clone(),
                    ChaCha20Rng::seed_from_u64(seed ^ 2),
                )
                .unwrap(),
            )
        };

        let mut owner = RevEncCompareOwner::new(
            c_a,
            c_b,
            bit_length,
            lambda,
            pk.clone(),
            keys.gm.public().clone(),
            comparator_a,
            ChaCha20Rng::seed_from_u64(seed ^ 3),
        )
        .unwrap();
        let mut helper = RevEncCompareHelper::new(
            bit_length,
            lambda,
            keys.paillier.clone(),
            keys.gm.clone(),
            comparator_b,
            ChaCha20Rng::seed_from_u64(seed ^ 4),
        )
        .unwrap();

        let c_z = owner.setup().unwrap();
        helper.setup(&c_z).unwrap();

        run_comparison(owner.comparator_mut(), helper.comparator_mut()).unwrap();

        let c_t = owner.conclude().unwrap();
        helper.absorb_result(&c_t).unwrap();
        helper.output().unwrap()
    }

    #[test]
    fn test_strict_comparison_both_comparators() {
        for use_lsic in [true, false] {
            assert!(run_rev_enc_compare(3, 11, 5, use_lsic, 1000));
            assert!(!run_rev_enc_compare(11, 3, 5, use_lsic, 1001));
            assert!(!run_rev_enc_compare(17, 17, 5, use_lsic, 1002));
        }
    }

    #[test]
    fn test_boundaries() {
        assert!(run_rev_enc_compare(0, 255, 8, false, 1010));
        assert!(!run_rev_enc_compare(255, 0, 8, false, 1011));
        assert!(!run_rev_enc_compare(0, 0, 8, true, 1012));
        assert!(!run_rev_enc_compare(255, 255, 8, true, 1013));
    }

    #[test]
    fn test_result_ct_round_trips() {
        let keys = keys();
        let mut rng = ChaCha20Rng::seed_from_u64(1020);
        let mut helper = RevEncCompareHelper::new(
            4,
            40,
            keys.paillier.clone(),
            keys.gm.clone(),
            Box::new(
                LsicB::new(BigInt::zero(), 4, keys.gm.clone(), ChaCha20Rng::seed_from_u64(1021))
                    .unwrap(),
            ),
            ChaCha20Rng::seed_from_u64(1022),
        )
        .unwrap();

        let pk = keys.paillier.public();
        let c_a = pk.encrypt(&BigInt::from(2u32), &mut rng);
        let c_b = pk.encrypt(&BigInt::from(9u32), &mut rng);
        let mut owner = RevEncCompareOwner::new(
            c_a,
            c_b,
            4,
            40,
            pk.clone(),
            keys.gm.public().clone(),
            Box::new(
                LsicA::new(
                    BigInt::zero(),
                    4,
                    keys.gm.public().clone(),
                    ChaCha20Rng::seed_from_u64(1023),
                )
                .unwrap(),
            ),
            ChaCha20Rng::seed_from_u64(1024),
        )
        .unwrap();

        let c_z = owner.setup().unwrap();
        helper.setup(&c_z).unwrap();
        run_comparison(owner.comparator_mut(), helper.comparator_mut()).unwrap();
        let c_t = owner.conclude().unwrap();
        helper.absorb_result(&c_t).unwrap();

        let ct = helper.output_ct().unwrap();
        assert!(keys.gm.decrypt(&ct));
    }
}
