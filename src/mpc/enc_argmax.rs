use num_bigint_dig::{BigInt, RandBigInt};
use num_traits::{One, Zero};
use rand::seq::SliceRandom;
use rand_chacha::ChaCha20Rng;

use crate::crypto::paillier::{Paillier, PaillierPriv};
use crate::error::ProtocolError;

/// Owner half of the linear encrypted argmax. Holds the `k` candidates under
/// the Helper's Paillier key, scans them in a secret permuted order and keeps
/// an encrypted running maximum; only the final permuted index comes back.
///
/// Candidates are lifted to tie-break keys `v * 2^m + (k - 1 - i)` before
/// scanning, so equal values resolve to the smallest original index and the
/// inner comparisons never see a tie.
pub struct LinearArgmaxOwner {
    k: usize,
    bit_length: usize,
    index_bits: usize,
    lambda: usize,
    paillier: Paillier,
    perm: Vec<usize>,
    keys: Vec<BigInt>,
    cur_max: BigInt,
    round: usize,
    masks: Option<(BigInt, BigInt)>,
    rng: ChaCha20Rng,
}

impl LinearArgmaxOwner {
    pub fn new(
        candidates: &[BigInt],
        bit_length: usize,
        lambda: usize,
        paillier: Paillier,
        mut rng: ChaCha20Rng,
    ) -> Result<LinearArgmaxOwner, ProtocolError> {
        let k = candidates.len();
        if k == 0 {
            return Err(ProtocolError::OutOfRange { step: "argmax.new", bit_length });
        }
        let index_bits = index_bits(k);
        let comparison_bits = bit_length + index_bits;
        if paillier.n <= (BigInt::one() << (comparison_bits + lambda + 1)) {
            return Err(ProtocolError::OutOfRange { step: "argmax.new", bit_length });
        }

        let mut perm: Vec<usize> = (0..k).collect();
        perm.shuffle(&mut rng);

        let weight = BigInt::one() << index_bits;
        let keys: Vec<BigInt> = perm
            .iter()
            .map(|&orig| {
                let shifted = paillier.scalar_mul(&weight, &candidates[orig]);
                let tie = BigInt::from((k - 1 - orig) as u64);
                paillier.add(&shifted, &paillier.encrypt(&tie, &mut rng))
            })
            .collect();
        let cur_max = keys[0].clone();

        Ok(LinearArgmaxOwner {
            k,
            bit_length,
            index_bits,
            lambda,
            paillier,
            perm,
            keys,
            cur_max,
            round: 0,
            masks: None,
            rng,
        })
    }

    pub fn elements_number(&self) -> usize {
        self.k
    }

    pub fn rounds(&self) -> usize {
        self.k - 1
    }

    pub fn bit_length(&self) -> usize {
        self.bit_length
    }

    /// Bit length of the tie-break keys the inner comparisons run at.
    pub fn comparison_bits(&self) -> usize {
        self.bit_length + self.index_bits
    }

    /// Operands for round `i`: the running maximum and the next permuted
    /// candidate, to feed a `RevEncCompareOwner`.
    pub fn round_operands(&self) -> Result<(BigInt, BigInt), ProtocolError> {
        if self.round >= self.rounds() {
            return Err(ProtocolError::desync(
                "argmax.round",
                format!("round {} of {}", self.round, self.rounds()),
            ));
        }
        Ok((self.cur_max.clone(), self.keys[self.round + 1].clone()))
    }

    /// The masked pair for the Helper's swap: `cur_max + mu_1` and
    /// `candidate + mu_2`, rerandomised.
    pub fn masked_pair(&mut self) -> Result<(BigInt, BigInt), ProtocolError> {
        let (cur, candidate) = self.round_operands()?;
        let bound = BigInt::one() << (self.comparison_bits() + self.lambda);
        let mu_1 = self.rng.gen_bigint_range(&BigInt::zero(), &bound);
        let mu_2 = self.rng.gen_bigint_range(&BigInt::zero(), &bound);

        let masked_max = self
            .paillier
            .add(&cur, &self.paillier.encrypt(&mu_1, &mut self.rng));
        let masked_value = self
            .paillier
            .add(&candidate, &self.paillier.encrypt(&mu_2, &mut self.rng));

        let masked_max = self.paillier.rerand(&masked_max, &mut self.rng);
        let masked_value = self.paillier.rerand(&masked_value, &mut self.rng);
        self.masks = Some((mu_1, mu_2));
        Ok((masked_max, masked_value))
    }

    /// Recover `enc(new_max)` from the Helper's swap without learning which
    /// branch was taken: the mask to subtract is
    /// `enc(beta)^(mu_2 - mu_1) * enc(mu_1)`.
    pub fn absorb_swap(
        &mut self,
        new_masked_max: &BigInt,
        choice: &BigInt,
    ) -> Result<(), ProtocolError> {
        let (mu_1, mu_2) = self
            .masks
            .take()
            .ok_or_else(|| ProtocolError::desync("argmax.swap", "swap before masked pair"))?;

        let diff = &mu_2 - &mu_1;
        let mask = self.paillier.add(
            &self.paillier.scalar_mul(&diff, choice),
            &self.paillier.encrypt(&mu_1, &mut self.rng),
        );
        self.cur_max = self.paillier.sub(new_masked_max, &mask);
        self.round += 1;
        Ok(())
    }

    /// Invert the secret permutation on the Helper's final index.
    pub fn unpermute(&self, permuted: usize) -> Result<usize, ProtocolError> {
        if self.round != self.rounds() {
            return Err(ProtocolError::desync(
                "argmax.final",
                format!("final index after round {} of {}", self.round, self.rounds()),
            ));
        }
        if permuted >= self.k {
            return Err(ProtocolError::desync(
                "argmax.final",
                format!("permuted index {} out of {}", permuted, self.k),
            ));
        }
        Ok(self.perm[permuted])
    }
}

/// Bits reserved for the tie-break suffix of the comparison keys.
pub fn index_bits(k: usize) -> usize {
    if k <= 1 {
        0
    } else {
        (usize::BITS - (k - 1).leading_zeros()) as usize
    }
}

/// Helper half: decrypts each comparison bit and each masked pair, keeps the
/// running permuted index of the maximum, and re-encrypts the selected
/// branch together with the choice bit.
pub struct LinearArgmaxHelper {
    k: usize,
    comparison_bits: usize,
    lambda: usize,
    paillier: PaillierPriv,
    round: usize,
    cur_idx: usize,
    beta: Option<bool>,
    rng: ChaCha20Rng,
}

impl LinearArgmaxHelper {
    pub fn new(
        k: usize,
        comparison_bits: usize,
        lambda: usize,
        paillier: PaillierPriv,
        rng: ChaCha20Rng,
    ) -> Result<LinearArgmaxHelper, ProtocolError> {
        if k == 0 {
            return Err(ProtocolError::OutOfRange { step: "argmax.new", bit_length: comparison_bits });
        }
        Ok(LinearArgmaxHelper {
            k,
            comparison_bits,
            lambda,
            paillier,
            round: 0,
            cur_idx: 0,
            beta: None,
            rng,
        })
    }

    pub fn rounds(&self) -> usize {
        self.k - 1
    }

    pub fn is_complete(&self) -> bool {
        self.round == self.rounds()
    }

    /// Fold in the round's comparison outcome `beta = (cur_max < candidate)`.
    pub fn absorb_comparison(&mut self, beta: bool) -> Result<(), ProtocolError> {
        if self.round >= self.rounds() {
            return Err(ProtocolError::desync(
                "argmax.round",
                format!("comparison in round {} of {}", self.round, self.rounds()),
            ));
        }
        if beta {
            self.cur_idx = self.round + 1;
        }
        self.beta = Some(beta);
        Ok(())
    }

    pub fn swap(
        &mut self,
        masked_max: &BigInt,
        masked_value: &BigInt,
    ) -> Result<(BigInt, BigInt), ProtocolError> {
        let beta = self
            .beta
            .take()
            .ok_or_else(|| ProtocolError::desync("argmax.swap", "swap before comparison"))?;

        let bound = BigInt::one() << (self.comparison_bits + self.lambda + 1);
        let m = self.paillier.decrypt(masked_max);
        let v = self.paillier.decrypt(masked_value);
        if m >= bound || v >= bound {
            return Err(ProtocolError::inconsistent(
                "argmax.swap",
                "masked value exceeds the statistical bound",
            ));
        }

        let selected = if beta { v } else { m };
        let pk = self.paillier.public();
        let new_masked_max = pk.encrypt(&selected, &mut self.rng);
        let choice = pk.encrypt(&BigInt::from(beta as u8), &mut self.rng);
        self.round += 1;
        Ok((new_masked_max, choice))
    }

    pub fn final_index(&self) -> Result<usize, ProtocolError> {
        if self.round != self.rounds() {
            return Err(ProtocolError::desync(
                "argmax.final",
                format!("final index after round {} of {}", self.round, self.rounds()),
            ));
        }
        Ok(self.cur_idx)
    }
}
