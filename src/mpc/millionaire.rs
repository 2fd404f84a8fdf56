use num_bigint_dig::BigInt;
use num_traits::One;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha20Rng;

use crate::crypto::bit_of;
use crate::crypto::elgamal::{ElGamal, ElGamalCt, ElGamalPriv};

/// Alice's half of the millionaire comparison: she publishes, per bit of her
/// input, an encryption of 1 at her bit's slot and a random encryption at
/// the other, then learns `x > y` from Bob's shuffled response.
pub struct MillionaireAlice {
    eg: ElGamalPriv,
    rng: ChaCha20Rng,
}

impl MillionaireAlice {
    pub fn new(mut rng: ChaCha20Rng, key_bits: usize) -> MillionaireAlice {
        let eg = ElGamalPriv::keygen(&mut rng, key_bits);
        MillionaireAlice { eg, rng }
    }

    pub fn public(&self) -> &ElGamal {
        self.eg.public()
    }

    pub fn gen_table(&mut self, nbits: usize, x: &BigInt) -> Vec<[ElGamalCt; 2]> {
        let pk = self.eg.public().clone();
        (0..nbits)
            .map(|i| {
                let one = pk.encrypt(&BigInt::one(), &mut self.rng);
                let noise = pk.rand_encrypt(&mut self.rng);
                if bit_of(x, i) {
                    [noise, one]
                } else {
                    [one, noise]
                }
            })
            .collect()
    }

    /// `x > y` iff some response entry decrypts to 1.
    pub fn decrypt_round(&self, response: &[ElGamalCt]) -> bool {
        response.iter().any(|c| self.eg.decrypt(c).is_one())
    }
}

/// Bob's half: scans the table from the most significant bit, keeping a
/// prefix product that stays an encryption of 1 exactly while the two
/// inputs agree.
pub struct MillionaireBob {
    eg: ElGamal,
    rng: ChaCha20Rng,
}

impl MillionaireBob {
    pub fn new(eg: ElGamal, rng: ChaCha20Rng) -> MillionaireBob {
        MillionaireBob { eg, rng }
    }

    pub fn encrypt_round(
        &mut self,
        table: &[[ElGamalCt; 2]],
        nbits: usize,
        y: &BigInt,
    ) -> Vec<ElGamalCt> {
        let mut buffer = self.eg.encrypt(&BigInt::one(), &mut self.rng);
        let mut response = Vec::with_capacity(nbits);

        for i in 0..nbits {
            let j = nbits - 1 - i;
            let y_bit = bit_of(y, j);
            let next_buffer = self.eg.mul(&buffer, &table[j][y_bit as usize]);

            let entry = if y_bit {
                // x_j can only tie or lose against y_j = 1
                self.eg.rand_encrypt(&mut self.rng)
            } else {
                let hit = self.eg.mul(&buffer, &table[j][1]);
                self.eg.scalarize(&hit, &mut self.rng)
            };
            response.push(entry);
            buffer = next_buffer;
        }

        response.shuffle(&mut self.rng);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn run_millionaire(x: u64, y: u64, nbits: usize, seed: u64) -> bool {
        let mut alice =
            MillionaireAlice::new(ChaCha20Rng::seed_from_u64(seed), 256);
        let mut bob = MillionaireBob::new(
            alice.public().clone(),
            ChaCha20Rng::seed_from_u64(seed ^ 1),
        );

        let table = alice.gen_table(nbits, &BigInt::from(x));
        let response = bob.encrypt_round(&table, nbits, &BigInt::from(y));
        alice.decrypt_round(&response)
    }

    #[test]
    fn test_greater_detected() {
        assert!(run_millionaire(12, 5, 4, 1200));
        assert!(run_millionaire(8, 7, 4, 1201));
    }

    #[test]
    fn test_smaller_or_equal_not_detected() {
        assert!(!run_millionaire(5, 12, 4, 1202));
        assert!(!run_millionaire(9, 9, 4, 1203));
        assert!(!run_millionaire(0, 0, 4, 1204));
    }

    #[test]
    fn test_exhaustive_three_bits() {
        let mut alice = MillionaireAlice::new(ChaCha20Rng::seed_from_u64(1205), 256);
        let mut bob = MillionaireBob::new(
            alice.public().clone(),
            ChaCha20Rng::seed_from_u64(1206),
        );

        for x in 0..8u64 {
            for y in 0..8u64 {
                let table = alice.gen_table(3, &BigInt::from(x));
                let response = bob.encrypt_round(&table, 3, &BigInt::from(y));
                assert_eq!(alice.decrypt_round(&response), x > y, "x={x} y={y}");
            }
        }
    }
}
