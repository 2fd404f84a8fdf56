use num_bigint_dig::{BigInt, RandBigInt};
use num_traits::{One, Zero};
use rand::Rng;
use rand_chacha::ChaCha20Rng;

use crate::crypto::gm::{Gm, GmPriv};
use crate::crypto::paillier::{Paillier, PaillierPriv};
use crate::crypto::{bit_of, low_bits};
use crate::error::ProtocolError;
use crate::mpc::comparison::{ComparatorA, ComparatorB};

/// Owner-side residue of the blinding step: `c_z` goes to the Helper, the
/// mask residues stay local.
pub(crate) struct BlindedInput {
    pub r_low: BigInt,
    pub r_bit: bool,
    pub c_z: BigInt,
}

/// The mask only hides statistically if `n > 2^(l+lambda+1)`.
pub(crate) fn check_modulus(
    n: &BigInt,
    bit_length: usize,
    lambda: usize,
    step: &'static str,
) -> Result<(), ProtocolError> {
    if *n <= (BigInt::one() << (bit_length + lambda + 1)) {
        return Err(ProtocolError::OutOfRange { step, bit_length });
    }
    Ok(())
}

/// `c_z = c_b - c_a + enc(2^l - 1 + r)` with `r` uniform over
/// `[0, 2^(l+lambda))`. The `- 1` turns the bit-level `<=` into the
/// wrapper-level strict `<`.
pub(crate) fn blind_difference<R: Rng>(
    c_a: &BigInt,
    c_b: &BigInt,
    bit_length: usize,
    lambda: usize,
    paillier: &Paillier,
    rng: &mut R,
) -> Result<BlindedInput, ProtocolError> {
    check_modulus(&paillier.n, bit_length, lambda, "enc_compare.blind")?;

    let r = rng.gen_bigint_range(&BigInt::zero(), &(BigInt::one() << (bit_length + lambda)));
    let shift = (BigInt::one() << bit_length) - BigInt::one() + &r;
    let c_z = paillier.add(&paillier.sub(c_b, c_a), &paillier.encrypt(&shift, rng));

    Ok(BlindedInput { r_low: low_bits(&r, bit_length), r_bit: bit_of(&r, bit_length), c_z })
}

/// Helper-side residue after decrypting `c_z`.
pub(crate) struct RevealedInput {
    pub z_low: BigInt,
    pub z_bit: bool,
}

pub(crate) fn reveal_difference(
    c_z: &BigInt,
    bit_length: usize,
    lambda: usize,
    paillier: &PaillierPriv,
) -> Result<RevealedInput, ProtocolError> {
    let z = paillier.decrypt(c_z);
    if z >= (BigInt::one() << (bit_length + lambda + 1)) {
        return Err(ProtocolError::inconsistent(
            "enc_compare.reveal",
            format!("blinded difference exceeds {} bits", bit_length + lambda + 1),
        ));
    }
    Ok(RevealedInput { z_low: low_bits(&z, bit_length), z_bit: bit_of(&z, bit_length) })
}

/// Bit length the embedded comparator must use for `EncCompare`: the Helper
/// compares `z' + 1`, which needs one bit of headroom.
pub fn enc_compare_comparison_bits(bit_length: usize) -> usize {
    bit_length + 1
}

/// Owner half of `EncCompare`: holds `enc(a)`, `enc(b)` under the Helper's
/// Paillier key; ends with the bit `a < b` under its own GM key. Plays
/// comparator role B with its own GM secret.
pub struct EncCompareOwner {
    c_a: BigInt,
    c_b: BigInt,
    bit_length: usize,
    lambda: usize,
    paillier: Paillier,
    gm: GmPriv,
    comparator: Box<dyn ComparatorB>,
    rng: ChaCha20Rng,
    blind: Option<BlindedInput>,
    result: Option<bool>,
}

impl EncCompareOwner {
    pub fn new(
        c_a: BigInt,
        c_b: BigInt,
        bit_length: usize,
        lambda: usize,
        paillier: Paillier,
        gm: GmPriv,
        comparator: Box<dyn ComparatorB>,
        rng: ChaCha20Rng,
    ) -> Result<EncCompareOwner, ProtocolError> {
        if comparator.bit_length() != enc_compare_comparison_bits(bit_length) {
            return Err(ProtocolError::desync(
                "enc_compare.new",
                format!(
                    "comparator speaks {} bits, protocol needs {}",
                    comparator.bit_length(),
                    enc_compare_comparison_bits(bit_length)
                ),
            ));
        }
        check_modulus(&paillier.n, bit_length, lambda, "enc_compare.new")?;
        Ok(EncCompareOwner {
            c_a,
            c_b,
            bit_length,
            lambda,
            paillier,
            gm,
            comparator,
            rng,
            blind: None,
            result: None,
        })
    }

    pub fn bit_length(&self) -> usize {
        self.bit_length
    }

    /// Produce `c_z` for the Helper and point the comparator at `r mod 2^l`.
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

    pub fn comparator_mut(&mut self) -> &mut dyn ComparatorB {
        self.comparator.as_mut()
    }

    /// `enc_GM(r_l)` under the Owner's own key, for the Helper's conclusion.
    pub fn mask_bit(&mut self) -> Result<BigInt, ProtocolError> {
        let blind = self
            .blind
            .as_ref()
            .ok_or_else(|| ProtocolError::desync("enc_compare.mask_bit", "setup not run"))?;
        Ok(self.gm.encrypt(blind.r_bit, &mut self.rng))
    }

    pub fn absorb_result(&mut self, c_t: &BigInt) -> bool {
        let bit = self.gm.decrypt(c_t);
        self.result = Some(bit);
        bit
    }

    pub fn output(&self) -> Result<bool, ProtocolError> {
        self.result.ok_or_else(|| {
            ProtocolError::desync("enc_compare.output", "result round has not happened")
        })
    }
}

/// Helper half of `EncCompare`: decrypts the blinded difference and plays
/// comparator role A with `z' + 1` under the Owner's GM key.
pub struct EncCompareHelper {
    bit_length: usize,
    lambda: usize,
    paillier: PaillierPriv,
    gm: Gm,
    comparator: Box<dyn ComparatorA>,
    rng: ChaCha20Rng,
    revealed: Option<RevealedInput>,
}

impl EncCompareHelper {
    pub fn new(
        bit_length: usize,
        lambda: usize,
        paillier: PaillierPriv,
        gm: Gm,
        comparator: Box<dyn ComparatorA>,
        rng: ChaCha20Rng,
    ) -> Result<EncCompareHelper, ProtocolError> {
        if comparator.bit_length() != enc_compare_comparison_bits(bit_length) {
            return Err(ProtocolError::desync(
                "enc_compare.new",
                format!(
                    "comparator speaks {} bits, protocol needs {}",
                    comparator.bit_length(),
                    enc_compare_comparison_bits(bit_length)
                ),
            ));
        }
        check_modulus(&paillier.public().n, bit_length, lambda, "enc_compare.new")?;
        Ok(EncCompareHelper { bit_length, lambda, paillier, gm, comparator, rng, revealed: None })
    }

    pub fn bit_length(&self) -> usize {
        self.bit_length
    }

    pub fn setup(&mut self, c_z: &BigInt) -> Result<(), ProtocolError> {
        let revealed = reveal_difference(c_z, self.bit_length, self.lambda, &self.paillier)?;
        self.comparator.set_value(&revealed.z_low + BigInt::one());
        self.revealed = Some(revealed);
        Ok(())
    }

    pub fn comparator_mut(&mut self) -> &mut dyn ComparatorA {
        self.comparator.as_mut()
    }

    /// Fold `z_l` and the Owner's `enc(r_l)` into the comparator output;
    /// the Owner decrypts `carry xor r_l xor z_l = (a < b)`.
    pub fn conclude(&mut self, c_r_bit: &BigInt) -> Result<BigInt, ProtocolError> {
        let revealed = self
            .revealed
            .as_ref()
            .ok_or_else(|| ProtocolError::desync("enc_compare.conclude", "setup not run"))?;
        let t = self.comparator.output()?;
        let z_bit = self.gm.encrypt(revealed.z_bit, &mut self.rng);
        let c_t = self.gm.xor(&t, &self.gm.xor(c_r_bit, &z_bit));
        Ok(self.gm.rerand(&c_t, &mut self.rng))
    }
}
