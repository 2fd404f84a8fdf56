use num_bigint_dig::{BigInt, RandBigInt};
use num_traits::{One, Zero};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha20Rng;

use crate::crypto::bit_of;
use crate::crypto::gm::{Gm, GmPriv};
use crate::crypto::paillier::{Paillier, PaillierPriv};
use crate::error::ProtocolError;
use crate::mpc::comparison::{
    AStep, BStep, ComparatorA, ComparatorB, ComparatorKind, ComparisonMsg,
};

enum DgkAPhase {
    WaitBits,
    WaitResult,
    Done,
}

/// Role A of the DGK comparison. Receives B's encrypted bits, answers with a
/// blinded, shuffled vector whose zero entry (if any) encodes the comparison,
/// then unblinds B's GM-encrypted zero flag into `a <= b`.
pub struct DgkA {
    a: BigInt,
    bit_length: usize,
    paillier: Paillier,
    gm: Gm,
    rng: ChaCha20Rng,
    s_positive: bool,
    phase: DgkAPhase,
    res: Option<BigInt>,
}

impl DgkA {
    pub fn new(
        a: BigInt,
        bit_length: usize,
        paillier: Paillier,
        gm: Gm,
        rng: ChaCha20Rng,
    ) -> Result<DgkA, ProtocolError> {
        if bit_length == 0 || a < BigInt::zero() || a >= (BigInt::one() << bit_length) {
            return Err(ProtocolError::OutOfRange { step: "dgk.new", bit_length });
        }
        Ok(DgkA {
            a,
            bit_length,
            paillier,
            gm,
            rng,
            s_positive: true,
            phase: DgkAPhase::WaitBits,
            res: None,
        })
    }

    /// `enc(a_i xor b_i)` from `enc(b_i)` and A's own bit.
    fn compute_w(&mut self, c_b: &[BigInt]) -> Vec<BigInt> {
        let one = self.paillier.encrypt(&BigInt::one(), &mut self.rng);
        c_b.iter()
            .enumerate()
            .map(|(i, cb)| {
                if bit_of(&self.a, i) {
                    self.paillier.sub(&one, cb)
                } else {
                    cb.clone()
                }
            })
            .collect()
    }

    /// Suffix sums over the more-significant positions; the final
    /// accumulator is the sum over all of them.
    fn compute_sums(&mut self, c_w: &[BigInt]) -> (Vec<BigInt>, BigInt) {
        let mut acc = self.paillier.encrypt(&BigInt::zero(), &mut self.rng);
        let mut sums = vec![BigInt::zero(); c_w.len()];
        for i in (0..c_w.len()).rev() {
            sums[i] = acc.clone();
            acc = self.paillier.add(&acc, &c_w[i]);
        }
        (sums, acc)
    }

    /// The DGK entries `s + a_i - b_i + 3*sum_i`, plus the equality entry
    /// `s - 1 + 3*sum_all`, each multiplied by a fresh non-zero scalar so
    /// that B's decryptions reveal only whether an entry is zero.
    fn compute_c(&mut self, c_b: &[BigInt], sums: &[BigInt], total: &BigInt) -> Vec<BigInt> {
        let s = if self.s_positive { BigInt::one() } else { -BigInt::one() };
        let three = BigInt::from(3u32);

        let mut out = Vec::with_capacity(self.bit_length + 1);
        for i in 0..self.bit_length {
            let a_i = BigInt::from(bit_of(&self.a, i) as u32);
            let constant = self.paillier.encrypt(&(&s + a_i), &mut self.rng);
            let entry = self.paillier.add(
                &self.paillier.sub(&constant, &c_b[i]),
                &self.paillier.scalar_mul(&three, &sums[i]),
            );
            out.push(self.blind(&entry));
        }

        let eq_constant = self.paillier.encrypt(&(&s - BigInt::one()), &mut self.rng);
        let eq = self
            .paillier
            .add(&eq_constant, &self.paillier.scalar_mul(&three, total));
        out.push(self.blind(&eq));
        out
    }

    fn blind(&mut self, c: &BigInt) -> BigInt {
        let r = self.rng.gen_bigint_range(&BigInt::one(), &self.paillier.n);
        self.paillier.scalar_mul(&r, c)
    }

    pub fn respond(&mut self, c_b: &[BigInt]) -> Result<Vec<BigInt>, ProtocolError> {
        if c_b.len() != self.bit_length {
            return Err(ProtocolError::desync(
                "dgk.respond",
                format!("{} encrypted bits for bit length {}", c_b.len(), self.bit_length),
            ));
        }

        self.s_positive = self.rng.gen_bool(0.5);
        let c_w = self.compute_w(c_b);
        let (sums, total) = self.compute_sums(&c_w);
        let entries = self.compute_c(c_b, &sums, &total);

        let mut shuffled = self.paillier.rerand_batch(entries, &mut self.rng);
        shuffled.shuffle(&mut self.rng);
        Ok(shuffled)
    }

    /// B answered `enc(1)` iff some entry decrypted to zero; flip by the
    /// secret sign to land on `a <= b`.
    pub fn unblind(&mut self, c_delta: &BigInt) -> BigInt {
        let res = if self.s_positive {
            c_delta.clone()
        } else {
            let one = self.gm.encrypt(true, &mut self.rng);
            self.gm.xor(c_delta, &one)
        };
        let res = self.gm.rerand(&res, &mut self.rng);
        self.res = Some(res.clone());
        res
    }

    pub fn output(&self) -> Result<BigInt, ProtocolError> {
        self.res.clone().ok_or_else(|| {
            ProtocolError::desync("dgk.output", "output requested before the result round")
        })
    }
}

impl ComparatorA for DgkA {
    fn kind(&self) -> ComparatorKind {
        ComparatorKind::Dgk
    }

    fn bit_length(&self) -> usize {
        self.bit_length
    }

    fn set_value(&mut self, value: BigInt) {
        self.a = value;
    }

    fn answer(&mut self, msg: ComparisonMsg) -> Result<AStep, ProtocolError> {
        match (&self.phase, msg) {
            (DgkAPhase::WaitBits, ComparisonMsg::DgkBits(bits)) => {
                let reply = self.respond(&bits)?;
                self.phase = DgkAPhase::WaitResult;
                Ok(AStep::Reply(ComparisonMsg::DgkResponse(reply)))
            }
            (DgkAPhase::WaitResult, ComparisonMsg::DgkResult(c_delta)) => {
                self.unblind(&c_delta);
                self.phase = DgkAPhase::Done;
                Ok(AStep::Done)
            }
            (_, other) => Err(ProtocolError::desync(
                "dgk.answer",
                format!("unexpected {} in the current phase", other.label()),
            )),
        }
    }

    fn output(&self) -> Result<BigInt, ProtocolError> {
        DgkA::output(self)
    }
}

enum DgkBPhase {
    Setup,
    WaitResponse,
    Done,
}

/// Role B: sends its bits Paillier-encrypted, decrypts the shuffled vector
/// and reports the zero flag GM-encrypted under its own key.
pub struct DgkB {
    b: BigInt,
    bit_length: usize,
    paillier: PaillierPriv,
    gm: GmPriv,
    rng: ChaCha20Rng,
    phase: DgkBPhase,
}

impl DgkB {
    pub fn new(
        b: BigInt,
        bit_length: usize,
        paillier: PaillierPriv,
        gm: GmPriv,
        rng: ChaCha20Rng,
    ) -> Result<DgkB, ProtocolError> {
        if bit_length == 0 || b < BigInt::zero() || b >= (BigInt::one() << bit_length) {
            return Err(ProtocolError::OutOfRange { step: "dgk.new", bit_length });
        }
        Ok(DgkB { b, bit_length, paillier, gm, rng, phase: DgkBPhase::Setup })
    }

    pub fn encrypt_bits(&mut self) -> Vec<BigInt> {
        (0..self.bit_length)
            .map(|i| {
                let bit = BigInt::from(bit_of(&self.b, i) as u32);
                self.paillier.public().encrypt(&bit, &mut self.rng)
            })
            .collect()
    }

    pub fn search_zero(&mut self, entries: &[BigInt]) -> Result<BigInt, ProtocolError> {
        if entries.len() != self.bit_length + 1 {
            return Err(ProtocolError::desync(
                "dgk.search_zero",
                format!("{} entries for bit length {}", entries.len(), self.bit_length),
            ));
        }
        let delta = entries.iter().any(|c| self.paillier.decrypt(c).is_zero());
        Ok(self.gm.encrypt(delta, &mut self.rng))
    }
}

impl ComparatorB for DgkB {
    fn kind(&self) -> ComparatorKind {
        ComparatorKind::Dgk
    }

    fn bit_length(&self) -> usize {
        self.bit_length
    }

    fn set_value(&mut self, value: BigInt) {
        self.b = value;
    }

    fn setup(&mut self) -> Result<ComparisonMsg, ProtocolError> {
        match self.phase {
            DgkBPhase::Setup => {
                let bits = self.encrypt_bits();
                self.phase = DgkBPhase::WaitResponse;
                Ok(ComparisonMsg::DgkBits(bits))
            }
            _ => Err(ProtocolError::desync("dgk.setup", "setup requested twice")),
        }
    }

    fn answer(&mut self, msg: ComparisonMsg) -> Result<BStep, ProtocolError> {
        match (&self.phase, msg) {
            (DgkBPhase::WaitResponse, ComparisonMsg::DgkResponse(entries)) => {
                let result = self.search_zero(&entries)?;
                self.phase = DgkBPhase::Done;
                Ok(BStep::Finish(ComparisonMsg::DgkResult(result)))
            }
            (_, other) => Err(ProtocolError::desync(
                "dgk.answer",
                format!("unexpected {} in the current phase", other.label()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mpc::comparison::run_comparison;
    use rand::SeedableRng;
    use std::sync::OnceLock;

    fn keys() -> &'static (PaillierPriv, GmPriv) {
        static KEYS: OnceLock<(PaillierPriv, GmPriv)> = OnceLock::new();
        KEYS.get_or_init(|| {
            let mut rng = ChaCha20Rng::seed_from_u64(17);
            (PaillierPriv::keygen(&mut rng, 512), GmPriv::keygen(&mut rng, 256))
        })
    }

    fn run_dgk(a: u64, b: u64, bit_length: usize, seed: u64) -> bool {
        let (paillier, gm) = keys().clone();

        let mut party_a = DgkA::new(
            BigInt::from(a),
            bit_length,
            paillier.public().clone(),
            gm.public().clone(),
            ChaCha20Rng::seed_from_u64(seed ^ 1),
        )
        .unwrap();
        let mut party_b = DgkB::new(
            BigInt::from(b),
            bit_length,
            paillier,
            gm.clone(),
            ChaCha20Rng::seed_from_u64(seed ^ 2),
        )
        .unwrap();

        let out = run_comparison(&mut party_a, &mut party_b).unwrap();
        gm.decrypt(&out)
    }

    #[test]
    fn test_extremes() {
        assert!(run_dgk(0, 0xFFFF_FFFF, 32, 500));
        assert!(!run_dgk(0xFFFF_FFFF, 0, 32, 501));
    }

    #[test]
    fn test_equal_is_leq() {
        assert!(run_dgk(42, 42, 8, 502));
        assert!(run_dgk(0, 0, 8, 503));
    }

    #[test]
    fn test_exhaustive_three_bits() {
        for a in 0..8u64 {
            for b in 0..8u64 {
                assert_eq!(run_dgk(a, b, 3, 600 + a * 8 + b), a <= b, "a={a} b={b}");
            }
        }
    }

    #[test]
    fn test_wrong_cardinality_rejected() {
        let (paillier, gm) = keys().clone();
        let mut party_b = DgkB::new(
            BigInt::from(3u32),
            8,
            paillier.clone(),
            gm,
            ChaCha20Rng::seed_from_u64(700),
        )
        .unwrap();

        let mut rng = ChaCha20Rng::seed_from_u64(701);
        let short: Vec<BigInt> = (0..8u32)
            .map(|_| paillier.public().encrypt(&BigInt::one(), &mut rng))
            .collect();
        let err = party_b.search_zero(&short);
        assert!(matches!(err, Err(ProtocolError::Desync { .. })));
    }

    #[test]
    fn test_out_of_range_rejected() {
        let (paillier, gm) = keys().clone();
        let err = DgkA::new(
            BigInt::from(300u32),
            8,
            paillier.public().clone(),
            gm.public().clone(),
            ChaCha20Rng::seed_from_u64(800),
        );
        assert!(matches!(err, Err(ProtocolError::OutOfRange { .. })));
    }
}
