use num_bigint_dig::BigInt;
use num_traits::Zero;
use rand::Rng;
use rand_chacha::ChaCha20Rng;

use crate::crypto::bit_of;
use crate::crypto::gm::{Gm, GmPriv};
use crate::error::ProtocolError;
use crate::mpc::comparison::{
    AStep, BStep, ComparatorA, ComparatorB, ComparatorKind, ComparisonMsg,
};

#[derive(Debug, Clone)]
pub struct LsicPacketA {
    pub index: u32,
    pub tau: BigInt,
}

#[derive(Debug, Clone)]
pub struct LsicPacketB {
    pub index: u32,
    pub tb: BigInt,
    pub bi: BigInt,
}

/// Role A of the LSIC comparison: after `bit_length` round trips, `t`
/// encrypts `a <= b` under B's GM key.
pub struct LsicA {
    a: BigInt,
    bit_length: usize,
    gm: Gm,
    rng: ChaCha20Rng,
    i: usize,
    t: BigInt,
    /// Masking bit sampled at the previous blinding step.
    c: bool,
}

impl LsicA {
    pub fn new(
        a: BigInt,
        bit_length: usize,
        gm: Gm,
        rng: ChaCha20Rng,
    ) -> Result<LsicA, ProtocolError> {
        if bit_length == 0 || a < BigInt::zero() || a >= (BigInt::from(1u32) << bit_length) {
            return Err(ProtocolError::OutOfRange { step: "lsic.new", bit_length });
        }
        Ok(LsicA { a, bit_length, gm, rng, i: 0, t: BigInt::zero(), c: false })
    }

    /// Sample a fresh masking bit and emit `rerand(t xor c)`.
    fn blinding_step(&mut self) -> BigInt {
        self.c = self.rng.gen_bool(0.5);
        let tau = if self.c {
            let one = self.gm.encrypt(true, &mut self.rng);
            self.gm.xor(&one, &self.t)
        } else {
            self.t.clone()
        };
        self.gm.rerand(&tau, &mut self.rng)
    }

    fn update_step(&mut self, pack: &LsicPacketB) {
        // tb carries the previous mask exactly when b_i = 1; xoring with bi
        // strips it in that case and is a no-op otherwise.
        let tb = if self.c { self.gm.xor(&pack.tb, &pack.bi) } else { pack.tb.clone() };

        if bit_of(&self.a, self.i) {
            self.t = tb;
        } else {
            self.t = self.gm.xor(&self.t, &self.gm.xor(&pack.bi, &tb));
        }
    }

    /// Consume B's packet for round `i`; `None` together with `true` means
    /// the protocol is finished and `output` is available.
    pub fn answer_round(
        &mut self,
        pack: &LsicPacketB,
    ) -> Result<(Option<LsicPacketA>, bool), ProtocolError> {
        if pack.index as usize != self.i {
            return Err(ProtocolError::desync(
                "lsic.answer_round",
                format!("round index {} but local state at {}", pack.index, self.i),
            ));
        }

        if self.i == 0 {
            // t_0 = [a_0 <= b_0]
            self.t = if bit_of(&self.a, 0) {
                pack.bi.clone()
            } else {
                self.gm.encrypt(true, &mut self.rng)
            };
        } else {
            self.update_step(pack);
        }
        self.i += 1;

        if self.i == self.bit_length {
            return Ok((None, true));
        }
        let tau = self.blinding_step();
        Ok((Some(LsicPacketA { index: self.i as u32, tau }), false))
    }

    pub fn output(&self) -> Result<BigInt, ProtocolError> {
        if self.i != self.bit_length {
            return Err(ProtocolError::desync(
                "lsic.output",
                format!("output requested after round {} of {}", self.i, self.bit_length),
            ));
        }
        Ok(self.t.clone())
    }
}

impl ComparatorA for LsicA {
    fn kind(&self) -> ComparatorKind {
        ComparatorKind::Lsic
    }

    fn bit_length(&self) -> usize {
        self.bit_length
    }

    fn set_value(&mut self, value: BigInt) {
        self.a = value;
    }

    fn answer(&mut self, msg: ComparisonMsg) -> Result<AStep, ProtocolError> {
        let pack = match msg {
            ComparisonMsg::LsicB(p) => p,
            other => {
                return Err(ProtocolError::desync(
                    "lsic.answer_round",
                    format!("expected lsic_b, got {}", other.label()),
                ))
            }
        };
        match self.answer_round(&pack)? {
            (Some(reply), false) => Ok(AStep::Reply(ComparisonMsg::LsicA(reply))),
            (None, true) => Ok(AStep::Done),
            _ => unreachable!(),
        }
    }

    fn output(&self) -> Result<BigInt, ProtocolError> {
        LsicA::output(self)
    }
}

/// Role B: holds `b` and the GM secret; stateless across rounds apart from
/// knowledge of `b`.
pub struct LsicB {
    b: BigInt,
    bit_length: usize,
    gm: GmPriv,
    rng: ChaCha20Rng,
}

impl LsicB {
    pub fn new(
        b: BigInt,
        bit_length: usize,
        gm: GmPriv,
        rng: ChaCha20Rng,
    ) -> Result<LsicB, ProtocolError> {
        if bit_length == 0 || b < BigInt::zero() || b >= (BigInt::from(1u32) << bit_length) {
            return Err(ProtocolError::OutOfRange { step: "lsic.new", bit_length });
        }
        Ok(LsicB { b, bit_length, gm, rng })
    }

    pub fn setup_round(&mut self) -> LsicPacketB {
        let bi = self.gm.encrypt(bit_of(&self.b, 0), &mut self.rng);
        LsicPacketB { index: 0, tb: BigInt::zero(), bi }
    }

    /// Answer A's packet; the second component reports whether this was the
    /// last packet B will send.
    pub fn answer_round(
        &mut self,
        pack: &LsicPacketA,
    ) -> Result<(LsicPacketB, bool), ProtocolError> {
        let i = pack.index as usize;
        if i == 0 || i >= self.bit_length {
            return Err(ProtocolError::desync(
                "lsic.answer_round",
                format!("round index {} outside (0, {})", i, self.bit_length),
            ));
        }

        let b_bit = bit_of(&self.b, i);
        let tb = if b_bit {
            self.gm.public().rerand(&pack.tau, &mut self.rng)
        } else {
            self.gm.encrypt(false, &mut self.rng)
        };
        let bi = self.gm.encrypt(b_bit, &mut self.rng);

        Ok((LsicPacketB { index: pack.index, tb, bi }, i == self.bit_length - 1))
    }
}

impl ComparatorB for LsicB {
    fn kind(&self) -> ComparatorKind {
        ComparatorKind::Lsic
    }

    fn bit_length(&self) -> usize {
        self.bit_length
    }

    fn set_value(&mut self, value: BigInt) {
        self.b = value;
    }

    fn setup(&mut self) -> Result<ComparisonMsg, ProtocolError> {
        Ok(ComparisonMsg::LsicB(self.setup_round()))
    }

    fn answer(&mut self, msg: ComparisonMsg) -> Result<BStep, ProtocolError> {
        let pack = match msg {
            ComparisonMsg::LsicA(p) => p,
            other => {
                return Err(ProtocolError::desync(
                    "lsic.answer_round",
                    format!("expected lsic_a, got {}", other.label()),
                ))
            }
        };
        let (reply, finished) = self.answer_round(&pack)?;
        let reply = ComparisonMsg::LsicB(reply);
        if finished {
            Ok(BStep::Finish(reply))
        } else {
            Ok(BStep::Reply(reply))
        }
    }
}
