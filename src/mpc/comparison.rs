use num_bigint_dig::BigInt;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::mpc::lsic::{LsicPacketA, LsicPacketB};

/// Tag distinguishing the two bit-level comparator implementations. Higher
/// layers carry it for session negotiation but never branch on it for
/// control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparatorKind {
    Lsic,
    Dgk,
}

/// The union of both comparators' packet vocabularies. Feeding a state
/// machine the wrong variant is a desynchronisation.
#[derive(Debug, Clone)]
pub enum ComparisonMsg {
    LsicA(LsicPacketA),
    LsicB(LsicPacketB),
    DgkBits(Vec<BigInt>),
    DgkResponse(Vec<BigInt>),
    DgkResult(BigInt),
}

impl ComparisonMsg {
    pub fn label(&self) -> &'static str {
        match self {
            ComparisonMsg::LsicA(_) => "lsic_a",
            ComparisonMsg::LsicB(_) => "lsic_b",
            ComparisonMsg::DgkBits(_) => "dgk_bits",
            ComparisonMsg::DgkResponse(_) => "dgk_response",
            ComparisonMsg::DgkResult(_) => "dgk_result",
        }
    }
}

pub enum AStep {
    Reply(ComparisonMsg),
    Done,
}

pub enum BStep {
    Reply(ComparisonMsg),
    /// The last message this side will emit; the peer's next `answer` must
    /// report `Done`.
    Finish(ComparisonMsg),
}

/// Role A: holds one comparison operand and, after the last round, an
/// encryption under B's bit key of `x_A <= x_B`.
pub trait ComparatorA {
    fn kind(&self) -> ComparatorKind;
    fn bit_length(&self) -> usize;
    fn set_value(&mut self, value: BigInt);
    fn answer(&mut self, msg: ComparisonMsg) -> Result<AStep, ProtocolError>;
    fn output(&self) -> Result<BigInt, ProtocolError>;
}

/// Role B: holds the complementary operand and the bit-scheme secret.
pub trait ComparatorB {
    fn kind(&self) -> ComparatorKind;
    fn bit_length(&self) -> usize;
    fn set_value(&mut self, value: BigInt);
    fn setup(&mut self) -> Result<ComparisonMsg, ProtocolError>;
    fn answer(&mut self, msg: ComparisonMsg) -> Result<BStep, ProtocolError>;
}

/// Drive both halves to completion in-process and return A's output.
pub fn run_comparison(
    a: &mut dyn ComparatorA,
    b: &mut dyn ComparatorB,
) -> Result<BigInt, ProtocolError> {
    let mut msg = b.setup()?;
    loop {
        match a.answer(msg)? {
            AStep::Done => return a.output(),
            AStep::Reply(to_b) => match b.answer(to_b)? {
                BStep::Reply(next) => msg = next,
                BStep::Finish(last) => {
                    return match a.answer(last)? {
                        AStep::Done => a.output(),
                        AStep::Reply(_) => Err(ProtocolError::desync(
                            "comparison.run",
                            "role A kept talking after role B finished",
                        )),
                    };
                }
            },
        }
    }
}
