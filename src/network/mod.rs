use num_bigint_dig::BigInt;
use serde::{Deserialize, Serialize};

use crate::crypto::gm::Gm;
use crate::crypto::paillier::Paillier;
use crate::error::ProtocolError;
use crate::mpc::comparison::{ComparatorKind, ComparisonMsg};
use crate::mpc::lsic::{LsicPacketA, LsicPacketB};

pub mod client;
pub mod config;
pub mod server;
pub mod session;
pub mod wire;

/// The peer's public keys, learnt during the key-exchange round.
#[derive(Debug, Clone)]
pub struct PeerKeys {
    pub gm: Gm,
    pub paillier: Paillier,
}

/// Every message the two peers exchange. The outer framing (length prefix)
/// comes from the transport; integers are encoded sign-byte-first via the
/// `wire` adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Message {
    KeyExchange {
        #[serde(with = "wire::big_int")]
        gm_n: BigInt,
        #[serde(with = "wire::big_int")]
        gm_y: BigInt,
        #[serde(with = "wire::big_int")]
        paillier_n: BigInt,
    },

    StartLsic {
        bit_length: u32,
    },
    StartDgk {
        bit_length: u32,
    },
    StartEncCompare {
        comparator: ComparatorKind,
    },
    StartRevEncCompare {
        comparator: ComparatorKind,
    },
    StartArgmax {
        candidates: u32,
        bit_length: u32,
        comparator: ComparatorKind,
    },

    LsicA {
        index: u32,
        #[serde(with = "wire::big_int")]
        tau: BigInt,
    },
    LsicB {
        index: u32,
        #[serde(with = "wire::big_int")]
        tb: BigInt,
        #[serde(with = "wire::big_int")]
        bi: BigInt,
    },
    DgkBits(#[serde(with = "wire::big_int_vec")] Vec<BigInt>),
    DgkResponse(#[serde(with = "wire::big_int_vec")] Vec<BigInt>),
    DgkResult(#[serde(with = "wire::big_int")] BigInt),

    EncCompareSetup {
        #[serde(with = "wire::big_int")]
        c_z: BigInt,
        bit_length: u32,
    },
    EncCompareMaskBit(#[serde(with = "wire::big_int")] BigInt),
    EncCompareResult(#[serde(with = "wire::big_int")] BigInt),

    ArgmaxMasked {
        #[serde(with = "wire::big_int")]
        masked_max: BigInt,
        #[serde(with = "wire::big_int")]
        masked_value: BigInt,
    },
    ArgmaxSwap {
        #[serde(with = "wire::big_int")]
        new_masked_max: BigInt,
        #[serde(with = "wire::big_int")]
        choice: BigInt,
    },
    ArgmaxFinal {
        index: u32,
    },

    DecryptGm(#[serde(with = "wire::big_int")] BigInt),
    DecryptedBit(bool),

    Error {
        context: String,
    },
}

impl Message {
    pub fn label(&self) -> &'static str {
        match self {
            Message::KeyExchange { .. } => "key_exchange",
            Message::StartLsic { .. } => "start_lsic",
            Message::StartDgk { .. } => "start_dgk",
            Message::StartEncCompare { .. } => "start_enc_compare",
            Message::StartRevEncCompare { .. } => "start_rev_enc_compare",
            Message::StartArgmax { .. } => "start_argmax",
            Message::LsicA { .. } => "lsic_a",
            Message::LsicB { .. } => "lsic_b",
            Message::DgkBits(_) => "dgk_bits",
            Message::DgkResponse(_) => "dgk_response",
            Message::DgkResult(_) => "dgk_result",
            Message::EncCompareSetup { .. } => "enc_compare_setup",
            Message::EncCompareMaskBit(_) => "enc_compare_mask_bit",
            Message::EncCompareResult(_) => "enc_compare_result",
            Message::ArgmaxMasked { .. } => "argmax_masked",
            Message::ArgmaxSwap { .. } => "argmax_swap",
            Message::ArgmaxFinal { .. } => "argmax_final",
            Message::DecryptGm(_) => "decrypt_gm",
            Message::DecryptedBit(_) => "decrypted_bit",
            Message::Error { .. } => "error",
        }
    }

    pub fn from_comparison(msg: ComparisonMsg) -> Message {
        match msg {
            ComparisonMsg::LsicA(p) => Message::LsicA { index: p.index, tau: p.tau },
            ComparisonMsg::LsicB(p) => Message::LsicB { index: p.index, tb: p.tb, bi: p.bi },
            ComparisonMsg::DgkBits(v) => Message::DgkBits(v),
            ComparisonMsg::DgkResponse(v) => Message::DgkResponse(v),
            ComparisonMsg::DgkResult(c) => Message::DgkResult(c),
        }
    }

    pub fn into_comparison(self) -> Result<ComparisonMsg, ProtocolError> {
        match self {
            Message::LsicA { index, tau } => Ok(ComparisonMsg::LsicA(LsicPacketA { index, tau })),
            Message::LsicB { index, tb, bi } => {
                Ok(ComparisonMsg::LsicB(LsicPacketB { index, tb, bi }))
            }
            Message::DgkBits(v) => Ok(ComparisonMsg::DgkBits(v)),
            Message::DgkResponse(v) => Ok(ComparisonMsg::DgkResponse(v)),
            Message::DgkResult(c) => Ok(ComparisonMsg::DgkResult(c)),
            other => Err(ProtocolError::desync(
                "comparison",
                format!("expected a comparison packet, got {}", other.label()),
            )),
        }
    }
}
