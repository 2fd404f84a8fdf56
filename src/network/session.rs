use std::sync::Arc;

use log::{debug, info};
use num_bigint_dig::BigInt;
use num_traits::Zero;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::crypto::gm::GmPriv;
use crate::crypto::paillier::PaillierPriv;
use crate::error::ProtocolError;
use crate::mpc::comparison::{AStep, BStep, ComparatorA, ComparatorB, ComparatorKind};
use crate::mpc::dgk::{DgkA, DgkB};
use crate::mpc::enc_argmax::{index_bits, LinearArgmaxHelper};
use crate::mpc::enc_comparison::{enc_compare_comparison_bits, EncCompareHelper};
use crate::mpc::lsic::{LsicA, LsicB};
use crate::mpc::rev_enc_comparison::RevEncCompareHelper;

use super::{Message, PeerKeys};

/// The server's long-term keys, read-only and shared by every session.
pub struct ServerKeys {
    pub paillier: PaillierPriv,
    pub gm: GmPriv,
}

impl ServerKeys {
    pub fn generate<R: Rng>(rng: &mut R, key_bits: usize) -> ServerKeys {
        info!("generating {key_bits}-bit Paillier and GM keys");
        ServerKeys {
            paillier: PaillierPriv::keygen(rng, key_bits),
            gm: GmPriv::keygen(rng, key_bits),
        }
    }
}

enum ArgmaxPhase {
    AwaitSetup,
    Compare(RevEncCompareHelper),
    AwaitMasked,
}

struct ArgmaxSession {
    helper: LinearArgmaxHelper,
    comparator: ComparatorKind,
    comparison_bits: usize,
    phase: ArgmaxPhase,
}

enum SessionState {
    Idle,
    /// Standalone bit comparison, server as role B.
    ComparatorB(Box<dyn ComparatorB>),
    EncPending {
        comparator: ComparatorKind,
    },
    Enc(EncCompareHelper),
    RevPending {
        comparator: ComparatorKind,
    },
    Rev(RevEncCompareHelper),
    Argmax(ArgmaxSession),
}

/// One connected peer: a session-local generator, the peer's public keys
/// once exchanged, and the protocol automaton currently in flight. Advanced
/// strictly sequentially, one message at a time.
pub struct Session {
    id: usize,
    lambda: usize,
    comparison_value: BigInt,
    keys: Arc<ServerKeys>,
    peer: Option<PeerKeys>,
    rng: ChaCha20Rng,
    state: SessionState,
}

impl Session {
    pub fn new(
        id: usize,
        keys: Arc<ServerKeys>,
        lambda: usize,
        comparison_value: u64,
        rng: ChaCha20Rng,
    ) -> Session {
        Session {
            id,
            lambda,
            comparison_value: BigInt::from(comparison_value),
            keys,
            peer: None,
            rng,
            state: SessionState::Idle,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Advance the session automaton on one incoming message. Any error is
    /// fatal to the session.
    pub fn handle(&mut self, msg: Message) -> Result<Vec<Message>, ProtocolError> {
        debug!("session {}: handling {}", self.id, msg.label());
        let state = std::mem::replace(&mut self.state, SessionState::Idle);
        match (state, msg) {
            (SessionState::Idle, Message::KeyExchange { gm_n, gm_y, paillier_n }) => {
                self.peer = Some(PeerKeys {
                    gm: crate::crypto::gm::Gm::from_public(gm_n, gm_y),
                    paillier: crate::crypto::paillier::Paillier::from_public(paillier_n),
                });
                let gm = self.keys.gm.public();
                Ok(vec![Message::KeyExchange {
                    gm_n: gm.n.clone(),
                    gm_y: gm.y.clone(),
                    paillier_n: self.keys.paillier.public().n.clone(),
                }])
            }

            (SessionState::Idle, Message::DecryptGm(c)) => {
                let bit = self.keys.gm.decrypt(&c);
                debug!("session {}: decrypt_gm -> {}", self.id, bit);
                Ok(vec![Message::DecryptedBit(bit)])
            }

            (SessionState::Idle, Message::StartLsic { bit_length }) => {
                let mut comparator = Box::new(LsicB::new(
                    self.comparison_value.clone(),
                    bit_length as usize,
                    self.keys.gm.clone(),
                    self.child_rng(),
                )?);
                let first = comparator.setup()?;
                // with a single bit the peer finishes on the setup packet
                if bit_length > 1 {
                    self.state = SessionState::ComparatorB(comparator);
                }
                Ok(vec![Message::from_comparison(first)])
            }

            (SessionState::Idle, Message::StartDgk { bit_length }) => {
                let mut comparator = Box::new(DgkB::new(
                    self.comparison_value.clone(),
                    bit_length as usize,
                    self.keys.paillier.clone(),
                    self.keys.gm.clone(),
                    self.child_rng(),
                )?);
                let first = comparator.setup()?;
                self.state = SessionState::ComparatorB(comparator);
                Ok(vec![Message::from_comparison(first)])
            }

            (SessionState::ComparatorB(mut comparator), msg) => {
                match comparator.answer(msg.into_comparison()?)? {
                    BStep::Reply(reply) => {
                        self.state = SessionState::ComparatorB(comparator);
                        Ok(vec![Message::from_comparison(reply)])
                    }
                    BStep::Finish(last) => {
                        debug!("session {}: bit comparison finished", self.id);
                        Ok(vec![Message::from_comparison(last)])
                    }
                }
            }

            (SessionState::Idle, Message::StartEncCompare { comparator }) => {
                self.state = SessionState::EncPending { comparator };
                Ok(vec![])
            }

            (
                SessionState::EncPending { comparator },
                Message::EncCompareSetup { c_z, bit_length },
            ) => {
                let bit_length = bit_length as usize;
                let cmp_bits = enc_compare_comparison_bits(bit_length);
                let inner = self.make_comparator_a(comparator, cmp_bits)?;
                let peer_gm = self.peer()?.gm.clone();
                let rng = self.child_rng();
                let mut helper = EncCompareHelper::new(
                    bit_length,
                    self.lambda,
                    self.keys.paillier.clone(),
                    peer_gm,
                    inner,
                    rng,
                )?;
                helper.setup(&c_z)?;
                self.state = SessionState::Enc(helper);
                // the peer's comparator speaks first
                Ok(vec![])
            }

            (SessionState::Enc(mut helper), Message::EncCompareMaskBit(c_r)) => {
                let c_t = helper.conclude(&c_r)?;
                debug!("session {}: enc comparison concluded", self.id);
                Ok(vec![Message::EncCompareResult(c_t)])
            }

            (SessionState::Enc(mut helper), msg) => {
                match helper.comparator_mut().answer(msg.into_comparison()?)? {
                    AStep::Reply(reply) => {
                        self.state = SessionState::Enc(helper);
                        Ok(vec![Message::from_comparison(reply)])
                    }
                    AStep::Done => {
                        self.state = SessionState::Enc(helper);
                        Ok(vec![])
                    }
                }
            }

            (SessionState::Idle, Message::StartRevEncCompare { comparator }) => {
                self.state = SessionState::RevPending { comparator };
                Ok(vec![])
            }

            (
                SessionState::RevPending { comparator },
                Message::EncCompareSetup { c_z, bit_length },
            ) => {
                let (helper, first) =
                    self.start_rev_helper(comparator, bit_length as usize, &c_z)?;
                self.state = SessionState::Rev(helper);
                Ok(vec![first])
            }

            (SessionState::Rev(mut helper), Message::EncCompareResult(c_t)) => {
                let bit = helper.absorb_result(&c_t)?;
                debug!("session {}: rev enc comparison result = {}", self.id, bit);
                Ok(vec![])
            }

            (SessionState::Rev(mut helper), msg) => {
                match helper.comparator_mut().answer(msg.into_comparison()?)? {
                    BStep::Reply(reply) | BStep::Finish(reply) => {
                        self.state = SessionState::Rev(helper);
                        Ok(vec![Message::from_comparison(reply)])
                    }
                }
            }

            (
                SessionState::Idle,
                Message::StartArgmax { candidates, bit_length, comparator },
            ) => {
                let k = candidates as usize;
                let comparison_bits = bit_length as usize + index_bits(k);
                let helper = LinearArgmaxHelper::new(
                    k,
                    comparison_bits,
                    self.lambda,
                    self.keys.paillier.clone(),
                    self.child_rng(),
                )?;
                info!("session {}: argmax over {} candidates", self.id, k);
                if helper.rounds() == 0 {
                    return Ok(vec![Message::ArgmaxFinal { index: 0 }]);
                }
                self.state = SessionState::Argmax(ArgmaxSession {
                    helper,
                    comparator,
                    comparison_bits,
                    phase: ArgmaxPhase::AwaitSetup,
                });
                Ok(vec![])
            }

            (SessionState::Argmax(mut argmax), msg) => {
                let replies = self.handle_argmax(&mut argmax, msg)?;
                if !matches!(argmax.phase, ArgmaxPhase::AwaitSetup)
                    || !argmax.helper.is_complete()
                {
                    self.state = SessionState::Argmax(argmax);
                }
                Ok(replies)
            }

            (state, msg) => {
                self.state = state;
                Err(ProtocolError::desync(
                    "session",
                    format!("unexpected {} in the current state", msg.label()),
                ))
            }
        }
    }

    fn handle_argmax(
        &mut self,
        argmax: &mut ArgmaxSession,
        msg: Message,
    ) -> Result<Vec<Message>, ProtocolError> {
        let phase = std::mem::replace(&mut argmax.phase, ArgmaxPhase::AwaitSetup);
        match (phase, msg) {
            (ArgmaxPhase::AwaitSetup, Message::EncCompareSetup { c_z, bit_length }) => {
                if bit_length as usize != argmax.comparison_bits {
                    return Err(ProtocolError::desync(
                        "argmax.setup",
                        format!(
                            "comparison at {} bits, expected {}",
                            bit_length, argmax.comparison_bits
                        ),
                    ));
                }
                let (helper, first) =
                    self.start_rev_helper(argmax.comparator, argmax.comparison_bits, &c_z)?;
                argmax.phase = ArgmaxPhase::Compare(helper);
                Ok(vec![first])
            }

            (ArgmaxPhase::Compare(mut rev), Message::EncCompareResult(c_t)) => {
                let beta = rev.absorb_result(&c_t)?;
                argmax.helper.absorb_comparison(beta)?;
                argmax.phase = ArgmaxPhase::AwaitMasked;
                Ok(vec![])
            }

            (ArgmaxPhase::Compare(mut rev), msg) => {
                let step = rev.comparator_mut().answer(msg.into_comparison()?)?;
                argmax.phase = ArgmaxPhase::Compare(rev);
                match step {
                    BStep::Reply(reply) | BStep::Finish(reply) => {
                        Ok(vec![Message::from_comparison(reply)])
                    }
                }
            }

            (ArgmaxPhase::AwaitMasked, Message::ArgmaxMasked { masked_max, masked_value }) => {
                let (new_masked_max, choice) =
                    argmax.helper.swap(&masked_max, &masked_value)?;
                let mut replies =
                    vec![Message::ArgmaxSwap { new_masked_max, choice }];
                if argmax.helper.is_complete() {
                    let index = argmax.helper.final_index()? as u32;
                    info!("session {}: argmax finished at permuted index {}", self.id, index);
                    replies.push(Message::ArgmaxFinal { index });
                } else {
                    argmax.phase = ArgmaxPhase::AwaitSetup;
                }
                Ok(replies)
            }

            (_, msg) => Err(ProtocolError::desync(
                "argmax",
                format!("unexpected {} in the current round", msg.label()),
            )),
        }
    }

    /// Build the Rev helper (server as comparator B under its own keys) and
    /// produce the comparator's opening message.
    fn start_rev_helper(
        &mut self,
        comparator: ComparatorKind,
        bit_length: usize,
        c_z: &BigInt,
    ) -> Result<(RevEncCompareHelper, Message), ProtocolError> {
        let inner = self.make_comparator_b(comparator, bit_length)?;
        let rng = self.child_rng();
        let mut helper = RevEncCompareHelper::new(
            bit_length,
            self.lambda,
            self.keys.paillier.clone(),
            self.keys.gm.clone(),
            inner,
            rng,
        )?;
        helper.setup(c_z)?;
        let first = helper.comparator_mut().setup()?;
        Ok((helper, Message::from_comparison(first)))
    }

    /// Comparator role B lives on the server side and uses its secrets.
    fn make_comparator_b(
        &mut self,
        kind: ComparatorKind,
        bit_length: usize,
    ) -> Result<Box<dyn ComparatorB>, ProtocolError> {
        let rng = self.child_rng();
        Ok(match kind {
            ComparatorKind::Lsic => Box::new(LsicB::new(
                BigInt::zero(),
                bit_length,
                self.keys.gm.clone(),
                rng,
            )?),
            ComparatorKind::Dgk => Box::new(DgkB::new(
                BigInt::zero(),
                bit_length,
                self.keys.paillier.clone(),
                self.keys.gm.clone(),
                rng,
            )?),
        })
    }

    /// Comparator role A compares under the peer's public keys.
    fn make_comparator_a(
        &mut self,
        kind: ComparatorKind,
        bit_length: usize,
    ) -> Result<Box<dyn ComparatorA>, ProtocolError> {
        let peer = self.peer()?.clone();
        let rng = self.child_rng();
        Ok(match kind {
            ComparatorKind::Lsic => Box::new(LsicA::new(BigInt::zero(), bit_length, peer.gm, rng)?),
            ComparatorKind::Dgk => Box::new(DgkA::new(
                BigInt::zero(),
                bit_length,
                peer.paillier,
                peer.gm,
                rng,
            )?),
        })
    }

    fn peer(&self) -> Result<&PeerKeys, ProtocolError> {
        self.peer
            .as_ref()
            .ok_or_else(|| ProtocolError::desync("session", "keys have not been exchanged"))
    }

    fn child_rng(&mut self) -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(self.rng.gen())
    }
}
