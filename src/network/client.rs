use std::sync::mpsc;
use std::thread;

use log::{debug, info};
use message_io::network::{Endpoint, NetEvent, SendStatus, Transport};
use message_io::node::{self, NodeHandler};
use num_bigint_dig::BigInt;
use num_traits::Zero;
use rand::rngs::OsRng;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::crypto::gm::GmPriv;
use crate::crypto::paillier::{Paillier, PaillierPriv};
use crate::error::ProtocolError;
use crate::mpc::comparison::{AStep, BStep, ComparatorA, ComparatorB, ComparatorKind};
use crate::mpc::dgk::{DgkA, DgkB};
use crate::mpc::enc_argmax::LinearArgmaxOwner;
use crate::mpc::enc_comparison::{enc_compare_comparison_bits, EncCompareOwner};
use crate::mpc::lsic::{LsicA, LsicB};
use crate::mpc::rev_enc_comparison::RevEncCompareOwner;

use super::{wire, Message, PeerKeys};

enum WireEvent {
    Connected(bool),
    Data(Vec<u8>),
    Disconnected,
}

/// Blocking client driver: a listener thread feeds incoming frames into a
/// channel, protocol runners send one message and wait for the reply.
pub struct Client {
    handler: NodeHandler<()>,
    server: Endpoint,
    events: mpsc::Receiver<WireEvent>,
    gm: GmPriv,
    paillier: PaillierPriv,
    server_keys: Option<PeerKeys>,
    lambda: usize,
    rng: ChaCha20Rng,
}

impl Client {
    pub fn connect(addr: &str, key_bits: usize, lambda: usize) -> Result<Client, ProtocolError> {
        let (handler, listener) = node::split::<()>();
        let (server, _) = handler.network().connect(Transport::FramedTcp, addr)?;

        let (tx, events) = mpsc::channel();
        thread::spawn(move || {
            listener.for_each(move |event| match event.network() {
                NetEvent::Connected(_, established) => {
                    let _ = tx.send(WireEvent::Connected(established));
                }
                NetEvent::Accepted(_, _) => unreachable!(),
                NetEvent::Message(_, data) => {
                    let _ = tx.send(WireEvent::Data(data.to_vec()));
                }
                NetEvent::Disconnected(_) => {
                    let _ = tx.send(WireEvent::Disconnected);
                }
            });
        });

        match events.recv() {
            Ok(WireEvent::Connected(true)) => {}
            _ => return Err(ProtocolError::Transport { step: "connect" }),
        }
        info!("connected to {addr}");

        let mut rng = ChaCha20Rng::from_rng(OsRng).expect("seeding from the OS generator");
        let gm = GmPriv::keygen(&mut rng, key_bits);
        let paillier = PaillierPriv::keygen(&mut rng, key_bits);

        Ok(Client { handler, server, events, gm, paillier, server_keys: None, lambda, rng })
    }

    fn send(&self, msg: &Message) -> Result<(), ProtocolError> {
        let data = wire::encode(msg)?;
        match self.handler.network().send(self.server, &data) {
            SendStatus::Sent => Ok(()),
            _ => Err(ProtocolError::Transport { step: "send" }),
        }
    }

    fn recv(&self, step: &'static str) -> Result<Message, ProtocolError> {
        loop {
            match self.events.recv() {
                Ok(WireEvent::Data(data)) => {
                    let msg = wire::decode(&data)?;
                    if let Message::Error { context } = msg {
                        return Err(ProtocolError::desync(step, format!("peer error: {context}")));
                    }
                    return Ok(msg);
                }
                Ok(WireEvent::Connected(_)) => continue,
                Ok(WireEvent::Disconnected) | Err(_) => {
                    return Err(ProtocolError::Transport { step })
                }
            }
        }
    }

    /// Swap GM and Paillier public keys with the server.
    pub fn exchange_keys(&mut self) -> Result<(), ProtocolError> {
        let gm = self.gm.public();
        self.send(&Message::KeyExchange {
            gm_n: gm.n.clone(),
            gm_y: gm.y.clone(),
            paillier_n: self.paillier.public().n.clone(),
        })?;
        match self.recv("key_exchange")? {
            Message::KeyExchange { gm_n, gm_y, paillier_n } => {
                debug!("received the server public keys");
                self.server_keys = Some(PeerKeys {
                    gm: crate::crypto::gm::Gm::from_public(gm_n, gm_y),
                    paillier: Paillier::from_public(paillier_n),
                });
                Ok(())
            }
            other => Err(ProtocolError::desync(
                "key_exchange",
                format!("expected key_exchange, got {}", other.label()),
            )),
        }
    }

    pub fn server_paillier(&self) -> Result<&Paillier, ProtocolError> {
        self.server_keys
            .as_ref()
            .map(|k| &k.paillier)
            .ok_or_else(|| ProtocolError::desync("client", "keys have not been exchanged"))
    }

    /// Encrypt a value under the server's Paillier key, e.g. to build argmax
    /// candidates.
    pub fn encrypt_for_server(&mut self, value: &BigInt) -> Result<BigInt, ProtocolError> {
        let paillier = self.server_paillier()?.clone();
        Ok(paillier.encrypt(value, &mut self.rng))
    }

    fn child_rng(&mut self) -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(self.rng.gen())
    }

    fn server_keys(&self) -> Result<&PeerKeys, ProtocolError> {
        self.server_keys
            .as_ref()
            .ok_or_else(|| ProtocolError::desync("client", "keys have not been exchanged"))
    }

    fn run_comparator_a(
        &self,
        comparator: &mut dyn ComparatorA,
        step: &'static str,
    ) -> Result<BigInt, ProtocolError> {
        loop {
            let msg = self.recv(step)?.into_comparison()?;
            match comparator.answer(msg)? {
                AStep::Reply(reply) => self.send(&Message::from_comparison(reply))?,
                AStep::Done => return comparator.output(),
            }
        }
    }

    fn run_comparator_b(
        &self,
        comparator: &mut dyn ComparatorB,
        step: &'static str,
    ) -> Result<(), ProtocolError> {
        let first = comparator.setup()?;
        self.send(&Message::from_comparison(first))?;
        loop {
            let msg = self.recv(step)?.into_comparison()?;
            match comparator.answer(msg)? {
                BStep::Reply(reply) => self.send(&Message::from_comparison(reply))?,
                BStep::Finish(last) => {
                    self.send(&Message::from_comparison(last))?;
                    return Ok(());
                }
            }
        }
    }

    /// Standalone LSIC against the server's configured operand; returns the
    /// encrypted bit `a <= b` under the server's GM key.
    pub fn run_lsic_a(&mut self, a: &BigInt, bit_length: usize) -> Result<BigInt, ProtocolError> {
        let gm = self.server_keys()?.gm.clone();
        let rng = self.child_rng();
        let mut comparator = LsicA::new(a.clone(), bit_length, gm, rng)?;
        self.send(&Message::StartLsic { bit_length: bit_length as u32 })?;
        self.run_comparator_a(&mut comparator, "lsic")
    }

    /// Standalone DGK comparison; same output shape as `run_lsic_a`.
    pub fn run_dgk_a(&mut self, a: &BigInt, bit_length: usize) -> Result<BigInt, ProtocolError> {
        let keys = self.server_keys()?.clone();
        let rng = self.child_rng();
        let mut comparator = DgkA::new(a.clone(), bit_length, keys.paillier, keys.gm, rng)?;
        self.send(&Message::StartDgk { bit_length: bit_length as u32 })?;
        self.run_comparator_a(&mut comparator, "dgk")
    }

    /// Ask the server to open a GM ciphertext (a demo facility; the server
    /// holds the GM secret for the standalone comparisons).
    pub fn decrypt_gm(&self, c: &BigInt) -> Result<bool, ProtocolError> {
        self.send(&Message::DecryptGm(c.clone()))?;
        match self.recv("decrypt_gm")? {
            Message::DecryptedBit(bit) => Ok(bit),
            other => Err(ProtocolError::desync(
                "decrypt_gm",
                format!("expected decrypted_bit, got {}", other.label()),
            )),
        }
    }

    /// Comparator role B under the client's own keys (`EncCompare`).
    fn own_comparator_b(
        &mut self,
        kind: ComparatorKind,
        bit_length: usize,
    ) -> Result<Box<dyn ComparatorB>, ProtocolError> {
        let rng = self.child_rng();
        Ok(match kind {
            ComparatorKind::Lsic => {
                Box::new(LsicB::new(BigInt::zero(), bit_length, self.gm.clone(), rng)?)
            }
            ComparatorKind::Dgk => Box::new(DgkB::new(
                BigInt::zero(),
                bit_length,
                self.paillier.clone(),
                self.gm.clone(),
                rng,
            )?),
        })
    }

    /// Comparator role A under the server's public keys (`RevEncCompare`).
    fn server_comparator_a(
        &mut self,
        kind: ComparatorKind,
        bit_length: usize,
    ) -> Result<Box<dyn ComparatorA>, ProtocolError> {
        let keys = self.server_keys()?.clone();
        let rng = self.child_rng();
        Ok(match kind {
            ComparatorKind::Lsic => {
                Box::new(LsicA::new(BigInt::zero(), bit_length, keys.gm, rng)?)
            }
            ComparatorKind::Dgk => Box::new(DgkA::new(
                BigInt::zero(),
                bit_length,
                keys.paillier,
                keys.gm,
                rng,
            )?),
        })
    }

    /// Compare two values encrypted under the server's Paillier key; the
    /// client ends with the cleartext bit `a < b`.
    pub fn run_enc_compare_owner(
        &mut self,
        c_a: BigInt,
        c_b: BigInt,
        bit_length: usize,
        comparator: ComparatorKind,
    ) -> Result<bool, ProtocolError> {
        let inner = self.own_comparator_b(comparator, enc_compare_comparison_bits(bit_length))?;
        let paillier = self.server_paillier()?.clone();
        let rng = self.child_rng();
        let mut owner = EncCompareOwner::new(
            c_a,
            c_b,
            bit_length,
            self.lambda,
            paillier,
            self.gm.clone(),
            inner,
            rng,
        )?;

        self.send(&Message::StartEncCompare { comparator })?;
        let c_z = owner.setup()?;
        self.send(&Message::EncCompareSetup { c_z, bit_length: bit_length as u32 })?;

        self.run_comparator_b(owner.comparator_mut(), "enc_compare")?;

        let mask_bit = owner.mask_bit()?;
        self.send(&Message::EncCompareMaskBit(mask_bit))?;
        match self.recv("enc_compare")? {
            Message::EncCompareResult(c_t) => Ok(owner.absorb_result(&c_t)),
            other => Err(ProtocolError::desync(
                "enc_compare",
                format!("expected enc_compare_result, got {}", other.label()),
            )),
        }
    }

    /// Same comparison, but the result bit ends with the server.
    pub fn run_rev_enc_compare_owner(
        &mut self,
        c_a: BigInt,
        c_b: BigInt,
        bit_length: usize,
        comparator: ComparatorKind,
    ) -> Result<(), ProtocolError> {
        let mut owner = self.rev_owner(c_a, c_b, bit_length, comparator)?;
        self.send(&Message::StartRevEncCompare { comparator })?;
        self.drive_rev_owner(&mut owner)
    }

    fn rev_owner(
        &mut self,
        c_a: BigInt,
        c_b: BigInt,
        bit_length: usize,
        comparator: ComparatorKind,
    ) -> Result<RevEncCompareOwner, ProtocolError> {
        let inner = self.server_comparator_a(comparator, bit_length)?;
        let keys = self.server_keys()?.clone();
        let rng = self.child_rng();
        RevEncCompareOwner::new(
            c_a,
            c_b,
            bit_length,
            self.lambda,
            keys.paillier,
            keys.gm,
            inner,
            rng,
        )
    }

    fn drive_rev_owner(&self, owner: &mut RevEncCompareOwner) -> Result<(), ProtocolError> {
        let c_z = owner.setup()?;
        self.send(&Message::EncCompareSetup {
            c_z,
            bit_length: owner.bit_length() as u32,
        })?;
        self.run_comparator_a(owner.comparator_mut(), "rev_enc_compare")?;
        let c_t = owner.conclude()?;
        self.send(&Message::EncCompareResult(c_t))
    }

    /// Argmax over values encrypted under the server's Paillier key; only
    /// the winning index is revealed, to the client.
    pub fn run_linear_argmax_owner(
        &mut self,
        candidates: &[BigInt],
        bit_length: usize,
        comparator: ComparatorKind,
    ) -> Result<usize, ProtocolError> {
        let paillier = self.server_paillier()?.clone();
        let rng = self.child_rng();
        let mut owner =
            LinearArgmaxOwner::new(candidates, bit_length, self.lambda, paillier, rng)?;

        self.send(&Message::StartArgmax {
            candidates: candidates.len() as u32,
            bit_length: bit_length as u32,
            comparator,
        })?;

        let cmp_bits = owner.comparison_bits();
        for round in 0..owner.rounds() {
            debug!("argmax round {round}");
            let (c_max, c_candidate) = owner.round_operands()?;
            let mut rev = self.rev_owner(c_max, c_candidate, cmp_bits, comparator)?;
            self.drive_rev_owner(&mut rev)?;

            let (masked_max, masked_value) = owner.masked_pair()?;
            self.send(&Message::ArgmaxMasked { masked_max, masked_value })?;
            match self.recv("argmax")? {
                Message::ArgmaxSwap { new_masked_max, choice } => {
                    owner.absorb_swap(&new_masked_max, &choice)?;
                }
                other => {
                    return Err(ProtocolError::desync(
                        "argmax",
                        format!("expected argmax_swap, got {}", other.label()),
                    ))
                }
            }
        }

        match self.recv("argmax")? {
            Message::ArgmaxFinal { index } => owner.unpermute(index as usize),
            other => Err(ProtocolError::desync(
                "argmax",
                format!("expected argmax_final, got {}", other.label()),
            )),
        }
    }

    pub fn disconnect(self) {
        self.handler.network().remove(self.server.resource_id());
        self.handler.stop();
    }
}
