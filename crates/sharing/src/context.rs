//! Per-party execution context
//!
//! Bundles what one party needs to run share-level operations: its rank,
//! the channel to the peer, its triple supply, local randomness, and the
//! ledger of triple ids it has consumed.

use std::collections::BTreeSet;

use privlookup_fixed_point::RingTensor;
use privlookup_protocol::{
    ErrorCode, InputSharePayload, OpeningPayload, PeerChannel, RevealPayload, Transport, WireTensor,
};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use crate::dealer::TripleSource;
use crate::error::{Result, SharingError};
use crate::share::{Party, SecretShare, SharePair};
use crate::triple::{TripleId, TripleRequest, TripleShare};

/// How opened masks are recombined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Combine {
    Add,
    Xor,
}

pub struct PartyContext<T: Transport> {
    party: Party,
    channel: PeerChannel<T>,
    triples: Box<dyn TripleSource>,
    rng: ChaCha20Rng,
    consumed: BTreeSet<TripleId>,
    rounds: u64,
}

impl<T: Transport> PartyContext<T> {
    /// Build a context over an established channel
    pub fn new(channel: PeerChannel<T>, triples: Box<dyn TripleSource>) -> Result<Self> {
        let rank = channel.rank();
        let party = Party::from_rank(rank).ok_or(SharingError::InvalidRank(rank))?;
        Ok(Self {
            party,
            channel,
            triples,
            rng: ChaCha20Rng::from_entropy(),
            consumed: BTreeSet::new(),
            rounds: 0,
        })
    }

    /// Replace the blinding randomness with a seeded stream
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = ChaCha20Rng::seed_from_u64(seed);
        self
    }

    pub fn party(&self) -> Party {
        self.party
    }

    pub fn channel(&mut self) -> &mut PeerChannel<T> {
        &mut self.channel
    }

    /// Communication rounds completed so far
    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    pub fn triples_remaining(&self) -> usize {
        self.triples.remaining()
    }

    /// Id of the dealt bundle this party's triples come from
    pub fn bundle_id(&self) -> u64 {
        self.triples.bundle_id()
    }

    /// Every triple id this party has consumed, in id order
    pub fn consumed_triples(&self) -> impl Iterator<Item = TripleId> + '_ {
        self.consumed.iter().copied()
    }

    /// Drop all remaining triples. Used when a run aborts.
    pub fn discard_triples(&mut self) -> usize {
        self.triples.discard()
    }

    /// Best-effort notice to the peer that this run is over
    pub fn abort(&mut self, code: ErrorCode, message: &str) {
        self.channel.abort(code, message);
    }

    /// Split a private input, send the peer its share and keep ours
    pub fn share_input(&mut self, value: &RingTensor, frac_bits: u8, label: u32) -> Result<SecretShare> {
        let (ours, theirs) = SharePair::split(value, frac_bits, &mut self.rng)?.into_shares(self.party);
        self.channel.send(InputSharePayload {
            label,
            frac_bits,
            tensor: to_wire(theirs.tensor()),
        })?;
        tracing::debug!(label, shape = ?value.shape(), "Shared private input");
        Ok(ours)
    }

    /// Receive our share of the peer's private input
    pub fn receive_input(&mut self, label: u32, shape: &[usize]) -> Result<SecretShare> {
        let payload: InputSharePayload = self.channel.receive()?;
        if payload.label != label {
            return Err(SharingError::UnexpectedInput {
                expected: label,
                got: payload.label,
            });
        }
        let tensor = from_wire(payload.tensor, shape)?;
        tracing::debug!(label, shape = ?shape, "Received input share");
        Ok(SecretShare::from_tensor(tensor, payload.frac_bits))
    }

    /// Take the next triple and record its id
    pub(crate) fn take_triple(&mut self, request: &TripleRequest) -> Result<TripleShare> {
        let triple = self.triples.next_triple(request)?;
        if !self.consumed.insert(triple.id()) {
            return Err(SharingError::TripleReuse(triple.id()));
        }
        tracing::debug!(id = %triple.id(), kind = ?triple.kind(), "Consuming triple");
        Ok(triple)
    }

    /// Open masked values in one round.
    ///
    /// Both parties tag the opening with the triple the masks came from;
    /// a different tag from the peer means the two sides are out of step.
    pub(crate) fn open(&mut self, triple: TripleId, masked: &[RingTensor], combine: Combine) -> Result<Vec<RingTensor>> {
        let payload = OpeningPayload::new(triple.0, masked.iter().map(to_wire).collect());
        let peer = self.channel.exchange(payload)?;
        self.rounds += 1;

        if peer.triple_id != triple.0 {
            return Err(SharingError::TripleMismatch {
                ours: triple,
                theirs: TripleId(peer.triple_id),
            });
        }
        if peer.values.len() != masked.len() {
            return Err(SharingError::ShapeMismatch {
                expected: vec![masked.len()],
                got: vec![peer.values.len()],
            });
        }

        masked
            .iter()
            .zip(peer.values)
            .map(|(ours, theirs)| -> Result<RingTensor> {
                let theirs = from_wire(theirs, ours.shape())?;
                Ok(match combine {
                    Combine::Add => ours.add(&theirs)?,
                    Combine::Xor => ours.xor(&theirs)?,
                })
            })
            .collect()
    }

    /// Swap final shares and reconstruct
    pub(crate) fn reveal(&mut self, share: &SecretShare) -> Result<RingTensor> {
        let peer: RevealPayload = self.channel.exchange(RevealPayload {
            frac_bits: share.frac_bits(),
            tensor: to_wire(share.tensor()),
        })?;
        self.rounds += 1;
        if peer.frac_bits != share.frac_bits() {
            return Err(SharingError::ScaleMismatch {
                expected: share.frac_bits(),
                got: peer.frac_bits,
            });
        }
        let theirs = from_wire(peer.tensor, share.shape())?;
        Ok(share.tensor().add(&theirs)?)
    }
}

fn to_wire(tensor: &RingTensor) -> WireTensor {
    WireTensor::new(tensor.shape().to_vec(), tensor.data().to_vec())
}

fn from_wire(wire: WireTensor, shape: &[usize]) -> Result<RingTensor> {
    if wire.shape != shape {
        return Err(SharingError::ShapeMismatch {
            expected: shape.to_vec(),
            got: wire.shape,
        });
    }
    Ok(RingTensor::from_raw(wire.data, wire.shape)?)
}
