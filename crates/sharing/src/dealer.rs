//! Sources of correlated randomness
//!
//! [`TripleSource`] is what the online phase consumes. [`TrustedDealer`]
//! generates both parties' shares of every triple in a [`TriplePlan`];
//! each party then draws from its own [`TripleStore`], in plan order.
//!
//! # Bundle files
//!
//! A store can be written to disk so a dealer process can provision two
//! party processes. The file is a stream of length-prefixed `TripleBundle`
//! frames: one leading frame with `rank(1) | reserved(3) | count(4) |
//! bundle_id(8)`, then one frame per triple with
//! `id(8) | kind(1) | reserved(3) | a | b | c`.
//!
//! Both halves of one deal carry the same random bundle id, which the
//! parties compare before any share crosses the wire. [`TripleStore::load`]
//! marks the file spent, so a bundle provisions exactly one run.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use privlookup_fixed_point::RingTensor;
use privlookup_protocol::{Frame, Header, MsgType, WireTensor, MAX_PAYLOAD_LEN};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use zeroize::Zeroize;

use crate::equality::AND_TREE_SHIFTS;
use crate::error::{Result, SharingError};
use crate::share::Party;
use crate::triple::{TripleId, TripleKind, TripleRequest, TripleShare};

const BUNDLE_HEAD_LEN: usize = 16;

/// Supplies one party's triple shares to the online phase
pub trait TripleSource: Send {
    /// Take the next triple, which must match `request`
    fn next_triple(&mut self, request: &TripleRequest) -> Result<TripleShare>;

    /// Triples still available
    fn remaining(&self) -> usize;

    /// Throw away every remaining triple, returning how many were dropped
    fn discard(&mut self) -> usize;

    /// Id shared by both halves of the deal these triples came from
    fn bundle_id(&self) -> u64;
}

/// Ordered list of the triples a computation will consume
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriplePlan {
    requests: Vec<TripleRequest>,
}

impl TriplePlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, request: TripleRequest) {
        self.requests.push(request);
    }

    pub fn extend(&mut self, other: TriplePlan) {
        self.requests.extend(other.requests);
    }

    pub fn requests(&self) -> &[TripleRequest] {
        &self.requests
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Ring elements each party stores for the whole plan
    pub fn share_len(&self) -> usize {
        self.requests.iter().map(TripleRequest::share_len).sum()
    }

    /// Triples for one zero test over a tensor of `shape`
    pub fn for_equality(shape: &[usize]) -> Self {
        let mut plan = Self::new();
        for _ in AND_TREE_SHIFTS {
            plan.push(TripleRequest::binary(shape));
        }
        plan.push(TripleRequest::elementwise(shape));
        plan
    }

    /// Triples for one embedding lookup: the zero test over
    /// `[samples, words, vocab]`, then `[samples, vocab] @ [vocab, dims]`
    pub fn for_lookup(samples: usize, words: usize, vocab: usize, dims: usize) -> Self {
        let mut plan = Self::for_equality(&[samples, words, vocab]);
        plan.push(TripleRequest::matmul(samples, vocab, dims));
        plan
    }
}

/// Trusted third party that knows every triple in the clear
pub struct TrustedDealer {
    rng: ChaCha20Rng,
    next_id: u64,
}

impl TrustedDealer {
    /// Dealer seeded from OS entropy
    pub fn new() -> Self {
        Self {
            rng: ChaCha20Rng::from_entropy(),
            next_id: 0,
        }
    }

    /// Deterministic dealer for tests and reproducible benchmarks
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
            next_id: 0,
        }
    }

    /// Generate one triple and split it: `(party 0 share, party 1 share)`
    pub fn deal_one(&mut self, request: &TripleRequest) -> Result<(TripleShare, TripleShare)> {
        let mut a = RingTensor::random(request.a_shape.clone(), &mut self.rng);
        let mut b = RingTensor::random(request.b_shape.clone(), &mut self.rng);
        let mut c = match request.kind {
            TripleKind::Elementwise => a.mul(&b)?,
            TripleKind::MatMul => a.matmul(&b)?,
            TripleKind::Binary => a.and(&b)?,
        };

        let xor = request.kind == TripleKind::Binary;
        let (a0, a1) = split(&a, xor, &mut self.rng)?;
        let (b0, b1) = split(&b, xor, &mut self.rng)?;
        let (c0, c1) = split(&c, xor, &mut self.rng)?;
        a.data_mut().zeroize();
        b.data_mut().zeroize();
        c.data_mut().zeroize();

        let id = TripleId(self.next_id);
        self.next_id += 1;
        Ok((
            TripleShare::new(id, request.kind, a0, b0, c0),
            TripleShare::new(id, request.kind, a1, b1, c1),
        ))
    }

    /// Generate every triple in `plan`, one store per party
    pub fn deal(&mut self, plan: &TriplePlan) -> Result<(TripleStore, TripleStore)> {
        tracing::info!(
            triples = plan.len(),
            elements_per_party = plan.share_len(),
            "Dealing Beaver triples"
        );

        let bundle_id = self.rng.next_u64();
        let mut zero = TripleStore::with_bundle_id(Party::Zero, bundle_id);
        let mut one = TripleStore::with_bundle_id(Party::One, bundle_id);
        for request in plan.requests() {
            let (s0, s1) = self.deal_one(request)?;
            zero.push(s0);
            one.push(s1);
        }
        Ok((zero, one))
    }
}

impl Default for TrustedDealer {
    fn default() -> Self {
        Self::new()
    }
}

fn split<R: RngCore>(value: &RingTensor, xor: bool, rng: &mut R) -> Result<(RingTensor, RingTensor)> {
    let mask = RingTensor::random(value.shape().to_vec(), rng);
    let masked = if xor { value.xor(&mask)? } else { value.sub(&mask)? };
    Ok((masked, mask))
}

/// FIFO of one party's triple shares
#[derive(Debug)]
pub struct TripleStore {
    party: Party,
    bundle_id: u64,
    triples: VecDeque<TripleShare>,
}

impl TripleStore {
    /// Empty store with bundle id 0
    pub fn new(party: Party) -> Self {
        Self::with_bundle_id(party, 0)
    }

    pub fn with_bundle_id(party: Party, bundle_id: u64) -> Self {
        Self {
            party,
            bundle_id,
            triples: VecDeque::new(),
        }
    }

    /// Which party these shares belong to
    pub fn party(&self) -> Party {
        self.party
    }

    pub fn push(&mut self, share: TripleShare) {
        self.triples.push_back(share);
    }

    /// Queue every triple of `other` after ours
    pub fn append(&mut self, other: TripleStore) {
        self.triples.extend(other.triples);
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// Write as a bundle stream
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let sender = self.party.rank();
        let mut head = Vec::with_capacity(BUNDLE_HEAD_LEN);
        head.write_u8(sender as u8)?;
        head.write_all(&[0u8; 3])?; // reserved
        head.write_u32::<LittleEndian>(self.triples.len() as u32)?;
        head.write_u64::<LittleEndian>(self.bundle_id)?;
        bundle_frame(head, 0, sender).write_to(writer)?;

        for (i, triple) in self.triples.iter().enumerate() {
            let mut payload = Vec::new();
            payload.write_u64::<LittleEndian>(triple.id().0)?;
            payload.write_u8(triple.kind().to_u8())?;
            payload.write_all(&[0u8; 3])?; // reserved
            for t in [triple.a(), triple.b(), triple.c()] {
                WireTensor::new(t.shape().to_vec(), t.data().to_vec()).write_into(&mut payload);
            }
            if payload.len() > MAX_PAYLOAD_LEN {
                return Err(SharingError::InvalidBundle(format!(
                    "triple {} does not fit in one frame",
                    triple.id()
                )));
            }
            bundle_frame(payload, i as u64 + 1, sender).write_to(writer)?;
        }
        Ok(())
    }

    /// Read a bundle stream
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let head = read_bundle_frame(reader)?;
        if head.payload.len() != BUNDLE_HEAD_LEN {
            return Err(SharingError::InvalidBundle("bad bundle header".into()));
        }
        let mut cursor = Cursor::new(&head.payload[..]);
        let rank = cursor.read_u8()? as u32;
        let party = Party::from_rank(rank).ok_or(SharingError::InvalidRank(rank))?;
        cursor.set_position(4);
        let count = cursor.read_u32::<LittleEndian>()? as usize;
        let bundle_id = cursor.read_u64::<LittleEndian>()?;

        let mut store = Self::with_bundle_id(party, bundle_id);
        for _ in 0..count {
            let frame = read_bundle_frame(reader)?;
            store.push(decode_triple(&frame.payload)?);
        }
        Ok(store)
    }

    /// Write a bundle file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Read a bundle file and mark it spent.
    ///
    /// The file is renamed to `<path>.spent` before it is read and emptied
    /// afterwards, whether or not it parsed. While the marker exists, loading
    /// from `path` fails with [`SharingError::BundleSpent`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let spent = spent_path(path);
        if spent.exists() {
            return Err(SharingError::BundleSpent(path.display().to_string()));
        }
        std::fs::rename(path, &spent)?;

        let store = File::open(&spent)
            .map_err(SharingError::from)
            .and_then(|file| Self::read_from(&mut BufReader::new(file)));
        File::create(&spent)?;
        tracing::info!(path = %path.display(), "Triple bundle claimed");
        store
    }
}

impl TripleSource for TripleStore {
    fn next_triple(&mut self, request: &TripleRequest) -> Result<TripleShare> {
        let triple = self
            .triples
            .pop_front()
            .ok_or(SharingError::TripleExhausted(request.kind))?;
        if !triple.matches(request) {
            return Err(SharingError::ShapeMismatch {
                expected: request.a_shape.clone(),
                got: triple.a().shape().to_vec(),
            });
        }
        Ok(triple)
    }

    fn remaining(&self) -> usize {
        self.triples.len()
    }

    fn discard(&mut self) -> usize {
        let dropped = self.triples.len();
        self.triples.clear();
        dropped
    }

    fn bundle_id(&self) -> u64 {
        self.bundle_id
    }
}

fn spent_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".spent");
    PathBuf::from(name)
}

fn bundle_frame(payload: Vec<u8>, seq: u64, sender: u32) -> Frame {
    let mut header = Header::unbound();
    header.seq = seq;
    header.sender = sender;
    Frame::new(MsgType::TripleBundle, header, payload)
}

fn read_bundle_frame<R: Read>(reader: &mut R) -> Result<Frame> {
    let frame = Frame::read_from(reader)?;
    if frame.msg_type != MsgType::TripleBundle {
        return Err(SharingError::InvalidBundle(format!(
            "unexpected {:?} frame",
            frame.msg_type
        )));
    }
    Ok(frame)
}

fn decode_triple(payload: &[u8]) -> Result<TripleShare> {
    if payload.len() < 12 {
        return Err(SharingError::InvalidBundle("truncated triple".into()));
    }
    let mut cursor = Cursor::new(payload);
    let id = TripleId(cursor.read_u64::<LittleEndian>()?);
    let kind = cursor.read_u8()?;
    let kind = TripleKind::from_u8(kind)
        .ok_or_else(|| SharingError::InvalidBundle(format!("unknown triple kind {kind}")))?;
    cursor.set_position(12);
    let mut tensors = Vec::with_capacity(3);
    for _ in 0..3 {
        let wire = WireTensor::read_from(&mut cursor)?;
        tensors.push(RingTensor::from_raw(wire.data, wire.shape)?);
    }
    if cursor.position() as usize != payload.len() {
        return Err(SharingError::InvalidBundle("trailing bytes after triple".into()));
    }
    let c = tensors.pop();
    let b = tensors.pop();
    let a = tensors.pop();
    match (a, b, c) {
        (Some(a), Some(b), Some(c)) => Ok(TripleShare::new(id, kind, a, b, c)),
        _ => Err(SharingError::InvalidBundle("missing triple operand".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(x: &RingTensor, y: &RingTensor, xor: bool) -> RingTensor {
        if xor {
            x.xor(y).unwrap()
        } else {
            x.add(y).unwrap()
        }
    }

    #[test]
    fn test_dealt_triples_are_correlated() {
        let mut dealer = TrustedDealer::from_seed(11);
        for request in [
            TripleRequest::elementwise(&[3, 2]),
            TripleRequest::matmul(2, 3, 4),
            TripleRequest::binary(&[5]),
        ] {
            let (s0, s1) = dealer.deal_one(&request).unwrap();
            assert_eq!(s0.id(), s1.id());
            let xor = request.kind == TripleKind::Binary;
            let a = open(s0.a(), s1.a(), xor);
            let b = open(s0.b(), s1.b(), xor);
            let c = open(s0.c(), s1.c(), xor);
            let expected = match request.kind {
                TripleKind::Elementwise => a.mul(&b).unwrap(),
                TripleKind::MatMul => a.matmul(&b).unwrap(),
                TripleKind::Binary => a.and(&b).unwrap(),
            };
            assert_eq!(c, expected);
        }
    }

    #[test]
    fn test_ids_in_issue_order() {
        let mut dealer = TrustedDealer::from_seed(12);
        let plan = TriplePlan::for_equality(&[2, 2]);
        let (mut zero, one) = dealer.deal(&plan).unwrap();
        assert_eq!(zero.len(), 7);
        assert_eq!(one.party(), Party::One);

        let first = zero.next_triple(&TripleRequest::binary(&[2, 2])).unwrap();
        let second = zero.next_triple(&TripleRequest::binary(&[2, 2])).unwrap();
        assert_eq!(first.id(), TripleId(0));
        assert_eq!(second.id(), TripleId(1));
    }

    #[test]
    fn test_lookup_plan() {
        let plan = TriplePlan::for_lookup(1, 3, 10, 2);
        assert_eq!(plan.len(), 8);
        assert_eq!(plan.requests()[6], TripleRequest::elementwise(&[1, 3, 10]));
        assert_eq!(plan.requests()[7], TripleRequest::matmul(1, 10, 2));
    }

    #[test]
    fn test_exhaustion() {
        let mut store = TripleStore::new(Party::Zero);
        assert!(matches!(
            store.next_triple(&TripleRequest::elementwise(&[1])),
            Err(SharingError::TripleExhausted(TripleKind::Elementwise))
        ));
    }

    #[test]
    fn test_shape_mismatch() {
        let mut dealer = TrustedDealer::from_seed(13);
        let (s0, _) = dealer.deal_one(&TripleRequest::elementwise(&[4])).unwrap();
        let mut store = TripleStore::new(Party::Zero);
        store.push(s0);
        assert!(matches!(
            store.next_triple(&TripleRequest::elementwise(&[5])),
            Err(SharingError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_discard() {
        let mut dealer = TrustedDealer::from_seed(14);
        let (mut zero, _) = dealer.deal(&TriplePlan::for_lookup(1, 2, 3, 2)).unwrap();
        assert_eq!(zero.discard(), 8);
        assert_eq!(zero.remaining(), 0);
    }

    #[test]
    fn test_bundle_stream() {
        let mut dealer = TrustedDealer::from_seed(15);
        let (_, one) = dealer.deal(&TriplePlan::for_lookup(1, 2, 3, 2)).unwrap();

        let mut buf = Vec::new();
        one.write_to(&mut buf).unwrap();
        let mut loaded = TripleStore::read_from(&mut Cursor::new(buf)).unwrap();
        assert_eq!(loaded.party(), Party::One);
        assert_eq!(loaded.len(), one.len());
        assert_eq!(loaded.bundle_id(), one.bundle_id());

        let mut original = one;
        for request in TriplePlan::for_lookup(1, 2, 3, 2).requests() {
            let x = original.next_triple(request).unwrap();
            let y = loaded.next_triple(request).unwrap();
            assert_eq!(x.id(), y.id());
            assert_eq!(x.c(), y.c());
        }
    }

    #[test]
    fn test_bundle_rejects_session_frames() {
        let frame = Frame::new(MsgType::Reveal, Header::unbound(), vec![0; 8]);
        let mut buf = Vec::new();
        frame.write_to(&mut buf).unwrap();
        assert!(matches!(
            TripleStore::read_from(&mut Cursor::new(buf)),
            Err(SharingError::InvalidBundle(_))
        ));
    }

    #[test]
    fn test_deals_carry_distinct_bundle_ids() {
        let mut dealer = TrustedDealer::from_seed(16);
        let plan = TriplePlan::for_equality(&[2]);
        let (a0, a1) = dealer.deal(&plan).unwrap();
        let (b0, _) = dealer.deal(&plan).unwrap();
        assert_eq!(a0.bundle_id(), a1.bundle_id());
        assert_ne!(a0.bundle_id(), b0.bundle_id());
    }

    #[test]
    fn test_bundle_loads_once() {
        let dir = std::env::temp_dir().join(format!("privlookup-bundle-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("party0.triples");

        let mut dealer = TrustedDealer::from_seed(17);
        let (zero, _) = dealer.deal(&TriplePlan::for_lookup(1, 2, 3, 2)).unwrap();
        zero.save(&path).unwrap();

        let loaded = TripleStore::load(&path).unwrap();
        assert_eq!(loaded.len(), 8);
        assert_eq!(loaded.bundle_id(), zero.bundle_id());
        assert!(!path.exists());
        // Spent marker holds no triple material
        assert_eq!(std::fs::metadata(spent_path(&path)).unwrap().len(), 0);

        assert!(matches!(TripleStore::load(&path), Err(SharingError::BundleSpent(_))));

        // Writing the same bundle back does not revive it
        zero.save(&path).unwrap();
        assert!(matches!(TripleStore::load(&path), Err(SharingError::BundleSpent(_))));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
