//! Session-bound, sequenced channel to the peer
//!
//! Every frame carries the session id and a per-direction sequence number.
//! The receiver accepts exactly the next sequence number: a gap (dropped
//! frame) or a repeat (duplicated frame) aborts the run, because a share
//! that arrives out of place cannot be matched to its round.

use crate::constants::{ErrorCode, MsgType};
use crate::error::{ProtocolError, Result};
use crate::frame::Frame;
use crate::header::{generate_session_id, Header, SessionId};
use crate::messages::{AbortPayload, Payload, SessionHelloPayload};
use crate::transport::Transport;

/// Channel from one party to its peer
pub struct PeerChannel<T: Transport> {
    transport: T,
    rank: u32,
    session_id: Option<SessionId>,
    send_seq: u64,
    recv_seq: u64,
}

impl<T: Transport> PeerChannel<T> {
    /// Wrap a transport for the party with the given rank (0 or 1)
    pub fn new(transport: T, rank: u32) -> Self {
        Self {
            transport,
            rank,
            session_id: None,
            send_seq: 0,
            recv_seq: 0,
        }
    }

    pub fn rank(&self) -> u32 {
        self.rank
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id
    }

    /// Bind the session and swap hellos.
    ///
    /// Rank 0 picks the session id and speaks first; rank 1 adopts the id
    /// from the first frame it receives. Returns the peer's hello.
    pub fn establish(&mut self, hello: SessionHelloPayload) -> Result<SessionHelloPayload> {
        if self.rank == 0 {
            self.session_id = Some(generate_session_id());
            self.send(hello)?;
            self.receive::<SessionHelloPayload>()
        } else {
            let frame = self.transport.receive()?;
            if frame.header.is_unbound() {
                return Err(ProtocolError::SessionMismatch);
            }
            self.session_id = Some(frame.header.session_id);
            let peer = self.accept(frame)?;
            self.send(hello)?;
            Ok(peer)
        }
    }

    /// Send a payload to the peer
    pub fn send<P: Payload>(&mut self, payload: P) -> Result<()> {
        let session_id = self.session_id.ok_or(ProtocolError::SessionNotEstablished)?;
        let frame = payload.into_frame(Header::new(session_id, self.send_seq, self.rank));
        frame.check_len()?;
        self.transport.send(&frame)?;
        self.send_seq += 1;
        Ok(())
    }

    /// Receive the next payload, which must be of type `P`
    pub fn receive<P: Payload>(&mut self) -> Result<P> {
        if self.session_id.is_none() {
            return Err(ProtocolError::SessionNotEstablished);
        }
        let frame = self.transport.receive()?;
        self.accept(frame)
    }

    /// Send our payload and receive the peer's counterpart.
    ///
    /// Rank 0 writes first and rank 1 reads first, so two large payloads
    /// never sit in both directions' socket buffers at once.
    pub fn exchange<P: Payload>(&mut self, payload: P) -> Result<P> {
        if self.rank == 0 {
            self.send(payload)?;
            self.receive()
        } else {
            let peer = self.receive()?;
            self.send(payload)?;
            Ok(peer)
        }
    }

    /// Tell the peer this run is over. Delivery is best effort.
    pub fn abort(&mut self, code: ErrorCode, message: &str) {
        if self.session_id.is_none() {
            return;
        }
        if let Err(e) = self.send(AbortPayload::new(code, message)) {
            tracing::debug!(error = %e, "Could not deliver abort to peer");
        }
    }

    fn accept<P: Payload>(&mut self, frame: Frame) -> Result<P> {
        if Some(frame.header.session_id) != self.session_id {
            return Err(ProtocolError::SessionMismatch);
        }
        if frame.header.seq != self.recv_seq {
            return Err(ProtocolError::OutOfOrder {
                expected: self.recv_seq,
                got: frame.header.seq,
            });
        }
        self.recv_seq += 1;

        if frame.msg_type == MsgType::Abort {
            let abort = AbortPayload::decode(&frame.payload)?;
            return Err(ProtocolError::PeerAborted {
                code: abort.error_code(),
                message: abort.message,
            });
        }
        if frame.msg_type != P::MSG_TYPE {
            return Err(ProtocolError::UnexpectedMessage {
                expected: P::MSG_TYPE,
                got: frame.msg_type,
            });
        }
        P::decode(&frame.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{RevealPayload, WireTensor};
    use crate::transport::MemoryTransport;
    use std::thread;
    use std::time::Duration;

    fn hello(rank: u8) -> SessionHelloPayload {
        SessionHelloPayload {
            rank,
            ring_bits: 64,
            frac_bits: 16,
            vocab_size: 10,
            num_dimensions: 2,
            words_per_sample: 3,
            samples_per_batch: 1,
            max_abs_embedding: 1.0,
            bundle_id: 0,
        }
    }

    fn reveal(x: u64) -> RevealPayload {
        RevealPayload {
            frac_bits: 0,
            tensor: WireTensor::new(vec![1], vec![x]),
        }
    }

    fn connected_pair() -> (PeerChannel<MemoryTransport>, PeerChannel<MemoryTransport>) {
        let (a, b) = MemoryTransport::pair(Duration::from_secs(2));
        let mut zero = PeerChannel::new(a, 0);
        let mut one = PeerChannel::new(b, 1);
        let handle = thread::spawn(move || {
            one.establish(hello(1)).unwrap();
            one
        });
        let peer = zero.establish(hello(0)).unwrap();
        assert_eq!(peer.rank, 1);
        let one = handle.join().unwrap();
        assert_eq!(zero.session_id(), one.session_id());
        (zero, one)
    }

    #[test]
    fn test_establish_binds_same_session() {
        let (zero, one) = connected_pair();
        assert!(zero.session_id().is_some());
        assert_eq!(zero.session_id(), one.session_id());
    }

    #[test]
    fn test_send_before_establish_fails() {
        let (a, _b) = MemoryTransport::pair(Duration::from_millis(50));
        let mut channel = PeerChannel::new(a, 0);
        assert!(matches!(
            channel.send(reveal(1)),
            Err(ProtocolError::SessionNotEstablished)
        ));
    }

    #[test]
    fn test_exchange() {
        let (mut zero, mut one) = connected_pair();
        let handle = thread::spawn(move || one.exchange(reveal(11)).unwrap());
        let got = zero.exchange(reveal(22)).unwrap();
        assert_eq!(got.tensor.data, vec![11]);
        assert_eq!(handle.join().unwrap().tensor.data, vec![22]);
    }

    #[test]
    fn test_duplicate_frame_rejected() {
        let (a, b) = MemoryTransport::pair(Duration::from_secs(1));
        let session = [9u8; 16];
        let mut raw = a;
        let mut channel = PeerChannel::new(b, 0);
        channel.session_id = Some(session);

        let frame = reveal(5).into_frame(Header::new(session, 0, 1));
        raw.send(&frame).unwrap();
        raw.send(&frame).unwrap();

        assert!(channel.receive::<RevealPayload>().is_ok());
        assert!(matches!(
            channel.receive::<RevealPayload>(),
            Err(ProtocolError::OutOfOrder { expected: 1, got: 0 })
        ));
    }

    #[test]
    fn test_dropped_frame_rejected() {
        let (mut raw, b) = MemoryTransport::pair(Duration::from_secs(1));
        let session = [9u8; 16];
        let mut channel = PeerChannel::new(b, 0);
        channel.session_id = Some(session);

        raw.send(&reveal(5).into_frame(Header::new(session, 1, 1))).unwrap();
        assert!(matches!(
            channel.receive::<RevealPayload>(),
            Err(ProtocolError::OutOfOrder { expected: 0, got: 1 })
        ));
    }

    #[test]
    fn test_foreign_session_rejected() {
        let (mut raw, b) = MemoryTransport::pair(Duration::from_secs(1));
        let mut channel = PeerChannel::new(b, 0);
        channel.session_id = Some([1u8; 16]);

        raw.send(&reveal(5).into_frame(Header::new([2u8; 16], 0, 1))).unwrap();
        assert!(matches!(
            channel.receive::<RevealPayload>(),
            Err(ProtocolError::SessionMismatch)
        ));
    }

    #[test]
    fn test_unexpected_message_type() {
        let (mut zero, mut one) = connected_pair();
        zero.send(reveal(1)).unwrap();
        assert!(matches!(
            one.receive::<SessionHelloPayload>(),
            Err(ProtocolError::UnexpectedMessage { .. })
        ));
    }

    #[test]
    fn test_peer_abort_surfaces() {
        let (mut zero, mut one) = connected_pair();
        zero.abort(ErrorCode::TripleExhausted, "out of triples");
        match one.receive::<RevealPayload>() {
            Err(ProtocolError::PeerAborted { code, message }) => {
                assert_eq!(code, ErrorCode::TripleExhausted);
                assert_eq!(message, "out of triples");
            }
            other => panic!("expected PeerAborted, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_receive_timeout() {
        let (mut zero, _one) = connected_pair();
        let (a, _b) = MemoryTransport::pair(Duration::from_millis(20));
        zero.transport = a;
        assert!(matches!(
            zero.receive::<RevealPayload>(),
            Err(ProtocolError::Timeout(_))
        ));
    }
}
