//! Point-to-point transports between the two parties
//!
//! A [`Transport`] moves whole frames and nothing else: ordering, session
//! binding and exactly-once checks live in [`crate::PeerChannel`]. Every
//! receive is bounded by a timeout; a timeout is reported, never retried.

use std::io::ErrorKind;
use std::net::{TcpListener, TcpStream, ToSocketAddrs};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{ProtocolError, Result};
use crate::frame::Frame;

/// Blocking frame transport to the single peer of a two-party run
pub trait Transport: Send {
    /// Send one frame to the peer
    fn send(&mut self, frame: &Frame) -> Result<()>;

    /// Block until the next frame from the peer arrives or the timeout elapses
    fn receive(&mut self) -> Result<Frame>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, frame: &Frame) -> Result<()> {
        (**self).send(frame)
    }

    fn receive(&mut self) -> Result<Frame> {
        (**self).receive()
    }
}

/// In-process transport over a pair of channels
pub struct MemoryTransport {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
    timeout: Duration,
}

impl MemoryTransport {
    /// Create two connected endpoints
    pub fn pair(timeout: Duration) -> (Self, Self) {
        let (tx_a, rx_b) = mpsc::channel();
        let (tx_b, rx_a) = mpsc::channel();
        (
            Self {
                tx: tx_a,
                rx: rx_a,
                timeout,
            },
            Self {
                tx: tx_b,
                rx: rx_b,
                timeout,
            },
        )
    }
}

impl Transport for MemoryTransport {
    fn send(&mut self, frame: &Frame) -> Result<()> {
        self.tx
            .send(frame.encode())
            .map_err(|_| ProtocolError::ConnectionClosed)
    }

    fn receive(&mut self) -> Result<Frame> {
        match self.rx.recv_timeout(self.timeout) {
            Ok(bytes) => Frame::decode(&bytes),
            Err(RecvTimeoutError::Timeout) => Err(ProtocolError::Timeout(self.timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(ProtocolError::ConnectionClosed),
        }
    }
}

const ACCEPT_POLL: Duration = Duration::from_millis(20);

/// TCP transport with length-prefixed frames
pub struct TcpTransport {
    stream: TcpStream,
    timeout: Duration,
}

impl TcpTransport {
    /// Bind `addr` and accept exactly one peer connection.
    ///
    /// `timeout` bounds both the wait for the peer to connect and every
    /// later receive.
    pub fn listen(addr: impl ToSocketAddrs, timeout: Duration) -> Result<Self> {
        let listener = TcpListener::bind(addr)?;
        tracing::info!(addr = ?listener.local_addr()?, "Waiting for peer");
        Self::accept(&listener, timeout)
    }

    /// Accept one connection on a bound listener within `timeout`
    pub fn accept(listener: &TcpListener, timeout: Duration) -> Result<Self> {
        listener.set_nonblocking(true)?;
        let deadline = Instant::now() + timeout;
        loop {
            match listener.accept() {
                Ok((stream, peer)) => {
                    tracing::info!(%peer, "Peer connected");
                    stream.set_nonblocking(false)?;
                    return Self::from_stream(stream, timeout);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(ProtocolError::Timeout(timeout));
                    }
                    thread::sleep(ACCEPT_POLL);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Connect to a listening peer, retrying while it is not yet up
    pub fn connect(addr: impl ToSocketAddrs + Copy, timeout: Duration, attempts: u32) -> Result<Self> {
        let mut last_err = None;
        for attempt in 0..attempts.max(1) {
            match TcpStream::connect(addr) {
                Ok(stream) => return Self::from_stream(stream, timeout),
                Err(e) if e.kind() == ErrorKind::ConnectionRefused => {
                    tracing::debug!(attempt, "Peer not listening yet");
                    last_err = Some(e);
                    thread::sleep(Duration::from_millis(200));
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(last_err
            .map(ProtocolError::Io)
            .unwrap_or(ProtocolError::ConnectionClosed))
    }

    fn from_stream(stream: TcpStream, timeout: Duration) -> Result<Self> {
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(timeout))?;
        Ok(Self { stream, timeout })
    }
}

impl Transport for TcpTransport {
    fn send(&mut self, frame: &Frame) -> Result<()> {
        frame.write_to(&mut self.stream)
    }

    fn receive(&mut self) -> Result<Frame> {
        Frame::read_from(&mut self.stream).map_err(|e| match e {
            ProtocolError::Io(io) => match io.kind() {
                ErrorKind::WouldBlock | ErrorKind::TimedOut => ProtocolError::Timeout(self.timeout),
                ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset => {
                    ProtocolError::ConnectionClosed
                }
                _ => ProtocolError::Io(io),
            },
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MsgType;
    use crate::header::Header;

    fn frame(seq: u64) -> Frame {
        Frame::new(MsgType::Reveal, Header::new([3; 16], seq, 0), vec![seq as u8])
    }

    #[test]
    fn test_memory_pair_delivers_in_order() {
        let (mut a, mut b) = MemoryTransport::pair(Duration::from_secs(1));
        a.send(&frame(0)).unwrap();
        a.send(&frame(1)).unwrap();
        assert_eq!(b.receive().unwrap(), frame(0));
        assert_eq!(b.receive().unwrap(), frame(1));
    }

    #[test]
    fn test_memory_receive_times_out() {
        let (_a, mut b) = MemoryTransport::pair(Duration::from_millis(20));
        assert!(matches!(b.receive(), Err(ProtocolError::Timeout(_))));
    }

    #[test]
    fn test_memory_peer_dropped() {
        let (a, mut b) = MemoryTransport::pair(Duration::from_secs(1));
        drop(a);
        assert!(matches!(b.receive(), Err(ProtocolError::ConnectionClosed)));
    }

    #[test]
    fn test_tcp_roundtrip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let mut transport = TcpTransport::accept(&listener, Duration::from_secs(5)).unwrap();
            let got = transport.receive().unwrap();
            transport.send(&got).unwrap();
        });

        let mut client = TcpTransport::connect(addr, Duration::from_secs(5), 10).unwrap();
        client.send(&frame(7)).unwrap();
        assert_eq!(client.receive().unwrap(), frame(7));
        server.join().unwrap();
    }

    #[test]
    fn test_tcp_accept_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let start = Instant::now();
        let result = TcpTransport::accept(&listener, Duration::from_millis(100));
        assert!(matches!(result, Err(ProtocolError::Timeout(_))));
        assert!(start.elapsed() >= Duration::from_millis(100));
    }
}
