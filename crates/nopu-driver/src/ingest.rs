//! Batched image ingestion
//!
//! An image arrives as a sequence of fixed-size datagrams, one batch per
//! packet. The transport below this module owns packet validation —
//! checksums, destination address, ARP/ICMP replies — and hands up only
//! datagrams already addressed to this host; what remains here is the
//! batch protocol: destination-port check, sender latching, payload
//! placement, and the `[sequence, batch]` acknowledgement per batch.
//!
//! Payload bytes widen one-to-one into `i32` samples, so a 3072-sample
//! image at the default 1024-byte packet size lands in exactly three
//! batches.

use crate::error::{CopError, Result};
use crate::session::SessionState;
use bytes::Bytes;
use std::net::{SocketAddr, UdpSocket};
use tracing::{debug, warn};

/// UDP port the firmware serves on.
pub const DEFAULT_UDP_PORT: u16 = 5005;

/// Samples per batch datagram.
pub const DEFAULT_PACKET_SIZE: usize = 1024;

/// One validated datagram as the transport delivers it.
#[derive(Debug, Clone)]
pub struct Datagram {
    /// Sender address.
    pub source: SocketAddr,
    /// Destination port the packet was addressed to.
    pub dest_port: u16,
    /// UDP payload.
    pub payload: Bytes,
}

impl Datagram {
    /// Build a datagram.
    pub fn new(source: SocketAddr, dest_port: u16, payload: impl Into<Bytes>) -> Self {
        Self {
            source,
            dest_port,
            payload: payload.into(),
        }
    }
}

/// The validated packet source/sink the ingestion loop runs against.
///
/// Implementations own everything below UDP: frame classification,
/// checksum verification, destination-address filtering, and answering
/// ARP/ICMP themselves. `recv` blocks until a frame arrives and returns
/// `None` for frames consumed at that layer, so the caller just loops.
pub trait Transport {
    /// Block until the next frame; `None` if it was handled or dropped
    /// below UDP.
    ///
    /// # Errors
    ///
    /// Returns [`CopError::Transport`] on I/O failure.
    fn recv(&mut self) -> Result<Option<Datagram>>;

    /// Send one datagram.
    ///
    /// # Errors
    ///
    /// Returns [`CopError::Transport`] on I/O failure.
    fn send(&mut self, dest: SocketAddr, payload: &[u8]) -> Result<()>;
}

/// What to do when a mid-round packet arrives from a new sender.
///
/// The firmware re-latches the host address on every accepted packet,
/// which lets a third party hijack an in-progress transfer; that stays
/// the default. [`SenderPolicy::StrictFirst`] latches once per round and
/// surfaces foreign packets as [`CopError::StaleSender`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SenderPolicy {
    /// Re-latch the host endpoint on every accepted packet (observed
    /// firmware behavior).
    #[default]
    LatchEachPacket,
    /// Latch on the first packet of a round; reject others.
    StrictFirst,
}

/// Ingestion parameters.
#[derive(Debug, Clone, Copy)]
pub struct IngestConfig {
    /// Destination port this device accepts image batches on.
    pub port: u16,
    /// Samples per batch datagram.
    pub packet_size: usize,
    /// Mid-round sender handling.
    pub sender_policy: SenderPolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_UDP_PORT,
            packet_size: DEFAULT_PACKET_SIZE,
            sender_policy: SenderPolicy::default(),
        }
    }
}

/// Receive one complete image into `image`.
///
/// Loops until `ceil(image.len() / packet_size)` batches have been
/// accepted. Wrong-port packets are logged and dropped without advancing
/// the batch counter. Each accepted batch is acknowledged to the latched
/// host with `[sequence, batch]`. On completion the batch counter resets
/// and the sequence number increments (wrapping).
///
/// # Errors
///
/// Returns [`CopError::Transport`] on transport I/O failure, and
/// [`CopError::StaleSender`] under [`SenderPolicy::StrictFirst`] when a
/// mid-round packet arrives from a sender other than the latched one.
pub fn receive_image<T: Transport>(
    transport: &mut T,
    config: &IngestConfig,
    state: &mut SessionState,
    image: &mut [i32],
) -> Result<()> {
    let total_batches = image.len().div_ceil(config.packet_size);
    state.batch = 0;
    if config.sender_policy == SenderPolicy::StrictFirst {
        // A round is defined by its first packet.
        state.host = None;
    }

    while (state.batch as usize) < total_batches {
        let Some(datagram) = transport.recv()? else {
            continue;
        };
        if datagram.dest_port != config.port {
            warn!(port = datagram.dest_port, "wrong port");
            continue;
        }
        match (config.sender_policy, state.host) {
            (SenderPolicy::StrictFirst, Some(latched)) if latched != datagram.source => {
                return Err(CopError::StaleSender {
                    latched,
                    got: datagram.source,
                });
            }
            _ => state.host = Some(datagram.source),
        }

        let offset = state.batch as usize * config.packet_size;
        let take = datagram
            .payload
            .len()
            .min(config.packet_size)
            .min(image.len() - offset);
        for (i, &byte) in datagram.payload[..take].iter().enumerate() {
            image[offset + i] = i32::from(byte);
        }

        state.batch = state.batch.wrapping_add(1);
        let host = state.host.unwrap_or(datagram.source);
        transport.send(host, &[state.sequence, state.batch])?;
        debug!(
            seq = state.sequence,
            batch = state.batch,
            of = total_batches,
            from = %host,
            "batch accepted"
        );
    }

    state.batch = 0;
    state.sequence = state.sequence.wrapping_add(1);
    Ok(())
}

/// [`Transport`] over a bound [`UdpSocket`].
///
/// The kernel's network stack plays the role the firmware's ethlib did:
/// checksum verification, address filtering, and ARP/ICMP handling all
/// happen before a payload surfaces here, so every received datagram is
/// already validated and addressed to this socket.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    local_port: u16,
}

impl UdpTransport {
    /// Bind a socket and wrap it.
    ///
    /// # Errors
    ///
    /// Returns [`CopError::Transport`] if the bind fails.
    pub fn bind(addr: impl std::net::ToSocketAddrs) -> Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        let local_port = socket.local_addr()?.port();
        Ok(Self { socket, local_port })
    }

    /// The bound local port.
    pub const fn local_port(&self) -> u16 {
        self.local_port
    }
}

impl Transport for UdpTransport {
    fn recv(&mut self) -> Result<Option<Datagram>> {
        // Largest frame the batch protocol ever carries.
        let mut buf = vec![0u8; 2048];
        let (len, source) = self.socket.recv_from(&mut buf)?;
        buf.truncate(len);
        Ok(Some(Datagram::new(source, self.local_port, buf)))
    }

    fn send(&mut self, dest: SocketAddr, payload: &[u8]) -> Result<()> {
        self.socket.send_to(payload, dest)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emu::ScriptedTransport;

    fn sender(port: u16) -> SocketAddr {
        format!("192.168.24.45:{port}").parse().unwrap()
    }

    fn batches(transport: &mut ScriptedTransport, from: SocketAddr, port: u16, count: usize) {
        for b in 0..count {
            let payload: Vec<u8> = (0..DEFAULT_PACKET_SIZE)
                .map(|i| ((b * DEFAULT_PACKET_SIZE + i) % 251) as u8)
                .collect();
            transport.queue(Datagram::new(from, port, payload));
        }
    }

    #[test]
    fn image_reassembles_in_arrival_order() {
        let mut transport = ScriptedTransport::new();
        let host = sender(40_000);
        batches(&mut transport, host, DEFAULT_UDP_PORT, 3);

        let mut state = SessionState::new();
        let mut image = vec![0i32; 3072];
        receive_image(&mut transport, &IngestConfig::default(), &mut state, &mut image).unwrap();

        for (i, &sample) in image.iter().enumerate() {
            assert_eq!(sample, (i % 251) as i32, "sample {i}");
        }
        assert_eq!(state.batch, 0);
        assert_eq!(state.sequence, 1);
        assert_eq!(state.host, Some(host));
    }

    #[test]
    fn ack_carries_sequence_and_batch() {
        let mut transport = ScriptedTransport::new();
        let host = sender(40_000);
        batches(&mut transport, host, DEFAULT_UDP_PORT, 3);

        let mut state = SessionState::new();
        state.sequence = 9;
        let mut image = vec![0i32; 3072];
        receive_image(&mut transport, &IngestConfig::default(), &mut state, &mut image).unwrap();

        let acks: Vec<(SocketAddr, Vec<u8>)> = transport
            .sent
            .iter()
            .map(|(dest, payload)| (*dest, payload.to_vec()))
            .collect();
        assert_eq!(
            acks,
            vec![
                (host, vec![9, 1]),
                (host, vec![9, 2]),
                (host, vec![9, 3]),
            ]
        );
        assert_eq!(state.sequence, 10);
    }

    #[test]
    fn wrong_port_dropped_without_advancing_batch() {
        let mut transport = ScriptedTransport::new();
        let host = sender(40_000);
        transport.queue(Datagram::new(host, 4999, vec![0xFF; DEFAULT_PACKET_SIZE]));
        batches(&mut transport, host, DEFAULT_UDP_PORT, 3);

        let mut state = SessionState::new();
        let mut image = vec![0i32; 3072];
        receive_image(&mut transport, &IngestConfig::default(), &mut state, &mut image).unwrap();

        // Three acks only; the misdirected packet produced none and its
        // payload never landed.
        assert_eq!(transport.sent.len(), 3);
        assert_eq!(image[0], 0);
    }

    #[test]
    fn non_udp_frames_skipped() {
        let mut transport = ScriptedTransport::new();
        let host = sender(40_000);
        transport.queue_frame(None); // e.g. an ARP the stack answered
        batches(&mut transport, host, DEFAULT_UDP_PORT, 3);

        let mut state = SessionState::new();
        let mut image = vec![0i32; 3072];
        receive_image(&mut transport, &IngestConfig::default(), &mut state, &mut image).unwrap();
        assert_eq!(state.sequence, 1);
    }

    #[test]
    fn strict_policy_rejects_mid_round_sender_change() {
        let mut transport = ScriptedTransport::new();
        let host = sender(40_000);
        let intruder = sender(41_000);
        batches(&mut transport, host, DEFAULT_UDP_PORT, 1);
        batches(&mut transport, intruder, DEFAULT_UDP_PORT, 1);

        let config = IngestConfig {
            sender_policy: SenderPolicy::StrictFirst,
            ..IngestConfig::default()
        };
        let mut state = SessionState::new();
        let mut image = vec![0i32; 3072];
        match receive_image(&mut transport, &config, &mut state, &mut image) {
            Err(CopError::StaleSender { latched, got }) => {
                assert_eq!(latched, host);
                assert_eq!(got, intruder);
            }
            other => panic!("expected StaleSender, got {other:?}"),
        }
    }

    #[test]
    fn default_policy_relatches_each_packet() {
        let mut transport = ScriptedTransport::new();
        let host = sender(40_000);
        let other = sender(41_000);
        batches(&mut transport, host, DEFAULT_UDP_PORT, 2);
        batches(&mut transport, other, DEFAULT_UDP_PORT, 1);

        let mut state = SessionState::new();
        let mut image = vec![0i32; 3072];
        receive_image(&mut transport, &IngestConfig::default(), &mut state, &mut image).unwrap();

        // Last accepted packet wins the latch; the final ack went to it.
        assert_eq!(state.host, Some(other));
        assert_eq!(transport.sent.last().unwrap().0, other);
    }

    #[test]
    fn short_final_batch_accepted() {
        let mut transport = ScriptedTransport::new();
        let host = sender(40_000);
        transport.queue(Datagram::new(host, DEFAULT_UDP_PORT, vec![5u8; 784]));

        let mut state = SessionState::new();
        let mut image = vec![0i32; 784];
        receive_image(&mut transport, &IngestConfig::default(), &mut state, &mut image).unwrap();
        assert_eq!(image[783], 5);
        assert_eq!(state.sequence, 1);
    }
}
