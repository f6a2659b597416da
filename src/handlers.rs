//! Request handlers for the DNS responder.
//!
//! This module owns the UDP socket: it receives datagrams, dispatches each one
//! to its own task, and writes the reply back to the sender.

use std::net::SocketAddr;
use std::sync::Arc;
use log::{debug, error, info, warn};
use tokio::{net::UdpSocket, task};

use crate::errors::DnsError;
use crate::responder::Responder;
use crate::telemetry;
use crate::wire::{Header, Message, OPCODE_NOTIFY, OPCODE_QUERY, RCODE_FORMERR, RCODE_NOTIMP};

/// Bind the UDP socket the responder listens on.
///
/// # Arguments
/// * `addr` - The local address to bind.
///
/// # Returns
/// The bound socket, or a `DnsError` if binding fails.
pub async fn bind_udp(addr: SocketAddr) -> Result<UdpSocket, DnsError> {
    let socket = UdpSocket::bind(addr).await?;
    info!("UDP DNS server listening on {}", socket.local_addr()?);
    Ok(socket)
}

/// Serve queries arriving on `socket` until the task is cancelled.
///
/// # Arguments
/// * `socket` - A bound UDP socket.
/// * `responder` - Shared answering logic.
/// * `max_packet_size` - Size of the receive buffer.
pub async fn run_udp_server(
    socket: Arc<UdpSocket>,
    responder: Responder,
    max_packet_size: usize,
) -> Result<(), DnsError> {
    let mut buf = vec![0u8; max_packet_size];

    loop {
        match socket.recv_from(&mut buf).await {
            Ok((amt, src)) => {
                let query = buf[..amt].to_vec();
                let socket = socket.clone();
                let responder = responder.clone();
                task::spawn(async move {
                    if let Err(e) = handle_udp_query(query, src, socket, responder).await {
                        warn!("UDP query error: {}", e);
                    }
                });
            }
            Err(e) => error!("UDP receive error: {}", e),
        }
    }
}

/// Handle a single UDP datagram.
///
/// # Arguments
/// * `query` - The raw datagram.
/// * `src` - The source address of the datagram.
/// * `socket` - The UDP socket to send the reply on.
/// * `responder` - Shared answering logic.
pub async fn handle_udp_query(
    query: Vec<u8>,
    src: SocketAddr,
    socket: Arc<UdpSocket>,
    responder: Responder,
) -> Result<(), DnsError> {
    if let Some(reply) = build_reply(&query, src, &responder) {
        socket.send_to(&reply, src).await?;
    }
    Ok(())
}

/// Turn a datagram into the bytes to send back, if any.
///
/// Short datagrams and responses are ignored. NOTIFY gets an empty NOERROR
/// reply, other opcodes besides QUERY get NOTIMP, and an undecodable
/// question section gets FORMERR.
pub fn build_reply(query: &[u8], src: SocketAddr, responder: &Responder) -> Option<Vec<u8>> {
    let header = match Header::parse(query) {
        Ok(h) => h,
        Err(e) => {
            debug!("Received malformed query from {}: {}", src, e);
            return None;
        }
    };

    if header.is_response() {
        debug!("Ignoring response datagram from {}", src);
        return None;
    }

    telemetry::query_received();
    let parsed = Message::parse_query(query);

    if header.opcode() == OPCODE_NOTIFY {
        debug!("NOTIFY from {} acknowledged without action", src);
        return Some(match parsed {
            Ok(message) => Message::reply_to(&message),
            Err(_) => Message::error_reply(&header, Vec::new(), RCODE_FORMERR),
        }
        .to_bytes());
    }

    if header.opcode() != OPCODE_QUERY {
        debug!("Opcode {} from {} not implemented", header.opcode(), src);
        let questions = parsed.map(|m| m.questions).unwrap_or_default();
        return Some(Message::error_reply(&header, questions, RCODE_NOTIMP).to_bytes());
    }

    let reply = match parsed {
        Ok(message) => {
            debug!("UDP query {} with {} questions from {}", message.id, message.questions.len(), src);
            responder.respond(&message, src.ip())
        }
        Err(e) => {
            debug!("Undecodable query from {}: {}", src, e);
            Message::error_reply(&header, Vec::new(), RCODE_FORMERR)
        }
    };

    Some(reply.to_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{event_channel, EventReceiver};
    use crate::store::RecordStore;
    use crate::wire::{Question, TYPE_A, RCODE_NOERROR};

    fn responder() -> (Responder, EventReceiver) {
        let store: RecordStore = "example.test. 10.0.0.9".parse().unwrap();
        let (tx, rx) = event_channel(4);
        (Responder::new(Arc::new(store), tx, 3600), rx)
    }

    fn src() -> SocketAddr {
        "192.0.2.1:40000".parse().unwrap()
    }

    #[test]
    fn short_datagrams_are_dropped() {
        let (responder, _rx) = responder();
        assert!(build_reply(&[0x00, 0x01, 0x00], src(), &responder).is_none());
    }

    #[test]
    fn responses_are_ignored() {
        let (responder, _rx) = responder();
        let mut msg = Message::query(1, vec![Question::new("example.test.", TYPE_A)]);
        msg.flags |= 0x8000;
        assert!(build_reply(&msg.to_bytes(), src(), &responder).is_none());
    }

    #[test]
    fn non_query_opcode_gets_notimp() {
        let (responder, mut rx) = responder();
        let mut msg = Message::query(2, vec![Question::new("example.test.", TYPE_A)]);
        msg.flags |= 5 << 11; // UPDATE
        let reply = Message::parse(&build_reply(&msg.to_bytes(), src(), &responder).unwrap()).unwrap();

        assert_eq!(reply.rcode(), RCODE_NOTIMP);
        assert_eq!(reply.questions, msg.questions);
        assert!(reply.answers.is_empty());
        assert!(rx.try_receive().is_none());
    }

    #[test]
    fn undecodable_question_gets_formerr() {
        let (responder, _rx) = responder();
        let bytes = [0x12, 0x34, 0x01, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0, 0x07, b'e'];
        let reply = Message::parse(&build_reply(&bytes, src(), &responder).unwrap()).unwrap();

        assert_eq!(reply.id, 0x1234);
        assert_eq!(reply.rcode(), RCODE_FORMERR);
        assert!(reply.questions.is_empty());
    }

    #[test]
    fn known_name_is_answered() {
        let (responder, mut rx) = responder();
        let msg = Message::query(3, vec![Question::new("example.test.", TYPE_A)]);
        let reply = Message::parse(&build_reply(&msg.to_bytes(), src(), &responder).unwrap()).unwrap();

        assert_eq!(reply.rcode(), RCODE_NOERROR);
        assert_eq!(reply.answers.len(), 1);
        let event = rx.try_receive().unwrap();
        assert_eq!(event.source_address, src().ip());
    }

    #[test]
    fn notify_gets_empty_noerror_reply() {
        let (responder, mut rx) = responder();
        let mut msg = Message::query(6, vec![Question::new("example.test.", TYPE_A)]);
        msg.flags |= (OPCODE_NOTIFY as u16) << 11;
        let bytes = build_reply(&msg.to_bytes(), src(), &responder).unwrap();
        let reply = Message::parse(&bytes).unwrap();

        assert_eq!(reply.rcode(), RCODE_NOERROR);
        assert_eq!(Header::parse(&bytes).unwrap().opcode(), OPCODE_NOTIFY);
        assert_eq!(reply.questions, msg.questions);
        assert!(reply.answers.is_empty());
        assert!(rx.try_receive().is_none());
    }

    #[test]
    fn overlong_name_gets_formerr() {
        let (responder, mut rx) = responder();
        let mut bytes = vec![0x00, 0x09, 0x01, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0];
        for _ in 0..5 {
            bytes.push(63);
            bytes.extend_from_slice(&[b'q'; 63]);
        }
        bytes.push(0);
        bytes.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);

        let reply = Message::parse(&build_reply(&bytes, src(), &responder).unwrap()).unwrap();
        assert_eq!(reply.rcode(), RCODE_FORMERR);
        assert!(reply.questions.is_empty());
        assert!(rx.try_receive().is_none());
    }

    #[test]
    fn trailing_garbage_after_questions_is_ignored() {
        let (responder, mut rx) = responder();
        let mut bytes = Message::query(8, vec![Question::new("example.test.", TYPE_A)]).to_bytes();
        bytes[7] = 2; // ANCOUNT claims two records that are not there
        bytes.extend_from_slice(&[0xFF]);

        let reply = Message::parse(&build_reply(&bytes, src(), &responder).unwrap()).unwrap();
        assert_eq!(reply.rcode(), RCODE_NOERROR);
        assert_eq!(reply.answers.len(), 1);
        assert!(rx.try_receive().is_some());
    }
}
