//! DNS wire format.
//!
//! Just enough of RFC 1035 to decode inbound queries and encode replies
//! carrying A records. Replies are never compressed.

use std::{net::Ipv4Addr, str};

use crate::errors::DnsError;

/// Length of the fixed DNS header.
pub const HEADER_LEN: usize = 12;

/// Record type for an IPv4 address record.
pub const TYPE_A: u16 = 1;

/// The Internet class.
pub const CLASS_IN: u16 = 1;

/// QCLASS matching any class.
pub const CLASS_ANY: u16 = 255;

/// Standard query opcode.
pub const OPCODE_QUERY: u8 = 0;

/// Zone change notification (RFC 1996).
pub const OPCODE_NOTIFY: u8 = 4;

pub const RCODE_NOERROR: u8 = 0;
pub const RCODE_FORMERR: u8 = 1;
pub const RCODE_NOTIMP: u8 = 4;

const FLAG_QR: u16 = 0x8000;
const FLAG_RD: u16 = 0x0100;
const FLAG_CD: u16 = 0x0010;
const OPCODE_MASK: u16 = 0x7800;
const RCODE_MASK: u16 = 0x000F;

/// Upper bound on compression pointers followed while reading one name.
const MAX_POINTER_HOPS: usize = 16;

/// Longest label and name allowed on the wire (RFC 1035 2.3.4).
const MAX_LABEL_LEN: usize = 63;
const MAX_NAME_LEN: usize = 255;

/// The fixed header at the start of every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub id: u16,
    pub flags: u16,
    pub qdcount: u16,
    pub ancount: u16,
    pub nscount: u16,
    pub arcount: u16,
}

impl Header {
    /// Decode the header of a datagram.
    pub fn parse(buf: &[u8]) -> Result<Self, DnsError> {
        if buf.len() < HEADER_LEN {
            return Err(DnsError::Protocol(format!(
                "datagram of {} bytes is shorter than a header",
                buf.len()
            )));
        }
        let word = |at: usize| u16::from_be_bytes([buf[at], buf[at + 1]]);
        Ok(Self {
            id: word(0),
            flags: word(2),
            qdcount: word(4),
            ancount: word(6),
            nscount: word(8),
            arcount: word(10),
        })
    }

    pub fn is_response(&self) -> bool {
        self.flags & FLAG_QR != 0
    }

    pub fn opcode(&self) -> u8 {
        ((self.flags & OPCODE_MASK) >> 11) as u8
    }

    pub fn rcode(&self) -> u8 {
        (self.flags & RCODE_MASK) as u8
    }

    /// Flags for a reply to this header.
    pub fn reply_flags(&self, rcode: u8) -> u16 {
        reply_flags(self.flags, rcode)
    }
}

/// A single entry of the question section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Dotted name with a trailing `.`.
    pub name: String,
    pub qtype: u16,
    pub qclass: u16,
}

impl Question {
    pub fn new(name: impl Into<String>, qtype: u16) -> Self {
        Self {
            name: name.into(),
            qtype,
            qclass: CLASS_IN,
        }
    }

    /// Whether this question asks for an IPv4 address in the Internet class.
    pub fn wants_address(&self) -> bool {
        self.qtype == TYPE_A && (self.qclass == CLASS_IN || self.qclass == CLASS_ANY)
    }
}

/// An A record in the answer section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRecord {
    pub name: String,
    pub ttl: u32,
    pub address: Ipv4Addr,
}

/// A decoded or to-be-encoded DNS message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: u16,
    pub flags: u16,
    pub questions: Vec<Question>,
    pub answers: Vec<AddressRecord>,
}

impl Message {
    /// Build a standard query with the RD bit set.
    pub fn query(id: u16, questions: Vec<Question>) -> Self {
        Self {
            id,
            flags: FLAG_RD,
            questions,
            answers: Vec::new(),
        }
    }

    /// Start a reply mirroring the query's id, flags and questions.
    pub fn reply_to(query: &Message) -> Self {
        Self {
            id: query.id,
            flags: reply_flags(query.flags, RCODE_NOERROR),
            questions: query.questions.clone(),
            answers: Vec::new(),
        }
    }

    /// An answerless reply carrying `rcode`.
    pub fn error_reply(header: &Header, questions: Vec<Question>, rcode: u8) -> Self {
        Self {
            id: header.id,
            flags: header.reply_flags(rcode),
            questions,
            answers: Vec::new(),
        }
    }

    pub fn rcode(&self) -> u8 {
        (self.flags & RCODE_MASK) as u8
    }

    /// Decode an inbound query: header and question section only. Whatever
    /// follows the questions is ignored.
    pub fn parse_query(buf: &[u8]) -> Result<Self, DnsError> {
        let header = Header::parse(buf)?;
        let (questions, _) = read_questions(buf, &header)?;
        Ok(Self {
            id: header.id,
            flags: header.flags,
            questions,
            answers: Vec::new(),
        })
    }

    /// Decode a message including its answer section.
    ///
    /// Answer records of type A are kept, other answer types are skipped.
    /// Authority and additional sections are ignored.
    pub fn parse(buf: &[u8]) -> Result<Self, DnsError> {
        let header = Header::parse(buf)?;
        let (questions, mut pos) = read_questions(buf, &header)?;

        let mut answers = Vec::new();
        for _ in 0..header.ancount {
            let (name, next) = read_name(buf, pos)?;
            let rtype = read_u16(buf, next)?;
            let ttl = read_u32(buf, next + 4)?;
            let rdlength = read_u16(buf, next + 8)? as usize;
            let rdata = next + 10;
            let end = rdata + rdlength;
            if end > buf.len() {
                return Err(DnsError::Protocol("record data runs past end of message".into()));
            }
            if rtype == TYPE_A && rdlength == 4 {
                let address = Ipv4Addr::new(buf[rdata], buf[rdata + 1], buf[rdata + 2], buf[rdata + 3]);
                answers.push(AddressRecord { name, ttl, address });
            }
            pos = end;
        }

        Ok(Self {
            id: header.id,
            flags: header.flags,
            questions,
            answers,
        })
    }

    /// Encode the message in wire format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(512);
        out.extend_from_slice(&self.id.to_be_bytes());
        out.extend_from_slice(&self.flags.to_be_bytes());
        out.extend_from_slice(&(self.questions.len() as u16).to_be_bytes());
        out.extend_from_slice(&(self.answers.len() as u16).to_be_bytes());
        out.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]); // NSCOUNT, ARCOUNT

        for q in &self.questions {
            out.extend_from_slice(&encode_dns_name(&q.name));
            out.extend_from_slice(&q.qtype.to_be_bytes());
            out.extend_from_slice(&q.qclass.to_be_bytes());
        }

        for rr in &self.answers {
            out.extend_from_slice(&encode_dns_name(&rr.name));
            out.extend_from_slice(&TYPE_A.to_be_bytes());
            out.extend_from_slice(&CLASS_IN.to_be_bytes());
            out.extend_from_slice(&rr.ttl.to_be_bytes());
            out.extend_from_slice(&4u16.to_be_bytes());
            out.extend_from_slice(&rr.address.octets());
        }

        out
    }
}

/// Decode `header.qdcount` questions after the header. Returns them with
/// the offset of the next section.
fn read_questions(buf: &[u8], header: &Header) -> Result<(Vec<Question>, usize), DnsError> {
    let mut pos = HEADER_LEN;
    let mut questions = Vec::with_capacity((header.qdcount as usize).min(8));
    for _ in 0..header.qdcount {
        let (name, next) = read_name(buf, pos)?;
        let qtype = read_u16(buf, next)?;
        let qclass = read_u16(buf, next + 2)?;
        pos = next + 4;
        questions.push(Question { name, qtype, qclass });
    }
    Ok((questions, pos))
}

/// QR set, opcode, RD and CD copied from the query, everything else cleared.
fn reply_flags(query_flags: u16, rcode: u8) -> u16 {
    FLAG_QR | (query_flags & (OPCODE_MASK | FLAG_RD | FLAG_CD)) | (rcode as u16 & RCODE_MASK)
}

/// Encode a domain name in DNS wire format.
///
/// `name` is in presentation form: labels separated by `.`, with `\.` and
/// `\\` standing for a literal dot or backslash inside a label. Empty
/// labels are dropped, so both `"."` and `""` encode as the root. Labels
/// longer than 63 octets are cut; names decoded by `Message::parse` never
/// have any.
pub fn encode_dns_name(name: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(name.len() + 2);
    let mut label = Vec::new();
    let mut chars = name.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    let mut utf8 = [0u8; 4];
                    label.extend_from_slice(escaped.encode_utf8(&mut utf8).as_bytes());
                }
            }
            '.' => push_label(&mut out, &mut label),
            _ => {
                let mut utf8 = [0u8; 4];
                label.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
            }
        }
    }
    push_label(&mut out, &mut label);

    out.push(0);
    out
}

fn push_label(out: &mut Vec<u8>, label: &mut Vec<u8>) {
    if label.is_empty() {
        return;
    }
    let len = label.len().min(MAX_LABEL_LEN);
    out.push(len as u8);
    out.extend_from_slice(&label[..len]);
    label.clear();
}

/// Read a possibly compressed name starting at `pos`.
///
/// Returns the name in presentation form (with trailing `.`, dots and
/// backslashes inside labels escaped) and the offset just past the name as
/// it appears at `pos`. Names longer than 255 octets on the wire are
/// rejected.
fn read_name(buf: &[u8], mut pos: usize) -> Result<(String, usize), DnsError> {
    let mut name = String::new();
    let mut resume = None;
    let mut hops = 0;
    let mut wire_len = 1; // root label

    loop {
        let len = *buf
            .get(pos)
            .ok_or_else(|| DnsError::Protocol("name runs past end of message".into()))?
            as usize;

        match len & 0xC0 {
            0x00 if len == 0 => {
                pos += 1;
                break;
            }
            0x00 => {
                wire_len += 1 + len;
                if wire_len > MAX_NAME_LEN {
                    return Err(DnsError::Protocol(format!(
                        "name longer than {MAX_NAME_LEN} octets"
                    )));
                }
                let label = buf
                    .get(pos + 1..pos + 1 + len)
                    .ok_or_else(|| DnsError::Protocol("label runs past end of message".into()))?;
                let label = str::from_utf8(label)
                    .map_err(|_| DnsError::Protocol("label is not valid UTF-8".into()))?;
                for c in label.chars() {
                    if c == '.' || c == '\\' {
                        name.push('\\');
                    }
                    name.push(c);
                }
                name.push('.');
                pos += 1 + len;
            }
            0xC0 => {
                hops += 1;
                if hops > MAX_POINTER_HOPS {
                    return Err(DnsError::Protocol("too many compression pointers".into()));
                }
                let target = (read_u16(buf, pos)? & 0x3FFF) as usize;
                resume.get_or_insert(pos + 2);
                pos = target;
            }
            _ => return Err(DnsError::Protocol(format!("unsupported label type {len:#04x}"))),
        }
    }

    if name.is_empty() {
        name.push('.');
    }
    Ok((name, resume.unwrap_or(pos)))
}

fn read_u16(buf: &[u8], pos: usize) -> Result<u16, DnsError> {
    buf.get(pos..pos + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or_else(|| DnsError::Protocol("message truncated".into()))
}

fn read_u32(buf: &[u8], pos: usize) -> Result<u32, DnsError> {
    buf.get(pos..pos + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| DnsError::Protocol("message truncated".into()))
}
