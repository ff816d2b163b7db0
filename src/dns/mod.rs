//! DNS message model and wire codec.
//!
//! Only the pieces an authoritative A-record server needs: a 12-byte header,
//! the question section and the answer section. Authority and additional
//! sections are never populated, so their counts always encode as zero.

mod encoder;
mod name;
mod parser;

pub use encoder::{encode, encode_name};
pub use name::Name;
pub use parser::{decode, decode_response};

use thiserror::Error;

/// Size of the fixed DNS header.
pub const HEADER_LEN: usize = 12;

/// Maximum length of a single label.
pub const MAX_LABEL_LEN: usize = 63;

/// IPv4 host address record.
pub const TYPE_A: u16 = 1;
/// Name server record.
pub const TYPE_NS: u16 = 2;
/// Canonical name record.
pub const TYPE_CNAME: u16 = 5;
/// IPv6 host address record.
pub const TYPE_AAAA: u16 = 28;

/// Internet class.
pub const CLASS_IN: u16 = 1;

/// QR: message is a response.
pub const FLAG_QR: u16 = 0x8000;
/// AA: authoritative answer.
pub const FLAG_AA: u16 = 0x0400;
/// RD: recursion desired.
pub const FLAG_RD: u16 = 0x0100;
/// RA: recursion available.
pub const FLAG_RA: u16 = 0x0080;
/// Low bits of the flags field holding the response code.
pub const RCODE_MASK: u16 = 0x000F;
/// Response code signalling that the queried name does not exist.
pub const RCODE_NXDOMAIN: u16 = 0x0003;

/// Errors produced while decoding a datagram.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("message too short: {len} bytes, minimum {min} required", min = HEADER_LEN)]
    TooShort { len: usize },

    #[error("question truncated at offset {offset}")]
    TruncatedQuestion { offset: usize },

    #[error("label of {len} bytes at offset {offset} extends beyond the message")]
    LabelOverrun { offset: usize, len: usize },

    #[error("invalid compression pointer at offset {offset}")]
    InvalidPointer { offset: usize },

    #[error("reserved label type {byte:#04x} at offset {offset}")]
    ReservedLabelType { offset: usize, byte: u8 },

    #[error("resource record truncated at offset {offset}")]
    TruncatedRecord { offset: usize },
}

/// Values that cannot be represented on the wire.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("record data of {len} bytes exceeds the 65535 byte limit")]
    RdataTooLong { len: usize },

    #[error("section already holds 65535 entries")]
    SectionFull,
}

/// The fixed 12-byte message header.
///
/// On a [`Message`] the four counts are derived from the section lengths,
/// see [`Message::header`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    pub id: u16,
    pub flags: u16,
    pub question_count: u16,
    pub answer_count: u16,
    pub authority_count: u16,
    pub additional_count: u16,
}

impl Header {
    /// Read the header fields from the start of `data`.
    pub fn parse(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < HEADER_LEN {
            return Err(DecodeError::TooShort { len: data.len() });
        }

        let field = |i: usize| u16::from_be_bytes([data[i], data[i + 1]]);

        Ok(Self {
            id: field(0),
            flags: field(2),
            question_count: field(4),
            answer_count: field(6),
            authority_count: field(8),
            additional_count: field(10),
        })
    }

    /// Append the header in network byte order.
    pub fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.id.to_be_bytes());
        buf.extend_from_slice(&self.flags.to_be_bytes());
        buf.extend_from_slice(&self.question_count.to_be_bytes());
        buf.extend_from_slice(&self.answer_count.to_be_bytes());
        buf.extend_from_slice(&self.authority_count.to_be_bytes());
        buf.extend_from_slice(&self.additional_count.to_be_bytes());
    }
}

/// A question section entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Labels as received, case preserved. The root has none.
    pub name: Name,
    pub qtype: u16,
    pub qclass: u16,
}

impl Question {
    pub fn new(name: impl Into<Name>, qtype: u16, qclass: u16) -> Self {
        Self {
            name: name.into(),
            qtype,
            qclass,
        }
    }

    /// An `IN A` question for `name`.
    pub fn a(name: impl Into<Name>) -> Self {
        Self::new(name, TYPE_A, CLASS_IN)
    }
}

/// A resource record in the answer section.
///
/// RDATA is capped at `u16::MAX` bytes, the most its length prefix can carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    pub name: Name,
    pub rtype: u16,
    pub class: u16,
    pub ttl: u32,
    rdata: Vec<u8>,
}

impl ResourceRecord {
    pub fn new(
        name: impl Into<Name>,
        rtype: u16,
        class: u16,
        ttl: u32,
        rdata: Vec<u8>,
    ) -> Result<Self, EncodeError> {
        if rdata.len() > usize::from(u16::MAX) {
            return Err(EncodeError::RdataTooLong { len: rdata.len() });
        }

        Ok(Self {
            name: name.into(),
            rtype,
            class,
            ttl,
            rdata,
        })
    }

    pub fn rdata(&self) -> &[u8] {
        &self.rdata
    }

    /// Length prefix for the RDATA, bounded at construction.
    pub(crate) fn rdata_len(&self) -> u16 {
        u16::try_from(self.rdata.len()).unwrap_or(u16::MAX)
    }
}

/// A DNS message: header fields plus the question and answer sections.
///
/// Section counts are not stored; they always reflect the vectors, so a
/// message cannot advertise entries it does not carry. Each section holds
/// at most `u16::MAX` entries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    pub id: u16,
    pub flags: u16,
    questions: Vec<Question>,
    answers: Vec<ResourceRecord>,
}

impl Message {
    pub fn new(id: u16, flags: u16) -> Self {
        Self {
            id,
            flags,
            questions: Vec::new(),
            answers: Vec::new(),
        }
    }

    /// A standard query with recursion desired, as stub resolvers send it.
    pub fn query(id: u16) -> Self {
        Self::new(id, FLAG_RD)
    }

    /// A reply echoing the id and question section of `query`.
    pub fn reply_to(query: &Message, flags: u16) -> Self {
        Self {
            id: query.id,
            flags,
            questions: query.questions.clone(),
            answers: Vec::new(),
        }
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn answers(&self) -> &[ResourceRecord] {
        &self.answers
    }

    pub fn push_question(&mut self, question: Question) -> Result<(), EncodeError> {
        push_bounded(&mut self.questions, question)
    }

    pub fn push_answer(&mut self, answer: ResourceRecord) -> Result<(), EncodeError> {
        push_bounded(&mut self.answers, answer)
    }

    pub fn with_question(mut self, question: Question) -> Result<Self, EncodeError> {
        self.push_question(question)?;
        Ok(self)
    }

    pub fn with_answer(mut self, answer: ResourceRecord) -> Result<Self, EncodeError> {
        self.push_answer(answer)?;
        Ok(self)
    }

    /// Header view with counts derived from the sections.
    pub fn header(&self) -> Header {
        Header {
            id: self.id,
            flags: self.flags,
            question_count: section_count(&self.questions),
            answer_count: section_count(&self.answers),
            authority_count: 0,
            additional_count: 0,
        }
    }

    pub fn is_response(&self) -> bool {
        self.flags & FLAG_QR != 0
    }

    pub fn rcode(&self) -> u16 {
        self.flags & RCODE_MASK
    }

    /// Encode to wire format.
    pub fn to_bytes(&self) -> Vec<u8> {
        encode(self)
    }
}

fn push_bounded<T>(section: &mut Vec<T>, entry: T) -> Result<(), EncodeError> {
    if section.len() >= usize::from(u16::MAX) {
        return Err(EncodeError::SectionFull);
    }
    section.push(entry);
    Ok(())
}

// Sections never grow past u16::MAX, see push_bounded.
fn section_count<T>(section: &[T]) -> u16 {
    u16::try_from(section.len()).unwrap_or(u16::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_parse_reads_big_endian_fields() {
        let data = [
            0x12, 0x34, 0x81, 0x80, 0x00, 0x01, 0x00, 0x02, 0x00, 0x03, 0x00, 0x04,
        ];

        let header = Header::parse(&data).unwrap();

        assert_eq!(header.id, 0x1234);
        assert_eq!(header.flags, 0x8180);
        assert_eq!(header.question_count, 1);
        assert_eq!(header.answer_count, 2);
        assert_eq!(header.authority_count, 3);
        assert_eq!(header.additional_count, 4);
    }

    #[test]
    fn header_parse_rejects_short_input() {
        assert_eq!(
            Header::parse(&[0x12, 0x34, 0x01]),
            Err(DecodeError::TooShort { len: 3 })
        );
    }

    #[test]
    fn header_write_matches_parse() {
        let header = Header {
            id: 0xbeef,
            flags: 0x0100,
            question_count: 1,
            ..Header::default()
        };
        let mut buf = Vec::new();
        header.write(&mut buf);

        assert_eq!(buf.len(), HEADER_LEN);
        assert_eq!(Header::parse(&buf).unwrap(), header);
    }

    #[test]
    fn message_header_counts_follow_sections() {
        let msg = Message::new(7, FLAG_QR)
            .with_question(Question::a("a.example"))
            .unwrap()
            .with_question(Question::a("b.example"))
            .unwrap()
            .with_answer(
                ResourceRecord::new("a.example", TYPE_A, CLASS_IN, 60, vec![1, 2, 3, 4]).unwrap(),
            )
            .unwrap();

        let header = msg.header();

        assert_eq!(header.question_count, 2);
        assert_eq!(header.answer_count, 1);
        assert_eq!(header.authority_count, 0);
        assert_eq!(header.additional_count, 0);
        assert!(msg.is_response());
    }

    #[test]
    fn rcode_reads_low_bits() {
        let msg = Message::new(1, 0x8183);

        assert_eq!(msg.rcode(), RCODE_NXDOMAIN);
    }

    #[test]
    fn record_rejects_rdata_past_length_prefix() {
        let err = ResourceRecord::new("big.example", TYPE_A, CLASS_IN, 60, vec![0; 65536]);

        assert_eq!(err, Err(EncodeError::RdataTooLong { len: 65536 }));
    }

    #[test]
    fn record_accepts_maximum_rdata() {
        let record =
            ResourceRecord::new("big.example", TYPE_A, CLASS_IN, 60, vec![0xAB; 65535]).unwrap();

        assert_eq!(record.rdata().len(), 65535);
        assert_eq!(record.rdata_len(), u16::MAX);
    }

    #[test]
    fn full_section_rejects_next_entry() {
        let mut msg = Message::query(1);
        for _ in 0..u16::MAX {
            msg.push_question(Question::a("a.example")).unwrap();
        }

        assert_eq!(
            msg.push_question(Question::a("b.example")),
            Err(EncodeError::SectionFull)
        );
        assert_eq!(msg.header().question_count, u16::MAX);
        assert_eq!(msg.questions().len(), usize::from(u16::MAX));
    }

    #[test]
    fn reply_copies_id_and_questions() {
        let query = Message::query(0x4242)
            .with_question(Question::a("www.example.com"))
            .unwrap();

        let reply = Message::reply_to(&query, FLAG_QR);

        assert_eq!(reply.id, 0x4242);
        assert_eq!(reply.flags, FLAG_QR);
        assert_eq!(reply.questions(), query.questions());
        assert!(reply.answers().is_empty());
    }
}
