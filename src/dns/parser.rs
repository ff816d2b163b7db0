//! Wire decoding.
//!
//! [`decode`] is the server-side entry point and reads the header and the
//! question section only. [`decode_response`] additionally reads answer
//! records for clients inspecting a reply.

use tracing::debug;

use super::{DecodeError, HEADER_LEN, Header, Message, Name, Question, ResourceRecord};

/// Maximum number of compression pointers followed while reading one name.
const MAX_POINTER_HOPS: usize = 16;

/// Upper bound on pre-allocated section capacity; counts come from the wire.
const MAX_PREALLOC: usize = 32;

/// Decode a query datagram into a [`Message`].
///
/// Answer, authority and additional sections are not parsed, so the returned
/// message has no answers regardless of the header's answer count.
pub fn decode(data: &[u8]) -> Result<Message, DecodeError> {
    let header = Header::parse(data)?;

    debug!(
        id = header.id,
        flags = header.flags,
        question_count = header.question_count,
        answer_count = header.answer_count,
        authority_count = header.authority_count,
        additional_count = header.additional_count,
        "Decoded DNS header"
    );

    let (questions, _) = parse_questions(data, &header)?;

    Ok(Message {
        id: header.id,
        flags: header.flags,
        questions,
        answers: Vec::new(),
    })
}

/// Decode a full response, including `answer_count` answer records.
pub fn decode_response(data: &[u8]) -> Result<Message, DecodeError> {
    let header = Header::parse(data)?;
    let (questions, mut pos) = parse_questions(data, &header)?;

    let mut answers = Vec::with_capacity((header.answer_count as usize).min(MAX_PREALLOC));
    for _ in 0..header.answer_count {
        let (record, next) = parse_record(data, pos)?;
        answers.push(record);
        pos = next;
    }

    Ok(Message {
        id: header.id,
        flags: header.flags,
        questions,
        answers,
    })
}

fn parse_questions(data: &[u8], header: &Header) -> Result<(Vec<Question>, usize), DecodeError> {
    let mut questions = Vec::with_capacity((header.question_count as usize).min(MAX_PREALLOC));
    let mut pos = HEADER_LEN;

    for _ in 0..header.question_count {
        let (question, next) = parse_question(data, pos)?;
        questions.push(question);
        pos = next;
    }

    Ok((questions, pos))
}

fn parse_question(data: &[u8], offset: usize) -> Result<(Question, usize), DecodeError> {
    let (name, pos) = parse_name(data, offset)?;

    if pos + 4 > data.len() {
        return Err(DecodeError::TruncatedQuestion { offset: pos });
    }
    let qtype = u16::from_be_bytes([data[pos], data[pos + 1]]);
    let qclass = u16::from_be_bytes([data[pos + 2], data[pos + 3]]);

    debug!(name = %name, qtype, qclass, "Parsed question");

    Ok((Question { name, qtype, qclass }, pos + 4))
}

fn parse_record(data: &[u8], offset: usize) -> Result<(ResourceRecord, usize), DecodeError> {
    let (name, pos) = parse_name(data, offset).map_err(|e| match e {
        DecodeError::TruncatedQuestion { offset } => DecodeError::TruncatedRecord { offset },
        other => other,
    })?;

    // type + class + ttl + rdlength
    if pos + 10 > data.len() {
        return Err(DecodeError::TruncatedRecord { offset: pos });
    }
    let rtype = u16::from_be_bytes([data[pos], data[pos + 1]]);
    let class = u16::from_be_bytes([data[pos + 2], data[pos + 3]]);
    let ttl = u32::from_be_bytes([data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]]);
    let rdlength = u16::from_be_bytes([data[pos + 8], data[pos + 9]]) as usize;

    let rdata_start = pos + 10;
    if rdata_start + rdlength > data.len() {
        return Err(DecodeError::TruncatedRecord { offset: rdata_start });
    }

    Ok((
        ResourceRecord {
            name,
            rtype,
            class,
            ttl,
            rdata: data[rdata_start..rdata_start + rdlength].to_vec(),
        },
        rdata_start + rdlength,
    ))
}

/// Read a possibly compressed name starting at `offset`.
///
/// Returns the name with its label bytes as received, and the offset just
/// past the name at its original position: after the terminator, or after
/// the two pointer bytes when the name ends in a pointer.
pub(crate) fn parse_name(data: &[u8], offset: usize) -> Result<(Name, usize), DecodeError> {
    let mut name = Name::root();
    let mut visited = Vec::new();

    let end = read_labels(data, offset, &mut name, &mut visited)?;

    Ok((name, end))
}

/// Append the labels found at `pos` to `name`, following pointers.
///
/// `visited` holds every pointer target taken while resolving the current
/// name. A target seen twice, or more than [`MAX_POINTER_HOPS`] targets,
/// fails the whole name.
fn read_labels(
    data: &[u8],
    mut pos: usize,
    name: &mut Name,
    visited: &mut Vec<usize>,
) -> Result<usize, DecodeError> {
    loop {
        let Some(&len) = data.get(pos) else {
            return Err(DecodeError::TruncatedQuestion { offset: pos });
        };

        match len & 0xC0 {
            0xC0 => {
                let Some(&low) = data.get(pos + 1) else {
                    return Err(DecodeError::TruncatedQuestion { offset: pos });
                };
                let target = (((len & 0x3F) as usize) << 8) | low as usize;

                if target >= data.len()
                    || visited.len() >= MAX_POINTER_HOPS
                    || visited.contains(&target)
                {
                    return Err(DecodeError::InvalidPointer { offset: pos });
                }
                visited.push(target);

                read_labels(data, target, name, visited)?;
                return Ok(pos + 2);
            }
            0x00 => {
                if len == 0 {
                    return Ok(pos + 1);
                }
                let len = len as usize;
                let start = pos + 1;
                if start + len > data.len() {
                    return Err(DecodeError::LabelOverrun { offset: pos, len });
                }
                name.push_label(&data[start..start + len]);
                pos = start + len;
            }
            _ => return Err(DecodeError::ReservedLabelType { offset: pos, byte: len }),
        }
    }
}
