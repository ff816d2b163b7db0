//! Wire encoding.
//!
//! Names are always written as literal labels. No compression pointers are
//! emitted, even for repeated suffixes.

use tracing::warn;

use super::{HEADER_LEN, MAX_LABEL_LEN, Message, Name};

/// Encode a message to wire format bytes.
pub fn encode(msg: &Message) -> Vec<u8> {
    let mut data = Vec::with_capacity(512);

    msg.header().write(&mut data);
    debug_assert_eq!(data.len(), HEADER_LEN);

    for q in msg.questions() {
        encode_name(&mut data, &q.name);
        data.extend_from_slice(&q.qtype.to_be_bytes());
        data.extend_from_slice(&q.qclass.to_be_bytes());
    }

    for a in msg.answers() {
        encode_name(&mut data, &a.name);
        data.extend_from_slice(&a.rtype.to_be_bytes());
        data.extend_from_slice(&a.class.to_be_bytes());
        data.extend_from_slice(&a.ttl.to_be_bytes());
        data.extend_from_slice(&a.rdata_len().to_be_bytes());
        data.extend_from_slice(a.rdata());
    }

    data
}

/// Append `name` as length-prefixed labels followed by the zero terminator.
///
/// Label bytes are written unchanged. Labels over 63 bytes are dropped with
/// a warning, which shortens the encoded name.
pub fn encode_name(buf: &mut Vec<u8>, name: &Name) {
    for label in name.labels() {
        let len = match u8::try_from(label.len()) {
            Ok(len) if usize::from(len) <= MAX_LABEL_LEN => len,
            _ => {
                warn!(
                    label = %String::from_utf8_lossy(label),
                    len = label.len(),
                    "Label too long, dropping"
                );
                continue;
            }
        };
        buf.push(len);
        buf.extend_from_slice(label);
    }
    buf.push(0);
}
