//! DNS query resolution logic.
//!
//! Turns a parsed query into an authoritative response using the record
//! table. Transports handle the actual I/O, the resolver handles decisions.

use std::net::Ipv4Addr;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::dns::{
    self, CLASS_IN, DecodeError, FLAG_QR, FLAG_RA, FLAG_RD, Message, RCODE_NXDOMAIN,
    ResourceRecord, TYPE_A,
};
use crate::records::RecordTable;

/// TTL attached to every answer, in seconds.
pub const DEFAULT_TTL: u32 = 300;

/// Base flags of every response: QR, RD and RA set, no error.
pub const RESPONSE_FLAGS: u16 = FLAG_QR | FLAG_RD | FLAG_RA;

/// Build the response for `query` from the records in `table`.
///
/// Only `IN A` questions are looked up, by lowercased name. Answers keep the
/// name as the client spelled it. A response with no answers carries the
/// NXDOMAIN response code.
pub fn build_response(query: &Message, table: &RecordTable) -> Message {
    let mut response = Message::reply_to(query, RESPONSE_FLAGS);

    for question in query.questions() {
        if question.qtype != TYPE_A || question.qclass != CLASS_IN {
            debug!(
                query_id = query.id,
                domain = %question.name,
                qtype = question.qtype,
                qclass = question.qclass,
                "Unsupported question type or class"
            );
            continue;
        }

        let key = RecordTable::key(&question.name);
        let Some(data) = table.lookup(&key, TYPE_A) else {
            debug!(
                query_id = query.id,
                domain = %question.name,
                qtype = question.qtype,
                qclass = question.qclass,
                "DNS record not found"
            );
            continue;
        };

        let ip = format_address(&data);
        let added = ResourceRecord::new(question.name.clone(), TYPE_A, CLASS_IN, DEFAULT_TTL, data)
            .and_then(|record| response.push_answer(record));
        if let Err(error) = added {
            warn!(
                query_id = query.id,
                domain = %question.name,
                %error,
                "DNS record cannot be encoded, skipping"
            );
            continue;
        }

        info!(
            query_id = query.id,
            domain = %question.name,
            %ip,
            ttl = DEFAULT_TTL,
            "DNS record found"
        );
    }

    if response.answers().is_empty() {
        response.flags |= RCODE_NXDOMAIN;
    }

    response
}

fn format_address(data: &[u8]) -> String {
    match <[u8; 4]>::try_from(data) {
        Ok(octets) => Ipv4Addr::from(octets).to_string(),
        Err(_) => format!("{data:02x?}"),
    }
}

/// Action to take for a received datagram.
#[derive(Debug)]
pub enum QueryAction {
    /// Send this encoded response back to the client.
    Respond {
        response: Vec<u8>,
        domain: String,
        answer_count: usize,
    },
    /// The datagram could not be decoded; send nothing.
    Drop { error: DecodeError },
}

/// Resolver runs the decode, build, encode pipeline for transports.
///
/// Holds the record table shared with whoever manages records at runtime.
pub struct Resolver {
    table: Arc<RecordTable>,
}

impl Resolver {
    /// Create a new resolver answering from `table`.
    pub fn new(table: Arc<RecordTable>) -> Self {
        Self { table }
    }

    /// The record table this resolver answers from.
    pub fn table(&self) -> &Arc<RecordTable> {
        &self.table
    }

    /// Build the response message for an already decoded query.
    pub fn respond(&self, query: &Message) -> Message {
        build_response(query, &self.table)
    }

    /// Process a raw query datagram and decide what to send back.
    pub fn process_query(&self, datagram: &[u8]) -> QueryAction {
        let query = match dns::decode(datagram) {
            Ok(query) => query,
            Err(error) => return QueryAction::Drop { error },
        };

        let response = self.respond(&query);
        let domain = query
            .questions()
            .first()
            .map(|q| q.name.to_string())
            .unwrap_or_default();

        QueryAction::Respond {
            answer_count: response.answers().len(),
            response: response.to_bytes(),
            domain,
        }
    }
}
