//! Per-query answering logic.
//!
//! A `Responder` is shared by every query task. It only reads the record
//! store and submits telemetry without waiting, so answering never stalls on
//! the live view.

use std::{net::IpAddr, sync::Arc};

use log::debug;

use crate::event::{EventSender, QueryEvent};
use crate::store::RecordStore;
use crate::telemetry;
use crate::wire::{AddressRecord, Message};

/// Answers A queries from a static record store.
#[derive(Debug, Clone)]
pub struct Responder {
    store: Arc<RecordStore>,
    events: EventSender,
    ttl: u32,
}

impl Responder {
    pub fn new(store: Arc<RecordStore>, events: EventSender, ttl: u32) -> Self {
        Self { store, events, ttl }
    }

    pub fn events(&self) -> &EventSender {
        &self.events
    }

    /// Build the reply for a parsed standard query from `source`.
    ///
    /// Every A question with a known name gets one answer record and emits
    /// one event. Unknown names and other record types are left unanswered
    /// and the reply stays NOERROR.
    pub fn respond(&self, query: &Message, source: IpAddr) -> Message {
        let mut reply = Message::reply_to(query);

        for question in query.questions.iter().filter(|q| q.wants_address()) {
            let Some(address) = self.store.lookup(&question.name) else {
                debug!("No record for {} (from {})", question.name, source);
                continue;
            };

            debug!("Answering {} -> {} for {}", question.name, address, source);
            reply.answers.push(AddressRecord {
                name: question.name.clone(),
                ttl: self.ttl,
                address,
            });
            telemetry::answer_sent();
            self.events
                .try_send(QueryEvent::new(question.name.clone(), address, source));
        }

        reply
    }
}
