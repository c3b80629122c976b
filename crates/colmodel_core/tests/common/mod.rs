#![allow(dead_code)]

use async_trait::async_trait;
use colmodel_core::db::{FailureObserver, Row, Statement, Transport, TransportResult};
use colmodel_core::{AdapterOptions, Schema, TypeRegistry};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub const KEYSPACE: &str = "colmodel_unit_tests";

pub const TIME_ID: &str = "d2177dd0-eaa2-11de-a572-001b779c76e3";
pub const OTHER_TIME_ID: &str = "e902893a-9d22-11e0-8f22-0800200c9a66";

/// Transport double that records every statement and replays queued results.
#[derive(Default)]
pub struct RecordingTransport {
    statements: Mutex<Vec<Statement>>,
    responses: Mutex<VecDeque<TransportResult<Vec<Row>>>>,
    observer: Mutex<Option<FailureObserver>>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queues the result of the next unanswered call; later calls get no rows.
    pub fn push_response(&self, response: TransportResult<Vec<Row>>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn calls(&self) -> usize {
        self.statements.lock().unwrap().len()
    }

    pub fn statements(&self) -> Vec<Statement> {
        self.statements.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn execute(&self, statement: &Statement) -> TransportResult<Vec<Row>> {
        self.statements.lock().unwrap().push(statement.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    fn set_failure_observer(&self, observer: FailureObserver) {
        *self.observer.lock().unwrap() = Some(observer);
    }

    fn has_failure_observer(&self) -> bool {
        self.observer.lock().unwrap().is_some()
    }
}

pub fn options() -> AdapterOptions {
    AdapterOptions::default().with_keyspace(KEYSPACE)
}

/// Model type exercising every built-in logical type family.
pub fn fixture_schema() -> Arc<Schema> {
    Schema::builder(Arc::new(TypeRegistry::with_builtins()), "model", "models")
        .property("id", "uuid")
        .property("name", "string")
        .property("time_id", "timeuuid")
        .property("id_list", "list:uuid")
        .property("time_id_list", "list:timeuuid")
        .property("id_set", "set:uuid")
        .property("time_id_set", "set:timeuuid")
        .property("id_map", "map:uuid")
        .property("time_id_map", "map:timeuuid")
        .property("emails_list", "list:string")
        .property("created", "date")
        .property("foozles", "array")
        .property("snozzers", "hash")
        .property("owner", "reference")
        .property("anything", "untyped")
        .property("is_valid", "boolean")
        .property("count", "number")
        .property("floating", "number")
        .property("primes", "set:number")
        .property("pet_types", "set:string")
        .property("expiries", "set:date")
        .property("timestamps", "list:date")
        .property("scores", "list:number")
        .property("checks", "list:boolean")
        .property("vaccinated", "map:boolean")
        .property("birthdays", "map:date")
        .property("pet_names", "map:string")
        .property("pet_counts", "map:number")
        .attachment("avatar", "image/png")
        .attachment("notes", "text/plain")
        .build()
        .expect("fixture schema should build")
}
