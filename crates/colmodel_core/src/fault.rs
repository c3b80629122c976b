//! Process-wide fault reporting for transport failures.
//!
//! # Responsibility
//! - Hold the optional process-wide fault handler.
//! - Build failure observers that log transport failures and forward them.
//!
//! # Invariants
//! - The handler can be installed once per process.
//! - Reporting without a handler only logs.

use crate::db::{FailureObserver, TransportError};
use log::error;
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// Callback receiving transport failures reported anywhere in the process.
pub type FaultHandler = Arc<dyn Fn(&TransportError) + Send + Sync>;

static FAULT_HANDLER: OnceCell<FaultHandler> = OnceCell::new();

/// Installs the process-wide fault handler.
///
/// Returns `false` when a handler is already installed.
pub fn set_fault_handler(handler: FaultHandler) -> bool {
    FAULT_HANDLER.set(handler).is_ok()
}

pub fn has_fault_handler() -> bool {
    FAULT_HANDLER.get().is_some()
}

/// Forwards one failure to the installed handler, if any.
pub fn report_fault(err: &TransportError) {
    if let Some(handler) = FAULT_HANDLER.get() {
        handler(err);
    }
}

/// Builds the observer an adapter installs on its transport.
pub fn failure_observer(keyspace: &str) -> FailureObserver {
    let keyspace = keyspace.to_string();
    Arc::new(move |err: &TransportError| {
        error!(
            "event=transport_failure module=adapter status=error keyspace={} error_kind={} error={}",
            keyspace,
            err.kind.as_str(),
            err.why()
        );
        report_fault(err);
    })
}
