//! Per-task page mutations and their reversal

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::executor::scripts;
use crate::session::{evaluate_as, RenderSession};

/// One recorded page mutation
///
/// `element` is an index into the page-side element registry of the
/// transaction that recorded it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum UndoRecord {
    /// Inline style property with its previous value and priority
    Style {
        element: usize,
        property: String,
        previous: String,
        priority: String,
    },
    Attribute {
        element: usize,
        name: String,
        previous: Option<String>,
    },
    /// Node inserted by the transaction (clone, style sheet)
    RemoveNode { element: usize },
    /// Wrapper span around a hidden text run
    Unwrap { element: usize },
    Scroll { x: f64, y: f64 },
}

#[derive(Debug, Default, Deserialize)]
struct RevertReport {
    #[serde(default)]
    reverted: usize,
    #[serde(default)]
    failures: Vec<String>,
}

/// Undo log of one capture task
///
/// Records are kept in application order and reverted newest first.
#[derive(Debug)]
pub struct Transaction {
    id: String,
    records: Vec<UndoRecord>,
    /// Setup ran but its record list never reached us
    unreported: bool,
}

impl Transaction {
    pub fn new(ordinal: usize) -> Self {
        Self {
            id: format!("lc-txn-{}", ordinal),
            records: Vec::new(),
            unreported: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn records(&self) -> &[UndoRecord] {
        &self.records
    }

    pub fn record(&mut self, records: Vec<UndoRecord>) {
        self.records.extend(records);
    }

    /// Setup failed before returning its records; revert from the page log
    pub fn mark_unreported(&mut self) {
        self.unreported = true;
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && !self.unreported
    }

    /// Revert every recorded mutation
    ///
    /// Failures are logged and swallowed. Returns the number of records the
    /// page reported as reverted.
    pub fn revert<S: RenderSession + ?Sized>(self, session: &mut S) -> usize {
        let script = if self.unreported && self.records.is_empty() {
            scripts::revert(&self.id, None)
        } else {
            let reversed: Vec<UndoRecord> = self.records.iter().rev().cloned().collect();
            scripts::revert(&self.id, Some(&reversed))
        };

        match evaluate_as::<RevertReport, S>(session, &script, false) {
            Ok(report) => {
                for failure in &report.failures {
                    warn!("Cleanup of {} incomplete: {}", self.id, failure);
                }
                debug!("{}: reverted {} mutations", self.id, report.reverted);
                report.reverted
            }
            Err(e) => {
                warn!("Cleanup of {} failed: {}", self.id, e);
                0
            }
        }
    }
}
