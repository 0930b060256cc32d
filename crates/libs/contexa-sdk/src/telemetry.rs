use crate::lifecycle::SdkMethod;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use time::OffsetDateTime;

/// One SDK operation outcome. Never carries arguments or credentials.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiagnosticRecord {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub operation: String,
    /// `"ok"` or the `SdkError::code()` of the failure.
    pub outcome: String,
}

/// Bounded ring of diagnostic records; the oldest record is evicted first.
#[derive(Debug)]
pub(crate) struct TelemetryBuffer {
    records: Mutex<VecDeque<DiagnosticRecord>>,
    capacity: Mutex<usize>,
    disabled: AtomicBool,
}

impl TelemetryBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
            capacity: Mutex::new(capacity.max(1)),
            disabled: AtomicBool::new(false),
        }
    }

    pub fn set_capacity(&self, capacity: usize) {
        let capacity = capacity.max(1);
        *self.capacity.lock().expect("telemetry mutex poisoned") = capacity;
        let mut records = self.records.lock().expect("telemetry mutex poisoned");
        while records.len() > capacity {
            records.pop_front();
        }
    }

    /// Disabling also discards whatever was buffered.
    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.store(disabled, Ordering::SeqCst);
        if disabled {
            self.records.lock().expect("telemetry mutex poisoned").clear();
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::SeqCst)
    }

    pub fn record(&self, method: SdkMethod, outcome: &str) {
        self.record_operation(method.as_str(), outcome);
    }

    pub fn record_operation(&self, operation: &str, outcome: &str) {
        if self.is_disabled() {
            return;
        }
        let capacity = *self.capacity.lock().expect("telemetry mutex poisoned");
        let mut records = self.records.lock().expect("telemetry mutex poisoned");
        if records.len() == capacity {
            records.pop_front();
        }
        records.push_back(DiagnosticRecord {
            timestamp: OffsetDateTime::now_utc(),
            operation: operation.to_owned(),
            outcome: outcome.to_owned(),
        });
    }

    pub fn snapshot(&self) -> Vec<DiagnosticRecord> {
        self.records.lock().expect("telemetry mutex poisoned").iter().cloned().collect()
    }

    pub fn take(&self) -> Vec<DiagnosticRecord> {
        self.records.lock().expect("telemetry mutex poisoned").drain(..).collect()
    }

    /// Puts records back after a failed upload, newest kept on overflow.
    pub fn restore(&self, mut batch: Vec<DiagnosticRecord>) {
        if self.is_disabled() || batch.is_empty() {
            return;
        }
        let capacity = *self.capacity.lock().expect("telemetry mutex poisoned");
        let mut records = self.records.lock().expect("telemetry mutex poisoned");
        batch.extend(records.drain(..));
        let overflow = batch.len().saturating_sub(capacity);
        records.extend(batch.into_iter().skip(overflow));
    }
}
