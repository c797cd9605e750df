use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use serde::Serialize;

use crate::protocol::modbus::ErrorKind;

/// Success/failure accounting for the scheduled poll path.
///
/// Only the poll task writes; any thread may read. Each field is its own
/// atomic, so a snapshot may mix values from two adjacent transactions.
#[derive(Debug)]
pub struct LinkHealth {
    ok_count: AtomicU64,
    fail_count: AtomicU64,
    last_ok_ms: AtomicU64,
    last_error: AtomicU8,
    offline_timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HealthSnapshot {
    pub online: bool,
    pub ok_count: u64,
    pub fail_count: u64,
    pub last_ok_ms: u64,
    pub seconds_since_last_ok: f64,
    #[serde(serialize_with = "serialize_kind")]
    pub last_error: ErrorKind,
}

fn serialize_kind<S: serde::Serializer>(kind: &ErrorKind, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(kind)
}

impl LinkHealth {
    pub fn new(offline_timeout_ms: u64) -> Self {
        Self {
            ok_count: AtomicU64::new(0),
            fail_count: AtomicU64::new(0),
            last_ok_ms: AtomicU64::new(0),
            last_error: AtomicU8::new(ErrorKind::None.into()),
            offline_timeout_ms,
        }
    }

    pub fn record_success(&self, now_ms: u64) {
        self.ok_count.fetch_add(1, Ordering::Relaxed);
        self.last_ok_ms.store(now_ms, Ordering::Release);
        self.last_error.store(ErrorKind::None.into(), Ordering::Release);
    }

    pub fn record_failure(&self, kind: ErrorKind) {
        self.fail_count.fetch_add(1, Ordering::Relaxed);
        self.last_error.store(kind.into(), Ordering::Release);
    }

    pub fn ok_count(&self) -> u64 {
        self.ok_count.load(Ordering::Relaxed)
    }

    pub fn fail_count(&self) -> u64 {
        self.fail_count.load(Ordering::Relaxed)
    }

    pub fn last_ok_ms(&self) -> u64 {
        self.last_ok_ms.load(Ordering::Acquire)
    }

    pub fn last_error(&self) -> ErrorKind {
        ErrorKind::try_from(self.last_error.load(Ordering::Acquire)).unwrap_or_default()
    }

    pub fn offline_timeout_ms(&self) -> u64 {
        self.offline_timeout_ms
    }

    /// False until the first success; afterwards, true while the last success
    /// is no older than the offline timeout.
    pub fn is_online(&self, now_ms: u64) -> bool {
        let last = self.last_ok_ms();
        last != 0 && now_ms.saturating_sub(last) <= self.offline_timeout_ms
    }

    /// Elapsed seconds since the last success, `-1.0` if there never was one.
    pub fn seconds_since_last_ok(&self, now_ms: u64) -> f64 {
        match self.last_ok_ms() {
            0 => -1.0,
            last => now_ms.saturating_sub(last) as f64 / 1000.0,
        }
    }

    pub fn snapshot(&self, now_ms: u64) -> HealthSnapshot {
        HealthSnapshot {
            online: self.is_online(now_ms),
            ok_count: self.ok_count(),
            fail_count: self.fail_count(),
            last_ok_ms: self.last_ok_ms(),
            seconds_since_last_ok: self.seconds_since_last_ok(now_ms),
            last_error: self.last_error(),
        }
    }
}
