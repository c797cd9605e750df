/// Link runtime: everything between the frame codec and the public API.
///
/// - `transport`: one-at-a-time access to the serial wire
/// - `cache`: last known value of every catalog register
/// - `poller`: round-robin bulk reads feeding the cache
/// - `health`: online/offline verdict from poll recency
pub mod cache;
pub mod clock;
pub mod health;
pub mod poller;
pub mod task_manager;
pub mod transport;

use std::sync::Arc;

pub use cache::{RegisterCache, RegisterState};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use health::{HealthSnapshot, LinkHealth};
pub use poller::{
    build_poll_groups, FlumePollHandler, LoggingHandler, PollControl, PollGroup, PollGroupSpec,
    PollHandler, PollOutcome, Poller, DEFAULT_POLL_GROUPS,
};
pub use transport::{ModbusWire, SerialWire, Transport};

use crate::protocol::modbus::{ModbusError, ModbusTransaction, ReadRequest, RegisterClass};

/// State shared by the poll task and on-demand callers of one slave link.
pub struct LinkContext {
    pub slave: u8,
    pub transport: Transport,
    pub cache: RegisterCache,
    pub health: LinkHealth,
    pub clock: Arc<dyn Clock>,
}

impl LinkContext {
    pub fn new(
        slave: u8,
        transport: Transport,
        offline_timeout_ms: u64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            slave,
            transport,
            cache: RegisterCache::new(),
            health: LinkHealth::new(offline_timeout_ms),
            clock,
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// One bulk read through the transport. Never touches the cache.
    pub fn read_block(
        &self,
        class: RegisterClass,
        start: u16,
        quantity: u16,
    ) -> Result<Vec<u16>, ModbusError> {
        let request = ReadRequest::new(self.slave, class, start, quantity)?;
        self.execute(&request)
    }

    pub fn execute<T: ModbusTransaction>(&self, txn: &T) -> Result<T::Output, ModbusError> {
        self.transport.execute(txn)
    }
}
