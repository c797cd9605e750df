use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};

use super::LinkContext;
use crate::protocol::{
    modbus::{ErrorKind, ModbusError, ReadRequest, RegisterClass},
    registers::{descriptors_in_range, RegisterId},
};

/// A contiguous wire range read in one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollGroupSpec {
    pub class: RegisterClass,
    pub start: u16,
    pub quantity: u16,
}

impl PollGroupSpec {
    pub const fn new(class: RegisterClass, start: u16, quantity: u16) -> Self {
        Self {
            class,
            start,
            quantity,
        }
    }

    pub fn contains(&self, class: RegisterClass, address: u16) -> bool {
        class == self.class
            && address >= self.start
            && u32::from(address) < u32::from(self.start) + u32::from(self.quantity)
    }
}

const fn input(start: u16, quantity: u16) -> PollGroupSpec {
    PollGroupSpec::new(RegisterClass::Input, start, quantity)
}

const fn holding(start: u16, quantity: u16) -> PollGroupSpec {
    PollGroupSpec::new(RegisterClass::Holding, start, quantity)
}

/// Wire ranges polled by default, in cyclic order.
pub const DEFAULT_POLL_GROUPS: &[PollGroupSpec] = &[
    input(100, 16),  // discrete inputs
    input(200, 23),  // temperatures, humidity
    input(400, 10),  // alarm list
    input(1000, 4),  // control state
    input(1100, 5),  // airflow
    input(1200, 7),  // air temperatures
    holding(100, 28),
    holding(200, 6),
    holding(300, 6), // clock
    holding(600, 6), // user function 1
    holding(610, 6), // user function 2
    holding(1000, 7),
    holding(1100, 5),
    holding(1200, 8),
    holding(1700, 2), // tank setpoints
    holding(1910, 4), // air quality
];

/// A poll range plus the catalog registers inside it, ascending by address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollGroup {
    spec: PollGroupSpec,
    members: Vec<RegisterId>,
}

impl PollGroup {
    pub fn build(spec: PollGroupSpec) -> Result<Self, ModbusError> {
        // Same limits as the read request it will become
        ReadRequest::new(0, spec.class, spec.start, spec.quantity)?;
        let members = descriptors_in_range(spec.class, spec.start, spec.quantity)
            .map(|desc| desc.id)
            .collect();
        Ok(Self { spec, members })
    }

    pub fn spec(&self) -> PollGroupSpec {
        self.spec
    }

    pub fn members(&self) -> &[RegisterId] {
        &self.members
    }

    fn request(&self, slave: u8) -> Result<ReadRequest, ModbusError> {
        ReadRequest::new(slave, self.spec.class, self.spec.start, self.spec.quantity)
    }
}

/// Resolve every spec against the catalog. Runs once, at startup.
pub fn build_poll_groups(specs: &[PollGroupSpec]) -> Result<Vec<PollGroup>, ModbusError> {
    if specs.is_empty() {
        return Err(ModbusError::invalid("at least one poll group is required"));
    }
    let groups = specs
        .iter()
        .map(|spec| PollGroup::build(*spec))
        .collect::<Result<Vec<_>, _>>()?;

    for group in &groups {
        let spec = group.spec;
        if group.members.is_empty() {
            log::info!(
                "Poll group {} {}+{} has no catalog members, polled for the wire only",
                spec.class,
                spec.start,
                spec.quantity
            );
        } else {
            log::debug!(
                "Poll group {} {}+{}: {} members",
                spec.class,
                spec.start,
                spec.quantity,
                group.members.len()
            );
        }
    }
    Ok(groups)
}

/// Result of one scheduled transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    pub group: usize,
    pub spec: PollGroupSpec,
    pub timestamp_ms: u64,
    /// Number of cache entries written, or why the read failed
    pub result: Result<usize, ErrorKind>,
}

/// Control messages for a running poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollControl {
    Stop,
}

/// Observer of scheduled poll outcomes.
pub trait PollHandler: Send + Sync {
    fn handle_outcome(&self, outcome: &PollOutcome) -> Result<()>;

    /// Return false to stop the loop after the current transaction.
    fn should_continue(&self) -> bool {
        true
    }
}

/// Default handler; the poller already logs failures, this adds per-group detail.
pub struct LoggingHandler;

impl PollHandler for LoggingHandler {
    fn handle_outcome(&self, outcome: &PollOutcome) -> Result<()> {
        if let Ok(written) = outcome.result {
            log::trace!(
                "Group #{} ({} {}+{}) refreshed {} registers",
                outcome.group,
                outcome.spec.class,
                outcome.spec.start,
                outcome.spec.quantity,
                written
            );
        }
        Ok(())
    }
}

/// Forwards every outcome through a flume channel.
pub struct FlumePollHandler {
    sender: flume::Sender<PollOutcome>,
}

impl FlumePollHandler {
    pub fn new() -> (Self, flume::Receiver<PollOutcome>) {
        let (sender, receiver) = flume::unbounded();
        (Self { sender }, receiver)
    }
}

impl PollHandler for FlumePollHandler {
    fn handle_outcome(&self, outcome: &PollOutcome) -> Result<()> {
        self.sender
            .send(outcome.clone())
            .map_err(|_| anyhow::anyhow!("Poll outcome receiver dropped"))
    }
}

/// Round-robin scheduler over a fixed set of poll groups.
///
/// Owns the cursor; the cache and health tracker it feeds live in the shared
/// [`LinkContext`]. A failing group is recorded and the cursor moves on, the
/// loop itself never fails.
pub struct Poller {
    ctx: Arc<LinkContext>,
    groups: Arc<[PollGroup]>,
    cursor: usize,
    interval: Duration,
    handler: Box<dyn PollHandler>,
}

impl Poller {
    /// `groups` must be non-empty, as produced by [`build_poll_groups`].
    pub fn new(ctx: Arc<LinkContext>, groups: Arc<[PollGroup]>, interval: Duration) -> Self {
        Self {
            ctx,
            groups,
            cursor: 0,
            interval,
            handler: Box::new(LoggingHandler),
        }
    }

    pub fn with_handler(mut self, handler: Box<dyn PollHandler>) -> Self {
        self.handler = handler;
        self
    }

    /// Poll the group under the cursor and advance it.
    pub fn poll_next(&mut self) -> PollOutcome {
        let index = self.cursor;
        self.cursor = (self.cursor + 1) % self.groups.len();
        let group = &self.groups[index];
        let spec = group.spec;

        let read = group
            .request(self.ctx.slave)
            .and_then(|request| self.ctx.transport.execute(&request));
        let timestamp_ms = self.ctx.now_ms();

        let result = match read {
            Ok(values) => {
                let written =
                    self.ctx
                        .cache
                        .update_members(spec.start, &group.members, &values, timestamp_ms);
                self.ctx.health.record_success(timestamp_ms);
                log::debug!(
                    "Polled {} {}+{}: {} registers updated",
                    spec.class,
                    spec.start,
                    spec.quantity,
                    written
                );
                Ok(written)
            }
            Err(err) => {
                let kind = err.kind();
                self.ctx.health.record_failure(kind);
                log::warn!(
                    "Poll of {} {}+{} failed: {}",
                    spec.class,
                    spec.start,
                    spec.quantity,
                    err
                );
                Err(kind)
            }
        };

        PollOutcome {
            group: index,
            spec,
            timestamp_ms,
            result,
        }
    }

    /// Poll forever, one group per interval, until a stop request arrives or
    /// the control channel is dropped.
    pub fn run(mut self, control: flume::Receiver<PollControl>) {
        log::info!(
            "Poll loop started: slave={}, {} groups, interval={:?}",
            self.ctx.slave,
            self.groups.len(),
            self.interval
        );

        loop {
            let outcome = self.poll_next();
            if let Err(err) = self.handler.handle_outcome(&outcome) {
                log::warn!("Poll handler error: {err}");
            }
            if !self.handler.should_continue() {
                log::info!("Poll handler requested stop");
                break;
            }

            match control.recv_timeout(self.interval) {
                Ok(PollControl::Stop) => {
                    log::info!("Poll loop received stop request");
                    break;
                }
                Err(flume::RecvTimeoutError::Disconnected) => {
                    log::info!("Poll control channel closed");
                    break;
                }
                Err(flume::RecvTimeoutError::Timeout) => {}
            }
        }

        log::info!("Poll loop exited");
    }
}
