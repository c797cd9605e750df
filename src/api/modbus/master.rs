use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use std::sync::Arc;

use super::LinkConfig;
use crate::{
    api::utils::open_serial_port,
    core::{
        build_poll_groups, task_manager, Clock, HealthSnapshot, LinkContext, LoggingHandler,
        ModbusWire, MonotonicClock, PollControl, PollGroup, PollHandler, Poller, RegisterState,
        SerialWire, Transport,
    },
    protocol::{
        modbus::{
            ErrorKind, ModbusError, RegisterClass, WriteMultipleRequest, WriteSingleRequest,
        },
        registers::{RegisterId, RegisterValue},
    },
};

struct PollTask {
    control: flume::Sender<PollControl>,
    handle: tokio::task::JoinHandle<()>,
    /// Disconnects once the loop body has returned
    exited: flume::Receiver<()>,
}

impl PollTask {
    fn is_running(&self) -> bool {
        !self.exited.is_disconnected()
    }
}

#[derive(Default)]
struct PollState {
    active: Option<PollTask>,
    /// Exit signal of a loop that was asked to stop but may still be mid-transaction
    stopping: Option<flume::Receiver<()>>,
}

/// Modbus RTU master for one CTS 602 controller.
///
/// Owns the link context (transport, register cache, health counters) and the
/// background poll task. Scheduled polling and the on-demand calls below share
/// one transport, so they never overlap on the wire. On-demand reads return
/// values directly and leave the cache alone.
///
/// # Example
///
/// ```rust,no_run
/// use cts602::api::modbus::{LinkConfig, ModbusMaster, RegisterId};
///
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let master = ModbusMaster::open(LinkConfig::default())?;
/// master.start_polling()?;
///
/// let tank = master.read_decoded(RegisterId::T11TankTop);
/// let raw = master.read_input_block(211, 2)?;
/// # Ok(())
/// # }
/// ```
pub struct ModbusMaster {
    config: LinkConfig,
    ctx: Arc<LinkContext>,
    groups: Arc<[PollGroup]>,
    poll: Mutex<PollState>,
}

impl ModbusMaster {
    /// Open the configured serial port and prepare the link. Polling does not
    /// start until [`start_polling`](Self::start_polling).
    pub fn open(config: LinkConfig) -> Result<Self> {
        config.validate()?;
        let port = open_serial_port(
            &config.port_name,
            config.baud_rate,
            config.response_timeout(),
        )?;
        log::info!(
            "Opened {} at {} baud (8E1), slave {}",
            config.port_name,
            config.baud_rate,
            config.slave_address
        );
        Self::with_wire(
            config,
            Box::new(SerialWire::new(port)),
            Arc::new(MonotonicClock::new()),
        )
    }

    /// Build a master over any wire, e.g. a simulated slave.
    pub fn with_wire(
        config: LinkConfig,
        wire: Box<dyn ModbusWire>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let groups: Arc<[PollGroup]> = build_poll_groups(config.poll_specs())
            .map_err(|err| anyhow!("Invalid poll groups: {err}"))?
            .into();

        let transport = Transport::new(wire, config.lock_timeout(), config.response_timeout());
        let ctx = Arc::new(LinkContext::new(
            config.slave_address,
            transport,
            config.offline_timeout_ms,
            clock,
        ));

        Ok(Self {
            config,
            ctx,
            groups,
            poll: Mutex::new(PollState::default()),
        })
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn poll_groups(&self) -> &[PollGroup] {
        &self.groups
    }

    /// Launch the background poll loop. Calling it again while the loop runs
    /// is a no-op. Fails while a previously stopped loop is still finishing
    /// its last transaction; await the handle from
    /// [`stop_polling`](Self::stop_polling) before restarting. Needs a tokio
    /// runtime.
    pub fn start_polling(&self) -> Result<()> {
        self.start_polling_with(Box::new(LoggingHandler))
    }

    pub fn start_polling_with(&self, handler: Box<dyn PollHandler>) -> Result<()> {
        let mut poll = self.poll.lock();
        if poll.active.as_ref().is_some_and(PollTask::is_running) {
            log::debug!("Poll loop already running");
            return Ok(());
        }
        if poll
            .stopping
            .as_ref()
            .is_some_and(|exited| !exited.is_disconnected())
        {
            return Err(anyhow!("Previous poll loop has not exited yet"));
        }
        poll.stopping = None;

        let (control, control_rx) = flume::unbounded();
        let (exited_tx, exited) = flume::bounded::<()>(1);
        let poller = Poller::new(
            Arc::clone(&self.ctx),
            Arc::clone(&self.groups),
            self.config.poll_interval(),
        )
        .with_handler(handler);
        let handle = task_manager::spawn_blocking_task("cts602-poll", move || {
            let _exited = exited_tx;
            poller.run(control_rx)
        })?;

        log::info!(
            "Polling slave {} every {} ms over {} groups",
            self.config.slave_address,
            self.config.poll_interval_ms,
            self.groups.len()
        );
        poll.active = Some(PollTask {
            control,
            handle,
            exited,
        });
        Ok(())
    }

    pub fn is_polling(&self) -> bool {
        self.poll.lock().active.as_ref().is_some_and(PollTask::is_running)
    }

    /// Ask the poll loop to stop after its current transaction. Returns the
    /// task handle so async callers can wait for it, `None` if nothing ran.
    pub fn stop_polling(&self) -> Option<tokio::task::JoinHandle<()>> {
        let mut poll = self.poll.lock();
        let task = poll.active.take()?;
        // A closed channel also stops the loop, so a failed send is fine
        let _ = task.control.send(PollControl::Stop);
        poll.stopping = Some(task.exited);
        Some(task.handle)
    }

    pub fn read_input_block(&self, start: u16, quantity: u16) -> Result<Vec<u16>, ModbusError> {
        self.ctx.read_block(RegisterClass::Input, start, quantity)
    }

    pub fn read_holding_block(&self, start: u16, quantity: u16) -> Result<Vec<u16>, ModbusError> {
        self.ctx.read_block(RegisterClass::Holding, start, quantity)
    }

    /// Function 0x06. The cache picks the new value up on the next poll.
    pub fn write_single_holding(&self, address: u16, value: u16) -> Result<(), ModbusError> {
        let request = WriteSingleRequest::new(self.ctx.slave, address, value);
        self.ctx.execute(&request)?;
        log::info!("Wrote holding {address} = {value}");
        Ok(())
    }

    /// Function 0x10, up to 123 consecutive registers.
    pub fn write_multiple_holding(&self, start: u16, values: &[u16]) -> Result<(), ModbusError> {
        let request = WriteMultipleRequest::new(self.ctx.slave, start, values.to_vec())?;
        self.ctx.execute(&request)?;
        log::info!("Wrote {} holding registers from {start}", values.len());
        Ok(())
    }

    pub fn read_cached(&self, id: RegisterId) -> RegisterState {
        self.ctx.cache.get(id)
    }

    /// Cached value with its meaning attached, `None` until first polled.
    pub fn read_decoded(&self, id: RegisterId) -> Option<RegisterValue> {
        self.ctx.cache.decoded(id)
    }

    pub fn cache_snapshot(&self) -> Vec<(RegisterId, RegisterState)> {
        self.ctx.cache.snapshot()
    }

    pub fn is_online(&self) -> bool {
        self.ctx.health.is_online(self.ctx.now_ms())
    }

    pub fn seconds_since_last_ok(&self) -> f64 {
        self.ctx.health.seconds_since_last_ok(self.ctx.now_ms())
    }

    pub fn ok_count(&self) -> u64 {
        self.ctx.health.ok_count()
    }

    pub fn fail_count(&self) -> u64 {
        self.ctx.health.fail_count()
    }

    pub fn last_error(&self) -> ErrorKind {
        self.ctx.health.last_error()
    }

    pub fn health(&self) -> HealthSnapshot {
        self.ctx.health.snapshot(self.ctx.now_ms())
    }
}

impl Drop for ModbusMaster {
    fn drop(&mut self) {
        if let Some(task) = self.poll.get_mut().active.take() {
            let _ = task.control.send(PollControl::Stop);
        }
    }
}
