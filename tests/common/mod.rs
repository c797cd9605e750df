#![allow(dead_code)]

use parking_lot::Mutex;
use std::{
    collections::{HashMap, VecDeque},
    io,
    sync::Arc,
    thread::{self, ThreadId},
    time::Duration,
};

use cts602::{
    core::{Clock, LinkContext, ManualClock, ModbusWire, Transport},
    protocol::modbus::{append_crc, check_crc},
};

pub const SLAVE: u8 = 30;

/// Misbehaviour applied to the next response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Silent,
    BadCrc,
    WrongSlave,
    /// Byte-count field off by two, frame length and CRC still valid
    ShortByteCount,
    Exception(u8),
    Truncated,
}

#[derive(Default)]
struct SlaveState {
    inputs: HashMap<u16, u16>,
    holdings: HashMap<u16, u16>,
    faults: VecDeque<Fault>,
    pending: VecDeque<u8>,
    owner: Option<ThreadId>,
    requests: Vec<(u8, u16, u16)>,
    overlaps: usize,
}

/// In-memory CTS 602 stand-in. Unset registers read as zero.
#[derive(Clone)]
pub struct MockSlave {
    address: u8,
    latency: Duration,
    state: Arc<Mutex<SlaveState>>,
}

impl MockSlave {
    pub fn new() -> Self {
        Self {
            address: SLAVE,
            latency: Duration::ZERO,
            state: Arc::new(Mutex::new(SlaveState::default())),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn set_input(&self, address: u16, value: u16) {
        self.state.lock().inputs.insert(address, value);
    }

    pub fn set_holding(&self, address: u16, value: u16) {
        self.state.lock().holdings.insert(address, value);
    }

    pub fn holding(&self, address: u16) -> Option<u16> {
        self.state.lock().holdings.get(&address).copied()
    }

    pub fn push_fault(&self, fault: Fault) {
        self.state.lock().faults.push_back(fault);
    }

    /// `(function, start, quantity)` of every request addressed to this slave.
    pub fn requests(&self) -> Vec<(u8, u16, u16)> {
        self.state.lock().requests.clone()
    }

    /// Requests that started while another exchange was still open.
    pub fn overlaps(&self) -> usize {
        self.state.lock().overlaps
    }

    pub fn wire(&self) -> Box<dyn ModbusWire> {
        Box::new(self.clone())
    }

    fn respond(&self, state: &mut SlaveState, request: &[u8]) -> Option<Vec<u8>> {
        if request.len() < 8 || request[0] != self.address || check_crc(request).is_err() {
            return None;
        }
        let function = request[1];
        let first = u16::from_be_bytes([request[2], request[3]]);
        let second = u16::from_be_bytes([request[4], request[5]]);
        state.requests.push((function, first, second));

        let mut frame = vec![self.address, function];
        match function {
            0x03 | 0x04 => {
                let bank = if function == 0x04 {
                    &state.inputs
                } else {
                    &state.holdings
                };
                frame.push((second * 2) as u8);
                for offset in 0..second {
                    let value = bank.get(&(first + offset)).copied().unwrap_or(0);
                    frame.extend_from_slice(&value.to_be_bytes());
                }
            }
            0x06 => {
                state.holdings.insert(first, second);
                frame.extend_from_slice(&request[2..6]);
            }
            0x10 => {
                for offset in 0..second {
                    let at = 7 + 2 * offset as usize;
                    let value = u16::from_be_bytes([request[at], request[at + 1]]);
                    state.holdings.insert(first + offset, value);
                }
                frame.extend_from_slice(&request[2..6]);
            }
            _ => {
                frame[1] |= 0x80;
                frame.push(0x01);
            }
        }

        match state.faults.pop_front() {
            None => append_crc(&mut frame),
            Some(Fault::Silent) => return None,
            Some(Fault::BadCrc) => {
                append_crc(&mut frame);
                let last = frame.len() - 1;
                frame[last] ^= 0xFF;
            }
            Some(Fault::WrongSlave) => {
                frame[0] = self.address.wrapping_add(1);
                append_crc(&mut frame);
            }
            Some(Fault::ShortByteCount) => {
                frame[2] = frame[2].wrapping_add(2);
                append_crc(&mut frame);
            }
            Some(Fault::Exception(code)) => {
                frame.truncate(2);
                frame[1] |= 0x80;
                frame.push(code);
                append_crc(&mut frame);
            }
            Some(Fault::Truncated) => {
                append_crc(&mut frame);
                frame.truncate(frame.len() - 3);
            }
        }
        Some(frame)
    }
}

impl ModbusWire for MockSlave {
    fn send(&mut self, frame: &[u8]) -> io::Result<()> {
        let mut state = self.state.lock();
        if !state.pending.is_empty() {
            state.overlaps += 1;
        }
        state.owner = Some(thread::current().id());
        if let Some(response) = self.respond(&mut state, frame) {
            state.pending.extend(response);
        }
        Ok(())
    }

    fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        {
            let mut state = self.state.lock();
            if state.owner != Some(thread::current().id()) {
                state.overlaps += 1;
            }
            if state.pending.is_empty() {
                drop(state);
                thread::sleep(timeout);
                return Ok(0);
            }
        }

        thread::sleep(self.latency);
        let mut state = self.state.lock();
        let n = state.pending.len().min(buf.len());
        for (slot, byte) in buf.iter_mut().zip(state.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

pub fn test_context(slave: &MockSlave, clock: Arc<ManualClock>) -> Arc<LinkContext> {
    let transport = Transport::new(
        slave.wire(),
        Duration::from_millis(500),
        Duration::from_millis(30),
    );
    let clock: Arc<dyn Clock> = clock;
    Arc::new(LinkContext::new(SLAVE, transport, 10_000, clock))
}
