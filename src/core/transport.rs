use std::{
    io::{self, Read, Write},
    time::{Duration, Instant},
};

use parking_lot::Mutex;

use crate::protocol::modbus::{is_exception_frame, ModbusError, ModbusTransaction};

/// Largest RTU frame on the wire.
const MAX_FRAME_LEN: usize = 256;

/// Byte pipe to the slave.
pub trait ModbusWire: Send {
    fn send(&mut self, frame: &[u8]) -> io::Result<()>;

    /// Read what is available into `buf`, waiting at most `timeout`.
    /// `Ok(0)` means nothing arrived in time.
    fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;

    /// Drop stale bytes left over from an earlier, abandoned exchange.
    fn discard_input(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// [`ModbusWire`] over a physical serial port.
pub struct SerialWire {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialWire {
    pub fn new(port: Box<dyn serialport::SerialPort>) -> Self {
        Self { port }
    }
}

impl ModbusWire for SerialWire {
    fn send(&mut self, frame: &[u8]) -> io::Result<()> {
        self.port.write_all(frame)?;
        self.port.flush()
    }

    fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        self.port.set_timeout(timeout)?;
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(err) if err.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(err) => Err(err),
        }
    }

    fn discard_input(&mut self) -> io::Result<()> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(io::Error::from)
    }
}

/// Owns the wire and lets exactly one transaction use it at a time.
///
/// The lock is taken before the request is written and held until the
/// response is complete or the response timeout expires. Waiting for the lock
/// is itself bounded by `lock_timeout`.
pub struct Transport {
    wire: Mutex<Box<dyn ModbusWire>>,
    lock_timeout: Duration,
    response_timeout: Duration,
}

impl Transport {
    pub fn new(wire: Box<dyn ModbusWire>, lock_timeout: Duration, response_timeout: Duration) -> Self {
        Self {
            wire: Mutex::new(wire),
            lock_timeout,
            response_timeout,
        }
    }

    pub fn execute<T: ModbusTransaction>(&self, txn: &T) -> Result<T::Output, ModbusError> {
        let request = txn.encode();
        let expected = txn.expected_response_len();

        let frame = {
            let mut wire = self
                .wire
                .try_lock_for(self.lock_timeout)
                .ok_or(ModbusError::InternalContention)?;
            self.exchange(&mut **wire, &request, expected)?
        };

        txn.decode_response(&frame)
    }

    fn exchange(
        &self,
        wire: &mut dyn ModbusWire,
        request: &[u8],
        expected: usize,
    ) -> Result<Vec<u8>, ModbusError> {
        wire.discard_input()?;
        log::trace!("tx {}", hex(request));
        wire.send(request)?;

        let deadline = Instant::now() + self.response_timeout;
        let mut frame = Vec::with_capacity(expected);
        let mut chunk = [0u8; MAX_FRAME_LEN];

        while frame.len() < expected && !is_exception_frame(&frame) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let room = MAX_FRAME_LEN - frame.len();
            let n = wire.receive(&mut chunk[..room], remaining)?;
            frame.extend_from_slice(&chunk[..n]);
        }
        log::trace!("rx {}", hex(&frame));

        if frame.len() < expected && !is_exception_frame(&frame) {
            return Err(ModbusError::Timeout {
                expected,
                received: frame.len(),
            });
        }
        Ok(frame)
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::modbus::{append_crc, ErrorKind, ReadRequest, RegisterClass};
    use std::{collections::VecDeque, sync::Arc, thread};

    /// Replays queued chunks, one per `receive` call.
    struct ScriptedWire {
        chunks: VecDeque<Vec<u8>>,
        delay: Duration,
    }

    impl ScriptedWire {
        fn boxed(chunks: Vec<Vec<u8>>, delay: Duration) -> Box<dyn ModbusWire> {
            Box::new(Self {
                chunks: chunks.into(),
                delay,
            })
        }
    }

    impl ModbusWire for ScriptedWire {
        fn send(&mut self, _frame: &[u8]) -> io::Result<()> {
            Ok(())
        }

        fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
            match self.chunks.pop_front() {
                Some(chunk) => {
                    thread::sleep(self.delay);
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
                None => {
                    thread::sleep(timeout);
                    Ok(0)
                }
            }
        }
    }

    fn tank_response() -> Vec<u8> {
        let mut frame = vec![30, 0x04, 0x04, 0x12, 0xF2, 0x0D, 0xC0];
        append_crc(&mut frame);
        frame
    }

    fn transport(chunks: Vec<Vec<u8>>) -> Transport {
        Transport::new(
            ScriptedWire::boxed(chunks, Duration::ZERO),
            Duration::from_millis(100),
            Duration::from_millis(50),
        )
    }

    #[test]
    fn test_response_split_across_reads() {
        let frame = tank_response();
        let transport = transport(vec![frame[..3].to_vec(), frame[3..].to_vec()]);
        let request = ReadRequest::new(30, RegisterClass::Input, 211, 2).unwrap();
        assert_eq!(transport.execute(&request).unwrap(), vec![4850, 3520]);
    }

    #[test]
    fn test_silence_is_a_timeout() {
        let transport = transport(vec![]);
        let request = ReadRequest::new(30, RegisterClass::Input, 211, 2).unwrap();
        assert!(matches!(
            transport.execute(&request),
            Err(ModbusError::Timeout {
                expected: 9,
                received: 0
            })
        ));
    }

    #[test]
    fn test_truncated_frame_is_a_timeout() {
        let frame = tank_response();
        let transport = transport(vec![frame[..6].to_vec()]);
        let request = ReadRequest::new(30, RegisterClass::Input, 211, 2).unwrap();
        let err = transport.execute(&request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[test]
    fn test_exception_frame_ends_read_early() {
        let mut frame = vec![30, 0x84, 0x02];
        append_crc(&mut frame);
        let transport = transport(vec![frame]);
        let request = ReadRequest::new(30, RegisterClass::Input, 211, 2).unwrap();
        assert_eq!(
            transport.execute(&request).unwrap_err().kind(),
            ErrorKind::Exception
        );
    }

    #[test]
    fn test_trailing_garbage_is_a_length_error() {
        let mut frame = tank_response();
        frame.push(0xAA);
        let transport = transport(vec![frame]);
        let request = ReadRequest::new(30, RegisterClass::Input, 211, 2).unwrap();
        assert_eq!(
            transport.execute(&request).unwrap_err().kind(),
            ErrorKind::LengthMismatch
        );
    }

    #[test]
    fn test_lock_wait_is_bounded() {
        let slow = Arc::new(Transport::new(
            ScriptedWire::boxed(vec![tank_response()], Duration::from_millis(300)),
            Duration::from_millis(20),
            Duration::from_millis(500),
        ));
        let request = ReadRequest::new(30, RegisterClass::Input, 211, 2).unwrap();

        let holder = {
            let slow = slow.clone();
            thread::spawn(move || slow.execute(&request))
        };
        thread::sleep(Duration::from_millis(50));
        assert!(matches!(
            slow.execute(&request),
            Err(ModbusError::InternalContention)
        ));
        assert!(holder.join().unwrap().is_ok());
    }
}
