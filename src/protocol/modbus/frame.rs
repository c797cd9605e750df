use super::{append_crc, check_crc, FunctionCode, ModbusError, RegisterClass};

/// Per-transaction register ceiling for reads (0x03 / 0x04)
pub const MAX_READ_QUANTITY: u16 = 125;
/// Per-transaction register ceiling for 0x10 writes
pub const MAX_WRITE_QUANTITY: u16 = 123;

pub const EXCEPTION_BIT: u8 = 0x80;
/// `[slave][function | 0x80][exception code][crc_lo][crc_hi]`
pub const EXCEPTION_FRAME_LEN: usize = 5;

const READ_HEADER_LEN: usize = 3;
const WRITE_ACK_LEN: usize = 8;

/// One request/response exchange with the slave.
///
/// The transport only needs to know how to put the request on the wire and
/// how many bytes a successful answer has; everything else is validated by
/// `decode_response` once the bytes are in.
pub trait ModbusTransaction {
    type Output;

    fn slave(&self) -> u8;
    fn function(&self) -> FunctionCode;
    fn encode(&self) -> Vec<u8>;
    fn expected_response_len(&self) -> usize;

    /// Validate a complete response frame. Either all of it is trusted or none of it.
    fn decode_response(&self, frame: &[u8]) -> Result<Self::Output, ModbusError>;
}

/// True when `frame` is a complete exception reply and nothing more will follow.
pub fn is_exception_frame(frame: &[u8]) -> bool {
    frame.len() == EXCEPTION_FRAME_LEN && frame[1] & EXCEPTION_BIT != 0
}

/// Checks shared by every response type, in wire order: total length,
/// echoed slave address, exception bit, function code.
fn check_header(
    frame: &[u8],
    slave: u8,
    function: FunctionCode,
    expected_len: usize,
) -> Result<(), ModbusError> {
    let function = u8::from(function);

    if frame.len() != expected_len {
        if is_exception_frame(frame) {
            return decode_exception(frame, slave, function);
        }
        return Err(ModbusError::LengthMismatch {
            expected: expected_len,
            actual: frame.len(),
        });
    }
    if frame[0] != slave {
        return Err(ModbusError::AddressMismatch {
            expected: slave,
            actual: frame[0],
        });
    }
    if frame[1] & EXCEPTION_BIT != 0 {
        return Err(ModbusError::Exception {
            function: frame[1] & !EXCEPTION_BIT,
            code: frame[2],
        });
    }
    if frame[1] != function {
        return Err(ModbusError::FunctionMismatch {
            expected: function,
            actual: frame[1],
        });
    }
    Ok(())
}

fn decode_exception(frame: &[u8], slave: u8, function: u8) -> Result<(), ModbusError> {
    if frame[0] != slave {
        return Err(ModbusError::AddressMismatch {
            expected: slave,
            actual: frame[0],
        });
    }
    check_crc(frame)?;
    let echoed = frame[1] & !EXCEPTION_BIT;
    if echoed != function {
        return Err(ModbusError::FunctionMismatch {
            expected: function,
            actual: frame[1],
        });
    }
    Err(ModbusError::Exception {
        function: echoed,
        code: frame[2],
    })
}

fn check_span(start: u16, quantity: u16, ceiling: u16) -> Result<(), ModbusError> {
    if quantity == 0 || quantity > ceiling {
        return Err(ModbusError::invalid(format!(
            "quantity {quantity} outside 1..={ceiling}"
        )));
    }
    if u32::from(start) + u32::from(quantity) > 0x1_0000 {
        return Err(ModbusError::invalid(format!(
            "range {start}+{quantity} runs past the last address"
        )));
    }
    Ok(())
}

/// Bulk read of `quantity` input or holding registers starting at `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRequest {
    slave: u8,
    class: RegisterClass,
    start: u16,
    quantity: u16,
}

impl ReadRequest {
    pub fn new(
        slave: u8,
        class: RegisterClass,
        start: u16,
        quantity: u16,
    ) -> Result<Self, ModbusError> {
        check_span(start, quantity, MAX_READ_QUANTITY)?;
        Ok(Self {
            slave,
            class,
            start,
            quantity,
        })
    }

    pub fn class(&self) -> RegisterClass {
        self.class
    }

    pub fn start(&self) -> u16 {
        self.start
    }

    pub fn quantity(&self) -> u16 {
        self.quantity
    }
}

impl ModbusTransaction for ReadRequest {
    type Output = Vec<u16>;

    fn slave(&self) -> u8 {
        self.slave
    }

    fn function(&self) -> FunctionCode {
        self.class.read_function()
    }

    fn encode(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(8);
        frame.push(self.slave);
        frame.push(self.function().into());
        frame.extend_from_slice(&self.start.to_be_bytes());
        frame.extend_from_slice(&self.quantity.to_be_bytes());
        append_crc(&mut frame);
        frame
    }

    fn expected_response_len(&self) -> usize {
        READ_HEADER_LEN + 2 * self.quantity as usize + 2
    }

    fn decode_response(&self, frame: &[u8]) -> Result<Vec<u16>, ModbusError> {
        check_header(
            frame,
            self.slave,
            self.function(),
            self.expected_response_len(),
        )?;

        let byte_count = frame[2] as usize;
        let expected_count = 2 * self.quantity as usize;
        if byte_count != expected_count {
            return Err(ModbusError::ByteCountMismatch {
                expected: expected_count,
                actual: byte_count,
            });
        }
        check_crc(frame)?;

        let data = &frame[READ_HEADER_LEN..READ_HEADER_LEN + byte_count];
        Ok(data
            .chunks_exact(2)
            .map(|word| u16::from_be_bytes([word[0], word[1]]))
            .collect())
    }
}

/// Write one holding register (0x06). The slave echoes the request verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteSingleRequest {
    slave: u8,
    address: u16,
    value: u16,
}

impl WriteSingleRequest {
    pub fn new(slave: u8, address: u16, value: u16) -> Self {
        Self {
            slave,
            address,
            value,
        }
    }
}

impl ModbusTransaction for WriteSingleRequest {
    type Output = ();

    fn slave(&self) -> u8 {
        self.slave
    }

    fn function(&self) -> FunctionCode {
        FunctionCode::WriteSingleHolding
    }

    fn encode(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(WRITE_ACK_LEN);
        frame.push(self.slave);
        frame.push(self.function().into());
        frame.extend_from_slice(&self.address.to_be_bytes());
        frame.extend_from_slice(&self.value.to_be_bytes());
        append_crc(&mut frame);
        frame
    }

    fn expected_response_len(&self) -> usize {
        WRITE_ACK_LEN
    }

    fn decode_response(&self, frame: &[u8]) -> Result<(), ModbusError> {
        check_header(frame, self.slave, self.function(), WRITE_ACK_LEN)?;
        check_crc(frame)?;

        let address = u16::from_be_bytes([frame[2], frame[3]]);
        let value = u16::from_be_bytes([frame[4], frame[5]]);
        if address != self.address {
            return Err(ModbusError::EchoMismatch {
                address: self.address,
                expected: self.address,
                actual: address,
            });
        }
        if value != self.value {
            return Err(ModbusError::EchoMismatch {
                address: self.address,
                expected: self.value,
                actual: value,
            });
        }
        Ok(())
    }
}

/// Write a contiguous block of holding registers (0x10).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteMultipleRequest {
    slave: u8,
    start: u16,
    values: Vec<u16>,
}

impl WriteMultipleRequest {
    pub fn new(slave: u8, start: u16, values: Vec<u16>) -> Result<Self, ModbusError> {
        let quantity = u16::try_from(values.len())
            .map_err(|_| ModbusError::invalid(format!("{} values in one write", values.len())))?;
        check_span(start, quantity, MAX_WRITE_QUANTITY)?;
        Ok(Self {
            slave,
            start,
            values,
        })
    }

    fn quantity(&self) -> u16 {
        // Bounded by MAX_WRITE_QUANTITY in `new`
        self.values.len() as u16
    }
}

impl ModbusTransaction for WriteMultipleRequest {
    type Output = ();

    fn slave(&self) -> u8 {
        self.slave
    }

    fn function(&self) -> FunctionCode {
        FunctionCode::WriteMultipleHolding
    }

    fn encode(&self) -> Vec<u8> {
        let byte_count = 2 * self.values.len();
        let mut frame = Vec::with_capacity(9 + byte_count);
        frame.push(self.slave);
        frame.push(self.function().into());
        frame.extend_from_slice(&self.start.to_be_bytes());
        frame.extend_from_slice(&self.quantity().to_be_bytes());
        frame.push(byte_count as u8);
        for value in &self.values {
            frame.extend_from_slice(&value.to_be_bytes());
        }
        append_crc(&mut frame);
        frame
    }

    fn expected_response_len(&self) -> usize {
        WRITE_ACK_LEN
    }

    fn decode_response(&self, frame: &[u8]) -> Result<(), ModbusError> {
        check_header(frame, self.slave, self.function(), WRITE_ACK_LEN)?;
        check_crc(frame)?;

        let start = u16::from_be_bytes([frame[2], frame[3]]);
        let quantity = u16::from_be_bytes([frame[4], frame[5]]);
        if start != self.start {
            return Err(ModbusError::EchoMismatch {
                address: self.start,
                expected: self.start,
                actual: start,
            });
        }
        if quantity != self.quantity() {
            return Err(ModbusError::EchoMismatch {
                address: self.start,
                expected: self.quantity(),
                actual: quantity,
            });
        }
        Ok(())
    }
}
