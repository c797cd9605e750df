use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Failure of a single Modbus transaction.
///
/// None of these are fatal: the poll loop records them and moves on, on-demand
/// callers get them back as-is.
#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum ModbusError {
    /// No (or not enough) bytes arrived before the response deadline
    #[display("timeout: received {received} of {expected} bytes")]
    Timeout { expected: usize, received: usize },

    #[display("CRC mismatch: computed 0x{expected:04X}, frame carries 0x{actual:04X}")]
    CrcMismatch { expected: u16, actual: u16 },

    /// Total frame length differs from what the request implies
    #[display("length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// The byte-count field of a read response differs from `2 * quantity`
    #[display("byte count mismatch: expected {expected}, got {actual}")]
    ByteCountMismatch { expected: usize, actual: usize },

    #[display("slave address mismatch: expected {expected}, got {actual}")]
    AddressMismatch { expected: u8, actual: u8 },

    #[display("function code mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    FunctionMismatch { expected: u8, actual: u8 },

    /// The slave answered with an exception frame (function code high bit set)
    #[display("slave exception 0x{code:02X} for function 0x{function:02X}")]
    Exception { function: u8, code: u8 },

    /// A write acknowledgement did not echo the request
    #[display("write echo mismatch at address {address}: expected {expected}, got {actual}")]
    EchoMismatch {
        address: u16,
        expected: u16,
        actual: u16,
    },

    /// The transport stayed busy past the lock wait bound
    #[display("transport busy: could not acquire the serial line")]
    InternalContention,

    #[display("invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[display("serial i/o error: {source}")]
    Io { source: std::io::Error },
}

impl ModbusError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModbusError::Timeout { .. } => ErrorKind::Timeout,
            ModbusError::CrcMismatch { .. } => ErrorKind::CrcMismatch,
            ModbusError::LengthMismatch { .. } | ModbusError::ByteCountMismatch { .. } => {
                ErrorKind::LengthMismatch
            }
            ModbusError::AddressMismatch { .. } => ErrorKind::AddressMismatch,
            ModbusError::FunctionMismatch { .. } => ErrorKind::FunctionMismatch,
            ModbusError::Exception { .. } => ErrorKind::Exception,
            ModbusError::EchoMismatch { .. } => ErrorKind::EchoMismatch,
            ModbusError::InternalContention => ErrorKind::InternalContention,
            ModbusError::InvalidRequest { .. } => ErrorKind::InvalidRequest,
            ModbusError::Io { .. } => ErrorKind::Io,
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        ModbusError::InvalidRequest {
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for ModbusError {
    fn from(source: std::io::Error) -> Self {
        ModbusError::Io { source }
    }
}

/// Flat, copyable view of [`ModbusError`], stored as the link's last error.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    IntoPrimitive,
    TryFromPrimitive,
    strum::Display,
    strum::EnumIter,
)]
#[repr(u8)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    #[default]
    None = 0,
    Timeout,
    CrcMismatch,
    LengthMismatch,
    AddressMismatch,
    FunctionMismatch,
    Exception,
    EchoMismatch,
    InternalContention,
    InvalidRequest,
    Io,
}
