mod crc;
mod error;
mod frame;

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};

pub use crc::{append_crc, check_crc, crc16};
pub use error::{ErrorKind, ModbusError};
pub use frame::{
    is_exception_frame, ModbusTransaction, ReadRequest, WriteMultipleRequest, WriteSingleRequest,
    EXCEPTION_BIT, EXCEPTION_FRAME_LEN, MAX_READ_QUANTITY, MAX_WRITE_QUANTITY,
};

/// Function codes this master speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum FunctionCode {
    ReadHolding = 0x03,
    ReadInput = 0x04,
    WriteSingleHolding = 0x06,
    WriteMultipleHolding = 0x10,
}

/// Register class. Wire addresses are only unique within a class.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RegisterClass {
    /// Read-only registers (function 0x04)
    Input,
    /// Read/write registers (function 0x03 for reads)
    Holding,
}

impl RegisterClass {
    pub const fn read_function(self) -> FunctionCode {
        match self {
            RegisterClass::Input => FunctionCode::ReadInput,
            RegisterClass::Holding => FunctionCode::ReadHolding,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_function_per_class() {
        assert_eq!(u8::from(RegisterClass::Input.read_function()), 0x04);
        assert_eq!(u8::from(RegisterClass::Holding.read_function()), 0x03);
        assert_eq!(
            FunctionCode::try_from(0x10u8).ok(),
            Some(FunctionCode::WriteMultipleHolding)
        );
        assert!(FunctionCode::try_from(0x01u8).is_err());
    }
}
