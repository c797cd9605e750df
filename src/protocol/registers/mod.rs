mod catalog;
mod decode;

pub use catalog::{descriptors_in_range, RegisterDescriptor, RegisterId, CATALOG};
pub use decode::{
    AirExchangeMode, AlarmStatus, ControlMode, ControlState, DecodeRule, EnumTable,
    RegisterValue, Temperature, UserFunction, WeekProgram,
};
