use num_enum::TryFromPrimitive;
use serde::Serialize;
use std::fmt;

/// How a raw 16-bit register is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeRule {
    Unsigned,
    Signed,
    /// Signed fixed-point, hundredths of a degree Celsius
    CentiCelsius,
    /// Index into a name table
    Enumerated(EnumTable),
    /// Alarm status word: bit 7 = alarm active, bits 0..1 = number of alarms
    AlarmBitmask,
}

/// Name tables for enumerated registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumTable {
    ControlMode,
    ControlState,
    WeekProgram,
    UserFunction,
    AirExchangeMode,
    /// Enumerated on the device, but no names are known here
    Unnamed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, strum::Display)]
#[repr(u16)]
pub enum ControlMode {
    Off = 0,
    Heat,
    Cool,
    Auto,
    Service,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, strum::Display)]
#[repr(u16)]
pub enum ControlState {
    Off = 0,
    Shift,
    Stop,
    Start,
    Standby,
    #[strum(serialize = "Ventilation stop")]
    VentilationStop,
    Ventilation,
    Heating,
    Cooling,
    #[strum(serialize = "Hot water")]
    HotWater,
    Legionella,
    #[strum(serialize = "Cooling + hot water")]
    CoolingHotWater,
    #[strum(serialize = "Central heating")]
    CentralHeating,
    Defrost,
    #[strum(serialize = "Frost secure")]
    FrostSecure,
    Service,
    Alarm,
    #[strum(serialize = "Heating + hot water")]
    HeatingHotWater,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, strum::Display)]
#[repr(u16)]
pub enum WeekProgram {
    None = 0,
    #[strum(serialize = "Program 1")]
    Program1,
    #[strum(serialize = "Program 2")]
    Program2,
    #[strum(serialize = "Program 3")]
    Program3,
    Erase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, strum::Display)]
#[repr(u16)]
pub enum UserFunction {
    None = 0,
    Extend,
    Inlet,
    Exhaust,
    #[strum(serialize = "External heater offset")]
    ExternalHeaterOffset,
    Ventilate,
    #[strum(serialize = "Cooker hood")]
    CookerHood,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, strum::Display)]
#[repr(u16)]
pub enum AirExchangeMode {
    Energy = 0,
    Comfort,
    #[strum(serialize = "Comfort water")]
    ComfortWater,
}

/// Temperature in hundredths of a degree Celsius, e.g. `4850` is 48.50 °C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Temperature(pub i16);

impl Temperature {
    pub fn from_raw(raw: u16) -> Self {
        Self(raw as i16)
    }

    pub fn centi_celsius(self) -> i16 {
        self.0
    }

    pub fn celsius(self) -> f32 {
        f32::from(self.0) / 100.0
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02} °C", abs / 100, abs % 100)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmStatus {
    pub active: bool,
    pub count: u8,
}

impl AlarmStatus {
    const ACTIVE_FLAG: u16 = 0x80;
    const COUNT_MASK: u16 = 0x03;

    pub fn from_raw(raw: u16) -> Self {
        Self {
            active: raw & Self::ACTIVE_FLAG != 0,
            count: (raw & Self::COUNT_MASK) as u8,
        }
    }
}

impl fmt::Display for AlarmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.active {
            write!(f, "{} active alarm(s)", self.count)
        } else {
            write!(f, "no active alarms")
        }
    }
}

/// A register value with its meaning attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterValue {
    Unsigned(u16),
    Signed(i16),
    Temperature(Temperature),
    ControlMode(ControlMode),
    ControlState(ControlState),
    WeekProgram(WeekProgram),
    UserFunction(UserFunction),
    AirExchangeMode(AirExchangeMode),
    Alarm(AlarmStatus),
    /// Enumerated register without a name for this index
    Enumerated(u16),
}

impl fmt::Display for RegisterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterValue::Unsigned(v) => write!(f, "{v}"),
            RegisterValue::Signed(v) => write!(f, "{v}"),
            RegisterValue::Temperature(t) => write!(f, "{t}"),
            RegisterValue::ControlMode(m) => write!(f, "{m}"),
            RegisterValue::ControlState(s) => write!(f, "{s}"),
            RegisterValue::WeekProgram(p) => write!(f, "{p}"),
            RegisterValue::UserFunction(u) => write!(f, "{u}"),
            RegisterValue::AirExchangeMode(m) => write!(f, "{m}"),
            RegisterValue::Alarm(a) => write!(f, "{a}"),
            RegisterValue::Enumerated(v) => write!(f, "#{v}"),
        }
    }
}

impl DecodeRule {
    pub fn decode(self, raw: u16) -> RegisterValue {
        match self {
            DecodeRule::Unsigned => RegisterValue::Unsigned(raw),
            DecodeRule::Signed => RegisterValue::Signed(raw as i16),
            DecodeRule::CentiCelsius => RegisterValue::Temperature(Temperature::from_raw(raw)),
            DecodeRule::AlarmBitmask => RegisterValue::Alarm(AlarmStatus::from_raw(raw)),
            DecodeRule::Enumerated(table) => table.decode(raw),
        }
    }
}

impl EnumTable {
    pub fn decode(self, raw: u16) -> RegisterValue {
        let named = match self {
            EnumTable::ControlMode => ControlMode::try_from(raw)
                .ok()
                .map(RegisterValue::ControlMode),
            EnumTable::ControlState => ControlState::try_from(raw)
                .ok()
                .map(RegisterValue::ControlState),
            EnumTable::WeekProgram => WeekProgram::try_from(raw)
                .ok()
                .map(RegisterValue::WeekProgram),
            EnumTable::UserFunction => UserFunction::try_from(raw)
                .ok()
                .map(RegisterValue::UserFunction),
            EnumTable::AirExchangeMode => AirExchangeMode::try_from(raw)
                .ok()
                .map(RegisterValue::AirExchangeMode),
            EnumTable::Unnamed => None,
        };
        named.unwrap_or(RegisterValue::Enumerated(raw))
    }
}
