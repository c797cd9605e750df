use serde::Serialize;
use strum::EnumCount;

use super::decode::{DecodeRule, EnumTable, RegisterValue};
use crate::protocol::modbus::RegisterClass;

/// Static description of one logical register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegisterDescriptor {
    pub id: RegisterId,
    pub address: u16,
    pub class: RegisterClass,
    pub rule: DecodeRule,
    pub name: &'static str,
}

impl RegisterDescriptor {
    pub fn decode(&self, raw: u16) -> RegisterValue {
        self.rule.decode(raw)
    }
}

const U16: DecodeRule = DecodeRule::Unsigned;
const I16: DecodeRule = DecodeRule::Signed;
const TEMP: DecodeRule = DecodeRule::CentiCelsius;
const ALARM: DecodeRule = DecodeRule::AlarmBitmask;

const fn named(table: EnumTable) -> DecodeRule {
    DecodeRule::Enumerated(table)
}

/// Declares `RegisterId` and `CATALOG` side by side so that
/// `CATALOG[id as usize].id == id` holds for every entry.
macro_rules! register_catalog {
    ($( $id:ident => $class:ident $address:literal, $rule:expr, $name:literal; )*) => {
        /// Logical register identifier, stable across wire layouts.
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            Serialize,
            strum::EnumCount,
            strum::EnumIter,
            strum::IntoStaticStr,
        )]
        #[repr(u16)]
        pub enum RegisterId {
            $($id,)*
        }

        pub static CATALOG: [RegisterDescriptor; RegisterId::COUNT] = [
            $(RegisterDescriptor {
                id: RegisterId::$id,
                address: $address,
                class: RegisterClass::$class,
                rule: $rule,
                name: $name,
            },)*
        ];
    };
}

register_catalog! {
    // Input registers: device / protocol
    ProtocolVersion => Input 0, U16, "Protocol version";
    SoftwareMajor => Input 1, U16, "SW version - major";
    SoftwareMinor => Input 2, U16, "SW version - minor";
    SoftwareRelease => Input 3, U16, "SW version - release";

    // Discrete inputs
    InputUserFunction => Input 100, U16, "User function";
    InputAirFilterAlarm => Input 101, U16, "Air filter alarm";
    InputSmokeAlarm => Input 103, U16, "Smoke alarm";
    InputFrostOverheat => Input 105, U16, "Heating surface frost/overheat";
    InputAirflowMonitor => Input 106, U16, "Airflow monitor";
    InputHighPressure => Input 107, U16, "High pressure switch";
    InputBoiling => Input 109, U16, "Hot water boiling";
    InputDefrostThermostat => Input 112, U16, "Defrost thermostat";
    InputUserFunction2 => Input 113, U16, "User function 2";

    // Temperatures and humidity
    T0Controller => Input 200, TEMP, "Controller board";
    T2Inlet => Input 202, TEMP, "Inlet preheater";
    T5Condenser => Input 205, TEMP, "Condenser";
    T6Evaporator => Input 206, TEMP, "Evaporator";
    T7InletPostheater => Input 207, TEMP, "Inlet postheater";
    T8Outdoor => Input 208, TEMP, "Outdoor";
    T10ExternalRoom => Input 210, TEMP, "External room";
    T11TankTop => Input 211, TEMP, "Tank top";
    T12TankBottom => Input 212, TEMP, "Tank bottom";
    T15RoomPanel => Input 215, TEMP, "Room (panel)";
    T16Aux => Input 216, TEMP, "AUX / anode";
    Humidity => Input 221, U16, "Humidity";

    // Alarm list; dates and times are DOS-packed
    AlarmStatus => Input 400, ALARM, "Alarm status";
    Alarm1Id => Input 401, U16, "Alarm 1 ID";
    Alarm1Date => Input 402, U16, "Alarm 1 date";
    Alarm1Time => Input 403, U16, "Alarm 1 time";
    Alarm2Id => Input 404, U16, "Alarm 2 ID";
    Alarm2Date => Input 405, U16, "Alarm 2 date";
    Alarm2Time => Input 406, U16, "Alarm 2 time";
    Alarm3Id => Input 407, U16, "Alarm 3 ID";
    Alarm3Date => Input 408, U16, "Alarm 3 date";
    Alarm3Time => Input 409, U16, "Alarm 3 time";

    // Control status
    ControlRunning => Input 1000, U16, "Power state";
    ControlMode => Input 1001, named(EnumTable::ControlMode), "Operation mode";
    ControlState => Input 1002, named(EnumTable::ControlState), "Control state";
    SecondsInState => Input 1003, U16, "Seconds in state";

    // Airflow status
    VentilationSetpoint => Input 1100, U16, "Ventilation fan setpoint";
    InletFanStep => Input 1101, U16, "Inlet fan setpoint";
    ExhaustFanStep => Input 1102, U16, "Exhaust fan setpoint";
    DaysSinceFilterChange => Input 1103, U16, "Days since filter change";
    DaysToFilterChange => Input 1104, U16, "Days to filter change";

    // Air temperature status
    SummerState => Input 1200, U16, "Summer state";
    InletSetpoint => Input 1201, TEMP, "Inlet temperature setpoint";
    ControlledTemperature => Input 1202, TEMP, "Controlled temperature";
    PanelTemperature => Input 1203, TEMP, "User panel temperature";
    CapacitySetpoint => Input 1205, U16, "Capacity setpoint";
    CapacityActual => Input 1206, U16, "Capacity (actual)";

    ExternalHeatSetpoint => Input 1800, TEMP, "External heat source setpoint";

    // Holding registers
    BusAddress => Holding 50, U16, "Bus address";

    // Relay outputs
    OutputAirFlap => Holding 100, U16, "Air flap";
    OutputCompressor => Holding 109, U16, "Compressor";
    OutputFourWayValve => Holding 111, U16, "4-way valve";
    OutputWaterHeating => Holding 116, U16, "Water heating";
    OutputExternalHeating => Holding 122, U16, "External radiator heating";
    OutputUserFunction => Holding 123, U16, "User function active";
    OutputUserFunction2 => Holding 124, U16, "User function 2 active";
    OutputDefrosting => Holding 125, U16, "Defrost active";
    OutputAlarmRelay => Holding 126, U16, "Alarm relay";
    OutputPreheater => Holding 127, U16, "Preheater";

    // Analog outputs, percent x100
    ExhaustFanSpeed => Holding 200, U16, "Exhaust fan speed";
    InletFanSpeed => Holding 201, U16, "Inlet fan speed";
    CompressorCapacity => Holding 204, U16, "Compressor capacity";
    PreheatCapacity => Holding 205, U16, "Preheat capacity";

    // Clock
    TimeSecond => Holding 300, U16, "Time second";
    TimeMinute => Holding 301, U16, "Time minute";
    TimeHour => Holding 302, U16, "Time hour";
    DateDay => Holding 303, U16, "Date day";
    DateMonth => Holding 304, U16, "Date month";
    DateYear => Holding 305, U16, "Date year";

    AlarmReset => Holding 400, U16, "Alarm reset";
    ProgramSelect => Holding 500, named(EnumTable::WeekProgram), "Program select";

    // User function 1
    UserFunction1Active => Holding 600, U16, "User function 1 active";
    UserFunction1Select => Holding 601, named(EnumTable::UserFunction), "User function 1 select";
    UserFunction1Time => Holding 602, U16, "User function 1 time";
    UserFunction1Vent => Holding 603, U16, "User function 1 vent step";
    UserFunction1Temp => Holding 604, I16, "User function 1 temp";
    UserFunction1Offset => Holding 605, I16, "User function 1 offset";

    // User function 2
    UserFunction2Active => Holding 610, U16, "User function 2 active";
    UserFunction2Select => Holding 611, named(EnumTable::UserFunction), "User function 2 select";
    UserFunction2Time => Holding 612, U16, "User function 2 time";
    UserFunction2Vent => Holding 613, U16, "User function 2 vent step";
    UserFunction2Temp => Holding 614, I16, "User function 2 temp";
    UserFunction2Offset => Holding 615, I16, "User function 2 offset";

    // Control setpoints
    PowerSet => Holding 1001, U16, "Power";
    ModeSet => Holding 1002, named(EnumTable::ControlMode), "Operation mode setpoint";
    VentilationStepSet => Holding 1003, U16, "Ventilation step";
    TemperatureSet => Holding 1004, TEMP, "Temperature setpoint";
    ServiceMode => Holding 1005, named(EnumTable::Unnamed), "Service mode";
    ServiceCapacity => Holding 1006, U16, "Service mode capacity";

    // Airflow settings
    AirExchangeMode => Holding 1100, named(EnumTable::AirExchangeMode), "Air exchange mode";
    CoolingVentStep => Holding 1101, U16, "Cooling vent step";

    // Air temperature settings
    CoolingSetpoint => Holding 1200, named(EnumTable::Unnamed), "Cooling temp setpoint";
    MinSummerInlet => Holding 1201, TEMP, "Min. summer inlet temp";
    MinWinterInlet => Holding 1202, TEMP, "Min. winter inlet temp";
    MaxSummerInlet => Holding 1203, TEMP, "Max. summer inlet temp";
    MaxWinterInlet => Holding 1204, TEMP, "Max. winter inlet temp";
    SummerWinterLimit => Holding 1205, TEMP, "Summer/winter limit";
    NightCoolingDayLimit => Holding 1206, TEMP, "Night-cooling day limit";
    NightCoolingSetpoint => Holding 1207, TEMP, "Night-cooling setpoint";

    // Hot water
    TankTopSetpoint => Holding 1700, TEMP, "Tank top setpoint (elec.)";
    TankBottomSetpoint => Holding 1701, TEMP, "Tank bottom setpoint (compr.)";

    ExternalHeatOffset => Holding 1800, TEMP, "Ext. heat offset temp setpoint";

    // Air quality
    HumidityLowStep => Holding 1910, U16, "Humidity low winter step";
    HumidityHighStep => Holding 1911, U16, "Humidity high step";
    HumidityLowLimit => Holding 1912, U16, "Humidity limit for low vent";
    HumidityHighTimeout => Holding 1913, U16, "Humidity high vent max time";

    // 0 = closed, 1 = open, 2 = open without off
    UserMenuOpen => Holding 2002, named(EnumTable::Unnamed), "User menu open";
}

impl RegisterId {
    pub fn descriptor(self) -> &'static RegisterDescriptor {
        &CATALOG[self as usize]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        self.into()
    }

    /// Linear lookup by wire location.
    pub fn find(class: RegisterClass, address: u16) -> Option<RegisterId> {
        CATALOG
            .iter()
            .find(|desc| desc.class == class && desc.address == address)
            .map(|desc| desc.id)
    }
}

/// Descriptors of `class` with an address in `[start, start + quantity)`,
/// in ascending address order.
pub fn descriptors_in_range(
    class: RegisterClass,
    start: u16,
    quantity: u16,
) -> impl Iterator<Item = &'static RegisterDescriptor> {
    let end = u32::from(start) + u32::from(quantity);
    let mut members: Vec<_> = CATALOG
        .iter()
        .filter(move |desc| {
            desc.class == class && desc.address >= start && u32::from(desc.address) < end
        })
        .collect();
    members.sort_by_key(|desc| desc.address);
    members.into_iter()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use strum::IntoEnumIterator;

    #[test]
    fn test_ids_index_the_table() {
        for (index, desc) in CATALOG.iter().enumerate() {
            assert_eq!(desc.id.index(), index, "{:?} out of place", desc.id);
        }
        assert_eq!(RegisterId::iter().count(), CATALOG.len());
    }

    #[test]
    fn test_addresses_unique_within_class() {
        let mut seen = HashSet::new();
        for desc in CATALOG.iter() {
            assert!(
                seen.insert((desc.class, desc.address)),
                "duplicate {} register {}",
                desc.class,
                desc.address
            );
        }
    }

    #[test]
    fn test_same_address_in_both_classes() {
        let input = RegisterId::find(RegisterClass::Input, 1800);
        let holding = RegisterId::find(RegisterClass::Holding, 1800);
        assert_eq!(input, Some(RegisterId::ExternalHeatSetpoint));
        assert_eq!(holding, Some(RegisterId::ExternalHeatOffset));
    }

    #[test]
    fn test_class_sizes() {
        let inputs = CATALOG
            .iter()
            .filter(|d| d.class == RegisterClass::Input)
            .count();
        assert_eq!(inputs, 51);
        assert_eq!(CATALOG.len() - inputs, 59);
    }

    #[test]
    fn test_tank_temperatures() {
        let top = RegisterId::T11TankTop.descriptor();
        assert_eq!(top.address, 211);
        assert_eq!(top.class, RegisterClass::Input);
        assert_eq!(top.decode(4850).to_string(), "48.50 °C");
        assert_eq!(RegisterId::T12TankBottom.label(), "T12TankBottom");
    }

    #[test]
    fn test_range_members_sorted() {
        let members: Vec<_> = descriptors_in_range(RegisterClass::Input, 200, 23)
            .map(|d| d.address)
            .collect();
        assert_eq!(
            members,
            vec![200, 202, 205, 206, 207, 208, 210, 211, 212, 215, 216, 221]
        );
        assert_eq!(descriptors_in_range(RegisterClass::Input, 300, 50).count(), 0);
        assert_eq!(descriptors_in_range(RegisterClass::Holding, 0xFFFF, 1).count(), 0);
    }
}
