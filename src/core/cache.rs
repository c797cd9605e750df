use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::protocol::{
    modbus::RegisterClass,
    registers::{descriptors_in_range, RegisterId, RegisterValue, CATALOG},
};

const VALID_BIT: u64 = 1 << 63;
const TIMESTAMP_SHIFT: u32 = 16;
const TIMESTAMP_MASK: u64 = (1 << 47) - 1;

/// Last known value of one register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RegisterState {
    pub raw: u16,
    /// Monotonic milliseconds of the last write, `0` if never written
    pub timestamp_ms: u64,
    pub valid: bool,
}

impl RegisterState {
    fn pack(self) -> u64 {
        let valid = if self.valid { VALID_BIT } else { 0 };
        valid | ((self.timestamp_ms & TIMESTAMP_MASK) << TIMESTAMP_SHIFT) | u64::from(self.raw)
    }

    fn unpack(word: u64) -> Self {
        Self {
            raw: word as u16,
            timestamp_ms: (word >> TIMESTAMP_SHIFT) & TIMESTAMP_MASK,
            valid: word & VALID_BIT != 0,
        }
    }
}

/// One entry per catalog register, indexed by [`RegisterId`].
///
/// Each entry is a single packed atomic word, so readers never block and never
/// see a value from one update paired with the timestamp of another.
pub struct RegisterCache {
    entries: Vec<AtomicU64>,
}

impl Default for RegisterCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterCache {
    pub fn new() -> Self {
        Self {
            entries: CATALOG.iter().map(|_| AtomicU64::new(0)).collect(),
        }
    }

    pub fn get(&self, id: RegisterId) -> RegisterState {
        RegisterState::unpack(self.entries[id.index()].load(Ordering::Acquire))
    }

    /// Cached value decoded per the register's rule, `None` until first written.
    pub fn decoded(&self, id: RegisterId) -> Option<RegisterValue> {
        let state = self.get(id);
        state
            .valid
            .then(|| id.descriptor().decode(state.raw))
    }

    /// Write `values` (read from `[start, start + values.len())`) into every
    /// catalog register of `class` in that range. Membership is derived from
    /// the catalog on each call. Returns the number of entries written.
    pub fn update_range(
        &self,
        class: RegisterClass,
        start: u16,
        values: &[u16],
        timestamp_ms: u64,
    ) -> usize {
        let quantity = u16::try_from(values.len()).unwrap_or(u16::MAX);
        let mut written = 0;
        for desc in descriptors_in_range(class, start, quantity) {
            let offset = usize::from(desc.address - start);
            self.store(desc.id, values[offset], timestamp_ms);
            written += 1;
        }
        written
    }

    /// Same as [`update_range`](Self::update_range) but over a precomputed
    /// member list. Members outside the read window are skipped.
    pub fn update_members(
        &self,
        start: u16,
        members: &[RegisterId],
        values: &[u16],
        timestamp_ms: u64,
    ) -> usize {
        let mut written = 0;
        for &id in members {
            let address = id.descriptor().address;
            let Some(offset) = address.checked_sub(start).map(usize::from) else {
                continue;
            };
            if let Some(&raw) = values.get(offset) {
                self.store(id, raw, timestamp_ms);
                written += 1;
            }
        }
        written
    }

    fn store(&self, id: RegisterId, raw: u16, timestamp_ms: u64) {
        let state = RegisterState {
            raw,
            timestamp_ms,
            valid: true,
        };
        self.entries[id.index()].store(state.pack(), Ordering::Release);
    }

    /// Snapshot of every entry in catalog order.
    pub fn snapshot(&self) -> Vec<(RegisterId, RegisterState)> {
        CATALOG.iter().map(|desc| (desc.id, self.get(desc.id))).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_cache_is_invalid() {
        let cache = RegisterCache::new();
        assert_eq!(cache.get(RegisterId::T11TankTop), RegisterState::default());
        assert_eq!(cache.decoded(RegisterId::T11TankTop), None);
    }

    #[test]
    fn test_tank_update() {
        let cache = RegisterCache::new();
        let written = cache.update_range(RegisterClass::Input, 211, &[4850, 3520], 1234);
        assert_eq!(written, 2);
        assert_eq!(
            cache.get(RegisterId::T11TankTop),
            RegisterState {
                raw: 4850,
                timestamp_ms: 1234,
                valid: true
            }
        );
        assert_eq!(cache.get(RegisterId::T12TankBottom).raw, 3520);
        assert_eq!(
            cache.decoded(RegisterId::T12TankBottom).map(|v| v.to_string()),
            Some("35.20 °C".to_string())
        );
        // neighbours untouched
        assert!(!cache.get(RegisterId::T10ExternalRoom).valid);
        assert!(!cache.get(RegisterId::T15RoomPanel).valid);
    }

    #[test]
    fn test_update_is_idempotent() {
        let once = RegisterCache::new();
        once.update_range(RegisterClass::Input, 200, &[7; 23], 50);
        let twice = RegisterCache::new();
        twice.update_range(RegisterClass::Input, 200, &[7; 23], 50);
        twice.update_range(RegisterClass::Input, 200, &[7; 23], 50);
        assert_eq!(once.snapshot(), twice.snapshot());
    }

    #[test]
    fn test_class_is_respected() {
        let cache = RegisterCache::new();
        // Holding 1800 and Input 1800 are different registers
        cache.update_range(RegisterClass::Holding, 1800, &[2000], 9);
        assert!(cache.get(RegisterId::ExternalHeatOffset).valid);
        assert!(!cache.get(RegisterId::ExternalHeatSetpoint).valid);
    }

    #[test]
    fn test_update_members_matches_range() {
        let by_range = RegisterCache::new();
        let by_members = RegisterCache::new();
        let values: Vec<u16> = (0..10).collect();
        by_range.update_range(RegisterClass::Input, 400, &values, 77);
        let members: Vec<_> = descriptors_in_range(RegisterClass::Input, 400, 10)
            .map(|d| d.id)
            .collect();
        by_members.update_members(400, &members, &values, 77);
        assert_eq!(by_range.snapshot(), by_members.snapshot());
        assert_eq!(by_range.get(RegisterId::Alarm3Time).raw, 9);
    }

    #[test]
    fn test_pack_round_trip_extremes() {
        let state = RegisterState {
            raw: u16::MAX,
            timestamp_ms: TIMESTAMP_MASK,
            valid: true,
        };
        assert_eq!(RegisterState::unpack(state.pack()), state);
    }
}
