use super::ModbusError;

const CRC_SEED: u16 = 0xFFFF;
const CRC_POLY: u16 = 0xA001;

/// CRC-16/Modbus, bit-serial, LSB first.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = CRC_SEED;
    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ CRC_POLY;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Append the CRC of `frame` in wire order (low byte first).
pub fn append_crc(frame: &mut Vec<u8>) {
    let crc = crc16(frame);
    frame.extend_from_slice(&crc.to_le_bytes());
}

/// Validate the trailing two bytes of `frame` against the CRC of everything before them.
pub fn check_crc(frame: &[u8]) -> Result<(), ModbusError> {
    if frame.len() < 3 {
        return Err(ModbusError::LengthMismatch {
            expected: 3,
            actual: frame.len(),
        });
    }
    let (body, tail) = frame.split_at(frame.len() - 2);
    let expected = crc16(body);
    let actual = u16::from_le_bytes([tail[0], tail[1]]);
    if expected != actual {
        return Err(ModbusError::CrcMismatch { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_value() {
        // Standard CRC-16/MODBUS check value
        assert_eq!(crc16(b"123456789"), 0x4B37);
        assert_eq!(crc16(&[]), 0xFFFF);
    }

    #[test]
    fn test_known_request_frame() {
        let mut frame = vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x0A];
        append_crc(&mut frame);
        assert_eq!(frame[6..], [0xC5, 0xCD]);
        assert!(check_crc(&frame).is_ok());
    }

    #[test]
    fn test_single_bit_flips_are_detected() {
        let mut frame = vec![0x1E, 0x04, 0x04, 0x12, 0xF2, 0x0D, 0xC0];
        append_crc(&mut frame);

        for byte in 0..frame.len() {
            for bit in 0..8 {
                let mut corrupted = frame.clone();
                corrupted[byte] ^= 1 << bit;
                assert!(
                    check_crc(&corrupted).is_err(),
                    "flip of bit {bit} in byte {byte} went unnoticed"
                );
            }
        }
    }

    #[test]
    fn test_too_short_frame() {
        assert!(matches!(
            check_crc(&[0x01, 0x02]),
            Err(ModbusError::LengthMismatch { actual: 2, .. })
        ));
    }
}
