/// RuuviTag RAWv2 (data format 5) payload decoding
use thiserror::Error;

use crate::models::Measurement;
use crate::utils::{div_round, round_to, to_hex};

// RuuviTag protocol constants
pub const DATA_FORMAT: u8 = 5; // RAWv2
pub const PAYLOAD_LEN: usize = 24;

// Power info field: 11 bits of battery voltage offset above 5 bits of tx power index
const VOLTAGE_SHIFT: u16 = 5;
const TX_POWER_MASK: u16 = 0x1F;
const BASE_VOLTAGE_MV: u16 = 1600;
const BASE_TX_POWER_DBM: i16 = -40;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unsupported data format {0}, only RAWv2 (5) is supported")]
    UnsupportedFormat(u8),

    #[error("empty manufacturer payload")]
    Empty,

    #[error("invalid RAWv2 payload length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Decode RuuviTag manufacturer data format 5 into a measurement
///
/// Data format 5 uses a 24-byte big-endian payload:
/// - Byte 0: Data format (5)
/// - Bytes 1-2: Temperature (signed, 0.005°C resolution)
/// - Bytes 3-4: Humidity (unsigned, 0.0025% resolution)
/// - Bytes 5-6: Pressure (unsigned, +50000 Pa offset, 1 Pa resolution)
/// - Bytes 7-12: Acceleration X, Y, Z (signed, 0.001 g resolution)
/// - Bytes 13-14: Power info (battery voltage offset + tx power index)
/// - Byte 15: Movement counter
/// - Bytes 16-17: Measurement sequence number
/// - Bytes 18-23: MAC address
///
/// # Arguments
/// * `data` - Raw manufacturer data bytes (without the manufacturer ID)
/// * `pressure_offset` - Calibration offset added to the pressure, in hPa
///
/// # Returns
/// The decoded measurement with `signal_strength` left unset, or the reason
/// the payload was rejected
pub fn decode(data: &[u8], pressure_offset: f64) -> Result<Measurement, DecodeError> {
    let version = *data.first().ok_or(DecodeError::Empty)?;
    if version != DATA_FORMAT {
        return Err(DecodeError::UnsupportedFormat(version));
    }
    if data.len() != PAYLOAD_LEN {
        return Err(DecodeError::InvalidLength {
            expected: PAYLOAD_LEN,
            actual: data.len(),
        });
    }

    let i16_at = |i: usize| i16::from_be_bytes([data[i], data[i + 1]]);
    let u16_at = |i: usize| u16::from_be_bytes([data[i], data[i + 1]]);

    // Scale in integers (0.005 °C and 0.0025 % steps) and round once to hundredths
    let temperature = div_round(i64::from(i16_at(1)) * 5, 10) as f64 / 100.0;
    let humidity = div_round(i64::from(u16_at(3)) * 25, 100) as f64 / 100.0;
    let pressure = (f64::from(u16_at(5)) + 50000.0) / 100.0 + pressure_offset;
    let (battery_voltage, tx_power) = decode_power_info(u16_at(13));

    Ok(Measurement {
        temperature,
        humidity,
        pressure: round_to(pressure, 2),
        acceleration_x: f64::from(i16_at(7)) / 1000.0,
        acceleration_y: f64::from(i16_at(9)) / 1000.0,
        acceleration_z: f64::from(i16_at(11)) / 1000.0,
        battery_voltage,
        tx_power,
        movement_counter: data[15],
        sequence_number: u16_at(16),
        signal_strength: None,
        mac: to_hex(&data[18..24]),
    })
}

/// Split the power info field into battery voltage (V) and tx power (dBm)
pub fn decode_power_info(power_info: u16) -> (f64, i16) {
    let voltage_offset = power_info >> VOLTAGE_SHIFT;
    let tx_index = (power_info & TX_POWER_MASK) as i16;

    let voltage = f64::from(BASE_VOLTAGE_MV + voltage_offset) / 1000.0;
    let tx_power = BASE_TX_POWER_DBM + tx_index * 2;

    (voltage, tx_power)
}
