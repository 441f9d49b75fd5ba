// Feetech STS3215 serial protocol, position mode subset
//
// Packet format: [0xFF, 0xFF, ID, Length, Instruction, Params..., Checksum]
// Length counts instruction + params + checksum. Multi-byte values are little-endian.

use serialport::SerialPort;
use std::io::{Read, Write};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BAUDRATE: u32 = 1_000_000;
pub const DEFAULT_TIMEOUT_MS: u64 = 100;

const HEADER: [u8; 2] = [0xFF, 0xFF];

/// Servo resolution: 4096 steps per revolution
pub const STEPS_PER_REVOLUTION: u16 = 4096;
const STEPS_PER_DEG: f64 = STEPS_PER_REVOLUTION as f64 / 360.0;

/// Goal position of the horn at servo angle 90 degrees
pub const CENTER_POSITION: u16 = STEPS_PER_REVOLUTION / 2;

#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Instruction {
    Ping = 0x01,
    Read = 0x02,
    Write = 0x03,
}

/// Register addresses used for position control
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Register {
    OperatingMode = 33,   // 1 byte: 0=position, 1=velocity, 2=PWM, 3=step
    TorqueEnable = 40,    // 1 byte
    GoalPosition = 42,    // 2 bytes
    Lock = 55,            // 1 byte
    PresentPosition = 56, // 2 bytes, read-only
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OperatingMode {
    Position = 0,
}

#[derive(Debug, thiserror::Error)]
pub enum FeetechError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid response from servo {id}: {reason}")]
    InvalidResponse { id: u8, reason: String },

    #[error("Checksum mismatch for servo {id}")]
    ChecksumMismatch { id: u8 },

    #[error("Servo {id} returned error status: 0x{status:02X}")]
    ServoError { id: u8, status: u8 },

    #[error("Timeout waiting for response from servo {id}")]
    Timeout { id: u8 },
}

pub type Result<T> = std::result::Result<T, FeetechError>;

/// Servo angle (0..=180 degrees, 90 centred) to goal position ticks
pub fn angle_to_position(angle: f64) -> u16 {
    let ticks = CENTER_POSITION as f64 + (angle - 90.0) * STEPS_PER_DEG;
    ticks.round().clamp(0.0, (STEPS_PER_REVOLUTION - 1) as f64) as u16
}

/// Goal/present position ticks back to a servo angle
pub fn position_to_angle(position: u16) -> f64 {
    90.0 + (position as f64 - CENTER_POSITION as f64) / STEPS_PER_DEG
}

fn checksum(data: &[u8]) -> u8 {
    let sum: u32 = data.iter().map(|&b| b as u32).sum();
    !(sum as u8)
}

fn build_packet(id: u8, instruction: Instruction, params: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(6 + params.len());
    packet.extend_from_slice(&HEADER);
    packet.push(id);
    packet.push((params.len() + 2) as u8);
    packet.push(instruction as u8);
    packet.extend_from_slice(params);
    packet.push(checksum(&packet[2..]));
    packet
}

/// Serial connection to a chain of Feetech servos
pub struct FeetechBus {
    port: Box<dyn SerialPort>,
}

impl FeetechBus {
    pub fn open(port_name: &str, baudrate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;
        Ok(Self { port })
    }

    fn send(&mut self, id: u8, instruction: Instruction, params: &[u8]) -> Result<()> {
        let packet = build_packet(id, instruction, params);
        self.port.write_all(&packet)?;
        self.port.flush()?;
        Ok(())
    }

    /// Read one status packet and return its parameters
    fn receive(&mut self, expected_id: u8) -> Result<Vec<u8>> {
        let mut head = [0u8; 4];
        self.port.read_exact(&mut head).map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                FeetechError::Timeout { id: expected_id }
            } else {
                FeetechError::Io(e)
            }
        })?;

        if head[..2] != HEADER {
            return Err(FeetechError::InvalidResponse {
                id: expected_id,
                reason: format!("Invalid header: {:02X?}", &head[..2]),
            });
        }
        let (id, length) = (head[2], head[3] as usize);
        if id != expected_id {
            return Err(FeetechError::InvalidResponse {
                id: expected_id,
                reason: format!("ID mismatch: got {}", id),
            });
        }
        if length < 2 {
            return Err(FeetechError::InvalidResponse {
                id,
                reason: format!("Length {} too short", length),
            });
        }

        // status byte + params + checksum
        let mut body = vec![0u8; length];
        self.port.read_exact(&mut body)?;

        let (payload, received) = body.split_at(length - 1);
        let expected = checksum(&[&head[2..], payload].concat());
        if received[0] != expected {
            return Err(FeetechError::ChecksumMismatch { id });
        }
        if payload[0] != 0 {
            return Err(FeetechError::ServoError {
                id,
                status: payload[0],
            });
        }
        Ok(payload[1..].to_vec())
    }

    pub fn ping(&mut self, id: u8) -> Result<bool> {
        self.send(id, Instruction::Ping, &[])?;
        match self.receive(id) {
            Ok(_) => Ok(true),
            Err(FeetechError::Timeout { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn write_u8(&mut self, id: u8, register: Register, value: u8) -> Result<()> {
        debug!("Write u8 to servo {}: reg={:?}, value={}", id, register, value);
        self.send(id, Instruction::Write, &[register as u8, value])?;
        self.receive(id).map(|_| ())
    }

    pub fn write_u16(&mut self, id: u8, register: Register, value: u16) -> Result<()> {
        debug!("Write u16 to servo {}: reg={:?}, value={}", id, register, value);
        let [lo, hi] = value.to_le_bytes();
        self.send(id, Instruction::Write, &[register as u8, lo, hi])?;
        self.receive(id).map(|_| ())
    }

    pub fn read_u16(&mut self, id: u8, register: Register) -> Result<u16> {
        self.send(id, Instruction::Read, &[register as u8, 2])?;
        match self.receive(id)?.as_slice() {
            [lo, hi, ..] => Ok(u16::from_le_bytes([*lo, *hi])),
            other => Err(FeetechError::InvalidResponse {
                id,
                reason: format!("Expected 2 bytes, got {}", other.len()),
            }),
        }
    }

    pub fn enable_torque(&mut self, id: u8) -> Result<()> {
        self.write_u8(id, Register::TorqueEnable, 1)?;
        self.write_u8(id, Register::Lock, 1)
    }

    pub fn disable_torque(&mut self, id: u8) -> Result<()> {
        self.write_u8(id, Register::TorqueEnable, 0)?;
        self.write_u8(id, Register::Lock, 0)
    }

    /// Torque must be disabled first
    pub fn set_operating_mode(&mut self, id: u8, mode: OperatingMode) -> Result<()> {
        self.write_u8(id, Register::OperatingMode, mode as u8)
    }

    pub fn set_goal_position(&mut self, id: u8, position: u16) -> Result<()> {
        self.write_u16(id, Register::GoalPosition, position)
    }

    pub fn get_position(&mut self, id: u8) -> Result<u16> {
        self.read_u16(id, Register::PresentPosition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum() {
        // ID=1, Length=4, Instruction=WRITE, Addr=30, Data=0, 2
        // ~(1+4+3+30+0+2) = ~40 = 215
        assert_eq!(checksum(&[1u8, 4, 0x03, 30, 0, 2]), 215);
    }

    #[test]
    fn test_checksum_wraps() {
        assert_eq!(checksum(&[0xFF, 0xFF, 0x02]), !0x00u8);
    }

    #[test]
    fn test_build_goal_position_packet() {
        let packet = build_packet(3, Instruction::Write, &[Register::GoalPosition as u8, 0x00, 0x08]);
        assert_eq!(packet[..5], [0xFF, 0xFF, 3, 5, 0x03]);
        assert_eq!(packet[5..8], [42, 0x00, 0x08]);
        assert_eq!(packet[8], checksum(&packet[2..8]));
    }

    #[test]
    fn test_angle_to_position() {
        assert_eq!(angle_to_position(90.0), 2048);
        assert_eq!(angle_to_position(0.0), 1024);
        assert_eq!(angle_to_position(180.0), 3072);
        assert_eq!(angle_to_position(45.0), 1536);
        assert_eq!(angle_to_position(-1000.0), 0);
        assert_eq!(angle_to_position(1000.0), 4095);
    }

    #[test]
    fn test_position_to_angle() {
        assert_eq!(position_to_angle(2048), 90.0);
        assert!(position_to_angle(1024).abs() < 1e-9);
        assert!((position_to_angle(3072) - 180.0).abs() < 1e-9);
    }
}
