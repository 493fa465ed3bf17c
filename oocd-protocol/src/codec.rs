/// Read and write implementations for the protocol messages
use std::io::{self, Read, Write};

use crate::{
    error::ReadError,
    protocol::{AdcReadings, Command, MODE_IDENTIFIER, PinMode, Reply, ShiftRequest},
};

fn read_byte(reader: &mut impl Read) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

impl Command {
    pub const CMD_UNKNOWN: u8 = 0x00;
    pub const CMD_PORT_MODE: u8 = 0x01;
    pub const CMD_FEATURE: u8 = 0x02;
    pub const CMD_READ_ADCS: u8 = 0x03;
    pub const CMD_TAP_SHIFT: u8 = 0x05;
    pub const CMD_ENTER_OOCD: u8 = 0x06;
    pub const CMD_UART_SPEED: u8 = 0x07;
    pub const CMD_JTAG_SPEED: u8 = 0x08;

    /// Reads an opcode and its fixed arguments.
    ///
    /// Unimplemented opcodes are not an error, they decode to [`Command::Unknown`].
    /// The payload of a shift is left in the reader.
    pub fn from_reader(reader: &mut impl Read) -> Result<Command, ReadError> {
        let opcode = read_byte(reader)?;
        let command = match opcode {
            Self::CMD_UNKNOWN => Command::Exit,
            Self::CMD_PORT_MODE => Command::SetPinMode(PinMode::from_byte(read_byte(reader)?)),
            Self::CMD_FEATURE => {
                let mut buf = [0u8; 2];
                reader.read_exact(&mut buf)?;
                Command::SetFeature {
                    feature: buf[0],
                    action: buf[1],
                }
            }
            Self::CMD_READ_ADCS => Command::ReadAdcs,
            Self::CMD_TAP_SHIFT => {
                let mut buf = [0u8; 2];
                reader.read_exact(&mut buf)?;
                Command::TapShift {
                    bit_count: u16::from_be_bytes(buf),
                }
            }
            Self::CMD_ENTER_OOCD => Command::Enter,
            Self::CMD_UART_SPEED => {
                let mut buf = [0u8; 3];
                reader.read_exact(&mut buf)?;
                Command::SetSerialSpeed {
                    speed: buf[0],
                    confirmation: [buf[1], buf[2]],
                }
            }
            Self::CMD_JTAG_SPEED => {
                let mut buf = [0u8; 2];
                reader.read_exact(&mut buf)?;
                Command::SetDelay {
                    delay: u16::from_be_bytes(buf),
                }
            }
            other => Command::Unknown(other),
        };
        Ok(command)
    }

    /// The opcode this command is introduced with
    pub fn opcode(&self) -> u8 {
        match self {
            Command::Exit => Self::CMD_UNKNOWN,
            Command::SetPinMode(_) => Self::CMD_PORT_MODE,
            Command::SetFeature { .. } => Self::CMD_FEATURE,
            Command::ReadAdcs => Self::CMD_READ_ADCS,
            Command::TapShift { .. } => Self::CMD_TAP_SHIFT,
            Command::Enter => Self::CMD_ENTER_OOCD,
            Command::SetSerialSpeed { .. } => Self::CMD_UART_SPEED,
            Command::SetDelay { .. } => Self::CMD_JTAG_SPEED,
            Command::Unknown(opcode) => *opcode,
        }
    }

    pub fn write_to(&self, writer: &mut impl Write) -> io::Result<()> {
        let opcode = self.opcode();
        match self {
            Command::Exit | Command::ReadAdcs | Command::Enter | Command::Unknown(_) => {
                writer.write_all(&[opcode])
            }
            Command::SetPinMode(mode) => writer.write_all(&[opcode, u8::from(*mode)]),
            Command::SetFeature { feature, action } => {
                writer.write_all(&[opcode, *feature, *action])
            }
            Command::TapShift { bit_count } => {
                let [hi, lo] = bit_count.to_be_bytes();
                writer.write_all(&[opcode, hi, lo])
            }
            Command::SetSerialSpeed {
                speed,
                confirmation,
            } => writer.write_all(&[opcode, *speed, confirmation[0], confirmation[1]]),
            Command::SetDelay { delay } => {
                let [hi, lo] = delay.to_be_bytes();
                writer.write_all(&[opcode, hi, lo])
            }
        }
    }
}

impl Reply {
    const ADC_PAYLOAD_LEN: u8 = 8;

    /// The first byte of the reply on the wire
    pub fn code(&self) -> u8 {
        match self {
            Reply::Identifier => MODE_IDENTIFIER[0],
            Reply::Unknown => Command::CMD_UNKNOWN,
            Reply::Adcs(_) => Command::CMD_READ_ADCS,
            Reply::ShiftAck { .. } => Command::CMD_TAP_SHIFT,
            Reply::SerialSpeed { .. } => Command::CMD_UART_SPEED,
        }
    }

    pub fn from_reader(reader: &mut impl Read) -> Result<Reply, ReadError> {
        let code = read_byte(reader)?;
        match code {
            c if c == MODE_IDENTIFIER[0] => {
                let mut buf = [0u8; 3];
                reader.read_exact(&mut buf)?;
                if buf[..] != MODE_IDENTIFIER[1..] {
                    let mut identifier = vec![code];
                    identifier.extend_from_slice(&buf);
                    return Err(ReadError::InvalidIdentifier(
                        String::from_utf8_lossy(&identifier).to_string(),
                    ));
                }
                Ok(Reply::Identifier)
            }
            Command::CMD_UNKNOWN => Ok(Reply::Unknown),
            Command::CMD_READ_ADCS => {
                let mut buf = [0u8; 9];
                reader.read_exact(&mut buf)?;
                if buf[0] != Self::ADC_PAYLOAD_LEN {
                    return Err(ReadError::InvalidFormat(format!(
                        "ADC reply announces {} bytes, expected {}",
                        buf[0],
                        Self::ADC_PAYLOAD_LEN
                    )));
                }
                let mut values = [0u16; 4];
                for (value, raw) in values.iter_mut().zip(buf[1..].chunks_exact(2)) {
                    *value = u16::from_be_bytes([raw[0], raw[1]]);
                }
                Ok(Reply::Adcs(AdcReadings::new(values)))
            }
            Command::CMD_TAP_SHIFT => {
                let mut buf = [0u8; 2];
                reader.read_exact(&mut buf)?;
                Ok(Reply::ShiftAck {
                    bit_count: u16::from_be_bytes(buf),
                })
            }
            Command::CMD_UART_SPEED => Ok(Reply::SerialSpeed {
                speed: read_byte(reader)?,
            }),
            other => Err(ReadError::UnknownReply(other)),
        }
    }

    pub fn write_to(&self, writer: &mut impl Write) -> io::Result<()> {
        match self {
            Reply::Identifier => writer.write_all(MODE_IDENTIFIER),
            Reply::Unknown => writer.write_all(&[Command::CMD_UNKNOWN]),
            Reply::Adcs(readings) => {
                let mut buf = [0u8; 10];
                buf[0] = Command::CMD_READ_ADCS;
                buf[1] = Self::ADC_PAYLOAD_LEN;
                for (raw, value) in buf[2..].chunks_exact_mut(2).zip(readings.values()) {
                    raw.copy_from_slice(&value.to_be_bytes());
                }
                writer.write_all(&buf)
            }
            Reply::ShiftAck { bit_count } => {
                let [hi, lo] = bit_count.to_be_bytes();
                writer.write_all(&[Command::CMD_TAP_SHIFT, hi, lo])
            }
            Reply::SerialSpeed { speed } => writer.write_all(&[Command::CMD_UART_SPEED, *speed]),
        }
    }
}

impl ShiftRequest {
    /// Builds the interleaved payload for this request.
    ///
    /// Lanes shorter than [`ShiftRequest::byte_count`] are padded with zeros, longer lanes are cut.
    pub fn encode_payload(&self, tdi: &[u8], tms: &[u8]) -> Vec<u8> {
        let lane = |data: &[u8], index: usize| data.get(index).copied().unwrap_or(0);
        let mut payload = Vec::with_capacity(self.payload_len());
        for index in 0..self.byte_count() {
            payload.push(lane(tdi, index));
            payload.push(lane(tms, index));
        }
        payload
    }
}
