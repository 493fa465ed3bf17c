//! The command loop of a single session.
use std::{io::ErrorKind, marker::PhantomData};

use oocd_protocol::{
    Command, Reply, SPEED_CONFIRMATION, SerialSpeed, ShiftRequest, error::ReadError,
};

use crate::{
    board::Board,
    delay::{DelayFunc, SpinDelay},
    engine::TapEngine,
    handlers::{apply_feature, configure_pins, read_adcs},
    lines::TapLines,
    server::Config,
    stream::{Inline, ShiftStream, Strategy},
    transport::Transport,
};

/// How a session came to an end
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SessionEnd {
    /// The host sent the exit opcode
    Exit,
    /// The stream ended while the device was waiting for a command
    Disconnected,
}

/// An adapter: the shift engine, the board peripherals and the shift strategy `S`.
#[derive(Debug)]
pub struct Device<L, B, D = SpinDelay, S = Inline> {
    engine: TapEngine<L, D>,
    board: B,
    config: Config,
    strategy: PhantomData<S>,
}

impl<L: TapLines, B: Board, D: DelayFunc, S: Strategy> Device<L, B, D, S> {
    pub fn new(engine: TapEngine<L, D>, board: B, config: Config) -> Device<L, B, D, S> {
        Device {
            engine,
            board,
            config,
            strategy: PhantomData,
        }
    }

    pub fn engine(&self) -> &TapEngine<L, D> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut TapEngine<L, D> {
        &mut self.engine
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs the protocol on `transport` until the host exits or goes away.
    ///
    /// Every session starts with the configured default delay and announces itself
    /// with the mode identifier. I/O errors other than the end of the stream are returned.
    pub fn run_session<T: Transport>(&mut self, transport: &mut T) -> Result<SessionEnd, ReadError> {
        self.engine.set_half_cycle_delay(self.config.default_delay);
        log::info!("Entering OpenOCD mode ({} shifts)", S::NAME);
        transport.send(&Reply::Identifier)?;

        loop {
            let (reader, _) = transport.split();
            let command = match Command::from_reader(reader) {
                Ok(command) => command,
                Err(ReadError::IoError(err))
                    if matches!(
                        err.kind(),
                        ErrorKind::UnexpectedEof
                            | ErrorKind::ConnectionReset
                            | ErrorKind::ConnectionAborted
                    ) =>
                {
                    log::info!("Host disconnected");
                    return Ok(SessionEnd::Disconnected);
                }
                Err(other) => return Err(other),
            };
            if command == Command::Exit {
                log::info!("Leaving OpenOCD mode");
                return Ok(SessionEnd::Exit);
            }
            self.process_command(command, transport)?;
        }
    }

    fn process_command<T: Transport>(
        &mut self,
        command: Command,
        transport: &mut T,
    ) -> Result<(), ReadError> {
        match command {
            Command::Exit => {}
            Command::SetPinMode(mode) => {
                log::debug!("Received pin mode {:?}", mode);
                configure_pins(self.engine.lines_mut(), mode);
            }
            Command::SetFeature { feature, action } => {
                log::debug!("Received feature 0x{:02x}, action 0x{:02x}", feature, action);
                if apply_feature(self.engine.lines_mut(), &mut self.board, feature, action).is_none() {
                    log::warn!("Ignoring unknown feature 0x{:02x}", feature);
                }
            }
            Command::ReadAdcs => {
                let readings = read_adcs(&mut self.board);
                log::debug!("Read ADCs: {:?}", readings.values());
                transport.send(&Reply::Adcs(readings))?;
            }
            Command::TapShift { bit_count } => {
                let request = ShiftRequest::clamped(bit_count, self.config.bit_sequence_limit);
                if request.bit_count() != bit_count {
                    log::warn!(
                        "Shift of {} bits clamped to {}",
                        bit_count,
                        request.bit_count()
                    );
                }
                log::debug!("Received shift: bit_count={}", request.bit_count());
                transport.send(&Reply::ShiftAck {
                    bit_count: request.bit_count(),
                })?;
                let engine = &mut self.engine;
                S::transfer(
                    transport,
                    request.payload_len(),
                    &mut |stream: &mut dyn ShiftStream| engine.shift(&request, stream),
                )?;
            }
            Command::Enter => {
                log::debug!("Received enter, repeating identifier");
                transport.send(&Reply::Identifier)?;
            }
            Command::SetSerialSpeed {
                speed,
                confirmation,
            } => {
                let selected = match SerialSpeed::from_byte(speed) {
                    Some(SerialSpeed::Fast) if confirmation == SPEED_CONFIRMATION => {
                        SerialSpeed::Fast
                    }
                    _ => SerialSpeed::Normal,
                };
                log::debug!("Received serial speed {}, selected {:?}", speed, selected);
                let baud_rate = match selected {
                    SerialSpeed::Fast => self.config.fast_baud_rate,
                    SerialSpeed::Normal => self.config.normal_baud_rate,
                };
                transport.set_baud_rate(baud_rate)?;
                transport.send(&Reply::SerialSpeed {
                    speed: selected.code(),
                })?;
            }
            Command::SetDelay { delay } => {
                log::debug!("Received half-cycle delay {}", delay);
                self.engine.set_half_cycle_delay(delay);
            }
            Command::Unknown(opcode) => {
                log::warn!("Received unknown opcode 0x{:02x}", opcode);
                transport.send(&Reply::Unknown)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{Device, SessionEnd};
    use crate::delay::SpinDelay;
    use crate::engine::TapEngine;
    use crate::server::Config;
    use crate::sim::{SimulatedBoard, SimulatedLines};
    use crate::stream::{Background, Inline, Strategy};
    use crate::transport::Link;
    use oocd_protocol::{AdcReadings, MODE_IDENTIFIER};
    use std::io::Cursor;

    type TestDevice<S> = Device<SimulatedLines, SimulatedBoard, SpinDelay, S>;

    fn device<S: Strategy>(config: Config) -> TestDevice<S> {
        let board = SimulatedBoard::new(AdcReadings::new([0x0123, 0x0456, 0x0789, 0x0ABC]));
        Device::new(TapEngine::with_lines(SimulatedLines::wired()), board, config)
    }

    /// Runs one session over `input` and returns how it ended, the output and the final baud rate.
    fn session<S: Strategy>(device: &mut TestDevice<S>, input: &[u8]) -> (SessionEnd, Vec<u8>, u32) {
        let mut link = Link::new(Cursor::new(input.to_vec()), Vec::new(), 115_200);
        let end = device.run_session(&mut link).unwrap();
        let baud_rate = link.baud_rate();
        let (_, output) = link.into_parts();
        (end, output, baud_rate)
    }

    fn banner_and(rest: &[u8]) -> Vec<u8> {
        let mut expected = MODE_IDENTIFIER.to_vec();
        expected.extend_from_slice(rest);
        expected
    }

    #[test]
    fn exit_ends_session_without_reply() {
        let mut device = device::<Inline>(Config::default());
        let (end, output, _) = session(&mut device, &[0x00]);
        assert_eq!(end, SessionEnd::Exit);
        assert_eq!(output, MODE_IDENTIFIER.to_vec());
    }

    #[test]
    fn end_of_stream_disconnects() {
        let mut device = device::<Inline>(Config::default());
        let (end, _, _) = session(&mut device, &[0x01, 0x01]);
        assert_eq!(end, SessionEnd::Disconnected);
    }

    #[test]
    fn unknown_opcodes_get_single_byte_reply() {
        let mut device = device::<Inline>(Config::default());
        let (end, output, _) = session(&mut device, &[0x04, 0x42, 0x00]);
        assert_eq!(end, SessionEnd::Exit);
        assert_eq!(output, banner_and(&[0x00, 0x00]));
    }

    #[test]
    fn enter_repeats_identifier() {
        let mut device = device::<Inline>(Config::default());
        let (_, output, _) = session(&mut device, &[0x06, 0x06]);
        assert_eq!(output, b"OCD1OCD1OCD1".to_vec());
    }

    #[test]
    fn adc_reply() {
        let mut device = device::<Inline>(Config::default());
        let (_, output, _) = session(&mut device, &[0x03]);
        assert_eq!(
            output,
            banner_and(&[0x03, 8, 0x01, 0x23, 0x04, 0x56, 0x07, 0x89, 0x0A, 0xBC])
        );
        assert!(!device.board().adc_enabled());
    }

    fn shift_17<S: Strategy>() {
        let mut device = device::<S>(Config::default());
        let input = [
            0x01, 0x01, // JTAG mode
            0x05, 0x00, 0x11, // 17 bit-pairs
            0x5A, 0x00, 0xC3, 0x00, 0x01, 0x00, // payload
            0x00,
        ];
        let (end, output, _) = session(&mut device, &input);
        assert_eq!(end, SessionEnd::Exit);
        assert_eq!(output, banner_and(&[0x05, 0x00, 0x11, 0x5A, 0xC3, 0x01]));
    }

    #[test]
    fn inline_shift_with_partial_chunk() {
        shift_17::<Inline>();
    }

    #[test]
    fn background_shift_with_partial_chunk() {
        shift_17::<Background>();
    }

    #[test]
    fn empty_shift_only_acknowledges() {
        let mut device = device::<Inline>(Config::default());
        let (_, output, _) = session(&mut device, &[0x01, 0x01, 0x05, 0x00, 0x00, 0x06]);
        assert_eq!(output, banner_and(&[0x05, 0x00, 0x00, b'O', b'C', b'D', b'1']));
    }

    #[test]
    fn oversized_shift_is_clamped() {
        let mut device = device::<Inline>(Config {
            bit_sequence_limit: 16,
            ..Config::default()
        });
        // 20 requested, only 16 accepted, so the payload is 4 bytes
        let input = [0x01, 0x01, 0x05, 0x00, 0x14, 0xFF, 0x00, 0x0F, 0x00, 0x00];
        let (end, output, _) = session(&mut device, &input);
        assert_eq!(end, SessionEnd::Exit);
        assert_eq!(output, banner_and(&[0x05, 0x00, 0x10, 0xFF, 0x0F]));
    }

    #[test]
    fn excess_payload_is_parsed_as_commands() {
        let mut device = device::<Inline>(Config::default());
        let input = [0x01, 0x01, 0x05, 0x00, 0x08, 0xAA, 0x00, 0x06];
        let (_, output, _) = session(&mut device, &input);
        assert_eq!(output, banner_and(&[0x05, 0x00, 0x08, 0xAA, b'O', b'C', b'D', b'1']));
    }

    #[test]
    fn fast_serial_speed_needs_confirmation() {
        let mut device = device::<Inline>(Config::default());
        let (_, output, baud_rate) = session(&mut device, &[0x07, 0x01, 0xAA, 0x55]);
        assert_eq!(output, banner_and(&[0x07, 0x01]));
        assert_eq!(baud_rate, 1_000_000);

        let (_, output, baud_rate) = session(&mut device, &[0x07, 0x01, 0xAA, 0x56]);
        assert_eq!(output, banner_and(&[0x07, 0x00]));
        assert_eq!(baud_rate, 115_200);
    }

    #[test]
    fn unknown_serial_speed_falls_back_to_normal() {
        let mut device = device::<Inline>(Config::default());
        let (_, output, baud_rate) = session(&mut device, &[0x07, 0x05, 0xAA, 0x55]);
        assert_eq!(output, banner_and(&[0x07, 0x00]));
        assert_eq!(baud_rate, 115_200);
    }

    #[test]
    fn delay_persists_until_next_session() {
        let mut device = device::<Inline>(Config::default());
        session(&mut device, &[0x08, 0x01, 0x00]);
        assert_eq!(device.engine().half_cycle_delay(), 0x0100);
        session(&mut device, &[0x06]);
        assert_eq!(device.engine().half_cycle_delay(), Config::default().default_delay);
    }

    #[test]
    fn unknown_feature_is_silent() {
        let mut device = device::<Inline>(Config::default());
        let (end, output, _) = session(&mut device, &[0x02, 0x40, 0x01, 0x02, 0x01, 0x01, 0x00]);
        assert_eq!(end, SessionEnd::Exit);
        assert_eq!(output, MODE_IDENTIFIER.to_vec());
        assert!(device.board().led());
    }
}
