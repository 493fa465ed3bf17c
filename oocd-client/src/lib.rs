//! # OOCD Client
//!
//! Host side of the OpenOCD bit-bang adapter protocol. [`OcdClient`] issues every
//! command an adapter understands and decodes its replies, which makes it useful for
//! exercising adapters (real or simulated) without OpenOCD.
//!
//! ## Basic Usage
//!
//! ```ignore
//! use oocd_client::OcdClient;
//! use oocd_protocol::PinMode;
//!
//! let mut client = OcdClient::connect("127.0.0.1:4444")?;
//! client.set_pin_mode(PinMode::Jtag)?;
//!
//! // Five TMS ones reset every TAP on the chain
//! let shifted = client.shift(5, &[0x00], &[0x1F])?;
//! println!("TDO data: {:02x?}", shifted.tdo);
//! ```
//!
//! ## Related Crates
//!
//! - `oocd-server` - Device implementation
//! - `oocd-protocol` - Protocol encoding/decoding
use std::{
    io::{self, Read, Write},
    net::{TcpStream, ToSocketAddrs},
};

use oocd_protocol::{
    AdcReadings, Command, Feature, PinMode, Reply, SPEED_CONFIRMATION, SerialSpeed, ShiftRequest,
    error::ReadError,
};

/// The outcome of a TAP shift
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Shifted {
    /// Number of bit-pairs the adapter accepted. Less than requested if the request was clamped.
    pub bit_count: u16,
    /// Sampled TDO bits, least significant bit first
    pub tdo: Vec<u8>,
}

/// Client for an adapter in OpenOCD mode.
///
/// Works on any byte stream, by default a TCP connection.
pub struct OcdClient<S = TcpStream> {
    stream: S,
}

impl OcdClient<TcpStream> {
    /// Connects to an adapter and waits for it to announce the mode.
    pub fn connect(addr: impl ToSocketAddrs) -> Result<OcdClient<TcpStream>, ReadError> {
        let tcp = TcpStream::connect(addr)?;
        tcp.set_nodelay(true)?;
        if let Ok(peer) = tcp.peer_addr() {
            log::debug!("Connected to {}", peer);
        }
        OcdClient::from_stream(tcp)
    }
}

impl<S: Read + Write> OcdClient<S> {
    /// Wraps a stream on which the adapter is about to send its identifier.
    pub fn from_stream(stream: S) -> Result<OcdClient<S>, ReadError> {
        let mut client = OcdClient { stream };
        client.expect_identifier()?;
        Ok(client)
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Writes a raw command. Replies, if any, must be read with [`OcdClient::read_reply`].
    pub fn send(&mut self, command: &Command) -> io::Result<()> {
        command.write_to(&mut self.stream)?;
        self.stream.flush()
    }

    pub fn read_reply(&mut self) -> Result<Reply, ReadError> {
        Reply::from_reader(&mut self.stream)
    }

    fn expect_identifier(&mut self) -> Result<(), ReadError> {
        match self.read_reply()? {
            Reply::Identifier => Ok(()),
            other => Err(unexpected(Command::CMD_ENTER_OOCD, &other)),
        }
    }

    /// Asks the adapter to announce its mode again.
    pub fn enter(&mut self) -> Result<(), ReadError> {
        self.send(&Command::Enter)?;
        self.expect_identifier()
    }

    pub fn set_pin_mode(&mut self, mode: PinMode) -> io::Result<()> {
        self.send(&Command::SetPinMode(mode))
    }

    pub fn set_feature(&mut self, feature: Feature, on: bool) -> io::Result<()> {
        self.send(&Command::SetFeature {
            feature: feature.id(),
            action: u8::from(on),
        })
    }

    pub fn read_adcs(&mut self) -> Result<AdcReadings, ReadError> {
        self.send(&Command::ReadAdcs)?;
        match self.read_reply()? {
            Reply::Adcs(readings) => Ok(readings),
            other => Err(unexpected(Command::CMD_READ_ADCS, &other)),
        }
    }

    /// Requests a serial speed and returns the speed the adapter switched to.
    pub fn set_serial_speed(&mut self, speed: SerialSpeed) -> Result<SerialSpeed, ReadError> {
        self.send(&Command::SetSerialSpeed {
            speed: speed.code(),
            confirmation: SPEED_CONFIRMATION,
        })?;
        match self.read_reply()? {
            Reply::SerialSpeed { speed } => SerialSpeed::from_byte(speed).ok_or_else(|| {
                ReadError::InvalidFormat(format!("Adapter reports unknown serial speed {}", speed))
            }),
            other => Err(unexpected(Command::CMD_UART_SPEED, &other)),
        }
    }

    /// Sets the busy-wait between TCK half cycles.
    pub fn set_delay(&mut self, delay: u16) -> io::Result<()> {
        self.send(&Command::SetDelay { delay })
    }

    /// Leaves the OpenOCD mode. The adapter sends no reply.
    pub fn exit(&mut self) -> io::Result<()> {
        self.send(&Command::Exit)
    }

    /// Clocks `bit_count` TDI/TMS bit-pairs and returns the sampled TDO bits.
    ///
    /// Lanes are read least significant bit first and padded with zeros. The payload
    /// is only sent for the bit count the adapter acknowledged.
    pub fn shift(&mut self, bit_count: u16, tdi: &[u8], tms: &[u8]) -> Result<Shifted, ReadError> {
        self.send(&Command::TapShift { bit_count })?;
        let accepted = match self.read_reply()? {
            Reply::ShiftAck { bit_count } => bit_count,
            other => return Err(unexpected(Command::CMD_TAP_SHIFT, &other)),
        };
        if accepted != bit_count {
            log::warn!("Adapter accepted {} of {} bits", accepted, bit_count);
        }
        let request = ShiftRequest::clamped(accepted, accepted);
        let payload = request.encode_payload(tdi, tms);
        log::trace!("Shift payload: {:02x?}", payload);
        self.stream.write_all(&payload)?;
        self.stream.flush()?;

        let mut tdo = vec![0u8; request.sample_len()];
        self.stream.read_exact(&mut tdo)?;
        log::trace!("Shift result TDO data: {:02x?}", tdo);
        Ok(Shifted {
            bit_count: accepted,
            tdo,
        })
    }
}

fn unexpected(expected: u8, got: &Reply) -> ReadError {
    ReadError::UnexpectedReply {
        expected,
        got: got.code(),
    }
}

#[cfg(test)]
mod test {
    use super::OcdClient;
    use oocd_protocol::{AdcReadings, SerialSpeed, error::ReadError};
    use std::io::{self, Cursor, Read, Write};

    /// Replays canned adapter output and records what the client sends.
    struct Scripted {
        replies: Cursor<Vec<u8>>,
        sent: Vec<u8>,
    }

    impl Scripted {
        fn new(replies: &[u8]) -> Scripted {
            Scripted {
                replies: Cursor::new(replies.to_vec()),
                sent: Vec::new(),
            }
        }
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.replies.read(buf)
        }
    }

    impl Write for Scripted {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.sent.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn rejects_wrong_identifier() {
        match OcdClient::from_stream(Scripted::new(b"BBIO1")) {
            Err(ReadError::UnknownReply(code)) => assert_eq!(code, b'B'),
            other => panic!("expected UnknownReply, got {:?}", other.err()),
        }
    }

    #[test]
    fn shift_sends_payload_for_accepted_bits() {
        let mut client = OcdClient::from_stream(Scripted::new(b"OCD1\x05\x00\x08\x5A")).unwrap();
        let shifted = client.shift(12, &[0x5A, 0x0F], &[0x01, 0x00]).unwrap();
        assert_eq!(shifted.bit_count, 8);
        assert_eq!(shifted.tdo, vec![0x5A]);
        assert_eq!(client.into_inner().sent, vec![0x05, 0x00, 0x0C, 0x5A, 0x01]);
    }

    #[test]
    fn serial_speed_reports_fallback() {
        let mut client = OcdClient::from_stream(Scripted::new(b"OCD1\x07\x00")).unwrap();
        assert_eq!(client.set_serial_speed(SerialSpeed::Fast).unwrap(), SerialSpeed::Normal);
        assert_eq!(client.into_inner().sent, vec![0x07, 0x01, 0xAA, 0x55]);
    }

    #[test]
    fn mismatched_reply() {
        let mut client = OcdClient::from_stream(Scripted::new(b"OCD1\x00")).unwrap();
        match client.read_adcs() {
            Err(ReadError::UnexpectedReply { expected, got }) => {
                assert_eq!((expected, got), (0x03, 0x00))
            }
            other => panic!("expected UnexpectedReply, got {:?}", other),
        }
    }

    #[test]
    fn adc_readings() {
        let mut client =
            OcdClient::from_stream(Scripted::new(b"OCD1\x03\x08\x00\x01\x00\x02\x00\x03\x00\x04"))
                .unwrap();
        assert_eq!(client.read_adcs().unwrap(), AdcReadings::new([1, 2, 3, 4]));
    }
}
