/// Identifier the device emits when it enters (or re-enters) the OpenOCD mode.
pub const MODE_IDENTIFIER: &[u8; 4] = b"OCD1";

/// Highest number of bit-pairs a single shift may carry.
/// Larger requests are clamped to this value, never rejected.
pub const BIT_SEQUENCES_LIMIT: u16 = 0x2000;

/// Number of bit-pairs that are awaited, clocked and answered as one unit.
pub const CHUNK_BITS: u16 = 16;

/// Bytes that must follow a serial speed request for it to take effect.
pub const SPEED_CONFIRMATION: [u8; 2] = [0xAA, 0x55];

/// Number of bytes needed to hold `bits` bits of a single lane.
pub fn lane_bytes(bits: u16) -> usize {
    usize::from(bits).div_ceil(8)
}

/// Electrical configuration of the JTAG lines.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum PinMode {
    /// All lines are inputs.
    HighImpedance = 0,
    /// TCK, TMS, TDI and the reset lines are push-pull outputs.
    Jtag = 1,
    /// Like [`PinMode::Jtag`], but outputs only ever pull low.
    JtagOpenDrain = 2,
}

impl PinMode {
    /// Decodes a mode selector. Every value that does not name a JTAG mode
    /// leaves the lines floating.
    pub fn from_byte(byte: u8) -> PinMode {
        match byte {
            1 => PinMode::Jtag,
            2 => PinMode::JtagOpenDrain,
            _ => PinMode::HighImpedance,
        }
    }

    /// Whether the mode turns the driven lines into outputs
    pub fn drives_outputs(self) -> bool {
        matches!(self, PinMode::Jtag | PinMode::JtagOpenDrain)
    }

    /// Whether the driven lines are switched to open-drain
    pub fn open_drain(self) -> bool {
        self == PinMode::JtagOpenDrain
    }
}

impl From<PinMode> for u8 {
    fn from(value: PinMode) -> Self {
        value as u8
    }
}

/// Single-line board features that can be switched by the host.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum Feature {
    Led = 0x01,
    Vreg = 0x02,
    Trst = 0x04,
    Srst = 0x08,
    Pullup = 0x10,
}

impl Feature {
    /// Returns `None` for identifiers the device does not know.
    pub fn from_id(id: u8) -> Option<Feature> {
        match id {
            0x01 => Some(Feature::Led),
            0x02 => Some(Feature::Vreg),
            0x04 => Some(Feature::Trst),
            0x08 => Some(Feature::Srst),
            0x10 => Some(Feature::Pullup),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }
}

/// Serial speed codes understood by the speed command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum SerialSpeed {
    Normal = 0,
    Fast = 1,
}

impl SerialSpeed {
    pub fn from_byte(byte: u8) -> Option<SerialSpeed> {
        match byte {
            0 => Some(SerialSpeed::Normal),
            1 => Some(SerialSpeed::Fast),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Analog channels reported by the telemetry command, in reply order.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AdcChannel {
    /// The general purpose probe input (AN12)
    Probe,
    /// External supply sense (AN11)
    Vext,
    /// 3.3V regulator output (AN10)
    V33,
    /// 5V regulator output (AN9)
    V50,
}

impl AdcChannel {
    /// The order in which the channels are sampled and transmitted
    pub const REPLY_ORDER: [AdcChannel; 4] = [
        AdcChannel::Probe,
        AdcChannel::Vext,
        AdcChannel::V33,
        AdcChannel::V50,
    ];

    /// Hardware input number of the channel
    pub fn input(self) -> u8 {
        match self {
            AdcChannel::Probe => 12,
            AdcChannel::Vext => 11,
            AdcChannel::V33 => 10,
            AdcChannel::V50 => 9,
        }
    }

    fn position(self) -> usize {
        match self {
            AdcChannel::Probe => 0,
            AdcChannel::Vext => 1,
            AdcChannel::V33 => 2,
            AdcChannel::V50 => 3,
        }
    }
}

/// Raw readings of all telemetry channels.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct AdcReadings {
    values: [u16; 4],
}

impl AdcReadings {
    /// Creates readings from values in [`AdcChannel::REPLY_ORDER`].
    pub const fn new(values: [u16; 4]) -> AdcReadings {
        AdcReadings { values }
    }

    pub fn get(&self, channel: AdcChannel) -> u16 {
        self.values[channel.position()]
    }

    pub fn set(&mut self, channel: AdcChannel, value: u16) {
        self.values[channel.position()] = value;
    }

    /// All values in [`AdcChannel::REPLY_ORDER`]
    pub fn values(&self) -> [u16; 4] {
        self.values
    }
}

/// A command sent from the host to the adapter.
///
/// Every command is a single opcode byte followed by a fixed number of argument bytes.
/// The shift command is additionally followed by its payload, which is not part of
/// the command itself but streamed into the device while it clocks (see [`ShiftRequest`]).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Command {
    /// Leaves the OpenOCD mode. The device sends no reply.
    Exit,
    /// Configures direction and drive of the JTAG lines.
    SetPinMode(PinMode),
    /// Switches a board feature. Unknown features are ignored by the device.
    SetFeature { feature: u8, action: u8 },
    /// Samples the analog channels.
    ReadAdcs,
    /// Clocks `bit_count` TDI/TMS bit-pairs through the TAP.
    TapShift { bit_count: u16 },
    /// Re-announces the mode identifier.
    Enter,
    /// Changes the serial speed. Takes effect only with a correct confirmation.
    SetSerialSpeed { speed: u8, confirmation: [u8; 2] },
    /// Sets the busy-wait between TCK half cycles.
    SetDelay { delay: u16 },
    /// Any opcode the device does not implement.
    Unknown(u8),
}

/// A reply sent from the adapter to the host.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Reply {
    /// The [`MODE_IDENTIFIER`] banner
    Identifier,
    /// Answer to an unimplemented opcode
    Unknown,
    /// Telemetry values
    Adcs(AdcReadings),
    /// Acknowledges a shift with the accepted (possibly clamped) bit count.
    /// The sampled TDO bytes follow on the stream.
    ShiftAck { bit_count: u16 },
    /// The serial speed code that is now in effect
    SerialSpeed { speed: u8 },
}

/// Size information for one shift, after clamping.
///
/// The payload of a shift interleaves the two lanes per byte, `[tdi_0, tms_0, tdi_1, tms_1, ...]`,
/// and is consumed in chunks of [`CHUNK_BITS`] bit-pairs. Within each byte, bits are
/// used least significant first. The reply carries one TDO bit per bit-pair, packed the same way.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ShiftRequest {
    bit_count: u16,
}

impl ShiftRequest {
    /// Creates a request for `requested` bit-pairs, clamped to `limit`.
    pub fn clamped(requested: u16, limit: u16) -> ShiftRequest {
        ShiftRequest {
            bit_count: requested.min(limit),
        }
    }

    /// Number of bit-pairs that will be clocked
    pub fn bit_count(&self) -> u16 {
        self.bit_count
    }

    /// Bytes per lane
    pub fn byte_count(&self) -> usize {
        lane_bytes(self.bit_count)
    }

    /// Total number of payload bytes the device consumes
    pub fn payload_len(&self) -> usize {
        2 * self.byte_count()
    }

    /// Number of TDO bytes the device sends after the acknowledgment
    pub fn sample_len(&self) -> usize {
        self.byte_count()
    }

    /// The sizes of the chunks the request is processed in.
    /// Only the last chunk may be shorter than [`CHUNK_BITS`].
    pub fn chunks(&self) -> Chunks {
        Chunks {
            remaining: self.bit_count,
        }
    }
}

/// Iterator over the bit-pair count of each chunk of a [`ShiftRequest`]
#[derive(Clone, Debug)]
pub struct Chunks {
    remaining: u16,
}

impl Iterator for Chunks {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        if self.remaining == 0 {
            return None;
        }
        let bits = self.remaining.min(CHUNK_BITS);
        self.remaining -= bits;
        Some(bits)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = usize::from(self.remaining.div_ceil(CHUNK_BITS));
        (n, Some(n))
    }
}

impl ExactSizeIterator for Chunks {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn clamps_oversized_requests() {
        let request = ShiftRequest::clamped(0xFFFF, BIT_SEQUENCES_LIMIT);
        assert_eq!(request.bit_count(), BIT_SEQUENCES_LIMIT);
        assert_eq!(request.byte_count(), 1024);
        assert_eq!(request.payload_len(), 2048);
    }

    #[test]
    fn chunking_of_partial_request() {
        let request = ShiftRequest::clamped(17, BIT_SEQUENCES_LIMIT);
        assert_eq!(request.chunks().collect::<Vec<_>>(), vec![16, 1]);
        assert_eq!(request.payload_len(), 6);
        assert_eq!(request.sample_len(), 3);
    }

    #[test]
    fn exact_multiple_has_no_trailing_chunk() {
        let request = ShiftRequest::clamped(32, BIT_SEQUENCES_LIMIT);
        assert_eq!(request.chunks().collect::<Vec<_>>(), vec![16, 16]);
        assert_eq!(request.chunks().len(), 2);
    }

    #[test]
    fn empty_request_has_no_chunks() {
        let request = ShiftRequest::clamped(0, BIT_SEQUENCES_LIMIT);
        assert_eq!(request.chunks().next(), None);
        assert_eq!(request.payload_len(), 0);
    }

    #[test]
    fn unknown_pin_modes_float() {
        assert_eq!(PinMode::from_byte(7), PinMode::HighImpedance);
        assert!(!PinMode::from_byte(7).drives_outputs());
        assert!(PinMode::JtagOpenDrain.open_drain());
        assert!(!PinMode::Jtag.open_drain());
    }

    #[test]
    fn adc_readings_follow_reply_order() {
        let mut readings = AdcReadings::default();
        readings.set(AdcChannel::V33, 0x0123);
        assert_eq!(readings.values(), [0, 0, 0x0123, 0]);
        assert_eq!(readings.get(AdcChannel::V33), 0x0123);
        assert_eq!(AdcChannel::REPLY_ORDER.map(AdcChannel::input), [12, 11, 10, 9]);
    }
}
