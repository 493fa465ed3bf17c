//! Buffering between the transport and the shift engine.
//!
//! The engine consumes the shift payload chunk by chunk through a [`ShiftStream`]
//! and hands back the samples of every chunk as soon as it is clocked. How the
//! payload gets from the transport into the stream is decided by a [`Strategy`],
//! chosen as a type parameter when the device is built:
//!
//! - [`Inline`] reads the bytes of a chunk itself, right before the chunk is clocked.
//! - [`Background`] receives the whole payload on a separate thread while the engine
//!   clocks, and the engine only waits for the bytes of the chunk at hand.
//!
//! Both produce the same bytes in the same order on the wire.
use std::{
    io::{self, ErrorKind, Read, Write},
    sync::{Condvar, Mutex, MutexGuard, PoisonError},
    thread,
};

use oocd_protocol::{CHUNK_BITS, lane_bytes};

use crate::transport::Transport;

/// Payload bytes of one full chunk (both lanes)
pub const CHUNK_PAYLOAD: usize = 2 * (CHUNK_BITS as usize / 8);

/// Chunked access to a shift payload and its replies.
pub trait ShiftStream {
    /// Blocks until the next `count` payload bytes have arrived and returns them.
    ///
    /// Every byte is returned exactly once. Asking for more than one chunk or for
    /// bytes beyond the end of the payload is an error.
    fn wait_for(&mut self, count: usize) -> io::Result<&[u8]>;

    /// Transmits the samples of a finished chunk. Returns once they are handed to the transport.
    fn flush(&mut self, samples: &[u8]) -> io::Result<()>;
}

/// Moves a shift payload of known length from the transport into a [`ShiftStream`].
pub trait Strategy {
    /// Human readable name for diagnostics
    const NAME: &'static str;

    /// Runs `shift` against a stream over the next `payload_len` bytes of `transport`.
    fn transfer<T: Transport>(
        transport: &mut T,
        payload_len: usize,
        shift: &mut dyn FnMut(&mut dyn ShiftStream) -> io::Result<()>,
    ) -> io::Result<()>;
}

fn check_request(count: usize, consumed: usize, total: usize) -> io::Result<()> {
    if count > CHUNK_PAYLOAD {
        return Err(io::Error::new(
            ErrorKind::InvalidInput,
            format!("cannot wait for {} bytes, a chunk has at most {}", count, CHUNK_PAYLOAD),
        ));
    }
    if consumed + count > total {
        return Err(io::Error::new(
            ErrorKind::InvalidInput,
            format!(
                "payload has {} bytes, {} consumed, {} more requested",
                total, consumed, count
            ),
        ));
    }
    Ok(())
}

fn flush_samples(writer: &mut impl Write, samples: &[u8]) -> io::Result<()> {
    debug_assert!(samples.len() <= lane_bytes(CHUNK_BITS));
    writer.write_all(samples)?;
    writer.flush()
}

/// Reads every chunk synchronously from the transport.
#[derive(Copy, Clone, Debug, Default)]
pub struct Inline;

struct InlineStream<'a, R, W> {
    reader: &'a mut R,
    writer: &'a mut W,
    consumed: usize,
    total: usize,
    chunk: [u8; CHUNK_PAYLOAD],
}

impl<R: Read, W: Write> ShiftStream for InlineStream<'_, R, W> {
    fn wait_for(&mut self, count: usize) -> io::Result<&[u8]> {
        check_request(count, self.consumed, self.total)?;
        self.reader.read_exact(&mut self.chunk[..count])?;
        self.consumed += count;
        Ok(&self.chunk[..count])
    }

    fn flush(&mut self, samples: &[u8]) -> io::Result<()> {
        flush_samples(self.writer, samples)
    }
}

impl Strategy for Inline {
    const NAME: &'static str = "inline";

    fn transfer<T: Transport>(
        transport: &mut T,
        payload_len: usize,
        shift: &mut dyn FnMut(&mut dyn ShiftStream) -> io::Result<()>,
    ) -> io::Result<()> {
        let (reader, writer) = transport.split();
        let mut stream = InlineStream {
            reader,
            writer,
            consumed: 0,
            total: payload_len,
            chunk: [0u8; CHUNK_PAYLOAD],
        };
        shift(&mut stream)
    }
}

/// Receives the payload on a background thread while the engine clocks.
///
/// The receiver only appends to the shared buffer and the engine only takes
/// bytes that have already arrived, removing them as it goes. The buffer holds
/// what was received but not yet clocked, which is the rest of the payload at
/// worst. Samples are written by the engine itself, so a chunk is on its way
/// before the next chunk is clocked.
///
/// The receiver always runs until the full payload has arrived or the transport
/// fails, even if the engine gives up earlier.
#[derive(Copy, Clone, Debug, Default)]
pub struct Background;

#[derive(Default)]
struct Received {
    data: Vec<u8>,
    error: Option<(ErrorKind, String)>,
}

#[derive(Default)]
struct Mailbox {
    received: Mutex<Received>,
    arrived: Condvar,
}

impl Mailbox {
    fn with_capacity(capacity: usize) -> Mailbox {
        Mailbox {
            received: Mutex::new(Received {
                data: Vec::with_capacity(capacity),
                error: None,
            }),
            arrived: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Received> {
        self.received.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fail(&self, error: &io::Error) {
        self.lock().error = Some((error.kind(), error.to_string()));
        self.arrived.notify_all();
    }
}

const RECEIVE_BLOCK: usize = 64;

fn receive(reader: &mut impl Read, total: usize, mailbox: &Mailbox) {
    let mut block = [0u8; RECEIVE_BLOCK];
    let mut pending = total;
    while pending > 0 {
        let wanted = pending.min(block.len());
        match reader.read(&mut block[..wanted]) {
            Ok(0) => {
                log::error!("Stream ended with {} payload bytes outstanding", pending);
                mailbox.fail(&io::Error::from(ErrorKind::UnexpectedEof));
                return;
            }
            Ok(n) => {
                mailbox.lock().data.extend_from_slice(&block[..n]);
                mailbox.arrived.notify_all();
                pending -= n;
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => {
                log::error!("Payload reception failed: {}", e);
                mailbox.fail(&e);
                return;
            }
        }
    }
    log::trace!("Received all {} payload bytes", total);
}

struct BackgroundStream<'a, W> {
    mailbox: &'a Mailbox,
    writer: &'a mut W,
    consumed: usize,
    total: usize,
    chunk: [u8; CHUNK_PAYLOAD],
}

impl<W: Write> ShiftStream for BackgroundStream<'_, W> {
    fn wait_for(&mut self, count: usize) -> io::Result<&[u8]> {
        check_request(count, self.consumed, self.total)?;
        let mut received = self.mailbox.lock();
        while received.data.len() < count {
            if let Some((kind, message)) = &received.error {
                return Err(io::Error::new(*kind, message.clone()));
            }
            received = self
                .mailbox
                .arrived
                .wait(received)
                .unwrap_or_else(PoisonError::into_inner);
        }
        self.chunk[..count].copy_from_slice(&received.data[..count]);
        received.data.drain(..count);
        drop(received);
        self.consumed += count;
        Ok(&self.chunk[..count])
    }

    fn flush(&mut self, samples: &[u8]) -> io::Result<()> {
        flush_samples(self.writer, samples)
    }
}

impl Strategy for Background {
    const NAME: &'static str = "background";

    fn transfer<T: Transport>(
        transport: &mut T,
        payload_len: usize,
        shift: &mut dyn FnMut(&mut dyn ShiftStream) -> io::Result<()>,
    ) -> io::Result<()> {
        let (reader, writer) = transport.split();
        let mailbox = Mailbox::with_capacity(payload_len);
        thread::scope(|scope| {
            scope.spawn(|| receive(reader, payload_len, &mailbox));
            let mut stream = BackgroundStream {
                mailbox: &mailbox,
                writer,
                consumed: 0,
                total: payload_len,
                chunk: [0u8; CHUNK_PAYLOAD],
            };
            shift(&mut stream)
        })
    }
}

#[cfg(test)]
mod test {
    use super::{Background, BackgroundStream, CHUNK_PAYLOAD, Inline, Mailbox, ShiftStream, Strategy};
    use crate::transport::Link;
    use std::io::{self, Cursor, ErrorKind, Read};

    /// Drains the stream in the given steps, echoing the first half of every chunk back inverted.
    fn drain<S: Strategy>(input: Vec<u8>, payload_len: usize, steps: &[usize]) -> io::Result<(Vec<u8>, Vec<u8>)> {
        let mut link = Link::new(Cursor::new(input), Vec::new(), 115_200);
        let mut seen = Vec::new();
        let mut flushed = Vec::new();
        S::transfer(&mut link, payload_len, &mut |stream: &mut dyn ShiftStream| {
            for &count in steps {
                let data = stream.wait_for(count)?.to_vec();
                seen.extend_from_slice(&data);
                // a chunk answers with at most one byte per lane byte
                let inverted: Vec<u8> = data.iter().take(count.div_ceil(2)).map(|b| !b).collect();
                stream.flush(&inverted)?;
                flushed.extend_from_slice(&inverted);
            }
            Ok(())
        })?;
        let (mut reader, writer) = link.into_parts();
        let mut rest = Vec::new();
        reader.read_to_end(&mut rest)?;
        assert_eq!(writer, flushed);
        Ok((seen, rest))
    }

    fn consumes_in_order<S: Strategy>() {
        let input: Vec<u8> = (0..10).collect();
        let (seen, rest) = drain::<S>(input, 6, &[4, 2]).unwrap();
        assert_eq!(seen, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(rest, vec![6, 7, 8, 9]);
    }

    fn refuses_to_read_past_payload<S: Strategy>() {
        let input: Vec<u8> = (0..10).collect();
        match drain::<S>(input, 4, &[4, 2]) {
            Err(e) => assert_eq!(e.kind(), ErrorKind::InvalidInput),
            Ok(_) => panic!("expected over-read to fail"),
        }
    }

    fn reports_short_payload<S: Strategy>() {
        match drain::<S>(vec![1, 2, 3], 4, &[4]) {
            Err(e) => assert_eq!(e.kind(), ErrorKind::UnexpectedEof),
            Ok(_) => panic!("expected a truncated payload to fail"),
        }
    }

    #[test]
    fn inline_consumes_in_order() {
        consumes_in_order::<Inline>();
    }

    #[test]
    fn background_consumes_in_order() {
        consumes_in_order::<Background>();
    }

    #[test]
    fn inline_refuses_to_read_past_payload() {
        refuses_to_read_past_payload::<Inline>();
    }

    #[test]
    fn background_refuses_to_read_past_payload() {
        refuses_to_read_past_payload::<Background>();
    }

    #[test]
    fn inline_reports_short_payload() {
        reports_short_payload::<Inline>();
    }

    #[test]
    fn background_reports_short_payload() {
        reports_short_payload::<Background>();
    }

    #[test]
    fn background_buffer_releases_consumed_bytes() {
        let mailbox = Mailbox::with_capacity(8);
        mailbox.lock().data.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let mut writer = Vec::new();
        let mut stream = BackgroundStream {
            mailbox: &mailbox,
            writer: &mut writer,
            consumed: 0,
            total: 8,
            chunk: [0u8; CHUNK_PAYLOAD],
        };
        assert_eq!(stream.wait_for(4).unwrap(), &[1, 2, 3, 4]);
        assert_eq!(mailbox.lock().data, vec![5, 6, 7, 8]);
        assert_eq!(stream.wait_for(4).unwrap(), &[5, 6, 7, 8]);
        assert!(mailbox.lock().data.is_empty());
    }

    #[test]
    fn chunk_size_is_bounded() {
        let mut link = Link::new(Cursor::new(vec![0u8; 8]), Vec::new(), 115_200);
        let result = Inline::transfer(&mut link, 8, &mut |stream: &mut dyn ShiftStream| {
            stream.wait_for(5).map(|_| ())
        });
        assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidInput);
    }
}
