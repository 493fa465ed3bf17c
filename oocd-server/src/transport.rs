//! The byte stream between host and adapter.
use std::{
    io::{self, Read, Write},
    net::TcpStream,
};

use oocd_protocol::Reply;

/// A lossless, in-order byte stream with a configurable baud rate.
///
/// The stream can be split into a reading and a writing half so that reception can
/// run on a separate path while the shift engine transmits samples.
pub trait Transport {
    type Reader: Read + Send;
    type Writer: Write + Send;

    fn split(&mut self) -> (&mut Self::Reader, &mut Self::Writer);

    fn set_baud_rate(&mut self, baud_rate: u32) -> io::Result<()>;

    /// Writes a complete reply frame and flushes it.
    fn send(&mut self, reply: &Reply) -> io::Result<()> {
        let (_, writer) = self.split();
        reply.write_to(writer)?;
        writer.flush()
    }
}

/// A transport assembled from independent reader and writer halves.
///
/// The baud rate is only recorded, which fits streams that have no line rate
/// (sockets, pipes, in-memory buffers).
#[derive(Debug)]
pub struct Link<R, W> {
    reader: R,
    writer: W,
    baud_rate: u32,
}

impl<R: Read + Send, W: Write + Send> Link<R, W> {
    pub fn new(reader: R, writer: W, baud_rate: u32) -> Link<R, W> {
        Link {
            reader,
            writer,
            baud_rate,
        }
    }

    /// The most recently configured baud rate
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn into_parts(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

impl Link<TcpStream, TcpStream> {
    pub fn tcp(stream: TcpStream, baud_rate: u32) -> io::Result<Link<TcpStream, TcpStream>> {
        let reader = stream.try_clone()?;
        Ok(Link::new(reader, stream, baud_rate))
    }
}

impl<R: Read + Send, W: Write + Send> Transport for Link<R, W> {
    type Reader = R;
    type Writer = W;

    fn split(&mut self) -> (&mut R, &mut W) {
        (&mut self.reader, &mut self.writer)
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> io::Result<()> {
        log::info!("Switching link from {} to {} baud", self.baud_rate, baud_rate);
        self.baud_rate = baud_rate;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{Link, Transport};
    use oocd_protocol::Reply;
    use std::io::Cursor;

    #[test]
    fn send_writes_complete_frame() {
        let mut link = Link::new(Cursor::new(Vec::new()), Vec::new(), 115_200);
        link.send(&Reply::ShiftAck { bit_count: 0x0102 }).unwrap();
        link.send(&Reply::Unknown).unwrap();
        assert_eq!(link.writer(), &vec![0x05, 0x01, 0x02, 0x00]);
    }

    #[test]
    fn baud_rate_is_recorded() {
        let mut link = Link::new(Cursor::new(Vec::new()), Vec::new(), 115_200);
        link.set_baud_rate(1_000_000).unwrap();
        assert_eq!(link.baud_rate(), 1_000_000);
    }
}
