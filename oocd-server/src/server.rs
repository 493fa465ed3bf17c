use std::net::{TcpListener, TcpStream, ToSocketAddrs};

use oocd_protocol::{BIT_SEQUENCES_LIMIT, error::ReadError};

use crate::{
    board::Board,
    delay::{DelayFunc, SpinDelay},
    device::{Device, SessionEnd},
    engine::TapEngine,
    lines::TapLines,
    stream::{Inline, Strategy},
    transport::Link,
};

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Config {
    /// Upper bound for the bit-pairs of a single shift. Larger requests are clamped.
    pub bit_sequence_limit: u16,
    /// Half-cycle delay in effect at the start of every session
    pub default_delay: u16,
    pub normal_baud_rate: u32,
    pub fast_baud_rate: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bit_sequence_limit: BIT_SEQUENCES_LIMIT,
            default_delay: 1,
            normal_baud_rate: 115_200,
            fast_baud_rate: 1_000_000,
        }
    }
}

/// Serves a [`Device`] to OpenOCD over TCP, one client at a time.
#[derive(Debug)]
pub struct Server<L, B, D = SpinDelay, S = Inline> {
    device: Device<L, B, D, S>,
}

/// Builder to create a [Server] instance and modify configuration options
///
/// # Example
///
/// ```ignore
/// use oocd_server::server::Builder;
/// use oocd_server::{Background, TapEngine};
///
/// let server = Builder::new()
///     .bit_sequence_limit(0x1000)
///     .default_delay(4)
///     .build::<_, _, _, Background>(TapEngine::with_lines(my_lines), my_board);
/// ```
#[derive(Default)]
pub struct Builder {
    config: Config,
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }

    /// Set the highest number of bit-pairs a single shift may carry.
    pub fn bit_sequence_limit(mut self, limit: u16) -> Self {
        self.config.bit_sequence_limit = limit;
        self
    }

    /// Set the half-cycle delay every session starts with
    pub fn default_delay(mut self, delay: u16) -> Self {
        self.config.default_delay = delay;
        self
    }

    pub fn normal_baud_rate(mut self, baud_rate: u32) -> Self {
        self.config.normal_baud_rate = baud_rate;
        self
    }

    pub fn fast_baud_rate(mut self, baud_rate: u32) -> Self {
        self.config.fast_baud_rate = baud_rate;
        self
    }

    /// Build and return the server
    pub fn build<L: TapLines, B: Board, D: DelayFunc, S: Strategy>(
        self,
        engine: TapEngine<L, D>,
        board: B,
    ) -> Server<L, B, D, S> {
        Server::new(engine, board, self.config)
    }
}

impl<L: TapLines, B: Board, D: DelayFunc, S: Strategy> Server<L, B, D, S> {
    pub fn new(engine: TapEngine<L, D>, board: B, config: Config) -> Server<L, B, D, S> {
        Server {
            device: Device::new(engine, board, config),
        }
    }

    pub fn listen(&mut self, addr: impl ToSocketAddrs) -> Result<(), Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr)?;
        log::info!("Server listening on {}", listener.local_addr()?);
        self.serve(listener)
    }

    /// Accepts clients on an already bound `listener` and serves them one after another.
    pub fn serve(&mut self, listener: TcpListener) -> Result<(), Box<dyn std::error::Error>> {
        for stream in listener.incoming() {
            match stream {
                Ok(tcp) => {
                    let peer_addr = tcp.peer_addr().ok();
                    if let Some(addr) = peer_addr {
                        log::info!("New client connection from {}", addr);
                    }
                    match self.handle_client(tcp) {
                        Ok(SessionEnd::Exit) => log::info!("Client left OpenOCD mode"),
                        Ok(SessionEnd::Disconnected) => log::info!("Client disconnected"),
                        Err(e) => log::error!("Client error: {}", e),
                    }
                }
                Err(e) => log::error!("Connection error: {}", e),
            }
        }
        Ok(())
    }

    fn handle_client(&mut self, tcp: TcpStream) -> Result<SessionEnd, ReadError> {
        tcp.set_nodelay(true)?;
        let mut link = Link::tcp(tcp, self.device.config().normal_baud_rate)?;
        self.device.run_session(&mut link)
    }
}
