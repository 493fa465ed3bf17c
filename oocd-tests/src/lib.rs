//! Helpers to run a simulated adapter on a loopback port.
use std::{
    net::{Ipv4Addr, SocketAddr, TcpListener},
    thread,
};

use oocd_client::OcdClient;
use oocd_protocol::AdcReadings;
use oocd_server::{
    Strategy, TapEngine,
    server::{Config, Server},
    sim::{SimulatedBoard, SimulatedLines},
};

pub const READINGS: AdcReadings = AdcReadings::new([0x0FFF, 0x0800, 0x0289, 0x03E0]);

/// A running simulated adapter and handles to inspect its hardware
pub struct Harness {
    pub addr: SocketAddr,
    pub lines: SimulatedLines,
    pub board: SimulatedBoard,
}

impl Harness {
    /// Starts a server with `bypass` bypass registers on a free port.
    pub fn start<S: Strategy + Send + 'static>(bypass: usize, config: Config) -> Harness {
        let _ = env_logger::builder().is_test(true).try_init();

        let lines = SimulatedLines::new(bypass);
        let board = SimulatedBoard::new(READINGS);
        let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
            .expect("Binding to a free port shouldn't fail");
        let addr = listener.local_addr().expect("Bound listener has an address");

        let mut server: Server<_, _, _, S> =
            Server::new(TapEngine::with_lines(lines.clone()), board.clone(), config);
        thread::spawn(move || {
            if let Err(e) = server.serve(listener) {
                log::error!("Test server failed: {}", e);
            }
        });
        Harness { addr, lines, board }
    }

    pub fn connect(&self) -> OcdClient {
        OcdClient::connect(self.addr).expect("Simulated adapter should accept connections")
    }
}
