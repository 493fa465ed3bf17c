//! # Simulated OpenOCD adapter
//!
//! Serves the bit-bang adapter protocol over TCP with simulated hardware behind it.
//! The simulated target is a chain of bypass registers between TDI and TDO, so every
//! shift returns its TDI bits delayed by one clock per register.
use std::error::Error;
use std::net::{IpAddr, SocketAddr};

use clap::{Parser, ValueEnum};
use clap_num::maybe_hex;
use env_logger::Env;
use oocd_protocol::AdcReadings;
use oocd_server::{
    Background, Inline, Strategy, TapEngine,
    server::Builder,
    sim::{SimulatedBoard, SimulatedLines},
};

/// Raw readings of a board powered from USB with both regulators on
const SIMULATED_READINGS: AdcReadings = AdcReadings::new([0x0000, 0x0000, 0x0289, 0x03E0]);

#[derive(ValueEnum, Copy, Clone, Debug, Eq, PartialEq)]
enum StrategyArg {
    /// Read each chunk right before it is clocked
    Inline,
    /// Receive the payload on a separate thread while clocking
    Background,
}

#[derive(Parser)]
#[command(about = "Simulated OpenOCD bit-bang JTAG adapter", long_about=None)]
struct Args {
    #[arg(short, long, default_value = "4444")]
    port: u16,

    #[arg(short, long, default_value = "127.0.0.1")]
    ip: IpAddr,

    #[arg(short, long, value_enum, default_value = "inline")]
    strategy: StrategyArg,

    #[arg(
        short,
        long,
        help = "Number of bypass registers between TDI and TDO, 0 wires TDO to TDI",
        default_value = "1"
    )]
    bypass: usize,

    #[arg(
        short,
        long,
        help = "Highest number of bit-pairs per shift",
        default_value = "0x2000",
        value_parser = maybe_hex::<u16>
    )]
    limit: u16,

    #[arg(short, long, help = "Half-cycle delay at session start", default_value = "1")]
    delay: u16,

    #[arg(long, help = "Simulate an adapter without a TRST line")]
    no_trst: bool,
}

fn serve<S: Strategy, const TRST: bool>(
    addr: SocketAddr,
    bypass: usize,
    builder: Builder,
) -> Result<(), Box<dyn Error>> {
    log::info!(
        "Simulating {} bypass register(s), TRST {}, {} shifts",
        bypass,
        if TRST { "present" } else { "absent" },
        S::NAME
    );
    let engine = TapEngine::with_lines(SimulatedLines::<TRST>::with_bypass(bypass));
    let mut server = builder.build::<_, _, _, S>(engine, SimulatedBoard::new(SIMULATED_READINGS));
    server.listen(addr)
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    log::info!("Starting simulated OpenOCD adapter");

    let args = Args::parse();
    log::debug!("Parsed arguments: ip={}, port={}", args.ip, args.port);

    log::debug!(
        "Server config: bit_sequence_limit={}, default_delay={}",
        args.limit,
        args.delay
    );
    let builder = Builder::new()
        .bit_sequence_limit(args.limit)
        .default_delay(args.delay);

    let addr = SocketAddr::new(args.ip, args.port);
    log::info!("Binding to address: {}", addr);

    match (args.strategy, args.no_trst) {
        (StrategyArg::Inline, false) => serve::<Inline, true>(addr, args.bypass, builder),
        (StrategyArg::Inline, true) => serve::<Inline, false>(addr, args.bypass, builder),
        (StrategyArg::Background, false) => serve::<Background, true>(addr, args.bypass, builder),
        (StrategyArg::Background, true) => serve::<Background, false>(addr, args.bypass, builder),
    }
}
