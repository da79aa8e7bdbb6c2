//! Pauses charging on a station, then reads the setpoint back.
//!
//! Usage: `cargo run --example pause_charging -- 192.168.1.100`

use std::net::Ipv4Addr;

use log::LevelFilter;

use alfen_eve::{Client, ClientConfig};

fn main() -> alfen_eve::Result<()> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(LevelFilter::Info)
        .chain(std::io::stdout())
        .apply()
        .expect("logger init");

    let ip: Ipv4Addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "192.168.1.100".to_string())
        .parse()
        .expect("station IP address");

    let mut client = Client::new(ClientConfig::new(ip));

    client.pause_charging()?;

    match client.read("modbus_slave_max_current")? {
        Some(amps) => println!("socket max current now {amps} A"),
        None => println!("socket max current not readable"),
    }

    Ok(())
}
