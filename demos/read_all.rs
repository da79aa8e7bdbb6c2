//! Polls every register the station exposes and prints the snapshot.
//!
//! Usage: `cargo run --example read_all -- 192.168.1.100`

use std::net::Ipv4Addr;

use log::LevelFilter;

use alfen_eve::{Client, ClientConfig, RegisterClass};

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
        .level(LevelFilter::Debug)
        .chain(std::io::stdout())
        .apply()
        .expect("logger init");

    let ip: Ipv4Addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "192.168.1.100".to_string())
        .parse()
        .expect("station IP address");

    let mut client = Client::new(ClientConfig::new(ip));

    let snapshot = client.read_all(RegisterClass::Holding)?;
    println!("{} fields read:", snapshot.len());
    for (name, value) in &snapshot {
        let desc = client.catalog().lookup(name)?;
        if desc.unit.is_empty() {
            println!("  {name} = {value}");
        } else {
            println!("  {name} = {value} {}", desc.unit);
        }
    }

    Ok(())
}
