//! Console walkthrough against a real controller: connect, list the devices
//! it announces, then toggle the first dimmable one.
//!
//!     cargo run --example control -- 192.168.1.40 23

use std::env;
use std::process;
use std::time::Duration;

use deako_local::{ControllerEndpoint, DeakoClient, StaticAddresses};

#[tokio::main]
async fn main() -> deako_local::Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = env::args().skip(1);
    let Some(host) = args.next() else {
        eprintln!("usage: control <host> [port]");
        process::exit(2);
    };
    let port = args.next().and_then(|p| p.parse().ok()).unwrap_or(23);

    let source = StaticAddresses::single(ControllerEndpoint::new(host, port, "deako-bridge"));
    let client = DeakoClient::new(source, "deako-local-demo");
    client.connect().await?;

    let mut events = client.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            println!("  event: {event:?}");
        }
    });

    let devices = client.find_devices(Duration::from_secs(5)).await?;
    println!("{} device(s):", devices.len());
    for device in &devices {
        println!(
            "  {}  {:<20} power={} dim={:?} [{}]",
            device.uuid,
            device.name,
            device.state.power,
            device.state.dim,
            device.capabilities.join("+"),
        );
    }

    if let Some(device) = devices.iter().find(|d| d.has_capability("dim")) {
        println!("toggling {}", device.name);
        client
            .set_device_state(&device.uuid, !device.state.power, Some(50))
            .await?;
        tokio::time::sleep(Duration::from_secs(2)).await;
        client
            .set_device_state(&device.uuid, device.state.power, device.state.dim)
            .await?;
    }

    client.close().await;
    Ok(())
}
