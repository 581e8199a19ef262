//! Print live punches for a while

use std::time::Duration;

use tokio::time::sleep;
use zkrust::Device;

#[tokio::main]
async fn main() -> zkrust::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let ip = std::env::var("DEVICE_IP").unwrap_or_else(|_| "192.168.1.201".to_string());
    let seconds = std::env::var("LISTEN_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(60);

    let device = Device::new(ip, zkrust_core::DEFAULT_PORT);
    device.connect().await?;

    device
        .on_realtime_log(|log| {
            println!("{}  user {}  state={}", log.timestamp, log.user_id, log.state);
        })
        .await?;

    println!("Listening for {} seconds...", seconds);
    sleep(Duration::from_secs(seconds)).await;

    device.disconnect().await?;

    Ok(())
}
