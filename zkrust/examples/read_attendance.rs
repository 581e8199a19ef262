//! Dump users and stored attendance records

use zkrust::Device;

#[tokio::main]
async fn main() -> zkrust::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let ip = std::env::var("DEVICE_IP").unwrap_or_else(|_| "192.168.1.201".to_string());

    let device = Device::new(ip, zkrust_core::DEFAULT_PORT);
    device.connect().await?;

    let info = device.get_device_info().await?;
    println!("{}", info);

    let users = device.get_users().await?;
    println!("{} users", users.len());
    for user in &users {
        println!("  {:>9}  {}", user.user_id, user.name);
    }

    let result = device
        .get_attendances_with_progress(|done, total| {
            eprint!("\rReading attendance {}/{} bytes", done, total)
        })
        .await;
    eprintln!();

    match result {
        Ok(records) => {
            for record in records {
                println!("{:>9}  {}  punch={}", record.user_id, record.timestamp, record.punch);
            }
        }
        Err(zkrust::Error::Incomplete(e)) => {
            eprintln!("Read stopped after {} of {} bytes: {}", e.partial.len(), e.total, e.error);
        }
        Err(e) => return Err(e),
    }

    device.disconnect().await?;

    Ok(())
}
