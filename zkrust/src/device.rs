//! High-level device interface

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use zkrust_core::{Command, ProtocolConfig};
use zkrust_protocol::{BulkRequest, Connection, Reply};
use zkrust_transport::TcpTransport;
use zkrust_types::{
    Attendance, Capacity, DeviceInfo, FixedWidthRecord, RealTimeLog, User, decode_records,
    record::c_string, time,
};

use crate::error::{Error, Result};

/// ZKTeco device
///
/// High-level interface for communicating with ZKTeco biometric devices.
///
/// # Examples
///
/// ```no_run
/// use zkrust::Device;
///
/// #[tokio::main]
/// async fn main() -> zkrust::Result<()> {
///     let device = Device::new("192.168.1.201", 4370);
///
///     device.connect().await?;
///     println!("Connected!");
///
///     let info = device.get_device_info().await?;
///     println!("Device: {}", info);
///
///     device.disconnect().await?;
///     Ok(())
/// }
/// ```
pub struct Device {
    ip: String,
    port: u16,
    config: ProtocolConfig,
    connection: Connection,
    password: u32, // CommKey password (default: 0)
}

impl Device {
    /// Create a new device instance (TCP transport)
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self::build(ip.into(), port, ProtocolConfig::default(), 0)
    }

    /// Set command timeout
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let config = self.config.clone().with_command_timeout(timeout);
        self.with_config(config)
    }

    /// Set CommKey password (default: 0)
    pub fn with_password(mut self, password: u32) -> Self {
        self.password = password;
        self
    }

    /// Replace the whole protocol configuration
    pub fn with_config(self, config: ProtocolConfig) -> Self {
        Self::build(self.ip, self.port, config, self.password)
    }

    fn build(ip: String, port: u16, config: ProtocolConfig, password: u32) -> Self {
        let transport = TcpTransport::new(ip.clone(), port)
            .with_connect_timeout(config.connect_timeout)
            .with_sync_marker(config.sync_marker);

        Self {
            ip,
            port,
            connection: Connection::new(Arc::new(transport), config.clone()),
            config,
            password,
        }
    }

    /// The underlying protocol connection
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Connect to device
    ///
    /// Devices that answer `CMD_ACK_UNAUTH` get the CommKey password set
    /// with [`with_password`](Self::with_password).
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Network connection fails
    /// - Device doesn't respond
    /// - Authentication is required and the password is refused
    pub async fn connect(&self) -> Result<()> {
        let reply = self.connection.connect().await?;

        if reply.command() == Some(Command::AckUnauth) {
            info!("Device requires authentication, sending password...");
            self.connection.authenticate_commkey(self.password).await?;
        }

        Ok(())
    }

    /// Connect and authenticate with a password digest
    pub async fn connect_with_auth(&self, password: &str) -> Result<()> {
        self.connection.connect_with_auth(password).await?;
        Ok(())
    }

    /// Disconnect from device
    pub async fn disconnect(&self) -> Result<()> {
        self.connection.disconnect().await?;
        Ok(())
    }

    /// Get device information
    ///
    /// Firmware version is required; clock and storage counters are filled
    /// in when the device answers them.
    pub async fn get_device_info(&self) -> Result<DeviceInfo> {
        self.ensure_connected()?;

        debug!("Getting device info...");

        let version = self.command(Command::GetVersion, &[]).await?;
        let mut info = DeviceInfo::new(c_string(&version.payload));

        match self.get_time().await {
            Ok(time) => info = info.with_device_time(time),
            Err(e) => debug!(error = %e, "Device time unavailable"),
        }

        match self.command(Command::GetFreeSizes, &[]).await {
            Ok(reply) => match Capacity::decode(&reply.payload) {
                Ok(capacity) => info = info.with_capacity(capacity),
                Err(e) => debug!(error = %e, "Capacity unavailable"),
            },
            Err(e) => debug!(error = %e, "Capacity unavailable"),
        }

        debug!("Device info: {}", info);

        Ok(info)
    }

    /// Read the device clock
    pub async fn get_time(&self) -> Result<NaiveDateTime> {
        self.ensure_connected()?;

        let reply = self.command(Command::GetTime, &[]).await?;
        let raw = reply
            .payload
            .get(..4)
            .ok_or(zkrust_types::Error::RecordTooShort {
                record: "device time",
                expected: 4,
                actual: reply.payload.len(),
            })?;

        Ok(time::decode_packed(u32::from_le_bytes([
            raw[0], raw[1], raw[2], raw[3],
        ]))?)
    }

    /// Set the device clock
    pub async fn set_time(&self, at: NaiveDateTime) -> Result<()> {
        self.ensure_connected()?;

        self.command(Command::SetTime, &time::encode_packed(&at).to_le_bytes())
            .await?;
        Ok(())
    }

    /// Enable device (normal operation mode)
    pub async fn enable_device(&self) -> Result<()> {
        self.ensure_connected()?;

        debug!("Enabling device...");
        self.command(Command::EnableDevice, &[]).await?;
        Ok(())
    }

    /// Disable device (show "Working..." on LCD)
    pub async fn disable_device(&self) -> Result<()> {
        self.ensure_connected()?;

        debug!("Disabling device...");
        self.command(Command::DisableDevice, &[]).await?;
        Ok(())
    }

    /// Restart device; the connection is closed afterwards
    pub async fn restart(&self) -> Result<()> {
        self.ensure_connected()?;

        warn!("Restarting device...");
        self.command(Command::Restart, &[]).await?;
        self.connection.disconnect().await?;
        Ok(())
    }

    /// Power off device; the connection is closed afterwards
    pub async fn power_off(&self) -> Result<()> {
        self.ensure_connected()?;

        warn!("Powering off device...");
        self.command(Command::PowerOff, &[]).await?;
        self.connection.disconnect().await?;
        Ok(())
    }

    /// All enrolled users
    pub async fn get_users(&self) -> Result<Vec<User>> {
        self.get_users_with_progress(|_, _| {}).await
    }

    /// [`get_users`](Self::get_users) reporting `(bytes_so_far, total)`
    pub async fn get_users_with_progress<F>(&self, progress: F) -> Result<Vec<User>>
    where
        F: FnMut(usize, usize) + Send,
    {
        self.read_records(BulkRequest::users(), progress).await
    }

    /// All stored attendance records
    pub async fn get_attendances(&self) -> Result<Vec<Attendance>> {
        self.get_attendances_with_progress(|_, _| {}).await
    }

    /// [`get_attendances`](Self::get_attendances) reporting `(bytes_so_far, total)`
    pub async fn get_attendances_with_progress<F>(&self, progress: F) -> Result<Vec<Attendance>>
    where
        F: FnMut(usize, usize) + Send,
    {
        self.read_records(BulkRequest::attendance(), progress).await
    }

    /// Delete every stored attendance record
    pub async fn clear_attendances(&self) -> Result<()> {
        self.ensure_connected()?;

        warn!("Clearing attendance log...");
        self.command(Command::ClearAttLog, &[]).await?;
        Ok(())
    }

    /// Deliver every live punch to `callback` until disconnect
    ///
    /// Returns `false` if a callback was already registered.
    pub async fn on_realtime_log<F>(&self, callback: F) -> Result<bool>
    where
        F: FnMut(RealTimeLog) + Send + 'static,
    {
        self.ensure_connected()?;
        Ok(self.connection.subscribe(callback).await?)
    }

    // Helper methods

    fn ensure_connected(&self) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        Ok(())
    }

    async fn command(&self, command: Command, payload: &[u8]) -> Result<zkrust_core::Packet> {
        let reply = self
            .connection
            .execute(command, payload)
            .await?
            .ensure_ok(command)?;
        Ok(reply)
    }

    /// Disable, read, and re-enable the device even if the read failed
    async fn read_records<R, F>(&self, request: BulkRequest, progress: F) -> Result<Vec<R>>
    where
        R: FixedWidthRecord,
        F: FnMut(usize, usize) + Send,
    {
        self.ensure_connected()?;
        self.disable_device().await?;

        let read = self
            .connection
            .read_with_buffer_progress(&request, progress)
            .await;

        if let Err(e) = self.enable_device().await {
            warn!(error = %e, "Failed to re-enable device");
        }

        let buffer = read?;
        let records = decode_records::<R>(&buffer)?;

        debug!(count = records.len(), record = R::NAME, "Records read");
        Ok(records)
    }
}
