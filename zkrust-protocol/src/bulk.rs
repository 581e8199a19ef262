//! Bulk transfer
//!
//! Payloads larger than one frame move in rounds:
//!
//! 1. `CMD_DATA_WRRQ` names what to read. The device either answers with
//!    the data inline (`CMD_DATA`) or announces a total size
//!    (`CMD_ACK_OK` / `CMD_PREPARE_DATA`, size at payload offset 1).
//! 2. One `CMD_DATA_RDY` per chunk, all sent up front.
//! 3. `CMD_DATA` frames are accumulated until every chunk arrived.
//! 4. `CMD_FREE_DATA` releases the device buffer, whatever happened.
//!
//! Writes go the other way: `CMD_PREPARE_DATA` with the size, then one
//! acknowledged `CMD_DATA` per chunk.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::{debug, trace, warn};

use zkrust_core::{Command, Packet, constants::data_types};
use zkrust_transport::Error as TransportError;

use crate::connection::{Connection, Reply};
use crate::error::{Error, Incomplete};

/// Result of a bulk transfer
pub type BulkResult<T> = std::result::Result<T, Incomplete>;

/// What a bulk read asks the device for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkRequest {
    pub command: Command,
    pub fct: u32,
    pub ext: u32,
}

impl BulkRequest {
    pub const ENCODED_SIZE: usize = 11;

    pub const fn new(command: Command, fct: u32, ext: u32) -> Self {
        Self { command, fct, ext }
    }

    /// All enrolled users (72-byte records)
    pub const fn users() -> Self {
        Self::new(Command::UserTempRrq, data_types::FCT_USER, 0)
    }

    /// All stored attendance records (40-byte records)
    pub const fn attendance() -> Self {
        Self::new(Command::AttLogRrq, 0, 0)
    }

    /// Fingerprint templates
    pub const fn templates() -> Self {
        Self::new(Command::UserTempRrq, data_types::FCT_FINGERTMP, 0)
    }

    /// `0x01`, command, fct, ext (little-endian)
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::ENCODED_SIZE);
        buf.put_u8(1);
        buf.put_u16_le(self.command.into());
        buf.put_u32_le(self.fct);
        buf.put_u32_le(self.ext);
        buf.freeze()
    }
}

/// How a declared size splits into chunk requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    total: usize,
    chunk_size: usize,
}

impl ChunkPlan {
    pub fn new(total: usize, chunk_size: usize) -> Self {
        Self {
            total,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Number of full-size chunks
    pub fn chunk_count(&self) -> usize {
        self.total / self.chunk_size
    }

    pub fn remainder(&self) -> usize {
        self.total % self.chunk_size
    }

    /// Chunk requests including the short last one
    pub fn total_packets(&self) -> usize {
        self.chunk_count() + usize::from(self.remainder() > 0)
    }

    /// `(offset, size)` of every request, ascending
    pub fn requests(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let full = (0..self.chunk_count()).map(|i| (i * self.chunk_size, self.chunk_size));
        let last = (self.remainder() > 0).then(|| (self.chunk_count() * self.chunk_size, self.remainder()));
        full.chain(last)
    }
}

/// `CMD_DATA_RDY` payload: start and size, both `u32` little-endian
fn chunk_request(start: usize, size: usize) -> [u8; 8] {
    let mut payload = [0u8; 8];
    payload[..4].copy_from_slice(&(start as u32).to_le_bytes());
    payload[4..].copy_from_slice(&(size as u32).to_le_bytes());
    payload
}

impl Connection {
    /// Read a payload of any size
    ///
    /// The raw reassembled bytes are returned; stored records start with a
    /// 4-byte size header (see `zkrust_types::decode_records`).
    pub async fn read_with_buffer(&self, request: &BulkRequest) -> BulkResult<Bytes> {
        self.read_with_buffer_progress(request, |_, _| {}).await
    }

    /// [`read_with_buffer`](Self::read_with_buffer) reporting
    /// `(bytes_so_far, total)` after every received chunk
    pub async fn read_with_buffer_progress<F>(
        &self,
        request: &BulkRequest,
        mut progress: F,
    ) -> BulkResult<Bytes>
    where
        F: FnMut(usize, usize) + Send,
    {
        let _exchange = self.exchange.lock().await;

        debug!(command = %request.command, fct = request.fct, "Bulk read");

        let result = self.read_locked(request, &mut progress).await;
        self.free_data().await;

        match &result {
            Ok(data) => debug!(len = data.len(), "Bulk read complete"),
            Err(e) => warn!(
                received = e.partial.len(),
                total = e.total,
                error = %e.error,
                "Bulk read incomplete"
            ),
        }

        result
    }

    async fn read_locked<F>(&self, request: &BulkRequest, progress: &mut F) -> BulkResult<Bytes>
    where
        F: FnMut(usize, usize) + Send,
    {
        let reply = self.transact(Command::DataWrrq, &request.encode()).await?;

        match reply.command() {
            Some(Command::Data) => {
                let len = reply.payload.len();
                progress(len, len);
                return Ok(reply.payload);
            }
            Some(Command::AckOk) | Some(Command::PrepareData) => {}
            _ => {
                return Err(Error::UnexpectedReply {
                    command: Command::DataWrrq,
                    code: reply.code,
                }
                .into());
            }
        }

        let total = announced_size(&reply)?;
        if total == 0 {
            return Ok(Bytes::new());
        }

        let plan = ChunkPlan::new(total, self.config.chunk_size);
        debug!(
            total,
            chunk_size = self.config.chunk_size,
            packets = plan.total_packets(),
            "Requesting chunks"
        );

        // A failed request still lets the earlier ones be collected
        let mut requested = 0;
        let mut send_error = None;
        for (start, size) in plan.requests() {
            if let Err(e) = self
                .send_command(Command::DataRdy, &chunk_request(start, size))
                .await
            {
                warn!(start, size, error = %e, "Chunk request failed");
                send_error = Some(e);
                break;
            }
            requested += 1;
        }

        let data = self.collect_chunks(total, requested, progress).await?;
        match send_error {
            Some(error) => Err(Incomplete::new(data, total, error)),
            None => Ok(data),
        }
    }

    /// Accumulate `outstanding` `CMD_DATA` frames
    ///
    /// The inactivity window restarts with every frame.
    async fn collect_chunks<F>(
        &self,
        total: usize,
        mut outstanding: usize,
        progress: &mut F,
    ) -> BulkResult<Bytes>
    where
        F: FnMut(usize, usize) + Send,
    {
        let mut buffer = BytesMut::with_capacity(total);

        while outstanding > 0 {
            let frame = match self.transport.await_next(self.config.chunk_timeout).await {
                Ok(frame) => frame,
                Err(e) => {
                    let error = match e {
                        TransportError::NotConnected => TransportError::Disconnected,
                        other => other,
                    };
                    return Err(Incomplete::new(
                        buffer.freeze(),
                        total,
                        Error::during(error, Command::DataRdy, self.endpoint()),
                    ));
                }
            };

            let packet = match self.codec.decode(&frame) {
                Ok(packet) => packet,
                Err(e) => return Err(Incomplete::new(buffer.freeze(), total, e.into())),
            };

            match packet.command() {
                Some(Command::Data) => {
                    buffer.extend_from_slice(&packet.payload);
                    outstanding -= 1;
                    trace!(received = buffer.len(), total, outstanding, "Chunk");
                    progress(buffer.len(), total);
                }
                Some(Command::PrepareData) | Some(Command::AckOk) => {
                    trace!(code = packet.code, "Chunk bookkeeping frame");
                }
                _ => {
                    return Err(Incomplete::new(
                        buffer.freeze(),
                        total,
                        Error::UnexpectedReply {
                            command: Command::DataRdy,
                            code: packet.code,
                        },
                    ));
                }
            }
        }

        Ok(buffer.freeze())
    }

    /// Deliver `data` to the device buffer
    ///
    /// On failure the error carries the prefix of `data` the device
    /// acknowledged.
    pub async fn write_with_buffer<F>(&self, data: Bytes, mut progress: F) -> BulkResult<()>
    where
        F: FnMut(usize, usize) + Send,
    {
        let chunk_size = self.config.write_chunk_size;
        if chunk_size > Packet::MAX_PAYLOAD_SIZE {
            return Err(Incomplete::new(
                Bytes::new(),
                data.len(),
                Error::PayloadTooLarge {
                    command: Command::Data,
                    size: chunk_size,
                    max: Packet::MAX_PAYLOAD_SIZE,
                },
            ));
        }

        let _exchange = self.exchange.lock().await;

        debug!(len = data.len(), "Bulk write");

        self.free_data().await;
        let result = self.write_locked(&data, &mut progress).await;
        self.free_data().await;

        result
    }

    async fn write_locked<F>(&self, data: &Bytes, progress: &mut F) -> BulkResult<()>
    where
        F: FnMut(usize, usize) + Send,
    {
        let total = data.len();

        self.transact(Command::PrepareData, &(total as u32).to_le_bytes())
            .await
            .and_then(|reply| reply.ensure_ok(Command::PrepareData))
            .map_err(|e| Incomplete::new(Bytes::new(), total, e))?;

        let mut sent = 0;
        for chunk in data.chunks(self.config.write_chunk_size.max(1)) {
            self.transact(Command::Data, chunk)
                .await
                .and_then(|reply| reply.ensure_ok(Command::Data))
                .map_err(|e| Incomplete::new(data.slice(..sent), total, e))?;

            sent += chunk.len();
            progress(sent, total);
        }

        Ok(())
    }

    /// Release the device-side buffer; failures are only logged
    pub(crate) async fn free_data(&self) {
        if let Err(e) = self.transact(Command::FreeData, &[]).await {
            warn!(error = %e, "Failed to free device buffer");
        }
    }
}

fn announced_size(reply: &Packet) -> Result<usize, Error> {
    let mut size = reply.payload.get(1..5).ok_or(zkrust_core::Error::PacketTooShort {
        expected: 5,
        actual: reply.payload.len(),
    })?;
    Ok(size.get_u32_le() as usize)
}
