//! ZKTeco protocol command definitions

use std::fmt;

use crate::constants::EVENT_CODE_RANGE;
use crate::error::{Error, Result};

/// Protocol command codes
///
/// Request codes sent by the client and the reply codes the device answers
/// with. Frames carry the raw `u16`; use [`Command::try_from`] to interpret it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Command {
    // Connection commands
    Connect = 1000,
    Exit = 1001,
    EnableDevice = 1002,
    DisableDevice = 1003,
    Restart = 1004,
    PowerOff = 1005,

    // Device information
    GetVersion = 1100,
    Auth = 1102,

    // Data transfer
    PrepareData = 1500,
    Data = 1501,
    FreeData = 1502,
    DataWrrq = 1503,
    DataRdy = 1504,

    // Database operations
    UserTempRrq = 9,
    UserTempWrq = 10,
    AttLogRrq = 13,
    ClearAttLog = 15,
    GetFreeSizes = 50,

    // Time operations
    GetTime = 201,
    SetTime = 202,

    // Real-time events
    RegEvent = 500,

    // Response commands (from device)
    AckOk = 2000,
    AckError = 2001,
    AckData = 2002,
    AckRetry = 2003,
    AckRepeat = 2004,
    AckUnauth = 2005,
    AckUnknown = 0xFFFF,
    AckErrorCmd = 0xFFFD,
    AckErrorInit = 0xFFFC,
    AckErrorData = 0xFFFB,
}

impl Command {
    /// Every known code
    pub const ALL: [Command; 31] = [
        Self::Connect,
        Self::Exit,
        Self::EnableDevice,
        Self::DisableDevice,
        Self::Restart,
        Self::PowerOff,
        Self::GetVersion,
        Self::Auth,
        Self::PrepareData,
        Self::Data,
        Self::FreeData,
        Self::DataWrrq,
        Self::DataRdy,
        Self::UserTempRrq,
        Self::UserTempWrq,
        Self::AttLogRrq,
        Self::ClearAttLog,
        Self::GetFreeSizes,
        Self::GetTime,
        Self::SetTime,
        Self::RegEvent,
        Self::AckOk,
        Self::AckError,
        Self::AckData,
        Self::AckRetry,
        Self::AckRepeat,
        Self::AckUnauth,
        Self::AckUnknown,
        Self::AckErrorCmd,
        Self::AckErrorInit,
        Self::AckErrorData,
    ];

    /// Check if this is a response command (from device to PC)
    pub fn is_response(self) -> bool {
        matches!(
            self,
            Self::AckOk
                | Self::AckError
                | Self::AckData
                | Self::AckRetry
                | Self::AckRepeat
                | Self::AckUnauth
                | Self::AckUnknown
                | Self::AckErrorCmd
                | Self::AckErrorInit
                | Self::AckErrorData
        )
    }

    /// Check if this is a success response
    pub fn is_success(self) -> bool {
        matches!(self, Self::AckOk | Self::AckData)
    }

    /// Check if this is an error response
    pub fn is_error(self) -> bool {
        matches!(
            self,
            Self::AckError | Self::AckErrorCmd | Self::AckErrorInit | Self::AckErrorData
        )
    }

    /// Get command name
    pub fn name(self) -> &'static str {
        match self {
            Self::Connect => "CMD_CONNECT",
            Self::Exit => "CMD_EXIT",
            Self::EnableDevice => "CMD_ENABLEDEVICE",
            Self::DisableDevice => "CMD_DISABLEDEVICE",
            Self::Restart => "CMD_RESTART",
            Self::PowerOff => "CMD_POWEROFF",
            Self::GetVersion => "CMD_GET_VERSION",
            Self::Auth => "CMD_AUTH",
            Self::PrepareData => "CMD_PREPARE_DATA",
            Self::Data => "CMD_DATA",
            Self::FreeData => "CMD_FREE_DATA",
            Self::DataWrrq => "CMD_DATA_WRRQ",
            Self::DataRdy => "CMD_DATA_RDY",
            Self::UserTempRrq => "CMD_USERTEMP_RRQ",
            Self::UserTempWrq => "CMD_USERTEMP_WRQ",
            Self::AttLogRrq => "CMD_ATTLOG_RRQ",
            Self::ClearAttLog => "CMD_CLEAR_ATTLOG",
            Self::GetFreeSizes => "CMD_GET_FREE_SIZES",
            Self::GetTime => "CMD_GET_TIME",
            Self::SetTime => "CMD_SET_TIME",
            Self::RegEvent => "CMD_REG_EVENT",
            Self::AckOk => "CMD_ACK_OK",
            Self::AckError => "CMD_ACK_ERROR",
            Self::AckData => "CMD_ACK_DATA",
            Self::AckRetry => "CMD_ACK_RETRY",
            Self::AckRepeat => "CMD_ACK_REPEAT",
            Self::AckUnauth => "CMD_ACK_UNAUTH",
            Self::AckUnknown => "CMD_ACK_UNKNOWN",
            Self::AckErrorCmd => "CMD_ACK_ERROR_CMD",
            Self::AckErrorInit => "CMD_ACK_ERROR_INIT",
            Self::AckErrorData => "CMD_ACK_ERROR_DATA",
        }
    }
}

/// Whether a raw command code belongs to the unsolicited event range
pub fn is_event_code(code: u16) -> bool {
    EVENT_CODE_RANGE.contains(&code)
}

impl From<Command> for u16 {
    fn from(cmd: Command) -> u16 {
        cmd as u16
    }
}

impl TryFrom<u16> for Command {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|command| *command as u16 == value)
            .ok_or(Error::UnknownCommand(value))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), *self as u16)
    }
}
