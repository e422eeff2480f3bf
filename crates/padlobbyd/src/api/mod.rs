mod unix_sock;

use std::thread::JoinHandle;

pub use unix_sock::UnixSocket;

use bitcode::{Decode, Encode};
use crossbeam_channel::Sender;
use thiserror::Error;

/// Error type for api operations.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("api io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to decode command: {0}")]
    Decode(#[from] bitcode::Error),
    #[error("empty command")]
    Empty,
    #[error("command of {0} bytes exceeds the limit")]
    TooLarge(usize),
    #[error("daemon rejected the command: {0}")]
    Rejected(String),
}

/// Convenient result alias for api operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// padlobbyd api control command.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum Command {
    Promote {
        unique_id: String,
    },
    ClearReady,
    SetStartButton {
        vendor_id: u16,
        product_id: u16,
        name: String,
        code: u16,
    },
    UpdateBattery {
        unique_id: String,
        percent: u8,
    },
    /// Keeps the connection open and streams every signal as a text line.
    /// Served by the listener itself and never forwarded to the daemon loop.
    Watch,
}

/// padlobbyd api command transport.
/// The listener hands commands from the outer world to the daemon loop,
/// the sender delivers a command to a running daemon.
pub trait ApiTransport {
    fn listen_events(&self, tx: Sender<Command>) -> ApiResult<JoinHandle<()>>;
    fn send_event(&self, event: Command) -> ApiResult<()>;
}
