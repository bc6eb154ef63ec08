use crate::cfw::CfwError;
use core::result::Result as CoreResult;
use thiserror::Error;

pub type Result<T> = CoreResult<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Parameter is outside the range the device accepts")]
    InvalidParameter,
    #[error("Readout mode is not in the camera's capability table")]
    InvalidMode,
    #[error("Device reported error status {0}")]
    Device(u16),
    #[error("Filter wheel error: {0}")]
    FilterWheel(#[from] CfwError),
    #[error("Received an unexpected type of response")]
    UnexpectedResponse,
    #[error("{0}")]
    IOError(#[from] std::io::Error),
}
