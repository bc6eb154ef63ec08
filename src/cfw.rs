//! Color filter wheel operations.
//!
//! The wheel shares the device link with the camera and is driven
//! through a single parameter-block command; all functions here select
//! the wheel automatically rather than by explicit model.

use crate::{
    command::{Command, Response},
    error::{Error, Result},
    transport::Transport,
};
use core::{fmt, fmt::Display};
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;
use thiserror::Error;

/// Wheel model selector; [`CFWSEL_AUTO`] lets the driver detect it.
pub const CFWSEL_AUTO: u16 = 6;

/// `get_info` sub-selector for the firmware/position record.
const CFWG_FIRMWARE_VERSION: u32 = 0;

/// Position reported while the wheel has not been homed yet.
pub const CFW_POSITION_UNKNOWN: u16 = 0;

#[derive(FromPrimitive, ToPrimitive, PartialEq, Eq, Debug, Clone, Copy)]
pub enum CfwCommand {
    Query = 0,
    Goto = 1,
    Init = 2,
    GetInfo = 3,
    OpenDevice = 4,
    CloseDevice = 5,
}

#[derive(FromPrimitive, ToPrimitive, PartialEq, Eq, Debug, Clone, Copy)]
pub enum CfwStatus {
    Unknown = 0,
    Idle = 1,
    Busy = 2,
}

/// Fault reported by the wheel itself on the dedicated error status.
#[derive(Error, FromPrimitive, ToPrimitive, PartialEq, Eq, Debug, Clone, Copy)]
pub enum CfwError {
    #[error("Device busy")]
    Busy = 1,
    #[error("Bad command")]
    BadCommand = 2,
    #[error("Calibration error")]
    Calibration = 3,
    #[error("Motor timeout")]
    MotorTimeout = 4,
    #[error("Bad device model")]
    BadModel = 5,
    #[error("Device not closed")]
    DeviceNotClosed = 6,
    #[error("Device not open")]
    DeviceNotOpen = 7,
    #[error("I2C bus error")]
    I2c = 8,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct CfwParams {
    pub model: u16,
    pub command: CfwCommand,
    pub param1: u32,
    pub param2: u32,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct CfwResults {
    pub model: u16,
    pub status: CfwStatus,
    /// Current slot, 1-based; [`CFW_POSITION_UNKNOWN`] if not homed.
    pub position: u16,
    pub result1: u32,
    pub result2: u32,
}

#[derive(FromPrimitive, ToPrimitive, PartialEq, Eq, Debug, Clone, Copy)]
pub enum CfwModel {
    Unknown = 0,
    Cfw2 = 1,
    Cfw5 = 2,
    Cfw8 = 3,
    CfwL = 4,
    Cfw402 = 5,
    Auto = 6,
    Cfw6a = 7,
    Cfw10 = 8,
    Cfw10Serial = 9,
    Cfw9 = 10,
    CfwL8 = 11,
    CfwL8g = 12,
    Cfw1603 = 13,
    Fw5Stx = 14,
    Fw5_8300 = 15,
    Fw8_8300 = 16,
    Fw7Stx = 17,
    Fw8Stt = 18,
}

impl CfwModel {
    fn name(self) -> &'static str {
        use CfwModel::*;
        match self {
            Unknown => "unknown",
            Cfw2 => "CFW-2",
            Cfw5 => "CFW-5",
            Cfw8 => "CFW-8",
            CfwL => "CFW-L",
            Cfw402 => "CFW-402",
            Auto => "auto",
            Cfw6a => "CFW-6A",
            Cfw10 => "CFW-10",
            Cfw10Serial => "CFW-10 (serial)",
            Cfw9 => "CFW-9",
            CfwL8 => "CFW-L8",
            CfwL8g => "CFW-L8G",
            Cfw1603 => "CFW-1603",
            Fw5Stx => "FW-5-STX",
            Fw5_8300 => "FW-5-8300",
            Fw8_8300 => "FW-8-8300",
            Fw7Stx => "FW-7-STX",
            Fw8Stt => "FW-8-STT",
        }
    }
}

impl Display for CfwModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Display name for a raw wheel model code, "unknown" for codes outside
/// the model table.
pub fn cfw_name(model_code: u16) -> &'static str {
    CfwModel::from_u16(model_code).map_or("unknown", CfwModel::name)
}

/// Firmware/position record from [`get_info`].
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct CfwInfo {
    pub model: u16,
    pub firmware_version: u32,
    pub position_count: u32,
}

fn invoke<T: Transport>(link: &mut T, command: CfwCommand, param1: u32) -> Result<CfwResults> {
    let params = CfwParams {
        model: CFWSEL_AUTO,
        command,
        param1,
        param2: 0,
    };
    match link.invoke(Command::FilterWheel(params))? {
        Response::FilterWheel(results) => Ok(results),
        _ => Err(Error::UnexpectedResponse),
    }
}

/// Home the wheel.
pub fn init<T: Transport>(link: &mut T) -> Result<()> {
    invoke(link, CfwCommand::Init, 0).map(|_| ())
}

/// Move the wheel to a 1-based slot position.
pub fn goto_position<T: Transport>(link: &mut T, position: u16) -> Result<()> {
    log::debug!("moving filter wheel to position {position}");
    invoke(link, CfwCommand::Goto, u32::from(position)).map(|_| ())
}

/// Current wheel status and position.
pub fn query<T: Transport>(link: &mut T) -> Result<(CfwStatus, u16)> {
    let results = invoke(link, CfwCommand::Query, 0)?;
    log::trace!(
        "filter wheel {:?} at position {}",
        results.status,
        results.position
    );
    Ok((results.status, results.position))
}

/// Wheel model, firmware revision and slot count.
pub fn get_info<T: Transport>(link: &mut T) -> Result<CfwInfo> {
    let results = invoke(link, CfwCommand::GetInfo, CFWG_FIRMWARE_VERSION)?;
    Ok(CfwInfo {
        model: results.model,
        firmware_version: results.result1,
        position_count: results.result2,
    })
}
