use crate::{
    cfw::{CfwParams, CfwResults},
    info::{InfoRequest, InfoResults},
    types::{AbgMode, ShutterMode},
};

/// One command/response exchange with the device driver. Every device
/// interaction in this crate is a single [`Command`] paired with the
/// [`Response`] kind of the same name.
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum Command {
    EstablishLink,
    GetInfo(InfoRequest),
    StartExposure(StartExposureParams),
    EndExposure(EndExposureParams),
    /// Status of the most recent start-exposure command. The returned
    /// word packs both channels: imaging in bits 0-1, tracking in
    /// bits 2-3.
    QueryExposureStatus,
    StartReadout(StartReadoutParams),
    EndReadout(EndReadoutParams),
    ReadLine(ReadoutLineParams),
    /// Line readout with on-camera dark frame subtraction.
    ReadSubtractLine(ReadoutLineParams),
    FilterWheel(CfwParams),
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub enum Response {
    /// Commands whose output record is empty.
    Ack,
    Link(LinkResults),
    Info(InfoResults),
    Status(u16),
    Line(Vec<u16>),
    FilterWheel(CfwResults),
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct LinkResults {
    pub camera_type: u16,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct StartExposureParams {
    /// Channel code OR-ed with start flags such as [`crate::START_SKIP_VDD`].
    pub ccd: u16,
    /// Duration in centiseconds, or milliseconds with
    /// [`crate::EXP_MS_EXPOSURE`] set, OR-ed with the exposure flags.
    pub exposure_time: u32,
    pub abg_state: AbgMode,
    pub open_shutter: ShutterMode,
    pub readout_mode: u16,
    pub top: u16,
    pub left: u16,
    pub height: u16,
    pub width: u16,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct EndExposureParams {
    /// Channel code OR-ed with end flags such as [`crate::END_SKIP_DELAY`].
    pub ccd: u16,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct StartReadoutParams {
    pub ccd: u16,
    pub readout_mode: u16,
    pub top: u16,
    pub left: u16,
    pub height: u16,
    pub width: u16,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct EndReadoutParams {
    pub ccd: u16,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct ReadoutLineParams {
    pub ccd: u16,
    pub readout_mode: u16,
    /// First pixel of the line, in binned pixels from the row start.
    pub pixel_start: u16,
    /// Number of pixels to digitize.
    pub pixel_length: u16,
}
