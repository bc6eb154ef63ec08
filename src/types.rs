use core::{fmt, fmt::Display};
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;

/// Sensor selected on the device link. Larger cameras carry a second,
/// smaller CCD used for guiding.
#[derive(FromPrimitive, ToPrimitive, PartialEq, Eq, Debug, Clone, Copy)]
pub enum Channel {
    Imaging = 0,
    Tracking = 1,
}

impl Channel {
    pub(crate) fn code(self) -> u16 {
        self as u16
    }
}

/// Camera family reported by the device on link establishment and in
/// the standard info record.
#[derive(FromPrimitive, ToPrimitive, PartialEq, Eq, Debug, Clone, Copy)]
pub enum CameraModel {
    St7 = 4,
    St8 = 5,
    St5c = 6,
    TceController = 7,
    St237 = 8,
    Stk = 9,
    St9 = 10,
    Stv = 11,
    St10 = 12,
    St1k = 13,
    St2k = 14,
    Stl = 15,
    St402 = 16,
    Stx = 17,
    St4k = 18,
    Stt = 19,
    Sti = 20,
    Stf = 21,
    Next = 22,
    NoCamera = 0xFFFF,
}

impl CameraModel {
    fn name(self) -> &'static str {
        use CameraModel::*;
        match self {
            St7 => "ST-7",
            St8 => "ST-8",
            St5c => "ST-5C",
            TceController => "TCE Controller",
            St237 => "ST-237",
            Stk => "STK",
            St9 => "ST9",
            Stv => "STV",
            St10 => "ST10",
            St1k => "ST1K",
            St2k => "ST2K",
            Stl => "STL",
            St402 => "ST402",
            Stx => "STX",
            St4k => "ST4K",
            Stt => "STT",
            Sti => "STI",
            Stf => "STF",
            Next => "NEXT",
            NoCamera => "no camera",
        }
    }
}

impl Display for CameraModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Display name for a raw camera type code, "unknown" for codes outside
/// the model table.
pub fn camera_name(type_code: u16) -> &'static str {
    CameraModel::from_u16(type_code).map_or("unknown", CameraModel::name)
}

/// Antiblooming gate clocking during exposure.
#[derive(FromPrimitive, ToPrimitive, PartialEq, Eq, Debug, Clone, Copy)]
pub enum AbgMode {
    Low = 0,
    ClockedLow = 1,
    ClockedMedium = 2,
    ClockedHigh = 3,
}

/// Mechanical shutter handling for the next exposure.
#[derive(FromPrimitive, ToPrimitive, PartialEq, Eq, Debug, Clone, Copy)]
pub enum ShutterMode {
    Leave = 0,
    /// Open during exposure, closed during readout.
    Open = 1,
    Close = 2,
    Initialize = 3,
}

/// Progress of a started exposure, decoded from the packed per-channel
/// status word.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum ExposureState {
    Idle,
    InProgress,
    Complete,
}

impl ExposureState {
    pub(crate) fn from_bits(bits: u16) -> Self {
        match bits & 3 {
            0 => ExposureState::Idle,
            1 => ExposureState::InProgress,
            _ => ExposureState::Complete,
        }
    }
}

/// Binning mode as sent to the device. The low byte selects the mode
/// from the camera's capability table; for the vertically-binned
/// variants the high byte carries the vertical binning factor.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct ReadoutMode(pub u16);

impl ReadoutMode {
    pub const BIN_1X1: Self = ReadoutMode(0);
    pub const BIN_2X2: Self = ReadoutMode(1);
    pub const BIN_3X3: Self = ReadoutMode(2);
    pub const BIN_9X9: Self = ReadoutMode(9);

    /// 1xN vertical binning.
    pub fn nx1(factor: u8) -> Self {
        ReadoutMode(3 | u16::from(factor) << 8)
    }

    /// 2xN vertical binning.
    pub fn nx2(factor: u8) -> Self {
        ReadoutMode(4 | u16::from(factor) << 8)
    }

    /// 3xN vertical binning.
    pub fn nx3(factor: u8) -> Self {
        ReadoutMode(5 | u16::from(factor) << 8)
    }

    pub(crate) fn binning(self) -> u16 {
        self.0 & 0x00FF
    }

    pub(crate) fn vertical_factor(self) -> u16 {
        (self.0 & 0xFF00) >> 8
    }

    pub(crate) fn is_vertically_binned(self) -> bool {
        matches!(self.binning(), 3 | 4 | 5)
    }
}

/// Sensor color classification from the extended capability record.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum ColorSensor {
    Monochrome,
    /// One-shot color camera with a 2x2 Bayer matrix.
    Bayer,
    Truesense,
}

impl ColorSensor {
    pub(crate) fn from_bits(ccd_bits: u16) -> Self {
        match ccd_bits & 0x3 {
            1 => ColorSensor::Bayer,
            3 => ColorSensor::Truesense,
            _ => ColorSensor::Monochrome,
        }
    }
}

/// Exposure flag bits OR-ed into the encoded exposure time.
pub const EXP_WAIT_FOR_TRIGGER_IN: u32 = 0x8000_0000;
pub const EXP_SEND_TRIGGER_OUT: u32 = 0x4000_0000;
pub const EXP_LIGHT_CLEAR: u32 = 0x2000_0000;
/// Set by the driver itself when the duration is encoded in milliseconds.
pub const EXP_MS_EXPOSURE: u32 = 0x1000_0000;
pub const EXP_FAST_READOUT: u32 = 0x0800_0000;
pub const EXP_DUAL_CHANNEL_MODE: u32 = 0x0400_0000;
/// Bits of the encoded exposure time that carry the duration itself.
pub const EXP_TIME_MASK: u32 = 0x00FF_FFFF;

/// Start-exposure channel flag: skip raising Vdd before integration.
pub const START_SKIP_VDD: u16 = 0x8000;
/// End-exposure channel flag: skip the shutter settle delay.
pub const END_SKIP_DELAY: u16 = 0x8000;
