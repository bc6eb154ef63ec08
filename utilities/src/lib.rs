//! Test support for the driver crate: a mockall mock of the transport
//! and a scripted in-memory camera that answers the full command set.

use mockall::mock;
use sbig_ccd::{
    cfw::{CfwCommand, CfwError, CfwResults, CfwStatus},
    CcdCapabilities, CcdInfo, ColorInfo, Command, Error, InfoRequest, InfoResults, LinkResults,
    ReadoutModeInfo, Response, Result, Transport, CB_CCD_ESHUTTER_YES,
};

mock! {
    pub Link {}
    impl Transport for Link {
        fn invoke(&mut self, command: Command) -> Result<Response>;
    }
}

impl std::fmt::Debug for MockLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockLink").finish()
    }
}

/// Deterministic sample the simulator serves for a pixel, so tests can
/// recompute what a readout must have produced.
pub fn line_sample(row: usize, column: usize) -> u16 {
    (row * 1000 + column) as u16
}

/// Scripted camera behind the [`Transport`] trait. Answers every info
/// query from its fixture records, serves [`line_sample`] pixels during
/// readout, models the filter wheel position, and records each command
/// it saw for sequence assertions.
pub struct SimCamera {
    pub info: CcdInfo,
    pub capabilities_bits: u16,
    pub ccd_bits: u16,
    pub cfw_position: u16,
    /// Packed exposure status word served to status queries.
    pub status_word: u16,
    /// Fail the n-th line of the next readout with a device error.
    pub fail_line_at: Option<usize>,
    /// Fail every wheel goto with this fault.
    pub fail_cfw_goto: Option<CfwError>,
    pub commands: Vec<Command>,
    lines_served: usize,
}

impl SimCamera {
    fn new(info: CcdInfo) -> Self {
        SimCamera {
            info,
            capabilities_bits: 0,
            ccd_bits: 0,
            cfw_position: 1,
            status_word: 0,
            fail_line_at: None,
            fail_cfw_goto: None,
            commands: Vec::new(),
            lines_served: 0,
        }
    }

    /// Monochrome ST-8: three binning modes plus the variable-height
    /// vertically-binned entry.
    pub fn st8() -> Self {
        SimCamera::new(CcdInfo {
            firmware_version: 0x0241,
            camera_type: 5,
            name: "SBIG ST-8 Dual CCD Camera".to_string(),
            readout_modes: vec![
                mode_entry(0, 1530, 1020, 0x0900),
                mode_entry(1, 765, 510, 0x1800),
                mode_entry(2, 510, 340, 0x2700),
                mode_entry(3, 1530, 0, 0x0900),
            ],
        })
    }

    /// ST-237: its "shutter" is the internal filter wheel.
    pub fn st237() -> Self {
        SimCamera::new(CcdInfo {
            firmware_version: 0x0130,
            camera_type: 8,
            name: "SBIG ST-237 Camera".to_string(),
            readout_modes: vec![mode_entry(0, 640, 480, 0x0740), mode_entry(1, 320, 240, 0x1480)],
        })
    }

    /// One-shot color ST-402 with a Bayer matrix.
    pub fn st402_bayer() -> Self {
        let mut sim = SimCamera::new(CcdInfo {
            firmware_version: 0x0210,
            camera_type: 16,
            name: "SBIG ST-402 Camera".to_string(),
            readout_modes: vec![mode_entry(0, 765, 510, 0x0900), mode_entry(1, 382, 255, 0x1800)],
        });
        sim.ccd_bits = 1;
        sim
    }

    pub fn with_eshutter(mut self) -> Self {
        self.capabilities_bits |= CB_CCD_ESHUTTER_YES;
        self
    }

    fn cfw_results(&self) -> CfwResults {
        CfwResults {
            model: 2,
            status: CfwStatus::Idle,
            position: self.cfw_position,
            result1: 0,
            result2: 0,
        }
    }

    fn filter_wheel(&mut self, command: CfwCommand, param1: u32) -> Result<Response> {
        match command {
            CfwCommand::Query | CfwCommand::Init => Ok(Response::FilterWheel(self.cfw_results())),
            CfwCommand::Goto => {
                if let Some(fault) = self.fail_cfw_goto {
                    return Err(Error::FilterWheel(fault));
                }
                self.cfw_position = param1 as u16;
                Ok(Response::FilterWheel(self.cfw_results()))
            }
            CfwCommand::GetInfo => Ok(Response::FilterWheel(CfwResults {
                result1: 0x0110,
                result2: 5,
                ..self.cfw_results()
            })),
            _ => Err(Error::Device(6)),
        }
    }
}

fn mode_entry(mode: u16, width: u16, height: u16, pixel_bcd: u32) -> ReadoutModeInfo {
    ReadoutModeInfo {
        mode,
        width,
        height,
        gain: 0x0230,
        pixel_width: pixel_bcd,
        pixel_height: pixel_bcd,
    }
}

impl Transport for SimCamera {
    fn invoke(&mut self, command: Command) -> Result<Response> {
        self.commands.push(command.clone());
        match command {
            Command::EstablishLink => Ok(Response::Link(LinkResults {
                camera_type: self.info.camera_type,
            })),
            Command::GetInfo(InfoRequest::Standard(_)) => {
                Ok(Response::Info(InfoResults::Standard(self.info.clone())))
            }
            Command::GetInfo(InfoRequest::Extended2(_)) => {
                Ok(Response::Info(InfoResults::Extended2(CcdCapabilities {
                    capabilities_bits: self.capabilities_bits,
                })))
            }
            Command::GetInfo(InfoRequest::Extended3) => {
                Ok(Response::Info(InfoResults::Extended3(ColorInfo {
                    ccd_bits: self.ccd_bits,
                })))
            }
            Command::StartExposure(_) | Command::EndExposure(_) | Command::EndReadout(_) => {
                Ok(Response::Ack)
            }
            Command::QueryExposureStatus => Ok(Response::Status(self.status_word)),
            Command::StartReadout(_) => {
                self.lines_served = 0;
                Ok(Response::Ack)
            }
            Command::ReadLine(params) | Command::ReadSubtractLine(params) => {
                if self.fail_line_at == Some(self.lines_served) {
                    return Err(Error::Device(8));
                }
                let row = self.lines_served;
                self.lines_served += 1;
                let start = usize::from(params.pixel_start);
                let pixels = (0..usize::from(params.pixel_length))
                    .map(|column| line_sample(row, start + column))
                    .collect();
                Ok(Response::Line(pixels))
            }
            Command::FilterWheel(params) => self.filter_wheel(params.command, params.param1),
        }
    }
}
