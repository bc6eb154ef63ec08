//! Driver for SBIG CCD cameras spoken to through the vendor's
//! command/response protocol.
//!
//! The [`Transport`] trait abstracts the blocking driver call; a
//! [`Ccd`] channel opened on it sequences exposures, manages subframe
//! geometry and the frame buffer, reads scanlines out of the device,
//! and post-processes the completed frame (Bayer conversion, contrast
//! stretch, PGM export). Cameras whose shutter is physically a filter
//! wheel position are handled transparently during exposures; the
//! wheel is otherwise driven through the [`cfw`] module.
//!
//! ```no_run
//! use sbig_ccd::{establish_link, camera_name, Channel, Transport};
//! use std::time::Duration;
//!
//! # fn capture<T: Transport>(mut link: T) -> sbig_ccd::Result<()> {
//! let model = establish_link(&mut link)?;
//! println!("found {}", camera_name(model));
//!
//! let mut ccd = link.open_ccd(Channel::Imaging)?;
//! ccd.start_exposure(0, Duration::from_secs(1))?;
//! // ... poll ccd.exposure_status() until Complete ...
//! ccd.end_exposure(0)?;
//! ccd.readout()?;
//! ccd.write_pgm("capture.pgm")?;
//! # Ok(())
//! # }
//! ```

mod bcd;
mod ccd;
pub mod cfw;
mod command;
mod error;
mod frame;
mod info;
mod transport;
mod types;

pub use bcd::{gain_from_bcd, microns_from_bcd};
pub use ccd::Ccd;
pub use command::{
    Command, EndExposureParams, EndReadoutParams, LinkResults, ReadoutLineParams, Response,
    StartExposureParams, StartReadoutParams,
};
pub use error::{Error, Result};
pub use info::{
    CcdCapabilities, CcdInfo, ColorInfo, InfoRequest, InfoResults, ReadoutModeInfo,
    CB_CCD_ESHUTTER_MASK, CB_CCD_ESHUTTER_YES,
};
pub use transport::{establish_link, Transport};
pub use types::{
    camera_name, AbgMode, CameraModel, Channel, ColorSensor, ExposureState, ReadoutMode,
    ShutterMode, END_SKIP_DELAY, EXP_DUAL_CHANNEL_MODE, EXP_FAST_READOUT, EXP_LIGHT_CLEAR,
    EXP_MS_EXPOSURE, EXP_SEND_TRIGGER_OUT, EXP_TIME_MASK, EXP_WAIT_FOR_TRIGGER_IN, START_SKIP_VDD,
};
