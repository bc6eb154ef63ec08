use crate::{
    bcd::{gain_from_bcd, microns_from_bcd},
    cfw,
    command::{
        Command, EndExposureParams, EndReadoutParams, ReadoutLineParams, Response,
        StartExposureParams, StartReadoutParams,
    },
    error::{Error, Result},
    frame::{align_bayer, auto_contrast, bayer_to_mono, centered_fraction},
    info::{CcdInfo, InfoRequest, InfoResults, ReadoutModeInfo},
    transport::Transport,
    types::{
        camera_name, AbgMode, CameraModel, Channel, ColorSensor, ExposureState, ReadoutMode,
        ShutterMode, EXP_MS_EXPOSURE, EXP_TIME_MASK,
    },
};
use num_traits::FromPrimitive;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    time::{Duration, SystemTime},
};

/// ST-5C and ST-237 use their internal filter wheel as a shutter; these
/// are the wheel slots acting as the open and closed blades.
const CFW_SHUTTER_OPEN: u16 = 1;
const CFW_SHUTTER_CLOSED: u16 = 2;

/// One CCD channel on an established device link.
///
/// The channel owns the link for its lifetime and a single frame buffer
/// sized to the current window; the buffer is replaced wholesale on
/// every geometry change so stale contents never survive a resize.
#[derive(Debug)]
pub struct Ccd<T: Transport> {
    link: T,
    channel: Channel,
    info: CcdInfo,
    abg_mode: AbgMode,
    shutter_mode: ShutterMode,
    readout_mode: ReadoutMode,
    // current window, in binned pixels
    top: u16,
    left: u16,
    height: u16,
    width: u16,
    frame: Vec<u16>,
    exp_flags: u32,
    exposure_time: Duration,
    exposure_start: Option<SystemTime>,
    last_cfw_position: u16,
    restore_cfw_position: bool,
    has_eshutter: bool,
    color: ColorSensor,
}

impl<T: Transport> Ccd<T> {
    /// Open a channel, querying the three capability records. Any query
    /// failure aborts creation and returns that error.
    pub fn new(mut link: T, channel: Channel) -> Result<Self> {
        let info = match link.invoke(Command::GetInfo(InfoRequest::Standard(channel)))? {
            Response::Info(InfoResults::Standard(info)) => info,
            _ => return Err(Error::UnexpectedResponse),
        };
        let capabilities = match link.invoke(Command::GetInfo(InfoRequest::Extended2(channel)))? {
            Response::Info(InfoResults::Extended2(capabilities)) => capabilities,
            _ => return Err(Error::UnexpectedResponse),
        };
        let color_info = match link.invoke(Command::GetInfo(InfoRequest::Extended3))? {
            Response::Info(InfoResults::Extended3(color_info)) => color_info,
            _ => return Err(Error::UnexpectedResponse),
        };

        // Default to the first readout mode the camera lists and a full
        // frame for it. N.B. readout_mode is the table entry's mode
        // code, not its index.
        let first = info.readout_modes.first().ok_or(Error::InvalidMode)?;
        let (readout_mode, height, width) = (ReadoutMode(first.mode), first.height, first.width);

        log::debug!(
            "opened {:?} channel on {} ({} readout modes)",
            channel,
            camera_name(info.camera_type),
            info.readout_modes.len()
        );

        Ok(Ccd {
            link,
            channel,
            has_eshutter: capabilities.has_electronic_shutter(),
            color: ColorSensor::from_bits(color_info.ccd_bits),
            info,
            abg_mode: AbgMode::Low,
            shutter_mode: ShutterMode::Open,
            readout_mode,
            top: 0,
            left: 0,
            height,
            width,
            frame: vec![0; usize::from(height) * usize::from(width)],
            exp_flags: 0,
            exposure_time: Duration::ZERO,
            exposure_start: None,
            last_cfw_position: cfw::CFW_POSITION_UNKNOWN,
            restore_cfw_position: false,
        })
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn info(&self) -> &CcdInfo {
        &self.info
    }

    pub fn color_sensor(&self) -> ColorSensor {
        self.color
    }

    pub fn has_electronic_shutter(&self) -> bool {
        self.has_eshutter
    }

    /// Direct access to the underlying link, e.g. for filter selection
    /// through [`cfw`] between exposures.
    pub fn link_mut(&mut self) -> &mut T {
        &mut self.link
    }

    fn mode_index(&self, mode: ReadoutMode) -> Option<usize> {
        // only the low byte identifies the table entry; the high byte
        // carries the vertical binning factor
        self.info
            .readout_modes
            .iter()
            .position(|entry| entry.mode == mode.binning())
    }

    fn mode_info(&self, mode: ReadoutMode) -> Result<&ReadoutModeInfo> {
        self.mode_index(mode)
            .map(|index| &self.info.readout_modes[index])
            .ok_or(Error::InvalidMode)
    }

    /// Full-frame height for a readout mode. Vertically-binned variants
    /// derive it from the unbinned maximum and the factor in the mode's
    /// high byte.
    fn mode_height(&self, mode: ReadoutMode) -> Result<u16> {
        let entry = self.mode_info(mode)?;
        if !mode.is_vertically_binned() {
            return Ok(entry.height);
        }
        let factor = mode.vertical_factor();
        if factor == 0 {
            return Err(Error::InvalidMode);
        }
        let height = self.info.readout_modes[0].height / factor;
        if height == 0 {
            return Err(Error::InvalidMode);
        }
        Ok(height)
    }

    fn realloc_frame(&mut self) {
        self.frame = vec![0; usize::from(self.height) * usize::from(self.width)];
    }

    pub fn set_abg_mode(&mut self, mode: AbgMode) {
        self.abg_mode = mode;
    }

    pub fn abg_mode(&self) -> AbgMode {
        self.abg_mode
    }

    pub fn set_shutter_mode(&mut self, mode: ShutterMode) {
        self.shutter_mode = mode;
    }

    pub fn shutter_mode(&self) -> ShutterMode {
        self.shutter_mode
    }

    /// Select a readout mode, resetting the window to the mode's full
    /// frame and replacing the frame buffer.
    pub fn set_readout_mode(&mut self, mode: ReadoutMode) -> Result<()> {
        let height = self.mode_height(mode)?;
        let width = self.mode_info(mode)?.width;
        self.readout_mode = mode;
        self.top = 0;
        self.left = 0;
        self.height = height;
        self.width = width;
        self.realloc_frame();
        Ok(())
    }

    pub fn readout_mode(&self) -> ReadoutMode {
        self.readout_mode
    }

    /// Select a centered subframe covering `fraction` of the full-frame
    /// area of the current readout mode.
    pub fn set_partial_frame(&mut self, fraction: f64) -> Result<()> {
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(Error::InvalidParameter);
        }
        let max_height = self.mode_height(self.readout_mode)?;
        let max_width = self.mode_info(self.readout_mode)?.width;
        let (height, top) = centered_fraction(max_height, fraction);
        let (width, left) = centered_fraction(max_width, fraction);
        self.top = top;
        self.left = left;
        self.height = height;
        self.width = width;
        if self.color == ColorSensor::Bayer {
            (self.top, self.left) = align_bayer(self.top, self.left);
        }
        self.realloc_frame();
        Ok(())
    }

    /// Select an explicit window, in binned pixels. Offsets and extents
    /// are bounded by the *current* window, so growing a window
    /// requires reselecting a readout mode first.
    pub fn set_window(&mut self, top: u16, left: u16, height: u16, width: u16) -> Result<()> {
        if top > self.height || left > self.width || height > self.height || width > self.width {
            return Err(Error::InvalidParameter);
        }
        self.top = top;
        self.left = left;
        self.height = height;
        self.width = width;
        if self.color == ColorSensor::Bayer {
            (self.top, self.left) = align_bayer(self.top, self.left);
        }
        self.realloc_frame();
        Ok(())
    }

    /// Current window as `(top, left, height, width)`.
    pub fn window(&self) -> (u16, u16, u16, u16) {
        (self.top, self.left, self.height, self.width)
    }

    /// Accumulate exposure flag bits for subsequent exposures. Bits
    /// overlapping the encoded duration are reserved for the driver.
    pub fn set_exposure_flags(&mut self, flags: u32) -> Result<()> {
        if flags & (EXP_TIME_MASK | EXP_MS_EXPOSURE) != 0 {
            return Err(Error::InvalidParameter);
        }
        self.exp_flags |= flags;
        Ok(())
    }

    pub fn clear_exposure_flags(&mut self, flags: u32) -> Result<()> {
        if flags & (EXP_TIME_MASK | EXP_MS_EXPOSURE) != 0 {
            return Err(Error::InvalidParameter);
        }
        self.exp_flags &= !flags;
        Ok(())
    }

    /// Shortest exposure the camera accepts. Cameras with an electronic
    /// shutter go down to a millisecond regardless of model.
    fn min_exposure(&self) -> Duration {
        if self.has_eshutter {
            return Duration::from_millis(1);
        }
        match CameraModel::from_u16(self.info.camera_type) {
            Some(CameraModel::St402) => Duration::from_millis(40),
            Some(CameraModel::Stx) => Duration::from_millis(180),
            Some(CameraModel::Stt) => Duration::from_millis(120),
            Some(CameraModel::Sti) => Duration::from_millis(1),
            Some(CameraModel::Stf) => Duration::from_millis(90),
            _ => Duration::from_millis(120),
        }
    }

    /// Start integrating. `flags` are start-exposure channel flags such
    /// as [`crate::START_SKIP_VDD`].
    ///
    /// Sub-10ms exposures on cameras with an electronic shutter encode
    /// in milliseconds with [`EXP_MS_EXPOSURE`] set; everything else
    /// encodes in centiseconds.
    pub fn start_exposure(&mut self, flags: u16, exposure: Duration) -> Result<()> {
        if exposure < self.min_exposure() {
            return Err(Error::InvalidParameter);
        }
        let centis = exposure.as_secs_f64() * 100.0;
        if centis > f64::from(EXP_TIME_MASK) {
            return Err(Error::InvalidParameter);
        }
        let mut encoded = if exposure < Duration::from_millis(10) && self.has_eshutter {
            exposure.as_millis() as u32 | EXP_MS_EXPOSURE
        } else {
            centis as u32
        };
        encoded |= self.exp_flags;

        // kept for stats and export comments
        self.exposure_time = exposure;
        self.exposure_start = Some(SystemTime::now());

        // ST-5C and ST-237 have an internal filter wheel instead of a
        // shutter; reposition it here and restore it in end_exposure.
        self.restore_cfw_position = false;
        let model = CameraModel::from_u16(self.info.camera_type);
        if matches!(model, Some(CameraModel::St5c | CameraModel::St237)) {
            let (_, position) = cfw::query(&mut self.link)?;
            self.last_cfw_position = position;
            if self.shutter_mode == ShutterMode::Close && position != CFW_SHUTTER_CLOSED {
                cfw::goto_position(&mut self.link, CFW_SHUTTER_CLOSED)?;
                self.restore_cfw_position = true;
            } else if self.shutter_mode == ShutterMode::Open && position == CFW_SHUTTER_CLOSED {
                cfw::goto_position(&mut self.link, CFW_SHUTTER_OPEN)?;
                self.restore_cfw_position = true;
            }
        }

        log::debug!(
            "starting {:?} exposure of {:.3}s",
            self.channel,
            exposure.as_secs_f64()
        );
        let params = StartExposureParams {
            ccd: self.channel.code() | flags,
            exposure_time: encoded,
            abg_state: self.abg_mode,
            open_shutter: self.shutter_mode,
            readout_mode: self.readout_mode.0,
            top: self.top,
            left: self.left,
            height: self.height,
            width: self.width,
        };
        match self.link.invoke(Command::StartExposure(params))? {
            Response::Ack => Ok(()),
            _ => Err(Error::UnexpectedResponse),
        }
    }

    /// Progress of the running exposure. The device packs both
    /// channels into one status word; imaging reads bits 0-1, tracking
    /// bits 2-3.
    pub fn exposure_status(&mut self) -> Result<ExposureState> {
        let status = match self.link.invoke(Command::QueryExposureStatus)? {
            Response::Status(status) => status,
            _ => return Err(Error::UnexpectedResponse),
        };
        let bits = match self.channel {
            Channel::Imaging => status & 3,
            Channel::Tracking => (status >> 2) & 3,
        };
        Ok(ExposureState::from_bits(bits))
    }

    /// Stop integrating. A pending filter wheel restore runs first; if
    /// it fails the end-exposure command is not issued and the restore
    /// stays pending, so calling again retries it.
    pub fn end_exposure(&mut self, flags: u16) -> Result<()> {
        if self.restore_cfw_position {
            cfw::goto_position(&mut self.link, self.last_cfw_position)?;
            self.restore_cfw_position = false;
        }
        log::debug!("ending {:?} exposure", self.channel);
        let params = EndExposureParams {
            ccd: self.channel.code() | flags,
        };
        match self.link.invoke(Command::EndExposure(params))? {
            Response::Ack => Ok(()),
            _ => Err(Error::UnexpectedResponse),
        }
    }

    /// Stream the exposed window into the frame buffer.
    pub fn readout(&mut self) -> Result<()> {
        self.readout_frame(false)
    }

    /// Stream the exposed window into the frame buffer with on-camera
    /// dark frame subtraction.
    pub fn readout_subtract(&mut self) -> Result<()> {
        self.readout_frame(true)
    }

    fn readout_frame(&mut self, subtract_dark: bool) -> Result<()> {
        log::debug!(
            "reading out {}x{} window at ({}, {})",
            self.width,
            self.height,
            self.top,
            self.left
        );
        let params = StartReadoutParams {
            ccd: self.channel.code(),
            readout_mode: self.readout_mode.0,
            top: self.top,
            left: self.left,
            height: self.height,
            width: self.width,
        };
        match self.link.invoke(Command::StartReadout(params))? {
            Response::Ack => {}
            _ => return Err(Error::UnexpectedResponse),
        }

        // Rows stream in device line order, top to bottom. A failed row
        // aborts the rest and skips end-readout.
        let line = ReadoutLineParams {
            ccd: self.channel.code(),
            readout_mode: self.readout_mode.0,
            pixel_start: self.left,
            pixel_length: self.width,
        };
        let width = usize::from(self.width);
        for row in 0..usize::from(self.height) {
            let command = if subtract_dark {
                Command::ReadSubtractLine(line)
            } else {
                Command::ReadLine(line)
            };
            let pixels = match self.link.invoke(command)? {
                Response::Line(pixels) => pixels,
                _ => return Err(Error::UnexpectedResponse),
            };
            if pixels.len() != width {
                return Err(Error::UnexpectedResponse);
            }
            self.frame[row * width..(row + 1) * width].copy_from_slice(&pixels);
        }

        let params = EndReadoutParams {
            ccd: self.channel.code(),
        };
        match self.link.invoke(Command::EndReadout(params))? {
            Response::Ack => Ok(()),
            _ => Err(Error::UnexpectedResponse),
        }
    }

    /// Convert a Bayer frame in place. Only the `"monochrome"` target
    /// (any case-insensitive prefix of it) is supported, and only on
    /// Bayer sensors.
    pub fn color_convert(&mut self, method: &str) -> Result<()> {
        if self.color != ColorSensor::Bayer {
            return Err(Error::InvalidParameter);
        }
        if method.is_empty() || !"monochrome".starts_with(&method.to_ascii_lowercase()) {
            return Err(Error::InvalidParameter);
        }
        log::debug!("converting {}x{} Bayer frame to mono", self.width, self.height);
        self.frame = bayer_to_mono(&self.frame, usize::from(self.width), usize::from(self.height));
        Ok(())
    }

    /// Suggested `(black, white)` display stretch for the current
    /// frame; the buffer is not modified.
    pub fn auto_contrast(&self) -> (i32, i32) {
        auto_contrast(&self.frame)
    }

    /// Brightest sample in the frame.
    pub fn max_value(&self) -> u16 {
        self.frame.iter().copied().max().unwrap_or(0)
    }

    /// Frame contents, row-major, current window height x width.
    pub fn data(&self) -> &[u16] {
        &self.frame
    }

    /// Duration requested by the latest start-exposure.
    pub fn exposure_time(&self) -> Duration {
        self.exposure_time
    }

    /// Wall-clock time of the latest start-exposure.
    pub fn exposure_start(&self) -> Option<SystemTime> {
        self.exposure_start
    }

    /// Export the frame as a 16-bit binary PGM raster, big-endian
    /// samples, with the capture parameters in header comments.
    pub fn write_pgm<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let entry = self.mode_info(self.readout_mode)?;
        log::debug!("writing {}x{} PGM to {:?}", self.width, self.height, path.as_ref());

        let mut out = BufWriter::new(File::create(path)?);
        writeln!(out, "P5 {} {} 65535", self.width, self.height)?;
        writeln!(out, "# SBIG {}", camera_name(self.info.camera_type))?;
        writeln!(
            out,
            "# exposureTime {:.3} seconds",
            self.exposure_time.as_secs_f64()
        )?;
        writeln!(
            out,
            "# mode {} ({} x {}) {:.2} e-/ADU {:.2} x {:.2} microns",
            match self.readout_mode.binning() {
                0 => "high",
                1 => "medium",
                2 => "low",
                _ => "other",
            },
            entry.width,
            entry.height,
            gain_from_bcd(entry.gain),
            microns_from_bcd(entry.pixel_width),
            microns_from_bcd(entry.pixel_height),
        )?;
        for sample in &self.frame {
            out.write_all(&sample.to_be_bytes())?;
        }
        out.flush()?;
        Ok(())
    }
}
