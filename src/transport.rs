use crate::{
    ccd::Ccd,
    command::{Command, Response},
    error::{Error, Result},
    types::Channel,
};

/// Blocking command/response link to the device driver.
///
/// Every camera and filter wheel interaction is one `invoke` call that
/// blocks until the driver responds. Implementations map driver status
/// codes to [`Error::Device`], and a filter wheel fault reported on the
/// dedicated error status to [`Error::FilterWheel`].
///
/// [`Error::Device`]: crate::Error::Device
/// [`Error::FilterWheel`]: crate::Error::FilterWheel
pub trait Transport {
    fn invoke(&mut self, command: Command) -> Result<Response>;

    /// Consume the link and open a channel on it.
    fn open_ccd(self, channel: Channel) -> Result<Ccd<Self>>
    where
        Self: Sized,
    {
        Ccd::new(self, channel)
    }
}

/// Single link-status call; returns the camera type code, see
/// [`crate::camera_name`].
pub fn establish_link<T: Transport>(link: &mut T) -> Result<u16> {
    match link.invoke(Command::EstablishLink)? {
        Response::Link(results) => Ok(results.camera_type),
        _ => Err(Error::UnexpectedResponse),
    }
}
