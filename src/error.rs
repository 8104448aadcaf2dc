/// Faults reported by collaborators.
///
/// Only start-up and raw sensor reads can fail; the tick path turns these into state
/// rather than propagating them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The IMU did not answer during bring-up.
    ImuInit,
    /// A sample could not be read from the IMU.
    ImuRead,
    /// The receiver link could not be opened.
    Receiver,
    /// An outgoing frame was dropped because the queue was full.
    BufferFull,
}

pub type Result<T> = core::result::Result<T, Error>;
