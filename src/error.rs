//! Error types for strip registration and transmission

use core::fmt;

/// Rejected strip or channel configuration.
///
/// Raised synchronously from registration and fatal only to the strip
/// being registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Pixel buffer length is not a multiple of the chipset component count
    InvalidLength { len: usize, components: u8 },
    /// Timing cannot be produced by the channel's encoder
    UnrepresentableTiming,
    /// Protocol family is not supported by the channel or bus
    UnsupportedProtocol,
    /// Lane index exceeds the bus lane count
    LaneOutOfRange { lane: u8, max_lanes: u8 },
    /// Lane already carries another strip
    LaneInUse { group: u8, lane: u8 },
    /// Lanes of one group cannot share a transmission
    IncompatibleLanes,
    /// Strip registry is full
    TooManyStrips,
    /// Platform reports more channels than the pool can hold
    TooManyChannels { available: usize, capacity: usize },
    /// Platform has no transmission channels
    NoChannels,
    /// Platform refused to open a channel
    ChannelUnavailable,
    /// Channels of one pool report different capabilities
    MixedChannels,
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLength { len, components } => write!(
                f,
                "Buffer length {} is not a multiple of {} components",
                len, components
            ),
            Self::UnrepresentableTiming => write!(f, "Timing is not representable by the channel"),
            Self::UnsupportedProtocol => write!(f, "Protocol is not supported by the channel"),
            Self::LaneOutOfRange { lane, max_lanes } => {
                write!(f, "Lane {} is out of range (max {})", lane, max_lanes)
            }
            Self::LaneInUse { group, lane } => {
                write!(f, "Lane {} of group {} is already in use", lane, group)
            }
            Self::IncompatibleLanes => write!(f, "Lanes cannot share one transmission"),
            Self::TooManyStrips => write!(f, "Maximum strips reached"),
            Self::TooManyChannels {
                available,
                capacity,
            } => write!(
                f,
                "Platform has {} channels, pool holds {}",
                available, capacity
            ),
            Self::NoChannels => write!(f, "No transmission channels"),
            Self::ChannelUnavailable => write!(f, "Transmission channel unavailable"),
            Self::MixedChannels => write!(f, "Channels report different capabilities"),
        }
    }
}

/// Per-request transmission failure.
///
/// Reported through the request's ticket and the frame result, never
/// raised mid-frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmitError {
    /// Peripheral reported a fault
    Hardware,
    /// DMA descriptor or bus error
    Dma,
    /// Peripheral ran out of symbols before the end of the buffer
    Underrun,
    /// Request queue was full at submission
    QueueFull,
    /// Transfer was cancelled by the caller
    Cancelled,
}

impl fmt::Display for TransmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hardware => write!(f, "Hardware fault"),
            Self::Dma => write!(f, "DMA error"),
            Self::Underrun => write!(f, "Transmit underrun"),
            Self::QueueFull => write!(f, "Request queue full"),
            Self::Cancelled => write!(f, "Transfer cancelled"),
        }
    }
}

/// Final failure of one transmit request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestError {
    /// Hardware or queue failure
    Transmit(TransmitError),
    /// Not finished before the drain deadline; the channel was reset
    Timeout,
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transmit(e) => write!(f, "Transmit error: {}", e),
            Self::Timeout => write!(f, "Transmission timed out"),
        }
    }
}

impl From<TransmitError> for RequestError {
    fn from(e: TransmitError) -> Self {
        Self::Transmit(e)
    }
}
