#![no_std]

extern crate alloc;

pub mod chipset;
pub mod clock;
pub mod controller;
pub mod encoder;
pub mod error;
pub mod event_queue;
pub mod frame_scheduler;
pub mod pixels;
pub mod pool;
pub mod protocol;
pub mod transmit;

pub use chipset::Chipset;
pub use clock::{Clock, SystemClock};
pub use controller::{
    ControllerConfig, FrameResult, OutputTarget, StripController, StripId, StripReport,
    StripStatus,
};
pub use encoder::{BusKind, ChannelCapability, EncodePlan, Pulse, Waveform, encode};
pub use error::{ConfigurationError, RequestError, TransmitError};
pub use event_queue::{EventQueue, EventReceiver, EventSender};
pub use frame_scheduler::{FrameScheduler, FrameTick};
pub use pixels::{ColorOrder, PixelWriter};
pub use pool::{ChannelPool, DrainReport, PoolStats, Ticket, TicketState, TransmitRequest};
pub use protocol::{ClockedChipset, Protocol, ProtocolTiming};
pub use transmit::{
    ChannelId, CompletionEvent, CompletionQueue, CompletionReceiver, CompletionSender,
    TransferToken, TransmitDriver, TransmitPlatform,
};

pub use embassy_time::{Duration, Instant};
