//! Frame orchestrator
//!
//! Owns the registered strips and the injected channel pool. `show` encodes
//! every transmission unit, submits all of them and drains the pool exactly
//! once, so strips on separate channels go out in parallel.

use alloc::vec::Vec as AllocVec;

use embassy_time::Duration;
use heapless::Vec;

#[cfg(feature = "esp32-log")]
use esp_println::println;

use crate::clock::Clock;
use crate::encoder::{ChannelCapability, EncodePlan, LaneSpec, MAX_LANES, Waveform, validate_length};
use crate::error::{ConfigurationError, RequestError, TransmitError};
use crate::pixels::{ColorOrder, write_rgb};
use crate::pool::{ChannelPool, SubmitError, Ticket, TransmitRequest};
use crate::protocol::Protocol;
use crate::transmit::{ChannelId, TransmitDriver};

/// Default deadline for one frame's transmissions.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_millis(100);

/// Configuration for the strip controller
#[derive(Debug, Clone, Copy)]
pub struct ControllerConfig {
    /// Deadline passed to `drain` by `show`
    pub drain_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

/// Where a strip's data line is attached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputTarget {
    /// Dedicated output; the strip is a transmission of its own
    Pin(u8),
    /// One lane of a multi-lane group sharing a transmission
    Lane { group: u8, lane: u8 },
}

/// Handle of a registered strip
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StripId(pub u8);

impl StripId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Outcome of one strip in a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StripStatus {
    Success,
    Failed(TransmitError),
    TimedOut,
}

impl StripStatus {
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl From<Result<(), RequestError>> for StripStatus {
    fn from(result: Result<(), RequestError>) -> Self {
        match result {
            Ok(()) => Self::Success,
            Err(RequestError::Transmit(err)) => Self::Failed(err),
            Err(RequestError::Timeout) => Self::TimedOut,
        }
    }
}

/// Per-strip entry of a [`FrameResult`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripReport {
    pub id: StripId,
    pub status: StripStatus,
    /// Channel that carried the strip this frame
    pub channel: Option<ChannelId>,
}

/// Aggregated outcome of one `show`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameResult<const MAX_STRIPS: usize> {
    reports: Vec<StripReport, MAX_STRIPS>,
    elapsed: Duration,
}

impl<const MAX_STRIPS: usize> FrameResult<MAX_STRIPS> {
    /// Reports in registration order
    pub fn reports(&self) -> &[StripReport] {
        &self.reports
    }

    pub fn status(&self, id: StripId) -> Option<StripStatus> {
        self.report(id).map(|r| r.status)
    }

    pub fn report(&self, id: StripId) -> Option<&StripReport> {
        self.reports.iter().find(|r| r.id == id)
    }

    /// Wall time spent draining the pool
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn is_success(&self) -> bool {
        self.reports.iter().all(|r| r.status.is_success())
    }

    pub fn success_count(&self) -> usize {
        self.reports.iter().filter(|r| r.status.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.reports.len() - self.success_count()
    }
}

struct LogicalStrip<'a> {
    target: OutputTarget,
    pixels: &'a mut [u8],
    protocol: Protocol,
}

impl LogicalStrip<'_> {
    fn lane_spec(&self) -> LaneSpec {
        let lane = match self.target {
            OutputTarget::Lane { lane, .. } => lane,
            OutputTarget::Pin(_) => 0,
        };
        LaneSpec {
            lane,
            protocol: self.protocol,
        }
    }
}

/// One physical transmission: a single strip or a lane group
struct TransmissionUnit {
    group: Option<u8>,
    members: Vec<usize, MAX_LANES>,
    plan: EncodePlan,
    waveform: Option<Waveform>,
}

/// Per-frame entry point driving every registered strip
pub struct StripController<'a, D, C, const MAX_STRIPS: usize, const K: usize>
where
    D: TransmitDriver,
    C: Clock,
{
    pool: ChannelPool<'a, D, C, K, MAX_STRIPS>,
    config: ControllerConfig,
    strips: Vec<LogicalStrip<'a>, MAX_STRIPS>,
    units: Vec<TransmissionUnit, MAX_STRIPS>,
    last_result: Option<FrameResult<MAX_STRIPS>>,
}

impl<'a, D, C, const MAX_STRIPS: usize, const K: usize> StripController<'a, D, C, MAX_STRIPS, K>
where
    D: TransmitDriver,
    C: Clock,
{
    pub fn new(pool: ChannelPool<'a, D, C, K, MAX_STRIPS>) -> Self {
        Self::with_config(pool, ControllerConfig::default())
    }

    pub fn with_config(pool: ChannelPool<'a, D, C, K, MAX_STRIPS>, config: ControllerConfig) -> Self {
        Self {
            pool,
            config,
            strips: Vec::new(),
            units: Vec::new(),
            last_result: None,
        }
    }

    pub fn capability(&self) -> ChannelCapability {
        self.pool.capability()
    }

    pub fn pool(&self) -> &ChannelPool<'a, D, C, K, MAX_STRIPS> {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut ChannelPool<'a, D, C, K, MAX_STRIPS> {
        &mut self.pool
    }

    pub const fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn strip_count(&self) -> usize {
        self.strips.len()
    }

    /// Outcome of the most recent `show`
    pub fn last_result(&self) -> Option<&FrameResult<MAX_STRIPS>> {
        self.last_result.as_ref()
    }

    /// Register a strip.
    ///
    /// Validation happens here: a rejected strip is not registered and
    /// does not affect strips registered before or after it.
    pub fn register_strip(
        &mut self,
        target: OutputTarget,
        pixels: &'a mut [u8],
        protocol: Protocol,
    ) -> Result<StripId, ConfigurationError> {
        let result = self.try_register(target, pixels, protocol);
        #[cfg(feature = "esp32-log")]
        if let Err(err) = &result {
            println!("controller: rejected strip on {:?}: {}", target, err);
        }
        result
    }

    fn try_register(
        &mut self,
        target: OutputTarget,
        pixels: &'a mut [u8],
        protocol: Protocol,
    ) -> Result<StripId, ConfigurationError> {
        if self.strips.is_full() {
            return Err(ConfigurationError::TooManyStrips);
        }
        validate_length(&protocol, pixels.len())?;

        let index = self.strips.len();
        let id = Self::strip_id(index)?;
        let strip = LogicalStrip {
            target,
            pixels,
            protocol,
        };

        match target {
            OutputTarget::Pin(_) => {
                if self.units.is_full() {
                    return Err(ConfigurationError::TooManyStrips);
                }
                let plan = EncodePlan::single(&protocol, self.capability(), strip.pixels.len())?;
                let mut members = Vec::new();
                let _ = members.push(index);
                let _ = self.units.push(TransmissionUnit {
                    group: None,
                    members,
                    plan,
                    waveform: None,
                });
            }
            OutputTarget::Lane { group, lane } => {
                let capability = self.capability();
                let existing = self.units.iter().position(|u| u.group == Some(group));
                match existing {
                    Some(unit_index) => {
                        let unit = &self.units[unit_index];
                        let mut specs: Vec<LaneSpec, MAX_LANES> = Vec::new();
                        for &member in &unit.members {
                            let spec = self.strips[member].lane_spec();
                            if spec.lane == lane {
                                return Err(ConfigurationError::LaneInUse { group, lane });
                            }
                            let _ = specs.push(spec);
                        }
                        specs
                            .push(strip.lane_spec())
                            .map_err(|_| ConfigurationError::LaneOutOfRange {
                                lane,
                                max_lanes: MAX_LANES as u8,
                            })?;
                        let plan = EncodePlan::lanes(capability, &specs)?;
                        let unit = &mut self.units[unit_index];
                        unit.plan = plan;
                        let _ = unit.members.push(index);
                    }
                    None => {
                        if self.units.is_full() {
                            return Err(ConfigurationError::TooManyStrips);
                        }
                        let plan = EncodePlan::lanes(capability, &[strip.lane_spec()])?;
                        let mut members = Vec::new();
                        let _ = members.push(index);
                        let _ = self.units.push(TransmissionUnit {
                            group: Some(group),
                            members,
                            plan,
                            waveform: None,
                        });
                    }
                }
            }
        }

        let _ = self.strips.push(strip);
        Ok(id)
    }

    /// Register a whole lane group at once, lanes numbered from 0.
    ///
    /// Equivalent to registering each strip on `OutputTarget::Lane`, but
    /// all-or-nothing: on error no strip of the group is registered.
    pub fn register_lane_group<I>(
        &mut self,
        group: u8,
        lanes: I,
    ) -> Result<Vec<StripId, MAX_LANES>, ConfigurationError>
    where
        I: IntoIterator<Item = (&'a mut [u8], Protocol)>,
    {
        if self.units.iter().any(|u| u.group == Some(group)) {
            return Err(ConfigurationError::LaneInUse { group, lane: 0 });
        }

        let mut pending: Vec<LogicalStrip<'a>, MAX_LANES> = Vec::new();
        for (lane, (pixels, protocol)) in lanes.into_iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let lane = lane as u8;
            validate_length(&protocol, pixels.len())?;
            pending
                .push(LogicalStrip {
                    target: OutputTarget::Lane { group, lane },
                    pixels,
                    protocol,
                })
                .map_err(|_| ConfigurationError::LaneOutOfRange {
                    lane,
                    max_lanes: MAX_LANES as u8,
                })?;
        }

        if self.strips.len() + pending.len() > MAX_STRIPS || self.units.is_full() {
            return Err(ConfigurationError::TooManyStrips);
        }
        let specs: Vec<LaneSpec, MAX_LANES> = pending.iter().map(LogicalStrip::lane_spec).collect();
        let plan = EncodePlan::lanes(self.capability(), &specs)?;
        Self::strip_id(self.strips.len() + pending.len().saturating_sub(1))?;

        let mut ids = Vec::new();
        let mut members = Vec::new();
        for strip in pending {
            let index = self.strips.len();
            #[allow(clippy::cast_possible_truncation)]
            let _ = ids.push(StripId(index as u8));
            let _ = members.push(index);
            let _ = self.strips.push(strip);
        }
        let _ = self.units.push(TransmissionUnit {
            group: Some(group),
            members,
            plan,
            waveform: None,
        });

        Ok(ids)
    }

    /// Mutable access to a strip's pixels between frames
    pub fn pixels_mut(&mut self, id: StripId) -> Option<&mut [u8]> {
        self.strips.get_mut(id.index()).map(|s| &mut *s.pixels)
    }

    pub fn pixels(&self, id: StripId) -> Option<&[u8]> {
        self.strips.get(id.index()).map(|s| &*s.pixels)
    }

    pub fn protocol(&self, id: StripId) -> Option<Protocol> {
        self.strips.get(id.index()).map(|s| s.protocol)
    }

    pub fn target(&self, id: StripId) -> Option<OutputTarget> {
        self.strips.get(id.index()).map(|s| s.target)
    }

    /// Pack RGB colors into a strip's buffer; returns pixels written
    pub fn write_rgb<I>(&mut self, id: StripId, order: ColorOrder, colors: I) -> usize
    where
        I: IntoIterator<Item = smart_leds::RGB8>,
    {
        self.pixels_mut(id)
            .map_or(0, |pixels| write_rgb(pixels, order, colors))
    }

    /// Encoded form of a strip's transmission unit for the current pixels
    pub fn encode(&self, id: StripId) -> Option<Waveform> {
        let unit = self
            .units
            .iter()
            .find(|u| u.members.contains(&id.index()))?;
        let buffers = self.unit_buffers(unit);
        let mut waveform = Waveform::Bytes(AllocVec::new());
        unit.plan.encode_into(&buffers, &mut waveform);
        Some(waveform)
    }

    /// Transmit every strip with the configured timeout
    pub fn show(&mut self) -> FrameResult<MAX_STRIPS> {
        self.show_with_timeout(self.config.drain_timeout)
    }

    pub fn show_timeout_ms(&mut self, timeout_ms: u64) -> FrameResult<MAX_STRIPS> {
        self.show_with_timeout(Duration::from_millis(timeout_ms))
    }

    /// Encode and submit every unit, then drain once.
    ///
    /// Failures are collected per strip; a failing strip never keeps the
    /// others from being sent and is retried on the next call.
    pub fn show_with_timeout(&mut self, timeout: Duration) -> FrameResult<MAX_STRIPS> {
        let mut submitted: Vec<(usize, Result<Ticket, TransmitError>), MAX_STRIPS> = Vec::new();

        for (unit_index, unit) in self.units.iter_mut().enumerate() {
            let mut waveform = unit
                .waveform
                .take()
                .unwrap_or_else(|| Waveform::Bytes(AllocVec::new()));
            {
                let buffers: Vec<&[u8], MAX_LANES> = unit
                    .members
                    .iter()
                    .map(|&member| &*self.strips[member].pixels)
                    .collect();
                unit.plan.encode_into(&buffers, &mut waveform);
            }

            #[allow(clippy::cast_possible_truncation)]
            let request = TransmitRequest {
                owner: unit_index as u16,
                waveform,
            };
            let ticket = match self.pool.submit(request) {
                Ok(ticket) => Ok(ticket),
                Err(SubmitError::QueueFull(request)) => {
                    unit.waveform = Some(request.waveform);
                    Err(TransmitError::QueueFull)
                }
            };
            let _ = submitted.push((unit_index, ticket));
        }

        let report = self.pool.drain(timeout);
        #[cfg(feature = "esp32-log")]
        if report.timed_out > 0 {
            println!(
                "controller: frame timed out, {} transmissions reset",
                report.timed_out
            );
        }

        let mut unit_status: Vec<(StripStatus, Option<ChannelId>), MAX_STRIPS> = Vec::new();
        for (unit_index, ticket) in submitted {
            let outcome = match ticket {
                Ok(ticket) => match self.pool.take_completed(ticket) {
                    Some(completed) => {
                        self.units[unit_index].waveform = Some(completed.waveform);
                        (StripStatus::from(completed.result), completed.channel)
                    }
                    None => (StripStatus::TimedOut, None),
                },
                Err(err) => (StripStatus::Failed(err), None),
            };
            let _ = unit_status.push(outcome);
        }

        let mut reports = Vec::new();
        for (index, _) in self.strips.iter().enumerate() {
            let (status, channel) = self
                .units
                .iter()
                .position(|u| u.members.contains(&index))
                .and_then(|unit_index| unit_status.get(unit_index).copied())
                .unwrap_or((StripStatus::TimedOut, None));
            #[allow(clippy::cast_possible_truncation)]
            let _ = reports.push(StripReport {
                id: StripId(index as u8),
                status,
                channel,
            });
        }

        let result = FrameResult {
            reports,
            elapsed: report.elapsed,
        };
        self.last_result = Some(result.clone());
        result
    }

    fn unit_buffers<'s>(&'s self, unit: &TransmissionUnit) -> Vec<&'s [u8], MAX_LANES> {
        unit.members
            .iter()
            .map(|&member| &*self.strips[member].pixels)
            .collect()
    }

    fn strip_id(index: usize) -> Result<StripId, ConfigurationError> {
        u8::try_from(index)
            .map(StripId)
            .map_err(|_| ConfigurationError::TooManyStrips)
    }
}
