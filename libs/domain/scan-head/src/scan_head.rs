use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use pinchot_model::config::{set_flags, DirtyFlag, DirtyFlags};
use pinchot_model::{
    DataType, FirmwareVersion, Profile, ProductType, ScanHeadConfiguration, ScanWindow,
};
use pinchot_queue::{CancellationToken, FrameQueue, QueueStats};
use pinchot_wire::{
    ControlRequest, ControlResponse, ScanHeadCapabilities, ScanHeadStatus, ScanMode,
};

use crate::error::ScanHeadError;
use crate::state::{Operation, ScanHeadState};
use crate::transport::ControlTransport;

/// Mounting alignment: roll angle plus a translation, applied to raw camera
/// points before they are reported in system units. Settable only while
/// `Disconnected`, like `SetOrientation`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Alignment {
    pub roll_radians: f64,
    pub shift_x: f64,
    pub shift_y: f64,
}

impl Default for Alignment {
    fn default() -> Self {
        Self {
            roll_radians: 0.0,
            shift_x: 0.0,
            shift_y: 0.0,
        }
    }
}

/// Physical cable-routing orientation of the head, affecting which way
/// profile X increases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    CableIsUpstream,
    CableIsDownstream,
}

impl Default for Orientation {
    fn default() -> Self {
        Orientation::CableIsDownstream
    }
}

/// Per-head counters surfaced via `RequestStatus`; late and incomplete
/// drops are counted, never surfaced as errors (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanHeadCounters {
    pub late_drop_count: u64,
    pub incomplete_drop_count: u64,
    pub profiles_sent_count: u64,
}

struct Inner {
    state: ScanHeadState,
    configuration: ScanHeadConfiguration,
    window: ScanWindow,
    alignment: Alignment,
    orientation: Orientation,
    exclusion_mask: Vec<u8>,
    brightness_correction: Vec<u8>,
    dirty: DirtyFlags,
    capabilities: Option<ScanHeadCapabilities>,
    counters: ScanHeadCounters,
    global_time_ns: u64,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            state: ScanHeadState::Disconnected,
            configuration: ScanHeadConfiguration::default(),
            window: ScanWindow::unconstrained(),
            alignment: Alignment::default(),
            orientation: Orientation::default(),
            exclusion_mask: Vec::new(),
            brightness_correction: Vec::new(),
            dirty: DirtyFlags::empty(),
            capabilities: None,
            counters: ScanHeadCounters::default(),
            global_time_ns: 0,
        }
    }
}

/// One scan head as seen by the client: a state machine, a set of
/// locally-held settings with dirty tracking, and, once scanning, the
/// per-element queues the receiver publishes into.
///
/// Ownership is one-way (§9 design notes): the `ScanSystem` owns `ScanHead`
/// instances; a head never holds an owning reference back to the system.
pub struct ScanHead {
    pub head_id: u32,
    pub serial: u32,
    pub product_type: ProductType,
    pub firmware_version: FirmwareVersion,
    inner: AsyncMutex<Inner>,
    transport: AsyncMutex<Option<Arc<dyn ControlTransport>>>,
    queues: AsyncMutex<Vec<Arc<FrameQueue>>>,
}

impl ScanHead {
    pub fn new(
        head_id: u32,
        serial: u32,
        product_type: ProductType,
        firmware_version: FirmwareVersion,
    ) -> Self {
        Self {
            head_id,
            serial,
            product_type,
            firmware_version,
            inner: AsyncMutex::new(Inner::default()),
            transport: AsyncMutex::new(None),
            queues: AsyncMutex::new(Vec::new()),
        }
    }

    pub async fn state(&self) -> ScanHeadState {
        self.inner.lock().await.state
    }

    pub async fn dirty_flags(&self) -> DirtyFlags {
        self.inner.lock().await.dirty
    }

    pub async fn configuration(&self) -> ScanHeadConfiguration {
        self.inner.lock().await.configuration
    }

    pub async fn window(&self) -> ScanWindow {
        self.inner.lock().await.window.clone()
    }

    pub async fn counters(&self) -> ScanHeadCounters {
        self.inner.lock().await.counters
    }

    /// Installs the transport used for control-channel requests and marks
    /// the head `Connected`. Called by the orchestrator once its connect
    /// attempt to this head succeeds.
    pub async fn mark_connected(&self, transport: Arc<dyn ControlTransport>) {
        *self.transport.lock().await = Some(transport);
        let mut inner = self.inner.lock().await;
        inner.state = ScanHeadState::Connected;
    }

    pub async fn configure(&self, configuration: ScanHeadConfiguration) -> Result<(), ScanHeadError> {
        configuration
            .validate()
            .map_err(|e| ScanHeadError::InvalidArgument(e.to_string()))?;
        let mut inner = self.inner.lock().await;
        inner.state.check(Operation::Configure)?;
        inner.configuration = configuration;
        inner.dirty.insert(DirtyFlags::CONFIGURATION);
        Ok(())
    }

    pub async fn set_window(&self, window: ScanWindow) -> Result<(), ScanHeadError> {
        let mut inner = self.inner.lock().await;
        inner.state.check(Operation::SetWindow)?;
        inner.window = window;
        inner.dirty.insert(DirtyFlags::WINDOW);
        Ok(())
    }

    pub async fn set_alignment(&self, alignment: Alignment) -> Result<(), ScanHeadError> {
        let mut inner = self.inner.lock().await;
        inner.state.check(Operation::SetAlignment)?;
        inner.alignment = alignment;
        Ok(())
    }

    pub async fn set_orientation(&self, orientation: Orientation) -> Result<(), ScanHeadError> {
        let mut inner = self.inner.lock().await;
        inner.state.check(Operation::SetOrientation)?;
        inner.orientation = orientation;
        Ok(())
    }

    pub async fn set_exclusion_mask(&self, mask: Vec<u8>) -> Result<(), ScanHeadError> {
        let mut inner = self.inner.lock().await;
        inner.exclusion_mask = mask;
        inner.dirty.insert(DirtyFlags::EXCLUSION_MASK);
        Ok(())
    }

    pub async fn set_brightness_correction(&self, correction: Vec<u8>) -> Result<(), ScanHeadError> {
        let mut inner = self.inner.lock().await;
        inner.brightness_correction = correction;
        inner.dirty.insert(DirtyFlags::BRIGHTNESS_CORRECTION);
        Ok(())
    }

    pub async fn dispose(&self) -> Result<(), ScanHeadError> {
        let inner = self.inner.lock().await;
        inner.state.check(Operation::Dispose)
    }

    /// Drains all dirty flags atomically by pushing every dirty facet to
    /// the head over the control channel, in the order `set_flags` yields
    /// them. A repeat call with nothing changed since the last upload is a
    /// no-op: no dirty bits, no requests sent.
    #[instrument(skip(self), fields(head_id = self.head_id))]
    pub async fn apply_configuration(&self, deadline: Instant) -> Result<(), ScanHeadError> {
        let transport = self.require_transport().await?;

        let (dirty, configuration, window, exclusion_mask, brightness_correction) = {
            let inner = self.inner.lock().await;
            inner.state.check(Operation::ApplyConfiguration)?;
            (
                inner.dirty,
                inner.configuration,
                inner.window.clone(),
                inner.exclusion_mask.clone(),
                inner.brightness_correction.clone(),
            )
        };

        for flag in set_flags(dirty) {
            let request = match flag {
                DirtyFlag::Configuration => ControlRequest::ApplyConfiguration {
                    snapshot: configuration,
                    dirty_mask: dirty,
                },
                DirtyFlag::Window => ControlRequest::SetWindow {
                    window: serde_json::to_value(&window).map_err(|e| {
                        ScanHeadError::InvalidArgument(format!("window serialization: {e}"))
                    })?,
                },
                DirtyFlag::ExclusionMask => ControlRequest::SetExclusionMask {
                    mask: exclusion_mask.clone(),
                },
                DirtyFlag::BrightnessCorrection => ControlRequest::SetBrightnessCorrection {
                    correction: brightness_correction.clone(),
                },
            };
            match transport.send(request, deadline).await? {
                ControlResponse::Ack => {}
                ControlResponse::Rejected { reason } => {
                    return Err(ScanHeadError::InvalidArgument(reason));
                }
                other => {
                    warn!(?other, "unexpected response to configuration upload");
                }
            }
        }

        self.inner.lock().await.dirty = DirtyFlags::empty();
        Ok(())
    }

    #[instrument(skip(self), fields(head_id = self.head_id))]
    pub async fn request_status(&self, deadline: Instant) -> Result<ScanHeadStatus, ScanHeadError> {
        let transport = self.require_transport().await?;
        {
            let inner = self.inner.lock().await;
            inner.state.check(Operation::RequestStatus)?;
        }
        match transport.send(ControlRequest::GetStatus, deadline).await? {
            ControlResponse::Status(status) => {
                let mut inner = self.inner.lock().await;
                inner.global_time_ns = status.global_time_ns;
                inner.counters = ScanHeadCounters {
                    late_drop_count: status.late_drop_count,
                    incomplete_drop_count: status.incomplete_drop_count,
                    profiles_sent_count: status.profiles_sent_count,
                };
                Ok(status)
            }
            ControlResponse::Rejected { reason } => Err(ScanHeadError::InvalidArgument(reason)),
            _ => Err(ScanHeadError::InvalidArgument(
                "unexpected control response to GetStatus".into(),
            )),
        }
    }

    pub async fn request_capabilities(
        &self,
        deadline: Instant,
    ) -> Result<ScanHeadCapabilities, ScanHeadError> {
        let transport = self.require_transport().await?;
        match transport
            .send(ControlRequest::GetCapabilities, deadline)
            .await?
        {
            ControlResponse::Capabilities(capabilities) => {
                self.inner.lock().await.capabilities = Some(capabilities);
                Ok(capabilities)
            }
            ControlResponse::Rejected { reason } => Err(ScanHeadError::InvalidArgument(reason)),
            _ => Err(ScanHeadError::InvalidArgument(
                "unexpected control response to GetCapabilities".into(),
            )),
        }
    }

    /// Uploads any pending configuration, then issues `StartScanning` and
    /// allocates fresh per-element queues sized `queue_capacity_per_element`
    /// each. `element_count` is this head's contribution to the active
    /// phase table, decided by the orchestrator.
    #[instrument(skip(self), fields(head_id = self.head_id))]
    pub async fn start_scanning(
        &self,
        element_count: usize,
        queue_capacity_per_element: usize,
        period_us: u32,
        data_format: DataType,
        mode: ScanMode,
        deadline: Instant,
    ) -> Result<(), ScanHeadError> {
        if element_count == 0 {
            return Err(ScanHeadError::InvalidArgument(
                "element_count must be at least 1".into(),
            ));
        }

        {
            let inner = self.inner.lock().await;
            inner.state.check(Operation::StartScanning)?;
        }

        self.apply_configuration(deadline).await?;

        let transport = self.require_transport().await?;
        match transport
            .send(
                ControlRequest::StartScanning {
                    period_us,
                    data_format,
                    mode,
                },
                deadline,
            )
            .await?
        {
            ControlResponse::Ack => {}
            ControlResponse::Rejected { reason } => return Err(ScanHeadError::InvalidArgument(reason)),
            other => warn!(?other, "unexpected response to StartScanning"),
        }

        let fresh_queues: Vec<Arc<FrameQueue>> = (0..element_count)
            .map(|_| Arc::new(FrameQueue::new(queue_capacity_per_element)))
            .collect();
        *self.queues.lock().await = fresh_queues;

        let mut inner = self.inner.lock().await;
        inner.state = ScanHeadState::Scanning;
        info!(element_count, queue_capacity_per_element, "scanning started");
        Ok(())
    }

    /// Sends `StopScanning`, wakes every blocked `try_take_next_profile`
    /// caller with `Stopped`, and returns to `Connected`. Best-effort: a
    /// transport failure still completes the local transition so the
    /// caller is never left thinking scanning is active when it is not.
    #[instrument(skip(self), fields(head_id = self.head_id))]
    pub async fn stop_scanning(&self, deadline: Instant) -> Result<(), ScanHeadError> {
        {
            let inner = self.inner.lock().await;
            inner.state.check(Operation::StopScanning)?;
        }

        if let Some(transport) = self.transport.lock().await.clone() {
            if let Err(error) = transport.send(ControlRequest::StopScanning, deadline).await {
                warn!(?error, "StopScanning request failed; stopping locally anyway");
            }
        }

        for queue in self.queues.lock().await.iter() {
            queue.wake_all_with_stop();
        }

        let mut inner = self.inner.lock().await;
        inner.state = ScanHeadState::Connected;
        Ok(())
    }

    pub async fn disconnect(&self) -> Result<(), ScanHeadError> {
        let mut inner = self.inner.lock().await;
        inner.state.check(Operation::Disconnect)?;
        inner.state = ScanHeadState::Disconnected;
        drop(inner);
        *self.transport.lock().await = None;
        self.queues.lock().await.clear();
        Ok(())
    }

    pub async fn element_queue(&self, element_index: usize) -> Option<Arc<FrameQueue>> {
        self.queues.lock().await.get(element_index).cloned()
    }

    pub async fn element_count(&self) -> usize {
        self.queues.lock().await.len()
    }

    pub async fn queue_stats(&self, element_index: usize) -> Option<QueueStats> {
        self.queues
            .lock()
            .await
            .get(element_index)
            .map(|q| q.stats())
    }

    #[instrument(skip(self, cancel), fields(head_id = self.head_id, element_index))]
    pub async fn try_take_next_profile(
        &self,
        element_index: usize,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Profile, ScanHeadError> {
        {
            let inner = self.inner.lock().await;
            inner.state.check(Operation::TryTakeNextProfile)?;
        }
        let queue = self
            .element_queue(element_index)
            .await
            .ok_or_else(|| ScanHeadError::InvalidArgument(format!("no such element {element_index}")))?;
        Ok(queue.dequeue(timeout, cancel).await?)
    }

    async fn require_transport(&self) -> Result<Arc<dyn ControlTransport>, ScanHeadError> {
        self.transport
            .lock()
            .await
            .clone()
            .ok_or(ScanHeadError::NotConnected)
    }
}
