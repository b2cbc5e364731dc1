use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use pinchot_discovery::{DiscoveryRecord, DiscoveryService};
use pinchot_model::{DataType, FirmwareVersion, Frame, PhaseElement, ProductType, Profile, Units};
use pinchot_phase::{validate_phase_table, PhaseTable};
use pinchot_profile_receiver::ProfileReceiver;
use pinchot_queue::{CancellationToken, FrameAssembler, FrameQueue};
use pinchot_scan_head::{ScanHead, ScanHeadState};
use pinchot_wire::{ControlRequest, ScanMode};

use crate::calibration::CalibrationSource;
use crate::config::SystemConfig;
use crate::error::ScanSystemError;
use crate::timing::TimingSnapshot;
use crate::transport_factory::ControlTransportFactory;

/// Network endpoints for one head: where its control channel listens, and
/// the local address its profile receiver binds to receive its data
/// datagrams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadEndpoint {
    pub control_addr: SocketAddr,
    pub data_bind_addr: SocketAddr,
}

struct HeadEntry {
    head: Arc<ScanHead>,
    endpoint: HeadEndpoint,
}

struct ReceiverHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Orchestrates a fleet of `ScanHead`s: fans `Connect`/`StartScanning`/
/// `StopScanning` out across every registered head, aggregates partial
/// failures, and owns the frame assembler over the active phase table
/// (§4.9). A head never holds a reference back to its owning system:
/// ownership is strictly one-way.
pub struct ScanSystem {
    config: SystemConfig,
    transport_factory: Arc<dyn ControlTransportFactory>,
    calibration: Arc<dyn CalibrationSource>,
    heads: AsyncMutex<HashMap<u32, HeadEntry>>,
    order: AsyncMutex<Vec<u32>>,
    phase_table: AsyncMutex<Option<PhaseTable>>,
    receivers: AsyncMutex<HashMap<u32, ReceiverHandle>>,
    assembler: AsyncMutex<Option<Arc<FrameAssembler>>>,
}

impl ScanSystem {
    pub fn new(
        config: SystemConfig,
        transport_factory: Arc<dyn ControlTransportFactory>,
        calibration: Arc<dyn CalibrationSource>,
    ) -> Self {
        Self {
            config,
            transport_factory,
            calibration,
            heads: AsyncMutex::new(HashMap::new()),
            order: AsyncMutex::new(Vec::new()),
            phase_table: AsyncMutex::new(None),
            receivers: AsyncMutex::new(HashMap::new()),
            assembler: AsyncMutex::new(None),
        }
    }

    pub fn units(&self) -> Units {
        self.config.units
    }

    /// Runs one discovery sweep; a convenience wrapper so callers do not
    /// need to depend on `pinchot-discovery` directly just to find heads
    /// before creating them.
    pub async fn discover(
        broadcast_addr: SocketAddr,
        bind_addr: SocketAddr,
    ) -> Result<Vec<DiscoveryRecord>, ScanSystemError> {
        Ok(DiscoveryService::new(broadcast_addr, bind_addr)
            .discover()
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn create_scan_head(
        &self,
        head_id: u32,
        serial: u32,
        product_type: ProductType,
        firmware_version: FirmwareVersion,
        endpoint: HeadEndpoint,
    ) -> Result<Arc<ScanHead>, ScanSystemError> {
        let mut heads = self.heads.lock().await;
        if heads.contains_key(&head_id) {
            return Err(ScanSystemError::DuplicateHeadId(head_id));
        }
        let head = Arc::new(ScanHead::new(head_id, serial, product_type, firmware_version));
        heads.insert(
            head_id,
            HeadEntry {
                head: head.clone(),
                endpoint,
            },
        );
        drop(heads);
        self.order.lock().await.push(head_id);
        Ok(head)
    }

    pub async fn head(&self, head_id: u32) -> Result<Arc<ScanHead>, ScanSystemError> {
        self.heads
            .lock()
            .await
            .get(&head_id)
            .map(|entry| entry.head.clone())
            .ok_or(ScanSystemError::UnknownHeadId(head_id))
    }

    /// Every registered head, in the order it was created.
    pub async fn heads(&self) -> Vec<Arc<ScanHead>> {
        let order = self.order.lock().await.clone();
        let heads = self.heads.lock().await;
        order
            .into_iter()
            .filter_map(|id| heads.get(&id).map(|e| e.head.clone()))
            .collect()
    }

    /// Replaces the active phase table. Mutable at any time, but a table
    /// referencing a head that is currently `Scanning` will simply fail
    /// the connectivity/conflict checks run by `start_scanning`, since
    /// those checks are re-run from scratch on every call (§4.9).
    pub async fn set_phase_table(&self, table: PhaseTable) {
        *self.phase_table.lock().await = Some(table);
    }

    pub async fn phase_table(&self) -> Option<PhaseTable> {
        self.phase_table.lock().await.clone()
    }

    pub async fn calibration(&self, head_id: u32) -> Result<serde_json::Value, ScanSystemError> {
        self.calibration.get_calibration(head_id).await
    }

    /// Minimum feasible scan period for the currently-set phase table,
    /// given every head's current configuration and window.
    pub async fn min_scan_period_us(&self) -> Result<u32, ScanSystemError> {
        let table = self.phase_table().await.ok_or(ScanSystemError::NoPhaseTable)?;
        let snapshot = self.build_timing_snapshot().await;
        Ok(pinchot_phase::min_scan_period_us(
            table.phases(),
            &snapshot,
            self.config.inter_phase_overhead_us,
        )?)
    }

    async fn build_timing_snapshot(&self) -> TimingSnapshot {
        let heads = self.heads().await;
        let mut snapshot = TimingSnapshot::new();
        for head in heads {
            let state = head.state().await;
            let configuration = head.configuration().await;
            let window = head.window().await;
            snapshot.insert(
                head.head_id,
                state != ScanHeadState::Disconnected,
                configuration,
                window,
            );
        }
        snapshot
    }

    /// Attempts to establish the control channel for every head not
    /// already connected. Connectivity is confirmed with a `GetStatus`
    /// round trip rather than assumed from a successful TCP handshake
    /// alone, so a head that accepts connections but never answers still
    /// counts as failed. Heads that fail are left `Disconnected`; heads
    /// that succeed are `Connected`. Returns `PartialConnect` naming the
    /// failed heads if any did.
    #[instrument(skip(self))]
    pub async fn connect(&self, timeout: Duration) -> Result<(), ScanSystemError> {
        let candidates: Vec<(u32, Arc<ScanHead>, HeadEndpoint)> = {
            let heads = self.heads.lock().await;
            let order = self.order.lock().await;
            order
                .iter()
                .filter_map(|id| heads.get(id).map(|e| (*id, e.head.clone(), e.endpoint)))
                .collect()
        };

        let mut already_connected = Vec::new();
        let mut to_connect = Vec::new();
        for (id, head, endpoint) in candidates {
            if head.state().await == ScanHeadState::Disconnected {
                to_connect.push((id, head, endpoint));
            } else {
                already_connected.push(id);
            }
        }

        let attempts = to_connect.into_iter().map(|(id, head, endpoint)| {
            let factory = self.transport_factory.clone();
            async move {
                let deadline = Instant::now() + timeout;
                let transport = factory.create(endpoint.control_addr);
                match transport.send(ControlRequest::GetStatus, deadline).await {
                    Ok(_) => {
                        head.mark_connected(transport).await;
                        None
                    }
                    Err(error) => {
                        warn!(head_id = id, %error, "connect attempt failed");
                        Some(id)
                    }
                }
            }
        });

        let failed: Vec<u32> = join_all(attempts).await.into_iter().flatten().collect();
        if failed.is_empty() {
            Ok(())
        } else {
            Err(ScanSystemError::PartialConnect(failed))
        }
    }

    /// Best-effort teardown: stops scanning (if active), then disconnects
    /// every head regardless of whether an earlier one failed, collecting
    /// every failure rather than stopping at the first.
    #[instrument(skip(self))]
    pub async fn disconnect(&self, timeout: Duration) -> Result<(), ScanSystemError> {
        let _ = self.stop_scanning(timeout).await;

        let heads = self.heads().await;
        let mut failed = Vec::new();
        for head in heads {
            if head.state().await == ScanHeadState::Disconnected {
                continue;
            }
            if let Err(error) = head.disconnect().await {
                warn!(head_id = head.head_id, %error, "disconnect failed");
                failed.push(head.head_id);
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(ScanSystemError::PartialStop(failed))
        }
    }

    fn elements_by_head(table: &PhaseTable) -> HashMap<u32, Vec<PhaseElement>> {
        let mut by_head: HashMap<u32, Vec<PhaseElement>> = HashMap::new();
        for phase in table.phases() {
            for element in &phase.elements {
                by_head.entry(element.head_id).or_default().push(*element);
            }
        }
        by_head
    }

    /// Validates the active phase table, uploads it to every head it
    /// references, and brings the frame assembler online spanning every
    /// active element in phase-table order. If any head fails to start,
    /// every head that did is stopped again and `PartialStart` is
    /// returned. Scanning is all-or-nothing from the caller's view, even
    /// though each head's own `StartScanning` call is independent.
    #[instrument(skip(self))]
    pub async fn start_scanning(
        &self,
        period_us: u32,
        data_format: DataType,
        mode: ScanMode,
        timeout: Duration,
    ) -> Result<(), ScanSystemError> {
        let table = self.phase_table().await.ok_or(ScanSystemError::NoPhaseTable)?;
        let snapshot = self.build_timing_snapshot().await;
        validate_phase_table(&table, &snapshot)?;

        let by_head = Self::elements_by_head(&table);
        let total_elements = table.element_count().max(1);
        let queue_capacity_per_element =
            (self.config.total_queue_capacity / total_elements).max(1);

        let mut started: Vec<u32> = Vec::new();
        let mut failed: Vec<u32> = Vec::new();

        for (head_id, elements) in &by_head {
            let head = match self.head(*head_id).await {
                Ok(head) => head,
                Err(_) => {
                    failed.push(*head_id);
                    continue;
                }
            };
            let deadline = Instant::now() + timeout;
            let result = head
                .start_scanning(
                    elements.len(),
                    queue_capacity_per_element,
                    period_us,
                    data_format,
                    mode,
                    deadline,
                )
                .await;
            match result {
                Ok(()) => started.push(*head_id),
                Err(error) => {
                    warn!(head_id, %error, "start_scanning failed");
                    failed.push(*head_id);
                }
            }
        }

        if !failed.is_empty() {
            let deadline = Instant::now() + timeout;
            for head_id in &started {
                if let Ok(head) = self.head(*head_id).await {
                    let _ = head.stop_scanning(deadline).await;
                }
            }
            return Err(ScanSystemError::PartialStart(failed));
        }

        if let Err(error) = self.spawn_receivers(&by_head).await {
            let deadline = Instant::now() + timeout;
            for head_id in &started {
                if let Ok(head) = self.head(*head_id).await {
                    let _ = head.stop_scanning(deadline).await;
                }
            }
            return Err(error);
        }

        let all_queues = self.ordered_active_queues(&table, &by_head).await;
        *self.assembler.lock().await = Some(Arc::new(FrameAssembler::new(all_queues)));
        info!(total_elements, queue_capacity_per_element, "scanning started");
        Ok(())
    }

    async fn spawn_receivers(
        &self,
        by_head: &HashMap<u32, Vec<PhaseElement>>,
    ) -> Result<(), ScanSystemError> {
        let mut receivers = self.receivers.lock().await;
        for (head_id, elements) in by_head {
            let head = self.head(*head_id).await?;
            let endpoint = {
                let heads = self.heads.lock().await;
                heads
                    .get(head_id)
                    .map(|e| e.endpoint)
                    .ok_or(ScanSystemError::UnknownHeadId(*head_id))?
            };

            // Laser-to-camera pairing is 1:1 by index (pinchot_model::PhaseElement
            // documents the same assumption), so a packet's (camera, laser) key
            // collapses to the element's exercised camera used twice.
            let mut element_queues: HashMap<(u8, u8), Arc<FrameQueue>> = HashMap::new();
            for (index, element) in elements.iter().enumerate() {
                if let Some(queue) = head.element_queue(index).await {
                    let key = (element.exercised_camera(), element.exercised_camera());
                    element_queues.insert(key, queue);
                }
            }

            let receiver = ProfileReceiver::bind(
                *head_id,
                endpoint.data_bind_addr,
                element_queues,
                Default::default(),
            )
            .await
            .map_err(|source| ScanSystemError::Receiver {
                head_id: *head_id,
                source,
            })?;

            let cancel = CancellationToken::new();
            let task_cancel = cancel.clone();
            let task = tokio::spawn(async move {
                if let Err(error) = receiver.run(task_cancel).await {
                    warn!(%error, "profile receiver task ended with an error");
                }
            });

            receivers.insert(*head_id, ReceiverHandle { cancel, task });
        }
        Ok(())
    }

    async fn ordered_active_queues(
        &self,
        table: &PhaseTable,
        by_head: &HashMap<u32, Vec<PhaseElement>>,
    ) -> Vec<Arc<FrameQueue>> {
        let mut next_index: HashMap<u32, usize> = HashMap::new();
        let mut queues = Vec::with_capacity(table.element_count());
        for phase in table.phases() {
            for element in &phase.elements {
                if !by_head.contains_key(&element.head_id) {
                    continue;
                }
                let index = next_index.entry(element.head_id).or_insert(0);
                if let Ok(head) = self.head(element.head_id).await {
                    if let Some(queue) = head.element_queue(*index).await {
                        queues.push(queue);
                    }
                }
                *index += 1;
            }
        }
        queues
    }

    /// Stops every currently-scanning head, tears down its profile
    /// receiver task, and drops the frame assembler. Best-effort: a head
    /// whose `StopScanning` request fails is still counted in
    /// `PartialStop`, but every other head is still attempted.
    #[instrument(skip(self))]
    pub async fn stop_scanning(&self, timeout: Duration) -> Result<(), ScanSystemError> {
        *self.assembler.lock().await = None;

        let mut receivers = self.receivers.lock().await;
        for (_, handle) in receivers.drain() {
            handle.cancel.cancel();
            let _ = handle.task.await;
        }
        drop(receivers);

        let heads = self.heads().await;
        let mut failed = Vec::new();
        for head in heads {
            if !head.state().await.is_scanning() {
                continue;
            }
            let deadline = Instant::now() + timeout;
            if let Err(error) = head.stop_scanning(deadline).await {
                warn!(head_id = head.head_id, %error, "stop_scanning failed");
                failed.push(head.head_id);
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(ScanSystemError::PartialStop(failed))
        }
    }

    pub async fn take_next_profile(
        &self,
        head_id: u32,
        element_index: usize,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Profile, ScanSystemError> {
        let head = self.head(head_id).await?;
        Ok(head
            .try_take_next_profile(element_index, timeout, cancel)
            .await?)
    }

    pub async fn take_frame(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Frame, ScanSystemError> {
        let assembler = self
            .assembler
            .lock()
            .await
            .clone()
            .ok_or(ScanSystemError::NotScanning)?;
        Ok(assembler.dequeue_frame(timeout, cancel).await?)
    }

    pub async fn try_take_frame(&self) -> Result<Frame, ScanSystemError> {
        let assembler = self
            .assembler
            .lock()
            .await
            .clone()
            .ok_or(ScanSystemError::NotScanning)?;
        Ok(assembler.try_dequeue_frame())
    }
}
