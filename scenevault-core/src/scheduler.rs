use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use scenevault_model::{
    Event, EventPayload, FingerprintKind, FingerprintRow, ProcessingPhase, ProcessingStatus, Scene,
    SceneId,
};
use serde::Serialize;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, warn, Instrument};

use crate::clock::Clock;
use crate::config::{CoreConfig, FingerprintMode};
use crate::enqueue::SceneEnqueuer;
use crate::error::{CoreError, CoreResult};
use crate::events::EventBus;
use crate::ledger::JobLedger;
use crate::paths::ArtifactPaths;
use crate::store::{FingerprintStore, SceneMutation, SceneStore};
use crate::transcoder::Transcoder;
use crate::vtt::render_sprite_cues;

#[derive(Default)]
struct PhaseCounters {
    queued: AtomicUsize,
    running: AtomicUsize,
}

/// Per-phase snapshot returned by `Status()`: a small, serializable,
/// read-only view over live atomics, meant for an admin-facing endpoint
/// rather than internal scheduling decisions.
#[derive(Clone, Debug, Serialize)]
pub struct PhaseStatus {
    pub phase: ProcessingPhase,
    pub workers_configured: usize,
    pub running: usize,
    pub queued: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct SchedulerStatus {
    pub phases: Vec<PhaseStatus>,
}

struct PhaseLine {
    sender: mpsc::UnboundedSender<SceneId>,
    counters: Arc<PhaseCounters>,
    workers_configured: usize,
}

/// The Phase Scheduler: one unbounded FIFO channel per phase, `N_phase`
/// worker tasks draining it, and the claim/advance protocol tying scene
/// state, the Job Ledger and the Event Bus together. Supplemented with
/// hierarchical cancellation (`CancellationToken` per running job, child of
/// a per-pool token, child of the process-root token passed in at
/// construction).
pub struct PhaseScheduler {
    scenes: Arc<dyn SceneStore>,
    fingerprints: Arc<dyn FingerprintStore>,
    ledger: Arc<JobLedger>,
    bus: Arc<dyn EventBus>,
    transcoder: Arc<dyn Transcoder>,
    clock: Arc<dyn Clock>,
    fingerprint_mode: FingerprintMode,
    storage_base_dir: String,
    lines: HashMap<ProcessingPhase, PhaseLine>,
    scene_tokens: StdMutex<HashMap<SceneId, CancellationToken>>,
    pool_token: CancellationToken,
}

impl PhaseScheduler {
    /// Constructs the scheduler and immediately spawns every phase's worker
    /// pool. `root_token` is the process-root cancellation token; this
    /// scheduler's own pool token is a child of it, and every running job
    /// gets a token that is in turn a child of the pool token.
    pub fn new(
        scenes: Arc<dyn SceneStore>,
        fingerprints: Arc<dyn FingerprintStore>,
        ledger: Arc<JobLedger>,
        bus: Arc<dyn EventBus>,
        transcoder: Arc<dyn Transcoder>,
        clock: Arc<dyn Clock>,
        config: CoreConfig,
        storage_base_dir: String,
        root_token: CancellationToken,
    ) -> Arc<Self> {
        let pool_token = root_token.child_token();
        let worker_counts = [
            (ProcessingPhase::Metadata, config.pools.metadata_workers),
            (ProcessingPhase::Thumbnail, config.pools.thumbnail_workers),
            (ProcessingPhase::Sprites, config.pools.sprites_workers),
            (ProcessingPhase::Preview, config.pools.preview_workers),
            (ProcessingPhase::Fingerprint, config.pools.fingerprint_workers),
        ];

        let mut lines = HashMap::new();
        let mut receivers = HashMap::new();
        for (phase, workers_configured) in worker_counts {
            let (sender, receiver) = mpsc::unbounded_channel();
            lines.insert(
                phase,
                PhaseLine { sender, counters: Arc::new(PhaseCounters::default()), workers_configured },
            );
            receivers.insert(phase, receiver);
        }

        let scheduler = Arc::new(Self {
            scenes,
            fingerprints,
            ledger,
            bus,
            transcoder,
            clock,
            fingerprint_mode: config.fingerprint_mode,
            storage_base_dir,
            lines,
            scene_tokens: StdMutex::new(HashMap::new()),
            pool_token,
        });

        for (phase, receiver) in receivers {
            let workers_configured = scheduler.lines[&phase].workers_configured;
            let shared_receiver = Arc::new(AsyncMutex::new(receiver));
            for worker_index in 0..workers_configured {
                let scheduler = Arc::clone(&scheduler);
                let shared_receiver = Arc::clone(&shared_receiver);
                let worker_token = scheduler.pool_token.child_token();
                tokio::spawn(async move {
                    scheduler.run_worker(phase, worker_index, shared_receiver, worker_token).await;
                });
            }
        }

        scheduler
    }

    /// Restart reconciliation. Must be called before any
    /// external `Enqueue` is accepted: cancels orphaned `running` Ledger
    /// rows, reverts scenes stuck in `processing` back to `pending` at their
    /// recorded phase, and re-enqueues them onto the matching phase channel.
    pub async fn reconcile_on_restart(&self) -> CoreResult<()> {
        let cancelled = self.ledger.cancel_all_running_for_restart().await?;
        debug!(count = cancelled.len(), "cancelled orphaned running ledger rows");

        let stuck = self.scenes.list_processing().await?;
        for scene in stuck {
            self.scenes.revert_to_pending(scene.id).await?;
            let phase = scene.processing_phase.unwrap_or(ProcessingPhase::Metadata);
            self.enqueue_onto(phase, scene.id)?;
        }
        Ok(())
    }

    /// `Cancel(sceneId)`: cooperative, observed by the running job at its
    /// next checkpoint.
    pub fn cancel(&self, scene_id: SceneId) -> CoreResult<()> {
        match self.scene_tokens.lock().expect("lock").get(&scene_id) {
            Some(token) => {
                token.cancel();
                Ok(())
            }
            None => Err(CoreError::NotFound(format!("no running job for scene {scene_id}"))),
        }
    }

    /// `Status()`: a snapshot over every phase, in phase order.
    pub fn status(&self) -> SchedulerStatus {
        let phases = ProcessingPhase::ORDER
            .iter()
            .map(|phase| {
                let line = &self.lines[phase];
                PhaseStatus {
                    phase: *phase,
                    workers_configured: line.workers_configured,
                    running: line.counters.running.load(Ordering::SeqCst),
                    queued: line.counters.queued.load(Ordering::SeqCst),
                }
            })
            .collect();
        SchedulerStatus { phases }
    }

    fn enqueue_onto(&self, phase: ProcessingPhase, scene_id: SceneId) -> CoreResult<()> {
        let line = self.lines.get(&phase).expect("every phase has a channel");
        line.counters.queued.fetch_add(1, Ordering::SeqCst);
        line.sender
            .send(scene_id)
            .map_err(|_| CoreError::Transient("phase channel closed".to_string()))
    }

    async fn run_worker(
        self: Arc<Self>,
        phase: ProcessingPhase,
        worker_index: usize,
        receiver: Arc<AsyncMutex<mpsc::UnboundedReceiver<SceneId>>>,
        pool_token: CancellationToken,
    ) {
        loop {
            let scene_id = {
                let mut receiver = receiver.lock().await;
                tokio::select! {
                    _ = pool_token.cancelled() => None,
                    received = receiver.recv() => received,
                }
            };
            let Some(scene_id) = scene_id else { break };
            self.lines[&phase].counters.queued.fetch_sub(1, Ordering::SeqCst);
            self.process_one(phase, scene_id).await;
        }
        debug!(?phase, worker_index, "phase worker exiting");
    }

    async fn process_one(&self, phase: ProcessingPhase, scene_id: SceneId) {
        let claimed = match self.scenes.claim_scene(scene_id, phase).await {
            Ok(Some(claimed)) => claimed,
            Ok(None) => return, // already claimed/advanced by a duplicate enqueue
            Err(error) => {
                warn!(%error, ?scene_id, ?phase, "claim failed");
                return;
            }
        };

        self.lines[&phase].counters.running.fetch_add(1, Ordering::SeqCst);

        let job = match self.ledger.begin(scene_id, phase).await {
            Ok(job) => job,
            Err(error) => {
                warn!(%error, ?scene_id, ?phase, "failed to open ledger row");
                self.lines[&phase].counters.running.fetch_sub(1, Ordering::SeqCst);
                return;
            }
        };

        let scene_token = self.pool_token.child_token();
        self.scene_tokens.lock().expect("lock").insert(scene_id, scene_token.clone());

        let _ = self
            .bus
            .publish(Event::new(self.clock.now(), EventPayload::JobStarted { job_id: job.job_id, scene_id, phase }))
            .await;

        let span = debug_span!("phase_job", scene_id = scene_id.0, ?phase, job_id = %job.job_id);
        let outcome = self.run_phase(phase, &claimed.scene, scene_token.clone()).instrument(span).await;

        self.scene_tokens.lock().expect("lock").remove(&scene_id);
        self.lines[&phase].counters.running.fetch_sub(1, Ordering::SeqCst);

        match outcome {
            Ok(mutation) => self.finish_success(phase, scene_id, job.job_id, mutation).await,
            Err(_error) if scene_token.is_cancelled() => {
                let _ = self.ledger.cancel(job.job_id, "cancelled").await;
                let _ = self.scenes.revert_to_pending(scene_id).await;
                let _ = self
                    .bus
                    .publish(Event::new(self.clock.now(), EventPayload::JobCancelled { job_id: job.job_id, scene_id, phase }))
                    .await;
            }
            Err(error) => self.finish_failure(phase, scene_id, job.job_id, &error).await,
        }
    }

    async fn finish_success(&self, phase: ProcessingPhase, scene_id: SceneId, job_id: scenevault_model::JobId, mutation: SceneMutation) {
        match self.scenes.complete_phase(scene_id, phase, mutation).await {
            Ok(_scene) => {
                let _ = self.ledger.complete(job_id).await;
                let _ = self
                    .bus
                    .publish(Event::new(self.clock.now(), EventPayload::JobCompleted { job_id, scene_id, phase }))
                    .await;
                match phase.next() {
                    Some(next_phase) => {
                        if let Err(error) = self.enqueue_onto(next_phase, scene_id) {
                            warn!(%error, ?scene_id, "failed to hand off to next phase");
                        }
                    }
                    None => {
                        let _ = self
                            .bus
                            .publish(Event::new(self.clock.now(), EventPayload::SceneUpdated { scene_id }))
                            .await;
                    }
                }
            }
            Err(error) => self.finish_failure(phase, scene_id, job_id, &error).await,
        }
    }

    async fn finish_failure(&self, phase: ProcessingPhase, scene_id: SceneId, job_id: scenevault_model::JobId, error: &CoreError) {
        let message = error.truncated_message();
        let _ = self.ledger.fail(job_id, &message).await;
        let _ = self.scenes.fail_phase(scene_id, phase, &message).await;
        let _ = self
            .bus
            .publish(Event::new(self.clock.now(), EventPayload::JobFailed { job_id, scene_id, phase, error: message }))
            .await;
    }

    async fn run_phase(&self, phase: ProcessingPhase, scene: &Scene, cancel: CancellationToken) -> CoreResult<SceneMutation> {
        match phase {
            ProcessingPhase::Metadata => {
                let probe = self.transcoder.probe(&scene.path, cancel).await?;
                Ok(SceneMutation {
                    duration_secs: Some(probe.duration_secs),
                    width: Some(probe.width),
                    height: Some(probe.height),
                    frame_rate: Some(probe.frame_rate),
                    video_codec: Some(probe.video_codec),
                    audio_codec: Some(probe.audio_codec),
                    ..Default::default()
                })
            }
            ProcessingPhase::Thumbnail => {
                let paths = ArtifactPaths::for_scene(&self.storage_base_dir, scene.id);
                let duration = scene.probe.duration_secs.unwrap_or(0.0);
                self.transcoder.extract_thumbnail(&scene.path, &paths.thumbnail, duration, cancel).await?;
                Ok(SceneMutation { thumbnail_path: Some(paths.thumbnail), ..Default::default() })
            }
            ProcessingPhase::Sprites => {
                let paths = ArtifactPaths::for_scene(&self.storage_base_dir, scene.id);
                let duration = scene.probe.duration_secs.unwrap_or(0.0);
                let sprites = self
                    .transcoder
                    .generate_sprites(&scene.path, &paths.sprite_sheet, duration, cancel)
                    .await?;
                let cue = render_sprite_cues(&paths.sprite_sheet, &sprites.tiles);
                tokio::fs::write(&paths.sprite_cue, cue).await?;
                Ok(SceneMutation {
                    sprite_sheet_path: Some(sprites.sheet_path),
                    sprite_cue_path: Some(paths.sprite_cue),
                    ..Default::default()
                })
            }
            ProcessingPhase::Preview => {
                let paths = ArtifactPaths::for_scene(&self.storage_base_dir, scene.id);
                let duration = scene.probe.duration_secs.unwrap_or(0.0);
                self.transcoder.render_preview(&scene.path, &paths.preview, duration, cancel).await?;
                Ok(SceneMutation { preview_path: Some(paths.preview), ..Default::default() })
            }
            ProcessingPhase::Fingerprint => self.run_fingerprint_phase(scene, cancel).await,
        }
    }

    /// Fingerprint mode policy: branches on whether the scene has an audio
    /// stream and the configured mode, then writes both row sets in a
    /// single all-or-nothing pass.
    async fn run_fingerprint_phase(&self, scene: &Scene, cancel: CancellationToken) -> CoreResult<SceneMutation> {
        let has_audio = scene.probe.audio_codec.is_some();
        let wants_audio = has_audio;
        let wants_visual = match self.fingerprint_mode {
            FingerprintMode::Dual => true,
            FingerprintMode::AudioOnly => !has_audio,
        };

        let audio_rows = if wants_audio {
            self.transcoder
                .compute_audio_fingerprint(&scene.path, cancel.clone())
                .await?
                .into_iter()
                .map(|sample| FingerprintRow { scene_id: scene.id, kind: FingerprintKind::Audio, position: sample.position, hash: sample.hash })
                .collect()
        } else {
            Vec::new()
        };

        let visual_rows = if wants_visual {
            self.transcoder
                .compute_visual_fingerprint(&scene.path, cancel)
                .await?
                .into_iter()
                .map(|sample| FingerprintRow { scene_id: scene.id, kind: FingerprintKind::Visual, position: sample.position, hash: sample.hash })
                .collect()
        } else {
            Vec::new()
        };

        if wants_audio {
            self.fingerprints.replace_for_scene(scene.id, FingerprintKind::Audio, audio_rows).await?;
        }
        if wants_visual {
            if let Err(error) = self.fingerprints.replace_for_scene(scene.id, FingerprintKind::Visual, visual_rows).await {
                if wants_audio {
                    // Roll back the audio half so no partial fingerprint set
                    // is ever observable.
                    let _ = self.fingerprints.delete_for_scene(scene.id).await;
                }
                return Err(error);
            }
        }

        Ok(SceneMutation::default())
    }
}

#[async_trait]
impl SceneEnqueuer for PhaseScheduler {
    /// `Enqueue(sceneId)`: idempotent, schedules at the scene's current
    /// recorded phase, a no-op for `ready`/`trashed` scenes.
    async fn enqueue(&self, scene_id: SceneId) -> CoreResult<()> {
        let scene = self
            .scenes
            .get(scene_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("scene {scene_id}")))?;

        if matches!(scene.processing_status, ProcessingStatus::Ready | ProcessingStatus::Trashed) {
            return Ok(());
        }

        let phase = scene.processing_phase.unwrap_or(ProcessingPhase::Metadata);
        self.enqueue_onto(phase, scene_id)
    }
}
