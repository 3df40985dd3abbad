//! The scripted phone/watch scenario
//!
//! 1. The phone records `memos` memos, the watch records one.
//! 2. With `partition` set, the link drops; the phone records one more memo
//!    and the watch deletes the phone's first memo while apart. The link then
//!    comes back and the phone resyncs everything.
//! 3. Without a partition the watch simply deletes the phone's first memo.
//!
//! In best-effort mode the delete sent during the partition is lost, so the
//! two listings end up different. Hardened mode queues it and both sides
//! converge.

use std::sync::Arc;
use std::time::Duration;

use memolink_core::{DeviceRole, MockLink};
use memolink_logging::DeviceContextGuard;
use memolink_node::{MemoNode, NodeConfig, NodeError};
use memolink_sync::SyncMode;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use tempfile::TempDir;
use thiserror::Error;
use tracing::info;

use crate::report::{DeviceListing, SimulationReport};

/// Errors from running a scenario
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    #[error("Failed to create data directory: {0}")]
    TempDir(#[from] std::io::Error),

    #[error("Scenario needs at least one phone memo")]
    NoMemos,
}

/// Scenario parameters
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    pub mode: SyncMode,
    /// Memos recorded on the phone before anything else happens
    pub memos: usize,
    pub partition: bool,
    /// Seed for generated audio and durations
    pub seed: u64,
    /// Pause between steps so queued deliveries can land
    pub settle: Duration,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            mode: SyncMode::BestEffort,
            memos: 3,
            partition: false,
            seed: 7,
            settle: Duration::from_millis(100),
        }
    }
}

/// A phone and a watch paired over a [`MockLink`]
pub struct PairSimulation {
    config: ScenarioConfig,
    phone: MemoNode,
    watch: MemoNode,
    link: Arc<MockLink>,
    rng: StdRng,
    _dirs: (TempDir, TempDir),
}

impl PairSimulation {
    /// Create and start both nodes in fresh temporary directories
    pub async fn start(config: ScenarioConfig) -> Result<Self, ScenarioError> {
        if config.memos == 0 {
            return Err(ScenarioError::NoMemos);
        }

        let phone_dir = TempDir::new()?;
        let watch_dir = TempDir::new()?;
        let (phone_end, watch_end) = MockLink::pair();
        let link = Arc::new(phone_end);

        let phone = {
            let _ctx = DeviceContextGuard::new(DeviceRole::Phone);
            let node = MemoNode::new(
                NodeConfig::with_data_dir(phone_dir.path()).with_sync_mode(config.mode),
                link.clone(),
            )
            .await?;
            node.start().await?;
            node
        };
        let watch = {
            let _ctx = DeviceContextGuard::new(DeviceRole::Watch);
            let node = MemoNode::new(
                NodeConfig::with_data_dir(watch_dir.path())
                    .with_role(DeviceRole::Watch)
                    .with_sync_mode(config.mode),
                Arc::new(watch_end),
            )
            .await?;
            node.start().await?;
            node
        };

        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            phone,
            watch,
            link,
            _dirs: (phone_dir, watch_dir),
        })
    }

    /// Run the script and report both listings
    pub async fn run(mut self) -> Result<SimulationReport, ScenarioError> {
        info!(
            mode = ?self.config.mode,
            memos = self.config.memos,
            partition = self.config.partition,
            "Running pair scenario"
        );

        let mut first_phone_memo = None;
        for _ in 0..self.config.memos {
            let (audio, duration) = self.fake_audio();
            let record = self.phone.record_finished(audio, duration, None).await?;
            first_phone_memo.get_or_insert(record.id());
        }
        let first_phone_memo = first_phone_memo.ok_or(ScenarioError::NoMemos)?;

        let (audio, duration) = self.fake_audio();
        self.watch
            .record_finished(audio, duration, Some("Watch memo".into()))
            .await?;
        self.settle().await;

        if self.config.partition {
            self.link.partition();
            info!("Link partitioned");

            let (audio, duration) = self.fake_audio();
            self.phone
                .record_finished(audio, duration, Some("Offline memo".into()))
                .await?;
            self.watch.delete(first_phone_memo).await?;

            self.link.reconnect();
            info!("Link restored");
            self.settle().await;

            let count = self.phone.resync_all().await?;
            info!(count, "Phone resynced");
        } else {
            self.watch.delete(first_phone_memo).await?;
        }
        self.settle().await;

        let report = SimulationReport {
            mode: self.config.mode,
            partitioned: self.config.partition,
            dropped_messages: self.link.dropped_messages(),
            phone: DeviceListing::of(DeviceRole::Phone, &self.phone.list()),
            watch: DeviceListing::of(DeviceRole::Watch, &self.watch.list()),
            phone_pending: self.phone.pending_assemblies().await?,
            watch_pending: self.watch.pending_assemblies().await?,
        };

        self.phone.stop().await?;
        self.watch.stop().await?;
        Ok(report)
    }

    /// Random bytes standing in for encoded audio, with a plausible duration
    fn fake_audio(&mut self) -> (Vec<u8>, f64) {
        let mut audio = vec![0u8; self.rng.random_range(512..4096)];
        self.rng.fill_bytes(&mut audio);
        let duration = self.rng.random_range(1.0..90.0);
        (audio, duration)
    }

    async fn settle(&self) {
        tokio::time::sleep(self.config.settle).await;
    }
}
