//! Mock construction helpers

use mimic_rs::config::{MimicConfig, SaveMode};
use mimic_rs::host::MockHost;
use mimic_rs::{ActorId, MimicApp, Vec3};
use tempfile::TempDir;

pub const PLAYER: ActorId = ActorId(1);
pub const BOT: ActorId = ActorId(2);
pub const MAP: &str = "de_test";

/// Configuration rooted in a temporary record directory
pub fn test_config(dir: &TempDir) -> MimicConfig {
    let mut config = MimicConfig::default();
    config.storage.record_dir = Some(dir.path().to_path_buf());
    config.recording.save_mode = SaveMode::Inline;
    config.proxy.initial_delay_ticks = 0;
    config.proxy.retry_interval_ticks = 0;
    config
}

pub fn create_test_app(dir: &TempDir) -> MimicApp {
    MimicApp::new(test_config(dir)).expect("app")
}

/// A host with one moving player and one idle proxy
pub fn create_test_host() -> MockHost {
    let mut host = MockHost::new(MAP).with_clock(10_000);
    host.add_player(PLAYER)
        .set_velocity(Vec3::new(10.0, 0.0, 0.0));
    host.add_proxy(BOT, "t");
    host
}

/// Step the host and the app `n` ticks
pub fn run_ticks(app: &mut MimicApp, host: &mut MockHost, n: usize) {
    for _ in 0..n {
        host.step(0.1);
        app.on_tick(host, &[]);
    }
}
