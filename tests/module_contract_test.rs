//! Integration tests for the module lifecycle contract, driven through a
//! small command dispatcher the way a supervisor would.

use quota_gate::config::{ConfigLoader, QuotaGateConfig};
use quota_gate::module::{
    Capability, ModuleConfig, ModuleContract, ModuleManifest, ModuleStatus,
};
use quota_gate::modules::middleware::Middleware;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::tempdir;

/// Supervisor commands.
enum Command {
    Init(Option<String>),
    Start,
    Stop,
    Status,
    Metrics,
    Heartbeat,
}

/// Supervisor reply: `Ok` with an optional payload, or an error message.
type Reply = Result<Option<String>, String>;

/// Owns a module behind a lock and applies commands to it.
struct Supervisor {
    module: Mutex<Box<dyn ModuleContract>>,
}

impl Supervisor {
    fn new(module: impl ModuleContract + 'static) -> Self {
        Self {
            module: Mutex::new(Box::new(module)),
        }
    }

    fn handle(&self, command: Command) -> Reply {
        let mut module = self.module.lock().unwrap();

        match command {
            Command::Init(raw) => {
                let config = raw.map_or_else(ModuleConfig::new, ModuleConfig::from_raw);
                module.init(config).map(|()| None).map_err(|e| e.to_string())
            },
            Command::Start => module.start().map(|()| None).map_err(|e| e.to_string()),
            Command::Stop => module.stop().map(|()| None).map_err(|e| e.to_string()),
            Command::Status => Ok(Some(module.status().to_string())),
            Command::Metrics => Ok(Some(module.metrics().to_prometheus("quota_gate"))),
            Command::Heartbeat => {
                if module.heartbeat() {
                    Ok(None)
                } else {
                    Err("heartbeat failed".to_string())
                }
            },
        }
    }
}

fn middleware() -> Middleware<String, String> {
    Middleware::with_defaults()
}

#[tokio::test]
async fn test_module_lifecycle() {
    let supervisor = Supervisor::new(middleware());

    assert_eq!(
        supervisor.handle(Command::Status).unwrap().as_deref(),
        Some("initialized")
    );

    supervisor.handle(Command::Init(None)).unwrap();
    supervisor.handle(Command::Start).unwrap();
    assert_eq!(
        supervisor.handle(Command::Status).unwrap().as_deref(),
        Some("running")
    );
    assert!(supervisor.handle(Command::Heartbeat).is_ok());

    let metrics = supervisor.handle(Command::Metrics).unwrap().unwrap();
    assert!(metrics.contains("quota_gate_rate_limit_checks 0"));
    assert!(metrics.contains("quota_gate_max_requests_in_flight 1900"));

    supervisor.handle(Command::Stop).unwrap();
    assert_eq!(
        supervisor.handle(Command::Status).unwrap().as_deref(),
        Some("stopped")
    );
    assert!(supervisor.handle(Command::Heartbeat).is_err());
}

#[tokio::test]
async fn test_module_invalid_state_transition() {
    let supervisor = Supervisor::new(middleware());

    // Nothing to stop yet.
    let err = supervisor.handle(Command::Stop).unwrap_err();
    assert!(err.contains("invalid state"));

    supervisor.handle(Command::Start).unwrap();
    // Starting twice is a no-op; reconfiguring a running module is refused.
    supervisor.handle(Command::Start).unwrap();
    let err = supervisor.handle(Command::Init(None)).unwrap_err();
    assert!(err.contains("current=running"));

    supervisor.handle(Command::Stop).unwrap();
    let err = supervisor.handle(Command::Stop).unwrap_err();
    assert!(err.contains("expected=running"));
}

#[test]
fn test_start_outside_runtime_fails() {
    let supervisor = Supervisor::new(middleware());
    let err = supervisor.handle(Command::Start).unwrap_err();
    assert!(err.starts_with("start failed"));
}

#[tokio::test]
async fn test_init_from_config_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("quota-gate.toml");

    let mut config = QuotaGateConfig::default();
    config.load_balancing.max_requests_in_flight = 8;
    config.queue.queue_timeout = Duration::from_secs(2);
    ConfigLoader::new().save(&config, &path).unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    let mut module = middleware();
    module.init(ModuleConfig::from_raw(raw)).unwrap();

    assert_eq!(module.config(), &config);
    assert_eq!(module.load_balancer().config().max_requests_in_flight, 8);
}

#[test]
fn test_init_rejects_invalid_config() {
    let supervisor = Supervisor::new(middleware());

    let err = supervisor
        .handle(Command::Init(Some("[rate_limit.global]\nlimit = 0\n".to_string())))
        .unwrap_err();
    assert!(err.starts_with("configuration error"));
    assert_eq!(
        supervisor.handle(Command::Status).unwrap().as_deref(),
        Some("initialized")
    );
}

#[test]
fn test_module_manifest() {
    let manifest: ModuleManifest = middleware().manifest();

    assert_eq!(manifest.name, "quota-gate");
    assert!(manifest.has_capability(&Capability::RateLimiting));
    assert!(manifest.has_capability(&Capability::LoadBalancing));
    assert_eq!(manifest.capabilities.len(), 2);
}

#[test]
fn test_module_status_checks() {
    let running = ModuleStatus::Running;
    assert!(running.is_healthy());
    assert!(running.is_operational());
    assert!(!running.is_stopped());

    let degraded = ModuleStatus::Degraded {
        reason: "test".to_string(),
    };
    assert!(!degraded.is_healthy());
    assert!(degraded.is_operational());

    let stopped = ModuleStatus::Stopped;
    assert!(!stopped.is_healthy());
    assert!(!stopped.is_operational());
    assert!(stopped.is_stopped());

    let initialized = ModuleStatus::Initialized;
    assert!(!initialized.is_healthy());
    assert!(!initialized.is_operational());
    assert!(!initialized.is_stopped());
}
