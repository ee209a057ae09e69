use crate::core::registry::{ModuleRegistry, DEFAULT_EXPIRATION_MINUTES};
use crate::core::reload::ReloadOrchestrator;
use crate::core::transform;
use crate::domain::model::{RegisteredModule, SecurityPolicy};
use crate::domain::ports::{ModuleStore, PageHost};
use crate::utils::error::{Result, RunnerError};
use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

pub const DEFAULT_NAME_PREFIX: &str = "page_";

/// Origins allowed to embed generated pages unless configured otherwise.
pub const DEFAULT_IFRAME_PARENTS: &[&str] = &[
    "localhost:*",
    "https://richard-to-mesop-app-maker.hf.space",
    "https://huggingface.co",
];

/// Step of a submission an error happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Decode,
    Transform,
    Persist,
    Reload,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Decode => "decode",
            Phase::Transform => "transform",
            Phase::Persist => "persist",
            Phase::Reload => "reload",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{phase} phase failed")]
pub struct PhaseError {
    pub phase: Phase,
    #[source]
    pub source: RunnerError,
}

trait InPhase<T> {
    fn in_phase(self, phase: Phase) -> std::result::Result<T, PhaseError>;
}

impl<T> InPhase<T> for Result<T> {
    fn in_phase(self, phase: Phase) -> std::result::Result<T, PhaseError> {
        self.map_err(|source| PhaseError { phase, source })
    }
}

/// A submission that was rolled back to the baseline.
#[derive(Debug)]
pub struct SubmissionFailure {
    pub phase: Phase,
    pub module: String,
    /// Human readable error chain returned to the client.
    pub trace: String,
}

#[derive(Debug, Clone)]
pub struct ExecOptions {
    pub baseline_path: PathBuf,
    pub expiration: Duration,
    pub policy: SecurityPolicy,
    pub name_prefix: String,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            baseline_path: PathBuf::from("main.page"),
            expiration: Duration::minutes(DEFAULT_EXPIRATION_MINUTES),
            policy: SecurityPolicy::new(
                DEFAULT_IFRAME_PARENTS.iter().map(|p| p.to_string()).collect(),
            ),
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
        }
    }
}

/// Owns the module registry and runs submissions against it one at a time.
pub struct ExecService<S: ModuleStore> {
    store: S,
    registry: ModuleRegistry,
    orchestrator: ReloadOrchestrator,
    policy: SecurityPolicy,
    name_prefix: String,
}

impl<S: ModuleStore> ExecService<S> {
    pub fn new(store: S, host: Arc<dyn PageHost>, options: ExecOptions) -> Self {
        Self {
            store,
            registry: ModuleRegistry::new(options.expiration),
            orchestrator: ReloadOrchestrator::new(host, &options.baseline_path),
            policy: options.policy,
            name_prefix: options.name_prefix,
        }
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Initial load of the baseline module.
    pub async fn boot(&mut self) -> Result<()> {
        tracing::info!(
            "Loading baseline module from {}",
            self.orchestrator.baseline_path().display()
        );
        self.registry.reset_to_baseline();
        self.orchestrator.reload(&self.registry, &self.store).await
    }

    /// Accept URL-safe base64 page source and return the route it is served at.
    pub async fn submit(&mut self, encoded: &str) -> std::result::Result<String, SubmissionFailure> {
        self.submit_at(encoded, Utc::now()).await
    }

    /// [`ExecService::submit`] with an explicit clock reading, used both for
    /// the new module's creation time and for the expiration sweep.
    pub async fn submit_at(
        &mut self,
        encoded: &str,
        now: DateTime<Utc>,
    ) -> std::result::Result<String, SubmissionFailure> {
        let module = RegisteredModule::with_created_at(self.fresh_name(), now);
        tracing::info!("Received submission for module {}", module.name());

        match self.run_submission(encoded, &module, now).await {
            Ok(()) => {
                tracing::info!(
                    "Module {} is live at {} ({} module(s) registered)",
                    module.name(),
                    module.route(),
                    self.registry.len()
                );
                Ok(module.route())
            }
            Err(failure) => Err(self.roll_back(module, failure).await),
        }
    }

    async fn run_submission(
        &mut self,
        encoded: &str,
        module: &RegisteredModule,
        now: DateTime<Utc>,
    ) -> std::result::Result<(), PhaseError> {
        let source = transform::decode_source(encoded).in_phase(Phase::Decode)?;

        let bound = transform::bind_page_marker(&source, &module.route(), &self.policy)
            .in_phase(Phase::Transform)?;

        self.store
            .write_module(module.name(), &bound)
            .await
            .in_phase(Phase::Persist)?;

        // Registering and sweeping cannot fail.
        self.registry.register(module.clone());
        let expired = self.registry.sweep(now);
        if !expired.is_empty() {
            let names: Vec<&str> = expired.iter().map(|m| m.name()).collect();
            tracing::info!("Expired modules: {}", names.join(", "));
        }

        self.orchestrator
            .reload(&self.registry, &self.store)
            .await
            .in_phase(Phase::Reload)
    }

    async fn roll_back(&mut self, module: RegisteredModule, failure: PhaseError) -> SubmissionFailure {
        let phase = failure.phase;
        tracing::warn!(
            "Submission {} failed in {} phase ({:?}): {}; restoring baseline",
            module.name(),
            phase,
            failure.source.category(),
            failure.source
        );

        let report = anyhow::Error::new(failure).context(format!(
            "Submission of module {} was rolled back to the baseline",
            module.name()
        ));
        let mut trace = format!("{:?}", report);

        if let Err(e) = self.orchestrator.restore_baseline(&mut self.registry).await {
            trace.push_str(&format!("\n\nBaseline restore also failed: {}", e));
        }

        SubmissionFailure {
            phase,
            module: module.name().to_string(),
            trace,
        }
    }

    fn fresh_name(&self) -> String {
        loop {
            let name = transform::generate_module_name(&self.name_prefix);
            if !self.registry.contains(&name) {
                return name;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{LocalModuleStore, ScriptHost};
    use crate::core::test_support::{Call, FixedStore, RecordingHost};
    use crate::domain::model::BASELINE_MODULE;
    use chrono::TimeZone;
    use tempfile::TempDir;

    const BASELINE_SOURCE: &str = "@page(title=\"Home\")\ntext \"Hello World!\"\n";

    struct Fixture {
        _dir: TempDir,
        host: Arc<ScriptHost>,
        service: ExecService<LocalModuleStore>,
    }

    async fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let baseline_path = dir.path().join("main.page");
        std::fs::write(&baseline_path, BASELINE_SOURCE).unwrap();

        let host = Arc::new(ScriptHost::new());
        let store = LocalModuleStore::new(dir.path().join("modules"));
        let options = ExecOptions {
            baseline_path,
            policy: SecurityPolicy::new(vec!["localhost:*".to_string()]),
            ..ExecOptions::default()
        };

        let mut service = ExecService::new(store, host.clone(), options);
        service.boot().await.unwrap();

        Fixture {
            _dir: dir,
            host,
            service,
        }
    }

    fn t(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, minute, 0).unwrap()
    }

    fn encoded(source: &str) -> String {
        transform::encode_source(source)
    }

    #[tokio::test]
    async fn test_boot_serves_baseline() {
        let fx = fixture().await;
        assert_eq!(fx.service.registry().names(), vec![BASELINE_MODULE.to_string()]);
        assert_eq!(fx.host.routes(), vec!["/".to_string()]);
    }

    #[tokio::test]
    async fn test_successful_submission() {
        let mut fx = fixture().await;

        let route = fx
            .service
            .submit(&encoded("@page()\ntext \"dynamic\"\n"))
            .await
            .unwrap();

        let name = route.trim_start_matches('/');
        assert!(name.starts_with(DEFAULT_NAME_PREFIX));
        assert!(fx.service.registry().contains(name));

        let page = fx.host.page(&route).unwrap();
        assert_eq!(page.module, name);
        assert_eq!(page.policy.allowed_iframe_parents, vec!["localhost:*"]);
        assert!(fx.host.page("/").is_some());

        let persisted = std::fs::read_to_string(fx.service.store().module_path(name)).unwrap();
        assert!(persisted.contains(&format!("@page(path=\"{}\"", route)));
    }

    #[tokio::test]
    async fn test_multiple_submissions_accumulate() {
        let mut fx = fixture().await;

        let first = fx.service.submit_at(&encoded("@page()\n"), t(0)).await.unwrap();
        let second = fx.service.submit_at(&encoded("@page()\n"), t(1)).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(fx.service.registry().len(), 3);
        assert!(fx.host.page(&first).is_some());
        assert!(fx.host.page(&second).is_some());
    }

    #[tokio::test]
    async fn test_execution_failure_rolls_back_everything() {
        let mut fx = fixture().await;
        let kept = fx.service.submit(&encoded("@page()\n")).await.unwrap();
        assert!(fx.host.page(&kept).is_some());

        let failure = fx
            .service
            .submit(&encoded("@page()\nbutton \"nope\"\n"))
            .await
            .unwrap_err();

        assert_eq!(failure.phase, Phase::Reload);
        assert!(failure.trace.contains("rolled back"));
        assert!(failure.trace.contains("unknown directive 'button'"));
        assert_eq!(fx.service.registry().names(), vec![BASELINE_MODULE.to_string()]);
        assert_eq!(fx.host.routes(), vec!["/".to_string()]);
        assert!(fx.host.page(&kept).is_none());
    }

    #[tokio::test]
    async fn test_decode_and_marker_failures_roll_back() {
        let mut fx = fixture().await;
        fx.service.submit(&encoded("@page()\n")).await.unwrap();

        let failure = fx.service.submit("%%% not base64").await.unwrap_err();
        assert_eq!(failure.phase, Phase::Decode);
        assert_eq!(fx.service.registry().len(), 1);

        fx.service.submit(&encoded("@page()\n")).await.unwrap();
        let failure = fx
            .service
            .submit(&encoded("text \"no declaration\"\n"))
            .await
            .unwrap_err();
        assert_eq!(failure.phase, Phase::Transform);
        assert!(failure.trace.contains("@page()"));
        assert_eq!(fx.service.registry().names(), vec![BASELINE_MODULE.to_string()]);
        assert_eq!(fx.host.routes(), vec!["/".to_string()]);
    }

    #[tokio::test]
    async fn test_expired_modules_are_dropped_on_next_submission() {
        let mut fx = fixture().await;

        let old = fx.service.submit_at(&encoded("@page()\n"), t(0)).await.unwrap();
        let recent = fx.service.submit_at(&encoded("@page()\n"), t(9)).await.unwrap();

        let newest = fx.service.submit_at(&encoded("@page()\n"), t(10)).await.unwrap();

        assert!(fx.host.page(&old).is_none());
        assert!(fx.host.page(&recent).is_some());
        assert!(fx.host.page(&newest).is_some());
        assert!(!fx.service.registry().contains(old.trim_start_matches('/')));
        assert_eq!(fx.service.registry().len(), 3);
    }

    struct FailingStore;

    impl ModuleStore for FailingStore {
        fn module_path(&self, name: &str) -> PathBuf {
            PathBuf::from("/nonexistent").join(name)
        }

        async fn write_module(&self, name: &str, _source: &str) -> Result<PathBuf> {
            Err(RunnerError::ModuleIoError {
                path: self.module_path(name),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            })
        }
    }

    #[tokio::test]
    async fn test_persist_failure_rolls_back() {
        let dir = TempDir::new().unwrap();
        let baseline_path = dir.path().join("main.page");
        std::fs::write(&baseline_path, BASELINE_SOURCE).unwrap();
        let host = Arc::new(ScriptHost::new());
        let options = ExecOptions {
            baseline_path,
            ..ExecOptions::default()
        };
        let mut service = ExecService::new(FailingStore, host.clone(), options);
        service.boot().await.unwrap();

        let failure = service.submit(&encoded("@page()\n")).await.unwrap_err();

        assert_eq!(failure.phase, Phase::Persist);
        assert!(failure.trace.contains("read-only"));
        assert_eq!(service.registry().names(), vec![BASELINE_MODULE.to_string()]);
        assert_eq!(host.routes(), vec!["/".to_string()]);
    }

    fn recorded_service(host: Arc<RecordingHost>) -> ExecService<FixedStore> {
        let options = ExecOptions {
            baseline_path: PathBuf::from("/srv/main.page"),
            ..ExecOptions::default()
        };
        ExecService::new(FixedStore, host, options)
    }

    fn baseline_only_reload() -> Vec<Call> {
        vec![
            Call::Reset,
            Call::Execute(PathBuf::from("/srv/main.page"), BASELINE_MODULE.to_string()),
            Call::Finished,
        ]
    }

    fn count(calls: &[Call], call: &Call) -> usize {
        calls.iter().filter(|c| *c == call).count()
    }

    #[tokio::test]
    async fn test_success_reloads_exactly_once() {
        let host = Arc::new(RecordingHost::default());
        let mut service = recorded_service(host.clone());
        service.boot().await.unwrap();
        assert_eq!(host.take_calls(), baseline_only_reload());

        let route = service.submit(&encoded("@page()\n")).await.unwrap();

        let calls = host.take_calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls.first(), Some(&Call::Reset));
        assert_eq!(calls.last(), Some(&Call::Finished));
        assert_eq!(count(&calls, &Call::Reset), 1);
        let name = route.trim_start_matches('/');
        assert!(calls.contains(&Call::Execute(
            PathBuf::from("/modules").join(format!("{}.page", name)),
            name.to_string()
        )));
    }

    #[tokio::test]
    async fn test_reload_failure_reloads_baseline_once_more() {
        let host = Arc::new(RecordingHost::failing(DEFAULT_NAME_PREFIX));
        let mut service = recorded_service(host.clone());
        service.boot().await.unwrap();
        host.take_calls();

        let failure = service.submit(&encoded("@page()\n")).await.unwrap_err();
        assert_eq!(failure.phase, Phase::Reload);

        let calls = host.take_calls();
        assert_eq!(count(&calls, &Call::Reset), 2);
        assert_eq!(count(&calls, &Call::Finished), 1);
        assert_eq!(calls.first(), Some(&Call::Reset));

        // The aborted reload never finishes; recovery is the baseline alone.
        let recovery_start = calls.len() - 3;
        assert!(!calls[..recovery_start].contains(&Call::Finished));
        assert_eq!(calls[recovery_start..].to_vec(), baseline_only_reload());
    }

    #[tokio::test]
    async fn test_decode_failure_reloads_baseline_only() {
        let host = Arc::new(RecordingHost::default());
        let mut service = recorded_service(host.clone());
        service.boot().await.unwrap();
        host.take_calls();

        let failure = service.submit("%%% not base64").await.unwrap_err();

        assert_eq!(failure.phase, Phase::Decode);
        assert_eq!(host.take_calls(), baseline_only_reload());
    }

    #[tokio::test]
    async fn test_failure_names_the_rolled_back_module() {
        let host = Arc::new(RecordingHost::failing(DEFAULT_NAME_PREFIX));
        let mut service = recorded_service(host.clone());
        service.boot().await.unwrap();
        host.take_calls();

        let failure = service.submit(&encoded("@page()\n")).await.unwrap_err();

        assert!(failure.module.starts_with(DEFAULT_NAME_PREFIX));
        assert!(failure.trace.contains(&failure.module));
        assert!(host.calls().contains(&Call::Execute(
            PathBuf::from("/modules").join(format!("{}.page", failure.module)),
            failure.module.clone()
        )));
    }

    #[tokio::test]
    async fn test_broken_baseline_is_reported() {
        let mut fx = fixture().await;
        let baseline = fx.service.orchestrator.baseline_path().to_path_buf();
        std::fs::write(&baseline, "not a page\n").unwrap();

        let failure = fx.service.submit(&encoded("@page()\n")).await.unwrap_err();

        assert!(failure.trace.contains("Baseline restore also failed"));
        assert_eq!(fx.service.registry().names(), vec![BASELINE_MODULE.to_string()]);
        assert!(fx.host.routes().is_empty());
    }
}
