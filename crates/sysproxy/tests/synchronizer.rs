use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use sysproxy::{
    BackendError, BypassList, EnvironmentSink, Protocol, ProxyBackend, ProxyEndpoint, ProxyState,
    ProxySynchronizer, SinkError, StateError, SyncError,
};
use sysproxy_backend::Endpoints;
use sysproxy_gnome::GnomeBackend;
use sysproxy_platform::CommandOutput;
use sysproxy_platform::testing::FakeRunner;
use sysproxy_shell::{ShellDescriptor, ShellEnvironmentRegistry, ShellType};
use sysproxy_windows::{MemoryStore, RegValue, SettingsStore, WindowsBackend};
use tempfile::tempdir;

type Journal = Arc<Mutex<Vec<String>>>;

fn entries(journal: &Journal) -> Vec<String> {
    journal
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

fn record(journal: &Journal, entry: impl Into<String>) {
    journal
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(entry.into());
}

#[derive(Default)]
struct Stored {
    enabled: bool,
    endpoints: Endpoints,
    bypass: BypassList,
}

/// An in-memory proxy store that journals every write.
struct MemoryBackend {
    journal: Journal,
    stored: Mutex<Stored>,
    fail_teardown: bool,
}

impl MemoryBackend {
    fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            stored: Mutex::new(Stored::default()),
            fail_teardown: false,
        }
    }

    fn failing_teardown(mut self) -> Self {
        self.fail_teardown = true;
        self
    }

    fn with_stored(self, stored: Stored) -> Self {
        *self.stored.lock().unwrap_or_else(PoisonError::into_inner) = stored;
        self
    }

    fn stored(&self) -> std::sync::MutexGuard<'_, Stored> {
        self.stored.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ProxyBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get_enabled(&self) -> bool {
        self.stored().enabled
    }

    async fn set_enabled(&self, enabled: bool) -> Result<(), BackendError> {
        record(&self.journal, format!("enabled={enabled}"));
        self.stored().enabled = enabled;
        Ok(())
    }

    async fn set_endpoint(
        &self,
        protocol: Protocol,
        endpoint: &ProxyEndpoint,
    ) -> Result<(), BackendError> {
        record(&self.journal, format!("{protocol}={endpoint}"));
        self.stored().endpoints.insert(protocol, endpoint.clone());
        Ok(())
    }

    async fn clear_endpoint(&self, protocol: Protocol) -> Result<(), BackendError> {
        record(&self.journal, format!("{protocol}=none"));
        self.stored().endpoints.remove(&protocol);
        Ok(())
    }

    async fn get_endpoints(&self) -> Result<Endpoints, BackendError> {
        Ok(self.stored().endpoints.clone())
    }

    async fn set_bypass_domains(&self, domains: &BypassList) -> Result<(), BackendError> {
        record(&self.journal, format!("bypass={}", domains.joined(",")));
        self.stored().bypass = domains.clone();
        Ok(())
    }

    async fn get_bypass_domains(&self) -> Result<BypassList, BackendError> {
        Ok(self.stored().bypass.clone())
    }

    async fn teardown(&self) -> Result<(), BackendError> {
        record(&self.journal, "teardown");
        if self.fail_teardown {
            return Err(BackendError::command("Wi-Fi", "networksetup exited with 1"));
        }
        *self.stored() = Stored::default();
        Ok(())
    }

    async fn notify_change(&self) -> Result<(), BackendError> {
        record(&self.journal, "notify");
        Ok(())
    }
}

struct RecordingSink {
    name: &'static str,
    journal: Journal,
    fail: bool,
}

impl RecordingSink {
    fn boxed(name: &'static str, journal: &Journal) -> Box<dyn EnvironmentSink> {
        Box::new(Self {
            name,
            journal: journal.clone(),
            fail: false,
        })
    }

    fn failing(name: &'static str, journal: &Journal) -> Box<dyn EnvironmentSink> {
        Box::new(Self {
            name,
            journal: journal.clone(),
            fail: true,
        })
    }

    fn outcome(&self, action: &str) -> Vec<SinkError> {
        record(&self.journal, format!("{}:{action}", self.name));
        if self.fail {
            vec![SinkError::CommandFailed {
                sink: self.name,
                details: format!("{action} refused"),
            }]
        } else {
            Vec::new()
        }
    }
}

#[async_trait]
impl EnvironmentSink for RecordingSink {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn project_proxy(&self, state: &ProxyState) -> Vec<SinkError> {
        let action = if state.enabled() { "proxy" } else { "proxy-off" };
        self.outcome(action)
    }

    async fn project_bypass(&self, bypass: &BypassList) -> Vec<SinkError> {
        self.outcome(&format!("bypass={}", bypass.joined(",")))
    }

    async fn clear(&self) -> Vec<SinkError> {
        self.outcome("clear")
    }
}

fn synchronizer(backend: MemoryBackend, journal: &Journal) -> ProxySynchronizer {
    ProxySynchronizer::new(
        Box::new(backend),
        vec![
            RecordingSink::boxed("shells", journal),
            RecordingSink::boxed("envd", journal),
        ],
    )
}

fn bypass(domains: &[&str]) -> BypassList {
    domains.iter().collect()
}

#[tokio::test]
async fn engage_writes_backend_before_enabling_and_projecting() {
    let journal = Journal::default();
    let sync = synchronizer(MemoryBackend::new(&journal), &journal);

    let report = sync
        .engage("10.0.0.5", 8080, bypass(&["a.com"]))
        .await
        .expect("engage succeeds");

    assert!(report.is_clean());
    assert_eq!(
        entries(&journal),
        vec![
            "http=10.0.0.5:8080",
            "https=10.0.0.5:8080",
            "ftp=10.0.0.5:8080",
            "socks=none",
            "bypass=a.com",
            "enabled=true",
            "notify",
            "shells:proxy",
            "shells:bypass=a.com",
            "envd:proxy",
            "envd:bypass=a.com",
        ]
    );
}

#[tokio::test]
async fn engage_without_bypass_keeps_the_stored_list() {
    let journal = Journal::default();
    let backend = MemoryBackend::new(&journal).with_stored(Stored {
        bypass: bypass(&["intranet.local"]),
        ..Stored::default()
    });
    let sync = synchronizer(backend, &journal);

    sync.engage("10.0.0.5", 8080, BypassList::new())
        .await
        .expect("engage succeeds");

    assert!(entries(&journal).contains(&"bypass=intranet.local".to_string()));
    assert_eq!(
        sync.bypass_domains().await.expect("read"),
        bypass(&["intranet.local"])
    );
}

#[tokio::test]
async fn invalid_host_fails_before_any_write() {
    let journal = Journal::default();
    let sync = synchronizer(MemoryBackend::new(&journal), &journal);

    let result = sync.engage("  ", 8080, BypassList::new()).await;

    assert_eq!(result, Err(SyncError::InvalidState(StateError::EmptyHost)));
    assert!(entries(&journal).is_empty());
}

#[tokio::test]
async fn disengage_clears_every_sink_after_teardown() {
    let journal = Journal::default();
    let sync = synchronizer(MemoryBackend::new(&journal), &journal);
    sync.engage("10.0.0.5", 8080, BypassList::new())
        .await
        .expect("engage succeeds");
    journal.lock().unwrap_or_else(PoisonError::into_inner).clear();

    let report = sync.disengage().await.expect("disengage succeeds");

    assert!(report.is_clean());
    assert_eq!(
        entries(&journal),
        vec!["teardown", "notify", "shells:clear", "envd:clear"]
    );
    assert!(!sync.enabled().await);
    assert_eq!(sync.proxy_state().await.expect("read"), ProxyState::disabled());
}

#[tokio::test]
async fn failed_teardown_still_clears_sinks() {
    let journal = Journal::default();
    let sync = synchronizer(MemoryBackend::new(&journal).failing_teardown(), &journal);

    let result = sync.disengage().await;

    assert!(matches!(
        result,
        Err(SyncError::Backend(BackendError::CommandFailed { ref target, .. })) if target == "Wi-Fi"
    ));
    assert_eq!(
        entries(&journal),
        vec!["teardown", "shells:clear", "envd:clear"]
    );
}

#[tokio::test]
async fn sink_failures_are_reported_without_stopping_other_sinks() {
    let journal = Journal::default();
    let sync = ProxySynchronizer::new(
        Box::new(MemoryBackend::new(&journal)),
        vec![
            RecordingSink::failing("shells", &journal),
            RecordingSink::boxed("envd", &journal),
        ],
    );

    let report = sync
        .engage("10.0.0.5", 8080, BypassList::new())
        .await
        .expect("backend steps succeed");

    assert_eq!(report.sink_failures.len(), 2);
    assert!(entries(&journal).contains(&"envd:proxy".to_string()));
    assert!(sync.enabled().await);
}

#[tokio::test]
async fn enabling_without_an_http_server_is_rejected() {
    let journal = Journal::default();
    let sync = synchronizer(MemoryBackend::new(&journal), &journal);

    let result = sync.set_enabled(true).await;

    assert_eq!(
        result,
        Err(SyncError::InvalidState(StateError::MissingHttpEndpoint))
    );
    assert!(entries(&journal).is_empty());
}

#[tokio::test]
async fn configure_then_enable_projects_the_stored_server() {
    let journal = Journal::default();
    let sync = synchronizer(MemoryBackend::new(&journal), &journal);

    sync.configure("proxy.corp", 3128).await.expect("configure");
    assert!(!sync.enabled().await);
    assert!(!entries(&journal).iter().any(|entry| entry.starts_with("shells:")));

    sync.set_enabled(true).await.expect("enable");

    let state = sync.proxy_state().await.expect("read");
    assert!(state.enabled());
    assert_eq!(
        state.endpoint(Protocol::Https).map(ToString::to_string),
        Some("proxy.corp:3128".to_string())
    );
    assert!(entries(&journal).contains(&"shells:proxy".to_string()));
}

#[tokio::test]
async fn reconfiguring_while_enabled_reprojects_only_the_proxy() {
    let journal = Journal::default();
    let sync = synchronizer(MemoryBackend::new(&journal), &journal);
    sync.engage("10.0.0.5", 8080, bypass(&["a.com"]))
        .await
        .expect("engage succeeds");
    journal.lock().unwrap_or_else(PoisonError::into_inner).clear();

    let report = sync.configure("proxy.corp", 3128).await.expect("configure");

    assert!(report.is_clean());
    assert_eq!(
        entries(&journal),
        vec![
            "http=proxy.corp:3128",
            "https=proxy.corp:3128",
            "ftp=proxy.corp:3128",
            "notify",
            "shells:proxy",
            "envd:proxy",
        ]
    );
    assert_eq!(
        sync.bypass_domains().await.expect("read"),
        bypass(&["a.com"])
    );
}

#[tokio::test]
async fn engage_drops_a_previously_stored_socks_server() {
    let journal = Journal::default();
    let socks = ProxyEndpoint::new("10.9.9.9", 1080).expect("valid");
    let backend = MemoryBackend::new(&journal).with_stored(Stored {
        endpoints: [(Protocol::Socks, socks)].into_iter().collect(),
        ..Stored::default()
    });
    let sync = synchronizer(backend, &journal);

    sync.engage("127.0.0.1", 8700, BypassList::new())
        .await
        .expect("engage succeeds");

    let state = sync.proxy_state().await.expect("read");
    assert!(state.enabled());
    assert_eq!(state.endpoint(Protocol::Socks), None);
    assert_eq!(state.endpoints().len(), 3);
}

#[tokio::test]
async fn disabling_clears_sinks_but_keeps_servers() {
    let journal = Journal::default();
    let sync = synchronizer(MemoryBackend::new(&journal), &journal);
    sync.engage("10.0.0.5", 8080, BypassList::new())
        .await
        .expect("engage succeeds");

    sync.set_enabled(false).await.expect("disable");

    let state = sync.proxy_state().await.expect("read");
    assert!(!state.enabled());
    assert_eq!(state.endpoints().len(), 3);
    assert!(entries(&journal).ends_with(&[
        "enabled=false".to_string(),
        "notify".to_string(),
        "shells:clear".to_string(),
        "envd:clear".to_string(),
    ]));
}

#[tokio::test]
async fn bypass_changes_while_disabled_leave_sinks_alone() {
    let journal = Journal::default();
    let sync = synchronizer(MemoryBackend::new(&journal), &journal);

    sync.set_bypass_domains(bypass(&["a.com", "b.com"]))
        .await
        .expect("set bypass");

    assert_eq!(entries(&journal), vec!["bypass=a.com,b.com", "notify"]);
    assert_eq!(
        sync.bypass_domains().await.expect("read").as_slice(),
        ["a.com", "b.com"]
    );
}

#[tokio::test]
async fn bypass_changes_while_enabled_reach_the_sinks() {
    let journal = Journal::default();
    let sync = synchronizer(MemoryBackend::new(&journal), &journal);
    sync.engage("10.0.0.5", 8080, BypassList::new())
        .await
        .expect("engage succeeds");

    sync.set_bypass_domains(bypass(&["a.com"]))
        .await
        .expect("set bypass");

    assert!(entries(&journal).ends_with(&[
        "shells:bypass=a.com".to_string(),
        "envd:bypass=a.com".to_string(),
    ]));
}

#[tokio::test]
async fn enabled_store_without_http_server_reads_as_disabled() {
    let journal = Journal::default();
    let socks = ProxyEndpoint::new("10.0.0.9", 1080).expect("valid");
    let backend = MemoryBackend::new(&journal).with_stored(Stored {
        enabled: true,
        endpoints: [(Protocol::Socks, socks)].into_iter().collect(),
        bypass: BypassList::new(),
    });
    let sync = synchronizer(backend, &journal);

    let state = sync.proxy_state().await.expect("read");

    assert!(!state.enabled());
    assert!(state.endpoint(Protocol::Socks).is_some());
}

/// A gsettings stand-in backed by a map.
fn gsettings_emulator() -> (Arc<FakeRunner>, Arc<Mutex<HashMap<String, String>>>) {
    let store = Arc::new(Mutex::new(HashMap::<String, String>::new()));
    let state = store.clone();
    let runner = FakeRunner::new(move |_, call| {
        let mut store = state.lock().unwrap_or_else(PoisonError::into_inner);
        let key = format!("{} {}", call[1], call[2]);
        match call[0].as_str() {
            "set" => {
                store.insert(key, call[3].clone());
                CommandOutput::ok("")
            }
            "reset" => {
                store.remove(&key);
                CommandOutput::ok("")
            }
            _ => {
                let value = store
                    .get(&key)
                    .cloned()
                    .unwrap_or_else(|| match call[2].as_str() {
                        "mode" => "'none'".to_string(),
                        "port" => "0".to_string(),
                        "ignore-hosts" => "['localhost', '127.0.0.0/8', '::1']".to_string(),
                        _ => "''".to_string(),
                    });
                CommandOutput::ok(format!("{value}\n"))
            }
        }
    })
    .with_installed(&["gsettings"]);
    (Arc::new(runner), store)
}

#[tokio::test]
async fn gnome_session_engage_and_disengage() {
    let (runner, store) = gsettings_emulator();
    let temp_dir = tempdir().expect("create temp dir");
    let rc = temp_dir.path().join(".bashrc");
    let user_content = "alias ll='ls -l'\nexport EDITOR=vim\n";
    fs::write(&rc, user_content).expect("write rc");

    let backend = GnomeBackend::new(runner).expect("gsettings is installed");
    let shells =
        ShellEnvironmentRegistry::new(vec![ShellDescriptor::new(ShellType::Bash, rc.clone())]);
    let sync = ProxySynchronizer::new(Box::new(backend), vec![Box::new(shells)]);

    let report = sync
        .engage("10.0.0.5", 8080, BypassList::new())
        .await
        .expect("engage succeeds");
    let report_again = sync
        .engage("10.0.0.5", 8080, BypassList::new())
        .await
        .expect("engage succeeds");

    assert!(report.is_clean() && report_again.is_clean());
    {
        let store = store.lock().unwrap_or_else(PoisonError::into_inner);
        assert_eq!(
            store.get("org.gnome.system.proxy mode").map(String::as_str),
            Some("'manual'")
        );
        assert_eq!(
            store.get("org.gnome.system.proxy.http host").map(String::as_str),
            Some("'10.0.0.5'")
        );
        assert_eq!(
            store.get("org.gnome.system.proxy.http port").map(String::as_str),
            Some("8080")
        );
    }
    let projected = fs::read_to_string(&rc).expect("read rc");
    assert_eq!(
        projected
            .matches("export http_proxy=\"http://10.0.0.5:8080/\"")
            .count(),
        1
    );
    assert!(projected.contains("export no_proxy=\"localhost,127.0.0.0/8,::1\""));

    sync.disengage().await.expect("disengage succeeds");

    assert!(!sync.enabled().await);
    assert_eq!(fs::read_to_string(&rc).expect("read rc"), user_content);
}

#[tokio::test]
async fn gnome_engage_resets_a_leftover_socks_schema() {
    let (runner, store) = gsettings_emulator();
    {
        let mut store = store.lock().unwrap_or_else(PoisonError::into_inner);
        store.insert("org.gnome.system.proxy.socks host".into(), "'10.9.9.9'".into());
        store.insert("org.gnome.system.proxy.socks port".into(), "1080".into());
    }
    let backend = GnomeBackend::new(runner).expect("gsettings is installed");
    let sync = ProxySynchronizer::new(Box::new(backend), Vec::new());

    sync.engage("127.0.0.1", 8700, BypassList::new())
        .await
        .expect("engage succeeds");

    let state = sync.proxy_state().await.expect("read");
    assert!(state.enabled());
    assert_eq!(state.endpoint(Protocol::Socks), None);
    assert!(
        !store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key("org.gnome.system.proxy.socks host")
    );
}

/// Lets the test inspect the registry values the backend writes.
struct SharedStore(Arc<Mutex<MemoryStore>>);

impl SettingsStore for SharedStore {
    fn get(&self, name: &str) -> Result<Option<RegValue>, BackendError> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).get(name)
    }

    fn set(&mut self, name: &str, value: RegValue) -> Result<(), BackendError> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set(name, value)
    }
}

#[tokio::test]
async fn windows_registry_engage_and_disengage() {
    let registry = Arc::new(Mutex::new(MemoryStore::new()));
    let backend = WindowsBackend::with_store(Box::new(SharedStore(registry.clone())));
    let sync = ProxySynchronizer::new(Box::new(backend), Vec::new());
    let value = |name: &str| {
        registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .expect("memory store never fails")
    };

    sync.engage("127.0.0.1", 8700, BypassList::new())
        .await
        .expect("engage succeeds");

    assert_eq!(
        value("ProxyServer"),
        Some(RegValue::String("127.0.0.1:8700".into()))
    );
    assert_eq!(value("ProxyEnable"), Some(RegValue::Dword(1)));

    sync.disengage().await.expect("disengage succeeds");

    assert_eq!(value("ProxyEnable"), Some(RegValue::Dword(0)));
    assert_eq!(value("ProxyServer"), Some(RegValue::String(String::new())));
    assert_eq!(
        value("ProxyOverride"),
        Some(RegValue::String("<local>".into()))
    );
    assert!(!sync.proxy_state().await.expect("read").enabled());
}

#[tokio::test]
async fn windows_engage_replaces_a_per_protocol_server_string() {
    let registry = Arc::new(Mutex::new(MemoryStore::new().with_value(
        "ProxyServer",
        RegValue::String("http=10.9.9.9:80;socks=10.9.9.9:1080".into()),
    )));
    let backend = WindowsBackend::with_store(Box::new(SharedStore(registry.clone())));
    let sync = ProxySynchronizer::new(Box::new(backend), Vec::new());

    sync.engage("127.0.0.1", 8700, BypassList::new())
        .await
        .expect("engage succeeds");

    assert_eq!(
        registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get("ProxyServer")
            .expect("memory store never fails"),
        Some(RegValue::String("127.0.0.1:8700".into()))
    );
    assert_eq!(
        sync.proxy_state().await.expect("read").endpoint(Protocol::Socks),
        None
    );
}
