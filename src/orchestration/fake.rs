//! In-memory runtime for tests
//!
//! Implements both runtime traits over a shared container table. Compose
//! containers are named `<project>-<service>-1` like compose v2, or
//! `<project>_<service>_1` after [`FakeRuntime::use_v1_names`].

use crate::error::{BerthError, BerthResult};
use crate::orchestration::compose::{ComposeAction, ComposeInvocation};
use crate::orchestration::runtime::{
    CommandOutput, ComposeRuntime, ContainerRuntime, ContainerSummary, ListOptions,
};
use async_trait::async_trait;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeContainer {
    pub project: String,
    pub service: String,
    pub running: bool,
}

/// Observable runtime state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FakeState {
    pub containers: BTreeMap<String, FakeContainer>,
    pub networks: BTreeSet<String>,
}

#[derive(Default)]
struct Inner {
    state: FakeState,
    services: BTreeMap<String, Vec<String>>,
    invocations: Vec<ComposeInvocation>,
    exec_output: String,
    failures: HashMap<ComposeAction, i32>,
    ports: HashMap<String, BTreeMap<String, u16>>,
    v1_names: bool,
}

#[derive(Default)]
pub struct FakeRuntime {
    inner: Mutex<Inner>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name containers the way compose v1 does
    pub fn use_v1_names(&self) {
        self.inner.lock().unwrap().v1_names = true;
    }

    pub fn container_name(&self, project: &str, service: &str) -> String {
        self.inner.lock().unwrap().container_name(project, service)
    }

    pub fn add_container(&self, project: &str, service: &str, running: bool) {
        let mut inner = self.inner.lock().unwrap();
        let name = inner.container_name(project, service);
        inner.state.containers.insert(
            name,
            FakeContainer {
                project: project.to_string(),
                service: service.to_string(),
                running,
            },
        );
    }

    /// Services `up` creates when an invocation names none
    pub fn define_services(&self, project: &str, services: &[&str]) {
        let mut inner = self.inner.lock().unwrap();
        inner.services.insert(
            project.to_string(),
            services.iter().map(|s| s.to_string()).collect(),
        );
    }

    /// Publish `port` (like `80/tcp`) of a service container on `host_port`
    pub fn publish_port(&self, project: &str, service: &str, port: &str, host_port: u16) {
        let mut inner = self.inner.lock().unwrap();
        let name = inner.container_name(project, service);
        inner
            .ports
            .entry(name)
            .or_default()
            .insert(port.to_string(), host_port);
    }

    pub fn set_exec_output(&self, output: &str) {
        self.inner.lock().unwrap().exec_output = output.to_string();
    }

    /// Make every invocation of `action` exit with `code`
    pub fn fail_on(&self, action: ComposeAction, code: i32) {
        self.inner.lock().unwrap().failures.insert(action, code);
    }

    pub fn snapshot(&self) -> FakeState {
        self.inner.lock().unwrap().state.clone()
    }

    pub fn exists(&self, project: &str, service: &str) -> bool {
        let name = self.container_name(project, service);
        self.snapshot().containers.contains_key(&name)
    }

    pub fn is_up(&self, project: &str, service: &str) -> bool {
        let name = self.container_name(project, service);
        self.snapshot()
            .containers
            .get(&name)
            .is_some_and(|c| c.running)
    }

    pub fn invocations(&self) -> Vec<ComposeInvocation> {
        self.inner.lock().unwrap().invocations.clone()
    }

    pub fn count(&self, action: ComposeAction) -> usize {
        self.invocations()
            .iter()
            .filter(|i| i.action == action)
            .count()
    }

    pub fn last(&self, action: ComposeAction) -> Option<ComposeInvocation> {
        self.invocations()
            .into_iter()
            .rev()
            .find(|i| i.action == action)
    }
}

impl Inner {
    fn container_name(&self, project: &str, service: &str) -> String {
        if self.v1_names {
            format!("{}_{}_1", project, service)
        } else {
            format!("{}-{}-1", project, service)
        }
    }

    /// Services an invocation targets
    fn targets(&self, inv: &ComposeInvocation) -> Vec<String> {
        if !inv.services.is_empty() {
            return inv.services.clone();
        }
        let mut services: BTreeSet<String> = self
            .services
            .get(&inv.project)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .collect();
        services.extend(
            self.state
                .containers
                .values()
                .filter(|c| c.project == inv.project)
                .map(|c| c.service.clone()),
        );
        services.into_iter().collect()
    }

    fn apply(&mut self, inv: &ComposeInvocation) -> CommandOutput {
        let mut out = CommandOutput {
            command: format!("compose {}", inv.args().join(" ")),
            ..Default::default()
        };
        let targets = self.targets(inv);

        match inv.action {
            ComposeAction::Up => {
                for service in targets {
                    let name = self.container_name(&inv.project, &service);
                    self.state
                        .containers
                        .entry(name)
                        .or_insert_with(|| FakeContainer {
                            project: inv.project.clone(),
                            service: service.clone(),
                            running: false,
                        })
                        .running = true;
                }
            }
            ComposeAction::Stop | ComposeAction::Kill => {
                for service in targets {
                    let name = self.container_name(&inv.project, &service);
                    if let Some(c) = self.state.containers.get_mut(&name) {
                        c.running = false;
                    }
                }
            }
            ComposeAction::Rm => {
                for service in targets {
                    let name = self.container_name(&inv.project, &service);
                    if self.state.containers.get(&name).is_some_and(|c| !c.running) {
                        self.state.containers.remove(&name);
                    }
                }
            }
            ComposeAction::Down => {
                self.state.containers.retain(|_, c| c.project != inv.project);
            }
            ComposeAction::Ps => {
                let ids: Vec<String> = targets
                    .iter()
                    .map(|s| self.container_name(&inv.project, s))
                    .filter(|name| self.state.containers.get(name).is_some_and(|c| c.running))
                    .collect();
                out.stdout = ids.join("\n");
            }
            ComposeAction::Exec => {
                let running = targets.first().is_some_and(|s| {
                    self.state
                        .containers
                        .get(&self.container_name(&inv.project, s))
                        .is_some_and(|c| c.running)
                });
                if running {
                    out.stdout = self.exec_output.clone();
                } else {
                    out.stderr = "service is not running".to_string();
                    out.code = 1;
                }
            }
            ComposeAction::Build | ComposeAction::Pull | ComposeAction::Logs => {}
        }
        out
    }
}

#[async_trait]
impl ComposeRuntime for FakeRuntime {
    async fn compose(&self, invocation: &ComposeInvocation) -> BerthResult<CommandOutput> {
        let mut inner = self.inner.lock().unwrap();
        inner.invocations.push(invocation.clone());
        if let Some(code) = inner.failures.get(&invocation.action).copied() {
            let out = CommandOutput {
                command: format!("compose {}", invocation.action.as_str()),
                stderr: "injected failure".to_string(),
                code,
                ..Default::default()
            };
            return out.into_result(invocation.ignore_return_code);
        }
        inner.apply(invocation).into_result(invocation.ignore_return_code)
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn is_available(&self) -> BerthResult<bool> {
        Ok(true)
    }

    async fn list(&self, opts: &ListOptions) -> BerthResult<Vec<ContainerSummary>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .state
            .containers
            .iter()
            .filter(|(_, c)| opts.all || c.running)
            .filter(|(_, c)| opts.project.as_deref().map_or(true, |p| p == c.project))
            .map(|(name, c)| ContainerSummary {
                id: name.clone(),
                name: name.clone(),
                project: Some(c.project.clone()),
                service: Some(c.service.clone()),
                status: if c.running { "Up 1 minute" } else { "Exited (0)" }.to_string(),
                running: c.running,
            })
            .collect())
    }

    async fn inspect(&self, id: &str) -> BerthResult<serde_json::Value> {
        let inner = self.inner.lock().unwrap();
        let container = inner
            .state
            .containers
            .get(id)
            .ok_or_else(|| BerthError::ContainerNotFound(id.to_string()))?;
        let ports: serde_json::Map<String, serde_json::Value> = inner
            .ports
            .get(id)
            .filter(|_| container.running)
            .into_iter()
            .flatten()
            .map(|(port, host)| {
                (
                    port.clone(),
                    json!([{"HostIp": "0.0.0.0", "HostPort": host.to_string()}]),
                )
            })
            .collect();
        Ok(json!({
            "Id": id,
            "Name": id,
            "State": { "Running": container.running },
            "NetworkSettings": { "Ports": ports },
            "Config": { "Labels": {
                "com.docker.compose.project": container.project,
                "com.docker.compose.service": container.service,
            }},
        }))
    }

    async fn stop(&self, id: &str) -> BerthResult<()> {
        if let Some(c) = self.inner.lock().unwrap().state.containers.get_mut(id) {
            c.running = false;
        }
        Ok(())
    }

    async fn remove(&self, id: &str, _force: bool, _volumes: bool) -> BerthResult<()> {
        self.inner.lock().unwrap().state.containers.remove(id);
        Ok(())
    }

    async fn create_network(&self, name: &str) -> BerthResult<()> {
        self.inner
            .lock()
            .unwrap()
            .state
            .networks
            .insert(name.to_string());
        Ok(())
    }

    async fn list_networks(&self) -> BerthResult<Vec<String>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .state
            .networks
            .iter()
            .cloned()
            .collect())
    }

    async fn remove_network(&self, name: &str) -> BerthResult<()> {
        self.inner.lock().unwrap().state.networks.remove(name);
        Ok(())
    }

    fn runtime_name(&self) -> &'static str {
        "Fake"
    }
}
