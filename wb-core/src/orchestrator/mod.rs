//! Lifecycle orchestrator.
//!
//! Brings tenants up and tears them down by running a [`plan`] of runtime
//! steps, one at a time. A failing step is classified by its
//! [`Criticality`](plan::Criticality): required steps abort the rest of the
//! plan with `ContainerStart`, the others become warnings or are ignored.
//! Steps already applied are never rolled back.
//!
//! Batches run strictly in order, one tenant after another.

use crate::config::Settings;
use crate::error::{Result, WbError};
use crate::images::images_to_pull;
use crate::proxy::ProxySites;
use crate::registry::TenantStore;
use crate::runtime::{ContainerRuntime, NetworkCreation, RunMode};
use crate::tls::CertificateStore;
use crate::types::Tenant;
use plan::{Action, Criticality, Step};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

pub mod plan;
mod preflight;

/// Pause between the stop pass and the start pass of a restart.
pub const RESTART_SETTLE: Duration = Duration::from_secs(1);

/// Lifecycle phase of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    BringUp,
    TearDown,
}

/// Outcome of a pre-flight check or a best-effort step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Note {
    Ok(String),
    Warning(String),
}

/// What happened while bringing one tenant up or tearing it down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub tenant: String,
    pub phase: Phase,
    /// Steps attempted, including ones that failed
    pub steps_run: usize,
    pub notes: Vec<Note>,
}

impl StepReport {
    fn new(tenant: &str, phase: Phase) -> Self {
        Self { tenant: tenant.to_string(), phase, steps_run: 0, notes: Vec::new() }
    }

    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.notes.iter().filter_map(|n| match n {
            Note::Warning(message) => Some(message.as_str()),
            Note::Ok(_) => None,
        })
    }
}

/// Progress of a batch, delivered as it happens.
#[derive(Debug)]
pub enum BatchEvent<'a> {
    Starting { phase: Phase, tenant: &'a Tenant },
    Finished(&'a StepReport),
    /// Id resolved earlier but no longer in the registry; skipped
    Missing { phase: Phase, id: &'a str },
    Settling(Duration),
}

/// Outcome of pulling one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullOutcome {
    pub image: String,
    pub error: Option<String>,
}

/// Drives tenant containers through a [`ContainerRuntime`].
pub struct Orchestrator {
    settings: Arc<Settings>,
    runtime: Arc<dyn ContainerRuntime>,
    certs: Arc<dyn CertificateStore>,
    sites: ProxySites,
}

impl Orchestrator {
    pub fn new(
        settings: Arc<Settings>,
        runtime: Arc<dyn ContainerRuntime>,
        certs: Arc<dyn CertificateStore>,
    ) -> Self {
        let sites =
            ProxySites::new(&settings.sites_available_path, &settings.sites_enabled_path);
        Self { settings, runtime, certs, sites }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn runtime(&self) -> &dyn ContainerRuntime {
        self.runtime.as_ref()
    }

    /// Pre-flight, then run the bring-up plan.
    ///
    /// # Errors
    /// * `Config` - no server version
    /// * `NotReady` - instance directories missing; no runtime call is made
    /// * `ConfigMismatch` - proxy upstream differs from the tenant's port
    /// * `ContainerStart` - admin container failed to start
    #[instrument(skip(self, tenant), fields(tenant = %tenant.id, runtime = %self.runtime.name()))]
    pub async fn bring_up(&self, tenant: &Tenant, mode: RunMode) -> Result<StepReport> {
        let mut report = StepReport::new(&tenant.id, Phase::BringUp);
        report.notes = self.preflight(tenant).await?;

        let steps = plan::bring_up(&self.settings, tenant, mode);
        self.execute(steps, &mut report).await?;

        info!(port = tenant.port, "Tenant brought up");
        Ok(report)
    }

    /// Run the tear-down plan. Never fails: every step is best-effort.
    #[instrument(skip(self, tenant), fields(tenant = %tenant.id, runtime = %self.runtime.name()))]
    pub async fn tear_down(&self, tenant: &Tenant) -> StepReport {
        let mut report = StepReport::new(&tenant.id, Phase::TearDown);
        let steps = plan::tear_down(tenant);
        if let Err(e) = self.execute(steps, &mut report).await {
            // Tear-down plans carry no required steps.
            warn!(error = %e, "Unexpected tear-down failure");
            report.notes.push(Note::Warning(e.to_string()));
        }
        info!("Tenant torn down");
        report
    }

    async fn execute(&self, steps: Vec<Step>, report: &mut StepReport) -> Result<()> {
        for step in steps {
            report.steps_run += 1;
            let outcome = self.apply(&step.action).await;
            let Err(e) = outcome else {
                debug!(step = %step.action, "Step done");
                continue;
            };

            match step.criticality {
                Criticality::Required => {
                    return Err(WbError::ContainerStart {
                        container: step.action.target().to_string(),
                        reason: failure_reason(e),
                    });
                }
                Criticality::Warn => {
                    warn!(step = %step.action, error = %e, "Step failed, continuing");
                    report.notes.push(Note::Warning(format!(
                        "Could not {}: {}",
                        step.action,
                        failure_reason(e)
                    )));
                }
                Criticality::Ignore => {
                    debug!(step = %step.action, error = %e, "Step failed, ignored");
                }
            }
        }
        Ok(())
    }

    async fn apply(&self, action: &Action) -> Result<()> {
        match action {
            Action::CreateNetwork(name) => {
                if self.runtime.create_network(name).await? == NetworkCreation::AlreadyExists {
                    debug!(network = %name, "Network already exists");
                }
                Ok(())
            }
            Action::Run(spec) => self.runtime.run(spec).await,
            Action::Stop { container, grace } => self.runtime.stop(container, *grace).await,
            Action::Remove(name) => self.runtime.remove(name).await,
            Action::RemoveNetwork(name) => self.runtime.remove_network(name).await,
        }
    }

    /// Bring up every id in order.
    ///
    /// Ids missing from the registry are skipped. The first fatal error stops
    /// the batch; tenants already started stay up.
    pub async fn run_batch(
        &self,
        store: &TenantStore,
        ids: &[String],
        mode: RunMode,
        on_event: &mut (dyn FnMut(BatchEvent<'_>) + Send),
    ) -> Result<Vec<StepReport>> {
        let mut reports = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(tenant) = self.lookup(store, id, Phase::BringUp, on_event).await? else {
                continue;
            };
            on_event(BatchEvent::Starting { phase: Phase::BringUp, tenant: &tenant });
            let report = self.bring_up(&tenant, mode).await?;
            on_event(BatchEvent::Finished(&report));
            reports.push(report);
        }
        Ok(reports)
    }

    /// Tear down every id in order. Ids missing from the registry are skipped.
    pub async fn stop_batch(
        &self,
        store: &TenantStore,
        ids: &[String],
        on_event: &mut (dyn FnMut(BatchEvent<'_>) + Send),
    ) -> Result<Vec<StepReport>> {
        let mut reports = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(tenant) = self.lookup(store, id, Phase::TearDown, on_event).await? else {
                continue;
            };
            on_event(BatchEvent::Starting { phase: Phase::TearDown, tenant: &tenant });
            let report = self.tear_down(&tenant).await;
            on_event(BatchEvent::Finished(&report));
            reports.push(report);
        }
        Ok(reports)
    }

    /// Tear down every id, wait [`RESTART_SETTLE`], then bring every id up.
    ///
    /// The two passes are not interleaved per tenant.
    pub async fn restart_batch(
        &self,
        store: &TenantStore,
        ids: &[String],
        mode: RunMode,
        on_event: &mut (dyn FnMut(BatchEvent<'_>) + Send),
    ) -> Result<Vec<StepReport>> {
        let mut reports = self.stop_batch(store, ids, on_event).await?;
        on_event(BatchEvent::Settling(RESTART_SETTLE));
        tokio::time::sleep(RESTART_SETTLE).await;
        reports.extend(self.run_batch(store, ids, mode, on_event).await?);
        Ok(reports)
    }

    async fn lookup(
        &self,
        store: &TenantStore,
        id: &str,
        phase: Phase,
        on_event: &mut (dyn FnMut(BatchEvent<'_>) + Send),
    ) -> Result<Option<Tenant>> {
        let tenant = store.get(id).await?;
        if tenant.is_none() {
            warn!(tenant = %id, "Tenant not found, skipping");
            on_event(BatchEvent::Missing { phase, id });
        }
        Ok(tenant)
    }

    /// Pull the database image and every server and admin image `tenants` use.
    ///
    /// Failures are recorded per image and never stop the pass.
    pub async fn pull_images(
        &self,
        tenants: &[Tenant],
        mut on_image: impl FnMut(&str) + Send,
    ) -> Vec<PullOutcome> {
        let mut outcomes = Vec::new();
        for image in images_to_pull(&self.settings.image_repository, tenants) {
            on_image(&image);
            let error = match self.runtime.pull(&image).await {
                Ok(()) => None,
                Err(e) => {
                    warn!(image = %image, error = %e, "Pull failed");
                    Some(failure_reason(e))
                }
            };
            outcomes.push(PullOutcome { image, error });
        }
        outcomes
    }
}

/// Underlying reason of a runtime failure, without the command text.
fn failure_reason(e: WbError) -> String {
    match e {
        WbError::Command { reason, .. } => reason,
        other => other.to_string(),
    }
}
