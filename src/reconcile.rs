//! Drives one entity from its observed state toward its declared state.
//!
//! Resource types plug in through [`Reconciler`]; the [`Engine`] owns the
//! lifecycle bookkeeping, the waits for target states and the write-back to
//! persisted state.

mod checker;
mod lifecycle;
mod poll;

use async_trait::async_trait;

pub use checker::{Checker, collect_all, list_all};
pub use lifecycle::{LifecycleEvent, LifecycleState};
pub use poll::{
    Attempt, Backoff, DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT, PollPolicy, poll_until,
};

use crate::alicloud::AliyunClient;
use crate::error::{ReconcileError, Result};
use crate::resource::{AttributeDiff, AttributeSet, ResourceDescriptor};
use crate::terraform::state::StateFile;

/// Everything a reconciler call needs: the vendor client and the default poll policy.
#[derive(Debug, Clone)]
pub struct ProviderContext {
    pub client: AliyunClient,
    pub poll: PollPolicy,
}

impl ProviderContext {
    pub fn new(client: AliyunClient) -> Self {
        Self {
            client,
            poll: PollPolicy::default(),
        }
    }

    pub fn with_poll(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }
}

#[async_trait]
pub trait Reconciler: Send + Sync {
    fn resource_type(&self) -> &'static str;

    /// Attributes whose change can only be applied by replacing the entity.
    fn force_new(&self) -> &'static [&'static str] {
        &[]
    }

    /// Rejects malformed declarations before any vendor call.
    fn validate(&self, desired: &AttributeSet) -> Result<()>;

    /// Identifier derivable from the declaration alone, when the vendor does
    /// not assign one.
    fn identify(&self, _desired: &AttributeSet) -> Result<Option<String>> {
        Ok(None)
    }

    /// The declaration with vendor-assigned defaults filled in, so that an
    /// unchanged declaration compares equal to the last read.
    fn normalize(&self, desired: &AttributeSet, _prior: &AttributeSet) -> Result<AttributeSet> {
        Ok(desired.clone())
    }

    /// Issues the vendor create call and returns the identifier to store.
    async fn create(&self, ctx: &ProviderContext, desired: &AttributeSet) -> Result<String>;

    /// Fresh snapshot of the entity; `None` when the vendor reports it missing.
    async fn read(&self, ctx: &ProviderContext, id: &str) -> Result<Option<AttributeSet>>;

    async fn update(
        &self,
        ctx: &ProviderContext,
        id: &str,
        diff: &AttributeDiff,
        desired: &AttributeSet,
    ) -> Result<()>;

    /// Issues the vendor delete. A not-found error counts as success.
    async fn delete(&self, ctx: &ProviderContext, id: &str) -> Result<()>;

    /// Why an observed entity has not reached its target state yet.
    fn awaiting(&self, _observed: &AttributeSet) -> Option<String> {
        None
    }

    fn poll_policy(&self, ctx: &ProviderContext) -> PollPolicy {
        ctx.poll
    }
}

#[async_trait]
pub trait DataSource: Send + Sync {
    fn data_source_type(&self) -> &'static str;

    fn validate(&self, _config: &AttributeSet) -> Result<()> {
        Ok(())
    }

    /// Returns the computed attributes, including a non-empty `id`.
    async fn read(&self, ctx: &ProviderContext, config: &AttributeSet) -> Result<AttributeSet>;
}

pub struct Engine<'a> {
    ctx: &'a ProviderContext,
    state: &'a mut StateFile,
}

impl<'a> Engine<'a> {
    pub fn new(ctx: &'a ProviderContext, state: &'a mut StateFile) -> Self {
        Self { ctx, state }
    }

    pub fn state(&self) -> &StateFile {
        &*self.state
    }

    pub async fn create(
        &mut self,
        reconciler: &dyn Reconciler,
        desired: &AttributeSet,
    ) -> Result<ResourceDescriptor> {
        let kind = reconciler.resource_type();
        reconciler.validate(desired)?;

        let lifecycle = LifecycleState::Absent.transition(LifecycleEvent::BeginCreate, kind)?;
        let id = match reconciler.create(self.ctx, desired).await {
            Ok(id) => id,
            Err(err) => return Err(failed(lifecycle, kind, err)),
        };
        tracing::info!(resource_type = kind, %id, "created, waiting for target state");

        let observed = match self.wait_until_present(reconciler, &id, "create").await {
            Ok(observed) => observed,
            Err(err) => return Err(failed(lifecycle, &id, err)),
        };
        lifecycle.transition(LifecycleEvent::Confirmed, &id)?;

        let descriptor = ResourceDescriptor::new(kind, id, observed);
        self.state.commit(&descriptor).await?;
        Ok(descriptor)
    }

    /// Re-reads the entity and writes the whole snapshot back to state.
    ///
    /// An absent entity drops its state entry. A failed read leaves state as it was.
    pub async fn refresh(
        &mut self,
        reconciler: &dyn Reconciler,
        id: &str,
    ) -> Result<Option<ResourceDescriptor>> {
        let kind = reconciler.resource_type();
        let known = self.known_state(kind, id);

        match reconciler.read(self.ctx, id).await? {
            Some(observed) => {
                known.transition(LifecycleEvent::Imported, id)?;
                let descriptor = ResourceDescriptor::new(kind, id, observed);
                self.state.commit(&descriptor).await?;
                Ok(Some(descriptor))
            }
            None => {
                known.transition(LifecycleEvent::Gone, id)?;
                if self.state.remove(kind, id).await? {
                    tracing::info!(resource_type = kind, id, "entity gone, dropped from state");
                }
                Ok(None)
            }
        }
    }

    pub async fn update(
        &mut self,
        reconciler: &dyn Reconciler,
        id: &str,
        desired: &AttributeSet,
    ) -> Result<ResourceDescriptor> {
        reconciler.validate(desired)?;
        match self.refresh(reconciler, id).await? {
            Some(prior) => self.converge(reconciler, prior, desired).await,
            None => {
                tracing::info!(resource_type = reconciler.resource_type(), id, "entity missing, recreating");
                self.create(reconciler, desired).await
            }
        }
    }

    /// Creates the entity, or converges it when its derived identifier already exists.
    pub async fn apply(
        &mut self,
        reconciler: &dyn Reconciler,
        desired: &AttributeSet,
    ) -> Result<ResourceDescriptor> {
        reconciler.validate(desired)?;
        let Some(id) = reconciler.identify(desired)? else {
            return self.create(reconciler, desired).await;
        };

        match self.refresh(reconciler, &id).await? {
            Some(prior) => self.converge(reconciler, prior, desired).await,
            None => self.create(reconciler, desired).await,
        }
    }

    /// Deletes the entity and waits until reads report it absent.
    ///
    /// Destroying an entity that is already gone succeeds.
    pub async fn destroy(&mut self, reconciler: &dyn Reconciler, id: &str) -> Result<()> {
        let kind = reconciler.resource_type();
        let lifecycle = self
            .known_state(kind, id)
            .transition(LifecycleEvent::BeginDelete, id)?;

        match reconciler.delete(self.ctx, id).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {
                tracing::debug!(resource_type = kind, id, "already deleted");
            }
            Err(err) => return Err(failed(lifecycle, id, err)),
        }

        if let Err(err) = self.wait_until_absent(reconciler, id).await {
            return Err(failed(lifecycle, id, err));
        }
        lifecycle.transition(LifecycleEvent::Gone, id)?;

        self.state.remove(kind, id).await?;
        tracing::info!(resource_type = kind, id, "destroyed");
        Ok(())
    }

    pub async fn read_data_source(
        &mut self,
        source: &dyn DataSource,
        config: &AttributeSet,
    ) -> Result<ResourceDescriptor> {
        source.validate(config)?;
        let attributes = source.read(self.ctx, config).await?;
        let id = attributes.require_str("id")?.to_string();

        let kind = format!("data.{}", source.data_source_type());
        let descriptor = ResourceDescriptor::new(&kind, id, attributes);
        self.state.commit(&descriptor).await?;
        Ok(descriptor)
    }

    async fn converge(
        &mut self,
        reconciler: &dyn Reconciler,
        prior: ResourceDescriptor,
        desired: &AttributeSet,
    ) -> Result<ResourceDescriptor> {
        let id = prior.id.as_str();
        let normalized = reconciler.normalize(desired, &prior.attributes)?;
        let diff = AttributeDiff::compute(&prior.attributes, &normalized);
        if !diff.has_changes() {
            tracing::debug!(resource_type = reconciler.resource_type(), id, "up to date");
            return Ok(prior);
        }

        let changed: Vec<&str> = diff.changed_names().collect();
        if diff.requires_replacement(reconciler.force_new()) {
            tracing::info!(resource_type = reconciler.resource_type(), id, ?changed, "replacing");
            self.destroy(reconciler, id).await?;
            return self.create(reconciler, desired).await;
        }

        tracing::info!(resource_type = reconciler.resource_type(), id, ?changed, "updating");
        let lifecycle = LifecycleState::Present.transition(LifecycleEvent::BeginUpdate, id)?;
        if let Err(err) = reconciler.update(self.ctx, id, &diff, &normalized).await {
            return Err(failed(lifecycle, id, err));
        }

        let observed = match self.wait_until_present(reconciler, id, "update").await {
            Ok(observed) => observed,
            Err(err) => return Err(failed(lifecycle, id, err)),
        };
        lifecycle.transition(LifecycleEvent::Confirmed, id)?;

        let descriptor = ResourceDescriptor::new(reconciler.resource_type(), id, observed);
        self.state.commit(&descriptor).await?;
        Ok(descriptor)
    }

    fn known_state(&self, kind: &str, id: &str) -> LifecycleState {
        if self.state.get(kind, id).is_some() {
            LifecycleState::Present
        } else {
            LifecycleState::Absent
        }
    }

    async fn wait_until_present(
        &self,
        reconciler: &dyn Reconciler,
        id: &str,
        operation: &str,
    ) -> Result<AttributeSet> {
        let ctx = self.ctx;
        let policy = reconciler.poll_policy(ctx);
        poll_until(&policy, operation, id, || async move {
            reconciler.read(ctx, id).await.map(|observed| match observed {
                None => Attempt::Pending("not yet visible".to_string()),
                Some(observed) => match reconciler.awaiting(&observed) {
                    Some(reason) => Attempt::Pending(reason),
                    None => Attempt::Ready(observed),
                },
            })
        })
        .await
    }

    async fn wait_until_absent(&self, reconciler: &dyn Reconciler, id: &str) -> Result<()> {
        let ctx = self.ctx;
        let policy = reconciler.poll_policy(ctx);
        poll_until(&policy, "delete", id, || async move {
            reconciler.read(ctx, id).await.map(|observed| match observed {
                None => Attempt::Ready(()),
                Some(observed) => Attempt::Pending(
                    reconciler
                        .awaiting(&observed)
                        .unwrap_or_else(|| "still present".to_string()),
                ),
            })
        })
        .await
    }
}

fn failed(lifecycle: LifecycleState, id: &str, err: ReconcileError) -> ReconcileError {
    if let Ok(fallback) = lifecycle.transition(LifecycleEvent::Failed, id) {
        tracing::warn!(id, ?fallback, error = %err, "operation failed");
    }
    err
}
