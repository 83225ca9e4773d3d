use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::desired::DesiredStateBuilder;
use crate::diff::{ChangeReason, Decision, decide};
use crate::error::ReconcileError;
use crate::runner::{Action, Reconcile};
use crate::store::ClusterStore;
use pkg_constants::controller::{
    AWSSECRET_API_VERSION, AWSSECRET_KIND, CONTROLLER_NAME, REQUEUE_AFTER_SECS,
};
use pkg_constants::state::{AWSSECRETS_PREFIX, SECRETS_PREFIX};
use pkg_metrics::{MetricsRegistry, RECONCILE_TOTAL};
use pkg_types::meta::{ObjectKey, OwnerReference};

/// What a cycle did to the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The declaration no longer exists.
    Missing,
    Created,
    Updated(Vec<ChangeReason>),
    Unchanged,
}

impl Outcome {
    /// Value of the `outcome` metric label.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Missing => "missing",
            Outcome::Created => "created",
            Outcome::Updated(_) => "updated",
            Outcome::Unchanged => "unchanged",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Updated(reasons) => {
                let reasons: Vec<String> = reasons.iter().map(ToString::to_string).collect();
                write!(f, "updated ({})", reasons.join(", "))
            }
            other => f.write_str(other.label()),
        }
    }
}

/// Result of a successful cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub outcome: Outcome,
    pub action: Action,
}

/// Keeps each AWSSecret's Secret in line with the secret store.
pub struct AwsSecretController<S: ClusterStore> {
    store: Arc<S>,
    builder: DesiredStateBuilder,
    metrics: Arc<MetricsRegistry>,
    requeue_after: Duration,
    /// Restricts listing and watch events to one namespace when set.
    watch_namespace: Option<String>,
}

impl<S: ClusterStore> AwsSecretController<S> {
    pub fn new(store: Arc<S>, builder: DesiredStateBuilder, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            store,
            builder,
            metrics,
            requeue_after: Duration::from_secs(REQUEUE_AFTER_SECS),
            watch_namespace: None,
        }
    }

    /// Only reconcile declarations in `namespace`; empty means all.
    pub fn with_watch_namespace(mut self, namespace: Option<String>) -> Self {
        self.watch_namespace = namespace.filter(|ns| !ns.is_empty());
        self
    }

    /// Drive the Secret for `key` one step towards the declared state.
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<Reconciled, ReconcileError> {
        let result = self.reconcile_inner(key).await;
        let label = match &result {
            Ok(r) => r.outcome.label(),
            Err(_) => "error",
        };
        self.metrics
            .counter_inc_with(RECONCILE_TOTAL, &[("outcome", label)]);
        result
    }

    async fn reconcile_inner(&self, key: &ObjectKey) -> Result<Reconciled, ReconcileError> {
        let Some(decl) = self
            .store
            .get_awssecret(key)
            .await
            .map_err(store_error("get awssecret", key))?
        else {
            debug!("AWSSecret {} not found, nothing to do", key);
            return Ok(Reconciled {
                outcome: Outcome::Missing,
                action: Action::Done,
            });
        };

        let mut desired = self.builder.build(&decl).await?;
        desired.owner_ref = Some(OwnerReference {
            api_version: AWSSECRET_API_VERSION.to_string(),
            kind: AWSSECRET_KIND.to_string(),
            name: decl.name.clone(),
            uid: decl.id.clone(),
            controller: true,
        });

        let current = self
            .store
            .get_secret(key)
            .await
            .map_err(store_error("get secret", key))?;

        let outcome = match decide(&desired, current.as_ref()) {
            Decision::Create => {
                info!("Creating secret {}", key);
                self.store
                    .create_secret(&desired)
                    .await
                    .map_err(store_error("create secret", key))?;
                Outcome::Created
            }
            Decision::Update(reasons) => {
                let changed: Vec<String> = reasons.iter().map(ToString::to_string).collect();
                info!("Updating secret {} ({} changed)", key, changed.join(", "));
                // Full replace: the Secret is derived state.
                self.store
                    .update_secret(&desired)
                    .await
                    .map_err(store_error("update secret", key))?;
                Outcome::Updated(reasons)
            }
            Decision::Noop => {
                debug!("Secret {} is up to date", key);
                Outcome::Unchanged
            }
        };

        Ok(Reconciled {
            outcome,
            action: Action::RequeueAfter(self.requeue_after),
        })
    }

    fn watches(&self, key: &ObjectKey) -> bool {
        self.watch_namespace
            .as_deref()
            .is_none_or(|ns| key.namespace == ns)
    }
}

fn store_error(
    op: &'static str,
    key: &ObjectKey,
) -> impl FnOnce(pkg_state::registry::StoreError) -> ReconcileError {
    let key = key.clone();
    move |source| ReconcileError::Store { op, key, source }
}

#[async_trait]
impl<S: ClusterStore + 'static> Reconcile for AwsSecretController<S> {
    type Error = ReconcileError;

    fn name(&self) -> &str {
        CONTROLLER_NAME
    }

    async fn list_keys(&self) -> anyhow::Result<Vec<ObjectKey>> {
        let decls = self
            .store
            .list_awssecrets(self.watch_namespace.as_deref())
            .await?;
        Ok(decls.iter().map(|d| d.key()).collect())
    }

    /// Secrets share their owner's identity, so a change to either object
    /// schedules the same key.
    fn key_for_event(&self, raw_key: &str) -> Option<ObjectKey> {
        let key = ObjectKey::from_registry_key(AWSSECRETS_PREFIX, raw_key)
            .or_else(|| ObjectKey::from_registry_key(SECRETS_PREFIX, raw_key))?;
        self.watches(&key).then_some(key)
    }

    async fn run(&self, key: &ObjectKey) -> Result<Action, ReconcileError> {
        let reconciled = self.reconcile(key).await?;
        debug!("{}: {} -> {:?}", key, reconciled.outcome, reconciled.action);
        Ok(reconciled.action)
    }
}
