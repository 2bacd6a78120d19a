//! CIResource controller implementation
//!
//! Observe the resource, its pool and the pool's credentials, run one step of
//! the state machine, then persist whatever facets it reported dirty. The
//! state machine never touches the API server; this module never decides a
//! transition.

use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::{Client, Resource, ResourceExt};
use tracing::{debug, error, info, instrument, warn};

#[cfg(test)]
use mockall::automock;

use crate::crd::{CIPool, CIResource};
use crate::events::{actions, reasons, state_change_reason, EventPublisher, KubeEventPublisher};
use crate::fsm::{CIResourceFsm, Transition};
use crate::Error;

/// Field manager recorded on every write
pub const FIELD_MANAGER: &str = "ofcir-controller";

/// Trait abstracting Kubernetes client operations for CIResource
///
/// This trait allows mocking the Kubernetes client in tests while using
/// the real client in production.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KubeClient: Send + Sync {
    /// Get a CIPool by name, `None` if it does not exist
    async fn get_pool(&self, name: &str, namespace: &str) -> Result<Option<CIPool>, Error>;

    /// Get a Secret by name, `None` if it does not exist
    async fn get_secret(&self, name: &str, namespace: &str) -> Result<Option<Secret>, Error>;

    /// Write the status sub-resource of `cir`
    ///
    /// Carries `cir`'s resourceVersion, so a concurrent writer makes this
    /// fail with a conflict instead of being overwritten. Returns the object
    /// as stored after the write.
    async fn patch_status(&self, cir: &CIResource) -> Result<CIResource, Error>;

    /// Write `cir`'s finalizer list, guarded by its resourceVersion
    async fn patch_finalizers(&self, cir: &CIResource) -> Result<(), Error>;
}

/// Real Kubernetes client implementation
pub struct KubeClientImpl {
    client: Client,
}

impl KubeClientImpl {
    /// Create a new KubeClientImpl wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn resources(&self, cir: &CIResource) -> Result<Api<CIResource>, Error> {
        let namespace = cir.namespace().ok_or_else(|| {
            Error::internal_with_context(
                "controller",
                format!("CIResource {} has no namespace", cir.name_any()),
            )
        })?;
        Ok(Api::namespaced(self.client.clone(), &namespace))
    }
}

#[async_trait]
impl KubeClient for KubeClientImpl {
    async fn get_pool(&self, name: &str, namespace: &str) -> Result<Option<CIPool>, Error> {
        let api: Api<CIPool> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get_secret(&self, name: &str, namespace: &str) -> Result<Option<Secret>, Error> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn patch_status(&self, cir: &CIResource) -> Result<CIResource, Error> {
        let api = self.resources(cir)?;
        let patch = status_patch(cir);
        let updated = api
            .patch_status(
                &cir.name_any(),
                &PatchParams::apply(FIELD_MANAGER),
                &Patch::Merge(&patch),
            )
            .await?;
        Ok(updated)
    }

    async fn patch_finalizers(&self, cir: &CIResource) -> Result<(), Error> {
        let api = self.resources(cir)?;
        let patch = serde_json::json!({
            "metadata": {
                "resourceVersion": cir.resource_version(),
                "finalizers": cir.finalizers(),
            }
        });

        api.patch(
            &cir.name_any(),
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&patch),
        )
        .await?;
        Ok(())
    }
}

/// Merge patch body for the status sub-resource of `cir`
///
/// Every status field is present, so a cleared `resourceId` or `address`
/// overwrites the stored value instead of leaving it in place.
fn status_patch(cir: &CIResource) -> serde_json::Value {
    serde_json::json!({
        "metadata": {
            "resourceVersion": cir.resource_version(),
        },
        "status": cir.current_status(),
    })
}

/// Controller context shared by every reconcile call
pub struct Context {
    /// Kubernetes client for API operations (trait object for testability)
    pub kube: Arc<dyn KubeClient>,
    /// Resource state machine
    pub fsm: CIResourceFsm,
    /// Event publisher for state changes and failures
    pub events: Arc<dyn EventPublisher>,
}

impl Context {
    /// Create a production context talking to the given cluster
    pub fn new(client: Client, fsm: CIResourceFsm) -> Self {
        Self {
            kube: Arc::new(KubeClientImpl::new(client.clone())),
            fsm,
            events: Arc::new(KubeEventPublisher::new(client, FIELD_MANAGER)),
        }
    }

    /// Create a context from explicit parts, e.g. mocks in tests
    pub fn from_parts(
        kube: Arc<dyn KubeClient>,
        fsm: CIResourceFsm,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self { kube, fsm, events }
    }
}

/// Reconcile a single CIResource
///
/// Status is written before finalizers: during deletion the status write
/// records the release, and only then may the finalizer go and let the
/// object disappear.
#[instrument(skip(cir, ctx), fields(resource = %cir.name_any()))]
pub async fn reconcile(cir: Arc<CIResource>, ctx: Arc<Context>) -> Result<Action, Error> {
    let name = cir.name_any();
    let namespace = cir.namespace().ok_or_else(|| {
        Error::internal_with_context("controller", format!("CIResource {name} has no namespace"))
    })?;

    let (pool, secret) = match load_inputs(&cir, &namespace, &ctx).await {
        Ok(inputs) => inputs,
        Err(e) if cir.is_deleting() && cir.current_status().resource_id.is_empty() => {
            // Nothing is allocated, so deletion never needs the backend
            warn!(error = %e, "pool unavailable, finishing deletion without it");
            (orphaned_pool(&cir, &namespace), Secret::default())
        }
        Err(e) => {
            publish_failure(&cir, &ctx, reasons::VALIDATION_FAILED, &e).await;
            return Err(e);
        }
    };

    let transition = match ctx.fsm.process(&cir, &pool, &secret).await {
        Ok(t) => t,
        Err(e) => {
            publish_failure(&cir, &ctx, failure_reason(&e.error), &e.error).await;
            return Err(e.error);
        }
    };

    persist(&cir, &transition, &ctx).await?;
    publish_transition(&cir, &transition, &ctx).await;

    if transition.retry_after.is_zero() {
        debug!(state = %transition.state(), "stable, waiting for changes");
        Ok(Action::await_change())
    } else {
        Ok(Action::requeue(transition.retry_after))
    }
}

/// Error policy for the controller
///
/// Every failure is retried after the configured delay; failures that cannot
/// heal without a spec change are logged at error level.
pub fn error_policy(cir: Arc<CIResource>, error: &Error, ctx: Arc<Context>) -> Action {
    if error.is_retryable() {
        warn!(?error, resource = %cir.name_any(), "reconciliation failed");
    } else {
        error!(?error, resource = %cir.name_any(), "reconciliation failed");
    }
    Action::requeue(ctx.fsm.retry_delay())
}

async fn load_inputs(
    cir: &CIResource,
    namespace: &str,
    ctx: &Context,
) -> Result<(CIPool, Secret), Error> {
    let pool = load_pool(cir, namespace, ctx).await?;
    let secret = load_secret(&pool, namespace, ctx).await?;
    Ok((pool, secret))
}

/// Stand-in for a pool that is gone or unusable
///
/// Only valid while nothing is allocated: no provider is built from it.
fn orphaned_pool(cir: &CIResource, namespace: &str) -> CIPool {
    let mut pool = CIPool::new(&cir.spec.pool_ref.name, Default::default());
    pool.metadata.namespace = Some(namespace.to_string());
    pool
}

async fn load_pool(cir: &CIResource, namespace: &str, ctx: &Context) -> Result<CIPool, Error> {
    let pool_name = &cir.spec.pool_ref.name;
    if pool_name.is_empty() {
        return Err(Error::validation_for(cir.name_any(), "spec.poolRef.name is empty"));
    }

    let pool = ctx
        .kube
        .get_pool(pool_name, namespace)
        .await?
        .ok_or_else(|| {
            Error::validation_for(cir.name_any(), format!("CIPool {pool_name} not found"))
        })?;
    pool.spec.validate().map_err(|e| match e {
        Error::Validation { message, .. } => Error::validation_for(pool.name_any(), message),
        other => other,
    })?;
    Ok(pool)
}

/// Credentials for the pool, an empty Secret when the pool names none
async fn load_secret(pool: &CIPool, namespace: &str, ctx: &Context) -> Result<Secret, Error> {
    let Some(ref secret_name) = pool.spec.credentials_secret_ref else {
        return Ok(Secret::default());
    };

    ctx.kube
        .get_secret(secret_name, namespace)
        .await?
        .ok_or_else(|| {
            Error::validation_for(
                pool.name_any(),
                format!("credentials Secret {secret_name} not found"),
            )
        })
}

async fn persist(cir: &CIResource, transition: &Transition, ctx: &Context) -> Result<(), Error> {
    if transition.is_clean() {
        debug!(state = %transition.state(), "nothing to persist");
        return Ok(());
    }

    let mut stored_version = cir.resource_version();

    if transition.status_dirty {
        let updated = ctx.kube.patch_status(&transition.resource).await?;
        stored_version = updated.resource_version();
        info!(state = %transition.state(), "status updated");
    }

    if transition.resource_dirty {
        let mut next = transition.resource.clone();
        next.metadata.resource_version = stored_version;
        ctx.kube.patch_finalizers(&next).await?;
        info!(finalizers = ?next.finalizers(), "finalizers updated");
    }

    Ok(())
}

async fn publish_transition(cir: &CIResource, transition: &Transition, ctx: &Context) {
    let obj_ref = cir.object_ref(&());
    let from = cir.current_state();
    let to = transition.state();

    if from != to {
        if let Some((reason, action)) = state_change_reason(to) {
            ctx.events
                .publish(
                    &obj_ref,
                    EventType::Normal,
                    reason,
                    action,
                    Some(format!("{from} -> {to}")),
                )
                .await;
        }
    }

    if cir.has_finalizer() && !transition.resource.has_finalizer() {
        ctx.events
            .publish(
                &obj_ref,
                EventType::Normal,
                reasons::RESOURCE_RELEASED,
                actions::RELEASE,
                Some("provider allocation released".to_string()),
            )
            .await;
    }
}

fn failure_reason(error: &Error) -> &'static str {
    match error {
        Error::Provider { .. } => reasons::PROVIDER_ERROR,
        Error::Validation { .. } | Error::Serialization { .. } => reasons::VALIDATION_FAILED,
        Error::Invariant { .. } | Error::Kube { .. } | Error::Internal { .. } => {
            reasons::RECONCILE_FAILED
        }
    }
}

async fn publish_failure(cir: &CIResource, ctx: &Context, reason: &str, error: &Error) {
    ctx.events
        .publish(
            &cir.object_ref(&()),
            EventType::Warning,
            reason,
            actions::RECONCILE,
            Some(error.to_string()),
        )
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{
        CIPoolSpec, CIResourceSpec, CIResourceState, CIResourceStatus, PoolRef, ProviderType,
        CIRESOURCE_FINALIZER,
    };
    use crate::events::{MockEventPublisher, NoopEventPublisher};
    use crate::fsm::FsmConfig;
    use std::time::Duration;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};

    const NAMESPACE: &str = "ofcir-system";

    fn pool(provider: ProviderType) -> CIPool {
        CIPool {
            metadata: ObjectMeta {
                name: Some("pool-a".to_string()),
                namespace: Some(NAMESPACE.to_string()),
                ..Default::default()
            },
            spec: CIPoolSpec {
                provider,
                ..Default::default()
            },
        }
    }

    fn sample_resource(state: CIResourceState) -> CIResource {
        CIResource {
            metadata: ObjectMeta {
                name: Some("cir-0".to_string()),
                namespace: Some(NAMESPACE.to_string()),
                resource_version: Some("100".to_string()),
                finalizers: Some(vec![CIRESOURCE_FINALIZER.to_string()]),
                ..Default::default()
            },
            spec: CIResourceSpec {
                state: CIResourceState::Available,
                pool_ref: PoolRef {
                    name: "pool-a".to_string(),
                },
            },
            status: Some(CIResourceStatus::with_state(state)),
        }
    }

    fn kube_with_pool(pool: CIPool) -> MockKubeClient {
        let mut kube = MockKubeClient::new();
        kube.expect_get_pool()
            .withf(|name, namespace| name == "pool-a" && namespace == NAMESPACE)
            .returning(move |_, _| Ok(Some(pool.clone())));
        kube
    }

    fn context(kube: MockKubeClient, events: Arc<dyn EventPublisher>) -> Arc<Context> {
        Arc::new(Context::from_parts(
            Arc::new(kube),
            CIResourceFsm::new(FsmConfig {
                retry_delay: Duration::from_secs(10),
            }),
            events,
        ))
    }

    fn stored(cir: &CIResource, version: &str) -> CIResource {
        let mut cir = cir.clone();
        cir.metadata.resource_version = Some(version.to_string());
        cir
    }

    mod reconcile_flow {
        use super::*;

        /// Story: first contact only claims the object with the finalizer
        #[tokio::test]
        async fn story_new_resource_writes_finalizer_only() {
            let mut cir = sample_resource(CIResourceState::None);
            cir.metadata.finalizers = None;
            cir.status = None;

            let mut kube = kube_with_pool(pool(ProviderType::Dummy));
            kube.expect_patch_status().never();
            kube.expect_patch_finalizers()
                .withf(|c| {
                    c.has_finalizer() && c.resource_version().as_deref() == Some("100")
                })
                .times(1)
                .returning(|_| Ok(()));

            let action = reconcile(Arc::new(cir), context(kube, Arc::new(NoopEventPublisher)))
                .await
                .unwrap();
            assert_eq!(action, Action::requeue(Duration::from_secs(10)));
        }

        /// Story: a claimed resource starts provisioning and says so
        #[tokio::test]
        async fn story_state_change_is_persisted_and_announced() {
            let cir = sample_resource(CIResourceState::None);

            let mut kube = kube_with_pool(pool(ProviderType::Dummy));
            kube.expect_patch_status()
                .withf(|c| c.current_state() == CIResourceState::Provisioning)
                .times(1)
                .returning(|c| Ok(stored(c, "101")));
            kube.expect_patch_finalizers().never();

            let mut events = MockEventPublisher::new();
            events
                .expect_publish()
                .withf(|_, type_, reason, action, _| {
                    matches!(type_, EventType::Normal)
                        && reason == reasons::PROVISIONING_STARTED
                        && action == actions::PROVISION
                })
                .times(1)
                .return_const(());

            let action = reconcile(Arc::new(cir), context(kube, Arc::new(events)))
                .await
                .unwrap();
            assert_eq!(action, Action::requeue(Duration::from_secs(10)));
        }

        /// Story: once available the controller waits for a spec change
        #[tokio::test]
        async fn story_available_resource_awaits_change() {
            let mut cir = sample_resource(CIResourceState::ProvisioningWait);
            if let Some(status) = cir.status.as_mut() {
                status.resource_id = "dummy-cir-0".to_string();
            }

            let mut kube = kube_with_pool(pool(ProviderType::Dummy));
            kube.expect_patch_status()
                .withf(|c| {
                    let status = c.current_status();
                    status.state == CIResourceState::Available && status.address == "127.0.0.1"
                })
                .times(1)
                .returning(|c| Ok(stored(c, "101")));

            let action = reconcile(Arc::new(cir), context(kube, Arc::new(NoopEventPublisher)))
                .await
                .unwrap();
            assert_eq!(action, Action::await_change());
        }

        /// Story: a pending poll costs no writes
        #[tokio::test]
        async fn story_pending_poll_writes_nothing() {
            let now = chrono::Utc::now().timestamp();
            let mut cir = sample_resource(CIResourceState::ProvisioningWait);
            if let Some(status) = cir.status.as_mut() {
                status.resource_id = format!("fake-cir-0-{now}");
            }
            let mut fake_pool = pool(ProviderType::Fake);
            fake_pool.spec.provider_info = r#"{"provisionDelaySecs": 3600}"#.to_string();

            let mut kube = kube_with_pool(fake_pool);
            kube.expect_patch_status().never();
            kube.expect_patch_finalizers().never();

            let mut events = MockEventPublisher::new();
            events.expect_publish().never();

            let action = reconcile(Arc::new(cir), context(kube, Arc::new(events)))
                .await
                .unwrap();
            assert_eq!(action, Action::requeue(Duration::from_secs(10)));
        }

        /// Story: deletion records the release before letting the object go
        #[tokio::test]
        async fn story_delete_patches_status_then_finalizers() {
            let mut cir = sample_resource(CIResourceState::Delete);
            cir.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
            if let Some(status) = cir.status.as_mut() {
                status.resource_id = "dummy-cir-0".to_string();
            }

            let mut seq = mockall::Sequence::new();
            let mut kube = kube_with_pool(pool(ProviderType::Dummy));
            kube.expect_patch_status()
                .withf(|c| status_patch(c)["status"]["resourceId"] == "")
                .times(1)
                .in_sequence(&mut seq)
                .returning(|c| Ok(stored(c, "101")));
            kube.expect_patch_finalizers()
                .withf(|c| {
                    !c.has_finalizer() && c.resource_version().as_deref() == Some("101")
                })
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| Ok(()));

            let mut events = MockEventPublisher::new();
            events
                .expect_publish()
                .withf(|_, _, reason, _, _| reason == reasons::RESOURCE_RELEASED)
                .times(1)
                .return_const(());

            let action = reconcile(Arc::new(cir), context(kube, Arc::new(events)))
                .await
                .unwrap();
            assert_eq!(action, Action::requeue(Duration::from_secs(10)));
        }

        /// Story: a failed status write stops before the finalizer is touched
        #[tokio::test]
        async fn story_status_conflict_keeps_finalizer() {
            let mut cir = sample_resource(CIResourceState::Delete);
            cir.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
            if let Some(status) = cir.status.as_mut() {
                status.resource_id = "dummy-cir-0".to_string();
            }

            let mut kube = kube_with_pool(pool(ProviderType::Dummy));
            kube.expect_patch_status()
                .returning(|_| Err(Error::internal_with_context("test", "conflict")));
            kube.expect_patch_finalizers().never();

            let result =
                reconcile(Arc::new(cir), context(kube, Arc::new(NoopEventPublisher))).await;
            assert!(result.is_err());
        }
    }

    mod patches {
        use super::*;

        #[test]
        fn status_patch_clears_released_allocation() {
            let mut cir = sample_resource(CIResourceState::Delete);
            let before = status_patch(&cir);
            assert_eq!(before["metadata"]["resourceVersion"], "100");

            if let Some(status) = cir.status.as_mut() {
                status.resource_id = "dummy-cir-0".to_string();
                status.address = "127.0.0.1".to_string();
            }
            assert_eq!(status_patch(&cir)["status"]["resourceId"], "dummy-cir-0");

            // Released: both fields must be sent so the merge overwrites them
            if let Some(status) = cir.status.as_mut() {
                status.resource_id.clear();
                status.address.clear();
            }
            let patch = status_patch(&cir);
            assert_eq!(patch["status"]["state"], "Delete");
            assert_eq!(patch["status"]["resourceId"], "");
            assert_eq!(patch["status"]["address"], "");
        }
    }

    mod orphaned {
        use super::*;

        fn deleting(state: CIResourceState) -> CIResource {
            let mut cir = sample_resource(state);
            cir.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
            cir
        }

        /// Story: with nothing allocated, a vanished pool does not pin the object
        #[tokio::test]
        async fn story_missing_pool_still_drops_finalizer() {
            let mut kube = MockKubeClient::new();
            kube.expect_get_pool().returning(|_, _| Ok(None));
            kube.expect_patch_status().never();
            kube.expect_patch_finalizers()
                .withf(|c| {
                    !c.has_finalizer() && c.resource_version().as_deref() == Some("100")
                })
                .times(1)
                .returning(|_| Ok(()));

            let mut events = MockEventPublisher::new();
            events
                .expect_publish()
                .withf(|_, type_, reason, _, _| {
                    matches!(type_, EventType::Normal) && reason == reasons::RESOURCE_RELEASED
                })
                .times(1)
                .return_const(());

            let action = reconcile(
                Arc::new(deleting(CIResourceState::Delete)),
                context(kube, Arc::new(events)),
            )
            .await
            .unwrap();
            assert_eq!(action, Action::requeue(Duration::from_secs(10)));
        }

        #[tokio::test]
        async fn missing_pool_still_enters_delete() {
            let mut kube = MockKubeClient::new();
            kube.expect_get_pool().returning(|_, _| Ok(None));
            kube.expect_patch_status()
                .withf(|c| c.current_state() == CIResourceState::Delete && c.has_finalizer())
                .times(1)
                .returning(|c| Ok(stored(c, "101")));
            kube.expect_patch_finalizers().never();

            let result = reconcile(
                Arc::new(deleting(CIResourceState::Provisioning)),
                context(kube, Arc::new(NoopEventPublisher)),
            )
            .await;
            assert!(result.is_ok());
        }

        #[tokio::test]
        async fn missing_credentials_secret_still_drops_finalizer() {
            let mut with_secret = pool(ProviderType::Dummy);
            with_secret.spec.credentials_secret_ref = Some("pool-a-creds".to_string());

            let mut kube = kube_with_pool(with_secret);
            kube.expect_get_secret().returning(|_, _| Ok(None));
            kube.expect_patch_finalizers()
                .withf(|c| !c.has_finalizer())
                .times(1)
                .returning(|_| Ok(()));

            let result = reconcile(
                Arc::new(deleting(CIResourceState::Delete)),
                context(kube, Arc::new(NoopEventPublisher)),
            )
            .await;
            assert!(result.is_ok());
        }

        /// Story: a bound handle cannot be released without its pool
        #[tokio::test]
        async fn story_missing_pool_keeps_finalizer_while_allocated() {
            let mut cir = deleting(CIResourceState::Delete);
            if let Some(status) = cir.status.as_mut() {
                status.resource_id = "dummy-cir-0".to_string();
            }

            let mut kube = MockKubeClient::new();
            kube.expect_get_pool().returning(|_, _| Ok(None));
            kube.expect_patch_status().never();
            kube.expect_patch_finalizers().never();

            let mut events = MockEventPublisher::new();
            events
                .expect_publish()
                .withf(|_, type_, reason, _, _| {
                    matches!(type_, EventType::Warning) && reason == reasons::VALIDATION_FAILED
                })
                .times(1)
                .return_const(());

            let result = reconcile(Arc::new(cir), context(kube, Arc::new(events))).await;
            assert!(matches!(result, Err(Error::Validation { .. })));
        }
    }

    mod failures {
        use super::*;

        #[tokio::test]
        async fn missing_pool_is_a_validation_error() {
            let mut kube = MockKubeClient::new();
            kube.expect_get_pool().returning(|_, _| Ok(None));
            kube.expect_patch_status().never();

            let mut events = MockEventPublisher::new();
            events
                .expect_publish()
                .withf(|_, type_, reason, _, _| {
                    matches!(type_, EventType::Warning) && reason == reasons::VALIDATION_FAILED
                })
                .times(1)
                .return_const(());

            let result = reconcile(
                Arc::new(sample_resource(CIResourceState::Available)),
                context(kube, Arc::new(events)),
            )
            .await;
            assert!(matches!(result, Err(Error::Validation { .. })));
        }

        #[tokio::test]
        async fn missing_credentials_secret_is_a_validation_error() {
            let mut with_secret = pool(ProviderType::Dummy);
            with_secret.spec.credentials_secret_ref = Some("pool-a-creds".to_string());

            let mut kube = kube_with_pool(with_secret);
            kube.expect_get_secret()
                .withf(|name, namespace| name == "pool-a-creds" && namespace == NAMESPACE)
                .returning(|_, _| Ok(None));

            let result = reconcile(
                Arc::new(sample_resource(CIResourceState::Available)),
                context(kube, Arc::new(NoopEventPublisher)),
            )
            .await;
            assert!(matches!(result, Err(Error::Validation { .. })));
        }

        #[tokio::test]
        async fn credentials_secret_is_fetched_when_named() {
            let mut with_secret = pool(ProviderType::Dummy);
            with_secret.spec.credentials_secret_ref = Some("pool-a-creds".to_string());

            let mut kube = kube_with_pool(with_secret);
            kube.expect_get_secret()
                .times(1)
                .returning(|_, _| Ok(Some(Secret::default())));

            let action = reconcile(
                Arc::new(sample_resource(CIResourceState::Available)),
                context(kube, Arc::new(NoopEventPublisher)),
            )
            .await
            .unwrap();
            assert_eq!(action, Action::await_change());
        }

        /// Story: a provider failure is surfaced as a warning and nothing is written
        #[tokio::test]
        async fn story_provider_error_publishes_warning() {
            let mut kube = kube_with_pool(pool(ProviderType::Ironic));
            kube.expect_patch_status().never();
            kube.expect_patch_finalizers().never();

            let mut events = MockEventPublisher::new();
            events
                .expect_publish()
                .withf(|_, type_, reason, _, note| {
                    matches!(type_, EventType::Warning)
                        && reason == reasons::PROVIDER_ERROR
                        && note.as_deref().is_some_and(|n| n.contains("not yet implemented"))
                })
                .times(1)
                .return_const(());

            let result = reconcile(
                Arc::new(sample_resource(CIResourceState::Provisioning)),
                context(kube, Arc::new(events)),
            )
            .await;
            assert!(matches!(result, Err(Error::Provider { retryable: false, .. })));
        }

        #[test]
        fn error_policy_requeues_after_retry_delay() {
            let ctx = context(MockKubeClient::new(), Arc::new(NoopEventPublisher));
            let cir = Arc::new(sample_resource(CIResourceState::Available));

            let timeout = Error::provider_for("cir-0", "dummy", "timeout");
            let action = error_policy(cir.clone(), &timeout, ctx.clone());
            assert_eq!(action, Action::requeue(Duration::from_secs(10)));

            let action = error_policy(cir, &Error::validation("bad pool"), ctx);
            assert_eq!(action, Action::requeue(Duration::from_secs(10)));
        }
    }
}
