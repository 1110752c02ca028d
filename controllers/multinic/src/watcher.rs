//! Kubernetes resource watcher.
//!
//! Drives reconciliation of OpenstackConfig resources with
//! kube_runtime::Controller, which handles reconnection and event
//! coalescing. The reconciler itself decides every requeue delay, so the
//! reconcile closure never returns an error; the error policy only covers
//! controller-internal failures.

use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crds::OpenstackConfig;
use futures::StreamExt;
use kube::Api;
use kube_runtime::controller::Action;
use kube_runtime::{watcher, Controller};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Watches OpenstackConfig resources for changes.
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    api: Api<OpenstackConfig>,
}

impl Watcher {
    pub fn new(reconciler: Arc<Reconciler>, api: Api<OpenstackConfig>) -> Self {
        Self { reconciler, api }
    }

    /// Watch until the process shuts down.
    pub async fn watch_openstack_configs(&self) -> Result<(), ControllerError> {
        info!("Starting OpenstackConfig watcher");

        let reconcile = |cfg: Arc<OpenstackConfig>, ctx: Arc<Reconciler>| async move {
            Ok::<Action, ControllerError>(ctx.reconcile_openstack_config(&cfg).await)
        };

        let error_policy = |_cfg: Arc<OpenstackConfig>, err: &ControllerError, _ctx: Arc<Reconciler>| {
            error!(error = %err, "reconciler error");
            Action::requeue(Duration::from_secs(60))
        };

        Controller::new(self.api.clone(), watcher::Config::default())
            .run(reconcile, error_policy, self.reconciler.clone())
            .for_each(|res| async move {
                if let Err(err) = res {
                    error!(error = %err, "controller error");
                }
            })
            .await;

        Ok(())
    }
}
