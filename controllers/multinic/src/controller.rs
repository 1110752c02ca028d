//! Main controller implementation.
//!
//! Wires the Kubernetes client, the inventory store with its read API, the
//! reconciler and the watcher together, and runs them until one exits.

use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crate::settings::OperatorDefaults;
use crate::watcher::Watcher;
use crds::OpenstackConfig;
use inventory::{InventoryServer, Store};
use kube::{Api, Client};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Main controller for OpenstackConfig reconciliation.
pub struct Controller {
    watcher: JoinHandle<Result<(), ControllerError>>,
    inventory_server: Option<JoinHandle<std::io::Result<()>>>,
}

impl Controller {
    /// Creates a new controller instance.
    pub async fn new(
        namespace: Option<String>,
        defaults: OperatorDefaults,
        inventory_path: Option<String>,
        inventory_listen_addr: String,
    ) -> Result<Self, ControllerError> {
        info!("Initializing multinic controller");

        let kube_client = Client::try_default().await?;

        let store = match inventory_path {
            Some(path) => {
                let store = Store::new(&path).map_err(|err| {
                    error!(path = %path, error = %err, "failed to open inventory store");
                    ControllerError::Inventory(err)
                })?;
                info!(path = %path, "Inventory store loaded");
                Some(Arc::new(store))
            }
            None => None,
        };

        let inventory_server = {
            let server = InventoryServer::new(inventory_listen_addr, store.clone());
            Some(tokio::spawn(server.run()))
        };

        let ns = namespace.as_deref().unwrap_or("default");
        let api: Api<OpenstackConfig> = Api::namespaced(kube_client.clone(), ns);

        let reconciler = Arc::new(Reconciler::new(kube_client, defaults, store));
        let watcher_instance = Watcher::new(reconciler, api);
        let watcher = tokio::spawn(async move { watcher_instance.watch_openstack_configs().await });

        Ok(Self {
            watcher,
            inventory_server,
        })
    }

    /// Runs the controller until shutdown.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("Multinic controller running");

        if let Some(mut server) = self.inventory_server.take() {
            tokio::select! {
                result = &mut self.watcher => {
                    result
                        .map_err(|e| ControllerError::Watch(format!("OpenstackConfig watcher panicked: {}", e)))??;
                }
                result = &mut server => {
                    result
                        .map_err(|e| ControllerError::Watch(format!("inventory server panicked: {}", e)))?
                        .map_err(|e| ControllerError::Watch(format!("inventory server error: {}", e)))?;
                }
            }
        } else {
            self.watcher
                .await
                .map_err(|e| ControllerError::Watch(format!("OpenstackConfig watcher panicked: {}", e)))??;
        }

        Ok(())
    }
}
