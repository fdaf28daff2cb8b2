//! JSON-RPC Server
//!
//! Serves the supervisor API over JSON-RPC 2.0 (HTTP + WebSocket on localhost).

use crate::handler::RpcHandler;
use crate::types::{AutoRestartRequest, MetricsRequest, ReplaceConfigRequest, TailLogsRequest, TargetRequest};
use jsonrpsee::core::SubscriptionResult;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::{PendingSubscriptionSink, RpcModule, SubscriptionMessage};
use procwatch_core::application::{BroadcastHub, Supervisor};
use serde_json::value::RawValue;
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_RPC_HOST: &str = "127.0.0.1";
pub const DEFAULT_RPC_PORT: u16 = 8090;

/// RPC Server Configuration
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(
        config: RpcServerConfig,
        supervisor: Arc<Supervisor>,
        hub: Arc<BroadcastHub>,
    ) -> Result<Self, String> {
        let handler = RpcHandler::new(supervisor, hub).map_err(|e| e.to_string())?;
        Ok(Self {
            config,
            handler: Arc::new(handler),
        })
    }

    /// Build the method table without binding a socket
    pub fn into_module(self) -> Result<RpcModule<()>, String> {
        build_module(self.handler)
    }

    /// Start the JSON-RPC server
    ///
    /// Security: binds to the configured host only; the default is 127.0.0.1.
    pub async fn start(self) -> Result<ServerHandle, String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        info!(
            host = %self.config.host,
            port = %self.config.port,
            "Starting JSON-RPC server"
        );

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;

        let module = build_module(self.handler)?;

        info!("JSON-RPC server started successfully");

        let handle = server.start(module);
        Ok(handle)
    }
}

fn build_module(handler: Arc<RpcHandler>) -> Result<RpcModule<()>, String> {
    let mut module = RpcModule::new(());

    let h = handler.clone();
    module
        .register_async_method("targets.list.v1", move |_, _, _| {
            let h = h.clone();
            async move { h.list_targets().await }
        })
        .map_err(|e| e.to_string())?;

    let h = handler.clone();
    module
        .register_async_method("targets.start.v1", move |params, _, _| {
            let h = h.clone();
            async move {
                let req: TargetRequest = params.parse()?;
                h.start(req).await
            }
        })
        .map_err(|e| e.to_string())?;

    let h = handler.clone();
    module
        .register_async_method("targets.stop.v1", move |params, _, _| {
            let h = h.clone();
            async move {
                let req: TargetRequest = params.parse()?;
                h.stop(req).await
            }
        })
        .map_err(|e| e.to_string())?;

    let h = handler.clone();
    module
        .register_async_method("targets.start_all.v1", move |_, _, _| {
            let h = h.clone();
            async move { h.start_all().await }
        })
        .map_err(|e| e.to_string())?;

    let h = handler.clone();
    module
        .register_async_method("targets.stop_all.v1", move |_, _, _| {
            let h = h.clone();
            async move { h.stop_all().await }
        })
        .map_err(|e| e.to_string())?;

    let h = handler.clone();
    module
        .register_async_method("targets.auto_restart.v1", move |params, _, _| {
            let h = h.clone();
            async move {
                let req: AutoRestartRequest = params.parse()?;
                h.set_auto_restart(req).await
            }
        })
        .map_err(|e| e.to_string())?;

    let h = handler.clone();
    module
        .register_async_method("targets.metrics.v1", move |params, _, _| {
            let h = h.clone();
            async move {
                let req: MetricsRequest = params.parse()?;
                h.metrics(req).await
            }
        })
        .map_err(|e| e.to_string())?;

    let h = handler.clone();
    module
        .register_async_method("events.list.v1", move |_, _, _| {
            let h = h.clone();
            async move { h.events().await }
        })
        .map_err(|e| e.to_string())?;

    let h = handler.clone();
    module
        .register_async_method("logs.tail.v1", move |params, _, _| {
            let h = h.clone();
            async move {
                let req: TailLogsRequest = params.parse()?;
                h.tail_logs(req).await
            }
        })
        .map_err(|e| e.to_string())?;

    let h = handler.clone();
    module
        .register_async_method("config.get.v1", move |_, _, _| {
            let h = h.clone();
            async move { h.get_config().await }
        })
        .map_err(|e| e.to_string())?;

    let h = handler.clone();
    module
        .register_async_method("config.replace.v1", move |params, _, _| {
            let h = h.clone();
            async move {
                let req: ReplaceConfigRequest = params.parse()?;
                h.replace_config(req).await
            }
        })
        .map_err(|e| e.to_string())?;

    // Live snapshots: one hub subscriber per WebSocket subscription
    let h = handler;
    module
        .register_subscription(
            "snapshots.subscribe.v1",
            "snapshots.notify.v1",
            "snapshots.unsubscribe.v1",
            move |_, pending, _, _| {
                let hub = h.hub().clone();
                async move { forward_snapshots(hub, pending).await }
            },
        )
        .map_err(|e| e.to_string())?;

    Ok(module)
}

async fn forward_snapshots(
    hub: Arc<BroadcastHub>,
    pending: PendingSubscriptionSink,
) -> SubscriptionResult {
    // Hub registration happens before the subscription is acknowledged
    let mut subscription = hub.subscribe();
    let sink = match pending.accept().await {
        Ok(sink) => sink,
        Err(e) => {
            hub.unsubscribe(subscription.id());
            return Err(e.into());
        }
    };
    debug!(subscriber = subscription.id(), "Snapshot subscriber attached");

    let result: SubscriptionResult = loop {
        tokio::select! {
            _ = sink.closed() => break Ok(()),
            payload = subscription.recv() => {
                let Some(payload) = payload else { break Ok(()) };
                // Payload is already JSON; forward it without re-encoding the snapshot
                let raw = match RawValue::from_string(payload.to_string()) {
                    Ok(raw) => raw,
                    Err(e) => break Err(e.into()),
                };
                let message = match SubscriptionMessage::from_json(&raw) {
                    Ok(message) => message,
                    Err(e) => break Err(e.into()),
                };
                if sink.send(message).await.is_err() {
                    break Ok(());
                }
            }
        }
    };

    hub.unsubscribe(subscription.id());
    debug!(subscriber = subscription.id(), "Snapshot subscriber detached");
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use procwatch_core::application::{Registry, SupervisorSettings};
    use procwatch_core::domain::{SupervisorConfig, TargetConfig};
    use procwatch_core::port::config_store::mocks::MockConfigStore;
    use procwatch_core::port::os_adapter::mocks::MockOsAdapter;
    use procwatch_core::port::time_provider::mocks::MockTimeProvider;
    use serde_json::Value;

    fn module(dir: &std::path::Path) -> RpcModule<()> {
        let config = SupervisorConfig {
            targets: vec![TargetConfig::spawned("api", "API", "/bin/api", vec![])],
        };
        let registry = Arc::new(Registry::from_config(&config, 60).unwrap());
        let supervisor = Supervisor::new(
            registry,
            Arc::new(MockOsAdapter::new()),
            Arc::new(MockConfigStore::new(config)),
            Arc::new(MockTimeProvider::new(0)),
            SupervisorSettings::new(dir),
        );
        RpcServer::new(
            RpcServerConfig::default(),
            supervisor,
            Arc::new(BroadcastHub::new(8)),
        )
        .unwrap()
        .into_module()
        .unwrap()
    }

    #[tokio::test]
    async fn test_methods_are_registered() {
        let dir = tempfile::tempdir().unwrap();
        let module = module(dir.path());
        for name in [
            "targets.list.v1",
            "targets.start.v1",
            "targets.stop.v1",
            "targets.start_all.v1",
            "targets.stop_all.v1",
            "targets.auto_restart.v1",
            "targets.metrics.v1",
            "events.list.v1",
            "logs.tail.v1",
            "config.get.v1",
            "config.replace.v1",
            "snapshots.subscribe.v1",
        ] {
            assert!(module.method(name).is_some(), "{} missing", name);
        }
    }

    #[tokio::test]
    async fn test_start_then_list_over_rpc() {
        let dir = tempfile::tempdir().unwrap();
        let module = module(dir.path());

        let started: Value = module
            .call("targets.start.v1", jsonrpsee::rpc_params!["api"])
            .await
            .unwrap();
        assert_eq!(started["target"]["state"], "running");

        let listed: Value = module
            .call("targets.list.v1", jsonrpsee::rpc_params![])
            .await
            .unwrap();
        assert_eq!(listed["targets"][0]["id"], "api");
    }
}
