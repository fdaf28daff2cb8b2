//! RPC Method Handlers
//!
//! Thin adapters from request types onto the supervisor API.

use crate::error::to_rpc_error;
use crate::sanitize::LineSanitizer;
use crate::types::{
    AutoRestartRequest, BatchResponse, ConfigResponse, EventsResponse, ListTargetsResponse,
    MetricsRequest, MetricsResponse, ReplaceConfigRequest, TailLogsRequest, TailLogsResponse,
    TargetRequest, TargetResponse, MAX_METRICS_WINDOW_SECS, MAX_TAIL_LINES,
};
use jsonrpsee::types::ErrorObjectOwned;
use procwatch_core::application::{BatchReport, BroadcastHub, Supervisor};
use std::sync::Arc;
use tracing::info;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    supervisor: Arc<Supervisor>,
    hub: Arc<BroadcastHub>,
    sanitizer: LineSanitizer,
}

impl RpcHandler {
    pub fn new(supervisor: Arc<Supervisor>, hub: Arc<BroadcastHub>) -> Result<Self, regex::Error> {
        Ok(Self {
            supervisor,
            hub,
            sanitizer: LineSanitizer::new()?,
        })
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    /// targets.list.v1
    pub async fn list_targets(&self) -> Result<ListTargetsResponse, ErrorObjectOwned> {
        Ok(ListTargetsResponse {
            targets: self.supervisor.list_statuses(),
        })
    }

    /// targets.start.v1
    pub async fn start(&self, params: TargetRequest) -> Result<TargetResponse, ErrorObjectOwned> {
        info!(target_id = %params.id, "RPC start");
        self.supervisor
            .start(&params.id)
            .await
            .map_err(to_rpc_error)?;
        self.target_response(&params.id)
    }

    /// targets.stop.v1
    ///
    /// A stop requested by an operator also turns auto-restart off (persisted),
    /// so the target stays down until explicitly started again.
    pub async fn stop(&self, params: TargetRequest) -> Result<TargetResponse, ErrorObjectOwned> {
        info!(target_id = %params.id, "RPC stop");
        self.supervisor
            .set_auto_restart(&params.id, false)
            .await
            .map_err(to_rpc_error)?;
        self.supervisor
            .stop(&params.id)
            .await
            .map_err(to_rpc_error)?;
        self.target_response(&params.id)
    }

    /// targets.start_all.v1
    pub async fn start_all(&self) -> Result<BatchResponse, ErrorObjectOwned> {
        Ok(batch_response(self.supervisor.start_all().await))
    }

    /// targets.stop_all.v1
    pub async fn stop_all(&self) -> Result<BatchResponse, ErrorObjectOwned> {
        let report = self.supervisor.stop_all().await.map_err(to_rpc_error)?;
        Ok(batch_response(report))
    }

    /// targets.auto_restart.v1
    pub async fn set_auto_restart(
        &self,
        params: AutoRestartRequest,
    ) -> Result<TargetResponse, ErrorObjectOwned> {
        self.supervisor
            .set_auto_restart(&params.id, params.enabled)
            .await
            .map_err(to_rpc_error)?;
        self.target_response(&params.id)
    }

    /// targets.metrics.v1
    pub async fn metrics(&self, params: MetricsRequest) -> Result<MetricsResponse, ErrorObjectOwned> {
        let window = params.window_secs.min(MAX_METRICS_WINDOW_SECS);
        let samples = self
            .supervisor
            .metrics(&params.id, window)
            .map_err(to_rpc_error)?;
        Ok(MetricsResponse {
            id: params.id,
            samples,
        })
    }

    /// events.list.v1
    pub async fn events(&self) -> Result<EventsResponse, ErrorObjectOwned> {
        Ok(EventsResponse {
            events: self.supervisor.events(),
        })
    }

    /// logs.tail.v1
    pub async fn tail_logs(
        &self,
        params: TailLogsRequest,
    ) -> Result<TailLogsResponse, ErrorObjectOwned> {
        let lines = params.lines.clamp(1, MAX_TAIL_LINES);
        let config = self
            .supervisor
            .registry()
            .lookup(&params.id)
            .map_err(to_rpc_error)?
            .config();

        let raw = self
            .supervisor
            .tail(&params.id, lines)
            .await
            .map_err(to_rpc_error)?;

        let log_path = (!config.is_service()).then(|| {
            self.supervisor
                .log_path(&params.id)
                .to_string_lossy()
                .into_owned()
        });

        Ok(TailLogsResponse {
            id: params.id,
            log_path,
            lines: raw.iter().map(|line| self.sanitizer.sanitize(line)).collect(),
        })
    }

    /// config.get.v1
    pub async fn get_config(&self) -> Result<ConfigResponse, ErrorObjectOwned> {
        Ok(ConfigResponse {
            config: self.supervisor.config(),
        })
    }

    /// config.replace.v1
    pub async fn replace_config(
        &self,
        params: ReplaceConfigRequest,
    ) -> Result<ConfigResponse, ErrorObjectOwned> {
        self.supervisor
            .replace_config(params.config)
            .await
            .map_err(to_rpc_error)?;
        self.get_config().await
    }

    fn target_response(&self, id: &str) -> Result<TargetResponse, ErrorObjectOwned> {
        let target = self.supervisor.status(id).map_err(to_rpc_error)?;
        Ok(TargetResponse { target })
    }
}

fn batch_response(report: BatchReport) -> BatchResponse {
    BatchResponse {
        partial_failure: report.is_partial_failure(),
        succeeded: report.succeeded,
        errors: report.errors,
    }
}
