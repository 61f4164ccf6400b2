use std::future::Future;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::info;

pub const TIMING_TARGET: &str = "compositor.timing";

/// Times one request through the composite route. If the handler future is
/// dropped before `finish` (client hung up mid-generation) the drop still
/// emits a completion line with status `cancelled`.
#[derive(Debug)]
pub struct RequestTimer {
    route: String,
    method: String,
    started_at: DateTime<Utc>,
    started_perf: Instant,
    finished: bool,
}

impl RequestTimer {
    pub fn start(route: &str, method: &str) -> Self {
        let timer = RequestTimer {
            route: route.to_string(),
            method: method.to_string(),
            started_at: Utc::now(),
            started_perf: Instant::now(),
            finished: false,
        };
        info!(
            target: TIMING_TARGET,
            "event=composite_received route={} method={} received_at={}",
            timer.route,
            timer.method,
            timer.started_at.to_rfc3339(),
        );
        timer
    }

    pub fn finish(&mut self, status: &str, detail: Option<&str>) {
        if self.finished {
            return;
        }
        self.finished = true;
        info!(
            target: TIMING_TARGET,
            "event=composite_completed route={} method={} started_at={} response_sent_at={} duration_s={:.3} status={} detail={}",
            self.route,
            self.method,
            self.started_at.to_rfc3339(),
            Utc::now().to_rfc3339(),
            self.started_perf.elapsed().as_secs_f64(),
            status,
            detail.unwrap_or_default()
        );
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        self.finish("cancelled", None);
    }
}

/// Wraps one provider call with start/finish timing lines. Failures carry the
/// error text (already redacted by the provider layer).
pub async fn log_llm_timing<T, F, Fut>(
    provider: &str,
    model: &str,
    operation: &str,
    metadata: Option<JsonValue>,
    call: F,
) -> anyhow::Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let metadata_text = metadata.map(|value| value.to_string()).unwrap_or_default();
    let started_perf = Instant::now();
    info!(
        target: TIMING_TARGET,
        "event=llm_request provider={provider} model={model} operation={operation} started_at={} metadata={metadata_text}",
        Utc::now().to_rfc3339(),
    );

    let result = call().await;

    let (status, error) = match &result {
        Ok(_) => ("success", String::new()),
        Err(err) => ("error", err.to_string()),
    };
    info!(
        target: TIMING_TARGET,
        "event=llm_response provider={provider} model={model} operation={operation} completed_at={} duration_s={:.3} status={status} error={error:?}",
        Utc::now().to_rfc3339(),
        started_perf.elapsed().as_secs_f64(),
    );

    result
}
