// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{info, warn};

/// 安装 Prometheus 导出器并注册指标描述
///
/// 未配置地址时只注册描述；安装失败只记录警告。
pub fn init_metrics(addr: Option<SocketAddr>) {
    if let Some(addr) = addr {
        match PrometheusBuilder::new().with_http_listener(addr).install() {
            Ok(()) => info!("Metrics exporter listening on {}", addr),
            Err(e) => warn!(
                "Failed to install Prometheus recorder: {}. This might happen if the port is already in use.",
                e
            ),
        }
    }
    describe_metrics();
}

/// 注册所有指标的描述
pub fn describe_metrics() {
    describe_counter!(
        "engine_attempts_total",
        "Engine attempts by engine and outcome"
    );
    describe_histogram!(
        "engine_attempt_duration_seconds",
        Unit::Seconds,
        "Duration of a single engine attempt"
    );
    describe_counter!(
        "fallback_exhausted_total",
        "Requests for which every engine failed"
    );
    describe_counter!("jobs_submitted_total", "Jobs accepted by the scheduler");
    describe_counter!("jobs_finished_total", "Jobs that reached a terminal status");
    describe_counter!(
        "progress_events_dropped_total",
        "Progress events dropped for slow subscribers"
    );
}
