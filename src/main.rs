// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use clap::Parser;
use crawlpilot::config::settings::Settings;
use crawlpilot::domain::models::engine::EngineKind;
use crawlpilot::domain::models::progress::ProgressEvent;
use crawlpilot::engines::http_engine::HttpEngine;
use crawlpilot::engines::premium_engine::PremiumApiEngine;
use crawlpilot::engines::profiler::{DisabledProfiler, HtmlSiteProfiler, SiteProfiler};
use crawlpilot::engines::registry::EngineSet;
use crawlpilot::engines::selector::{EngineSelector, StrategyTable};
use crawlpilot::infrastructure::metrics;
use crawlpilot::utils::error_formatter::explain_failure;
use crawlpilot::utils::telemetry;
use crawlpilot::{
    CrawlPipeline, CrawlRequest, FallbackOrchestrator, JobScheduler, ProgressBus,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "crawlpilot",
    about = "Extract readable content from web pages with strategy-based engine fallback",
    version
)]
struct Cli {
    /// URLs to crawl.
    #[arg(required = true)]
    urls: Vec<String>,

    /// Maximum number of URLs processed concurrently.
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Force a single engine (premium, ai_extraction, browser, http).
    #[arg(short, long)]
    engine: Option<EngineKind>,

    /// Describe the content to extract.
    #[arg(long)]
    target: Option<String>,

    /// Use browser-like request headers.
    #[arg(long)]
    anti_bot: bool,

    /// Keep the raw engine text instead of cleaning it.
    #[arg(long)]
    raw: bool,

    /// Write the job report to a file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// 主函数
///
/// 加载配置、注册引擎、提交一个任务并输出任务报告
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration
    let settings = Settings::new()?;

    // 2. Initialize logging and metrics
    telemetry::init_telemetry(&settings.telemetry.log_filter, settings.telemetry.json_logs);
    metrics::init_metrics(settings.metrics_addr()?);
    info!("Starting crawlpilot...");

    // 3. Register engines
    let disabled = settings.disabled_engines()?;
    let mut engines = EngineSet::with_disabled(disabled.iter().copied());
    engines.register(Arc::new(HttpEngine::new(settings.engines.user_agent.clone())));
    if let Some(url) = &settings.engines.premium_api_url {
        engines.register(Arc::new(PremiumApiEngine::new(
            url.clone(),
            settings.engines.premium_api_key.clone(),
        )));
    }
    info!("Registered engines: {:?}", engines.available());

    // 4. Build the pipeline
    let profiler: Arc<dyn SiteProfiler> = if settings.profiler.enabled {
        Arc::new(HtmlSiteProfiler::new(
            &settings.engines.user_agent,
            settings.profiler.sample_bytes,
        ))
    } else {
        Arc::new(DisabledProfiler)
    };
    let selector = EngineSelector::new(StrategyTable::standard()).with_disabled(disabled);
    let orchestrator = FallbackOrchestrator::new(engines, settings.orchestrator_config());
    let pipeline = CrawlPipeline::new(profiler, selector, orchestrator)
        .with_profile_budget(settings.profile_budget());

    let progress = Arc::new(ProgressBus::new(settings.progress.subscriber_capacity));
    let scheduler = JobScheduler::new(
        Arc::new(pipeline),
        progress.clone(),
        settings.scheduler_config(),
    );

    // 5. Submit the job
    let requests = cli
        .urls
        .iter()
        .map(|url| -> anyhow::Result<CrawlRequest> {
            let mut request = CrawlRequest::new(url)?
                .with_timeout(settings.default_timeout())?
                .with_clean_text(!cli.raw)
                .with_anti_bot_mode(cli.anti_bot);
            if let Some(engine) = cli.engine {
                request = request.with_engine_override(engine);
            }
            if let Some(target) = &cli.target {
                request = request.with_target_content(target.clone());
            }
            Ok(request)
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let job_id = scheduler.submit_requests(requests, cli.concurrency)?;
    let mut events = progress.subscribe(job_id);

    // 订阅可能晚于任务结束，因此同时等待任务终态
    let finished = scheduler.wait(job_id);
    tokio::pin!(finished);
    loop {
        tokio::select! {
            biased;
            Some(event) = events.next() => log_event(job_id, event),
            summary = &mut finished => {
                let summary = summary?;
                info!("Job {} is {}", job_id, summary.status);
                break;
            }
        }
    }

    // 6. Report
    let report = scheduler.report(job_id)?;
    for result in &report.results {
        if let Some(explanation) = explain_failure(result) {
            warn!("{}: {}", result.url, explanation);
        }
    }

    match cli.output {
        Some(path) => {
            report.write_json(&path).await?;
            info!("Report written to {}", path.display());
        }
        None => println!("{}", report.to_json_pretty()?),
    }

    Ok(())
}

fn log_event(job_id: uuid::Uuid, event: ProgressEvent) {
    match event {
        ProgressEvent::ProgressUpdate {
            percentage,
            message,
            ..
        } => info!("[{:>3}%] {}", percentage, message),
        ProgressEvent::Completion { result, .. } => info!(
            "Job {} finished: {}/{} succeeded",
            result.job_id, result.counts.succeeded, result.counts.total
        ),
        ProgressEvent::Error { message, .. } => warn!("Job {} ended: {}", job_id, message),
    }
}
