// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::crawl_request::{CrawlRequest, DEFAULT_TIMEOUT};
use crate::domain::models::crawl_result::{CrawlMetadata, CrawlResult};
use crate::domain::models::job::{CancelToken, Job, JobReport, JobStatus, JobSummary};
use crate::domain::models::progress::ProgressEvent;
use crate::queue::progress_bus::ProgressBus;
use crate::utils::errors::{DomainError, SchedulerError, ValidationError};
use crate::workers::url_worker::CrawlPipeline;
use dashmap::DashMap;
use futures::FutureExt;
use metrics::counter;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

/// 默认并发数
pub const DEFAULT_CONCURRENCY: usize = 5;
/// 默认并发硬上限
pub const DEFAULT_HARD_CAP: usize = 10;

/// 调度器配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// 调用方未指定并发数时使用
    pub default_concurrency: usize,
    /// 无论调用方请求多少，每个任务的并发都不超过该值
    pub hard_cap: usize,
    /// `submit` 构造请求时使用的单次引擎尝试超时
    pub request_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_concurrency: DEFAULT_CONCURRENCY,
            hard_cap: DEFAULT_HARD_CAP,
            request_timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl SchedulerConfig {
    /// 校验并截断并发数：0 非法，超过硬上限时取硬上限
    pub fn effective_concurrency(&self, requested: Option<usize>) -> Result<usize, ValidationError> {
        let hard_cap = self.hard_cap.max(1);
        match requested.unwrap_or(self.default_concurrency) {
            0 => Err(ValidationError::InvalidConcurrency {
                requested: 0,
                hard_cap,
            }),
            n => Ok(n.min(hard_cap)),
        }
    }
}

struct JobHandle {
    job: parking_lot::Mutex<Job>,
    cancel: CancelToken,
    done: watch::Sender<bool>,
}

/// 批量任务调度器
///
/// 每个任务拥有独立的有界工作池，池内工作者从共享队列拉取下一个 URL，
/// 依次执行站点分析、引擎选择与降级编排，并在锁内写回结果。
pub struct JobScheduler {
    pipeline: Arc<CrawlPipeline>,
    progress: Arc<ProgressBus>,
    config: SchedulerConfig,
    jobs: Arc<DashMap<Uuid, Arc<JobHandle>>>,
}

impl JobScheduler {
    pub fn new(
        pipeline: Arc<CrawlPipeline>,
        progress: Arc<ProgressBus>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            pipeline,
            progress,
            config,
            jobs: Arc::new(DashMap::new()),
        }
    }

    pub fn config(&self) -> SchedulerConfig {
        self.config
    }

    pub fn progress(&self) -> &Arc<ProgressBus> {
        &self.progress
    }

    /// 提交一批 URL
    ///
    /// # 参数
    ///
    /// * `urls` - 非空的绝对 http/https URL 列表
    /// * `concurrency` - 并发数，`None` 时使用默认值
    ///
    /// # 返回值
    ///
    /// * `Ok(Uuid)` - 任务ID
    /// * `Err(SchedulerError)` - 校验失败，不会调用任何引擎
    pub fn submit<S: AsRef<str>>(
        &self,
        urls: &[S],
        concurrency: Option<usize>,
    ) -> Result<Uuid, SchedulerError> {
        let requests = urls
            .iter()
            .map(|url| CrawlRequest::new(url.as_ref())?.with_timeout(self.config.request_timeout))
            .collect::<Result<Vec<_>, _>>()?;
        self.submit_requests(requests, concurrency)
    }

    /// 提交已构造好的请求，可携带各自的覆盖参数
    pub fn submit_requests(
        &self,
        requests: Vec<CrawlRequest>,
        concurrency: Option<usize>,
    ) -> Result<Uuid, SchedulerError> {
        if requests.is_empty() {
            return Err(ValidationError::EmptyBatch.into());
        }
        let limit = self.config.effective_concurrency(concurrency)?;

        let job_id = Uuid::new_v4();
        let requests = requests
            .into_iter()
            .map(|request| request.with_job_id(job_id))
            .collect();
        let job = Job::new(job_id, requests, limit);
        let (done, _) = watch::channel(false);

        let handle = Arc::new(JobHandle {
            job: parking_lot::Mutex::new(job),
            cancel: CancelToken::new(),
            done,
        });
        self.jobs.insert(job_id, handle.clone());

        counter!("jobs_submitted_total").increment(1);
        info!("Submitted job {} with concurrency limit {}", job_id, limit);

        let pipeline = self.pipeline.clone();
        let progress = self.progress.clone();
        tokio::spawn(async move {
            run_job(job_id, handle, pipeline, progress).await;
        });

        Ok(job_id)
    }

    /// 任务当前状态的快照
    pub fn status(&self, job_id: Uuid) -> Result<Job, SchedulerError> {
        Ok(self.handle(job_id)?.job.lock().clone())
    }

    /// 取消任务：不再派发新的 URL，进行中的 URL 完成当前引擎尝试
    pub fn cancel(&self, job_id: Uuid) -> Result<JobSummary, SchedulerError> {
        let handle = self.handle(job_id)?;
        let summary = handle.job.lock().summary();
        if summary.status.is_terminal() {
            return Ok(summary);
        }
        info!("Cancellation requested for job {}", job_id);
        handle.cancel.cancel();
        Ok(summary)
    }

    /// 等待任务进入终态
    pub async fn wait(&self, job_id: Uuid) -> Result<JobSummary, SchedulerError> {
        let handle = self.handle(job_id)?;
        let mut done = handle.done.subscribe();
        // 发送端随句柄存活，等待只会因终态返回
        let _ = done.wait_for(|finished| *finished).await;
        let summary = handle.job.lock().summary();
        Ok(summary)
    }

    /// 按提交顺序返回已有结果
    pub fn results(&self, job_id: Uuid) -> Result<Vec<CrawlResult>, SchedulerError> {
        Ok(self.handle(job_id)?.job.lock().results().cloned().collect())
    }

    pub fn report(&self, job_id: Uuid) -> Result<JobReport, SchedulerError> {
        Ok(self.handle(job_id)?.job.lock().report())
    }

    /// 所有已知任务的摘要，按创建时间排序
    pub fn list(&self) -> Vec<JobSummary> {
        let mut summaries: Vec<JobSummary> = self
            .jobs
            .iter()
            .map(|entry| entry.value().job.lock().summary())
            .collect();
        summaries.sort_by_key(|summary| summary.created_at);
        summaries
    }

    fn handle(&self, job_id: Uuid) -> Result<Arc<JobHandle>, SchedulerError> {
        self.jobs
            .get(&job_id)
            .map(|entry| entry.value().clone())
            .ok_or(SchedulerError::JobNotFound(job_id))
    }
}

async fn run_job(
    job_id: Uuid,
    handle: Arc<JobHandle>,
    pipeline: Arc<CrawlPipeline>,
    progress: Arc<ProgressBus>,
) {
    let (requests, limit) = {
        let mut job = handle.job.lock();
        if let Err(e) = job.start() {
            error!("Job {} could not start: {}", job_id, e);
            drop(job);
            finish(job_id, &handle, &progress);
            return;
        }
        (job.requests.clone(), job.concurrency_limit)
    };

    progress.publish(ProgressEvent::progress(
        job_id,
        "started",
        5,
        format!("processing {} URLs", requests.len()),
    ));

    let requests = Arc::new(requests);
    let queue = Arc::new(parking_lot::Mutex::new(
        (0..requests.len()).collect::<VecDeque<usize>>(),
    ));

    let workers: Vec<JoinHandle<()>> = (0..limit.min(requests.len()))
        .map(|worker_id| {
            let handle = handle.clone();
            let pipeline = pipeline.clone();
            let progress = progress.clone();
            let requests = requests.clone();
            let queue = queue.clone();
            tokio::spawn(async move {
                worker_loop(worker_id, job_id, handle, pipeline, progress, requests, queue).await;
            })
        })
        .collect();

    for result in futures::future::join_all(workers).await {
        if let Err(e) = result {
            error!("Worker for job {} terminated abnormally: {}", job_id, e);
        }
    }

    if let Err(e) = finalize(&mut handle.job.lock(), handle.cancel.is_cancelled()) {
        error!("Job {} could not be finalised: {}", job_id, e);
    }

    finish(job_id, &handle, &progress);
}

/// 工作器退出后仍未进入终态的任务：取消则标记为已取消，否则标记为失败
fn finalize(job: &mut Job, cancelled: bool) -> Result<(), DomainError> {
    if job.is_terminal() {
        return Ok(());
    }
    if cancelled {
        return job.cancel();
    }
    let pending = job.pending_indices().len();
    job.fail(format!("{} URLs were never processed", pending))
}

async fn worker_loop(
    worker_id: usize,
    job_id: Uuid,
    handle: Arc<JobHandle>,
    pipeline: Arc<CrawlPipeline>,
    progress: Arc<ProgressBus>,
    requests: Arc<Vec<CrawlRequest>>,
    queue: Arc<parking_lot::Mutex<VecDeque<usize>>>,
) {
    loop {
        if handle.cancel.is_cancelled() {
            info!("Worker {} of job {} stopping after cancellation", worker_id, job_id);
            break;
        }
        let Some(index) = queue.lock().pop_front() else {
            break;
        };
        let request = &requests[index];

        let result = AssertUnwindSafe(pipeline.process(request, &handle.cancel))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                error!("Pipeline panicked for {}", request.url_str());
                CrawlResult::failed(
                    request.url_str(),
                    "internal error while processing URL",
                    CrawlMetadata::default(),
                )
            });

        let event = {
            let mut job = handle.job.lock();
            let succeeded = result.is_complete();
            if let Err(e) = job.record(index, result) {
                error!("Failed to record result for job {}: {}", job_id, e);
                continue;
            }
            ProgressEvent::progress(
                job_id,
                "url_completed",
                job.progress_percentage().min(90),
                format!(
                    "{} {} ({}/{})",
                    request.url_str(),
                    if succeeded { "succeeded" } else { "failed" },
                    job.counts.completed,
                    job.counts.total
                ),
            )
        };
        progress.publish(event);
    }
}

/// 发布终止事件并唤醒等待者
fn finish(job_id: Uuid, handle: &JobHandle, progress: &ProgressBus) {
    let summary = handle.job.lock().summary();
    counter!("jobs_finished_total", "status" => summary.status.to_string()).increment(1);

    match summary.status {
        JobStatus::Completed => {
            info!(
                "Job {} completed: {}/{} succeeded",
                job_id, summary.counts.succeeded, summary.counts.total
            );
            progress.publish(ProgressEvent::progress(job_id, "finished", 100, "job completed"));
            progress.publish(ProgressEvent::completion(summary));
        }
        _ => {
            let message = summary
                .error
                .clone()
                .unwrap_or_else(|| format!("job ended with status {}", summary.status));
            warn!("Job {} ended without completing: {}", job_id, message);
            progress.publish(ProgressEvent::error(job_id, message));
        }
    }

    handle.done.send_replace(true);
}
