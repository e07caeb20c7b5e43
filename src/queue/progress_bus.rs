// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::progress::ProgressEvent;
use dashmap::DashMap;
use futures::stream::{self, Stream};
use metrics::counter;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;
use uuid::Uuid;

/// 每个订阅者的默认队列容量
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 64;
/// 默认保留的已结束任务数量
pub const DEFAULT_FINISHED_RETENTION: usize = 4096;

struct Subscriber {
    id: u64,
    sender: mpsc::Sender<ProgressEvent>,
}

/// 进程级进度事件总线
///
/// 按任务ID隔离订阅；每个订阅者拥有独立的有界队列，
/// 发布永不阻塞，队列已满时只丢弃该订阅者的事件。
pub struct ProgressBus {
    subscribers: DashMap<Uuid, Vec<Subscriber>>,
    finished: Mutex<FinishedJobs>,
    capacity: usize,
    next_subscriber: AtomicU64,
}

/// 最近已发布终止事件的任务，超出容量时按先进先出淘汰
#[derive(Default)]
struct FinishedJobs {
    ids: HashSet<Uuid>,
    order: VecDeque<Uuid>,
    retention: usize,
}

impl FinishedJobs {
    fn with_retention(retention: usize) -> Self {
        Self {
            retention: retention.max(1),
            ..Default::default()
        }
    }

    fn insert(&mut self, job_id: Uuid) {
        if !self.ids.insert(job_id) {
            return;
        }
        self.order.push_back(job_id);
        while self.order.len() > self.retention {
            if let Some(evicted) = self.order.pop_front() {
                self.ids.remove(&evicted);
            }
        }
    }

    fn contains(&self, job_id: &Uuid) -> bool {
        self.ids.contains(job_id)
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_CAPACITY)
    }
}

impl ProgressBus {
    pub fn new(capacity: usize) -> Self {
        Self::with_retention(capacity, DEFAULT_FINISHED_RETENTION)
    }

    /// 指定队列容量与已结束任务的保留数量
    pub fn with_retention(capacity: usize, retention: usize) -> Self {
        Self {
            subscribers: DashMap::new(),
            finished: Mutex::new(FinishedJobs::with_retention(retention)),
            capacity: capacity.max(1),
            next_subscriber: AtomicU64::new(0),
        }
    }

    /// 订阅某个任务的事件
    ///
    /// 只会收到订阅之后发布的事件；收到完成或错误事件后序列结束。
    /// 任务已结束时返回一个立即结束的订阅。
    pub fn subscribe(&self, job_id: Uuid) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.capacity);

        // 持有条目锁检查，与终止事件的移除互斥
        let entry = self.subscribers.entry(job_id);
        if self.is_finished(job_id) {
            drop(entry);
            debug!("Job {} already finished, subscription is closed", job_id);
            return Subscription {
                job_id,
                receiver,
                finished: true,
            };
        }

        let id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        entry.or_default().push(Subscriber { id, sender });
        debug!("Subscriber {} attached to job {}", id, job_id);

        Subscription {
            job_id,
            receiver,
            finished: false,
        }
    }

    /// 发布事件
    ///
    /// 终止事件发布后，该任务的所有订阅都会被移除，订阅者排空队列后结束。
    pub fn publish(&self, event: ProgressEvent) {
        let job_id = event.job_id();
        let terminal = event.is_terminal();

        if let Some(mut subscribers) = self.subscribers.get_mut(&job_id) {
            subscribers.retain(|subscriber| match subscriber.sender.try_send(event.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    counter!("progress_events_dropped_total").increment(1);
                    debug!(
                        "Dropped progress event for slow subscriber {} of job {}",
                        subscriber.id, job_id
                    );
                    true
                }
                Err(TrySendError::Closed(_)) => false,
            });
        }

        if terminal {
            self.finished.lock().insert(job_id);
            self.subscribers.remove(&job_id);
        } else {
            self.subscribers
                .remove_if(&job_id, |_, subscribers| subscribers.is_empty());
        }
    }

    /// 任务是否已发布过终止事件（仅在保留范围内）
    pub fn is_finished(&self, job_id: Uuid) -> bool {
        self.finished.lock().contains(&job_id)
    }

    /// 某个任务当前的订阅者数量
    pub fn subscriber_count(&self, job_id: Uuid) -> usize {
        self.subscribers
            .get(&job_id)
            .map(|subscribers| {
                subscribers
                    .iter()
                    .filter(|subscriber| !subscriber.sender.is_closed())
                    .count()
            })
            .unwrap_or(0)
    }
}

/// 单个任务的事件订阅
///
/// 有限序列：终止事件之后（或总线移除订阅之后）结束。
pub struct Subscription {
    job_id: Uuid,
    receiver: mpsc::Receiver<ProgressEvent>,
    finished: bool,
}

impl Subscription {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// 下一个事件；序列结束时返回 `None`
    pub async fn next(&mut self) -> Option<ProgressEvent> {
        if self.finished {
            return None;
        }
        match self.receiver.recv().await {
            Some(event) => {
                if event.is_terminal() {
                    self.finish();
                }
                Some(event)
            }
            None => {
                self.finished = true;
                None
            }
        }
    }

    /// 转换为异步流
    pub fn into_stream(self) -> impl Stream<Item = ProgressEvent> {
        stream::unfold(self, |mut subscription| async move {
            subscription
                .next()
                .await
                .map(|event| (event, subscription))
        })
    }

    fn finish(&mut self) {
        self.finished = true;
        self.receiver.close();
    }
}
