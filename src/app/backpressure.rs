//! 背壓示範：消費端只要求有限數量時，快速的生產端該怎麼處理多出來的元素。
//!
//! 生產端在第一次 poll 時才以 tokio task 啟動，從不等待消費端。消費端的需求以
//! `Semaphore` 的 permit 表示，每送出一個元素就消耗一個；permit 用完之後的元素
//! 一律交給溢出策略處理，與消費端的速度和 runtime 的排程無關。

use crate::utils::error::{BookError, Result};
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::Semaphore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowStrategy {
    /// 超出需求的元素交給 callback 後丟棄，串流照常結束
    Drop,
    /// 需求之外再緩衝 `max` 個，緩衝滿了就以 `Overflow` 結束
    Buffer { max: usize },
    /// 一超出需求就以 `Overflow` 結束
    Error,
}

impl OverflowStrategy {
    fn buffer_size(&self) -> usize {
        match self {
            OverflowStrategy::Buffer { max } => *max,
            OverflowStrategy::Drop | OverflowStrategy::Error => 0,
        }
    }
}

pub fn range(start: i64, count: usize) -> BoxStream<'static, i64> {
    stream::iter(start..start + count as i64).boxed()
}

/// 只要求 `demand` 個元素，拿到後取消訂閱
pub async fn request_then_cancel<T: Send + 'static>(
    source: BoxStream<'static, T>,
    demand: usize,
) -> Vec<T> {
    source.take(demand).collect().await
}

pub fn on_backpressure<T, F>(
    source: BoxStream<'static, T>,
    demand: usize,
    strategy: OverflowStrategy,
    on_overflow: F,
) -> BoxStream<'static, Result<T>>
where
    T: Send + 'static,
    F: Fn(&T) + Send + 'static,
{
    let demand = demand.max(1);
    let buffer = strategy.buffer_size();

    stream::once(async move {
        // 需求 + 緩衝 + 結尾的錯誤，send 永遠不會遇到 Full
        let (tx, rx) = mpsc::channel::<Result<T>>(demand + buffer + 1);
        let requested = Arc::new(Semaphore::new(demand));

        tokio::spawn(async move {
            let mut source = source;
            let mut buffered = 0usize;

            while let Some(item) = source.next().await {
                let within_demand = match requested.try_acquire() {
                    Ok(permit) => {
                        permit.forget();
                        true
                    }
                    Err(_) => false,
                };

                if !within_demand && buffered < buffer {
                    buffered += 1;
                    tracing::debug!("Buffering element {} of {}", buffered, buffer);
                } else if !within_demand {
                    on_overflow(&item);
                    let message = match strategy {
                        OverflowStrategy::Drop => continue,
                        OverflowStrategy::Buffer { max } => {
                            format!("buffer of {} elements is full", max)
                        }
                        OverflowStrategy::Error => {
                            "could not emit value due to lack of requests".to_string()
                        }
                    };
                    tracing::warn!("⚠️ Backpressure overflow: {}", message);
                    let _ = tx.try_send(Err(BookError::Overflow { message }));
                    return;
                }

                if tx.try_send(Ok(item)).is_err() {
                    tracing::debug!("Consumer cancelled, stopping producer");
                    return;
                }
            }
        });

        stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
    })
    .flatten()
    .boxed()
}
