//! Cold source：每個訂閱者都從頭拿到完整序列。
//! Hot source：連線後依時間送出，晚到的訂閱者只看得到訂閱之後的元素。

use futures::stream::{self, BoxStream};
use futures::StreamExt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy)]
pub struct ColdSource {
    start: i64,
    count: usize,
}

impl ColdSource {
    pub fn range(start: i64, count: usize) -> Self {
        Self { start, count }
    }

    pub fn subscribe(&self) -> BoxStream<'static, i64> {
        stream::iter(self.start..self.start + self.count as i64).boxed()
    }
}

pub struct HotSource<T> {
    sender: Arc<Mutex<Option<broadcast::Sender<T>>>>,
    source: Mutex<Option<BoxStream<'static, T>>>,
    interval: Duration,
}

impl<T> HotSource<T>
where
    T: Clone + Send + std::fmt::Debug + 'static,
{
    /// 建立可連線的 hot source；`capacity` 是每個訂閱者可落後的元素數
    pub fn publish(source: BoxStream<'static, T>, interval: Duration, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(Mutex::new(Some(sender))),
            source: Mutex::new(Some(source)),
            interval,
        }
    }

    /// 開始送出元素。已經連線過則回傳 `None`。task 結束時回傳送出的元素數。
    pub fn connect(&self) -> Option<JoinHandle<usize>> {
        let mut source = self.source.lock().ok()?.take()?;
        let sender = Arc::clone(&self.sender);
        let interval = self.interval;

        Some(tokio::spawn(async move {
            let mut emitted = 0;
            while let Some(item) = source.next().await {
                tokio::time::sleep(interval).await;
                tracing::debug!("📡 Hot source emitting {:?}", item);
                let delivered = sender
                    .lock()
                    .ok()
                    .and_then(|guard| guard.as_ref().map(|tx| tx.send(item).is_ok()))
                    .unwrap_or(false);
                if !delivered {
                    tracing::debug!("📡 No subscribers for this element");
                }
                emitted += 1;
            }

            // 丟掉 sender，所有訂閱者收完緩衝後結束
            if let Ok(mut guard) = sender.lock() {
                guard.take();
            }
            tracing::info!("✅ Hot source completed after {} elements", emitted);
            emitted
        }))
    }

    /// 只會收到訂閱之後送出的元素；來源已完成時回傳空串流
    pub fn subscribe(&self) -> BoxStream<'static, T> {
        let receiver = self
            .sender
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|tx| tx.subscribe()));

        let Some(receiver) = receiver else {
            return stream::empty().boxed();
        };

        stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(item) => return Some((item, receiver)),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("⚠️ Subscriber lagged, skipped {} elements", skipped);
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        })
        .boxed()
    }
}

/// 等待 `connect` 啟動的 task 結束；task 失敗或被中止時記錄警告並回傳 `None`
pub async fn join_publisher(handle: JoinHandle<usize>) -> Option<usize> {
    match handle.await {
        Ok(emitted) => Some(emitted),
        Err(e) => {
            tracing::warn!("⚠️ Hot publisher task failed: {}", e);
            None
        }
    }
}
