use crate::domain::model::Book;
use crate::domain::ports::PipelineObserver;
use crate::utils::error::BookError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

fn build_filter(verbose: bool, level: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| match (verbose, level) {
        (true, _) => EnvFilter::new("reactive_books=debug,info"),
        (false, Some(level)) => EnvFilter::new(format!("reactive_books={}", level)),
        (false, None) => EnvFilter::new("reactive_books=info"),
    })
}

pub fn init_logger(verbose: bool, level: Option<&str>, format: LogFormat) {
    let filter = build_filter(verbose, level);

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    // try_init：測試中重複初始化時不 panic
    let _ = match format {
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.compact())
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .try_init(),
    };
}

/// 把管線事件轉成 tracing 事件的 observer
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_subscribe(&self, pipeline: &str) {
        tracing::info!(pipeline, "onSubscribe");
    }

    fn on_next(&self, pipeline: &str, book: &Book) {
        tracing::info!(
            pipeline,
            book_id = book.id(),
            reviews = book.reviews.len(),
            "onNext"
        );
    }

    fn on_error(&self, pipeline: &str, error: &BookError) {
        tracing::error!(pipeline, %error, "onError");
    }

    fn on_complete(&self, pipeline: &str, emitted: usize) {
        tracing::info!(pipeline, emitted, "onComplete");
    }

    fn on_retry(&self, pipeline: &str, attempt: u32, delay: Duration, error: &BookError) {
        tracing::warn!(pipeline, attempt, ?delay, %error, "onRetry");
    }
}
