use anyhow::Context;
use clap::Parser;
use futures::StreamExt;
use reactive_books::app::{backpressure, fruits, hot_cold};
use reactive_books::config::cli::{Command, DemoKind};
use reactive_books::utils::error::ErrorSeverity;
use reactive_books::utils::{logger, validation::Validate};
use reactive_books::{AppConfig, BookError, BookService, CliConfig, TracingObserver};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 載入配置，沒有指定檔案時使用內建書目
    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path)
            .with_context(|| format!("Failed to load config file '{}'", path))?,
        None => AppConfig::default(),
    };

    // 初始化日誌
    logger::init_logger(cli.verbose, config.log_level(), config.log_format());
    tracing::info!("🚀 Starting reactive-books ({})", config.pipeline.name);

    cli.apply_overrides(&mut config);

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if let Err(e) = run(&cli.command, &config).await {
        tracing::error!(
            "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

async fn run(command: &Command, config: &AppConfig) -> Result<(), BookError> {
    match command {
        Command::Books { .. } => {
            config.require_catalog()?;
            let service = build_service(config);
            let policy = config.retry_policy();
            tracing::info!("📚 Fetching books with retry policy {:?}", policy);

            let books = service.get_books(&policy).await?;
            for book in &books {
                println!("{}", serde_json::to_string(book)?);
            }
            tracing::info!("✅ Fetched {} books", books.len());
        }
        Command::Book { id } => {
            config.require_catalog()?;
            let service = build_service(config);
            match service.get_book_by_id(*id).await? {
                Some(book) => println!("{}", serde_json::to_string_pretty(&book)?),
                None => println!("📭 Book {} not found", id),
            }
        }
        Command::Demo { which } => run_demo(*which).await?,
    }
    Ok(())
}

fn build_service(
    config: &AppConfig,
) -> BookService<reactive_books::InMemoryBookInfoService, reactive_books::InMemoryReviewService> {
    let (infos, reviews) = config.build_services();
    BookService::new(infos, reviews)
        .with_concurrency(config.concurrency())
        .with_observer(Arc::new(TracingObserver))
}

async fn run_demo(which: DemoKind) -> Result<(), BookError> {
    match which {
        DemoKind::Fruits => {
            println!("fruits            {:?}", fruits::fruits().collect::<Vec<_>>().await);
            println!("map               {:?}", fruits::fruits_map().collect::<Vec<_>>().await);
            println!("filter(5)         {:?}", fruits::fruits_filter(5).collect::<Vec<_>>().await);
            println!("flat_map          {:?}", fruits::fruits_flat_map().collect::<Vec<_>>().await);
            println!(
                "flat_map_async    {:?}",
                fruits::fruits_flat_map_async(Duration::from_millis(100))
                    .collect::<Vec<_>>()
                    .await
            );
            println!(
                "concat_map        {:?}",
                fruits::fruits_concat_map(Duration::from_millis(100))
                    .collect::<Vec<_>>()
                    .await
            );
            println!("switch_if_empty   {:?}", fruits::fruits_switch_if_empty(6).collect::<Vec<_>>().await);
            println!("merge             {:?}", fruits::fruits_merge().collect::<Vec<_>>().await);
            println!("merge_sequential  {:?}", fruits::fruits_merge_sequential().collect::<Vec<_>>().await);
            println!("zip3              {:?}", fruits::fruits_zip3().collect::<Vec<_>>().await);
            println!("on_error_return   {:?}", fruits::fruits_on_error_return().collect::<Vec<_>>().await);
            println!("on_error_continue {:?}", fruits::fruits_on_error_continue().collect::<Vec<_>>().await);
            println!("on_error_map      {:?}", fruits::fruits_on_error_map().collect::<Vec<_>>().await);
        }
        DemoKind::Backpressure => {
            let first = backpressure::request_then_cancel(backpressure::range(1, 100), 3).await;
            println!("request(3)        {:?}", first);

            for strategy in [
                backpressure::OverflowStrategy::Drop,
                backpressure::OverflowStrategy::Buffer { max: 10 },
                backpressure::OverflowStrategy::Error,
            ] {
                let stream = backpressure::on_backpressure(
                    backpressure::range(1, 100),
                    3,
                    strategy,
                    |value| tracing::debug!("Overflowed value = {}", value),
                );
                let received = stream.collect::<Vec<_>>().await;
                println!("{:<17} {:?}", format!("{:?}", strategy), received);
            }
        }
        DemoKind::HotCold => {
            let cold = hot_cold::ColdSource::range(1, 5);
            println!("cold subscriber 1 {:?}", cold.subscribe().collect::<Vec<_>>().await);
            println!("cold subscriber 2 {:?}", cold.subscribe().collect::<Vec<_>>().await);

            let hot = hot_cold::HotSource::publish(cold.subscribe(), Duration::from_millis(500), 16);
            let handle = hot.connect();
            let first = tokio::spawn(hot.subscribe().collect::<Vec<_>>());
            tokio::time::sleep(Duration::from_millis(1200)).await;
            let second = tokio::spawn(hot.subscribe().collect::<Vec<_>>());

            if let Some(handle) = handle {
                hot_cold::join_publisher(handle).await;
            }
            println!("hot subscriber 1  {:?}", first.await.unwrap_or_default());
            println!("hot subscriber 2  {:?}", second.await.unwrap_or_default());
        }
    }
    Ok(())
}
