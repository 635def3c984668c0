use crate::config::toml_config::{AppConfig, PolicyKind};
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Clone, Parser)]
#[command(name = "reactive-books")]
#[command(about = "Book catalog lookups composed from async streams")]
pub struct CliConfig {
    /// Path to TOML configuration file (built-in sample catalog when omitted)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Join every book with its reviews
    Books {
        /// Override retry.policy from config
        #[arg(long, value_enum)]
        policy: Option<PolicyKind>,

        /// Override retry.max_retries from config
        #[arg(long)]
        max_retries: Option<u32>,

        /// Override pipeline.concurrency from config
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Look up a single book with its reviews
    Book { id: u64 },
    /// Run one of the operator demonstrations
    Demo {
        #[arg(value_enum)]
        which: DemoKind,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DemoKind {
    Fruits,
    Backpressure,
    HotCold,
}

impl CliConfig {
    /// 命令列參數覆蓋 TOML 設定
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Command::Books {
            policy,
            max_retries,
            concurrency,
        } = &self.command
        {
            if let Some(policy) = policy {
                config.retry.policy = *policy;
                tracing::info!("🔧 Retry policy overridden to: {:?}", policy);
            }
            if let Some(max_retries) = max_retries {
                config.retry.max_retries = *max_retries;
                tracing::info!("🔧 Max retries overridden to: {}", max_retries);
            }
            if let Some(concurrency) = concurrency {
                config.pipeline.concurrency = Some(*concurrency);
                tracing::info!("🔧 Concurrency overridden to: {}", concurrency);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::retry::RetryPolicy;

    #[test]
    fn test_parse_books_overrides() {
        let cli = CliConfig::parse_from([
            "reactive-books",
            "books",
            "--policy",
            "fixed",
            "--max-retries",
            "2",
            "--concurrency",
            "4",
        ]);

        let mut config = AppConfig::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.retry_policy(), RetryPolicy::fixed(2));
        assert_eq!(config.concurrency(), Some(4));
    }

    #[test]
    fn test_parse_demo() {
        let cli = CliConfig::parse_from(["reactive-books", "-v", "demo", "hot-cold"]);

        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Command::Demo {
                which: DemoKind::HotCold
            }
        ));
    }
}
