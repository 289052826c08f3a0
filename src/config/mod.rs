pub mod toml_config;

#[cfg(feature = "cli")]
use crate::domain::model::HttpMethod;
#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use crate::utils::validation::{self, Validate};
#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use std::fmt;
#[cfg(feature = "cli")]
use std::path::PathBuf;
#[cfg(feature = "cli")]
use toml_config::ClientConfig;

#[cfg(feature = "cli")]
#[derive(Clone, Parser)]
#[command(name = "mahi-client")]
#[command(about = "MahiLLM backend API client with retries and batch requests")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override api.base_url from config
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Identity token sent as Bearer authorization
    #[arg(long, env = "MAHI_ID_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// Override retry.max_attempts from config
    #[arg(long, global = true)]
    pub max_attempts: Option<u32>,

    /// Override retry.base_delay_ms from config
    #[arg(long, global = true)]
    pub base_delay_ms: Option<u64>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Send one request to an API endpoint, e.g. /user/profile
    Request {
        endpoint: String,

        #[arg(short = 'X', long, default_value = "GET")]
        method: HttpMethod,

        /// JSON request body
        #[arg(short, long)]
        body: Option<String>,

        /// Make a single attempt only
        #[arg(long)]
        no_retry: bool,
    },
    /// GET several endpoints at once and report each result
    Batch {
        #[arg(required = true)]
        endpoints: Vec<String>,

        #[arg(long)]
        retry: bool,
    },
    /// Ask the built-in assistant a question
    Chat {
        #[arg(required = true)]
        message: Vec<String>,
    },
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// 載入設定檔並套用命令列覆蓋
    pub fn load_client_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => {
                tracing::info!("📁 Loading configuration from: {}", path.display());
                ClientConfig::from_file(path)?
            }
            None => ClientConfig::default(),
        };

        if let Some(base_url) = &self.base_url {
            tracing::debug!("🔧 base_url overridden to: {}", base_url);
            config.api.base_url = base_url.clone();
        }
        if let Some(max_attempts) = self.max_attempts {
            config.retry.max_attempts = Some(max_attempts);
        }
        if let Some(base_delay_ms) = self.base_delay_ms {
            config.retry.base_delay_ms = Some(base_delay_ms);
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(feature = "cli")]
impl fmt::Debug for CliConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CliConfig")
            .field("config", &self.config)
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("max_attempts", &self.max_attempts)
            .field("base_delay_ms", &self.base_delay_ms)
            .field("verbose", &self.verbose)
            .field("json_logs", &self.json_logs)
            .field("command", &self.command)
            .finish()
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        if let Some(base_url) = &self.base_url {
            validation::validate_url("--base-url", base_url)?;
        }
        if let Some(token) = &self.token {
            validation::validate_non_empty_string("--token", token)?;
        }

        match &self.command {
            Command::Request { endpoint, .. } => validation::validate_endpoint("endpoint", endpoint),
            Command::Batch { endpoints, .. } => endpoints
                .iter()
                .try_for_each(|endpoint| validation::validate_endpoint("endpoints", endpoint)),
            Command::Chat { .. } => Ok(()),
        }
    }
}
