use crate::core::retry::{RetryExecutor, RetryOn, RetryPolicy};
use crate::domain::model::ErrorCode;
use crate::utils::error::{ClientError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.mahillm.com";
pub const DEFAULT_API_VERSION: &str = "v1";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_CLIENT_TYPE: &str = "web";
pub const DEFAULT_CONCURRENT_REQUESTS: usize = 5;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    pub timeout_ms: Option<u64>,
    pub client_type: Option<String>,
    pub headers: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub attempt_timeout_ms: Option<u64>,
    /// 未設定時所有失敗都會重試
    pub retry_on: Option<Vec<ErrorCode>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchConfig {
    pub concurrent_requests: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub json: Option<bool>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_version: default_api_version(),
            timeout_ms: None,
            client_type: None,
            headers: None,
        }
    }
}

impl ClientConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ClientError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ClientError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${MAHI_API_URL})，未設定的變數保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ClientError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_url("api.base_url", &self.api.base_url)?;
        validation::validate_non_empty_string("api.api_version", &self.api.api_version)?;

        if let Some(timeout) = self.api.timeout_ms {
            validation::validate_range("api.timeout_ms", timeout, 1, 300_000)?;
        }

        if let Some(attempts) = self.retry.max_attempts {
            validation::validate_positive_number("retry.max_attempts", attempts as usize, 1)?;
        }

        if let Some(timeout) = self.retry.attempt_timeout_ms {
            validation::validate_range("retry.attempt_timeout_ms", timeout, 1, 300_000)?;
        }

        if let Some(codes) = &self.retry.retry_on {
            validate_retry_codes(codes)?;
        }

        if let Some(concurrent) = self.batch.concurrent_requests {
            validation::validate_positive_number("batch.concurrent_requests", concurrent, 1)?;
        }

        if let Some(level) = self.logging.as_ref().and_then(|l| l.level.as_deref()) {
            if !LOG_LEVELS.contains(&level) {
                return Err(ClientError::InvalidConfigValueError {
                    field: "logging.level".to_string(),
                    value: level.to_string(),
                    reason: format!("Valid levels: {}", LOG_LEVELS.join(", ")),
                });
            }
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.api.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS))
    }

    pub fn client_type(&self) -> &str {
        self.api.client_type.as_deref().unwrap_or(DEFAULT_CLIENT_TYPE)
    }

    pub fn concurrent_requests(&self) -> usize {
        self.batch
            .concurrent_requests
            .unwrap_or(DEFAULT_CONCURRENT_REQUESTS)
    }

    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        let defaults = RetryPolicy::default();
        let policy = RetryPolicy::new(
            self.retry.max_attempts.unwrap_or(defaults.max_attempts()),
            self.retry
                .base_delay_ms
                .unwrap_or(defaults.base_delay().as_millis() as u64),
        )?;

        Ok(match &self.retry.retry_on {
            Some(codes) => {
                validate_retry_codes(codes)?;
                policy.with_retry_on(RetryOn::codes(codes.iter().copied()))
            }
            None => policy,
        })
    }

    /// 每次嘗試的逾時預設與單一請求逾時相同
    pub fn retry_executor(&self) -> Result<RetryExecutor> {
        let attempt_timeout = self
            .retry
            .attempt_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.timeout());
        Ok(RetryExecutor::new(self.retry_policy()?).with_attempt_timeout(attempt_timeout))
    }

    pub fn json_logs(&self) -> bool {
        self.logging.as_ref().and_then(|l| l.json).unwrap_or(false)
    }
}

impl Validate for ClientConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

/// 設定檔中無法辨識的代碼會被讀成 `UNKNOWN`，在此拒絕
fn validate_retry_codes(codes: &[ErrorCode]) -> Result<()> {
    if codes.contains(&ErrorCode::Unknown) {
        let known: Vec<&str> = RETRYABLE_CODES.iter().map(|c| c.as_str()).collect();
        return Err(ClientError::InvalidConfigValueError {
            field: "retry.retry_on".to_string(),
            value: format!("{:?}", codes.iter().map(|c| c.as_str()).collect::<Vec<_>>()),
            reason: format!("Unrecognized error code. Valid codes: {}", known.join(", ")),
        });
    }
    Ok(())
}

const RETRYABLE_CODES: [ErrorCode; 7] = [
    ErrorCode::Timeout,
    ErrorCode::NetworkError,
    ErrorCode::Unauthorized,
    ErrorCode::Forbidden,
    ErrorCode::NotFound,
    ErrorCode::RateLimited,
    ErrorCode::ServerError,
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ClientConfig::from_toml_str("").unwrap();

        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.api.api_version, "v1");
        assert_eq!(config.timeout(), Duration::from_millis(10_000));
        assert_eq!(config.client_type(), "web");
        assert_eq!(config.concurrent_requests(), 5);

        let policy = config.retry_policy().unwrap();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.base_delay(), Duration::from_millis(1000));
        assert_eq!(policy.retry_on(), &RetryOn::All);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[api]
base_url = "https://staging.mahillm.com"
api_version = "v2"
timeout_ms = 2500
client_type = "cli"

[api.headers]
X-Trace = "on"

[retry]
max_attempts = 5
base_delay_ms = 200
retry_on = ["TIMEOUT", "NETWORK_ERROR"]

[batch]
concurrent_requests = 2

[logging]
level = "debug"
json = true
"#;

        let config = ClientConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.api.base_url, "https://staging.mahillm.com");
        assert_eq!(config.client_type(), "cli");
        assert_eq!(config.concurrent_requests(), 2);
        assert!(config.json_logs());

        let policy = config.retry_policy().unwrap();
        assert_eq!(policy.max_attempts(), 5);
        assert!(policy.retry_on().allows(ErrorCode::Timeout));
        assert!(!policy.retry_on().allows(ErrorCode::NotFound));

        let executor = config.retry_executor().unwrap();
        assert_eq!(
            executor.attempt_timeout(),
            Some(Duration::from_millis(2500))
        );
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("MAHI_TEST_BASE_URL", "https://test.mahillm.com");

        let config = ClientConfig::from_toml_str(
            r#"
[api]
base_url = "${MAHI_TEST_BASE_URL}"
"#,
        )
        .unwrap();
        assert_eq!(config.api.base_url, "https://test.mahillm.com");

        std::env::remove_var("MAHI_TEST_BASE_URL");
    }

    #[test]
    fn test_config_validation() {
        let invalid_url = ClientConfig::from_toml_str(
            r#"
[api]
base_url = "not-a-url"
"#,
        )
        .unwrap();
        assert!(invalid_url.validate().is_err());

        let zero_attempts = ClientConfig::from_toml_str(
            r#"
[retry]
max_attempts = 0
"#,
        )
        .unwrap();
        assert!(zero_attempts.validate().is_err());
        assert!(zero_attempts.retry_policy().is_err());

        let bad_level = ClientConfig::from_toml_str(
            r#"
[logging]
level = "loud"
"#,
        )
        .unwrap();
        assert!(bad_level.validate().is_err());
    }

    #[test]
    fn test_misspelled_retry_code_is_rejected() {
        let config = ClientConfig::from_toml_str(
            r#"
[retry]
retry_on = ["TIMEOUTS", "NETWORK_ERR"]
"#,
        )
        .unwrap();

        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ClientError::InvalidConfigValueError { ref field, .. } if field == "retry.retry_on"
        ));
        assert!(config.retry_policy().is_err());
        assert!(config.retry_executor().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[batch]\nconcurrent_requests = 8\n")
            .unwrap();

        let config = ClientConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.concurrent_requests(), 8);
    }

    #[test]
    fn test_invalid_toml_reports_parsing_error() {
        let err = ClientConfig::from_toml_str("[api\nbase_url = 1").unwrap_err();
        assert!(matches!(err, ClientError::ConfigValidationError { .. }));
    }
}
