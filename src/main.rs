use clap::Parser;
use mahi_client::utils::error::ErrorSeverity;
use mahi_client::utils::{logger, validation::Validate};
use mahi_client::{
    ApiResult, AuthSession, BackendClient, BatchRequest, BatchSummary, Chatbot, CliConfig,
    ClientConfig, ClientError, Command, RequestOptions, StaticToken, TokenProvider,
};
use std::sync::Arc;

fn exit_code(error: &ClientError) -> i32 {
    match error.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}

fn fail(error: ClientError) -> ! {
    tracing::error!(
        "❌ {} (Category: {:?}, Severity: {:?})",
        error,
        error.category(),
        error.severity()
    );
    eprintln!("❌ {}", error.user_friendly_message());
    eprintln!("💡 Suggestion: {}", error.recovery_suggestion());
    std::process::exit(exit_code(&error));
}

fn build_client(cli: &CliConfig, config: &ClientConfig) -> Result<BackendClient, ClientError> {
    // 沒有 token 時使用空的 session，請求會回傳 UNAUTHORIZED
    let tokens: Arc<dyn TokenProvider> = match &cli.token {
        Some(token) => Arc::new(StaticToken(token.clone())),
        None => {
            tracing::warn!("🔒 No identity token given; requests will be unauthenticated");
            Arc::new(AuthSession::new())
        }
    };
    BackendClient::from_config(config, tokens)
}

fn print_result(result: &ApiResult<serde_json::Value>) -> anyhow::Result<()> {
    if let Some(code) = result.code() {
        eprintln!("❌ {}", code.user_message());
    }
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 驗證參數並載入配置
    let config = match cli.validate().and_then(|_| cli.load_client_config()) {
        Ok(config) => config,
        Err(e) => {
            // 配置無效時以預設等級記錄錯誤
            logger::init_cli_logger(cli.verbose, None);
            fail(e)
        }
    };

    // 初始化日誌
    let level = config.logging.as_ref().and_then(|l| l.level.as_deref());
    if cli.json_logs || config.json_logs() {
        logger::init_json_logger(cli.verbose, level);
    } else {
        logger::init_cli_logger(cli.verbose, level);
    }

    tracing::info!("🚀 Starting mahi-client");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    match &cli.command {
        Command::Chat { message } => {
            let bot = Chatbot::default();
            println!("{}", bot.respond(&message.join(" ")));
        }
        Command::Request {
            endpoint,
            method,
            body,
            no_retry,
        } => {
            let client = build_client(&cli, &config).unwrap_or_else(|e| fail(e));

            let mut options = RequestOptions::with_method(*method);
            if let Some(body) = body {
                match serde_json::from_str(body) {
                    Ok(json) => options = options.with_body(json),
                    Err(e) => fail(ClientError::ValidationError {
                        message: format!("--body is not valid JSON: {}", e),
                    }),
                }
            }

            let result = if *no_retry {
                client.make_request(endpoint, options).await
            } else {
                client.request_with_retry(endpoint, options).await
            };

            print_result(&result)?;
            if !result.is_success() {
                std::process::exit(2);
            }
        }
        Command::Batch { endpoints, retry } => {
            let client = build_client(&cli, &config).unwrap_or_else(|e| fail(e));
            let requests: Vec<BatchRequest> =
                endpoints.iter().map(|e| BatchRequest::get(e.as_str())).collect();

            tracing::info!("📦 Sending {} requests", requests.len());
            let outcomes = if *retry {
                client.batch_request_with_retry(requests).await
            } else {
                client.batch_request(requests).await
            };

            let summary = BatchSummary::from_results(outcomes.iter().map(|o| &o.result));
            println!("{}", serde_json::to_string_pretty(&outcomes)?);
            tracing::info!(
                "✅ {} succeeded, ❌ {} failed",
                summary.succeeded,
                summary.failed
            );

            if !summary.all_succeeded() {
                std::process::exit(2);
            }
        }
    }

    Ok(())
}
