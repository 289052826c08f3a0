pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{CliConfig, Command};

pub use adapters::BackendClient;
pub use config::toml_config::ClientConfig;
pub use crate::core::batch::{settle_all, settle_all_bounded, BatchEntry, BatchSummary};
pub use crate::core::chatbot::{Chatbot, ResponseRule};
pub use crate::core::retry::{AttemptState, RetryExecutor, RetryOn, RetryPolicy, RetryReport};
pub use crate::core::session::{AuthSession, AuthStateNotifier, SessionContext};
pub use domain::model::{
    ApiResult, AuthStateEvent, AuthUser, BatchOutcome, BatchRequest, ErrorCode, HttpMethod,
    RequestOptions,
};
pub use domain::ports::{StaticToken, TokenProvider};
pub use utils::error::{ClientError, Result};
