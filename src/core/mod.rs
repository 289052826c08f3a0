pub mod batch;
pub mod chatbot;
pub mod retry;
pub mod session;

pub use crate::domain::model::{ApiResult, ErrorCode};
pub use crate::domain::ports::{AuthStateListener, TokenProvider};
pub use crate::utils::error::Result;
