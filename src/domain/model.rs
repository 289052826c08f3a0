use serde::de::value::UnitDeserializer;
use serde::de::IntoDeserializer;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// 錯誤代碼，序列化為 `TIMEOUT`、`NETWORK_ERROR` 等字串
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Timeout,
    NetworkError,
    Unauthorized,
    Forbidden,
    NotFound,
    RateLimited,
    ServerError,
    #[serde(other)]
    Unknown,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::ServerError => "SERVER_ERROR",
            ErrorCode::Unknown => "UNKNOWN",
        }
    }

    /// HTTP 狀態碼對應的錯誤代碼；未列出的非 2xx 狀態視為網路錯誤
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => ErrorCode::Unauthorized,
            403 => ErrorCode::Forbidden,
            404 => ErrorCode::NotFound,
            429 => ErrorCode::RateLimited,
            500..=599 => ErrorCode::ServerError,
            _ => ErrorCode::NetworkError,
        }
    }

    /// Message suitable for showing to an end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorCode::NetworkError => {
                "Network connection failed. Please check your internet connection."
            }
            ErrorCode::Timeout => "Request timed out. Please try again.",
            ErrorCode::Unauthorized => "Authentication failed. Please sign in again.",
            ErrorCode::Forbidden => "You do not have permission to perform this action.",
            ErrorCode::NotFound => "The requested resource was not found.",
            ErrorCode::RateLimited => "Too many requests. Please wait before trying again.",
            ErrorCode::ServerError => "Server error. Please try again later.",
            ErrorCode::Unknown => "An unexpected error occurred.",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a request. Failures are values, never errors.
///
/// On the wire this is `{"success": true, "data": ...}` or
/// `{"success": false, "error": "...", "code": "..."}`.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResult<T> {
    Success { data: T },
    Failure { error: String, code: ErrorCode },
}

impl<T> ApiResult<T> {
    pub fn success(data: T) -> Self {
        ApiResult::Success { data }
    }

    pub fn failure(error: impl Into<String>, code: ErrorCode) -> Self {
        ApiResult::Failure {
            error: error.into(),
            code,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ApiResult::Success { .. })
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            ApiResult::Success { data } => Some(data),
            ApiResult::Failure { .. } => None,
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            ApiResult::Success { data } => Some(data),
            ApiResult::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ApiResult::Success { .. } => None,
            ApiResult::Failure { error, .. } => Some(error),
        }
    }

    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ApiResult::Success { .. } => None,
            ApiResult::Failure { code, .. } => Some(*code),
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> ApiResult<U> {
        match self {
            ApiResult::Success { data } => ApiResult::Success { data: f(data) },
            ApiResult::Failure { error, code } => ApiResult::Failure { error, code },
        }
    }
}

#[derive(Serialize)]
struct WireResultRef<'a, T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<ErrorCode>,
}

#[derive(Deserialize)]
struct WireResult<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
    code: Option<ErrorCode>,
}

impl<T: Serialize> Serialize for ApiResult<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            ApiResult::Success { data } => WireResultRef {
                success: true,
                data: Some(data),
                error: None,
                code: None,
            },
            ApiResult::Failure { error, code } => WireResultRef {
                success: false,
                data: None,
                error: Some(error),
                code: Some(*code),
            },
        };
        wire.serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for ApiResult<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = WireResult::<T>::deserialize(deserializer)?;
        if wire.success {
            // `data: null` 或缺少 data 時，交由 T 自行解讀 unit
            let data = match wire.data {
                Some(data) => data,
                None => {
                    let unit: UnitDeserializer<D::Error> = ().into_deserializer();
                    T::deserialize(unit)?
                }
            };
            Ok(ApiResult::Success { data })
        } else {
            Ok(ApiResult::Failure {
                error: wire.error.unwrap_or_default(),
                code: wire.code.unwrap_or(ErrorCode::Unknown),
            })
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(format!("Unsupported HTTP method: {}", other)),
        }
    }
}

/// Per-request overrides layered on top of the client defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestOptions {
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post(body: serde_json::Value) -> Self {
        Self::with_method(HttpMethod::Post).with_body(body)
    }

    pub fn put(body: serde_json::Value) -> Self {
        Self::with_method(HttpMethod::Put).with_body(body)
    }

    pub fn delete() -> Self {
        Self::with_method(HttpMethod::Delete)
    }

    pub fn with_method(method: HttpMethod) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub endpoint: String,
    #[serde(default)]
    pub options: RequestOptions,
}

impl BatchRequest {
    pub fn new(endpoint: impl Into<String>, options: RequestOptions) -> Self {
        Self {
            endpoint: endpoint.into(),
            options,
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(endpoint, RequestOptions::get())
    }
}

/// One entry of a batch: the request as issued and its own outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchOutcome {
    pub request: BatchRequest,
    #[serde(flatten)]
    pub result: ApiResult<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl AuthUser {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            display_name: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// Auth-state transitions delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStateEvent {
    SignedIn(AuthUser),
    TokenRefreshed(AuthUser),
    SignedOut { uid: String },
}
