//! Typed wrappers over [`BackendClient::make_request`] for the backend's
//! resources. Each call is a single attempt; wrap it with
//! [`BackendClient::retry`] when retries are wanted.

use crate::adapters::http::{path_segment, BackendClient};
use crate::domain::model::{ApiResult, HttpMethod, RequestOptions};
use chrono::Utc;
use serde_json::{json, Value};
use url::form_urlencoded;

/// Range used by the analytics and usage calls when none is given.
pub const DEFAULT_TIME_RANGE: &str = "30d";

/// Sent as `ipAddress` when the caller does not supply one.
pub const UNKNOWN_IP_ADDRESS: &str = "unknown";

const USER_AGENT: &str = concat!("mahi-client/", env!("CARGO_PKG_VERSION"));

/// 在物件型別的 body 加上欄位；其他型別原樣保留
fn with_field(mut body: Value, key: &str, value: Value) -> Value {
    if let Value::Object(map) = &mut body {
        map.insert(key.to_string(), value);
    }
    body
}

/// 只在欄位不存在時補上
fn with_default_field(mut body: Value, key: &str, value: Value) -> Value {
    if let Value::Object(map) = &mut body {
        map.entry(key.to_string()).or_insert(value);
    }
    body
}

fn now() -> Value {
    Value::String(Utc::now().to_rfc3339())
}

fn encode_query(filters: &[(&str, &str)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(filters)
        .finish()
}

fn range_query(time_range: Option<&str>) -> String {
    encode_query(&[("range", time_range.unwrap_or(DEFAULT_TIME_RANGE))])
}

impl BackendClient {
    // User
    pub async fn get_user_profile(&self) -> ApiResult<Value> {
        self.make_request("/user/profile", RequestOptions::get()).await
    }

    pub async fn update_user_profile(&self, profile: Value) -> ApiResult<Value> {
        self.make_request("/user/profile", RequestOptions::put(profile))
            .await
    }

    pub async fn delete_user_account(&self) -> ApiResult<Value> {
        self.make_request("/user/account", RequestOptions::delete())
            .await
    }

    pub async fn get_user_stats(&self) -> ApiResult<Value> {
        self.make_request("/user/stats", RequestOptions::get()).await
    }

    pub async fn update_user_stats(&self, stats: Value) -> ApiResult<Value> {
        self.make_request("/user/stats", RequestOptions::put(stats))
            .await
    }

    // Sessions
    pub async fn create_session(&self, session: Value) -> ApiResult<Value> {
        let body = with_field(session, "timestamp", now());
        let body = with_field(body, "userAgent", json!(USER_AGENT));
        let body = with_default_field(body, "ipAddress", json!(UNKNOWN_IP_ADDRESS));
        self.make_request("/sessions", RequestOptions::post(body))
            .await
    }

    pub async fn get_active_sessions(&self) -> ApiResult<Value> {
        self.make_request("/sessions/active", RequestOptions::get())
            .await
    }

    pub async fn terminate_session(&self, session_id: &str) -> ApiResult<Value> {
        let endpoint = format!("/sessions/{}", path_segment(session_id));
        self.make_request(&endpoint, RequestOptions::delete()).await
    }

    pub async fn terminate_all_sessions(&self) -> ApiResult<Value> {
        self.make_request("/sessions/terminate-all", RequestOptions::delete())
            .await
    }

    // Reports
    pub async fn create_report(&self, report: Value) -> ApiResult<Value> {
        let body = with_field(report, "createdAt", now());
        self.make_request("/reports", RequestOptions::post(body))
            .await
    }

    pub async fn get_reports(&self, filters: &[(&str, &str)]) -> ApiResult<Value> {
        let endpoint = format!("/reports?{}", encode_query(filters));
        self.make_request(&endpoint, RequestOptions::get()).await
    }

    pub async fn get_report(&self, report_id: &str) -> ApiResult<Value> {
        let endpoint = format!("/reports/{}", path_segment(report_id));
        self.make_request(&endpoint, RequestOptions::get()).await
    }

    pub async fn update_report(&self, report_id: &str, update: Value) -> ApiResult<Value> {
        let endpoint = format!("/reports/{}", path_segment(report_id));
        self.make_request(&endpoint, RequestOptions::put(update)).await
    }

    pub async fn delete_report(&self, report_id: &str) -> ApiResult<Value> {
        let endpoint = format!("/reports/{}", path_segment(report_id));
        self.make_request(&endpoint, RequestOptions::delete()).await
    }

    // Files
    pub async fn process_file(&self, file_id: &str, options: Value) -> ApiResult<Value> {
        self.make_request(
            &format!("/files/{}/process", path_segment(file_id)),
            RequestOptions::post(options),
        )
        .await
    }

    pub async fn get_file_status(&self, file_id: &str) -> ApiResult<Value> {
        let endpoint = format!("/files/{}/status", path_segment(file_id));
        self.make_request(&endpoint, RequestOptions::get()).await
    }

    // Analytics and usage
    pub async fn get_analytics(&self, time_range: Option<&str>) -> ApiResult<Value> {
        let endpoint = format!("/analytics?{}", range_query(time_range));
        self.make_request(&endpoint, RequestOptions::get()).await
    }

    pub async fn get_user_analytics(
        &self,
        user_id: &str,
        time_range: Option<&str>,
    ) -> ApiResult<Value> {
        let endpoint = format!(
            "/analytics/user/{}?{}",
            path_segment(user_id),
            range_query(time_range)
        );
        self.make_request(&endpoint, RequestOptions::get()).await
    }

    pub async fn get_system_metrics(&self) -> ApiResult<Value> {
        self.make_request("/analytics/system", RequestOptions::get())
            .await
    }

    pub async fn track_usage(&self, usage: Value) -> ApiResult<Value> {
        let body = with_field(usage, "timestamp", now());
        self.make_request("/usage/track", RequestOptions::post(body))
            .await
    }

    pub async fn get_usage_stats(&self, time_range: Option<&str>) -> ApiResult<Value> {
        let endpoint = format!("/usage/stats?{}", range_query(time_range));
        self.make_request(&endpoint, RequestOptions::get()).await
    }

    pub async fn check_usage_limits(&self) -> ApiResult<Value> {
        self.make_request("/usage/limits", RequestOptions::get())
            .await
    }

    // Subscription
    pub async fn get_subscription(&self) -> ApiResult<Value> {
        self.make_request("/subscription", RequestOptions::get())
            .await
    }

    pub async fn update_subscription(&self, subscription: Value) -> ApiResult<Value> {
        self.make_request("/subscription", RequestOptions::put(subscription))
            .await
    }

    pub async fn cancel_subscription(&self) -> ApiResult<Value> {
        self.make_request("/subscription/cancel", RequestOptions::post(json!({})))
            .await
    }

    // API keys
    pub async fn generate_api_key(&self, key: Value) -> ApiResult<Value> {
        self.make_request("/api-keys", RequestOptions::post(key))
            .await
    }

    pub async fn get_api_keys(&self) -> ApiResult<Value> {
        self.make_request("/api-keys", RequestOptions::get()).await
    }

    pub async fn revoke_api_key(&self, key_id: &str) -> ApiResult<Value> {
        let endpoint = format!("/api-keys/{}", path_segment(key_id));
        self.make_request(&endpoint, RequestOptions::delete()).await
    }

    pub async fn get_api_key_usage(&self, key_id: &str) -> ApiResult<Value> {
        let endpoint = format!("/api-keys/{}/usage", path_segment(key_id));
        self.make_request(&endpoint, RequestOptions::get()).await
    }

    // Admin, requires the admin role on the backend
    pub async fn get_users(&self, filters: Value) -> ApiResult<Value> {
        self.make_request("/admin/users", RequestOptions::post(filters))
            .await
    }

    pub async fn update_user_role(&self, user_id: &str, role: &str) -> ApiResult<Value> {
        self.make_request(
            &format!("/admin/users/{}/role", path_segment(user_id)),
            RequestOptions::put(json!({ "role": role })),
        )
        .await
    }

    pub async fn suspend_user(&self, user_id: &str, reason: &str) -> ApiResult<Value> {
        self.make_request(
            &format!("/admin/users/{}/suspend", path_segment(user_id)),
            RequestOptions::post(json!({ "reason": reason })),
        )
        .await
    }

    pub async fn get_system_logs(&self, filters: Value) -> ApiResult<Value> {
        self.make_request("/admin/logs", RequestOptions::post(filters))
            .await
    }

    pub async fn get_system_health(&self) -> ApiResult<Value> {
        self.make_request("/admin/health", RequestOptions::get())
            .await
    }

    pub async fn backup_database(&self) -> ApiResult<Value> {
        self.make_request("/admin/backup", RequestOptions::with_method(HttpMethod::Post))
            .await
    }
}
