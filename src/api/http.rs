use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    api::RewardApi,
    config::Settings,
    models::{
        LoginGrant, LoginRequest, Profile, QuizQuestion, QuizResult, Result, RewardBotError,
        Session, TaskDescriptor,
    },
};

/// `reqwest`-backed client for the rewards service.
pub struct HttpRewardApi {
    http_client: reqwest::Client,
    base_url: String,
}

/// A single API call, built fresh for each request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    method: Method,
    path: &'static str,
    bearer: Option<String>,
    fingerprint: Option<String>,
    body: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    data: Option<T>,
}

#[derive(Deserialize)]
struct TaskListData {
    list: Vec<TaskDescriptor>,
}

#[derive(Deserialize)]
struct QuestionData {
    question: QuizQuestion,
}

impl ApiRequest {
    pub fn get(path: &'static str) -> Self {
        Self {
            method: Method::GET,
            path,
            bearer: None,
            fingerprint: None,
            body: None,
        }
    }

    pub fn post<B: Serialize>(path: &'static str, body: &B) -> Result<Self> {
        Ok(Self {
            method: Method::POST,
            path,
            bearer: None,
            fingerprint: None,
            body: Some(serde_json::to_value(body)?),
        })
    }

    /// Attach bearer token and fingerprint.
    pub fn authenticated(self, session: &Session) -> Self {
        Self {
            bearer: Some(session.token.clone()),
            fingerprint: Some(session.fingerprint.clone()),
            ..self
        }
    }

    pub fn url(&self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');
        match &self.fingerprint {
            Some(fp) => format!("{}{}?m={}", base, self.path, urlencoding::encode(fp)),
            None => format!("{}{}", base, self.path),
        }
    }

    fn into_builder(self, client: &reqwest::Client, base_url: &str) -> reqwest::RequestBuilder {
        let mut builder = client.request(self.method.clone(), self.url(base_url));
        if let Some(token) = &self.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &self.body {
            builder = builder.json(body);
        }
        builder
    }
}

impl HttpRewardApi {
    pub fn new(settings: &Settings) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .default_headers(default_headers(settings)?)
            .timeout(settings.request_timeout())
            .build()
            .map_err(|e| RewardBotError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: settings.api.base_url.clone(),
        })
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        request: ApiRequest,
    ) -> Result<Option<T>> {
        debug!("{} {}", request.method, endpoint);

        let response = request
            .into_builder(&self.http_client, &self.base_url)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        decode_envelope(endpoint, status, &body)
    }
}

fn default_headers(settings: &Settings) -> Result<HeaderMap> {
    let api = &settings.api;
    let mut headers = HeaderMap::new();

    let pairs = [
        (header::ACCEPT, "application/json, text/plain, */*"),
        (header::ACCEPT_LANGUAGE, api.accept_language.as_str()),
        (header::CONTENT_TYPE, "application/json"),
        (header::ORIGIN, api.origin.as_str()),
        (header::REFERER, api.referer.as_str()),
        (header::USER_AGENT, api.user_agent.as_str()),
    ];

    for (name, value) in pairs {
        let value = HeaderValue::from_str(value).map_err(|e| {
            RewardBotError::ConfigError(format!("Invalid value for header {}: {}", name, e))
        })?;
        headers.insert(name, value);
    }

    Ok(headers)
}

/// Unwrap the `{code, msg, data}` envelope; a non-2xx status or non-zero code is an error.
fn decode_envelope<T: DeserializeOwned>(
    endpoint: &str,
    status: StatusCode,
    body: &str,
) -> Result<Option<T>> {
    if !status.is_success() {
        let message = serde_json::from_str::<Envelope<IgnoredAny>>(body)
            .ok()
            .and_then(|e| e.msg)
            .unwrap_or_else(|| format!("HTTP {}", status));

        return Err(RewardBotError::ApiError {
            endpoint: endpoint.to_string(),
            code: i64::from(status.as_u16()),
            message,
        });
    }

    let envelope: Envelope<T> = serde_json::from_str(body)?;
    if envelope.code != 0 {
        return Err(RewardBotError::ApiError {
            endpoint: endpoint.to_string(),
            code: envelope.code,
            message: envelope.msg.unwrap_or_else(|| "unknown error".to_string()),
        });
    }

    Ok(envelope.data)
}

fn require_data<T>(endpoint: &str, data: Option<T>) -> Result<T> {
    data.ok_or_else(|| RewardBotError::ApiError {
        endpoint: endpoint.to_string(),
        code: 0,
        message: "response carried no data".to_string(),
    })
}

#[async_trait]
impl RewardApi for HttpRewardApi {
    async fn login(&self, request: &LoginRequest) -> Result<LoginGrant> {
        let call = ApiRequest::post("/user/login", request)?;
        let data = self.execute("login", call).await?;
        require_data("login", data)
    }

    async fn get_profile(&self, session: &Session) -> Result<Profile> {
        let call = ApiRequest::get("/user/profile").authenticated(session);
        let data = self.execute("profile", call).await?;
        require_data("profile", data)
    }

    async fn list_tasks(&self, session: &Session) -> Result<Vec<TaskDescriptor>> {
        let call = ApiRequest::get("/task/list").authenticated(session);
        let data: Option<TaskListData> = self.execute("task list", call).await?;
        Ok(require_data("task list", data)?.list)
    }

    async fn check_task(&self, session: &Session, task_type: &str) -> Result<()> {
        let call = ApiRequest::post("/task/check", &serde_json::json!({ "type": task_type }))?
            .authenticated(session);
        let _: Option<IgnoredAny> = self.execute("task check", call).await?;
        Ok(())
    }

    async fn get_question(&self, session: &Session) -> Result<QuizQuestion> {
        let call = ApiRequest::get("/user/getQuestion").authenticated(session);
        let data: Option<QuestionData> = self.execute("question", call).await?;
        Ok(require_data("question", data)?.question)
    }

    async fn submit_answer(&self, session: &Session, choice: usize) -> Result<QuizResult> {
        let call = ApiRequest::post("/user/answer", &serde_json::json!({ "answer": choice }))?
            .authenticated(session);
        let data = self.execute("answer", call).await?;
        require_data("answer", data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session {
            token: "tok".to_string(),
            fingerprint: "abc123".to_string(),
        }
    }

    #[test]
    fn test_request_url_carries_fingerprint() {
        let request = ApiRequest::get("/user/profile").authenticated(&session());
        assert_eq!(
            request.url("https://api.example.com/mainnet/"),
            "https://api.example.com/mainnet/user/profile?m=abc123"
        );

        let anonymous = ApiRequest::get("/user/login");
        assert_eq!(anonymous.url("https://api.example.com"), "https://api.example.com/user/login");
    }

    #[test]
    fn test_authenticated_does_not_touch_original_request() {
        let base = ApiRequest::get("/task/list");
        let authed = base.clone().authenticated(&session());
        assert_eq!(base.bearer, None);
        assert_eq!(authed.bearer.as_deref(), Some("tok"));
    }

    #[test]
    fn test_decode_envelope_success() {
        let body = r#"{"code":0,"msg":"ok","data":{"question":{"question":"2+2?","options":["4","5"]}}}"#;
        let data: Option<QuestionData> = decode_envelope("question", StatusCode::OK, body).unwrap();
        let question = data.unwrap().question;
        assert_eq!(question.text, "2+2?");
        assert_eq!(question.options.len(), 2);
    }

    #[test]
    fn test_decode_envelope_application_error() {
        let body = r#"{"code":1003,"msg":"task not finished","data":null}"#;
        let result: Result<Option<IgnoredAny>> = decode_envelope("task check", StatusCode::OK, body);
        match result {
            Err(RewardBotError::ApiError { code, message, .. }) => {
                assert_eq!(code, 1003);
                assert_eq!(message, "task not finished");
            }
            _ => panic!("Expected Api error"),
        }
    }

    #[test]
    fn test_decode_envelope_transport_error() {
        let result: Result<Option<IgnoredAny>> =
            decode_envelope("profile", StatusCode::UNAUTHORIZED, "<html>nope</html>");
        match result {
            Err(RewardBotError::ApiError { code, .. }) => assert_eq!(code, 401),
            _ => panic!("Expected Api error"),
        }
    }

    #[test]
    fn test_http_client_builds_from_default_settings() {
        assert!(HttpRewardApi::new(&Settings::default()).is_ok());
    }
}
