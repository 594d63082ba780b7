//! HTTP 전송 계층.
//!
//! 거래소 하나당 하나의 `HttpTransport`를 사용합니다. 호출마다 인증 방식을
//! 지정하며, 응답은 상태 코드와 원문 본문 그대로 반환합니다.
//! 어떤 상태 코드를 성공으로 볼지는 어댑터가 결정합니다.
//!
//! 요청/응답 본문은 로그에 남기지 않습니다 (토큰이 포함될 수 있음).

use crate::error::ExchangeError;
use crate::traits::ExchangeResult;
use chrono::Utc;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// 요청 인증 방식.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: <api key>`
    ApiKeyHeader,
    /// `Authorization: Bearer <access token>` + `X-Timestamp`
    BearerAccessToken,
    /// `Authorization: Token <token>`
    TokenPrefixAccessToken,
}

/// 요청 한 건의 인증 정보.
#[derive(Clone, Copy)]
pub struct Authorization<'a> {
    pub scheme: AuthScheme,
    pub token: &'a SecretString,
}

impl<'a> Authorization<'a> {
    pub fn new(scheme: AuthScheme, token: &'a SecretString) -> Self {
        Self { scheme, token }
    }

    pub fn bearer(token: &'a SecretString) -> Self {
        Self::new(AuthScheme::BearerAccessToken, token)
    }

    pub fn token(token: &'a SecretString) -> Self {
        Self::new(AuthScheme::TokenPrefixAccessToken, token)
    }

    fn header_value(&self) -> ExchangeResult<HeaderValue> {
        let raw = match self.scheme {
            AuthScheme::ApiKeyHeader => self.token.expose_secret().to_string(),
            AuthScheme::BearerAccessToken => format!("Bearer {}", self.token.expose_secret()),
            AuthScheme::TokenPrefixAccessToken => {
                format!("Token {}", self.token.expose_secret())
            }
        };

        let mut value = HeaderValue::from_str(&raw).map_err(|_| {
            ExchangeError::ValidationFailed("credential contains invalid header characters".into())
        })?;
        value.set_sensitive(true);
        Ok(value)
    }
}

/// 거래소 원문 응답.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 본문을 JSON으로 파싱.
    pub fn json<T: DeserializeOwned>(&self) -> ExchangeResult<T> {
        serde_json::from_str(&self.body).map_err(|e| {
            warn!(status = self.status, error = %e, "Failed to parse exchange response");
            ExchangeError::ParseError(e.to_string())
        })
    }
}

/// 재전송 가능한 요청 기술자.
///
/// 토큰 갱신 후 같은 요청을 한 번 더 보낼 때 사용합니다.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiRequest {
    Get(String),
    Post(String, serde_json::Value),
    Delete(String),
}

impl ApiRequest {
    pub fn path(&self) -> &str {
        match self {
            Self::Get(path) | Self::Post(path, _) | Self::Delete(path) => path,
        }
    }
}

/// 거래소 HTTP 클라이언트.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    exchange: String,
    base_url: String,
    client: Client,
}

impl HttpTransport {
    /// 새 전송 계층 생성.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 `ExchangeError::NetworkError`를 반환합니다.
    pub fn new(
        exchange: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> ExchangeResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExchangeError::NetworkError(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self {
            exchange: exchange.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 기본 URL과 경로 결합.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn get(
        &self,
        path: &str,
        auth: Option<Authorization<'_>>,
    ) -> ExchangeResult<RawResponse> {
        let builder = self.client.get(self.url(path));
        self.execute(Method::GET, path, builder, auth).await
    }

    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        auth: Option<Authorization<'_>>,
    ) -> ExchangeResult<RawResponse> {
        let builder = self.client.post(self.url(path)).json(body);
        self.execute(Method::POST, path, builder, auth).await
    }

    pub async fn delete(
        &self,
        path: &str,
        auth: Option<Authorization<'_>>,
    ) -> ExchangeResult<RawResponse> {
        let builder = self.client.delete(self.url(path));
        self.execute(Method::DELETE, path, builder, auth).await
    }

    /// 요청 기술자대로 전송.
    pub async fn send(
        &self,
        request: &ApiRequest,
        auth: Option<Authorization<'_>>,
    ) -> ExchangeResult<RawResponse> {
        match request {
            ApiRequest::Get(path) => self.get(path, auth).await,
            ApiRequest::Post(path, body) => self.post_json(path, body, auth).await,
            ApiRequest::Delete(path) => self.delete(path, auth).await,
        }
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        mut builder: RequestBuilder,
        auth: Option<Authorization<'_>>,
    ) -> ExchangeResult<RawResponse> {
        if let Some(auth) = auth {
            builder = builder.header(AUTHORIZATION, auth.header_value()?);
            if auth.scheme == AuthScheme::BearerAccessToken {
                builder = builder.header("X-Timestamp", Utc::now().timestamp().to_string());
            }
        }

        debug!(exchange = %self.exchange, %method, path, authenticated = auth.is_some(), "Sending request");

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        debug!(exchange = %self.exchange, %method, path, status, "Received response");

        Ok(RawResponse { status, body })
    }
}
