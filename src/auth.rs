// 该文件是 Xunshi （巡视） 项目的一部分。
// src/auth.rs - Google 访问令牌
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::{
  path::Path,
  sync::{Mutex, PoisonError},
  time::{Duration, Instant},
};

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_METADATA_TOKEN_URL: &str =
  "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Error, Debug)]
pub enum AuthError {
  #[error("凭据文件读取错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("凭据格式错误: {0}")]
  InvalidCredentials(#[from] serde_json::Error),
  #[error("令牌签名错误: {0}")]
  SignError(#[from] jsonwebtoken::errors::Error),
  #[error("HTTP 请求错误: {0}")]
  HttpError(#[from] reqwest::Error),
  #[error("令牌服务返回 {status}: {body}")]
  Rejected { status: u16, body: String },
}

/// 为每个请求提供访问令牌
#[cfg_attr(test, mockall::automock)]
pub trait TokenProvider: Send + Sync {
  /// `None` 表示请求不带鉴权头
  fn access_token(&self) -> Result<Option<String>, AuthError>;
}

/// 本地模拟器不需要鉴权
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

impl TokenProvider for NoAuth {
  fn access_token(&self) -> Result<Option<String>, AuthError> {
    Ok(None)
  }
}

/// 手工传入的令牌，过期后不会刷新
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

impl TokenProvider for StaticToken {
  fn access_token(&self) -> Result<Option<String>, AuthError> {
    Ok(Some(self.0.clone()))
  }
}

/// 服务账号密钥文件中用到的字段
#[derive(Deserialize, Debug, Clone)]
pub struct ServiceAccountKey {
  pub client_email: String,
  pub private_key: String,
  pub token_uri: String,
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
  iss: &'a str,
  scope: &'a str,
  aud: &'a str,
  iat: i64,
  exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
  access_token: String,
  expires_in: u64,
}

enum Grant {
  ServiceAccount {
    key: ServiceAccountKey,
    signing_key: EncodingKey,
  },
  Metadata(Url),
}

struct CachedToken {
  token: String,
  refresh_at: Instant,
}

/// 自动刷新的 Google OAuth 令牌，过期前一分钟重新获取
pub struct GoogleCredentials {
  grant: Grant,
  client: Client,
  cached: Mutex<Option<CachedToken>>,
}

impl GoogleCredentials {
  pub fn from_service_account_file(path: impl AsRef<Path>) -> Result<Self, AuthError> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let key: ServiceAccountKey = serde_json::from_str(&content)?;
    Self::from_service_account(key)
  }

  pub fn from_service_account(key: ServiceAccountKey) -> Result<Self, AuthError> {
    let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
    info!("使用服务账号凭据: {}", key.client_email);
    Ok(Self::with_grant(Grant::ServiceAccount { key, signing_key }))
  }

  /// 运行在 GCE / Cloud Run 上时从元数据服务获取令牌
  pub fn metadata_server(token_url: Url) -> Self {
    info!("使用元数据服务凭据: {}", token_url);
    Self::with_grant(Grant::Metadata(token_url))
  }

  fn with_grant(grant: Grant) -> Self {
    Self {
      grant,
      client: Client::new(),
      cached: Mutex::new(None),
    }
  }

  pub fn client(mut self, client: Client) -> Self {
    self.client = client;
    self
  }

  fn request_token(&self) -> Result<TokenResponse, AuthError> {
    let request = match &self.grant {
      Grant::ServiceAccount { key, signing_key } => {
        let assertion = sign_assertion(key, signing_key, Utc::now().timestamp())?;
        self.client.post(&key.token_uri).form(&[
          ("grant_type", JWT_BEARER_GRANT),
          ("assertion", assertion.as_str()),
        ])
      }
      Grant::Metadata(url) => self
        .client
        .get(url.clone())
        .header("Metadata-Flavor", "Google"),
    };

    let response = request.send()?;
    let status = response.status();
    if !status.is_success() {
      return Err(AuthError::Rejected {
        status: status.as_u16(),
        body: response.text().unwrap_or_default(),
      });
    }
    Ok(response.json::<TokenResponse>()?)
  }
}

fn sign_assertion(
  key: &ServiceAccountKey,
  signing_key: &EncodingKey,
  now: i64,
) -> Result<String, AuthError> {
  let claims = AssertionClaims {
    iss: &key.client_email,
    scope: CLOUD_PLATFORM_SCOPE,
    aud: &key.token_uri,
    iat: now,
    exp: now + ASSERTION_LIFETIME_SECS,
  };
  Ok(jsonwebtoken::encode(
    &Header::new(Algorithm::RS256),
    &claims,
    signing_key,
  )?)
}

impl TokenProvider for GoogleCredentials {
  fn access_token(&self) -> Result<Option<String>, AuthError> {
    let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(token) = cached.as_ref()
      && Instant::now() < token.refresh_at
    {
      return Ok(Some(token.token.clone()));
    }

    debug!("刷新访问令牌");
    let response = self.request_token()?;
    let lifetime = Duration::from_secs(response.expires_in).saturating_sub(REFRESH_MARGIN);
    *cached = Some(CachedToken {
      token: response.access_token.clone(),
      refresh_at: Instant::now() + lifetime,
    });
    Ok(Some(response.access_token))
  }
}
