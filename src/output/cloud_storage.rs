// 该文件是 Xunshi （巡视） 项目的一部分。
// src/output/cloud_storage.rs - 对象存储上传
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

use std::{path::Path, sync::Arc};

use reqwest::{blocking::Client, header::CONTENT_TYPE};
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  auth::{NoAuth, TokenProvider},
  directory_url,
  output::{BlobStore, UploadError},
};

pub const DEFAULT_STORAGE_ENDPOINT: &str = "https://storage.googleapis.com/";

/// Cloud Storage 存储桶，`gs://<bucket>`
#[derive(Clone)]
pub struct CloudStorageBucket {
  bucket: String,
  endpoint: Url,
  credentials: Arc<dyn TokenProvider>,
  client: Client,
}

impl FromUrlWithScheme for CloudStorageBucket {
  const SCHEME: &'static str = "gs";
}

impl FromUrl for CloudStorageBucket {
  type Error = UploadError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(UploadError::SchemeMismatch(format!(
        "期望存储方案 '{}', 实际方案 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }
    let bucket = url
      .host_str()
      .filter(|host| !host.is_empty())
      .ok_or_else(|| UploadError::InvalidEndpoint(format!("缺少存储桶名称: {}", url)))?;

    let endpoint = Url::parse(DEFAULT_STORAGE_ENDPOINT)
      .map_err(|e| UploadError::InvalidEndpoint(e.to_string()))?;

    Ok(Self {
      bucket: bucket.to_string(),
      endpoint,
      credentials: Arc::new(NoAuth),
      client: Client::new(),
    })
  }
}

impl CloudStorageBucket {
  pub fn endpoint(mut self, endpoint: Url) -> Self {
    self.endpoint = directory_url(endpoint);
    self
  }

  pub fn credentials(mut self, credentials: Arc<dyn TokenProvider>) -> Self {
    self.credentials = credentials;
    self
  }

  pub fn client(mut self, client: Client) -> Self {
    self.client = client;
    self
  }

  fn upload_url(&self, object_name: &str) -> Result<Url, UploadError> {
    let mut url = self
      .endpoint
      .join(&format!("upload/storage/v1/b/{}/o", self.bucket))
      .map_err(|e| UploadError::InvalidEndpoint(e.to_string()))?;
    url
      .query_pairs_mut()
      .append_pair("uploadType", "media")
      .append_pair("name", object_name);
    Ok(url)
  }

  /// 对象公开地址，保留路径分隔符
  pub fn public_url(&self, object_name: &str) -> String {
    public_url(self.endpoint.as_str(), &self.bucket, object_name)
  }
}

fn public_url(endpoint: &str, bucket: &str, object_name: &str) -> String {
  let encoded: Vec<String> = object_name
    .split('/')
    .map(|segment| urlencoding::encode(segment).into_owned())
    .collect();
  format!(
    "{}/{}/{}",
    endpoint.trim_end_matches('/'),
    bucket,
    encoded.join("/")
  )
}

impl BlobStore for CloudStorageBucket {
  fn upload_file(
    &self,
    path: &Path,
    object_name: &str,
    content_type: &str,
  ) -> Result<String, UploadError> {
    let bytes = std::fs::read(path)?;
    let mut request = self
      .client
      .post(self.upload_url(object_name)?)
      .header(CONTENT_TYPE, content_type)
      .body(bytes);
    if let Some(token) = self.credentials.access_token()? {
      request = request.bearer_auth(token);
    }

    let response = request.send()?;
    let status = response.status();
    if !status.is_success() {
      let body = response.text().unwrap_or_default();
      return Err(UploadError::Rejected {
        status: status.as_u16(),
        body,
      });
    }

    let url = self.public_url(object_name);
    info!("上传分析图像: {}", url);
    Ok(url)
  }
}
