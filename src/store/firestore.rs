// 该文件是 Xunshi （巡视） 项目的一部分。
// src/store/firestore.rs - Firestore REST 客户端
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

use std::sync::Arc;

use reqwest::{
  StatusCode,
  blocking::{Client, RequestBuilder, Response},
};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::debug;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  auth::{NoAuth, TokenProvider},
  directory_url,
  report::{CONCLUSION_COLLECTION, Conclusion, REPORT_COLLECTION, Report},
  store::{CollectionLister, DocumentStore, StoreError, value},
};

pub const DEFAULT_FIRESTORE_ENDPOINT: &str = "https://firestore.googleapis.com/v1/";
const DEFAULT_DATABASE: &str = "(default)";
const LIST_PAGE_SIZE: &str = "300";
/// 监听只需要的字段，减少每次轮询传输的数据量
const REPORT_FIELD_MASK: [&str; 2] = ["imageUrl", "gpsInfo"];

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
  pub name: String,
  #[serde(default)]
  pub fields: Map<String, Value>,
  #[serde(default)]
  pub update_time: Option<String>,
}

impl Document {
  /// 文档编号，即资源名的最后一段
  pub fn id(&self) -> &str {
    self.name.rsplit('/').next().unwrap_or_default()
  }

  pub fn string_field(&self, key: &str) -> Option<&str> {
    self.fields.get(key).and_then(value::as_string)
  }
}

impl From<&Document> for Report {
  fn from(doc: &Document) -> Self {
    Report {
      id: doc.id().to_string(),
      image_url: doc.string_field("imageUrl").map(str::to_string),
      gps_info: doc
        .string_field("gpsInfo")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string),
    }
  }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
  #[serde(default)]
  documents: Vec<Document>,
  next_page_token: Option<String>,
}

/// `firestore://<project>[/<database>]`
#[derive(Clone)]
pub struct FirestoreClient {
  endpoint: Url,
  project: String,
  database: String,
  credentials: Arc<dyn TokenProvider>,
  client: Client,
}

impl FromUrlWithScheme for FirestoreClient {
  const SCHEME: &'static str = "firestore";
}

impl FromUrl for FirestoreClient {
  type Error = StoreError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(StoreError::SchemeMismatch(format!(
        "期望数据库方案 '{}', 实际方案 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let project = url
      .host_str()
      .filter(|host| !host.is_empty())
      .ok_or_else(|| StoreError::InvalidEndpoint(format!("缺少项目编号: {}", url)))?;
    let database = url.path().trim_matches('/');
    let database = if database.is_empty() {
      DEFAULT_DATABASE
    } else {
      database
    };

    let endpoint = Url::parse(DEFAULT_FIRESTORE_ENDPOINT)
      .map_err(|e| StoreError::InvalidEndpoint(e.to_string()))?;

    Ok(Self {
      endpoint,
      project: project.to_string(),
      database: database.to_string(),
      credentials: Arc::new(NoAuth),
      client: Client::new(),
    })
  }
}

impl FirestoreClient {
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

  fn collection_url(&self, collection: &str) -> Result<Url, StoreError> {
    let path = format!(
      "projects/{}/databases/{}/documents/{}",
      self.project,
      self.database,
      urlencoding::encode(collection)
    );
    self
      .endpoint
      .join(&path)
      .map_err(|e| StoreError::InvalidEndpoint(e.to_string()))
  }

  fn document_url(&self, collection: &str, id: &str) -> Result<Url, StoreError> {
    let mut url = self.collection_url(collection)?;
    url
      .path_segments_mut()
      .map_err(|_| StoreError::InvalidEndpoint(self.endpoint.to_string()))?
      .push(id);
    Ok(url)
  }

  fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, StoreError> {
    Ok(match self.credentials.access_token()? {
      Some(token) => request.bearer_auth(token),
      None => request,
    })
  }

  fn check(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
      Ok(response)
    } else {
      Err(StoreError::Rejected {
        status: status.as_u16(),
        body: response.text().unwrap_or_default(),
      })
    }
  }

  pub fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
    let url = self.document_url(collection, id)?;
    let response = self.authorized(self.client.get(url))?.send()?;
    if response.status() == StatusCode::NOT_FOUND {
      debug!("文档不存在: {}/{}", collection, id);
      return Ok(None);
    }
    let document = Self::check(response)?.json::<Document>()?;
    Ok(Some(document))
  }

  /// 分页读取整个集合；`field_mask` 非空时只返回这些字段
  pub fn list_documents(
    &self,
    collection: &str,
    field_mask: &[&str],
  ) -> Result<Vec<Document>, StoreError> {
    let mut documents = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
      let mut url = self.collection_url(collection)?;
      {
        let mut query = url.query_pairs_mut();
        query.append_pair("pageSize", LIST_PAGE_SIZE);
        for field in field_mask {
          query.append_pair("mask.fieldPaths", field);
        }
        if let Some(token) = &page_token {
          query.append_pair("pageToken", token);
        }
      }

      let response = self.authorized(self.client.get(url))?.send()?;
      let page = Self::check(response)?.json::<ListDocumentsResponse>()?;
      documents.extend(page.documents);

      match page.next_page_token.filter(|token| !token.is_empty()) {
        Some(token) => page_token = Some(token),
        None => break,
      }
    }

    Ok(documents)
  }

  /// 整体写入文档字段，等同于覆盖式 set
  pub fn set_document(
    &self,
    collection: &str,
    id: &str,
    fields: Map<String, Value>,
  ) -> Result<(), StoreError> {
    let url = self.document_url(collection, id)?;
    let body = json!({ "fields": fields });
    let response = self
      .authorized(self.client.patch(url))?
      .json(&body)
      .send()?;
    Self::check(response)?;
    Ok(())
  }
}

impl DocumentStore for FirestoreClient {
  fn get_report(&self, id: &str) -> Result<Option<Report>, StoreError> {
    let document = self.get_document(REPORT_COLLECTION, id)?;
    Ok(document.as_ref().map(Report::from))
  }

  fn put_conclusion(&self, id: &str, conclusion: &Conclusion) -> Result<(), StoreError> {
    self.set_document(CONCLUSION_COLLECTION, id, value::conclusion_fields(conclusion))
  }
}

impl CollectionLister for FirestoreClient {
  fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
    self.list_documents(collection, &REPORT_FIELD_MASK)
  }
}
