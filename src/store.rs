// 该文件是 Xunshi （巡视） 项目的一部分。
// src/store.rs - 文档数据库
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

use thiserror::Error;

use crate::report::{Conclusion, Report};

mod firestore;
mod value;
mod watch;

pub use self::firestore::{DEFAULT_FIRESTORE_ENDPOINT, Document, FirestoreClient};
pub use self::watch::{CollectionLister, CollectionWatcher, diff_snapshot};

#[derive(Error, Debug)]
pub enum StoreError {
  #[error("HTTP 请求错误: {0}")]
  HttpError(#[from] reqwest::Error),
  #[error("鉴权失败: {0}")]
  AuthError(#[from] crate::auth::AuthError),
  #[error("数据库返回 {status}: {body}")]
  Rejected { status: u16, body: String },
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("数据库地址无效: {0}")]
  InvalidEndpoint(String),
}

/// 上报读取与结论写入
#[cfg_attr(test, mockall::automock)]
pub trait DocumentStore: Send + Sync {
  /// 文档不存在时返回 `Ok(None)`
  fn get_report(&self, id: &str) -> Result<Option<Report>, StoreError>;

  /// 以给定编号写入结论，已存在则整体覆盖
  fn put_conclusion(&self, id: &str, conclusion: &Conclusion) -> Result<(), StoreError>;
}
