// 该文件是 Xunshi （巡视） 项目的一部分。
// src/output.rs - 输出定义
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

use std::path::Path;

use thiserror::Error;

pub mod draw;

mod cloud_storage;
pub use self::cloud_storage::{CloudStorageBucket, DEFAULT_STORAGE_ENDPOINT};

#[derive(Error, Debug)]
pub enum UploadError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像编码错误: {0}")]
  EncodeError(#[from] image::ImageError),
  #[error("HTTP 请求错误: {0}")]
  HttpError(#[from] reqwest::Error),
  #[error("鉴权失败: {0}")]
  AuthError(#[from] crate::auth::AuthError),
  #[error("存储服务返回 {status}: {body}")]
  Rejected { status: u16, body: String },
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("存储地址无效: {0}")]
  InvalidEndpoint(String),
}

/// 对象存储，上传本地文件并返回公开访问地址
#[cfg_attr(test, mockall::automock)]
pub trait BlobStore: Send + Sync {
  fn upload_file(
    &self,
    path: &Path,
    object_name: &str,
    content_type: &str,
  ) -> Result<String, UploadError>;
}
