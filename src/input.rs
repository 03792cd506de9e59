// 该文件是 Xunshi （巡视） 项目的一部分。
// src/input.rs - 上报图像输入
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

mod http_image;
pub use self::http_image::HttpImageFetcher;

#[derive(Error, Debug)]
pub enum FetchError {
  #[error("图像地址为空")]
  EmptyUrl,
  #[error("HTTP 请求错误: {0}")]
  Http(#[from] reqwest::Error),
  #[error("HTTP 状态异常 {status}: {url}")]
  Status { url: String, status: u16 },
}

/// 按地址获取上报图像的原始字节
#[cfg_attr(test, mockall::automock)]
pub trait ImageFetcher: Send + Sync {
  fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}
