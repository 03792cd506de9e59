// 该文件是 Xunshi （巡视） 项目的一部分。
// src/input/http_image.rs - HTTP 图像下载
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

use reqwest::blocking::Client;
use tracing::debug;

use crate::input::{FetchError, ImageFetcher};

#[derive(Debug, Clone, Default)]
pub struct HttpImageFetcher {
  client: Client,
}

impl HttpImageFetcher {
  pub fn new(client: Client) -> Self {
    Self { client }
  }
}

impl ImageFetcher for HttpImageFetcher {
  fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
    if url.trim().is_empty() {
      return Err(FetchError::EmptyUrl);
    }

    let response = self.client.get(url).send()?;
    let status = response.status();
    if !status.is_success() {
      return Err(FetchError::Status {
        url: url.to_string(),
        status: status.as_u16(),
      });
    }

    let bytes = response.bytes()?;
    debug!("下载图像 {} 字节: {}", bytes.len(), url);
    Ok(bytes.to_vec())
  }
}
