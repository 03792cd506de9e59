// 该文件是 Xunshi （巡视） 项目的一部分。
// src/geocode.rs - 坐标逆地理编码（地番地址）
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
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::report::{Coordinates, Decimal};

pub const DEFAULT_VWORLD_ENDPOINT: &str = "https://api.vworld.kr/req/address";
/// 依次查找的密钥环境变量
pub const API_KEY_VARS: [&str; 2] = ["VWORLD_API_KEY", "VWorld_API"];

/// 坐标到地址的查询；任何失败都视为无法解析，不返回错误
#[cfg_attr(test, mockall::automock)]
pub trait ReverseGeocoder: Send + Sync {
  fn reverse_geocode(&self, coordinates: Coordinates) -> Option<String>;
}

#[derive(Deserialize, Debug)]
struct AddressEnvelope {
  response: AddressResponse,
}

#[derive(Deserialize, Debug)]
struct AddressResponse {
  status: String,
  #[serde(default)]
  result: Vec<AddressResult>,
}

#[derive(Deserialize, Debug)]
struct AddressResult {
  text: Option<String>,
}

/// 解析地址服务响应，得到第一条结果的地番地址
pub fn parse_address_response(status: u16, body: &str) -> Option<String> {
  if status != 200 {
    debug!("地址服务 HTTP 状态: {}", status);
    return None;
  }

  let envelope: AddressEnvelope = match serde_json::from_str(body) {
    Ok(envelope) => envelope,
    Err(e) => {
      warn!("地址服务响应无法解析: {}", e);
      return None;
    }
  };

  if envelope.response.status != "OK" {
    debug!("地址服务状态: {}", envelope.response.status);
    return None;
  }

  envelope
    .response
    .result
    .into_iter()
    .next()
    .and_then(|first| first.text)
}

/// 地址服务密钥
#[derive(Debug, Clone)]
pub enum ApiKey {
  Fixed(String),
  /// 每次查询时重新加载 `.env` 并读取环境变量
  Environment,
}

impl ApiKey {
  pub fn resolve(&self) -> Option<String> {
    match self {
      ApiKey::Fixed(key) => Some(key.clone()),
      ApiKey::Environment => {
        // 已存在的环境变量不会被 .env 覆盖
        let _ = dotenvy::dotenv();
        first_present(&API_KEY_VARS, |name| std::env::var(name).ok())
      }
    }
  }
}

fn first_present(names: &[&str], lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
  names
    .iter()
    .find_map(|name| lookup(name).filter(|value| !value.trim().is_empty()))
}

/// VWorld 地址服务
#[derive(Debug, Clone)]
pub struct VWorldGeocoder {
  endpoint: Url,
  api_key: ApiKey,
  client: Client,
}

impl VWorldGeocoder {
  pub fn new(api_key: ApiKey) -> Result<Self, url::ParseError> {
    Ok(Self {
      endpoint: Url::parse(DEFAULT_VWORLD_ENDPOINT)?,
      api_key,
      client: Client::new(),
    })
  }

  pub fn endpoint(mut self, endpoint: Url) -> Self {
    self.endpoint = endpoint;
    self
  }

  pub fn client(mut self, client: Client) -> Self {
    self.client = client;
    self
  }

  fn query(coordinates: Coordinates, api_key: String) -> [(&'static str, String); 7] {
    [
      ("service", "address".to_string()),
      ("request", "getAddress".to_string()),
      ("crs", "epsg:4326".to_string()),
      (
        "point",
        format!("{},{}", Decimal(coordinates.lon), Decimal(coordinates.lat)),
      ),
      ("format", "json".to_string()),
      ("type", "parcel".to_string()),
      ("key", api_key),
    ]
  }
}

impl ReverseGeocoder for VWorldGeocoder {
  fn reverse_geocode(&self, coordinates: Coordinates) -> Option<String> {
    let Some(api_key) = self.api_key.resolve() else {
      warn!("未配置地址服务密钥 ({})", API_KEY_VARS.join(" / "));
      return None;
    };

    let response = self
      .client
      .get(self.endpoint.clone())
      .query(&Self::query(coordinates, api_key))
      .send();

    let response = match response {
      Ok(response) => response,
      Err(e) => {
        warn!("地址服务请求失败: {}", e);
        return None;
      }
    };

    let status = response.status().as_u16();
    let body = match response.text() {
      Ok(body) => body,
      Err(e) => {
        warn!("地址服务响应读取失败: {}", e);
        return None;
      }
    };

    parse_address_response(status, &body)
  }
}
