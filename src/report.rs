// 该文件是 Xunshi （巡视） 项目的一部分。
// src/report.rs - 上报与结论数据
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

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;
use url::Url;

pub const REPORT_COLLECTION: &str = "Report";
pub const CONCLUSION_COLLECTION: &str = "Conclusion";
pub const CONCLUSION_OBJECT_PREFIX: &str = "conclusion";
pub const DEFAULT_VIOLATION: &str = "헬멧미착용";

/// 上报文档，由上报客户端创建，本服务只读
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
  pub id: String,
  pub image_url: Option<String>,
  pub gps_info: Option<String>,
}

#[derive(Error, Debug, PartialEq)]
#[error("坐标格式错误: {0:?}")]
pub struct CoordinatesError(pub String);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
  pub lat: f64,
  pub lon: f64,
}

impl Coordinates {
  /// 解析 "lat lon" 形式的坐标，必须恰好两个数值
  pub fn parse(gps_info: &str) -> Result<Self, CoordinatesError> {
    let mut tokens = gps_info.split_whitespace();
    let (Some(lat), Some(lon), None) = (tokens.next(), tokens.next(), tokens.next()) else {
      return Err(CoordinatesError(gps_info.to_string()));
    };
    let lat: f64 = lat
      .parse()
      .map_err(|_| CoordinatesError(gps_info.to_string()))?;
    let lon: f64 = lon
      .parse()
      .map_err(|_| CoordinatesError(gps_info.to_string()))?;
    Ok(Self { lat, lon })
  }
}

/// 写回格式，整数值保留一位小数，如 `37.55 127.0`
impl fmt::Display for Coordinates {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {}", Decimal(self.lat), Decimal(self.lon))
  }
}

/// 十进制输出，整数值补一位小数
pub(crate) struct Decimal(pub f64);

impl fmt::Display for Decimal {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.0.is_finite() && self.0.fract() == 0.0 && self.0.abs() < 1e16 {
      write!(f, "{:.1}", self.0)
    } else {
      write!(f, "{}", self.0)
    }
  }
}

/// 分析结论文档
#[derive(Debug, Clone, PartialEq)]
pub struct Conclusion {
  pub date: DateTime<Utc>,
  pub violation: String,
  pub confidence: f64,
  pub detected_brand: String,
  pub image_url: String,
  pub region: Option<String>,
  pub gps_info: Option<String>,
}

/// 图像地址最后一段路径作为文件名；编码过的对象路径取最后一级
pub fn file_name_from_url(image_url: &str) -> Option<String> {
  let last = match Url::parse(image_url) {
    Ok(url) => url
      .path_segments()
      .and_then(|mut segments| segments.next_back())
      .map(str::to_string)?,
    Err(_) => image_url
      .split(['?', '#'])
      .next()
      .and_then(|path| path.rsplit('/').next())
      .map(str::to_string)?,
  };
  let decoded = urlencoding::decode(&last)
    .map(|s| s.into_owned())
    .unwrap_or(last);
  let name = decoded.rsplit('/').next().unwrap_or_default().to_string();
  if name.is_empty() { None } else { Some(name) }
}

/// `conclusion_<第一个点之前的文件名>`
pub fn conclusion_id(file_name: &str) -> String {
  let base = file_name.split('.').next().unwrap_or(file_name);
  format!("{}_{}", CONCLUSION_OBJECT_PREFIX, base)
}

pub fn conclusion_object_name(file_name: &str) -> String {
  format!("{}/{}", CONCLUSION_OBJECT_PREFIX, file_name)
}
