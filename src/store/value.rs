// 该文件是 Xunshi （巡视） 项目的一部分。
// src/store/value.rs - Firestore 字段值编解码
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

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value, json};

use crate::report::Conclusion;

pub(crate) fn string_value(value: &str) -> Value {
  json!({ "stringValue": value })
}

pub(crate) fn double_value(value: f64) -> Value {
  json!({ "doubleValue": value })
}

pub(crate) fn timestamp_value(value: &DateTime<Utc>) -> Value {
  json!({ "timestampValue": value.to_rfc3339_opts(SecondsFormat::Micros, true) })
}

pub(crate) fn null_value() -> Value {
  json!({ "nullValue": null })
}

fn optional_string_value(value: Option<&str>) -> Value {
  value.map(string_value).unwrap_or_else(null_value)
}

/// 读取字符串字段，其他类型或空值视为缺失
pub(crate) fn as_string(value: &Value) -> Option<&str> {
  value.get("stringValue").and_then(Value::as_str)
}

pub(crate) fn conclusion_fields(conclusion: &Conclusion) -> Map<String, Value> {
  let mut fields = Map::new();
  fields.insert("date".into(), timestamp_value(&conclusion.date));
  fields.insert("violation".into(), string_value(&conclusion.violation));
  fields.insert("confidence".into(), double_value(conclusion.confidence));
  fields.insert("detectedBrand".into(), string_value(&conclusion.detected_brand));
  fields.insert("imageUrl".into(), string_value(&conclusion.image_url));
  fields.insert(
    "region".into(),
    optional_string_value(conclusion.region.as_deref()),
  );
  fields.insert(
    "gpsInfo".into(),
    optional_string_value(conclusion.gps_info.as_deref()),
  );
  fields
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn conclusion_fields_use_typed_values() {
    let conclusion = Conclusion {
      date: Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap(),
      violation: "헬멧미착용".into(),
      confidence: 0.5,
      detected_brand: "helmet-violation".into(),
      image_url: "https://storage.googleapis.com/b/conclusion/img_1.jpg".into(),
      region: None,
      gps_info: Some("37.55 127.0".into()),
    };
    let fields = conclusion_fields(&conclusion);

    assert_eq!(
      fields["date"],
      json!({ "timestampValue": "2026-03-01T09:30:00.000000Z" })
    );
    assert_eq!(fields["confidence"], json!({ "doubleValue": 0.5 }));
    assert_eq!(fields["detectedBrand"], json!({ "stringValue": "helmet-violation" }));
    assert_eq!(fields["region"], json!({ "nullValue": null }));
    assert_eq!(fields["gpsInfo"], json!({ "stringValue": "37.55 127.0" }));
    assert_eq!(fields.len(), 7);
  }

  #[test]
  fn as_string_ignores_other_types() {
    assert_eq!(as_string(&json!({ "stringValue": "a" })), Some("a"));
    assert_eq!(as_string(&json!({ "integerValue": "3" })), None);
    assert_eq!(as_string(&json!({ "nullValue": null })), None);
  }
}
