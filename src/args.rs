// 该文件是 Xunshi （巡视） 项目的一部分。
// src/args.rs - 项目参数配置
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

use std::path::PathBuf;

use clap::Parser;
use url::Url;

use xunshi::{
  auth::DEFAULT_METADATA_TOKEN_URL, geocode::DEFAULT_VWORLD_ENDPOINT, output::DEFAULT_STORAGE_ENDPOINT, report::DEFAULT_VIOLATION,
  store::DEFAULT_FIRESTORE_ENDPOINT,
};

/// Xunshi 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// RKNN 模型地址，如 yolo26:///opt/models/helmet.rknn
  #[arg(long, env = "XUNSHI_MODEL", value_name = "MODEL")]
  pub model: Url,

  /// 类别名称文件，每行一个
  #[arg(long, env = "XUNSHI_LABELS", value_name = "FILE")]
  pub labels: PathBuf,

  /// 标签字体文件（TTF/OTF），不提供时只绘制边框
  #[arg(long, env = "XUNSHI_FONT", value_name = "FILE")]
  pub font: Option<PathBuf>,

  /// Firestore 数据库，如 firestore://my-project 或 firestore://my-project/my-db
  #[arg(long, env = "XUNSHI_FIRESTORE", value_name = "DATABASE")]
  pub firestore: Url,

  /// Firestore REST 服务地址（模拟器用 http://localhost:8080/v1/）
  #[arg(long, env = "FIRESTORE_ENDPOINT", default_value = DEFAULT_FIRESTORE_ENDPOINT)]
  pub firestore_endpoint: Url,

  /// 分析图像存储桶，如 gs://my-project.appspot.com
  #[arg(long, env = "XUNSHI_BUCKET", value_name = "BUCKET")]
  pub bucket: Url,

  /// Cloud Storage 服务地址
  #[arg(long, env = "STORAGE_ENDPOINT", default_value = DEFAULT_STORAGE_ENDPOINT)]
  pub storage_endpoint: Url,

  /// 固定 OAuth 访问令牌，不会自动刷新，只用于调试
  #[arg(long, env = "GOOGLE_OAUTH_ACCESS_TOKEN", hide_env_values = true)]
  pub access_token: Option<String>,

  /// 服务账号密钥文件，令牌过期前自动刷新
  #[arg(long, env = "GOOGLE_APPLICATION_CREDENTIALS", value_name = "FILE")]
  pub credentials: Option<PathBuf>,

  /// 未提供密钥文件时使用的元数据服务令牌地址
  #[arg(long, default_value = DEFAULT_METADATA_TOKEN_URL)]
  pub metadata_token_url: Url,

  /// VWorld 地址服务密钥；省略时每次查询从 .env 与环境变量
  /// (VWORLD_API_KEY / VWorld_API) 读取
  #[arg(long, hide_env_values = true)]
  pub vworld_key: Option<String>,

  /// VWorld 地址服务地址
  #[arg(long, env = "VWORLD_ENDPOINT", default_value = DEFAULT_VWORLD_ENDPOINT)]
  pub vworld_endpoint: Url,

  /// 写入结论的违规类型
  #[arg(long, default_value = DEFAULT_VIOLATION)]
  pub violation: String,

  /// 集合轮询间隔（秒）
  #[arg(long, default_value = "5", value_name = "SECONDS")]
  pub poll_interval: u64,
}
