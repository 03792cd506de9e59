// 该文件是 Xunshi （巡视） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use reqwest::blocking::Client;
use tracing::{info, warn};
use url::Url;

use xunshi::{
  FromUrl,
  analyzer::ImageAnalyzer,
  auth::{GoogleCredentials, NoAuth, StaticToken, TokenProvider},
  geocode::{API_KEY_VARS, ApiKey, VWorldGeocoder},
  input::HttpImageFetcher,
  model::{ClassNames, Yolo26Builder},
  output::{CloudStorageBucket, draw::Draw},
  process::ReportProcessor,
  report::REPORT_COLLECTION,
  store::{CollectionWatcher, FirestoreClient},
  task::{Task, WatchTask},
};

fn is_google_endpoint(url: &Url) -> bool {
  url
    .host_str()
    .is_some_and(|host| host.ends_with("googleapis.com"))
}

/// 固定令牌 > 服务账号文件 > 元数据服务；模拟器地址不带鉴权
fn credentials(args: &args::Args, http: &Client) -> Result<Arc<dyn TokenProvider>> {
  if let Some(token) = &args.access_token {
    warn!("使用固定访问令牌，过期后请求会被拒绝");
    return Ok(Arc::new(StaticToken(token.clone())));
  }
  if let Some(path) = &args.credentials {
    let credentials = GoogleCredentials::from_service_account_file(path)
      .with_context(|| format!("无法加载凭据文件 {}", path.display()))?;
    return Ok(Arc::new(credentials.client(http.clone())));
  }
  if is_google_endpoint(&args.firestore_endpoint) || is_google_endpoint(&args.storage_endpoint) {
    let credentials = GoogleCredentials::metadata_server(args.metadata_token_url.clone());
    return Ok(Arc::new(credentials.client(http.clone())));
  }
  info!("连接本地模拟器，请求不带鉴权");
  Ok(Arc::new(NoAuth))
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  if let Ok(path) = dotenvy::dotenv() {
    info!("加载环境文件: {}", path.display());
  }

  let args = args::Args::parse();

  info!("模型地址: {}", args.model);
  info!("类别文件: {}", args.labels.display());
  info!("数据库: {}", args.firestore);
  info!("存储桶: {}", args.bucket);

  let names = ClassNames::from_file(&args.labels)
    .with_context(|| format!("无法读取类别文件 {}", args.labels.display()))?;
  let model = Yolo26Builder::from_url(&args.model)?
    .class_num(names.len())
    .build()?;

  let draw = match &args.font {
    Some(path) => Draw::with_font_file(path)?,
    None => Draw::default(),
  };

  let http = Client::new();
  let analyzer =
    ImageAnalyzer::new(HttpImageFetcher::new(http.clone()), model, names).with_draw(draw);

  let credentials = credentials(&args, &http)?;
  let firestore = FirestoreClient::from_url(&args.firestore)?
    .endpoint(args.firestore_endpoint.clone())
    .credentials(Arc::clone(&credentials))
    .client(http.clone());
  let bucket = CloudStorageBucket::from_url(&args.bucket)?
    .endpoint(args.storage_endpoint.clone())
    .credentials(credentials)
    .client(http.clone());

  let api_key = match &args.vworld_key {
    Some(key) => ApiKey::Fixed(key.clone()),
    None => ApiKey::Environment,
  };
  if api_key.resolve().is_none() {
    warn!("未找到地址服务密钥 ({})，地址将为空", API_KEY_VARS.join(" / "));
  }
  let geocoder = VWorldGeocoder::new(api_key)?
    .endpoint(args.vworld_endpoint.clone())
    .client(http);

  let processor = ReportProcessor::new(analyzer, firestore.clone(), bucket, geocoder)
    .violation(args.violation.clone());

  let watcher = CollectionWatcher::new(
    Arc::new(firestore),
    REPORT_COLLECTION,
    Duration::from_secs(args.poll_interval.max(1)),
  );

  WatchTask::default().run_task(watcher, processor)?;

  info!("监听已结束");
  Ok(())
}
