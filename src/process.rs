// 该文件是 Xunshi （巡视） 项目的一部分。
// src/process.rs - 上报处理流程
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

use chrono::Utc;
use image::{ImageFormat, RgbImage};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
  analyzer::{AnalyzeError, ImageAnalyzer},
  geocode::ReverseGeocoder,
  input::{FetchError, ImageFetcher},
  listener::ReportHandler,
  model::{DetectResult, Model},
  output::{BlobStore, UploadError},
  report::{
    Conclusion, Coordinates, DEFAULT_VIOLATION, conclusion_id, conclusion_object_name,
    file_name_from_url,
  },
  store::{DocumentStore, StoreError},
};

const ANNOTATED_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Error, Debug)]
pub enum ProcessError {
  #[error("图像下载失败: {0}")]
  Fetch(#[from] FetchError),
  #[error("图像解码失败: {0}")]
  Decode(image::ImageError),
  #[error("模型推理失败: {0}")]
  Inference(Box<dyn std::error::Error + Send + Sync>),
  #[error("上报文档无效: {0}")]
  MissingDocument(String),
  #[error("读取上报失败: {0}")]
  ReportLookup(StoreError),
  #[error("上传分析图像失败: {0}")]
  Upload(#[from] UploadError),
  #[error("写入结论失败: {0}")]
  Persist(StoreError),
}

impl From<AnalyzeError> for ProcessError {
  fn from(err: AnalyzeError) -> Self {
    match err {
      AnalyzeError::Fetch(e) => ProcessError::Fetch(e),
      AnalyzeError::Decode(e) => ProcessError::Decode(e),
      AnalyzeError::Inference(e) => ProcessError::Inference(e),
    }
  }
}

/// 写入数据库后的结论及其编号
#[derive(Debug, Clone)]
pub struct Processed {
  pub conclusion_id: String,
  pub conclusion: Conclusion,
}

pub struct ReportProcessor<F, M, S, B, G> {
  analyzer: ImageAnalyzer<F, M>,
  store: S,
  blob: B,
  geocoder: G,
  violation: String,
}

impl<F, M, S, B, G> ReportProcessor<F, M, S, B, G>
where
  F: ImageFetcher,
  M: Model<Input = RgbImage, Output = DetectResult>,
  M::Error: std::error::Error + Send + Sync + 'static,
  S: DocumentStore,
  B: BlobStore,
  G: ReverseGeocoder,
{
  pub fn new(analyzer: ImageAnalyzer<F, M>, store: S, blob: B, geocoder: G) -> Self {
    Self {
      analyzer,
      store,
      blob,
      geocoder,
      violation: DEFAULT_VIOLATION.to_string(),
    }
  }

  pub fn violation(mut self, violation: impl Into<String>) -> Self {
    self.violation = violation.into();
    self
  }

  /// 分析、上传、定位、写入结论；任何一步失败都终止后续步骤
  pub fn process(&self, image_url: &str, report_id: &str) -> Result<Processed, ProcessError> {
    let analysis = self.analyzer.analyze(image_url)?;

    let file_name = file_name_from_url(image_url)
      .ok_or_else(|| ProcessError::MissingDocument(format!("图像地址缺少文件名: {}", image_url)))?;
    let image_url_public = self.upload_annotated(&analysis.annotated, &file_name)?;

    let coordinates = self.load_coordinates(report_id)?;
    let region = coordinates.and_then(|c| self.geocoder.reverse_geocode(c));
    if coordinates.is_some() && region.is_none() {
      warn!("无法解析地址: {}", report_id);
    }

    let conclusion = Conclusion {
      date: Utc::now(),
      violation: self.violation.clone(),
      confidence: f64::from(analysis.confidence),
      detected_brand: analysis.label,
      image_url: image_url_public,
      region,
      gps_info: coordinates.map(|c| c.to_string()),
    };

    let id = conclusion_id(&file_name);
    self
      .store
      .put_conclusion(&id, &conclusion)
      .map_err(ProcessError::Persist)?;

    Ok(Processed {
      conclusion_id: id,
      conclusion,
    })
  }

  // 临时文件在离开作用域时删除，无论上传是否成功
  fn upload_annotated(&self, annotated: &RgbImage, file_name: &str) -> Result<String, ProcessError> {
    let mut temp = tempfile::Builder::new()
      .prefix("annotated-")
      .suffix(".jpg")
      .tempfile()
      .map_err(UploadError::from)?;
    write_jpeg(annotated, &mut temp)?;

    let url = self.blob.upload_file(
      temp.path(),
      &conclusion_object_name(file_name),
      ANNOTATED_CONTENT_TYPE,
    )?;
    Ok(url)
  }

  fn load_coordinates(&self, report_id: &str) -> Result<Option<Coordinates>, ProcessError> {
    let report = self
      .store
      .get_report(report_id)
      .map_err(ProcessError::ReportLookup)?;

    let Some(report) = report else {
      warn!("上报文档不存在: {}", report_id);
      return Ok(None);
    };
    let Some(gps_info) = report.gps_info.as_deref() else {
      warn!("上报缺少坐标: {}", report_id);
      return Ok(None);
    };

    Coordinates::parse(gps_info)
      .map(Some)
      .map_err(|e| ProcessError::MissingDocument(e.to_string()))
  }
}

fn write_jpeg(image: &RgbImage, temp: &mut NamedTempFile) -> Result<(), UploadError> {
  image.write_to(temp.as_file_mut(), ImageFormat::Jpeg)?;
  temp.as_file_mut().sync_all()?;
  Ok(())
}

impl<F, M, S, B, G> ReportHandler for ReportProcessor<F, M, S, B, G>
where
  F: ImageFetcher,
  M: Model<Input = RgbImage, Output = DetectResult> + Send,
  M::Error: std::error::Error + Send + Sync + 'static,
  S: DocumentStore,
  B: BlobStore,
  G: ReverseGeocoder,
{
  fn handle_report(&self, image_url: &str, report_id: &str) {
    match self.process(image_url, report_id) {
      Ok(processed) => info!("分析完成: {} -> {}", image_url, processed.conclusion_id),
      Err(e) => error!("分析失败 {}: {}", image_url, e),
    }
  }
}

#[cfg(test)]
mod tests {
  use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
  };

  use mockall::predicate::{always, eq};

  use super::*;
  use crate::{
    analyzer::tests::{FixedModel, item, names, png_bytes},
    geocode::MockReverseGeocoder,
    input::MockImageFetcher,
    model::DetectItem,
    output::MockBlobStore,
    report::Report,
    store::MockDocumentStore,
  };

  const IMAGE_URL: &str = "https://x/img_123.jpg";
  const PUBLIC_URL: &str = "https://storage.googleapis.com/b/conclusion/img_123.jpg";

  fn analyzer(items: Vec<DetectItem>) -> ImageAnalyzer<MockImageFetcher, FixedModel> {
    let mut fetcher = MockImageFetcher::new();
    let bytes = png_bytes();
    fetcher
      .expect_fetch()
      .with(eq(IMAGE_URL))
      .returning(move |_| Ok(bytes.clone()));
    ImageAnalyzer::new(fetcher, FixedModel(items), names())
  }

  /// 记录上传时临时文件路径的存储
  fn recording_blob(result: Result<&'static str, u16>) -> (MockBlobStore, Arc<Mutex<Option<PathBuf>>>) {
    let seen = Arc::new(Mutex::new(None));
    let seen_in_mock = Arc::clone(&seen);
    let mut blob = MockBlobStore::new();
    blob
      .expect_upload_file()
      .with(always(), eq("conclusion/img_123.jpg"), eq("image/jpeg"))
      .times(1)
      .returning(move |path, _, _| {
        assert!(path.exists());
        *seen_in_mock.lock().unwrap() = Some(path.to_path_buf());
        match result {
          Ok(url) => Ok(url.to_string()),
          Err(status) => Err(UploadError::Rejected {
            status,
            body: "denied".into(),
          }),
        }
      });
    (blob, seen)
  }

  fn store_with_report(gps_info: Option<&'static str>) -> MockDocumentStore {
    let mut store = MockDocumentStore::new();
    store
      .expect_get_report()
      .with(eq("r1"))
      .returning(move |id| {
        Ok(Some(Report {
          id: id.to_string(),
          image_url: Some(IMAGE_URL.to_string()),
          gps_info: gps_info.map(str::to_string),
        }))
      });
    store
  }

  fn capture_conclusion(store: &mut MockDocumentStore) -> Arc<Mutex<Vec<(String, Conclusion)>>> {
    let written = Arc::new(Mutex::new(Vec::new()));
    let written_in_mock = Arc::clone(&written);
    store.expect_put_conclusion().returning(move |id, conclusion| {
      written_in_mock
        .lock()
        .unwrap()
        .push((id.to_string(), conclusion.clone()));
      Ok(())
    });
    written
  }

  #[test]
  fn helmet_violation_scenario() {
    let (blob, seen) = recording_blob(Ok(PUBLIC_URL));
    let mut store = store_with_report(Some("37.55 127.00"));
    let written = capture_conclusion(&mut store);
    let mut geocoder = MockReverseGeocoder::new();
    geocoder
      .expect_reverse_geocode()
      .with(eq(Coordinates {
        lat: 37.55,
        lon: 127.0,
      }))
      .times(1)
      .return_const(Some("Seoul, ... 123-4".to_string()));

    let processor = ReportProcessor::new(analyzer(vec![item(1, 0.92)]), store, blob, geocoder);
    let processed = processor.process(IMAGE_URL, "r1").unwrap();

    assert_eq!(processed.conclusion_id, "conclusion_img_123");
    let written = written.lock().unwrap();
    assert_eq!(written.len(), 1);
    let (id, conclusion) = &written[0];
    assert_eq!(id, "conclusion_img_123");
    assert!((conclusion.confidence - 0.92).abs() < 1e-6);
    assert_eq!(conclusion.detected_brand, "helmet-violation");
    assert_eq!(conclusion.violation, DEFAULT_VIOLATION);
    assert_eq!(conclusion.image_url, PUBLIC_URL);
    assert_eq!(conclusion.region.as_deref(), Some("Seoul, ... 123-4"));
    assert_eq!(conclusion.gps_info.as_deref(), Some("37.55 127.0"));

    let path = seen.lock().unwrap().clone().unwrap();
    assert!(!path.exists());
  }

  #[test]
  fn geocode_failure_leaves_region_empty() {
    let (blob, _) = recording_blob(Ok(PUBLIC_URL));
    let mut store = store_with_report(Some("37.55 127.00"));
    let written = capture_conclusion(&mut store);
    let mut geocoder = MockReverseGeocoder::new();
    geocoder.expect_reverse_geocode().return_const(None::<String>);

    let processor = ReportProcessor::new(analyzer(vec![item(1, 0.92)]), store, blob, geocoder);
    processor.process(IMAGE_URL, "r1").unwrap();

    let written = written.lock().unwrap();
    assert_eq!(written[0].1.region, None);
    assert_eq!(written[0].1.gps_info.as_deref(), Some("37.55 127.0"));
  }

  #[test]
  fn missing_report_skips_geocoding() {
    let (blob, _) = recording_blob(Ok(PUBLIC_URL));
    let mut store = MockDocumentStore::new();
    store.expect_get_report().returning(|_| Ok(None));
    let written = capture_conclusion(&mut store);
    let mut geocoder = MockReverseGeocoder::new();
    geocoder.expect_reverse_geocode().never();

    let processor = ReportProcessor::new(analyzer(vec![]), store, blob, geocoder);
    let processed = processor.process(IMAGE_URL, "r1").unwrap();

    assert_eq!(processed.conclusion.confidence, 0.0);
    assert_eq!(processed.conclusion.detected_brand, "No detection");
    let written = written.lock().unwrap();
    assert_eq!(written[0].1.region, None);
    assert_eq!(written[0].1.gps_info, None);
  }

  #[test]
  fn report_without_coordinates_skips_geocoding() {
    let (blob, _) = recording_blob(Ok(PUBLIC_URL));
    let mut store = store_with_report(None);
    let written = capture_conclusion(&mut store);
    let mut geocoder = MockReverseGeocoder::new();
    geocoder.expect_reverse_geocode().never();

    let processor = ReportProcessor::new(analyzer(vec![item(0, 0.95)]), store, blob, geocoder);
    processor.process(IMAGE_URL, "r1").unwrap();

    assert_eq!(written.lock().unwrap()[0].1.gps_info, None);
  }

  #[test]
  fn malformed_coordinates_abort_without_conclusion() {
    let (blob, seen) = recording_blob(Ok(PUBLIC_URL));
    let mut store = store_with_report(Some("37.55"));
    store.expect_put_conclusion().never();
    let mut geocoder = MockReverseGeocoder::new();
    geocoder.expect_reverse_geocode().never();

    let processor = ReportProcessor::new(analyzer(vec![]), store, blob, geocoder);
    assert!(matches!(
      processor.process(IMAGE_URL, "r1"),
      Err(ProcessError::MissingDocument(_))
    ));
    assert!(!seen.lock().unwrap().clone().unwrap().exists());
  }

  #[test]
  fn upload_failure_removes_temp_file_and_stops() {
    let (blob, seen) = recording_blob(Err(403));
    let mut store = MockDocumentStore::new();
    store.expect_get_report().never();
    store.expect_put_conclusion().never();
    let geocoder = MockReverseGeocoder::new();

    let processor = ReportProcessor::new(analyzer(vec![item(1, 0.9)]), store, blob, geocoder);
    assert!(matches!(
      processor.process(IMAGE_URL, "r1"),
      Err(ProcessError::Upload(UploadError::Rejected { status: 403, .. }))
    ));
    assert!(!seen.lock().unwrap().clone().unwrap().exists());
  }

  #[test]
  fn persist_failure_is_reported() {
    let (blob, seen) = recording_blob(Ok(PUBLIC_URL));
    let mut store = store_with_report(None);
    store.expect_put_conclusion().returning(|_, _| {
      Err(StoreError::Rejected {
        status: 500,
        body: "boom".into(),
      })
    });
    let geocoder = MockReverseGeocoder::new();

    let processor = ReportProcessor::new(analyzer(vec![]), store, blob, geocoder);
    assert!(matches!(
      processor.process(IMAGE_URL, "r1"),
      Err(ProcessError::Persist(_))
    ));
    assert!(!seen.lock().unwrap().clone().unwrap().exists());
  }

  #[test]
  fn same_file_name_writes_same_id() {
    let (blob, _) = recording_blob(Ok(PUBLIC_URL));
    let mut store = store_with_report(None);
    let written = capture_conclusion(&mut store);
    let processor = ReportProcessor::new(
      analyzer(vec![]),
      store,
      blob,
      MockReverseGeocoder::new(),
    );
    let first = processor.process(IMAGE_URL, "r1").unwrap();
    assert_eq!(first.conclusion_id, "conclusion_img_123");
    assert_eq!(written.lock().unwrap()[0].0, first.conclusion_id);
  }

  #[test]
  fn handle_report_swallows_failures() {
    let mut fetcher = MockImageFetcher::new();
    fetcher.expect_fetch().returning(|_| Err(FetchError::EmptyUrl));
    let mut blob = MockBlobStore::new();
    blob.expect_upload_file().never();
    let mut store = MockDocumentStore::new();
    store.expect_put_conclusion().never();

    let processor = ReportProcessor::new(
      ImageAnalyzer::new(fetcher, FixedModel(vec![]), names()),
      store,
      blob,
      MockReverseGeocoder::new(),
    );
    processor.handle_report("", "r1");
  }
}
