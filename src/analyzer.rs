// 该文件是 Xunshi （巡视） 项目的一部分。
// src/analyzer.rs - 上报图像分析
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

use std::time::Instant;

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  input::{FetchError, ImageFetcher},
  model::{ClassNames, DetectResult, Model},
  output::draw::Draw,
};

pub const CONFIDENCE_THRESHOLD: f32 = 0.8;
pub const NO_DETECTION_LABEL: &str = "No detection";

#[derive(Error, Debug)]
pub enum AnalyzeError {
  #[error("图像下载失败: {0}")]
  Fetch(#[from] FetchError),
  #[error("图像解码失败: {0}")]
  Decode(#[from] image::ImageError),
  #[error("模型推理失败: {0}")]
  Inference(Box<dyn std::error::Error + Send + Sync>),
}

/// 单张图像的分析结果，只在内存中存在
#[derive(Debug, Clone)]
pub struct Analysis {
  pub confidence: f32,
  pub label: String,
  pub detections: usize,
  pub annotated: RgbImage,
}

pub struct ImageAnalyzer<F, M> {
  fetcher: F,
  model: M,
  names: ClassNames,
  draw: Draw,
  threshold: f32,
}

impl<F, M> ImageAnalyzer<F, M>
where
  F: ImageFetcher,
  M: Model<Input = RgbImage, Output = DetectResult>,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  pub fn new(fetcher: F, model: M, names: ClassNames) -> Self {
    Self {
      fetcher,
      model,
      names,
      draw: Draw::default(),
      threshold: CONFIDENCE_THRESHOLD,
    }
  }

  pub fn with_draw(mut self, draw: Draw) -> Self {
    self.draw = draw;
    self
  }

  pub fn analyze(&self, image_url: &str) -> Result<Analysis, AnalyzeError> {
    let bytes = self.fetcher.fetch(image_url)?;
    let image = image::load_from_memory(&bytes)?.to_rgb8();
    debug!("图像尺寸: {}x{}", image.width(), image.height());

    let now = Instant::now();
    let result = self
      .model
      .infer(&image)
      .map_err(|e| AnalyzeError::Inference(Box::new(e)))?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());

    Ok(self.summarize(&image, &result))
  }

  /// 按阈值过滤，取置信度最高者并绘制全部通过的检测框
  pub fn summarize(&self, image: &RgbImage, result: &DetectResult) -> Analysis {
    let passed = result.above(self.threshold);
    let annotated = self.draw.annotate(image, &passed, &self.names);

    let (confidence, label) = match passed.top() {
      Some(top) => (top.score, self.names.name(top.class_id)),
      None => (0.0, NO_DETECTION_LABEL.to_string()),
    };

    Analysis {
      confidence,
      label,
      detections: passed.len(),
      annotated,
    }
  }
}
