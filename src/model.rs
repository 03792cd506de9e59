// 该文件是 Xunshi （巡视） 项目的一部分。
// src/model.rs - 模型
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

use tracing::debug;

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectItem {
  pub class_id: u32,
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]，归一化坐标
}

#[derive(Debug, Clone, Default)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
}

impl DetectResult {
  /// 仅保留置信度严格高于阈值的检测框，保持原有顺序
  pub fn above(&self, threshold: f32) -> DetectResult {
    let items: Vec<DetectItem> = self
      .items
      .iter()
      .filter(|item| item.score > threshold)
      .cloned()
      .collect();
    DetectResult {
      items: items.into_boxed_slice(),
    }
  }

  /// 置信度最高的检测框；并列时取先出现者
  pub fn top(&self) -> Option<&DetectItem> {
    self.items.iter().fold(None, |best: Option<&DetectItem>, item| match best {
      Some(b) if b.score >= item.score => Some(b),
      _ => Some(item),
    })
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }
}

/// 类别编号到类别名称的映射
#[derive(Debug, Clone, Default)]
pub struct ClassNames {
  names: Vec<String>,
}

impl ClassNames {
  pub fn new(names: Vec<String>) -> Self {
    Self { names }
  }

  /// 从标签文件加载，每行一个类别名称，空行忽略
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, std::io::Error> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let names: Vec<String> = content
      .lines()
      .map(str::trim)
      .filter(|line| !line.is_empty())
      .map(str::to_string)
      .collect();
    debug!("加载 {} 个类别名称", names.len());
    Ok(Self { names })
  }

  pub fn name(&self, class_id: u32) -> String {
    self
      .names
      .get(class_id as usize)
      .cloned()
      .unwrap_or_else(|| format!("class_{}", class_id))
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }
}

#[cfg(feature = "model_yolo26")]
mod yolo26;
#[cfg(feature = "model_yolo26")]
pub use self::yolo26::{Yolo26, Yolo26Builder, Yolo26Error};

#[cfg(test)]
mod tests {
  use super::*;

  fn item(class_id: u32, score: f32) -> DetectItem {
    DetectItem {
      class_id,
      score,
      bbox: [0.1, 0.1, 0.5, 0.5],
    }
  }

  fn result(items: Vec<DetectItem>) -> DetectResult {
    DetectResult {
      items: items.into_boxed_slice(),
    }
  }

  #[test]
  fn above_is_strict() {
    let r = result(vec![item(0, 0.8), item(1, 0.81), item(2, 0.5)]);
    let passed = r.above(0.8);
    assert_eq!(passed.len(), 1);
    assert_eq!(passed.items[0].class_id, 1);
  }

  #[test]
  fn top_picks_highest_score() {
    let r = result(vec![item(0, 0.85), item(1, 0.97), item(2, 0.9)]);
    let top = r.top().unwrap();
    assert_eq!(top.class_id, 1);
    assert!(r.items.iter().all(|i| top.score >= i.score));
  }

  #[test]
  fn top_tie_keeps_first() {
    let r = result(vec![item(3, 0.9), item(4, 0.9)]);
    assert_eq!(r.top().unwrap().class_id, 3);
  }

  #[test]
  fn top_of_empty_is_none() {
    assert!(DetectResult::default().top().is_none());
  }

  #[test]
  fn class_names_fall_back_to_id() {
    let names = ClassNames::new(vec!["helmet".into(), "no-helmet".into()]);
    assert_eq!(names.name(1), "no-helmet");
    assert_eq!(names.name(7), "class_7");
  }

  #[test]
  fn class_names_from_file_skip_blank_lines() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    std::io::Write::write_all(&mut file, b"helmet\n\n  no-helmet  \n").unwrap();
    let names = ClassNames::from_file(file.path()).unwrap();
    assert_eq!(names.len(), 2);
    assert_eq!(names.name(1), "no-helmet");
  }
}
