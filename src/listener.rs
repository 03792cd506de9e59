// 该文件是 Xunshi （巡视） 项目的一部分。
// src/listener.rs - 上报变更监听
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

use std::{sync::mpsc::Sender, thread::JoinHandle};

use tracing::{debug, error, info};

use crate::report::Report;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
  Added,
  Modified,
  Removed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChange {
  pub kind: ChangeKind,
  pub report: Report,
}

/// 变更批次回调，由事件源的后台线程调用
pub type ChangeHandler = Box<dyn FnMut(&[DocumentChange]) + Send + 'static>;

pub trait EventSource {
  type Error;
  fn subscribe(&self, handler: ChangeHandler) -> Result<Subscription, Self::Error>;
}

/// 订阅句柄；取消后不再投递新批次，正在处理的批次会执行完毕
pub struct Subscription {
  stop: Option<Sender<()>>,
  handle: Option<JoinHandle<()>>,
}

impl Subscription {
  pub fn new(stop: Sender<()>, handle: JoinHandle<()>) -> Self {
    Self {
      stop: Some(stop),
      handle: Some(handle),
    }
  }

  pub fn unsubscribe(mut self) {
    self.cancel();
  }

  fn cancel(&mut self) {
    if let Some(stop) = self.stop.take() {
      let _ = stop.send(());
    }
    if let Some(handle) = self.handle.take()
      && handle.join().is_err()
    {
      error!("监听线程异常退出");
    }
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    self.cancel();
  }
}

/// 处理单条新上报
#[cfg_attr(test, mockall::automock)]
pub trait ReportHandler: Send {
  fn handle_report(&self, image_url: &str, report_id: &str);
}

pub struct ChangeListener<H> {
  handler: H,
  has_seen_initial_snapshot: bool,
}

impl<H: ReportHandler> ChangeListener<H> {
  pub fn new(handler: H) -> Self {
    Self {
      handler,
      has_seen_initial_snapshot: false,
    }
  }

  /// 处理一个变更批次，返回触发处理的上报数量。
  /// 第一个批次是订阅建立时的全量快照，直接跳过。
  pub fn on_snapshot(&mut self, changes: &[DocumentChange]) -> usize {
    if !self.has_seen_initial_snapshot {
      self.has_seen_initial_snapshot = true;
      debug!("跳过初始快照 ({} 条)", changes.len());
      return 0;
    }

    let mut dispatched = 0;
    for change in changes {
      if change.kind != ChangeKind::Added {
        continue;
      }
      let Some(image_url) = change.report.image_url.as_deref() else {
        continue;
      };
      info!("检测到新的上报: {}", change.report.id);
      self.handler.handle_report(image_url, &change.report.id);
      dispatched += 1;
    }
    dispatched
  }

  pub fn into_handler(self) -> ChangeHandler
  where
    H: 'static,
  {
    let mut listener = self;
    Box::new(move |changes: &[DocumentChange]| {
      listener.on_snapshot(changes);
    })
  }
}
