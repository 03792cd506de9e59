// 该文件是 Xunshi （巡视） 项目的一部分。
// src/task.rs - 监听任务
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

use std::{
  sync::mpsc::{self, Receiver, RecvTimeoutError},
  thread,
  time::Duration,
};
use tracing::{info, warn};

use crate::listener::{ChangeListener, EventSource, ReportHandler};

const IDLE_INTERVAL: Duration = Duration::from_secs(3600);
const FORCE_EXIT_AFTER: Duration = Duration::from_secs(30);

pub trait Task<S, H>: Sized {
  type Error;
  fn run_task(self, source: S, handler: H) -> Result<(), Self::Error>;
}

/// 订阅上报集合，主线程空闲等待直到收到中断信号
#[derive(Debug)]
pub struct WatchTask {
  idle: Duration,
}

impl Default for WatchTask {
  fn default() -> Self {
    Self {
      idle: IDLE_INTERVAL,
    }
  }
}

impl WatchTask {
  pub fn with_idle(mut self, idle: Duration) -> Self {
    self.idle = idle;
    self
  }

  /// 运行直到 `shutdown` 收到信号或发送端全部关闭
  pub fn run_until<S, H>(self, source: S, handler: H, shutdown: Receiver<()>) -> anyhow::Result<()>
  where
    S: EventSource,
    S::Error: std::error::Error + Send + Sync + 'static,
    H: ReportHandler + 'static,
  {
    let listener = ChangeListener::new(handler);
    let subscription = source.subscribe(listener.into_handler())?;
    info!("实时监听已启动 (退出: Ctrl+C)");

    loop {
      match shutdown.recv_timeout(self.idle) {
        Err(RecvTimeoutError::Timeout) => continue,
        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
      }
    }

    subscription.unsubscribe();
    info!("实时监听已停止");
    Ok(())
  }
}

impl<S, H> Task<S, H> for WatchTask
where
  S: EventSource,
  S::Error: std::error::Error + Send + Sync + 'static,
  H: ReportHandler + 'static,
{
  type Error = anyhow::Error;

  fn run_task(self, source: S, handler: H) -> Result<(), Self::Error> {
    let (tx, rx) = mpsc::channel();

    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(FORCE_EXIT_AFTER);
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })?;

    self.run_until(source, handler, rx)
  }
}
