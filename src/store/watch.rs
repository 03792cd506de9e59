// 该文件是 Xunshi （巡视） 项目的一部分。
// src/store/watch.rs - 集合变更监听
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

//! 轮询集合并与上一次快照比较，生成 ADDED / MODIFIED / REMOVED 变更。
//!
//! 第一次轮询结果总会作为初始快照投递（即使为空），之后只投递非空的变更批次。
//! 所有批次都在同一个后台线程中按顺序投递。

use std::{
  collections::HashMap,
  sync::{
    Arc,
    mpsc::{self, RecvTimeoutError},
  },
  thread,
  time::Duration,
};

use tracing::{debug, info, warn};

use crate::{
  listener::{ChangeHandler, ChangeKind, DocumentChange, EventSource, Subscription},
  report::Report,
  store::{Document, StoreError},
};

/// 列出集合中的全部文档
pub trait CollectionLister: Send + Sync + 'static {
  fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError>;
}

type Snapshot = HashMap<String, Option<String>>;

/// 比较快照；`previous` 为空表示初始快照，全部视为新增
pub fn diff_snapshot(
  previous: Option<&Snapshot>,
  documents: &[Document],
) -> (Vec<DocumentChange>, Snapshot) {
  let mut changes = Vec::new();
  let mut current = Snapshot::with_capacity(documents.len());

  for doc in documents {
    let id = doc.id().to_string();
    let kind = match previous.map(|prev| prev.get(&id)) {
      None | Some(None) => Some(ChangeKind::Added),
      Some(Some(update_time)) if *update_time != doc.update_time => Some(ChangeKind::Modified),
      Some(Some(_)) => None,
    };
    if let Some(kind) = kind {
      changes.push(DocumentChange {
        kind,
        report: Report::from(doc),
      });
    }
    current.insert(id, doc.update_time.clone());
  }

  if let Some(prev) = previous {
    let mut removed: Vec<&String> = prev.keys().filter(|id| !current.contains_key(*id)).collect();
    removed.sort();
    for id in removed {
      changes.push(DocumentChange {
        kind: ChangeKind::Removed,
        report: Report {
          id: id.clone(),
          ..Report::default()
        },
      });
    }
  }

  (changes, current)
}

pub struct CollectionWatcher<L> {
  lister: Arc<L>,
  collection: String,
  interval: Duration,
}

impl<L: CollectionLister> CollectionWatcher<L> {
  pub fn new(lister: Arc<L>, collection: impl Into<String>, interval: Duration) -> Self {
    Self {
      lister,
      collection: collection.into(),
      interval,
    }
  }
}

impl<L: CollectionLister> EventSource for CollectionWatcher<L> {
  type Error = std::io::Error;

  fn subscribe(&self, mut handler: ChangeHandler) -> Result<Subscription, Self::Error> {
    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    let lister = Arc::clone(&self.lister);
    let collection = self.collection.clone();
    let interval = self.interval;

    let handle = thread::Builder::new()
      .name(format!("watch-{}", collection))
      .spawn(move || {
        info!("开始监听集合: {}", collection);
        let mut known: Option<Snapshot> = None;

        loop {
          match lister.list(&collection) {
            Ok(documents) => {
              let initial = known.is_none();
              let (changes, snapshot) = diff_snapshot(known.as_ref(), &documents);
              known = Some(snapshot);
              if initial || !changes.is_empty() {
                debug!("集合 {} 投递 {} 条变更", collection, changes.len());
                handler(&changes);
              }
            }
            Err(e) => warn!("读取集合 {} 失败: {}", collection, e),
          }

          match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
          }
        }

        info!("停止监听集合: {}", collection);
      })?;

    Ok(Subscription::new(stop_tx, handle))
  }
}
