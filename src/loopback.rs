// 该文件是 Xunshi （巡视） 项目的一部分。
// src/loopback.rs - 测试用本地 HTTP 服务
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

//! 按顺序返回预设响应，每个连接处理一个请求，并把收到的请求交给测试检查。

use std::{
  io::{BufRead, BufReader, Read, Write},
  net::TcpListener,
  sync::mpsc,
  thread,
};

use reqwest::blocking::Client;
use url::Url;

#[derive(Debug, Clone)]
pub(crate) struct Request {
  pub method: String,
  pub target: String,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
}

impl Request {
  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(key, _)| key.eq_ignore_ascii_case(name))
      .map(|(_, value)| value.as_str())
  }

  pub fn path(&self) -> &str {
    self.target.split('?').next().unwrap_or_default()
  }

  pub fn query(&self) -> Vec<(String, String)> {
    let url = Url::parse(&format!("http://loopback{}", self.target)).unwrap();
    url.query_pairs().into_owned().collect()
  }

  pub fn json(&self) -> serde_json::Value {
    serde_json::from_slice(&self.body).unwrap()
  }
}

pub(crate) struct Reply {
  status_line: &'static str,
  body: String,
}

pub(crate) fn reply(status_line: &'static str, body: impl Into<String>) -> Reply {
  Reply {
    status_line,
    body: body.into(),
  }
}

/// 启动服务，返回根地址 `http://127.0.0.1:<port>/`
pub(crate) fn serve(replies: Vec<Reply>) -> (Url, mpsc::Receiver<Request>) {
  let listener = TcpListener::bind("127.0.0.1:0").unwrap();
  let addr = listener.local_addr().unwrap();
  let (tx, rx) = mpsc::channel();

  thread::spawn(move || {
    for reply in replies {
      let Ok((mut stream, _)) = listener.accept() else {
        return;
      };
      let mut reader = BufReader::new(stream.try_clone().unwrap());

      let mut request_line = String::new();
      reader.read_line(&mut request_line).unwrap();
      let mut parts = request_line.split_whitespace();
      let method = parts.next().unwrap_or_default().to_string();
      let target = parts.next().unwrap_or_default().to_string();

      let mut headers = Vec::new();
      loop {
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        let line = line.trim_end();
        if line.is_empty() {
          break;
        }
        if let Some((key, value)) = line.split_once(':') {
          headers.push((key.trim().to_string(), value.trim().to_string()));
        }
      }

      let length = headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.parse::<usize>().ok())
        .unwrap_or(0);
      let mut body = vec![0; length];
      reader.read_exact(&mut body).unwrap();

      let response = format!(
        "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        reply.status_line,
        reply.body.len(),
        reply.body
      );
      stream.write_all(response.as_bytes()).unwrap();
      let _ = tx.send(Request {
        method,
        target,
        headers,
        body,
      });
    }
  });

  let url = Url::parse(&format!("http://{}/", addr)).unwrap();
  (url, rx)
}

/// 不经过系统代理的客户端
pub(crate) fn client() -> Client {
  Client::builder().no_proxy().build().unwrap()
}
