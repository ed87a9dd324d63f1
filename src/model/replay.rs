// 该文件是 Holistic Status （体态检测演示） 项目的一部分。
// src/model/replay.rs - 关键点结果回放
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

//! 回放预先记录的全身关键点结果。
//!
//! 文件为 JSON Lines，每行一个 [`FrameResult`]，按帧顺序依次取出：
//!
//! ```text
//! {"pose":[{"x":0.5,"y":0.4,"z":0.0,"visibility":0.98}, ...],"right_hand":null}
//! {}
//! ```
//!
//! URL 形如 `replay:///path/results.jsonl?loop`，带 `loop` 时读完后从头开始，
//! 否则之后的每一帧都视为什么都没有检测到。

use std::{
  marker::PhantomData,
  path::Path,
  sync::{Mutex, PoisonError},
};

use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, landmark::FrameResult, model::Model, query_flag};

#[derive(Error, Debug)]
pub enum ReplayError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("读取回放文件失败: {0}")]
  IoError(#[from] std::io::Error),
  #[error("回放文件第 {line} 行解析失败: {source}")]
  ParseError {
    line: usize,
    #[source]
    source: serde_json::Error,
  },
}

#[derive(Debug, Default)]
struct Cursor {
  next: usize,
  exhausted: bool,
}

pub struct Replay<Frame> {
  results: Vec<FrameResult>,
  looping: bool,
  cursor: Mutex<Cursor>,
  _phantom: PhantomData<Frame>,
}

impl<Frame> FromUrlWithScheme for Replay<Frame> {
  const SCHEME: &'static str = "replay";
}

impl<Frame> FromUrl for Replay<Frame> {
  type Error = ReplayError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ReplayError::SchemeMismatch);
    }
    let replay = Self::open(url.path())?;
    Ok(replay.looping(query_flag(url, "loop")))
  }
}

impl<Frame> Replay<Frame> {
  pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ReplayError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let replay = Self::parse(&content)?;
    info!(
      "加载回放文件: {} ({} 帧)",
      path.display(),
      replay.results.len()
    );
    Ok(replay)
  }

  /// 解析 JSON Lines 文本，空行跳过
  pub fn parse(content: &str) -> Result<Self, ReplayError> {
    let results = content
      .lines()
      .enumerate()
      .filter(|(_, line)| !line.trim().is_empty())
      .map(|(index, line)| {
        serde_json::from_str::<FrameResult>(line).map_err(|source| ReplayError::ParseError {
          line: index + 1,
          source,
        })
      })
      .collect::<Result<Vec<_>, _>>()?;

    Ok(Self {
      results,
      looping: false,
      cursor: Mutex::new(Cursor::default()),
      _phantom: PhantomData,
    })
  }

  pub fn looping(mut self, looping: bool) -> Self {
    self.looping = looping;
    self
  }

  pub fn len(&self) -> usize {
    self.results.len()
  }

  pub fn is_empty(&self) -> bool {
    self.results.is_empty()
  }

  fn next_result(&self) -> FrameResult {
    let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);

    if cursor.next >= self.results.len() {
      if self.looping && !self.results.is_empty() {
        debug!("回放文件读取完毕，从头开始");
        cursor.next = 0;
      } else {
        if !cursor.exhausted {
          warn!("回放文件已读取完毕，后续帧视为未检测到");
          cursor.exhausted = true;
        }
        return FrameResult::empty();
      }
    }

    let result = self.results[cursor.next].clone();
    cursor.next += 1;
    result
  }
}

impl<Frame> Model for Replay<Frame> {
  type Input = Frame;
  type Output = FrameResult;
  type Error = ReplayError;

  fn infer(&self, _input: &Frame) -> Result<FrameResult, ReplayError> {
    Ok(self.next_result())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  const TWO_FRAMES: &str = r#"{"face":[{"x":0.1,"y":0.2}]}

{"left_hand":[{"x":0.3,"y":0.4,"z":0.0,"visibility":0.0}]}
"#;

  #[test]
  fn plays_frames_in_order_then_nothing() {
    let replay = Replay::<()>::parse(TWO_FRAMES).unwrap();
    assert_eq!(replay.len(), 2);
    assert!(replay.infer(&()).unwrap().face.is_some());
    assert!(replay.infer(&()).unwrap().left_hand.is_some());
    assert_eq!(replay.infer(&()).unwrap(), FrameResult::empty());
    assert_eq!(replay.infer(&()).unwrap(), FrameResult::empty());
  }

  #[test]
  fn looping_wraps_around() {
    let replay = Replay::<()>::parse(TWO_FRAMES).unwrap().looping(true);
    for _ in 0..2 {
      assert!(replay.infer(&()).unwrap().face.is_some());
      assert!(replay.infer(&()).unwrap().left_hand.is_some());
    }
  }

  #[test]
  fn empty_looping_replay_yields_empty_results() {
    let replay = Replay::<()>::parse("\n\n").unwrap().looping(true);
    assert!(replay.is_empty());
    assert_eq!(replay.infer(&()).unwrap(), FrameResult::empty());
  }

  #[test]
  fn reports_the_bad_line_number() {
    let err = Replay::<()>::parse("{}\n\n{not json}\n").err().unwrap();
    assert!(matches!(err, ReplayError::ParseError { line: 3, .. }));
  }

  #[test]
  fn loads_from_url() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(TWO_FRAMES.as_bytes()).unwrap();
    let url = Url::from_file_path(file.path()).unwrap();
    let url = Url::parse(&format!("replay://{}?loop", url.path())).unwrap();

    let replay = Replay::<()>::from_url(&url).unwrap();
    assert_eq!(replay.len(), 2);
    assert!(replay.looping);
  }
}
