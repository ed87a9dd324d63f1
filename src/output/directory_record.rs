// 该文件是 Holistic Status （体态检测演示） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

//! 按日期目录记录帧：`folder:///data/record?always&record`
//!
//! 目录结构为 `YYYY/MM/DD/HH-MM-SS-XXXX.png`。带 `record` 参数时保存原始帧，
//! 并在同名 `.json` 文件中写入部位状态；否则保存绘制了标注的帧。
//! 不带 `always` 时，没有任何部位被检测到的帧不会落盘。

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Datelike, Utc};
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbNhwcFrame,
  output::{
    Annotated, Render,
    draw::{Draw, DrawError},
  },
  query_flag,
  region::RegionStatus,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("绘制配置错误: {0}")]
  DrawError(#[from] DrawError),
}

/// 部位状态记录，写入与图像同名的 `.json` 文件
pub struct Record;

impl Record {
  pub fn record(
    &self,
    status: &RegionStatus,
    path: &Path,
  ) -> Result<(), DirectoryRecordOutputError> {
    let json = serde_json::to_string_pretty(status)?;
    std::fs::write(path.with_extension("json"), json)?;
    Ok(())
  }
}

pub enum DrawWrapper {
  Draw(Box<Draw>),
  Record(Record),
}

impl DrawWrapper {
  pub fn save_result<const W: u32, const H: u32>(
    &self,
    path: &Path,
    frame: &RgbNhwcFrame<W, H>,
    result: &Annotated,
  ) -> Result<(), DirectoryRecordOutputError> {
    match self {
      DrawWrapper::Draw(draw) => {
        draw.draw_frame(frame, result).save(path)?;
      }
      DrawWrapper::Record(record) => {
        frame.to_rgb_image().save(path)?;
        record.record(&result.status, path)?;
      }
    };

    Ok(())
  }
}

pub struct DirectoryRecordOutput<const W: u32, const H: u32> {
  directory: PathBuf,
  draw: DrawWrapper,
  frame_counter: Mutex<u16>,
  always: bool,
}

impl<const W: u32, const H: u32> FromUrlWithScheme for DirectoryRecordOutput<W, H> {
  const SCHEME: &'static str = "folder";
}

impl<const W: u32, const H: u32> FromUrl for DirectoryRecordOutput<W, H> {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let draw = if query_flag(uri, "record") {
      DrawWrapper::Record(Record)
    } else {
      DrawWrapper::Draw(Box::new(Draw::from_url(uri)?))
    };

    Ok(DirectoryRecordOutput::new(
      PathBuf::from(uri.path()),
      draw,
      query_flag(uri, "always"),
    ))
  }
}

impl<const W: u32, const H: u32> DirectoryRecordOutput<W, H> {
  pub fn new(directory: PathBuf, draw: DrawWrapper, always: bool) -> Self {
    Self {
      directory,
      draw,
      frame_counter: Mutex::new(0),
      always,
    }
  }

  fn frame_id(&self) -> u16 {
    let mut counter = self
      .frame_counter
      .lock()
      .unwrap_or_else(PoisonError::into_inner);
    *counter = counter.wrapping_add(1);
    *counter
  }

  fn frame_path(&self, now: DateTime<Utc>) -> Result<PathBuf, DirectoryRecordOutputError> {
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }
}

impl<const W: u32, const H: u32> Render<RgbNhwcFrame<W, H>, Annotated>
  for DirectoryRecordOutput<W, H>
{
  type Error = DirectoryRecordOutputError;

  fn render_result(
    &self,
    frame: &RgbNhwcFrame<W, H>,
    result: &Annotated,
  ) -> Result<(), Self::Error> {
    if !self.always && !result.status.any_detected() {
      debug!("未检测到任何部位，跳过记录");
      return Ok(());
    }
    let path = self.frame_path(Utc::now())?;
    self.draw.save_result(&path, frame, result)
  }
}
