// 该文件是 Holistic Status （体态检测演示） 项目的一部分。
// src/input.rs - 视频/图像输入
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

use std::fmt::Display;

use thiserror::Error;
use tracing::{error, warn};

#[allow(unused_imports)]
use crate::{FromUrl, FromUrlWithScheme, frame::RgbNhwcFrame};

/// 连续采集失败超过该次数时视为设备不可用
pub(crate) const MAX_CONSECUTIVE_FAILURES: usize = 30;

/// 单次采集的结果
pub(crate) enum Capture<T, E> {
  Frame(T),
  /// 本帧损坏或读取失败，可以继续读取下一帧
  Skip(E),
  /// 输入已结束
  End,
}

/// 读取下一帧，跳过损坏的帧
///
/// 只有输入结束或连续失败 `limit` 次时返回 `None`。
#[cfg_attr(
  not(any(feature = "v4l2_input", feature = "gstreamer_input")),
  allow(dead_code)
)]
pub(crate) fn next_with_retry<T, E: Display>(
  limit: usize,
  mut capture: impl FnMut() -> Capture<T, E>,
) -> Option<T> {
  for attempt in 1..=limit {
    match capture() {
      Capture::Frame(frame) => return Some(frame),
      Capture::End => return None,
      Capture::Skip(e) => warn!("忽略无效帧 ({}/{}): {}", attempt, limit, e),
    }
  }
  error!("连续 {} 次采集失败，停止读取", limit);
  None
}

pub trait AsNhwcFrame<const W: u32, const H: u32> {
  fn as_nhwc(&self) -> &[u8];
}

#[cfg(feature = "read_image_file")]
mod read_image_file;
#[cfg(feature = "read_image_file")]
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

#[cfg(feature = "v4l2_input")]
mod v4l2_input;
#[cfg(feature = "v4l2_input")]
pub use self::v4l2_input::{V4l2Input, V4l2InputError};

#[cfg(feature = "gstreamer_input")]
mod gstreamer_input;
#[cfg(feature = "gstreamer_input")]
pub use self::gstreamer_input::{
  GStreamerInput, GStreamerInputError, GStreamerInputPipelineBuilder,
};

#[derive(Error, Debug)]
pub enum InputError {
  #[cfg(feature = "read_image_file")]
  #[error("Image file input error: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[cfg(feature = "v4l2_input")]
  #[error("V4L2 input error: {0}")]
  V4l2InputError(#[from] V4l2InputError),
  #[cfg(feature = "gstreamer_input")]
  #[error("GStreamer input error: {0}")]
  GStreamerInputError(#[from] GStreamerInputError),
  #[error("URI scheme mismatch: {0}")]
  SchemeMismatch(String),
}

/// 按 URL 方案选择的帧来源
pub enum InputWrapper<const W: u32, const H: u32> {
  #[cfg(feature = "read_image_file")]
  ReadImageFile(ImageFileInput<W, H>),
  #[cfg(feature = "v4l2_input")]
  V4l2Input(V4l2Input<W, H>),
  #[cfg(feature = "gstreamer_input")]
  GStreamerInput(GStreamerInput<W, H>),
}

impl<const W: u32, const H: u32> FromUrl for InputWrapper<W, H> {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "read_image_file")]
    if url.scheme() == ImageFileInput::<W, H>::SCHEME {
      let input = ImageFileInput::from_url(url)?;
      return Ok(InputWrapper::ReadImageFile(input));
    }
    #[cfg(feature = "v4l2_input")]
    if url.scheme() == V4l2Input::<W, H>::SCHEME {
      let input = V4l2Input::from_url(url)?;
      return Ok(InputWrapper::V4l2Input(input));
    }
    #[cfg(feature = "gstreamer_input")]
    if url.scheme() == GStreamerInputPipelineBuilder::<W, H>::SCHEME {
      let input = GStreamerInputPipelineBuilder::from_url(url)?.build()?;
      return Ok(InputWrapper::GStreamerInput(input));
    }
    Err(InputError::SchemeMismatch(url.scheme().to_string()))
  }
}

impl<const W: u32, const H: u32> Iterator for InputWrapper<W, H> {
  type Item = RgbNhwcFrame<W, H>;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(input) => input.next(),
      #[cfg(feature = "v4l2_input")]
      InputWrapper::V4l2Input(input) => input.next(),
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::GStreamerInput(input) => input.next(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unknown_scheme_is_rejected() {
    let url = url::Url::parse("rtmp://example/stream").unwrap();
    let err = InputWrapper::<64, 48>::from_url(&url).err().unwrap();
    assert!(matches!(err, InputError::SchemeMismatch(ref s) if s == "rtmp"));
  }

  fn scripted(
    mut script: Vec<Capture<u32, &'static str>>,
  ) -> impl FnMut() -> Capture<u32, &'static str> {
    script.reverse();
    move || script.pop().unwrap_or(Capture::End)
  }

  #[test]
  fn failed_frame_is_skipped_and_next_one_returned() {
    let capture = scripted(vec![Capture::Skip("short buffer"), Capture::Frame(7)]);
    assert_eq!(next_with_retry(MAX_CONSECUTIVE_FAILURES, capture), Some(7));
  }

  #[test]
  fn end_of_stream_stops_immediately() {
    let mut calls = 0;
    let result = next_with_retry(MAX_CONSECUTIVE_FAILURES, || {
      calls += 1;
      Capture::<u32, &str>::End
    });
    assert_eq!(result, None);
    assert_eq!(calls, 1);
  }

  #[test]
  fn persistent_failures_give_up_after_limit() {
    let mut calls = 0;
    let result = next_with_retry(3, || {
      calls += 1;
      Capture::<u32, _>::Skip("EIO")
    });
    assert_eq!(result, None);
    assert_eq!(calls, 3);
  }
}
