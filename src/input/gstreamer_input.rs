// 该文件是 Holistic Status （体态检测演示） 项目的一部分。
// src/input/gstreamer_input.rs - GStreamer 输入
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

//! # GStreamer 视频输入模块
//!
//! 基于 GStreamer 管道采集视频帧，支持：
//! - 摄像头捕获（`v4l2src`）
//! - 视频文件读取（`filesrc ! decodebin`）
//!
//! ## URL 格式
//!
//! - `gst://camera/dev/video0?width=640&height=480&fps=15&rotate=90`
//! - `gst://file/path/to/video.mp4?rotate=180`
//!
//! 所有管道末端都会缩放到帧尺寸并转换为 RGB，交给 `appsink`。
//!
//! ## 系统依赖
//!
//! **Ubuntu/Debian:**
//! ```bash
//! sudo apt-get install libgstreamer1.0-dev libgstreamer-plugins-base1.0-dev
//! ```
//!
//! ## 基本用法
//!
//! ```no_run
//! use holistic_status::input::GStreamerInputPipelineBuilder;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let input = GStreamerInputPipelineBuilder::<640, 480>::new()
//!     .camera("/dev/video0", 640, 480, 30)
//!     .build()?;
//! for frame in input {
//!     println!("处理帧: {}x{}", frame.width(), frame.height());
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbNhwcFrame,
  input::{Capture, MAX_CONSECUTIVE_FAILURES, next_with_retry},
};

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use image::RgbImage;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

/// GStreamer 输入错误类型
#[derive(Error, Debug)]
pub enum GStreamerInputError {
  /// URI scheme 不匹配（期望 "gst://"）
  #[error("URI scheme mismatch")]
  SchemeMismatch,
  /// URL 主机部分既不是 camera 也不是 file
  #[error("Unknown GStreamer source kind: {0}")]
  UnknownSource(String),
  /// GStreamer 库错误
  #[error("GStreamer error: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  /// GStreamer 布尔操作错误
  #[error("GStreamer boolean error: {0}")]
  GStreamerBoolError(#[from] gst::glib::BoolError),
  /// 无法获取 appsink 元素
  #[error("Failed to get appsink element")]
  AppSinkNotFound,
  /// 无法转换元素为 appsink
  #[error("Failed to convert element to appsink")]
  AppSinkConversionFailed,
  /// 无法从 caps 获取视频信息
  #[error("Failed to get video info from caps")]
  VideoInfoError,
  /// 不支持的视频格式
  #[error("Unsupported video format")]
  UnsupportedFormat,
  /// 管道错误
  #[error("Pipeline error: {0}")]
  PipelineError(String),
  /// 缓冲区大小不匹配
  #[error("Buffer size mismatch: expected {expected} bytes, got {actual} bytes")]
  BufferSizeMismatch { expected: usize, actual: usize },
  /// 状态改变错误
  #[error("State change error: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum GStreamerInputBuilderItem {
  FileSource(String),
  CameraSource {
    camera: String,
    io_mode: Option<u32>,
    width: u32,
    height: u32,
    fps: u32,
  },
  VideoFlip {
    method: u32,
  },
  Scale {
    width: u32,
    height: u32,
  },
  TargetFormat {
    format: String,
  },
}

impl GStreamerInputBuilderItem {
  fn to_pipeline(&self) -> String {
    match self {
      GStreamerInputBuilderItem::FileSource(path) => {
        format!("filesrc location={} ! decodebin", path)
      }
      GStreamerInputBuilderItem::CameraSource {
        camera,
        io_mode,
        width,
        height,
        fps,
      } => {
        let io_mode_str = io_mode
          .map(|mode| format!(" io-mode={}", mode))
          .unwrap_or_default();
        format!(
          "v4l2src device={}{} ! video/x-raw,width={},height={},framerate={}/1 ! videoconvert",
          camera, io_mode_str, width, height, fps
        )
      }
      GStreamerInputBuilderItem::VideoFlip { method } => {
        format!("videoflip method={}", method)
      }
      GStreamerInputBuilderItem::Scale { width, height } => {
        format!("videoscale ! video/x-raw,width={},height={}", width, height)
      }
      GStreamerInputBuilderItem::TargetFormat { format } => {
        format!("videoconvert ! video/x-raw,format={}", format)
      }
    }
  }
}

/// GStreamer 输入管道构建器
pub struct GStreamerInputPipelineBuilder<const W: u32, const H: u32> {
  items: Vec<GStreamerInputBuilderItem>,
}

impl<const W: u32, const H: u32> Default for GStreamerInputPipelineBuilder<W, H> {
  fn default() -> Self {
    Self::new()
  }
}

impl<const W: u32, const H: u32> GStreamerInputPipelineBuilder<W, H> {
  pub fn new() -> Self {
    Self { items: Vec::new() }
  }

  pub fn camera(mut self, camera: &str, width: u32, height: u32, fps: u32) -> Self {
    self.items.push(GStreamerInputBuilderItem::CameraSource {
      camera: camera.to_string(),
      io_mode: None,
      width,
      height,
      fps,
    });
    self
  }

  pub fn file(mut self, path: &str) -> Self {
    self
      .items
      .push(GStreamerInputBuilderItem::FileSource(path.to_string()));
    self
  }

  pub fn rotate(mut self, rotate: Option<&str>) -> Self {
    if let Some(flip) = Self::video_flip(rotate) {
      self.items.push(flip);
    }
    self
  }

  fn build_camera_pipeline(path: &str, query: &HashMap<String, String>) -> Self {
    let parse = |key: &str| query.get(key).and_then(|v| v.parse::<u32>().ok());

    let mut builder = Self::new();
    builder.items.push(GStreamerInputBuilderItem::CameraSource {
      camera: path.to_string(),
      io_mode: parse("io-mode"),
      width: parse("width").unwrap_or(W),
      height: parse("height").unwrap_or(H),
      fps: parse("fps").unwrap_or(15),
    });
    builder.rotate(query.get("rotate").map(String::as_str))
  }

  fn build_file_pipeline(path: &str, query: &HashMap<String, String>) -> Self {
    Self::new()
      .file(path)
      .rotate(query.get("rotate").map(String::as_str))
  }

  fn video_flip(rotate: Option<&str>) -> Option<GStreamerInputBuilderItem> {
    let method = match rotate? {
      "90" => 1,
      "180" => 2,
      "270" => 3,
      _ => return None,
    };
    Some(GStreamerInputBuilderItem::VideoFlip { method })
  }

  /// 生成完整管道描述，末端固定为缩放、RGB 转换与 appsink
  pub fn pipeline_description(&self) -> String {
    let tail = [
      GStreamerInputBuilderItem::Scale {
        width: W,
        height: H,
      },
      GStreamerInputBuilderItem::TargetFormat {
        format: "RGB".to_string(),
      },
    ];
    let basic_pipeline = self
      .items
      .iter()
      .chain(tail.iter())
      .map(GStreamerInputBuilderItem::to_pipeline)
      .collect::<Vec<String>>()
      .join(" ! ");
    format!(
      "{} ! appsink max-buffers=2 drop=true name=sink",
      basic_pipeline
    )
  }

  pub fn build(self) -> Result<GStreamerInput<W, H>, GStreamerInputError> {
    gst::init()?;

    let full_pipeline = self.pipeline_description();
    info!("GStreamer pipeline description: {}", full_pipeline);

    let pipeline = gst::parse::launch(&full_pipeline)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| GStreamerInputError::PipelineError("Failed to create pipeline".to_string()))?;

    let appsink = pipeline
      .by_name("sink")
      .ok_or(GStreamerInputError::AppSinkNotFound)?
      .downcast::<gst_app::AppSink>()
      .map_err(|_| GStreamerInputError::AppSinkConversionFailed)?;

    pipeline.set_state(gst::State::Playing)?;

    Ok(GStreamerInput { pipeline, appsink })
  }
}

impl<const W: u32, const H: u32> FromUrlWithScheme for GStreamerInputPipelineBuilder<W, H> {
  const SCHEME: &'static str = "gst";
}

impl<const W: u32, const H: u32> FromUrl for GStreamerInputPipelineBuilder<W, H> {
  type Error = GStreamerInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(GStreamerInputError::SchemeMismatch);
    }

    let query: HashMap<String, String> = url
      .query_pairs()
      .map(|(k, v)| (String::from(k), String::from(v)))
      .collect();

    match url.host_str() {
      Some("camera") => Ok(Self::build_camera_pipeline(url.path(), &query)),
      Some("file") => Ok(Self::build_file_pipeline(url.path(), &query)),
      other => Err(GStreamerInputError::UnknownSource(
        other.unwrap_or_default().to_string(),
      )),
    }
  }
}

/// GStreamer 视频输入
///
/// 持有管道与 appsink；析构时将管道置为 `Null` 以释放摄像头或文件句柄。
pub struct GStreamerInput<const W: u32, const H: u32> {
  pipeline: gst::Pipeline,
  appsink: gst_app::AppSink,
}

impl<const W: u32, const H: u32> Drop for GStreamerInput<W, H> {
  fn drop(&mut self) {
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("Failed to stop GStreamer pipeline: {}", e);
    }
  }
}

impl<const W: u32, const H: u32> GStreamerInput<W, H> {
  fn capture(&self) -> Capture<RgbNhwcFrame<W, H>, GStreamerInputError> {
    let sample = match self.appsink.pull_sample() {
      Ok(sample) => sample,
      Err(_) if self.appsink.is_eos() => {
        info!("GStreamer 输入结束");
        return Capture::End;
      }
      Err(e) => {
        return Capture::Skip(GStreamerInputError::PipelineError(format!(
          "Failed to pull sample: {}",
          e
        )));
      }
    };
    capture_from_sample(convert_sample_to_nhwc(sample))
  }
}

/// 转换失败的样本只跳过本帧
fn capture_from_sample<const W: u32, const H: u32>(
  converted: Result<RgbNhwcFrame<W, H>, GStreamerInputError>,
) -> Capture<RgbNhwcFrame<W, H>, GStreamerInputError> {
  match converted {
    Ok(frame) => Capture::Frame(frame),
    Err(e) => Capture::Skip(e),
  }
}

impl<const W: u32, const H: u32> Iterator for GStreamerInput<W, H> {
  type Item = RgbNhwcFrame<W, H>;

  fn next(&mut self) -> Option<Self::Item> {
    next_with_retry(MAX_CONSECUTIVE_FAILURES, || self.capture())
  }
}

fn convert_sample_to_nhwc<const W: u32, const H: u32>(
  sample: gst::Sample,
) -> Result<RgbNhwcFrame<W, H>, GStreamerInputError> {
  let buffer = sample
    .buffer()
    .ok_or_else(|| GStreamerInputError::PipelineError("No buffer in sample".to_string()))?;
  let caps = sample
    .caps()
    .ok_or_else(|| GStreamerInputError::PipelineError("No caps in sample".to_string()))?;

  let video_info =
    gst_video::VideoInfo::from_caps(caps).map_err(|_| GStreamerInputError::VideoInfoError)?;

  let width = video_info.width() as usize;
  let height = video_info.height() as usize;
  let stride = video_info.stride()[0] as usize;

  let map = buffer.map_readable().map_err(|e| {
    GStreamerInputError::PipelineError(format!("Failed to map buffer for reading: {}", e))
  })?;
  let data = map.as_slice();

  let expected_size = stride * (height.saturating_sub(1)) + width * 3;
  if data.len() < expected_size {
    return Err(GStreamerInputError::BufferSizeMismatch {
      expected: expected_size,
      actual: data.len(),
    });
  }

  // 行之间可能有对齐填充，逐行拷贝
  let mut rgb = Vec::with_capacity(width * height * 3);
  for row in data.chunks(stride).take(height) {
    let row = &row[..width * 3];
    match video_info.format() {
      gst_video::VideoFormat::Rgb => rgb.extend_from_slice(row),
      gst_video::VideoFormat::Bgr => {
        for px in row.chunks_exact(3) {
          rgb.extend_from_slice(&[px[2], px[1], px[0]]);
        }
      }
      _ => return Err(GStreamerInputError::UnsupportedFormat),
    }
  }

  if (width, height) == (W as usize, H as usize) {
    return RgbNhwcFrame::try_from(rgb)
      .map_err(|e| GStreamerInputError::PipelineError(e.to_string()));
  }

  let image = RgbImage::from_raw(width as u32, height as u32, rgb).ok_or(
    GStreamerInputError::BufferSizeMismatch {
      expected: width * height * 3,
      actual: 0,
    },
  )?;
  Ok(RgbNhwcFrame::from_rgb_image(&image))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn camera_url_builds_v4l2src_pipeline() {
    let url = Url::parse("gst://camera/dev/video2?fps=30&rotate=90&width=1280&height=720").unwrap();
    let builder = GStreamerInputPipelineBuilder::<640, 480>::from_url(&url).unwrap();
    let desc = builder.pipeline_description();
    assert!(desc.starts_with(
      "v4l2src device=/dev/video2 ! video/x-raw,width=1280,height=720,framerate=30/1"
    ));
    assert!(desc.contains("videoflip method=1"));
    assert!(desc.contains("videoscale ! video/x-raw,width=640,height=480"));
    assert!(desc.ends_with("video/x-raw,format=RGB ! appsink max-buffers=2 drop=true name=sink"));
  }

  #[test]
  fn file_url_builds_decodebin_pipeline() {
    let url = Url::parse("gst://file/tmp/clip.mp4").unwrap();
    let builder = GStreamerInputPipelineBuilder::<320, 240>::from_url(&url).unwrap();
    let desc = builder.pipeline_description();
    assert!(desc.starts_with("filesrc location=/tmp/clip.mp4 ! decodebin ! videoscale"));
    assert!(!desc.contains("videoflip"));
  }

  #[test]
  fn unknown_host_is_rejected() {
    let url = Url::parse("gst://rtsp/stream").unwrap();
    assert!(matches!(
      GStreamerInputPipelineBuilder::<320, 240>::from_url(&url),
      Err(GStreamerInputError::UnknownSource(ref s)) if s == "rtsp"
    ));
  }

  #[test]
  fn bad_sample_is_skipped_until_a_good_one_arrives() {
    let mut samples = vec![
      Ok(RgbNhwcFrame::<4, 2>::default()),
      Err(GStreamerInputError::BufferSizeMismatch {
        expected: 24,
        actual: 6,
      }),
    ];
    let frame = next_with_retry(MAX_CONSECUTIVE_FAILURES, || match samples.pop() {
      Some(converted) => capture_from_sample(converted),
      None => Capture::End,
    });
    assert!(frame.is_some());
    assert!(samples.is_empty());
  }
}
