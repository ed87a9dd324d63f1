// 该文件是 Holistic Status （体态检测演示） 项目的一部分。
// src/output/gstreamer_video_output.rs - GStreamer 窗口/视频文件输出
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

//! # GStreamer 视频输出模块
//!
//! 将标注后的帧推送到 GStreamer 管道：
//!
//! - `gst://display` - 在桌面窗口中实时显示（`autovideosink`）
//! - `gst:///output.mp4?fps=30` - 编码保存为视频文件
//!
//! ## 支持的文件格式
//!
//! - **MP4** (H.264)
//! - **MKV** (Matroska)
//! - **AVI**
//! - **WebM** (VP8)
//!
//! 未识别的扩展名按 MP4 处理。所有 URL 都可以附加 `font=/path/to/font.ttf`。

use std::sync::{Mutex, PoisonError};

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbNhwcFrame,
  output::{
    Annotated, Render,
    draw::{Draw, DrawError},
  },
  query_value,
};

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

/// GStreamer 视频输出错误类型
#[derive(Error, Debug)]
pub enum GStreamerVideoOutputError {
  /// URI scheme 不匹配
  #[error("URI scheme mismatch")]
  SchemeMismatch,
  /// GStreamer 库错误
  #[error("GStreamer error: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  /// GStreamer 布尔操作错误
  #[error("GStreamer boolean error: {0}")]
  GStreamerBoolError(#[from] gst::glib::BoolError),
  /// 无法获取 appsrc 元素
  #[error("Failed to get appsrc element")]
  AppSrcNotFound,
  /// 无法转换元素为 appsrc
  #[error("Failed to convert element to appsrc")]
  AppSrcConversionFailed,
  /// 管道错误
  #[error("Pipeline error: {0}")]
  PipelineError(String),
  /// 状态改变错误
  #[error("State change error: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
  /// 缓冲区创建错误
  #[error("Buffer creation error")]
  BufferCreationError,
  /// 绘制配置错误
  #[error("Draw error: {0}")]
  DrawError(#[from] DrawError),
}

/// 根据目标生成 appsrc 之后的管道描述
pub(crate) fn sink_pipeline(host: Option<&str>, file_path: &str) -> String {
  if host == Some("display") {
    return "appsrc name=src ! videoconvert ! autovideosink sync=false".to_string();
  }

  let encoder = if file_path.ends_with(".mkv") {
    "videoconvert ! video/x-raw,format=I420 ! x264enc speed-preset=fast ! h264parse ! matroskamux"
  } else if file_path.ends_with(".avi") {
    "videoconvert ! video/x-raw,format=I420 ! x264enc ! avimux"
  } else if file_path.ends_with(".webm") {
    "videoconvert ! vp8enc ! webmmux"
  } else {
    "videoconvert ! video/x-raw,format=I420 ! x264enc speed-preset=fast tune=zerolatency ! h264parse ! mp4mux"
  };
  format!(
    "appsrc name=src ! {} ! filesink location={}",
    encoder, file_path
  )
}

/// GStreamer 视频输出
///
/// 析构时发送 EOS 并将管道置为 `Null`，保证视频文件完整、显示窗口关闭。
pub struct GStreamerVideoOutput<const W: u32, const H: u32> {
  pipeline: gst::Pipeline,
  appsrc: gst_app::AppSrc,
  fps: i32,
  frame_count: Mutex<u64>,
  draw: Draw,
}

impl<const W: u32, const H: u32> FromUrlWithScheme for GStreamerVideoOutput<W, H> {
  const SCHEME: &'static str = "gst";
}

impl<const W: u32, const H: u32> FromUrl for GStreamerVideoOutput<W, H> {
  type Error = GStreamerVideoOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(GStreamerVideoOutputError::SchemeMismatch);
    }

    let draw = Draw::from_url(url)?;

    // Initialize GStreamer (subsequent calls are safe no-ops)
    gst::init()?;

    let fps: i32 = query_value(url, "fps")
      .and_then(|v| v.parse().ok())
      .unwrap_or(30);

    let pipeline_desc = sink_pipeline(url.host_str(), url.path());
    info!("Creating video output pipeline: {}", pipeline_desc);

    let pipeline = gst::parse::launch(&pipeline_desc)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| {
        GStreamerVideoOutputError::PipelineError("Failed to create pipeline".to_string())
      })?;

    let appsrc = pipeline
      .by_name("src")
      .ok_or(GStreamerVideoOutputError::AppSrcNotFound)?
      .downcast::<gst_app::AppSrc>()
      .map_err(|_| GStreamerVideoOutputError::AppSrcConversionFailed)?;

    let caps = gst::Caps::builder("video/x-raw")
      .field("format", "RGB")
      .field("width", W as i32)
      .field("height", H as i32)
      .field("framerate", gst::Fraction::new(fps, 1))
      .build();

    appsrc.set_caps(Some(&caps));
    appsrc.set_format(gst::Format::Time);

    pipeline.set_state(gst::State::Playing)?;

    info!("Video output initialized: {}x{} @ {} fps -> {}", W, H, fps, url);

    Ok(GStreamerVideoOutput {
      pipeline,
      appsrc,
      fps,
      frame_count: Mutex::new(0),
      draw,
    })
  }
}

impl<const W: u32, const H: u32> Drop for GStreamerVideoOutput<W, H> {
  fn drop(&mut self) {
    // Send EOS to properly close the file
    let _ = self.appsrc.end_of_stream();

    if let Some(bus) = self.pipeline.bus() {
      let _ = bus.timed_pop_filtered(
        gst::ClockTime::from_seconds(2),
        &[gst::MessageType::Eos, gst::MessageType::Error],
      );
    }

    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("Failed to stop GStreamer video output pipeline: {}", e);
    }

    let frame_count = self.frame_count.lock().unwrap_or_else(PoisonError::into_inner);
    info!("Video output closed. Total frames written: {}", *frame_count);
  }
}

impl<const W: u32, const H: u32> GStreamerVideoOutput<W, H> {
  fn push_frame(&self, data: &[u8]) -> Result<(), GStreamerVideoOutputError> {
    let mut buffer = gst::Buffer::from_mut_slice(data.to_vec());

    let mut frame_count = self.frame_count.lock().unwrap_or_else(PoisonError::into_inner);
    let timestamp = (*frame_count * 1_000_000_000) / (self.fps as u64);
    *frame_count += 1;

    {
      let buffer_ref = buffer
        .get_mut()
        .ok_or(GStreamerVideoOutputError::BufferCreationError)?;
      buffer_ref.set_pts(gst::ClockTime::from_nseconds(timestamp));
      buffer_ref.set_duration(gst::ClockTime::from_nseconds(
        1_000_000_000 / self.fps as u64,
      ));
    }

    self.appsrc.push_buffer(buffer).map_err(|e| {
      GStreamerVideoOutputError::PipelineError(format!("Failed to push buffer: {:?}", e))
    })?;

    Ok(())
  }
}

impl<const W: u32, const H: u32> Render<RgbNhwcFrame<W, H>, Annotated>
  for GStreamerVideoOutput<W, H>
{
  type Error = GStreamerVideoOutputError;

  fn render_result(
    &self,
    frame: &RgbNhwcFrame<W, H>,
    result: &Annotated,
  ) -> Result<(), Self::Error> {
    let image = self.draw.draw_frame(frame, result);
    self.push_frame(image.as_raw())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn display_host_uses_window_sink() {
    let desc = sink_pipeline(Some("display"), "");
    assert!(desc.ends_with("autovideosink sync=false"));
  }

  #[test]
  fn file_extension_selects_muxer() {
    assert!(
      sink_pipeline(None, "/tmp/a.mkv").contains("matroskamux ! filesink location=/tmp/a.mkv")
    );
    assert!(sink_pipeline(None, "/tmp/a.webm").contains("vp8enc ! webmmux"));
    assert!(sink_pipeline(None, "/tmp/a.avi").contains("avimux"));
    assert!(sink_pipeline(None, "/tmp/a.mov").contains("mp4mux ! filesink location=/tmp/a.mov"));
  }
}
