// 该文件是 Holistic Status （体态检测演示） 项目的一部分。
// src/input/v4l2_input.rs - V4L2 摄像头输入
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

//! V4L2 摄像头直接采集，URL 形如 `v4l2:///dev/video0?width=640&height=480`。
//! 设备以 YUYV 格式输出，转换为 RGB 后缩放到帧尺寸。

use image::RgbImage;
use thiserror::Error;
use tracing::{error, info};
use url::Url;
use v4l::FourCC;
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbNhwcFrame,
  input::{Capture, MAX_CONSECUTIVE_FAILURES, next_with_retry},
  query_value,
};

const DEFAULT_DEVICE: &str = "/dev/video0";
const CAPTURE_BUFFERS: u32 = 4;

#[derive(Error, Debug)]
pub enum V4l2InputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("无法打开设备 {0}: {1}")]
  OpenDevice(String, std::io::Error),
  #[error("设置采集格式失败: {0}")]
  Format(std::io::Error),
  #[error("设备不支持 YUYV 格式，实际格式: {0}")]
  UnsupportedPixelFormat(String),
  #[error("无法创建捕获流: {0}")]
  Stream(std::io::Error),
}

/// V4L2 摄像头输入
///
/// `stream` 声明在 `_device` 之前，保证先于设备释放。
pub struct V4l2Input<const W: u32, const H: u32> {
  stream: Stream<'static>,
  _device: Device,
  width: u32,
  height: u32,
}

impl<const W: u32, const H: u32> FromUrlWithScheme for V4l2Input<W, H> {
  const SCHEME: &'static str = "v4l2";
}

impl<const W: u32, const H: u32> FromUrl for V4l2Input<W, H> {
  type Error = V4l2InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(V4l2InputError::SchemaMismatch);
    }

    let device_path = match url.path() {
      "" | "/" => DEFAULT_DEVICE,
      path => path,
    };
    let width = query_value(url, "width")
      .and_then(|v| v.parse().ok())
      .unwrap_or(W);
    let height = query_value(url, "height")
      .and_then(|v| v.parse().ok())
      .unwrap_or(H);

    Self::open(device_path, width, height)
  }
}

impl<const W: u32, const H: u32> V4l2Input<W, H> {
  pub fn open(device_path: &str, width: u32, height: u32) -> Result<Self, V4l2InputError> {
    let device = Device::with_path(device_path)
      .map_err(|e| V4l2InputError::OpenDevice(device_path.to_string(), e))?;

    // 设置视频格式，驱动可能会调整为最接近的尺寸
    let mut format = device.format().map_err(V4l2InputError::Format)?;
    format.width = width;
    format.height = height;
    format.fourcc = FourCC::new(b"YUYV");
    let format = device.set_format(&format).map_err(V4l2InputError::Format)?;

    if format.fourcc != FourCC::new(b"YUYV") {
      return Err(V4l2InputError::UnsupportedPixelFormat(
        format.fourcc.to_string(),
      ));
    }

    info!(
      "V4L2 设备已打开: {} ({}x{} YUYV)",
      device_path, format.width, format.height
    );

    let stream = Stream::with_buffers(&device, Type::VideoCapture, CAPTURE_BUFFERS)
      .map_err(V4l2InputError::Stream)?;

    Ok(V4l2Input {
      stream,
      _device: device,
      width: format.width,
      height: format.height,
    })
  }
}

/// 将 YUYV 格式转换为 RGB
fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Vec<u8> {
  let pixels = (width * height) as usize;
  let mut rgb = Vec::with_capacity(pixels * 3);

  for chunk in yuyv.chunks_exact(4).take(pixels / 2) {
    let y0 = chunk[0] as f32;
    let u = chunk[1] as f32 - 128.0;
    let y1 = chunk[2] as f32;
    let v = chunk[3] as f32 - 128.0;

    for y in [y0, y1] {
      let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
      let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
      let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
      rgb.extend_from_slice(&[r, g, b]);
    }
  }

  rgb
}

impl<const W: u32, const H: u32> V4l2Input<W, H> {
  fn capture(&mut self) -> Capture<RgbNhwcFrame<W, H>, String> {
    let (buffer, _meta) = match self.stream.next() {
      Ok(next) => next,
      Err(e) => return Capture::Skip(format!("无法捕获帧: {}", e)),
    };

    let rgb = yuyv_to_rgb(buffer, self.width, self.height);
    match RgbImage::from_raw(self.width, self.height, rgb) {
      Some(image) => Capture::Frame(RgbNhwcFrame::from_rgb_image(&image)),
      None => Capture::Skip(format!(
        "采集缓冲区过短，无法构造 {}x{} 图像",
        self.width, self.height
      )),
    }
  }
}

impl<const W: u32, const H: u32> Iterator for V4l2Input<W, H> {
  type Item = RgbNhwcFrame<W, H>;

  fn next(&mut self) -> Option<Self::Item> {
    next_with_retry(MAX_CONSECUTIVE_FAILURES, || self.capture())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn yuyv_grey_maps_to_grey() {
    let yuyv = [128u8, 128, 128, 128];
    assert_eq!(yuyv_to_rgb(&yuyv, 2, 1), vec![128, 128, 128, 128, 128, 128]);
  }

  #[test]
  fn yuyv_ignores_trailing_bytes() {
    let yuyv = [0u8, 128, 255, 128, 7, 7];
    let rgb = yuyv_to_rgb(&yuyv, 2, 1);
    assert_eq!(rgb, vec![0, 0, 0, 255, 255, 255]);
  }
}
