// 该文件是 Holistic Status （体态检测演示） 项目的一部分。
// src/frame.rs - NHWC 帧定义
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

use image::{RgbImage, imageops::FilterType};
use thiserror::Error;

use crate::input::AsNhwcFrame;

const RGB_CHANNELS: usize = 3;

#[derive(Error, Debug)]
pub enum FrameError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
}

/// 固定尺寸的 RGB 帧，按 HWC 顺序存放像素
#[derive(Debug, Clone)]
pub struct RgbNhwcFrame<const W: u32, const H: u32> {
  data: Box<[u8]>,
}

impl<const W: u32, const H: u32> RgbNhwcFrame<W, H> {
  const LEN: usize = RGB_CHANNELS * W as usize * H as usize;

  pub fn height(&self) -> usize {
    H as usize
  }

  pub fn width(&self) -> usize {
    W as usize
  }

  /// 从任意尺寸的 RGB 图像构造帧，尺寸不一致时缩放到 W x H
  pub fn from_rgb_image(image: &RgbImage) -> Self {
    let data = if image.dimensions() == (W, H) {
      image.as_raw().clone()
    } else {
      image::imageops::resize(image, W, H, FilterType::Triangle).into_raw()
    };
    Self {
      data: data.into_boxed_slice(),
    }
  }

  pub fn to_rgb_image(&self) -> RgbImage {
    // 长度在构造时已经校验过
    RgbImage::from_raw(W, H, self.data.to_vec()).unwrap_or_else(|| RgbImage::new(W, H))
  }
}

impl<const W: u32, const H: u32> TryFrom<Vec<u8>> for RgbNhwcFrame<W, H> {
  type Error = FrameError;

  fn try_from(data: Vec<u8>) -> Result<Self, Self::Error> {
    if data.len() != Self::LEN {
      return Err(FrameError::LengthMismatch {
        expected: Self::LEN,
        actual: data.len(),
      });
    }

    Ok(Self {
      data: data.into_boxed_slice(),
    })
  }
}

impl<const W: u32, const H: u32> Default for RgbNhwcFrame<W, H> {
  fn default() -> Self {
    let data = vec![0u8; Self::LEN].into_boxed_slice();
    Self { data }
  }
}

impl<const W: u32, const H: u32> AsNhwcFrame<W, H> for RgbNhwcFrame<W, H> {
  fn as_nhwc(&self) -> &[u8] {
    &self.data
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn rejects_buffers_of_wrong_length() {
    let err = RgbNhwcFrame::<4, 2>::try_from(vec![0u8; 10]).unwrap_err();
    assert!(matches!(
      err,
      FrameError::LengthMismatch {
        expected: 24,
        actual: 10
      }
    ));
  }

  #[test]
  fn keeps_pixels_when_size_matches() {
    let mut image = RgbImage::new(4, 2);
    image.put_pixel(3, 1, Rgb([10, 20, 30]));
    let frame = RgbNhwcFrame::<4, 2>::from_rgb_image(&image);
    let back = frame.to_rgb_image();
    assert_eq!(back.get_pixel(3, 1), &Rgb([10, 20, 30]));
    assert_eq!(frame.as_nhwc().len(), 24);
  }

  #[test]
  fn resizes_other_sizes() {
    let image = RgbImage::from_pixel(8, 8, Rgb([200, 100, 50]));
    let frame = RgbNhwcFrame::<4, 2>::from_rgb_image(&image);
    assert_eq!(frame.as_nhwc().len(), 24);
    assert_eq!(frame.to_rgb_image().get_pixel(0, 0), &Rgb([200, 100, 50]));
  }
}
