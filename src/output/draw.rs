// 该文件是 Holistic Status （体态检测演示） 项目的一部分。
// src/output/draw.rs - 关键点与部位状态可视化
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

use std::path::{Path, PathBuf};

use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut, draw_text_mut};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  frame::RgbNhwcFrame,
  landmark::{HAND_CONNECTIONS, LandmarkList, POSE_CONNECTIONS},
  output::Annotated,
  query_value,
  region::{Region, RegionStatus},
};

// 文本渲染常量
const TITLE: &str = "Body Part Detection System";
const TITLE_FONT_SIZE: f32 = 24.0;
const STATUS_FONT_SIZE: f32 = 20.0;
const TITLE_ORIGIN: (i32, i32) = (10, 30);
const STATUS_ORIGIN: (i32, i32) = (10, 60);
const STATUS_LINE_STEP: i32 = 30;
const TITLE_COLOR: [u8; 3] = [255, 255, 255];

/// 未指定字体时依次尝试的系统字体
const FONT_SEARCH_PATHS: [&str; 6] = [
  "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/TTF/DejaVuSans.ttf",
  "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
  "/usr/share/fonts/noto/NotoSans-Regular.ttf",
  "/Library/Fonts/Arial.ttf",
];

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("找不到可用字体，已尝试: {0:?}")]
  FontNotFound(Vec<PathBuf>),
  #[error("字体文件无效: {0}")]
  FontInvalid(PathBuf),
  #[error("读取字体失败: {0}")]
  IoError(#[from] std::io::Error),
}

/// 每个部位的显示颜色（RGB）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
  pub face: [u8; 3],
  pub left_hand: [u8; 3],
  pub right_hand: [u8; 3],
  pub left_foot: [u8; 3],
  pub right_foot: [u8; 3],
  pub body: [u8; 3],
}

impl Default for Palette {
  fn default() -> Self {
    Self {
      face: [255, 255, 0],
      left_hand: [255, 0, 0],
      right_hand: [0, 0, 255],
      left_foot: [0, 255, 0],
      right_foot: [255, 0, 255],
      body: [0, 255, 255],
    }
  }
}

impl Palette {
  pub fn color(&self, region: Region) -> Rgb<u8> {
    Rgb(match region {
      Region::Face => self.face,
      Region::LeftHand => self.left_hand,
      Region::RightHand => self.right_hand,
      Region::LeftFoot => self.left_foot,
      Region::RightFoot => self.right_foot,
      Region::Body => self.body,
    })
  }
}

/// 状态面板的文本行：`"{部位}: {状态}"` 与对应颜色
pub fn status_lines(status: &RegionStatus, palette: &Palette) -> Vec<(String, Rgb<u8>)> {
  status
    .iter()
    .map(|(region, s)| (format!("{}: {}", region, s), palette.color(region)))
    .collect()
}

/// 关键点连线样式
#[derive(Debug, Clone, Copy)]
struct Stroke {
  color: Rgb<u8>,
  thickness: i32,
  radius: i32,
}

fn to_pixel(image: &RgbImage, x: f32, y: f32) -> (f32, f32) {
  (x * image.width() as f32, y * image.height() as f32)
}

fn draw_thick_line(image: &mut RgbImage, from: (f32, f32), to: (f32, f32), stroke: Stroke) {
  for offset in 0..stroke.thickness {
    let d = offset as f32;
    draw_line_segment_mut(image, (from.0 + d, from.1), (to.0 + d, to.1), stroke.color);
    draw_line_segment_mut(image, (from.0, from.1 + d), (to.0, to.1 + d), stroke.color);
  }
}

fn draw_landmark_set(
  image: &mut RgbImage,
  landmarks: &LandmarkList,
  connections: &[(usize, usize)],
  stroke: Stroke,
) {
  for &(a, b) in connections {
    let (Some(from), Some(to)) = (landmarks.get(a), landmarks.get(b)) else {
      continue;
    };
    if !from.is_in_frame() || !to.is_in_frame() {
      continue;
    }
    let from = to_pixel(image, from.x, from.y);
    let to = to_pixel(image, to.x, to.y);
    draw_thick_line(image, from, to, stroke);
  }

  for landmark in landmarks.iter().filter(|l| l.is_in_frame()) {
    let (x, y) = to_pixel(image, landmark.x, landmark.y);
    draw_filled_circle_mut(image, (x as i32, y as i32), stroke.radius, stroke.color);
  }
}

/// 在图像上绘制姿态、双手与面部关键点
pub fn draw_landmarks(image: &mut RgbImage, annotated: &Annotated, palette: &Palette) {
  let result = &annotated.result;
  let sets = [
    (&result.pose, &POSE_CONNECTIONS[..], Region::Body, 2, 2),
    (&result.left_hand, &HAND_CONNECTIONS[..], Region::LeftHand, 2, 2),
    (&result.right_hand, &HAND_CONNECTIONS[..], Region::RightHand, 2, 2),
    (&result.face, &[][..], Region::Face, 1, 1),
  ];

  for (set, connections, region, thickness, radius) in sets {
    if let Some(landmarks) = set {
      let stroke = Stroke {
        color: palette.color(region),
        thickness,
        radius,
      };
      draw_landmark_set(image, landmarks, connections, stroke);
    }
  }
}

/// 渲染配置：字体、配色与状态面板布局
pub struct Draw {
  font: FontVec,
  palette: Palette,
  title: String,
}

impl Draw {
  pub fn new(font: FontVec, palette: Palette) -> Self {
    Self {
      font,
      palette,
      title: TITLE.to_string(),
    }
  }

  /// 从指定路径加载字体
  pub fn with_font_file<P: AsRef<Path>>(path: P, palette: Palette) -> Result<Self, DrawError> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    let font = FontVec::try_from_vec(data).map_err(|_| DrawError::FontInvalid(path.into()))?;
    info!("加载字体: {}", path.display());
    Ok(Self::new(font, palette))
  }

  /// 在常见系统路径中查找字体
  pub fn with_system_font(palette: Palette) -> Result<Self, DrawError> {
    let candidates: Vec<PathBuf> = FONT_SEARCH_PATHS.iter().map(PathBuf::from).collect();
    match candidates.iter().find(|p| p.exists()) {
      Some(path) => Self::with_font_file(path, palette),
      None => Err(DrawError::FontNotFound(candidates)),
    }
  }

  /// 输出 URL 中的 `font` 参数优先，否则查找系统字体
  pub fn from_url(url: &Url) -> Result<Self, DrawError> {
    match query_value(url, "font") {
      Some(path) => Self::with_font_file(path, Palette::default()),
      None => Self::with_system_font(Palette::default()),
    }
  }

  // imageproc 以左上角定位文本，换算为以基线定位
  fn draw_text_at_baseline(
    &self,
    image: &mut RgbImage,
    (x, baseline): (i32, i32),
    size: f32,
    color: Rgb<u8>,
    text: &str,
  ) {
    let scale = PxScale::from(size);
    let ascent = self.font.as_scaled(scale).ascent().ceil() as i32;
    draw_text_mut(image, color, x, baseline - ascent, scale, &self.font, text);
  }

  pub fn draw_status_panel(&self, image: &mut RgbImage, status: &RegionStatus) {
    self.draw_text_at_baseline(
      image,
      TITLE_ORIGIN,
      TITLE_FONT_SIZE,
      Rgb(TITLE_COLOR),
      &self.title,
    );

    let (x, mut y) = STATUS_ORIGIN;
    for (line, color) in status_lines(status, &self.palette) {
      self.draw_text_at_baseline(image, (x, y), STATUS_FONT_SIZE, color, &line);
      y += STATUS_LINE_STEP;
    }
  }

  pub fn draw_annotated(&self, image: &mut RgbImage, annotated: &Annotated) {
    draw_landmarks(image, annotated, &self.palette);
    self.draw_status_panel(image, &annotated.status);
    debug!("绘制完成: {}x{}", image.width(), image.height());
  }

  pub fn draw_frame<const W: u32, const H: u32>(
    &self,
    frame: &RgbNhwcFrame<W, H>,
    annotated: &Annotated,
  ) -> RgbImage {
    let mut image = frame.to_rgb_image();
    self.draw_annotated(&mut image, annotated);
    image
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::landmark::{FrameResult, Landmark};
  use crate::region::{RegionStatusClassifier, Status};

  fn annotated(result: FrameResult) -> Annotated {
    let status = RegionStatusClassifier::default().classify(&result);
    Annotated { result, status }
  }

  #[test]
  fn palette_matches_region_colors() {
    let palette = Palette::default();
    assert_eq!(palette.color(Region::Face), Rgb([255, 255, 0]));
    assert_eq!(palette.color(Region::LeftHand), Rgb([255, 0, 0]));
    assert_eq!(palette.color(Region::RightHand), Rgb([0, 0, 255]));
    assert_eq!(palette.color(Region::LeftFoot), Rgb([0, 255, 0]));
    assert_eq!(palette.color(Region::RightFoot), Rgb([255, 0, 255]));
    assert_eq!(palette.color(Region::Body), Rgb([0, 255, 255]));
  }

  #[test]
  fn status_lines_follow_panel_order() {
    let mut status = RegionStatus::default();
    status.set(Region::RightHand, Status::Detected);
    let lines = status_lines(&status, &Palette::default());
    let texts: Vec<&str> = lines.iter().map(|(t, _)| t.as_str()).collect();
    assert_eq!(
      texts,
      [
        "face: NotDetected",
        "left_hand: NotDetected",
        "right_hand: Detected",
        "left_foot: NotDetected",
        "right_foot: NotDetected",
        "body: NotDetected",
      ]
    );
    assert_eq!(lines[2].1, Rgb([0, 0, 255]));
  }

  #[test]
  fn draws_hand_in_its_color() {
    let hand: LandmarkList = (0..21)
      .map(|i| Landmark::new(0.1 + i as f32 * 0.02, 0.5, 0.0, 0.0))
      .collect();
    let data = annotated(FrameResult {
      left_hand: Some(hand),
      ..FrameResult::default()
    });
    let mut image = RgbImage::new(100, 100);
    draw_landmarks(&mut image, &data, &Palette::default());
    assert_eq!(image.get_pixel(10, 50), &Rgb([255, 0, 0]));
    assert_eq!(image.get_pixel(90, 10), &Rgb([0, 0, 0]));
  }

  #[test]
  fn skips_out_of_frame_landmarks() {
    let face: LandmarkList = vec![Landmark::new(1.5, -0.2, 0.0, 1.0)].into();
    let data = annotated(FrameResult {
      face: Some(face),
      ..FrameResult::default()
    });
    let mut image = RgbImage::new(20, 20);
    draw_landmarks(&mut image, &data, &Palette::default());
    assert!(image.pixels().all(|p| *p == Rgb([0, 0, 0])));
  }

  #[test]
  fn missing_font_file_is_an_error() {
    let err = Draw::with_font_file("/no/such/font.ttf", Palette::default())
      .err()
      .unwrap();
    assert!(matches!(err, DrawError::IoError(_)));
  }

  #[test]
  fn invalid_font_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.ttf");
    std::fs::write(&path, b"not a font").unwrap();
    let err = Draw::with_font_file(&path, Palette::default()).err().unwrap();
    assert!(matches!(err, DrawError::FontInvalid(ref p) if *p == path));
  }

  #[test]
  #[ignore = "需要系统中安装 DejaVu/Liberation/Noto 等 TrueType 字体"]
  fn panel_is_drawn_with_system_font() {
    let draw = Draw::with_system_font(Palette::default()).unwrap();
    let data = annotated(FrameResult::empty());
    let mut image = RgbImage::new(400, 260);
    draw.draw_annotated(&mut image, &data);
    assert!(image.pixels().any(|p| p.0 != [0, 0, 0]));
  }
}
