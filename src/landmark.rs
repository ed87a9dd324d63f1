// 该文件是 Holistic Status （体态检测演示） 项目的一部分。
// src/landmark.rs - 关键点数据定义
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

//! # 关键点数据
//!
//! 全身（holistic）感知模型每帧输出的数据结构。坐标均为归一化坐标：
//! `x`、`y` 位于 `[0, 1]`，原点在图像左上角；`z` 为相对深度。
//!
//! 姿态关键点沿用 MediaPipe 的 33 点定义，手部为 21 点，面部网格点数不固定。

use serde::{Deserialize, Serialize};

/// 单个关键点
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
  pub x: f32,
  pub y: f32,
  #[serde(default)]
  pub z: f32,
  /// 可见度置信度 `[0, 1]`，数据中缺失时视为 0
  #[serde(default)]
  pub visibility: f32,
}

impl Landmark {
  pub fn new(x: f32, y: f32, z: f32, visibility: f32) -> Self {
    Self { x, y, z, visibility }
  }

  /// 坐标是否落在图像范围内
  pub fn is_in_frame(&self) -> bool {
    (0.0..=1.0).contains(&self.x) && (0.0..=1.0).contains(&self.y)
  }
}

/// 有序关键点序列
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkList {
  pub landmarks: Vec<Landmark>,
}

impl LandmarkList {
  pub fn len(&self) -> usize {
    self.landmarks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.landmarks.is_empty()
  }

  pub fn get(&self, index: usize) -> Option<&Landmark> {
    self.landmarks.get(index)
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Landmark> {
    self.landmarks.iter()
  }
}

impl From<Vec<Landmark>> for LandmarkList {
  fn from(landmarks: Vec<Landmark>) -> Self {
    Self { landmarks }
  }
}

impl FromIterator<Landmark> for LandmarkList {
  fn from_iter<I: IntoIterator<Item = Landmark>>(iter: I) -> Self {
    Self {
      landmarks: iter.into_iter().collect(),
    }
  }
}

/// 单帧推理结果，每个部位的关键点集合都可能缺失
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameResult {
  #[serde(default)]
  pub face: Option<LandmarkList>,
  #[serde(default)]
  pub left_hand: Option<LandmarkList>,
  #[serde(default)]
  pub right_hand: Option<LandmarkList>,
  #[serde(default)]
  pub pose: Option<LandmarkList>,
}

impl FrameResult {
  /// 什么都没有检测到的结果
  pub fn empty() -> Self {
    Self::default()
  }
}

/// MediaPipe 33 点姿态关键点索引
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum PoseLandmark {
  Nose = 0,
  LeftEyeInner = 1,
  LeftEye = 2,
  LeftEyeOuter = 3,
  RightEyeInner = 4,
  RightEye = 5,
  RightEyeOuter = 6,
  LeftEar = 7,
  RightEar = 8,
  MouthLeft = 9,
  MouthRight = 10,
  LeftShoulder = 11,
  RightShoulder = 12,
  LeftElbow = 13,
  RightElbow = 14,
  LeftWrist = 15,
  RightWrist = 16,
  LeftPinky = 17,
  RightPinky = 18,
  LeftIndex = 19,
  RightIndex = 20,
  LeftThumb = 21,
  RightThumb = 22,
  LeftHip = 23,
  RightHip = 24,
  LeftKnee = 25,
  RightKnee = 26,
  LeftAnkle = 27,
  RightAnkle = 28,
  LeftHeel = 29,
  RightHeel = 30,
  LeftFootIndex = 31,
  RightFootIndex = 32,
}

impl PoseLandmark {
  pub const COUNT: usize = 33;

  pub fn index(self) -> usize {
    self as usize
  }
}

/// 姿态骨架连线
pub const POSE_CONNECTIONS: [(usize, usize); 35] = [
  (0, 1),
  (1, 2),
  (2, 3),
  (3, 7),
  (0, 4),
  (4, 5),
  (5, 6),
  (6, 8),
  (9, 10),
  (11, 12),
  (11, 13),
  (13, 15),
  (15, 17),
  (15, 19),
  (15, 21),
  (17, 19),
  (12, 14),
  (14, 16),
  (16, 18),
  (16, 20),
  (16, 22),
  (18, 20),
  (11, 23),
  (12, 24),
  (23, 24),
  (23, 25),
  (24, 26),
  (25, 27),
  (26, 28),
  (27, 29),
  (28, 30),
  (29, 31),
  (30, 32),
  (27, 31),
  (28, 32),
];

/// 手部 21 点骨架连线
pub const HAND_CONNECTIONS: [(usize, usize); 21] = [
  (0, 1),
  (1, 2),
  (2, 3),
  (3, 4),
  (0, 5),
  (5, 6),
  (6, 7),
  (7, 8),
  (5, 9),
  (9, 10),
  (10, 11),
  (11, 12),
  (9, 13),
  (13, 14),
  (14, 15),
  (15, 16),
  (13, 17),
  (0, 17),
  (17, 18),
  (18, 19),
  (19, 20),
];

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ankle_indices_match_pose_schema() {
    assert_eq!(PoseLandmark::LeftAnkle.index(), 27);
    assert_eq!(PoseLandmark::RightAnkle.index(), 28);
    assert_eq!(PoseLandmark::RightFootIndex.index() + 1, PoseLandmark::COUNT);
  }

  #[test]
  fn connections_stay_inside_schema() {
    assert!(
      POSE_CONNECTIONS
        .iter()
        .all(|&(a, b)| a < PoseLandmark::COUNT && b < PoseLandmark::COUNT)
    );
    assert!(HAND_CONNECTIONS.iter().all(|&(a, b)| a < 21 && b < 21));
  }

  #[test]
  fn frame_result_parses_partial_json() {
    let json = r#"{"right_hand":[{"x":0.5,"y":0.25}],"pose":null}"#;
    let result: FrameResult = serde_json::from_str(json).unwrap();
    assert!(result.face.is_none());
    assert!(result.left_hand.is_none());
    assert!(result.pose.is_none());
    let hand = result.right_hand.unwrap();
    assert_eq!(hand.len(), 1);
    assert_eq!(hand.get(0), Some(&Landmark::new(0.5, 0.25, 0.0, 0.0)));
  }

  #[test]
  fn out_of_frame_landmarks_are_flagged() {
    assert!(Landmark::new(0.0, 1.0, 0.0, 1.0).is_in_frame());
    assert!(!Landmark::new(-0.1, 0.5, 0.0, 1.0).is_in_frame());
    assert!(!Landmark::new(0.5, 1.2, 0.0, 1.0).is_in_frame());
  }
}
