// 该文件是 Holistic Status （体态检测演示） 项目的一部分。
// src/region.rs - 身体部位检测状态分类
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

//! # 部位状态分类
//!
//! 根据单帧推理结果判定六个固定部位（面部、左右手、身体、左右脚）是否被检测到。
//! 脚部没有独立的关键点集合，使用姿态关键点中的踝关节可见度作为替代判据。

use std::fmt;

use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::landmark::{FrameResult, LandmarkList, PoseLandmark};

/// 六个固定部位，顺序即状态面板的显示顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
  Face,
  LeftHand,
  RightHand,
  LeftFoot,
  RightFoot,
  Body,
}

impl Region {
  pub const ALL: [Region; 6] = [
    Region::Face,
    Region::LeftHand,
    Region::RightHand,
    Region::LeftFoot,
    Region::RightFoot,
    Region::Body,
  ];

  pub fn name(self) -> &'static str {
    match self {
      Region::Face => "face",
      Region::LeftHand => "left_hand",
      Region::RightHand => "right_hand",
      Region::LeftFoot => "left_foot",
      Region::RightFoot => "right_foot",
      Region::Body => "body",
    }
  }

  fn slot(self) -> usize {
    self as usize
  }
}

impl fmt::Display for Region {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Status {
  Detected,
  #[default]
  NotDetected,
}

impl Status {
  pub fn is_detected(self) -> bool {
    matches!(self, Status::Detected)
  }
}

impl From<bool> for Status {
  fn from(detected: bool) -> Self {
    if detected {
      Status::Detected
    } else {
      Status::NotDetected
    }
  }
}

impl fmt::Display for Status {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Status::Detected => f.write_str("Detected"),
      Status::NotDetected => f.write_str("NotDetected"),
    }
  }
}

/// 每个部位的检测状态，每帧重新计算
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegionStatus {
  slots: [Status; 6],
}

impl RegionStatus {
  pub fn get(&self, region: Region) -> Status {
    self.slots[region.slot()]
  }

  pub fn set(&mut self, region: Region, status: Status) {
    self.slots[region.slot()] = status;
  }

  /// 按显示顺序遍历 `(部位, 状态)`
  pub fn iter(&self) -> impl Iterator<Item = (Region, Status)> + '_ {
    Region::ALL.into_iter().map(|region| (region, self.get(region)))
  }

  pub fn any_detected(&self) -> bool {
    self.slots.iter().any(|status| status.is_detected())
  }

  /// 与上一帧相比状态发生变化的部位
  pub fn changes_from<'a>(
    &'a self,
    previous: &'a RegionStatus,
  ) -> impl Iterator<Item = (Region, Status)> + 'a {
    self
      .iter()
      .filter(move |(region, status)| previous.get(*region) != *status)
  }
}

impl Serialize for RegionStatus {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(Region::ALL.len()))?;
    for (region, status) in self.iter() {
      map.serialize_entry(region.name(), &status)?;
    }
    map.end()
  }
}

/// 脚部判据：踝关节索引与可见度阈值（严格大于）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FootRule {
  pub left_index: usize,
  pub right_index: usize,
  pub min_visibility: f32,
}

impl Default for FootRule {
  fn default() -> Self {
    Self {
      left_index: PoseLandmark::LeftAnkle.index(),
      right_index: PoseLandmark::RightAnkle.index(),
      min_visibility: 0.5,
    }
  }
}

type Predicate = fn(&FrameResult, &FootRule) -> bool;

fn present(set: &Option<LandmarkList>) -> bool {
  set.as_ref().is_some_and(|list| !list.is_empty())
}

fn visible_at(pose: &Option<LandmarkList>, index: usize, min_visibility: f32) -> bool {
  pose
    .as_ref()
    .and_then(|list| list.get(index))
    .is_some_and(|landmark| landmark.visibility > min_visibility)
}

fn face(result: &FrameResult, _: &FootRule) -> bool {
  present(&result.face)
}

fn left_hand(result: &FrameResult, _: &FootRule) -> bool {
  present(&result.left_hand)
}

fn right_hand(result: &FrameResult, _: &FootRule) -> bool {
  present(&result.right_hand)
}

fn left_foot(result: &FrameResult, rule: &FootRule) -> bool {
  visible_at(&result.pose, rule.left_index, rule.min_visibility)
}

fn right_foot(result: &FrameResult, rule: &FootRule) -> bool {
  visible_at(&result.pose, rule.right_index, rule.min_visibility)
}

fn body(result: &FrameResult, _: &FootRule) -> bool {
  present(&result.pose)
}

/// 部位到判定函数的查找表，顺序与 [`Region::ALL`] 一致
const PREDICATES: [(Region, Predicate); 6] = [
  (Region::Face, face),
  (Region::LeftHand, left_hand),
  (Region::RightHand, right_hand),
  (Region::LeftFoot, left_foot),
  (Region::RightFoot, right_foot),
  (Region::Body, body),
];

/// 部位状态分类器，无内部状态，可在任意帧间复用
#[derive(Debug, Clone, Copy, Default)]
pub struct RegionStatusClassifier {
  foot: FootRule,
}

impl RegionStatusClassifier {
  pub fn new(foot: FootRule) -> Self {
    Self { foot }
  }

  pub fn foot_rule(&self) -> &FootRule {
    &self.foot
  }

  pub fn classify(&self, result: &FrameResult) -> RegionStatus {
    let mut status = RegionStatus::default();
    for (region, predicate) in PREDICATES {
      status.set(region, predicate(result, &self.foot).into());
    }
    status
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::landmark::Landmark;

  fn points(n: usize, visibility: f32) -> LandmarkList {
    (0..n)
      .map(|_| Landmark::new(0.5, 0.5, 0.0, visibility))
      .collect()
  }

  fn pose_with_ankles(len: usize, left: f32, right: f32) -> LandmarkList {
    let mut pose = points(len, 0.9);
    pose.landmarks[27].visibility = left;
    pose.landmarks[28].visibility = right;
    pose
  }

  fn classify(result: &FrameResult) -> RegionStatus {
    RegionStatusClassifier::default().classify(result)
  }

  #[test]
  fn nothing_present_means_nothing_detected() {
    let status = classify(&FrameResult::empty());
    assert!(Region::ALL.iter().all(|r| status.get(*r) == Status::NotDetected));
    assert!(!status.any_detected());
  }

  #[test]
  fn face_depends_only_on_face_set() {
    let result = FrameResult {
      face: Some(points(1, 0.0)),
      ..FrameResult::default()
    };
    let status = classify(&result);
    assert_eq!(status.get(Region::Face), Status::Detected);
    assert_eq!(status.get(Region::Body), Status::NotDetected);

    let result = FrameResult {
      face: Some(points(468, 0.0)),
      left_hand: Some(points(21, 0.0)),
      pose: Some(points(33, 0.1)),
      ..FrameResult::default()
    };
    assert_eq!(classify(&result).get(Region::Face), Status::Detected);
  }

  #[test]
  fn empty_sets_count_as_absent() {
    let result = FrameResult {
      face: Some(LandmarkList::default()),
      left_hand: Some(LandmarkList::default()),
      right_hand: Some(LandmarkList::default()),
      pose: Some(LandmarkList::default()),
    };
    assert!(!classify(&result).any_detected());
  }

  #[test]
  fn short_pose_never_detects_feet() {
    for len in [1, 20, 27] {
      let result = FrameResult {
        pose: Some(points(len, 1.0)),
        ..FrameResult::default()
      };
      let status = classify(&result);
      assert_eq!(status.get(Region::Body), Status::Detected);
      assert_eq!(status.get(Region::LeftFoot), Status::NotDetected);
      assert_eq!(status.get(Region::RightFoot), Status::NotDetected);
    }
  }

  #[test]
  fn pose_of_28_only_reaches_left_ankle() {
    let result = FrameResult {
      pose: Some(points(28, 1.0)),
      ..FrameResult::default()
    };
    let status = classify(&result);
    assert_eq!(status.get(Region::LeftFoot), Status::Detected);
    assert_eq!(status.get(Region::RightFoot), Status::NotDetected);
  }

  #[test]
  fn ankle_visibility_drives_feet() {
    let result = FrameResult {
      pose: Some(pose_with_ankles(29, 0.6, 0.4)),
      ..FrameResult::default()
    };
    let status = classify(&result);
    assert_eq!(status.get(Region::LeftFoot), Status::Detected);
    assert_eq!(status.get(Region::RightFoot), Status::NotDetected);
  }

  #[test]
  fn visibility_threshold_is_strict() {
    let result = FrameResult {
      pose: Some(pose_with_ankles(33, 0.5, 0.5)),
      ..FrameResult::default()
    };
    let status = classify(&result);
    assert_eq!(status.get(Region::LeftFoot), Status::NotDetected);
    assert_eq!(status.get(Region::RightFoot), Status::NotDetected);
  }

  #[test]
  fn mixed_scenario() {
    let result = FrameResult {
      face: None,
      left_hand: None,
      right_hand: Some(points(21, 0.0)),
      pose: Some(points(29, 0.9)),
    };
    let status = classify(&result);
    let expected = [
      (Region::Face, Status::NotDetected),
      (Region::LeftHand, Status::NotDetected),
      (Region::RightHand, Status::Detected),
      (Region::LeftFoot, Status::Detected),
      (Region::RightFoot, Status::Detected),
      (Region::Body, Status::Detected),
    ];
    assert_eq!(status.iter().collect::<Vec<_>>(), expected);
  }

  #[test]
  fn custom_foot_rule_moves_indices_and_threshold() {
    let classifier = RegionStatusClassifier::new(FootRule {
      left_index: PoseLandmark::LeftHeel.index(),
      right_index: PoseLandmark::RightHeel.index(),
      min_visibility: 0.8,
    });
    let mut pose = points(33, 0.1);
    pose.landmarks[29].visibility = 0.85;
    pose.landmarks[30].visibility = 0.8;
    let status = classifier.classify(&FrameResult {
      pose: Some(pose),
      ..FrameResult::default()
    });
    assert_eq!(status.get(Region::LeftFoot), Status::Detected);
    assert_eq!(status.get(Region::RightFoot), Status::NotDetected);
  }

  #[test]
  fn changes_report_only_flipped_regions() {
    let before = RegionStatus::default();
    let mut after = before;
    after.set(Region::Body, Status::Detected);
    let changes: Vec<_> = after.changes_from(&before).collect();
    assert_eq!(changes, vec![(Region::Body, Status::Detected)]);
  }

  #[test]
  fn status_lines_and_json() {
    let mut status = RegionStatus::default();
    status.set(Region::Face, Status::Detected);
    assert_eq!(
      format!("{}: {}", Region::Face, status.get(Region::Face)),
      "face: Detected"
    );
    assert_eq!(
      format!("{}: {}", Region::LeftFoot, status.get(Region::LeftFoot)),
      "left_foot: NotDetected"
    );
    let json = serde_json::to_string(&status).unwrap();
    assert_eq!(
      json,
      concat!(
        r#"{"face":"Detected","left_hand":"NotDetected","right_hand":"NotDetected","#,
        r#""left_foot":"NotDetected","right_foot":"NotDetected","body":"NotDetected"}"#
      )
    );
  }
}
