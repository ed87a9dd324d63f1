// 该文件是 Holistic Status （体态检测演示） 项目的一部分。
// src/args.rs - 命令行参数
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

use clap::Parser;
use url::Url;

use crate::{
  landmark::PoseLandmark,
  region::{FootRule, RegionStatusClassifier},
};

/// 输入、模型与输出
#[derive(clap::Args, Debug, Clone)]
pub struct PipelineArgs {
  /// 输入来源
  /// - v4l2:///dev/video0?width=640&height=480
  /// - gst://camera/dev/video0?fps=15 或 gst://file/path/video.mp4
  /// - image:///path/photo.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 感知模型
  /// - replay:///path/results.jsonl[?loop]
  /// - absent://
  #[arg(long, value_name = "MODEL")]
  pub model: Url,

  /// 输出
  /// - gst://display 或 gst:///path/out.mp4?fps=30
  /// - image:///path/out.png
  /// - folder:///path/record[?always][&record]
  /// 均可附加 font=/path/to/font.ttf
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
}

/// 脚部判定参数
#[derive(clap::Args, Debug, Clone, Copy)]
pub struct FootArgs {
  /// 左脚使用的姿态关键点索引（默认左踝）
  #[arg(long, default_value_t = PoseLandmark::LeftAnkle.index(), value_name = "INDEX")]
  pub left_foot_index: usize,

  /// 右脚使用的姿态关键点索引（默认右踝）
  #[arg(long, default_value_t = PoseLandmark::RightAnkle.index(), value_name = "INDEX")]
  pub right_foot_index: usize,

  /// 判定为可见的最低可见度（严格大于）
  #[arg(long, default_value_t = 0.5, value_name = "THRESHOLD")]
  pub foot_visibility: f32,
}

impl From<FootArgs> for FootRule {
  fn from(args: FootArgs) -> Self {
    FootRule {
      left_index: args.left_foot_index,
      right_index: args.right_foot_index,
      min_visibility: args.foot_visibility,
    }
  }
}

impl FootArgs {
  pub fn classifier(self) -> RegionStatusClassifier {
    RegionStatusClassifier::new(self.into())
  }
}

/// 摄像头持续运行参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CameraArgs {
  #[command(flatten)]
  pub pipeline: PipelineArgs,

  #[command(flatten)]
  pub foot: FootArgs,

  /// 最大处理帧数，不指定时持续运行直到输入结束或 Ctrl-C
  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,
}

/// 单帧处理参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct OneShotArgs {
  #[command(flatten)]
  pub pipeline: PipelineArgs,

  #[command(flatten)]
  pub foot: FootArgs,
}
