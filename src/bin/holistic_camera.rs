// 该文件是 Holistic Status （体态检测演示） 项目的一部分。
// src/bin/holistic_camera.rs - 持续采集并显示身体部位检测状态
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

use anyhow::Result;
use clap::Parser;

use holistic_status::{
  FromUrl,
  args::CameraArgs,
  frame::RgbNhwcFrame,
  input::InputWrapper,
  model::ModelWrapper,
  output::OutputWrapper,
  task::{ContinuousTask, Task},
};
use tracing::info;

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = CameraArgs::parse();

  info!("输入来源: {}", args.pipeline.input);
  info!("感知模型: {}", args.pipeline.model);
  info!("输出路径: {}", args.pipeline.output);
  info!(
    "脚部关键点: 左 {} / 右 {}，可见度阈值 {}",
    args.foot.left_foot_index, args.foot.right_foot_index, args.foot.foot_visibility
  );

  let input = InputWrapper::<640, 480>::from_url(&args.pipeline.input)?;
  let model = ModelWrapper::<RgbNhwcFrame<640, 480>>::from_url(&args.pipeline.model)?;
  let output = OutputWrapper::<640, 480>::from_url(&args.pipeline.output)?;

  ContinuousTask::default()
    .with_frame_number(args.frame_number)
    .with_classifier(args.foot.classifier())
    .run_task(input, model, output)?;

  Ok(())
}
