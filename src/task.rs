// 该文件是 Holistic Status （体态检测演示） 项目的一部分。
// src/task.rs - 采集、推理、分类与渲染循环
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

use std::{
  sync::mpsc::{self, Receiver},
  thread,
  time::{Duration, Instant},
};
use tracing::{debug, info, warn};

use crate::{
  landmark::FrameResult,
  model::Model,
  output::{Annotated, Render},
  region::{RegionStatus, RegionStatusClassifier},
};

const FORCE_EXIT_AFTER: Duration = Duration::from_secs(30);

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 推理并分类单帧
fn annotate<F, M, ME>(
  model: &M,
  classifier: &RegionStatusClassifier,
  frame: &F,
) -> Result<Annotated, ME>
where
  M: Model<Input = F, Output = FrameResult, Error = ME>,
{
  let result = model.infer(frame)?;
  let status = classifier.classify(&result);
  Ok(Annotated { result, status })
}

fn log_transitions(previous: &RegionStatus, current: &RegionStatus) {
  for (region, status) in current.changes_from(previous) {
    info!("{}: {}", region, status);
  }
}

#[derive(Default, Debug)]
pub struct OneShotTask {
  classifier: RegionStatusClassifier,
}

impl OneShotTask {
  pub fn with_classifier(mut self, classifier: RegionStatusClassifier) -> Self {
    self.classifier = classifier;
    self
  }
}

impl<
  F,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = FrameResult, Error = ME>,
  O: Render<F, Annotated, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let now = Instant::now();
    let annotated = annotate(&model, &self.classifier, &frame)?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());
    for (region, status) in annotated.status.iter() {
      info!("{}: {}", region, status);
    }
    output.render_result(&frame, &annotated)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 持续处理输入帧，直到输入结束、达到指定帧数或收到中断信号
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  classifier: RegionStatusClassifier,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  pub fn with_classifier(mut self, classifier: RegionStatusClassifier) -> Self {
    self.classifier = classifier;
    self
  }

  /// 主循环，返回处理的帧数
  fn run_loop<F, ME, RE, I, M, O>(
    &self,
    input: I,
    model: &M,
    output: &O,
    stop: &Receiver<()>,
  ) -> anyhow::Result<usize>
  where
    ME: std::error::Error + Sync + Send + 'static,
    RE: std::error::Error + Sync + Send + 'static,
    I: Iterator<Item = F>,
    M: Model<Input = F, Output = FrameResult, Error = ME>,
    O: Render<F, Annotated, Error = RE>,
  {
    let mut frame_index = 0usize;
    let mut previous = RegionStatus::default();
    let mut now = Instant::now();

    for frame in input {
      frame_index += 1;
      debug!("处理第 {} 帧图像", frame_index);
      let annotated = annotate(model, &self.classifier, &frame)?;
      let elapsed_a = now.elapsed();
      output.render_result(&frame, &annotated)?;
      let elapsed_b = now.elapsed();
      now = Instant::now();
      debug!("推理完成，耗时: {:.2?} / {:.2?}", elapsed_a, elapsed_b);

      log_transitions(&previous, &annotated.status);
      previous = annotated.status;

      if self.frame_number.is_some_and(|n| frame_index >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if stop.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    Ok(frame_index)
  }
}

impl<
  F,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = FrameResult, Error = ME>,
  O: Render<F, Annotated, Error = RE>,
> Task<I, M, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let (tx, rx) = mpsc::channel();

    let installed = ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(FORCE_EXIT_AFTER);
        warn!("强制退出程序");
        std::process::exit(1);
      });
    });
    if let Err(e) = installed {
      warn!("无法安装中断处理函数，仅在输入结束时退出: {}", e);
    }

    let frames = self.run_loop(input, &model, &output, &rx)?;
    info!("任务完成，共处理 {} 帧，退出", frames);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::landmark::{Landmark, LandmarkList};
  use crate::region::{Region, Status};
  use std::{cell::RefCell, convert::Infallible, rc::Rc};

  /// 把帧号当作“是否检测到身体”的依据
  struct EvenFramesHaveBody;

  impl Model for EvenFramesHaveBody {
    type Input = usize;
    type Output = FrameResult;
    type Error = Infallible;

    fn infer(&self, input: &usize) -> Result<FrameResult, Infallible> {
      let pose: Option<LandmarkList> = (input % 2 == 0)
        .then(|| (0..33).map(|_| Landmark::new(0.5, 0.5, 0.0, 0.9)).collect());
      Ok(FrameResult {
        pose,
        ..FrameResult::default()
      })
    }
  }

  #[derive(Default, Clone)]
  struct Collect {
    seen: Rc<RefCell<Vec<(usize, Status)>>>,
  }

  impl Render<usize, Annotated> for Collect {
    type Error = Infallible;

    fn render_result(&self, frame: &usize, result: &Annotated) -> Result<(), Infallible> {
      self
        .seen
        .borrow_mut()
        .push((*frame, result.status.get(Region::Body)));
      Ok(())
    }
  }

  #[test]
  fn continuous_task_renders_every_frame_until_exhausted() {
    let (_tx, rx) = mpsc::channel();
    let output = Collect::default();
    let frames = ContinuousTask::default()
      .run_loop(0..4usize, &EvenFramesHaveBody, &output, &rx)
      .unwrap();
    assert_eq!(frames, 4);
    assert_eq!(
      *output.seen.borrow(),
      vec![
        (0, Status::Detected),
        (1, Status::NotDetected),
        (2, Status::Detected),
        (3, Status::NotDetected),
      ]
    );
  }

  #[test]
  fn continuous_task_honours_frame_limit() {
    let (_tx, rx) = mpsc::channel();
    let output = Collect::default();
    let frames = ContinuousTask::default()
      .with_frame_number(Some(2))
      .run_loop(0.., &EvenFramesHaveBody, &output, &rx)
      .unwrap();
    assert_eq!(frames, 2);
    assert_eq!(output.seen.borrow().len(), 2);
  }

  #[test]
  fn continuous_task_stops_on_signal() {
    let (tx, rx) = mpsc::channel();
    tx.send(()).unwrap();
    let output = Collect::default();
    let frames = ContinuousTask::default()
      .run_loop(0.., &EvenFramesHaveBody, &output, &rx)
      .unwrap();
    assert_eq!(frames, 1);
  }

  #[test]
  fn one_shot_uses_only_the_first_frame() {
    let output = Collect::default();
    OneShotTask::default()
      .run_task(vec![2usize, 3].into_iter(), EvenFramesHaveBody, output.clone())
      .unwrap();
    assert_eq!(*output.seen.borrow(), vec![(2, Status::Detected)]);
  }

  #[test]
  fn one_shot_without_frames_fails() {
    let output = Collect::default();
    let result = OneShotTask::default().run_task(
      std::iter::empty::<usize>(),
      EvenFramesHaveBody,
      output.clone(),
    );
    assert!(result.is_err());
  }
}
