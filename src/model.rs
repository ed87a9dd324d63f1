// 该文件是 Holistic Status （体态检测演示） 项目的一部分。
// src/model.rs - 感知模型
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

//! 全身感知模型接口。
//!
//! 关键点检测本身由外部模型完成，本模块只定义输入帧到 [`FrameResult`] 的接口，
//! 并提供两个不依赖推理后端的实现：回放预先记录的结果，以及始终“未检测到”的空模型。

use std::marker::PhantomData;

use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, landmark::FrameResult};

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

#[cfg(feature = "model_replay")]
mod replay;
#[cfg(feature = "model_replay")]
pub use self::replay::{Replay, ReplayError};

/// 永远不检测到任何部位的模型，用于只验证采集与显示链路
#[derive(Debug)]
pub struct Absent<Frame> {
  _phantom: PhantomData<Frame>,
}

impl<Frame> Default for Absent<Frame> {
  fn default() -> Self {
    Self {
      _phantom: PhantomData,
    }
  }
}

impl<Frame> FromUrlWithScheme for Absent<Frame> {
  const SCHEME: &'static str = "absent";
}

impl<Frame> FromUrl for Absent<Frame> {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ModelError::SchemeMismatch(url.scheme().to_string()));
    }
    Ok(Self::default())
  }
}

impl<Frame> Model for Absent<Frame> {
  type Input = Frame;
  type Output = FrameResult;
  type Error = ModelError;

  fn infer(&self, _input: &Frame) -> Result<FrameResult, ModelError> {
    Ok(FrameResult::empty())
  }
}

#[derive(Error, Debug)]
pub enum ModelError {
  #[cfg(feature = "model_replay")]
  #[error("回放模型错误: {0}")]
  ReplayError(#[from] ReplayError),
  #[error("模型 URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 按 URL 方案选择的模型
pub enum ModelWrapper<Frame> {
  Absent(Absent<Frame>),
  #[cfg(feature = "model_replay")]
  Replay(Replay<Frame>),
}

impl<Frame> FromUrl for ModelWrapper<Frame> {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      s if s == Absent::<Frame>::SCHEME => Ok(ModelWrapper::Absent(Absent::from_url(url)?)),
      #[cfg(feature = "model_replay")]
      s if s == Replay::<Frame>::SCHEME => Ok(ModelWrapper::Replay(Replay::from_url(url)?)),
      other => Err(ModelError::SchemeMismatch(other.to_string())),
    }
  }
}

impl<Frame> Model for ModelWrapper<Frame> {
  type Input = Frame;
  type Output = FrameResult;
  type Error = ModelError;

  fn infer(&self, input: &Frame) -> Result<FrameResult, ModelError> {
    match self {
      ModelWrapper::Absent(model) => model.infer(input),
      #[cfg(feature = "model_replay")]
      ModelWrapper::Replay(model) => model.infer(input).map_err(ModelError::from),
    }
  }
}
