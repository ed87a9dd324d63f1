// 该文件是 Holistic Status （体态检测演示） 项目的一部分。
// src/lib.rs - 库主文件
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

pub mod args;
pub mod frame;
pub mod input;
pub mod landmark;
pub mod model;
pub mod output;
pub mod region;
pub mod task;

pub trait FromUrl {
  type Error;
  fn from_url(url: &url::Url) -> Result<Self, Self::Error>
  where
    Self: Sized;
}

pub trait FromUrlWithScheme: FromUrl {
  const SCHEME: &'static str;
}

/// 在 URL 查询参数中查找指定键
pub(crate) fn query_value(url: &url::Url, key: &str) -> Option<String> {
  url
    .query_pairs()
    .find(|(k, _)| k == key)
    .map(|(_, v)| v.into_owned())
}

/// URL 查询参数中是否出现指定键（不关心取值）
pub(crate) fn query_flag(url: &url::Url, key: &str) -> bool {
  url.query_pairs().any(|(k, _)| k == key)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn query_helpers_read_pairs_and_flags() {
    let url = url::Url::parse("folder:///tmp/out?always&font=/a/b.ttf").unwrap();
    assert_eq!(query_value(&url, "font").as_deref(), Some("/a/b.ttf"));
    assert_eq!(query_value(&url, "missing"), None);
    assert!(query_flag(&url, "always"));
    assert!(!query_flag(&url, "record"));
  }
}
