// 该文件是 Xunchuang （巡窗） 项目的一部分。
// src/meter.rs - 滑动平均统计
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

use std::{fmt, time::Duration};

/// 记录最近一次取值与加权平均
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AverageMeter {
  pub val: f32,
  pub avg: f32,
  pub sum: f32,
  pub count: usize,
}

impl AverageMeter {
  pub fn new() -> Self {
    Self::default()
  }

  /// `n` 为这次取值代表的样本数
  pub fn update(&mut self, val: f32, n: usize) {
    self.val = val;
    self.sum += val * n as f32;
    self.count += n;
    if self.count > 0 {
      self.avg = self.sum / self.count as f32;
    }
  }

  pub fn update_duration(&mut self, elapsed: Duration) {
    self.update(elapsed.as_secs_f32(), 1);
  }

  pub fn is_empty(&self) -> bool {
    self.count == 0
  }
}

impl fmt::Display for AverageMeter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:.4} ({:.4})", self.val, self.avg)
  }
}
