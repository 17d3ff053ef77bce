// 该文件是 Xunchuang （巡窗） 项目的一部分。
// src/pose.rs - 位姿定义
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

use serde::{Deserialize, Serialize};

/// 物体位姿：中心点像素坐标与朝向（弧度）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
  pub x: f32,
  pub y: f32,
  pub theta: f32,
}

impl Pose {
  /// 负样本窗口的回归目标
  pub const ZERO: Pose = Pose {
    x: 0.0,
    y: 0.0,
    theta: 0.0,
  };

  pub fn new(x: f32, y: f32, theta: f32) -> Self {
    Self { x, y, theta }
  }

  pub fn to_array(self) -> [f32; 3] {
    [self.x, self.y, self.theta]
  }

  pub fn is_finite(&self) -> bool {
    self.x.is_finite() && self.y.is_finite() && self.theta.is_finite()
  }
}

impl From<[f32; 3]> for Pose {
  fn from([x, y, theta]: [f32; 3]) -> Self {
    Self { x, y, theta }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn zero_pose_is_default() {
    assert_eq!(Pose::ZERO, Pose::default());
    assert_eq!(Pose::ZERO.to_array(), [0.0; 3]);
  }

  #[test]
  fn truth_file_layout_is_plain_fields() {
    let pose = Pose::new(100.0, 60.0, 0.5);
    let json = serde_json::to_string(&pose).unwrap();
    assert_eq!(json, r#"{"x":100.0,"y":60.0,"theta":0.5}"#);
  }
}
