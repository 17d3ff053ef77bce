// 该文件是 Xunchuang （巡窗） 项目的一部分。
// src/window.rs - 滑动窗口网格与窗口标注
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

use serde::Serialize;

use crate::pose::Pose;

/// 窗口左上角坐标，x 为列，y 为行
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CropOrigin {
  pub x: usize,
  pub y: usize,
}

/// 按行优先顺序枚举的窗口网格
///
/// 外层循环沿纵轴，内层循环沿横轴。越出图像边界的窗口直接丢弃，不做填充。
/// 标签向量、坐标矩阵与两个网络的输入通道都按这里的顺序对齐。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowGrid {
  crop_height: usize,
  crop_width: usize,
  origins: Box<[CropOrigin]>,
}

impl WindowGrid {
  pub fn new(
    image_height: usize,
    image_width: usize,
    crop_height: usize,
    crop_width: usize,
    step: usize,
  ) -> Self {
    let mut origins = Vec::new();
    if step > 0 && crop_height <= image_height && crop_width <= image_width {
      for y in (0..=image_height - crop_height).step_by(step) {
        for x in (0..=image_width - crop_width).step_by(step) {
          origins.push(CropOrigin { x, y });
        }
      }
    }

    Self {
      crop_height,
      crop_width,
      origins: origins.into_boxed_slice(),
    }
  }

  pub fn len(&self) -> usize {
    self.origins.len()
  }

  pub fn is_empty(&self) -> bool {
    self.origins.is_empty()
  }

  pub fn crop_height(&self) -> usize {
    self.crop_height
  }

  pub fn crop_width(&self) -> usize {
    self.crop_width
  }

  pub fn origins(&self) -> &[CropOrigin] {
    &self.origins
  }

  pub fn iter(&self) -> impl Iterator<Item = &CropOrigin> {
    self.origins.iter()
  }

  /// 为单个真值位姿生成每个窗口的标签与回归目标
  pub fn label(&self, pose: &Pose, margin: f32) -> (Box<[bool]>, Box<[Pose]>) {
    let (labels, coords): (Vec<bool>, Vec<Pose>) = self
      .origins
      .iter()
      .map(|origin| label_crop(origin, self.crop_width, self.crop_height, pose, margin))
      .unzip();
    (labels.into_boxed_slice(), coords.into_boxed_slice())
  }
}

/// 窗口标注：中心点需严格落在向内收缩 `margin` 后的窗口内部
pub fn label_crop(
  origin: &CropOrigin,
  crop_width: usize,
  crop_height: usize,
  pose: &Pose,
  margin: f32,
) -> (bool, Pose) {
  let x = origin.x as f32;
  let y = origin.y as f32;
  let end_x = (origin.x + crop_width) as f32;
  let end_y = (origin.y + crop_height) as f32;

  let contains = x + margin < pose.x
    && pose.x < end_x - margin
    && y + margin < pose.y
    && pose.y < end_y - margin;

  if contains {
    (true, *pose)
  } else {
    (false, Pose::ZERO)
  }
}
