// 该文件是 Xunchuang （巡窗） 项目的一部分。
// src/model/regressor.rs - 窗口位姿回归网络
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

use burn::{
  module::Module,
  nn::{Linear, LinearConfig},
  tensor::{Tensor, backend::Backend},
};
use tracing::info;

use super::{Backbone, StageConfig, StageError, extract_crops, mask_crops};
use crate::{config::WindowSpec, window::WindowGrid};

/// 每个窗口回归的量：x, y, theta
pub const POSE_OUTPUTS: usize = 3;

/// 对掩码后的窗口回归物体位姿
#[derive(Module, Debug)]
pub struct Regressor<B: Backend> {
  backbone: Backbone<B>,
  head: Linear<B>,
  image_height: usize,
  image_width: usize,
  crop_height: usize,
  crop_width: usize,
  step: usize,
  num_crops: usize,
}

impl StageConfig {
  pub fn init_regressor<B: Backend>(
    &self,
    spec: &WindowSpec,
    device: &B::Device,
  ) -> Result<Regressor<B>, StageError> {
    self.check_window("regressor", spec)?;
    let backbone = self.init_backbone(device)?;
    info!(
      "回归网络: {} 个窗口，展平特征 {}",
      self.num_crops,
      backbone.flat_features()
    );

    Ok(Regressor {
      backbone,
      head: LinearConfig::new(self.hidden2, self.num_crops * POSE_OUTPUTS).init(device),
      image_height: spec.image_height,
      image_width: spec.image_width,
      crop_height: spec.crop_height,
      crop_width: spec.crop_width,
      step: spec.step,
      num_crops: self.num_crops,
    })
  }
}

impl<B: Backend> Regressor<B> {
  pub fn grid(&self) -> WindowGrid {
    WindowGrid::new(
      self.image_height,
      self.image_width,
      self.crop_height,
      self.crop_width,
      self.step,
    )
  }

  pub fn num_crops(&self) -> usize {
    self.num_crops
  }

  /// `images` 为 `[N, H, W]`，`mask` 为 `[N, K]`，输出 `[N, K, 3]`
  ///
  /// 掩码为 0 的窗口在进入卷积前被整体置零。
  pub fn forward(&self, images: Tensor<B, 3>, mask: Tensor<B, 2>) -> Tensor<B, 3> {
    let [batch, _, _] = images.dims();
    let crops = mask_crops(extract_crops(images, &self.grid()), mask);
    self
      .head
      .forward(self.backbone.forward(crops))
      .reshape([batch, self.num_crops, POSE_OUTPUTS])
  }
}
