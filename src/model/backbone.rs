// 该文件是 Xunchuang （巡窗） 项目的一部分。
// src/model/backbone.rs - 卷积主干
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
  nn::{
    Linear, LinearConfig, Relu,
    conv::{Conv2d, Conv2dConfig},
    pool::{MaxPool2d, MaxPool2dConfig},
  },
  tensor::{Tensor, backend::Backend},
};

use super::{StageConfig, StageError};

/// 窗口作为输入通道：conv → relu → pool → conv → relu → pool → fc → relu → fc → relu
#[derive(Module, Debug)]
pub struct Backbone<B: Backend> {
  conv1: Conv2d<B>,
  conv2: Conv2d<B>,
  pool: MaxPool2d,
  fc1: Linear<B>,
  fc2: Linear<B>,
  activation: Relu,
  flat_features: usize,
}

impl StageConfig {
  pub(super) fn init_backbone<B: Backend>(
    &self,
    device: &B::Device,
  ) -> Result<Backbone<B>, StageError> {
    let flat_features = self.flat_features()?;
    let kernel = [self.kernel_size, self.kernel_size];
    let pool = [self.pool_size, self.pool_size];

    Ok(Backbone {
      conv1: Conv2dConfig::new([self.num_crops, self.conv1_channels], kernel).init(device),
      conv2: Conv2dConfig::new([self.conv1_channels, self.conv2_channels], kernel).init(device),
      pool: MaxPool2dConfig::new(pool).with_strides(pool).init(),
      fc1: LinearConfig::new(flat_features, self.hidden1).init(device),
      fc2: LinearConfig::new(self.hidden1, self.hidden2).init(device),
      activation: Relu::new(),
      flat_features,
    })
  }
}

impl<B: Backend> Backbone<B> {
  /// `[N, K, h, w]` -> `[N, hidden2]`
  pub fn forward(&self, crops: Tensor<B, 4>) -> Tensor<B, 2> {
    let [batch, _, _, _] = crops.dims();

    let x = self.pool.forward(self.activation.forward(self.conv1.forward(crops)));
    let x = self.pool.forward(self.activation.forward(self.conv2.forward(x)));
    let x = x.reshape([batch, self.flat_features]);
    let x = self.activation.forward(self.fc1.forward(x));
    self.activation.forward(self.fc2.forward(x))
  }

  pub fn flat_features(&self) -> usize {
    self.flat_features
  }
}
