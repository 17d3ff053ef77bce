// 该文件是 Xunchuang （巡窗） 项目的一部分。
// src/model/loss.rs - 损失函数
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
  nn::loss::{MseLoss, Reduction},
  tensor::{ElementConversion, Tensor, backend::Backend},
};

/// 由 logits 计算逐元素二元交叉熵的均值
///
/// 按 `max(x, 0) - x * t + ln(1 + e^(-|x|))` 展开，概率饱和时损失与梯度均保持有限。
pub fn binary_cross_entropy_with_logits<B: Backend, const D: usize>(
  logits: Tensor<B, D>,
  targets: Tensor<B, D>,
) -> Tensor<B, 1> {
  let softplus_tail = logits.clone().abs().neg().exp().log1p();
  let positive = logits.clone().clamp_min(0.0);

  (positive - logits * targets + softplus_tail).mean()
}

/// 逐元素平方误差的均值
pub fn mean_squared_error<B: Backend, const D: usize>(
  predictions: Tensor<B, D>,
  targets: Tensor<B, D>,
) -> Tensor<B, 1> {
  MseLoss::new().forward(predictions, targets, Reduction::Mean)
}

pub fn scalar<B: Backend>(loss: Tensor<B, 1>) -> f32 {
  loss.into_scalar().elem::<f32>()
}
