// 该文件是 Xunchuang （巡窗） 项目的一部分。
// src/model.rs - 分类与回归两级网络
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
  config::Config,
  tensor::{Tensor, activation::sigmoid, backend::Backend},
};
use thiserror::Error;
use tracing::{debug, error};

use crate::config::WindowSpec;

mod backbone;
mod classifier;
mod crops;
mod loss;
mod regressor;

pub use self::backbone::Backbone;
pub use self::classifier::Classifier;
pub use self::crops::{extract_crops, mask_crops};
pub use self::loss::{binary_cross_entropy_with_logits, mean_squared_error, scalar};
pub use self::regressor::{POSE_OUTPUTS, Regressor};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StageError {
  #[error("{stage} 期望 {expected} 个窗口，网格实际生成 {actual} 个")]
  CropCountMismatch {
    stage: &'static str,
    expected: usize,
    actual: usize,
  },
  #[error("{stage} 期望窗口尺寸 {expected:?}，网格实际为 {actual:?}")]
  CropSizeMismatch {
    stage: &'static str,
    expected: (usize, usize),
    actual: (usize, usize),
  },
  #[error("窗口尺寸 {0:?} 过小，卷积层无法容纳")]
  CropTooSmall((usize, usize)),
  #[error("窗口网格为空")]
  EmptyGrid,
}

/// 两级网络共用的结构配置
///
/// `num_crops` 是网络输入通道宽度，构建时必须与窗口网格一致。
#[derive(Config, Debug)]
pub struct StageConfig {
  pub num_crops: usize,
  pub crop_height: usize,
  pub crop_width: usize,
  #[config(default = 5)]
  pub kernel_size: usize,
  #[config(default = 2)]
  pub pool_size: usize,
  #[config(default = 6)]
  pub conv1_channels: usize,
  #[config(default = 16)]
  pub conv2_channels: usize,
  #[config(default = 120)]
  pub hidden1: usize,
  #[config(default = 84)]
  pub hidden2: usize,
}

impl StageConfig {
  /// 以窗口参数推导出的网格宽度创建配置
  pub fn for_window(spec: &WindowSpec) -> Self {
    Self::new(spec.num_crops(), spec.crop_height, spec.crop_width)
  }

  fn side_after_trunk(&self, side: usize) -> Option<usize> {
    let shrink = self.kernel_size.saturating_sub(1);
    let mut side = side;
    for _ in 0..2 {
      side = side.checked_sub(shrink)?;
      side /= self.pool_size.max(1);
      if side == 0 {
        return None;
      }
    }
    Some(side)
  }

  /// 卷积主干展平后的特征长度
  pub fn flat_features(&self) -> Result<usize, StageError> {
    let too_small = StageError::CropTooSmall((self.crop_height, self.crop_width));
    let height = self.side_after_trunk(self.crop_height).ok_or(too_small.clone())?;
    let width = self.side_after_trunk(self.crop_width).ok_or(too_small)?;
    Ok(height * width * self.conv2_channels)
  }

  /// 校验窗口网格与网络固定输入宽度是否一致
  pub fn check_window(&self, stage: &'static str, spec: &WindowSpec) -> Result<(), StageError> {
    let grid = spec.grid();
    if grid.is_empty() {
      error!("{} 的窗口网格为空", stage);
      return Err(StageError::EmptyGrid);
    }
    if grid.len() != self.num_crops {
      error!(
        "{} 期望 {} 个窗口，网格实际生成 {} 个",
        stage,
        self.num_crops,
        grid.len()
      );
      return Err(StageError::CropCountMismatch {
        stage,
        expected: self.num_crops,
        actual: grid.len(),
      });
    }

    let expected = (self.crop_height, self.crop_width);
    let actual = (grid.crop_height(), grid.crop_width());
    if expected != actual {
      return Err(StageError::CropSizeMismatch {
        stage,
        expected,
        actual,
      });
    }

    debug!("{} 网格校验通过: {} 个窗口 {:?}", stage, self.num_crops, actual);
    Ok(())
  }
}

/// 一次联合前向得到的两项损失
pub struct JointLosses<B: Backend> {
  pub classification: Tensor<B, 1>,
  pub regression: Tensor<B, 1>,
}

/// 分类器前向，再以其预测概率作为掩码做回归前向
///
/// 掩码来自分类器预测而非真值标签，与训练时的回归阶段保持一致。
pub fn joint_losses<B: Backend>(
  classifier: &Classifier<B>,
  regressor: &Regressor<B>,
  images: Tensor<B, 3>,
  labels: Tensor<B, 2>,
  coords: Tensor<B, 3>,
) -> JointLosses<B> {
  let logits = classifier.logits(images.clone());
  let classification = binary_cross_entropy_with_logits(logits.clone(), labels);
  let mask = sigmoid(logits).detach();
  let poses = regressor.forward(images, mask);
  let regression = mean_squared_error(poses, coords);

  JointLosses {
    classification,
    regression,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::InferBackend;

  #[test]
  fn default_crop_feature_size_matches_layer_arithmetic() {
    let config = StageConfig::for_window(&WindowSpec::default());
    assert_eq!(config.num_crops, 9);
    // 100 -> 96 -> 48 -> 44 -> 22
    assert_eq!(config.flat_features(), Ok(22 * 22 * 16));
  }

  #[test]
  fn tiny_crop_is_rejected() {
    let config = StageConfig::new(4, 8, 8);
    assert_eq!(config.flat_features(), Err(StageError::CropTooSmall((8, 8))));
  }

  #[test]
  fn mismatched_width_fails_at_construction() {
    let device = Default::default();
    let spec = WindowSpec::default();
    let config = StageConfig::new(8, 100, 100);

    let err = config.init_classifier::<InferBackend>(&spec, &device).unwrap_err();
    assert_eq!(
      err,
      StageError::CropCountMismatch {
        stage: "classifier",
        expected: 8,
        actual: 9
      }
    );
    let err = config.init_regressor::<InferBackend>(&spec, &device).unwrap_err();
    assert!(matches!(err, StageError::CropCountMismatch { stage: "regressor", .. }));

    let config = StageConfig::new(9, 90, 100);
    assert!(matches!(
      config.check_window("classifier", &spec),
      Err(StageError::CropSizeMismatch { .. })
    ));
  }

  #[test]
  fn joint_losses_are_repeatable() {
    let device = Default::default();
    let spec = WindowSpec {
      image_height: 40,
      image_width: 40,
      crop_height: 20,
      crop_width: 20,
      step: 10,
    };
    let config = StageConfig::for_window(&spec);
    let classifier = config.init_classifier::<InferBackend>(&spec, &device).unwrap();
    let regressor = config.init_regressor::<InferBackend>(&spec, &device).unwrap();

    let images = Tensor::<InferBackend, 3>::ones([2, 40, 40], &device);
    let labels = Tensor::<InferBackend, 2>::zeros([2, 9], &device);
    let coords = Tensor::<InferBackend, 3>::ones([2, 9, 3], &device);

    let run = || {
      let losses = joint_losses(
        &classifier,
        &regressor,
        images.clone(),
        labels.clone(),
        coords.clone(),
      );
      (scalar(losses.classification), scalar(losses.regression))
    };
    let (c1, r1) = run();
    let (c2, r2) = run();
    assert_eq!(c1.to_bits(), c2.to_bits());
    assert_eq!(r1.to_bits(), r2.to_bits());
    assert!(c1.is_finite() && c1 >= 0.0);
    assert!(r1.is_finite() && r1 >= 0.0);
  }
}
