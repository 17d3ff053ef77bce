// 该文件是 Xunchuang （巡窗） 项目的一部分。
// src/config.rs - 训练与窗口配置
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
use thiserror::Error;

use crate::window::WindowGrid;

pub const DEFAULT_IMAGE_SIZE: usize = 200;
pub const DEFAULT_CROP_SIZE: usize = 100;
pub const DEFAULT_STEP: usize = 50;
pub const DEFAULT_MARGIN: f32 = 15.0;
pub const DEFAULT_BATCH_SIZE: usize = 15;
pub const DEFAULT_LEARNING_RATE: f64 = 1e-3;
pub const DEFAULT_EPOCHS: usize = 5;
pub const DEFAULT_PRINT_FREQ: usize = 25;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
  #[error("滑动步长必须大于 0")]
  ZeroStep,
  #[error("批大小必须大于 0")]
  ZeroBatchSize,
  #[error("窗口尺寸 {crop_height}x{crop_width} 超出图像尺寸 {image_height}x{image_width}")]
  CropLargerThanImage {
    crop_height: usize,
    crop_width: usize,
    image_height: usize,
    image_width: usize,
  },
  #[error("检测边距 {margin} 过大，窗口 {crop_height}x{crop_width} 内不可能存在正样本")]
  MarginTooLarge {
    margin: f32,
    crop_height: usize,
    crop_width: usize,
  },
  #[error("学习率必须为正数，实际为 {0}")]
  InvalidLearningRate(f64),
}

/// 滑动窗口网格的尺寸参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
  pub image_height: usize,
  pub image_width: usize,
  pub crop_height: usize,
  pub crop_width: usize,
  pub step: usize,
}

impl Default for WindowSpec {
  fn default() -> Self {
    Self {
      image_height: DEFAULT_IMAGE_SIZE,
      image_width: DEFAULT_IMAGE_SIZE,
      crop_height: DEFAULT_CROP_SIZE,
      crop_width: DEFAULT_CROP_SIZE,
      step: DEFAULT_STEP,
    }
  }
}

impl WindowSpec {
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.step == 0 {
      return Err(ConfigError::ZeroStep);
    }
    if self.crop_height == 0
      || self.crop_width == 0
      || self.crop_height > self.image_height
      || self.crop_width > self.image_width
    {
      return Err(ConfigError::CropLargerThanImage {
        crop_height: self.crop_height,
        crop_width: self.crop_width,
        image_height: self.image_height,
        image_width: self.image_width,
      });
    }
    Ok(())
  }

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
    self.grid().len()
  }
}

/// 一次训练运行的全部静态配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
  pub window: WindowSpec,
  /// 检测边距（像素）
  pub margin: f32,
  pub batch_size: usize,
  pub learning_rate: f64,
  pub epochs: usize,
  /// 每隔多少个批次输出一次损失
  pub print_freq: usize,
  /// 数据打乱使用的随机种子
  pub seed: u64,
}

impl Default for TrainConfig {
  fn default() -> Self {
    Self {
      window: WindowSpec::default(),
      margin: DEFAULT_MARGIN,
      batch_size: DEFAULT_BATCH_SIZE,
      learning_rate: DEFAULT_LEARNING_RATE,
      epochs: DEFAULT_EPOCHS,
      print_freq: DEFAULT_PRINT_FREQ,
      seed: 0,
    }
  }
}

impl TrainConfig {
  pub fn validate(&self) -> Result<(), ConfigError> {
    self.window.validate()?;
    if self.batch_size == 0 {
      return Err(ConfigError::ZeroBatchSize);
    }
    let shortest = self.window.crop_height.min(self.window.crop_width) as f32;
    if self.margin < 0.0 || 2.0 * self.margin >= shortest {
      return Err(ConfigError::MarginTooLarge {
        margin: self.margin,
        crop_height: self.window.crop_height,
        crop_width: self.window.crop_width,
      });
    }
    if !(self.learning_rate > 0.0) {
      return Err(ConfigError::InvalidLearningRate(self.learning_rate));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_are_valid() {
    let config = TrainConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.window.num_crops(), 9);
  }

  #[test]
  fn rejects_degenerate_settings() {
    let mut config = TrainConfig::default();
    config.window.step = 0;
    assert_eq!(config.validate(), Err(ConfigError::ZeroStep));

    let mut config = TrainConfig::default();
    config.window.crop_width = 300;
    assert!(matches!(
      config.validate(),
      Err(ConfigError::CropLargerThanImage { .. })
    ));

    let mut config = TrainConfig::default();
    config.margin = 50.0;
    assert!(matches!(
      config.validate(),
      Err(ConfigError::MarginTooLarge { .. })
    ));

    let mut config = TrainConfig::default();
    config.batch_size = 0;
    assert_eq!(config.validate(), Err(ConfigError::ZeroBatchSize));

    let mut config = TrainConfig::default();
    config.learning_rate = 0.0;
    assert_eq!(
      config.validate(),
      Err(ConfigError::InvalidLearningRate(0.0))
    );
  }
}
