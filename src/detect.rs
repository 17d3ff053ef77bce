// 该文件是 Xunchuang （巡窗） 项目的一部分。
// src/detect.rs - 单幅图像位姿检测
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

use std::path::{Path, PathBuf};

use burn::tensor::{Tensor, TensorData, backend::Backend};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  checkpoint::{CheckpointError, CheckpointStore},
  frame::DepthImage,
  model::{Classifier, POSE_OUTPUTS, Regressor},
  pose::Pose,
  window::{CropOrigin, WindowGrid},
};

pub const DEFAULT_THRESHOLD: f32 = 0.5;

#[derive(Error, Debug)]
pub enum DetectError {
  #[error("输入图像尺寸为 {actual:?}，网络期望 {expected:?}")]
  ImageSize {
    expected: (usize, usize),
    actual: (usize, usize),
  },
  #[error("网络输出读取失败: {0}")]
  TensorData(String),
  #[error("检查点错误: {0}")]
  CheckpointError(#[from] CheckpointError),
  #[error("记录写入失败: {0}")]
  RecordError(#[from] serde_json::Error),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 一个判定为含有物体的窗口
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectItem {
  pub window: usize,
  pub origin: CropOrigin,
  pub score: f32,
  pub pose: Pose,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
}

impl DetectResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  /// 概率最高的窗口
  pub fn best(&self) -> Option<&DetectItem> {
    self.items.iter().max_by(|a, b| a.score.total_cmp(&b.score))
  }

  /// 在输入文件旁写入同名 `.json` 记录
  pub fn record<P: AsRef<Path>>(&self, path: P) -> Result<PathBuf, DetectError> {
    let path = path.as_ref().with_extension("json");
    std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
    debug!("检测记录已写入: {}", path.display());
    Ok(path)
  }
}

/// 先分类、再以预测概率为掩码回归，报告概率不低于阈值的全部窗口
///
/// 重叠窗口之间不做抑制。
pub struct PoseDetector<B: Backend> {
  classifier: Classifier<B>,
  regressor: Regressor<B>,
  grid: WindowGrid,
  image_size: (usize, usize),
  threshold: f32,
  device: B::Device,
}

impl<B: Backend> PoseDetector<B> {
  pub fn new(
    classifier: Classifier<B>,
    regressor: Regressor<B>,
    image_size: (usize, usize),
    device: B::Device,
  ) -> Self {
    Self {
      grid: classifier.grid(),
      classifier,
      regressor,
      image_size,
      threshold: DEFAULT_THRESHOLD,
      device,
    }
  }

  pub fn with_threshold(mut self, threshold: f32) -> Self {
    self.threshold = threshold;
    self
  }

  /// 按检查点中保存的窗口配置载入两级网络
  pub fn from_checkpoint(
    store: &CheckpointStore,
    best: bool,
    device: B::Device,
  ) -> Result<Self, DetectError> {
    let meta = store.load_meta(best)?;
    let (classifier, regressor) = store.load_stages::<B>(&meta, best, &device)?;
    let spec = meta.config.window;
    info!(
      "检测器就绪: 图像 {}x{}，{} 个窗口",
      spec.image_width,
      spec.image_height,
      classifier.num_crops()
    );
    Ok(Self::new(
      classifier,
      regressor,
      (spec.image_height, spec.image_width),
      device,
    ))
  }

  pub fn threshold(&self) -> f32 {
    self.threshold
  }

  pub fn grid(&self) -> &WindowGrid {
    &self.grid
  }
}

impl<B: Backend> Model for PoseDetector<B> {
  type Input = DepthImage;
  type Output = DetectResult;
  type Error = DetectError;

  fn infer(&self, input: &DepthImage) -> Result<DetectResult, DetectError> {
    let actual = (input.height(), input.width());
    if actual != self.image_size {
      return Err(DetectError::ImageSize {
        expected: self.image_size,
        actual,
      });
    }

    let (height, width) = self.image_size;
    let data = TensorData::new(input.as_slice().to_vec(), [1, height, width]);
    let images = Tensor::<B, 3>::from_data(data, &self.device);

    let probabilities = self.classifier.forward(images.clone());
    let poses = self.regressor.forward(images, probabilities.clone());

    let scores = probabilities
      .into_data()
      .to_vec::<f32>()
      .map_err(|e| DetectError::TensorData(format!("{:?}", e)))?;
    let poses = poses
      .into_data()
      .to_vec::<f32>()
      .map_err(|e| DetectError::TensorData(format!("{:?}", e)))?;

    let items = self
      .grid
      .iter()
      .zip(scores)
      .zip(poses.chunks_exact(POSE_OUTPUTS))
      .enumerate()
      .filter(|(_, ((_, score), _))| *score >= self.threshold)
      .map(|(window, ((origin, score), pose))| DetectItem {
        window,
        origin: *origin,
        score,
        pose: Pose::new(pose[0], pose[1], pose[2]),
      })
      .collect::<Vec<_>>();

    debug!("{} 个窗口超过阈值 {}", items.len(), self.threshold);
    Ok(DetectResult {
      items: items.into_boxed_slice(),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{InferBackend, config::WindowSpec, model::StageConfig};

  fn detector() -> PoseDetector<InferBackend> {
    let device = Default::default();
    let spec = WindowSpec {
      image_height: 40,
      image_width: 40,
      crop_height: 20,
      crop_width: 20,
      step: 10,
    };
    let config = StageConfig::for_window(&spec);
    PoseDetector::new(
      config.init_classifier(&spec, &device).unwrap(),
      config.init_regressor(&spec, &device).unwrap(),
      (40, 40),
      device,
    )
  }

  #[test]
  fn threshold_filters_windows() {
    let image = DepthImage::zeros(40, 40);

    let all = detector().with_threshold(0.0).infer(&image).unwrap();
    assert_eq!(all.len(), 9);
    let windows: Vec<usize> = all.items.iter().map(|item| item.window).collect();
    assert_eq!(windows, (0..9).collect::<Vec<_>>());
    assert_eq!(all.items[4].origin, CropOrigin { x: 10, y: 10 });
    assert!(all.best().is_some());

    let none = detector().with_threshold(1.5).infer(&image).unwrap();
    assert!(none.is_empty());
    assert!(none.best().is_none());
  }

  #[test]
  fn wrong_image_size_is_rejected() {
    let err = detector().infer(&DepthImage::zeros(40, 30)).unwrap_err();
    assert!(matches!(
      err,
      DetectError::ImageSize {
        expected: (40, 40),
        actual: (40, 30)
      }
    ));
  }

  #[test]
  fn record_lands_next_to_input() {
    let dir = tempfile::tempdir().unwrap();
    let result = detector()
      .with_threshold(0.0)
      .infer(&DepthImage::zeros(40, 40))
      .unwrap();
    let path = result.record(dir.path().join("scene.png")).unwrap();
    assert_eq!(path, dir.path().join("scene.json"));

    let text = std::fs::read_to_string(path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["items"].as_array().map(Vec::len), Some(9));
  }
}
