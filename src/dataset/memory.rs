// 该文件是 Xunchuang （巡窗） 项目的一部分。
// src/dataset/memory.rs - 内存数据集
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

use tracing::info;

use super::{Dataset, DatasetError, Sample, SampleBuilder};
use crate::{frame::DepthImage, pose::Pose, scene::SceneGenerator};

/// 预先持有全部图像与真值的数据集
pub struct MemoryDataset {
  scenes: Vec<(DepthImage, Pose)>,
  builder: SampleBuilder,
}

impl MemoryDataset {
  pub fn new(scenes: Vec<(DepthImage, Pose)>, builder: SampleBuilder) -> Self {
    Self { scenes, builder }
  }

  /// 用固定种子合成 `count` 个场景
  pub fn synthesize(count: usize, seed: u64, builder: SampleBuilder) -> Result<Self, DatasetError> {
    let spec = builder.spec();
    let mut generator = SceneGenerator::new(spec.image_height, spec.image_width, seed)?;
    info!("合成 {} 个场景 (种子 {})", count, seed);
    let scenes = (0..count).map(|_| generator.generate()).collect();
    Ok(Self::new(scenes, builder))
  }

  pub fn truth(&self, index: usize) -> Option<&Pose> {
    self.scenes.get(index).map(|(_, pose)| pose)
  }
}

impl Dataset for MemoryDataset {
  fn len(&self) -> usize {
    self.scenes.len()
  }

  fn get(&self, index: usize) -> Result<Sample, DatasetError> {
    let (image, pose) = self.scenes.get(index).ok_or(DatasetError::IndexOutOfRange {
      index,
      len: self.scenes.len(),
    })?;
    self.builder.build(index, image.clone(), pose)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::WindowSpec;

  #[test]
  fn synthesized_samples_are_index_stable() {
    let builder = SampleBuilder::new(WindowSpec::default(), 15.0);
    let dataset = MemoryDataset::synthesize(4, 5, builder).unwrap();
    assert_eq!(dataset.len(), 4);
    for index in 0..4 {
      let a = dataset.get(index).unwrap();
      let b = dataset.get(index).unwrap();
      assert_eq!(a, b);
      assert_eq!(a.labels.len(), 9);
    }
    assert!(dataset.get(4).is_err());
  }
}
