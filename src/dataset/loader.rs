// 该文件是 Xunchuang （巡窗） 项目的一部分。
// src/dataset/loader.rs - 批次加载
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

use burn::tensor::{Tensor, TensorData, backend::Backend};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use tracing::debug;

use super::{Dataset, DatasetError, Sample};
use crate::config::WindowSpec;

/// 一个批次的主机端数据，按 NHW / NK / NK3 展平
#[derive(Debug, Clone)]
pub struct Batch {
  indices: Vec<usize>,
  image_height: usize,
  image_width: usize,
  num_crops: usize,
  images: Vec<f32>,
  labels: Vec<f32>,
  coords: Vec<f32>,
}

impl Batch {
  /// 拼接样本，任何长度与窗口数不一致的样本都会立即报错
  pub fn collate(spec: &WindowSpec, samples: Vec<(usize, Sample)>) -> Result<Self, DatasetError> {
    let num_crops = spec.num_crops();
    let (image_height, image_width) = (spec.image_height, spec.image_width);
    let mut batch = Batch {
      indices: Vec::with_capacity(samples.len()),
      image_height,
      image_width,
      num_crops,
      images: Vec::with_capacity(samples.len() * image_height * image_width),
      labels: Vec::with_capacity(samples.len() * num_crops),
      coords: Vec::with_capacity(samples.len() * num_crops * 3),
    };

    for (index, sample) in samples {
      if sample.labels.len() != num_crops || sample.coords.len() != num_crops {
        return Err(DatasetError::MalformedSample {
          index,
          expected: num_crops,
          labels: sample.labels.len(),
          coords: sample.coords.len(),
        });
      }
      let actual = (sample.image.height(), sample.image.width());
      if actual != (image_height, image_width) {
        return Err(DatasetError::ImageSize {
          index,
          expected: (image_height, image_width),
          actual,
        });
      }

      batch.indices.push(index);
      batch.images.extend_from_slice(sample.image.as_slice());
      batch
        .labels
        .extend(sample.labels.iter().map(|&label| if label { 1.0 } else { 0.0 }));
      batch
        .coords
        .extend(sample.coords.iter().flat_map(|pose| pose.to_array()));
    }

    Ok(batch)
  }

  pub fn len(&self) -> usize {
    self.indices.len()
  }

  pub fn is_empty(&self) -> bool {
    self.indices.is_empty()
  }

  /// 批内样本在数据集中的索引
  pub fn indices(&self) -> &[usize] {
    &self.indices
  }

  pub fn num_crops(&self) -> usize {
    self.num_crops
  }

  /// `[N, H, W]`
  pub fn images<B: Backend>(&self, device: &B::Device) -> Tensor<B, 3> {
    let data = TensorData::new(
      self.images.clone(),
      [self.len(), self.image_height, self.image_width],
    );
    Tensor::from_data(data, device)
  }

  /// `[N, K]`，取值 {0, 1}
  pub fn labels<B: Backend>(&self, device: &B::Device) -> Tensor<B, 2> {
    let data = TensorData::new(self.labels.clone(), [self.len(), self.num_crops]);
    Tensor::from_data(data, device)
  }

  /// `[N, K, 3]`
  pub fn coords<B: Backend>(&self, device: &B::Device) -> Tensor<B, 3> {
    let data = TensorData::new(self.coords.clone(), [self.len(), self.num_crops, 3]);
    Tensor::from_data(data, device)
  }
}

/// 将数据集切分为批次；开启打乱时每轮开始重排一次索引
pub struct DataLoader<D> {
  dataset: D,
  spec: WindowSpec,
  batch_size: usize,
  rng: Option<StdRng>,
}

impl<D: Dataset> DataLoader<D> {
  pub fn new(dataset: D, spec: WindowSpec, batch_size: usize) -> Self {
    Self {
      dataset,
      spec,
      batch_size: batch_size.max(1),
      rng: None,
    }
  }

  pub fn with_shuffle(mut self, seed: u64) -> Self {
    self.rng = Some(StdRng::seed_from_u64(seed));
    self
  }

  pub fn dataset(&self) -> &D {
    &self.dataset
  }

  pub fn spec(&self) -> &WindowSpec {
    &self.spec
  }

  pub fn batch_size(&self) -> usize {
    self.batch_size
  }

  pub fn num_batches(&self) -> usize {
    self.dataset.len().div_ceil(self.batch_size)
  }

  /// 开始新的一轮遍历
  pub fn epoch(&mut self) -> EpochBatches<'_, D> {
    let mut order: Vec<usize> = (0..self.dataset.len()).collect();
    if let Some(rng) = self.rng.as_mut() {
      order.shuffle(rng);
      debug!("本轮样本顺序已打乱");
    }

    EpochBatches {
      dataset: &self.dataset,
      spec: &self.spec,
      batch_size: self.batch_size,
      order,
      cursor: 0,
    }
  }
}

pub struct EpochBatches<'a, D> {
  dataset: &'a D,
  spec: &'a WindowSpec,
  batch_size: usize,
  order: Vec<usize>,
  cursor: usize,
}

impl<D: Dataset> EpochBatches<'_, D> {
  fn load(&self, indices: &[usize]) -> Result<Batch, DatasetError> {
    let samples = indices
      .iter()
      .map(|&index| self.dataset.get(index).map(|sample| (index, sample)))
      .collect::<Result<Vec<_>, _>>()?;
    Batch::collate(self.spec, samples)
  }
}

impl<D: Dataset> Iterator for EpochBatches<'_, D> {
  type Item = Result<Batch, DatasetError>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.cursor >= self.order.len() {
      return None;
    }
    let end = (self.cursor + self.batch_size).min(self.order.len());
    let batch = self.load(&self.order[self.cursor..end]);
    self.cursor = end;
    Some(batch)
  }
}
