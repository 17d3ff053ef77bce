// 该文件是 Xunchuang （巡窗） 项目的一部分。
// src/dataset.rs - 样本构建与数据集
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

use std::path::PathBuf;

use thiserror::Error;
use url::Url;

use crate::{
  FromUrl,
  config::WindowSpec,
  frame::{DepthImage, FrameError},
  pose::Pose,
  scene::SceneError,
  window::WindowGrid,
};

mod folder;
mod loader;
mod memory;

pub use self::folder::FolderDataset;
pub use self::loader::{Batch, DataLoader, EpochBatches};
pub use self::memory::MemoryDataset;

#[derive(Error, Debug)]
pub enum DatasetError {
  #[error("样本索引 {index} 越界，数据集长度为 {len}")]
  IndexOutOfRange { index: usize, len: usize },
  #[error("样本 {index} 图像尺寸为 {actual:?}，期望 {expected:?}")]
  ImageSize {
    index: usize,
    expected: (usize, usize),
    actual: (usize, usize),
  },
  #[error("样本 {index} 格式错误: 窗口数 {expected}, 标签数 {labels}, 坐标数 {coords}")]
  MalformedSample {
    index: usize,
    expected: usize,
    labels: usize,
    coords: usize,
  },
  #[error("数据集为空")]
  Empty,
  #[error("读取样本 {index} 失败: {source}")]
  Frame {
    index: usize,
    #[source]
    source: FrameError,
  },
  #[error("真值文件错误: {0}")]
  TruthError(#[from] serde_json::Error),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("合成数据错误: {0}")]
  SceneError(#[from] SceneError),
  #[error("URI 参数错误: {0}")]
  InvalidQuery(String),
  #[error("URI 不是有效的本地路径: {0}")]
  InvalidPath(String),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

/// 单个样本：整幅图像、窗口标签向量与窗口坐标矩阵，均按窗口网格顺序对齐
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
  pub image: DepthImage,
  pub labels: Box<[bool]>,
  pub coords: Box<[Pose]>,
}

impl Sample {
  pub fn num_positive(&self) -> usize {
    self.labels.iter().filter(|&&label| label).count()
  }
}

/// 由图像与真值位姿构建样本
#[derive(Debug, Clone)]
pub struct SampleBuilder {
  spec: WindowSpec,
  grid: WindowGrid,
  margin: f32,
}

impl SampleBuilder {
  pub fn new(spec: WindowSpec, margin: f32) -> Self {
    Self {
      grid: spec.grid(),
      spec,
      margin,
    }
  }

  pub fn spec(&self) -> &WindowSpec {
    &self.spec
  }

  pub fn grid(&self) -> &WindowGrid {
    &self.grid
  }

  pub fn margin(&self) -> f32 {
    self.margin
  }

  pub fn build(
    &self,
    index: usize,
    image: DepthImage,
    pose: &Pose,
  ) -> Result<Sample, DatasetError> {
    let expected = (self.spec.image_height, self.spec.image_width);
    let actual = (image.height(), image.width());
    if expected != actual {
      return Err(DatasetError::ImageSize {
        index,
        expected,
        actual,
      });
    }

    let (labels, coords) = self.grid.label(pose, self.margin);
    Ok(Sample {
      image,
      labels,
      coords,
    })
  }
}

/// 可按索引随机访问的数据集，同一索引总是给出相同的真值
pub trait Dataset {
  fn len(&self) -> usize;

  fn get(&self, index: usize) -> Result<Sample, DatasetError>;

  fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl<D: Dataset + ?Sized> Dataset for &D {
  fn len(&self) -> usize {
    (**self).len()
  }

  fn get(&self, index: usize) -> Result<Sample, DatasetError> {
    (**self).get(index)
  }
}

/// 从 URI 解析出的数据来源
///
/// - `folder:///path/to/dir`：磁盘上的 `rect{i}.png` 与 `truth.json`
/// - `synth://?count=N&seed=S`：内存中即时合成
#[derive(Debug, Clone, PartialEq)]
pub enum DataSourceBuilder {
  Folder(PathBuf),
  Synth { count: usize, seed: u64 },
}

const FOLDER_SCHEME: &str = "folder";
const SYNTH_SCHEME: &str = "synth";
const DEFAULT_SYNTH_COUNT: usize = 100;

impl FromUrl for DataSourceBuilder {
  type Error = DatasetError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      FOLDER_SCHEME => url
        .to_file_path()
        .map(DataSourceBuilder::Folder)
        .map_err(|_| DatasetError::InvalidPath(url.to_string())),
      SYNTH_SCHEME => {
        let mut count = DEFAULT_SYNTH_COUNT;
        let mut seed = 0u64;
        for (k, v) in url.query_pairs() {
          match k.as_ref() {
            "count" => {
              count = v
                .parse()
                .map_err(|_| DatasetError::InvalidQuery(format!("count={}", v)))?
            }
            "seed" => {
              seed = v
                .parse()
                .map_err(|_| DatasetError::InvalidQuery(format!("seed={}", v)))?
            }
            _ => {}
          }
        }
        Ok(DataSourceBuilder::Synth { count, seed })
      }
      _ => Err(DatasetError::SchemeMismatch),
    }
  }
}

impl DataSourceBuilder {
  pub fn build(self, builder: SampleBuilder) -> Result<DataSource, DatasetError> {
    match self {
      DataSourceBuilder::Folder(dir) => Ok(DataSource::Folder(FolderDataset::open(dir, builder)?)),
      DataSourceBuilder::Synth { count, seed } => Ok(DataSource::Memory(MemoryDataset::synthesize(
        count, seed, builder,
      )?)),
    }
  }
}

pub enum DataSource {
  Folder(FolderDataset),
  Memory(MemoryDataset),
}

impl Dataset for DataSource {
  fn len(&self) -> usize {
    match self {
      DataSource::Folder(dataset) => dataset.len(),
      DataSource::Memory(dataset) => dataset.len(),
    }
  }

  fn get(&self, index: usize) -> Result<Sample, DatasetError> {
    match self {
      DataSource::Folder(dataset) => dataset.get(index),
      DataSource::Memory(dataset) => dataset.get(index),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builder_aligns_labels_and_coords_with_grid() {
    let builder = SampleBuilder::new(WindowSpec::default(), 15.0);
    let pose = Pose::new(100.0, 100.0, 0.5);
    let sample = builder.build(0, DepthImage::zeros(200, 200), &pose).unwrap();

    assert_eq!(sample.labels.len(), builder.grid().len());
    assert_eq!(sample.coords.len(), builder.grid().len());
    assert_eq!(sample.num_positive(), 1);
    assert_eq!(sample.coords[4], pose);
  }

  #[test]
  fn builder_rejects_wrong_image_size() {
    let builder = SampleBuilder::new(WindowSpec::default(), 15.0);
    let err = builder
      .build(3, DepthImage::zeros(100, 200), &Pose::ZERO)
      .unwrap_err();
    assert!(matches!(
      err,
      DatasetError::ImageSize {
        index: 3,
        expected: (200, 200),
        actual: (100, 200)
      }
    ));
  }

  #[test]
  fn parses_source_urls() {
    let url = Url::parse("folder:///tmp/data/test").unwrap();
    assert_eq!(
      DataSourceBuilder::from_url(&url).unwrap(),
      DataSourceBuilder::Folder(PathBuf::from("/tmp/data/test"))
    );

    let url = Url::parse("folder:///tmp/my%20data").unwrap();
    assert_eq!(
      DataSourceBuilder::from_url(&url).unwrap(),
      DataSourceBuilder::Folder(PathBuf::from("/tmp/my data"))
    );

    let url = Url::parse("folder://remote/tmp/data").unwrap();
    assert!(matches!(
      DataSourceBuilder::from_url(&url),
      Err(DatasetError::InvalidPath(_))
    ));

    let url = Url::parse("synth://?count=12&seed=9").unwrap();
    assert_eq!(
      DataSourceBuilder::from_url(&url).unwrap(),
      DataSourceBuilder::Synth { count: 12, seed: 9 }
    );

    let url = Url::parse("synth://?count=many").unwrap();
    assert!(matches!(
      DataSourceBuilder::from_url(&url),
      Err(DatasetError::InvalidQuery(_))
    ));

    let url = Url::parse("http://example.com/data").unwrap();
    assert!(matches!(
      DataSourceBuilder::from_url(&url),
      Err(DatasetError::SchemeMismatch)
    ));
  }
}
