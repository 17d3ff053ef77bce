// 该文件是 Xunchuang （巡窗） 项目的一部分。
// src/dataset/folder.rs - 磁盘目录数据集
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

use std::{
  fs::File,
  io::BufReader,
  path::{Path, PathBuf},
};

use tracing::{debug, info};

use super::{Dataset, DatasetError, Sample, SampleBuilder};
use crate::{frame::DepthImage, pose::Pose, scene::TRUTH_FILE};

/// 目录中的 `rect{i}.png` 图像与 `truth.json` 真值，图像在访问时读取
pub struct FolderDataset {
  directory: PathBuf,
  truths: Box<[Pose]>,
  builder: SampleBuilder,
}

impl FolderDataset {
  pub fn open<P: AsRef<Path>>(
    directory: P,
    builder: SampleBuilder,
  ) -> Result<Self, DatasetError> {
    let directory = directory.as_ref().to_path_buf();
    let truth_path = directory.join(TRUTH_FILE);
    info!("读取真值文件: {}", truth_path.display());
    let reader = BufReader::new(File::open(&truth_path)?);
    let truths: Vec<Pose> = serde_json::from_reader(reader)?;
    info!("数据集 {} 共 {} 个样本", directory.display(), truths.len());

    Ok(Self {
      directory,
      truths: truths.into_boxed_slice(),
      builder,
    })
  }

  pub fn image_path(&self, index: usize) -> PathBuf {
    self.directory.join(format!("rect{}.png", index))
  }

  pub fn truth(&self, index: usize) -> Option<&Pose> {
    self.truths.get(index)
  }
}

impl Dataset for FolderDataset {
  fn len(&self) -> usize {
    self.truths.len()
  }

  fn get(&self, index: usize) -> Result<Sample, DatasetError> {
    let pose = self.truth(index).ok_or(DatasetError::IndexOutOfRange {
      index,
      len: self.truths.len(),
    })?;
    let path = self.image_path(index);
    debug!("读取样本图像: {}", path.display());
    let image = DepthImage::open(&path).map_err(|source| DatasetError::Frame { index, source })?;
    self.builder.build(index, image, pose)
  }
}
