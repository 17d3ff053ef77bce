// 该文件是 Xunchuang （巡窗） 项目的一部分。
// src/checkpoint.rs - 训练检查点存储
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
  io::{BufReader, BufWriter},
  path::{Path, PathBuf},
};

use burn::{
  module::Module,
  optim::Optimizer,
  record::{BinFileRecorder, FullPrecisionSettings, Recorder, RecorderError},
  tensor::backend::{AutodiffBackend, Backend},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  FromUrl, FromUrlWithScheme,
  config::TrainConfig,
  model::{Classifier, Regressor, StageConfig, StageError},
};

/// 检查点文件名主干
pub const CHECKPOINT_NAME: &str = "checkpoint_sliding";
/// 最优检查点的文件名前缀
pub const BEST_PREFIX: &str = "BEST_";

const CLASSIFIER_SUFFIX: &str = "_classifier";
const REGRESSOR_SUFFIX: &str = "_regressor";
const CLASSIFIER_OPTIM_SUFFIX: &str = "_classifier_optim";
const REGRESSOR_OPTIM_SUFFIX: &str = "_regressor_optim";

#[derive(Error, Debug)]
pub enum CheckpointError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("URI 不是有效的本地路径: {0}")]
  InvalidPath(String),
  #[error("检查点不存在: {0}")]
  NotFound(PathBuf),
  #[error("模型记录错误: {0}")]
  RecorderError(#[from] RecorderError),
  #[error("检查点元数据错误: {0}")]
  MetaError(#[from] serde_json::Error),
  #[error("网络构建错误: {0}")]
  StageError(#[from] StageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 与权重文件一同保存的训练进度
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMeta {
  pub epoch: usize,
  pub epochs_since_improvement: usize,
  pub classification_loss: f32,
  pub regression_loss: f32,
  pub best_loss: Option<f32>,
  pub config: TrainConfig,
  pub saved_at: String,
}

impl CheckpointMeta {
  pub fn new(
    epoch: usize,
    epochs_since_improvement: usize,
    classification_loss: f32,
    regression_loss: f32,
    best_loss: Option<f32>,
    config: TrainConfig,
  ) -> Self {
    Self {
      epoch,
      epochs_since_improvement,
      classification_loss,
      regression_loss,
      best_loss,
      config,
      saved_at: Utc::now().to_rfc3339(),
    }
  }
}

/// 目录形式的检查点存储，`folder:///path/to/dir`
///
/// 每轮固定覆盖 `checkpoint_sliding*`，最优时额外写一份 `BEST_checkpoint_sliding*`。
#[derive(Debug, Clone)]
pub struct CheckpointStore {
  directory: PathBuf,
}

impl FromUrlWithScheme for CheckpointStore {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for CheckpointStore {
  type Error = CheckpointError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(CheckpointError::SchemeMismatch);
    }
    let directory = url
      .to_file_path()
      .map_err(|_| CheckpointError::InvalidPath(url.to_string()))?;
    Ok(Self::new(directory))
  }
}

impl CheckpointStore {
  pub fn new<P: AsRef<Path>>(directory: P) -> Self {
    Self {
      directory: directory.as_ref().to_path_buf(),
    }
  }

  pub fn directory(&self) -> &Path {
    &self.directory
  }

  fn recorder() -> BinFileRecorder<FullPrecisionSettings> {
    BinFileRecorder::<FullPrecisionSettings>::new()
  }

  /// 记录文件路径，不含扩展名
  fn stem(&self, best: bool, suffix: &str) -> PathBuf {
    let prefix = if best { BEST_PREFIX } else { "" };
    self
      .directory
      .join(format!("{}{}{}", prefix, CHECKPOINT_NAME, suffix))
  }

  pub fn meta_path(&self, best: bool) -> PathBuf {
    self.stem(best, "").with_extension("json")
  }

  pub fn exists(&self, best: bool) -> bool {
    self.meta_path(best).exists()
  }

  /// 写入两级网络与两个优化器的状态，`is_best` 时再写一份最优副本
  pub fn save<B, OC, OR>(
    &self,
    meta: &CheckpointMeta,
    classifier: &Classifier<B>,
    regressor: &Regressor<B>,
    classifier_optim: &OC,
    regressor_optim: &OR,
    is_best: bool,
  ) -> Result<(), CheckpointError>
  where
    B: AutodiffBackend,
    OC: Optimizer<Classifier<B>, B>,
    OR: Optimizer<Regressor<B>, B>,
  {
    std::fs::create_dir_all(&self.directory)?;

    let targets: &[bool] = if is_best { &[false, true] } else { &[false] };
    for &best in targets {
      self.write_set(meta, classifier, regressor, classifier_optim, regressor_optim, best)?;
    }

    info!(
      "第 {} 轮检查点已保存到 {}{}",
      meta.epoch,
      self.directory.display(),
      if is_best { "（最优）" } else { "" }
    );
    Ok(())
  }

  fn write_set<B, OC, OR>(
    &self,
    meta: &CheckpointMeta,
    classifier: &Classifier<B>,
    regressor: &Regressor<B>,
    classifier_optim: &OC,
    regressor_optim: &OR,
    best: bool,
  ) -> Result<(), CheckpointError>
  where
    B: AutodiffBackend,
    OC: Optimizer<Classifier<B>, B>,
    OR: Optimizer<Regressor<B>, B>,
  {
    let recorder = Self::recorder();

    classifier
      .clone()
      .save_file(self.stem(best, CLASSIFIER_SUFFIX), &recorder)?;
    regressor
      .clone()
      .save_file(self.stem(best, REGRESSOR_SUFFIX), &recorder)?;
    Recorder::<B>::record(
      &recorder,
      classifier_optim.to_record(),
      self.stem(best, CLASSIFIER_OPTIM_SUFFIX),
    )?;
    Recorder::<B>::record(
      &recorder,
      regressor_optim.to_record(),
      self.stem(best, REGRESSOR_OPTIM_SUFFIX),
    )?;

    let writer = BufWriter::new(File::create(self.meta_path(best))?);
    serde_json::to_writer_pretty(writer, meta)?;
    debug!("检查点文件组已写入: {}", self.stem(best, "").display());
    Ok(())
  }

  pub fn load_meta(&self, best: bool) -> Result<CheckpointMeta, CheckpointError> {
    let path = self.meta_path(best);
    if !path.exists() {
      return Err(CheckpointError::NotFound(path));
    }
    let reader = BufReader::new(File::open(&path)?);
    Ok(serde_json::from_reader(reader)?)
  }

  /// 按元数据中的窗口配置重建网络并载入权重
  pub fn load_stages<B: Backend>(
    &self,
    meta: &CheckpointMeta,
    best: bool,
    device: &B::Device,
  ) -> Result<(Classifier<B>, Regressor<B>), CheckpointError> {
    let spec = &meta.config.window;
    let config = StageConfig::for_window(spec);
    let recorder = Self::recorder();

    let classifier = config
      .init_classifier::<B>(spec, device)?
      .load_file(self.stem(best, CLASSIFIER_SUFFIX), &recorder, device)?;
    let regressor = config
      .init_regressor::<B>(spec, device)?
      .load_file(self.stem(best, REGRESSOR_SUFFIX), &recorder, device)?;

    info!(
      "已载入第 {} 轮的网络权重{}",
      meta.epoch,
      if best { "（最优）" } else { "" }
    );
    Ok((classifier, regressor))
  }

  /// 恢复两个优化器的内部状态
  pub fn load_optimizers<B, OC, OR>(
    &self,
    best: bool,
    classifier_optim: OC,
    regressor_optim: OR,
    device: &B::Device,
  ) -> Result<(OC, OR), CheckpointError>
  where
    B: AutodiffBackend,
    OC: Optimizer<Classifier<B>, B>,
    OR: Optimizer<Regressor<B>, B>,
  {
    let recorder = Self::recorder();
    let classifier_record =
      Recorder::<B>::load(&recorder, self.stem(best, CLASSIFIER_OPTIM_SUFFIX), device)?;
    let regressor_record =
      Recorder::<B>::load(&recorder, self.stem(best, REGRESSOR_OPTIM_SUFFIX), device)?;

    Ok((
      classifier_optim.load_record(classifier_record),
      regressor_optim.load_record(regressor_record),
    ))
  }
}
