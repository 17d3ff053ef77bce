// 该文件是 Xunchuang （巡窗） 项目的一部分。
// src/task.rs - 两阶段训练与验证流程
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

use std::{fmt, time::Instant};

use burn::{
  module::AutodiffModule,
  optim::{AdamConfig, GradientsParams, Optimizer},
  tensor::{
    Tensor,
    backend::{AutodiffBackend, Backend},
  },
};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
  checkpoint::{CheckpointError, CheckpointMeta, CheckpointStore},
  config::{ConfigError, TrainConfig, WindowSpec},
  dataset::{Batch, DataLoader, Dataset, DatasetError},
  meter::AverageMeter,
  model::{
    Classifier, Regressor, StageConfig, StageError, binary_cross_entropy_with_logits,
    joint_losses, mean_squared_error, scalar,
  },
};

#[derive(Error, Debug)]
pub enum TrainError {
  #[error("配置错误: {0}")]
  ConfigError(#[from] ConfigError),
  #[error("网络构建错误: {0}")]
  StageError(#[from] StageError),
  #[error("数据错误: {0}")]
  DatasetError(#[from] DatasetError),
  #[error("检查点错误: {0}")]
  CheckpointError(#[from] CheckpointError),
  #[error("检查点窗口配置 {saved:?} 与当前配置 {current:?} 不一致")]
  WindowMismatch {
    saved: WindowSpec,
    current: WindowSpec,
  },
  #[error("第 {epoch} 轮 {phase} 阶段所有批次的损失均为非有限值")]
  NonFiniteLoss { phase: EpochPhase, epoch: usize },
}

/// 每轮内依次经历的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochPhase {
  ClassifyTrain,
  RegressTrain,
  Validate,
  Checkpoint,
}

impl fmt::Display for EpochPhase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      EpochPhase::ClassifyTrain => "分类训练",
      EpochPhase::RegressTrain => "回归训练",
      EpochPhase::Validate => "验证",
      EpochPhase::Checkpoint => "检查点",
    };
    f.write_str(name)
  }
}

/// 跨轮次传递的训练进度
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingState {
  /// 下一轮的序号
  pub epoch: usize,
  pub epochs_since_improvement: usize,
  pub best_loss: Option<f32>,
}

impl TrainingState {
  /// 从上一次保存的检查点继续
  pub fn resumed(meta: &CheckpointMeta) -> Self {
    Self {
      epoch: meta.epoch + 1,
      epochs_since_improvement: meta.epochs_since_improvement,
      best_loss: meta.best_loss,
    }
  }

  /// 记录一轮的验证分类损失，返回是否为新的最优
  pub fn observe(&mut self, loss: f32) -> bool {
    let improved = loss.is_finite() && self.best_loss.is_none_or(|best| loss < best);
    if improved {
      self.best_loss = Some(loss);
      self.epochs_since_improvement = 0;
    } else {
      self.epochs_since_improvement += 1;
    }
    improved
  }
}

/// 单个训练阶段的统计
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassReport {
  pub loss: f32,
  pub batches: usize,
  pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationReport {
  pub classification_loss: f32,
  pub regression_loss: f32,
  pub batches: usize,
  pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EpochSummary {
  pub epoch: usize,
  pub classify: PassReport,
  pub regress: PassReport,
  pub validation: ValidationReport,
  pub is_best: bool,
  pub epochs_since_improvement: usize,
  pub best_loss: Option<f32>,
}

/// 逐批执行 `step`，`step` 返回 `None` 表示该批损失非有限、未更新参数
fn run_pass<D, F>(
  phase: EpochPhase,
  epoch: usize,
  loader: &mut DataLoader<D>,
  print_freq: usize,
  mut step: F,
) -> Result<PassReport, TrainError>
where
  D: Dataset,
  F: FnMut(&Batch) -> Option<f32>,
{
  if loader.dataset().is_empty() {
    return Err(DatasetError::Empty.into());
  }

  let num_batches = loader.num_batches();
  let mut batch_time = AverageMeter::new();
  let mut data_time = AverageMeter::new();
  let mut losses = AverageMeter::new();
  let mut skipped = 0;

  let mut end = Instant::now();
  for (index, batch) in loader.epoch().enumerate() {
    let batch = batch?;
    data_time.update_duration(end.elapsed());

    match step(&batch) {
      Some(loss) => losses.update(loss, batch.len()),
      None => {
        skipped += 1;
        error!(
          "第 {} 轮 {} 阶段第 {} 批损失为非有限值，跳过参数更新",
          epoch, phase, index
        );
      }
    }

    batch_time.update_duration(end.elapsed());
    end = Instant::now();

    if print_freq > 0 && index % print_freq == 0 {
      info!(
        "[{}] 第 {} 轮 [{}/{}]\t批耗时 {}\t数据耗时 {}\t损失 {}",
        phase, epoch, index, num_batches, batch_time, data_time, losses
      );
    }
  }

  if losses.is_empty() {
    return Err(TrainError::NonFiniteLoss { phase, epoch });
  }

  Ok(PassReport {
    loss: losses.avg,
    batches: num_batches,
    skipped,
  })
}

/// 在给定数据上计算两项损失，回归掩码取分类器的预测概率
pub fn evaluate<B: Backend, D: Dataset>(
  classifier: &Classifier<B>,
  regressor: &Regressor<B>,
  loader: &mut DataLoader<D>,
  epoch: usize,
  print_freq: usize,
  device: &B::Device,
) -> Result<ValidationReport, TrainError> {
  let phase = EpochPhase::Validate;
  if loader.dataset().is_empty() {
    return Err(DatasetError::Empty.into());
  }

  let num_batches = loader.num_batches();
  let mut batch_time = AverageMeter::new();
  let mut classification = AverageMeter::new();
  let mut regression = AverageMeter::new();
  let mut skipped = 0;

  let mut end = Instant::now();
  for (index, batch) in loader.epoch().enumerate() {
    let batch = batch?;
    let losses = joint_losses(
      classifier,
      regressor,
      batch.images::<B>(device),
      batch.labels::<B>(device),
      batch.coords::<B>(device),
    );
    let (c_loss, r_loss) = (scalar(losses.classification), scalar(losses.regression));

    if c_loss.is_finite() && r_loss.is_finite() {
      classification.update(c_loss, batch.len());
      regression.update(r_loss, batch.len());
    } else {
      skipped += 1;
      error!(
        "第 {} 轮验证第 {} 批损失为非有限值: 分类 {}, 回归 {}",
        epoch, index, c_loss, r_loss
      );
    }

    batch_time.update_duration(end.elapsed());
    end = Instant::now();

    if print_freq > 0 && index % print_freq == 0 {
      info!(
        "[{}] [{}/{}]\t批耗时 {}\t分类损失 {}\t回归损失 {}",
        phase, index, num_batches, batch_time, classification, regression
      );
    }
  }

  if classification.is_empty() {
    return Err(TrainError::NonFiniteLoss { phase, epoch });
  }

  Ok(ValidationReport {
    classification_loss: classification.avg,
    regression_loss: regression.avg,
    batches: num_batches,
    skipped,
  })
}

/// 两级网络的训练器，两个网络各自持有独立的优化器
pub struct Trainer<B: AutodiffBackend, OC, OR> {
  config: TrainConfig,
  classifier: Classifier<B>,
  regressor: Regressor<B>,
  classifier_optim: OC,
  regressor_optim: OR,
  state: TrainingState,
  device: B::Device,
}

/// 以 Adam 优化器创建训练器
pub fn adam_trainer<B: AutodiffBackend>(
  config: TrainConfig,
  device: B::Device,
) -> Result<
  Trainer<B, impl Optimizer<Classifier<B>, B>, impl Optimizer<Regressor<B>, B>>,
  TrainError,
> {
  Trainer::new(
    config,
    device,
    AdamConfig::new().init(),
    AdamConfig::new().init(),
  )
}

impl<B, OC, OR> Trainer<B, OC, OR>
where
  B: AutodiffBackend,
  OC: Optimizer<Classifier<B>, B>,
  OR: Optimizer<Regressor<B>, B>,
{
  /// 校验配置并构建两级网络，窗口数不一致时在训练开始前失败
  pub fn new(
    config: TrainConfig,
    device: B::Device,
    classifier_optim: OC,
    regressor_optim: OR,
  ) -> Result<Self, TrainError> {
    config.validate()?;
    let stage = StageConfig::for_window(&config.window);
    let classifier = stage.init_classifier::<B>(&config.window, &device)?;
    let regressor = stage.init_regressor::<B>(&config.window, &device)?;

    Ok(Self {
      config,
      classifier,
      regressor,
      classifier_optim,
      regressor_optim,
      state: TrainingState::default(),
      device,
    })
  }

  /// 从检查点恢复权重、优化器状态与训练进度
  pub fn resume(self, store: &CheckpointStore) -> Result<Self, TrainError> {
    let meta = store.load_meta(false)?;
    if meta.config.window != self.config.window {
      return Err(TrainError::WindowMismatch {
        saved: meta.config.window,
        current: self.config.window,
      });
    }

    let (classifier, regressor) = store.load_stages::<B>(&meta, false, &self.device)?;
    let (classifier_optim, regressor_optim) = store.load_optimizers::<B, _, _>(
      false,
      self.classifier_optim,
      self.regressor_optim,
      &self.device,
    )?;
    let state = TrainingState::resumed(&meta);
    info!(
      "从第 {} 轮检查点恢复，最优损失 {:?}，{} 轮未改进",
      meta.epoch, state.best_loss, state.epochs_since_improvement
    );

    Ok(Self {
      config: self.config,
      classifier,
      regressor,
      classifier_optim,
      regressor_optim,
      state,
      device: self.device,
    })
  }

  pub fn state(&self) -> &TrainingState {
    &self.state
  }

  /// 遍历全部训练批次，只更新分类器
  pub fn classify_pass<D: Dataset>(
    &mut self,
    epoch: usize,
    loader: &mut DataLoader<D>,
  ) -> Result<PassReport, TrainError> {
    let print_freq = self.config.print_freq;
    let lr = self.config.learning_rate;
    let device = &self.device;
    let classifier = &mut self.classifier;
    let optim = &mut self.classifier_optim;

    run_pass(EpochPhase::ClassifyTrain, epoch, loader, print_freq, |batch| {
      let logits = classifier.logits(batch.images::<B>(device));
      let loss = binary_cross_entropy_with_logits(logits, batch.labels::<B>(device));
      let value = scalar(loss.clone());
      if !value.is_finite() {
        return None;
      }

      let grads = GradientsParams::from_grads(loss.backward(), &*classifier);
      *classifier = optim.step(lr, classifier.clone(), grads);
      Some(value)
    })
  }

  /// 再次遍历全部训练批次，分类器权重固定，其预测概率作为回归掩码，只更新回归器
  pub fn regress_pass<D: Dataset>(
    &mut self,
    epoch: usize,
    loader: &mut DataLoader<D>,
  ) -> Result<PassReport, TrainError> {
    let print_freq = self.config.print_freq;
    let lr = self.config.learning_rate;
    let device = &self.device;
    let classifier = self.classifier.valid();
    let regressor = &mut self.regressor;
    let optim = &mut self.regressor_optim;

    run_pass(EpochPhase::RegressTrain, epoch, loader, print_freq, |batch| {
      let images = batch.images::<B>(device);
      let mask = Tensor::<B, 2>::from_inner(classifier.forward(images.clone().inner()));
      let poses = regressor.forward(images, mask);
      let loss = mean_squared_error(poses, batch.coords::<B>(device));
      let value = scalar(loss.clone());
      if !value.is_finite() {
        return None;
      }

      let grads = GradientsParams::from_grads(loss.backward(), &*regressor);
      *regressor = optim.step(lr, regressor.clone(), grads);
      Some(value)
    })
  }

  /// 在验证集上评估当前权重
  pub fn validate<D: Dataset>(
    &self,
    epoch: usize,
    loader: &mut DataLoader<D>,
  ) -> Result<ValidationReport, TrainError> {
    evaluate(
      &self.classifier.valid(),
      &self.regressor.valid(),
      loader,
      epoch,
      self.config.print_freq,
      &self.device,
    )
  }

  /// 分类训练 → 回归训练 → 验证 → 检查点
  pub fn run_epoch<DT: Dataset, DV: Dataset>(
    &mut self,
    train: &mut DataLoader<DT>,
    valid: &mut DataLoader<DV>,
    store: &CheckpointStore,
  ) -> Result<EpochSummary, TrainError> {
    let epoch = self.state.epoch;
    info!("第 {} 轮开始", epoch);

    let classify = self.classify_pass(epoch, train)?;
    let regress = self.regress_pass(epoch, train)?;
    let validation = self.validate(epoch, valid)?;
    let is_best = self.state.observe(validation.classification_loss);

    info!(
      "[{}] 第 {} 轮: 分类损失 {:.4}, 回归损失 {:.4}, 最优 {:?}, {} 轮未改进",
      EpochPhase::Checkpoint,
      epoch,
      validation.classification_loss,
      validation.regression_loss,
      self.state.best_loss,
      self.state.epochs_since_improvement
    );
    let skipped = classify.skipped + regress.skipped + validation.skipped;
    if skipped > 0 {
      warn!("第 {} 轮共跳过 {} 个批次", epoch, skipped);
    }

    let meta = CheckpointMeta::new(
      epoch,
      self.state.epochs_since_improvement,
      validation.classification_loss,
      validation.regression_loss,
      self.state.best_loss,
      self.config.clone(),
    );
    store.save(
      &meta,
      &self.classifier,
      &self.regressor,
      &self.classifier_optim,
      &self.regressor_optim,
      is_best,
    )?;
    self.state.epoch = epoch + 1;

    Ok(EpochSummary {
      epoch,
      classify,
      regress,
      validation,
      is_best,
      epochs_since_improvement: self.state.epochs_since_improvement,
      best_loss: self.state.best_loss,
    })
  }

  /// 运行至配置的轮数；未改进的轮数只做记录，不提前停止
  pub fn fit<DT: Dataset, DV: Dataset>(
    &mut self,
    train: &mut DataLoader<DT>,
    valid: &mut DataLoader<DV>,
    store: &CheckpointStore,
  ) -> Result<Vec<EpochSummary>, TrainError> {
    if self.state.epoch >= self.config.epochs {
      warn!(
        "已完成 {} 轮，不少于配置的 {} 轮，无需继续训练",
        self.state.epoch, self.config.epochs
      );
    }

    let mut summaries = Vec::new();
    while self.state.epoch < self.config.epochs {
      summaries.push(self.run_epoch(train, valid, store)?);
    }
    info!("训练完成，最优验证分类损失 {:?}", self.state.best_loss);
    Ok(summaries)
  }
}
