// 该文件是 Xunchuang （巡窗） 项目的一部分。
// src/bin/train.rs - 两阶段训练入口
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

use anyhow::{Context, Result};
use burn::tensor::backend::Backend;
use clap::Parser;
use tracing::info;
use url::Url;

use xunchuang::{
  FromUrl, TrainBackend,
  checkpoint::CheckpointStore,
  config::{
    DEFAULT_BATCH_SIZE, DEFAULT_CROP_SIZE, DEFAULT_EPOCHS, DEFAULT_IMAGE_SIZE,
    DEFAULT_LEARNING_RATE, DEFAULT_MARGIN, DEFAULT_PRINT_FREQ, DEFAULT_STEP, TrainConfig,
    WindowSpec,
  },
  dataset::{DataLoader, DataSourceBuilder, SampleBuilder},
  task::adam_trainer,
};

/// 滑动窗口分类与回归网络训练
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 训练数据，folder:///path 或 synth://?count=N&seed=S
  #[arg(long, value_name = "SOURCE")]
  pub train: Url,
  /// 验证数据
  #[arg(long, value_name = "SOURCE")]
  pub valid: Url,
  /// 检查点目录，folder:///path
  #[arg(long, value_name = "CHECKPOINT")]
  pub checkpoint: Url,
  /// 从检查点目录中最近一次保存的状态继续训练
  #[arg(long)]
  pub resume: bool,

  #[arg(long, default_value_t = DEFAULT_IMAGE_SIZE, value_name = "PIXELS")]
  pub image_height: usize,
  #[arg(long, default_value_t = DEFAULT_IMAGE_SIZE, value_name = "PIXELS")]
  pub image_width: usize,
  #[arg(long, default_value_t = DEFAULT_CROP_SIZE, value_name = "PIXELS")]
  pub crop_height: usize,
  #[arg(long, default_value_t = DEFAULT_CROP_SIZE, value_name = "PIXELS")]
  pub crop_width: usize,
  /// 滑动步长
  #[arg(long, default_value_t = DEFAULT_STEP, value_name = "PIXELS")]
  pub step: usize,
  /// 检测边距
  #[arg(long, default_value_t = DEFAULT_MARGIN, value_name = "PIXELS")]
  pub margin: f32,

  #[arg(long, default_value_t = DEFAULT_BATCH_SIZE, value_name = "SIZE")]
  pub batch_size: usize,
  #[arg(long, default_value_t = DEFAULT_LEARNING_RATE, value_name = "LR")]
  pub learning_rate: f64,
  #[arg(long, default_value_t = DEFAULT_EPOCHS, value_name = "COUNT")]
  pub epochs: usize,
  /// 每隔多少个批次输出一次损失
  #[arg(long, default_value_t = DEFAULT_PRINT_FREQ, value_name = "BATCHES")]
  pub print_freq: usize,
  /// 训练数据打乱种子
  #[arg(long, default_value = "0", value_name = "SEED")]
  pub seed: u64,
}

impl Args {
  fn config(&self) -> TrainConfig {
    TrainConfig {
      window: WindowSpec {
        image_height: self.image_height,
        image_width: self.image_width,
        crop_height: self.crop_height,
        crop_width: self.crop_width,
        step: self.step,
      },
      margin: self.margin,
      batch_size: self.batch_size,
      learning_rate: self.learning_rate,
      epochs: self.epochs,
      print_freq: self.print_freq,
      seed: self.seed,
    }
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  let config = args.config();
  config.validate().context("训练配置无效")?;

  info!("训练数据: {}", args.train);
  info!("验证数据: {}", args.valid);
  info!("检查点目录: {}", args.checkpoint);
  info!("训练配置: {:?}", config);

  let device = <TrainBackend as Backend>::Device::default();
  let builder = SampleBuilder::new(config.window, config.margin);
  let train = DataSourceBuilder::from_url(&args.train)?
    .build(builder.clone())
    .context("打开训练数据失败")?;
  let valid = DataSourceBuilder::from_url(&args.valid)?
    .build(builder)
    .context("打开验证数据失败")?;

  let mut train_loader =
    DataLoader::new(train, config.window, config.batch_size).with_shuffle(config.seed);
  let mut valid_loader = DataLoader::new(valid, config.window, config.batch_size);
  let store = CheckpointStore::from_url(&args.checkpoint)?;

  let mut trainer = adam_trainer::<TrainBackend>(config, device)?;
  if args.resume {
    trainer = trainer.resume(&store).context("恢复检查点失败")?;
    info!("从第 {} 轮继续训练", trainer.state().epoch);
  }

  let now = std::time::Instant::now();
  let summaries = trainer.fit(&mut train_loader, &mut valid_loader, &store)?;
  info!("共训练 {} 轮，耗时: {:.2?}", summaries.len(), now.elapsed());

  Ok(())
}
