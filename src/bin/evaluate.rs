// 该文件是 Xunchuang （巡窗） 项目的一部分。
// src/bin/evaluate.rs - 检查点验证
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
  FromUrl, InferBackend,
  checkpoint::CheckpointStore,
  config::DEFAULT_PRINT_FREQ,
  dataset::{DataLoader, DataSourceBuilder, SampleBuilder},
  task::evaluate,
};

/// 用检查点中的网络在数据集上计算分类与回归损失
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检查点目录，folder:///path
  #[arg(long, value_name = "CHECKPOINT")]
  pub checkpoint: Url,
  /// 验证数据，folder:///path 或 synth://?count=N&seed=S
  #[arg(long, value_name = "SOURCE")]
  pub data: Url,
  /// 使用最优检查点
  #[arg(long)]
  pub best: bool,
  /// 批大小，默认沿用训练配置
  #[arg(long, value_name = "SIZE")]
  pub batch_size: Option<usize>,
  #[arg(long, default_value_t = DEFAULT_PRINT_FREQ, value_name = "BATCHES")]
  pub print_freq: usize,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  info!("检查点目录: {}", args.checkpoint);
  info!("验证数据: {}", args.data);

  let device = <InferBackend as Backend>::Device::default();
  let store = CheckpointStore::from_url(&args.checkpoint)?;
  let meta = store.load_meta(args.best).context("读取检查点元数据失败")?;
  let (classifier, regressor) = store.load_stages::<InferBackend>(&meta, args.best, &device)?;

  let config = &meta.config;
  let builder = SampleBuilder::new(config.window, config.margin);
  let dataset = DataSourceBuilder::from_url(&args.data)?
    .build(builder)
    .context("打开验证数据失败")?;
  let batch_size = args.batch_size.unwrap_or(config.batch_size);
  let mut loader = DataLoader::new(dataset, config.window, batch_size);

  let now = std::time::Instant::now();
  let report = evaluate(
    &classifier,
    &regressor,
    &mut loader,
    meta.epoch,
    args.print_freq,
    &device,
  )?;
  info!("验证完成，耗时: {:.2?}", now.elapsed());
  info!(
    "第 {} 轮检查点: 分类损失 {:.5}, 回归损失 {:.5}, 共 {} 批 (跳过 {})",
    meta.epoch, report.classification_loss, report.regression_loss, report.batches, report.skipped
  );

  Ok(())
}
