// 该文件是 Xunchuang （巡窗） 项目的一部分。
// src/bin/detect.rs - 单幅图像检测
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

use anyhow::{Context, Result};
use burn::tensor::backend::Backend;
use clap::Parser;
use tracing::{info, warn};
use url::Url;

use xunchuang::{
  FromUrl, InferBackend,
  checkpoint::CheckpointStore,
  detect::{DEFAULT_THRESHOLD, Model, PoseDetector},
  frame::DepthImage,
};

/// 对图像逐窗口检测方块位姿
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检查点目录，folder:///path
  #[arg(long, value_name = "CHECKPOINT")]
  pub checkpoint: Url,
  /// 输入图像
  #[arg(long, value_name = "IMAGE", num_args = 1..)]
  pub input: Vec<PathBuf>,
  /// 窗口判定阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_THRESHOLD, value_name = "THRESHOLD")]
  pub threshold: f32,
  /// 使用最优检查点
  #[arg(long)]
  pub best: bool,
  /// 在输入图像旁写入 JSON 记录
  #[arg(long)]
  pub record: bool,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  info!("检查点目录: {}", args.checkpoint);
  info!("判定阈值: {}", args.threshold);

  let device = <InferBackend as Backend>::Device::default();
  let store = CheckpointStore::from_url(&args.checkpoint)?;
  let detector = PoseDetector::<InferBackend>::from_checkpoint(&store, args.best, device)?
    .with_threshold(args.threshold);

  for path in args.input.iter() {
    let image =
      DepthImage::open(path).with_context(|| format!("读取图像 {} 失败", path.display()))?;
    let now = std::time::Instant::now();
    let result = detector.infer(&image)?;
    info!("{} 推理完成，耗时: {:.2?}", path.display(), now.elapsed());

    match result.best() {
      Some(best) => info!(
        "{} 共 {} 个窗口超过阈值，最高为窗口 {} 概率 {:.4}",
        path.display(),
        result.len(),
        best.window,
        best.score
      ),
      None => warn!("{} 中没有窗口超过阈值", path.display()),
    }
    for item in result.items.iter() {
      info!(
        "窗口 {} ({}, {}) 概率 {:.4} 位姿 ({:.2}, {:.2}, {:.4})",
        item.window,
        item.origin.x,
        item.origin.y,
        item.score,
        item.pose.x,
        item.pose.y,
        item.pose.theta
      );
    }

    if args.record {
      let record = result.record(path)?;
      info!("记录已写入: {}", record.display());
    }
  }

  Ok(())
}
