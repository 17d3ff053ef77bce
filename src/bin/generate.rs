// 该文件是 Xunchuang （巡窗） 项目的一部分。
// src/bin/generate.rs - 合成数据集生成
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

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::info;
use url::Url;

use xunchuang::{
  FromUrl, config::DEFAULT_IMAGE_SIZE, dataset::DataSourceBuilder, scene::SceneGenerator,
};

/// 生成矩形方块深度图像及真值
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输出目录，例如 folder:///data/train
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 图像数量
  #[arg(long, default_value = "100", value_name = "COUNT")]
  pub count: usize,
  /// 随机种子
  #[arg(long, default_value = "0", value_name = "SEED")]
  pub seed: u64,
  #[arg(long, default_value_t = DEFAULT_IMAGE_SIZE, value_name = "PIXELS")]
  pub image_height: usize,
  #[arg(long, default_value_t = DEFAULT_IMAGE_SIZE, value_name = "PIXELS")]
  pub image_width: usize,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  let directory = match DataSourceBuilder::from_url(&args.output)? {
    DataSourceBuilder::Folder(directory) => directory,
    other => bail!("只能生成到目录: {:?}", other),
  };

  info!("输出目录: {}", directory.display());
  info!("图像尺寸: {}x{}", args.image_width, args.image_height);

  let mut generator = SceneGenerator::new(args.image_height, args.image_width, args.seed)?;
  let now = std::time::Instant::now();
  let truths = generator
    .write_dataset(&directory, args.count)
    .with_context(|| format!("写入数据集 {} 失败", directory.display()))?;
  info!("生成 {} 幅图像，耗时: {:.2?}", truths.len(), now.elapsed());

  Ok(())
}
