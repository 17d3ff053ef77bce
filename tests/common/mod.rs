// 该文件是 Xunchuang （巡窗） 项目的一部分。
// tests/common/mod.rs - 集成测试公共配置
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

#![allow(dead_code)]

use xunchuang::{
  config::{TrainConfig, WindowSpec},
  dataset::{DataLoader, MemoryDataset, SampleBuilder},
};

/// 80x80 图像、40x40 窗口、步长 20，共 9 个窗口
pub fn small_config() -> TrainConfig {
  TrainConfig {
    window: WindowSpec {
      image_height: 80,
      image_width: 80,
      crop_height: 40,
      crop_width: 40,
      step: 20,
    },
    margin: 5.0,
    batch_size: 4,
    learning_rate: 1e-3,
    epochs: 1,
    print_freq: 1,
    seed: 7,
  }
}

pub fn synth_loader(config: &TrainConfig, count: usize, seed: u64) -> DataLoader<MemoryDataset> {
  let builder = SampleBuilder::new(config.window, config.margin);
  let dataset = MemoryDataset::synthesize(count, seed, builder).unwrap();
  DataLoader::new(dataset, config.window, config.batch_size)
}
