// 该文件是 Xunchuang （巡窗） 项目的一部分。
// tests/dataset.rs - 磁盘数据集与批次加载
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

mod common;

use url::Url;
use xunchuang::{
  FromUrl, InferBackend,
  config::WindowSpec,
  dataset::{DataLoader, DataSourceBuilder, Dataset, SampleBuilder},
  pose::Pose,
  scene::SceneGenerator,
};

#[test]
fn folder_source_feeds_aligned_batches() {
  let dir = tempfile::tempdir().unwrap();
  let truths = SceneGenerator::new(200, 200, 21)
    .unwrap()
    .write_dataset(dir.path(), 5)
    .unwrap();

  let url = Url::parse(&format!("folder://{}", dir.path().display())).unwrap();
  let spec = WindowSpec::default();
  let builder = SampleBuilder::new(spec, 15.0);
  let source = DataSourceBuilder::from_url(&url).unwrap().build(builder).unwrap();
  assert_eq!(source.len(), 5);

  for (index, truth) in truths.iter().enumerate() {
    let sample = source.get(index).unwrap();
    assert_eq!(sample.labels.len(), 9);
    for (label, coord) in sample.labels.iter().zip(sample.coords.iter()) {
      if *label {
        assert_eq!(coord, truth);
      } else {
        assert_eq!(*coord, Pose::ZERO);
      }
    }
  }

  let mut loader = DataLoader::new(source, spec, 2).with_shuffle(3);
  let device = Default::default();
  let mut total = 0;
  for batch in loader.epoch() {
    let batch = batch.unwrap();
    total += batch.len();
    assert_eq!(batch.images::<InferBackend>(&device).dims(), [batch.len(), 200, 200]);
    assert_eq!(batch.labels::<InferBackend>(&device).dims(), [batch.len(), 9]);
    assert_eq!(batch.coords::<InferBackend>(&device).dims(), [batch.len(), 9, 3]);
  }
  assert_eq!(total, 5);
}

#[test]
fn shuffle_is_reproducible_for_a_seed() {
  let config = common::small_config();
  let order = |seed: u64| -> Vec<usize> {
    let mut loader = common::synth_loader(&config, 9, 5).with_shuffle(seed);
    loader
      .epoch()
      .flat_map(|batch| batch.unwrap().indices().to_vec())
      .collect()
  };
  assert_eq!(order(11), order(11));

  let mut sorted = order(11);
  sorted.sort_unstable();
  assert_eq!(sorted, (0..9).collect::<Vec<_>>());
}
