// 该文件是 Xunchuang （巡窗） 项目的一部分。
// tests/pipeline.rs - 分类到回归的端到端前向
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

use xunchuang::{
  InferBackend,
  config::{ConfigError, WindowSpec},
  dataset::{Batch, SampleBuilder},
  model::{StageConfig, StageError, joint_losses, mean_squared_error, scalar},
  pose::Pose,
  scene::SceneGenerator,
  task::{TrainError, adam_trainer},
};

fn single_sample_batch() -> Batch {
  let spec = WindowSpec::default();
  let pose = Pose::new(100.0, 100.0, 0.5);
  let image = SceneGenerator::new(200, 200, 0).unwrap().render(&pose);
  let sample = SampleBuilder::new(spec, 15.0).build(0, image, &pose).unwrap();

  assert_eq!(sample.num_positive(), 1);
  assert!(sample.labels[4]);
  assert_eq!(sample.coords[4], pose);
  Batch::collate(&spec, vec![(0, sample)]).unwrap()
}

#[test]
fn predicted_mask_pipeline_is_finite_and_repeatable() {
  let device = Default::default();
  let spec = WindowSpec::default();
  let config = StageConfig::for_window(&spec);
  let classifier = config.init_classifier::<InferBackend>(&spec, &device).unwrap();
  let regressor = config.init_regressor::<InferBackend>(&spec, &device).unwrap();
  let batch = single_sample_batch();

  let run = || {
    let losses = joint_losses(
      &classifier,
      &regressor,
      batch.images(&device),
      batch.labels(&device),
      batch.coords(&device),
    );
    (scalar(losses.classification), scalar(losses.regression))
  };

  let (c1, r1) = run();
  let (c2, r2) = run();
  assert!(r1.is_finite() && r1 >= 0.0);
  assert!(c1.is_finite() && c1 >= 0.0);
  assert_eq!(c1.to_bits(), c2.to_bits());
  assert_eq!(r1.to_bits(), r2.to_bits());

  // 回归掩码来自分类器预测
  let images = batch.images::<InferBackend>(&device);
  let mask = classifier.forward(images.clone());
  let manual = scalar(mean_squared_error(
    regressor.forward(images, mask),
    batch.coords(&device),
  ));
  assert_eq!(manual.to_bits(), r1.to_bits());
}

#[test]
fn width_mismatch_aborts_before_training() {
  let device = Default::default();
  let spec = WindowSpec::default();
  let err = StageConfig::new(16, 100, 100)
    .init_regressor::<InferBackend>(&spec, &device)
    .unwrap_err();
  assert_eq!(
    err,
    StageError::CropCountMismatch {
      stage: "regressor",
      expected: 16,
      actual: 9
    }
  );
}

#[test]
fn invalid_config_is_rejected_by_trainer() {
  let mut config = common::small_config();
  config.margin = 20.0;
  let result = adam_trainer::<xunchuang::TrainBackend>(config, Default::default());
  assert!(matches!(
    result,
    Err(TrainError::ConfigError(ConfigError::MarginTooLarge { .. }))
  ));
}
