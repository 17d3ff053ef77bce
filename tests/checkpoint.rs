// 该文件是 Xunchuang （巡窗） 项目的一部分。
// tests/checkpoint.rs - 训练一轮、保存并重新载入
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

use approx::assert_abs_diff_eq;
use xunchuang::{
  InferBackend, TrainBackend,
  checkpoint::CheckpointStore,
  config::WindowSpec,
  task::{TrainError, adam_trainer, evaluate},
};

#[test]
fn saved_checkpoint_reproduces_validation_losses() {
  let dir = tempfile::tempdir().unwrap();
  let store = CheckpointStore::new(dir.path());
  let config = common::small_config();

  let mut train = common::synth_loader(&config, 6, 1).with_shuffle(config.seed);
  let mut valid = common::synth_loader(&config, 4, 2);

  let mut trainer = adam_trainer::<TrainBackend>(config.clone(), Default::default()).unwrap();
  let summaries = trainer.fit(&mut train, &mut valid, &store).unwrap();
  assert_eq!(summaries.len(), 1);

  let summary = &summaries[0];
  assert_eq!(summary.epoch, 0);
  assert!(summary.is_best);
  assert_eq!(summary.epochs_since_improvement, 0);
  assert_eq!(summary.best_loss, Some(summary.validation.classification_loss));
  assert_eq!(summary.classify.batches, 2);
  assert_eq!(summary.regress.batches, 2);
  assert_eq!(trainer.state().epoch, 1);

  for name in [
    "checkpoint_sliding.json",
    "checkpoint_sliding_classifier.bin",
    "checkpoint_sliding_regressor.bin",
    "checkpoint_sliding_classifier_optim.bin",
    "checkpoint_sliding_regressor_optim.bin",
    "BEST_checkpoint_sliding.json",
    "BEST_checkpoint_sliding_classifier.bin",
    "BEST_checkpoint_sliding_regressor.bin",
  ] {
    assert!(dir.path().join(name).exists(), "{} 不存在", name);
  }

  let meta = store.load_meta(false).unwrap();
  assert_eq!(meta.epoch, 0);
  assert_eq!(meta.config, config);
  assert_eq!(meta.classification_loss, summary.validation.classification_loss);

  let device = Default::default();
  let (classifier, regressor) = store.load_stages::<InferBackend>(&meta, false, &device).unwrap();
  let report = evaluate(&classifier, &regressor, &mut valid, 0, 0, &device).unwrap();
  assert_abs_diff_eq!(
    report.classification_loss,
    summary.validation.classification_loss,
    epsilon = 1e-6
  );
  assert_abs_diff_eq!(
    report.regression_loss,
    summary.validation.regression_loss,
    epsilon = 1e-6
  );

  // 不经训练再次载入，结果不变
  let (classifier, regressor) = store.load_stages::<InferBackend>(&meta, true, &device).unwrap();
  let again = evaluate(&classifier, &regressor, &mut valid, 0, 0, &device).unwrap();
  assert_eq!(
    again.classification_loss.to_bits(),
    report.classification_loss.to_bits()
  );
  assert_eq!(again.regression_loss.to_bits(), report.regression_loss.to_bits());
}

#[test]
fn resume_continues_from_saved_epoch() {
  let dir = tempfile::tempdir().unwrap();
  let store = CheckpointStore::new(dir.path());
  let config = common::small_config();
  let mut train = common::synth_loader(&config, 4, 3).with_shuffle(config.seed);
  let mut valid = common::synth_loader(&config, 2, 4);

  let mut first = adam_trainer::<TrainBackend>(config.clone(), Default::default()).unwrap();
  first.fit(&mut train, &mut valid, &store).unwrap();
  let best = first.state().best_loss;

  let mut longer = config.clone();
  longer.epochs = 2;
  let mut resumed = adam_trainer::<TrainBackend>(longer, Default::default())
    .unwrap()
    .resume(&store)
    .unwrap();
  assert_eq!(resumed.state().epoch, 1);
  assert_eq!(resumed.state().best_loss, best);

  let summaries = resumed.fit(&mut train, &mut valid, &store).unwrap();
  assert_eq!(summaries.len(), 1);
  assert_eq!(summaries[0].epoch, 1);
  assert_eq!(store.load_meta(false).unwrap().epoch, 1);

  let mut other = config;
  other.window = WindowSpec {
    step: 40,
    ..other.window
  };
  let err = adam_trainer::<TrainBackend>(other, Default::default())
    .unwrap()
    .resume(&store)
    .err()
    .unwrap();
  assert!(matches!(err, TrainError::WindowMismatch { .. }));
}
