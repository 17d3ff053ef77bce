// 该文件是 Xunchuang （巡窗） 项目的一部分。
// src/scene.rs - 合成矩形深度图像
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

use std::path::Path;

use image::{GrayImage, Luma};
use imageproc::{drawing::draw_polygon_mut, point::Point};
use rand::{Rng, SeedableRng, rngs::StdRng};
use thiserror::Error;
use tracing::{debug, info};

use crate::{frame::DepthImage, pose::Pose};

pub const BLOCK_LENGTH: f32 = 20.0;
pub const BLOCK_WIDTH: f32 = 30.0;
pub const TRUTH_FILE: &str = "truth.json";

#[derive(Error, Debug)]
pub enum SceneError {
  #[error("图像尺寸 {width}x{height} 放不下 {length}x{block_width} 的方块")]
  ImageTooSmall {
    width: usize,
    height: usize,
    length: f32,
    block_width: f32,
  },
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("真值文件错误: {0}")]
  TruthError(#[from] serde_json::Error),
}

/// 以 `offset` 为中心、旋转 `theta` 的矩形四个顶点
pub fn rectangle_vertices(
  length: f32,
  width: f32,
  theta: f32,
  offset: (f32, f32),
) -> [(f32, f32); 4] {
  let (s, c) = theta.sin_cos();
  let corners = [
    (length / 2.0, width / 2.0),
    (length / 2.0, -width / 2.0),
    (-length / 2.0, -width / 2.0),
    (-length / 2.0, width / 2.0),
  ];
  corners.map(|(x, y)| (c * x - s * y + offset.0, s * x + c * y + offset.1))
}

/// 随机生成单个矩形方块的深度图像及其真值位姿
pub struct SceneGenerator {
  width: usize,
  height: usize,
  length: f32,
  block_width: f32,
  rng: StdRng,
}

impl SceneGenerator {
  pub fn new(height: usize, width: usize, seed: u64) -> Result<Self, SceneError> {
    Self::with_block(height, width, BLOCK_LENGTH, BLOCK_WIDTH, seed)
  }

  pub fn with_block(
    height: usize,
    width: usize,
    length: f32,
    block_width: f32,
    seed: u64,
  ) -> Result<Self, SceneError> {
    if (width as f32) <= 2.0 * length || (height as f32) <= 2.0 * block_width {
      return Err(SceneError::ImageTooSmall {
        width,
        height,
        length,
        block_width,
      });
    }

    Ok(Self {
      width,
      height,
      length,
      block_width,
      rng: StdRng::seed_from_u64(seed),
    })
  }

  pub fn generate(&mut self) -> (DepthImage, Pose) {
    // 方块中心避开边缘，朝向取 [0, 180) 的整数度
    let x_span = self.width as f32 - 2.0 * self.length;
    let y_span = self.height as f32 - 2.0 * self.block_width;
    let x = (self.rng.gen_range(0.0..x_span) as i64) as f32 + self.length;
    let y = (self.rng.gen_range(0.0..y_span) as i64) as f32 + self.block_width;
    let degrees = self.rng.gen_range(0..180u32);
    let theta = (degrees as f32).to_radians();
    let pose = Pose::new(x, y, theta);

    (self.render(&pose), pose)
  }

  pub fn render(&self, pose: &Pose) -> DepthImage {
    let mut canvas = GrayImage::new(self.width as u32, self.height as u32);
    let polygon = rectangle_vertices(self.length, self.block_width, pose.theta, (pose.x, pose.y))
      .map(|(x, y)| Point::new(x.round() as i32, y.round() as i32));
    draw_polygon_mut(&mut canvas, &polygon, Luma([255u8]));
    DepthImage::from(&canvas)
  }

  /// 生成 `count` 张图像写入目录，文件名为 `rect{i}.png`，真值写入 `truth.json`
  pub fn write_dataset<P: AsRef<Path>>(
    &mut self,
    dir: P,
    count: usize,
  ) -> Result<Vec<Pose>, SceneError> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;
    info!("生成 {} 张合成图像到目录: {}", count, dir.display());

    let mut truths = Vec::with_capacity(count);
    for i in 0..count {
      let (image, pose) = self.generate();
      let path = dir.join(format!("rect{}.png", i));
      image.to_gray_image().save(&path)?;
      debug!("写入 {}: {:?}", path.display(), pose);
      truths.push(pose);
    }

    let file = std::fs::File::create(dir.join(TRUTH_FILE))?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), &truths)?;
    Ok(truths)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use approx::assert_abs_diff_eq;

  #[test]
  fn vertices_are_rotated_about_center() {
    let vertices = rectangle_vertices(20.0, 30.0, std::f32::consts::FRAC_PI_2, (100.0, 50.0));
    assert_abs_diff_eq!(vertices[0].0, 85.0, epsilon = 1e-4);
    assert_abs_diff_eq!(vertices[0].1, 60.0, epsilon = 1e-4);
    let cx = vertices.iter().map(|v| v.0).sum::<f32>() / 4.0;
    let cy = vertices.iter().map(|v| v.1).sum::<f32>() / 4.0;
    assert_abs_diff_eq!(cx, 100.0, epsilon = 1e-4);
    assert_abs_diff_eq!(cy, 50.0, epsilon = 1e-4);
  }

  #[test]
  fn generated_pose_stays_inside_policy_bounds() {
    let mut generator = SceneGenerator::new(200, 200, 7).unwrap();
    for _ in 0..50 {
      let (image, pose) = generator.generate();
      assert_eq!(image.width(), 200);
      assert_eq!(image.height(), 200);
      assert!(pose.x >= BLOCK_LENGTH && pose.x < 200.0 - BLOCK_LENGTH);
      assert!(pose.y >= BLOCK_WIDTH && pose.y < 200.0 - BLOCK_WIDTH);
      assert!(pose.theta >= 0.0 && pose.theta < std::f32::consts::PI);
      assert_eq!(pose.x.fract(), 0.0);
      assert_eq!(image.get(pose.x as usize, pose.y as usize), Some(1.0));
    }
  }

  #[test]
  fn same_seed_same_scenes() {
    let mut a = SceneGenerator::new(120, 120, 3).unwrap();
    let mut b = SceneGenerator::new(120, 120, 3).unwrap();
    for _ in 0..5 {
      assert_eq!(a.generate(), b.generate());
    }
  }

  #[test]
  fn rejects_tiny_canvas() {
    assert!(matches!(
      SceneGenerator::new(40, 40, 0),
      Err(SceneError::ImageTooSmall { .. })
    ));
  }
}
