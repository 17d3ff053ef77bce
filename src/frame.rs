// 该文件是 Xunchuang （巡窗） 项目的一部分。
// src/frame.rs - 单通道深度图像定义
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

use image::{GrayImage, ImageReader, Luma};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrameError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
}

/// 行优先存储的单通道深度图像，强度范围 [0, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct DepthImage {
  width: usize,
  height: usize,
  data: Box<[f32]>,
}

impl DepthImage {
  pub fn zeros(height: usize, width: usize) -> Self {
    Self {
      width,
      height,
      data: vec![0.0; width * height].into_boxed_slice(),
    }
  }

  pub fn from_vec(height: usize, width: usize, data: Vec<f32>) -> Result<Self, FrameError> {
    if data.len() != width * height {
      return Err(FrameError::LengthMismatch {
        expected: width * height,
        actual: data.len(),
      });
    }

    Ok(Self {
      width,
      height,
      data: data.into_boxed_slice(),
    })
  }

  /// 读取图像文件并转换为灰度
  pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FrameError> {
    let image = ImageReader::open(path)?.decode()?.to_luma8();
    Ok(Self::from(&image))
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }

  pub fn get(&self, x: usize, y: usize) -> Option<f32> {
    if x < self.width && y < self.height {
      Some(self.data[y * self.width + x])
    } else {
      None
    }
  }

  pub fn to_gray_image(&self) -> GrayImage {
    GrayImage::from_fn(self.width as u32, self.height as u32, |x, y| {
      let value = self.data[y as usize * self.width + x as usize];
      Luma([(value.clamp(0.0, 1.0) * 255.0).round() as u8])
    })
  }
}

impl AsRef<[f32]> for DepthImage {
  fn as_ref(&self) -> &[f32] {
    &self.data
  }
}

impl From<&GrayImage> for DepthImage {
  fn from(image: &GrayImage) -> Self {
    let (width, height) = image.dimensions();
    let data = image
      .pixels()
      .map(|pixel| pixel[0] as f32 / 255.0)
      .collect::<Vec<_>>();

    Self {
      width: width as usize,
      height: height as usize,
      data: data.into_boxed_slice(),
    }
  }
}
