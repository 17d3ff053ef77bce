// 该文件是 Xunchuang （巡窗） 项目的一部分。
// src/model/crops.rs - 窗口裁剪与掩码
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

use burn::tensor::{Tensor, backend::Backend};

use crate::window::WindowGrid;

/// 按网格顺序裁剪，`[N, H, W]` -> `[N, K, h, w]`
///
/// 网格不可为空。
pub fn extract_crops<B: Backend>(images: Tensor<B, 3>, grid: &WindowGrid) -> Tensor<B, 4> {
  let [batch, _, _] = images.dims();
  let (height, width) = (grid.crop_height(), grid.crop_width());

  let crops = grid
    .iter()
    .map(|origin| {
      images.clone().slice([
        0..batch,
        origin.y..origin.y + height,
        origin.x..origin.x + width,
      ])
    })
    .collect::<Vec<_>>();

  Tensor::stack::<4>(crops, 1)
}

/// 每个窗口整体乘以对应的掩码值，`mask` 为 `[N, K]`
pub fn mask_crops<B: Backend>(crops: Tensor<B, 4>, mask: Tensor<B, 2>) -> Tensor<B, 4> {
  let [batch, num_crops, height, width] = crops.dims();
  let mask = mask
    .reshape([batch, num_crops, 1, 1])
    .expand([batch, num_crops, height, width]);
  crops * mask
}
