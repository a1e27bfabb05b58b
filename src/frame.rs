// 该文件是 Jiangdong （江东日暮云） 项目的一部分。
// src/frame.rs - RGB 帧与张量转换
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

use image::RgbImage;
use ndarray::{Array4, s};

const RGB_CHANNELS: usize = 3;

/// ImageNet 像素均值与标准差（0-255 范围），
/// SAM 与 torchvision 检测器使用同一组常量
pub const IMAGENET_MEAN: [f32; 3] = [123.675, 116.28, 103.53];
pub const IMAGENET_STD: [f32; 3] = [58.395, 57.12, 57.375];

/// 单帧 RGB 图像
#[derive(Debug, Clone)]
pub struct RgbFrame {
  image: RgbImage,
}

impl From<RgbImage> for RgbFrame {
  fn from(image: RgbImage) -> Self {
    Self { image }
  }
}

impl RgbFrame {
  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn as_image(&self) -> &RgbImage {
    &self.image
  }

  pub fn to_rgb_image(&self) -> RgbImage {
    self.image.clone()
  }

  /// NCHW 布局的 f32 张量，取值范围 0-255
  pub fn to_nchw_tensor(&self) -> Array4<f32> {
    nchw_tensor(&self.image)
  }

  /// NCHW 张量并按通道减均值除标准差
  pub fn to_normalized_tensor(&self, mean: &[f32; 3], std: &[f32; 3]) -> Array4<f32> {
    normalized_tensor(&self.image, mean, std)
  }
}

pub fn nchw_tensor(image: &RgbImage) -> Array4<f32> {
  let (width, height) = image.dimensions();
  let mut tensor = Array4::zeros((1, RGB_CHANNELS, height as usize, width as usize));

  for (x, y, pixel) in image.enumerate_pixels() {
    for c in 0..RGB_CHANNELS {
      tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32;
    }
  }

  tensor
}

pub fn normalized_tensor(image: &RgbImage, mean: &[f32; 3], std: &[f32; 3]) -> Array4<f32> {
  let mut tensor = nchw_tensor(image);

  for c in 0..RGB_CHANNELS {
    tensor
      .slice_mut(s![0, c, .., ..])
      .mapv_inplace(|v| (v - mean[c]) / std[c]);
  }

  tensor
}
