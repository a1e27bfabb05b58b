// 该文件是 Jiangdong （江东日暮云） 项目的一部分。
// src/model.rs - 模型特征与共享类型定义
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use ndarray::{Array2, Array4, ArrayView2, s};
use ort::execution_providers::CUDAExecutionProvider;
use ort::session::builder::SessionBuilder;
use thiserror::Error;
use tracing::warn;

mod backbone;
pub mod head;
mod pipeline;
pub mod region;
mod sam;

pub use self::backbone::{BackboneError, FpnBackbone, FpnBackboneBuilder};
pub use self::head::{HeadError, RcnnHead, RcnnHeadBuilder};
pub use self::pipeline::{PipelineError, SegmentClassifyPipeline};
pub use self::region::{DEFAULT_MIN_AREA, RegionExtractor};
pub use self::sam::{SamBuilder, SamError, SamMaskGenerator};

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 推理设备，构建会话时统一传入
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
  Cpu,
  Cuda(i32),
}

#[derive(Error, Debug)]
pub enum DeviceParseError {
  #[error("未知设备: {0}")]
  Unknown(String),
}

impl std::str::FromStr for Device {
  type Err = DeviceParseError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "cpu" => Ok(Device::Cpu),
      "cuda" => Ok(Device::Cuda(0)),
      other => match other.strip_prefix("cuda:").and_then(|id| id.parse().ok()) {
        Some(id) => Ok(Device::Cuda(id)),
        None => Err(DeviceParseError::Unknown(other.to_string())),
      },
    }
  }
}

impl std::fmt::Display for Device {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Device::Cpu => write!(f, "cpu"),
      Device::Cuda(id) => write!(f, "cuda:{}", id),
    }
  }
}

impl Device {
  /// 在会话构建器上注册执行提供方；CUDA 注册失败时回退到 CPU
  pub fn configure(&self, builder: SessionBuilder) -> SessionBuilder {
    match self {
      Device::Cpu => builder,
      Device::Cuda(id) => {
        let cuda = CUDAExecutionProvider::default().with_device_id(*id).build();
        match builder.clone().with_execution_providers([cuda]) {
          Ok(with_cuda) => with_cuda,
          Err(e) => {
            warn!("CUDA 执行提供方注册失败，回退到 CPU: {}", e);
            builder
          }
        }
      }
    }
  }
}

/// 单个分割掩码，按行主序覆盖原图坐标
#[derive(Debug, Clone)]
pub struct Mask {
  width: u32,
  height: u32,
  data: Box<[bool]>,
}

impl Mask {
  pub fn new(width: u32, height: u32, data: Vec<bool>) -> Self {
    if data.len() != (width as usize) * (height as usize) {
      panic!(
        "掩码数据长度不匹配: 期望长度 {}, 实际长度 {}",
        (width as usize) * (height as usize),
        data.len()
      );
    }

    Self {
      width,
      height,
      data: data.into_boxed_slice(),
    }
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn get(&self, x: u32, y: u32) -> bool {
    self.data[(y * self.width + x) as usize]
  }
}

/// 原图像素坐标下的候选框 [x_min, y_min, x_max, y_max]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionBox {
  pub x_min: f32,
  pub y_min: f32,
  pub x_max: f32,
  pub y_max: f32,
}

impl RegionBox {
  pub fn coords(&self) -> [f32; 4] {
    [self.x_min, self.y_min, self.x_max, self.y_max]
  }

  pub fn width(&self) -> f32 {
    self.x_max - self.x_min
  }

  pub fn height(&self) -> f32 {
    self.y_max - self.y_min
  }

  pub fn area(&self) -> f32 {
    self.width() * self.height()
  }
}

/// 主干网络输出的特征图，形状 [1, C, H', W']
#[derive(Debug, Clone)]
pub struct FeatureMap {
  map: Array4<f32>,
}

impl FeatureMap {
  pub fn new(map: Array4<f32>) -> Self {
    if map.shape()[0] != 1 {
      panic!("特征图批大小必须为 1, 实际为 {}", map.shape()[0]);
    }
    Self { map }
  }

  pub fn channels(&self) -> usize {
    self.map.shape()[1]
  }

  pub fn height(&self) -> usize {
    self.map.shape()[2]
  }

  pub fn width(&self) -> usize {
    self.map.shape()[3]
  }

  pub fn plane(&self, channel: usize) -> ArrayView2<'_, f32> {
    self.map.slice(s![0, channel, .., ..])
  }
}

/// 分类头输出：每框类别打分与回归增量，行序与候选框一致
#[derive(Debug, Clone)]
pub struct ClassScores {
  pub logits: Array2<f32>,
  pub deltas: Array2<f32>,
}

/// 流水线最终输出
#[derive(Debug, Clone)]
pub struct ProposalResult {
  pub boxes: Box<[RegionBox]>,
  pub scores: Option<ClassScores>,
}

/// 对单通道平面做双线性采样，坐标越界时按边缘截断
pub(crate) fn bilinear_sample(plane: &ArrayView2<f32>, x: f32, y: f32) -> f32 {
  let h = plane.shape()[0];
  let w = plane.shape()[1];

  let x = x.clamp(0.0, (w - 1) as f32);
  let y = y.clamp(0.0, (h - 1) as f32);

  let x0 = x.floor() as usize;
  let y0 = y.floor() as usize;
  let x1 = (x0 + 1).min(w - 1);
  let y1 = (y0 + 1).min(h - 1);

  let dx = x - x0 as f32;
  let dy = y - y0 as f32;

  let top = plane[[y0, x0]] * (1.0 - dx) + plane[[y0, x1]] * dx;
  let bottom = plane[[y1, x0]] * (1.0 - dx) + plane[[y1, x1]] * dx;

  top * (1.0 - dy) + bottom * dy
}

#[cfg(test)]
mod tests {
  use super::*;
  use ndarray::array;

  #[test]
  fn device_parse() {
    assert_eq!("cpu".parse::<Device>().unwrap(), Device::Cpu);
    assert_eq!("cuda".parse::<Device>().unwrap(), Device::Cuda(0));
    assert_eq!("cuda:2".parse::<Device>().unwrap(), Device::Cuda(2));
    assert!("npu".parse::<Device>().is_err());
    assert!("cuda:x".parse::<Device>().is_err());
  }

  #[test]
  fn bilinear_interpolates_along_ramp() {
    // 值等于列号的平面，行内插值应线性
    let plane = array![[0.0, 1.0, 2.0], [0.0, 1.0, 2.0]];
    let view = plane.view();

    assert_eq!(bilinear_sample(&view, 0.0, 0.0), 0.0);
    assert_eq!(bilinear_sample(&view, 1.5, 0.5), 1.5);
    assert_eq!(bilinear_sample(&view, 2.0, 1.0), 2.0);
  }

  #[test]
  fn bilinear_clamps_out_of_range() {
    let plane = array![[1.0, 2.0], [3.0, 4.0]];
    let view = plane.view();

    assert_eq!(bilinear_sample(&view, -5.0, -5.0), 1.0);
    assert_eq!(bilinear_sample(&view, 9.0, 9.0), 4.0);
  }

  #[test]
  #[should_panic]
  fn mask_length_must_match() {
    Mask::new(4, 4, vec![false; 3]);
  }
}
