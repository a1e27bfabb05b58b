// 该文件是 Jiangdong （江东日暮云） 项目的一部分。
// src/model/sam.rs - SAM 分割模型
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use image::imageops::{self, FilterType};
use ndarray::{ArrayView2, ArrayView4, s};
use ort::session::Session;
use ort::value::TensorRef;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{IMAGENET_MEAN, IMAGENET_STD, RgbFrame, normalized_tensor},
  model::{Device, Mask, Model, bilinear_sample},
};

/// SAM 编码分辨率
const SAM_INPUT_SIZE: u32 = 1024;
const SAM_INPUT_NAME: &str = "image";
const SAM_MASKS_OUTPUT: &str = "masks";
const SAM_IOU_OUTPUT: &str = "iou_predictions";
/// 默认掩码二值化阈值，对应原模型的 mask_threshold
const SAM_MASK_THRESHOLD: f32 = 0.0;

const SAM_SCHEME: &str = "sam";

#[derive(Error, Debug)]
pub enum SamError {
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("推理错误: {0}")]
  SessionError(#[from] ort::Error),
  #[error("输出形状错误: {0}")]
  ShapeError(String),
}

pub struct SamBuilder {
  model_path: String,
  device: Device,
  mask_threshold: f32,
}

impl FromUrlWithScheme for SamBuilder {
  const SCHEME: &'static str = SAM_SCHEME;
}

impl FromUrl for SamBuilder {
  type Error = SamError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(SamError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let mut builder = SamBuilder {
      model_path: url.path().to_string(),
      device: Device::Cpu,
      mask_threshold: SAM_MASK_THRESHOLD,
    };

    for (key, value) in url.query_pairs() {
      if key == "mask-threshold"
        && let Ok(threshold) = value.parse()
      {
        builder.mask_threshold = threshold;
      }
    }

    Ok(builder)
  }
}

impl SamBuilder {
  pub fn device(mut self, device: Device) -> Self {
    self.device = device;
    self
  }

  pub fn mask_threshold(mut self, threshold: f32) -> Self {
    self.mask_threshold = threshold;
    self
  }

  pub fn build(self) -> Result<SamMaskGenerator, SamError> {
    info!("加载 SAM 模型文件: {}", self.model_path);
    let model_data = std::fs::read(&self.model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      model_data.len() as f64 / (1024.0 * 1024.0)
    );

    let session = self
      .device
      .configure(Session::builder()?)
      .with_intra_threads(4)?
      .commit_from_memory(&model_data)?;
    info!("SAM 模型加载完成");

    Ok(SamMaskGenerator {
      session,
      mask_threshold: self.mask_threshold,
    })
  }
}

pub struct SamMaskGenerator {
  session: Session,
  mask_threshold: f32,
}

impl Model for SamMaskGenerator {
  type Input = RgbFrame;
  type Output = Box<[Mask]>;
  type Error = SamError;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let (width, height) = (input.width(), input.height());
    debug!("SAM 输入图像: {}x{}", width, height);

    // 缩放到编码分辨率并按像素均值归一化
    let resized = imageops::resize(
      input.as_image(),
      SAM_INPUT_SIZE,
      SAM_INPUT_SIZE,
      FilterType::Triangle,
    );
    let tensor = normalized_tensor(&resized, &IMAGENET_MEAN, &IMAGENET_STD);

    debug!("执行 SAM 推理");
    let input_tensor = TensorRef::from_array_view(&tensor)?;
    let outputs = self.session.run(ort::inputs![SAM_INPUT_NAME => input_tensor])?;

    let (mask_shape, mask_data) = outputs[SAM_MASKS_OUTPUT].try_extract_tensor::<f32>()?;
    let dims: Vec<usize> = mask_shape.into_iter().map(|&d| d as usize).collect();
    if dims.len() != 4 || dims[0] != 1 {
      return Err(SamError::ShapeError(format!(
        "期望掩码形状 [1, N, H, W], 实际 {:?}",
        dims
      )));
    }

    let masks = ArrayView4::from_shape((dims[0], dims[1], dims[2], dims[3]), mask_data)
      .map_err(|e| SamError::ShapeError(e.to_string()))?;

    let (_, iou) = outputs[SAM_IOU_OUTPUT].try_extract_tensor::<f32>()?;
    debug!("掩码 IoU 预测: {:?}", iou);

    let mut result = Vec::with_capacity(dims[1]);
    for n in 0..dims[1] {
      let plane = masks.slice(s![0, n, .., ..]);
      result.push(upsample_to_mask(&plane, width, height, self.mask_threshold));
    }

    debug!("SAM 输出 {} 个掩码", result.len());
    Ok(result.into_boxed_slice())
  }
}

/// 低分辨率掩码 logit 双线性上采样回原图尺寸后按阈值二值化
fn upsample_to_mask(plane: &ArrayView2<f32>, width: u32, height: u32, threshold: f32) -> Mask {
  let scale_x = plane.shape()[1] as f32 / width as f32;
  let scale_y = plane.shape()[0] as f32 / height as f32;

  let mut data = Vec::with_capacity((width as usize) * (height as usize));
  for y in 0..height {
    for x in 0..width {
      let src_x = (x as f32 + 0.5) * scale_x - 0.5;
      let src_y = (y as f32 + 0.5) * scale_y - 0.5;
      data.push(bilinear_sample(plane, src_x, src_y) > threshold);
    }
  }

  Mask::new(width, height, data)
}

#[cfg(test)]
mod tests {
  use super::*;
  use ndarray::Array2;

  #[test]
  fn builder_rejects_foreign_scheme() {
    let url = Url::parse("yolo:model.onnx").unwrap();
    assert!(matches!(
      SamBuilder::from_url(&url),
      Err(SamError::ModelPathError(_))
    ));
  }

  #[test]
  fn builder_reads_threshold_from_query() {
    let url = Url::parse("sam:/models/sam_vit_h.onnx?mask-threshold=0.5").unwrap();
    let builder = SamBuilder::from_url(&url).unwrap();
    assert_eq!(builder.model_path, "/models/sam_vit_h.onnx");
    assert_eq!(builder.mask_threshold, 0.5);
  }

  #[test]
  fn missing_model_file_fails_build() {
    let url = Url::parse("sam:/no/such/model.onnx").unwrap();
    let result = SamBuilder::from_url(&url).unwrap().build();
    assert!(matches!(result, Err(SamError::ModelLoadError(_))));
  }

  #[test]
  fn upsample_keeps_uniform_sign() {
    // 全正 logit 平面上采样后应得到全真掩码，全负则全假
    let positive = Array2::from_elem((4, 4), 3.0);
    let mask = upsample_to_mask(&positive.view(), 16, 16, 0.0);
    assert!((0..16).all(|y| (0..16).all(|x| mask.get(x, y))));

    let negative = Array2::from_elem((4, 4), -3.0);
    let mask = upsample_to_mask(&negative.view(), 16, 16, 0.0);
    assert!((0..16).all(|y| (0..16).all(|x| !mask.get(x, y))));
  }
}
