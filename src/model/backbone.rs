// 该文件是 Jiangdong （江东日暮云） 项目的一部分。
// src/model/backbone.rs - 检测器主干特征提取
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{IMAGENET_MEAN, IMAGENET_STD, RgbFrame},
  model::{Device, FeatureMap, Model},
};

const BACKBONE_INPUT_NAME: &str = "image";
const BACKBONE_OUTPUT_NAME: &str = "features";

const BACKBONE_SCHEME: &str = "backbone";

#[derive(Error, Debug)]
pub enum BackboneError {
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("推理错误: {0}")]
  SessionError(#[from] ort::Error),
  #[error("输出形状错误: {0}")]
  ShapeError(String),
}

pub struct FpnBackboneBuilder {
  model_path: String,
  device: Device,
}

impl FromUrlWithScheme for FpnBackboneBuilder {
  const SCHEME: &'static str = BACKBONE_SCHEME;
}

impl FromUrl for FpnBackboneBuilder {
  type Error = BackboneError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(BackboneError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    Ok(FpnBackboneBuilder {
      model_path: url.path().to_string(),
      device: Device::Cpu,
    })
  }
}

impl FpnBackboneBuilder {
  pub fn device(mut self, device: Device) -> Self {
    self.device = device;
    self
  }

  pub fn build(self) -> Result<FpnBackbone, BackboneError> {
    info!("加载主干网络模型文件: {}", self.model_path);
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
    info!("主干网络模型加载完成");

    Ok(FpnBackbone { session })
  }
}

/// 检测器自带的 backbone+FPN，推理时不跟踪梯度，
/// 输入输出均为与会话同一设备上的张量
pub struct FpnBackbone {
  session: Session,
}

impl Model for FpnBackbone {
  type Input = RgbFrame;
  type Output = FeatureMap;
  type Error = BackboneError;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let tensor = input.to_normalized_tensor(&IMAGENET_MEAN, &IMAGENET_STD);
    debug!("主干网络输入张量: {:?}", tensor.shape());

    let input_tensor = TensorRef::from_array_view(&tensor)?;
    let outputs = self
      .session
      .run(ort::inputs![BACKBONE_INPUT_NAME => input_tensor])?;

    let (shape, data) = outputs[BACKBONE_OUTPUT_NAME].try_extract_tensor::<f32>()?;
    let dims: Vec<usize> = shape.into_iter().map(|&d| d as usize).collect();
    if dims.len() != 4 || dims[0] != 1 {
      return Err(BackboneError::ShapeError(format!(
        "期望特征图形状 [1, C, H, W], 实际 {:?}",
        dims
      )));
    }

    let map = Array4::from_shape_vec((dims[0], dims[1], dims[2], dims[3]), data.to_vec())
      .map_err(|e| BackboneError::ShapeError(e.to_string()))?;
    debug!("特征图: {}x{}x{}", dims[1], dims[2], dims[3]);

    Ok(FeatureMap::new(map))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builder_rejects_foreign_scheme() {
    let url = Url::parse("sam:model.onnx").unwrap();
    assert!(matches!(
      FpnBackboneBuilder::from_url(&url),
      Err(BackboneError::ModelPathError(_))
    ));
  }

  #[test]
  fn missing_model_file_fails_build() {
    let url = Url::parse("backbone:/no/such/model.onnx").unwrap();
    let result = FpnBackboneBuilder::from_url(&url).unwrap().build();
    assert!(matches!(result, Err(BackboneError::ModelLoadError(_))));
  }
}
