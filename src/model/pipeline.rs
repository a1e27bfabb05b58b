// 该文件是 Jiangdong （江东日暮云） 项目的一部分。
// src/model/pipeline.rs - 分割-分类流水线
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use ndarray::Array4;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::frame::RgbFrame;
use crate::model::{
  ClassScores, FeatureMap, Mask, Model, ProposalResult, RegionExtractor, head,
};

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("掩码生成失败: {0}")]
  Segmenter(#[source] Box<dyn std::error::Error + Send + Sync>),
  #[error("特征提取失败: {0}")]
  Backbone(#[source] Box<dyn std::error::Error + Send + Sync>),
  #[error("区域分类失败: {0}")]
  Head(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// 四级流水线：掩码生成 → 候选框提取 → 主干特征提取 → 区域分类。
/// 各级之间只通过返回值传递数据，没有候选框时短路返回。
pub struct SegmentClassifyPipeline<S, B, H> {
  segmenter: S,
  backbone: B,
  head: H,
  extractor: RegionExtractor,
}

impl<S, B, H> SegmentClassifyPipeline<S, B, H> {
  pub fn new(segmenter: S, backbone: B, head: H, extractor: RegionExtractor) -> Self {
    Self {
      segmenter,
      backbone,
      head,
      extractor,
    }
  }
}

impl<
  SE: std::error::Error + Sync + Send + 'static,
  BE: std::error::Error + Sync + Send + 'static,
  HE: std::error::Error + Sync + Send + 'static,
  S: Model<Input = RgbFrame, Output = Box<[Mask]>, Error = SE>,
  B: Model<Input = RgbFrame, Output = FeatureMap, Error = BE>,
  H: Model<Input = Array4<f32>, Output = ClassScores, Error = HE>,
> Model for SegmentClassifyPipeline<S, B, H>
{
  type Input = RgbFrame;
  type Output = ProposalResult;
  type Error = PipelineError;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    info!("生成分割掩码...");
    let masks = self
      .segmenter
      .infer(input)
      .map_err(|e| PipelineError::Segmenter(Box::new(e)))?;
    debug!("得到 {} 个掩码", masks.len());

    let boxes = self.extractor.extract(&masks);
    info!("提取候选框 {} 个", boxes.len());

    if boxes.is_empty() {
      warn!("没有候选框通过面积过滤，跳过区域分类");
      return Ok(ProposalResult {
        boxes: Box::default(),
        scores: None,
      });
    }

    info!("提取主干特征...");
    let features = self
      .backbone
      .infer(input)
      .map_err(|e| PipelineError::Backbone(Box::new(e)))?;
    debug!(
      "特征图形状: 1x{}x{}x{}",
      features.channels(),
      features.height(),
      features.width()
    );

    let pooled = head::pool_regions(&features, &boxes, input.width(), input.height());
    debug!("区域特征形状: {:?}", pooled.shape());

    info!("运行区域分类头...");
    let scores = self
      .head
      .infer(&pooled)
      .map_err(|e| PipelineError::Head(Box::new(e)))?;

    Ok(ProposalResult {
      boxes: boxes.into_boxed_slice(),
      scores: Some(scores),
    })
  }
}
