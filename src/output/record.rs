// 该文件是 Jiangdong （江东日暮云） 项目的一部分。
// src/output/record.rs - 检测记录输出
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbFrame,
  model::{ProposalResult, head},
  output::Render,
};

#[derive(Error, Debug)]
pub enum RecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct BoxRecord {
  bbox: [f32; 4],
  class_id: Option<usize>,
  class_name: Option<&'static str>,
  score: Option<f32>,
  logits: Option<Vec<f32>>,
  deltas: Option<Vec<f32>>,
}

#[derive(Serialize)]
struct RunRecord {
  timestamp: String,
  image_width: u32,
  image_height: u32,
  boxes: Vec<BoxRecord>,
}

/// 将候选框与分类头输出写入目录下按时间命名的 JSON 文件
pub struct RecordOutput {
  dir: PathBuf,
}

impl FromUrlWithScheme for RecordOutput {
  const SCHEME: &'static str = "record";
}

impl FromUrl for RecordOutput {
  type Error = RecordOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(RecordOutputError::SchemeMismatch);
    }

    Ok(RecordOutput {
      dir: PathBuf::from(url.path()),
    })
  }
}

impl Render<RgbFrame, ProposalResult> for RecordOutput {
  type Error = RecordOutputError;

  fn render_result(&self, frame: &RgbFrame, result: &ProposalResult) -> Result<(), Self::Error> {
    let boxes = result
      .boxes
      .iter()
      .enumerate()
      .map(|(i, region)| match &result.scores {
        Some(scores) => {
          let (class_id, prob) = head::top_class(scores.logits.row(i));
          BoxRecord {
            bbox: region.coords(),
            class_id: Some(class_id),
            class_name: head::COCO_INSTANCE_CLASSES.get(class_id).copied(),
            score: Some(prob),
            logits: Some(scores.logits.row(i).to_vec()),
            deltas: Some(scores.deltas.row(i).to_vec()),
          }
        }
        None => BoxRecord {
          bbox: region.coords(),
          class_id: None,
          class_name: None,
          score: None,
          logits: None,
          deltas: None,
        },
      })
      .collect();

    let record = RunRecord {
      timestamp: Utc::now().to_rfc3339(),
      image_width: frame.width(),
      image_height: frame.height(),
      boxes,
    };

    std::fs::create_dir_all(&self.dir)?;
    let path = self
      .dir
      .join(format!("proposals-{}.json", Utc::now().format("%Y%m%d-%H%M%S")));

    let file = std::fs::File::create(&path)?;
    serde_json::to_writer_pretty(file, &record)?;
    info!("写入检测记录: {}", path.display());

    Ok(())
  }
}
