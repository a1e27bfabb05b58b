// 该文件是 Jiangdong （江东日暮云） 项目的一部分。
// src/output.rs - 输出定义
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use thiserror::Error;

use crate::frame::RgbFrame;
use crate::model::ProposalResult;

mod draw;
mod record;
mod save_image_file;
mod visualizer;

pub use self::draw::Draw;
pub use self::record::{RecordOutput, RecordOutputError};
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};
pub use self::visualizer::ConsoleVisualizer;

pub trait Render<Frame, Res> {
  type Error;

  fn render_result(&self, frame: &Frame, result: &Res) -> Result<(), Self::Error>;
}

#[derive(Error, Debug)]
pub enum OutputStackError {
  #[error("控制台输出错误: {0}")]
  Console(#[from] std::io::Error),
  #[error("图像输出错误: {0}")]
  Image(#[from] SaveImageFileError),
  #[error("记录输出错误: {0}")]
  Record(#[from] RecordOutputError),
}

/// 组合输出：控制台可视化、图像保存与可选的 JSON 记录
pub struct OutputStack {
  pub console: ConsoleVisualizer,
  pub image: SaveImageFileOutput,
  pub record: Option<RecordOutput>,
}

impl Render<RgbFrame, ProposalResult> for OutputStack {
  type Error = OutputStackError;

  fn render_result(&self, frame: &RgbFrame, result: &ProposalResult) -> Result<(), Self::Error> {
    self.console.render_result(frame, result)?;
    self.image.render_result(frame, result)?;

    if let Some(record) = &self.record {
      record.render_result(frame, result)?;
    }

    Ok(())
  }
}
