// 该文件是 Jiangdong （江东日暮云） 项目的一部分。
// src/output/save_image_file.rs - 保存图像文件
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

use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbFrame,
  model::ProposalResult,
  output::{Draw, Render},
};

pub struct SaveImageFileOutput {
  path: String,
  draw: Option<Draw>,
}

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    // 默认原样保存输入帧，?draw=boxes 时在副本上绘制候选框
    let draw = uri
      .query_pairs()
      .any(|(key, value)| key == "draw" && value == "boxes")
      .then(Draw::default);

    Ok(SaveImageFileOutput {
      path: uri.path().to_string(),
      draw,
    })
  }
}

impl Render<RgbFrame, ProposalResult> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, frame: &RgbFrame, result: &ProposalResult) -> Result<(), Self::Error> {
    let mut image = frame.to_rgb_image();

    if let Some(draw) = &self.draw {
      draw.draw_boxes(&mut image, &result.boxes);
    }

    if let Some(parent) = Path::new(&self.path).parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    image.save(&self.path)?;
    warn!("保存图像到文件: {}", self.path);

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgb, RgbImage};

  fn empty_result() -> ProposalResult {
    ProposalResult {
      boxes: Box::default(),
      scores: None,
    }
  }

  #[test]
  fn rejects_foreign_scheme() {
    let url = Url::parse("video:out.mp4").unwrap();
    assert!(matches!(
      SaveImageFileOutput::from_url(&url),
      Err(SaveImageFileError::SchemeMismatch(_))
    ));
  }

  #[test]
  fn writes_plain_copy_with_input_dimensions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("output.png");
    let url = Url::parse(&format!("image:{}", path.display())).unwrap();
    let output = SaveImageFileOutput::from_url(&url).unwrap();

    let frame = RgbFrame::from(RgbImage::from_pixel(24, 16, Rgb([7, 8, 9])));
    output.render_result(&frame, &empty_result()).unwrap();

    let saved = image::open(&path).unwrap().into_rgb8();
    assert_eq!(saved.dimensions(), (24, 16));
    assert_eq!(*saved.get_pixel(12, 8), Rgb([7, 8, 9]));
  }

  #[test]
  fn draw_query_annotates_the_copy() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("boxes.png");
    let url = Url::parse(&format!("image:{}?draw=boxes", path.display())).unwrap();
    let output = SaveImageFileOutput::from_url(&url).unwrap();

    let frame = RgbFrame::from(RgbImage::new(32, 32));
    let result = ProposalResult {
      boxes: vec![crate::model::RegionBox {
        x_min: 2.0,
        y_min: 2.0,
        x_max: 29.0,
        y_max: 29.0,
      }]
      .into_boxed_slice(),
      scores: None,
    };
    output.render_result(&frame, &result).unwrap();

    let saved = image::open(&path).unwrap().into_rgb8();
    assert_eq!(*saved.get_pixel(2, 2), Rgb([0, 0, 255]));
  }
}
