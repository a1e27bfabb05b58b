// 该文件是 Jiangdong （江东日暮云） 项目的一部分。
// src/output/visualizer.rs - 控制台可视化
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::io::Write;

use crate::frame::RgbFrame;
use crate::model::{ProposalResult, head};
use crate::output::Render;

/// 控制台可视化：逐框打印坐标、最大类别与分类头原始输出
#[derive(Debug, Default)]
pub struct ConsoleVisualizer;

impl Render<RgbFrame, ProposalResult> for ConsoleVisualizer {
  type Error = std::io::Error;

  fn render_result(&self, frame: &RgbFrame, result: &ProposalResult) -> Result<(), Self::Error> {
    let mut stdout = std::io::stdout().lock();

    writeln!(stdout, "图像尺寸: {}x{}", frame.width(), frame.height())?;
    writeln!(stdout, "候选框数量: {}", result.boxes.len())?;

    let Some(scores) = &result.scores else {
      writeln!(stdout, "没有候选框通过过滤，未运行区域分类")?;
      return Ok(());
    };

    for (i, region) in result.boxes.iter().enumerate() {
      let (class_id, prob) = head::top_class(scores.logits.row(i));
      let name = head::COCO_INSTANCE_CLASSES
        .get(class_id)
        .copied()
        .unwrap_or("unknown");

      writeln!(
        stdout,
        "候选框 {}: ({:.0}, {:.0}, {:.0}, {:.0}) 最大类别 {} ({:.1}%)",
        i,
        region.x_min,
        region.y_min,
        region.x_max,
        region.y_max,
        name,
        prob * 100.0
      )?;
      writeln!(stdout, "  类别打分: {}", scores.logits.row(i))?;
      writeln!(stdout, "  回归增量: {}", scores.deltas.row(i))?;
    }

    Ok(())
  }
}
