// 该文件是 Jiangdong （江东日暮云） 项目的一部分。
// src/main.rs - 项目主程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod args;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use jiangdong::{
  FromUrl,
  input::ImageFileInput,
  model::{
    FpnBackboneBuilder, RcnnHeadBuilder, RegionExtractor, SamBuilder, SegmentClassifyPipeline,
  },
  output::{ConsoleVisualizer, OutputStack, RecordOutput, SaveImageFileOutput},
  task::{OneShotTask, Task},
};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("输入图像: {}", args.input);
  info!("SAM 模型: {}", args.sam);
  info!("主干网络模型: {}", args.backbone);
  info!("分类头模型: {}", args.head);
  info!("输出路径: {}", args.output);
  info!("推理设备: {}", args.device);
  info!("候选框面积阈值: {}", args.min_area);

  let input = ImageFileInput::from_url(&args.input)?;

  let segmenter = SamBuilder::from_url(&args.sam)?
    .device(args.device)
    .mask_threshold(args.mask_threshold)
    .build()?;
  let backbone = FpnBackboneBuilder::from_url(&args.backbone)?
    .device(args.device)
    .build()?;
  let head = RcnnHeadBuilder::from_url(&args.head)?
    .device(args.device)
    .build()?;

  let pipeline = SegmentClassifyPipeline::new(
    segmenter,
    backbone,
    head,
    RegionExtractor::new(args.min_area),
  );

  let record = match &args.record {
    Some(url) => Some(RecordOutput::from_url(url)?),
    None => None,
  };
  let output = OutputStack {
    console: ConsoleVisualizer,
    image: SaveImageFileOutput::from_url(&args.output)?,
    record,
  };

  OneShotTask.run_task(input, pipeline, output)?;

  Ok(())
}
