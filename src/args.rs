// 该文件是 Jiangdong （江东日暮云） 项目的一部分。
// src/args.rs - 项目参数配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use clap::Parser;
use url::Url;

use jiangdong::model::{DEFAULT_MIN_AREA, Device};

/// Jiangdong 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入图像（image:<path>）
  #[arg(long, default_value = "image:rail.jpg", value_name = "SOURCE")]
  pub input: Url,

  /// SAM 分割模型（sam:<path>，可加 ?mask-threshold=<t>）
  #[arg(long, default_value = "sam:sam_vit_h.onnx", value_name = "MODEL")]
  pub sam: Url,

  /// 检测器主干网络模型（backbone:<path>）
  #[arg(
    long,
    default_value = "backbone:fasterrcnn_resnet50_fpn_backbone.onnx",
    value_name = "MODEL"
  )]
  pub backbone: Url,

  /// 检测器分类头模型（rcnn:<path>）
  #[arg(
    long,
    default_value = "rcnn:fasterrcnn_resnet50_fpn_head.onnx",
    value_name = "MODEL"
  )]
  pub head: Url,

  /// 输出图像（image:<path>，加 ?draw=boxes 绘制候选框）
  #[arg(long, default_value = "image:output.jpg", value_name = "OUTPUT")]
  pub output: Url,

  /// 检测记录输出目录（record:<dir>），不填则不记录
  #[arg(long, value_name = "OUTPUT")]
  pub record: Option<Url>,

  /// 推理设备（cpu、cuda 或 cuda:<id>）
  #[arg(long, default_value = "cpu", value_name = "DEVICE")]
  pub device: Device,

  /// 候选框面积阈值（像素平方），面积不超过该值的框被丢弃
  #[arg(long, default_value_t = DEFAULT_MIN_AREA, value_name = "AREA")]
  pub min_area: f32,

  /// 掩码二值化阈值
  #[arg(long, default_value_t = 0.0, value_name = "THRESHOLD")]
  pub mask_threshold: f32,
}
