// 该文件是 Jiangdong （江东日暮云） 项目的一部分。
// src/model/head.rs - 区域特征池化与分类头
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use ndarray::{Array2, Array4, ArrayView1};
use ort::session::Session;
use ort::value::TensorRef;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{ClassScores, Device, FeatureMap, Model, RegionBox, bilinear_sample},
};

/// ROI 池化输出网格尺寸
pub const POOL_SIZE: usize = 7;

const HEAD_INPUT_NAME: &str = "pooled";
const HEAD_LOGITS_OUTPUT: &str = "logits";
const HEAD_DELTAS_OUTPUT: &str = "deltas";

const RCNN_SCHEME: &str = "rcnn";

/// torchvision COCO 实例类别表（含背景与 N/A 占位）
pub const COCO_INSTANCE_CLASSES: [&str; 91] = [
  "__background__",
  "person",
  "bicycle",
  "car",
  "motorcycle",
  "airplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "N/A",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "N/A",
  "backpack",
  "umbrella",
  "N/A",
  "N/A",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "N/A",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "couch",
  "potted plant",
  "bed",
  "N/A",
  "dining table",
  "N/A",
  "N/A",
  "toilet",
  "N/A",
  "tv",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "N/A",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

/// 将候选框坐标从原图空间缩放到特征图空间：
/// 偶数下标（x_min、x_max）乘以宽度比，奇数下标（y_min、y_max）乘以高度比
pub fn rescale_box(region: &RegionBox, scale_x: f32, scale_y: f32) -> [f32; 4] {
  let mut coords = region.coords();
  for (i, v) in coords.iter_mut().enumerate() {
    *v *= if i % 2 == 0 { scale_x } else { scale_y };
  }
  coords
}

/// 对每个候选框在特征图上做 POOL_SIZE x POOL_SIZE 双线性采样池化，
/// 输出 [N, C, 7, 7]，行序与候选框一致，退化框同样输出完整网格
pub fn pool_regions(
  features: &FeatureMap,
  boxes: &[RegionBox],
  image_width: u32,
  image_height: u32,
) -> Array4<f32> {
  let channels = features.channels();
  let scale_x = features.width() as f32 / image_width as f32;
  let scale_y = features.height() as f32 / image_height as f32;

  let mut pooled = Array4::zeros((boxes.len(), channels, POOL_SIZE, POOL_SIZE));

  for (n, region) in boxes.iter().enumerate() {
    let [x1, y1, x2, y2] = rescale_box(region, scale_x, scale_y);
    let cell_w = (x2 - x1) / POOL_SIZE as f32;
    let cell_h = (y2 - y1) / POOL_SIZE as f32;

    for c in 0..channels {
      let plane = features.plane(c);
      for gy in 0..POOL_SIZE {
        let sample_y = y1 + (gy as f32 + 0.5) * cell_h;
        for gx in 0..POOL_SIZE {
          let sample_x = x1 + (gx as f32 + 0.5) * cell_w;
          pooled[[n, c, gy, gx]] = bilinear_sample(&plane, sample_x, sample_y);
        }
      }
    }
  }

  pooled
}

/// logit 行的最大类别及其 softmax 概率
pub fn top_class(row: ArrayView1<f32>) -> (usize, f32) {
  let mut best = 0usize;
  let mut best_logit = f32::MIN;
  for (i, &v) in row.iter().enumerate() {
    if v > best_logit {
      best_logit = v;
      best = i;
    }
  }

  let sum: f32 = row.iter().map(|&v| (v - best_logit).exp()).sum();
  (best, 1.0 / sum)
}

#[derive(Error, Debug)]
pub enum HeadError {
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("推理错误: {0}")]
  SessionError(#[from] ort::Error),
  #[error("输出形状错误: {0}")]
  ShapeError(String),
}

pub struct RcnnHeadBuilder {
  model_path: String,
  device: Device,
}

impl FromUrlWithScheme for RcnnHeadBuilder {
  const SCHEME: &'static str = RCNN_SCHEME;
}

impl FromUrl for RcnnHeadBuilder {
  type Error = HeadError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(HeadError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    Ok(RcnnHeadBuilder {
      model_path: url.path().to_string(),
      device: Device::Cpu,
    })
  }
}

impl RcnnHeadBuilder {
  pub fn device(mut self, device: Device) -> Self {
    self.device = device;
    self
  }

  pub fn build(self) -> Result<RcnnHead, HeadError> {
    info!("加载分类头模型文件: {}", self.model_path);
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
    info!("分类头模型加载完成");

    Ok(RcnnHead { session })
  }
}

/// 检测器自带的两头分类器：类别打分与框回归增量
pub struct RcnnHead {
  session: Session,
}

impl Model for RcnnHead {
  type Input = Array4<f32>;
  type Output = ClassScores;
  type Error = HeadError;

  fn infer(&mut self, pooled: &Self::Input) -> Result<Self::Output, Self::Error> {
    let num_boxes = pooled.shape()[0];
    debug!("分类头输入区域特征: {:?}", pooled.shape());

    let input_tensor = TensorRef::from_array_view(pooled)?;
    let outputs = self
      .session
      .run(ort::inputs![HEAD_INPUT_NAME => input_tensor])?;

    let (logits_shape, logits_data) = outputs[HEAD_LOGITS_OUTPUT].try_extract_tensor::<f32>()?;
    let dims: Vec<usize> = logits_shape.into_iter().map(|&d| d as usize).collect();
    if dims.len() != 2 || dims[0] != num_boxes {
      return Err(HeadError::ShapeError(format!(
        "期望类别打分形状 [{}, K], 实际 {:?}",
        num_boxes, dims
      )));
    }
    let logits = Array2::from_shape_vec((dims[0], dims[1]), logits_data.to_vec())
      .map_err(|e| HeadError::ShapeError(e.to_string()))?;

    let (deltas_shape, deltas_data) = outputs[HEAD_DELTAS_OUTPUT].try_extract_tensor::<f32>()?;
    let dims: Vec<usize> = deltas_shape.into_iter().map(|&d| d as usize).collect();
    if dims.len() != 2 || dims[0] != num_boxes {
      return Err(HeadError::ShapeError(format!(
        "期望回归增量形状 [{}, 4K], 实际 {:?}",
        num_boxes, dims
      )));
    }
    let deltas = Array2::from_shape_vec((dims[0], dims[1]), deltas_data.to_vec())
      .map_err(|e| HeadError::ShapeError(e.to_string()))?;

    debug!(
      "分类头输出: 打分 {:?}, 增量 {:?}",
      logits.shape(),
      deltas.shape()
    );

    Ok(ClassScores { logits, deltas })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use ndarray::{Array1, Array4};

  fn feature_map(channels: usize, height: usize, width: usize, value: f32) -> FeatureMap {
    FeatureMap::new(Array4::from_elem((1, channels, height, width), value))
  }

  #[test]
  fn rescale_uses_axis_ratio_per_index_parity() {
    let region = RegionBox {
      x_min: 32.0,
      y_min: 64.0,
      x_max: 96.0,
      y_max: 128.0,
    };

    let coords = rescale_box(&region, 0.5, 0.25);
    assert_eq!(coords, [16.0, 16.0, 48.0, 32.0]);
  }

  #[test]
  fn rescale_matches_stride_32_backbone() {
    // 640x512 图像配 stride-32 特征图，两轴缩放比例都应恰为 1/32
    let map = feature_map(8, 512 / 32, 640 / 32, 0.0);
    let scale_x = map.width() as f32 / 640.0;
    let scale_y = map.height() as f32 / 512.0;
    assert_eq!(scale_x, 1.0 / 32.0);
    assert_eq!(scale_y, 1.0 / 32.0);

    let region = RegionBox {
      x_min: 64.0,
      y_min: 32.0,
      x_max: 320.0,
      y_max: 256.0,
    };
    assert_eq!(
      rescale_box(&region, scale_x, scale_y),
      [2.0, 1.0, 10.0, 8.0]
    );
  }

  #[test]
  fn pooled_shape_is_fixed_for_any_box() {
    let map = feature_map(4, 16, 16, 1.0);

    let degenerate = RegionBox {
      x_min: 10.0,
      y_min: 10.0,
      x_max: 10.0,
      y_max: 10.0,
    };
    let full = RegionBox {
      x_min: 0.0,
      y_min: 0.0,
      x_max: 511.0,
      y_max: 511.0,
    };

    let pooled = pool_regions(&map, &[degenerate, full], 512, 512);
    assert_eq!(pooled.shape(), &[2, 4, POOL_SIZE, POOL_SIZE]);
  }

  #[test]
  fn constant_features_pool_to_constant() {
    let map = feature_map(2, 8, 8, 3.5);
    let region = RegionBox {
      x_min: 16.0,
      y_min: 16.0,
      x_max: 200.0,
      y_max: 180.0,
    };

    let pooled = pool_regions(&map, &[region], 256, 256);
    assert!(pooled.iter().all(|&v| (v - 3.5).abs() < 1e-6));
  }

  #[test]
  fn empty_box_list_pools_to_empty_batch() {
    let map = feature_map(4, 8, 8, 1.0);
    let pooled = pool_regions(&map, &[], 256, 256);
    assert_eq!(pooled.shape(), &[0, 4, POOL_SIZE, POOL_SIZE]);
  }

  #[test]
  fn top_class_picks_argmax_with_probability() {
    let row = Array1::from(vec![0.0, 4.0, 0.0, 0.0]);
    let (class_id, prob) = top_class(row.view());
    assert_eq!(class_id, 1);
    assert!(prob > 0.9 && prob <= 1.0);
  }

  #[test]
  fn class_table_has_91_entries() {
    assert_eq!(COCO_INSTANCE_CLASSES.len(), 91);
    assert_eq!(COCO_INSTANCE_CLASSES[0], "__background__");
    assert_eq!(COCO_INSTANCE_CLASSES[1], "person");
  }
}
