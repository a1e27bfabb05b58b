// 该文件是 Jiangdong （江东日暮云） 项目的一部分。
// src/output/draw.rs - 候选框可视化
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::model::RegionBox;

const BOX_COLOR: [u8; 3] = [0, 0, 255]; // 蓝色

/// 候选框绘制工具
pub struct Draw {
  color: Rgb<u8>,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      color: Rgb(BOX_COLOR),
    }
  }
}

impl Draw {
  /// 在图像上绘制候选框，坐标按图像边界截断
  pub fn draw_boxes(&self, image: &mut RgbImage, boxes: &[RegionBox]) {
    let (w, h) = (image.width() as f32, image.height() as f32);

    for region in boxes {
      let x_min = region.x_min.clamp(0.0, w - 1.0).floor() as i32;
      let y_min = region.y_min.clamp(0.0, h - 1.0).floor() as i32;
      let x_max = region.x_max.clamp(0.0, w - 1.0).ceil() as i32;
      let y_max = region.y_max.clamp(0.0, h - 1.0).ceil() as i32;

      if x_min >= x_max || y_min >= y_max {
        continue;
      }

      // 含边坐标，边框压在 x_min..=x_max 与 y_min..=y_max 上
      let rect =
        Rect::at(x_min, y_min).of_size((x_max - x_min + 1) as u32, (y_max - y_min + 1) as u32);
      draw_hollow_rect_mut(image, rect, self.color);

      // 绘制第二个边框以增加可见度
      if x_max - x_min > 2 && y_max - y_min > 2 {
        let inner = Rect::at(x_min + 1, y_min + 1)
          .of_size((x_max - x_min - 1) as u32, (y_max - y_min - 1) as u32);
        draw_hollow_rect_mut(image, inner, self.color);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn draws_box_edges_in_color() {
    let mut image = RgbImage::new(32, 32);
    let region = RegionBox {
      x_min: 4.0,
      y_min: 4.0,
      x_max: 20.0,
      y_max: 20.0,
    };

    Draw::default().draw_boxes(&mut image, &[region]);

    assert_eq!(*image.get_pixel(4, 4), Rgb(BOX_COLOR));
    assert_eq!(*image.get_pixel(20, 4), Rgb(BOX_COLOR));
    assert_eq!(*image.get_pixel(4, 20), Rgb(BOX_COLOR));
    // 框内部保持原样
    assert_eq!(*image.get_pixel(10, 10), Rgb([0, 0, 0]));
  }

  #[test]
  fn degenerate_box_is_skipped() {
    let mut image = RgbImage::new(16, 16);
    let region = RegionBox {
      x_min: 8.0,
      y_min: 8.0,
      x_max: 8.0,
      y_max: 8.0,
    };

    Draw::default().draw_boxes(&mut image, &[region]);
    assert!(image.pixels().all(|p| *p == Rgb([0, 0, 0])));
  }
}
