// 该文件是 Shicai （食材识别） 项目的一部分。
// src/geometry.rs - 矩形与 IoU 几何工具
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Wareless Group

/// 轴对齐矩形，坐标为浮点像素值
///
/// 坐标所在的空间（模型输入空间或原图空间）由使用场景决定，
/// 矩形本身不携带空间信息。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
  /// 左边界 x 坐标
  pub left: f32,
  /// 上边界 y 坐标
  pub top: f32,
  /// 右边界 x 坐标
  pub right: f32,
  /// 下边界 y 坐标
  pub bottom: f32,
}

impl Rect {
  pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
    Self {
      left,
      top,
      right,
      bottom,
    }
  }

  pub fn width(&self) -> f32 {
    self.right - self.left
  }

  pub fn height(&self) -> f32 {
    self.bottom - self.top
  }

  pub fn area(&self) -> f32 {
    self.width() * self.height()
  }

  /// 右边界小于左边界或下边界小于上边界时矩形退化，必须丢弃
  pub fn is_degenerate(&self) -> bool {
    self.right < self.left || self.bottom < self.top
  }

  /// 计算两个矩形的交并比
  ///
  /// 不相交（交集宽或高非正）或并集面积为零时返回 0。
  pub fn iou(&self, other: &Rect) -> f32 {
    let inter_left = self.left.max(other.left);
    let inter_top = self.top.max(other.top);
    let inter_right = self.right.min(other.right);
    let inter_bottom = self.bottom.min(other.bottom);

    if inter_right <= inter_left || inter_bottom <= inter_top {
      return 0.0;
    }

    let inter_area = (inter_right - inter_left) * (inter_bottom - inter_top);
    let union_area = self.area() + other.area() - inter_area;

    if union_area > 0.0 {
      inter_area / union_area
    } else {
      0.0
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn iou_is_symmetric() {
    let a = Rect::new(0.0, 0.0, 10.0, 10.0);
    let b = Rect::new(5.0, 5.0, 15.0, 15.0);
    assert_eq!(a.iou(&b), b.iou(&a));
  }

  #[test]
  fn iou_with_self_is_one() {
    let a = Rect::new(3.0, 4.0, 20.0, 18.0);
    assert_eq!(a.iou(&a), 1.0);
  }

  #[test]
  fn iou_of_disjoint_rects_is_zero() {
    let a = Rect::new(0.0, 0.0, 10.0, 10.0);
    let b = Rect::new(20.0, 20.0, 30.0, 30.0);
    assert_eq!(a.iou(&b), 0.0);
  }

  #[test]
  fn iou_of_touching_rects_is_zero() {
    // 只共享一条边，交集宽度为零
    let a = Rect::new(0.0, 0.0, 10.0, 10.0);
    let b = Rect::new(10.0, 0.0, 20.0, 10.0);
    assert_eq!(a.iou(&b), 0.0);
  }

  #[test]
  fn iou_partial_overlap() {
    let a = Rect::new(0.0, 0.0, 10.0, 10.0);
    let b = Rect::new(5.0, 0.0, 15.0, 10.0);
    // 交集 50，并集 150
    assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);
  }

  #[test]
  fn degenerate_rect_detected() {
    assert!(Rect::new(10.0, 0.0, 0.0, 10.0).is_degenerate());
    assert!(Rect::new(0.0, 10.0, 10.0, 0.0).is_degenerate());
    assert!(!Rect::new(0.0, 0.0, 10.0, 10.0).is_degenerate());
  }
}
