// 该文件是 Shicai （食材识别） 项目的一部分。
// src/tracker.rs - 帧内身份分配
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

use crate::detector::Detection;
use crate::geometry::Rect;

/// 叠加层显示颜色（RGB）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub u8, pub u8, pub u8);

/// 默认调色板，按类别索引取模选色
pub const DEFAULT_PALETTE: [Color; 12] = [
  Color(255, 0, 0),
  Color(0, 255, 0),
  Color(0, 0, 255),
  Color(255, 255, 0),
  Color(255, 0, 255),
  Color(0, 255, 255),
  Color(255, 128, 0),
  Color(255, 0, 128),
  Color(128, 255, 0),
  Color(0, 128, 255),
  Color(255, 255, 255),
  Color(128, 0, 255),
];

/// 带帧内身份与显示颜色的检测结果
///
/// 身份只在单次输出批内有意义：每帧都会为所有检测重新铸造
/// 新的 id，没有跨帧的空间关联。
#[derive(Debug, Clone)]
pub struct TrackedDetection {
  /// 跟踪器生命周期内严格递增、永不复用的标识
  pub id: u64,
  pub rect: Rect,
  pub class_index: usize,
  pub class_name: String,
  pub confidence: f32,
  pub color: Color,
}

/// 帧内身份分配器
///
/// 唯一持有递增计数器；计数器只随进程生命周期存在，不会显式重置。
pub struct IdentityTracker {
  next_id: u64,
  palette: Vec<Color>,
}

impl Default for IdentityTracker {
  fn default() -> Self {
    Self::new(DEFAULT_PALETTE.to_vec())
  }
}

impl IdentityTracker {
  /// 用给定调色板创建分配器，空调色板回退到默认调色板
  pub fn new(palette: Vec<Color>) -> Self {
    let palette = if palette.is_empty() {
      DEFAULT_PALETTE.to_vec()
    } else {
      palette
    };
    Self {
      next_id: 0,
      palette,
    }
  }

  /// 按输入顺序为每个检测铸造新身份并附上显示颜色
  pub fn assign(&mut self, detections: Vec<Detection>) -> Vec<TrackedDetection> {
    detections
      .into_iter()
      .map(|detection| {
        let id = self.next_id;
        self.next_id += 1;

        let color = self.palette[detection.class_index % self.palette.len()];
        TrackedDetection {
          id,
          rect: detection.rect,
          class_index: detection.class_index,
          class_name: detection.class_name,
          confidence: detection.confidence,
          color,
        }
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn detection(class_index: usize) -> Detection {
    Detection {
      rect: Rect::new(0.0, 0.0, 50.0, 50.0),
      confidence: 0.8,
      class_index,
      class_name: format!("class-{class_index}"),
    }
  }

  #[test]
  fn ids_are_strictly_increasing_across_calls() {
    let mut tracker = IdentityTracker::default();

    let first = tracker.assign(vec![detection(0), detection(1)]);
    let second = tracker.assign(vec![detection(2)]);
    let third = tracker.assign(vec![detection(0), detection(0), detection(3)]);

    let ids: Vec<u64> = first
      .iter()
      .chain(second.iter())
      .chain(third.iter())
      .map(|t| t.id)
      .collect();

    assert_eq!(ids, vec![0, 1, 2, 3, 4, 5]);
  }

  #[test]
  fn fresh_ids_every_frame_for_same_detection() {
    let mut tracker = IdentityTracker::default();

    let first = tracker.assign(vec![detection(5)]);
    let second = tracker.assign(vec![detection(5)]);

    assert_ne!(first[0].id, second[0].id);
  }

  #[test]
  fn color_selected_by_class_index_modulo() {
    let mut tracker = IdentityTracker::default();
    let palette_len = DEFAULT_PALETTE.len();

    let tracked = tracker.assign(vec![detection(3), detection(3 + palette_len)]);
    assert_eq!(tracked[0].color, DEFAULT_PALETTE[3]);
    assert_eq!(tracked[1].color, DEFAULT_PALETTE[3]);
  }

  #[test]
  fn empty_palette_falls_back_to_default() {
    let mut tracker = IdentityTracker::new(Vec::new());
    let tracked = tracker.assign(vec![detection(0)]);
    assert_eq!(tracked[0].color, DEFAULT_PALETTE[0]);
  }
}
