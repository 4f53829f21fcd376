// 该文件是 Shicai （食材识别） 项目的一部分。
// src/detector/suppress.rs - 两阶段非极大值抑制
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

use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::debug;

use crate::detector::Detection;

/// 抑制策略参数
#[derive(Debug, Clone, Copy)]
pub struct SuppressionPolicy {
  /// 同类抑制的 IoU 阈值
  pub class_iou: f32,
  /// 跨类抑制的 IoU 阈值，仅合并几乎重合的框
  pub global_iou: f32,
  /// 每个类别保留的检测上限
  pub max_per_class: usize,
  /// 最终输出的检测总数上限
  pub max_total: usize,
}

impl Default for SuppressionPolicy {
  fn default() -> Self {
    Self {
      class_iou: 0.4,
      global_iou: 0.7,
      max_per_class: 3,
      max_total: 10,
    }
  }
}

/// 置信度降序的稳定排序，输入顺序相同则输出确定
fn sort_by_confidence(detections: &mut [Detection]) {
  detections.sort_by(|a, b| {
    b.confidence
      .partial_cmp(&a.confidence)
      .unwrap_or(Ordering::Equal)
  });
}

/// 贪心抑制：保留未被抑制的框，并压制其后 IoU 超阈值的框
///
/// 输入必须已按置信度降序排列；`max_keep` 为 None 时不设上限。
fn greedy_suppress(
  sorted: Vec<Detection>,
  iou_threshold: f32,
  max_keep: Option<usize>,
) -> Vec<Detection> {
  let mut suppressed = vec![false; sorted.len()];
  let mut kept = Vec::new();

  for i in 0..sorted.len() {
    if suppressed[i] {
      continue;
    }
    if let Some(cap) = max_keep
      && kept.len() >= cap
    {
      break;
    }

    for j in (i + 1)..sorted.len() {
      if suppressed[j] {
        continue;
      }
      if sorted[i].rect.iou(&sorted[j].rect) > iou_threshold {
        suppressed[j] = true;
      }
    }

    kept.push(sorted[i].clone());
  }

  kept
}

/// 两阶段非极大值抑制
///
/// 第一阶段按类别分组做同类抑制并施加每类上限；第二阶段在全部
/// 幸存框上以更高阈值做跨类抑制，合并几乎必然是同一物体的重复框；
/// 最后按置信度降序截断到总数上限。
pub fn suppress(detections: Vec<Detection>, policy: &SuppressionPolicy) -> Vec<Detection> {
  if detections.is_empty() {
    return detections;
  }
  let input_count = detections.len();

  // 第一阶段：同类抑制
  let mut by_class: BTreeMap<usize, Vec<Detection>> = BTreeMap::new();
  for detection in detections {
    by_class
      .entry(detection.class_index)
      .or_default()
      .push(detection);
  }

  let mut class_pass = Vec::new();
  for (_, mut group) in by_class {
    sort_by_confidence(&mut group);
    class_pass.extend(greedy_suppress(
      group,
      policy.class_iou,
      Some(policy.max_per_class),
    ));
  }
  let class_pass_count = class_pass.len();

  // 第二阶段：跨类抑制，无每类上限
  sort_by_confidence(&mut class_pass);
  let mut kept = greedy_suppress(class_pass, policy.global_iou, None);

  debug!(
    "NMS: {} -> 同类抑制: {} -> 跨类抑制: {}",
    input_count,
    class_pass_count,
    kept.len()
  );

  kept.truncate(policy.max_total);
  kept
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::geometry::Rect;

  fn detection(rect: Rect, confidence: f32, class_index: usize) -> Detection {
    Detection {
      rect,
      confidence,
      class_index,
      class_name: format!("class-{class_index}"),
    }
  }

  /// 两个 IoU 为 0.9 的矩形
  fn overlapping_pair() -> (Rect, Rect) {
    // (0,0)-(100,90) 与 (0,0)-(100,100)：交集 9000，并集 10000
    let a = Rect::new(0.0, 0.0, 100.0, 90.0);
    let b = Rect::new(0.0, 0.0, 100.0, 100.0);
    assert!((a.iou(&b) - 0.9).abs() < 1e-6);
    (a, b)
  }

  #[test]
  fn class_pass_suppresses_overlapping_same_class() {
    // 前两框高度重叠，第三框不相交
    let a = Rect::new(0.0, 0.0, 100.0, 90.0);
    let b = Rect::new(0.0, 0.0, 100.0, 100.0);
    assert!(a.iou(&b) > 0.4);
    let c = Rect::new(300.0, 300.0, 400.0, 400.0);

    let detections = vec![
      detection(a, 0.9, 0),
      detection(b, 0.85, 0),
      detection(c, 0.3, 0),
    ];
    let result = suppress(detections, &SuppressionPolicy::default());

    assert_eq!(result.len(), 2);
    assert!((result[0].confidence - 0.9).abs() < 1e-6);
    assert!((result[1].confidence - 0.3).abs() < 1e-6);
  }

  #[test]
  fn per_class_cap_is_honored() {
    // 八个互不重叠的同类框，上限 3
    let detections: Vec<Detection> = (0..8)
      .map(|i| {
        let offset = i as f32 * 200.0;
        detection(
          Rect::new(offset, 0.0, offset + 100.0, 100.0),
          0.9 - i as f32 * 0.05,
          7,
        )
      })
      .collect();

    let result = suppress(detections, &SuppressionPolicy::default());
    assert_eq!(result.len(), 3);
    assert!(result.iter().all(|d| d.class_index == 7));
  }

  #[test]
  fn global_pass_merges_cross_class_duplicates() {
    let (a, b) = overlapping_pair();
    // 不同类别但几乎重合（IoU 0.9 > 0.7），全局阶段只留高分框
    let detections = vec![detection(a, 0.9, 0), detection(b, 0.8, 1)];
    let result = suppress(detections, &SuppressionPolicy::default());

    assert_eq!(result.len(), 1);
    assert_eq!(result[0].class_index, 0);
  }

  #[test]
  fn total_cap_and_order_hold() {
    // 20 个互不重叠、类别各异的框
    let detections: Vec<Detection> = (0..20)
      .map(|i| {
        let offset = i as f32 * 200.0;
        detection(
          Rect::new(offset, 0.0, offset + 100.0, 100.0),
          0.99 - i as f32 * 0.01,
          i,
        )
      })
      .collect();

    let policy = SuppressionPolicy::default();
    let result = suppress(detections, &policy);

    assert_eq!(result.len(), policy.max_total);
    for pair in result.windows(2) {
      assert!(pair[0].confidence >= pair[1].confidence);
    }
  }

  #[test]
  fn suppression_is_idempotent() {
    let (a, b) = overlapping_pair();
    let detections = vec![
      detection(a, 0.9, 0),
      detection(b, 0.85, 0),
      detection(Rect::new(300.0, 0.0, 420.0, 100.0), 0.7, 1),
      detection(Rect::new(0.0, 300.0, 90.0, 400.0), 0.6, 2),
    ];

    let policy = SuppressionPolicy::default();
    let once = suppress(detections, &policy);
    let twice = suppress(once.clone(), &policy);

    assert_eq!(once.len(), twice.len());
    for (x, y) in once.iter().zip(twice.iter()) {
      assert_eq!(x.rect, y.rect);
      assert_eq!(x.class_index, y.class_index);
      assert_eq!(x.confidence, y.confidence);
    }
  }

  #[test]
  fn output_never_longer_than_input() {
    let (a, b) = overlapping_pair();
    let detections = vec![detection(a, 0.9, 0), detection(b, 0.85, 1)];
    let result = suppress(detections, &SuppressionPolicy::default());
    assert!(result.len() <= 2);
  }

  #[test]
  fn empty_input_stays_empty() {
    assert!(suppress(Vec::new(), &SuppressionPolicy::default()).is_empty());
  }
}
