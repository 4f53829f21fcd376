// 该文件是 Shicai （食材识别） 项目的一部分。
// src/detector/decode.rs - 输出张量解码
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

use tracing::{debug, warn};

use crate::detector::{Detection, LetterboxTransform};
use crate::geometry::Rect;
use crate::model::ModelGeometry;

/// 坐标是否为绝对像素的采样上限
const COORD_SAMPLE_BOXES: usize = 100;

/// 判定绝对坐标的幅值阈值，归一化坐标不会超过它
const COORD_ABSOLUTE_MAGNITUDE: f32 = 2.0;

/// 输出张量的候选框/属性排布
///
/// 模型可能声明 [1, numBoxes, attrCount] 或 [1, attrCount, numBoxes]，
/// 两种排布无法从形状本身区分，只能用期望属性数做启发式判断。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLayout {
  /// 候选框为主维度：[numBoxes, attrCount]
  BoxesMajor { num_boxes: usize, attr_count: usize },
  /// 属性为主维度：[attrCount, numBoxes]
  AttrsMajor { num_boxes: usize, attr_count: usize },
  /// 无法解析的形状
  Invalid,
}

impl OutputLayout {
  /// 从模型声明的输出形状推断排布
  ///
  /// 三维形状比较两种解释与期望属性数的距离，距离相等时
  /// 偏向候选框为主；二维形状按 [numBoxes, attrCount] 处理。
  pub fn parse(shape: &[usize], expected_attr: usize) -> Self {
    match shape.len() {
      3 => {
        let diff_last = shape[2].abs_diff(expected_attr);
        let diff_first = shape[1].abs_diff(expected_attr);

        let layout = if diff_last <= diff_first {
          OutputLayout::BoxesMajor {
            num_boxes: shape[1],
            attr_count: shape[2],
          }
        } else {
          OutputLayout::AttrsMajor {
            num_boxes: shape[2],
            attr_count: shape[1],
          }
        };
        debug!("输出排布解析: 形状 {:?} -> {:?}", shape, layout);
        layout
      }
      2 => OutputLayout::BoxesMajor {
        num_boxes: shape[0],
        attr_count: shape[1],
      },
      _ => OutputLayout::Invalid,
    }
  }

  pub fn num_boxes(&self) -> usize {
    match self {
      OutputLayout::BoxesMajor { num_boxes, .. } => *num_boxes,
      OutputLayout::AttrsMajor { num_boxes, .. } => *num_boxes,
      OutputLayout::Invalid => 0,
    }
  }

  pub fn attr_count(&self) -> usize {
    match self {
      OutputLayout::BoxesMajor { attr_count, .. } => *attr_count,
      OutputLayout::AttrsMajor { attr_count, .. } => *attr_count,
      OutputLayout::Invalid => 0,
    }
  }
}

/// 类别分数的起始属性索引与模型声明的类别数
///
/// 属性数恰为 5 + 标签数时模型带 objectness 分数，类别分数从
/// 属性 5 开始；否则从属性 4 开始。
pub(crate) fn class_layout(attr_count: usize, num_labels: usize) -> (usize, usize) {
  let class_start = if attr_count == 5 + num_labels { 5 } else { 4 };
  (class_start, attr_count.saturating_sub(class_start))
}

/// 以 [属性][候选框] 方式索引扁平输出缓冲的视图
pub struct OutputView<'a> {
  data: &'a [f32],
  num_boxes: usize,
  attr_count: usize,
  attr_is_last: bool,
}

impl<'a> OutputView<'a> {
  /// 按排布包装输出缓冲，数据长度不足时返回 None
  pub fn new(data: &'a [f32], layout: OutputLayout) -> Option<Self> {
    let (num_boxes, attr_count, attr_is_last) = match layout {
      OutputLayout::BoxesMajor {
        num_boxes,
        attr_count,
      } => (num_boxes, attr_count, true),
      OutputLayout::AttrsMajor {
        num_boxes,
        attr_count,
      } => (num_boxes, attr_count, false),
      OutputLayout::Invalid => return None,
    };

    if num_boxes == 0 || attr_count == 0 || data.len() < num_boxes * attr_count {
      return None;
    }

    Some(OutputView {
      data,
      num_boxes,
      attr_count,
      attr_is_last,
    })
  }

  pub fn num_boxes(&self) -> usize {
    self.num_boxes
  }

  pub fn attr_count(&self) -> usize {
    self.attr_count
  }

  fn at(&self, attr: usize, box_idx: usize) -> f32 {
    if self.attr_is_last {
      self.data[box_idx * self.attr_count + attr]
    } else {
      self.data[attr * self.num_boxes + box_idx]
    }
  }
}

/// 将输出视图解码为原图坐标下的候选检测列表
///
/// 逐候选框读取中心格式坐标，应用置信度阈值与 letterbox 逆变换，
/// 裁剪到图像边界并丢弃退化或过小的框。类别扫描不会越过已知
/// 标签列表的末尾。
#[allow(clippy::too_many_arguments)]
pub fn decode(
  view: &OutputView,
  confidence_threshold: f32,
  letterbox: &LetterboxTransform,
  geometry: &ModelGeometry,
  image_width: u32,
  image_height: u32,
  labels: &[String],
  min_box_size: f32,
) -> Vec<Detection> {
  let num_classes = labels.len();
  let attr_count = view.attr_count();
  let num_boxes = view.num_boxes();

  let (class_start, model_classes) = class_layout(attr_count, num_classes);
  let has_objectness = class_start == 5;

  if model_classes == 0 {
    warn!("输出属性数 {} 不含类别分数，放弃解码", attr_count);
    return Vec::new();
  }
  if model_classes != num_classes {
    warn!(
      "模型类别数 {} 与标签数 {} 不一致，仅扫描前 {} 个类别",
      model_classes,
      num_classes,
      model_classes.min(num_classes)
    );
  }
  let classes_to_check = model_classes.min(num_classes);

  // 采样前若干候选框的坐标属性判断是否为绝对像素坐标
  let coords_absolute = (0..4.min(attr_count)).any(|a| {
    (0..COORD_SAMPLE_BOXES.min(num_boxes)).any(|b| view.at(a, b).abs() > COORD_ABSOLUTE_MAGNITUDE)
  });

  let image_width = image_width as f32;
  let image_height = image_height as f32;
  let mut detections = Vec::new();

  for b in 0..num_boxes {
    let mut x_center = view.at(0, b);
    let mut y_center = view.at(1, b);
    let mut width = view.at(2, b);
    let mut height = view.at(3, b);

    if width <= 0.0 || height <= 0.0 {
      continue;
    }

    if !coords_absolute {
      x_center *= geometry.input_width as f32;
      y_center *= geometry.input_height as f32;
      width *= geometry.input_width as f32;
      height *= geometry.input_height as f32;
    }

    let obj_score = if has_objectness { view.at(4, b) } else { 1.0 };

    let mut max_score = 0.0f32;
    let mut max_class = None;
    for c in 0..classes_to_check {
      let class_score = view.at(class_start + c, b) * obj_score;
      if class_score > max_score {
        max_score = class_score;
        max_class = Some(c);
      }
    }

    let Some(class_index) = max_class else {
      continue;
    };
    if max_score < confidence_threshold {
      continue;
    }

    // 中心格式转角点格式，再做 letterbox 逆变换回原图坐标
    let x1 = x_center - width / 2.0;
    let y1 = y_center - height / 2.0;

    let orig_x = (x1 - letterbox.pad_x) / letterbox.scale;
    let orig_y = (y1 - letterbox.pad_y) / letterbox.scale;
    let orig_w = width / letterbox.scale;
    let orig_h = height / letterbox.scale;

    let rect = Rect::new(
      orig_x.clamp(0.0, image_width),
      orig_y.clamp(0.0, image_height),
      (orig_x + orig_w).clamp(0.0, image_width),
      (orig_y + orig_h).clamp(0.0, image_height),
    );

    if rect.is_degenerate() || rect.width() < min_box_size || rect.height() < min_box_size {
      continue;
    }

    detections.push(Detection {
      rect,
      confidence: max_score,
      class_index,
      class_name: labels[class_index].clone(),
    });
  }

  detections
}
