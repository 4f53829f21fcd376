// 该文件是 Shicai （食材识别） 项目的一部分。
// src/detector.rs - 食材检测器
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

mod decode;
mod suppress;

pub use decode::{OutputLayout, OutputView, decode};
pub use suppress::{SuppressionPolicy, suppress};

use image::{Rgb, RgbImage, imageops};
use tracing::{debug, error, info, warn};

use crate::geometry::Rect;
use crate::model::{ChannelOrder, InferenceBackend, ModelGeometry, TensorData};

/// letterbox 填充的中性灰色
const PAD_COLOR: Rgb<u8> = Rgb([114, 114, 114]);

/// 裁剪后允许的最小框边长（原图像素），过滤退化的误检
const MIN_BOX_SIZE: f32 = 20.0;

/// 直播流的默认置信度阈值
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;

/// 单帧检测结果，解码产生后不再修改
#[derive(Debug, Clone)]
pub struct Detection {
  /// 原图坐标下的边界框
  pub rect: Rect,
  /// 置信度，(0, 1]
  pub confidence: f32,
  /// 类别索引
  pub class_index: usize,
  /// 类别名称
  pub class_name: String,
}

/// 每帧计算一次的 letterbox 变换
///
/// scale 为保持宽高比映射进模型输入方形的统一缩放系数，
/// pad 为缩放后的留白偏移；解码用它把模型空间坐标还原回原图。
#[derive(Debug, Clone, Copy)]
pub struct LetterboxTransform {
  pub scale: f32,
  pub pad_x: f32,
  pub pad_y: f32,
}

/// 空结果的类型化原因
///
/// 让测试能区分“确实没检测到东西”与“流水线故障”，
/// 两者对上层 UI 都表现为空列表。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyReason {
  /// 后端未加载或本次推理失败
  ModelUnavailable,
  /// 输出形状无法解析
  MalformedOutput,
  /// 没有超过阈值的检测
  NoDetectionsAboveThreshold,
}

/// 检测调用结果：检测列表或带原因的空结果
#[derive(Debug, Clone)]
pub enum DetectOutcome {
  Detections(Vec<Detection>),
  Empty(EmptyReason),
}

impl DetectOutcome {
  /// 折叠为 UI 消费的普通列表，空结果变为空向量
  pub fn into_vec(self) -> Vec<Detection> {
    match self {
      DetectOutcome::Detections(detections) => detections,
      DetectOutcome::Empty(_) => Vec::new(),
    }
  }

  pub fn is_empty(&self) -> bool {
    match self {
      DetectOutcome::Detections(detections) => detections.is_empty(),
      DetectOutcome::Empty(_) => true,
    }
  }

  pub fn empty_reason(&self) -> Option<EmptyReason> {
    match self {
      DetectOutcome::Detections(_) => None,
      DetectOutcome::Empty(reason) => Some(*reason),
    }
  }
}

/// 食材检测器
///
/// 持有推理后端与标签列表，负责预处理、解码与抑制。
/// 所有失败都是局部可恢复的：跳过这一帧，等下一帧。
pub struct Detector {
  backend: Option<Box<dyn InferenceBackend>>,
  geometry: ModelGeometry,
  labels: Vec<String>,
  policy: SuppressionPolicy,
}

impl Detector {
  /// 用已加载的后端创建检测器
  ///
  /// 模型声明的类别数与标签数不一致时记录警告但不失败，
  /// 检测按两者的较小值进行。
  pub fn new(backend: Box<dyn InferenceBackend>, labels: Vec<String>) -> Self {
    let geometry = ModelGeometry::from_input_shape(backend.input_shape(), backend.input_quantized());
    info!(
      "检测器就绪: 输入 {}x{}, {:?}, 量化={}, 标签数={}",
      geometry.input_width,
      geometry.input_height,
      geometry.channel_order,
      geometry.quantized,
      labels.len()
    );

    let layout = OutputLayout::parse(backend.output_shape(), 4 + labels.len());
    if layout != OutputLayout::Invalid {
      let (_, model_classes) = decode::class_layout(layout.attr_count(), labels.len());
      if model_classes != labels.len() {
        warn!(
          "模型类别数 {} 与标签数 {} 不一致，将按较小值扫描",
          model_classes,
          labels.len()
        );
      }
    }

    Self {
      backend: Some(backend),
      geometry,
      labels,
      policy: SuppressionPolicy::default(),
    }
  }

  /// 创建“无检测器”状态的检测器，所有检测调用返回空结果
  pub fn unavailable(labels: Vec<String>) -> Self {
    warn!("模型不可用，检测器进入空载状态");
    Self {
      backend: None,
      geometry: ModelGeometry::from_input_shape(&[], false),
      labels,
      policy: SuppressionPolicy::default(),
    }
  }

  pub fn with_policy(mut self, policy: SuppressionPolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn labels(&self) -> &[String] {
    &self.labels
  }

  pub fn is_available(&self) -> bool {
    self.backend.is_some()
  }

  /// letterbox 预处理
  ///
  /// 保持宽高比缩放进模型输入方形，剩余部分用中性灰填充，
  /// 并按模型声明的通道排布与量化类型填充输入缓冲。
  fn preprocess(&self, image: &RgbImage) -> (TensorData, LetterboxTransform) {
    let input_width = self.geometry.input_width;
    let input_height = self.geometry.input_height;

    let scale = (input_width as f32 / image.width() as f32)
      .min(input_height as f32 / image.height() as f32);
    let new_width = ((image.width() as f32 * scale) as u32).max(1);
    let new_height = ((image.height() as f32 * scale) as u32).max(1);

    let resized = imageops::resize(image, new_width, new_height, imageops::FilterType::Triangle);

    let pad_x = (input_width - new_width) as f32 / 2.0;
    let pad_y = (input_height - new_height) as f32 / 2.0;

    let mut padded = RgbImage::from_pixel(input_width, input_height, PAD_COLOR);
    imageops::overlay(&mut padded, &resized, pad_x as i64, pad_y as i64);

    let pixel_count = (input_width * input_height) as usize;
    let data = match (self.geometry.channel_order, self.geometry.quantized) {
      (ChannelOrder::Interleaved, true) => TensorData::Uint8(padded.into_raw()),
      (ChannelOrder::Interleaved, false) => {
        let mut buffer = Vec::with_capacity(pixel_count * 3);
        for value in padded.into_raw() {
          buffer.push(value as f32 / 255.0);
        }
        TensorData::Float32(buffer)
      }
      (ChannelOrder::Planar, true) => {
        let raw = padded.into_raw();
        let mut buffer = Vec::with_capacity(pixel_count * 3);
        for channel in 0..3 {
          for pixel in 0..pixel_count {
            buffer.push(raw[pixel * 3 + channel]);
          }
        }
        TensorData::Uint8(buffer)
      }
      (ChannelOrder::Planar, false) => {
        let raw = padded.into_raw();
        let mut buffer = Vec::with_capacity(pixel_count * 3);
        for channel in 0..3 {
          for pixel in 0..pixel_count {
            buffer.push(raw[pixel * 3 + channel] as f32 / 255.0);
          }
        }
        TensorData::Float32(buffer)
      }
    };

    (
      data,
      LetterboxTransform {
        scale,
        pad_x,
        pad_y,
      },
    )
  }

  /// 对单张图像执行检测
  ///
  /// 预处理 -> 推理 -> 解码 -> 两阶段抑制。任何失败都在此
  /// 边界被吞掉并记录日志，以带原因的空结果返回。
  pub fn detect(&mut self, image: &RgbImage, confidence_threshold: f32) -> DetectOutcome {
    let Some(backend) = self.backend.as_ref() else {
      return DetectOutcome::Empty(EmptyReason::ModelUnavailable);
    };

    let layout = OutputLayout::parse(backend.output_shape(), 4 + self.labels.len());
    if layout == OutputLayout::Invalid {
      error!("输出形状无法解析: {:?}", backend.output_shape());
      return DetectOutcome::Empty(EmptyReason::MalformedOutput);
    }

    debug!(
      "预处理: {}x{} -> {}x{}",
      image.width(),
      image.height(),
      self.geometry.input_width,
      self.geometry.input_height
    );
    let (input, letterbox) = self.preprocess(image);

    let backend = match self.backend.as_mut() {
      Some(backend) => backend,
      None => return DetectOutcome::Empty(EmptyReason::ModelUnavailable),
    };

    let raw = match backend.run(&input) {
      Ok(raw) => raw,
      Err(err) => {
        error!("推理失败: {err:#}");
        return DetectOutcome::Empty(EmptyReason::ModelUnavailable);
      }
    };

    let Some(view) = OutputView::new(&raw, layout) else {
      error!(
        "输出数据长度 {} 与排布 {:?} 不符",
        raw.len(),
        layout
      );
      return DetectOutcome::Empty(EmptyReason::MalformedOutput);
    };

    let candidates = decode(
      &view,
      confidence_threshold,
      &letterbox,
      &self.geometry,
      image.width(),
      image.height(),
      &self.labels,
      MIN_BOX_SIZE,
    );
    debug!("NMS 前候选框数量: {}", candidates.len());

    let detections = suppress(candidates, &self.policy);
    debug!("最终检测数量: {}", detections.len());

    if detections.is_empty() {
      DetectOutcome::Empty(EmptyReason::NoDetectionsAboveThreshold)
    } else {
      DetectOutcome::Detections(detections)
    }
  }

  /// 释放推理后端，此后所有检测调用返回 ModelUnavailable
  pub fn close(&mut self) {
    if self.backend.take().is_some() {
      info!("推理后端已释放");
    }
  }
}
