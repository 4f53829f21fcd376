// 该文件是 Shicai （食材识别） 项目的一部分。
// src/model.rs - 推理后端抽象
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

use tracing::warn;

/// 预处理后的模型输入缓冲
///
/// 量化模型直接拷贝原始字节，浮点模型归一化到 [0,1]。
#[derive(Debug, Clone)]
pub enum TensorData {
  Uint8(Vec<u8>),
  Float32(Vec<f32>),
}

impl TensorData {
  pub fn len(&self) -> usize {
    match self {
      TensorData::Uint8(data) => data.len(),
      TensorData::Float32(data) => data.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// 推理后端 trait
///
/// 推理本身对本 crate 是不透明能力：后端负责持有模型权重、
/// 执行张量计算，量化后端在返回前完成反量化（scale/zero-point）。
/// 后端句柄不可重入，同一实例上不允许并发调用 `run`，
/// 串行化由流水线负责。
pub trait InferenceBackend: Send {
  /// 模型声明的输入张量形状，如 [1, 3, 640, 640] 或 [1, 640, 640, 3]
  fn input_shape(&self) -> &[usize];

  /// 模型声明的输出张量形状，如 [1, 25, 8400]
  fn output_shape(&self) -> &[usize];

  /// 输入是否为量化（UInt8）张量
  fn input_quantized(&self) -> bool;

  /// 执行一次推理，返回反量化后的输出数据
  fn run(&mut self, input: &TensorData) -> anyhow::Result<Vec<f32>>;
}

/// 通道排布
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
  /// 通道优先（NCHW）
  Planar,
  /// 通道交错（NHWC）
  Interleaved,
}

/// 模型输入几何信息，模型加载时从声明的输入形状推导一次
#[derive(Debug, Clone, Copy)]
pub struct ModelGeometry {
  /// 模型输入宽度
  pub input_width: u32,
  /// 模型输入高度
  pub input_height: u32,
  /// 通道排布
  pub channel_order: ChannelOrder,
  /// 是否为量化输入
  pub quantized: bool,
}

impl ModelGeometry {
  /// 从模型声明的输入形状推导几何信息
  ///
  /// 形状 [1, 3, h, w] 视为通道优先，[1, h, w, 3] 视为通道交错；
  /// 无法解析的形状回退到 640x640 交错浮点输入，检测按尽力而为
  /// 继续进行而不是报错。
  pub fn from_input_shape(shape: &[usize], quantized: bool) -> Self {
    if shape.len() == 4 {
      if shape[1] == 3 {
        return ModelGeometry {
          input_width: shape[3] as u32,
          input_height: shape[2] as u32,
          channel_order: ChannelOrder::Planar,
          quantized,
        };
      }
      if shape[3] == 3 {
        return ModelGeometry {
          input_width: shape[2] as u32,
          input_height: shape[1] as u32,
          channel_order: ChannelOrder::Interleaved,
          quantized,
        };
      }
    }

    warn!("无法解析模型输入形状 {:?}, 回退到 640x640 NHWC", shape);
    ModelGeometry {
      input_width: 640,
      input_height: 640,
      channel_order: ChannelOrder::Interleaved,
      quantized,
    }
  }
}
