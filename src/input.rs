// 该文件是 Shicai （食材识别） 项目的一部分。
// src/input.rs - 相机帧输入与颜色转换
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

use image::{Rgb, RgbImage, imageops};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrameConvertError {
  #[error("Y 平面大小不匹配: 期望 {expected}, 实际 {actual}")]
  LumaPlaneSize { expected: usize, actual: usize },
  #[error("色度平面大小不匹配: 期望 {expected}, U 实际 {u_actual}, V 实际 {v_actual}")]
  ChromaPlaneSize {
    expected: usize,
    u_actual: usize,
    v_actual: usize,
  },
  #[error("帧尺寸无效: {width}x{height}")]
  InvalidDimensions { width: u32, height: u32 },
}

/// 相机上报的画面旋转角度，检测前按此角度转正图像
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
  #[default]
  None,
  Cw90,
  Cw180,
  Cw270,
}

impl Rotation {
  /// 从相机上报的角度值构造，非 90 的倍数视为不旋转
  pub fn from_degrees(degrees: i32) -> Self {
    match degrees.rem_euclid(360) {
      90 => Rotation::Cw90,
      180 => Rotation::Cw180,
      270 => Rotation::Cw270,
      _ => Rotation::None,
    }
  }
}

/// YUV 4:2:0 平面格式的相机帧
///
/// 平面顺序为 Y、U、V。注意：按 NV21 习惯组织数据的相机路径
/// 会先给 V 平面再给 U 平面，调用方必须按实际语义传入，
/// 否则红蓝色度互换。
#[derive(Debug, Clone)]
pub struct Yuv420Frame {
  pub width: u32,
  pub height: u32,
  /// 亮度平面，width * height 字节
  pub y: Vec<u8>,
  /// 蓝色色度平面，ceil(w/2) * ceil(h/2) 字节
  pub u: Vec<u8>,
  /// 红色色度平面，ceil(w/2) * ceil(h/2) 字节
  pub v: Vec<u8>,
}

impl Yuv420Frame {
  /// 转换为 RGB 图像（BT.601 全量程）
  pub fn to_rgb(&self) -> Result<RgbImage, FrameConvertError> {
    if self.width == 0 || self.height == 0 {
      return Err(FrameConvertError::InvalidDimensions {
        width: self.width,
        height: self.height,
      });
    }

    let width = self.width as usize;
    let height = self.height as usize;
    let chroma_width = self.width.div_ceil(2) as usize;
    let chroma_height = self.height.div_ceil(2) as usize;

    let luma_expected = width * height;
    if self.y.len() < luma_expected {
      return Err(FrameConvertError::LumaPlaneSize {
        expected: luma_expected,
        actual: self.y.len(),
      });
    }

    let chroma_expected = chroma_width * chroma_height;
    if self.u.len() < chroma_expected || self.v.len() < chroma_expected {
      return Err(FrameConvertError::ChromaPlaneSize {
        expected: chroma_expected,
        u_actual: self.u.len(),
        v_actual: self.v.len(),
      });
    }

    let mut image = RgbImage::new(self.width, self.height);
    for row in 0..height {
      for col in 0..width {
        let luma = self.y[row * width + col] as f32;
        let chroma_idx = (row / 2) * chroma_width + col / 2;
        let cb = self.u[chroma_idx] as f32 - 128.0;
        let cr = self.v[chroma_idx] as f32 - 128.0;

        let r = luma + 1.402 * cr;
        let g = luma - 0.344136 * cb - 0.714136 * cr;
        let b = luma + 1.772 * cb;

        image.put_pixel(
          col as u32,
          row as u32,
          Rgb([
            r.clamp(0.0, 255.0) as u8,
            g.clamp(0.0, 255.0) as u8,
            b.clamp(0.0, 255.0) as u8,
          ]),
        );
      }
    }

    Ok(image)
  }
}

/// 将 YUV 4:2:0 帧转换为转正后的 RGB 图像
pub fn yuv420_to_rgb(
  frame: &Yuv420Frame,
  rotation: Rotation,
) -> Result<RgbImage, FrameConvertError> {
  let image = frame.to_rgb()?;

  Ok(match rotation {
    Rotation::None => image,
    Rotation::Cw90 => imageops::rotate90(&image),
    Rotation::Cw180 => imageops::rotate180(&image),
    Rotation::Cw270 => imageops::rotate270(&image),
  })
}
