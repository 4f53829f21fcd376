// 该文件是 Shicai （食材识别） 项目的一部分。
// src/lib.rs - 库主文件
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

//! 食材识别检测后处理库
//!
//! 将目标检测模型的原始输出张量解码为带标签的检测框，
//! 经两阶段非极大值抑制后映射回原图坐标，并提供直播流
//! 节流、上传图像回退检测与菜谱匹配。

pub mod detector;
pub mod geometry;
pub mod input;
pub mod labels;
pub mod model;
pub mod pipeline;
pub mod recipes;
pub mod tracker;

pub use detector::{DetectOutcome, Detection, Detector, EmptyReason};
pub use geometry::Rect;
pub use model::{InferenceBackend, ModelGeometry, TensorData};
pub use pipeline::{FramePipeline, PipelineConfig, PipelineState};
pub use tracker::{IdentityTracker, TrackedDetection};
