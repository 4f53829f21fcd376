// 该文件是 Shicai （食材识别） 项目的一部分。
// src/pipeline.rs - 检测流水线
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

use std::sync::mpsc::{SyncSender, TrySendError, sync_channel};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::Utc;
use image::{RgbImage, imageops};
use tracing::{debug, error, info, warn};

use crate::detector::{DEFAULT_CONFIDENCE_THRESHOLD, Detection, Detector};
use crate::input::{Rotation, Yuv420Frame, yuv420_to_rgb};
use crate::tracker::{IdentityTracker, TrackedDetection};

/// 上传图像首轮检测的置信度阈值
pub const UPLOAD_CONFIDENCE_THRESHOLD: f32 = 0.35;

/// 上传图像回退轮的置信度阈值
pub const UPLOAD_FALLBACK_THRESHOLD: f32 = 0.3;

/// 上传图像先缩到该最大边长再检测，避免大图拖慢推理
const UPLOAD_MAX_DIMENSION: u32 = 1024;

/// 流水线配置
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
  /// 直播流节流间隔，间隔内到达的帧直接丢弃
  pub throttle_interval: Duration,
  /// 直播流置信度阈值
  pub live_threshold: f32,
  /// 上传图像首轮阈值
  pub upload_threshold: f32,
  /// 上传图像回退轮阈值
  pub upload_fallback_threshold: f32,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      throttle_interval: Duration::from_millis(100),
      live_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      upload_threshold: UPLOAD_CONFIDENCE_THRESHOLD,
      upload_fallback_threshold: UPLOAD_FALLBACK_THRESHOLD,
    }
  }
}

/// 流水线状态
///
/// 上传检测进行期间直播帧被跳过，避免对不可重入的推理后端
/// 发起并发调用；状态在派发任一路径前以持锁方式检查。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
  Idle,
  LiveStreaming,
  ProcessingUpload,
}

/// 直播流节流器：固定间隔内最多处理一帧
#[derive(Debug)]
pub struct FrameThrottle {
  interval: Duration,
  last_processed: Option<Instant>,
}

impl FrameThrottle {
  pub fn new(interval: Duration) -> Self {
    Self {
      interval,
      last_processed: None,
    }
  }

  /// 判断当前时刻是否应处理帧，处理则记录时刻
  pub fn should_process(&mut self, now: Instant) -> bool {
    match self.last_processed {
      Some(last) if now.duration_since(last) < self.interval => false,
      _ => {
        self.last_processed = Some(now);
        true
      }
    }
  }
}

/// 检测输出回调：(检测列表, 时间戳毫秒, 图像尺寸)
pub type DetectionCallback = Box<dyn Fn(&[TrackedDetection], i64, (u32, u32)) + Send + 'static>;

struct LiveFrame {
  frame: Yuv420Frame,
  rotation: Rotation,
}

/// 直播流输入句柄
///
/// 通过零容量通道与工作线程会合：工作线程忙时投递失败，
/// 帧被丢弃而不是排队，宁可丢帧也不积压。
pub struct LiveFeed {
  sender: SyncSender<LiveFrame>,
}

impl LiveFeed {
  /// 投递一帧，返回是否被工作线程接收
  pub fn submit(&self, frame: Yuv420Frame, rotation: Rotation) -> bool {
    match self.sender.try_send(LiveFrame { frame, rotation }) {
      Ok(()) => true,
      Err(TrySendError::Full(_)) => {
        debug!("工作线程忙，丢弃当前帧");
        false
      }
      Err(TrySendError::Disconnected(_)) => {
        warn!("工作线程已退出，丢弃当前帧");
        false
      }
    }
  }
}

/// 检测流水线
///
/// 将预处理、推理、解码、抑制与身份分配串成单个可调用单元，
/// 并为直播流提供节流与背压丢帧。推理后端句柄为进程级共享
/// 资源，锁保证同一时刻只有一个调用方执行推理。
pub struct FramePipeline {
  detector: Arc<Mutex<Detector>>,
  tracker: Arc<Mutex<IdentityTracker>>,
  state: Arc<Mutex<PipelineState>>,
  config: PipelineConfig,
  live_worker: Option<JoinHandle<()>>,
  live_sender: Option<SyncSender<LiveFrame>>,
}

impl FramePipeline {
  pub fn new(detector: Detector, config: PipelineConfig) -> Self {
    Self {
      detector: Arc::new(Mutex::new(detector)),
      tracker: Arc::new(Mutex::new(IdentityTracker::default())),
      state: Arc::new(Mutex::new(PipelineState::Idle)),
      config,
      live_worker: None,
      live_sender: None,
    }
  }

  pub fn state(&self) -> PipelineState {
    *self.state.lock().unwrap()
  }

  /// 对单张图像同步执行检测
  ///
  /// 后端不可用或推理失败时返回空列表，不向调用方抛错。
  pub fn detect(&self, image: &RgbImage, confidence_threshold: f32) -> Vec<Detection> {
    self
      .detector
      .lock()
      .unwrap()
      .detect(image, confidence_threshold)
      .into_vec()
  }

  /// 启动直播流工作线程并返回帧输入句柄
  ///
  /// 单个工作线程逐帧处理；上传检测进行期间跳过直播帧；
  /// 节流间隔内到达的帧被丢弃。每次成功处理调用一次回调。
  ///
  /// 工作线程已在运行时不再启动新线程，返回指向现有线程的
  /// 输入句柄，本次传入的回调被丢弃。
  pub fn start_live(&mut self, callback: DetectionCallback) -> LiveFeed {
    if self.live_worker.is_some()
      && let Some(sender) = &self.live_sender
    {
      warn!("直播流工作线程已在运行，复用现有输入句柄");
      return LiveFeed {
        sender: sender.clone(),
      };
    }

    let (sender, receiver) = sync_channel::<LiveFrame>(0);

    {
      let mut state = self.state.lock().unwrap();
      if *state == PipelineState::Idle {
        *state = PipelineState::LiveStreaming;
      }
    }

    let detector = Arc::clone(&self.detector);
    let tracker = Arc::clone(&self.tracker);
    let state = Arc::clone(&self.state);
    let config = self.config;

    let worker = thread::spawn(move || {
      info!("直播流工作线程启动");
      let mut throttle = FrameThrottle::new(config.throttle_interval);

      while let Ok(live_frame) = receiver.recv() {
        if *state.lock().unwrap() == PipelineState::ProcessingUpload {
          debug!("上传检测进行中，跳过直播帧");
          continue;
        }

        if !throttle.should_process(Instant::now()) {
          continue;
        }

        let image = match yuv420_to_rgb(&live_frame.frame, live_frame.rotation) {
          Ok(image) => image,
          Err(err) => {
            error!("帧转换失败，跳过该帧: {err}");
            continue;
          }
        };

        let started = Instant::now();
        let detections = detector
          .lock()
          .unwrap()
          .detect(&image, config.live_threshold)
          .into_vec();
        debug!("直播帧推理耗时: {:.2?}", started.elapsed());

        let tracked = tracker.lock().unwrap().assign(detections);
        let timestamp = Utc::now().timestamp_millis();
        callback(&tracked, timestamp, (image.width(), image.height()));
      }

      info!("直播流工作线程退出");
    });

    self.live_worker = Some(worker);
    self.live_sender = Some(sender.clone());
    LiveFeed { sender }
  }

  /// 停止直播流：丢弃输入句柄后调用，等待工作线程退出
  pub fn stop_live(&mut self) {
    self.live_sender = None;
    if let Some(worker) = self.live_worker.take() {
      if worker.join().is_err() {
        error!("直播流工作线程异常退出");
      }
    }

    let mut state = self.state.lock().unwrap();
    if *state == PipelineState::LiveStreaming {
      *state = PipelineState::Idle;
    }
  }

  /// 在后台线程上检测一张上传图像
  ///
  /// 派发前置位 ProcessingUpload，使相机分析路径跳过自身的帧，
  /// 两条路径不会对同一后端并发推理。首轮在降采样图上以 0.35
  /// 阈值检测；一无所获且原图更大时，以 0.3 阈值对原图回退
  /// 检测一次。完成后恢复先前状态并调用一次回调。
  ///
  /// 已有上传检测在途时拒绝派发并返回 None。
  pub fn detect_upload(
    &self,
    image: RgbImage,
    callback: DetectionCallback,
  ) -> Option<JoinHandle<()>> {
    let previous = {
      let mut state = self.state.lock().unwrap();
      if *state == PipelineState::ProcessingUpload {
        warn!("上传检测已在进行中，忽略本次请求");
        return None;
      }
      let previous = *state;
      *state = PipelineState::ProcessingUpload;
      previous
    };

    let detector = Arc::clone(&self.detector);
    let tracker = Arc::clone(&self.tracker);
    let state = Arc::clone(&self.state);
    let config = self.config;

    Some(thread::spawn(move || {
      let scaled = downscale(&image, UPLOAD_MAX_DIMENSION);

      let started = Instant::now();
      let mut detections = detector
        .lock()
        .unwrap()
        .detect(&scaled, config.upload_threshold)
        .into_vec();
      info!(
        "上传图像检测耗时 {:.2?}, 检出 {} 项",
        started.elapsed(),
        detections.len()
      );
      let mut size = scaled.dimensions();

      // 回退轮：仅当首轮为空且存在更高分辨率的原图
      if detections.is_empty() && image.dimensions() != scaled.dimensions() {
        let started = Instant::now();
        detections = detector
          .lock()
          .unwrap()
          .detect(&image, config.upload_fallback_threshold)
          .into_vec();
        info!(
          "原图回退检测耗时 {:.2?}, 检出 {} 项",
          started.elapsed(),
          detections.len()
        );
        size = image.dimensions();
      }

      let tracked = tracker.lock().unwrap().assign(detections);
      let timestamp = Utc::now().timestamp_millis();
      callback(&tracked, timestamp, size);

      *state.lock().unwrap() = previous;
    }))
  }

  /// 关闭流水线：停止直播流并释放推理后端
  ///
  /// 释放后句柄不得再使用，后续检测调用全部返回空结果。
  pub fn close(&mut self) {
    self.stop_live();
    self.detector.lock().unwrap().close();
    *self.state.lock().unwrap() = PipelineState::Idle;
  }
}

/// 最大边长超限时按比例缩小图像
fn downscale(image: &RgbImage, max_dimension: u32) -> RgbImage {
  let longest = image.width().max(image.height());
  if longest <= max_dimension {
    return image.clone();
  }

  let ratio = max_dimension as f32 / longest as f32;
  let new_width = ((image.width() as f32 * ratio) as u32).max(1);
  let new_height = ((image.height() as f32 * ratio) as u32).max(1);
  imageops::resize(image, new_width, new_height, imageops::FilterType::Triangle)
}
