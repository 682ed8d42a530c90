//! 跟踪系统数据结构定义
//! Data structures for the mask tracking core

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

// ========== 公共常量 ==========

/// 默认平滑窗口长度 (帧)
pub const DEFAULT_HISTORY_SIZE: usize = 5;

/// 未跟踪目标的 track id
pub const UNTRACKED_ID: i64 = -1;

// ========== 枚举类型 ==========

/// 口罩分类结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MaskLabel {
    #[serde(rename = "Mask")]
    Mask,
    #[serde(rename = "No Mask")]
    NoMask,
    /// 无历史记录时的占位结果
    #[serde(rename = "Unknown")]
    Unknown,
}

impl MaskLabel {
    /// 分类器原始输出 (no_mask, mask) → (标签, 置信度)
    ///
    /// 两者相等时判为 `NoMask`.
    pub fn from_scores(no_mask: f32, mask: f32) -> (Self, f32) {
        let label = if mask > no_mask {
            MaskLabel::Mask
        } else {
            MaskLabel::NoMask
        };
        (label, mask.max(no_mask))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MaskLabel::Mask => "Mask",
            MaskLabel::NoMask => "No Mask",
            MaskLabel::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for MaskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ========== 数据结构 ==========

/// 单次观测 (一帧的原始分类结果)
#[derive(Clone, Copy, Debug)]
pub struct PredictionRecord {
    label: MaskLabel,
    confidence: f32,
    observed_at: Instant,
}

impl PredictionRecord {
    pub fn new(label: MaskLabel, confidence: f32, observed_at: Instant) -> Self {
        Self {
            label,
            confidence,
            observed_at,
        }
    }

    pub fn label(&self) -> MaskLabel {
        self.label
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn observed_at(&self) -> Instant {
        self.observed_at
    }
}

/// 平滑后的预测结果
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SmoothedPrediction {
    pub label: MaskLabel,
    pub confidence: f32,
}

impl SmoothedPrediction {
    /// 无历史时的占位结果: (Unknown, 0.0)
    pub const UNKNOWN: SmoothedPrediction = SmoothedPrediction {
        label: MaskLabel::Unknown,
        confidence: 0.0,
    };

    pub fn new(label: MaskLabel, confidence: f32) -> Self {
        Self { label, confidence }
    }
}

/// 人脸检测框 (像素坐标, 左上 + 右下)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceBox {
    #[serde(rename = "startX")]
    pub start_x: i32,
    #[serde(rename = "startY")]
    pub start_y: i32,
    #[serde(rename = "endX")]
    pub end_x: i32,
    #[serde(rename = "endY")]
    pub end_y: i32,
}

impl FaceBox {
    pub fn new(start_x: i32, start_y: i32, end_x: i32, end_y: i32) -> Self {
        Self {
            start_x,
            start_y,
            end_x,
            end_y,
        }
    }

    /// 裁剪到图像范围 [0, w-1] × [0, h-1]
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        let max_x = i32::try_from(width).unwrap_or(i32::MAX).saturating_sub(1).max(0);
        let max_y = i32::try_from(height).unwrap_or(i32::MAX).saturating_sub(1).max(0);
        Self {
            start_x: self.start_x.max(0),
            start_y: self.start_y.max(0),
            end_x: self.end_x.min(max_x),
            end_y: self.end_y.min(max_y),
        }
    }

    /// 宽度, 反向框为0
    pub fn width(&self) -> i32 {
        self.end_x.saturating_sub(self.start_x).max(0)
    }

    /// 高度, 反向框为0
    pub fn height(&self) -> i32 {
        self.end_y.saturating_sub(self.start_y).max(0)
    }

    /// 面积为0的框 (裁剪后无像素)
    pub fn is_empty(&self) -> bool {
        self.end_x <= self.start_x || self.end_y <= self.start_y
    }
}
