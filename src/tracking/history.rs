//! 单目标预测历史 + 多数投票平滑
//! Per-track prediction history with majority-vote smoothing
//!
//! 核心思想:
//! 1. 每个 track 保留最近 `capacity` 帧的原始分类结果 (环形缓冲)
//! 2. 票数最多的标签胜出
//! 3. 置信度 = 胜出标签各次观测置信度的均值
//! 4. 平票时,最近一次被观测到的标签胜出

use std::collections::VecDeque;
use std::time::Instant;

use super::types::{MaskLabel, PredictionRecord, SmoothedPrediction};

/// 单个标签的投票统计
struct Tally {
    label: MaskLabel,
    votes: usize,
    confidence_sum: f32,
    /// 该标签最后一次出现的位置 (越大越新)
    last_seen: usize,
}

/// 固定容量的预测历史
#[derive(Clone, Debug)]
pub struct TrackHistory {
    capacity: usize,
    records: VecDeque<PredictionRecord>,
}

impl TrackHistory {
    /// 创建历史缓冲, 容量至少为1
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 追加一次观测, 超出容量时丢弃最旧的记录; 返回刚写入的记录
    pub fn record(
        &mut self,
        label: MaskLabel,
        confidence: f32,
        observed_at: Instant,
    ) -> PredictionRecord {
        let record = PredictionRecord::new(label, confidence, observed_at);
        self.records.push_back(record);
        while self.records.len() > self.capacity {
            self.records.pop_front();
        }
        record
    }

    /// 多数投票平滑
    pub fn smoothed_prediction(&self) -> SmoothedPrediction {
        // 标签集合很小, 线性查找即可
        let mut tallies: Vec<Tally> = Vec::with_capacity(2);
        for (position, record) in self.records.iter().enumerate() {
            match tallies.iter_mut().find(|t| t.label == record.label()) {
                Some(tally) => {
                    tally.votes += 1;
                    tally.confidence_sum += record.confidence();
                    tally.last_seen = position;
                }
                None => tallies.push(Tally {
                    label: record.label(),
                    votes: 1,
                    confidence_sum: record.confidence(),
                    last_seen: position,
                }),
            }
        }

        tallies
            .into_iter()
            .max_by(|a, b| {
                a.votes
                    .cmp(&b.votes)
                    .then_with(|| a.last_seen.cmp(&b.last_seen))
            })
            .map(|winner| {
                SmoothedPrediction::new(winner.label, winner.confidence_sum / winner.votes as f32)
            })
            .unwrap_or(SmoothedPrediction::UNKNOWN)
    }
}
