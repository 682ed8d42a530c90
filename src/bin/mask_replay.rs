/// 检测结果回放 (Mask Replay)
///
/// 读取逐帧记录的检测结果 (JSON Lines), 经过跟踪会话平滑后逐行输出 FrameResponse.
///
/// 每行输入格式:
/// {"session_id": "cam-1", "width": 640, "height": 480,
///  "detections": [{"box": {"startX": 1, "startY": 2, "endX": 50, "endY": 60},
///                  "track_id": 3, "label": "Mask", "confidence": 0.93}]}
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use mask_tracker::pipeline::{FaceDetector, FrameDetections, MaskPipeline};
use mask_tracker::{SessionRegistry, TrackerConfig, TrackerError};
use serde::Deserialize;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// 回放参数
#[derive(Parser, Debug)]
#[command(author, version, about = "口罩检测结果回放 - 跨帧标签平滑", long_about = None)]
struct Args {
    /// 输入文件 (JSON Lines, 每行一帧), 缺省读取标准输入
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// 配置文件 (JSON), 不存在时写出默认配置
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 平滑窗口 (帧), 覆盖配置文件
    #[arg(long)]
    history_size: Option<usize>,

    /// 会话超时 (秒), 覆盖配置文件
    #[arg(long)]
    session_timeout: Option<u64>,

    /// 清理周期 (秒), 覆盖配置文件
    #[arg(long)]
    cleanup_interval: Option<u64>,

    /// 格式化输出
    #[arg(long, default_value_t = false)]
    pretty: bool,
}

/// 一行回放输入
#[derive(Debug, Deserialize)]
struct ReplayFrame {
    #[serde(default)]
    session_id: Option<String>,
    #[serde(flatten)]
    frame: FrameDetections,
}

/// 回放"检测器": 直接返回记录好的检测结果
struct ReplayDetector;

impl FaceDetector<ReplayFrame> for ReplayDetector {
    fn detect(&mut self, frame: &ReplayFrame) -> Result<FrameDetections> {
        Ok(frame.frame.clone())
    }
}

fn build_config(args: &Args) -> Result<TrackerConfig> {
    let mut config = match &args.config {
        Some(path) => TrackerConfig::load_or_create(path)
            .with_context(|| format!("加载配置失败: {}", path.display()))?,
        None => TrackerConfig::default(),
    };

    if let Some(history_size) = args.history_size {
        config.history_size = history_size;
    }
    if let Some(timeout) = args.session_timeout {
        config.session_timeout_secs = timeout;
    }
    if let Some(interval) = args.cleanup_interval {
        config.cleanup_interval_secs = interval;
    }
    config.validate()?;
    Ok(config)
}

fn parse_line(line: &str, line_no: usize) -> Result<ReplayFrame, TrackerError> {
    serde_json::from_str(line).map_err(|e| TrackerError::InvalidInput {
        line: line_no,
        message: e.to_string(),
    })
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = build_config(&args)?;
    config.log_summary();

    let registry = Arc::new(SessionRegistry::from_config(&config));
    let reaper = registry
        .spawn_reaper()
        .context("启动会话清理线程失败")?;
    let pipeline = MaskPipeline::new(Arc::clone(&registry), config.history_size);

    let reader: Box<dyn BufRead> = match &args.input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("无法打开输入文件: {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut detector = ReplayDetector;
    let mut frames = 0_u64;

    for (index, line) in reader.lines().enumerate() {
        let line = line.context("读取输入失败")?;
        if line.trim().is_empty() {
            continue;
        }

        let replay = parse_line(&line, index + 1)?;
        let response = pipeline.process(&mut detector, &replay, replay.session_id.as_deref())?;

        if args.pretty {
            serde_json::to_writer_pretty(&mut out, &response)?;
        } else {
            serde_json::to_writer(&mut out, &response)?;
        }
        writeln!(out)?;
        frames += 1;
    }
    out.flush()?;

    log::info!(
        "✅ 回放完成: {} 帧, {} 个活跃会话",
        frames,
        registry.session_count()
    );
    reaper.shutdown();
    Ok(())
}
