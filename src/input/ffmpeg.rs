/// FFmpeg视频源 (视频文件 / RTSP流 / 摄像头)
/// FFmpeg-backed frame source, decoding on its own thread
///
/// 解码线程通过 `DecodeFilter` 把每帧 YUV420P 转成 RGB 后送入容量有限的内部通道,
/// `read()` 从通道阻塞取帧。通道满时解码线程阻塞, 不丢帧。
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel::{bounded, Receiver, Sender};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::{AVMediaType, FfmpegContext, Frame as AvFrame, Input};
use log::{debug, info, warn};

use super::frame::Frame;
use super::source::FrameSource;
use crate::error::{Error, Result};

/// 解码线程与读取端之间的缓冲帧数
const DECODE_BUFFER: usize = 4;

/// 解码线程异常结束时留下的错误, 读取端据此区分流结束和读帧失败
type DecodeError = Arc<Mutex<Option<String>>>;

/// FFmpeg解码过滤器: 视频流 → RGB帧
struct DecodeFilter {
    tx: Sender<Frame>,
    frame_id: u64,
    dropped_frames: u64, // 损坏帧计数
    count: usize,
    last: Instant,
}

impl FrameFilter for DecodeFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> std::result::Result<(), String> {
        info!("✅ 解码线程启动");
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: AvFrame,
        _ctx: &FrameFilterContext,
    ) -> std::result::Result<Option<AvFrame>, String> {
        unsafe {
            if frame.as_ptr().is_null() || frame.is_empty() || frame.is_corrupt() {
                self.dropped_frames += 1;
                return Ok(None);
            }

            let w = (*frame.as_ptr()).width as u32;
            let h = (*frame.as_ptr()).height as u32;
            if w == 0 || h == 0 {
                self.dropped_frames += 1;
                return Ok(None);
            }

            let y_plane = (*frame.as_ptr()).data[0];
            let u_plane = (*frame.as_ptr()).data[1];
            let v_plane = (*frame.as_ptr()).data[2];
            let y_stride = (*frame.as_ptr()).linesize[0] as usize;
            let uv_stride = (*frame.as_ptr()).linesize[1] as usize;

            if y_plane.is_null() || u_plane.is_null() || v_plane.is_null() {
                self.dropped_frames += 1;
                return Ok(None);
            }
            if y_stride < w as usize || uv_stride < (w as usize / 2) {
                self.dropped_frames += 1;
                return Ok(None);
            }

            let mut rgb = vec![0u8; (w * h * 3) as usize];
            yuv420p_to_rgb(
                y_plane,
                u_plane,
                v_plane,
                y_stride,
                uv_stride,
                &mut rgb,
                w as usize,
                h as usize,
            );

            let Some(decoded) = Frame::from_rgb(w, h, rgb, self.frame_id) else {
                self.dropped_frames += 1;
                return Ok(None);
            };
            self.frame_id += 1;
            self.count += 1;

            if self.last.elapsed().as_secs_f64() >= 1.0 {
                let fps = self.count as f64 / self.last.elapsed().as_secs_f64();
                debug!(
                    "📺 解码统计: {:.1}fps | 总帧{} | 丢弃{}",
                    fps, self.frame_id, self.dropped_frames
                );
                self.last = Instant::now();
                self.count = 0;
            }

            // 读取端已释放 → 停止解码
            if self.tx.send(decoded).is_err() {
                return Err("frame source closed".to_string());
            }

            Ok(Some(frame))
        }
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        info!("✅ 解码线程退出");
    }
}

/// YUV420P → RGB24
#[inline]
#[allow(clippy::too_many_arguments)]
unsafe fn yuv420p_to_rgb(
    y_plane: *const u8,
    u_plane: *const u8,
    v_plane: *const u8,
    y_stride: usize,
    uv_stride: usize,
    buffer: &mut [u8],
    width: usize,
    height: usize,
) {
    let mut out_idx = 0;
    for y in 0..height {
        let y_row = y * y_stride;
        let uv_row = (y >> 1) * uv_stride;

        for x in 0..width {
            let y_val = *y_plane.add(y_row + x) as i32;
            let u_val = *u_plane.add(uv_row + (x >> 1)) as i32 - 128;
            let v_val = *v_plane.add(uv_row + (x >> 1)) as i32 - 128;

            buffer[out_idx] = (y_val + ((v_val * 179) >> 7)).clamp(0, 255) as u8;
            buffer[out_idx + 1] =
                (y_val - ((u_val * 44) >> 7) - ((v_val * 91) >> 7)).clamp(0, 255) as u8;
            buffer[out_idx + 2] = (y_val + ((u_val * 227) >> 7)).clamp(0, 255) as u8;
            out_idx += 3;
        }
    }
}

pub struct FfmpegSource {
    label: String,
    rx: Option<Receiver<Frame>>,
    decode_error: DecodeError,
    decode_thread: Option<JoinHandle<()>>,
}

impl FfmpegSource {
    /// 打开视频源; 构建或启动FFmpeg失败时返回 `StreamOpen`
    pub fn open(url: &str) -> Result<Self> {
        let label = url.to_string();
        let (tx, rx) = bounded::<Frame>(DECODE_BUFFER);
        let (ready_tx, ready_rx) = bounded::<std::result::Result<(), String>>(1);

        let decode_error: DecodeError = Arc::new(Mutex::new(None));
        let thread_error = Arc::clone(&decode_error);
        let input_url = url.to_string();
        let decode_thread = std::thread::Builder::new()
            .name("ffmpeg-decode".to_string())
            .spawn(move || {
                let keep_open = tx.clone();
                let filter = DecodeFilter {
                    tx,
                    frame_id: 0,
                    dropped_frames: 0,
                    count: 0,
                    last: Instant::now(),
                };

                let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
                let pipe = pipe.filter("decode", Box::new(filter));
                let out = create_null_output().add_frame_pipeline(pipe);

                let mut input = Input::new(input_url.as_str());
                if input_url.starts_with("rtsp://") {
                    // RTSP传输优化
                    input = input.set_input_opts(
                        [("rtsp_transport", "tcp"), ("rtsp_flags", "prefer_tcp")].into(),
                    );
                }

                let started = FfmpegContext::builder()
                    .input(input)
                    .filter_desc("format=yuv420p")
                    .output(out)
                    .build()
                    .map_err(|e| format!("构建失败: {}", e))
                    .and_then(|ctx| ctx.start().map_err(|e| format!("启动失败: {}", e)));

                match started {
                    Ok(sch) => {
                        let _ = ready_tx.send(Ok(()));
                        if let Err(e) = sch.wait() {
                            warn!("⚠️  解码异常结束: {}", e);
                            let mut slot =
                                thread_error.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                            *slot = Some(e.to_string());
                        }
                        // 错误写入后才断开通道
                        drop(keep_open);
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                }
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!("✅ 视频源连接成功: {}", label);
                Ok(Self {
                    label,
                    rx: Some(rx),
                    decode_error,
                    decode_thread: Some(decode_thread),
                })
            }
            Ok(Err(reason)) => Err(Error::StreamOpen {
                source_label: label,
                reason,
            }),
            Err(_) => Err(Error::StreamOpen {
                source_label: label,
                reason: "解码线程意外退出".to_string(),
            }),
        }
    }
}

impl FrameSource for FfmpegSource {
    fn label(&self) -> &str {
        &self.label
    }

    fn read(&mut self) -> Result<Option<Frame>> {
        let Some(rx) = self.rx.as_ref() else {
            return Ok(None);
        };
        if let Ok(frame) = rx.recv() {
            return Ok(Some(frame));
        }
        // 发送端断开 = 解码线程结束: 有错误记录为读帧失败, 否则为流结束
        let slot = self.decode_error.lock().unwrap_or_else(|e| e.into_inner());
        match slot.as_ref() {
            Some(reason) => Err(Error::StreamRead(format!("{}: {}", self.label, reason))),
            None => Ok(None),
        }
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        // 先断开通道让解码过滤器报错退出, 再回收线程
        self.rx.take();
        if let Some(handle) = self.decode_thread.take() {
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                // 阻塞在网络读取上的解码线程会在下一帧送达时自行退出
                debug!("解码线程仍在运行, 分离等待其退出");
            }
        }
        info!("🔌 视频源已释放: {}", self.label);
    }
}
