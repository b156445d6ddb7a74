//! FFmpeg-backed video decoding and MP4 encoding.
//!
//! Frames are converted to packed RGB24 on the way in and to YUV420P on the way out.

use ffmpeg_next as ffmpeg;
use image::RgbImage;
use std::path::Path;

use ffmpeg::format::Pixel;
use ffmpeg::software::scaling::{self, flag::Flags};

use super::sink::{FrameSink, VideoEncoder};
use super::source::{VideoSource, FALLBACK_FPS};
use crate::error::{PipelineError, PipelineResult, RunnerError};

pub(crate) struct FfmpegVideoSource {
    path: String,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: scaling::Context,
    native_fps: f64,
    eof: bool,
    frame_count: u64,
}

impl FfmpegVideoSource {
    pub(crate) fn open(path: &str) -> PipelineResult<Self> {
        let unavailable = |detail: String| PipelineError::source_unavailable(path, detail);

        ffmpeg::init().map_err(|e| unavailable(format!("initialize ffmpeg: {}", e)))?;
        let input = ffmpeg::format::input(&path)
            .map_err(|e| unavailable(format!("open input: {}", e)))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| unavailable("file has no video track".into()))?;
        let stream_index = input_stream.index();

        let rate = f64::from(input_stream.avg_frame_rate());
        let native_fps = if rate.is_finite() && rate > 0.0 {
            rate
        } else {
            FALLBACK_FPS
        };

        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .map_err(|e| unavailable(format!("load decoder parameters: {}", e)))?;
        let decoder = context
            .decoder()
            .video()
            .map_err(|e| unavailable(format!("open video decoder: {}", e)))?;

        let scaler = scaling::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            Flags::BILINEAR,
        )
        .map_err(|e| unavailable(format!("create scaler: {}", e)))?;

        log::info!("opened {} (ffmpeg, {:.2} fps)", path, native_fps);
        Ok(Self {
            path: path.to_string(),
            input,
            stream_index,
            decoder,
            scaler,
            native_fps,
            eof: false,
            frame_count: 0,
        })
    }

    fn decode_error(&self, what: &str, err: ffmpeg::Error) -> PipelineError {
        PipelineError::stage_failed("video decode", format!("{}: {}: {}", self.path, what, err))
    }
}

impl VideoSource for FfmpegVideoSource {
    fn native_fps(&self) -> f64 {
        self.native_fps
    }

    fn next_frame(&mut self) -> PipelineResult<Option<RgbImage>> {
        loop {
            let mut decoded = ffmpeg::frame::Video::empty();
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                let mut rgb_frame = ffmpeg::frame::Video::empty();
                self.scaler
                    .run(&decoded, &mut rgb_frame)
                    .map_err(|e| self.decode_error("scale frame to RGB", e))?;
                self.frame_count += 1;
                return frame_to_image(&rgb_frame).map(Some);
            }
            if self.eof {
                return Ok(None);
            }

            let next = self
                .input
                .packets()
                .next()
                .map(|(stream, packet)| (stream.index(), packet));
            match next {
                Some((index, packet)) => {
                    if index != self.stream_index {
                        continue;
                    }
                    self.decoder
                        .send_packet(&packet)
                        .map_err(|e| self.decode_error("send packet", e))?;
                }
                None => {
                    self.decoder
                        .send_eof()
                        .map_err(|e| self.decode_error("flush decoder", e))?;
                    self.eof = true;
                    log::debug!("{}: decoded {} frames", self.path, self.frame_count);
                }
            }
        }
    }
}

fn frame_to_image(frame: &ffmpeg::frame::Video) -> PipelineResult<RgbImage> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = width as usize * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let slice = data
            .get(start..start + row_bytes)
            .ok_or_else(|| PipelineError::stage_failed("video decode", "frame row out of bounds"))?;
        pixels.extend_from_slice(slice);
    }
    RgbImage::from_raw(width, height, pixels)
        .ok_or_else(|| PipelineError::stage_failed("video decode", "frame buffer size mismatch"))
}

// ----------------------------------------------------------------------------
// MP4 encoding
// ----------------------------------------------------------------------------

/// MPEG-4 Part 2 in an MP4 container.
pub(crate) struct Mp4Encoder;

impl VideoEncoder for Mp4Encoder {
    fn name(&self) -> &'static str {
        "ffmpeg-mp4"
    }

    fn open(
        &self,
        path: &Path,
        fps: u32,
        width: u32,
        height: u32,
    ) -> Result<Box<dyn FrameSink>, RunnerError> {
        Ok(Box::new(Mp4Sink::open(path, fps, width, height)?))
    }
}

struct Mp4Sink {
    output: ffmpeg::format::context::Output,
    encoder: ffmpeg::encoder::Video,
    scaler: scaling::Context,
    stream_index: usize,
    frame_rate: ffmpeg::Rational,
    stream_time_base: ffmpeg::Rational,
    width: u32,
    height: u32,
    pts: i64,
}

fn encode_error(what: &str) -> impl Fn(ffmpeg::Error) -> RunnerError + '_ {
    move |e| RunnerError::failed(format!("{}: {}", what, e))
}

impl Mp4Sink {
    fn open(path: &Path, fps: u32, width: u32, height: u32) -> Result<Self, RunnerError> {
        ffmpeg::init().map_err(|e| RunnerError::unavailable(format!("initialize ffmpeg: {}", e)))?;
        let codec = ffmpeg::encoder::find(ffmpeg::codec::Id::MPEG4)
            .ok_or_else(|| RunnerError::unavailable("ffmpeg build has no MPEG-4 encoder"))?;

        let mut output = ffmpeg::format::output(&path).map_err(encode_error("open output"))?;
        let global_header = output
            .format()
            .flags()
            .contains(ffmpeg::format::Flags::GLOBAL_HEADER);

        // yuv420p needs even dimensions
        let (enc_w, enc_h) = ((width & !1).max(2), (height & !1).max(2));
        let fps = fps.max(1) as i32;
        let frame_rate = ffmpeg::Rational::new(fps, 1);

        let mut stream = output.add_stream(codec).map_err(encode_error("add stream"))?;
        let stream_index = stream.index();
        let mut config = ffmpeg::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .map_err(encode_error("create encoder"))?;
        config.set_width(enc_w);
        config.set_height(enc_h);
        config.set_format(Pixel::YUV420P);
        config.set_time_base(frame_rate.invert());
        config.set_frame_rate(Some(frame_rate));
        if global_header {
            config.set_flags(ffmpeg::codec::Flags::GLOBAL_HEADER);
        }
        let encoder = config.open_as(codec).map_err(encode_error("open encoder"))?;
        stream.set_parameters(&encoder);
        stream.set_time_base(frame_rate.invert());

        output.write_header().map_err(encode_error("write header"))?;
        let stream_time_base = output
            .stream(stream_index)
            .map(|s| s.time_base())
            .unwrap_or_else(|| frame_rate.invert());

        let scaler = scaling::Context::get(
            Pixel::RGB24,
            width,
            height,
            Pixel::YUV420P,
            enc_w,
            enc_h,
            Flags::BILINEAR,
        )
        .map_err(encode_error("create scaler"))?;

        Ok(Self {
            output,
            encoder,
            scaler,
            stream_index,
            frame_rate,
            stream_time_base,
            width,
            height,
            pts: 0,
        })
    }

    fn drain(&mut self) -> Result<(), RunnerError> {
        let mut packet = ffmpeg::Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(self.frame_rate.invert(), self.stream_time_base);
            packet
                .write_interleaved(&mut self.output)
                .map_err(encode_error("write packet"))?;
        }
        Ok(())
    }
}

impl FrameSink for Mp4Sink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<(), RunnerError> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(RunnerError::failed(format!(
                "frame {}x{} does not match video {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            )));
        }

        let mut rgb = ffmpeg::frame::Video::new(Pixel::RGB24, self.width, self.height);
        let row_bytes = self.width as usize * 3;
        let stride = rgb.stride(0);
        let src = frame.as_raw();
        let dst = rgb.data_mut(0);
        for row in 0..self.height as usize {
            dst[row * stride..row * stride + row_bytes]
                .copy_from_slice(&src[row * row_bytes..(row + 1) * row_bytes]);
        }

        let mut yuv = ffmpeg::frame::Video::empty();
        self.scaler
            .run(&rgb, &mut yuv)
            .map_err(encode_error("scale frame"))?;
        yuv.set_pts(Some(self.pts));
        self.pts += 1;

        self.encoder
            .send_frame(&yuv)
            .map_err(encode_error("send frame"))?;
        self.drain()
    }

    fn finish(mut self: Box<Self>) -> Result<(), RunnerError> {
        self.encoder.send_eof().map_err(encode_error("flush encoder"))?;
        self.drain()?;
        self.output
            .write_trailer()
            .map_err(encode_error("write trailer"))?;
        Ok(())
    }
}
