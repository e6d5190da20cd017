use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use parking_lot::Mutex;

use crate::Error;
use crate::output::VideoOutput;

const SINK_DESCRIPTION: &str = "videoscale ! videoconvert ! appsink name=frame_sink drop=true max-buffers=1 caps=video/x-raw,format=NV12,pixel-aspect-ratio=1/1";
const PULL_TIMEOUT: gst::ClockTime = gst::ClockTime::from_mseconds(16);

/// A decoded NV12 frame, copied out of its sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nv12Frame {
    pub width: u32,
    pub height: u32,
    pub y_plane: Vec<u8>,
    pub y_stride: u32,
    pub uv_plane: Vec<u8>,
    pub uv_stride: u32,
}

impl Nv12Frame {
    fn from_sample(sample: &gst::Sample) -> Option<Self> {
        let caps = sample.caps()?;
        let info = gst_video::VideoInfo::from_caps(caps).ok()?;
        let buffer = sample.buffer()?;
        let frame = gst_video::VideoFrameRef::from_buffer_ref_readable(buffer, &info).ok()?;
        let strides = frame.plane_stride();
        Some(Self {
            width: info.width(),
            height: info.height(),
            y_plane: frame.plane_data(0).ok()?.to_vec(),
            y_stride: u32::try_from(strides[0]).ok()?,
            uv_plane: frame.plane_data(1).ok()?.to_vec(),
            uv_stride: u32::try_from(strides[1]).ok()?,
        })
    }
}

#[derive(Debug, Default)]
struct Slots {
    frame: Mutex<Option<gst::Sample>>,
    frame_ready: AtomicBool,
}

/// [`VideoOutput`] that pulls frames from an `appsink` on a worker thread.
#[derive(Debug)]
pub struct FrameOutput {
    bin: gst::Element,
    own_sink: gst_app::AppSink,
    /// Sink the worker pulls from; an adopted one replaces `own_sink`.
    active_sink: Arc<Mutex<gst_app::AppSink>>,
    slots: Arc<Slots>,
    alive: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl FrameOutput {
    pub fn new() -> Result<Self, Error> {
        gst::init()?;

        let bin = gst::parse::bin_from_description(SINK_DESCRIPTION, true)?;
        let own_sink = bin
            .by_name("frame_sink")
            .ok_or(Error::Cast)?
            .downcast::<gst_app::AppSink>()
            .map_err(|_| Error::Cast)?;

        let active_sink = Arc::new(Mutex::new(own_sink.clone()));
        let slots = Arc::new(Slots::default());
        let alive = Arc::new(AtomicBool::new(true));

        let sink_ref = Arc::clone(&active_sink);
        let slots_ref = Arc::clone(&slots);
        let alive_ref = Arc::clone(&alive);
        let worker = std::thread::Builder::new()
            .name("frame-output".into())
            .spawn(move || {
                while alive_ref.load(Ordering::Acquire) {
                    let sink = sink_ref.lock().clone();
                    let (_, state, _) = sink.state(gst::ClockTime::ZERO);
                    let sample = match state {
                        gst::State::Playing => sink.try_pull_sample(PULL_TIMEOUT),
                        gst::State::Paused => sink.try_pull_preroll(PULL_TIMEOUT),
                        _ => {
                            std::thread::sleep(Duration::from(PULL_TIMEOUT));
                            continue;
                        }
                    };
                    let Some(sample) = sample else {
                        continue;
                    };
                    *slots_ref.frame.lock() = Some(sample);
                    slots_ref.frame_ready.store(true, Ordering::SeqCst);
                }
            })
            .map_err(|err| {
                log::error!("failed to spawn frame worker: {err}");
                Error::Link("frame worker")
            })?;

        Ok(Self {
            bin: bin.upcast(),
            own_sink,
            active_sink,
            slots,
            alive,
            worker: Some(worker),
        })
    }

    /// The latest frame, if one arrived since the renderer was last stopped.
    pub fn current_frame(&self) -> Option<Nv12Frame> {
        let sample = self.slots.frame.lock().clone()?;
        Nv12Frame::from_sample(&sample)
    }

    /// Whether a new frame arrived since the last call.
    pub fn take_frame_ready(&self) -> bool {
        self.slots.frame_ready.swap(false, Ordering::SeqCst)
    }
}

impl VideoOutput<gst::Element> for FrameOutput {
    fn video_sink(&self) -> Option<gst::Element> {
        *self.active_sink.lock() = self.own_sink.clone();
        Some(self.bin.clone())
    }

    fn is_ready(&self) -> bool {
        self.worker.is_some()
    }

    fn stop_renderer(&self) {
        *self.slots.frame.lock() = None;
        self.slots.frame_ready.store(true, Ordering::SeqCst);
    }

    fn adopt_sink(&self, sink: &gst::Element) -> bool {
        match sink.clone().downcast::<gst_app::AppSink>() {
            Ok(appsink) => {
                log::debug!("rendering from {}", appsink.name());
                *self.active_sink.lock() = appsink;
                true
            }
            Err(_) => false,
        }
    }
}

impl Drop for FrameOutput {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            if let Err(err) = worker.join() {
                match err.downcast_ref::<String>() {
                    Some(e) => log::error!("frame worker panicked: {e}"),
                    None => log::error!("frame worker panicked with unknown reason"),
                }
            }
        }
    }
}
