use std::sync::Arc;

use gpui::{
    Element, ElementId, GlobalElementId, InspectorElementId, IntoElement, LayoutId, Window,
};
use yuv::{YuvBiPlanarImage, YuvConversionMode, YuvRange, YuvStandardMatrix, yuv_nv12_to_rgba};

use crate::frame_output::{FrameOutput, Nv12Frame};

/// Paints the latest frame of a [`FrameOutput`].
pub struct VideoElement {
    output: Arc<FrameOutput>,
    active: bool,
    display_width: Option<gpui::Pixels>,
    display_height: Option<gpui::Pixels>,
    element_id: Option<ElementId>,
}

impl VideoElement {
    pub fn new(output: Arc<FrameOutput>) -> Self {
        Self {
            output,
            active: false,
            display_width: None,
            display_height: None,
            element_id: None,
        }
    }

    pub fn id(mut self, id: impl Into<ElementId>) -> Self {
        self.element_id = Some(id.into());
        self
    }

    pub fn size(mut self, width: gpui::Pixels, height: gpui::Pixels) -> Self {
        self.display_width = Some(width);
        self.display_height = Some(height);
        self
    }

    /// Keep requesting frames while the session has work in flight.
    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    fn display_size(&self, frame: Option<&Nv12Frame>) -> (gpui::Pixels, gpui::Pixels) {
        match (self.display_width, self.display_height, frame) {
            (Some(w), Some(h), _) => (w, h),
            (_, _, Some(frame)) => (gpui::px(frame.width as f32), gpui::px(frame.height as f32)),
            _ => (gpui::px(0.), gpui::px(0.)),
        }
    }

    fn to_rgba(frame: &Nv12Frame) -> Option<Vec<u8>> {
        let image = YuvBiPlanarImage {
            y_plane: &frame.y_plane,
            y_stride: frame.y_stride,
            uv_plane: &frame.uv_plane,
            uv_stride: frame.uv_stride,
            width: frame.width,
            height: frame.height,
        };
        let rgba_stride = frame.width * 4;
        let mut rgba = vec![0u8; rgba_stride as usize * frame.height as usize];

        // videoconvert produces limited range; full range is the fallback.
        for range in [YuvRange::Limited, YuvRange::Full] {
            if yuv_nv12_to_rgba(
                &image,
                &mut rgba,
                rgba_stride,
                range,
                YuvStandardMatrix::Bt709,
                YuvConversionMode::Balanced,
            )
            .is_ok()
            {
                return Some(rgba);
            }
        }
        None
    }
}

impl Element for VideoElement {
    type RequestLayoutState = Option<Nv12Frame>;
    type PrepaintState = ();

    fn id(&self) -> Option<ElementId> {
        self.element_id.clone()
    }

    fn source_location(&self) -> Option<&'static core::panic::Location<'static>> {
        None
    }

    fn request_layout(
        &mut self,
        _global_id: Option<&GlobalElementId>,
        _inspector_id: Option<&InspectorElementId>,
        window: &mut Window,
        cx: &mut gpui::App,
    ) -> (LayoutId, Self::RequestLayoutState) {
        let frame = self.output.current_frame();
        let (width, height) = self.display_size(frame.as_ref());

        let style = gpui::Style {
            size: gpui::Size {
                width: gpui::Length::Definite(gpui::DefiniteLength::Absolute(
                    gpui::AbsoluteLength::Pixels(width),
                )),
                height: gpui::Length::Definite(gpui::DefiniteLength::Absolute(
                    gpui::AbsoluteLength::Pixels(height),
                )),
            },
            ..Default::default()
        };

        let layout_id = window.request_layout(style, [], cx);
        (layout_id, frame)
    }

    fn prepaint(
        &mut self,
        _global_id: Option<&GlobalElementId>,
        _inspector_id: Option<&InspectorElementId>,
        _bounds: gpui::Bounds<gpui::Pixels>,
        _request_layout_state: &mut Self::RequestLayoutState,
        window: &mut Window,
        _cx: &mut gpui::App,
    ) -> Self::PrepaintState {
        if self.active || self.output.take_frame_ready() {
            window.request_animation_frame();
        }
    }

    fn paint(
        &mut self,
        _global_id: Option<&GlobalElementId>,
        _inspector_id: Option<&InspectorElementId>,
        bounds: gpui::Bounds<gpui::Pixels>,
        frame: &mut Self::RequestLayoutState,
        _prepaint_state: &mut Self::PrepaintState,
        window: &mut Window,
        _cx: &mut gpui::App,
    ) {
        use image::{ImageBuffer, Rgba};
        use smallvec::SmallVec;

        let Some(frame) = frame.take() else {
            return;
        };
        let Some(rgba) = Self::to_rgba(&frame) else {
            log::warn!("failed to convert {}x{} frame", frame.width, frame.height);
            return;
        };
        let Some(buffer) = ImageBuffer::<Rgba<u8>, _>::from_raw(frame.width, frame.height, rgba)
        else {
            return;
        };

        let frames: SmallVec<[image::Frame; 1]> =
            SmallVec::from_elem(image::Frame::new(buffer), 1);
        let render_image = Arc::new(gpui::RenderImage::new(frames));
        if let Err(err) = window.paint_image(bounds, gpui::Corners::default(), render_image, 0, false)
        {
            log::warn!("failed to paint video frame: {err}");
        }
    }
}

impl IntoElement for VideoElement {
    type Element = Self;

    fn into_element(self) -> Self::Element {
        self
    }
}

pub fn video(output: Arc<FrameOutput>) -> VideoElement {
    VideoElement::new(output)
}
