use arcade_core::{
    error::HookError,
    games::light_cycles::Surface,
    progress::{Paint, ProgressConfig},
};
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, Document, HtmlCanvasElement};

use crate::{dom, error::LiveError};

fn context_2d(canvas: &HtmlCanvasElement) -> Option<CanvasRenderingContext2d> {
    canvas
        .get_context("2d")
        .ok()
        .flatten()
        .and_then(|ctx| ctx.dyn_into::<CanvasRenderingContext2d>().ok())
}

/// The light-cycles arena.
pub struct CanvasSurface {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
}

impl CanvasSurface {
    pub fn new(canvas: HtmlCanvasElement) -> Result<Self, HookError> {
        let ctx = context_2d(&canvas).ok_or(HookError::MissingContext)?;
        Ok(Self { canvas, ctx })
    }
}

impl Surface for CanvasSurface {
    fn width(&self) -> f64 {
        f64::from(self.canvas.width())
    }

    fn height(&self) -> f64 {
        f64::from(self.canvas.height())
    }

    fn clear_rect(&self, x: f64, y: f64, width: f64, height: f64) {
        self.ctx.clear_rect(x, y, width, height);
    }

    fn set_line_width(&self, width: f64) {
        self.ctx.set_line_width(width);
    }

    fn set_stroke_style(&self, color: &str) {
        self.ctx.set_stroke_style_str(color);
    }

    fn begin_path(&self) {
        self.ctx.begin_path();
    }

    fn move_to(&self, x: f64, y: f64) {
        self.ctx.move_to(x, y);
    }

    fn line_to(&self, x: f64, y: f64) {
        self.ctx.line_to(x, y);
    }

    fn stroke(&self) {
        self.ctx.stroke();
    }
}

/// Fixed canvas across the top of the page that shows loading progress.
pub struct ProgressCanvas {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
}

impl ProgressCanvas {
    pub fn create(document: &Document) -> Result<Self, LiveError> {
        let canvas = document
            .create_element("canvas")?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| LiveError::Dom("created element is not a canvas".to_owned()))?;
        let style = canvas.style();
        for (property, value) in [
            ("position", "fixed"),
            ("top", "0"),
            ("left", "0"),
            ("right", "0"),
            ("margin", "0"),
            ("padding", "0"),
            ("z-index", "100001"),
            ("display", "none"),
        ] {
            style.set_property(property, value)?;
        }
        document
            .body()
            .ok_or_else(|| LiveError::Dom("no <body>".to_owned()))?
            .append_child(&canvas)?;
        let ctx = context_2d(&canvas).ok_or(HookError::MissingContext)?;
        Ok(Self { canvas, ctx })
    }

    pub fn paint(&self, paint: Paint, config: &ProgressConfig) -> Result<(), LiveError> {
        let width = dom::window()?.inner_width()?.as_f64().unwrap_or_default();
        let mid = config.bar_thickness / 2.;
        self.canvas.set_width(width as u32);
        self.canvas.set_height((config.bar_thickness * 5.) as u32);

        let ctx = &self.ctx;
        ctx.set_shadow_blur(config.shadow_blur);
        ctx.set_shadow_color(&config.shadow_color);
        let gradient = ctx.create_linear_gradient(0., 0., width, 0.);
        for (offset, color) in &config.bar_colors {
            gradient.add_color_stop(*offset as f32, color)?;
        }
        ctx.set_line_width(config.bar_thickness);
        ctx.begin_path();
        ctx.move_to(0., mid);
        ctx.line_to((paint.progress * width).ceil(), mid);
        ctx.set_stroke_style_canvas_gradient(&gradient);
        ctx.stroke();

        let style = self.canvas.style();
        style.set_property("opacity", &paint.opacity.to_string())?;
        style.set_property("display", "block")?;
        Ok(())
    }

    pub fn hide(&self) -> Result<(), LiveError> {
        self.canvas.style().set_property("display", "none")?;
        Ok(())
    }
}
