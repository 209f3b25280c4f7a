use std::collections::BTreeMap;

use log::warn;
use serde::Deserialize;
use serde_json::Value;

pub const LINE_WIDTH: f64 = 5.;

/// `[x, y]`. Anything after the first two numbers is ignored.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(try_from = "Vec<f64>")]
pub struct Point(pub f64, pub f64);

impl TryFrom<Vec<f64>> for Point {
    type Error = String;

    fn try_from(coords: Vec<f64>) -> Result<Self, Self::Error> {
        match coords[..] {
            [x, y, ..] => Ok(Self(x, y)),
            _ => Err(format!("point needs two numbers, got {}", coords.len())),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Trail {
    pub color: String,
    #[serde(default)]
    pub points: Vec<Point>,
}

/// Every player's trail, keyed by player id.
///
/// A player entry that doesn't parse is left out; the others still draw.
#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(from = "RawDrawPayload")]
pub struct DrawPayload {
    pub players: BTreeMap<String, Trail>,
}

#[derive(Deserialize)]
struct RawDrawPayload {
    players: BTreeMap<String, Value>,
}

impl From<RawDrawPayload> for DrawPayload {
    fn from(raw: RawDrawPayload) -> Self {
        let players = raw
            .players
            .into_iter()
            .filter_map(|(id, trail)| match serde_json::from_value(trail) {
                Ok(trail) => Some((id, trail)),
                Err(e) => {
                    warn!("skipping player {id}: {e}");
                    None
                }
            })
            .collect();
        Self { players }
    }
}

/// The subset of a 2D canvas context the trail renderer uses.
pub trait Surface {
    fn width(&self) -> f64;
    fn height(&self) -> f64;
    fn clear_rect(&self, x: f64, y: f64, width: f64, height: f64);
    fn set_line_width(&self, width: f64);
    fn set_stroke_style(&self, color: &str);
    fn begin_path(&self);
    fn move_to(&self, x: f64, y: f64);
    fn line_to(&self, x: f64, y: f64);
    fn stroke(&self);
}

/// Redraws the whole arena and returns how many trails were stroked.
///
/// Players without points are skipped.
pub fn draw_trails(surface: &impl Surface, payload: &DrawPayload) -> usize {
    surface.clear_rect(0., 0., surface.width(), surface.height());
    surface.set_line_width(LINE_WIDTH);

    let mut stroked = 0;
    for (id, trail) in &payload.players {
        let Some((start, rest)) = trail.points.split_first() else {
            warn!("player {id} has no points, not drawing");
            continue;
        };
        surface.set_stroke_style(&trail.color);
        surface.begin_path();
        surface.move_to(start.0, start.1);
        for point in rest {
            surface.line_to(point.0, point.1);
        }
        surface.stroke();
        stroked += 1;
    }
    stroked
}
