//! The demo's UI layer: a taskbar along the top edge plus a textured tile.

use quadbatch_engine::coords::Viewport;
use quadbatch_engine::paint::Color;
use quadbatch_engine::render::batch::Quad;

const TASKBAR_HEIGHT: f32 = 30.0;
const BUTTON_WIDTH: f32 = 50.0;
const BUTTON_HEIGHT: f32 = 20.0;
const BUTTON_INSET: f32 = 5.0;
const TILE_SIZE: f32 = 128.0;

#[derive(Debug, Default)]
pub struct TaskbarLayer;

impl TaskbarLayer {
    /// Named quads for `viewport`, in draw order.
    pub fn panels(&self, viewport: Viewport, texture_slot: u32) -> Vec<(&'static str, Quad)> {
        let top = viewport.height;
        let right = viewport.width;
        let button_y = top - TASKBAR_HEIGHT + BUTTON_INSET;

        let button = |i: usize, color: Color| {
            let x = BUTTON_INSET + i as f32 * (BUTTON_WIDTH + BUTTON_INSET);
            Quad::colored(x, button_y, 0.0, BUTTON_WIDTH, BUTTON_HEIGHT, color)
        };

        vec![
            (
                "TaskbarPanel",
                Quad::colored(0.0, top - TASKBAR_HEIGHT, 0.0, right, TASKBAR_HEIGHT, Color::BLACK),
            ),
            ("FileButton", button(0, Color::RED)),
            ("EditButton", button(1, Color::RED)),
            ("ViewButton", button(2, Color::GREEN)),
            (
                "CheckerTile",
                Quad::textured(
                    (right - TILE_SIZE) * 0.5,
                    (top - TASKBAR_HEIGHT - TILE_SIZE) * 0.5,
                    0.0,
                    TILE_SIZE,
                    TILE_SIZE,
                    texture_slot,
                ),
            ),
        ]
    }
}
