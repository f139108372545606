/// Per-frame context supplied by the host (pull-based runtime).
///
/// The engine never owns a clock or an input device; the host fills one of
/// these per frame from its own timing/camera/input collaborators and the
/// reflection layer feeds the values into builtin uniforms.
#[derive(Clone, Copy, Debug)]
pub struct FrameInputs {
    /// Output size in pixels (the implicit "screen" target).
    pub width: i32,
    pub height: i32,

    /// Playback time in seconds. Frozen while `paused`.
    pub time: f32,
    /// Frame index on the playback timeline.
    pub frame: u64,
    pub paused: bool,

    /// Camera view matrix, column-major.
    pub view: [f32; 16],

    /// xy = cursor position in pixels, zw = position of the last click.
    pub mouse: [f32; 4],
    /// Primary button currently held.
    pub click: bool,
}

pub const IDENTITY_VIEW: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

impl Default for FrameInputs {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
            time: 0.0,
            frame: 0,
            paused: false,
            view: IDENTITY_VIEW,
            mouse: [0.0; 4],
            click: false,
        }
    }
}

impl FrameInputs {
    /// Size clamped to at least 1x1. Viewport and allocation math require a
    /// non-zero extent even if the host reported a degenerate size.
    pub fn clamped_size(&self) -> (i32, i32) {
        (self.width.max(1), self.height.max(1))
    }
}
