/// Pointer state feeding `iMouse` / `iMouseScroll`.
///
/// Positions are in framebuffer pixels with the origin at the bottom-left, the same
/// space as `gl_FragCoord`. Follows the ShaderToy convention: the current position
/// only moves while a button is held, and a press also sets the click anchor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointerState {
    current: [f32; 2],
    click: [f32; 2],
    scroll: [f32; 2],
    pressed: bool,
    height: f32,
}

impl PointerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Window resized / shown: remember the height for the y flip.
    pub fn set_viewport_height(&mut self, height: f32) {
        self.height = height;
    }

    /// Place both current and click position at the window centre.
    pub fn center(&mut self, width: f32, height: f32) {
        self.height = height;
        let c = [width / 2.0, height / 2.0];
        self.current = c;
        self.click = c;
    }

    /// Convert window coordinates (origin top-left) to GL coordinates.
    pub fn to_gl(&self, x: f64, y: f64) -> [f32; 2] {
        [x as f32, self.height - y as f32]
    }

    /// Button pressed at a GL-space position.
    pub fn press(&mut self, pos: [f32; 2]) {
        self.pressed = true;
        self.current = pos;
        self.click = pos;
    }

    pub fn release(&mut self) {
        self.pressed = false;
    }

    /// Cursor moved to a GL-space position; only tracked while dragging.
    pub fn moved(&mut self, pos: [f32; 2]) {
        if self.pressed {
            self.current = pos;
        }
    }

    pub fn scrolled(&mut self, dx: f32, dy: f32) {
        self.scroll[0] += dx;
        self.scroll[1] += dy;
    }

    /// xy = current position, zw = last click anchor.
    pub fn mouse_uniform(&self) -> [f32; 4] {
        [self.current[0], self.current[1], self.click[0], self.click[1]]
    }

    pub fn scroll(&self) -> [f32; 2] {
        self.scroll
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_sets_both_positions_and_drag_moves_current() {
        let mut p = PointerState::new();
        p.press([10.0, 20.0]);
        p.moved([30.0, 40.0]);
        assert_eq!(p.mouse_uniform(), [30.0, 40.0, 10.0, 20.0]);
    }

    #[test]
    fn hover_without_button_is_ignored() {
        let mut p = PointerState::new();
        p.center(200.0, 100.0);
        p.moved([1.0, 1.0]);
        assert_eq!(p.mouse_uniform(), [100.0, 50.0, 100.0, 50.0]);

        p.press([5.0, 5.0]);
        p.release();
        p.moved([9.0, 9.0]);
        assert_eq!(p.mouse_uniform(), [5.0, 5.0, 5.0, 5.0]);
    }

    #[test]
    fn window_coordinates_are_flipped() {
        let mut p = PointerState::new();
        p.set_viewport_height(480.0);
        assert_eq!(p.to_gl(10.0, 0.0), [10.0, 480.0]);
        assert_eq!(p.to_gl(10.0, 480.0), [10.0, 0.0]);
    }

    #[test]
    fn scroll_accumulates() {
        let mut p = PointerState::new();
        p.scrolled(0.0, 1.0);
        p.scrolled(0.5, -3.0);
        assert_eq!(p.scroll(), [0.5, -2.0]);
    }
}
