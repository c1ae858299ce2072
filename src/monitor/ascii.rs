//! Character-grid drawing surface for terminals

use super::DrawingSurface;

/// Rasterizes stroked paths into a grid of characters
pub struct AsciiSurface {
    width: u32,
    height: u32,
    cells: Vec<char>,
    path: Vec<(f64, f64)>,
    segments: Vec<Vec<(f64, f64)>>,
    ink: char,
}

impl AsciiSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![' '; (width * height) as usize],
            path: Vec::new(),
            segments: Vec::new(),
            ink: '*',
        }
    }

    pub fn with_ink(mut self, ink: char) -> Self {
        self.ink = ink;
        self
    }

    /// Current contents, one line per row
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(((self.width + 1) * self.height) as usize);
        for row in self.cells.chunks(self.width.max(1) as usize) {
            out.extend(row.iter());
            out.push('\n');
        }
        out
    }

    fn plot(&mut self, x: i64, y: i64) {
        if x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height {
            let idx = y as usize * self.width as usize + x as usize;
            self.cells[idx] = self.ink;
        }
    }

    /// Bresenham line between two points
    fn draw_line(&mut self, from: (f64, f64), to: (f64, f64)) {
        let (mut x0, mut y0) = (from.0.floor() as i64, from.1.floor() as i64);
        let (x1, y1) = (to.0.floor() as i64, to.1.floor() as i64);
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            self.plot(x0, y0);
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }
}

impl DrawingSurface for AsciiSurface {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn clear(&mut self) {
        self.cells.fill(' ');
    }

    fn begin_path(&mut self) {
        self.path.clear();
        self.segments.clear();
    }

    fn move_to(&mut self, x: f64, y: f64) {
        if self.path.len() > 1 {
            self.segments.push(std::mem::take(&mut self.path));
        }
        self.path.clear();
        self.path.push((x, y));
    }

    fn line_to(&mut self, x: f64, y: f64) {
        self.path.push((x, y));
    }

    fn stroke(&mut self) {
        let mut segments = std::mem::take(&mut self.segments);
        segments.push(self.path.clone());
        for segment in &segments {
            if segment.len() == 1 {
                self.plot(segment[0].0.floor() as i64, segment[0].1.floor() as i64);
            }
            for pair in segment.windows(2) {
                self.draw_line(pair[0], pair[1]);
            }
        }
        self.segments = segments;
        self.segments.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_horizontal_line() {
        let mut surface = AsciiSurface::new(8, 3);
        surface.begin_path();
        surface.move_to(0.0, 1.0);
        surface.line_to(7.0, 1.0);
        surface.stroke();
        assert_eq!(surface.render(), "        \n********\n        \n");
    }

    #[test]
    fn test_clear_and_clipping() {
        let mut surface = AsciiSurface::new(4, 2).with_ink('#');
        surface.begin_path();
        surface.move_to(-5.0, 0.0);
        surface.line_to(10.0, 0.0);
        surface.stroke();
        assert_eq!(surface.render(), "####\n    \n");

        surface.clear();
        assert_eq!(surface.render(), "    \n    \n");
    }

    #[test]
    fn test_diagonal_is_connected() {
        let mut surface = AsciiSurface::new(3, 3);
        surface.begin_path();
        surface.move_to(0.0, 0.0);
        surface.line_to(2.0, 2.0);
        surface.stroke();
        assert_eq!(surface.render(), "*  \n * \n  *\n");
    }
}
