use glam::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::new(0, 0, 0, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn lerp(self, other: Rgba, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Self {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
            a: mix(self.a, other.a),
        }
    }

    pub fn with_alpha(self, alpha: f32) -> Self {
        Self {
            a: (alpha.clamp(0.0, 1.0) * 255.0).round() as u8,
            ..self
        }
    }

    /// `hue` in degrees, `saturation` and `lightness` in [0, 1].
    pub fn from_hsl(hue: f32, saturation: f32, lightness: f32) -> Self {
        let h = hue.rem_euclid(360.0) / 60.0;
        let s = saturation.clamp(0.0, 1.0);
        let l = lightness.clamp(0.0, 1.0);
        let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
        let x = c * (1.0 - (h % 2.0 - 1.0).abs());
        let (r, g, b) = match h as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        let m = l - c / 2.0;
        let byte = |v: f32| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
        Self::new(byte(r), byte(g), byte(b), 255)
    }
}

impl From<[u8; 4]> for Rgba {
    fn from([r, g, b, a]: [u8; 4]) -> Self {
        Self::new(r, g, b, a)
    }
}

/// RGBA8 drawing target.
///
/// Callers draw in logical units; the surface owns a physical buffer of
/// `logical * scale_factor` pixels and maps every primitive onto it, so
/// output stays sharp on high-density displays.
pub struct Surface {
    logical: Vec2,
    scale: f32,
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Surface {
    pub fn new(width: f32, height: f32, scale_factor: f32) -> Self {
        let mut surface = Self {
            logical: Vec2::ZERO,
            scale: 1.0,
            width: 0,
            height: 0,
            pixels: Vec::new(),
        };
        surface.resize(width, height, scale_factor);
        surface
    }

    /// Rescale the physical buffer to `logical * scale_factor`. Returns
    /// whether anything changed. Previous contents are discarded.
    pub fn resize(&mut self, width: f32, height: f32, scale_factor: f32) -> bool {
        let sanitize = |v: f32| if v.is_finite() && v > 0.0 { v } else { 0.0 };
        let logical = Vec2::new(sanitize(width), sanitize(height));
        let scale = if scale_factor.is_finite() && scale_factor > 0.0 { scale_factor } else { 1.0 };
        let physical_width = (logical.x * scale).round() as u32;
        let physical_height = (logical.y * scale).round() as u32;

        if logical == self.logical
            && scale == self.scale
            && physical_width == self.width
            && physical_height == self.height
        {
            return false;
        }

        self.logical = logical;
        self.scale = scale;
        self.width = physical_width;
        self.height = physical_height;
        self.pixels = vec![0; physical_width as usize * physical_height as usize * 4];
        true
    }

    pub fn width(&self) -> f32 {
        self.logical.x
    }

    pub fn height(&self) -> f32 {
        self.logical.y
    }

    pub fn scale_factor(&self) -> f32 {
        self.scale
    }

    pub fn physical_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Physical pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some(Rgba::new(self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]))
    }

    pub fn clear(&mut self, color: Rgba) {
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&[color.r, color.g, color.b, color.a]);
        }
    }

    fn physical_span(&self, start: f32, length: f32, limit: u32) -> (u32, u32) {
        let a = (start * self.scale).round().clamp(0.0, limit as f32) as u32;
        let b = ((start + length) * self.scale).round().clamp(0.0, limit as f32) as u32;
        (a.min(b), a.max(b))
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgba) {
        let (x0, x1) = self.physical_span(x, w, self.width);
        let (y0, y1) = self.physical_span(y, h, self.height);
        for py in y0..y1 {
            for px in x0..x1 {
                self.blend(px, py, color, 1.0);
            }
        }
    }

    /// Fill a rectangle with a gradient fixed to the whole surface height:
    /// `bottom` at the bottom edge, `top` at the top edge. Shapes of
    /// different heights therefore share one color scale.
    pub fn fill_rect_gradient(&mut self, x: f32, y: f32, w: f32, h: f32, bottom: Rgba, top: Rgba) {
        if self.height == 0 {
            return;
        }
        let (x0, x1) = self.physical_span(x, w, self.width);
        let (y0, y1) = self.physical_span(y, h, self.height);
        let full = self.height as f32;
        for py in y0..y1 {
            let t = 1.0 - (py as f32 + 0.5) / full;
            let color = bottom.lerp(top, t);
            for px in x0..x1 {
                self.blend(px, py, color, 1.0);
            }
        }
    }

    /// Anti-aliased segment, `width` in logical units.
    pub fn stroke_line(&mut self, from: Vec2, to: Vec2, width: f32, color: Rgba) {
        let a = from * self.scale;
        let b = to * self.scale;
        let half = (width * self.scale / 2.0).max(0.5);
        let pad = half + 1.0;

        let min = a.min(b) - Vec2::splat(pad);
        let max = a.max(b) + Vec2::splat(pad);
        let Some((x0, y0, x1, y1)) = self.clip(min, max) else {
            return;
        };

        let ab = b - a;
        let len_sq = ab.length_squared();
        for py in y0..y1 {
            for px in x0..x1 {
                let p = Vec2::new(px as f32 + 0.5, py as f32 + 0.5);
                let t = if len_sq > 0.0 { ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0) } else { 0.0 };
                let distance = p.distance(a + ab * t);
                let coverage = (half + 0.5 - distance).clamp(0.0, 1.0);
                if coverage > 0.0 {
                    self.blend(px, py, color, coverage);
                }
            }
        }
    }

    pub fn stroke_polyline<I>(&mut self, points: I, width: f32, color: Rgba)
    where
        I: IntoIterator<Item = Vec2>,
    {
        let mut points = points.into_iter();
        let Some(mut previous) = points.next() else {
            return;
        };
        for point in points {
            self.stroke_line(previous, point, width, color);
            previous = point;
        }
    }

    pub fn fill_circle(&mut self, center: Vec2, radius: f32, color: Rgba) {
        let c = center * self.scale;
        let r = radius * self.scale;
        if r <= 0.0 {
            return;
        }
        let Some((x0, y0, x1, y1)) = self.clip(c - Vec2::splat(r + 1.0), c + Vec2::splat(r + 1.0)) else {
            return;
        };
        for py in y0..y1 {
            for px in x0..x1 {
                let p = Vec2::new(px as f32 + 0.5, py as f32 + 0.5);
                let coverage = (r + 0.5 - p.distance(c)).clamp(0.0, 1.0);
                if coverage > 0.0 {
                    self.blend(px, py, color, coverage);
                }
            }
        }
    }

    /// Physical bounding box clipped to the buffer.
    fn clip(&self, min: Vec2, max: Vec2) -> Option<(u32, u32, u32, u32)> {
        let x0 = min.x.floor().max(0.0) as u32;
        let y0 = min.y.floor().max(0.0) as u32;
        let x1 = (max.x.ceil().max(0.0) as u32).min(self.width);
        let y1 = (max.y.ceil().max(0.0) as u32).min(self.height);
        (x0 < x1 && y0 < y1).then_some((x0, y0, x1, y1))
    }

    /// Source-over blend of `color` scaled by `coverage`.
    fn blend(&mut self, x: u32, y: u32, color: Rgba, coverage: f32) {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let alpha = color.a as f32 / 255.0 * coverage;
        if alpha <= 0.0 {
            return;
        }
        let dst = &mut self.pixels[i..i + 4];
        let over = |src: u8, dst: u8| (src as f32 * alpha + dst as f32 * (1.0 - alpha)).round() as u8;
        dst[0] = over(color.r, dst[0]);
        dst[1] = over(color.g, dst[1]);
        dst[2] = over(color.b, dst[2]);
        dst[3] = ((alpha + dst[3] as f32 / 255.0 * (1.0 - alpha)) * 255.0).round() as u8;
    }
}
