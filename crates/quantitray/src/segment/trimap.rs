//! Trimap seeding for the foreground/background refinement.

/// Per-pixel label. Definite labels are never revised; probable labels are
/// re-assigned by every min-cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TrimapLabel {
    Background,
    Foreground,
    ProbableBackground,
    ProbableForeground,
}

impl TrimapLabel {
    #[inline]
    pub(crate) fn is_foreground(self) -> bool {
        matches!(self, Self::Foreground | Self::ProbableForeground)
    }

    #[inline]
    pub(crate) fn is_fixed(self) -> bool {
        matches!(self, Self::Foreground | Self::Background)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Trimap {
    pub width: u32,
    pub height: u32,
    pub labels: Vec<TrimapLabel>,
}

impl Trimap {
    /// Seed from a rectangle: outside = background, an inner band of
    /// `margin_px` = probable background, the rest = probable foreground.
    ///
    /// `rect` is `[x0, y0, x1, y1)` in pixels and is clamped to the image.
    pub(crate) fn from_rect(width: u32, height: u32, rect: [u32; 4], margin_px: [u32; 2]) -> Self {
        let x0 = rect[0].min(width);
        let y0 = rect[1].min(height);
        let x1 = rect[2].clamp(x0, width);
        let y1 = rect[3].clamp(y0, height);
        let [mx, my] = margin_px;

        let mut labels = vec![TrimapLabel::Background; (width as usize) * (height as usize)];
        for y in y0..y1 {
            for x in x0..x1 {
                let in_band = x < x0 + mx || x + mx >= x1 || y < y0 + my || y + my >= y1;
                labels[(y * width + x) as usize] = if in_band {
                    TrimapLabel::ProbableBackground
                } else {
                    TrimapLabel::ProbableForeground
                };
            }
        }
        Self {
            width,
            height,
            labels,
        }
    }

    /// Mark the centered `frac` portion of the probable-foreground region as
    /// definite foreground.
    pub(crate) fn with_definite_core(mut self, frac: f32) -> Self {
        let frac = frac.clamp(0.0, 1.0);
        if frac == 0.0 {
            return self;
        }
        let Some([x0, y0, x1, y1]) = self.probable_foreground_bbox() else {
            return self;
        };
        let inset = |lo: u32, hi: u32| ((hi - lo + 1) as f32 * (1.0 - frac) * 0.5).floor() as u32;
        let (ix, iy) = (inset(x0, x1), inset(y0, y1));
        for y in y0 + iy..=y1 - iy {
            for x in x0 + ix..=x1 - ix {
                let label = &mut self.labels[(y * self.width + x) as usize];
                if *label == TrimapLabel::ProbableForeground {
                    *label = TrimapLabel::Foreground;
                }
            }
        }
        self
    }

    /// Inclusive `[x0, y0, x1, y1]` of the probable-foreground pixels.
    fn probable_foreground_bbox(&self) -> Option<[u32; 4]> {
        let mut bbox: Option<[u32; 4]> = None;
        for y in 0..self.height {
            for x in 0..self.width {
                if self.labels[(y * self.width + x) as usize] != TrimapLabel::ProbableForeground {
                    continue;
                }
                let b = bbox.get_or_insert([x, y, x, y]);
                b[0] = b[0].min(x);
                b[1] = b[1].min(y);
                b[2] = b[2].max(x);
                b[3] = b[3].max(y);
            }
        }
        bbox
    }

    pub(crate) fn foreground_count(&self) -> usize {
        self.labels.iter().filter(|l| l.is_foreground()).count()
    }
}
