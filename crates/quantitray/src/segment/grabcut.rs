//! Iterated color-model / min-cut refinement of a trimap.

use image::RgbImage;
use rand::Rng;

use super::gmm::Gmm;
use super::maxflow::FlowGraph;
use super::trimap::{Trimap, TrimapLabel};

/// Capacity used to pin definite trimap labels.
const HARD_LINK: f64 = 1e9;

#[derive(Debug, Clone, Copy)]
pub(crate) struct GrabCutParams {
    pub components: usize,
    pub max_iterations: usize,
    pub convergence_frac: f32,
    pub smoothness: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct GrabCutOutcome {
    pub foreground: Vec<bool>,
    pub iterations: usize,
}

fn pixel_colors(img: &RgbImage) -> Vec<[f64; 3]> {
    img.pixels()
        .map(|p| [p.0[0] as f64, p.0[1] as f64, p.0[2] as f64])
        .collect()
}

#[inline]
fn color_dist_sq(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)
}

/// beta = 1 / (2 * mean squared color difference over 4-neighbor pairs).
fn contrast_beta(colors: &[[f64; 3]], w: usize, h: usize) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for y in 0..h {
        for x in 0..w {
            let i = y * w + x;
            if x + 1 < w {
                sum += color_dist_sq(&colors[i], &colors[i + 1]);
                count += 1;
            }
            if y + 1 < h {
                sum += color_dist_sq(&colors[i], &colors[i + w]);
                count += 1;
            }
        }
    }
    if count == 0 || sum <= 0.0 {
        return 0.0;
    }
    1.0 / (2.0 * sum / count as f64)
}

fn split_samples(colors: &[[f64; 3]], mask: &[bool]) -> (Vec<[f64; 3]>, Vec<[f64; 3]>) {
    let mut fg = Vec::new();
    let mut bg = Vec::new();
    for (c, &m) in colors.iter().zip(mask) {
        if m {
            fg.push(*c);
        } else {
            bg.push(*c);
        }
    }
    (fg, bg)
}

/// Refine `trimap` over `img` (both the same size). Definite labels are kept;
/// probable pixels take the label of their side of the minimum cut.
pub(crate) fn grabcut(
    img: &RgbImage,
    trimap: &Trimap,
    params: &GrabCutParams,
    rng: &mut impl Rng,
) -> GrabCutOutcome {
    let (w, h) = (img.width() as usize, img.height() as usize);
    let n = w * h;
    let colors = pixel_colors(img);
    debug_assert_eq!(trimap.labels.len(), n);

    let beta = contrast_beta(&colors, w, h);
    // n-link weight between two neighboring pixels
    let pair_weight = |a: usize, b: usize| -> f64 {
        params.smoothness * (-beta * color_dist_sq(&colors[a], &colors[b])).exp()
    };

    let mut mask: Vec<bool> = trimap.labels.iter().map(|l| l.is_foreground()).collect();
    let mut iterations = 0;

    for iter in 0..params.max_iterations {
        let (fg_samples, bg_samples) = split_samples(&colors, &mask);
        let (Some(fg_model), Some(bg_model)) = (
            Gmm::fit(&fg_samples, params.components, rng),
            Gmm::fit(&bg_samples, params.components, rng),
        ) else {
            tracing::debug!(iter, "color model has no samples; stopping refinement");
            break;
        };

        let mut graph = FlowGraph::new(n);
        for (i, label) in trimap.labels.iter().enumerate() {
            match label {
                TrimapLabel::Background => graph.add_tweights(i, 0.0, HARD_LINK),
                TrimapLabel::Foreground => graph.add_tweights(i, HARD_LINK, 0.0),
                TrimapLabel::ProbableBackground | TrimapLabel::ProbableForeground => {
                    let d_fg = -fg_model.log_likelihood(&colors[i]);
                    let d_bg = -bg_model.log_likelihood(&colors[i]);
                    let (d_fg, d_bg) = (d_fg.min(HARD_LINK), d_bg.min(HARD_LINK));
                    let m = d_fg.min(d_bg);
                    graph.add_tweights(i, d_bg - m, d_fg - m);
                }
            }
        }
        for y in 0..h {
            for x in 0..w {
                let i = y * w + x;
                if x + 1 < w {
                    let wt = pair_weight(i, i + 1);
                    graph.add_edge(i, i + 1, wt, wt);
                }
                if y + 1 < h {
                    let wt = pair_weight(i, i + w);
                    graph.add_edge(i, i + w, wt, wt);
                }
            }
        }

        let flow = graph.maxflow();
        let mut changed = 0usize;
        for (i, label) in trimap.labels.iter().enumerate() {
            let fg = if label.is_fixed() {
                label.is_foreground()
            } else {
                graph.is_source_side(i)
            };
            if fg != mask[i] {
                changed += 1;
                mask[i] = fg;
            }
        }
        iterations = iter + 1;

        tracing::debug!(
            iter,
            changed,
            flow,
            fg_components = fg_model.n_components(),
            bg_components = bg_model.n_components(),
            "segmentation refinement step"
        );
        if (changed as f64) < params.convergence_frac as f64 * n as f64 {
            break;
        }
    }

    GrabCutOutcome {
        foreground: mask,
        iterations,
    }
}
