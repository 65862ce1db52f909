use crate::{
    edit::filters::{FilterChain, FilterOp},
    foundation::core::Raster,
    foundation::error::{ArcraftError, ArcraftResult},
};

/// Renders a source raster through a filter chain.
///
/// Implementations must be pure: the same source and chain always yield byte-identical output.
pub trait FilterEngine {
    fn render(&self, source: &Raster, chain: &FilterChain) -> ArcraftResult<Raster>;
}

/// CPU implementation of the CSS filter-effects primitives on straight RGBA8.
#[derive(Clone, Copy, Debug, Default)]
pub struct CpuFilterEngine;

impl FilterEngine for CpuFilterEngine {
    #[tracing::instrument(skip(self, source, chain), fields(w = source.width, h = source.height, ops = chain.ops.len()))]
    fn render(&self, source: &Raster, chain: &FilterChain) -> ArcraftResult<Raster> {
        if chain.is_empty() {
            return Ok(source.clone());
        }

        let mut buf = source.rgba8.as_ref().clone();
        for op in &chain.ops {
            match *op {
                FilterOp::Blur { sigma_px } => {
                    buf = blur_rgba8(&buf, source.width, source.height, sigma_px)?;
                }
                other => {
                    let m = ColorMatrix::for_op(other);
                    m.apply_in_place(&mut buf);
                }
            }
        }
        Raster::new(source.width, source.height, buf)
    }
}

/// 3x3 RGB matrix plus offset, in normalized 0..1 units.
#[derive(Clone, Copy, Debug, PartialEq)]
struct ColorMatrix {
    m: [[f32; 3]; 3],
    offset: [f32; 3],
}

impl ColorMatrix {
    fn scale(k: f32, offset: f32) -> Self {
        Self {
            m: [[k, 0.0, 0.0], [0.0, k, 0.0], [0.0, 0.0, k]],
            offset: [offset; 3],
        }
    }

    fn linear(m: [[f32; 3]; 3]) -> Self {
        Self {
            m,
            offset: [0.0; 3],
        }
    }

    fn for_op(op: FilterOp) -> Self {
        match op {
            FilterOp::Brightness(k) => Self::scale(k.max(0.0), 0.0),
            FilterOp::Contrast(k) => {
                let k = k.max(0.0);
                Self::scale(k, 0.5 - 0.5 * k)
            }
            FilterOp::Invert(a) => {
                let a = a.clamp(0.0, 1.0);
                Self::scale(1.0 - 2.0 * a, a)
            }
            FilterOp::Saturate(s) => {
                let s = s.max(0.0);
                Self::linear([
                    [0.213 + 0.787 * s, 0.715 - 0.715 * s, 0.072 - 0.072 * s],
                    [0.213 - 0.213 * s, 0.715 + 0.285 * s, 0.072 - 0.072 * s],
                    [0.213 - 0.213 * s, 0.715 - 0.715 * s, 0.072 + 0.928 * s],
                ])
            }
            FilterOp::HueRotate(deg) => {
                let (sin, cos) = deg.to_radians().sin_cos();
                Self::linear([
                    [
                        0.213 + cos * 0.787 - sin * 0.213,
                        0.715 - cos * 0.715 - sin * 0.715,
                        0.072 - cos * 0.072 + sin * 0.928,
                    ],
                    [
                        0.213 - cos * 0.213 + sin * 0.143,
                        0.715 + cos * 0.285 + sin * 0.140,
                        0.072 - cos * 0.072 - sin * 0.283,
                    ],
                    [
                        0.213 - cos * 0.213 - sin * 0.787,
                        0.715 - cos * 0.715 + sin * 0.715,
                        0.072 + cos * 0.928 + sin * 0.072,
                    ],
                ])
            }
            FilterOp::Sepia(a) => {
                let b = 1.0 - a.clamp(0.0, 1.0);
                Self::linear([
                    [0.393 + 0.607 * b, 0.769 - 0.769 * b, 0.189 - 0.189 * b],
                    [0.349 - 0.349 * b, 0.686 + 0.314 * b, 0.168 - 0.168 * b],
                    [0.272 - 0.272 * b, 0.534 - 0.534 * b, 0.131 + 0.869 * b],
                ])
            }
            FilterOp::Grayscale(a) => {
                let b = 1.0 - a.clamp(0.0, 1.0);
                Self::linear([
                    [0.2126 + 0.7874 * b, 0.7152 - 0.7152 * b, 0.0722 - 0.0722 * b],
                    [0.2126 - 0.2126 * b, 0.7152 + 0.2848 * b, 0.0722 - 0.0722 * b],
                    [0.2126 - 0.2126 * b, 0.7152 - 0.7152 * b, 0.0722 + 0.9278 * b],
                ])
            }
            FilterOp::Blur { .. } => Self::scale(1.0, 0.0),
        }
    }

    fn apply_in_place(&self, rgba: &mut [u8]) {
        for px in rgba.chunks_exact_mut(4) {
            let c = [
                f32::from(px[0]) / 255.0,
                f32::from(px[1]) / 255.0,
                f32::from(px[2]) / 255.0,
            ];
            for (ch, row) in self.m.iter().enumerate() {
                let v = row[0] * c[0] + row[1] * c[1] + row[2] * c[2] + self.offset[ch];
                px[ch] = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
            }
        }
    }
}

/// Gaussian blur with CSS semantics (`sigma_px` is the standard deviation). Edges clamp.
pub fn blur_rgba8(src: &[u8], width: u32, height: u32, sigma_px: f32) -> ArcraftResult<Vec<u8>> {
    let (w, h) = (width as usize, height as usize);
    let expected_len = w
        .checked_mul(h)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| ArcraftError::validation("blur buffer size overflow"))?;
    if src.len() != expected_len {
        return Err(ArcraftError::validation(
            "blur_rgba8 expects src matching width*height*4",
        ));
    }
    if !sigma_px.is_finite() || sigma_px <= 0.0 || expected_len == 0 {
        return Ok(src.to_vec());
    }

    let kernel = gaussian_weights(sigma_px);
    // Premultiplied so transparent neighbours do not tint the result.
    let premul: Vec<f32> = src
        .chunks_exact(4)
        .flat_map(|px| {
            let a = f32::from(px[3]) / 255.0;
            [
                f32::from(px[0]) * a,
                f32::from(px[1]) * a,
                f32::from(px[2]) * a,
                f32::from(px[3]),
            ]
        })
        .collect();
    let rows = convolve(&premul, w, h, &kernel, Axis::Row);
    let both = convolve(&rows, w, h, &kernel, Axis::Column);
    Ok(both.chunks_exact(4).flat_map(straight_alpha).collect())
}

#[derive(Clone, Copy)]
enum Axis {
    Row,
    Column,
}

/// Normalized taps for offsets `-r..=r`, `r = ceil(3 sigma)`.
fn gaussian_weights(sigma: f32) -> Vec<f32> {
    let r = (sigma * 3.0).ceil().max(1.0) as i32;
    let two_sigma_sq = 2.0 * sigma * sigma;
    let taps: Vec<f32> = (-r..=r)
        .map(|i| (-((i * i) as f32) / two_sigma_sq).exp())
        .collect();
    let total: f32 = taps.iter().sum();
    taps.into_iter().map(|t| t / total).collect()
}

fn convolve(src: &[f32], w: usize, h: usize, kernel: &[f32], axis: Axis) -> Vec<f32> {
    let r = (kernel.len() / 2) as isize;
    let (len, stride) = match axis {
        Axis::Row => (w, 1),
        Axis::Column => (h, w),
    };
    let mut out = vec![0.0f32; src.len()];
    for y in 0..h {
        for x in 0..w {
            let pos = match axis {
                Axis::Row => x,
                Axis::Column => y,
            };
            let base = y * w + x - pos * stride;
            let mut acc = [0.0f32; 4];
            for (k, weight) in kernel.iter().enumerate() {
                let at = (pos as isize + k as isize - r).clamp(0, len as isize - 1) as usize;
                let i = (base + at * stride) * 4;
                for (a, v) in acc.iter_mut().zip(&src[i..i + 4]) {
                    *a += weight * v;
                }
            }
            let o = (y * w + x) * 4;
            out[o..o + 4].copy_from_slice(&acc);
        }
    }
    out
}

fn straight_alpha(px: &[f32]) -> [u8; 4] {
    let alpha = px[3].round().clamp(0.0, 255.0);
    if alpha == 0.0 {
        return [0; 4];
    }
    let unmul = |c: f32| (c * 255.0 / px[3]).round().clamp(0.0, 255.0) as u8;
    [unmul(px[0]), unmul(px[1]), unmul(px[2]), alpha as u8]
}
