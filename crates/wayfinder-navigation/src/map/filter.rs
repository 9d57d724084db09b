//! Separable image filters over row-major `f32` buffers.
//!
//! Edges are clamped: samples outside the image repeat the nearest edge pixel.

fn check(len: usize, width: usize, height: usize) {
    assert_eq!(len, width * height, "filter buffer does not match {width}x{height} image");
}

/// Square-window minimum (grey-scale erosion) of radius `radius` cells.
pub fn minimum_filter(src: &[f32], dst: &mut [f32], scratch: &mut [f32], width: usize, height: usize, radius: usize) {
    check(src.len(), width, height);
    check(dst.len(), width, height);
    check(scratch.len(), width, height);

    for y in 0..height {
        let row = &src[y * width..(y + 1) * width];
        for x in 0..width {
            let lo = x.saturating_sub(radius);
            let hi = (x + radius).min(width - 1);
            scratch[y * width + x] = row[lo..=hi].iter().copied().fold(f32::INFINITY, f32::min);
        }
    }
    for y in 0..height {
        let lo = y.saturating_sub(radius);
        let hi = (y + radius).min(height - 1);
        for x in 0..width {
            dst[y * width + x] = (lo..=hi).map(|yy| scratch[yy * width + x]).fold(f32::INFINITY, f32::min);
        }
    }
}

/// Normalized Gaussian kernel covering three standard deviations.
fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = (3.0 * sigma).ceil() as i32;
    let mut kernel: Vec<f32> = (-radius..=radius)
        .map(|i| (-(i * i) as f32 / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|w| *w /= sum);
    kernel
}

/// Gaussian blur with standard deviation `sigma` cells. A non-positive sigma copies the image.
pub fn gaussian_blur(src: &[f32], dst: &mut [f32], scratch: &mut [f32], width: usize, height: usize, sigma: f32) {
    check(src.len(), width, height);
    check(dst.len(), width, height);
    check(scratch.len(), width, height);

    if !(sigma > 0.0 && sigma.is_finite()) {
        dst.copy_from_slice(src);
        return;
    }

    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as isize;
    let clamp = |i: isize, n: usize| i.clamp(0, n as isize - 1) as usize;

    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0;
            for (k, w) in kernel.iter().enumerate() {
                let sx = clamp(x as isize + k as isize - radius, width);
                acc += w * src[y * width + sx];
            }
            scratch[y * width + x] = acc;
        }
    }
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0;
            for (k, w) in kernel.iter().enumerate() {
                let sy = clamp(y as isize + k as isize - radius, height);
                acc += w * scratch[sy * width + x];
            }
            dst[y * width + x] = acc;
        }
    }
}

/// Element-wise minimum, written into `dst`.
pub fn minimum_composite(dst: &mut [f32], other: &[f32]) {
    assert_eq!(dst.len(), other.len(), "composited images differ in size");
    for (d, o) in dst.iter_mut().zip(other) {
        *d = d.min(*o);
    }
}
