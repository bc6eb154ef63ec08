//! Pure frame-buffer math: subframe geometry helpers and the
//! post-processing kernels that operate on a completed readout.

/// Centered sub-extent covering `fraction` of the area along one axis.
///
/// With `m` the full extent and `F` the target area fraction, the far
/// edge is `b = m * (sqrt(F) + 1) / 2` and the origin `a = m - b`, so
/// the returned `(length, offset) = (b - a, a)` is centered and spans
/// `sqrt(F)` of the axis.
pub(crate) fn centered_fraction(max_extent: u16, fraction: f64) -> (u16, u16) {
    let m = f64::from(max_extent);
    let b = m * (fraction.sqrt() + 1.0) / 2.0;
    let a = m - b;
    ((b - a) as u16, a as u16)
}

/// Round a subframe origin up to even so a 2x2 Bayer matrix always
/// starts on the same color.
pub(crate) fn align_bayer(top: u16, left: u16) -> (u16, u16) {
    (top + top % 2, left + left % 2)
}

/// Bayer-to-luminance reduction: every output pixel is the mean of the
/// 2x2 quad containing it, so all four filter colors contribute. Quads
/// are anchored on even coordinates and clamped at odd-sized edges.
pub(crate) fn bayer_to_mono(frame: &[u16], width: usize, height: usize) -> Vec<u16> {
    let mut out = vec![0u16; frame.len()];
    for y in 0..height {
        let y0 = y & !1;
        let y1 = if y0 + 1 < height { y0 + 1 } else { y0 };
        for x in 0..width {
            let x0 = x & !1;
            let x1 = if x0 + 1 < width { x0 + 1 } else { x0 };
            let sum = u32::from(frame[y0 * width + x0])
                + u32::from(frame[y0 * width + x1])
                + u32::from(frame[y1 * width + x0])
                + u32::from(frame[y1 * width + x1]);
            out[y * width + x] = (sum / 4) as u16;
        }
    }
    out
}

/// Suggested display stretch from the sample histogram; does not touch
/// the buffer.
///
/// Collapses samples to 12 bits, integrates a 4096-bin histogram to the
/// 20% and 99% points, then spreads the range 10% past them while
/// keeping near-saturated images from rendering black.
pub(crate) fn auto_contrast(frame: &[u16]) -> (i32, i32) {
    let mut hist = [0u32; 4096];
    for &sample in frame {
        hist[usize::from(sample >> 4)] += 1;
    }

    let total = frame.len() as u64;
    let mut p20: u16 = 65535;
    let mut p99: u16 = 65535;
    if total > 0 {
        let s20 = 20 * total / 100;
        let s99 = 99 * total / 100;
        let mut hist_sum = 0u64;
        for (bin, &count) in hist.iter().enumerate() {
            hist_sum += u64::from(count);
            if hist_sum >= s20 && p20 == 65535 {
                p20 = bin as u16;
            }
            if hist_sum >= s99 && p99 == 65535 {
                p99 = bin as u16;
            }
        }
    }

    let range = (16 * (i32::from(p99) - i32::from(p20)) * 11 / 10).clamp(64, 65536);

    let black = if p20 >= 4080 {
        // saturated image, keep it from showing up black
        16 * 4080 - range
    } else {
        16 * i32::from(p20) - range / 10
    };

    (black, black + range)
}
