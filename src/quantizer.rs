//! Adaptive palette reduction.
//!
//! Median cut over the weighted color histogram: repeatedly split the box
//! with the widest channel range at its population median, then average
//! each box. The histogram is kept in sorted order, so a given input and
//! `max_colors` always produce the same palette.

use crate::error::ProcessingError;
use crate::format_spec::MAX_PALETTE_COLORS;
use crate::image_processor::{CanonicalImage, PixelData};
use rgb::RGB8;
use std::collections::{BTreeMap, HashMap};

/// A histogram bucket: one distinct color and how many pixels carry it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorCount {
    pub color: (u8, u8, u8),
    pub count: u64,
}

/// Squared RGB distance with green weighted heaviest, then blue, then red.
#[inline]
pub fn perceptual_dist_sq(a: RGB8, b: RGB8) -> i32 {
    let dr = a.r as i32 - b.r as i32;
    let dg = a.g as i32 - b.g as i32;
    let db = a.b as i32 - b.b as i32;
    2 * dr * dr + 4 * dg * dg + 3 * db * db
}

/// Reduces `image` to an indexed image of at most `max_colors` entries.
///
/// Alpha is ignored; callers flatten transparency first. The output palette
/// is sorted and contains only colors that are actually used, so running
/// this on its own output returns an identical image.
pub fn quantize(image: &CanonicalImage, max_colors: usize) -> Result<CanonicalImage, ProcessingError> {
    if max_colors == 0 || max_colors > MAX_PALETTE_COLORS as usize {
        return Err(ProcessingError::QuantizationFailure(format!(
            "max_colors must be within 1..={MAX_PALETTE_COLORS}, got {max_colors}"
        )));
    }
    image.check_layout()?;

    let pixels = image.to_rgb_pixels();
    if pixels.is_empty() {
        return Err(ProcessingError::QuantizationFailure("image has no pixels".to_string()));
    }

    let histogram = build_histogram(&pixels);
    let candidates = if histogram.len() <= max_colors {
        histogram.iter().map(|c| RGB8::new(c.color.0, c.color.1, c.color.2)).collect()
    } else {
        median_cut(histogram.clone(), max_colors)
    };

    // Map every distinct color once, then keep only the entries in use.
    let mut nearest: HashMap<(u8, u8, u8), RGB8> = HashMap::with_capacity(histogram.len());
    for bucket in &histogram {
        let color = RGB8::new(bucket.color.0, bucket.color.1, bucket.color.2);
        let closest = candidates
            .iter()
            .copied()
            .min_by_key(|c| perceptual_dist_sq(*c, color))
            .ok_or_else(|| ProcessingError::QuantizationFailure("empty palette".to_string()))?;
        nearest.insert(bucket.color, closest);
    }

    let mut palette: Vec<RGB8> = nearest.values().copied().collect();
    palette.sort_by_key(|c| (c.r, c.g, c.b));
    palette.dedup();

    let slot: HashMap<RGB8, u8> = palette
        .iter()
        .enumerate()
        .map(|(i, c)| (*c, i as u8))
        .collect();

    let indices = pixels
        .iter()
        .map(|p| slot[&nearest[&(p.r, p.g, p.b)]])
        .collect();

    tracing::debug!(
        distinct = histogram.len(),
        palette = palette.len(),
        max_colors,
        "quantized image"
    );

    Ok(CanonicalImage {
        width: image.width,
        height: image.height,
        pixels: PixelData::Indexed { palette, indices },
    })
}

/// Distinct colors with their pixel counts, sorted by color.
pub fn build_histogram(pixels: &[RGB8]) -> Vec<ColorCount> {
    let mut counts: BTreeMap<(u8, u8, u8), u64> = BTreeMap::new();
    for p in pixels {
        *counts.entry((p.r, p.g, p.b)).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(color, count)| ColorCount { color, count })
        .collect()
}

/// Median cut: recursively split the color box along its widest channel.
fn median_cut(colors: Vec<ColorCount>, num_colors: usize) -> Vec<RGB8> {
    if colors.is_empty() || num_colors == 0 {
        return vec![];
    }

    let mut boxes: Vec<Vec<ColorCount>> = vec![colors];
    while boxes.len() < num_colors {
        // Widest splittable box; ties go to the more populated one.
        let best = boxes
            .iter()
            .enumerate()
            .filter(|(_, b)| b.len() >= 2)
            .max_by(|(ia, a), (ib, b)| {
                box_max_range(a)
                    .cmp(&box_max_range(b))
                    .then(box_population(a).cmp(&box_population(b)))
                    .then(ib.cmp(ia))
            })
            .map(|(i, _)| i);

        let Some(best_idx) = best else { break };
        let to_split = boxes.remove(best_idx);
        let (a, b) = split_box(to_split);
        boxes.push(a);
        boxes.push(b);
    }

    boxes.iter().map(|b| box_average(b)).collect()
}

fn channel_ranges(colors: &[ColorCount]) -> (u8, u8, u8) {
    let (mut rmin, mut rmax) = (255u8, 0u8);
    let (mut gmin, mut gmax) = (255u8, 0u8);
    let (mut bmin, mut bmax) = (255u8, 0u8);
    for c in colors {
        let (r, g, b) = c.color;
        rmin = rmin.min(r); rmax = rmax.max(r);
        gmin = gmin.min(g); gmax = gmax.max(g);
        bmin = bmin.min(b); bmax = bmax.max(b);
    }
    (
        rmax.saturating_sub(rmin),
        gmax.saturating_sub(gmin),
        bmax.saturating_sub(bmin),
    )
}

pub fn box_max_range(colors: &[ColorCount]) -> u16 {
    let (rr, gr, br) = channel_ranges(colors);
    rr.max(gr).max(br) as u16
}

fn box_population(colors: &[ColorCount]) -> u64 {
    colors.iter().map(|c| c.count).sum()
}

/// Splits at the population median along the widest channel. Both halves
/// are non-empty for any input of two or more buckets.
pub fn split_box(mut colors: Vec<ColorCount>) -> (Vec<ColorCount>, Vec<ColorCount>) {
    let (rr, gr, br) = channel_ranges(&colors);

    if rr >= gr && rr >= br {
        colors.sort_by_key(|c| (c.color.0, c.color.1, c.color.2));
    } else if gr >= br {
        colors.sort_by_key(|c| (c.color.1, c.color.0, c.color.2));
    } else {
        colors.sort_by_key(|c| (c.color.2, c.color.0, c.color.1));
    }

    let half = box_population(&colors).div_ceil(2);
    let mut running = 0u64;
    let mut mid = colors.len() / 2;
    for (i, c) in colors.iter().enumerate() {
        running += c.count;
        if running >= half {
            mid = i + 1;
            break;
        }
    }
    let mid = mid.clamp(1, colors.len().saturating_sub(1).max(1));

    let right = colors.split_off(mid);
    (colors, right)
}

/// Population-weighted mean, rounded to the nearest channel value.
pub fn box_average(colors: &[ColorCount]) -> RGB8 {
    let n = box_population(colors);
    if n == 0 {
        return RGB8::new(0, 0, 0);
    }
    let (mut sr, mut sg, mut sb) = (0u64, 0u64, 0u64);
    for c in colors {
        sr += c.color.0 as u64 * c.count;
        sg += c.color.1 as u64 * c.count;
        sb += c.color.2 as u64 * c.count;
    }
    RGB8::new(
        ((sr + n / 2) / n) as u8,
        ((sg + n / 2) / n) as u8,
        ((sb + n / 2) / n) as u8,
    )
}
