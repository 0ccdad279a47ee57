//! Gaussian kernel sampler.
//!
//! Turns a continuous blur radius into a fixed-size table of `(weight, offset)`
//! taps for a separable blur shader. The weights come from resampling a fine,
//! precomputed half-Gaussian lookup table at the rate the radius requires, and
//! adjacent taps are then merged pairwise so that the shader can rely on
//! bilinear filtering to fetch two texels with one sample.
//!
//! The table holds one half of a symmetric kernel. Tap 0 is the center; every
//! other tap is sampled at `+offset` and `-offset` by the shader.

use std::sync::OnceLock;

/// Fixed length of the padded weight and offset arrays uploaded to the GPU.
pub const KERNEL_CAPACITY: usize = 128;

/// Number of bins in the half-Gaussian lookup table.
pub const LOOKUP_BINS: usize = 1024;

/// Radii are scaled by this factor before sampling, so the kernel spans 3σ.
pub const RADIUS_SCALE: f32 = 3.0;

/// Largest scaled radius the sampler supports.
pub const MAX_SCALED_RADIUS: f32 = 250.0;

// Weights may exceed 1.0 by this much from accumulated rounding.
const WEIGHT_CEILING: f32 = 1.0001;

static GAUSSIAN_LOOKUP: OnceLock<[f32; LOOKUP_BINS]> = OnceLock::new();

/// Half of a unit Gaussian over `[0, 3σ]`. Bin 0 is centered on zero, so only
/// half of it lies on each side; the table is normalized so that
/// `k[0] + 2 * sum(k[1..]) == 1`.
pub fn gaussian_lookup() -> &'static [f32; LOOKUP_BINS] {
    GAUSSIAN_LOOKUP.get_or_init(|| {
        let step = 3.0 / (LOOKUP_BINS as f64 - 0.5);
        let mut raw = [0.0f64; LOOKUP_BINS];
        for (bin, value) in raw.iter_mut().enumerate() {
            let x = bin as f64 * step;
            *value = (-0.5 * x * x).exp();
        }
        let total = raw[0] + 2.0 * raw[1..].iter().sum::<f64>();

        let mut table = [0.0f32; LOOKUP_BINS];
        for (slot, value) in table.iter_mut().zip(raw) {
            *slot = (value / total) as f32;
        }
        table
    })
}

/// Padded weight/offset arrays plus the number of meaningful taps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelTable {
    weights: [f32; KERNEL_CAPACITY],
    offsets: [f32; KERNEL_CAPACITY],
    effective_len: usize,
}

impl Default for KernelTable {
    /// A single full-weight center tap, the same table `sample(0.0)` yields.
    fn default() -> Self {
        let mut weights = [0.0; KERNEL_CAPACITY];
        weights[0] = 1.0;
        Self {
            weights,
            offsets: [0.0; KERNEL_CAPACITY],
            effective_len: 1,
        }
    }
}

impl KernelTable {
    pub fn effective_len(&self) -> usize {
        self.effective_len
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights[..self.effective_len]
    }

    pub fn offsets(&self) -> &[f32] {
        &self.offsets[..self.effective_len]
    }

    pub fn padded_weights(&self) -> &[f32; KERNEL_CAPACITY] {
        &self.weights
    }

    pub fn padded_offsets(&self) -> &[f32; KERNEL_CAPACITY] {
        &self.offsets
    }

    /// The full padded weight array as uploaded to the `weight` parameter.
    pub fn weight_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.weights)
    }

    /// The full padded offset array as uploaded to the `offset` parameter.
    pub fn offset_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.offsets)
    }

    /// Weight the shader accumulates once both sides of the center are sampled.
    pub fn total_weight(&self) -> f32 {
        let weights = self.weights();
        weights[0] + 2.0 * weights[1..].iter().sum::<f32>()
    }
}

/// Sample a kernel for `radius` (in unscaled, user-facing units).
pub fn sample(radius: f32) -> KernelTable {
    let radius = if radius.is_nan() { 0.0 } else { radius };
    let radius = (radius * RADIUS_SCALE).clamp(0.0, MAX_SCALED_RADIUS);

    let (discrete_weights, discrete_len) = discrete_weights(radius);
    compact(&discrete_weights[..discrete_len])
}

// Per-pixel weights for pixel offsets 0..=ceil(radius).
fn discrete_weights(radius: f32) -> ([f32; MAX_DISCRETE_TAPS], usize) {
    let lookup = gaussian_lookup();
    let bin = |index: usize| lookup.get(index).copied().unwrap_or(0.0);

    let bins_per_pixel = (2.0 * LOOKUP_BINS as f32 - 1.0) / (1.0 + 2.0 * radius);
    let ceil_radius = if radius - radius.floor() < 0.001 {
        radius
    } else {
        radius.ceil()
    };
    let fractional_extra = 1.0 - (ceil_radius - radius);
    let last_pixel = ceil_radius as usize;

    let mut weights = [0.0f32; MAX_DISCRETE_TAPS];
    let mut current_bin = 0usize;
    let mut fractional_bin = 0.5f32;

    for (pixel, slot) in weights.iter_mut().enumerate().take(last_pixel + 1) {
        let fractional_pixel = if pixel < last_pixel || fractional_extra < 0.002 {
            1.0
        } else {
            fractional_extra
        };
        // The center pixel straddles bin 0: walk half as many bins and count
        // them twice.
        let bpp_mult = if pixel == 0 { 0.5 } else { 1.0 };

        let mut weight = fractional_bin * bin(current_bin) / bpp_mult;
        let mut remaining_bins = bpp_mult * fractional_pixel * bins_per_pixel - fractional_bin;
        while remaining_bins.floor() as i32 > 0 {
            current_bin += 1;
            weight += bin(current_bin) / bpp_mult;
            remaining_bins -= 1.0;
        }
        current_bin += 1;
        if remaining_bins > 1.0e-6 {
            weight += bin(current_bin) * remaining_bins / bpp_mult;
            fractional_bin = 1.0 - remaining_bins;
        } else {
            fractional_bin = 1.0;
        }

        *slot = clamp_weight(weight, pixel, radius);
    }

    (weights, last_pixel + 1)
}

// Out-of-range or NaN weights become 0.
fn clamp_weight(weight: f32, tap: usize, radius: f32) -> f32 {
    if (0.0..=WEIGHT_CEILING).contains(&weight) {
        return weight;
    }
    log::warn!(
        "Gaussian kernel weight out of range at tap {tap} (radius {radius}): {weight}, clamping to 0"
    );
    0.0
}

const MAX_DISCRETE_TAPS: usize = MAX_SCALED_RADIUS as usize + 1;

// Merge taps (1,2), (3,4), ... into single linearly interpolated samples.
// Tap 0 stays alone; an odd leftover last tap stays unmerged.
fn compact(discrete: &[f32]) -> KernelTable {
    let mut table = KernelTable {
        weights: [0.0; KERNEL_CAPACITY],
        offsets: [0.0; KERNEL_CAPACITY],
        effective_len: 0,
    };

    let mut push = |weight: f32, offset: f32| {
        table.weights[table.effective_len] = weight;
        table.offsets[table.effective_len] = offset;
        table.effective_len += 1;
    };

    push(discrete[0], 0.0);

    let mut tap = 1;
    while tap + 1 < discrete.len() {
        let (near, far) = (discrete[tap], discrete[tap + 1]);
        let (near_offset, far_offset) = (tap as f32, (tap + 1) as f32);
        let weight = near + far;
        let offset = if weight > 0.0 {
            (near_offset * near + far_offset * far) / weight
        } else {
            0.5 * (near_offset + far_offset)
        };
        push(weight, offset);
        tap += 2;
    }
    if discrete.len() % 2 == 0 {
        let last = discrete.len() - 1;
        push(discrete[last], last as f32);
    }

    table
}

/// Memoizes [`sample`] on the last radius it was asked for.
#[derive(Debug, Clone, Default)]
pub struct KernelSampler {
    last_radius: Option<f32>,
    table: KernelTable,
    resample_count: u64,
}

impl KernelSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resample if `radius` differs from the last sampled radius. Returns
    /// whether a resample happened.
    pub fn refresh(&mut self, radius: f32) -> bool {
        if self.last_radius == Some(radius) {
            return false;
        }
        self.last_radius = Some(radius);
        self.table = sample(radius);
        self.resample_count += 1;
        true
    }

    pub fn table(&self) -> &KernelTable {
        &self.table
    }

    pub fn last_radius(&self) -> Option<f32> {
        self.last_radius
    }

    pub fn resample_count(&self) -> u64 {
        self.resample_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_weight_zeroes_out_of_range_weights() {
        assert_eq!(clamp_weight(1.5, 3, 10.0), 0.0);
        assert_eq!(clamp_weight(1.0002, 0, 0.0), 0.0);
        assert_eq!(clamp_weight(-0.01, 7, 42.0), 0.0);
        assert_eq!(clamp_weight(f32::NAN, 1, 5.0), 0.0);
        assert_eq!(clamp_weight(f32::INFINITY, 1, 5.0), 0.0);
    }

    #[test]
    fn clamp_weight_keeps_in_range_weights() {
        assert_eq!(clamp_weight(0.0, 2, 10.0), 0.0);
        assert_eq!(clamp_weight(0.25, 2, 10.0), 0.25);
        assert_eq!(clamp_weight(1.0, 0, 0.0), 1.0);
        assert_eq!(clamp_weight(WEIGHT_CEILING, 0, 0.0), WEIGHT_CEILING);
    }

    fn assert_normalized(radius: f32) {
        let table = sample(radius);
        let total = table.total_weight();
        assert!(
            (total - 1.0).abs() < 1.0e-3,
            "radius {radius}: mirrored weight total {total}"
        );
    }

    #[test]
    fn lookup_table_is_normalized_and_decreasing() {
        let lookup = gaussian_lookup();
        let total = lookup[0] as f64 + 2.0 * lookup[1..].iter().map(|&v| v as f64).sum::<f64>();
        assert!((total - 1.0).abs() < 1.0e-5);
        assert!(lookup.windows(2).all(|pair| pair[0] > pair[1]));
        assert!(lookup[LOOKUP_BINS - 1] > 0.0);
    }

    #[test]
    fn zero_radius_is_a_single_center_tap() {
        let table = sample(0.0);
        assert_eq!(table.effective_len(), 1);
        assert_eq!(table.offsets(), &[0.0]);
        assert!((table.weights()[0] - 1.0).abs() < 1.0e-3);
        assert!(table.padded_weights()[1..].iter().all(|&w| w == 0.0));
    }

    #[test]
    fn weights_are_normalized_across_the_radius_domain() {
        let max_radius = MAX_SCALED_RADIUS / RADIUS_SCALE;
        let mut radius = 0.0;
        while radius <= max_radius {
            assert_normalized(radius);
            radius += 0.173;
        }
        for whole in 0..=83 {
            assert_normalized(whole as f32);
        }
        assert_normalized(max_radius);
    }

    #[test]
    fn radius_is_clamped_at_the_top_of_the_range() {
        assert_eq!(sample(500.0), sample(MAX_SCALED_RADIUS / RADIUS_SCALE));
        assert_eq!(sample(-4.0), sample(0.0));
        assert_eq!(sample(f32::NAN), sample(0.0));
    }

    #[test]
    fn largest_kernel_fits_with_room_to_spare() {
        let table = sample(MAX_SCALED_RADIUS / RADIUS_SCALE);
        // 251 discrete taps: the center plus 125 merged pairs.
        assert_eq!(table.effective_len(), 126);
        assert!(table.effective_len() <= KERNEL_CAPACITY);
    }

    #[test]
    fn offsets_start_at_zero_and_increase() {
        for radius in [0.5, 1.0, 2.7, 10.0, 33.3, 80.0] {
            let table = sample(radius);
            assert_eq!(table.offsets()[0], 0.0);
            assert!(
                table.offsets().windows(2).all(|pair| pair[0] < pair[1]),
                "radius {radius}: offsets not increasing: {:?}",
                table.offsets()
            );
        }
    }

    #[test]
    fn merged_offsets_lie_between_their_source_taps() {
        let table = sample(4.0);
        // Scaled radius 12 -> 13 discrete taps -> center + 6 pairs.
        assert_eq!(table.effective_len(), 7);
        for (index, &offset) in table.offsets().iter().enumerate().skip(1) {
            let near = (2 * index - 1) as f32;
            assert!(offset >= near && offset <= near + 1.0);
        }
    }

    #[test]
    fn even_discrete_count_keeps_last_tap_unmerged() {
        // Scaled radius 3 -> 4 discrete taps -> center, (1,2), 3.
        let table = sample(1.0);
        assert_eq!(table.effective_len(), 3);
        assert_eq!(table.offsets()[2], 3.0);
    }

    #[test]
    fn weights_stay_in_range_and_padding_is_zero() {
        for radius in [0.0, 0.3337, 1.0, 5.5, 20.0, 83.0] {
            let table = sample(radius);
            assert!(table.weights().iter().all(|&w| (0.0..=1.0001).contains(&w)));
            let len = table.effective_len();
            assert!(table.padded_weights()[len..].iter().all(|&w| w == 0.0));
            assert!(table.padded_offsets()[len..].iter().all(|&o| o == 0.0));
        }
    }

    #[test]
    fn byte_views_cover_the_full_padded_arrays() {
        let table = sample(7.0);
        assert_eq!(table.weight_bytes().len(), KERNEL_CAPACITY * 4);
        assert_eq!(table.offset_bytes().len(), KERNEL_CAPACITY * 4);
        assert_eq!(&table.weight_bytes()[..4], &table.weights()[0].to_ne_bytes());
    }

    #[test]
    fn refresh_skips_unchanged_radius() {
        let mut sampler = KernelSampler::new();
        assert!(sampler.refresh(6.0));
        let once = *sampler.table();
        assert!(!sampler.refresh(6.0));
        assert_eq!(sampler.resample_count(), 1);
        assert_eq!(sampler.table().weight_bytes(), once.weight_bytes());
        assert_eq!(sampler.table().offset_bytes(), once.offset_bytes());

        assert!(sampler.refresh(6.5));
        assert_eq!(sampler.resample_count(), 2);
        assert_eq!(sampler.last_radius(), Some(6.5));
    }
}
