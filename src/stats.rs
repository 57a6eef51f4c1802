//! Optional instrumentation counters (Cargo feature `stats`).
//!
//! Counters never influence allocator behavior — every field here is write-only from the
//! allocator's perspective and is read back only through [`Counters`]'s accessors or
//! [`Counters::report`]. Grounded on the original heap's `jmem_heap_stat_*` family, including its
//! skip-ahead ratio and per-operation average iteration counts.

use log::info;

/// A point-in-time snapshot of the heap's usage counters.
#[derive(Debug, Default, Clone, Copy)]
pub struct Counters {
    pub area_size: usize,
    pub allocated_bytes: usize,
    pub waste_bytes: usize,
    pub peak_allocated_bytes: usize,
    pub peak_waste_bytes: usize,
    pub global_peak_allocated_bytes: usize,
    pub global_peak_waste_bytes: usize,
    pub alloc_count: u64,
    pub free_count: u64,
    pub alloc_iter_count: u64,
    pub free_iter_count: u64,
    pub skip_count: u64,
    pub nonskip_count: u64,
}

impl Counters {
    pub(crate) const fn new(area_size: usize) -> Self {
        Self {
            area_size,
            allocated_bytes: 0,
            waste_bytes: 0,
            peak_allocated_bytes: 0,
            peak_waste_bytes: 0,
            global_peak_allocated_bytes: 0,
            global_peak_waste_bytes: 0,
            alloc_count: 0,
            free_count: 0,
            alloc_iter_count: 0,
            free_iter_count: 0,
            skip_count: 0,
            nonskip_count: 0,
        }
    }

    pub(crate) fn on_alloc(&mut self, requested: usize, aligned: usize) {
        let waste = aligned - requested;
        self.allocated_bytes += aligned;
        self.waste_bytes += waste;
        self.alloc_count += 1;

        self.peak_allocated_bytes = self.peak_allocated_bytes.max(self.allocated_bytes);
        self.global_peak_allocated_bytes =
            self.global_peak_allocated_bytes.max(self.allocated_bytes);
        self.peak_waste_bytes = self.peak_waste_bytes.max(self.waste_bytes);
        self.global_peak_waste_bytes = self.global_peak_waste_bytes.max(self.waste_bytes);
    }

    pub(crate) fn on_free(&mut self, requested: usize, aligned: usize) {
        let waste = aligned - requested;
        self.free_count += 1;
        self.allocated_bytes -= aligned;
        self.waste_bytes -= waste;
    }

    pub(crate) fn on_alloc_iter(&mut self, visited: u32) {
        self.alloc_iter_count += u64::from(visited);
    }

    pub(crate) fn on_free_iter(&mut self, visited: u32) {
        self.free_iter_count += u64::from(visited);
    }

    pub(crate) fn on_skip(&mut self) {
        self.skip_count += 1;
    }

    pub(crate) fn on_nonskip(&mut self) {
        self.nonskip_count += 1;
    }

    /// Reset the per-run peak fields to the current values, leaving global peaks untouched.
    pub fn reset_peak(&mut self) {
        self.peak_allocated_bytes = self.allocated_bytes;
        self.peak_waste_bytes = self.waste_bytes;
    }

    /// Emit a human-readable report via the `log` facade.
    ///
    /// Ratios are reported as `quotient.remainder` integer pairs (no floating point), matching
    /// the original instrumentation's formatting.
    pub fn report(&self) {
        let (skip_q, skip_r) = ratio(self.skip_count, self.nonskip_count);
        let (alloc_q, alloc_r) = ratio(self.alloc_iter_count, self.alloc_count);
        let (free_q, free_r) = ratio(self.free_iter_count, self.free_count);

        info!(
            "heap stats: size={} allocated={} waste={} peak_allocated={} peak_waste={} \
             skip_ratio={skip_q}.{skip_r:04} avg_alloc_iters={alloc_q}.{alloc_r:04} \
             avg_free_iters={free_q}.{free_r:04}",
            self.area_size,
            self.allocated_bytes,
            self.waste_bytes,
            self.peak_allocated_bytes,
            self.peak_waste_bytes,
        );
    }
}

/// `numerator / denominator` as an integer quotient and a four-digit fractional remainder,
/// avoiding a divide-by-zero when `denominator` is still zero (e.g. before any free has run).
fn ratio(numerator: u64, denominator: u64) -> (u64, u64) {
    if denominator == 0 {
        return (0, 0);
    }
    (numerator / denominator, numerator % denominator * 10000 / denominator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_peaks_independently_of_current() {
        let mut c = Counters::new(1024);
        c.on_alloc(10, 16);
        c.on_alloc(10, 16);
        c.on_free(10, 16);
        assert_eq!(c.allocated_bytes, 16);
        assert_eq!(c.peak_allocated_bytes, 32);
        assert_eq!(c.global_peak_allocated_bytes, 32);
    }

    #[test]
    fn reset_peak_only_touches_the_non_global_peak() {
        let mut c = Counters::new(1024);
        c.on_alloc(10, 16);
        c.on_alloc(10, 16);
        c.on_free(10, 16);
        c.reset_peak();
        assert_eq!(c.peak_allocated_bytes, 16);
        assert_eq!(c.global_peak_allocated_bytes, 32);
    }

    #[test]
    fn ratio_handles_zero_denominator() {
        assert_eq!(ratio(5, 0), (0, 0));
        assert_eq!(ratio(3, 2), (1, 5000));
    }
}
