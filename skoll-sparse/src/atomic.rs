use std::sync::atomic::{AtomicU64, Ordering};

/// A shared view of an `f64` slice permitting concurrent scatter-adds.
///
/// There is no native atomic `f64`, so additions go through a
/// compare-exchange loop on the bit representation. Every contribution
/// targeting a slot is observed exactly once; the order in which concurrent
/// contributions are combined is unspecified, so sums are reproducible only
/// up to floating-point reduction order.
pub struct AtomicF64View<'a> {
    cells: &'a [AtomicU64],
}

impl<'a> AtomicF64View<'a> {
    /// Reinterprets the slice as atomic cells.
    ///
    /// The exclusive borrow is held for the lifetime of the view, so no
    /// non-atomic access to the same memory can occur concurrently.
    /// `AtomicU64` has the same size and alignment as `f64` on all supported
    /// platforms.
    pub fn new(values: &'a mut [f64]) -> Self {
        let ptr = values.as_mut_ptr() as *const AtomicU64;
        let cells = unsafe { std::slice::from_raw_parts(ptr, values.len()) };
        Self { cells }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Atomically performs `self[index] += value`.
    pub fn add(&self, index: usize, value: f64) {
        let cell = &self.cells[index];
        let mut current = cell.load(Ordering::Relaxed);
        loop {
            let updated = (f64::from_bits(current) + value).to_bits();
            match cell.compare_exchange_weak(current, updated, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    /// Atomically overwrites `self[index]` with `value`.
    pub fn store(&self, index: usize, value: f64) {
        self.cells[index].store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn load(&self, index: usize) -> f64 {
        f64::from_bits(self.cells[index].load(Ordering::Relaxed))
    }
}
