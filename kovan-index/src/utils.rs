use core::ops::Deref;

/// Bounded exponential spin used between failed slot CAS attempts.
pub(crate) struct Backoff {
    step: u32,
}

impl Backoff {
    const SPIN_LIMIT: u32 = 6;

    #[inline(always)]
    pub(crate) fn new() -> Self {
        Self { step: 0 }
    }

    #[inline(always)]
    pub(crate) fn spin(&mut self) {
        for _ in 0..(1 << self.step.min(Self::SPIN_LIMIT)) {
            core::hint::spin_loop();
        }
        if self.step <= Self::SPIN_LIMIT {
            self.step += 1;
        }
    }
}

// aarch64: 128B (Apple M-series / Neoverse), everything else: 64B.

#[cfg(target_arch = "aarch64")]
#[repr(align(128))]
#[derive(Default, Debug)]
pub(crate) struct CacheAligned<T> {
    data: T,
}

#[cfg(not(target_arch = "aarch64"))]
#[repr(align(64))]
#[derive(Default, Debug)]
pub(crate) struct CacheAligned<T> {
    data: T,
}

impl<T> CacheAligned<T> {
    pub(crate) const fn new(data: T) -> Self {
        Self { data }
    }
}

impl<T> Deref for CacheAligned<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}
