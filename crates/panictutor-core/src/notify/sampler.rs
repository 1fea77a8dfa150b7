use std::sync::atomic::{AtomicU32, Ordering};

use rand::Rng;

const ID_MIN: u32 = 1000;
const ID_MAX: u32 = 9999;

/// Source of randomness for fallback picks and delivery ids.
pub trait Sampler: Send + Sync {
    /// An index in `0..len`. `len` is never zero.
    fn pick(&self, len: usize) -> usize;

    /// A delivery id in `1000..=9999`.
    fn notification_id(&self) -> u32;
}

/// Uniform sampling from the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSampler;

impl Sampler for RandomSampler {
    fn pick(&self, len: usize) -> usize {
        rand::thread_rng().gen_range(0..len.max(1))
    }

    fn notification_id(&self) -> u32 {
        rand::thread_rng().gen_range(ID_MIN..=ID_MAX)
    }
}

/// Always picks the same index; ids count up from 1000.
#[derive(Debug)]
pub struct FixedSampler {
    index: usize,
    next_id: AtomicU32,
}

impl FixedSampler {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            next_id: AtomicU32::new(ID_MIN),
        }
    }
}

impl Sampler for FixedSampler {
    fn pick(&self, len: usize) -> usize {
        self.index.min(len.saturating_sub(1))
    }

    fn notification_id(&self) -> u32 {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        ID_MIN + (n - ID_MIN) % (ID_MAX - ID_MIN + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_stays_in_bounds() {
        let s = RandomSampler;
        for _ in 0..200 {
            assert!(s.pick(7) < 7);
            assert!((ID_MIN..=ID_MAX).contains(&s.notification_id()));
        }
    }

    #[test]
    fn fixed_is_clamped_and_sequential() {
        let s = FixedSampler::new(9);
        assert_eq!(s.pick(6), 5);
        assert_eq!(s.notification_id(), 1000);
        assert_eq!(s.notification_id(), 1001);
    }
}
