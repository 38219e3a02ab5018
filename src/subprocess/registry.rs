//! Shared label state: per-process colors and the common label column width.
//!
//! A [`LabelRegistry`] is owned by one multiplexer and handed to every
//! supervisor it creates, so independent multiplexers never share colors or
//! alignment.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Components are drawn from `[COLOR_FLOOR, COLOR_FLOOR + COLOR_SPAN)`.
const COLOR_FLOOR: u8 = 50;
const COLOR_SPAN: u8 = 205;

/// Seed used when the configuration does not provide one.
pub const DEFAULT_COLOR_SEED: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Foreground escape sequence selecting this color.
    pub fn fg(&self) -> String {
        super::style::fg_rgb(self.r, self.g, self.b)
    }
}

struct ColorState {
    rng: StdRng,
    assigned: HashMap<u32, Rgb>,
}

/// Hands out a stable color per process id from a seeded generator.
pub struct ColorAllocator {
    state: Mutex<ColorState>,
}

impl ColorAllocator {
    pub fn new(seed: u64) -> Self {
        Self {
            state: Mutex::new(ColorState {
                rng: StdRng::seed_from_u64(seed),
                assigned: HashMap::new(),
            }),
        }
    }

    /// Color for `pid`, drawing a new one only on the first request.
    pub fn allocate(&self, pid: u32) -> Rgb {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(color) = state.assigned.get(&pid) {
            return *color;
        }

        let color = Rgb {
            r: COLOR_FLOOR + state.rng.random_range(0..COLOR_SPAN),
            g: COLOR_FLOOR + state.rng.random_range(0..COLOR_SPAN),
            b: COLOR_FLOOR + state.rng.random_range(0..COLOR_SPAN),
        };
        state.assigned.insert(pid, color);
        tracing::trace!("Allocated color {:?} for pid {}", color, pid);
        color
    }
}

impl Default for ColorAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_COLOR_SEED)
    }
}

/// Widest label observed so far. Only ever grows.
#[derive(Debug, Default)]
pub struct LabelWidthTracker {
    max: AtomicUsize,
}

impl LabelWidthTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `width` and return the current maximum.
    ///
    /// `observe(0)` is a plain read of the published maximum.
    pub fn observe(&self, width: usize) -> usize {
        if width == 0 {
            return self.max.load(Ordering::Acquire);
        }
        let previous = self.max.fetch_max(width, Ordering::AcqRel);
        previous.max(width)
    }

    pub fn current(&self) -> usize {
        self.observe(0)
    }

    /// `label` followed by enough spaces to reach the current maximum width.
    pub fn pad(&self, label: &str, label_width: usize) -> String {
        let padding = self.current().saturating_sub(label_width);
        format!("{label}{}", " ".repeat(padding))
    }
}

/// Colors and alignment shared by every process of one multiplexer.
#[derive(Default)]
pub struct LabelRegistry {
    colors: ColorAllocator,
    widths: LabelWidthTracker,
}

impl LabelRegistry {
    pub fn new(seed: u64) -> Self {
        Self {
            colors: ColorAllocator::new(seed),
            widths: LabelWidthTracker::new(),
        }
    }

    pub fn colors(&self) -> &ColorAllocator {
        &self.colors
    }

    pub fn widths(&self) -> &LabelWidthTracker {
        &self.widths
    }
}
