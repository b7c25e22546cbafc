//! Dirty-rectangle bookkeeping.
//!
//! The tracker keeps a small, fixed-capacity table of rectangles. A new
//! rectangle is folded into whichever existing entry it wastes the least
//! area with; if nothing is a good fit it gets its own slot, and once the
//! table is full every new rectangle is merged. The table is allocated up
//! front so marking never allocates, which keeps it usable from the
//! per-byte drawing path.

/// An axis-aligned rectangle in surface pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    #[must_use]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge.
    #[must_use]
    pub const fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    /// Exclusive bottom edge.
    #[must_use]
    pub const fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[must_use]
    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    #[must_use]
    pub const fn contains_point(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// True if `other` lies entirely inside `self`.
    #[must_use]
    pub const fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// True if the two rectangles share at least one pixel.
    #[must_use]
    pub fn intersects(&self, other: &Rect) -> bool {
        self.intersection(other).is_some()
    }

    #[must_use]
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        (right > x && bottom > y).then(|| Rect::new(x, y, right - x, bottom - y))
    }

    /// Smallest rectangle covering both.
    #[must_use]
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(x, y, right - x, bottom - y)
    }

    /// Clip to a `width` x `height` area anchored at the origin.
    #[must_use]
    pub fn clip(&self, width: u32, height: u32) -> Option<Rect> {
        self.intersection(&Rect::new(0, 0, width, height))
    }

    /// Area the union of `self` and `other` covers beyond the two rectangles.
    fn merge_waste(&self, other: &Rect) -> u64 {
        let overlap = self.intersection(other).map_or(0, |r| r.area());
        self.union(other).area() + overlap - self.area() - other.area()
    }
}

/// Default number of rectangles a tracker holds before it starts forcing merges.
pub const DEFAULT_DIRTY_CAPACITY: usize = 64;

/// Accumulates the screen area touched since it was last taken.
///
/// Holds no lock of its own; it lives inside a [`TextureSurface`](crate::TextureSurface)
/// and shares that surface's synchronisation.
#[derive(Debug, Clone)]
pub struct DirtyTracker {
    rects: Vec<Rect>,
    capacity: usize,
    width: u32,
    height: u32,
}

impl DirtyTracker {
    /// Create a tracker clipping to `width` x `height` with room for
    /// `capacity` rectangles (at least one).
    #[must_use]
    pub fn new(width: u32, height: u32, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            rects: Vec::with_capacity(capacity),
            capacity,
            width,
            height,
        }
    }

    /// Change the clipping bounds. Pending rectangles are dropped since they
    /// refer to the old geometry.
    pub fn set_bounds(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.rects.clear();
    }

    #[must_use]
    pub fn bounds(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Merge `rect` into the tracked region.
    pub fn mark(&mut self, rect: Rect) {
        let Some(rect) = rect.clip(self.width, self.height) else {
            return;
        };
        if self.rects.iter().any(|r| r.contains(&rect)) {
            return;
        }

        let mut best: Option<(usize, u64)> = None;
        for (i, existing) in self.rects.iter().enumerate() {
            let waste = existing.merge_waste(&rect);
            if best.is_none_or(|(_, w)| waste < w) {
                best = Some((i, waste));
            }
        }

        match best {
            Some((i, waste)) if waste <= rect.area() || self.rects.len() >= self.capacity => {
                self.rects[i] = self.rects[i].union(&rect);
                self.absorb_overlaps(i);
            }
            _ => self.rects.push(rect),
        }
    }

    /// Mark the whole clipping area.
    pub fn mark_all(&mut self) {
        self.rects.clear();
        if self.width > 0 && self.height > 0 {
            self.rects.push(Rect::new(0, 0, self.width, self.height));
        }
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        !self.rects.is_empty()
    }

    /// The rectangles accumulated so far.
    #[must_use]
    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    pub fn clear(&mut self) {
        self.rects.clear();
    }

    /// Return the accumulated rectangles and start over empty.
    pub fn take(&mut self) -> Vec<Rect> {
        std::mem::replace(&mut self.rects, Vec::with_capacity(self.capacity))
    }

    // Grow the rectangle at `index` until it neither overlaps nor exactly
    // abuts another entry.
    fn absorb_overlaps(&mut self, mut index: usize) {
        let mut j = 0;
        while j < self.rects.len() {
            let grown = self.rects[index];
            let other = self.rects[j];
            if j != index && (other.intersects(&grown) || other.merge_waste(&grown) == 0) {
                self.rects.swap_remove(j);
                if index == self.rects.len() {
                    index = j;
                }
                self.rects[index] = grown.union(&other);
                j = 0;
            } else {
                j += 1;
            }
        }
    }
}
