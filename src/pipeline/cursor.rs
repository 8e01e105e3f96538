/// Position in the package list plus the furthest position reached.
///
/// The high-water mark never decreases. A package below it has already been
/// fully decided this run, so revisiting it may reuse that work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineCursor {
    index: usize,
    high_water: usize,
}

impl PipelineCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn high_water(&self) -> usize {
        self.high_water
    }

    /// The current package was already decided earlier in this run.
    pub fn is_revisit(&self) -> bool {
        self.index < self.high_water
    }

    pub fn advance(&mut self) {
        self.index += 1;
        self.high_water = self.high_water.max(self.index);
    }

    /// Step back one package. Stays put on the first one.
    pub fn back(&mut self) {
        self.index = self.index.saturating_sub(1);
    }

    pub fn is_done(&self, len: usize) -> bool {
        self.index >= len
    }
}
