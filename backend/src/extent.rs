#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn as_pair(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Distance between the origins of two neighbouring tiles of this extent.
    ///
    /// Saturates at zero for axes narrower than the overlap band; those axes hold a single tile.
    pub fn stride_with_overlap(&self, double_overlap: u32) -> Self {
        Self {
            width: self.width.saturating_sub(double_overlap),
            height: self.height.saturating_sub(double_overlap),
        }
    }

    pub fn scaled(&self, factor: u32) -> Self {
        Self {
            width: self.width * factor,
            height: self.height * factor,
        }
    }
}

impl std::fmt::Display for Extent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
