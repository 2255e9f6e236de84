/// Borrowed single-channel image, row-major, `data.len() == width * height`.
#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8],
}

/// Owned single-channel image, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImageView<'_> {
    /// Pixel at `(row, col)`; out-of-bounds reads are black.
    #[inline]
    pub fn get(&self, row: i32, col: i32) -> u8 {
        if row < 0 || col < 0 || row as usize >= self.height || col as usize >= self.width {
            return 0;
        }
        self.data
            .get(row as usize * self.width + col as usize)
            .copied()
            .unwrap_or(0)
    }

    #[inline]
    pub fn to_owned(&self) -> GrayImage {
        GrayImage {
            width: self.width,
            height: self.height,
            data: self.data.to_vec(),
        }
    }
}

impl GrayImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    #[inline]
    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    #[inline]
    pub fn get(&self, row: i32, col: i32) -> u8 {
        self.view().get(row, col)
    }

    /// Write a pixel; out-of-bounds writes are ignored.
    #[inline]
    pub fn set(&mut self, row: i32, col: i32, value: u8) {
        if row < 0 || col < 0 || row as usize >= self.height || col as usize >= self.width {
            return;
        }
        let idx = row as usize * self.width + col as usize;
        if let Some(px) = self.data.get_mut(idx) {
            *px = value;
        }
    }

    /// Paint the axis-aligned rectangle `[row0, row1) x [col0, col1)`.
    pub fn fill_rect(&mut self, row0: i32, row1: i32, col0: i32, col1: i32, value: u8) {
        for r in row0..row1 {
            for c in col0..col1 {
                self.set(r, c, value);
            }
        }
    }
}
