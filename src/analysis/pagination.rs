use crate::models::goal::Goal;

/// Number of pages for `len` items; never less than one.
pub fn page_count(len: usize, page_size: usize) -> usize {
    len.div_ceil(page_size.max(1)).max(1)
}

/// Contiguous slice `[index*size, index*size + size)`, truncated at the end.
pub fn paginate(goals: &[Goal], page_size: usize, page_index: usize) -> &[Goal] {
    let size = page_size.max(1);
    let start = page_index.saturating_mul(size).min(goals.len());
    let end = start.saturating_add(size).min(goals.len());
    &goals[start..end]
}

/// Cyclic page cursor for the dashboard carousel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    pub page_size: usize,
    pub page_index: usize,
}

impl Pager {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            page_index: 0,
        }
    }

    pub fn page_count(&self, len: usize) -> usize {
        page_count(len, self.page_size)
    }

    pub fn next(&mut self, len: usize) -> usize {
        self.page_index = (self.page_index + 1) % self.page_count(len);
        self.page_index
    }

    pub fn prev(&mut self, len: usize) -> usize {
        let pages = self.page_count(len);
        self.page_index = (self.page_index % pages + pages - 1) % pages;
        self.page_index
    }

    /// Pulls the cursor back in range after the list shrank.
    pub fn clamp_to(&mut self, len: usize) {
        let pages = self.page_count(len);
        if self.page_index >= pages {
            self.page_index = pages - 1;
        }
    }

    pub fn slice<'a>(&self, goals: &'a [Goal]) -> &'a [Goal] {
        paginate(goals, self.page_size, self.page_index)
    }
}
