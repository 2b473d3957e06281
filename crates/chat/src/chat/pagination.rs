use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ideasense_client::DEFAULT_PAGE_SIZE;

use super::store::LoadMode;

pub const PAGE_SIZE: usize = DEFAULT_PAGE_SIZE;

/// Bumped on every reset and on close; results carrying an older value are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadGeneration(pub u64);

/// Identity of one page fetch, checked again when its result lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTarget {
    pub generation: LoadGeneration,
    pub mode: LoadMode,
    pub page: usize,
}

/// Why a load trigger was dropped without fetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSkip {
    NoProject,
    InFlight,
    NoMorePages,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded {
        mode: LoadMode,
        page: usize,
        item_count: usize,
        has_more: bool,
    },
    Skipped(LoadSkip),
    /// The fetch failed; buffer, page and `has_more` are untouched.
    Failed,
    /// The view was reset or closed while the fetch was in flight.
    Discarded,
}

impl LoadOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded { .. })
    }
}

/// Cursor over newest-first pages of one conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationState {
    page: usize,
    has_more: bool,
    booting: bool,
    generation: LoadGeneration,
}

impl PaginationState {
    pub fn new() -> Self {
        Self {
            page: 0,
            has_more: true,
            booting: true,
            generation: LoadGeneration(0),
        }
    }

    /// Number of pages merged into the buffer so far.
    pub fn page(&self) -> usize {
        self.page
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_booting(&self) -> bool {
        self.booting
    }

    pub fn generation(&self) -> LoadGeneration {
        self.generation
    }

    /// The first page failed to land; the next load trigger fetches it again.
    pub fn awaits_first_page(&self) -> bool {
        self.page == 0 && self.has_more && !self.booting
    }

    /// Whether the "load previous" control applies to the current state.
    pub fn offers_older(&self) -> bool {
        self.has_more && (self.page > 0 || !self.booting)
    }

    /// Starts over at page 1. The booting flag stays up until the fetch settles.
    pub fn begin_reset(&mut self) -> LoadTarget {
        self.generation = LoadGeneration(self.generation.0.saturating_add(1));
        self.page = 0;
        self.has_more = true;
        self.booting = true;
        LoadTarget {
            generation: self.generation,
            mode: LoadMode::Reset,
            page: 1,
        }
    }

    pub fn begin_prepend(&mut self) -> Result<LoadTarget, LoadSkip> {
        if !self.has_more || self.page == 0 {
            return Err(LoadSkip::NoMorePages);
        }
        Ok(LoadTarget {
            generation: self.generation,
            mode: LoadMode::Prepend,
            page: self.page + 1,
        })
    }

    pub fn accepts(&self, target: LoadTarget) -> bool {
        self.generation == target.generation
    }

    pub fn complete(&mut self, target: LoadTarget, has_more: bool) {
        self.page = target.page;
        self.has_more = has_more;
        if target.mode == LoadMode::Reset {
            self.booting = false;
        }
    }

    pub fn fail(&mut self, target: LoadTarget) {
        if target.mode == LoadMode::Reset {
            self.booting = false;
        }
    }

    /// State for a view without a project: nothing to load, nothing booting.
    pub fn clear(&mut self) {
        self.generation = LoadGeneration(self.generation.0.saturating_add(1));
        self.page = 0;
        self.has_more = false;
        self.booting = false;
    }

    pub fn invalidate(&mut self) {
        self.generation = LoadGeneration(self.generation.0.saturating_add(1));
    }
}

impl Default for PaginationState {
    fn default() -> Self {
        Self::new()
    }
}

/// Single-flight flag for page fetches of one view.
#[derive(Debug, Clone, Default)]
pub struct LoadingFlag(Arc<AtomicBool>);

impl LoadingFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loading(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Returns `None` when another fetch already holds the flag.
    pub fn try_acquire(&self) -> Option<LoadingGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| LoadingGuard {
                flag: self.0.clone(),
            })
    }
}

/// Clears the loading flag when dropped, whether the fetch succeeded, failed
/// or its future was abandoned.
#[derive(Debug)]
pub struct LoadingGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
