/// Crawl phase definitions
///
/// A run moves through these phases once per listing page and ends in `Done`.
use std::fmt;

/// Represents the current phase of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    /// Run has started but no listing page has been requested yet
    Running,

    /// Fetching and parsing the listing page for the current page number
    Listing,

    /// Detail fetches for the current page's references are in flight
    Dispatching,

    /// Completed detail fetches are being turned into records
    Merging,

    /// Probing whether the next listing page has any entries
    PaginationCheck,

    /// Terminal phase; the collected records are flushed exactly once
    Done,
}

impl CrawlPhase {
    /// Returns true if no further transitions are allowed
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Checks whether moving from `self` to `next` is a legal step
    ///
    /// Every non-terminal phase may end the run. The per-page loop is
    /// `Listing -> Dispatching -> Merging -> PaginationCheck -> Listing`.
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        if self.is_terminal() {
            return false;
        }

        if next == Self::Done {
            return true;
        }

        matches!(
            (self, next),
            (Self::Running, Self::Listing)
                | (Self::Listing, Self::Dispatching)
                | (Self::Dispatching, Self::Merging)
                | (Self::Merging, Self::PaginationCheck)
                | (Self::PaginationCheck, Self::Listing)
        )
    }

    /// Returns a short lowercase label used in log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Listing => "listing",
            Self::Dispatching => "dispatching",
            Self::Merging => "merging",
            Self::PaginationCheck => "pagination_check",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a run reached `Done`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// The next listing page had no entries
    Exhausted,

    /// The current listing page failed to load or had no entries
    EmptyPage,

    /// The configured page ceiling was reached
    PageLimit,

    /// An external stop request was honoured
    StopRequested,

    /// An unexpected error ended the run
    Failed,
}

impl StopReason {
    /// Returns true for the reasons that count as a clean, complete run
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Exhausted | Self::EmptyPage | Self::PageLimit)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exhausted => "exhausted",
            Self::EmptyPage => "empty_page",
            Self::PageLimit => "page_limit",
            Self::StopRequested => "stop_requested",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
