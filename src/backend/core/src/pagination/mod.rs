//! Cursor-based pagination primitives.

pub mod cursor;

pub use cursor::EventCursor;

/// Page size when the caller does not supply a limit.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Hard cap on page size.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Smallest accepted page size.
pub const MIN_PAGE_SIZE: u32 = 1;
