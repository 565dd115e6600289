//! Pagination module
//!
//! Supports: next page links, next page tokens or numbers sent as a query
//! parameter, and plain page counting.
//!
//! # Overview
//!
//! A `Paginator` reads named values from every page (`next_page`,
//! `next_page_number`, `current_page` and any custom field), decides whether
//! there is a next page and builds its request. It stops when no next page is
//! found, when the next page would repeat the current one, when the
//! follow-count limit is reached or when stopped through a `StopHandle`.

mod paginator;
mod types;

pub use paginator::Paginator;
pub use types::{
    NextPage, NextPageHandler, PaginationContext, PaginationState, PaginatorPhase,
    PaginatorSettings, StopHandle, CURRENT_PAGE, CURRENT_PAGE_NUMBER, NEXT_PAGE,
    NEXT_PAGE_NUMBER,
};
