//! Page splitting for listing views.
//!
//! Page numbers are 1-indexed. A missing or unparsable number means the first
//! page and out-of-range numbers clamp to the nearest valid page, so a listing
//! request never fails because of its `page` parameter.

use serde::Deserialize;

/// `?page=N` query string shared by every listing handler
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    per_page: u64,
}

/// The slice of a collection one page covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: u64,
    pub num_pages: u64,
    pub count: u64,
    pub offset: u64,
    pub limit: u64,
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u64,
    pub num_pages: u64,
    pub count: u64,
}

/// A numbered link in the page navigation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    pub number: u64,
    pub current: bool,
}

impl Paginator {
    pub fn new(per_page: u64) -> Self {
        Paginator {
            per_page: per_page.max(1),
        }
    }

    pub fn per_page(&self) -> u64 {
        self.per_page
    }

    /// An empty collection still has one (empty) page.
    pub fn num_pages(&self, count: u64) -> u64 {
        if count == 0 {
            1
        } else {
            count.div_ceil(self.per_page)
        }
    }

    pub fn window(&self, count: u64, requested: Option<&str>) -> PageWindow {
        let num_pages = self.num_pages(count);
        let number = clamp_page_number(requested, num_pages);
        let offset = (number - 1) * self.per_page;

        PageWindow {
            number,
            num_pages,
            count,
            offset,
            limit: self.per_page.min(count.saturating_sub(offset)),
        }
    }
}

fn clamp_page_number(requested: Option<&str>, num_pages: u64) -> u64 {
    let Some(raw) = requested.map(str::trim) else {
        return 1;
    };

    match raw.parse::<i64>() {
        Ok(n) if n < 1 => 1,
        Ok(n) => (n as u64).min(num_pages),
        // Still a page number, just past anything i64 holds
        Err(_) if is_unsigned_number(raw) => num_pages,
        Err(_) => 1,
    }
}

fn is_unsigned_number(raw: &str) -> bool {
    let digits = raw.strip_prefix('+').unwrap_or(raw);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, window: PageWindow) -> Self {
        Page {
            items,
            number: window.number,
            num_pages: window.num_pages,
            count: window.count,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_other_pages(&self) -> bool {
        self.has_next() || self.has_previous()
    }

    pub fn next_page_number(&self) -> u64 {
        (self.number + 1).min(self.num_pages)
    }

    pub fn previous_page_number(&self) -> u64 {
        self.number.saturating_sub(1).max(1)
    }

    pub fn links(&self) -> Vec<PageLink> {
        (1..=self.num_pages)
            .map(|number| PageLink {
                number,
                current: number == self.number,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_page_is_full() {
        let window = Paginator::new(10).window(13, None);
        assert_eq!(window.number, 1);
        assert_eq!(window.num_pages, 2);
        assert_eq!(window.offset, 0);
        assert_eq!(window.limit, 10);
    }

    #[test]
    fn test_last_page_holds_remainder() {
        let window = Paginator::new(10).window(13, Some("2"));
        assert_eq!(window.number, 2);
        assert_eq!(window.offset, 10);
        assert_eq!(window.limit, 3);
    }

    #[test]
    fn test_out_of_range_pages_clamp() {
        let paginator = Paginator::new(10);
        assert_eq!(paginator.window(13, Some("99")).number, 2);
        assert_eq!(paginator.window(13, Some("0")).number, 1);
        assert_eq!(paginator.window(13, Some("-4")).number, 1);
    }

    #[test]
    fn test_overflowing_page_numbers_clamp() {
        let paginator = Paginator::new(10);
        assert_eq!(paginator.window(13, Some("99999999999999999999")).number, 2);
        assert_eq!(paginator.window(13, Some("+99999999999999999999")).number, 2);
        assert_eq!(paginator.window(13, Some("-99999999999999999999")).number, 1);
        assert_eq!(paginator.window(13, Some("9999999999999999999x")).number, 1);
    }

    #[test]
    fn test_garbage_page_means_first() {
        let paginator = Paginator::new(10);
        assert_eq!(paginator.window(13, Some("last")).number, 1);
        assert_eq!(paginator.window(13, Some("")).number, 1);
    }

    #[test]
    fn test_empty_collection_has_one_page() {
        let window = Paginator::new(10).window(0, Some("3"));
        assert_eq!(window.number, 1);
        assert_eq!(window.num_pages, 1);
        assert_eq!(window.limit, 0);
    }

    #[test]
    fn test_exact_multiple() {
        let paginator = Paginator::new(10);
        assert_eq!(paginator.num_pages(20), 2);
        assert_eq!(paginator.window(20, Some("2")).limit, 10);
    }

    #[test]
    fn test_zero_page_size_is_bumped_to_one() {
        assert_eq!(Paginator::new(0).per_page(), 1);
    }

    #[test]
    fn test_page_navigation() {
        let window = Paginator::new(2).window(5, Some("2"));
        let page = Page::new(vec!["c", "d"], window);

        assert!(page.has_next());
        assert!(page.has_previous());
        assert!(page.has_other_pages());
        assert_eq!(page.next_page_number(), 3);
        assert_eq!(page.previous_page_number(), 1);
        assert_eq!(
            page.links(),
            vec![
                PageLink { number: 1, current: false },
                PageLink { number: 2, current: true },
                PageLink { number: 3, current: false },
            ]
        );
    }

    #[test]
    fn test_single_page_has_no_navigation() {
        let page = Page::new(vec![1], Paginator::new(10).window(1, None));
        assert!(!page.has_other_pages());
        assert_eq!(page.len(), 1);
    }
}
