use crate::{filter_state::PAGE_PARAM, url_sync::set_param};

const FULL_RANGE_LIMIT: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageItem {
    Page(u32),
    Ellipsis,
}

/// Bounded page control: first page, a window around `current`, last page.
pub fn page_items(current: u32, total_pages: u32) -> Vec<PageItem> {
    if total_pages <= FULL_RANGE_LIMIT {
        return (1..=total_pages).map(PageItem::Page).collect();
    }

    let mut items = vec![PageItem::Page(1)];
    if current > 3 {
        items.push(PageItem::Ellipsis);
    }

    let window_start = current.saturating_sub(1).max(2);
    let window_end = current.saturating_add(1).min(total_pages - 1);
    items.extend((window_start..=window_end).map(PageItem::Page));

    if current < total_pages - 2 {
        items.push(PageItem::Ellipsis);
    }
    items.push(PageItem::Page(total_pages));
    items
}

/// Link target for page `page`, keeping every other parameter of `query`.
pub fn page_href(query: &str, page: u32) -> String {
    format!("?{}", set_param(query, PAGE_PARAM, &page.to_string()))
}
