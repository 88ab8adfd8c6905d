//! Page-number window for pagination controls.

/// Number of page buttons shown by default.
pub const DEFAULT_WINDOW_SIZE: u32 = 5;

/// Page numbers to display around `current`, in ascending order.
///
/// The window is centred on `current` where possible and shifted
/// inwards at either end so it always holds `min(window_size, total)`
/// pages. `current` is clamped into `1..=total` first. Returns an empty
/// list when there are no pages or the window size is zero.
pub fn visible_page_window(current: u32, total: u32, window_size: u32) -> Vec<u32> {
    if total == 0 || window_size == 0 {
        return Vec::new();
    }

    let size = window_size.min(total);
    let current = current.clamp(1, total);

    let half = size / 2;
    let max_start = total - size + 1;
    let start = current.saturating_sub(half).clamp(1, max_start);

    (start..start + size).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_when_no_pages() {
        assert!(visible_page_window(1, 0, 5).is_empty());
        assert!(visible_page_window(1, 10, 0).is_empty());
    }

    #[test]
    fn fewer_pages_than_window() {
        assert_eq!(visible_page_window(2, 3, 5), vec![1, 2, 3]);
    }

    #[test]
    fn centred_in_the_middle() {
        assert_eq!(visible_page_window(10, 20, 5), vec![8, 9, 10, 11, 12]);
    }

    #[test]
    fn pinned_at_the_start() {
        assert_eq!(visible_page_window(1, 20, 5), vec![1, 2, 3, 4, 5]);
        assert_eq!(visible_page_window(2, 20, 5), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn pinned_at_the_end() {
        assert_eq!(visible_page_window(20, 20, 5), vec![16, 17, 18, 19, 20]);
        assert_eq!(visible_page_window(19, 20, 5), vec![16, 17, 18, 19, 20]);
    }

    #[test]
    fn even_window_size() {
        assert_eq!(visible_page_window(5, 10, 4), vec![3, 4, 5, 6]);
    }

    #[test]
    fn out_of_range_current_is_clamped() {
        assert_eq!(visible_page_window(99, 7, 5), vec![3, 4, 5, 6, 7]);
        assert_eq!(visible_page_window(0, 7, 5), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn window_always_contains_current() {
        for total in 1..=12 {
            for current in 1..=total {
                let window = visible_page_window(current, total, DEFAULT_WINDOW_SIZE);
                assert!(window.contains(&current), "current={current} total={total}");
                assert_eq!(window.len() as u32, DEFAULT_WINDOW_SIZE.min(total));
            }
        }
    }
}
