//! Per-table query functions executed inside the DB actor.

pub mod accounts;
pub mod chats;
pub mod messages;
pub mod users;
pub mod workbenches;

use toolkit_schema::Page;

use crate::db::models::{DbAccount, DbChat, DbWorkbench};

/// Rows that can serve as a pagination cursor.
pub trait Keyed {
    fn key(&self) -> &str;
}

impl Keyed for DbChat {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for DbWorkbench {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for DbAccount {
    fn key(&self) -> &str {
        &self.id
    }
}

/// Turns `limit + 1` fetched rows into a page. The extra row, when present,
/// becomes the next cursor and is not returned.
pub fn into_page<T: Keyed>(mut rows: Vec<T>, limit: u32) -> Page<T> {
    let limit = limit as usize;
    if rows.len() <= limit {
        return Page {
            items: rows,
            has_more: false,
            next_cursor: None,
        };
    }
    let rest = rows.split_off(limit);
    Page {
        items: rows,
        has_more: true,
        next_cursor: rest.first().map(|r| r.key().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Row(&'static str);

    impl Keyed for Row {
        fn key(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn extra_row_becomes_cursor() {
        let page = into_page(vec![Row("c"), Row("b"), Row("a")], 2);
        assert!(page.has_more);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.next_cursor.as_deref(), Some("a"));
    }

    #[test]
    fn short_result_is_last_page() {
        let page = into_page(vec![Row("b"), Row("a")], 2);
        assert!(!page.has_more);
        assert!(page.next_cursor.is_none());
        assert_eq!(page.items.len(), 2);
    }
}
