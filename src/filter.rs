use crate::dataset::{FieldRoles, Row};

/// Transient view state. Only `hide_applied` is persisted, by the model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewState {
    pub query: String,
    pub hide_applied: bool,
}

pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

fn field_contains(row: &Row, idx: Option<usize>, needle: &str) -> bool {
    idx.and_then(|idx| row.get(idx))
        .map(|value| value.to_lowercase().contains(needle))
        .unwrap_or(false)
}

// `needle` is already normalized.
fn row_matches(row: &Row, roles: &FieldRoles, needle: &str) -> bool {
    field_contains(row, roles.company, needle) || field_contains(row, roles.title, needle)
}

/// Return the entries of `mask` (indices into `rows`) whose row matches
/// `query`. An empty query returns `mask` as is.
pub fn filter(rows: &[Row], mask: &[usize], roles: &FieldRoles, query: &str) -> Vec<usize> {
    let needle = normalize_query(query);
    if needle.is_empty() {
        return mask.to_vec();
    }
    mask.iter()
        .copied()
        .filter(|&idx| row_matches(&rows[idx], roles, &needle))
        .collect()
}

/// Drop the entries of `mask` whose link is marked applied. Rows without a
/// link are never hidden.
pub fn without_applied(
    rows: &[Row],
    mask: &[usize],
    roles: &FieldRoles,
    is_applied: impl Fn(&str) -> bool,
) -> Vec<usize> {
    mask.iter()
        .copied()
        .filter(|&idx| !rows[idx].link(roles).is_some_and(&is_applied))
        .collect()
}

/// Derive the visible row indices from scratch, in dataset order.
pub fn visible_rows(
    rows: &[Row],
    roles: &FieldRoles,
    view: &ViewState,
    is_applied: impl Fn(&str) -> bool,
) -> Vec<usize> {
    let all: Vec<usize> = (0..rows.len()).collect();
    let matching = filter(rows, &all, roles, &view.query);
    if view.hide_applied {
        without_applied(rows, &matching, roles, is_applied)
    } else {
        matching
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;

    fn jobs() -> Dataset {
        Dataset::load(
            "s_no,company,job_title,job_link\n\
             1,Acme,\"Senior, Eng\",http://a\n\
             2,Globex,Intern,http://b\n\
             3,Initech,Acme Liaison,http://c\n\
             4,Hooli\n\
             5,Umbrella,Engineer,http://e",
        )
    }

    fn all(ds: &Dataset) -> Vec<usize> {
        (0..ds.len()).collect()
    }

    #[test]
    fn empty_query_returns_everything_in_order() {
        let ds = jobs();
        for query in ["", "   ", "\t"] {
            assert_eq!(filter(ds.rows(), &all(&ds), ds.roles(), query), all(&ds));
        }
    }

    #[test]
    fn matches_company_or_title_ignoring_case() {
        let ds = jobs();
        assert_eq!(filter(ds.rows(), &all(&ds), ds.roles(), "ACME"), vec![0, 2]);
        assert_eq!(filter(ds.rows(), &all(&ds), ds.roles(), " eng "), vec![0, 4]);
        assert_eq!(filter(ds.rows(), &all(&ds), ds.roles(), "http"), Vec::<usize>::new());
    }

    #[test]
    fn filter_is_idempotent() {
        let ds = jobs();
        for query in ["a", "eng", "intern", "zzz", ""] {
            let once = filter(ds.rows(), &all(&ds), ds.roles(), query);
            let twice = filter(ds.rows(), &once, ds.roles(), query);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn short_rows_never_match_missing_fields() {
        let ds = jobs();
        // Row 3 has no title; "hooli" still matches its company.
        assert_eq!(filter(ds.rows(), &all(&ds), ds.roles(), "hooli"), vec![3]);
    }

    #[test]
    fn missing_columns_match_nothing() {
        let ds = Dataset::load("name,city\nAcme,Berlin");
        assert!(filter(ds.rows(), &all(&ds), ds.roles(), "acme").is_empty());
        assert_eq!(filter(ds.rows(), &all(&ds), ds.roles(), "  "), vec![0]);
    }

    #[test]
    fn header_order_does_not_matter() {
        let ds = Dataset::load("job_link,job_title,company\nhttp://a,Eng,Acme");
        assert_eq!(filter(ds.rows(), &all(&ds), ds.roles(), "acme"), vec![0]);
    }

    #[test]
    fn hide_applied_removes_exactly_applied_rows() {
        let ds = jobs();
        let applied = |link: &str| link == "http://a" || link == "http://e";
        let view = ViewState {
            query: String::new(),
            hide_applied: true,
        };
        assert_eq!(visible_rows(ds.rows(), ds.roles(), &view, applied), vec![1, 2, 3]);

        let view = ViewState {
            hide_applied: false,
            ..view
        };
        assert_eq!(visible_rows(ds.rows(), ds.roles(), &view, applied), all(&ds));
    }

    #[test]
    fn query_and_hide_compose() {
        let ds = jobs();
        let view = ViewState {
            query: "acme".into(),
            hide_applied: true,
        };
        let visible = visible_rows(ds.rows(), ds.roles(), &view, |link| link == "http://a");
        assert_eq!(visible, vec![2]);
    }
}
