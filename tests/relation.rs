use fanload::relation::{align_by_key, group_by_key};

#[derive(Debug, PartialEq, Eq, Clone)]
struct Row {
    parent: u32,
    label: &'static str,
}

fn row(parent: u32, label: &'static str) -> Row {
    Row { parent, label }
}

#[test]
fn align_fills_missing_slots_with_none() {
    let records = vec![row(3, "c"), row(1, "a")];
    let aligned = align_by_key(&[1, 2, 3], records, |r| r.parent);
    assert_eq!(aligned, vec![Some(row(1, "a")), None, Some(row(3, "c"))]);
}

#[test]
fn align_first_record_wins_on_duplicate_keys() {
    let records = vec![row(1, "first"), row(1, "second")];
    let aligned = align_by_key(&[1], records, |r| r.parent);
    assert_eq!(aligned, vec![Some(row(1, "first"))]);
}

#[test]
fn group_preserves_row_order_within_each_slot() {
    let rows = vec![row(2, "x"), row(1, "y"), row(2, "z")];
    let groups = group_by_key(&[1, 2], rows, |r| r.parent);
    assert_eq!(groups, vec![vec![row(1, "y")], vec![row(2, "x"), row(2, "z")]]);
}

#[test]
fn group_gives_childless_keys_an_empty_slot() {
    let rows = vec![row(1, "only")];
    let groups = group_by_key(&[1, 7], rows, |r| r.parent);
    assert_eq!(groups, vec![vec![row(1, "only")], vec![]]);
}

#[test]
fn group_drops_rows_for_unrequested_keys() {
    let rows = vec![row(1, "kept"), row(9, "dropped")];
    let groups = group_by_key(&[1], rows, |r| r.parent);
    assert_eq!(groups, vec![vec![row(1, "kept")]]);
}

#[test]
fn group_with_no_rows_is_all_empty() {
    let groups = group_by_key(&[4, 5, 6], Vec::<Row>::new(), |r| r.parent);
    assert_eq!(groups, vec![Vec::<Row>::new(), Vec::new(), Vec::new()]);
}
