//! Rows with their own identity inside an aggregate or a catalog table.

/// Something addressed by id rather than by value: a document line, a
/// warehouse, a ledger movement.
pub trait Entity {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;
}

/// First entity in `rows` with the given id.
pub fn find_by_id<'a, E: Entity>(rows: &'a [E], id: &E::Id) -> Option<&'a E> {
    rows.iter().find(|row| row.id() == id)
}

/// Whether any entity in `rows` carries the given id.
pub fn contains_id<E: Entity>(rows: &[E], id: &E::Id) -> bool {
    find_by_id(rows, id).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Line {
        id: u32,
        label: &'static str,
    }

    impl Entity for Line {
        type Id = u32;

        fn id(&self) -> &u32 {
            &self.id
        }
    }

    #[test]
    fn lookup_by_id() {
        let rows = [Line { id: 1, label: "resma" }, Line { id: 7, label: "toner" }];
        assert_eq!(find_by_id(&rows, &7).map(|l| l.label), Some("toner"));
        assert!(find_by_id(&rows, &3).is_none());
        assert!(contains_id(&rows, &1));
        assert!(!contains_id::<Line>(&[], &1));
    }
}
