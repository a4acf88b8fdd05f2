#[cfg(test)]
mod tests {
    use cask_core::{Column, Row, Value};

    fn column(name: &str, value: Value) -> Column {
        Column {
            name: name.into(),
            decltype: None,
            annotation: None,
            value,
        }
    }

    fn row() -> Row {
        Row::new(vec![
            column("id", Value::Integer(1)),
            column("name", Value::Text("first".into())),
            column("score", Value::Real(9.5)),
            column("name", Value::Text("shadowed".into())),
        ])
    }

    #[test]
    fn row_access() {
        let row = row();
        assert_eq!(row.len(), 4);
        assert!(!row.is_empty());
        assert_eq!(row[0], Value::Integer(1));
        assert_eq!(row["id"], row[0]);
        assert_eq!(row["name"], Value::Text("shadowed".into()), "Last match wins");
        assert_eq!(row.get(1), Some(&Value::Text("first".into())));
        assert_eq!(row.get(3), Some(&Value::Text("shadowed".into())));
        assert_eq!(row.get(4), None);
        assert_eq!(row.get_column("missing"), None);
        assert_eq!(
            row.names().collect::<Vec<_>>(),
            ["id", "name", "score", "name"]
        );
        assert_eq!(Vec::<Value>::from(row.clone()), row.to_vec());
    }

    #[test]
    #[should_panic]
    fn row_index_out_of_bounds() {
        let _ = &row()[4];
    }

    #[test]
    #[should_panic]
    fn row_index_missing_name() {
        let _ = &row()["missing"];
    }

    #[test]
    fn row_slice() {
        let row = row();
        let slice = row.slice(1..3).expect("Could not slice");
        assert_eq!(slice.len(), 2);
        assert_eq!(slice[0], Value::Text("first".into()));
        assert_eq!(slice["score"], Value::Real(9.5));
        assert_eq!(slice.get_column("id"), None);
        let nested = slice.slice(1..2).expect("Could not slice a slice");
        assert_eq!(nested.to_vec(), [Value::Real(9.5)]);
        let empty = row.slice(2..2).expect("An empty range is valid");
        assert!(empty.is_empty());
        assert!(row.slice(3..5).is_err());
        assert!(slice.slice(0..3).is_err());
        assert_eq!(row.slice(0..4).expect("Could not slice"), row);
        assert_ne!(slice, row);
    }
}
