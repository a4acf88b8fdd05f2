#[cfg(test)]
mod tests {
    use cask_core::{AsValue, Value, params};
    use std::{borrow::Cow, sync::Arc};

    #[test]
    fn value_none() {
        assert_eq!(Value::Null, Value::Null);
        assert_eq!(Value::default(), Value::Null);
        assert_ne!(Value::Real(1.0), Value::Null);
        assert!(Value::Null.is_null());
        assert_eq!(Value::Null.to_text(), None);
        assert_eq!(Option::<i32>::None.as_value(), Value::Null);
        assert_eq!(Option::<i32>::try_from_value(Value::Null).unwrap(), None);
    }

    #[test]
    fn value_bool() {
        let val: Value = true.into();
        assert_eq!(val, Value::Integer(1));
        assert_eq!(bool::try_from_value(val).unwrap(), true);
        assert_eq!(bool::try_from_value(Value::Integer(0)).unwrap(), false);
        assert_eq!(bool::try_from_value(Value::Integer(8)).unwrap(), true);
        assert!(bool::try_from_value(Value::Real(0.5)).is_err());
    }

    #[test]
    fn value_integers() {
        assert_eq!(Value::from(-5i8), Value::Integer(-5));
        assert_eq!(Value::from(300i16), Value::Integer(300));
        assert_eq!(Value::from(77u32), Value::Integer(77));
        assert_eq!(i8::try_from_value(Value::Integer(127)).unwrap(), 127);
        assert!(i8::try_from_value(Value::Integer(128)).is_err());
        assert!(u8::try_from_value(Value::Integer(-1)).is_err());
        assert_eq!(u32::try_from_value(Value::Integer(4_000_000_000)).unwrap(), 4_000_000_000);
        assert!(i32::try_from_value(Value::Text("1".into())).is_err());
        assert_eq!(Value::from(u64::MAX), Value::Text("18446744073709551615".into()));
        assert_eq!(Value::from(42u64), Value::Integer(42));
        assert_eq!(u64::try_from_value(Value::from(u64::MAX)).unwrap(), u64::MAX);
        assert!(u64::try_from_value(Value::Integer(-1)).is_err());
    }

    #[test]
    fn value_reals() {
        assert_eq!(Value::from(0.25f32), Value::Real(0.25));
        assert_eq!(f64::try_from_value(Value::Integer(3)).unwrap(), 3.0);
        assert_eq!(f32::try_from_value(Value::Real(1.5)).unwrap(), 1.5);
        assert!(f64::try_from_value(Value::Null).is_err());
        assert_eq!(Value::Real(1.5).to_text().as_deref(), Some("1.5"));
        assert_eq!(Value::Real(2.0).to_string(), "2.0");
    }

    #[test]
    fn value_text_and_blob() {
        assert_eq!(Value::from("hello"), Value::Text("hello".into()));
        assert_eq!(Value::from(String::from("hi")), Value::Text("hi".into()));
        assert_eq!(Value::from(Cow::Borrowed("cow")), Value::Text("cow".into()));
        assert_eq!(Value::from(Arc::<str>::from("arc")), Value::Text("arc".into()));
        assert_eq!(
            Arc::<str>::try_from_value(Value::Text("back".into())).unwrap(),
            Arc::from("back")
        );
        assert_eq!(Value::Text("text".into()).to_text().as_deref(), Some("text"));
        assert_eq!(Value::Integer(-12).to_text().as_deref(), Some("-12"));
        let blob = Value::from(vec![104u8, 105]);
        assert_eq!(blob, Value::Blob([104, 105].into()));
        assert_eq!(blob.to_text().as_deref(), Some("hi"));
        assert_eq!(Vec::<u8>::try_from_value(blob.clone()).unwrap(), [104, 105]);
        assert!(String::try_from_value(blob).is_err());
        assert_eq!(format!("{:?}", Value::Blob([0; 3].into())), "Blob(3)");
    }

    #[test]
    fn value_object() {
        #[derive(Debug, PartialEq)]
        struct Point(i32, i32);

        let a = Value::object(Point(1, 2));
        let b = a.clone();
        let c = Value::object(Point(1, 2));
        assert_eq!(a, b, "Clones share the allocation");
        assert_ne!(a, c, "Objects compare by identity");
        assert!(a.same_type(&c));
        assert!(!a.same_type(&Value::object(7u8)));
        assert!(Value::Integer(1).same_type(&Value::Integer(2)));
        assert!(!Value::Integer(1).same_type(&Value::Real(1.0)));
        assert_eq!(a.downcast_ref::<Point>(), Some(&Point(1, 2)));
        assert_eq!(a.downcast_ref::<u8>(), None);
        assert_eq!(Value::Integer(1).downcast_ref::<i64>(), None);
        assert!(a.kind().ends_with("Point"));
        assert!(format!("{:?}", a).starts_with("Object("));
    }

    #[test]
    fn params_macro() {
        let empty = params![];
        assert!(empty.is_empty());
        let values = params![1, "two", 3.0, Value::Null, Some(5i64), Option::<i64>::None];
        assert_eq!(
            values,
            [
                Value::Integer(1),
                Value::Text("two".into()),
                Value::Real(3.0),
                Value::Null,
                Value::Integer(5),
                Value::Null,
            ]
        );
    }
}
