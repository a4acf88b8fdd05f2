#[cfg(test)]
mod tests {
    use cask_core::{
        ConnectOptions, ConversionRegistry, DbError, DetectTypes, OpenMode, PARSE_COLNAMES,
        PARSE_DECLTYPES, PARSE_NONE,
    };
    use std::{sync::Arc, time::Duration};

    #[test]
    fn defaults() {
        let options = ConnectOptions::default();
        assert_eq!(options.database, ":memory:");
        assert_eq!(options.mode, None);
        assert_eq!(options.detect_types, PARSE_NONE);
        assert_eq!(options.isolation_level.as_deref(), Some(""));
        assert!(options.registry.is_none());
        assert_eq!(options.timeout, Duration::from_secs(5));
        let options: ConnectOptions = "data.sqlite".into();
        assert_eq!(options.database, "data.sqlite");
        assert_eq!(options.isolation_level.as_deref(), Some(""));
    }

    #[test]
    fn builder() {
        let registry = Arc::new(ConversionRegistry::new());
        let options = ConnectOptions::new("app.sqlite")
            .mode(OpenMode::ReadOnly)
            .detect_types(PARSE_DECLTYPES | PARSE_COLNAMES)
            .isolation_level(None)
            .registry(registry.clone())
            .timeout(Duration::from_millis(250));
        assert_eq!(options.timeout, Duration::from_millis(250));
        assert_eq!(options.mode, Some(OpenMode::ReadOnly));
        assert_eq!(options.detect_types.bits(), 3);
        assert_eq!(options.isolation_level, None);
        assert!(Arc::ptr_eq(options.registry.as_ref().unwrap(), &registry));
        assert!(format!("{:?}", options).contains("app.sqlite"));
    }

    #[test]
    fn detect_types_flags() {
        let both = PARSE_DECLTYPES | PARSE_COLNAMES;
        assert!(both.contains(PARSE_DECLTYPES));
        assert!(both.contains(PARSE_COLNAMES));
        assert!(!PARSE_DECLTYPES.contains(PARSE_COLNAMES));
        assert!(!both.contains(PARSE_NONE));
        assert_eq!(both & PARSE_COLNAMES, PARSE_COLNAMES);
        let mut flags = PARSE_NONE;
        flags |= PARSE_COLNAMES;
        assert_eq!(flags, DetectTypes::from_bits(2));
        assert_eq!(PARSE_NONE.bits(), 0);
        assert_eq!(PARSE_DECLTYPES.bits(), 1);
        assert_eq!(PARSE_COLNAMES.bits(), 2);
    }

    #[test]
    fn open_mode() {
        assert_eq!(OpenMode::default(), OpenMode::ReadWriteCreate);
        for mode in [
            OpenMode::ReadOnly,
            OpenMode::ReadWrite,
            OpenMode::ReadWriteCreate,
            OpenMode::Memory,
        ] {
            assert_eq!(OpenMode::parse(&mode.to_string()), Some(mode));
        }
        assert_eq!(OpenMode::parse("rwx"), None);
    }

    #[test]
    fn from_url() {
        let options = ConnectOptions::from_url("sqlite://:memory:").unwrap();
        assert_eq!(options.database, ":memory:");
        assert_eq!(options.mode, None);
        assert_eq!(options.isolation_level.as_deref(), Some(""));

        let options = ConnectOptions::from_url(
            "sqlite:///var/lib/my%20app/data.sqlite?mode=ro&detect_types=3&isolation_level=EXCLUSIVE",
        )
        .unwrap();
        assert_eq!(options.database, "/var/lib/my app/data.sqlite");
        assert_eq!(options.mode, Some(OpenMode::ReadOnly));
        assert_eq!(options.detect_types, PARSE_DECLTYPES | PARSE_COLNAMES);
        assert_eq!(options.isolation_level.as_deref(), Some("EXCLUSIVE"));

        let options = ConnectOptions::from_url(
            "sqlite://data.sqlite?detect_types=colnames&isolation_level=autocommit&mode=memory&timeout=1500",
        )
        .unwrap();
        assert_eq!(options.timeout, Duration::from_millis(1500));
        assert_eq!(options.database, "data.sqlite");
        assert_eq!(options.detect_types, PARSE_COLNAMES);
        assert_eq!(options.isolation_level, None);
        assert_eq!(options.mode, Some(OpenMode::Memory));

        let options =
            ConnectOptions::from_url("sqlite://data.sqlite?detect_types=none%7Cdecltypes").unwrap();
        assert_eq!(options.detect_types, PARSE_DECLTYPES);
    }

    #[test]
    fn from_url_errors() {
        for url in [
            "data.sqlite",
            "sqlite://data.sqlite?mode=everything",
            "sqlite://data.sqlite?detect_types=4",
            "sqlite://data.sqlite?detect_types=decltypes|rows",
            "sqlite://data.sqlite?timeout=soon",
            "sqlite://data.sqlite?timeout=-1",
            "sqlite://data.sqlite?cache=shared",
        ] {
            let error = ConnectOptions::from_url(url).unwrap_err();
            assert!(
                matches!(DbError::of(&error), Some(DbError::Connection(..))),
                "Unexpected error for {}: {:#}",
                url,
                error
            );
        }
    }
}
