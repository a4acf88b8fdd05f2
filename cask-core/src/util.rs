/// Longest prefix of `value` not exceeding `max` bytes, cut on a char boundary.
pub fn truncate_str(value: &str, max: usize) -> &str {
    if value.len() <= max {
        return value;
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

#[macro_export]
macro_rules! truncate_long {
    ($query:expr) => {
        format_args!(
            "{}{}",
            $crate::truncate_str(&$query, 497).trim_end(),
            if $query.len() > 497 { "..." } else { "" },
        )
    };
}

/// Logs the error and evaluates to it.
#[macro_export]
macro_rules! logged {
    ($error:expr) => {{
        let error: $crate::Error = $error;
        ::log::error!("{:#}", error);
        error
    }};
}
