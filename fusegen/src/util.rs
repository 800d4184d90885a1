// Licensed under the Apache-2.0 license

//! Name sanitization helpers.

/// Characters replaced with underscores when sanitizing fuse names.
const PUNCTUATION: &str = " /-():[]#.";

/// Sanitize a raw catalog name into an identifier-safe form.
///
/// Replaces the fixed punctuation set with underscores and prefixes an
/// underscore when the name starts with a digit, so the result can be used
/// as an identifier elsewhere.
///
/// # Examples
/// ```
/// use fusegen::util::sanitize_name;
/// assert_eq!(sanitize_name("soc/ip fuse[3]"), "soc_ip_fuse_3_");
/// assert_eq!(sanitize_name("3d_mode"), "_3d_mode");
/// ```
pub fn sanitize_name(name: &str) -> String {
    let mut result: String = name
        .chars()
        .map(|c| if PUNCTUATION.contains(c) { '_' } else { c })
        .collect();
    if result.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        result.insert(0, '_');
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("plain_name"), "plain_name");
        assert_eq!(sanitize_name("a/b-c(d)"), "a_b_c_d_");
        assert_eq!(sanitize_name("x[0].y#z"), "x_0__y_z");
        assert_eq!(sanitize_name("with space"), "with_space");
    }

    #[test]
    fn test_sanitize_leading_digit() {
        assert_eq!(sanitize_name("0fuse"), "_0fuse");
        assert_eq!(sanitize_name("fuse0"), "fuse0");
    }
}
