/// Turns a raw override string into a strict boolean, or `None` when no
/// usable override is present. Unrecognized non-empty values are logged and
/// treated as unset rather than failing the evaluation.
pub fn coerce_flag_value(raw: Option<&str>) -> Option<bool> {
    let value = raw?.trim().to_ascii_lowercase();
    match value.as_str() {
        "true" | "1" | "yes" | "on" | "enabled" | "enable" => Some(true),
        "false" | "0" | "no" | "off" | "disabled" | "disable" => Some(false),
        "" => None,
        other => {
            tracing::warn!(value = other, "unrecognized override value, treating as unset");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::plain_true("true", Some(true))]
    #[case::one("1", Some(true))]
    #[case::yes("yes", Some(true))]
    #[case::on("on", Some(true))]
    #[case::enabled("enabled", Some(true))]
    #[case::enable("enable", Some(true))]
    #[case::plain_false("false", Some(false))]
    #[case::zero("0", Some(false))]
    #[case::no("no", Some(false))]
    #[case::off("off", Some(false))]
    #[case::disabled("disabled", Some(false))]
    #[case::disable("disable", Some(false))]
    #[case::mixed_case("TrUe", Some(true))]
    #[case::padded("  on  ", Some(true))]
    #[case::empty("", None)]
    #[case::whitespace_only("   ", None)]
    #[case::unrecognized("maybe", None)]
    #[case::numeric_other("2", None)]
    fn test_coerce_flag_value(#[case] raw: &str, #[case] expected: Option<bool>) {
        assert_eq!(coerce_flag_value(Some(raw)), expected);
    }

    #[test]
    fn test_absent_value_is_unset() {
        assert_eq!(coerce_flag_value(None), None);
    }
}
