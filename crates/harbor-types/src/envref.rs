//! Resolution of `$NAME`-style environment variable references.
//!
//! Any configuration string beginning with `$` is treated as a reference to
//! the named environment variable rather than a literal value. The
//! reference is resolved once, at the point the value is first used; an
//! unset variable resolves to an empty string rather than an error.

/// Resolve `value` as an environment variable reference if it starts with
/// `$`, otherwise return it unchanged.
///
/// ```
/// use harbor_types::resolve_env_ref;
///
/// std::env::set_var("HARBOR_EXAMPLE_TOKEN", "secret123");
/// assert_eq!(resolve_env_ref("$HARBOR_EXAMPLE_TOKEN"), "secret123");
/// assert_eq!(resolve_env_ref("literal"), "literal");
/// assert_eq!(resolve_env_ref("$HARBOR_DOES_NOT_EXIST"), "");
/// ```
pub fn resolve_env_ref(value: &str) -> String {
    match value.strip_prefix('$') {
        Some(name) => std::env::var(name).unwrap_or_default(),
        None => value.to_string(),
    }
}

/// Same as [`resolve_env_ref`] but passes `None` through untouched and
/// resolves `Some("")` references to `None` rather than an empty string,
/// which is the behavior wanted for optional fields like `token`.
pub fn resolve_env_ref_opt(value: Option<&str>) -> Option<String> {
    let resolved = resolve_env_ref(value?);
    if resolved.is_empty() { None } else { Some(resolved) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn passes_through_literal_values() {
        assert_eq!(resolve_env_ref("plain-token"), "plain-token");
    }

    #[test]
    #[serial]
    fn resolves_set_variable() {
        unsafe {
            std::env::set_var("HARBOR_ENVREF_TEST_A", "value-a");
        }
        assert_eq!(resolve_env_ref("$HARBOR_ENVREF_TEST_A"), "value-a");
        unsafe {
            std::env::remove_var("HARBOR_ENVREF_TEST_A");
        }
    }

    #[test]
    #[serial]
    fn unset_variable_resolves_to_empty_string() {
        unsafe {
            std::env::remove_var("HARBOR_ENVREF_TEST_UNSET");
        }
        assert_eq!(resolve_env_ref("$HARBOR_ENVREF_TEST_UNSET"), "");
    }

    #[test]
    #[serial]
    fn opt_variant_turns_empty_into_none() {
        unsafe {
            std::env::remove_var("HARBOR_ENVREF_TEST_UNSET2");
        }
        assert_eq!(
            resolve_env_ref_opt(Some("$HARBOR_ENVREF_TEST_UNSET2")),
            None
        );
        assert_eq!(
            resolve_env_ref_opt(Some("literal")),
            Some("literal".to_string())
        );
        assert_eq!(resolve_env_ref_opt(None), None);
    }

    proptest::proptest! {
        #[test]
        fn literal_values_never_start_with_dollar_are_identity(s in "[a-zA-Z0-9_./-]{0,32}") {
            proptest::prop_assert_eq!(resolve_env_ref(&s), s);
        }
    }
}
