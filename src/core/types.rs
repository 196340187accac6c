// ============================================================================
// spark-bindables - Type Definitions
// Function types and construction options shared by every bindable
// ============================================================================

use std::str::FromStr;

// =============================================================================
// EQUALITY
// =============================================================================

/// Equality function type for comparing bindable values.
///
/// Used both for the "same value, nothing to do" check on writes and for the
/// post-fan-out settlement check.
pub type EqualsFn<T> = fn(&T, &T) -> bool;

/// Default equality using PartialEq
pub fn default_equals<T: PartialEq>(a: &T, b: &T) -> bool {
    a == b
}

// =============================================================================
// PARSING
// =============================================================================

/// Converts external text into a value. Returns `None` when the text is not
/// a valid representation.
pub type ParseFn<T> = fn(&str) -> Option<T>;

/// Parser for any `FromStr` type.
pub fn from_str_parser<T: FromStr>(text: &str) -> Option<T> {
    text.parse().ok()
}

/// Parser for boolean flags: any case of `true`/`false`, plus `1`/`0`.
pub fn parse_flag(text: &str) -> Option<bool> {
    match text.trim() {
        "1" => Some(true),
        "0" => Some(false),
        other if other.eq_ignore_ascii_case("true") => Some(true),
        other if other.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

// =============================================================================
// OPTIONS
// =============================================================================

/// Options for creating a bindable.
pub struct BindableOptions<T> {
    /// Value restored by `reset_to_default`.
    pub default: Option<T>,
    /// Start disabled.
    pub disabled: bool,
    /// Custom equality. Defaults to `PartialEq`.
    pub equals: Option<EqualsFn<T>>,
    /// Text parser used by `parse` and `parse_str`.
    pub parser: Option<ParseFn<T>>,
}

impl<T> Default for BindableOptions<T> {
    fn default() -> Self {
        Self {
            default: None,
            disabled: false,
            equals: None,
            parser: None,
        }
    }
}

impl<T> BindableOptions<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_value(mut self, value: T) -> Self {
        self.default = Some(value);
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn equals(mut self, equals: EqualsFn<T>) -> Self {
        self.equals = Some(equals);
        self
    }

    pub fn parser(mut self, parser: ParseFn<T>) -> Self {
        self.parser = Some(parser);
        self
    }
}
