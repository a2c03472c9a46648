use std::borrow::Cow;

/// Decode HTML character references in feed text.
///
/// Covers the full HTML5 named reference table (`&Oacute;`, `&hearts;`,
/// `&alpha;`, ...) plus decimal (`&#8217;`) and hex (`&#x2019;`) forms.
/// Unknown names are left exactly as written.
///
/// Returns `Cow::Borrowed` when the input contains no `&`.
///
/// ```
/// use gator::util::decode_entities;
///
/// assert_eq!(decode_entities("Tom &amp; Jerry"), "Tom & Jerry");
/// assert_eq!(decode_entities("it&#8217;s"), "it\u{2019}s");
/// assert_eq!(decode_entities("&bogus; stays"), "&bogus; stays");
/// ```
pub fn decode_entities(input: &str) -> Cow<'_, str> {
    if !input.contains('&') {
        return Cow::Borrowed(input);
    }
    html_escape::decode_html_entities(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_borrowed() {
        assert!(matches!(decode_entities("no references"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_basic_named_entities() {
        assert_eq!(
            decode_entities("&lt;p&gt;&quot;hi&quot; &amp; &apos;bye&apos;&lt;/p&gt;"),
            "<p>\"hi\" & 'bye'</p>"
        );
    }

    #[test]
    fn test_typographic_entities() {
        assert_eq!(
            decode_entities("Wait&hellip; &ldquo;Go&rdquo; &mdash; done"),
            "Wait\u{2026} \u{201c}Go\u{201d} \u{2014} done"
        );
        assert_eq!(decode_entities("a&nbsp;b"), "a\u{a0}b");
    }

    #[test]
    fn test_accented_and_non_latin_entities() {
        assert_eq!(
            decode_entities("&Oacute;scar &hearts; &alpha; &Ecirc;t&eacute; &oelig; &Iacute;"),
            "Óscar ♥ α Été œ Í"
        );
    }

    #[test]
    fn test_numeric_entities() {
        assert_eq!(decode_entities("&#65;&#x42;"), "AB");
        assert_eq!(decode_entities("&#128512;"), "\u{1F600}");
    }

    #[test]
    fn test_unknown_and_bare_ampersands_kept() {
        assert_eq!(decode_entities("&bogus; stays"), "&bogus; stays");
        assert_eq!(decode_entities("AT&T rocks"), "AT&T rocks");
        assert_eq!(decode_entities("trailing &"), "trailing &");
    }

    #[test]
    fn test_double_encoded_decodes_once() {
        assert_eq!(decode_entities("&amp;amp;"), "&amp;");
    }

    #[test]
    fn test_multibyte_text_preserved() {
        assert_eq!(decode_entities("café &amp; crème"), "café & crème");
    }
}
