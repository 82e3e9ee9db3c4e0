//! Text sanitization applied before chunking and embedding.
//!
//! Embedding models handle plain ASCII punctuation far better than math
//! notation or typographic variants, and control characters occasionally
//! make providers reject the whole request.

use unicode_normalization::UnicodeNormalization;

/// Normalize text for embedding.
///
/// Steps, in order:
/// 1. Line endings to `\n`
/// 2. Unicode NFKC (folds sub/superscripts, ligatures, full-width forms)
/// 3. Math symbols, Greek letters, arrows and typographic punctuation to
///    ASCII equivalents
/// 4. Non-printable characters to a space
/// 5. Collapse horizontal whitespace and trim each line
/// 6. Collapse 3+ newlines to two, trim the whole text
///
/// The function is idempotent.
pub fn sanitize_text(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let normalized: String = unified.nfkc().collect();

    let mut mapped = String::with_capacity(normalized.len());
    let mut after_mapped = false;
    for c in normalized.chars() {
        if after_mapped && is_combining_mark(c) {
            continue;
        }
        after_mapped = false;
        if let Some(replacement) = ascii_equivalent(c) {
            mapped.push_str(replacement);
            after_mapped = true;
        } else if c == '\n' || c == '\t' {
            mapped.push(c);
        } else if c.is_control() || is_invisible(c) {
            mapped.push(' ');
        } else {
            mapped.push(c);
        }
    }

    let mut out = String::with_capacity(mapped.len());
    let mut blank_run = 0usize;
    for line in mapped.split('\n') {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(&collapsed);
        out.push('\n');
    }

    out.trim().to_string()
}

fn is_combining_mark(c: char) -> bool {
    matches!(c, '\u{0300}'..='\u{036F}' | '\u{20D0}'..='\u{20FF}')
}

/// Format characters that render as nothing.
fn is_invisible(c: char) -> bool {
    matches!(
        c,
        '\u{00AD}'
            | '\u{200B}'..='\u{200F}'
            | '\u{2028}'..='\u{202E}'
            | '\u{2060}'..='\u{2064}'
            | '\u{FEFF}'
    )
}

fn ascii_equivalent(c: char) -> Option<&'static str> {
    let s = match c {
        // Greek lowercase
        'α' => "alpha",
        'β' => "beta",
        'γ' => "gamma",
        'δ' => "delta",
        'ε' => "epsilon",
        'ζ' => "zeta",
        'η' => "eta",
        'θ' => "theta",
        'ι' => "iota",
        'κ' => "kappa",
        'λ' => "lambda",
        'μ' => "mu",
        'ν' => "nu",
        'ξ' => "xi",
        'ο' => "omicron",
        'π' => "pi",
        'ρ' => "rho",
        'σ' | 'ς' => "sigma",
        'τ' => "tau",
        'υ' => "upsilon",
        'φ' => "phi",
        'χ' => "chi",
        'ψ' => "psi",
        'ω' => "omega",
        // Greek uppercase
        'Α' => "Alpha",
        'Β' => "Beta",
        'Γ' => "Gamma",
        'Δ' => "Delta",
        'Ε' => "Epsilon",
        'Ζ' => "Zeta",
        'Η' => "Eta",
        'Θ' => "Theta",
        'Ι' => "Iota",
        'Κ' => "Kappa",
        'Λ' => "Lambda",
        'Μ' => "Mu",
        'Ν' => "Nu",
        'Ξ' => "Xi",
        'Ο' => "Omicron",
        'Π' => "Pi",
        'Ρ' => "Rho",
        'Σ' => "Sigma",
        'Τ' => "Tau",
        'Υ' => "Upsilon",
        'Φ' => "Phi",
        'Χ' => "Chi",
        'Ψ' => "Psi",
        'Ω' => "Omega",
        // Math
        '≤' => "<=",
        '≥' => ">=",
        '≠' => "!=",
        '≈' => "~=",
        '≡' => "==",
        '±' => "+/-",
        '×' => "x",
        '÷' => "/",
        '·' | '⋅' => "*",
        '−' => "-",
        '∞' => "infinity",
        '√' => "sqrt",
        '∑' => "sum",
        '∏' => "prod",
        '∫' => "integral",
        '∂' => "d",
        '∇' => "nabla",
        '∈' => "in",
        '∉' => "not in",
        '∀' => "for all",
        '∃' => "exists",
        '∅' => "empty set",
        '∩' => "intersect",
        '∪' => "union",
        '°' => " degrees",
        // Arrows
        '→' => "->",
        '←' => "<-",
        '↔' => "<->",
        '⇒' => "=>",
        '⇐' => "<=",
        '⇔' => "<=>",
        '↑' => "^",
        '↓' => "v",
        // Typography
        '‘' | '’' | '‚' | '′' => "'",
        '“' | '”' | '„' | '″' => "\"",
        '–' | '—' | '‒' | '―' => "-",
        '•' | '◦' | '▪' => "*",
        '…' => "...",
        _ => return None,
    };
    Some(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_empty() {
        assert_eq!(sanitize_text(""), "");
        assert_eq!(sanitize_text("  \n\n  "), "");
    }

    #[test]
    fn test_sanitize_collapses_horizontal_whitespace() {
        assert_eq!(sanitize_text("buy   milk \t and  eggs"), "buy milk and eggs");
    }

    #[test]
    fn test_sanitize_collapses_blank_lines() {
        assert_eq!(sanitize_text("one\n\n\n\ntwo"), "one\n\ntwo");
        assert_eq!(sanitize_text("one\n\ntwo"), "one\n\ntwo");
        assert_eq!(sanitize_text("one\n  \n \t\n\ntwo"), "one\n\ntwo");
    }

    #[test]
    fn test_sanitize_windows_line_endings() {
        assert_eq!(sanitize_text("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_sanitize_math_symbols() {
        assert_eq!(sanitize_text("x ≤ 5 and y ≥ 3"), "x <= 5 and y >= 3");
        assert_eq!(sanitize_text("a ≠ b ± c"), "a != b +/- c");
        assert_eq!(sanitize_text("∑ over ∞"), "sum over infinity");
    }

    #[test]
    fn test_sanitize_greek_letters() {
        assert_eq!(sanitize_text("α + β = γ"), "alpha + beta = gamma");
        assert_eq!(sanitize_text("Ω"), "Omega");
    }

    #[test]
    fn test_sanitize_arrows() {
        assert_eq!(sanitize_text("a → b ⇒ c"), "a -> b => c");
    }

    #[test]
    fn test_sanitize_superscripts_via_nfkc() {
        assert_eq!(sanitize_text("x² + y³"), "x2 + y3");
        assert_eq!(sanitize_text("H₂O"), "H2O");
    }

    #[test]
    fn test_sanitize_ligatures_and_fullwidth() {
        assert_eq!(sanitize_text("ﬁle"), "file");
        assert_eq!(sanitize_text("ＡＢＣ"), "ABC");
    }

    #[test]
    fn test_sanitize_smart_punctuation() {
        assert_eq!(sanitize_text("“quoted” – it’s…"), "\"quoted\" - it's...");
    }

    #[test]
    fn test_sanitize_control_characters_become_space() {
        assert_eq!(sanitize_text("a\u{0007}b"), "a b");
        assert_eq!(sanitize_text("zero\u{200B}width"), "zero width");
        assert_eq!(sanitize_text("\u{FEFF}bom"), "bom");
    }

    #[test]
    fn test_sanitize_keeps_accented_letters() {
        assert_eq!(sanitize_text("café résumé"), "café résumé");
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let inputs = [
            "  Hello\r\n\r\n\r\nWorld  ",
            "x² ≤ ∞ → α\u{0007}",
            "“Smart” quotes — and\u{200B}dashes…",
            "tabs\t\tand   spaces\n\n\n\n\nend",
            "ﬁnal ＡＢＣ ½",
        ];
        for input in inputs {
            let once = sanitize_text(input);
            assert_eq!(sanitize_text(&once), once, "not idempotent for {:?}", input);
        }
    }
}
