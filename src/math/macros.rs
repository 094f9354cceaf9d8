const MAX_EXPANSION_PASSES: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacroDefinition {
    pub template: &'static str,
    pub args: usize,
}

/// The macro sets authored content may rely on. Physics content uses the base
/// set; computer science content additionally gets boolean logic macros in
/// either mathematical or engineering notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MathMacroSet {
    #[default]
    Base,
    BooleanMaths,
    BooleanEngineering,
}

const BASE_MACROS: &[(&str, &str, usize)] = &[
    ("quantity", r"{#1}\,{\rm{#2}}", 2),
    ("valuedef", r"{#1}={\quantity{#2}{#3}}", 3),
    ("vtr", r"{\underline{\boldsymbol{#1}}}", 1),
    ("eqalign", r"\begin{aligned}#1\end{aligned}", 1),
    ("d", r"\mathrm{d}", 0),
    ("vari", "#1", 1),
    ("s", r"_{\sf{#1}}", 1),
    ("half", r"\frac{1}{2}", 0),
    ("third", r"\frac{1}{3}", 0),
    ("quarter", r"\frac{1}{4}", 0),
    ("eighth", r"\frac{1}{8}", 0),
    ("e", r"\textrm{e}", 0),
    ("units", r"\rm{#1}", 1),
    ("standardstate", "\u{29B5}", 0),
    ("N", r"\mathbb{N}", 0),
    ("Z", r"\mathbb{Z}", 0),
    ("Q", r"\mathbb{Q}", 0),
    ("R", r"\mathbb{R}", 0),
    ("C", r"\mathbb{C}", 0),
];

const BOOLEAN_MATHS_MACROS: &[(&str, &str, usize)] = &[
    ("true", r"\mathbf{T}", 0),
    ("false", r"\mathbf{F}", 0),
    ("and", r"{#1} \land {#2}", 2),
    ("or", r"{#1} \lor {#2}", 2),
    ("not", r"\lnot{#1}", 1),
    ("bracketnot", r"\lnot{(#1)}", 1),
    ("xor", r"{#1} \veebar {#2}", 2),
    ("equivalent", "=", 0),
    ("True", r"\mathbf{T}", 0),
    ("False", r"\mathbf{F}", 0),
    ("And", r"{#1} \land {#2}", 2),
    ("Or", r"{#1} \lor {#2}", 2),
    ("Not", r"\lnot{#1}", 1),
    ("BracketNot", r"\lnot{(#1)}", 1),
    ("Xor", r"{#1} \veebar {#2}", 2),
    ("Equivalent", "=", 0),
];

const BOOLEAN_ENGINEERING_MACROS: &[(&str, &str, usize)] = &[
    ("true", "1", 0),
    ("false", "0", 0),
    ("and", r"{#1} \cdot {#2}", 2),
    ("or", "{#1} + {#2}", 2),
    ("not", r"\overline{#1}", 1),
    ("bracketnot", r"\overline{#1}", 1),
    ("xor", r"{#1} \oplus {#2}", 2),
    ("equivalent", "=", 0),
    ("True", "1", 0),
    ("False", "0", 0),
    ("And", r"{#1} \cdot {#2}", 2),
    ("Or", "{#1} + {#2}", 2),
    ("Not", r"\overline{#1}", 1),
    ("BracketNot", r"\overline{#1}", 1),
    ("Xor", r"{#1} \oplus {#2}", 2),
    ("Equivalent", "=", 0),
];

impl MathMacroSet {
    pub fn lookup(self, name: &str) -> Option<MacroDefinition> {
        let extra: &[(&str, &str, usize)] = match self {
            Self::Base => &[],
            Self::BooleanMaths => BOOLEAN_MATHS_MACROS,
            Self::BooleanEngineering => BOOLEAN_ENGINEERING_MACROS,
        };
        extra
            .iter()
            .chain(BASE_MACROS)
            .find(|(macro_name, _, _)| *macro_name == name)
            .map(|&(_, template, args)| MacroDefinition { template, args })
    }

    /// Expands every macro of this set in `latex` until no more expansions
    /// apply. Macros whose arguments are missing are left untouched.
    pub fn expand(self, latex: &str) -> String {
        let mut current = latex.to_string();
        for _ in 0..MAX_EXPANSION_PASSES {
            let next = self.expand_once(&current);
            if next == current {
                return current;
            }
            current = next;
        }
        tracing::warn!(latex, "math macro expansion did not settle");
        current
    }

    fn expand_once(self, latex: &str) -> String {
        let mut output = String::with_capacity(latex.len());
        let mut idx = 0usize;

        while let Some(offset) = latex[idx..].find('\\') {
            let start = idx + offset;
            output.push_str(&latex[idx..start]);
            let name_end = control_word_end(latex, start + 1);
            if name_end == start + 1 {
                // Control symbol such as `\\` or `\{`; copy both characters.
                let symbol_len = latex[start + 1..].chars().next().map_or(0, char::len_utf8);
                output.push_str(&latex[start..start + 1 + symbol_len]);
                idx = start + 1 + symbol_len;
                continue;
            }

            let name = &latex[start + 1..name_end];
            let expansion = self.lookup(name).and_then(|definition| {
                read_arguments(latex, name_end, definition.args)
                    .map(|(args, end)| (substitute(definition.template, &args), end))
            });
            match expansion {
                Some((expanded, end)) => {
                    output.push('{');
                    output.push_str(&expanded);
                    output.push('}');
                    idx = end;
                }
                None => {
                    output.push_str(&latex[start..name_end]);
                    idx = name_end;
                }
            }
        }

        output.push_str(&latex[idx..]);
        output
    }
}

fn control_word_end(latex: &str, from: usize) -> usize {
    latex[from..]
        .char_indices()
        .find(|(_, c)| !c.is_ascii_alphabetic())
        .map_or(latex.len(), |(offset, _)| from + offset)
}

fn read_arguments(latex: &str, mut idx: usize, count: usize) -> Option<(Vec<&str>, usize)> {
    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        idx += latex[idx..].len() - latex[idx..].trim_start().len();
        let rest = &latex[idx..];
        let first = rest.chars().next()?;
        match first {
            '{' => {
                let close = matching_brace(rest)?;
                args.push(&rest[1..close]);
                idx += close + 1;
            }
            '\\' => {
                let end = control_word_end(latex, idx + 1);
                let end = if end == idx + 1 {
                    idx + 1 + rest[1..].chars().next().map_or(0, char::len_utf8)
                } else {
                    end
                };
                args.push(&latex[idx..end]);
                idx = end;
            }
            '}' => return None,
            other => {
                args.push(&rest[..other.len_utf8()]);
                idx += other.len_utf8();
            }
        }
    }
    Some((args, idx))
}

fn matching_brace(group: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut escaped = false;
    for (offset, c) in group.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(offset);
                }
            }
            _ => {}
        }
    }
    None
}

fn substitute(template: &str, args: &[&str]) -> String {
    let mut output = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '#'
            && let Some(digit) = chars.peek().and_then(|d| d.to_digit(10))
        {
            chars.next();
            if let Some(arg) = (digit as usize).checked_sub(1).and_then(|i| args.get(i)) {
                output.push_str(arg);
            }
            continue;
        }
        output.push(c);
    }
    output
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    #[test]
    fn expand__should_substitute_arguments() {
        // Given
        let latex = r"\quantity{3}{m}";

        // When
        let expanded = MathMacroSet::Base.expand(latex);

        // Then
        assert_eq!(expanded, r"{{3}\,{\rm{m}}}");
    }

    #[test]
    fn expand__should_expand_nested_macros() {
        // When
        let expanded = MathMacroSet::Base.expand(r"\valuedef{v}{3}{m}");

        // Then
        assert!(expanded.contains(r"\rm{m}"));
        assert!(!expanded.contains(r"\quantity"));
    }

    #[test]
    fn expand__should_not_touch_longer_control_words() {
        // \e is a macro but \eta is not
        assert_eq!(MathMacroSet::Base.expand(r"\eta + \e"), r"\eta + {\textrm{e}}");
    }

    #[test]
    fn expand__should_use_engineering_boolean_notation() {
        // When
        let maths = MathMacroSet::BooleanMaths.expand(r"\and{A}{B}");
        let engineering = MathMacroSet::BooleanEngineering.expand(r"\and{A}{B}");

        // Then
        assert!(maths.contains(r"\land"));
        assert!(engineering.contains(r"\cdot"));
    }

    #[test]
    fn expand__should_accept_single_token_arguments() {
        assert_eq!(MathMacroSet::Base.expand(r"\vari x"), "{x}");
    }

    #[test]
    fn expand__should_leave_macros_with_missing_arguments() {
        assert_eq!(MathMacroSet::Base.expand(r"\quantity{3}"), r"\quantity{3}");
    }

    #[test]
    fn lookup__should_not_find_boolean_macros_in_base_set() {
        assert!(MathMacroSet::Base.lookup("xor").is_none());
        assert!(MathMacroSet::BooleanMaths.lookup("xor").is_some());
    }
}
