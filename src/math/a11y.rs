//! Plain-text rendering of LaTeX formulas for screen readers.
//!
//! `\frac{a}{b}` is read as "start fraction, a, divided by, b, end fraction";
//! `f(x) = x^2` as "f, left bracket, x, right bracket, equals, x, squared".
//! The comma-separated form gives screen readers natural pauses.

use thiserror::Error;

use crate::portals::drop_zones::DROP_ZONE_TOKEN;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum A11yError {
    #[error("unbalanced braces")]
    Unbalanced,
    #[error("missing argument for {0}")]
    MissingArgument(String),
    #[error("unexpected {0}")]
    Unexpected(String),
    #[error("environment {0} cannot be read aloud")]
    Environment(String),
    #[error("unknown command {0}")]
    UnknownCommand(String),
}

type Result<T> = std::result::Result<T, A11yError>;

const STRING_MAP: &[(&str, &str)] = &[
    ("(", "left bracket"),
    (")", "right bracket"),
    ("[", "open square bracket"),
    ("]", "close square bracket"),
    (r"\{", "left curly bracket"),
    (r"\}", "right curly bracket"),
    (r"\lbrace", "left curly bracket"),
    (r"\rbrace", "right curly bracket"),
    (r"\lvert", "open vertical bar"),
    (r"\rvert", "close vertical bar"),
    ("|", "vertical bar"),
    (r"\vert", "vertical bar"),
    (r"\uparrow", "up arrow"),
    (r"\Uparrow", "up arrow"),
    (r"\downarrow", "down arrow"),
    (r"\Downarrow", "down arrow"),
    (r"\updownarrow", "up down arrow"),
    (r"\leftarrow", "left arrow"),
    (r"\Leftarrow", "left arrow"),
    (r"\rightarrow", "right arrow"),
    (r"\Rightarrow", "right arrow"),
    (r"\langle", "open angle bracket"),
    (r"\rangle", "close angle bracket"),
    (r"\lfloor", "open floor"),
    (r"\rfloor", "close floor"),
    (r"\int", "integral"),
    (r"\intop", "integral"),
    (r"\lim", "limit"),
    (r"\ln", "natural log"),
    (r"\log", "log"),
    (r"\sin", "sine"),
    (r"\cos", "cosine"),
    (r"\tan", "tangent"),
    (r"\cot", "cotangent"),
    (r"\sum", "sum"),
    ("/", "slash"),
    (",", "comma"),
    (".", "point"),
    ("-", "negative"),
    ("+", "plus"),
    ("~", "tilde"),
    (":", "colon"),
    ("?", "question mark"),
    ("'", "apostrophe"),
    (r"\#", "hash symbol"),
    (r"\%", "percent"),
    (" ", "space"),
    (r"\ ", "space"),
    (r"\$", "dollar sign"),
    (r"\angle", "angle"),
    (r"\degree", "degree"),
    (r"\circ", "circle"),
    (r"\vec", "vector"),
    (r"\triangle", "triangle"),
    (r"\pi", "pi"),
    (r"\prime", "prime"),
    (r"\infty", "infinity"),
    (r"\alpha", "alpha"),
    (r"\beta", "beta"),
    (r"\gamma", "gamma"),
    (r"\omega", "omega"),
    (r"\theta", "theta"),
    (r"\sigma", "sigma"),
    (r"\lambda", "lambda"),
    (r"\tau", "tau"),
    (r"\Delta", "delta"),
    (r"\delta", "delta"),
    (r"\mu", "mu"),
    (r"\rho", "rho"),
    (r"\nabla", "del"),
    (r"\ell", "ell"),
    (r"\ldots", "dots"),
    (r"\cdots", "dots"),
    (r"\lnot", "not"),
    (r"\emptyset", "empty set"),
    (r"\hat", "hat"),
    (r"\acute", "acute"),
];

const POWER_MAP: &[(&str, &str)] = &[
    ("prime", "prime"),
    ("degree", "degrees"),
    ("circle", "degrees"),
    ("2", "squared"),
    ("3", "cubed"),
];

const OPEN_MAP: &[(&str, &str)] = &[("|", "open vertical bar"), (".", "")];

const CLOSE_MAP: &[(&str, &str)] = &[("|", "close vertical bar"), (".", "")];

const BIN_MAP: &[(&str, &str)] = &[
    ("+", "plus"),
    ("-", "minus"),
    (r"\pm", "plus or minus"),
    (r"\cdot", "dot"),
    ("*", "times"),
    (r"\times", "times"),
    (r"\div", "divided by"),
    (r"\circ", "circle"),
    (r"\bullet", "bullet"),
    (r"\land", "and"),
    (r"\lor", "or"),
    (r"\veebar", "xor"),
    (r"\oplus", "xor"),
    (r"\cup", "union"),
    (r"\cap", "intersection"),
    (r"\setminus", "difference"),
];

const REL_MAP: &[(&str, &str)] = &[
    ("=", "equals"),
    (r"\approx", "approximately equals"),
    (r"\neq", "is not equal to"),
    (r"\ne", "is not equal to"),
    (r"\geq", "is greater than or equal to"),
    (r"\ge", "is greater than or equal to"),
    (r"\leq", "is less than or equal to"),
    (r"\le", "is less than or equal to"),
    (">", "is greater than"),
    ("<", "is less than"),
    (r"\leftarrow", "left arrow"),
    (r"\Leftarrow", "left arrow"),
    (r"\rightarrow", "right arrow"),
    (r"\Rightarrow", "right arrow"),
    (r"\to", "right arrow"),
    (":", "colon"),
    (r"\in", "in"),
    (r"\notin", "not in"),
    (r"\subset", "proper subset of"),
    (r"\subseteq", "subset of"),
    (r"\supset", "proper superset of"),
    (r"\supseteq", "superset of"),
    (r"\equiv", "is equivalent to"),
    (r"\propto", "is proportional to"),
    (r"\sim", "is similar to"),
];

const DENOMINATOR_MAP: &[(&str, &str)] = &[
    ("2", "half"),
    ("3", "third"),
    ("4", "quarter"),
    ("5", "fifth"),
    ("6", "sixth"),
    ("7", "seventh"),
    ("8", "eighth"),
    ("9", "ninth"),
    ("10", "tenth"),
    ("100", "hundredth"),
];

const ARROW_MAP: &[(&str, &str)] = &[
    (r"\xleftarrow", "arrow left"),
    (r"\xrightarrow", "arrow right"),
    (r"\xLeftarrow", "arrow left"),
    (r"\xRightarrow", "arrow right"),
    (r"\xleftrightarrow", "arrow left and right"),
    (r"\xLeftrightarrow", "arrow left and right"),
    (r"\xmapsto", "maps to"),
    (r"\xrightleftarrows", "arrow left and right"),
];

const OPEN_WORDS: &[&str] = &[r"\langle", r"\lfloor", r"\lceil", r"\lvert", r"\lbrace"];

const CLOSE_WORDS: &[&str] = &[r"\rangle", r"\rfloor", r"\rceil", r"\rvert", r"\rbrace"];

const OPERATORS: &[&str] = &[
    r"\sum", r"\prod", r"\int", r"\iint", r"\oint", r"\intop", r"\lim", r"\log", r"\ln",
    r"\exp", r"\sin", r"\cos", r"\tan", r"\cot", r"\sec", r"\csc", r"\sinh", r"\cosh",
    r"\tanh", r"\arcsin", r"\arccos", r"\arctan", r"\max", r"\min", r"\det",
];

const ORDINARY_WORDS: &[&str] = &[
    r"\alpha", r"\beta", r"\gamma", r"\delta", r"\epsilon", r"\varepsilon", r"\zeta", r"\eta",
    r"\theta", r"\vartheta", r"\iota", r"\kappa", r"\lambda", r"\mu", r"\nu", r"\xi", r"\pi",
    r"\rho", r"\sigma", r"\tau", r"\upsilon", r"\phi", r"\varphi", r"\chi", r"\psi", r"\omega",
    r"\Gamma", r"\Delta", r"\Theta", r"\Lambda", r"\Xi", r"\Pi", r"\Sigma", r"\Phi", r"\Psi",
    r"\Omega", r"\infty", r"\prime", r"\degree", r"\angle", r"\triangle", r"\nabla", r"\ell",
    r"\ldots", r"\cdots", r"\dots", r"\lnot", r"\neg", r"\emptyset", r"\partial", r"\hbar",
    r"\forall", r"\exists", r"\vert", r"\uparrow", r"\Uparrow", r"\downarrow", r"\Downarrow",
    r"\updownarrow",
];

const ACCENTS: &[&str] = &[
    r"\hat", r"\widehat", r"\bar", r"\vec", r"\dot", r"\ddot", r"\tilde", r"\widetilde",
    r"\acute", r"\grave", r"\breve", r"\check",
];

const FONTS: &[&str] = &[
    r"\mathrm", r"\mathbf", r"\mathit", r"\mathbb", r"\mathcal", r"\mathsf", r"\mathtt",
    r"\mathfrak", r"\boldsymbol", r"\bm", r"\operatorname", r"\mathop", r"\mathbin",
    r"\mathrel", r"\mathord", r"\smash", r"\mathstrut",
];

const IGNORED: &[&str] = &[
    r"\,", r"\;", r"\:", r"\!", r"\quad", r"\qquad", r"\displaystyle", r"\textstyle",
    r"\scriptstyle", r"\rm", r"\sf", r"\bf", r"\it", r"\limits", r"\nolimits", r"\relax",
];

fn lookup(map: &[(&str, &'static str)], key: &str) -> Option<&'static str> {
    map.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Ord,
    Bin,
    Rel,
    Open,
    Close,
    Punct,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Symbol(String, Family),
    Group(Vec<Node>),
    Op(String),
    Frac {
        numer: Box<Node>,
        denom: Box<Node>,
        bar: bool,
    },
    Sqrt {
        index: Option<Box<Node>>,
        body: Box<Node>,
    },
    SupSub {
        base: Option<Box<Node>>,
        sub: Option<Box<Node>>,
        sup: Option<Box<Node>>,
    },
    Text {
        modifier: Option<&'static str>,
        body: String,
    },
    Accent {
        label: String,
        base: Box<Node>,
    },
    Wrapped {
        label: String,
        body: Box<Node>,
    },
    LeftRight {
        left: String,
        right: String,
        body: Vec<Node>,
    },
    Arrow(String),
    Space,
    Phantom,
    Newline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    End,
    Brace,
    Bracket,
    Right,
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn at_command(&self, name: &str) -> bool {
        let rest = &self.src[self.pos..];
        rest.starts_with(name)
            && !rest[name.len()..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic())
    }

    fn parse_list(&mut self, stop: Stop) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None if stop == Stop::End => return Ok(nodes),
                None => return Err(A11yError::Unbalanced),
                Some('}') if stop == Stop::Brace => {
                    self.bump();
                    return Ok(nodes);
                }
                Some('}') => return Err(A11yError::Unbalanced),
                Some(']') if stop == Stop::Bracket => {
                    self.bump();
                    return Ok(nodes);
                }
                Some('\\') if stop == Stop::Right && self.at_command(r"\right") => {
                    return Ok(nodes);
                }
                Some(c @ ('^' | '_')) => {
                    self.bump();
                    let script = self.parse_argument(&c.to_string())?;
                    attach_script(&mut nodes, c, script)?;
                }
                Some('\'') => {
                    self.bump();
                    let prime = Node::Symbol(r"\prime".to_string(), Family::Ord);
                    attach_script(&mut nodes, '^', prime)?;
                }
                Some(_) => {
                    if let Some(node) = self.parse_atom()? {
                        nodes.push(node);
                    }
                }
            }
        }
    }

    fn parse_atom(&mut self) -> Result<Option<Node>> {
        let Some(c) = self.bump() else {
            return Ok(None);
        };
        let node = match c {
            '{' => Node::Group(self.parse_list(Stop::Brace)?),
            '\\' => return self.parse_command(),
            '&' => return Err(A11yError::Unexpected("&".to_string())),
            '~' => Node::Space,
            c => Node::Symbol(c.to_string(), char_family(c)),
        };
        Ok(Some(node))
    }

    fn parse_argument(&mut self, command: &str) -> Result<Node> {
        self.skip_whitespace();
        match self.peek() {
            None | Some('}') => Err(A11yError::MissingArgument(command.to_string())),
            Some('{') => {
                self.bump();
                Ok(Node::Group(self.parse_list(Stop::Brace)?))
            }
            Some(_) => Ok(self.parse_atom()?.unwrap_or(Node::Group(Vec::new()))),
        }
    }

    fn parse_optional(&mut self) -> Result<Option<Node>> {
        self.skip_whitespace();
        if self.peek() != Some('[') {
            return Ok(None);
        }
        self.bump();
        Ok(Some(Node::Group(self.parse_list(Stop::Bracket)?)))
    }

    /// Reads a braced argument verbatim, as `\text` and `\begin` need.
    fn raw_argument(&mut self, command: &str) -> Result<String> {
        self.skip_whitespace();
        if self.peek() != Some('{') {
            return Err(A11yError::MissingArgument(command.to_string()));
        }
        self.bump();
        let start = self.pos;
        let mut depth = 0usize;
        while let Some(c) = self.bump() {
            match c {
                '\\' => {
                    self.bump();
                }
                '{' => depth += 1,
                '}' if depth == 0 => return Ok(self.src[start..self.pos - 1].to_string()),
                '}' => depth -= 1,
                _ => {}
            }
        }
        Err(A11yError::Unbalanced)
    }

    fn control_name(&mut self) -> Result<String> {
        let start = self.pos;
        match self.bump() {
            Some(c) if c.is_ascii_alphabetic() => {
                while self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
                    self.bump();
                }
            }
            Some(_) => {}
            None => return Err(A11yError::Unexpected("\\".to_string())),
        }
        Ok(format!("\\{}", &self.src[start..self.pos]))
    }

    fn delimiter(&mut self, command: &str) -> Result<String> {
        self.skip_whitespace();
        match self.bump() {
            Some('\\') => self.control_name(),
            Some(c) => Ok(c.to_string()),
            None => Err(A11yError::MissingArgument(command.to_string())),
        }
    }

    fn parse_command(&mut self) -> Result<Option<Node>> {
        let name = self.control_name()?;
        let name = name.as_str();
        let node = match name {
            r"\\" | r"\newline" | r"\cr" => Node::Newline,
            r"\{" => Node::Symbol(name.to_string(), Family::Open),
            r"\}" => Node::Symbol(name.to_string(), Family::Close),
            r"\$" | r"\%" | r"\#" | r"\&" | r"\_" => Node::Symbol(name.to_string(), Family::Ord),
            r"\ " => Node::Space,
            _ if IGNORED.contains(&name) => return Ok(None),
            r"\frac" | r"\dfrac" | r"\tfrac" | r"\binom" | r"\dbinom" | r"\tbinom" => {
                let numer = self.parse_argument(name)?;
                let denom = self.parse_argument(name)?;
                Node::Frac {
                    numer: Box::new(numer),
                    denom: Box::new(denom),
                    bar: name.ends_with("frac"),
                }
            }
            r"\sqrt" => {
                let index = self.parse_optional()?.map(Box::new);
                let body = Box::new(self.parse_argument(name)?);
                Node::Sqrt { index, body }
            }
            r"\text" | r"\textrm" | r"\textnormal" | r"\textup" | r"\textsf" | r"\texttt"
            | r"\mbox" => Node::Text {
                modifier: None,
                body: self.raw_argument(name)?,
            },
            r"\textbf" => Node::Text {
                modifier: Some("bold"),
                body: self.raw_argument(name)?,
            },
            r"\textit" | r"\emph" => Node::Text {
                modifier: Some("italic"),
                body: self.raw_argument(name)?,
            },
            _ if FONTS.contains(&name) => self.parse_argument(name)?,
            _ if ACCENTS.contains(&name) => Node::Accent {
                label: name.to_string(),
                base: Box::new(self.parse_argument(name)?),
            },
            r"\overline" | r"\underline" | r"\overbrace" | r"\underbrace" => Node::Wrapped {
                label: name[1..].to_string(),
                body: Box::new(self.parse_argument(name)?),
            },
            r"\cancel" | r"\bcancel" | r"\xcancel" => Node::Wrapped {
                label: "cancel".to_string(),
                body: Box::new(self.parse_argument(name)?),
            },
            r"\boxed" | r"\fbox" => Node::Wrapped {
                label: "box".to_string(),
                body: Box::new(self.parse_argument(name)?),
            },
            r"\sout" => Node::Wrapped {
                label: "strikeout".to_string(),
                body: Box::new(self.parse_argument(name)?),
            },
            r"\textcolor" => {
                let color = self.raw_argument(name)?;
                Node::Wrapped {
                    label: format!("color {color}"),
                    body: Box::new(self.parse_argument(name)?),
                }
            }
            r"\color" => {
                self.raw_argument(name)?;
                return Ok(None);
            }
            r"\phantom" => {
                self.parse_argument(name)?;
                Node::Phantom
            }
            r"\vphantom" | r"\hphantom" => {
                self.parse_argument(name)?;
                return Ok(None);
            }
            r"\left" => {
                let left = self.delimiter(name)?;
                let body = self.parse_list(Stop::Right)?;
                // parse_list only returns here when positioned on \right
                self.bump();
                self.control_name()?;
                let right = self.delimiter(r"\right")?;
                Node::LeftRight { left, right, body }
            }
            r"\begin" => return Err(A11yError::Environment(self.raw_argument(name)?)),
            r"\right" | r"\end" => return Err(A11yError::Unexpected(name.to_string())),
            _ if lookup(ARROW_MAP, name).is_some() => {
                self.parse_optional()?;
                self.parse_argument(name)?;
                Node::Arrow(name.to_string())
            }
            _ if OPERATORS.contains(&name) => Node::Op(name.to_string()),
            _ => match command_family(name) {
                Some(family) => Node::Symbol(name.to_string(), family),
                None => return Err(A11yError::UnknownCommand(name.to_string())),
            },
        };
        Ok(Some(node))
    }
}

fn char_family(c: char) -> Family {
    match c {
        '+' | '-' | '*' => Family::Bin,
        '=' | '<' | '>' | ':' => Family::Rel,
        '(' | '[' => Family::Open,
        ')' | ']' => Family::Close,
        ',' | ';' => Family::Punct,
        _ => Family::Ord,
    }
}

fn command_family(name: &str) -> Option<Family> {
    if lookup(BIN_MAP, name).is_some() {
        Some(Family::Bin)
    } else if lookup(REL_MAP, name).is_some() {
        Some(Family::Rel)
    } else if OPEN_WORDS.contains(&name) {
        Some(Family::Open)
    } else if CLOSE_WORDS.contains(&name) {
        Some(Family::Close)
    } else if ORDINARY_WORDS.contains(&name) || lookup(STRING_MAP, name).is_some() {
        Some(Family::Ord)
    } else {
        None
    }
}

fn attach_script(nodes: &mut Vec<Node>, kind: char, script: Node) -> Result<()> {
    let script = Some(Box::new(script));
    match nodes.pop() {
        Some(Node::SupSub { base, sub, sup }) => {
            let (sub, sup) = match (kind, sub, sup) {
                ('_', None, sup) => (script, sup),
                ('^', sub, None) => (sub, script),
                _ => return Err(A11yError::Unexpected(format!("double {kind}"))),
            };
            nodes.push(Node::SupSub { base, sub, sup });
        }
        base => {
            let base = base.map(Box::new);
            let (sub, sup) = if kind == '_' { (script, None) } else { (None, script) };
            nodes.push(Node::SupSub { base, sub, sup });
        }
    }
    Ok(())
}

#[derive(Debug)]
enum Spoken {
    Word(String),
    Region(Vec<Spoken>),
}

fn is_number(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn push_word(out: &mut Vec<Spoken>, word: impl Into<String>) {
    let word = word.into();
    if word.is_empty() {
        return;
    }
    if is_number(&word)
        && let Some(Spoken::Word(last)) = out.last_mut()
        && is_number(last)
    {
        last.push_str(&word);
        return;
    }
    out.push(Spoken::Word(word));
}

fn symbol_word(text: &str, family: Family) -> String {
    let mapped = match family {
        Family::Open => lookup(OPEN_MAP, text).or_else(|| lookup(STRING_MAP, text)),
        Family::Close => lookup(CLOSE_MAP, text).or_else(|| lookup(STRING_MAP, text)),
        Family::Bin => lookup(BIN_MAP, text),
        Family::Rel => lookup(REL_MAP, text),
        Family::Ord | Family::Punct => lookup(STRING_MAP, text),
    };
    match mapped {
        Some(word) => word.to_string(),
        None => text.trim_start_matches('\\').to_string(),
    }
}

fn flatten(spoken: &[Spoken], into: &mut Vec<String>) {
    for item in spoken {
        match item {
            Spoken::Word(word) => into.push(word.clone()),
            Spoken::Region(items) => flatten(items, into),
        }
    }
}

fn joined(node: &Node, separator: &str) -> String {
    let mut spoken = Vec::new();
    speak(node, &mut spoken);
    let mut words = Vec::new();
    flatten(&spoken, &mut words);
    words.join(separator)
}

fn region(out: &mut Vec<Spoken>, build: impl FnOnce(&mut Vec<Spoken>)) {
    let mut inner = Vec::new();
    build(&mut inner);
    out.push(Spoken::Region(inner));
}

fn speak_all(nodes: &[Node], out: &mut Vec<Spoken>) {
    for node in nodes {
        speak(node, out);
    }
}

fn speak(node: &Node, out: &mut Vec<Spoken>) {
    match node {
        Node::Symbol(text, family) => push_word(out, symbol_word(text, *family)),
        Node::Group(nodes) => speak_all(nodes, out),
        Node::Op(name) => push_word(out, symbol_word(name, Family::Ord)),
        Node::Frac { numer, denom, bar } => region(out, |out| {
            if *bar {
                let denominator = joined(denom, ",");
                if joined(numer, ",") == "1"
                    && let Some(word) = lookup(DENOMINATOR_MAP, &denominator)
                {
                    push_word(out, format!("one {word}"));
                    return;
                }
                push_word(out, "start fraction");
                speak(numer, out);
                push_word(out, "divided by");
                speak(denom, out);
                push_word(out, "end fraction");
            } else {
                push_word(out, "start binomial");
                speak(numer, out);
                push_word(out, "over");
                speak(denom, out);
                push_word(out, "end binomial");
            }
        }),
        Node::Sqrt { index, body } => region(out, |out| match index {
            Some(index) if joined(index, ",") == "3" => {
                push_word(out, "cube root of");
                speak(body, out);
                push_word(out, "end cube root");
            }
            Some(index) => {
                push_word(out, "root");
                push_word(out, "start index");
                speak(index, out);
                push_word(out, "end index");
                speak(body, out);
                push_word(out, "end root");
            }
            None => {
                push_word(out, "square root of");
                speak(body, out);
                push_word(out, "end square root");
            }
        }),
        Node::SupSub { base, sub, sup } => speak_scripts(base.as_deref(), sub.as_deref(), sup.as_deref(), out),
        Node::Text { modifier, body } => region(out, |out| {
            if DROP_ZONE_TOKEN.is_match(body) {
                push_word(out, "clickable drop zone");
                return;
            }
            let modifier = modifier.map(|m| format!("{m} ")).unwrap_or_default();
            out.push(Spoken::Word(format!("start {modifier}text")));
            let body = body.trim();
            if !body.is_empty() {
                out.push(Spoken::Word(body.to_string()));
            }
            out.push(Spoken::Word(format!("end {modifier}text")));
        }),
        Node::Accent { label, base } => region(out, |out| {
            speak(base, out);
            push_word(out, "with");
            push_word(out, symbol_word(label, Family::Ord));
            push_word(out, "on top");
        }),
        Node::Wrapped { label, body } => region(out, |out| {
            push_word(out, format!("start {label}"));
            speak(body, out);
            push_word(out, format!("end {label}"));
        }),
        Node::LeftRight { left, right, body } => region(out, |out| {
            push_word(out, symbol_word(left, Family::Open));
            speak_all(body, out);
            push_word(out, symbol_word(right, Family::Close));
        }),
        Node::Arrow(label) => push_word(out, lookup(ARROW_MAP, label).unwrap_or("arrow")),
        Node::Space => push_word(out, "space"),
        Node::Phantom => push_word(out, "empty space"),
        Node::Newline => region(out, |out| push_word(out, ".")),
    }
}

fn speak_scripts(base: Option<&Node>, sub: Option<&Node>, sup: Option<&Node>, out: &mut Vec<Spoken>) {
    let operator = match base {
        Some(Node::Op(name)) => Some(name.as_str()),
        _ => None,
    };
    let is_range_operator = matches!(operator, Some(r"\int" | r"\sum"));

    // q_{1} reads as "q 1"
    let mut simple_subscript = false;
    if let (Some(base @ Node::Symbol(_, Family::Ord)), Some(sub)) = (base, sub) {
        let base_word = joined(base, ",");
        let sub_word = joined(sub, ",");
        let single_letter = base_word.len() == 1 && base_word.bytes().all(|b| b.is_ascii_alphabetic());
        if single_letter && is_number(&sub_word) {
            region(out, |out| push_word(out, format!("{base_word} {sub_word}")));
            simple_subscript = true;
        }
    }

    if let Some(base) = base
        && !simple_subscript
    {
        speak(base, out);
    }

    if let Some(sub) = sub
        && !simple_subscript
    {
        region(out, |out| match operator {
            Some(r"\log") => {
                push_word(out, "base");
                speak(sub, out);
            }
            _ if is_range_operator => {
                push_word(out, "from");
                speak(sub, out);
            }
            _ => {
                push_word(out, "start subscript");
                speak(sub, out);
                push_word(out, "end subscript");
            }
        });
    }

    match sup {
        Some(sup) => region(out, |out| {
            if is_range_operator {
                push_word(out, "to");
                speak(sup, out);
                push_word(out, "of");
                return;
            }
            let power = joined(sup, " ");
            if let Some(word) = lookup(POWER_MAP, &power) {
                push_word(out, word);
            } else if is_simple_power(&power) {
                push_word(out, format!("to the power {power}"));
            } else {
                push_word(out, "start superscript");
                speak(sup, out);
                push_word(out, "end superscript");
            }
        }),
        None if sub.is_some() && is_range_operator => region(out, |out| push_word(out, "of")),
        None => {}
    }
}

fn is_simple_power(power: &str) -> bool {
    let digits = power.strip_prefix("minus ").unwrap_or(power);
    is_number(digits) || (power.len() == 1 && power.bytes().all(|b| b.is_ascii_alphabetic()))
}

/// Renders `latex` as comma-separated words suitable for a screen reader.
pub fn render_a11y_string(latex: &str) -> Result<String> {
    let nodes = Parser::new(latex).parse_list(Stop::End)?;
    let mut spoken = Vec::new();
    speak_all(&nodes, &mut spoken);
    let mut words = Vec::new();
    flatten(&spoken, &mut words);
    Ok(words.join(", "))
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    #[test]
    fn render_a11y_string__should_read_fractions() {
        assert_eq!(
            render_a11y_string(r"\frac{a}{b}"),
            Ok("start fraction, a, divided by, b, end fraction".to_string())
        );
    }

    #[test]
    fn render_a11y_string__should_read_unit_fractions_by_name() {
        assert_eq!(render_a11y_string(r"\frac{1}{2}"), Ok("one half".to_string()));
    }

    #[test]
    fn render_a11y_string__should_read_functions_and_powers() {
        // Given
        let latex = "f(x) = x^2";

        // When
        let spoken = render_a11y_string(latex);

        // Then
        assert_eq!(
            spoken,
            Ok("f, left bracket, x, right bracket, equals, x, squared".to_string())
        );
    }

    #[test]
    fn render_a11y_string__should_combine_consecutive_digits() {
        assert_eq!(render_a11y_string("E=mc^2 + 42"), Ok("E, equals, m, c, squared, plus, 42".to_string()));
    }

    #[test]
    fn render_a11y_string__should_read_simple_subscripted_variables() {
        assert_eq!(render_a11y_string("q_1 q_{2}"), Ok("q 1, q 2".to_string()));
    }

    #[test]
    fn render_a11y_string__should_read_integral_limits() {
        // When
        let spoken = render_a11y_string(r"\int_0^1 x").expect("readable");

        // Then
        assert_eq!(spoken, "integral, from, 0, to, 1, of, x");
    }

    #[test]
    fn render_a11y_string__should_keep_text_verbatim() {
        assert_eq!(
            render_a11y_string(r"\text{kg m}"),
            Ok("start text, kg m, end text".to_string())
        );
    }

    #[test]
    fn render_a11y_string__should_read_drop_zones_in_text() {
        assert_eq!(
            render_a11y_string(r"x = \text{[drop-zone]}"),
            Ok("x, equals, clickable drop zone".to_string())
        );
    }

    #[test]
    fn render_a11y_string__should_read_square_and_cube_roots() {
        assert_eq!(
            render_a11y_string(r"\sqrt{x} + \sqrt[3]{y}"),
            Ok("square root of, x, end square root, plus, cube root of, y, end cube root".to_string())
        );
    }

    #[test]
    fn render_a11y_string__should_read_left_right_delimiters() {
        assert_eq!(
            render_a11y_string(r"\left| x \right|"),
            Ok("open vertical bar, x, close vertical bar".to_string())
        );
    }

    #[test]
    fn render_a11y_string__should_reject_environments() {
        assert_eq!(
            render_a11y_string(r"\begin{aligned}a&=b\end{aligned}"),
            Err(A11yError::Environment("aligned".to_string()))
        );
    }

    #[test]
    fn render_a11y_string__should_reject_unbalanced_braces() {
        assert_eq!(render_a11y_string(r"\frac{1}{"), Err(A11yError::Unbalanced));
    }

    #[test]
    fn render_a11y_string__should_reject_unknown_commands() {
        assert!(matches!(
            render_a11y_string(r"\notacommand x"),
            Err(A11yError::UnknownCommand(_))
        ));
    }
}
