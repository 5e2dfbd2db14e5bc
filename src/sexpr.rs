//! Wire-format parser for the server's parenthesized s-expression messages.
//!
//! Structural parsing only: one line of text becomes a sequence of `Expr`
//! trees, one per top-level parenthesized expression. Nothing is evaluated.

/// One node of a parsed server message.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Atom(String),
    List(Vec<Expr>),
}

impl Expr {
    /// The atom text, if this node is an atom.
    pub fn atom(&self) -> Option<&str> {
        match self {
            Expr::Atom(s) => Some(s.as_str()),
            Expr::List(_) => None,
        }
    }

    /// The child nodes, if this node is a list.
    pub fn list(&self) -> Option<&[Expr]> {
        match self {
            Expr::Atom(_) => None,
            Expr::List(items) => Some(items.as_slice()),
        }
    }

    /// Atom text parsed as f64.
    pub fn as_f64(&self) -> Option<f64> {
        self.atom().and_then(|s| s.parse().ok())
    }

    /// Atom text parsed as i64.
    pub fn as_i64(&self) -> Option<i64> {
        self.atom().and_then(|s| s.parse().ok())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("unbalanced parentheses in message")]
    UnbalancedParens,
}

/// Parse one line of server output into its top-level expressions.
///
/// Single left-to-right scan. Double-quoted strings are opaque: while a
/// string is open, parens and spaces are ordinary characters, and a `"`
/// preceded by `\` does not close it. Quotes are kept in the atom text.
pub fn parse(text: &str) -> Result<Vec<Expr>, ParseError> {
    // stack[0] collects top-level expressions; each `(` pushes a level
    let mut stack: Vec<Vec<Expr>> = vec![Vec::new()];
    let mut atom = String::new();
    let mut in_string = false;
    let mut prev = '\0';

    for c in text.chars() {
        if c == '"' && prev != '\\' {
            in_string = !in_string;
            atom.push(c);
        } else if c == '(' && !in_string {
            if !atom.is_empty() {
                stack.last_mut().unwrap().push(Expr::Atom(std::mem::take(&mut atom)));
            }
            stack.push(Vec::new());
        } else if c == ')' && !in_string {
            if !atom.is_empty() {
                stack.last_mut().unwrap().push(Expr::Atom(std::mem::take(&mut atom)));
            }
            if stack.len() < 2 {
                return Err(ParseError::UnbalancedParens);
            }
            let finished = stack.pop().unwrap();
            stack.last_mut().unwrap().push(Expr::List(finished));
        } else if c == ' ' && !in_string {
            if !atom.is_empty() {
                stack.last_mut().unwrap().push(Expr::Atom(std::mem::take(&mut atom)));
            }
        } else {
            atom.push(c);
        }
        prev = c;
    }

    if stack.len() != 1 {
        return Err(ParseError::UnbalancedParens);
    }
    if !atom.is_empty() {
        stack.last_mut().unwrap().push(Expr::Atom(atom));
    }
    Ok(stack.pop().unwrap())
}
