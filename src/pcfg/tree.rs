use std::fmt;

use crate::errors::{Error, Result};

/// A phrase-structure tree whose leaves are words.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tree {
    Node { label: String, children: Vec<Tree> },
    Leaf(String),
}

impl Tree {
    pub fn node<S: Into<String>>(label: S, children: Vec<Tree>) -> Self {
        Tree::Node {
            label: label.into(),
            children,
        }
    }

    pub fn leaf<S: Into<String>>(word: S) -> Self {
        Tree::Leaf(word.into())
    }

    /// Label of a node; `None` for a leaf
    pub fn label(&self) -> Option<&str> {
        match self {
            Tree::Node { label, .. } => Some(label.as_str()),
            Tree::Leaf(_) => None,
        }
    }

    pub fn children(&self) -> &[Tree] {
        match self {
            Tree::Node { children, .. } => children,
            Tree::Leaf(_) => &[],
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Tree::Leaf(_))
    }

    /// A node whose only child is a leaf
    pub fn is_preterminal(&self) -> bool {
        matches!(self.children(), [Tree::Leaf(_)])
    }

    /// Words in left-to-right order
    pub fn leaves(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Tree::Leaf(word) => out.push(word.as_str()),
            Tree::Node { children, .. } => {
                for child in children {
                    child.collect_leaves(out);
                }
            }
        }
    }

    /// Labelled spans `(label, start, end)` of every node that is neither a
    /// leaf nor a pre-terminal.
    pub fn brackets(&self) -> Vec<(&str, usize, usize)> {
        let mut out = Vec::new();
        self.collect_brackets(0, &mut out);
        out
    }

    fn collect_brackets<'a>(&'a self, start: usize, out: &mut Vec<(&'a str, usize, usize)>) -> usize {
        match self {
            Tree::Leaf(_) => start + 1,
            Tree::Node { label, children } => {
                let mut end = start;
                for child in children {
                    end = child.collect_brackets(end, out);
                }
                if !self.is_preterminal() {
                    out.push((label.as_str(), start, end));
                }
                end
            }
        }
    }

    /// Parse a bracketed tree such as `(S (NP cat) (VP sleeps))`.
    pub fn parse(text: &str) -> Result<Tree> {
        let tokens = tokenize(text);
        let mut pos = 0;
        let tree = parse_node(&tokens, &mut pos)?;
        if pos != tokens.len() {
            return Err(Error::InvalidTree(format!(
                "unexpected `{}` after the tree",
                tokens[pos]
            )));
        }
        Ok(tree)
    }
}

fn tokenize(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = None;
    for (i, c) in text.char_indices() {
        if c == '(' || c == ')' || c.is_whitespace() {
            if let Some(s) = start.take() {
                tokens.push(&text[s..i]);
            }
            if !c.is_whitespace() {
                tokens.push(&text[i..i + 1]);
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        tokens.push(&text[s..]);
    }
    tokens
}

fn parse_node(tokens: &[&str], pos: &mut usize) -> Result<Tree> {
    let eof = || Error::InvalidTree("unexpected end of input".to_string());
    match tokens.get(*pos) {
        Some(&"(") => {}
        Some(tok) => return Err(Error::InvalidTree(format!("expected `(`, found `{}`", tok))),
        None => return Err(eof()),
    }
    *pos += 1;
    let label = match tokens.get(*pos) {
        Some(&"(") | Some(&")") | None => return Err(Error::InvalidTree("missing label".to_string())),
        Some(label) => label.to_string(),
    };
    *pos += 1;
    let mut children = Vec::new();
    loop {
        match tokens.get(*pos) {
            Some(&")") => {
                *pos += 1;
                break;
            }
            Some(&"(") => children.push(parse_node(tokens, pos)?),
            Some(word) => {
                children.push(Tree::leaf(*word));
                *pos += 1;
            }
            None => return Err(eof()),
        }
    }
    if children.is_empty() {
        return Err(Error::InvalidTree(format!("node `{}` has no children", label)));
    }
    Ok(Tree::Node { label, children })
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tree::Leaf(word) => write!(f, "{}", word),
            Tree::Node { label, children } => {
                write!(f, "({}", label)?;
                for child in children {
                    write!(f, " {}", child)?;
                }
                write!(f, ")")
            }
        }
    }
}
