/// A token of the input sequence
///
/// This type is used for both training and prediction. Only `text` is
/// required; feature families that depend on a missing field are skipped.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Token {
    /// Surface form
    pub text: String,
    /// Lemma (dictionary form)
    pub lemma: Option<String>,
    /// Part-of-speech tag
    pub pos: Option<String>,
}

impl Token {
    /// Create a new token from its surface form
    pub fn new<T: Into<String>>(text: T) -> Self {
        Self {
            text: text.into(),
            lemma: None,
            pos: None,
        }
    }

    /// Attach a lemma
    pub fn with_lemma<T: Into<String>>(mut self, lemma: T) -> Self {
        self.lemma = Some(lemma.into());
        self
    }

    /// Attach a part-of-speech tag
    pub fn with_pos<T: Into<String>>(mut self, pos: T) -> Self {
        self.pos = Some(pos.into());
        self
    }
}

impl From<String> for Token {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl From<&str> for Token {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl<S: Into<String>, P: Into<String>> From<(S, P)> for Token {
    fn from((text, pos): (S, P)) -> Self {
        Self::new(text).with_pos(pos)
    }
}

/// Build a token sequence from plain words.
pub fn tokens<I, S>(words: I) -> Vec<Token>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    words.into_iter().map(|w| Token::new(w)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_creation() {
        let t1 = Token::new("Paris");
        assert_eq!(t1.text, "Paris");
        assert!(t1.lemma.is_none());
        assert!(t1.pos.is_none());

        let t2 = Token::from(("runs", "VBZ")).with_lemma("run");
        assert_eq!(t2.pos.as_deref(), Some("VBZ"));
        assert_eq!(t2.lemma.as_deref(), Some("run"));

        let seq = tokens(["the", "cat"]);
        assert_eq!(seq.len(), 2);
        assert_eq!(seq[1], Token::from("cat"));
    }
}
