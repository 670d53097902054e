///
/// Tokenization pipeline
///
/// Contract-first: the engine only depends on `Tokenizer`/`TokenFilter`
/// and ships one reference implementation of each. Hosts plug richer
/// pipelines (stemming, stopwords, language rules) without touching the
/// index.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Token {
    pub term: String,
    /// Token position within the field, used for phrase matching.
    pub position: u32,
}

pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, input: &str) -> Vec<Token>;
}

pub trait TokenFilter: Send + Sync {
    /// Transform one term; `None` drops the token.
    fn apply(&self, term: String) -> Option<String>;
}

///
/// Analyzer
///

pub struct Analyzer {
    tokenizer: Box<dyn Tokenizer>,
    filters: Vec<Box<dyn TokenFilter>>,
}

impl Analyzer {
    #[must_use]
    pub fn new(tokenizer: Box<dyn Tokenizer>) -> Self {
        Self {
            tokenizer,
            filters: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_filter(mut self, filter: Box<dyn TokenFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub fn analyze(&self, input: &str) -> Vec<Token> {
        let mut tokens = self.tokenizer.tokenize(input);
        for filter in &self.filters {
            tokens = tokens
                .into_iter()
                .filter_map(|token| {
                    filter.apply(token.term).map(|term| Token {
                        term,
                        position: token.position,
                    })
                })
                .collect();
        }
        tokens
    }
}

impl Default for Analyzer {
    /// Alphanumeric splitting + lowercase folding.
    fn default() -> Self {
        Self::new(Box::new(AlphanumericTokenizer)).with_filter(Box::new(LowercaseFilter))
    }
}

///
/// AlphanumericTokenizer
///
/// Splits on every non-alphanumeric character; positions count emitted
/// tokens, not bytes.
///

pub struct AlphanumericTokenizer;

impl Tokenizer for AlphanumericTokenizer {
    fn tokenize(&self, input: &str) -> Vec<Token> {
        input
            .split(|c: char| !c.is_alphanumeric())
            .filter(|term| !term.is_empty())
            .enumerate()
            .map(|(position, term)| Token {
                term: term.to_string(),
                position: position as u32,
            })
            .collect()
    }
}

///
/// LowercaseFilter
///

pub struct LowercaseFilter;

impl TokenFilter for LowercaseFilter {
    fn apply(&self, term: String) -> Option<String> {
        Some(term.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pipeline_lowercases_and_splits() {
        let analyzer = Analyzer::default();
        let tokens = analyzer.analyze("Machine-Learning, in PRODUCTION!");
        let terms: Vec<&str> = tokens.iter().map(|t| t.term.as_str()).collect();
        assert_eq!(terms, vec!["machine", "learning", "in", "production"]);
        assert_eq!(tokens[2].position, 2);
    }

    #[test]
    fn filters_can_drop_tokens() {
        struct ShortDrop;
        impl TokenFilter for ShortDrop {
            fn apply(&self, term: String) -> Option<String> {
                (term.len() > 2).then_some(term)
            }
        }

        let analyzer = Analyzer::new(Box::new(AlphanumericTokenizer))
            .with_filter(Box::new(ShortDrop));
        let terms: Vec<String> = analyzer
            .analyze("a bb ccc dddd")
            .into_iter()
            .map(|t| t.term)
            .collect();
        assert_eq!(terms, vec!["ccc", "dddd"]);
    }
}
