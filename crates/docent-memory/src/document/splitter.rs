use super::DocumentError;

/// Word-window sizes. [`SplitterConfig::new`] guarantees `chunk_overlap < chunk_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitterConfig {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl SplitterConfig {
    pub const DEFAULT_CHUNK_SIZE: usize = 1500;
    pub const DEFAULT_CHUNK_OVERLAP: usize = 150;

    /// # Errors
    ///
    /// Returns [`DocumentError::InvalidArgument`] if `chunk_size` is zero or
    /// `chunk_overlap >= chunk_size`: the window would never advance.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, DocumentError> {
        if chunk_size == 0 {
            return Err(DocumentError::InvalidArgument(
                "chunk size must be positive".into(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(DocumentError::InvalidArgument(format!(
                "chunk overlap ({chunk_overlap}) must be smaller than chunk size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    #[must_use]
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    fn step(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }

    /// Number of windows produced for `words` words.
    #[must_use]
    pub fn window_count(&self, words: usize) -> usize {
        if words == 0 {
            0
        } else if words <= self.chunk_size {
            1
        } else {
            (words - self.chunk_overlap).div_ceil(self.step())
        }
    }
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
            chunk_overlap: Self::DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// Sliding word-window chunker.
#[derive(Debug, Clone, Default)]
pub struct TextSplitter {
    config: SplitterConfig,
}

impl TextSplitter {
    #[must_use]
    pub fn new(config: SplitterConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> SplitterConfig {
        self.config
    }

    /// Split on whitespace into windows of `chunk_size` words whose starts are
    /// `chunk_size - chunk_overlap` words apart. Words inside a window are joined
    /// by a single space. Stops after the first window that reaches the last word.
    #[must_use]
    pub fn split(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let mut windows = Vec::with_capacity(self.config.window_count(words.len()));

        let mut start = 0;
        while start < words.len() {
            let end = (start + self.config.chunk_size).min(words.len());
            windows.push(words[start..end].join(" "));
            if end == words.len() {
                break;
            }
            start += self.config.step();
        }

        windows
    }
}

/// Validate the window parameters and split `text` in one call.
///
/// # Errors
///
/// Returns [`DocumentError::InvalidArgument`] for `size == 0` or `overlap >= size`.
pub fn chunk(text: &str, size: usize, overlap: usize) -> Result<Vec<String>, DocumentError> {
    Ok(TextSplitter::new(SplitterConfig::new(size, overlap)?).split(text))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn nine_words_size_four_overlap_one() {
        let windows = chunk("the quick brown fox jumps over the lazy dog", 4, 1).unwrap();
        assert_eq!(
            windows,
            vec!["the quick brown fox", "fox jumps over the", "the lazy dog"]
        );
    }

    #[test]
    fn empty_and_whitespace_text() {
        assert!(chunk("", 4, 1).unwrap().is_empty());
        assert!(chunk(" \n\t  ", 4, 1).unwrap().is_empty());
    }

    #[test]
    fn text_shorter_than_window() {
        assert_eq!(chunk("just three words", 10, 2).unwrap(), vec!["just three words"]);
    }

    #[test]
    fn exact_fit_makes_one_window() {
        assert_eq!(chunk("a b c d", 4, 2).unwrap(), vec!["a b c d"]);
    }

    #[test]
    fn whitespace_is_normalised() {
        assert_eq!(
            chunk("alpha\n\nbeta\t gamma", 5, 0).unwrap(),
            vec!["alpha beta gamma"]
        );
    }

    #[test]
    fn zero_overlap_partitions() {
        assert_eq!(
            chunk("a b c d e", 2, 0).unwrap(),
            vec!["a b", "c d", "e"]
        );
    }

    #[test]
    fn overlap_equal_to_size_is_rejected() {
        assert!(matches!(
            SplitterConfig::new(3, 3),
            Err(DocumentError::InvalidArgument(_))
        ));
        assert!(matches!(
            chunk("a b c", 2, 5),
            Err(DocumentError::InvalidArgument(_))
        ));
    }

    #[test]
    fn zero_size_is_rejected() {
        assert!(SplitterConfig::new(0, 0).is_err());
    }

    #[test]
    fn default_config() {
        let config = SplitterConfig::default();
        assert_eq!(config.chunk_size(), 1500);
        assert_eq!(config.chunk_overlap(), 150);
    }

    #[test]
    fn window_count_formula() {
        let config = SplitterConfig::new(4, 1).unwrap();
        assert_eq!(config.window_count(0), 0);
        assert_eq!(config.window_count(3), 1);
        assert_eq!(config.window_count(4), 1);
        assert_eq!(config.window_count(5), 2);
        assert_eq!(config.window_count(9), 3);
        assert_eq!(config.window_count(10), 3);
    }

    fn word_list() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[a-z]{1,6}", 0..120)
    }

    fn params() -> impl Strategy<Value = (usize, usize)> {
        (1usize..20).prop_flat_map(|size| (Just(size), 0..size))
    }

    proptest! {
        #[test]
        fn windows_reconstruct_words(words in word_list(), (size, overlap) in params()) {
            let text = words.join(" ");
            let windows = chunk(&text, size, overlap).unwrap();

            let mut rebuilt: Vec<&str> = Vec::new();
            for (i, window) in windows.iter().enumerate() {
                let skip = if i == 0 { 0 } else { overlap };
                rebuilt.extend(window.split(' ').skip(skip));
            }
            prop_assert_eq!(rebuilt, words.iter().map(String::as_str).collect::<Vec<_>>());
        }

        #[test]
        fn no_empty_windows(text in "[a-z \\n\\t]{0,200}", (size, overlap) in params()) {
            for window in chunk(&text, size, overlap).unwrap() {
                prop_assert!(!window.trim().is_empty());
            }
        }

        #[test]
        fn zero_overlap_partitions_words(words in word_list(), size in 1usize..20) {
            let text = words.join(" ");
            let windows = chunk(&text, size, 0).unwrap();
            let flattened: Vec<String> = windows
                .iter()
                .flat_map(|w| w.split(' ').map(str::to_owned))
                .collect();
            prop_assert_eq!(flattened, words);
            if let Some((last, rest)) = windows.split_last() {
                for w in rest {
                    prop_assert_eq!(w.split(' ').count(), size);
                }
                prop_assert!(last.split(' ').count() <= size);
            }
        }

        #[test]
        fn count_matches_formula(words in word_list(), (size, overlap) in params()) {
            let config = SplitterConfig::new(size, overlap).unwrap();
            let windows = TextSplitter::new(config).split(&words.join(" "));
            prop_assert_eq!(windows.len(), config.window_count(words.len()));
        }
    }
}
