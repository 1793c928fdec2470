pub mod chat;

pub use chat::ChatTranslator;

use crate::error::Result;
use crate::model::ModelHandle;
use async_trait::async_trait;

/// Neighbouring source texts surrounding the text being translated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationContext {
    pub before: Vec<String>,
    pub after: Vec<String>,
}

impl TranslationContext {
    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.after.is_empty()
    }

    /// Up to `window` non-blank texts on each side of `index`.
    pub fn around(texts: &[&str], index: usize, window: usize) -> Self {
        if window == 0 || index >= texts.len() {
            return Self::default();
        }
        let lo = index.saturating_sub(window);
        let hi = (index + window + 1).min(texts.len());
        let collect = |slice: &[&str]| -> Vec<String> {
            slice
                .iter()
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect()
        };
        Self {
            before: collect(&texts[lo..index]),
            after: collect(&texts[index + 1..hi]),
        }
    }
}

#[async_trait]
pub trait Translator: ModelHandle {
    /// Translate one text. `context` is advisory and never translated itself.
    async fn translate(&self, text: &str, context: &TranslationContext) -> Result<String>;
}
