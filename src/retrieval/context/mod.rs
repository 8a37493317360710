
use crate::database::Match;

const HIGH_RELEVANCE_LABEL: &str = "HIGH RELEVANCE EXTRACT";
const ADDITIONAL_LABEL: &str = "ADDITIONAL EXTRACT";
const SECTION_SEPARATOR: &str = "\n\n";

/// Ranked matches split into the bands shown to the language model
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievedContext {
    pub high_relevance: Vec<Match>,
    pub additional: Vec<Match>,
}

impl RetrievedContext {
    /// Keep the first `context_limit` ranked matches; the first
    /// `high_relevance_count` of those form the high relevance band
    #[inline]
    pub fn from_ranked(
        mut ranked: Vec<Match>,
        context_limit: usize,
        high_relevance_count: usize,
    ) -> Self {
        ranked.truncate(context_limit);
        let split_at = high_relevance_count.min(ranked.len());
        let additional = ranked.split_off(split_at);
        Self {
            high_relevance: ranked,
            additional,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.high_relevance.len() + self.additional.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.high_relevance.is_empty() && self.additional.is_empty()
    }

    /// Prompt text for the bands, high relevance first
    ///
    /// Extract numbers are positions within the band, so a skipped empty match
    /// leaves a gap in the numbering.
    #[inline]
    pub fn render(&self) -> String {
        let high = render_band(&self.high_relevance, HIGH_RELEVANCE_LABEL);
        let additional = render_band(&self.additional, ADDITIONAL_LABEL);

        if additional.is_empty() {
            high
        } else {
            format!("{}{}{}", high, SECTION_SEPARATOR, additional)
        }
    }

    /// True when no match carries any text
    #[inline]
    pub fn has_no_text(&self) -> bool {
        self.high_relevance
            .iter()
            .chain(&self.additional)
            .all(|m| m.metadata.text.trim().is_empty())
    }
}

fn render_band(matches: &[Match], label: &str) -> String {
    matches
        .iter()
        .enumerate()
        .filter_map(|(i, m)| {
            let text = m.metadata.text.trim();
            (!text.is_empty()).then(|| format!("[{} {}]\n{}", label, i + 1, text))
        })
        .collect::<Vec<_>>()
        .join(SECTION_SEPARATOR)
}
