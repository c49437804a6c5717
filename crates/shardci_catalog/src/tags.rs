use std::collections::BTreeSet;

/// Marks a tag token as a rejection: `~wip` excludes files tagged `wip`.
pub const REJECT_MARKER: char = '~';

/// Strips surrounding whitespace and the optional Gherkin `@` sigil.
pub fn normalize_tag(tag: &str) -> &str {
    let tag = tag.trim();
    tag.strip_prefix('@').unwrap_or(tag)
}

/// Select, reject and slow tag sets. Membership is all that matters.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TagRuleSet {
    select: BTreeSet<String>,
    reject: BTreeSet<String>,
    slow: BTreeSet<String>,
}

impl TagRuleSet {
    /// Splits raw `--tags` tokens into select and reject sets.
    ///
    /// A leading `~` moves a token into the reject set. Empty tokens are ignored.
    pub fn parse<S: AsRef<str>>(tags: &[S], slow_tags: &[S]) -> Self {
        let mut rules = Self::default();

        for token in tags {
            let token = token.as_ref().trim();
            if let Some(rejected) = token.strip_prefix(REJECT_MARKER) {
                insert_normalized(&mut rules.reject, rejected);
            } else {
                insert_normalized(&mut rules.select, token);
            }
        }

        for token in slow_tags {
            insert_normalized(&mut rules.slow, token.as_ref());
        }

        rules
    }

    pub const fn select(&self) -> &BTreeSet<String> {
        &self.select
    }

    pub const fn reject(&self) -> &BTreeSet<String> {
        &self.reject
    }

    pub const fn slow(&self) -> &BTreeSet<String> {
        &self.slow
    }

    /// Whether a file carrying `tags` takes part in the run.
    ///
    /// Any rejected tag excludes the file, even when it also carries a selected
    /// tag. With no select tags every non-rejected file is included.
    pub fn include<I, S>(&self, tags: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut selected = self.select.is_empty();

        for tag in tags {
            let tag = normalize_tag(tag.as_ref());
            if self.reject.contains(tag) {
                return false;
            }
            selected |= self.select.contains(tag);
        }

        selected
    }

    /// Whether any of `tags` is a slow tag.
    pub fn is_slow<I, S>(&self, tags: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        tags.into_iter()
            .any(|tag| self.slow.contains(normalize_tag(tag.as_ref())))
    }
}

fn insert_normalized(set: &mut BTreeSet<String>, token: &str) {
    let tag = normalize_tag(token);
    if !tag.is_empty() {
        set.insert(tag.to_string());
    }
}
