//! File-backed template populator

use std::path::Path;
use std::sync::Arc;

use platform::template_cache::TemplateCache;

use crate::domain::backend::TemplatePopulator;
use crate::error::BackendError;

/// Reads templates through a shared [`TemplateCache`]
pub struct FileTemplatePopulator {
    cache: Arc<TemplateCache>,
    use_cache: bool,
}

impl FileTemplatePopulator {
    pub fn new(cache: Arc<TemplateCache>) -> Self {
        Self {
            cache,
            use_cache: true,
        }
    }

    /// Always read templates from disk
    pub fn uncached(cache: Arc<TemplateCache>) -> Self {
        Self {
            cache,
            use_cache: false,
        }
    }
}

impl TemplatePopulator for FileTemplatePopulator {
    fn populate(
        &self,
        template_path: &Path,
        fields: &[(&str, &str)],
    ) -> Result<String, BackendError> {
        let template = self.cache.get(template_path, self.use_cache)?;
        Ok(replace_placeholders(&template, fields))
    }
}

/// Replace every occurrence of each key with its value
///
/// Longer keys go first so a key that is a prefix of another cannot eat
/// part of it. Replaced text is never scanned again.
pub fn replace_placeholders(template: &str, fields: &[(&str, &str)]) -> String {
    let mut ordered: Vec<&(&str, &str)> =
        fields.iter().filter(|(key, _)| !key.is_empty()).collect();
    ordered.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    'scan: while !rest.is_empty() {
        for (key, value) in &ordered {
            if let Some(tail) = rest.strip_prefix(*key) {
                out.push_str(value);
                rest = tail;
                continue 'scan;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            out.push(c);
        }
        rest = chars.as_str();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replaces_every_occurrence() {
        let html = "<p>first_name last_name</p><b>first_name</b>";
        let out = replace_placeholders(html, &[("first_name", "Иван"), ("last_name", "Иванов")]);
        assert_eq!(out, "<p>Иван Иванов</p><b>Иван</b>");
    }

    #[test]
    fn test_longer_key_wins_over_prefix() {
        let html = "passport_issued_by / passport_issued_date";
        let out = replace_placeholders(
            html,
            &[("passport_issued", "X"), ("passport_issued_date", "2010-01-01")],
        );
        assert_eq!(out, "X_by / 2010-01-01");
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let fields = [("email", "email phone_number"), ("phone_number", "+7")];
        let out = replace_placeholders("email", &fields);
        assert_eq!(out, "email phone_number");
    }

    #[test]
    fn test_populate_reads_through_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contract.html");
        std::fs::write(&path, "Signer: first_name").unwrap();
        let cache = Arc::new(TemplateCache::new(4));
        let populator = FileTemplatePopulator::new(Arc::clone(&cache));

        let out = populator.populate(&path, &[("first_name", "Ivan")]).unwrap();
        assert_eq!(out, "Signer: Ivan");
        assert!(cache.contains(&path));

        let missing = populator.populate(&dir.path().join("absent.html"), &[]);
        assert!(matches!(missing, Err(BackendError::Io(_))));
    }

    #[test]
    fn test_uncached_populator_bypasses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contract.html");
        std::fs::write(&path, "first_name").unwrap();
        let cache = Arc::new(TemplateCache::new(4));
        let populator = FileTemplatePopulator::uncached(Arc::clone(&cache));

        populator.populate(&path, &[("first_name", "Ivan")]).unwrap();
        assert!(cache.is_empty());
    }
}
