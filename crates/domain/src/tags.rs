use std::collections::BTreeSet;

use otpdesk_core::{AppError, AppResult};

/// Maximum length of a single visibility tag.
pub const TAG_MAX_LENGTH: usize = 64;

/// Ordered, de-duplicated set of visibility tags.
pub type TagSet = BTreeSet<String>;

/// Normalizes raw tag input into a [`TagSet`].
///
/// Tags are trimmed and blank tags dropped. Case is preserved since tags are
/// compared verbatim by the visibility resolver.
pub fn normalize_tags<I, S>(raw: I) -> AppResult<TagSet>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut tags = TagSet::new();
    for tag in raw {
        let trimmed = tag.as_ref().trim();
        if trimmed.is_empty() {
            continue;
        }

        if trimmed.chars().count() > TAG_MAX_LENGTH {
            return Err(AppError::Validation(format!(
                "tag '{trimmed}' exceeds {TAG_MAX_LENGTH} characters"
            )));
        }

        tags.insert(trimmed.to_owned());
    }

    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::normalize_tags;

    #[test]
    fn tags_are_trimmed_and_deduplicated() {
        let tags = normalize_tags([" Treino", "Treino ", "", "  ", "Único"]);
        let tags = tags.unwrap_or_default();
        assert_eq!(
            tags.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["Treino", "Único"]
        );
    }

    #[test]
    fn oversized_tag_is_rejected() {
        assert!(normalize_tags(["x".repeat(65)]).is_err());
    }
}
