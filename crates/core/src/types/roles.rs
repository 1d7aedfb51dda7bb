//! Broker role labels.

/// Normalize a set of broker role labels.
///
/// Labels are trimmed and lowercased; empty labels are dropped and the result
/// is sorted with duplicates removed, so two equivalent selections always
/// produce the same stored value.
///
/// ```
/// use foodi_core::normalize_role_labels;
///
/// let labels = normalize_role_labels([" Kitchen", "kitchen", "", "DRIVER "]);
/// assert_eq!(labels, vec!["driver".to_owned(), "kitchen".to_owned()]);
/// ```
pub fn normalize_role_labels<I, S>(labels: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut normalized: Vec<String> = labels
        .into_iter()
        .map(|label| label.as_ref().trim().to_lowercase())
        .filter(|label| !label.is_empty())
        .collect();
    normalized.sort_unstable();
    normalized.dedup();
    normalized
}
