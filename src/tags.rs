//! Tag normalisation and counting.

use std::collections::{HashMap, HashSet};

use crate::models::TagCount;

/// Normalises a free-form tag string into a comma separated, de-duplicated
/// list. Commas and whitespace are both separators; the first occurrence of a
/// tag wins.
///
/// ```
/// use localnative_core::tags::make_tags;
/// assert_eq!(make_tags("this,is a tag"), "this,is,a,tag");
/// assert_eq!(make_tags(" , ,"), "");
/// ```
pub fn make_tags(input: &str) -> String {
    let mut seen = HashSet::new();
    input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(*t))
        .collect::<Vec<_>>()
        .join(",")
}

/// Counts lowercased tags across the given tag strings, most frequent first.
pub fn count_tags<I, S>(rows: I) -> Vec<TagCount>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut counts: HashMap<String, i64> = HashMap::new();
    for tags in rows {
        for tag in make_tags(tags.as_ref()).split(',') {
            if tag.is_empty() {
                continue;
            }
            *counts.entry(tag.to_lowercase()).or_insert(0) += 1;
        }
    }

    let mut tags: Vec<TagCount> = counts
        .into_iter()
        .map(|(tag, count)| TagCount { tag, count })
        .collect();
    tags.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_tags_separators() {
        assert_eq!(make_tags("this,is a tag"), "this,is,a,tag");
        assert_eq!(
            make_tags(" , , this,, is a tag,, that is another , ,tag, "),
            "this,is,a,tag,that,another"
        );
    }

    #[test]
    fn test_make_tags_empty() {
        assert_eq!(make_tags(""), "");
        assert_eq!(make_tags("  ,,\t"), "");
    }

    #[test]
    fn test_make_tags_is_idempotent() {
        let once = make_tags("rust  sqlite,rust\nsync");
        assert_eq!(once, "rust,sqlite,sync");
        assert_eq!(make_tags(&once), once);
    }

    #[test]
    fn test_count_tags_lowercases_and_orders() {
        let counted = count_tags(["Rust,sqlite", "rust", "", "sync,SQLite,rust"]);
        assert_eq!(
            counted,
            vec![
                TagCount { tag: "rust".into(), count: 3 },
                TagCount { tag: "sqlite".into(), count: 2 },
                TagCount { tag: "sync".into(), count: 1 },
            ]
        );
    }
}
