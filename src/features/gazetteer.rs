//! Closed word lists consulted when `Families::GAZETTEER` is enabled.

const MONTHS: &[&str] = &[
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december", "jan", "feb", "mar", "apr", "jun", "jul", "aug", "sep",
    "sept", "oct", "nov", "dec",
];

const WEEKDAYS: &[&str] = &[
    "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday", "mon", "tue",
    "wed", "thu", "fri", "sat", "sun",
];

const TITLES: &[&str] = &[
    "mr", "mrs", "ms", "miss", "dr", "prof", "sir", "madam", "lord", "lady", "president",
    "senator", "judge", "rev", "st",
];

const ORG_SUFFIXES: &[&str] = &[
    "inc", "corp", "corporation", "ltd", "llc", "plc", "co", "gmbh", "ag", "sa", "group",
    "university", "institute", "association", "foundation",
];

/// Gazetteer categories a word belongs to.
pub fn lookup(word: &str) -> impl Iterator<Item = &'static str> {
    let key = word.trim_end_matches('.').to_lowercase();
    [
        ("month", MONTHS),
        ("weekday", WEEKDAYS),
        ("title", TITLES),
        ("org_suffix", ORG_SUFFIXES),
    ]
    .into_iter()
    .filter(move |(_, list)| list.contains(&key.as_str()))
    .map(|(name, _)| name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(lookup("March").collect::<Vec<_>>(), vec!["month"]);
        assert_eq!(lookup("Dr.").collect::<Vec<_>>(), vec!["title"]);
        assert_eq!(lookup("Inc.").collect::<Vec<_>>(), vec!["org_suffix"]);
        assert!(lookup("cat").next().is_none());
    }
}
