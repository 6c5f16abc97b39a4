//! Scan selection parsing and destination-path templates.

use crate::error::{Error, Result};

/// Parsed scan selection: individual numbers and inclusive ranges,
/// deduplicated and sorted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSelection {
    scans: Vec<u32>,
    text: String,
}

impl ScanSelection {
    /// Parses a comma-separated selector such as `"4-6,8"` into the
    /// sorted scan list `[4, 5, 6, 8]`.
    ///
    /// # Errors
    /// Returns `InvalidSelector` on empty parts, malformed numbers or
    /// descending ranges. Parsing is fail-fast: no work starts on a
    /// selector that is even partially malformed.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidSelector("empty scan selector".into()));
        }
        let mut scans = Vec::new();
        for part in trimmed.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(Error::InvalidSelector(format!(
                    "empty component in selector '{trimmed}'"
                )));
            }
            if let Some((lo, hi)) = part.split_once('-') {
                let lo = parse_scan(lo, part)?;
                let hi = parse_scan(hi, part)?;
                if hi < lo {
                    return Err(Error::InvalidSelector(format!(
                        "descending range '{part}'"
                    )));
                }
                scans.extend(lo..=hi);
            } else {
                scans.push(parse_scan(part, part)?);
            }
        }
        scans.sort_unstable();
        scans.dedup();
        Ok(Self {
            scans,
            text: trimmed.to_owned(),
        })
    }

    /// Selected scan numbers, ascending and unique.
    #[must_use]
    pub fn scans(&self) -> &[u32] {
        &self.scans
    }

    /// Lowest selected scan.
    #[must_use]
    pub fn first(&self) -> u32 {
        self.scans[0]
    }

    /// Highest selected scan.
    #[must_use]
    pub fn last(&self) -> u32 {
        self.scans[self.scans.len() - 1]
    }

    /// The selector text as given, trimmed.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of selected scans.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scans.len()
    }

    /// Always false: parsing rejects empty selectors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }
}

fn parse_scan(text: &str, context: &str) -> Result<u32> {
    text.trim().parse().map_err(|_| {
        Error::InvalidSelector(format!("bad scan number '{text}' in '{context}'"))
    })
}

/// Expands the `{first}`, `{last}` and `{range}` placeholders in a
/// destination template against a selection.
#[must_use]
pub fn destination_path(template: &str, selection: &ScanSelection) -> String {
    template
        .replace("{first}", &selection.first().to_string())
        .replace("{last}", &selection.last().to_string())
        .replace("{range}", selection.text())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_ranges_and_singles() {
        let sel = ScanSelection::parse("4-6,8").unwrap();
        assert_eq!(sel.scans(), &[4, 5, 6, 8]);
        assert_eq!(sel.first(), 4);
        assert_eq!(sel.last(), 8);
    }

    #[test]
    fn deduplicates_and_sorts() {
        let sel = ScanSelection::parse("7,3-5,4").unwrap();
        assert_eq!(sel.scans(), &[3, 4, 5, 7]);
    }

    #[test]
    fn rejects_malformed_selectors() {
        assert!(ScanSelection::parse("").is_err());
        assert!(ScanSelection::parse("3,,5").is_err());
        assert!(ScanSelection::parse("a-4").is_err());
        assert!(ScanSelection::parse("6-2").is_err());
    }

    #[test]
    fn substitutes_destination_placeholders() {
        let sel = ScanSelection::parse("4-6,8").unwrap();
        assert_eq!(
            destination_path("out_{first}-{last}.hdf5", &sel),
            "out_4-8.hdf5"
        );
        assert_eq!(destination_path("scan_{range}.hdf5", &sel), "scan_4-6,8.hdf5");
    }
}
