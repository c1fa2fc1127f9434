use std::path::Path;

use serde::{Deserialize, Serialize};

use super::model::VolumeModel;
use crate::error::{read_to_string, ReferenceError};

pub const MPN_SCHEMA_V1: &str = "quantitray.mpn.v1";
const CSV_HEADER: &str = "large,small,mpn,lower,upper";

/// How an MPN value is to be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MpnQualifier {
    Exact,
    /// Reported as "<mpn" (no positive wells).
    LessThan,
    /// Reported as ">mpn" (every well positive).
    GreaterThan,
}

/// One table row: MPN per 100 mL with its 95% interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MpnTableEntry {
    pub large_positive: u32,
    pub small_positive: u32,
    pub mpn: f64,
    pub lower: f64,
    /// `None` = unbounded.
    pub upper: Option<f64>,
    pub qualifier: MpnQualifier,
}

impl MpnTableEntry {
    /// Display form as printed on the vendor table ("<1", "1986.3", ">2419.6").
    pub fn display_value(&self) -> String {
        match self.qualifier {
            MpnQualifier::Exact => format!("{:.1}", self.mpn),
            MpnQualifier::LessThan => format!("<{}", trim_decimal(self.mpn)),
            MpnQualifier::GreaterThan => format!(">{:.1}", self.mpn),
        }
    }
}

fn trim_decimal(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{:.1}", v)
    }
}

/// Row values printed on the vendor's Quanti-Tray/2000 table that replace the
/// generated ones. `interval: None` keeps the generated interval.
struct PublishedRow {
    large: u32,
    small: u32,
    mpn: f64,
    interval: Option<(f64, Option<f64>)>,
}

const QT2000_PUBLISHED: &[PublishedRow] = &[
    PublishedRow {
        large: 0,
        small: 0,
        mpn: 1.0,
        interval: Some((0.0, Some(3.7))),
    },
    PublishedRow {
        large: 1,
        small: 0,
        mpn: 1.0,
        interval: Some((0.3, Some(5.6))),
    },
    PublishedRow {
        large: 49,
        small: 47,
        mpn: 2419.6,
        interval: None,
    },
    PublishedRow {
        large: 49,
        small: 48,
        mpn: 2419.6,
        interval: Some((1439.5, None)),
    },
];

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// (small, large) keyed MPN table with O(1) lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct MpnTable {
    name: String,
    large_wells: u32,
    small_wells: u32,
    entries: Vec<MpnTableEntry>,
    index: Vec<Option<usize>>,
}

#[derive(Serialize)]
struct MpnTableFileRef<'a> {
    schema: &'static str,
    name: &'a str,
    large_wells: u32,
    small_wells: u32,
    entries: &'a [MpnTableEntry],
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct MpnTableFileV1 {
    schema: String,
    name: String,
    large_wells: u32,
    small_wells: u32,
    entries: Vec<MpnTableEntry>,
}

impl MpnTable {
    /// Build a table from explicit entries. Rejects duplicate keys, keys
    /// beyond the declared well counts and non-finite values.
    pub fn from_entries(
        name: impl Into<String>,
        large_wells: u32,
        small_wells: u32,
        entries: Vec<MpnTableEntry>,
    ) -> Result<Self, ReferenceError> {
        let n_keys = (large_wells as usize + 1) * (small_wells as usize + 1);
        let mut index = vec![None; n_keys];
        for (i, e) in entries.iter().enumerate() {
            if e.large_positive > large_wells || e.small_positive > small_wells {
                return Err(ReferenceError::invalid(format!(
                    "entry ({}, {}) exceeds the table size {}x{}",
                    e.large_positive, e.small_positive, large_wells, small_wells
                )));
            }
            let finite = e.mpn.is_finite()
                && e.lower.is_finite()
                && e.upper.map_or(true, f64::is_finite);
            if !finite || e.mpn < 0.0 || e.lower < 0.0 {
                return Err(ReferenceError::invalid(format!(
                    "entry ({}, {}) has invalid values",
                    e.large_positive, e.small_positive
                )));
            }
            let key =
                e.large_positive as usize * (small_wells as usize + 1) + e.small_positive as usize;
            if index[key].replace(i).is_some() {
                return Err(ReferenceError::invalid(format!(
                    "duplicate entry for ({}, {})",
                    e.large_positive, e.small_positive
                )));
            }
        }
        Ok(Self {
            name: name.into(),
            large_wells,
            small_wells,
            entries,
            index,
        })
    }

    /// Generate a complete table from a volume model. Values are rounded to
    /// one decimal.
    pub fn from_model(name: impl Into<String>, model: &VolumeModel) -> Self {
        let mut entries = Vec::new();
        // Largest finite MPN, reported for the saturated tray.
        let mut max_finite = 0.0f64;
        let mut saturated = None;
        for large in 0..=model.large_wells {
            for small in 0..=model.small_wells {
                let (lo, hi) = model.interval(large, small);
                let lower = round1(model.per_report_volume(lo));
                let upper = hi.map(|h| round1(model.per_report_volume(h)));
                let entry = match model.mle(large, small) {
                    Some(l) if large + small == 0 => {
                        debug_assert_eq!(l, 0.0);
                        MpnTableEntry {
                            large_positive: large,
                            small_positive: small,
                            mpn: 1.0,
                            lower: 0.0,
                            upper,
                            qualifier: MpnQualifier::LessThan,
                        }
                    }
                    Some(l) => {
                        let mpn = round1(model.per_report_volume(l));
                        max_finite = max_finite.max(mpn);
                        MpnTableEntry {
                            large_positive: large,
                            small_positive: small,
                            mpn,
                            lower,
                            upper,
                            qualifier: MpnQualifier::Exact,
                        }
                    }
                    None => {
                        saturated = Some(entries.len());
                        MpnTableEntry {
                            large_positive: large,
                            small_positive: small,
                            mpn: 0.0,
                            lower,
                            upper: None,
                            qualifier: MpnQualifier::GreaterThan,
                        }
                    }
                };
                entries.push(entry);
            }
        }
        if let Some(i) = saturated {
            entries[i].mpn = max_finite;
        }

        let n = entries.len();
        let index = (0..n).map(Some).collect();
        Self {
            name: name.into(),
            large_wells: model.large_wells,
            small_wells: model.small_wells,
            entries,
            index,
        }
    }

    /// Quanti-Tray/2000 table generated from [`VolumeModel::QUANTI_TRAY_2000`].
    ///
    /// Rows where the printed vendor table differs from the model (the
    /// all-positive limit `>2419.6`, the single-positive interval) carry the
    /// printed values.
    pub fn quanti_tray_2000() -> Self {
        let mut table = Self::from_model("quanti-tray-2000", &VolumeModel::QUANTI_TRAY_2000);
        table.apply_published(QT2000_PUBLISHED);
        table
    }

    fn apply_published(&mut self, rows: &[PublishedRow]) {
        for row in rows {
            let Some(i) = self.slot(row.small, row.large) else {
                continue;
            };
            let e = &mut self.entries[i];
            e.mpn = row.mpn;
            if let Some((lower, upper)) = row.interval {
                e.lower = lower;
                e.upper = upper;
            }
        }
    }

    fn slot(&self, small: u32, large: u32) -> Option<usize> {
        if small > self.small_wells || large > self.large_wells {
            return None;
        }
        self.index[large as usize * (self.small_wells as usize + 1) + small as usize]
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn large_wells(&self) -> u32 {
        self.large_wells
    }

    pub fn small_wells(&self) -> u32 {
        self.small_wells
    }

    pub fn entries(&self) -> &[MpnTableEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact lookup by positive counts.
    pub fn entry(&self, small: u32, large: u32) -> Option<&MpnTableEntry> {
        self.slot(small, large).map(|i| &self.entries[i])
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ReferenceError> {
        Self::from_json_str(&read_to_string(path)?)
    }

    pub fn from_json_str(data: &str) -> Result<Self, ReferenceError> {
        let file: MpnTableFileV1 = serde_json::from_str(data)?;
        if file.schema != MPN_SCHEMA_V1 {
            return Err(ReferenceError::Schema {
                found: file.schema,
                expected: MPN_SCHEMA_V1,
            });
        }
        Self::from_entries(file.name, file.large_wells, file.small_wells, file.entries)
    }

    pub fn to_json_string(&self) -> Result<String, ReferenceError> {
        let file = MpnTableFileRef {
            schema: MPN_SCHEMA_V1,
            name: &self.name,
            large_wells: self.large_wells,
            small_wells: self.small_wells,
            entries: &self.entries,
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    /// Load a CSV table for a tray with the given well counts. The table is
    /// named after the file stem.
    pub fn from_csv_file(
        path: &Path,
        large_wells: u32,
        small_wells: u32,
    ) -> Result<Self, ReferenceError> {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "csv".to_string());
        Self::from_csv_str(name, large_wells, small_wells, &read_to_string(path)?)
    }

    /// Parse `large,small,mpn,lower,upper` rows. `mpn` may carry a `<` or `>`
    /// prefix; an empty `upper` is unbounded.
    pub fn from_csv_str(
        name: impl Into<String>,
        large_wells: u32,
        small_wells: u32,
        data: &str,
    ) -> Result<Self, ReferenceError> {
        let mut entries = Vec::new();
        for (i, raw) in data.lines().enumerate() {
            let line_no = i + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line.eq_ignore_ascii_case(CSV_HEADER) {
                continue;
            }
            entries.push(parse_csv_row(line).map_err(|message| ReferenceError::Csv {
                line: line_no,
                message,
            })?);
        }
        Self::from_entries(name, large_wells, small_wells, entries)
    }

    pub fn to_csv(&self) -> String {
        let mut out = String::from(CSV_HEADER);
        out.push('\n');
        for e in &self.entries {
            let mpn = match e.qualifier {
                MpnQualifier::Exact => format!("{:.1}", e.mpn),
                MpnQualifier::LessThan => format!("<{:.1}", e.mpn),
                MpnQualifier::GreaterThan => format!(">{:.1}", e.mpn),
            };
            let upper = e.upper.map(|u| format!("{:.1}", u)).unwrap_or_default();
            out.push_str(&format!(
                "{},{},{},{:.1},{}\n",
                e.large_positive, e.small_positive, mpn, e.lower, upper
            ));
        }
        out
    }
}

fn parse_count(field: &str, what: &str) -> Result<u32, String> {
    field
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid {} count '{}'", what, field.trim()))
}

fn parse_value(field: &str, what: &str) -> Result<f64, String> {
    let v = field
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("invalid {} value '{}'", what, field.trim()))?;
    if !v.is_finite() {
        return Err(format!("non-finite {} value", what));
    }
    Ok(v)
}

fn parse_csv_row(line: &str) -> Result<MpnTableEntry, String> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != 5 {
        return Err(format!("expected 5 fields, found {}", fields.len()));
    }
    let large_positive = parse_count(fields[0], "large")?;
    let small_positive = parse_count(fields[1], "small")?;
    let mpn_field = fields[2].trim();
    let (qualifier, mpn_text) = if let Some(rest) = mpn_field.strip_prefix('<') {
        (MpnQualifier::LessThan, rest)
    } else if let Some(rest) = mpn_field.strip_prefix('>') {
        (MpnQualifier::GreaterThan, rest)
    } else {
        (MpnQualifier::Exact, mpn_field)
    };
    let mpn = parse_value(mpn_text, "mpn")?;
    let lower = parse_value(fields[3], "lower")?;
    let upper = if fields[4].trim().is_empty() {
        None
    } else {
        Some(parse_value(fields[4], "upper")?)
    };
    Ok(MpnTableEntry {
        large_positive,
        small_positive,
        mpn,
        lower,
        upper,
        qualifier,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_table_is_complete() {
        let t = MpnTable::quanti_tray_2000();
        assert_eq!(t.len(), 50 * 49);
        for large in 0..=49 {
            for small in 0..=48 {
                let e = t.entry(small, large).unwrap();
                assert_eq!((e.large_positive, e.small_positive), (large, small));
            }
        }
        assert!(t.entry(49, 0).is_none());
        assert!(t.entry(0, 50).is_none());
    }

    #[test]
    fn boundary_entries_are_qualified() {
        let t = MpnTable::quanti_tray_2000();
        let none = t.entry(0, 0).unwrap();
        assert_eq!(none.qualifier, MpnQualifier::LessThan);
        assert_eq!(none.mpn, 1.0);
        assert_eq!(none.display_value(), "<1");

        let all = t.entry(48, 49).unwrap();
        assert_eq!(all.qualifier, MpnQualifier::GreaterThan);
        assert!(all.upper.is_none());
        let max_exact = t
            .entries()
            .iter()
            .filter(|e| e.qualifier == MpnQualifier::Exact)
            .map(|e| e.mpn)
            .fold(0.0, f64::max);
        assert_eq!(all.mpn, max_exact);
        assert!(all.display_value().starts_with('>'));
    }

    #[test]
    fn builtin_table_matches_published_rows() {
        let t = MpnTable::quanti_tray_2000();
        // (large, small, mpn)
        for (large, small, mpn) in [
            (0, 1, 1.0),
            (1, 0, 1.0),
            (49, 42, 1299.7),
            (49, 43, 1413.6),
            (49, 44, 1553.1),
            (49, 45, 1732.9),
            (49, 46, 1986.3),
        ] {
            let e = t.entry(small, large).unwrap();
            assert_eq!(e.mpn, mpn, "({}, {})", large, small);
        }
        let none = t.entry(0, 0).unwrap();
        assert_eq!(none.upper, Some(3.7));
        assert_eq!(t.entry(47, 49).unwrap().mpn, 2419.6);
    }

    #[test]
    fn builtin_table_carries_printed_limits() {
        let t = MpnTable::quanti_tray_2000();
        let all = t.entry(48, 49).unwrap();
        assert_eq!(all.display_value(), ">2419.6");
        assert_eq!((all.lower, all.upper), (1439.5, None));

        let one = t.entry(0, 1).unwrap();
        assert_eq!(one.display_value(), "1.0");
        assert_eq!((one.lower, one.upper), (0.3, Some(5.6)));

        let none = t.entry(0, 0).unwrap();
        assert_eq!(none.display_value(), "<1");
        assert_eq!((none.lower, none.upper), (0.0, Some(3.7)));
    }

    #[test]
    fn generated_table_is_untouched_by_printed_rows() {
        let t = MpnTable::from_model("model", &VolumeModel::QUANTI_TRAY_2000);
        assert_eq!(t.entry(48, 49).unwrap().display_value(), ">2419.5");
        assert_eq!(t.entry(0, 1).unwrap().upper, Some(4.4));
    }

    #[test]
    fn exact_entries_have_ordered_intervals() {
        let t = MpnTable::quanti_tray_2000();
        for e in t.entries().iter().filter(|e| e.qualifier == MpnQualifier::Exact) {
            let upper = e.upper.unwrap();
            assert!(e.lower <= e.mpn && e.mpn <= upper, "{:?}", e);
        }
        assert_eq!(t.entry(0, 1).unwrap().mpn, 1.0);
    }

    #[test]
    fn csv_roundtrip_preserves_every_entry() {
        let t = MpnTable::quanti_tray_2000();
        let csv = t.to_csv();
        let back = MpnTable::from_csv_str(t.name(), 49, 48, &csv).unwrap();
        assert_eq!(back.entries(), t.entries());
    }

    #[test]
    fn json_roundtrip_preserves_every_entry() {
        let t = MpnTable::quanti_tray_2000();
        let json = t.to_json_string().unwrap();
        let back = MpnTable::from_json_str(&json).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn csv_accepts_vendor_notation() {
        let csv = "large,small,mpn,lower,upper\n0,0,<1,0.0,3.7\n1,0,1.0,0.3,5.6\n49,48,>2419.6,1439.5,\n";
        let t = MpnTable::from_csv_str("vendor", 49, 48, csv).unwrap();
        assert_eq!(t.len(), 3);
        let sat = t.entry(48, 49).unwrap();
        assert_eq!(sat.qualifier, MpnQualifier::GreaterThan);
        assert_eq!(sat.mpn, 2419.6);
        assert_eq!(sat.upper, None);
        assert_eq!(sat.display_value(), ">2419.6");
        assert!(t.entry(5, 5).is_none());
    }

    #[test]
    fn csv_errors_carry_line_numbers() {
        let csv = "large,small,mpn,lower,upper\n0,0,<1,0.0,3.7\n1,x,1.0,0.3,5.6\n";
        match MpnTable::from_csv_str("bad", 49, 48, csv) {
            Err(ReferenceError::Csv { line, .. }) => assert_eq!(line, 3),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn duplicate_and_oversized_keys_are_rejected() {
        let dup = "0,1,1.0,0.3,5.6\n0,1,1.0,0.3,5.6\n";
        assert!(matches!(
            MpnTable::from_csv_str("dup", 49, 48, dup),
            Err(ReferenceError::Invalid(_))
        ));
        let big = "50,0,1.0,0.3,5.6\n";
        assert!(matches!(
            MpnTable::from_csv_str("big", 49, 48, big),
            Err(ReferenceError::Invalid(_))
        ));
    }

    #[test]
    fn json_rejects_wrong_schema() {
        let json = r#"{"schema":"other","name":"x","large_wells":1,"small_wells":1,"entries":[]}"#;
        assert!(matches!(
            MpnTable::from_json_str(json),
            Err(ReferenceError::Schema { .. })
        ));
    }
}
