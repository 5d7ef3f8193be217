//! Field normalizers: pure functions turning raw metadata strings into typed values.

use chrono::{Datelike, Duration, NaiveDate};

use crate::reference::{CountryReferenceMap, GenderVocabulary};

/// Split a "continent / country / region" location into (ISO3 code, region).
///
/// The region is only taken from exactly three segments; any other segment
/// count leaves it empty. Unmapped country names yield `None`.
pub fn parse_location(
    raw: &str,
    countries: &CountryReferenceMap,
) -> (Option<String>, Option<String>) {
    let segments: Vec<&str> = raw.split('/').map(str::trim).collect();
    let country = segments
        .get(1)
        .and_then(|name| countries.lookup(name))
        .map(str::to_string);
    let region = if segments.len() == 3 {
        Some(segments[2].to_string())
    } else {
        None
    };
    (country, region)
}

/// Reconciled age bounds and gender for one record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AgeGender {
    pub age_lower: Option<f64>,
    pub age_upper: Option<f64>,
    pub gender: Option<String>,
}

/// What a single age-or-gender field turned out to contain.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldReading {
    Gender(String),
    /// Age-shaped text; `None` bounds mark an inverted range.
    Age(Option<(f64, f64)>),
    Unknown,
}

/// Classify one raw field as a gender token, an age value/range, or neither.
pub fn read_field(raw: Option<&str>, genders: &GenderVocabulary) -> FieldReading {
    let Some(text) = raw.map(str::trim).filter(|t| !t.is_empty()) else {
        return FieldReading::Unknown;
    };
    if genders.is_known_token(text) {
        return FieldReading::Gender(text.to_string());
    }
    match parse_age(text) {
        Some(bounds) => FieldReading::Age(bounds),
        None => FieldReading::Unknown,
    }
}

/// Parse "20", "20 - 29", "20-29" or "30 to 35".
///
/// Returns `None` when the text is not age-shaped, `Some(None)` for an
/// inverted range.
fn parse_age(text: &str) -> Option<Option<(f64, f64)>> {
    if let Some(value) = parse_age_value(text) {
        return Some(Some((value, value)));
    }
    let (lower, upper) = text.split_once("to").or_else(|| text.split_once('-'))?;
    let lower = parse_age_value(lower)?;
    let upper = parse_age_value(upper)?;
    if lower <= upper {
        Some(Some((lower, upper)))
    } else {
        Some(None)
    }
}

fn parse_finite(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Ages are finite and non-negative.
fn parse_age_value(text: &str) -> Option<f64> {
    parse_finite(text).filter(|v| *v >= 0.0)
}

/// Whether a raw value parses as a finite number.
pub fn is_finite_number(raw: Option<&str>) -> bool {
    raw.and_then(parse_finite).is_some()
}

/// Reconcile the "Patient age" and "Gender" fields, tolerating swapped columns.
///
/// Whichever field reads as a gender token supplies the gender; the other one
/// is parsed as age. Inverted ranges leave both bounds empty.
pub fn reconcile_age_gender(
    age_field: Option<&str>,
    gender_field: Option<&str>,
    genders: &GenderVocabulary,
) -> AgeGender {
    let age_reading = read_field(age_field, genders);
    let gender_reading = read_field(gender_field, genders);

    let gender = match (&gender_reading, &age_reading) {
        (FieldReading::Gender(g), _) | (_, FieldReading::Gender(g)) => Some(g.clone()),
        _ => None,
    };
    let bounds = match (&age_reading, &gender_reading) {
        (FieldReading::Age(b), _) | (_, FieldReading::Age(b)) => *b,
        _ => None,
    };

    AgeGender {
        age_lower: bounds.map(|(lower, _)| lower),
        age_upper: bounds.map(|(_, upper)| upper),
        gender,
    }
}

fn bucket_of(age: f64) -> Option<String> {
    if !age.is_finite() || age < 0.0 {
        return None;
    }
    let label = if age < 1.0 {
        "< 1".to_string()
    } else if age < 5.0 {
        "1 – 5".to_string()
    } else if age < 10.0 {
        "5 – 10".to_string()
    } else if age < 80.0 {
        let decade = (age / 10.0).floor() as u32 * 10;
        format!("{} – {}", decade, decade + 10)
    } else {
        ">= 80".to_string()
    };
    Some(label)
}

/// Age-group label for a reconciled range; empty when the range spans buckets.
pub fn age_to_bucket(age_lower: Option<f64>, age_upper: Option<f64>) -> String {
    match (age_lower.and_then(bucket_of), age_upper.and_then(bucket_of)) {
        (Some(lower), Some(upper)) if lower == upper => lower,
        _ => String::new(),
    }
}

/// True iff the variant text names `VOC <tracked_variant>`.
pub fn variant_flag(variant_text: Option<&str>, tracked_variant: &str) -> bool {
    variant_text
        .map(|text| text.contains(&format!("VOC {tracked_variant}")))
        .unwrap_or(false)
}

/// First day (a Sunday) of epidemiological week 1 of `year`.
///
/// Week 1 is the first Sunday-started week holding at least four days of the year.
fn epiyear_start(year: i32) -> Option<NaiveDate> {
    let jan1 = NaiveDate::from_ymd_opt(year, 1, 1)?;
    let offset = jan1.weekday().num_days_from_sunday() as i64;
    if offset <= 3 {
        Some(jan1 - Duration::days(offset))
    } else {
        Some(jan1 + Duration::days(7 - offset))
    }
}

/// Epidemiological (year, week) for a calendar date.
pub fn epiweek(date: NaiveDate) -> Option<(i32, u32)> {
    let mut year = date.year();
    let mut start = epiyear_start(year)?;
    if date < start {
        year -= 1;
        start = epiyear_start(year)?;
    } else {
        let next = epiyear_start(year + 1)?;
        if date >= next {
            year += 1;
            start = next;
        }
    }
    let week = (date - start).num_days() / 7 + 1;
    Some((year, week as u32))
}

/// Exactly `YYYY-MM-DD`: no sign, no unpadded fields.
fn is_iso_date_shaped(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

/// "YYYY-MM-DD" → "YYYYWW" epiweek label; `None` when the date does not parse.
pub fn to_epiweek(date_string: &str) -> Option<String> {
    if !is_iso_date_shaped(date_string) {
        return None;
    }
    let date = NaiveDate::parse_from_str(date_string, "%Y-%m-%d").ok()?;
    let (year, week) = epiweek(date)?;
    Some(format!("{year:04}{week:02}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn countries() -> CountryReferenceMap {
        CountryReferenceMap::from_pairs([("Argentina", "ARG"), ("Brazil", "BRA")])
    }

    #[test]
    fn location_with_region() {
        assert_eq!(
            parse_location("South America / Argentina / Buenos Aires", &countries()),
            (Some("ARG".to_string()), Some("Buenos Aires".to_string()))
        );
    }

    #[test]
    fn location_without_region() {
        assert_eq!(
            parse_location("South America / Argentina", &countries()),
            (Some("ARG".to_string()), None)
        );
    }

    #[test]
    fn location_with_extra_segments_drops_region() {
        assert_eq!(
            parse_location("South America / Brazil / Sao Paulo / Campinas", &countries()),
            (Some("BRA".to_string()), None)
        );
    }

    #[test]
    fn location_unmapped_or_short() {
        assert_eq!(
            parse_location("Europe / Atlantis / Capital", &countries()),
            (None, Some("Capital".to_string()))
        );
        assert_eq!(parse_location("Argentina", &countries()), (None, None));
    }

    fn ag(lower: Option<f64>, upper: Option<f64>, gender: &str) -> AgeGender {
        AgeGender {
            age_lower: lower,
            age_upper: upper,
            gender: Some(gender.to_string()),
        }
    }

    #[test]
    fn reconcile_single_age() {
        let vocab = GenderVocabulary::default();
        assert_eq!(
            reconcile_age_gender(Some("20"), Some("Male"), &vocab),
            ag(Some(20.0), Some(20.0), "Male")
        );
    }

    #[test]
    fn reconcile_is_order_independent() {
        let vocab = GenderVocabulary::default();
        let cases = [("20", "Male"), ("30 to 35", "F"), ("20 - 29", "F"), ("30 - 50", "M")];
        for (age, gender) in cases {
            assert_eq!(
                reconcile_age_gender(Some(age), Some(gender), &vocab),
                reconcile_age_gender(Some(gender), Some(age), &vocab),
                "{age} / {gender}"
            );
        }
        assert_eq!(
            reconcile_age_gender(Some("F"), Some("30 to 35"), &vocab),
            ag(Some(30.0), Some(35.0), "F")
        );
    }

    #[test]
    fn reconcile_ranges() {
        let vocab = GenderVocabulary::default();
        assert_eq!(
            reconcile_age_gender(Some("20 - 29"), Some("F"), &vocab),
            ag(Some(20.0), Some(29.0), "F")
        );
        assert_eq!(
            reconcile_age_gender(Some("20-29"), Some("F"), &vocab),
            ag(Some(20.0), Some(29.0), "F")
        );
    }

    #[test]
    fn reconcile_inverted_range_is_empty() {
        let vocab = GenderVocabulary::default();
        assert_eq!(
            reconcile_age_gender(Some("29 - 20"), Some("F"), &vocab),
            ag(None, None, "F")
        );
    }

    #[test]
    fn negative_ages_are_not_ages() {
        let vocab = GenderVocabulary::default();
        let result = reconcile_age_gender(Some("-5"), Some("M"), &vocab);
        assert_eq!(result, AgeGender { gender: Some("M".to_string()), ..Default::default() });
        assert_eq!(read_field(Some("-5"), &vocab), FieldReading::Unknown);
        assert_eq!(read_field(Some("0"), &vocab), FieldReading::Age(Some((0.0, 0.0))));
    }

    #[test]
    fn reconcile_without_gender_token() {
        let vocab = GenderVocabulary::default();
        let result = reconcile_age_gender(Some("45"), Some("unknown"), &vocab);
        assert_eq!(result.age_lower, Some(45.0));
        assert_eq!(result.gender, None);

        let result = reconcile_age_gender(None, None, &vocab);
        assert_eq!(result, AgeGender::default());
    }

    #[test]
    fn reconcile_uses_vocabulary_tokens() {
        let vocab =
            GenderVocabulary::from_json_str(r#"{"ARG": {"Female": ["mujer"], "Male": "hombre"}}"#)
                .unwrap();
        assert_eq!(
            reconcile_age_gender(Some("Mujer"), Some("61"), &vocab),
            ag(Some(61.0), Some(61.0), "Mujer")
        );
    }

    #[test]
    fn age_buckets() {
        assert_eq!(age_to_bucket(Some(20.0), Some(25.0)), "20 – 30");
        assert_eq!(age_to_bucket(Some(3.0), Some(4.0)), "1 – 5");
        assert_eq!(age_to_bucket(Some(20.0), Some(35.0)), "");
        assert_eq!(age_to_bucket(Some(0.5), Some(0.5)), "< 1");
        assert_eq!(age_to_bucket(Some(5.0), Some(9.0)), "5 – 10");
        assert_eq!(age_to_bucket(Some(70.0), Some(79.0)), "70 – 80");
        assert_eq!(age_to_bucket(Some(85.0), Some(101.0)), ">= 80");
        assert_eq!(age_to_bucket(None, None), "");
        assert_eq!(age_to_bucket(Some(-3.0), Some(-3.0)), "");
    }

    #[test]
    fn variant_flags() {
        assert!(variant_flag(Some("VOC Omicron GRA (B.1.1.529+BA.*)"), "Omicron"));
        assert!(!variant_flag(Some("VOC Omicron GRA"), "Delta"));
        assert!(!variant_flag(Some("voc omicron"), "Omicron"));
        assert!(!variant_flag(None, "Omicron"));
    }

    #[test]
    fn epiweeks_match_reference_dates() {
        assert_eq!(to_epiweek("2022-01-01").as_deref(), Some("202152"));
        assert_eq!(to_epiweek("2022-01-20").as_deref(), Some("202203"));
        assert_eq!(to_epiweek("2021-12-12").as_deref(), Some("202150"));
    }

    #[test]
    fn epiweeks_at_year_boundaries() {
        assert_eq!(to_epiweek("2020-12-31").as_deref(), Some("202053"));
        assert_eq!(to_epiweek("2019-12-31").as_deref(), Some("202001"));
        assert_eq!(to_epiweek("2021-01-03").as_deref(), Some("202101"));
        assert_eq!(to_epiweek("2021-01-02").as_deref(), Some("202053"));
    }

    #[test]
    fn epiweek_of_unparseable_date_is_none() {
        assert_eq!(to_epiweek("2021-06"), None);
        assert_eq!(to_epiweek(""), None);
        assert_eq!(to_epiweek("not a date"), None);
        assert_eq!(to_epiweek("2022-1-1"), None);
        assert_eq!(to_epiweek("+2022-01-01"), None);
        assert_eq!(to_epiweek("2022-01-01 "), None);
        assert_eq!(to_epiweek("2022-02-30"), None);
    }

    #[test]
    fn finite_numbers() {
        assert!(is_finite_number(Some(" 42 ")));
        assert!(is_finite_number(Some("3.5")));
        assert!(!is_finite_number(Some("nan")));
        assert!(!is_finite_number(Some("unknown")));
        assert!(!is_finite_number(None));
    }
}
