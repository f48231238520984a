/**
 * TIME NORMALIZER - Normalisation des heures de la journée
 *
 * RÔLE : Les feuilles mélangent cellules date-heure et texte ("08:30:00", "08:30").
 * Tout est ramené sur une date de référence unique pour pouvoir soustraire deux
 * valeurs et obtenir une durée.
 *
 * RÈGLE : une valeur illisible remonte une FormatError, jamais de valeur par défaut.
 */

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};

const WITH_SECONDS: &str = "%H:%M:%S";
const WITHOUT_SECONDS: &str = "%H:%M";

/// Heure illisible (ni HH:MM:SS ni HH:MM)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Time format for '{value}' is incorrect")]
pub struct FormatError {
    pub value: String,
}

/// Valeur brute d'une cellule horaire
#[derive(Debug, Clone, Copy)]
pub enum TimeInput<'a> {
    DateTime(NaiveDateTime),
    Text(&'a str),
}

/// Parse "HH:MM:SS" puis "HH:MM"
pub fn parse_time_of_day(raw: &str) -> Result<NaiveTime, FormatError> {
    let trimmed = raw.trim();
    NaiveTime::parse_from_str(trimmed, WITH_SECONDS)
        .or_else(|_| NaiveTime::parse_from_str(trimmed, WITHOUT_SECONDS))
        .map_err(|_| FormatError { value: raw.to_string() })
}

#[derive(Debug, Clone, Copy)]
pub struct TimeNormalizer {
    reference: NaiveDate,
}

impl TimeNormalizer {
    pub fn on(reference: NaiveDate) -> Self {
        Self { reference }
    }

    /// Date de référence = aujourd'hui (heure locale), comme le tableau de bord
    pub fn today() -> Self {
        Self::on(Local::now().date_naive())
    }

    pub fn reference(&self) -> NaiveDate {
        self.reference
    }

    pub fn normalize(&self, input: TimeInput<'_>) -> Result<NaiveDateTime, FormatError> {
        let time = match input {
            TimeInput::DateTime(dt) => dt.time(),
            TimeInput::Text(raw) => parse_time_of_day(raw)?,
        };
        Ok(self.reference.and_time(time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn test_parse_with_and_without_seconds() {
        assert_eq!(parse_time_of_day("08:30:15").unwrap(), NaiveTime::from_hms_opt(8, 30, 15).unwrap());
        assert_eq!(parse_time_of_day("08:30").unwrap(), NaiveTime::from_hms_opt(8, 30, 0).unwrap());
        assert_eq!(parse_time_of_day("23:59:59").unwrap(), NaiveTime::from_hms_opt(23, 59, 59).unwrap());
        assert_eq!(parse_time_of_day(" 07:05 ").unwrap(), NaiveTime::from_hms_opt(7, 5, 0).unwrap());
    }

    #[test]
    fn test_rejects_anything_else() {
        for raw in ["", "8h30", "25:00", "12:61", "noon", "12:30:00 PM", "2024-03-01"] {
            let err = parse_time_of_day(raw).unwrap_err();
            assert_eq!(err.value, raw);
        }
    }

    #[test]
    fn test_normalize_lands_on_reference_date() {
        let norm = TimeNormalizer::on(reference());
        let from_text = norm.normalize(TimeInput::Text("14:05")).unwrap();
        assert_eq!(from_text, reference().and_hms_opt(14, 5, 0).unwrap());

        // la date d'origine de la cellule est ignorée
        let cell = NaiveDate::from_ymd_opt(1899, 12, 30).unwrap().and_hms_opt(9, 0, 0).unwrap();
        let from_cell = norm.normalize(TimeInput::DateTime(cell)).unwrap();
        assert_eq!(from_cell, reference().and_hms_opt(9, 0, 0).unwrap());
        assert_eq!((from_text - from_cell).num_minutes(), 305);
    }

    #[test]
    fn test_normalize_propagates_format_error() {
        let norm = TimeNormalizer::on(reference());
        let err = norm.normalize(TimeInput::Text("soon")).unwrap_err();
        assert_eq!(err.to_string(), "Time format for 'soon' is incorrect");
    }
}
