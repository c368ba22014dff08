//! Timezone vocabulary conversion
//!
//! Remote calendars report zones either as IANA names (`America/New_York`) or
//! as Windows display ids (`Eastern Standard Time`). Values from either
//! vocabulary are wrapped in [`TimeZoneName`] as soon as they enter the
//! domain and are resolved to a `chrono_tz::Tz` only at the point of use.

use std::collections::HashMap;
use std::fmt;

use chrono_tz::Tz;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Windows zone id to canonical IANA zone (CLDR "001" territory mapping).
const WINDOWS_TO_IANA: &[(&str, &str)] = &[
    ("Dateline Standard Time", "Etc/GMT+12"),
    ("UTC-11", "Etc/GMT+11"),
    ("Aleutian Standard Time", "America/Adak"),
    ("Hawaiian Standard Time", "Pacific/Honolulu"),
    ("Alaskan Standard Time", "America/Anchorage"),
    ("Pacific Standard Time (Mexico)", "America/Tijuana"),
    ("Pacific Standard Time", "America/Los_Angeles"),
    ("US Mountain Standard Time", "America/Phoenix"),
    ("Mountain Standard Time (Mexico)", "America/Mazatlan"),
    ("Mountain Standard Time", "America/Denver"),
    ("Central America Standard Time", "America/Guatemala"),
    ("Central Standard Time", "America/Chicago"),
    ("Central Standard Time (Mexico)", "America/Mexico_City"),
    ("Canada Central Standard Time", "America/Regina"),
    ("SA Pacific Standard Time", "America/Bogota"),
    ("Eastern Standard Time (Mexico)", "America/Cancun"),
    ("Eastern Standard Time", "America/New_York"),
    ("US Eastern Standard Time", "America/Indianapolis"),
    ("Venezuela Standard Time", "America/Caracas"),
    ("Atlantic Standard Time", "America/Halifax"),
    ("SA Western Standard Time", "America/La_Paz"),
    ("Pacific SA Standard Time", "America/Santiago"),
    ("Newfoundland Standard Time", "America/St_Johns"),
    ("E. South America Standard Time", "America/Sao_Paulo"),
    ("Argentina Standard Time", "America/Buenos_Aires"),
    ("SA Eastern Standard Time", "America/Cayenne"),
    ("Greenland Standard Time", "America/Godthab"),
    ("UTC-02", "Etc/GMT+2"),
    ("Azores Standard Time", "Atlantic/Azores"),
    ("Cape Verde Standard Time", "Atlantic/Cape_Verde"),
    ("UTC", "Etc/UTC"),
    ("GMT Standard Time", "Europe/London"),
    ("Greenwich Standard Time", "Atlantic/Reykjavik"),
    ("Morocco Standard Time", "Africa/Casablanca"),
    ("W. Europe Standard Time", "Europe/Berlin"),
    ("Central Europe Standard Time", "Europe/Budapest"),
    ("Romance Standard Time", "Europe/Paris"),
    ("Central European Standard Time", "Europe/Warsaw"),
    ("W. Central Africa Standard Time", "Africa/Lagos"),
    ("GTB Standard Time", "Europe/Bucharest"),
    ("Middle East Standard Time", "Asia/Beirut"),
    ("Egypt Standard Time", "Africa/Cairo"),
    ("E. Europe Standard Time", "Europe/Chisinau"),
    ("South Africa Standard Time", "Africa/Johannesburg"),
    ("FLE Standard Time", "Europe/Kiev"),
    ("Israel Standard Time", "Asia/Jerusalem"),
    ("Kaliningrad Standard Time", "Europe/Kaliningrad"),
    ("Jordan Standard Time", "Asia/Amman"),
    ("Arabic Standard Time", "Asia/Baghdad"),
    ("Turkey Standard Time", "Europe/Istanbul"),
    ("Arab Standard Time", "Asia/Riyadh"),
    ("Russian Standard Time", "Europe/Moscow"),
    ("E. Africa Standard Time", "Africa/Nairobi"),
    ("Iran Standard Time", "Asia/Tehran"),
    ("Arabian Standard Time", "Asia/Dubai"),
    ("Azerbaijan Standard Time", "Asia/Baku"),
    ("Georgian Standard Time", "Asia/Tbilisi"),
    ("Afghanistan Standard Time", "Asia/Kabul"),
    ("West Asia Standard Time", "Asia/Tashkent"),
    ("Pakistan Standard Time", "Asia/Karachi"),
    ("India Standard Time", "Asia/Calcutta"),
    ("Sri Lanka Standard Time", "Asia/Colombo"),
    ("Nepal Standard Time", "Asia/Katmandu"),
    ("Central Asia Standard Time", "Asia/Almaty"),
    ("Bangladesh Standard Time", "Asia/Dhaka"),
    ("Myanmar Standard Time", "Asia/Rangoon"),
    ("SE Asia Standard Time", "Asia/Bangkok"),
    ("China Standard Time", "Asia/Shanghai"),
    ("Singapore Standard Time", "Asia/Singapore"),
    ("W. Australia Standard Time", "Australia/Perth"),
    ("Taipei Standard Time", "Asia/Taipei"),
    ("Tokyo Standard Time", "Asia/Tokyo"),
    ("Korea Standard Time", "Asia/Seoul"),
    ("Cen. Australia Standard Time", "Australia/Adelaide"),
    ("AUS Central Standard Time", "Australia/Darwin"),
    ("E. Australia Standard Time", "Australia/Brisbane"),
    ("AUS Eastern Standard Time", "Australia/Sydney"),
    ("West Pacific Standard Time", "Pacific/Port_Moresby"),
    ("Tasmania Standard Time", "Australia/Hobart"),
    ("Vladivostok Standard Time", "Asia/Vladivostok"),
    ("Central Pacific Standard Time", "Pacific/Guadalcanal"),
    ("New Zealand Standard Time", "Pacific/Auckland"),
    ("UTC+12", "Etc/GMT-12"),
    ("Fiji Standard Time", "Pacific/Fiji"),
    ("Tonga Standard Time", "Pacific/Tongatapu"),
    ("Samoa Standard Time", "Pacific/Apia"),
    ("Line Islands Standard Time", "Pacific/Kiritimati"),
];

static WINDOWS_INDEX: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| WINDOWS_TO_IANA.iter().copied().collect());

static IANA_INDEX: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| WINDOWS_TO_IANA.iter().map(|(win, iana)| (*iana, *win)).collect());

/// A timezone name in either the Windows or the IANA vocabulary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeZoneName(String);

impl TimeZoneName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn utc() -> Self {
        Self("UTC".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Resolve to a concrete zone. An empty name resolves to UTC; unknown
    /// names resolve to `None`.
    pub fn to_tz(&self) -> Option<Tz> {
        let name = self.0.trim();
        if name.is_empty() {
            return Some(Tz::UTC);
        }
        if let Ok(tz) = name.parse::<Tz>() {
            return Some(tz);
        }
        WINDOWS_INDEX.get(name).and_then(|iana| iana.parse::<Tz>().ok())
    }

    /// Resolve to a concrete zone, falling back to UTC.
    pub fn tz_or_utc(&self) -> Tz {
        self.to_tz().unwrap_or(Tz::UTC)
    }

    /// Windows id for this zone, as expected by Graph request headers.
    pub fn windows_name(&self) -> String {
        if WINDOWS_INDEX.contains_key(self.0.as_str()) {
            return self.0.clone();
        }
        IANA_INDEX.get(self.0.as_str()).map_or_else(|| self.0.clone(), |win| (*win).to_string())
    }
}

impl fmt::Display for TimeZoneName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TimeZoneName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TimeZoneName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_mapped_zone_resolves() {
        for (windows, iana) in WINDOWS_TO_IANA {
            assert!(iana.parse::<Tz>().is_ok(), "{windows} -> {iana} does not parse");
        }
    }

    #[test]
    fn windows_names_resolve_to_iana() {
        let tz = TimeZoneName::new("Eastern Standard Time").to_tz();
        assert_eq!(tz, Some(chrono_tz::America::New_York));
    }

    #[test]
    fn iana_names_pass_through() {
        let tz = TimeZoneName::new("Europe/Paris").to_tz();
        assert_eq!(tz, Some(chrono_tz::Europe::Paris));
    }

    #[test]
    fn empty_name_is_utc_and_unknown_is_none() {
        assert_eq!(TimeZoneName::default().to_tz(), Some(Tz::UTC));
        assert_eq!(TimeZoneName::new("Mars Standard Time").to_tz(), None);
        assert_eq!(TimeZoneName::new("Mars Standard Time").tz_or_utc(), Tz::UTC);
    }

    #[test]
    fn windows_name_maps_back_from_iana() {
        assert_eq!(TimeZoneName::new("America/Los_Angeles").windows_name(), "Pacific Standard Time");
        assert_eq!(TimeZoneName::new("Tokyo Standard Time").windows_name(), "Tokyo Standard Time");
        assert_eq!(TimeZoneName::new("Nowhere/Special").windows_name(), "Nowhere/Special");
    }
}
