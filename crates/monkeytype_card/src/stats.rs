use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::error::{CardError, Result};

/// One personal-best entry. Upstream entries carry more fields (raw speed,
/// consistency, timestamps) which are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct Record {
    #[serde(default)]
    pub wpm: f64,
    #[serde(default)]
    pub acc: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersonalBests {
    #[serde(default)]
    pub time: Option<HashMap<String, Vec<Record>>>,
    #[serde(default)]
    pub words: Option<HashMap<String, Vec<Record>>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileData {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "personalBests", deserialize_with = "null_as_default")]
    pub personal_bests: PersonalBests,
}

/// `GET /users/{name}/profile` response envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Profile {
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: ProfileData,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Profile {
    /// Decodes the first JSON document in `body`; anything after it is ignored.
    pub fn from_json(body: &str) -> Result<Self> {
        match serde_json::Deserializer::from_str(body)
            .into_iter::<Self>()
            .next()
        {
            Some(profile) => Ok(profile?),
            // Blank body: the plain decoder reports the EOF error.
            None => Ok(serde_json::from_str(body)?),
        }
    }
}

/// Records for `mode`/`length`, best first as delivered upstream. Modes other
/// than `time` and `words` have no records.
#[must_use]
pub fn select_records<'a>(profile: &'a Profile, mode: &str, length: &str) -> &'a [Record] {
    let bests = &profile.data.personal_bests;
    let table = match mode {
        "time" => bests.time.as_ref(),
        "words" => bests.words.as_ref(),
        _ => None,
    };
    table
        .and_then(|table| table.get(length))
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// The first record for `mode`/`length`. Ordering is trusted, not verified.
pub fn best_record(profile: &Profile, mode: &str, length: &str) -> Result<Record> {
    select_records(profile, mode, length)
        .first()
        .copied()
        .ok_or_else(|| CardError::NoData {
            mode: mode.to_string(),
            length: length.to_string(),
        })
}

/// Where user profiles come from.
pub trait ProfileSource: Send + Sync {
    fn fetch_profile(&self, username: &str) -> Result<Profile>;
}

pub struct StatsFetcher {
    source: Arc<dyn ProfileSource>,
}

impl StatsFetcher {
    #[must_use]
    pub fn new(source: Arc<dyn ProfileSource>) -> Self {
        Self { source }
    }

    pub fn fetch(&self, username: &str, mode: &str, length: &str) -> Result<Record> {
        let profile = self.source.fetch_profile(username)?;
        let record = best_record(&profile, mode, length)?;
        debug!(
            user = %username,
            mode,
            length,
            wpm = record.wpm,
            acc = record.acc,
            "personal best selected"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::{Profile, ProfileSource, Record, StatsFetcher, best_record, select_records};
    use crate::error::{CardError, Result};

    struct StaticProfile(serde_json::Value);

    impl ProfileSource for StaticProfile {
        fn fetch_profile(&self, _username: &str) -> Result<Profile> {
            Profile::from_json(&self.0.to_string())
        }
    }

    fn sample_profile() -> Profile {
        Profile::from_json(
            &json!({
                "message": "Profile retrieved",
                "data": {
                    "name": "miodec",
                    "personalBests": {
                        "time": {
                            "60": [
                                { "wpm": 120, "acc": 97.5, "raw": 125.1, "consistency": 80 },
                                { "wpm": 100, "acc": 95 }
                            ],
                            "15": []
                        },
                        "words": {
                            "10": [{ "wpm": 150.2, "acc": 100 }]
                        }
                    }
                }
            })
            .to_string(),
        )
        .expect("sample profile decodes")
    }

    #[test]
    fn first_time_record_is_selected() {
        let profile = sample_profile();
        assert_eq!(profile.data.name, "miodec");
        let record = best_record(&profile, "time", "60").expect("time 60 record");
        assert_eq!(record, Record { wpm: 120.0, acc: 97.5 });
    }

    #[test]
    fn words_mode_uses_words_table() {
        let record = best_record(&sample_profile(), "words", "10").expect("words 10 record");
        assert_eq!(record.wpm, 150.2);
        assert_eq!(record.acc, 100.0);
    }

    #[test]
    fn unknown_mode_and_missing_length_have_no_records() {
        let profile = sample_profile();
        assert!(select_records(&profile, "quote", "60").is_empty());
        assert!(select_records(&profile, "time", "120").is_empty());
        assert!(select_records(&profile, "Time", "60").is_empty());
    }

    #[test]
    fn empty_bucket_reports_no_data() {
        match best_record(&sample_profile(), "time", "15").expect_err("empty bucket") {
            CardError::NoData { mode, length } => {
                assert_eq!(mode, "time");
                assert_eq!(length, "15");
            }
            other => panic!("expected NoData, got {other}"),
        }
    }

    #[test]
    fn profile_without_time_table_reports_no_data() {
        let profile = Profile::from_json(r#"{"data":{"personalBests":{"words":{}}}}"#)
            .expect("profile decodes");
        assert!(matches!(
            best_record(&profile, "time", "60"),
            Err(CardError::NoData { .. })
        ));

        let null_tables = Profile::from_json(r#"{"data":{"personalBests":{"time":null}}}"#)
            .expect("null table decodes");
        assert!(select_records(&null_tables, "time", "60").is_empty());
    }

    #[test]
    fn error_envelope_without_data_decodes_as_empty_profile() {
        let profile = Profile::from_json(r#"{"message":"User not found","data":null}"#)
            .expect("null data decodes");
        assert!(select_records(&profile, "time", "60").is_empty());

        let profile =
            Profile::from_json(r#"{"message":"User not found"}"#).expect("missing data decodes");
        assert!(select_records(&profile, "time", "60").is_empty());
    }

    #[test]
    fn mistyped_records_are_decode_errors() {
        let error = Profile::from_json(
            r#"{"data":{"personalBests":{"time":{"60":[{"wpm":"fast","acc":90}]}}}}"#,
        )
        .expect_err("string wpm should not decode");
        assert!(error.to_string().contains("JSON error"));
        assert!(Profile::from_json("<html>rate limited</html>").is_err());
    }

    #[test]
    fn bytes_after_the_profile_document_are_ignored() {
        let profile = Profile::from_json(
            "{\"data\":{\"personalBests\":{\"time\":{\"60\":[{\"wpm\":101,\"acc\":96}]}}}}\n<!-- cached -->",
        )
        .expect("leading document decodes");
        assert_eq!(
            best_record(&profile, "time", "60").expect("record"),
            Record { wpm: 101.0, acc: 96.0 }
        );

        let profile = Profile::from_json(r#"{"data":null} {"data":{"name":"second"}}"#)
            .expect("first of two documents decodes");
        assert_eq!(profile.data.name, "");
    }

    #[test]
    fn blank_profile_body_is_a_decode_error() {
        for body in ["", "  \n"] {
            let error = Profile::from_json(body).expect_err("blank body should fail");
            assert!(matches!(error, CardError::Json(_)));
        }
    }

    #[test]
    fn fetcher_propagates_selection_result() {
        let fetcher = StatsFetcher::new(Arc::new(StaticProfile(json!({
            "data": { "personalBests": { "time": { "60": [{ "wpm": 88.8, "acc": 91.25 }] } } }
        }))));

        let record = fetcher.fetch("someone", "time", "60").expect("record");
        assert_eq!(record.wpm, 88.8);
        assert!(fetcher.fetch("someone", "words", "60").is_err());
    }
}
