use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Control keys start with a NUL byte, which never appears in a path key.
pub const CONTROL_PREFIX: u8 = 0;
const MESSAGE_KEY: &[u8] = b"\0message";
const CREATED_KEY: &[u8] = b"\0created";

/// One tracked file: its content is the concatenation of `chunks` in order.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct FileRecord {
    #[serde(skip)]
    pub name: String,
    pub chunks: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Version {
    pub message: String,
    pub created: Option<DateTime<Utc>>,
    pub files: BTreeMap<String, FileRecord>,
}

impl Version {
    /// Ledger entries for this version: control keys first, then one key per path.
    pub fn to_entries(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut out = Vec::with_capacity(self.files.len() + 2);
        out.push((MESSAGE_KEY.to_vec(), self.message.as_bytes().to_vec()));
        if let Some(created) = self.created {
            let ts = created.to_rfc3339_opts(SecondsFormat::Secs, true);
            out.push((CREATED_KEY.to_vec(), ts.into_bytes()));
        }
        for (name, record) in &self.files {
            let data = serde_json::to_vec(record)
                .map_err(|e| Error::corrupted(format!("cannot encode {name}: {e}")))?;
            out.push((name.as_bytes().to_vec(), data));
        }
        Ok(out)
    }

    /// Rebuild a version from its ledger entries. Unknown control keys are ignored.
    pub fn from_entries<I>(entries: I) -> Result<Version>
    where
        I: IntoIterator<Item = (Vec<u8>, Vec<u8>)>,
    {
        let mut ver = Version::default();
        for (key, value) in entries {
            if key.first() == Some(&CONTROL_PREFIX) {
                match key.as_slice() {
                    MESSAGE_KEY => {
                        ver.message = String::from_utf8(value)
                            .map_err(|_| Error::corrupted("message is not utf-8"))?;
                    }
                    CREATED_KEY => {
                        let ts = std::str::from_utf8(&value)
                            .map_err(|_| Error::corrupted("timestamp is not utf-8"))?;
                        let parsed = DateTime::parse_from_rfc3339(ts)
                            .map_err(|e| Error::corrupted(format!("bad timestamp {ts:?}: {e}")))?;
                        ver.created = Some(parsed.with_timezone(&Utc));
                    }
                    _ => {}
                }
                continue;
            }
            let name = String::from_utf8(key)
                .map_err(|_| Error::corrupted("file name is not utf-8"))?;
            let mut record: FileRecord = serde_json::from_slice(&value)
                .map_err(|e| Error::corrupted(format!("invalid state for file {name}: {e}")))?;
            record.name = name.clone();
            ver.files.insert(name, record);
        }
        Ok(ver)
    }
}

/// Parse `v3` or `3` into a version number.
pub fn parse_version_ref(s: &str) -> Result<u64> {
    let digits = s.strip_prefix('v').unwrap_or(s);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidVersionRef(s.to_string()));
    }
    digits.parse().map_err(|_| Error::InvalidVersionRef(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_refs() {
        assert_eq!(parse_version_ref("v0").unwrap(), 0);
        assert_eq!(parse_version_ref("12").unwrap(), 12);
        for bad in ["", "v", "x1", "v-1", "v1.0", "vv2"] {
            assert!(matches!(parse_version_ref(bad), Err(Error::InvalidVersionRef(_))), "{bad}");
        }
    }

    #[test]
    fn entries_keep_control_keys_apart_from_paths() {
        let mut ver = Version { message: "first".into(), ..Default::default() };
        ver.files.insert(
            "message".into(),
            FileRecord { name: "message".into(), chunks: vec!["aa".into(), "bb".into()] },
        );
        let back = Version::from_entries(ver.to_entries().unwrap()).unwrap();
        assert_eq!(back.message, "first");
        assert_eq!(back.files["message"].chunks, vec!["aa", "bb"]);
        assert_eq!(back.files["message"].name, "message");
    }

    #[test]
    fn malformed_record_is_corruption() {
        let entries = vec![(b"a.txt".to_vec(), b"{not json".to_vec())];
        let err = Version::from_entries(entries).unwrap_err();
        assert!(matches!(err, Error::CorruptedLedger(_)));
    }
}
