use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

fn serialize_value_base64<S>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if value.is_empty() {
        serializer.serialize_none()
    } else {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(value))
    }
}

fn deserialize_value_base64<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(encoded) => base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom),
        None => Ok(Vec::new()),
    }
}

fn deserialize_session<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.filter(|session| !session.is_empty()))
}

/// A single item in the KV store.
///
/// Entries are snapshots: the server assigns the indexes, and a fresh read is
/// the only way to observe a change. The value is opaque bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeyValueEntry {
    /// Full path of the entry
    pub key: String,

    /// Stored bytes; `null` on the wire decodes as empty
    #[serde(
        default,
        serialize_with = "serialize_value_base64",
        deserialize_with = "deserialize_value_base64"
    )]
    pub value: Vec<u8>,

    /// Opaque writer-defined flags, returned verbatim
    #[serde(default)]
    pub flags: u64,

    /// Session currently holding the lock on this key
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_session"
    )]
    pub session: Option<String>,

    /// Index at which the entry was created
    #[serde(default)]
    pub create_index: u64,

    /// Index of the last write; the version token for check-and-set
    #[serde(default)]
    pub modify_index: u64,

    /// Number of times a session has acquired the lock on this key
    #[serde(default)]
    pub lock_index: u64,
}

impl KeyValueEntry {
    /// Create an entry for writing `value` at `key`
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            ..Default::default()
        }
    }

    /// Set the flags written along with the value
    pub fn with_flags(mut self, flags: u64) -> Self {
        self.flags = flags;
        self
    }

    /// Set the session used by acquire and release
    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }

    /// Set the modify index a check-and-set write expects
    pub fn with_modify_index(mut self, modify_index: u64) -> Self {
        self.modify_index = modify_index;
        self
    }

    /// Whether a session currently holds the lock on this key
    pub fn is_locked(&self) -> bool {
        self.session.is_some()
    }

    /// Whether this entry is an explicit directory marker
    pub fn is_directory_marker(&self) -> bool {
        self.key.ends_with('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn it_decodes_the_wire_shape() {
        let entry: KeyValueEntry = serde_json::from_str(
            r#"{
                "Key": "service/web/port",
                "Value": "ODA4MA==",
                "Flags": 42,
                "Session": "adf4238a-882b-9ddc-4a9d-5b6758e4159e",
                "CreateIndex": 100,
                "ModifyIndex": 200,
                "LockIndex": 1
            }"#,
        )
        .unwrap();

        assert_eq!(
            entry,
            KeyValueEntry {
                key: "service/web/port".into(),
                value: b"8080".to_vec(),
                flags: 42,
                session: Some("adf4238a-882b-9ddc-4a9d-5b6758e4159e".into()),
                create_index: 100,
                modify_index: 200,
                lock_index: 1,
            }
        );
        assert!(entry.is_locked());
    }

    #[test]
    fn it_treats_null_values_and_empty_sessions_as_absent() {
        let entry: KeyValueEntry = serde_json::from_str(
            r#"{"Key": "dir/", "Value": null, "Flags": 0, "Session": "",
                "CreateIndex": 1, "ModifyIndex": 1, "LockIndex": 0}"#,
        )
        .unwrap();

        assert!(entry.value.is_empty());
        assert_eq!(entry.session, None);
        assert!(entry.is_directory_marker());
    }

    #[test]
    fn it_rejects_values_that_are_not_base64() {
        let result = serde_json::from_str::<KeyValueEntry>(r#"{"Key": "a", "Value": "%%%"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn it_builds_entries_for_conditional_writes() {
        let entry = KeyValueEntry::new("locks/db", "owner")
            .with_flags(1)
            .with_session("s1")
            .with_modify_index(17);

        assert_eq!(entry.modify_index, 17);
        assert_eq!(entry.session.as_deref(), Some("s1"));
        assert!(entry.is_locked());
        assert!(!entry.is_directory_marker());
    }

    #[test]
    fn it_encodes_values_as_base64() {
        let json = serde_json::to_value(KeyValueEntry::new("a", "1").with_flags(3)).unwrap();

        assert_eq!(json["Value"], "MQ==");
        assert_eq!(json["Flags"], 3);
        assert!(json.get("Session").is_none());
    }
}
