use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ResolveError, ResolveResult};
use crate::model::{Design, DesignId, Version, VersionId};

const SEPARATOR: char = '.';

/// Composite identity of a design pinned to a version: `"<design_id>.<version_id>"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DesignAtVersionId {
    pub design_id: DesignId,
    pub version_id: VersionId,
}

impl DesignAtVersionId {
    pub fn new(design_id: DesignId, version_id: VersionId) -> Self {
        Self {
            design_id,
            version_id,
        }
    }

    pub fn encode(&self) -> String {
        self.to_string()
    }

    pub fn decode(identity: &str) -> ResolveResult<Self> {
        let (design, version) = identity
            .split_once(SEPARATOR)
            .ok_or_else(|| ResolveError::malformed(identity, "missing '.' separator"))?;

        if version.contains(SEPARATOR) {
            return Err(ResolveError::malformed(identity, "more than one '.' separator"));
        }

        let design_id = parse_id(identity, design, "design id")?;
        let version_id = parse_id(identity, version, "version id")?;

        Ok(Self::new(design_id, version_id))
    }

    /// Decode a batch; the first malformed entry fails the whole batch
    pub fn decode_all<I, S>(identities: I) -> ResolveResult<Vec<Self>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        identities
            .into_iter()
            .map(|identity| Self::decode(identity.as_ref()))
            .collect()
    }
}

/// Unsigned decimal digits without leading zeros: the form `encode` writes
fn parse_id(identity: &str, part: &str, label: &str) -> ResolveResult<i64> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ResolveError::malformed(
            identity,
            format!("{} must be decimal digits", label),
        ));
    }
    if part.len() > 1 && part.starts_with('0') {
        return Err(ResolveError::malformed(
            identity,
            format!("{} has leading zeros", label),
        ));
    }
    part.parse::<i64>()
        .map_err(|e| ResolveError::malformed(identity, format!("{}: {}", label, e)))
}

impl fmt::Display for DesignAtVersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.design_id, SEPARATOR, self.version_id)
    }
}

impl FromStr for DesignAtVersionId {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl Serialize for DesignAtVersionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DesignAtVersionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::decode(&raw).map_err(serde::de::Error::custom)
    }
}

/// A design pinned to a version. Constructed per request, never persisted.
///
/// Both halves always share an issue: the checked constructor rejects
/// mismatched pairs and the query paths never produce them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DesignAtVersion {
    pub id: DesignAtVersionId,
    pub design: Design,
    pub version: Version,
}

impl DesignAtVersion {
    pub fn new(design: Design, version: Version) -> ResolveResult<Self> {
        if design.issue_id != version.issue_id {
            return Err(ResolveError::InconsistentPair {
                design_id: design.id,
                design_issue_id: design.issue_id,
                version_id: version.id,
                version_issue_id: version.issue_id,
            });
        }
        Ok(Self::new_unchecked(design, version))
    }

    /// For rows that came out of the same-issue join
    pub(crate) fn new_unchecked(design: Design, version: Version) -> Self {
        Self {
            id: DesignAtVersionId::new(design.id, version.id),
            design,
            version,
        }
    }

    pub fn filename(&self) -> &str {
        &self.design.filename
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn design(id: DesignId, issue_id: i64) -> Design {
        Design {
            id,
            project_id: 1,
            issue_id,
            filename: format!("design-{}.png", id),
        }
    }

    fn version(id: VersionId, issue_id: i64) -> Version {
        Version {
            id,
            issue_id,
            sha: format!("sha-{}", id),
            author_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_encode_joins_ids_with_dot() {
        assert_eq!(DesignAtVersionId::new(17, 42).encode(), "17.42");
    }

    #[test]
    fn test_decode_reverses_encode() {
        for (d, v) in [(0, 0), (17, 42), (1, i64::MAX), (i64::MAX, 9)] {
            let id = DesignAtVersionId::new(d, v);
            assert_eq!(DesignAtVersionId::decode(&id.encode()).unwrap(), id);
        }
    }

    #[test]
    fn test_decode_rejects_malformed_identities() {
        for bad in [
            "", "17", "17.", ".42", "17.42.1", "a.42", "17.b", "17 .42", "17,42", "+17.42",
            "17.+42", "-1.2", "1.-2", "07.1", "1.00", "99999999999999999999.1",
        ] {
            match DesignAtVersionId::decode(bad) {
                Err(ResolveError::MalformedIdentity { identity, .. }) => assert_eq!(identity, bad),
                other => panic!("expected malformed identity for {:?}, got {:?}", bad, other),
            }
        }
    }

    #[test]
    fn test_decode_all_fails_on_first_malformed() {
        let ok = DesignAtVersionId::decode_all(["1.2", "3.4"]).unwrap();
        assert_eq!(ok, vec![DesignAtVersionId::new(1, 2), DesignAtVersionId::new(3, 4)]);

        assert!(DesignAtVersionId::decode_all(["1.2", "nope"]).is_err());
    }

    #[test]
    fn test_identity_serializes_as_string() {
        let id = DesignAtVersionId::new(3, 9);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"3.9\"");

        let parsed: DesignAtVersionId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
        assert!(serde_json::from_str::<DesignAtVersionId>("\"3\"").is_err());
    }

    #[test]
    fn test_checked_construction_requires_shared_issue() {
        let dav = DesignAtVersion::new(design(1, 10), version(2, 10)).unwrap();
        assert_eq!(dav.id.encode(), "1.2");
        assert_eq!(dav.filename(), "design-1.png");

        match DesignAtVersion::new(design(1, 10), version(2, 11)) {
            Err(ResolveError::InconsistentPair {
                design_issue_id,
                version_issue_id,
                ..
            }) => {
                assert_eq!(design_issue_id, 10);
                assert_eq!(version_issue_id, 11);
            }
            other => panic!("expected inconsistent pair, got {:?}", other),
        }
    }
}
