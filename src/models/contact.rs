//! Campus directory entries.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Whether a directory entry is a unit or a person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactKind {
    Organization,
    Individual,
}

impl ContactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactKind::Organization => "organization",
            ContactKind::Individual => "individual",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "organization" => Some(ContactKind::Organization),
            "individual" => Some(ContactKind::Individual),
            _ => None,
        }
    }
}

impl fmt::Display for ContactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit or person from the campus directory.
///
/// Organizations fill `superior`, `location` and `website`; individuals fill
/// `name_en`, `organization`, `title`, `extension`, `phone` and `email`.
/// Unused fields are empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub uid: String,
    pub kind: ContactKind,
    pub name: String,
    #[serde(default)]
    pub name_en: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub extension: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub superior: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub cached_at: i64,
}

impl Contact {
    pub fn organization(name: &str) -> Self {
        Self::blank(ContactKind::Organization, organization_uid(name), name)
    }

    pub fn individual(organization: &str, name: &str) -> Self {
        let mut contact = Self::blank(
            ContactKind::Individual,
            individual_uid(organization, name),
            name,
        );
        contact.organization = organization.to_string();
        contact
    }

    fn blank(kind: ContactKind, uid: String, name: &str) -> Self {
        Self {
            uid,
            kind,
            name: name.to_string(),
            name_en: String::new(),
            organization: String::new(),
            title: String::new(),
            extension: String::new(),
            phone: String::new(),
            email: String::new(),
            superior: String::new(),
            location: String::new(),
            website: String::new(),
            cached_at: 0,
        }
    }
}

pub fn organization_uid(name: &str) -> String {
    format!("org:{}", name)
}

pub fn individual_uid(organization: &str, name: &str) -> String {
    format!("ind:{}:{}", organization, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uids_are_stable() {
        let org = Contact::organization("資訊工程學系");
        assert_eq!(org.uid, "org:資訊工程學系");
        let person = Contact::individual("資訊工程學系", "陳大文");
        assert_eq!(person.uid, "ind:資訊工程學系:陳大文");
        assert_eq!(person.organization, "資訊工程學系");
        assert_eq!(person.kind, ContactKind::Individual);
    }

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in [ContactKind::Organization, ContactKind::Individual] {
            assert_eq!(ContactKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(ContactKind::from_str("team"), None);
    }
}
