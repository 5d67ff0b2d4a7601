use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which workspace the user is acting in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Space {
    #[default]
    Personal,
    Company,
    Organization,
}

impl Space {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Personal => "personal",
            Self::Company => "company",
            Self::Organization => "organization",
        }
    }
}

impl fmt::Display for Space {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Space {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "personal" => Ok(Self::Personal),
            "company" => Ok(Self::Company),
            "organization" | "org" => Ok(Self::Organization),
            other => Err(format!(
                "Unknown space '{other}'. Use one of: personal, company, organization"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,
}

impl Organization {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            image_url: None,
            banner_url: None,
            website_url: None,
        }
    }
}

/// Owner filter attached to resource reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    User(String),
    Company(String),
    Organization(String),
}

impl Scope {
    /// Query parameter / body field name.
    pub fn field(&self) -> &'static str {
        match self {
            Self::User(_) => "user_id",
            Self::Company(_) => "company_id",
            Self::Organization(_) => "organization_id",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Self::User(id) | Self::Company(id) | Self::Organization(id) => id,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.field(), self.value())
    }
}
