use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Male => write!(f, "male"),
            Gender::Female => write!(f, "female"),
        }
    }
}

impl std::str::FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            other => Err(format!("unknown gender: {other}")),
        }
    }
}

/// `PATCH /api/v1/user/profile` body.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProfileUpdate {
    nickname: String,
    gender: Gender,
}

impl ProfileUpdate {
    pub fn new(nickname: &str, gender: Gender) -> Self {
        Self {
            nickname: nickname.to_string(),
            gender,
        }
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn gender(&self) -> Gender {
        self.gender
    }
}
