use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Anonymous,
    User,
    Guide,
    LeadGuide,
    Admin,
    System,
}

impl Role {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "anonymous" | "guest" => Some(Role::Anonymous),
            "user" => Some(Role::User),
            "guide" => Some(Role::Guide),
            "lead_guide" | "lead-guide" => Some(Role::LeadGuide),
            "admin" => Some(Role::Admin),
            "system" => Some(Role::System),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Anonymous => "anonymous",
            Role::User => "user",
            Role::Guide => "guide",
            Role::LeadGuide => "lead_guide",
            Role::Admin => "admin",
            Role::System => "system",
        }
    }

    /// Roles allowed to submit a review. Staff cannot review tours they run.
    pub fn can_review(&self) -> bool {
        matches!(self, Role::User)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::System)
    }

    pub fn can_manage_tours(&self) -> bool {
        matches!(self, Role::LeadGuide | Role::Admin | Role::System)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_both_lead_guide_spellings() {
        assert_eq!(Role::parse("lead-guide"), Some(Role::LeadGuide));
        assert_eq!(Role::parse("lead_guide"), Some(Role::LeadGuide));
        assert_eq!(Role::parse("owner"), None);
    }

    #[test]
    fn only_plain_users_review() {
        assert!(Role::User.can_review());
        assert!(!Role::Admin.can_review());
        assert!(!Role::Guide.can_review());
    }
}
