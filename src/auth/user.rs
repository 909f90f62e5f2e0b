use serde::{Deserialize, Serialize};

/// Fields requested from the user-info endpoint.
pub const USER_FIELDS: &str =
    "id,guest,name,banned,profile/avatar/url,endUserAgreementConsent(accepted,majorVersion,minorVersion)";

/// The signed-in user as reported by the Hub user-info endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CurrentUser {
    pub id: String,
    pub name: String,
    pub guest: bool,
    pub banned: bool,
    pub profile: Option<UserProfile>,
    pub end_user_agreement_consent: Option<AgreementConsent>,
}

impl CurrentUser {
    pub fn avatar_url(&self) -> Option<&str> {
        self.profile
            .as_ref()
            .and_then(|profile| profile.avatar.as_ref())
            .and_then(|avatar| avatar.url.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub avatar: Option<Avatar>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Avatar {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgreementConsent {
    pub accepted: bool,
    pub major_version: Option<u32>,
    pub minor_version: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_user_payload() {
        let user: CurrentUser = serde_json::from_str(
            r#"{
                "id": "1-1",
                "name": "John",
                "profile": {"avatar": {"url": "https://hub/avatar.png"}},
                "endUserAgreementConsent": {"accepted": true, "majorVersion": 1, "minorVersion": 2},
                "$type": "user"
            }"#,
        )
        .unwrap();
        assert_eq!(user.id, "1-1");
        assert!(!user.banned);
        assert!(!user.guest);
        assert_eq!(user.avatar_url(), Some("https://hub/avatar.png"));
        let consent = user.end_user_agreement_consent.unwrap();
        assert!(consent.accepted);
        assert_eq!(consent.major_version, Some(1));
    }
}
