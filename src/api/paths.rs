//! Route paths, shared between the router and redirect targets.

pub const ROOT: &str = "/";
pub const LOGIN: &str = "/login";
pub const OTP_LOGIN: &str = "/otp-login";
pub const OTP_SEND_AGAIN: &str = "/otp-send-again";
pub const LOGOUT: &str = "/logout";
pub const MY_PROFILE: &str = "/my-profile";
pub const HEALTHCHECK: &str = "/healthcheck";
pub const TOKEN_GENERATE: &str = "/tokens/generate";

#[must_use]
pub fn transaction_detail(charge_id: &str) -> String {
    format!("/transactions/{charge_id}")
}

#[must_use]
pub fn transaction_refund(charge_id: &str) -> String {
    format!("/transactions/{charge_id}/refund")
}

#[must_use]
pub fn token_index(account_id: &str) -> String {
    format!("/tokens/{account_id}")
}

#[must_use]
pub fn token_generate_form(account_id: &str) -> String {
    format!("/tokens/generate/{account_id}")
}

#[must_use]
pub fn team_members_index(service_external_id: &str) -> String {
    format!("/service/{service_external_id}/team-members")
}

#[must_use]
pub fn team_member(service_external_id: &str, user_external_id: &str) -> String {
    format!("/service/{service_external_id}/team-members/{user_external_id}")
}

#[must_use]
pub fn team_member_delete(service_external_id: &str, user_external_id: &str) -> String {
    format!("/service/{service_external_id}/team-members/{user_external_id}/delete")
}

#[must_use]
pub fn team_member_permissions(service_external_id: &str, user_external_id: &str) -> String {
    format!("/service/{service_external_id}/team-members/{user_external_id}/permissions")
}
