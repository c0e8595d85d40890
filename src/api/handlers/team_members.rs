//! Team member administration and the signed-in user's profile.

use axum::{
    Extension, Form, Json,
    extract::Path,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, warn};

use crate::api::paths;
use crate::clients::adminusers::{AdminUsersClient, User};

use super::auth::{
    Principal, csrf_guard,
    session::{SessionId, SessionStore},
    types::CsrfForm,
};
use super::{found, html_page, message_response, server_error, wants_json};

const NO_SERVICES_MESSAGE: &str = "This user does not belong to any service. Ask your service administrator to invite you to the payments platform.";
const NO_ACCESS_MESSAGE: &str = "You do not have access to this service";
const DISPLAY_USER_ERROR_MESSAGE: &str = "Error displaying this user of the current service";
const LIST_USERS_ERROR_MESSAGE: &str = "Unable to retrieve team members for this service";
const SELF_REMOVAL_MESSAGE: &str = "It is not possible to remove yourself from a service";
const SELF_PERMISSIONS_MESSAGE: &str = "It is not possible to update your own permissions";
const MIN_ADMIN_MESSAGE: &str = "Service must have at least one administrator";
const NOT_A_MEMBER_MESSAGE: &str = "This person is not a member of this service";
const INVALID_ROLE_MESSAGE: &str = "Invalid role";

const ROLE_ADMIN: &str = "admin";
const ROLE_VIEW_ONLY: &str = "view-only";
const ROLE_VIEW_AND_REFUND: &str = "view-and-refund";

#[derive(Debug, Serialize)]
struct TeamMemberEntry {
    username: String,
    link: String,
    is_current: bool,
}

#[derive(Debug, Default, Serialize)]
struct TeamMemberGroups {
    admin: Vec<TeamMemberEntry>,
    #[serde(rename = "view-only")]
    view_only: Vec<TeamMemberEntry>,
    #[serde(rename = "view-and-refund")]
    view_and_refund: Vec<TeamMemberEntry>,
}

/// Grouped listing, with per-role counts the templates render directly.
#[derive(Debug, Serialize)]
struct TeamMembersView {
    number_active_members: usize,
    number_admin_members: usize,
    #[serde(rename = "number_view-only_members")]
    number_view_only_members: usize,
    #[serde(rename = "number_view-and-refund_members")]
    number_view_and_refund_members: usize,
    team_members: TeamMemberGroups,
}

#[derive(Debug, Serialize)]
struct TeamMemberView {
    username: String,
    email: String,
    role: String,
    #[serde(rename = "editPermissionsLink")]
    edit_permissions_link: String,
    #[serde(rename = "removeTeamMemberLink")]
    remove_team_member_link: String,
}

#[derive(Debug, Serialize)]
struct RemovedNotice {
    error: RemovedError,
    link: RemovedLink,
    enable_link: bool,
}

#[derive(Debug, Serialize)]
struct RemovedError {
    title: String,
    message: String,
}

#[derive(Debug, Serialize)]
struct RemovedLink {
    link: String,
    text: String,
}

#[derive(Debug, Deserialize)]
pub struct PermissionsForm {
    #[serde(rename = "role-name", default)]
    pub role_name: String,
    #[serde(rename = "csrfToken", default)]
    pub csrf_token: Option<String>,
}

fn display_role(role_name: &str) -> &str {
    match role_name {
        ROLE_VIEW_ONLY => "View only",
        ROLE_VIEW_AND_REFUND => "View and refund",
        _ => "Administrator",
    }
}

fn removed_notice(service_external_id: &str) -> RemovedNotice {
    RemovedNotice {
        error: RemovedError {
            title: "This person has already been removed".to_string(),
            message: "This person has already been removed by another administrator.".to_string(),
        },
        link: RemovedLink {
            link: paths::team_members_index(service_external_id),
            text: "View all team members".to_string(),
        },
        enable_link: true,
    }
}

fn already_removed(headers: &HeaderMap, service_external_id: &str) -> Response {
    let notice = removed_notice(service_external_id);
    if wants_json(headers) {
        return (StatusCode::OK, Json(notice)).into_response();
    }
    let body = format!(
        r#"<h1>{title}</h1>
<p id="message">{message}</p>
<a id="team-members-link" href="{link}">{text}</a>"#,
        title = notice.error.title,
        message = notice.error.message,
        link = notice.link.link,
        text = notice.link.text,
    );
    html_page(&notice.error.title, &body).into_response()
}

fn build_view(service_external_id: &str, me: &str, users: &[User]) -> TeamMembersView {
    let mut groups = TeamMemberGroups::default();
    for user in users {
        let is_current = user.external_id == me;
        let entry = TeamMemberEntry {
            username: user.username.clone(),
            link: if is_current {
                paths::MY_PROFILE.to_string()
            } else {
                paths::team_member(service_external_id, &user.external_id)
            },
            is_current,
        };
        match user.role_name().unwrap_or(ROLE_ADMIN) {
            ROLE_ADMIN => groups.admin.push(entry),
            ROLE_VIEW_ONLY => groups.view_only.push(entry),
            ROLE_VIEW_AND_REFUND => groups.view_and_refund.push(entry),
            other => warn!("user {} has unknown role {other}", user.external_id),
        }
    }
    TeamMembersView {
        number_active_members: groups.admin.len()
            + groups.view_only.len()
            + groups.view_and_refund.len(),
        number_admin_members: groups.admin.len(),
        number_view_only_members: groups.view_only.len(),
        number_view_and_refund_members: groups.view_and_refund.len(),
        team_members: groups,
    }
}

/// Team members of a service, grouped by role.
pub async fn index(
    Path(service_external_id): Path<String>,
    headers: HeaderMap,
    Extension(adminusers): Extension<AdminUsersClient>,
    Extension(Principal(me)): Extension<Principal>,
) -> Response {
    if me.services.is_empty() {
        return message_response(&headers, StatusCode::OK, NO_SERVICES_MESSAGE);
    }
    if !me.belongs_to(&service_external_id) {
        return message_response(&headers, StatusCode::OK, NO_ACCESS_MESSAGE);
    }

    let users = match adminusers.service_users(&service_external_id).await {
        Ok(users) => users,
        Err(err) => {
            error!("failed to list users of {service_external_id}: {err}");
            return message_response(
                &headers,
                StatusCode::INTERNAL_SERVER_ERROR,
                LIST_USERS_ERROR_MESSAGE,
            );
        }
    };

    let view = build_view(&service_external_id, &me.external_id, &users);

    if wants_json(&headers) {
        return Json(view).into_response();
    }

    let mut items = String::new();
    for entry in view
        .team_members
        .admin
        .iter()
        .chain(&view.team_members.view_only)
        .chain(&view.team_members.view_and_refund)
    {
        let suffix = if entry.is_current { " (you)" } else { "" };
        items.push_str(&format!(
            "<li><a href=\"{}\">{}{suffix}</a></li>\n",
            entry.link, entry.username
        ));
    }
    let body = format!(
        r#"<h1>Team members</h1>
<p id="active-count">{active} active members</p>
<ul id="team-members">
{items}</ul>"#,
        active = view.number_active_members,
    );
    html_page("Team members", &body).into_response()
}

/// A single team member's details.
pub async fn show(
    Path((service_external_id, user_external_id)): Path<(String, String)>,
    headers: HeaderMap,
    Extension(adminusers): Extension<AdminUsersClient>,
    Extension(Principal(me)): Extension<Principal>,
) -> Response {
    if user_external_id == me.external_id {
        return found(paths::MY_PROFILE);
    }
    if !me.belongs_to(&service_external_id) {
        return message_response(&headers, StatusCode::OK, NO_ACCESS_MESSAGE);
    }

    let target = match adminusers.get_user(&user_external_id).await {
        Ok(target) => target,
        Err(err) => {
            error!("failed to fetch user {user_external_id}: {err}");
            return message_response(
                &headers,
                StatusCode::INTERNAL_SERVER_ERROR,
                DISPLAY_USER_ERROR_MESSAGE,
            );
        }
    };
    // A user fetched by guessed id must still be in the caller's service.
    if !target.belongs_to(&service_external_id) {
        return message_response(
            &headers,
            StatusCode::INTERNAL_SERVER_ERROR,
            DISPLAY_USER_ERROR_MESSAGE,
        );
    }

    let view = TeamMemberView {
        username: target.username.clone(),
        email: target.email.clone(),
        role: display_role(target.role_name().unwrap_or(ROLE_ADMIN)).to_string(),
        edit_permissions_link: paths::team_member_permissions(
            &service_external_id,
            &user_external_id,
        ),
        remove_team_member_link: paths::team_member_delete(
            &service_external_id,
            &user_external_id,
        ),
    };

    if wants_json(&headers) {
        return Json(view).into_response();
    }

    let body = format!(
        r#"<h1>{username}</h1>
<p id="email">{email}</p>
<p id="role">{role}</p>
<a id="edit-permissions" href="{edit}">Edit permissions</a>
<a id="remove-team-member" href="{remove}">Remove team member</a>"#,
        username = view.username,
        email = view.email,
        role = view.role,
        edit = view.edit_permissions_link,
        remove = view.remove_team_member_link,
    );
    html_page(&view.username, &body).into_response()
}

/// The signed-in user's profile, fetched fresh rather than trusted from
/// the session.
pub async fn my_profile(
    headers: HeaderMap,
    Extension(adminusers): Extension<AdminUsersClient>,
    Extension(Principal(me)): Extension<Principal>,
) -> Response {
    let user = match adminusers.get_user(&me.external_id).await {
        Ok(user) => user,
        Err(err) => {
            error!("failed to fetch profile for {}: {err}", me.external_id);
            return server_error(&headers);
        }
    };

    if wants_json(&headers) {
        return Json(json!({
            "username": user.username,
            "email": user.email,
            "telephone_number": user.telephone_number,
        }))
        .into_response();
    }

    let body = format!(
        r#"<h1>Your profile</h1>
<p id="username">{username}</p>
<p id="email">{email}</p>
<p id="telephone-number">{telephone}</p>"#,
        username = user.username,
        email = user.email,
        telephone = user.telephone_number.as_deref().unwrap_or(""),
    );
    html_page("Your profile", &body).into_response()
}

/// Remove a team member from a service.
pub async fn remove(
    Path((service_external_id, user_external_id)): Path<(String, String)>,
    headers: HeaderMap,
    Extension(store): Extension<Arc<SessionStore>>,
    Extension(sid): Extension<SessionId>,
    Extension(adminusers): Extension<AdminUsersClient>,
    Extension(Principal(me)): Extension<Principal>,
    Form(form): Form<CsrfForm>,
) -> Response {
    let Some(session) = store.get(&sid.0).await else {
        return server_error(&headers);
    };
    if let Err(response) = csrf_guard(&headers, &session, form.csrf_token.as_deref()) {
        return response;
    }
    if !me.belongs_to(&service_external_id) {
        return message_response(&headers, StatusCode::OK, NO_ACCESS_MESSAGE);
    }
    if user_external_id == me.external_id {
        return message_response(&headers, StatusCode::OK, SELF_REMOVAL_MESSAGE);
    }

    // Look the target up first so a double removal reads as "already
    // removed" rather than a hard failure.
    match adminusers.get_user(&user_external_id).await {
        Ok(_) => {}
        Err(err) if err.status() == Some(StatusCode::NOT_FOUND) => {
            return already_removed(&headers, &service_external_id);
        }
        Err(err) => {
            error!("failed to fetch user {user_external_id}: {err}");
            return server_error(&headers);
        }
    }

    match adminusers
        .remove_service_user(&service_external_id, &user_external_id)
        .await
    {
        Ok(()) => found(&paths::team_members_index(&service_external_id)),
        Err(err) if err.status() == Some(StatusCode::NOT_FOUND) => {
            already_removed(&headers, &service_external_id)
        }
        Err(err) => {
            error!("failed to remove user {user_external_id}: {err}");
            server_error(&headers)
        }
    }
}

/// Change a team member's role within a service.
pub async fn update_permissions(
    Path((service_external_id, user_external_id)): Path<(String, String)>,
    headers: HeaderMap,
    Extension(store): Extension<Arc<SessionStore>>,
    Extension(sid): Extension<SessionId>,
    Extension(adminusers): Extension<AdminUsersClient>,
    Extension(Principal(me)): Extension<Principal>,
    Form(form): Form<PermissionsForm>,
) -> Response {
    let Some(session) = store.get(&sid.0).await else {
        return server_error(&headers);
    };
    if let Err(response) = csrf_guard(&headers, &session, form.csrf_token.as_deref()) {
        return response;
    }
    if !me.belongs_to(&service_external_id) {
        return message_response(&headers, StatusCode::OK, NO_ACCESS_MESSAGE);
    }
    if user_external_id == me.external_id {
        return message_response(&headers, StatusCode::OK, SELF_PERMISSIONS_MESSAGE);
    }

    let target = match adminusers.get_user(&user_external_id).await {
        Ok(target) => target,
        Err(err) => {
            error!("failed to fetch user {user_external_id}: {err}");
            return message_response(
                &headers,
                StatusCode::INTERNAL_SERVER_ERROR,
                DISPLAY_USER_ERROR_MESSAGE,
            );
        }
    };
    if !target.belongs_to(&service_external_id) {
        return message_response(
            &headers,
            StatusCode::INTERNAL_SERVER_ERROR,
            DISPLAY_USER_ERROR_MESSAGE,
        );
    }

    match adminusers
        .update_service_role(&target.username, &service_external_id, &form.role_name)
        .await
    {
        Ok(_) => found(&paths::team_member(&service_external_id, &user_external_id)),
        // 412 here means the service would be left with no administrator.
        Err(err) if err.status() == Some(StatusCode::PRECONDITION_FAILED) => {
            message_response(&headers, StatusCode::OK, MIN_ADMIN_MESSAGE)
        }
        Err(err) if err.status() == Some(StatusCode::CONFLICT) => {
            message_response(&headers, StatusCode::OK, NOT_A_MEMBER_MESSAGE)
        }
        Err(err) if err.status() == Some(StatusCode::BAD_REQUEST) => {
            message_response(&headers, StatusCode::OK, INVALID_ROLE_MESSAGE)
        }
        Err(err) => {
            error!("failed to update role for {user_external_id}: {err}");
            server_error(&headers)
        }
    }
}
