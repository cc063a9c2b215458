//! User listing and profile management handlers.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json, Response};
use axum_extra::extract::Form;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::state::AppState;
use crate::web::auth::extractors::AuthUser;
use crate::web::flash::{clear_flash_cookie, flash_redirect, pop_flash};

/// `GET /users` — every account with its grants. Dashboard admins only.
pub async fn list_users(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    if !user.is_admin {
        return flash_redirect("You are not authorised", "/user");
    }

    let users = match crate::data::users::list(&state.db_pool).await {
        Ok(users) => users,
        Err(e) => {
            error!(error = %e, "Failed to list users");
            return flash_redirect("Failed to load users, please try again", "/");
        }
    };

    let mut entries = Vec::with_capacity(users.len());
    for account in users {
        let grants = crate::data::users::list_grants(&state.db_pool, account.id)
            .await
            .unwrap_or_default();
        entries.push(json!({"user": account, "studies": grants}));
    }

    let flash = pop_flash(&headers);
    let mut response = Json(json!({"users": entries, "flash": flash})).into_response();
    clear_flash_cookie(&mut response);
    response
}

/// Profile update form. Exactly one of the access actions applies per
/// submission, mirroring the buttons on the profile page.
#[derive(Debug, Deserialize)]
pub struct UserForm {
    pub user_id: i32,
    pub realname: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub has_phi: bool,
    /// Honored only for dashboard admins; disabling logs the account out on
    /// its next request.
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Grant access to these studies.
    #[serde(default)]
    pub add_access: Vec<i32>,
    #[serde(default)]
    pub update_access: bool,
    #[serde(default)]
    pub revoke_all_access: bool,
    /// Revoke access to a single study.
    #[serde(default)]
    pub revoke_access: Option<i32>,
}

fn default_true() -> bool {
    true
}

impl UserForm {
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.realname.trim().is_empty() {
            errors.push("Name may not be blank".to_string());
        }
        if self.update_access && self.add_access.is_empty() {
            errors.push("No studies selected to grant access to".to_string());
        }
        errors
    }
}

/// `GET /user[/{user_id}]` — profile page model.
pub async fn view_user(
    AuthUser(current): AuthUser,
    State(state): State<AppState>,
    user_id: Option<Path<i32>>,
    headers: HeaderMap,
) -> Response {
    let user_id = user_id.map(|Path(id)| id);

    if let Some(id) = user_id {
        if id != current.id && !current.is_admin {
            return flash_redirect("You are not authorized to view other user settings", "/user");
        }
    }

    let shown = match user_id {
        None => current.clone(),
        Some(id) => match crate::data::users::get(&state.db_pool, id).await {
            Ok(Some(user)) => user,
            Ok(None) => return flash_redirect("User not found", "/user"),
            Err(e) => {
                error!(error = %e, "Failed to load user");
                return flash_redirect("Failed to load user, please try again", "/");
            }
        },
    };

    let grants = crate::data::users::list_grants(&state.db_pool, shown.id)
        .await
        .unwrap_or_default();

    let flash = pop_flash(&headers);
    let mut response = Json(json!({
        "user": shown,
        "studies": grants,
        "flash": flash,
    }))
    .into_response();
    clear_flash_cookie(&mut response);
    response
}

/// `POST /user[/{user_id}]` — apply a profile or access-grant update.
pub async fn update_user(
    AuthUser(current): AuthUser,
    State(state): State<AppState>,
    Form(form): Form<UserForm>,
) -> Response {
    // Catch requests that tamper with the submitted user id to modify
    // somebody else's settings.
    if form.user_id != current.id && !current.is_admin {
        return flash_redirect(
            "You are not authorized to update other users' settings.",
            "/user",
        );
    }

    let errors = form.validate();
    if !errors.is_empty() {
        return flash_redirect(&errors.join("; "), "/user");
    }

    let result = if form.update_access {
        let mut outcome = Ok(());
        for study_id in &form.add_access {
            if let Err(e) =
                crate::data::users::grant_access(&state.db_pool, *study_id, form.user_id).await
            {
                outcome = Err(e);
                break;
            }
        }
        outcome
    } else if form.revoke_all_access {
        crate::data::users::revoke_all_access(&state.db_pool, form.user_id)
            .await
            .map(|_| ())
    } else {
        // Only dashboard admins may change the admin flag; everyone else's
        // submission keeps their current value.
        let is_admin = if current.is_admin {
            form.is_admin
        } else {
            current.is_admin
        };
        let updated = crate::data::users::update_profile(
            &state.db_pool,
            form.user_id,
            form.realname.trim(),
            form.email.as_deref(),
            is_admin,
            form.has_phi,
        )
        .await
        .map(|_| ());

        if updated.is_ok() && current.is_admin {
            crate::data::users::set_active(&state.db_pool, form.user_id, form.is_active)
                .await
                .map(|_| ())
        } else {
            updated
        }
    };

    if let Err(e) = result {
        error!(error = %e, user_id = form.user_id, "User update failed");
        return flash_redirect("Update failed, please try again", "/user");
    }

    if let Some(study_id) = form.revoke_access {
        if let Err(e) =
            crate::data::users::revoke_access(&state.db_pool, study_id, form.user_id).await
        {
            error!(error = %e, user_id = form.user_id, study_id, "Access revocation failed");
            return flash_redirect("Update failed, please try again", "/user");
        }
    }

    state.session_cache.evict_user(form.user_id);
    info!(user_id = form.user_id, "User profile updated");
    flash_redirect("User profile updated.", &format!("/user/{}", form.user_id))
}
