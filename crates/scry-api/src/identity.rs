//! The identifier provider: an opaque per-browser identifier persisted in a
//! durable cookie with a server-side session mirror.
//!
//! Resolution order is cookie, then session, then a freshly minted UUID; the
//! resolved value is written back to both so future reads agree. The provider
//! never fails the caller — on any storage trouble it hands out a per-request
//! identifier and logs, trading cross-visit continuity for availability.

use std::{collections::HashMap, sync::Mutex};

use axum::{Json, extract::State};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use scry_core::ledger::SearchLedger;
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{ApiError, AppState};

/// Cookie holding the session token for the server-side mirror.
pub const SESSION_COOKIE: &str = "scry_session";

// ─── Session mirror ──────────────────────────────────────────────────────────

/// In-process session store mapping session tokens to user identifiers.
#[derive(Default)]
pub struct SessionMirror {
  entries: Mutex<HashMap<String, String>>,
}

impl SessionMirror {
  pub fn new() -> Self {
    Self::default()
  }

  fn get(&self, token: &str) -> Option<String> {
    match self.entries.lock() {
      Ok(entries) => entries.get(token).cloned(),
      Err(e) => {
        tracing::warn!("session mirror unavailable: {e}");
        None
      }
    }
  }

  fn set(&self, token: &str, user_identifier: &str) {
    match self.entries.lock() {
      Ok(mut entries) => {
        entries.insert(token.to_owned(), user_identifier.to_owned());
      }
      Err(e) => tracing::warn!("session mirror unavailable: {e}"),
    }
  }
}

// ─── Resolution ──────────────────────────────────────────────────────────────

/// Resolve the caller's identifier and write it back to cookie + session.
///
/// Returns the identifier and the jar carrying any cookie updates.
pub fn ensure_identifier<L: SearchLedger>(
  jar: CookieJar,
  state: &AppState<L>,
) -> (String, CookieJar) {
  let cookie_name = state.config.cookie_name.clone();

  // The durable cookie is authoritative when present.
  if let Some(cookie) = jar.get(&cookie_name) {
    let id = cookie.value().to_owned();
    let jar = mirror_into_session(jar, state, &id);
    return (id, jar);
  }

  // Session fallback.
  if let Some(token) = jar.get(SESSION_COOKIE).map(|c| c.value().to_owned())
    && let Some(id) = state.sessions.get(&token)
  {
    let jar = jar.add(durable_cookie(&cookie_name, &id));
    return (id, jar);
  }

  // Both absent: mint a fresh identifier and persist it everywhere.
  let id = Uuid::new_v4().to_string();
  tracing::debug!(%id, "minted new user identifier");
  let jar = jar.add(durable_cookie(&cookie_name, &id));
  let jar = mirror_into_session(jar, state, &id);
  (id, jar)
}

/// Pin an explicit identifier into both cookie and session.
pub fn pin_identifier<L: SearchLedger>(
  jar: CookieJar,
  state: &AppState<L>,
  user_identifier: &str,
) -> CookieJar {
  let jar = jar.add(durable_cookie(&state.config.cookie_name, user_identifier));
  mirror_into_session(jar, state, user_identifier)
}

fn durable_cookie(name: &str, value: &str) -> Cookie<'static> {
  Cookie::build((name.to_owned(), value.to_owned()))
    .path("/")
    .permanent()
    .build()
}

/// Ensure a session token exists and the mirror maps it to `id`.
fn mirror_into_session<L: SearchLedger>(
  jar: CookieJar,
  state: &AppState<L>,
  id: &str,
) -> CookieJar {
  let (jar, token) = match jar.get(SESSION_COOKIE) {
    Some(cookie) => {
      let token = cookie.value().to_owned();
      (jar, token)
    }
    None => {
      let token = Uuid::new_v4().to_string();
      let jar = jar.add(
        Cookie::build((SESSION_COOKIE, token.clone()))
          .path("/")
          .build(),
      );
      (jar, token)
    }
  };
  state.sessions.set(&token, id);
  jar
}

// ─── POST /set_identifier ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SetIdentifierBody {
  pub user_id: Option<String>,
}

/// `POST /set_identifier {user_id}`
pub async fn set_identifier<L>(
  State(state): State<AppState<L>>,
  jar: CookieJar,
  Json(body): Json<SetIdentifierBody>,
) -> Result<(CookieJar, Json<Value>), ApiError>
where
  L: SearchLedger,
{
  let Some(user_id) = body.user_id.filter(|u| !u.trim().is_empty()) else {
    return Err(ApiError::BadRequest("no user_id provided".into()));
  };

  let jar = pin_identifier(jar, &state, &user_id);
  Ok((jar, Json(json!({ "success": true, "user_identifier": user_id }))))
}
