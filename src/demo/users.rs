//! In-memory users REST controller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use route_controller::{
    ActionResult, BoxError, ControllerConfig, HttpContext, MetadataRegistry, Middleware, Reply,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct UserInput {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Default)]
pub struct UserStore {
    users: DashMap<u64, User>,
    next_id: AtomicU64,
}

impl UserStore {
    pub fn insert(&self, input: UserInput) -> User {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let user = User {
            id,
            name: input.name,
            email: input.email,
        };
        self.users.insert(id, user.clone());
        user
    }

    pub fn get(&self, id: u64) -> Option<User> {
        self.users.get(&id).map(|entry| entry.value().clone())
    }

    pub fn list(&self) -> Vec<User> {
        let mut users: Vec<User> = self.users.iter().map(|entry| entry.value().clone()).collect();
        users.sort_by_key(|user| user.id);
        users
    }

    pub fn update(&self, id: u64, input: UserInput) -> Option<User> {
        let mut entry = self.users.get_mut(&id)?;
        entry.name = input.name;
        entry.email = input.email;
        Some(entry.clone())
    }

    pub fn remove(&self, id: u64) -> bool {
        self.users.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }
}

#[derive(Debug, Default)]
pub struct UsersController;

fn store(ctx: &HttpContext) -> Result<&Arc<UserStore>, BoxError> {
    ctx.state::<Arc<UserStore>>()
        .ok_or_else(|| BoxError::from("user store missing from controller state"))
}

fn user_id(ctx: &HttpContext) -> Result<u64, BoxError> {
    let raw = ctx.request.param("id").unwrap_or_default();
    raw.parse()
        .map_err(|_| BoxError::from(format!("invalid user id {raw:?}")))
}

fn log_requests() -> Middleware {
    Middleware::standard(|req, _res, next| async move {
        tracing::info!(method = %req.method(), path = %req.path(), "users request");
        next.run();
        Ok(())
    })
}

/// Answers 404 before the handler runs when `:id` names no user.
fn user_exists(store: Arc<UserStore>) -> Middleware {
    Middleware::standard(move |req, res, next| {
        let store = store.clone();
        async move {
            let exists = req
                .param("id")
                .and_then(|id| id.parse::<u64>().ok())
                .is_some_and(|id| store.get(id).is_some());

            if exists {
                next.run();
            } else {
                ActionResult::not_found()
                    .with_message("User not found")
                    .resolve(&res)
                    .await?;
            }
            Ok(())
        }
    })
}

/// Register the controller; returns the store it shares across requests.
pub fn register(registry: &mut MetadataRegistry) -> Arc<UserStore> {
    let users = Arc::new(UserStore::default());

    registry
        .controller::<UsersController>()
        .config(ControllerConfig::new().state(users.clone()))
        .use_middleware(log_requests())
        .use_route_middleware("get_by_id", user_exists(users.clone()))
        .use_route_middleware("update", user_exists(users.clone()))
        .use_route_middleware("remove", user_exists(users.clone()))
        .get("/", "list", |_this, ctx: HttpContext| async move {
            Ok::<_, BoxError>(Reply::json(&store(&ctx)?.list())?)
        })
        .get("/:id", "get_by_id", |_this, ctx: HttpContext| async move {
            let user = store(&ctx)?.get(user_id(&ctx)?);
            Ok::<_, BoxError>(ActionResult::json(&user))
        })
        .post("/", "create", |_this, ctx: HttpContext| async move {
            let input: UserInput = ctx.request.json()?;
            let user = store(&ctx)?.insert(input);
            let uri = format!("{}/{}", ctx.request.path().trim_end_matches('/'), user.id);
            Ok::<_, BoxError>(ActionResult::created(&user, uri))
        })
        .put("/:id", "update", |_this, ctx: HttpContext| async move {
            let input: UserInput = ctx.request.json()?;
            let user = store(&ctx)?.update(user_id(&ctx)?, input);
            Ok::<_, BoxError>(ActionResult::json(&user))
        })
        .delete("/:id", "remove", |_this, ctx: HttpContext| async move {
            store(&ctx)?.remove(user_id(&ctx)?);
            Ok::<_, BoxError>(ActionResult::no_content())
        })
        .on_error("on_error", |_this, error, _ctx| async move {
            tracing::warn!(error = %error, "users request rejected");
            Ok::<_, BoxError>(ActionResult::bad_request().with_message(error.to_string()))
        });

    users
}
