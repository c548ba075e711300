use axum::routing::{get, post};
use axum::Router;

use crate::auth::{bookmarks, handlers, users};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/logout", post(handlers::logout))
        .route("/me", get(handlers::me))
        .route("/users", get(users::list_users))
        .route(
            "/users/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route("/count-users", get(users::count_users))
        .route("/bookmark/{blog_id}", post(bookmarks::toggle_bookmark))
        .route("/saved-posts", get(bookmarks::list_saved_posts))
}
