#[macro_use]
extern crate rocket;

pub mod api;
pub mod app_state;
pub mod batch;
pub mod bert;
pub mod config;
pub mod error;
pub mod extractor;
pub mod labels;
pub mod proxy;
pub mod shaper;
pub mod types;

use rocket::fairing::AdHoc;
use rocket::figment::Figment;
use rocket::{Build, Rocket};

use api::{
    default_catcher,
    docs,
    docs_redirect,
    extract_entities,
    extract_entities_by_type,
    handle_get,
    health,
};
use app_state::AppState;
use config::AppConfig;

/// Assembles the service. The extractor is loaded while igniting, so a
/// model or configuration failure keeps the server from starting.
pub fn build(figment: Figment) -> Rocket<Build> {
    rocket::custom(figment)
        .attach(AdHoc::try_on_ignite("Entity extractor", |rocket| async move {
            let config: AppConfig = match rocket.figment().extract() {
                Ok(config) => config,
                Err(e) => {
                    tracing::error!("invalid configuration: {}", e);
                    return Err(rocket);
                }
            };

            match AppState::init(config).await {
                Ok(state) => Ok(rocket.manage(state)),
                Err(e) => {
                    tracing::error!("{}", e);
                    Err(rocket)
                }
            }
        }))
        .mount(
            "/",
            routes![
                docs_redirect,
                docs,
                health,
                handle_get,
                extract_entities,
                extract_entities_by_type,
            ],
        )
        .register("/", catchers![default_catcher])
}
