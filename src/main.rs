#[macro_use]
extern crate rocket;

#[launch]
fn rocket() -> _ {
    dotenvy::dotenv().ok();
    entity_gateway::build(rocket::Config::figment())
}
