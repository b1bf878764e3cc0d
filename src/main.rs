#[macro_use]
extern crate rocket;

use quizforge_tenancy::create_rocket;

#[launch]
async fn rocket() -> _ {
    create_rocket().await
}
