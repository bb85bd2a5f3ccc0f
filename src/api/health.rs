use actix_web::{get, web, HttpResponse};

use crate::watcher::{HealthProbe, WatcherState};

#[get("/health/watcher")]
pub(crate) async fn get_watcher_health(probe: web::Data<HealthProbe>) -> HttpResponse {
    let health = probe.snapshot();
    if health.state == WatcherState::Stopped {
        return HttpResponse::ServiceUnavailable().json(health);
    }
    HttpResponse::Ok().json(health)
}
