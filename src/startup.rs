use actix_web::dev::Server;
use actix_web::{error, guard, middleware::Logger, web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::TokenService;
use crate::configuration::Settings;
use crate::domain::Role;
use crate::error::{AppError, ValidationError};
use crate::lifecycle::LifecycleEngine;
use crate::middleware::{AccessGate, LoggerMiddleware, RequiredRoles};
use crate::routes::{
    add_job_post, add_own_company, add_own_job_post, apply_as_user, decide_applicants,
    delete_application, delete_company, delete_job_post, delete_own_job_post, get_application,
    get_company, get_job_post, get_job_posts_matching, health_check, job_post_applications,
    list_applications, list_companies, list_job_posts, login, logout, me, my_applications,
    refresh, register, sort_job_posts_by_salary, update_job_post, update_own_company,
    update_user,
};
use crate::store::JobBoardStore;

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let message = err.to_string();
        error::Error::from(AppError::from(ValidationError::MalformedBody(message)))
    })
}

fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, _req| {
        error::Error::from(AppError::from(ValidationError::InvalidFormat(format!(
            "path: {}",
            err
        ))))
    })
}

pub fn run(
    listener: TcpListener,
    store: Arc<dyn JobBoardStore>,
    settings: Settings,
) -> Result<Server, std::io::Error> {
    let tokens = TokenService::new(&settings.jwt);
    let engine = web::Data::new(LifecycleEngine::new(
        store.clone(),
        settings.lifecycle.zero_match_policy,
    ));
    let store = web::Data::from(store);
    let tokens_data = web::Data::new(tokens.clone());

    tracing::info!(
        zero_match_policy = ?settings.lifecycle.zero_match_policy,
        "Lifecycle engine configured"
    );

    let server = HttpServer::new(move || {
        let gate = |policy: RequiredRoles| AccessGate::new(tokens.clone(), policy);

        App::new()
            // Global middleware
            .wrap(Logger::default())
            .wrap(LoggerMiddleware)
            // Shared state
            .app_data(store.clone())
            .app_data(tokens_data.clone())
            .app_data(engine.clone())
            .app_data(json_config())
            .app_data(path_config())
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/api")
                    // Credentials
                    .route("/register", web::post().to(register))
                    .route("/login", web::post().to(login))
                    .route("/refreshToken", web::post().to(refresh))
                    .route("/logout", web::get().to(logout))
                    .service(
                        web::resource("/me")
                            .wrap(gate(RequiredRoles::any_authenticated()))
                            .route(web::get().to(me)),
                    )
                    .service(
                        web::resource("/users/{id}")
                            .wrap(gate(RequiredRoles::only(Role::Admin)))
                            .route(web::put().to(update_user)),
                    )
                    // Companies
                    .service(
                        web::resource("/companies")
                            .wrap(gate(RequiredRoles::public()))
                            .route(web::get().to(list_companies)),
                    )
                    .service(
                        web::resource("/companies/addOwnCompany")
                            .wrap(gate(RequiredRoles::only(Role::Company)))
                            .route(web::post().to(add_own_company)),
                    )
                    .service(
                        web::resource("/companies/updateOwnCompany/{id}")
                            .wrap(gate(RequiredRoles::only(Role::Company)))
                            .route(web::put().to(update_own_company)),
                    )
                    // Method-guarded so GET falls through to the public resource.
                    .service(
                        web::resource("/companies/{id}")
                            .guard(guard::Delete())
                            .wrap(gate(RequiredRoles::only(Role::Admin)))
                            .route(web::delete().to(delete_company)),
                    )
                    .service(
                        web::resource("/companies/{id}")
                            .wrap(gate(RequiredRoles::public()))
                            .route(web::get().to(get_company)),
                    )
                    // Job posts
                    .service(
                        web::resource("/jobPosts")
                            .guard(guard::Post())
                            .wrap(gate(RequiredRoles::only(Role::Admin)))
                            .route(web::post().to(add_job_post)),
                    )
                    .service(
                        web::resource("/jobPosts")
                            .wrap(gate(RequiredRoles::public()))
                            .route(web::get().to(list_job_posts)),
                    )
                    .service(
                        web::resource("/jobPosts/getJobPost/{id}")
                            .wrap(gate(RequiredRoles::public()))
                            .route(web::get().to(get_job_post)),
                    )
                    .service(
                        web::resource("/jobPosts/getJobPostsMatching")
                            .wrap(gate(RequiredRoles::public()))
                            .route(web::post().to(get_job_posts_matching)),
                    )
                    .service(
                        web::resource("/jobPosts/getJobPostsMatchingWithMinimumSalary")
                            .wrap(gate(RequiredRoles::public()))
                            .route(web::post().to(get_job_posts_matching)),
                    )
                    .service(
                        web::resource("/jobPosts/sortJobPostsBySalary")
                            .wrap(gate(RequiredRoles::public()))
                            .route(web::post().to(sort_job_posts_by_salary)),
                    )
                    .service(
                        web::resource("/jobPosts/addOwnJobPost")
                            .wrap(gate(RequiredRoles::only(Role::Company)))
                            .route(web::post().to(add_own_job_post)),
                    )
                    .service(
                        web::resource("/jobPosts/updateJobPost/{id}")
                            .wrap(gate(RequiredRoles::any_of([Role::Admin, Role::Company])))
                            .route(web::put().to(update_job_post)),
                    )
                    .service(
                        web::resource("/jobPosts/updateOwnJobPost/{id}")
                            .wrap(gate(RequiredRoles::only(Role::Company)))
                            .route(web::put().to(update_job_post)),
                    )
                    .service(
                        web::resource("/jobPosts/deleteJobPost/{id}")
                            .wrap(gate(RequiredRoles::only(Role::Admin)))
                            .route(web::delete().to(delete_job_post)),
                    )
                    .service(
                        web::resource("/jobPosts/deleteOwnJobPost/{id}")
                            .wrap(gate(RequiredRoles::only(Role::Company)))
                            .route(web::delete().to(delete_own_job_post)),
                    )
                    // Applications
                    .service(
                        web::resource("/applications")
                            .wrap(gate(RequiredRoles::only(Role::Admin)))
                            .route(web::get().to(list_applications)),
                    )
                    .service(
                        web::resource("/applications/applyAsUser")
                            .wrap(gate(RequiredRoles::only(Role::User)))
                            .route(web::post().to(apply_as_user)),
                    )
                    .service(
                        web::resource("/applications/myApplications")
                            .wrap(gate(RequiredRoles::only(Role::User)))
                            .route(web::get().to(my_applications)),
                    )
                    .service(
                        web::resource("/applications/jobPost/{id}")
                            .wrap(gate(RequiredRoles::only(Role::Company)))
                            .route(web::get().to(job_post_applications)),
                    )
                    .service(
                        web::resource("/applications/decideApplicants")
                            .wrap(gate(RequiredRoles::only(Role::Company)))
                            .route(web::post().to(decide_applicants)),
                    )
                    .service(
                        web::resource("/applications/deleteApplication/{id}")
                            .wrap(gate(RequiredRoles::only(Role::Admin)))
                            .route(web::delete().to(delete_application)),
                    )
                    // Last, so the named application routes above match first.
                    .service(
                        web::resource("/applications/{id}")
                            .wrap(gate(RequiredRoles::any_authenticated()))
                            .route(web::get().to(get_application)),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
