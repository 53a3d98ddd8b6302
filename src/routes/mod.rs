mod applications;
mod auth;
mod companies;
mod health_check;
mod job_posts;

pub use applications::{
    apply_as_user, decide_applicants, delete_application, get_application,
    job_post_applications, list_applications, my_applications,
};
pub use auth::{login, logout, me, refresh, register, update_user};
pub use companies::{
    add_own_company, delete_company, get_company, list_companies, update_own_company,
};
pub use health_check::health_check;
pub use job_posts::{
    add_job_post, add_own_job_post, delete_job_post, delete_own_job_post, get_job_post,
    get_job_posts_matching, list_job_posts, sort_job_posts_by_salary, update_job_post,
};
