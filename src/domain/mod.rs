/// Domain model
///
/// Records of the job board: users, companies, job posts and applications,
/// plus the role vocabulary used by the access gate.

mod application;
mod company;
mod job_post;
mod role;
mod user;

pub use application::{Application, ApplicationFilter, ApplicationStatus, NewApplication};
pub use company::{Company, CompanyUpdate, NewCompany};
pub use job_post::{
    Experience, JobPost, JobPostFilter, JobPostStatus, JobPostUpdate, NewJobPost, WorkMode,
};
pub use role::Role;
pub use user::{NewUser, User, UserSnapshot, UserUpdate};
