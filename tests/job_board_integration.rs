mod common;

use common::{error_code, spawn_app, spawn_app_with_policy, Session, TestApp};
use jobboard::lifecycle::ZeroMatchPolicy;
use serde_json::{json, Value};
use std::collections::HashMap;

async fn statuses(app: &TestApp, owner: &Session, post: &str) -> HashMap<String, String> {
    let response = app
        .get_as(owner, &format!("/api/applications/jobPost/{}", post))
        .await;
    assert_eq!(200, response.status().as_u16());
    let applications: Vec<Value> = response.json().await.unwrap();
    applications
        .into_iter()
        .map(|a| {
            (
                a["userId"].as_str().unwrap().to_string(),
                a["status"].as_str().unwrap().to_string(),
            )
        })
        .collect()
}

async fn post_status(app: &TestApp, post: &str) -> String {
    let body: Value = app
        .client
        .get(app.url(&format!("/api/jobPosts/getJobPost/{}", post)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    body["status"].as_str().unwrap().to_string()
}

async fn search(app: &TestApp, body: Value) -> Vec<Value> {
    app.client
        .post(app.url("/api/jobPosts/getJobPostsMatching"))
        .json(&body)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

async fn decide(app: &TestApp, owner: &Session, post: &str, accepted: Value) -> reqwest::Response {
    app.post_as(
        owner,
        "/api/applications/decideApplicants",
        json!({ "jobPostId": post, "acceptedUsers": accepted }),
    )
    .await
}

async fn salaries_sorted(app: &TestApp, order: &str) -> Vec<i64> {
    let posts: Vec<Value> = app
        .client
        .post(app.url("/api/jobPosts/sortJobPostsBySalary"))
        .json(&json!({ "order": order }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    posts.iter().map(|p| p["salary"].as_i64().unwrap()).collect()
}

/// A company with one post and three users who applied to it.
async fn board(app: &TestApp) -> (Session, String, Vec<Session>) {
    let (owner, post) = app.company_with_post("acme").await;
    let mut applicants = Vec::new();
    for name in ["uone", "utwo", "uthree"] {
        let session = app.signed_up(name, "USER").await;
        assert_eq!(201, app.apply(&session, &post).await.status().as_u16());
        applicants.push(session);
    }
    (owner, post, applicants)
}

// --- Companies and job posts ---

#[tokio::test]
async fn company_can_publish_a_job_post() {
    let app = spawn_app().await;
    let (_owner, post) = app.company_with_post("acme").await;

    let listed: Vec<Value> = app
        .client
        .get(app.url("/api/jobPosts"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["id"], post.as_str());
    assert_eq!(listed[0]["status"], "Open");
    assert_eq!(listed[0]["type"], "Remote");
}

#[tokio::test]
async fn user_cannot_create_companies() {
    let app = spawn_app().await;
    let user = app.signed_up("plain", "USER").await;

    let response = app
        .post_as(
            &user,
            "/api/companies/addOwnCompany",
            json!({ "name": "Nope", "description": "No" }),
        )
        .await;

    assert_eq!(403, response.status().as_u16());
}

#[tokio::test]
async fn company_owns_at_most_one_company() {
    let app = spawn_app().await;
    let (owner, _) = app.company_with_post("acme").await;

    let response = app
        .post_as(
            &owner,
            "/api/companies/addOwnCompany",
            json!({ "name": "Second", "description": "Another one" }),
        )
        .await;

    assert_eq!(409, response.status().as_u16());
}

#[tokio::test]
async fn other_companies_cannot_be_updated() {
    let app = spawn_app().await;
    let (_, _) = app.company_with_post("acme").await;
    let (intruder, _) = app.company_with_post("globex").await;
    let companies: Vec<Value> = app
        .client
        .get(app.url("/api/companies"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let acme = companies
        .iter()
        .find(|c| c["name"] == "acmeInc")
        .unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .put_as(
            &intruder,
            &format!("/api/companies/updateOwnCompany/{}", acme),
            json!({ "description": "Taken over" }),
        )
        .await;

    assert_eq!(404, response.status().as_u16());
}

#[tokio::test]
async fn matching_filters_combine() {
    let app = spawn_app().await;
    let (owner, _) = app.company_with_post("acme").await;
    app.post_as(
        &owner,
        "/api/jobPosts/addOwnJobPost",
        json!({
            "title": "Junior Designer",
            "description": "Draw things",
            "location": "Paris",
            "salary": 2000,
            "experience": "Junior",
            "type": "OnSite"
        }),
    )
    .await;

    assert_eq!(search(&app, json!({})).await.len(), 2);
    assert_eq!(search(&app, json!({ "title": "Rust" })).await.len(), 1);
    assert_eq!(search(&app, json!({ "company": "acmeInc", "type": "OnSite" })).await.len(), 1);
    assert_eq!(search(&app, json!({ "minimumSalary": 2000 })).await.len(), 1);
    assert_eq!(search(&app, json!({ "minimumSalary": 5000 })).await.len(), 0);
    assert_eq!(search(&app, json!({ "location": "Paris", "experience": "Mid" })).await.len(), 0);
}

#[tokio::test]
async fn company_cannot_change_job_post_status() {
    let app = spawn_app().await;
    let (owner, post) = app.company_with_post("acme").await;

    let response = app
        .put_as(
            &owner,
            &format!("/api/jobPosts/updateJobPost/{}", post),
            json!({ "status": "Closed" }),
        )
        .await;
    assert_eq!(403, response.status().as_u16());

    let response = app
        .put_as(
            &owner,
            &format!("/api/jobPosts/updateJobPost/{}", post),
            json!({ "title": "Senior Rust Engineer", "salary": 7000 }),
        )
        .await;
    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["title"], "Senior Rust Engineer");
    assert_eq!(body["salary"], 7000);
}

#[tokio::test]
async fn company_cannot_edit_someone_elses_post() {
    let app = spawn_app().await;
    let (_, post) = app.company_with_post("acme").await;
    let (intruder, _) = app.company_with_post("globex").await;

    let response = app
        .put_as(
            &intruder,
            &format!("/api/jobPosts/updateJobPost/{}", post),
            json!({ "title": "Hijacked" }),
        )
        .await;

    assert_eq!(404, response.status().as_u16());
}

#[tokio::test]
async fn admin_close_rejects_pending_and_cannot_be_undone() {
    let app = spawn_app().await;
    let (owner, post, _) = board(&app).await;
    let admin = app.admin("root").await;

    let response = app
        .put_as(
            &admin,
            &format!("/api/jobPosts/updateJobPost/{}", post),
            json!({ "status": "Closed" }),
        )
        .await;
    assert_eq!(200, response.status().as_u16());

    assert_eq!(post_status(&app, &post).await, "Closed");
    assert!(statuses(&app, &owner, &post)
        .await
        .values()
        .all(|s| s == "Rejected"));

    let response = app
        .put_as(
            &admin,
            &format!("/api/jobPosts/updateJobPost/{}", post),
            json!({ "status": "Open" }),
        )
        .await;
    assert_eq!(409, response.status().as_u16());
    assert_eq!(error_code(response).await, "JOB_POST_CLOSED");
}

#[tokio::test]
async fn admin_can_delete_job_posts() {
    let app = spawn_app().await;
    let (owner, post) = app.company_with_post("acme").await;
    let admin = app.admin("root").await;

    let path = format!("/api/jobPosts/deleteJobPost/{}", post);
    assert_eq!(403, app.delete_as(&owner, &path).await.status().as_u16());
    assert_eq!(200, app.delete_as(&admin, &path).await.status().as_u16());
    assert_eq!(404, app.delete_as(&admin, &path).await.status().as_u16());
}

// --- Applications ---

#[tokio::test]
async fn applying_twice_is_a_conflict() {
    let app = spawn_app().await;
    let (_, post) = app.company_with_post("acme").await;
    let user = app.signed_up("nina", "USER").await;

    assert_eq!(201, app.apply(&user, &post).await.status().as_u16());
    let response = app.apply(&user, &post).await;

    assert_eq!(409, response.status().as_u16());
    assert_eq!(error_code(response).await, "DUPLICATE_APPLICATION");

    let mine: Vec<Value> = app
        .get_as(&user, "/api/applications/myApplications")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0]["status"], "Pending");
}

#[tokio::test]
async fn applying_to_unknown_post_is_404() {
    let app = spawn_app().await;
    let user = app.signed_up("oscar", "USER").await;

    let response = app.apply(&user, &uuid::Uuid::new_v4().to_string()).await;

    assert_eq!(404, response.status().as_u16());
}

#[tokio::test]
async fn companies_cannot_apply() {
    let app = spawn_app().await;
    let (owner, post) = app.company_with_post("acme").await;

    assert_eq!(403, app.apply(&owner, &post).await.status().as_u16());
}

#[tokio::test]
async fn applicants_are_visible_only_to_the_owner() {
    let app = spawn_app().await;
    let (_, post, _) = board(&app).await;
    let (intruder, _) = app.company_with_post("globex").await;

    let response = app
        .get_as(&intruder, &format!("/api/applications/jobPost/{}", post))
        .await;

    assert_eq!(404, response.status().as_u16());
}

#[tokio::test]
async fn decide_accepts_chosen_and_rejects_the_rest() {
    let app = spawn_app().await;
    let (owner, post, applicants) = board(&app).await;

    let response = app
        .post_as(
            &owner,
            "/api/applications/decideApplicants",
            json!({ "jobPostId": post, "acceptedUsers": applicants[0].id() }),
        )
        .await;

    assert_eq!(200, response.status().as_u16());
    let report: Value = response.json().await.unwrap();
    assert_eq!(report["accepted"], 1);
    assert_eq!(report["rejected"], 2);
    assert_eq!(report["closed"], true);
    assert_eq!(report["rowsAffected"], 4);

    let statuses = statuses(&app, &owner, &post).await;
    assert_eq!(statuses[&applicants[0].id()], "Accepted");
    assert_eq!(statuses[&applicants[1].id()], "Rejected");
    assert_eq!(statuses[&applicants[2].id()], "Rejected");
    assert_eq!(post_status(&app, &post).await, "Closed");

    // The post is closed to new applicants.
    let late = app.signed_up("late", "USER").await;
    let response = app.apply(&late, &post).await;
    assert_eq!(409, response.status().as_u16());
}

#[tokio::test]
async fn decide_accepts_a_list() {
    let app = spawn_app().await;
    let (owner, post, applicants) = board(&app).await;

    let response = app
        .post_as(
            &owner,
            "/api/applications/decideApplicants",
            json!({
                "jobPostId": post,
                "acceptedUsers": [applicants[0].id(), applicants[2].id()]
            }),
        )
        .await;

    assert_eq!(200, response.status().as_u16());
    let statuses = statuses(&app, &owner, &post).await;
    assert_eq!(statuses[&applicants[1].id()], "Rejected");
    assert_eq!(statuses[&applicants[2].id()], "Accepted");
}

#[tokio::test]
async fn decide_by_non_owner_is_404_and_changes_nothing() {
    let app = spawn_app().await;
    let (owner, post, applicants) = board(&app).await;
    let (intruder, _) = app.company_with_post("globex").await;

    let response = app
        .post_as(
            &intruder,
            "/api/applications/decideApplicants",
            json!({ "jobPostId": post, "acceptedUsers": [applicants[0].id()] }),
        )
        .await;

    assert_eq!(404, response.status().as_u16());
    assert_eq!(error_code(response).await, "NOT_FOUND");
    assert!(statuses(&app, &owner, &post)
        .await
        .values()
        .all(|s| s == "Pending"));
    assert_eq!(post_status(&app, &post).await, "Open");
}

#[tokio::test]
async fn decide_by_plain_user_is_forbidden() {
    let app = spawn_app().await;
    let (_, post, applicants) = board(&app).await;

    let response = app
        .post_as(
            &applicants[0],
            "/api/applications/decideApplicants",
            json!({ "jobPostId": post, "acceptedUsers": applicants[0].id() }),
        )
        .await;

    assert_eq!(403, response.status().as_u16());
}

#[tokio::test]
async fn zero_match_rolls_back_by_default() {
    let app = spawn_app().await;
    let (owner, post, _) = board(&app).await;
    let stranger = app.signed_up("stranger", "USER").await;

    let response = app
        .post_as(
            &owner,
            "/api/applications/decideApplicants",
            json!({ "jobPostId": post, "acceptedUsers": [stranger.id()] }),
        )
        .await;

    assert_eq!(404, response.status().as_u16());
    assert!(statuses(&app, &owner, &post)
        .await
        .values()
        .all(|s| s == "Pending"));
    assert_eq!(post_status(&app, &post).await, "Open");
}

#[tokio::test]
async fn zero_match_with_commit_and_report_keeps_rejections() {
    let app = spawn_app_with_policy(ZeroMatchPolicy::CommitAndReport).await;
    let (owner, post, _) = board(&app).await;
    let stranger = app.signed_up("stranger", "USER").await;

    let response = app
        .post_as(
            &owner,
            "/api/applications/decideApplicants",
            json!({ "jobPostId": post, "acceptedUsers": [stranger.id()] }),
        )
        .await;

    assert_eq!(404, response.status().as_u16());
    assert!(statuses(&app, &owner, &post)
        .await
        .values()
        .all(|s| s == "Rejected"));
    assert_eq!(post_status(&app, &post).await, "Closed");
}

#[tokio::test]
async fn second_decide_is_rejected_without_reflipping() {
    let app = spawn_app().await;
    let (owner, post, applicants) = board(&app).await;
    assert_eq!(200, decide(&app, &owner, &post, json!(applicants[0].id())).await.status().as_u16());
    let before = statuses(&app, &owner, &post).await;

    let response = decide(&app, &owner, &post, json!(applicants[1].id())).await;

    assert_eq!(409, response.status().as_u16());
    assert_eq!(error_code(response).await, "JOB_POST_CLOSED");
    assert_eq!(statuses(&app, &owner, &post).await, before);
}

#[tokio::test]
async fn admin_manages_applications() {
    let app = spawn_app().await;
    let (_, _, applicants) = board(&app).await;
    let admin = app.admin("root").await;

    let all: Vec<Value> = app
        .get_as(&admin, "/api/applications")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(all.len(), 3);

    let id = all[0]["id"].as_str().unwrap();
    let path = format!("/api/applications/deleteApplication/{}", id);
    assert_eq!(403, app.delete_as(&applicants[0], &path).await.status().as_u16());
    assert_eq!(200, app.delete_as(&admin, &path).await.status().as_u16());
    assert_eq!(404, app.delete_as(&admin, &path).await.status().as_u16());
}

// --- Administration and ownership routes ---

#[tokio::test]
async fn company_deletes_only_its_own_job_posts() {
    let app = spawn_app().await;
    let (owner, post) = app.company_with_post("acme").await;
    let (intruder, _) = app.company_with_post("globex").await;

    let path = format!("/api/jobPosts/deleteOwnJobPost/{}", post);
    assert_eq!(404, app.delete_as(&intruder, &path).await.status().as_u16());
    assert_eq!(200, app.delete_as(&owner, &path).await.status().as_u16());
    assert_eq!(404, app.delete_as(&owner, &path).await.status().as_u16());
}

#[tokio::test]
async fn job_posts_sort_by_salary_both_ways() {
    let app = spawn_app().await;
    let (owner, _) = app.company_with_post("acme").await;
    app.post_as(
        &owner,
        "/api/jobPosts/addOwnJobPost",
        json!({
            "title": "Junior Designer",
            "description": "Draw things",
            "location": "Paris",
            "salary": 2000,
            "experience": "Junior",
            "type": "OnSite"
        }),
    )
    .await;

    assert_eq!(salaries_sorted(&app, "asc").await, vec![2000, 5000]);
    assert_eq!(salaries_sorted(&app, "desc").await, vec![5000, 2000]);
}

#[tokio::test]
async fn admin_publishes_job_posts_for_a_named_company() {
    let app = spawn_app().await;
    let (owner, _) = app.company_with_post("acme").await;
    let admin = app.admin("root").await;
    let body = |company: &str| {
        json!({
            "title": "Ops Engineer",
            "description": "Keep it running",
            "location": "Lisbon",
            "salary": 4000,
            "experience": "Senior",
            "type": "Hybrid",
            "companyName": company
        })
    };

    let response = app.post_as(&admin, "/api/jobPosts", body("acmeInc")).await;
    assert_eq!(201, response.status().as_u16());
    let post: Value = response.json().await.unwrap();
    assert_eq!(post["status"], "Open");

    let response = app.post_as(&admin, "/api/jobPosts", body("NoSuchInc")).await;
    assert_eq!(404, response.status().as_u16());

    let response = app.post_as(&owner, "/api/jobPosts", body("acmeInc")).await;
    assert_eq!(403, response.status().as_u16());

    let listed: Vec<Value> = app
        .client
        .get(app.url("/api/jobPosts"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.len(), 2);
}

#[tokio::test]
async fn single_application_is_visible_to_its_parties_only() {
    let app = spawn_app().await;
    let (owner, _, applicants) = board(&app).await;
    let (intruder, _) = app.company_with_post("globex").await;
    let admin = app.admin("root").await;

    let mine: Vec<Value> = app
        .get_as(&applicants[0], "/api/applications/myApplications")
        .await
        .json()
        .await
        .unwrap();
    let path = format!("/api/applications/{}", mine[0]["id"].as_str().unwrap());

    for session in [&applicants[0], &owner, &admin] {
        let response = app.get_as(session, &path).await;
        assert_eq!(200, response.status().as_u16());
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["id"], mine[0]["id"]);
    }
    for session in [&applicants[1], &intruder] {
        assert_eq!(404, app.get_as(session, &path).await.status().as_u16());
    }
}

#[tokio::test]
async fn admin_deletes_companies_and_their_posts() {
    let app = spawn_app().await;
    let (owner, post) = app.company_with_post("acme").await;
    let admin = app.admin("root").await;

    let companies: Vec<Value> = app
        .client
        .get(app.url("/api/companies"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let path = format!("/api/companies/{}", companies[0]["id"].as_str().unwrap());

    let response = app.client.get(app.url(&path)).send().await.unwrap();
    assert_eq!(200, response.status().as_u16());

    assert_eq!(403, app.delete_as(&owner, &path).await.status().as_u16());
    assert_eq!(200, app.delete_as(&admin, &path).await.status().as_u16());
    assert_eq!(404, app.delete_as(&admin, &path).await.status().as_u16());

    let response = app.client.get(app.url(&path)).send().await.unwrap();
    assert_eq!(404, response.status().as_u16());
    let response = app
        .client
        .get(app.url(&format!("/api/jobPosts/getJobPost/{}", post)))
        .send()
        .await
        .unwrap();
    assert_eq!(404, response.status().as_u16());
}
