/// End-to-end flows through the full router
mod common;

use axum::http::StatusCode;
use campus_report::{
    account::{CreateSubadminForm, Role},
    issues::IssueStatus,
};
use common::*;
use std::time::Duration;

async fn register_and_login_alice(portal: &TestPortal) -> String {
    let response = portal
        .send(post_form("/register", &alice_registration(), None))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");

    portal.login("alice@ktu.edu.gh", "secret1").await
}

async fn create_staff(portal: &TestPortal) -> String {
    portal
        .ctx
        .account_manager
        .create_subadmin(CreateSubadminForm {
            full_name: "Kwame Boateng".to_string(),
            username: "kwame".to_string(),
            email: "kwame@ktu.edu.gh".to_string(),
            password: "staffpw".to_string(),
            confirm_password: "staffpw".to_string(),
        })
        .await
        .unwrap();

    portal.login("kwame@ktu.edu.gh", "staffpw").await
}

#[tokio::test]
async fn test_register_submit_and_resolve() {
    let portal = portal().await;
    let alice = register_and_login_alice(&portal).await;

    let response = portal
        .send(post_form(
            "/submit-issue",
            "subject=Projector+broken&category=Facilities&message=Room+4+projector+is+dead",
            Some(&alice),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/my-issues");

    let mine = json_body(portal.send(get("/my-issues", Some(&alice))).await).await;
    let issues = mine["issues"].as_array().unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0]["status"], "pending");
    assert_eq!(issues[0]["subject"], "Projector broken");
    let issue_id = issues[0]["id"].as_i64().unwrap();

    tokio::time::sleep(Duration::from_millis(5)).await;

    let staff = create_staff(&portal).await;
    let response = portal
        .send(post_form(
            &format!("/issues/{}/update", issue_id),
            "status=resolved&response=Fixed",
            Some(&staff),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/issues/{}", issue_id));

    let view = portal.ctx.issue_manager.get(issue_id).await.unwrap();
    assert_eq!(view.issue.status, IssueStatus::Resolved);
    assert_eq!(view.issue.response.as_deref(), Some("Fixed"));
    assert!(view.issue.updated_at > view.issue.created_at);
    assert_eq!(view.student_name.as_deref(), Some("Alice Mensah"));

    let logs = portal.ctx.audit_log.recent_by_subadmins(20).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].action, "update_issue");
    assert_eq!(logs[0].ip_address.as_deref(), Some("Unknown"));
}

#[tokio::test]
async fn test_wrong_password_creates_no_session() {
    let portal = portal().await;
    register_and_login_alice(&portal).await;

    let response = portal
        .send(post_form(
            "/login",
            "email=alice%40ktu.edu.gh&password=wrong",
            None,
        ))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(session_cookie(&response).is_none());
}

#[tokio::test]
async fn test_student_cannot_reach_admin_pages() {
    let portal = portal().await;
    let alice = register_and_login_alice(&portal).await;

    let response = portal
        .send(get("/admin/manage-categories", Some(&alice)))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
    let flash = set_cookie(&response, "flash").unwrap();
    assert!(!body_string(response).await.contains("Technical Issues"));

    // The login page shows the denial exactly once
    let login_page = json_body(portal.send(get("/login", Some(&flash))).await).await;
    assert_eq!(login_page["flash"]["kind"], "danger");
    assert_eq!(login_page["flash"]["message"], "Access denied.");

    for uri in ["/issues", "/subadmin/dashboard", "/admin/dashboard", "/admin/analytics"] {
        let response = portal.send(get(uri, Some(&alice))).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{}", uri);
        assert_eq!(location(&response), "/login", "{}", uri);
    }

    let response = portal
        .send(post_form("/issues/1/delete", "", Some(&alice)))
        .await;
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn test_missing_session_matches_insufficient_role() {
    let portal = portal().await;

    let response = portal.send(get("/admin/manage-categories", None)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");

    let response = portal
        .send(get("/my-issues", Some("portal_session=forged-token")))
        .await;
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn test_staff_cannot_submit_or_administer() {
    let portal = portal().await;
    let staff = create_staff(&portal).await;

    let response = portal
        .send(post_form(
            "/submit-issue",
            "subject=x&category=y&message=z",
            Some(&staff),
        ))
        .await;
    assert_eq!(location(&response), "/login");

    let response = portal
        .send(post_form("/admin/add-category", "name=Parking", Some(&staff)))
        .await;
    assert_eq!(location(&response), "/login");
    let names: Vec<String> = portal
        .ctx
        .category_manager
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert!(!names.contains(&"Parking".to_string()));
}

#[tokio::test]
async fn test_admin_deletes_are_idempotent() {
    let portal = portal().await;
    let admin = portal.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;

    for _ in 0..2 {
        let response = portal
            .send(post_form("/admin/delete-category/9999", "", Some(&admin)))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/admin/manage-categories");

        let response = portal
            .send(post_form("/issues/9999/delete", "", Some(&admin)))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/issues");
    }

    // Nothing was removed, so nothing was audited
    assert!(portal.ctx.audit_log.recent(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_category_management_is_audited() {
    let portal = portal().await;
    let admin = portal.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let response = portal
        .send(post_form(
            "/admin/add-category",
            "name=Parking&description=Car+park+issues",
            Some(&admin),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let duplicate = portal
        .send(post_form("/admin/add-category", "name=Parking", Some(&admin)))
        .await;
    assert_eq!(duplicate.status(), StatusCode::BAD_REQUEST);

    let listing = json_body(
        portal
            .send(get("/admin/manage-categories", Some(&admin)))
            .await,
    )
    .await;
    let categories = listing["categories"].as_array().unwrap();
    assert!(categories.iter().any(|c| c["name"] == "Parking"));

    let logs = json_body(portal.send(get("/admin/system-logs", Some(&admin))).await).await;
    assert_eq!(logs["total_logs"], 1);
    assert_eq!(logs["logs"][0]["action"], "add_category");
    assert_eq!(logs["has_next"], false);
}

#[tokio::test]
async fn test_registration_can_be_disabled() {
    let portal = portal().await;
    portal
        .ctx
        .settings_manager
        .update("registration_enabled", "false")
        .await
        .unwrap();

    let response = portal
        .send(post_form("/register", &alice_registration(), None))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(portal
        .ctx
        .users
        .find_user_by_email("alice@ktu.edu.gh")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_logout_ends_session() {
    let portal = portal().await;
    let alice = register_and_login_alice(&portal).await;

    let response = portal.send(post_form("/logout", "", Some(&alice))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");

    let response = portal.send(get("/my-issues", Some(&alice))).await;
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn test_role_change_revokes_session() {
    let portal = portal().await;
    let alice = register_and_login_alice(&portal).await;
    let admin = portal.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let student = portal
        .ctx
        .users
        .find_user_by_email("alice@ktu.edu.gh")
        .await
        .unwrap()
        .unwrap();
    let response = portal
        .send(post_form(
            &format!("/admin/users/{}/role", student.id),
            "role=subadmin",
            Some(&admin),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/admin/users");

    let response = portal.send(get("/student/dashboard", Some(&alice))).await;
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn test_chart_data_endpoint() {
    let portal = portal().await;
    let admin = portal.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let response = portal
        .send(get("/admin/api/chart-data/issues_by_status", Some(&admin)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(json_body(response).await.is_array());

    let response = portal
        .send(get("/admin/api/chart-data/pie_of_the_day", Some(&admin)))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_and_metrics() {
    let portal = portal().await;

    let health = json_body(portal.send(get("/health", None)).await).await;
    assert_eq!(health["status"], "ok");

    let response = portal.send(get("/metrics", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("portal_http_requests_total"));
}

#[tokio::test]
async fn test_student_posts_to_staff_and_admin_forms_change_nothing() {
    let portal = portal().await;
    let alice = register_and_login_alice(&portal).await;

    portal
        .send(post_form(
            "/submit-issue",
            "subject=Wifi&category=Technical+Issues&message=No+signal+in+library",
            Some(&alice),
        ))
        .await;
    let mine = json_body(portal.send(get("/my-issues", Some(&alice))).await).await;
    let issue_id = mine["issues"][0]["id"].as_i64().unwrap();

    let attempts = [
        (
            format!("/issues/{}/update", issue_id),
            "status=resolved&response=Done".to_string(),
        ),
        (
            "/admin/add-prefix".to_string(),
            "prefix=EE&description=Electrical".to_string(),
        ),
        (
            "/admin/update-setting".to_string(),
            "key=site_name&value=Hijacked".to_string(),
        ),
        (
            "/admin/system-settings".to_string(),
            "setting_registration_enabled=false".to_string(),
        ),
        (
            "/admin/add-category".to_string(),
            "name=Parking".to_string(),
        ),
    ];

    for (uri, body) in &attempts {
        let response = portal.send(post_form(uri, body, Some(&alice))).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{}", uri);
        assert_eq!(location(&response), "/login", "{}", uri);
    }

    let view = portal.ctx.issue_manager.get(issue_id).await.unwrap();
    assert_eq!(view.issue.status, IssueStatus::Pending);
    assert!(view.issue.response.is_none());

    let prefixes = portal.ctx.prefix_manager.prefix_strings().await.unwrap();
    assert!(!prefixes.contains(&"EE".to_string()));

    let settings = &portal.ctx.settings_manager;
    assert_eq!(
        settings.get("site_name").await.unwrap().as_deref(),
        Some("KTU Student Report System")
    );
    assert!(settings.get_bool("registration_enabled", false).await.unwrap());

    assert!(portal.ctx.audit_log.recent(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_marking_notification_read_is_audited() {
    let portal = portal().await;
    let admin = portal.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;

    portal
        .send(post_form(
            "/admin/create-notification",
            "title=Maintenance&message=Portal+down+at+noon&type=warning",
            Some(&admin),
        ))
        .await;
    let notification = portal.ctx.notification_manager.list().await.unwrap()[0].clone();
    assert!(!notification.is_read);

    let response = portal
        .send(post_form(
            &format!("/admin/notifications/{}/read", notification.id),
            "",
            Some(&admin),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/admin/notifications");

    assert!(portal.ctx.notification_manager.list().await.unwrap()[0].is_read);
    let logs = portal.ctx.audit_log.recent(10).await.unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].action, "mark_notification_read");

    // Unknown notifications leave no trace
    portal
        .send(post_form("/admin/notifications/9999/read", "", Some(&admin)))
        .await;
    assert_eq!(portal.ctx.audit_log.recent(10).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_student_owning_issues_cannot_be_promoted_or_deleted() {
    let portal = portal().await;
    let alice = register_and_login_alice(&portal).await;
    let admin = portal.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;

    portal
        .send(post_form(
            "/submit-issue",
            "subject=Fees&category=Administrative+Issues&message=Double+charged",
            Some(&alice),
        ))
        .await;
    let student = portal
        .ctx
        .users
        .find_user_by_email("alice@ktu.edu.gh")
        .await
        .unwrap()
        .unwrap();

    let response = portal
        .send(post_form(
            &format!("/admin/users/{}/role", student.id),
            "role=subadmin",
            Some(&admin),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = portal
        .send(post_form(
            &format!("/admin/users/{}/delete", student.id),
            "",
            Some(&admin),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let student = portal.ctx.account_manager.get_user(student.id).await.unwrap();
    assert_eq!(student.role, Role::Student);
    let issues = portal.ctx.issue_manager.list_for_student(student.id).await.unwrap();
    assert_eq!(issues.len(), 1);
}

#[tokio::test]
async fn test_issue_view_offers_every_assignable_staff_member() {
    let portal = portal().await;
    let alice = register_and_login_alice(&portal).await;
    portal
        .send(post_form(
            "/submit-issue",
            "subject=Lab+door&category=Facilities+Issues&message=Lock+broken",
            Some(&alice),
        ))
        .await;
    let mine = json_body(portal.send(get("/my-issues", Some(&alice))).await).await;
    let issue_id = mine["issues"][0]["id"].as_i64().unwrap();

    let staff = create_staff(&portal).await;
    let view = json_body(
        portal
            .send(get(&format!("/issues/{}", issue_id), Some(&staff)))
            .await,
    )
    .await;
    let mut emails: Vec<String> = view["staff"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["email"].as_str().unwrap().to_string())
        .collect();
    emails.sort();
    assert_eq!(emails, vec![ADMIN_EMAIL.to_string(), "kwame@ktu.edu.gh".to_string()]);

    let admin = portal
        .ctx
        .users
        .find_user_by_email(ADMIN_EMAIL)
        .await
        .unwrap()
        .unwrap();
    let response = portal
        .send(post_form(
            &format!("/issues/{}/assign", issue_id),
            &format!("assigned_to={}", admin.id),
            Some(&staff),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let view = portal.ctx.issue_manager.get(issue_id).await.unwrap();
    assert_eq!(view.issue.assigned_to, Some(admin.id));
}
