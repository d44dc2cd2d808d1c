mod common;

use common::{router, row, FakeDatabase, FakeGenerator};
use serde_json::json;
use sitequery::conversation::ConversationStore;
use sitequery::{ChatService, QueryRequest};
use std::sync::Arc;

fn ask(text: &str) -> QueryRequest {
    QueryRequest::new(text, &[], 5)
}

fn untouched_generator() -> Arc<FakeGenerator> {
    Arc::new(FakeGenerator::database("SELECT 1"))
}

#[tokio::test]
async fn test_budget_for_all_projects_skips_the_generator() {
    let llm = untouched_generator();
    let db = Arc::new(FakeDatabase::new().with_rows(
        "invoice_count",
        vec![
            row(json!({"project": "Cabot-1B", "invoice_count": 3, "total_invoiced": "1250.00"})),
            row(json!({"project": "Jain-1B", "invoice_count": 0, "total_invoiced": "0.00"})),
        ],
    ));

    let response = router(&llm, &db)
        .process(&ask("What is the budget status for all projects?"))
        .await;

    assert!(response.success);
    assert_eq!(
        response.message,
        "**Budget Status for All Projects**\n\n\
         | Project | # Invoices | Total Invoiced |\n\
         |---|---|---|\n\
         | **Cabot-1B** | 3 | $1250.00 |\n\
         | **Jain-1B** | 0 | $0.00 |"
    );
    assert!(llm.calls().is_empty());
    assert!(response.sql_query.is_none());
}

#[tokio::test]
async fn test_budget_for_all_projects_empty() {
    let llm = untouched_generator();
    let db = Arc::new(FakeDatabase::new());

    let response = router(&llm, &db).process(&ask("budget status for all projects")).await;
    assert_eq!(response.message, "No invoice data found for any project.");
}

#[tokio::test]
async fn test_project_summary_exact_match() {
    let llm = untouched_generator();
    let db = Arc::new(
        FakeDatabase::new()
            .with_rows(
                "LIMIT 1",
                vec![row(json!({
                    "id": 7,
                    "project_name": "Cabot-1B",
                    "template_name": "Kitchen Remodel",
                    "designer_name": "Ana Ruiz",
                    "client_name": " ",
                    "start_date": "2024-03-01",
                    "stored_percent_complete": 40,
                    "created_at": "2024-02-20"
                }))],
            )
            .with_rows(
                "FILTER",
                vec![
                    row(json!({"phase_name": "Design", "phase_order": 1, "phase_status": "Completed", "done": 4, "total": 4})),
                    row(json!({"phase_name": "Permits", "phase_order": 2, "phase_status": "In Progress", "done": 1, "total": 3})),
                    row(json!({"phase_name": "Build", "phase_order": 3, "phase_status": null, "done": 0, "total": 0})),
                ],
            ),
    );

    let response = router(&llm, &db)
        .process(&ask("show me details of cabot-1b project"))
        .await;

    assert!(response.success);
    assert!(response.message.starts_with("**Project:** Cabot-1B"));
    assert!(response.message.contains("- **Client:** -"));
    assert!(response.message.contains("- **Overall % Complete:** 40%"));
    assert!(response.message.contains("| Design | 1 | Completed | 100% |"));
    assert!(response.message.contains("| Permits | 2 | In Progress | 33% |"));
    assert!(response.message.contains("| Build | 3 | - | 0% |"));

    let executed = db.executed();
    assert_eq!(executed[0].1, vec!["CABOT-1B".to_string()]);
    assert_eq!(executed[1].1, vec!["7".to_string()]);
    assert!(llm.calls().is_empty());
}

#[tokio::test]
async fn test_project_summary_suggests_close_names() {
    let llm = untouched_generator();
    let db = Arc::new(FakeDatabase::new().with_names(&["Cabot-1B", "Jain-1B", "Cabot-2A"]));

    let response = router(&llm, &db).process(&ask("details of cabot-1c project")).await;

    assert!(response.success);
    assert!(response
        .message
        .starts_with("I couldn't find an exact project named 'CABOT-1C'.\nDid you mean:"));
    assert!(response.message.contains("- **Cabot-1B**"));
    assert!(!response.message.contains("Jain-1B"));
}

#[tokio::test]
async fn test_project_summary_lookup_failure_still_suggests_names() {
    let llm = untouched_generator();
    let db = Arc::new(
        FakeDatabase::new()
            .with_failure("LIMIT 1", "column p.\"percentComplete\" does not exist")
            .with_names(&["Cabot-1B", "Jain-1B"]),
    );

    let response = router(&llm, &db).process(&ask("details of cabot-1c project")).await;

    assert!(response.success);
    assert!(response.error.is_none());
    assert!(response.message.contains("Did you mean:"));
    assert!(response.message.contains("- **Cabot-1B**"));
    assert!(llm.calls().is_empty());
}

#[tokio::test]
async fn test_project_summary_lookup_outage_is_a_failure() {
    let llm = untouched_generator();
    let db = Arc::new(
        FakeDatabase::new()
            .with_outage("LIMIT 1")
            .with_names(&["Cabot-1B"]),
    );

    let response = router(&llm, &db).process(&ask("details of cabot-1b project")).await;

    assert!(!response.success);
    assert!(llm.calls().is_empty());
}

#[tokio::test]
async fn test_project_summary_lists_catalog_when_nothing_is_close() {
    let llm = untouched_generator();
    let db = Arc::new(FakeDatabase::new().with_names(&["Cabot-1B", "Jain-1B"]));

    let response = router(&llm, &db).process(&ask("details of warehouse project")).await;

    assert!(response.success);
    assert_eq!(
        response.message,
        "No project matches 'WAREHOUSE'. Here are all available projects:\n\n- **Cabot-1B**\n- **Jain-1B**"
    );
}

#[tokio::test]
async fn test_project_summary_with_empty_catalog() {
    let llm = untouched_generator();
    let db = Arc::new(FakeDatabase::new());

    let response = router(&llm, &db).process(&ask("details of anything project")).await;
    assert!(response.success);
    assert!(response.message.starts_with("No project matches 'ANYTHING'."));
}

#[tokio::test]
async fn test_details_rule_wins_over_status_rule() {
    let llm = untouched_generator();
    let db = Arc::new(FakeDatabase::new().with_names(&["Jain-1B"]));

    // also matches "status of", but details comes first
    let response = router(&llm, &db)
        .process(&ask("details of JAIN-1B project and the status of JAIN-1B"))
        .await;

    let executed = db.executed();
    assert!(executed[0].0.contains("LIMIT 1"));
    assert!(!executed.iter().any(|(sql, _)| sql.contains("ILIKE")));
    assert!(response.success);
}

#[tokio::test]
async fn test_phase_status() {
    let llm = untouched_generator();
    let db = Arc::new(FakeDatabase::new().with_rows(
        "ILIKE",
        vec![
            row(json!({"project_name": "Cabot-1B", "phase_name": "Design", "phase_order": 1, "phase_status": "Completed"})),
            row(json!({"project_name": "Cabot-1B", "phase_name": "Permits", "phase_order": 2, "phase_status": "Pending"})),
        ],
    ));

    let response = router(&llm, &db)
        .process(&ask("  what's the progress of cabot-1b  "))
        .await;

    assert_eq!(
        response.message,
        "**Phase Status for Cabot-1B:**\n\n| Phase | Order | Status |\n|---|---|---|\n| Design | 1 | Completed |\n| Permits | 2 | Pending |"
    );
    assert_eq!(db.executed()[0].1, vec!["%CABOT-1B%".to_string()]);
}

#[tokio::test]
async fn test_phase_status_without_phases() {
    let llm = untouched_generator();
    let db = Arc::new(FakeDatabase::new());

    let response = router(&llm, &db).process(&ask("status of elmgrove")).await;
    assert_eq!(response.message, "No phases found for project 'ELMGROVE'.");
}

#[tokio::test]
async fn test_project_budget() {
    let llm = untouched_generator();
    let db = Arc::new(FakeDatabase::new().with_rows(
        "invoiceNumber",
        vec![row(json!({
            "project": "Cabot-1B",
            "invoice_no": "INV-0042",
            "amount": "500.00",
            "status": "Paid",
            "paid_on": null
        }))],
    ));

    let response = router(&llm, &db)
        .process(&ask("budget status for cabot-1b project"))
        .await;

    assert_eq!(
        response.message,
        "**Invoices for Cabot-1B:**\n\n| Invoice # | Amount | Status | Paid On |\n|---|---|---|---|\n| INV-0042 | $500.00 | Paid | - |"
    );
    assert_eq!(db.executed()[0].1, vec!["CABOT-1B".to_string()]);
}

#[tokio::test]
async fn test_project_budget_without_invoices() {
    let llm = untouched_generator();
    let db = Arc::new(FakeDatabase::new());

    let response = router(&llm, &db).process(&ask("budget status for jain-1b project")).await;
    assert_eq!(response.message, "No invoices found for project **JAIN-1B**.");
}

#[tokio::test]
async fn test_intercept_database_outage_is_a_failure() {
    let llm = untouched_generator();
    let db = Arc::new(FakeDatabase::new().with_outage("invoice_count"));

    let response = router(&llm, &db).process(&ask("budget status for all projects")).await;

    assert!(!response.success);
    assert!(response.error.is_some());
    assert!(llm.calls().is_empty());
}

#[tokio::test]
async fn test_chat_service_records_history() {
    let llm = untouched_generator();
    let db = Arc::new(FakeDatabase::new());
    let service = ChatService::new(Arc::new(router(&llm, &db)), ConversationStore::new(4), 5);

    service.chat("site-7", "status of cabot-1b").await;
    service.chat("site-7", "budget status for all projects").await;

    assert!(service.clear("site-7"));
    assert!(!service.clear("site-7"));
}
