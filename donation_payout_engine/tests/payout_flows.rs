use chrono::Utc;
use donation_payout_engine::{
    db_types::*,
    tenant::TenantContext,
    test_utils::prepare_env::prepare_test_env,
    traits::{DonationReporting, PayoutGatewayDatabase, PayoutGatewayError},
    ExportApi,
    PayoutFlowApi,
    SqliteDatabase,
};
use dpg_common::{CurrencyCode, Money};
use log::*;
use tokio::runtime::Runtime;

fn eur(minor: i64) -> Money {
    Money::from_minor_units(minor, CurrencyCode::default())
}

fn ctx() -> TenantContext {
    TenantContext::new("test", CurrencyCode::default())
}

async fn new_api(url: &str) -> PayoutFlowApi<SqliteDatabase> {
    prepare_test_env(url).await;
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating database");
    PayoutFlowApi::new(db)
}

/// Walks an order to `Success` and records a donation under it.
async fn donate(api: &PayoutFlowApi<SqliteDatabase>, project_id: i64, order_id: &str, amount: Money) {
    let order_id = OrderId::from(order_id.to_string());
    api.submit_order(NewOrder::new(order_id.clone())).await.expect("Error submitting order");
    api.update_order_status(&order_id, OrderStatus::Locked, &ctx()).await.expect("Error locking order");
    api.update_order_status(&order_id, OrderStatus::Pending, &ctx()).await.expect("Error moving to pending");
    api.process_new_donation(NewDonation::new(project_id, order_id.clone(), amount), &ctx())
        .await
        .expect("Error processing donation");
    api.update_order_status(&order_id, OrderStatus::Success, &ctx()).await.expect("Error completing order");
}

#[test]
fn partially_funded_project_pays_out_less_fee() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async {
        let url = "sqlite://../data/test_partial_funding.db";
        let api = new_api(url).await;
        let project = api
            .create_project(NewProject::new("water-well", "A well", Money::parse_major("200.00", CurrencyCode::default()).unwrap()))
            .await
            .expect("Error creating project");
        donate(&api, project.id, "order-1", eur(7500)).await;

        let project = api.complete_project(project.id, ProjectPhase::DoneIncomplete, &ctx()).await.unwrap();
        assert_eq!(project.amount_donated, eur(7500));

        let payout = api.db().open_payout_for_project(project.id).await.unwrap().expect("No payout was created");
        assert_eq!(payout.payout_rule(), PayoutRule::NotFullyFunded);
        assert_eq!(payout.amount_raised(), &eur(7500));
        assert_eq!(payout.organization_fee(), &eur(375));
        assert_eq!(payout.amount_payable(), &eur(7125));
        assert_eq!(payout.status(), PayoutStatus::New);
        info!("🧪️ partially funded payout checks out");
    });
}

#[test]
fn beneath_threshold_project_pays_out_nothing() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async {
        let url = "sqlite://../data/test_beneath_threshold.db";
        let api = new_api(url).await;
        let project =
            api.create_project(NewProject::new("tiny", "Tiny campaign", eur(20_000))).await.unwrap();
        donate(&api, project.id, "order-1", eur(1500)).await;
        api.complete_project(project.id, ProjectPhase::DoneIncomplete, &ctx()).await.unwrap();

        let payout = api.db().open_payout_for_project(project.id).await.unwrap().unwrap();
        assert_eq!(payout.payout_rule(), PayoutRule::BeneathThreshold);
        assert_eq!(payout.amount_payable(), &eur(0));
        assert_eq!(payout.organization_fee(), &eur(1500));
    });
}

#[test]
fn pending_donations_count_towards_raised() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async {
        let url = "sqlite://../data/test_pending_counts.db";
        let api = new_api(url).await;
        let project = api.create_project(NewProject::new("books", "Books", eur(20_000))).await.unwrap();

        // A pending order counts; a failed one does not.
        let pending = OrderId::from("order-pending".to_string());
        api.submit_order(NewOrder::new(pending.clone())).await.unwrap();
        api.update_order_status(&pending, OrderStatus::Locked, &ctx()).await.unwrap();
        api.update_order_status(&pending, OrderStatus::Pending, &ctx()).await.unwrap();
        api.process_new_donation(NewDonation::new(project.id, pending.clone(), eur(5000)), &ctx()).await.unwrap();

        let failed = OrderId::from("order-failed".to_string());
        api.submit_order(NewOrder::new(failed.clone())).await.unwrap();
        api.update_order_status(&failed, OrderStatus::Locked, &ctx()).await.unwrap();
        api.process_new_donation(NewDonation::new(project.id, failed.clone(), eur(9000)), &ctx()).await.unwrap();
        api.update_order_status(&failed, OrderStatus::Failed, &ctx()).await.unwrap();

        let project = api.db().fetch_project(project.id).await.unwrap().unwrap();
        assert_eq!(project.amount_donated, eur(5000));

        let totals = api.project_totals(project.id).await.unwrap();
        assert_eq!(totals.raised, eur(5000));
        assert_eq!(totals.pending, eur(5000));
        assert_eq!(totals.safe, eur(0));
        assert_eq!(totals.failed, eur(9000));

        // The failed order recovers; its donation rolls back into the total.
        api.update_order_status(&failed, OrderStatus::Pending, &ctx()).await.unwrap();
        let project = api.db().fetch_project(project.id).await.unwrap().unwrap();
        assert_eq!(project.amount_donated, eur(14_000));
        let totals = api.project_totals(project.id).await.unwrap();
        assert_eq!(totals.raised, eur(14_000));
        assert_eq!(totals.failed, eur(0));
    });
}

#[test]
fn illegal_order_transition_changes_nothing() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async {
        let url = "sqlite://../data/test_illegal_transition.db";
        let api = new_api(url).await;
        let order_id = OrderId::from("order-1".to_string());
        api.submit_order(NewOrder::new(order_id.clone())).await.unwrap();

        let err = api.update_order_status(&order_id, OrderStatus::Success, &ctx()).await.unwrap_err();
        assert!(matches!(err, PayoutGatewayError::OrderTransition(_)));
        let order = api.db().fetch_order_by_order_id(&order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Created);
    });
}

#[test]
fn submitting_an_order_twice_is_idempotent() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async {
        let url = "sqlite://../data/test_order_idempotency.db";
        let api = new_api(url).await;
        let order_id = OrderId::from("order-1".to_string());
        let first = api.submit_order(NewOrder::new(order_id.clone())).await.unwrap();
        api.update_order_status(&order_id, OrderStatus::Locked, &ctx()).await.unwrap();
        let second = api.submit_order(NewOrder::new(order_id)).await.unwrap();
        assert_eq!(first.id, second.id);
        // The stored record is returned, not a reset one.
        assert_eq!(second.status, OrderStatus::Locked);
    });
}

#[test]
fn exported_payout_is_protected_until_settled() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async {
        let url = "sqlite://../data/test_protected_payout.db";
        let api = new_api(url).await;
        let project = api.create_project(NewProject::new("garden", "A garden", eur(20_000))).await.unwrap();
        donate(&api, project.id, "order-1", eur(7500)).await;
        api.complete_project(project.id, ProjectPhase::DoneIncomplete, &ctx()).await.unwrap();
        let payout = api.db().open_payout_for_project(project.id).await.unwrap().unwrap();

        let payout = api.begin_payout_export(payout.id).await.unwrap();
        assert_eq!(payout.status(), PayoutStatus::InProgress);
        assert!(payout.protected());

        // A late donation arrives while money is moving. The project total updates, the payout does not.
        donate(&api, project.id, "order-2", eur(5000)).await;
        let frozen = api.db().fetch_payout(payout.id).await.unwrap().unwrap();
        assert_eq!(frozen.amount_payable(), &eur(7125));
        let project = api.db().fetch_project(project.id).await.unwrap().unwrap();
        assert_eq!(project.amount_donated, eur(12_500));

        // An explicit recalculation attempt is also refused.
        let err = api.recalculate_payout(payout.id, &ctx()).await.unwrap_err();
        assert!(matches!(err, PayoutGatewayError::Payout(PayoutError::Protected(_))));

        // Settling the payout opens the door for a fresh one on the next donation.
        api.settle_payout(payout.id, Utc::now()).await.unwrap();
        donate(&api, project.id, "order-3", eur(2500)).await;
        let next = api.db().open_payout_for_project(project.id).await.unwrap().unwrap();
        assert_ne!(next.id, payout.id);
        assert_eq!(next.status(), PayoutStatus::New);
        assert!(!next.protected());
        // The fresh payout only covers donations the settled one didn't: 125.00 of the 150.00 total.
        assert_eq!(next.amount_raised(), &eur(7500));
        assert_eq!(next.organization_fee(), &eur(375));
        assert_eq!(next.amount_payable(), &eur(7125));
    });
}

#[test]
fn bounced_payout_retries_with_costs_deducted() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async {
        let url = "sqlite://../data/test_payout_retry.db";
        let api = new_api(url).await;
        let project = api.create_project(NewProject::new("roof", "A roof", eur(20_000))).await.unwrap();
        donate(&api, project.id, "order-1", eur(7500)).await;
        api.complete_project(project.id, ProjectPhase::DoneIncomplete, &ctx()).await.unwrap();
        let payout = api.db().open_payout_for_project(project.id).await.unwrap().unwrap();

        api.begin_payout_export(payout.id).await.unwrap();
        api.settle_payout(payout.id, Utc::now()).await.unwrap();

        let payout = api.retry_payout(payout.id, &eur(150)).await.unwrap();
        assert_eq!(payout.status(), PayoutStatus::Retry);
        assert_eq!(payout.amount_payable(), &eur(6975));
        assert!(payout.completed().is_none());

        // Second attempt goes through.
        api.begin_payout_export(payout.id).await.unwrap();
        let payout = api.settle_payout(payout.id, Utc::now()).await.unwrap();
        assert_eq!(payout.status(), PayoutStatus::Settled);
        assert!(payout.completed().is_some());
    });
}

#[test]
fn completing_a_project_requires_a_done_phase() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async {
        let url = "sqlite://../data/test_phase_guard.db";
        let api = new_api(url).await;
        let project = api.create_project(NewProject::new("mill", "A mill", eur(20_000))).await.unwrap();
        let err = api.complete_project(project.id, ProjectPhase::Campaign, &ctx()).await.unwrap_err();
        assert!(matches!(err, PayoutGatewayError::PhaseNotDone(_)));
        assert!(api.db().open_payout_for_project(project.id).await.unwrap().is_none());
    });
}

#[test]
fn payout_export_serializes_the_full_history() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async {
        let url = "sqlite://../data/test_payout_export.db";
        let api = new_api(url).await;
        let project = api.create_project(NewProject::new("bridge", "A bridge", eur(20_000))).await.unwrap();
        donate(&api, project.id, "order-1", eur(7500)).await;
        api.complete_project(project.id, ProjectPhase::DoneIncomplete, &ctx()).await.unwrap();

        let exporter = ExportApi::new(api.db().clone());
        let json = exporter.export_payouts_for_project(project.id).await.unwrap();
        let rows: serde_json::Value = serde_json::from_str(&json).unwrap();
        let rows = rows.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["payout_rule"], "NotFullyFunded");
        assert_eq!(rows[0]["status"], "New");

        let json = exporter.export_donations_for_project(project.id).await.unwrap();
        let rows: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(rows.as_array().unwrap().len(), 1);
    });
}

#[test]
fn one_order_can_fund_multiple_projects() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async {
        let url = "sqlite://../data/test_multi_project_order.db";
        let api = new_api(url).await;
        let first = api.create_project(NewProject::new("north", "North", eur(20_000))).await.unwrap();
        let second = api.create_project(NewProject::new("south", "South", eur(20_000))).await.unwrap();

        let order_id = OrderId::from("order-split".to_string());
        api.submit_order(NewOrder::new(order_id.clone())).await.unwrap();
        api.update_order_status(&order_id, OrderStatus::Locked, &ctx()).await.unwrap();
        api.update_order_status(&order_id, OrderStatus::Pending, &ctx()).await.unwrap();
        api.process_new_donation(NewDonation::new(first.id, order_id.clone(), eur(3000)), &ctx()).await.unwrap();
        api.process_new_donation(NewDonation::new(second.id, order_id.clone(), eur(4000)), &ctx()).await.unwrap();
        api.update_order_status(&order_id, OrderStatus::Success, &ctx()).await.unwrap();

        let first = api.db().fetch_project(first.id).await.unwrap().unwrap();
        let second = api.db().fetch_project(second.id).await.unwrap().unwrap();
        assert_eq!(first.amount_donated, eur(3000));
        assert_eq!(second.amount_donated, eur(4000));
    });
}
