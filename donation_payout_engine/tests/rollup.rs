use chrono::NaiveDate;
use donation_payout_engine::{
    db_types::*,
    tenant::TenantContext,
    test_utils::prepare_env::prepare_test_env,
    traits::{PayoutGatewayDatabase, SettlementWindow},
    PayoutFlowApi,
    RollupApi,
    SqliteDatabase,
};
use dpg_common::{CurrencyCode, Money};
use tokio::runtime::Runtime;

fn eur(minor: i64) -> Money {
    Money::from_minor_units(minor, CurrencyCode::default())
}

fn ctx() -> TenantContext {
    TenantContext::new("test", CurrencyCode::default())
}

/// A project with a single successful donation, driven all the way to a settled payout.
async fn settled_payout(flow: &PayoutFlowApi<SqliteDatabase>, slug: &str, amount: Money, settled_on: NaiveDate) {
    let project = flow.create_project(NewProject::new(slug, slug, eur(10_000))).await.unwrap();
    let order_id = OrderId::from(format!("order-{slug}"));
    flow.submit_order(NewOrder::new(order_id.clone())).await.unwrap();
    flow.update_order_status(&order_id, OrderStatus::Locked, &ctx()).await.unwrap();
    flow.update_order_status(&order_id, OrderStatus::Success, &ctx()).await.unwrap();
    flow.process_new_donation(NewDonation::new(project.id, order_id, amount), &ctx()).await.unwrap();
    flow.complete_project(project.id, ProjectPhase::DoneComplete, &ctx()).await.unwrap();
    let payout = flow.db().open_payout_for_project(project.id).await.unwrap().unwrap();
    flow.begin_payout_export(payout.id).await.unwrap();
    let completed = settled_on.and_hms_opt(12, 0, 0).unwrap().and_utc();
    flow.settle_payout(payout.id, completed).await.unwrap();
}

#[test]
fn rollup_sums_settled_payouts_in_window_with_vat() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async {
        let url = "sqlite://../data/test_rollup.db";
        prepare_test_env(url).await;
        let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating database");
        let flow = PayoutFlowApi::new(db.clone());
        let api = RollupApi::new(db);

        // Fully funded at 5%: 100.00 raised pays out 95.00. Settled in January.
        settled_payout(&flow, "january", eur(10_000), NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()).await;
        // Settled in February; must not count.
        settled_payout(&flow, "february", eur(10_000), NaiveDate::from_ymd_opt(2024, 2, 15).unwrap()).await;

        let window = SettlementWindow::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        );
        let rollup = api.create_for_window(window, &ctx()).await.unwrap();
        assert_eq!(rollup.payable_amount_excl, eur(9500));
        // 21% VAT on top
        assert_eq!(rollup.payable_amount_incl, eur(11_495));
    });
}

#[test]
fn rollup_recalculates_as_payouts_settle() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async {
        let url = "sqlite://../data/test_rollup_recalc.db";
        prepare_test_env(url).await;
        let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating database");
        let flow = PayoutFlowApi::new(db.clone());
        let api = RollupApi::new(db);

        let window = SettlementWindow::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        );
        let rollup = api.create_for_window(window, &ctx()).await.unwrap();
        assert_eq!(rollup.payable_amount_excl, eur(0));
        assert_eq!(rollup.payable_amount_incl, eur(0));

        settled_payout(&flow, "late", eur(10_000), NaiveDate::from_ymd_opt(2024, 1, 20).unwrap()).await;
        let rollup = api.recalculate(rollup.id, &ctx()).await.unwrap();
        assert_eq!(rollup.payable_amount_excl, eur(9500));
        assert_eq!(rollup.payable_amount_incl, eur(11_495));
    });
}

#[test]
fn empty_window_rolls_up_to_zero() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async {
        let url = "sqlite://../data/test_rollup_empty.db";
        prepare_test_env(url).await;
        let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating database");
        let flow = PayoutFlowApi::new(db.clone());
        let api = RollupApi::new(db);

        // A payout exists but settles outside the window.
        settled_payout(&flow, "outside", eur(10_000), NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()).await;
        let window = SettlementWindow::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        );
        let rollup = api.create_for_window(window, &ctx()).await.unwrap();
        assert_eq!(rollup.payable_amount_excl, eur(0));
        assert_eq!(rollup.payable_amount_incl, eur(0));
        assert!(api.db().fetch_organization_payout(rollup.id).await.unwrap().is_some());
    });
}
