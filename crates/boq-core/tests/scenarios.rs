//! End-to-end cascade scenarios over an in-memory store.

use boq_core::{BoqError, CascadePolicy};
use boq_core::db::query::{self, ItemFilter};
use boq_core::model::{ItemPatch, NewCollection, NewItem};

use fixtures::*;

#[test]
fn two_items_roll_up_into_section_and_bill() {
    let (boq, _) = boq_with_recorder();
    let project_id = project(&boq, "HS");
    let bill_id = bill(&boq, &project_id, "1", "10");
    let section_id = section(&boq, &project_id, Some(&bill_id), "A");

    item(&boq, &project_id, &section_id, "2", "500");
    item(&boq, &project_id, &section_id, "1", "1000");

    let section = boq.sections().get(&section_id).expect("section");
    assert_eq!(section.total_amount, dec("2000"));
    assert_eq!(section.item_count, 2);

    let bill = boq.bills().get(&bill_id).expect("bill");
    assert_eq!(bill.subtotal_amount, dec("2000"));
    assert_eq!(bill.contingency_amount, dec("200"));
    assert_eq!(bill.total_amount, dec("2200"));
    assert_eq!(bill.section_count, 1);
    assert_eq!(bill.item_count, 2);
}

#[test]
fn rate_change_reprices_item_and_cascades() {
    let (boq, _) = boq_with_recorder();
    let project_id = project(&boq, "HS");
    let bill_id = bill(&boq, &project_id, "1", "10");
    let section_id = section(&boq, &project_id, Some(&bill_id), "A");
    item(&boq, &project_id, &section_id, "2", "500");
    let second = item(&boq, &project_id, &section_id, "1", "1000");

    let updated = boq
        .items()
        .update(
            &second,
            ItemPatch {
                rate: Some(dec("1500")),
                ..ItemPatch::default()
            },
        )
        .expect("update rate");
    assert_eq!(updated.amount, dec("1500"));
    assert_eq!(updated.quantity, Some(dec("1")));

    assert_eq!(
        boq.sections().get(&section_id).expect("section").total_amount,
        dec("2500")
    );
    assert_eq!(boq.bills().get(&bill_id).expect("bill").total_amount, dec("2750"));
}

#[test]
fn deleting_an_item_shrinks_section_and_bill() {
    let (boq, _) = boq_with_recorder();
    let project_id = project(&boq, "HS");
    let bill_id = bill(&boq, &project_id, "1", "10");
    let section_id = section(&boq, &project_id, Some(&bill_id), "A");
    let first = item(&boq, &project_id, &section_id, "2", "500");
    item(&boq, &project_id, &section_id, "1", "1500");

    boq.items().remove(&first).expect("remove");

    let section = boq.sections().get(&section_id).expect("section");
    assert_eq!(section.total_amount, dec("1500"));
    assert_eq!(section.item_count, 1);

    let bill = boq.bills().get(&bill_id).expect("bill");
    assert_eq!(bill.subtotal_amount, dec("1500"));
    assert_eq!(bill.total_amount, dec("1650"));
}

#[test]
fn bulk_create_recomputes_each_section_once() {
    let (boq, recorder) = boq_with_recorder();
    let project_id = project(&boq, "HS");
    let bill_id = bill(&boq, &project_id, "1", "0");
    let a = section(&boq, &project_id, Some(&bill_id), "A");
    let b = section(&boq, &project_id, Some(&bill_id), "B");
    recorder.clear();

    let items = boq
        .items()
        .create_bulk(vec![
            priced(&project_id, Some(&a), "1", "100"),
            priced(&project_id, Some(&b), "2", "50"),
            priced(&project_id, Some(&a), "3", "10"),
        ])
        .expect("bulk create");
    assert_eq!(items.len(), 3);

    assert_eq!(recorder.section_calls(), 2);
    let touched: Vec<String> = recorder
        .sections
        .borrow()
        .iter()
        .map(|totals| totals.section_id.clone())
        .collect();
    assert!(touched.contains(&a));
    assert!(touched.contains(&b));

    assert_eq!(boq.sections().get(&a).expect("a").total_amount, dec("130"));
    assert_eq!(boq.sections().get(&b).expect("b").total_amount, dec("100"));
    assert_eq!(boq.bills().get(&bill_id).expect("bill").subtotal_amount, dec("230"));
}

#[test]
fn bulk_create_with_a_bad_row_writes_nothing() {
    let (boq, recorder) = boq_with_recorder();
    let project_id = project(&boq, "HS");
    let a = section(&boq, &project_id, None, "A");
    recorder.clear();

    let err = boq
        .items()
        .create_bulk(vec![
            priced(&project_id, Some(&a), "1", "100"),
            priced(&project_id, Some("sec-ffffffffffff"), "1", "100"),
        ])
        .expect_err("missing section");
    assert!(err.is_not_found());

    let items = boq
        .items()
        .find_all(&ItemFilter {
            project_id: Some(project_id),
            ..ItemFilter::default()
        })
        .expect("list");
    assert!(items.is_empty());
    assert_eq!(recorder.total_calls(), 0);
}

#[test]
fn deleting_a_loose_item_triggers_no_recompute() {
    let (boq, recorder) = boq_with_recorder();
    let project_id = project(&boq, "HS");
    let loose = boq
        .items()
        .create(priced(&project_id, None, "4", "25"))
        .expect("loose item");
    assert_eq!(loose.amount, dec("100"));
    assert_eq!(recorder.total_calls(), 0);

    boq.items().remove(&loose.id).expect("remove loose item");
    assert_eq!(recorder.total_calls(), 0);
}

#[test]
fn section_delete_orphans_items_and_leaves_bill_stale() {
    let (boq, recorder) = boq_with_recorder();
    let project_id = project(&boq, "HS");
    let bill_id = bill(&boq, &project_id, "1", "10");
    let section_id = section(&boq, &project_id, Some(&bill_id), "A");
    let item_id = item(&boq, &project_id, &section_id, "2", "500");
    recorder.clear();

    boq.sections().remove(&section_id).expect("remove section");

    let orphan = boq.items().get(&item_id).expect("item survives");
    assert!(orphan.section_id.is_none());
    assert_eq!(orphan.amount, dec("1000"));
    assert_eq!(recorder.total_calls(), 0);

    let stale = boq.bills().get(&bill_id).expect("bill");
    assert_eq!(stale.subtotal_amount, dec("1000"));

    let repaired = boq.bills().reconcile(&bill_id).expect("reconcile");
    assert_eq!(repaired.subtotal_amount, dec("0"));
    assert_eq!(repaired.total_amount, dec("0"));
    assert_eq!(repaired.section_count, 0);
}

#[test]
fn section_delete_can_recompute_bill_when_configured() {
    let (boq, recorder) = boq_with_recorder();
    let boq = boq.with_policy(CascadePolicy {
        recalc_bill_on_section_delete: true,
        ..CascadePolicy::default()
    });
    let project_id = project(&boq, "HS");
    let bill_id = bill(&boq, &project_id, "1", "10");
    let section_id = section(&boq, &project_id, Some(&bill_id), "A");
    item(&boq, &project_id, &section_id, "2", "500");
    recorder.clear();

    boq.sections().remove(&section_id).expect("remove section");

    assert_eq!(recorder.bill_calls(), 1);
    let bill = boq.bills().get(&bill_id).expect("bill");
    assert_eq!(bill.total_amount, dec("0"));
    assert_eq!(bill.item_count, 0);
}

#[test]
fn bill_delete_removes_sections_and_keeps_items() {
    let (boq, _) = boq_with_recorder();
    let project_id = project(&boq, "HS");
    let bill_id = bill(&boq, &project_id, "1", "0");
    let section_id = section(&boq, &project_id, Some(&bill_id), "A");
    let item_id = item(&boq, &project_id, &section_id, "1", "10");
    let collection = boq
        .collections()
        .create(NewCollection {
            project_id: project_id.clone(),
            section_id: section_id.clone(),
            parent_item_id: Some(item_id.clone()),
            collection_title: "Carried to summary".into(),
            ..NewCollection::default()
        })
        .expect("collection");
    assert_eq!(
        query::count_section_collections(boq.connection(), &section_id).expect("count"),
        1
    );

    boq.bills().remove(&bill_id).expect("remove bill");

    assert!(boq.sections().get(&section_id).expect_err("gone").is_not_found());
    assert!(
        boq.collections()
            .get(&collection.id)
            .expect_err("collection follows its section")
            .is_not_found()
    );
    assert!(boq.items().get(&item_id).expect("kept").section_id.is_none());
}

#[test]
fn moving_an_item_recomputes_both_sections() {
    let (boq, recorder) = boq_with_recorder();
    let project_id = project(&boq, "HS");
    let bill_id = bill(&boq, &project_id, "1", "0");
    let a = section(&boq, &project_id, Some(&bill_id), "A");
    let b = section(&boq, &project_id, Some(&bill_id), "B");
    let moved = item(&boq, &project_id, &a, "3", "100");
    item(&boq, &project_id, &b, "1", "50");
    recorder.clear();

    boq.items()
        .update(
            &moved,
            ItemPatch {
                section_id: Some(Some(b.clone())),
                ..ItemPatch::default()
            },
        )
        .expect("move");

    assert_eq!(recorder.section_calls(), 2);
    assert_eq!(boq.sections().get(&a).expect("a").total_amount, dec("0"));
    assert_eq!(boq.sections().get(&b).expect("b").total_amount, dec("350"));
    assert_eq!(boq.bills().get(&bill_id).expect("bill").subtotal_amount, dec("350"));
}

#[test]
fn moving_a_section_recomputes_both_bills() {
    let (boq, _) = boq_with_recorder();
    let project_id = project(&boq, "HS");
    let from = bill(&boq, &project_id, "1", "10");
    let to = bill(&boq, &project_id, "2", "5");
    let section_id = section(&boq, &project_id, Some(&from), "A");
    item(&boq, &project_id, &section_id, "10", "100");

    boq.sections()
        .update(
            &section_id,
            boq_core::model::SectionPatch {
                bill_id: Some(Some(to.clone())),
                ..boq_core::model::SectionPatch::default()
            },
        )
        .expect("move section");

    let from = boq.bills().get(&from).expect("from");
    assert_eq!(from.subtotal_amount, dec("0"));
    assert_eq!(from.section_count, 0);
    let to = boq.bills().get(&to).expect("to");
    assert_eq!(to.subtotal_amount, dec("1000"));
    assert_eq!(to.contingency_amount, dec("50"));
    assert_eq!(to.total_amount, dec("1050"));
}

#[test]
fn contingency_change_touches_only_the_bill() {
    let (boq, recorder) = boq_with_recorder();
    let project_id = project(&boq, "HS");
    let bill_id = bill(&boq, &project_id, "1", "0");
    let section_id = section(&boq, &project_id, Some(&bill_id), "A");
    item(&boq, &project_id, &section_id, "3", "333.33");
    recorder.clear();

    let bill = boq
        .bills()
        .update_contingency(&bill_id, dec("12.5"))
        .expect("contingency");
    assert_eq!(bill.id, bill_id);
    assert_eq!(bill.contingency_percentage, dec("12.5"));
    assert_eq!(bill.subtotal_amount, dec("999.99"));
    assert_eq!(bill.contingency_amount, dec("125.00"));
    assert_eq!(bill.total_amount, dec("1124.99"));
    assert_eq!(boq.bills().get(&bill_id).expect("stored"), bill);
    assert_eq!(recorder.section_calls(), 0);
    assert_eq!(recorder.bill_calls(), 1);

    let err = boq
        .bills()
        .update_contingency(&bill_id, dec("100.01"))
        .expect_err("out of range");
    assert_eq!(err.code(), boq_core::ErrorCode::InvalidInput);
    assert_eq!(
        boq.bills().get(&bill_id).expect("bill").contingency_percentage,
        dec("12.5")
    );
}

#[test]
fn recompute_is_idempotent() {
    let (boq, _) = boq_with_recorder();
    let project_id = project(&boq, "HS");
    let bill_id = bill(&boq, &project_id, "1", "7.5");
    let section_id = section(&boq, &project_id, Some(&bill_id), "A");
    item(&boq, &project_id, &section_id, "1.5", "19.99");
    item(&boq, &project_id, &section_id, "7", "3.10");

    let first = boq.sections().recalculate_totals(&section_id).expect("first");
    let second = boq.sections().recalculate_totals(&section_id).expect("second");
    assert_eq!(first, second);

    let bill_first = boq.bills().get(&bill_id).expect("bill");
    boq.bills().recalculate_totals(&bill_id).expect("again");
    let bill_second = boq.bills().get(&bill_id).expect("bill");
    assert_eq!(bill_first.subtotal_amount, bill_second.subtotal_amount);
    assert_eq!(bill_first.contingency_amount, bill_second.contingency_amount);
    assert_eq!(bill_first.total_amount, bill_second.total_amount);
}

#[test]
fn explicit_amount_wins_on_create_only() {
    let (boq, _) = boq_with_recorder();
    let project_id = project(&boq, "HS");
    let section_id = section(&boq, &project_id, None, "A");

    let lump = boq
        .items()
        .create(NewItem {
            amount: Some(dec("750")),
            ..priced(&project_id, Some(&section_id), "2", "500")
        })
        .expect("lump sum");
    assert_eq!(lump.amount, dec("750"));

    let repriced = boq
        .items()
        .update(
            &lump.id,
            ItemPatch {
                quantity: Some(dec("3")),
                amount: Some(dec("1")),
                ..ItemPatch::default()
            },
        )
        .expect("reprice");
    assert_eq!(repriced.amount, dec("1500"));
    assert_eq!(
        boq.sections().get(&section_id).expect("section").total_amount,
        dec("1500")
    );
}

#[test]
fn recalculating_missing_entities_is_not_found() {
    let (boq, recorder) = boq_with_recorder();
    assert!(
        boq.sections()
            .recalculate_totals("sec-ffffffffffff")
            .expect_err("missing section")
            .is_not_found()
    );
    assert!(
        boq.bills()
            .recalculate_totals("bil-ffffffffffff")
            .expect_err("missing bill")
            .is_not_found()
    );
    assert_eq!(recorder.total_calls(), 0);
}

#[test]
fn overflowing_line_amount_is_rejected_without_writing() {
    let (boq, recorder) = boq_with_recorder();
    let project_id = project(&boq, "HS");
    let bill_id = bill(&boq, &project_id, "1", "10");
    let section_id = section(&boq, &project_id, Some(&bill_id), "A");
    recorder.clear();

    let err = boq
        .items()
        .create(priced(
            &project_id,
            Some(&section_id),
            "1000000000000000",
            "1000000000000000",
        ))
        .expect_err("product overflows");
    assert!(matches!(err, BoqError::Validation { field: "amount", .. }));

    let item_id = item(&boq, &project_id, &section_id, "2", "500");
    let err = boq
        .items()
        .update(
            &item_id,
            ItemPatch {
                quantity: Some(dec("1000000000000000000")),
                rate: Some(dec("1000000000000000")),
                ..ItemPatch::default()
            },
        )
        .expect_err("reprice overflows");
    assert!(matches!(err, BoqError::Validation { field: "amount", .. }));

    let kept = boq.items().get(&item_id).expect("item");
    assert_eq!(kept.amount, dec("1000"));
    assert_eq!(boq.sections().get(&section_id).expect("section").item_count, 1);
}

#[test]
fn overflowing_contingency_rolls_back_the_item_write() {
    let (boq, recorder) = boq_with_recorder();
    let project_id = project(&boq, "HS");
    let bill_id = bill(&boq, &project_id, "1", "10");
    let section_id = section(&boq, &project_id, Some(&bill_id), "A");
    item(&boq, &project_id, &section_id, "1", "100");
    recorder.clear();

    let err = boq
        .items()
        .create(NewItem {
            amount: Some(dec("50000000000000000000000000000")),
            ..priced(&project_id, Some(&section_id), "1", "1")
        })
        .expect_err("contingency overflows");
    assert!(matches!(
        err,
        BoqError::Validation {
            field: "contingency_amount",
            ..
        }
    ));
    assert_eq!(recorder.total_calls(), 0);

    let section = boq.sections().get(&section_id).expect("section");
    assert_eq!(section.total_amount, dec("100"));
    assert_eq!(section.item_count, 1);
    let bill = boq.bills().get(&bill_id).expect("bill");
    assert_eq!(bill.total_amount, dec("110"));
    let items = boq
        .items()
        .find_all(&ItemFilter {
            section_id: Some(section_id),
            ..ItemFilter::default()
        })
        .expect("items");
    assert_eq!(items.len(), 1);
}
